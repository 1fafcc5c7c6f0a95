//! Identity: registered users with password sessions, and anonymous "demo"
//! users identified only by a cookie.
//!
//! [`register_with_binding`] is the one place the two meet: registering from
//! an anonymous session carries the demo user's notes into the new account.

pub mod password;
pub mod sessions;
pub mod users;

use rusqlite::Connection;
use thiserror::Error;

use crate::notes::binding::{bind_anonymous_data, BindingReport};
use users::{get_user, insert_registered_user, prepare_credentials, User};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("用户名需为 3-32 位字母、数字或下划线")]
    InvalidUsername,

    #[error("密码至少 6 位")]
    WeakPassword,

    #[error("用户名已被占用")]
    UsernameTaken,

    #[error("用户名或密码错误")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuthError {
    /// Errors caused by user input, safe to show on the form.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidUsername | Self::WeakPassword | Self::UsernameTaken | Self::InvalidCredentials
        )
    }
}

/// Create a registered account and, when registering from an anonymous
/// session, move that demo user's data into it and delete the demo user.
/// All in one transaction.
pub fn register_with_binding(
    conn: &mut Connection,
    anonymous_user: Option<&str>,
    username: &str,
    password: &str,
) -> Result<(User, Option<BindingReport>), AuthError> {
    let hash = prepare_credentials(username, password)?;

    let tx = conn.transaction()?;
    let user = insert_registered_user(&tx, username, &hash)?;

    let mut report = None;
    if let Some(anon_id) = anonymous_user {
        // only demo users are ever bound
        if get_user(&tx, anon_id)?.is_some_and(|u| u.is_anonymous) {
            report = Some(bind_anonymous_data(&tx, anon_id, &user.id)?);
            users::delete_user(&tx, anon_id)?;
        }
    }

    tx.commit()?;
    Ok((user, report))
}
