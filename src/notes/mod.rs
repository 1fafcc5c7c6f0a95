pub mod binding;
pub mod points;
pub mod search;
pub mod stats;
pub mod tags;
pub mod topics;
pub mod types;
