pub mod monitor;
pub mod types;
