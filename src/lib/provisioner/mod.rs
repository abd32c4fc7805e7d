pub mod catalog;
pub mod lock;
pub mod provisioner;
pub mod types;
