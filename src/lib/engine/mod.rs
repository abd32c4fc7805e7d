pub mod docker;
pub mod engine;
#[cfg(test)]
pub mod testing;
pub mod types;
