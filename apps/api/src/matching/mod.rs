pub mod handlers;
pub mod listing;
pub mod manager;
#[cfg(test)]
pub mod memory_store;
pub mod normalize;
pub mod requirements;
pub mod scoring;
pub mod store;
pub mod triggers;
