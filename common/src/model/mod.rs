pub mod audit;
pub mod dimension;
pub mod platform;
pub mod quarantine;
pub mod staging;
pub mod summary;
