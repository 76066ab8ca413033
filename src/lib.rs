pub mod catalog;
pub mod config;
pub mod engines;
pub mod error;
pub mod types;
pub mod world;
