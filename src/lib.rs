pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod infrastructure;
