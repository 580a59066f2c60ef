pub mod analyzers;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod map;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod stats;
pub mod synthetic;
