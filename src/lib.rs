pub mod config;
pub mod connection;
pub mod content;
pub mod error;
pub mod history;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod refine;
pub mod schedule;
pub mod store;
