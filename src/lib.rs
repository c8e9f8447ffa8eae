pub mod batch;
pub mod classify;
pub mod config;
pub mod error;
pub mod indicator;
pub mod model;
pub mod narrative;
pub mod provider;
pub mod render;
pub mod report;
