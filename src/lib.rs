// Suzume image transformation server library

pub mod codec;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod response;
pub mod server;
pub mod sources;
