pub mod bridge;
pub mod capture;
pub mod config;
pub mod pipeline;
pub mod runtime;
