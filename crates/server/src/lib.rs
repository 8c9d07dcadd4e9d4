pub mod api;
pub mod app;
pub mod metrics;
pub mod state;
