pub mod api;
pub mod auth;
pub mod chart;
pub mod config;
pub mod device;
pub mod model;
pub mod reducer;
pub mod session;
pub mod state;
pub mod time;

// Deterministic in-process backend for demo mode and tests
pub mod fake;
