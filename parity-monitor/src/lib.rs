pub mod batch;
pub mod channels;
pub mod config;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod scheduler;
pub mod server;
pub mod targets;
pub mod teams;
pub mod thresholds;
pub mod time_window;

#[cfg(test)]
mod test_utils;
