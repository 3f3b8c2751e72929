mod app;
mod comparison;

pub use app::{app, AppState};
pub use comparison::{RunRequest, RunResponse};
