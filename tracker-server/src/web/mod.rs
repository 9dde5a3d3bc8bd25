//! Web layer for the train tracker.
//!
//! Read-only JSON endpoints over the current snapshot and station views.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
