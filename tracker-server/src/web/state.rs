//! Application state for the web layer.

use std::sync::Arc;

use crate::service::TrainService;

/// Shared application state.
///
/// Handlers only read; the service object is owned here and by `main`.
pub struct AppState<S> {
    /// Train data service
    pub service: Arc<TrainService<S>>,
}

impl<S> AppState<S> {
    pub fn new(service: Arc<TrainService<S>>) -> Self {
        Self { service }
    }
}

// Derived Clone would require `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}
