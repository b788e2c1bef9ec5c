use std::sync::{Mutex, PoisonError};

use tracing::info;

/// Receives redirect targets the API hands back in `302` bodies.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, target: &str) {
        info!(destination = target, "server requested navigation");
    }
}

/// Keeps every target it was asked to navigate to, in order.
#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        info!(destination = target, "server requested navigation");
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.to_string());
    }
}
