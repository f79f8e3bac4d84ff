pub mod application;
pub mod job;
pub mod profile;
pub mod run;

use serde::Serialize;

/// Generic message response.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
