//! Shared response types.

use serde::Serialize;
use utoipa::ToSchema;

/// Message-only response, the shape most mutation endpoints return.
#[derive(Debug, Serialize, ToSchema)]
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

/// Message plus a payload, for endpoints that return both.
#[derive(Debug, Serialize, ToSchema)]
pub struct DataResponse<T: Serialize> {
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}
