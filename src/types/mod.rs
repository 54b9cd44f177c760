//! Shared types.

mod response;

pub use response::{DataResponse, MessageResponse};
