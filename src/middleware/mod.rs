//! Request/response middleware applied by the server router.
//!
//! Layer order, outermost first: trace, response compression, request
//! decompression, signature verification, decryption, handler.

pub mod decrypt;
pub mod signature;

pub use decrypt::decrypt_body;
pub use signature::verify_and_sign;

use axum::body::{Body, Bytes};

use crate::error::AppError;

/// Largest request or response body the middleware will buffer
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

async fn buffer_body(body: Body) -> Result<Bytes, AppError> {
    axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::Validation(format!("failed to read body: {}", e)))
}
