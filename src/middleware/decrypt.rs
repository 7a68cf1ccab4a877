use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};

use super::buffer_body;
use crate::error::AppError;
use crate::security::Decrypter;

/// Replace an RSA-encrypted request body with its plaintext. Empty bodies
/// pass through.
pub async fn decrypt_body(
    State(decrypter): State<Arc<Decrypter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let body = buffer_body(body).await?;

    if body.is_empty() {
        return Ok(next.run(Request::from_parts(parts, Body::empty())).await);
    }

    let plaintext = decrypter
        .decrypt(&body)
        .map_err(|e| AppError::Integrity(e.to_string()))?;
    parts.headers.remove(CONTENT_LENGTH);

    Ok(next.run(Request::from_parts(parts, Body::from(plaintext))).await)
}
