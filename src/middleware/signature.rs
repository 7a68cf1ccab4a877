use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use super::buffer_body;
use crate::error::AppError;
use crate::security::{Signer, SIGNATURE_HEADER};

/// Verify the `HashSHA256` header of a request when present, and sign the
/// response body.
///
/// Requests without the header pass through unchecked.
pub async fn verify_and_sign(
    State(signer): State<Signer>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let body = buffer_body(body).await?;

    if let Some(header) = parts.headers.get(SIGNATURE_HEADER) {
        let signature = header
            .to_str()
            .map_err(|_| AppError::Integrity("signature header is not valid ASCII".to_string()))?;
        signer.verify(&body, signature)?;
    }

    let response = next.run(Request::from_parts(parts, Body::from(body))).await;

    let (mut parts, body) = response.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| AppError::Internal(format!("failed to buffer response: {}", e)))?;

    let name = HeaderName::from_bytes(SIGNATURE_HEADER.as_bytes())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let value = HeaderValue::from_str(&signer.sign(&body))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    parts.headers.insert(name, value);
    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    Ok(Response::from_parts(parts, Body::from(body)))
}
