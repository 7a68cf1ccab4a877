use bytes::Bytes;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::interceptors::{
    EncryptInterceptor, GzipInterceptor, Interceptor, PreparedRequest, SignInterceptor,
};
use super::{is_retryable_status, TransportError};
use crate::retry::{RetryError, RetryPolicy};
use crate::security::{Encrypter, Signer};

/// Settings the interceptor list is built from
#[derive(Debug, Clone, Default)]
pub struct ChainOptions {
    pub signer: Option<Signer>,
    pub encrypter: Option<Encrypter>,
    pub retry: RetryPolicy,
}

/// Final answer of a delivery once retries are settled
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Envelope builder and retrying sender.
///
/// The interceptor list is fixed at construction: encryption (optional),
/// signing (optional), then gzip.
pub struct TransportChain {
    client: reqwest::Client,
    interceptors: Vec<Box<dyn Interceptor>>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl TransportChain {
    pub fn new(client: reqwest::Client, options: ChainOptions, cancel: CancellationToken) -> Self {
        let mut interceptors: Vec<Box<dyn Interceptor>> = Vec::with_capacity(3);
        if let Some(encrypter) = options.encrypter {
            interceptors.push(Box::new(EncryptInterceptor::new(encrypter)));
        }
        if let Some(signer) = options.signer {
            interceptors.push(Box::new(SignInterceptor::new(signer)));
        }
        interceptors.push(Box::new(GzipInterceptor));

        Self {
            client,
            interceptors,
            retry: options.retry,
            cancel,
        }
    }

    /// Names of the active interceptors, in application order
    pub fn interceptor_names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run `body` through the interceptors without sending it
    pub fn prepare(&self, url: &str, body: Vec<u8>) -> Result<PreparedRequest, TransportError> {
        let mut request = PreparedRequest::new(url, body);
        for interceptor in &self.interceptors {
            request = interceptor.apply(request)?;
        }
        Ok(request)
    }

    /// Envelope and POST a JSON body, retrying retryable statuses.
    ///
    /// Any non-retryable status is returned as-is; the caller decides
    /// whether it is a success.
    pub async fn post(&self, url: &str, body: Vec<u8>) -> Result<TransportResponse, TransportError> {
        let request = self.prepare(url, body)?;

        let result = self
            .retry
            .run(&self.cancel, TransportError::is_retryable, |attempt| {
                let request = request.clone();
                async move {
                    debug!(url = %request.url, attempt, bytes = request.body.len(), "Sending request");
                    self.send_once(request).await
                }
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(RetryError::Permanent(e)) => Err(e),
            Err(RetryError::Exhausted { attempts, last }) => Err(TransportError::RetriesExhausted {
                attempts,
                last: last.to_string(),
            }),
            Err(RetryError::Cancelled { .. }) => Err(TransportError::Cancelled),
        }
    }

    async fn send_once(&self, request: PreparedRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        // Drain before the next attempt so the connection can be reused
        let body = response.bytes().await?;

        if is_retryable_status(status) {
            return Err(TransportError::RetryableStatus(status));
        }

        Ok(TransportResponse { status, body })
    }
}
