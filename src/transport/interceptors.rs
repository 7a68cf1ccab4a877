use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};

use crate::security::{compression, Encrypter, SecurityError, Signer, SIGNATURE_HEADER};

/// A request body and its headers on the way through the chain
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PreparedRequest {
    pub fn new(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// One step of the outbound envelope
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, request: PreparedRequest) -> Result<PreparedRequest, SecurityError>;
}

/// RSA-encrypts the body with the server's public key
pub struct EncryptInterceptor {
    encrypter: Encrypter,
}

impl EncryptInterceptor {
    pub fn new(encrypter: Encrypter) -> Self {
        Self { encrypter }
    }
}

impl Interceptor for EncryptInterceptor {
    fn name(&self) -> &'static str {
        "encrypt"
    }

    fn apply(&self, mut request: PreparedRequest) -> Result<PreparedRequest, SecurityError> {
        request.body = Bytes::from(self.encrypter.encrypt(&request.body)?);
        Ok(request)
    }
}

/// Signs the exact bytes handed to compression
pub struct SignInterceptor {
    signer: Signer,
}

impl SignInterceptor {
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }
}

impl Interceptor for SignInterceptor {
    fn name(&self) -> &'static str {
        "sign"
    }

    fn apply(&self, mut request: PreparedRequest) -> Result<PreparedRequest, SecurityError> {
        let signature = self.signer.sign(&request.body);
        let name = HeaderName::from_bytes(SIGNATURE_HEADER.as_bytes())
            .map_err(|e| SecurityError::Integrity(format!("invalid signature header: {}", e)))?;
        let value = HeaderValue::from_str(&signature)
            .map_err(|e| SecurityError::Integrity(format!("invalid signature header: {}", e)))?;
        request.headers.insert(name, value);
        Ok(request)
    }
}

pub struct GzipInterceptor;

impl Interceptor for GzipInterceptor {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn apply(&self, mut request: PreparedRequest) -> Result<PreparedRequest, SecurityError> {
        request.body = Bytes::from(compression::gzip(&request.body)?);
        request
            .headers
            .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_interceptor_sets_header_over_body() {
        let signer = Signer::new("k");
        let request = SignInterceptor::new(signer.clone())
            .apply(PreparedRequest::new("http://localhost/update", &b"abc"[..]))
            .unwrap();

        let header = request.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
        assert!(signer.verify(b"abc", header).is_ok());
        assert_eq!(&request.body[..], b"abc");
    }

    #[test]
    fn test_gzip_interceptor_sets_encoding_headers() {
        let request = GzipInterceptor
            .apply(PreparedRequest::new("http://localhost/update", &b"{}"[..]))
            .unwrap();

        assert_eq!(request.headers[CONTENT_ENCODING], "gzip");
        assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        assert_eq!(compression::gunzip(&request.body).unwrap(), b"{}");
    }
}
