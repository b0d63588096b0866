use thiserror::Error;

#[derive(Error, Debug)]
pub enum UbookError {
    #[error("Request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("Authentication failure: {0}")]
    AuthenticationFailed(String),
    #[error("Login timed out after {0} seconds")]
    LoginTimeout(u64),
    #[error("publicKey/privateKey pair not found in title page")]
    KeysNotFound,
    #[error("Unexpected page structure: {0}")]
    PageStructure(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = anyhow::Result<T, UbookError>;

/// Why a single decryption attempt failed. The resolver folds every variant
/// into the same per-chapter outcome; the cause survives only in logs.
#[derive(Error, Debug)]
pub enum DecryptError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("malformed private key: {0}")]
    Key(rsa::pkcs8::Error),
    #[error("decryption failed: {0}")]
    Rsa(#[from] rsa::Error),
    #[error("plaintext is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Per-chapter resolution failure. Partial results are expected: one chapter
/// failing must not abort the remaining ones.
#[derive(Error, Debug)]
pub enum ResolveFailure {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Decrypt(#[from] DecryptError),
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("server reported failure")]
    Rejected,
}
