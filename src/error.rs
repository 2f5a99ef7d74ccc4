use crate::api::Problem;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure modes of the ACME engine.
///
/// `Acme` carries the CA's structured problem document and is the variant to
/// match on for protocol-level rejections (rate limits, unauthorized, bad
/// CSR, ...). `Transport` means no usable HTTP response was obtained at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network, DNS or TLS failure before any HTTP response was received.
    #[error("ACME service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// A problem document returned by (or synthesized from) a CA response.
    #[error("ACME server error: {0}")]
    Acme(Problem),

    /// A response body that should have been valid JSON was not.
    #[error("malformed response from ACME server: {0}")]
    Json(#[from] serde_json::Error),

    /// The newNonce endpoint responded without a `Replay-Nonce` header.
    ///
    /// Signing cannot proceed without a nonce, so this is fatal and never
    /// retried.
    #[error("no Replay-Nonce header in newNonce response")]
    MissingNonce,

    /// A response was missing a header the protocol requires.
    #[error("missing {0} header in response")]
    MissingHeader(&'static str),

    /// A 2xx response did not carry the expected resource body.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),

    /// Download was attempted before the order reached the `valid` state.
    #[error("order has no certificate URL yet")]
    CertificateNotIssued,

    /// The signing key refused to produce a signature.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The external account binding MAC key was not valid base64url.
    #[error("invalid external account binding key: {0}")]
    InvalidEabKey(#[from] base64::DecodeError),

    /// Key import/export failure.
    #[error("key error: {0}")]
    Key(#[from] pkcs8::Error),
}

impl From<Problem> for Error {
    fn from(problem: Problem) -> Self {
        Error::Acme(problem)
    }
}

impl Error {
    /// Returns the CA's problem document, if this error carries one.
    pub fn problem(&self) -> Option<&Problem> {
        match self {
            Error::Acme(problem) => Some(problem),
            _ => None,
        }
    }
}
