use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Renewal information for a certificate, per [draft-ietf-acme-ari].
///
/// # Example JSON
///
/// ```json
/// {
///   "suggestedWindow": {
///     "start": "2021-01-03T00:00:00Z",
///     "end": "2021-01-07T00:00:00Z"
///   },
///   "explanationURL": "https://example.com/docs/example-mass-reissuance-event"
/// }
/// ```
///
/// [draft-ietf-acme-ari]: https://datatracker.ietf.org/doc/html/draft-ietf-acme-ari-04
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalInfo {
    /// The window within which the CA suggests renewing.
    pub suggested_window: RenewalWindow,

    /// Link to an explanation of the suggested window (e.g. a mass
    /// reissuance event).
    #[serde(rename = "explanationURL", skip_serializing_if = "Option::is_none")]
    pub explanation_url: Option<String>,
}

/// A suggested renewal window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenewalWindow {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start: Option<OffsetDateTime>,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end: Option<OffsetDateTime>,
}

/// Payload reporting that a certificate has been replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalInfoUpdate {
    /// The ARI certificate ID (base64url of the OCSP CertID components).
    #[serde(rename = "certID")]
    pub cert_id: String,

    pub replaced: bool,
}
