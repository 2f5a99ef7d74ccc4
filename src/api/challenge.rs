use serde::{Deserialize, Serialize};

use crate::api;

/// The status of a [`Challenge`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

/// Challenge type discriminator.
///
/// Unknown types (including future drafts) round-trip through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChallengeType {
    /// [RFC 8555 §8.3].
    ///
    /// [RFC 8555 §8.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.3
    Http01,

    /// [RFC 8555 §8.4].
    ///
    /// [RFC 8555 §8.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-8.4
    Dns01,

    /// [RFC 8737].
    ///
    /// [RFC 8737]: https://datatracker.ietf.org/doc/html/rfc8737
    TlsAlpn01,

    /// Authority token challenge, [draft-ietf-acme-authority-token].
    ///
    /// [draft-ietf-acme-authority-token]: https://datatracker.ietf.org/doc/html/draft-ietf-acme-authority-token-09
    Tkauth01,

    Other(String),
}

impl ChallengeType {
    pub fn as_str(&self) -> &str {
        match self {
            ChallengeType::Http01 => "http-01",
            ChallengeType::Dns01 => "dns-01",
            ChallengeType::TlsAlpn01 => "tls-alpn-01",
            ChallengeType::Tkauth01 => "tkauth-01",
            ChallengeType::Other(other) => other,
        }
    }
}

impl From<String> for ChallengeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "http-01" => ChallengeType::Http01,
            "dns-01" => ChallengeType::Dns01,
            "tls-alpn-01" => ChallengeType::TlsAlpn01,
            "tkauth-01" => ChallengeType::Tkauth01,
            _ => ChallengeType::Other(value),
        }
    }
}

impl From<ChallengeType> for String {
    fn from(value: ChallengeType) -> Self {
        value.as_str().to_owned()
    }
}

/// An ACME challenge object.
///
/// Represents a server's offer to validate a client's possession of an
/// identifier in a specific way. This crate only represents the resource and
/// triggers validation; provisioning the response (file, DNS record, ALPN
/// certificate) is the caller's job.
///
/// See [RFC 8555 §7.1.5].
///
/// [RFC 8555 §7.1.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.5
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Type of challenge encoded in the object.
    #[serde(rename = "type")]
    pub _type: ChallengeType,

    /// URL to which a response can be posted.
    pub url: String,

    pub status: ChallengeStatus,

    /// Time at which the server validated this challenge, RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated: Option<String>,

    /// Error that occurred while the server was validating the challenge, if
    /// any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<api::Problem>,

    /// Random value used to construct the challenge response. Absent on
    /// authority-token challenges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Token authority scheme for authority-token challenges, e.g. "atc".
    #[serde(rename = "tkauth-type", skip_serializing_if = "Option::is_none")]
    pub tkauth_type: Option<String>,

    /// URL of the token authority for authority-token challenges.
    #[serde(rename = "token-authority", skip_serializing_if = "Option::is_none")]
    pub token_authority: Option<String>,
}
