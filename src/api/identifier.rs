use serde::{Deserialize, Serialize};

/// Identifier type discriminator.
///
/// Types a CA may offer beyond the RFC 8555 set (e.g. the TNAuthList type
/// from the authority-token draft) round-trip through the `Other` variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IdentifierType {
    /// DNS name, [RFC 8555 §9.7.7].
    ///
    /// [RFC 8555 §9.7.7]: https://datatracker.ietf.org/doc/html/rfc8555#section-9.7.7
    Dns,

    /// IP address, [RFC 8738].
    ///
    /// [RFC 8738]: https://datatracker.ietf.org/doc/html/rfc8738
    Ip,

    /// Telephone Number Authority List, [draft-ietf-acme-authority-token-tnauthlist].
    ///
    /// [draft-ietf-acme-authority-token-tnauthlist]: https://datatracker.ietf.org/doc/html/draft-ietf-acme-authority-token-tnauthlist-13
    TnAuthList,

    /// Any type this crate does not know about, preserved verbatim.
    Other(String),
}

impl IdentifierType {
    pub fn as_str(&self) -> &str {
        match self {
            IdentifierType::Dns => "dns",
            IdentifierType::Ip => "ip",
            IdentifierType::TnAuthList => "TNAuthList",
            IdentifierType::Other(other) => other,
        }
    }
}

impl From<String> for IdentifierType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "dns" => IdentifierType::Dns,
            "ip" => IdentifierType::Ip,
            "TNAuthList" => IdentifierType::TnAuthList,
            _ => IdentifierType::Other(value),
        }
    }
}

impl From<IdentifierType> for String {
    fn from(value: IdentifierType) -> Self {
        value.as_str().to_owned()
    }
}

/// An identifier a certificate can be requested for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub _type: IdentifierType,
    pub value: String,
}

impl Identifier {
    /// DNS identifier for `value`.
    pub fn dns(value: impl Into<String>) -> Self {
        Identifier {
            _type: IdentifierType::Dns,
            value: value.into(),
        }
    }

    /// IP address identifier for `value`.
    pub fn ip(value: impl Into<String>) -> Self {
        Identifier {
            _type: IdentifierType::Ip,
            value: value.into(),
        }
    }

    pub fn is_type_dns(&self) -> bool {
        self._type == IdentifierType::Dns
    }
}
