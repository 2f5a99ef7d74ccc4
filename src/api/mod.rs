//! JSON API payloads.
//!
//! Not intended to be used directly. Provided to aid debugging.

use std::fmt;

use serde::{
    ser::{SerializeMap as _, Serializer},
    Deserialize, Serialize,
};

mod account;
mod authorization;
mod challenge;
mod directory;
mod finalize;
mod identifier;
mod key_change;
mod order;
mod renewal;
mod revocation;

pub use self::{
    account::{Account, AccountStatus},
    authorization::{Authorization, AuthorizationStatus},
    challenge::{Challenge, ChallengeStatus, ChallengeType},
    directory::{Directory, DirectoryMeta},
    finalize::Finalize,
    identifier::{Identifier, IdentifierType},
    key_change::KeyChange,
    order::{Order, OrderList, OrderStatus},
    renewal::{RenewalInfo, RenewalInfoUpdate, RenewalWindow},
    revocation::{Revocation, RevocationReason},
};

/// Serializes to `{}`.
///
/// The payload of a challenge validation trigger per [RFC 8555 §7.5.1].
///
/// [RFC 8555 §7.5.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.5.1
pub struct EmptyObject;

impl Serialize for EmptyObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_map(Some(0))?.end()
    }
}

/// Payload that moves a resource (account, authorization) to `deactivated`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Deactivate {
    status: &'static str,
}

impl Deactivate {
    pub(crate) fn new() -> Self {
        Deactivate {
            status: "deactivated",
        }
    }
}

/// An ACME problem document.
///
/// The CA's structured failure report, distinct from transport-level
/// failures. See [RFC 8555 §6.7].
///
/// [RFC 8555 §6.7]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.7
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type", default)]
    pub _type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Present on subproblems, scoping the problem to one identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subproblems: Option<Vec<Problem>>,
}

impl Problem {
    /// Returns true if the problem type is the ACME "badNonce" error.
    ///
    /// Real CAs send the full URN; the bare token is accepted for tolerance.
    pub fn is_bad_nonce(&self) -> bool {
        self._type == "urn:ietf:params:acme:error:badNonce" || self._type == "badNonce"
    }

    /// Returns true if the problem type is the ACME "rateLimited" error.
    pub fn is_rate_limited(&self) -> bool {
        self._type == "urn:ietf:params:acme:error:rateLimited" || self._type == "rateLimited"
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self._type),
            _ => write!(f, "{}", self._type),
        }
    }
}
