use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`Authorization`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

/// An ACME authorization object.
///
/// Represents a server's authorization for an account to represent an
/// identifier.
///
/// See [RFC 8555 §7.1.4].
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    /// Identifier being proven.
    pub identifier: api::Identifier,

    pub status: AuthorizationStatus,

    /// The timestamp after which the server will consider this authorization
    /// invalid. Uses RFC 3339 format.
    ///
    /// Required for objects with "valid" in the "status" field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    /// The challenges the client can fulfill to prove possession of the
    /// identifier. Any one is sufficient.
    pub challenges: Vec<api::Challenge>,

    /// Present and true for authorizations created from a wildcard DNS
    /// identifier; absent otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wildcard: Option<bool>,
}

impl Authorization {
    /// Returns true if the authorization was created for a wildcard domain.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard.unwrap_or(false)
    }

    /// Returns the first challenge of the given type, if present.
    pub fn challenge(&self, _type: &api::ChallengeType) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| &c._type == _type)
    }
}
