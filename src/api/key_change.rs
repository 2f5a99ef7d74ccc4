use serde::{Deserialize, Serialize};

use crate::key::Jwk;

/// Payload of the key rollover inner JWS.
///
/// Signed by the replacement key; `old_key` proves knowledge of the key
/// currently bound to the account.
///
/// See [RFC 8555 §7.3.5].
///
/// [RFC 8555 §7.3.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.3.5
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyChange {
    /// The account URL.
    pub account: String,

    /// JWK of the key being replaced.
    pub old_key: Jwk,
}
