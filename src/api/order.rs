use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`Order`].
///
/// Only ever advances (`pending → ready → processing → valid`) absent
/// server-side invalidation; `valid` and `invalid` are terminal.
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Valid | OrderStatus::Invalid)
    }
}

/// An ACME order object, doubling as the newOrder request payload.
///
/// Represents a client's request for a certificate and is used to track the
/// progress of that order through to issuance.
///
/// See [RFC 8555 §7.1.3].
///
/// # Example JSON
///
/// ```json
/// {
///   "status": "pending",
///   "expires": "2019-01-09T08:26:43.570360537Z",
///   "identifiers": [
///     {
///       "type": "dns",
///       "value": "example.org"
///     }
///   ],
///   "authorizations": [
///     "https://example.com/acme/authz/PAniVnsZcis"
///   ],
///   "finalize": "https://example.com/acme/order/TOlocE8rfgo/finalize"
/// }
/// ```
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,

    /// Uses RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    pub identifiers: Vec<api::Identifier>,

    /// Requested notBefore, RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,

    /// Requested notAfter, RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,

    /// ARI certificate ID of the certificate this order replaces.
    /// Request-only, per [draft-ietf-acme-ari].
    ///
    /// [draft-ietf-acme-ari]: https://datatracker.ietf.org/doc/html/draft-ietf-acme-ari-04
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,

    /// Requested certificate profile name, per the ACME profiles draft.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<api::Problem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizations: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl Order {
    /// Returns the identifier values in this order.
    pub fn identifier_values(&self) -> Vec<&str> {
        self.identifiers
            .iter()
            .map(|identifier| identifier.value.as_str())
            .collect()
    }

    pub fn is_status_pending(&self) -> bool {
        self.status == Some(OrderStatus::Pending)
    }

    pub fn is_status_ready(&self) -> bool {
        self.status == Some(OrderStatus::Ready)
    }

    pub fn is_status_processing(&self) -> bool {
        self.status == Some(OrderStatus::Processing)
    }

    pub fn is_status_valid(&self) -> bool {
        self.status == Some(OrderStatus::Valid)
    }

    pub fn is_status_invalid(&self) -> bool {
        self.status == Some(OrderStatus::Invalid)
    }
}

/// One page of the account's orders list.
///
/// Further pages, when present, are linked via the `next` Link relation.
/// See [RFC 8555 §7.1.2.1].
///
/// [RFC 8555 §7.1.2.1]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.2.1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderList {
    /// URLs of the account's orders.
    pub orders: Vec<String>,
}
