use serde::{Deserialize, Serialize};

/// Certificate revocation request.
///
/// See [RFC 8555 §7.6].
///
/// [RFC 8555 §7.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.6
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    /// The certificate to be revoked, in the base64url-encoded version of the DER format.
    ///
    /// Note: not PEM, since headers are omitted.
    pub certificate: String,

    /// One of the revocation reasonCodes defined in [RFC 5280 §5.3.1].
    ///
    /// [RFC 5280 §5.3.1]: https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<usize>,
}

impl Revocation {
    /// `Unspecified` maps to an absent reason code:
    ///
    /// > the reason code CRL entry extension SHOULD be absent instead of
    /// > using the unspecified (0) reasonCode value
    ///
    /// see <https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1>
    pub fn new(certificate: String, reason: Option<RevocationReason>) -> Self {
        let reason = match reason {
            None | Some(RevocationReason::Unspecified) => None,
            Some(reason) => Some(reason as usize),
        };

        Self {
            certificate,
            reason,
        }
    }
}

/// Revocation reason codes from [RFC 5280 §5.3.1].
///
/// Discriminants are the wire values; note that 7 is unassigned.
///
/// [RFC 5280 §5.3.1]: https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CaCompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    RemoveFromCrl = 8,
    PrivilegeWithdrawn = 9,
    AaCompromise = 10,
}
