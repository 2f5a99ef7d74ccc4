//! JWS envelope construction.
//!
//! Every signed ACME request is a flattened-JSON JWS per [RFC 7515 §7.2.2],
//! with the protected header rules of [RFC 8555 §6.2]: newAccount requests
//! (and revocations authenticated by a certificate key) carry the public key
//! as `jwk`; every other request identifies the account via `kid`.
//!
//! [RFC 7515 §7.2.2]: https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.2
//! [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2

use base64::prelude::*;
use hmac::{Hmac, Mac as _};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::{Error, Result},
    key::{Jwk, Signer},
};

/// JWS protected header.
///
/// Exactly one of `jwk` / `kid` is present. `nonce` is omitted only in the
/// key rollover inner JWS and the external account binding, which are carried
/// as payloads of an outer, nonce-bearing envelope.
#[derive(Debug, Serialize)]
struct ProtectedHeader<'a> {
    alg: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,

    url: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,

    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

/// Flattened JSON JWS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jws {
    protected: String,
    payload: String,
    signature: String,
}

impl Jws {
    /// Base64url of the protected header JSON.
    pub fn protected(&self) -> &str {
        &self.protected
    }

    /// Base64url of the payload, or `""` for empty-payload requests.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Base64url of the signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Sign `payload` for a request to `url`.
///
/// `kid: None` puts the signer's public JWK in the header instead. A payload
/// of `None` encodes as the empty string per RFC 8555 (POST-as-GET).
pub(crate) fn sign<T>(
    payload: Option<&T>,
    key: &dyn Signer,
    url: &str,
    nonce: Option<String>,
    kid: Option<&str>,
) -> Result<Jws>
where
    T: Serialize + ?Sized,
{
    let header = ProtectedHeader {
        alg: key.algorithm().as_str(),
        nonce,
        url,
        jwk: kid.is_none().then(|| key.public_jwk()),
        kid,
    };

    let protected = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);

    let payload = match payload {
        Some(payload) => BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?),
        None => String::new(),
    };

    let to_sign = format!("{protected}.{payload}");
    let signature = BASE64_URL_SAFE_NO_PAD.encode(key.sign(to_sign.as_bytes())?);

    Ok(Jws {
        protected,
        payload,
        signature,
    })
}

/// Build the external account binding inner JWS per [RFC 8555 §7.3.4].
///
/// The payload is the account's public JWK; the MAC key is the CA-issued
/// base64url-encoded secret identified by `key_id`.
///
/// [RFC 8555 §7.3.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.3.4
pub(crate) fn sign_eab(account_jwk: &Jwk, key_id: &str, hmac_key: &str, url: &str) -> Result<Jws> {
    let header = ProtectedHeader {
        alg: "HS256",
        nonce: None,
        url,
        jwk: None,
        kid: Some(key_id),
    };

    let protected = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let payload = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(account_jwk)?);

    let key = BASE64_URL_SAFE_NO_PAD.decode(hmac_key)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|err| Error::Signing(format!("external account binding MAC: {err}")))?;
    mac.update(format!("{protected}.{payload}").as_bytes());
    let signature = BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(Jws {
        protected,
        payload,
        signature,
    })
}
