//! Signing keys and their JSON Web Key representation.
//!
//! The engine treats a key as an opaque capability: it can sign a byte string
//! and expose its public half as a [`Jwk`]. Anything implementing [`Signer`]
//! can drive an account; [`EcKeyPair`] is the built-in elliptic curve
//! implementation.

use base64::prelude::*;
use ecdsa::signature::Signer as _;
use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// JWS signature algorithms with a defined `alg` header mapping.
///
/// `Rs256` is present so caller-supplied RSA signers can participate; this
/// crate does not ship an RSA implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Es256,
    Es384,
    Rs256,
}

impl SigningAlgorithm {
    /// The JWS `alg` header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Es256 => "ES256",
            SigningAlgorithm::Es384 => "ES384",
            SigningAlgorithm::Rs256 => "RS256",
        }
    }
}

impl std::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asymmetric key capable of signing ACME requests.
pub trait Signer: Send + Sync {
    /// The JWS algorithm this key signs with.
    fn algorithm(&self) -> SigningAlgorithm;

    /// Sign `message`, returning the algorithm-correct signature encoding.
    ///
    /// For EC algorithms this is the fixed-width `r ‖ s` concatenation, not
    /// ASN.1 DER.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;

    /// Public key material as a JSON Web Key.
    fn public_jwk(&self) -> Jwk;
}

/// JSON Web Key (public key only).
///
/// Field order within each variant is lexicographic so a serialization is
/// directly usable as RFC 7638 thumbprint input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Jwk {
    Ec {
        crv: String,
        kty: String,
        x: String,
        y: String,
    },
    Rsa {
        e: String,
        kty: String,
        n: String,
    },
}

/// Elliptic curve account/signing key (P-256 or P-384).
#[derive(Clone)]
pub struct EcKeyPair {
    inner: EcKeyPairInner,
}

#[derive(Clone)]
enum EcKeyPairInner {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl EcKeyPair {
    /// Generate a fresh P-256 key (the algorithm every ACME server must
    /// support).
    pub fn generate_p256() -> Self {
        let csprng = &mut rand::thread_rng();
        EcKeyPair {
            inner: EcKeyPairInner::P256(ecdsa::SigningKey::from(p256::SecretKey::random(csprng))),
        }
    }

    /// Generate a fresh P-384 key.
    pub fn generate_p384() -> Self {
        let csprng = &mut rand::thread_rng();
        EcKeyPair {
            inner: EcKeyPairInner::P384(ecdsa::SigningKey::from(p384::SecretKey::random(csprng))),
        }
    }

    /// Load a key from PKCS#8 PEM, accepting either supported curve.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(EcKeyPair {
                inner: EcKeyPairInner::P256(key),
            });
        }

        let key = p384::ecdsa::SigningKey::from_pkcs8_pem(pem)?;
        Ok(EcKeyPair {
            inner: EcKeyPairInner::P384(key),
        })
    }

    /// Export the private key as PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        let pem = match &self.inner {
            EcKeyPairInner::P256(key) => key.to_pkcs8_pem(pem::LineEnding::LF)?,
            EcKeyPairInner::P384(key) => key.to_pkcs8_pem(pem::LineEnding::LF)?,
        };
        Ok(pem)
    }
}

impl std::fmt::Debug for EcKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcKeyPair")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

impl Signer for EcKeyPair {
    fn algorithm(&self) -> SigningAlgorithm {
        match &self.inner {
            EcKeyPairInner::P256(_) => SigningAlgorithm::Es256,
            EcKeyPairInner::P384(_) => SigningAlgorithm::Es384,
        }
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.inner {
            EcKeyPairInner::P256(key) => {
                let signature: p256::ecdsa::Signature = key
                    .try_sign(message)
                    .map_err(|err| Error::Signing(err.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
            EcKeyPairInner::P384(key) => {
                let signature: p384::ecdsa::Signature = key
                    .try_sign(message)
                    .map_err(|err| Error::Signing(err.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    fn public_jwk(&self) -> Jwk {
        match &self.inner {
            EcKeyPairInner::P256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                Jwk::Ec {
                    crv: "P-256".to_owned(),
                    kty: "EC".to_owned(),
                    x: BASE64_URL_SAFE_NO_PAD.encode(point.x().unwrap()),
                    y: BASE64_URL_SAFE_NO_PAD.encode(point.y().unwrap()),
                }
            }
            EcKeyPairInner::P384(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                Jwk::Ec {
                    crv: "P-384".to_owned(),
                    kty: "EC".to_owned(),
                    x: BASE64_URL_SAFE_NO_PAD.encode(point.x().unwrap()),
                    y: BASE64_URL_SAFE_NO_PAD.encode(point.y().unwrap()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p256_signature_is_fixed_width() {
        let key = EcKeyPair::generate_p256();
        let sig = key.sign(b"some bytes").unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn p384_signature_is_fixed_width() {
        let key = EcKeyPair::generate_p384();
        let sig = key.sign(b"some bytes").unwrap();
        assert_eq!(sig.len(), 96);
    }

    #[test]
    fn jwk_fields_are_lexicographic() {
        let key = EcKeyPair::generate_p256();
        let json = serde_json::to_string(&key.public_jwk()).unwrap();

        let crv = json.find("\"crv\"").unwrap();
        let kty = json.find("\"kty\"").unwrap();
        let x = json.find("\"x\"").unwrap();
        let y = json.find("\"y\"").unwrap();
        assert!(crv < kty && kty < x && x < y);

        assert!(json.contains("\"crv\":\"P-256\""));
        assert!(json.contains("\"kty\":\"EC\""));
    }

    #[test]
    fn pem_round_trip_preserves_jwk() {
        let key = EcKeyPair::generate_p384();
        let pem = key.to_pkcs8_pem().unwrap();
        let restored = EcKeyPair::from_pkcs8_pem(&pem).unwrap();

        assert_eq!(restored.algorithm(), SigningAlgorithm::Es384);
        assert_eq!(restored.public_jwk(), key.public_jwk());
    }
}
