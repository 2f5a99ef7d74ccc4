//! Client engine for ACME (Automatic Certificate Management Environment)
//! providers such as [Let's Encrypt](https://letsencrypt.org/).
//!
//! Implements the [RFC 8555](https://datatracker.ietf.org/doc/html/rfc8555)
//! protocol flows: account registration and key rollover, order placement,
//! authorization and challenge handling, finalization, certificate download
//! with alternate-chain selection, and revocation. Renewal timing hints from
//! the [ACME Renewal Information][ari] extension are supported when the CA
//! advertises them, as are external account binding and the authority-token
//! challenge fields used for telephony identifiers.
//!
//! This crate is the protocol layer only. It does not solve challenges,
//! build CSRs, or schedule renewals; it gives the calling application exact
//! control over those while taking care of signing, nonces, retries, and
//! resource state.
//!
//! # Usage
//!
//! Everything starts from an [`AcmeContext`], constructed with a directory
//! URL and an account key:
//!
//! ```no_run
//! use acme::{AcmeContext, EcKeyPair};
//!
//! # async fn demo() -> acme::Result<()> {
//! let ca = AcmeContext::new(
//!     "https://acme-staging-v02.api.letsencrypt.org/directory",
//!     EcKeyPair::generate_p256(),
//! );
//!
//! ca.new_account(vec!["mailto:admin@example.org".to_owned()], true, None)
//!     .await?;
//!
//! let order = ca.new_dns_order(["example.org"]).await?;
//!
//! for authz in order.authorizations().await? {
//!     for challenge in authz.challenges().await? {
//!         // provision the challenge response, then:
//!         challenge.validate().await?;
//!     }
//! }
//!
//! // poll order.resource() until ready, then finalize and download
//! # Ok(())
//! # }
//! ```
//!
//! # Rate Limits
//!
//! Public CAs enforce [rate limits]. Responses that advertise a
//! `Retry-After` delay are surfaced through the resource contexts so polling
//! loops can honor them; fetches of rate-limited resources are retried a
//! bounded number of times (see [`AcmeOptions`]). Use the staging
//! environment for development.
//!
//! [ari]: https://datatracker.ietf.org/doc/html/draft-ietf-acme-ari-04
//! [rate limits]: https://letsencrypt.org/docs/rate-limits

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod acct;
mod authz;
mod cert;
mod context;
mod error;
mod jws;
mod key;
mod order;
mod trans;

pub mod api;

#[cfg(test)]
mod test;

pub use crate::{
    acct::AccountContext,
    authz::{AuthorizationContext, ChallengeContext},
    context::{AcmeContext, AcmeOptions, ExternalAccountKey, OrderOptions},
    error::{Error, Result},
    jws::Jws,
    key::{EcKeyPair, Jwk, Signer, SigningAlgorithm},
    order::OrderContext,
};
