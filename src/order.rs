//! Order resource operations.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::prelude::{Engine as _, BASE64_URL_SAFE_NO_PAD};

use crate::{
    api,
    authz::AuthorizationContext,
    cert,
    context::SignMode,
    error::{Error, Result},
    AcmeContext,
};

/// Operations on one order.
///
/// Obtained from [`AcmeContext::new_order`] or [`AcmeContext::order`]. Holds
/// no resource state beyond the order URL; [`resource`](Self::resource)
/// always returns a fresh snapshot, and [`retry_after`](Self::retry_after)
/// is the CA's polling hint from the latest response. Polling cadence is the
/// caller's business.
#[derive(Debug)]
pub struct OrderContext<'c> {
    context: &'c AcmeContext,
    location: String,
    retry_after: AtomicU64,
}

impl<'c> OrderContext<'c> {
    pub(crate) fn new(context: &'c AcmeContext, location: String) -> Self {
        OrderContext {
            context,
            location,
            retry_after: AtomicU64::new(0),
        }
    }

    /// The order URL.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// `Retry-After` of the most recent response, in seconds. 0 when absent.
    pub fn retry_after(&self) -> u64 {
        self.retry_after.load(Ordering::Relaxed)
    }

    /// Fetches the current order resource.
    pub async fn resource(&self) -> Result<api::Order> {
        let response = self.context.post_as_get(&self.location).await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }

    /// Contexts for the order's authorizations, one per identifier.
    pub async fn authorizations(&self) -> Result<Vec<AuthorizationContext<'c>>> {
        let order = self.resource().await?;

        Ok(order
            .authorizations
            .unwrap_or_default()
            .into_iter()
            .map(|url| AuthorizationContext::new(self.context, url))
            .collect())
    }

    /// Submits a CSR for a `ready` order.
    ///
    /// The CA rejects finalization of orders in any other state; poll
    /// [`resource`](Self::resource) until `ready` first. The returned order
    /// is typically `processing` or `valid`.
    pub async fn finalize(&self, csr_der: &[u8]) -> Result<api::Order> {
        let order = self.resource().await?;
        let url = order
            .finalize
            .ok_or(Error::UnexpectedResponse("order has no finalize URL"))?;

        let payload = api::Finalize::new(BASE64_URL_SAFE_NO_PAD.encode(csr_der));

        let response = self
            .context
            .post_signed(&url, Some(&payload), SignMode::Kid)
            .await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }

    /// Downloads the issued certificate chain as PEM.
    ///
    /// Fails with [`Error::CertificateNotIssued`] until the order is `valid`
    /// and carries a certificate URL.
    ///
    /// When `preferred_chain` names an issuer common name that is not on
    /// the default chain, chains from `alternate` Link relations are tried;
    /// if none match either, the default chain is returned.
    pub async fn download(&self, preferred_chain: Option<&str>) -> Result<String> {
        let order = self.resource().await?;
        let url = order.certificate.ok_or(Error::CertificateNotIssued)?;

        let response = self
            .context
            .post_signed_raw::<()>(&url, None)
            .await?
            .ensure_success()?;

        let alternates: Vec<String> = response
            .links("alternate")
            .into_iter()
            .map(str::to_owned)
            .collect();
        let default_chain = response.into_resource()?;

        let Some(issuer_cn) = preferred_chain else {
            return Ok(default_chain);
        };

        if cert::chain_matches_issuer(&default_chain, issuer_cn)? {
            return Ok(default_chain);
        }

        for alternate_url in alternates {
            log::debug!("trying alternate chain at {alternate_url}");

            let alternate = self
                .context
                .post_signed_raw::<()>(&alternate_url, None)
                .await?
                .ensure_success()?
                .into_resource()?;

            if cert::chain_matches_issuer(&alternate, issuer_cn)? {
                return Ok(alternate);
            }
        }

        log::warn!("no chain issued by {issuer_cn}; returning default chain");
        Ok(default_chain)
    }
}
