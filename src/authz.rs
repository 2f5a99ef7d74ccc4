//! Authorization and challenge resource operations.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{api, context::SignMode, error::Result, AcmeContext};

/// Operations on one authorization.
///
/// Obtained from [`OrderContext::authorizations`] or
/// [`AcmeContext::authorization`].
///
/// [`OrderContext::authorizations`]: crate::OrderContext::authorizations
#[derive(Debug)]
pub struct AuthorizationContext<'c> {
    context: &'c AcmeContext,
    location: String,
    retry_after: AtomicU64,
}

impl<'c> AuthorizationContext<'c> {
    pub(crate) fn new(context: &'c AcmeContext, location: String) -> Self {
        AuthorizationContext {
            context,
            location,
            retry_after: AtomicU64::new(0),
        }
    }

    /// The authorization URL.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// `Retry-After` of the most recent response, in seconds. 0 when absent.
    pub fn retry_after(&self) -> u64 {
        self.retry_after.load(Ordering::Relaxed)
    }

    /// Fetches the current authorization resource.
    pub async fn resource(&self) -> Result<api::Authorization> {
        let response = self.context.post_as_get(&self.location).await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }

    /// Contexts for the authorization's challenges. Satisfying any one of
    /// them validates the authorization.
    pub async fn challenges(&self) -> Result<Vec<ChallengeContext<'c>>> {
        let authorization = self.resource().await?;

        Ok(authorization
            .challenges
            .into_iter()
            .map(|challenge| ChallengeContext::new(self.context, challenge))
            .collect())
    }

    /// Deactivates a pending authorization, releasing the identifier without
    /// validating it.
    pub async fn deactivate(&self) -> Result<api::Authorization> {
        let payload = api::Deactivate::new();

        let response = self
            .context
            .post_signed(&self.location, Some(&payload), SignMode::Kid)
            .await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }
}

/// Operations on one challenge.
///
/// Carries the challenge snapshot it was created from, so the type and token
/// are available without another round trip; [`resource`](Self::resource)
/// re-fetches.
#[derive(Debug)]
pub struct ChallengeContext<'c> {
    context: &'c AcmeContext,
    challenge: api::Challenge,
    retry_after: AtomicU64,
}

impl<'c> ChallengeContext<'c> {
    pub(crate) fn new(context: &'c AcmeContext, challenge: api::Challenge) -> Self {
        ChallengeContext {
            context,
            challenge,
            retry_after: AtomicU64::new(0),
        }
    }

    /// The challenge URL.
    pub fn location(&self) -> &str {
        &self.challenge.url
    }

    pub fn challenge_type(&self) -> &api::ChallengeType {
        &self.challenge._type
    }

    /// The challenge token, absent on authority-token challenges.
    pub fn token(&self) -> Option<&str> {
        self.challenge.token.as_deref()
    }

    /// `Retry-After` of the most recent response, in seconds. 0 when absent.
    pub fn retry_after(&self) -> u64 {
        self.retry_after.load(Ordering::Relaxed)
    }

    /// Fetches the current challenge resource.
    pub async fn resource(&self) -> Result<api::Challenge> {
        let response = self.context.post_as_get(&self.challenge.url).await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }

    /// Tells the CA the challenge response is in place and validation may
    /// begin. The response provisioning itself (file, DNS record, ALPN
    /// certificate) must already be done.
    pub async fn validate(&self) -> Result<api::Challenge> {
        let response = self
            .context
            .post_signed(&self.challenge.url, Some(&api::EmptyObject), SignMode::Kid)
            .await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }
}
