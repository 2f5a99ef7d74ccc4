//! Account resource operations.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{api, context::SignMode, error::Result, order::OrderContext, AcmeContext};

/// Operations on an existing account.
///
/// Obtained from [`AcmeContext::account`] or [`AcmeContext::new_account`].
/// Holds no resource state beyond the account URL; every call asks the CA.
#[derive(Debug)]
pub struct AccountContext<'c> {
    context: &'c AcmeContext,
    location: String,
    retry_after: AtomicU64,
}

impl<'c> AccountContext<'c> {
    pub(crate) fn new(context: &'c AcmeContext, location: String) -> Self {
        AccountContext {
            context,
            location,
            retry_after: AtomicU64::new(0),
        }
    }

    /// The account URL, used as the `kid` of every signed request.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// `Retry-After` of the most recent response, in seconds. 0 when absent.
    pub fn retry_after(&self) -> u64 {
        self.retry_after.load(Ordering::Relaxed)
    }

    /// Fetches the current account resource.
    pub async fn resource(&self) -> Result<api::Account> {
        let response = self.context.post_as_get(&self.location).await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }

    /// Contexts for the account's existing orders, from its orders list.
    ///
    /// Follows `next` Link relations, so all pages are collected. Empty when
    /// the CA reports no orders URL for the account.
    pub async fn orders(&self) -> Result<Vec<OrderContext<'c>>> {
        let account = self.resource().await?;

        let Some(mut url) = account.orders else {
            return Ok(Vec::new());
        };

        let mut contexts = Vec::new();
        loop {
            let response = self.context.post_as_get::<api::OrderList>(&url).await?;
            let next = response.links("next").first().map(|next| (*next).to_owned());

            let list = response.into_resource()?;
            contexts.extend(
                list.orders
                    .into_iter()
                    .map(|order_url| OrderContext::new(self.context, order_url)),
            );

            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(contexts)
    }

    /// Replaces the account's contact list.
    pub async fn update(&self, contact: Vec<String>) -> Result<api::Account> {
        let payload = api::Account {
            contact: Some(contact),
            ..api::Account::default()
        };

        let response = self
            .context
            .post_signed(&self.location, Some(&payload), SignMode::Kid)
            .await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }

    /// Deactivates the account. Irreversible; the CA rejects all further
    /// requests authenticated by it.
    pub async fn deactivate(&self) -> Result<api::Account> {
        let payload = api::Deactivate::new();

        let response = self
            .context
            .post_signed(&self.location, Some(&payload), SignMode::Kid)
            .await?;
        self.retry_after.store(response.retry_after, Ordering::Relaxed);
        response.into_resource()
    }
}
