//! Protocol session against a single CA directory.
//!
//! [`AcmeContext`] owns the account key, the cached directory, and the nonce
//! pool, and signs every outgoing request. Resource-specific operations hang
//! off the context types it hands out ([`AccountContext`], [`OrderContext`],
//! [`AuthorizationContext`]).

use std::{fmt, sync::Arc, time::Duration};

use base64::prelude::{Engine as _, BASE64_URL_SAFE_NO_PAD};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    acct::AccountContext,
    api,
    authz::AuthorizationContext,
    error::{Error, Result},
    jws::{self, Jws},
    key::Signer,
    order::OrderContext,
    trans::{AcmeResponse, Transport},
};

/// Ceiling on honored `Retry-After` delays, in seconds.
const MAX_RETRY_DELAY_SECS: u64 = 30;

/// Tuning knobs for an [`AcmeContext`].
#[derive(Debug, Clone)]
pub struct AcmeOptions {
    /// Known account URL, to skip discovery when resuming a session.
    pub account_uri: Option<String>,

    /// Times a request is re-signed and re-sent after a `badNonce` rejection.
    pub bad_nonce_retries: usize,

    /// Times a fetch is repeated after a rate-limit or unavailable response.
    pub get_retry_attempts: usize,

    /// Whether fetches honor `Retry-After` and retry at all.
    pub retry_on_get: bool,
}

impl Default for AcmeOptions {
    fn default() -> Self {
        AcmeOptions {
            account_uri: None,
            bad_nonce_retries: 1,
            get_retry_attempts: 3,
            retry_on_get: true,
        }
    }
}

/// Request parameters for a new order.
///
/// `not_before` and `not_after` are RFC 3339 timestamps. `replaces` carries
/// the ARI certificate ID being renewed; `profile` selects a CA certificate
/// profile when the directory advertises any.
#[derive(Debug, Clone, Default)]
pub struct OrderOptions {
    pub identifiers: Vec<api::Identifier>,
    pub not_before: Option<String>,
    pub not_after: Option<String>,
    pub replaces: Option<String>,
    pub profile: Option<String>,
}

/// CA-issued credentials binding a new ACME account to an external account.
///
/// See [RFC 8555 §7.3.4].
///
/// [RFC 8555 §7.3.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.3.4
#[derive(Clone)]
pub struct ExternalAccountKey {
    key_id: String,
    hmac_key: String,
}

impl ExternalAccountKey {
    /// `hmac_key` is the CA-issued MAC key, base64url-encoded.
    pub fn new(key_id: impl Into<String>, hmac_key: impl Into<String>) -> Self {
        ExternalAccountKey {
            key_id: key_id.into(),
            hmac_key: hmac_key.into(),
        }
    }
}

impl fmt::Debug for ExternalAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalAccountKey")
            .field("key_id", &self.key_id)
            .field("hmac_key", &"[redacted]")
            .finish()
    }
}

/// How a request is authenticated.
pub(crate) enum SignMode<'a> {
    /// Account key, `kid` header with the account URL. The normal mode.
    Kid,

    /// Account key, public JWK in the header. Used before an account URL
    /// exists (newAccount, discovery).
    Jwk,

    /// A caller-provided key with its JWK in the header. Used for revocation
    /// authenticated by the certificate key.
    Key(&'a dyn Signer),
}

enum DirectoryState {
    Unfetched,
    Fetched(Arc<api::Directory>),
    Failed,
}

/// A session with one ACME CA.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> acme::Result<()> {
/// use acme::{AcmeContext, EcKeyPair};
///
/// let context = AcmeContext::new(
///     "https://acme-v02.api.letsencrypt.org/directory",
///     EcKeyPair::generate_p256(),
/// );
///
/// let account = context
///     .new_account(vec!["mailto:admin@example.com".to_owned()], true, None)
///     .await?;
/// let order = context.new_dns_order(["example.com"]).await?;
/// # let _ = (account, order);
/// # Ok(())
/// # }
/// ```
pub struct AcmeContext {
    directory_url: String,
    options: AcmeOptions,
    transport: Transport,
    directory: RwLock<DirectoryState>,
    account_key: RwLock<Arc<dyn Signer>>,
    account_uri: RwLock<Option<String>>,
}

impl fmt::Debug for AcmeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcmeContext")
            .field("directory_url", &self.directory_url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AcmeContext {
    /// Creates a session with default options. No network traffic happens
    /// until the first operation.
    pub fn new(directory_url: impl Into<String>, account_key: impl Signer + 'static) -> Self {
        Self::with_options(directory_url, account_key, AcmeOptions::default())
    }

    pub fn with_options(
        directory_url: impl Into<String>,
        account_key: impl Signer + 'static,
        options: AcmeOptions,
    ) -> Self {
        AcmeContext {
            directory_url: directory_url.into(),
            account_uri: RwLock::new(options.account_uri.clone()),
            options,
            transport: Transport::new(),
            directory: RwLock::new(DirectoryState::Unfetched),
            account_key: RwLock::new(Arc::new(account_key)),
        }
    }

    /// The current account key. Changes after a successful [`change_key`].
    ///
    /// [`change_key`]: Self::change_key
    pub fn account_key(&self) -> Arc<dyn Signer> {
        Arc::clone(&self.account_key.read())
    }

    /// The directory, fetched and cached on first use.
    pub async fn directory(&self) -> Result<Arc<api::Directory>> {
        if let DirectoryState::Fetched(directory) = &*self.directory.read() {
            return Ok(Arc::clone(directory));
        }

        self.fetch_directory().await
    }

    /// Like [`directory`](Self::directory), but swallows failures. After a
    /// failed fetch this returns `None` without contacting the CA again;
    /// only `directory` retries.
    pub async fn try_directory(&self) -> Option<Arc<api::Directory>> {
        match &*self.directory.read() {
            DirectoryState::Fetched(directory) => return Some(Arc::clone(directory)),
            DirectoryState::Failed => return None,
            DirectoryState::Unfetched => {}
        }

        self.fetch_directory().await.ok()
    }

    async fn fetch_directory(&self) -> Result<Arc<api::Directory>> {
        log::debug!("fetching directory from {}", self.directory_url);

        let fetched = match self.get_with_retry::<api::Directory>(&self.directory_url).await {
            Ok(response) => response.into_resource(),
            Err(err) => Err(err),
        };

        match fetched {
            Ok(directory) => {
                let directory = Arc::new(directory);
                *self.directory.write() = DirectoryState::Fetched(Arc::clone(&directory));
                Ok(directory)
            }
            Err(err) => {
                *self.directory.write() = DirectoryState::Failed;
                Err(err)
            }
        }
    }

    /// Terms-of-service URL from the directory metadata, if the CA has one.
    pub async fn terms_of_service(&self) -> Option<String> {
        self.try_directory()
            .await?
            .meta
            .as_ref()?
            .terms_of_service
            .clone()
    }

    /// The existing account for this key, located via `onlyReturnExisting`
    /// discovery (or the URL given in [`AcmeOptions::account_uri`]).
    ///
    /// Fails with the CA's `accountDoesNotExist` problem when no account is
    /// registered for the key.
    pub async fn account(&self) -> Result<AccountContext<'_>> {
        let uri = self.account_uri().await?;
        Ok(AccountContext::new(self, uri))
    }

    /// Registers a new account for the current key.
    ///
    /// `contact` entries are URLs such as `mailto:admin@example.com`. CAs
    /// that require external account binding reject requests without
    /// `external_account`.
    pub async fn new_account(
        &self,
        contact: Vec<String>,
        terms_of_service_agreed: bool,
        external_account: Option<&ExternalAccountKey>,
    ) -> Result<AccountContext<'_>> {
        let directory = self.directory().await?;

        let external_account_binding = external_account
            .map(|eab| {
                jws::sign_eab(
                    &self.account_key().public_jwk(),
                    &eab.key_id,
                    &eab.hmac_key,
                    &directory.new_account,
                )
            })
            .transpose()?;

        let payload = api::Account {
            contact: Some(contact),
            terms_of_service_agreed: Some(terms_of_service_agreed),
            external_account_binding,
            ..api::Account::default()
        };

        let response: AcmeResponse<api::Account> = self
            .post_signed(&directory.new_account, Some(&payload), SignMode::Jwk)
            .await?;
        let response = response.ensure_success()?;

        let uri = response
            .location
            .clone()
            .ok_or(Error::MissingHeader("Location"))?;
        log::debug!("account registered at {uri}");
        *self.account_uri.write() = Some(uri.clone());

        Ok(AccountContext::new(self, uri))
    }

    /// Rolls the account over to `new_key`, per [RFC 8555 §7.3.5].
    ///
    /// The inner JWS is signed by the new key with its JWK in the header and
    /// no nonce; the outer request is signed by the current key. On success
    /// the context signs with `new_key` from then on.
    ///
    /// [RFC 8555 §7.3.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.3.5
    pub async fn change_key(&self, new_key: impl Signer + 'static) -> Result<()> {
        let directory = self.directory().await?;
        let account = self.account_uri().await?;

        let new_key: Arc<dyn Signer> = Arc::new(new_key);

        let payload = api::KeyChange {
            account,
            old_key: self.account_key().public_jwk(),
        };
        let inner = jws::sign(Some(&payload), &*new_key, &directory.key_change, None, None)?;

        let response: AcmeResponse<api::Account> = self
            .post_signed(&directory.key_change, Some(&inner), SignMode::Kid)
            .await?;
        response.ensure_success()?;

        log::debug!("account key rolled over");
        *self.account_key.write() = new_key;

        Ok(())
    }

    /// Places a new order.
    pub async fn new_order(&self, options: OrderOptions) -> Result<OrderContext<'_>> {
        let directory = self.directory().await?;

        let payload = api::Order {
            identifiers: options.identifiers,
            not_before: options.not_before,
            not_after: options.not_after,
            replaces: options.replaces,
            profile: options.profile,
            ..api::Order::default()
        };

        let response: AcmeResponse<api::Order> = self
            .post_signed(&directory.new_order, Some(&payload), SignMode::Kid)
            .await?;
        let response = response.ensure_success()?;

        let location = response
            .location
            .clone()
            .ok_or(Error::MissingHeader("Location"))?;
        log::debug!("order created at {location}");

        Ok(OrderContext::new(self, location))
    }

    /// Places an order for DNS identifiers with default parameters.
    pub async fn new_dns_order(
        &self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<OrderContext<'_>> {
        self.new_order(OrderOptions {
            identifiers: names.into_iter().map(api::Identifier::dns).collect(),
            ..OrderOptions::default()
        })
        .await
    }

    /// Context for an order at a known URL, without re-fetching it.
    pub fn order(&self, location: impl Into<String>) -> OrderContext<'_> {
        OrderContext::new(self, location.into())
    }

    /// Context for an authorization at a known URL.
    pub fn authorization(&self, location: impl Into<String>) -> AuthorizationContext<'_> {
        AuthorizationContext::new(self, location.into())
    }

    /// Revokes a certificate, given its DER encoding.
    ///
    /// With `certificate_key: None` the request is authenticated by the
    /// account; otherwise by the certificate's own key, which does not
    /// require an account.
    pub async fn revoke_certificate(
        &self,
        certificate_der: &[u8],
        reason: Option<api::RevocationReason>,
        certificate_key: Option<&dyn Signer>,
    ) -> Result<()> {
        let directory = self.directory().await?;

        let payload =
            api::Revocation::new(BASE64_URL_SAFE_NO_PAD.encode(certificate_der), reason);

        let mode = match certificate_key {
            Some(key) => SignMode::Key(key),
            None => SignMode::Kid,
        };

        let response: AcmeResponse<serde_json::Value> = self
            .post_signed(&directory.revoke_cert, Some(&payload), mode)
            .await?;
        response.ensure_success()?;

        Ok(())
    }

    /// Fetches the renewal window for a certificate, by ARI certificate ID.
    ///
    /// Returns `Ok(None)` when the CA does not advertise renewal info; that
    /// is not an error.
    pub async fn renewal_info(&self, certificate_id: &str) -> Result<Option<api::RenewalInfo>> {
        let directory = self.directory().await?;

        let Some(base) = &directory.renewal_info else {
            return Ok(None);
        };

        let url = format!("{}/{certificate_id}", base.trim_end_matches('/'));
        let response = self.get_with_retry::<api::RenewalInfo>(&url).await?;

        response.into_resource().map(Some)
    }

    /// Tells the CA a certificate has (or has not) been replaced, so it can
    /// stop suggesting its renewal.
    ///
    /// A no-op when the CA does not advertise renewal info. When it does,
    /// failures are surfaced.
    pub async fn update_renewal_info(&self, certificate_id: &str, replaced: bool) -> Result<()> {
        let directory = self.directory().await?;

        let Some(base) = &directory.renewal_info else {
            log::debug!("CA does not support renewal info; skipping update");
            return Ok(());
        };

        let payload = api::RenewalInfoUpdate {
            cert_id: certificate_id.to_owned(),
            replaced,
        };

        let response: AcmeResponse<serde_json::Value> =
            self.post_signed(base, Some(&payload), SignMode::Kid).await?;
        response.ensure_success()?;

        Ok(())
    }

    /// Pre-seeds the account URL, skipping discovery.
    pub fn set_account_uri(&self, uri: impl Into<String>) {
        *self.account_uri.write() = Some(uri.into());
    }

    /// Signs an arbitrary payload for a request to `url`, in kid mode with a
    /// fresh nonce.
    ///
    /// For flows that hand a signed envelope to something other than the CA,
    /// such as authority-token exchanges.
    pub async fn sign<T: Serialize>(&self, payload: &T, url: &str) -> Result<Jws> {
        let directory = self.directory().await?;
        let kid = self.account_uri().await?;
        let nonce = self.transport.consume_nonce(&directory.new_nonce).await?;

        self.sign_request(Some(payload), &SignMode::Kid, url, nonce, Some(&kid))
    }

    /// The account URL, discovering it from the CA on first use.
    pub(crate) async fn account_uri(&self) -> Result<String> {
        if let Some(uri) = self.account_uri.read().clone() {
            return Ok(uri);
        }

        log::debug!("discovering account URL");
        let directory = self.directory().await?;

        let payload = api::Account {
            only_return_existing: Some(true),
            ..api::Account::default()
        };

        let response: AcmeResponse<api::Account> = self
            .dispatch_signed(&directory.new_account, Some(&payload), &SignMode::Jwk, None)
            .await?;
        let response = response.ensure_success()?;

        let uri = response
            .location
            .clone()
            .ok_or(Error::MissingHeader("Location"))?;
        *self.account_uri.write() = Some(uri.clone());

        Ok(uri)
    }

    /// Signs and sends a request, resolving the account URL for kid-mode
    /// requests first.
    pub(crate) async fn post_signed<P, T>(
        &self,
        url: &str,
        payload: Option<&P>,
        mode: SignMode<'_>,
    ) -> Result<AcmeResponse<T>>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let kid = match mode {
            SignMode::Kid => Some(self.account_uri().await?),
            SignMode::Jwk | SignMode::Key(_) => None,
        };

        self.dispatch_signed(url, payload, &mode, kid.as_deref())
            .await
    }

    /// The send loop: consume a nonce, sign, POST; re-sign with a fresh
    /// nonce after a `badNonce` rejection up to
    /// [`AcmeOptions::bad_nonce_retries`] times.
    async fn dispatch_signed<P, T>(
        &self,
        url: &str,
        payload: Option<&P>,
        mode: &SignMode<'_>,
        kid: Option<&str>,
    ) -> Result<AcmeResponse<T>>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let directory = self.directory().await?;

        let mut retries = 0;
        loop {
            let nonce = self.transport.consume_nonce(&directory.new_nonce).await?;
            let jws = self.sign_request(payload, mode, url, nonce, kid)?;

            let response = self.transport.post(url, &jws).await?;

            if let Some(problem) = &response.error {
                if problem.is_bad_nonce() && retries < self.options.bad_nonce_retries {
                    retries += 1;
                    log::debug!("nonce rejected, re-signing (attempt {retries})");
                    continue;
                }
            }

            return Ok(response);
        }
    }

    /// [`post_signed`](Self::post_signed) for responses read verbatim
    /// (certificate downloads).
    pub(crate) async fn post_signed_raw<P>(
        &self,
        url: &str,
        payload: Option<&P>,
    ) -> Result<AcmeResponse<String>>
    where
        P: Serialize + ?Sized,
    {
        let directory = self.directory().await?;
        let kid = self.account_uri().await?;

        let mut retries = 0;
        loop {
            let nonce = self.transport.consume_nonce(&directory.new_nonce).await?;
            let jws = self.sign_request(payload, &SignMode::Kid, url, nonce, Some(&kid))?;

            let response = self.transport.post_raw(url, &jws).await?;

            if let Some(problem) = &response.error {
                if problem.is_bad_nonce() && retries < self.options.bad_nonce_retries {
                    retries += 1;
                    log::debug!("nonce rejected, re-signing (attempt {retries})");
                    continue;
                }
            }

            return Ok(response);
        }
    }

    /// POST-as-GET fetch of a resource, retrying rate-limited and
    /// unavailable responses per [`AcmeOptions`].
    pub(crate) async fn post_as_get<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<AcmeResponse<T>> {
        let mut attempt = 0;
        loop {
            let response = self.post_signed::<(), T>(url, None, SignMode::Kid).await?;

            if self.should_retry_fetch(&response, attempt) {
                attempt += 1;
                self.back_off(url, response.retry_after).await;
                continue;
            }

            return Ok(response);
        }
    }

    /// Unsigned GET with the same retry policy as [`post_as_get`], plus
    /// connectivity failures: a transport error consumes an attempt and the
    /// fetch is repeated until the budget runs out, surfacing only the final
    /// failure.
    ///
    /// [`post_as_get`]: Self::post_as_get
    async fn get_with_retry<T: DeserializeOwned>(&self, url: &str) -> Result<AcmeResponse<T>> {
        let mut attempt = 0;
        loop {
            let response = match self.transport.get(url).await {
                Ok(response) => response,
                Err(Error::Transport(err)) if self.fetch_retries_left(attempt) => {
                    attempt += 1;
                    log::debug!("fetch of {url} failed ({err}), retrying");
                    self.back_off(url, 0).await;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if self.should_retry_fetch(&response, attempt) {
                attempt += 1;
                self.back_off(url, response.retry_after).await;
                continue;
            }

            return Ok(response);
        }
    }

    fn fetch_retries_left(&self, attempt: usize) -> bool {
        self.options.retry_on_get && attempt < self.options.get_retry_attempts
    }

    fn should_retry_fetch<T>(&self, response: &AcmeResponse<T>, attempt: usize) -> bool {
        if !self.fetch_retries_left(attempt) {
            return false;
        }

        match &response.error {
            Some(problem) => problem.is_rate_limited() || problem.status == Some(503),
            None => false,
        }
    }

    async fn back_off(&self, url: &str, retry_after: u64) {
        let delay = retry_after.clamp(1, MAX_RETRY_DELAY_SECS);
        log::debug!("retrying {url} in {delay}s");
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }

    fn sign_request<P>(
        &self,
        payload: Option<&P>,
        mode: &SignMode<'_>,
        url: &str,
        nonce: String,
        kid: Option<&str>,
    ) -> Result<Jws>
    where
        P: Serialize + ?Sized,
    {
        match mode {
            SignMode::Key(key) => jws::sign(payload, *key, url, Some(nonce), None),
            SignMode::Jwk => jws::sign(payload, &*self.account_key(), url, Some(nonce), None),
            SignMode::Kid => jws::sign(payload, &*self.account_key(), url, Some(nonce), kid),
        }
    }
}
