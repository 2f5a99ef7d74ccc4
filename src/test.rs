//! In-process mock CA used by the protocol tests.

use std::{
    convert::Infallible,
    future::ready,
    net::TcpListener,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, OnceLock,
    },
};

use actix_http::{
    header::{HeaderName, HeaderValue},
    HttpService, Method, Request, Response, StatusCode,
};
use actix_server::{Server, ServerHandle};
use actix_web::body::BoxBody;
use base64::prelude::{Engine as _, BASE64_URL_SAFE_NO_PAD};
use regex::Regex;

use crate::{api, AcmeContext, AcmeOptions, EcKeyPair, Error, Signer, SigningAlgorithm};

static RE_URL: OnceLock<Regex> = OnceLock::new();

fn re_url() -> &'static Regex {
    RE_URL.get_or_init(|| Regex::new("<URL>").unwrap())
}

/// Per-server counters driving the misbehaving endpoints.
#[derive(Debug, Default)]
struct ServerState {
    nonce: AtomicUsize,
    flaky_orders: AtomicUsize,
    limited_hits: AtomicUsize,
}

pub(crate) struct TestServer {
    pub url: String,
    pub dir_url: String,
    pub ari_dir_url: String,
    pub flaky_dir_url: String,
    pub limited_dir_url: String,
    handle: ServerHandle,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        drop(self.handle.stop(false));
    }
}

fn json(status: StatusCode, body: impl Into<String>) -> Response<BoxBody> {
    Response::build(status)
        .insert_header(("Content-Type", "application/json"))
        .body(body.into())
        .map_into_boxed_body()
}

fn problem(status: StatusCode, body: &str) -> Response<BoxBody> {
    Response::build(status)
        .insert_header(("Content-Type", "application/problem+json"))
        .body(body.to_owned())
        .map_into_boxed_body()
}

fn get_directory(url: &str, renewal_info: bool) -> Response<BoxBody> {
    const BODY: &str = r#"{
    "newNonce": "<URL>/acme/new-nonce",
    "newAccount": "<URL>/acme/new-acct",
    "newOrder": "<URL>/acme/new-order",
    "revokeCert": "<URL>/acme/revoke-cert",
    "keyChange": "<URL>/acme/key-change",
    "meta": {
        "termsOfService": "<URL>/terms.pdf",
        "caaIdentities": ["testdir.org"]
    }
    }"#;

    const BODY_ARI: &str = r#"{
    "newNonce": "<URL>/acme/new-nonce",
    "newAccount": "<URL>/acme/new-acct",
    "newOrder": "<URL>/acme/new-order",
    "revokeCert": "<URL>/acme/revoke-cert",
    "keyChange": "<URL>/acme/key-change",
    "renewalInfo": "<URL>/acme/renewal-info",
    "meta": {
        "termsOfService": "<URL>/terms.pdf",
        "caaIdentities": ["testdir.org"],
        "profiles": {
            "classic": "standard 90 day profile",
            "shortlived": "6 day profile"
        }
    }
    }"#;

    let body = if renewal_info { BODY_ARI } else { BODY };
    json(StatusCode::OK, re_url().replace_all(body, url))
}

/// Flaky variant: orders go to an endpoint that rejects its first request
/// with `badNonce`.
fn get_flaky_directory(url: &str) -> Response<BoxBody> {
    const BODY: &str = r#"{
    "newNonce": "<URL>/acme/new-nonce",
    "newAccount": "<URL>/acme/new-acct",
    "newOrder": "<URL>/acme/flaky/new-order",
    "revokeCert": "<URL>/acme/revoke-cert",
    "keyChange": "<URL>/acme/key-change"
    }"#;

    json(StatusCode::OK, re_url().replace_all(BODY, url))
}

fn get_limited_directory(url: &str, state: &ServerState) -> Response<BoxBody> {
    if state.limited_hits.fetch_add(1, Ordering::SeqCst) < 2 {
        return Response::build(StatusCode::TOO_MANY_REQUESTS)
            .insert_header(("Content-Type", "text/html"))
            .insert_header(("Retry-After", "1"))
            .body("<html><body>too many requests</body></html>".to_owned())
            .map_into_boxed_body();
    }

    get_directory(url, false)
}

fn head_new_nonce() -> Response<BoxBody> {
    // nonce attached to every response centrally
    Response::build(StatusCode::NO_CONTENT)
        .finish()
        .map_into_boxed_body()
}

fn account_body(url: &str) -> String {
    const BODY: &str = r#"{
    "status": "valid",
    "contact": ["mailto:admin@example.org"],
    "termsOfServiceAgreed": true,
    "orders": "<URL>/acme/acct/1/orders"
    }"#;

    re_url().replace_all(BODY, url).into_owned()
}

fn post_new_acct(url: &str) -> Response<BoxBody> {
    let location = re_url().replace_all("<URL>/acme/acct/1", url).into_owned();

    Response::build(StatusCode::CREATED)
        .insert_header(("Content-Type", "application/json"))
        .insert_header(("Location", location))
        .body(account_body(url))
        .map_into_boxed_body()
}

fn post_acct(url: &str) -> Response<BoxBody> {
    json(StatusCode::OK, account_body(url))
}

/// Orders list, split over two pages joined by a `next` Link relation.
fn post_orders_list(req: &Request, url: &str) -> Response<BoxBody> {
    const FIRST_PAGE: &str = r#"{
    "orders": [
        "<URL>/acme/order/1",
        "<URL>/acme/order/2"
    ]
    }"#;

    const LAST_PAGE: &str = r#"{
    "orders": [
        "<URL>/acme/order/3"
    ]
    }"#;

    if req.uri().query().is_some() {
        return json(StatusCode::OK, re_url().replace_all(LAST_PAGE, url));
    }

    let next = re_url()
        .replace_all(r#"<<URL>/acme/acct/1/orders?cursor=2>;rel="next""#, url)
        .into_owned();

    Response::build(StatusCode::OK)
        .insert_header(("Content-Type", "application/json"))
        .insert_header(("Link", next))
        .body(re_url().replace_all(FIRST_PAGE, url).into_owned())
        .map_into_boxed_body()
}

fn order_body(url: &str, status: &str, certificate: bool) -> String {
    const BODY: &str = r#"{
    "status": "<STATUS>",
    "expires": "2026-09-09T08:26:43Z",
    "identifiers": [
        { "type": "dns", "value": "example.org" }
    ],
    "authorizations": ["<URL>/acme/authz/1"],
    "finalize": "<URL>/acme/finalize/1"<CERT>
    }"#;

    let cert = if certificate {
        r#",
    "certificate": "<URL>/acme/cert/1""#
    } else {
        ""
    };

    re_url()
        .replace_all(&BODY.replace("<STATUS>", status).replace("<CERT>", cert), url)
        .into_owned()
}

fn post_new_order(url: &str) -> Response<BoxBody> {
    let location = re_url().replace_all("<URL>/acme/order/1", url).into_owned();

    Response::build(StatusCode::CREATED)
        .insert_header(("Content-Type", "application/json"))
        .insert_header(("Location", location))
        .body(order_body(url, "pending", false))
        .map_into_boxed_body()
}

fn post_flaky_new_order(url: &str, state: &ServerState) -> Response<BoxBody> {
    if state.flaky_orders.fetch_add(1, Ordering::SeqCst) == 0 {
        return problem(
            StatusCode::BAD_REQUEST,
            r#"{"type":"urn:ietf:params:acme:error:badNonce","detail":"stale nonce"}"#,
        );
    }

    post_new_order(url)
}

fn post_get_order(url: &str) -> Response<BoxBody> {
    json(StatusCode::OK, order_body(url, "valid", true))
}

fn post_finalize(url: &str) -> Response<BoxBody> {
    json(StatusCode::OK, order_body(url, "processing", false))
}

fn post_authz(url: &str) -> Response<BoxBody> {
    const BODY: &str = r#"{
    "identifier": { "type": "dns", "value": "example.org" },
    "status": "pending",
    "expires": "2026-09-09T08:26:43Z",
    "challenges": [
        {
            "type": "http-01",
            "status": "pending",
            "url": "<URL>/acme/challenge/1",
            "token": "MUi-gqeOJdRkSb_YR2eaMxQBqf6al8dgt_dOttSWb0w"
        },
        {
            "type": "dns-01",
            "status": "pending",
            "url": "<URL>/acme/challenge/2",
            "token": "RRo2ZcXAEqxKvMH8RGcATjSK1KknLEUmauwfQ5i3gG8"
        },
        {
            "type": "tkauth-01",
            "tkauth-type": "atc",
            "token-authority": "https://authority.example.org/authz",
            "status": "pending",
            "url": "<URL>/acme/challenge/3"
        }
    ]
    }"#;

    json(StatusCode::OK, re_url().replace_all(BODY, url))
}

fn post_challenge(url: &str) -> Response<BoxBody> {
    const BODY: &str = r#"{
    "type": "http-01",
    "status": "processing",
    "url": "<URL>/acme/challenge/1",
    "token": "MUi-gqeOJdRkSb_YR2eaMxQBqf6al8dgt_dOttSWb0w"
    }"#;

    json(StatusCode::OK, re_url().replace_all(BODY, url))
}

fn post_certificate(url: &str) -> Response<BoxBody> {
    let alternate = re_url()
        .replace_all(r#"<<URL>/acme/cert/1/alt>;rel="alternate""#, url)
        .into_owned();

    Response::build(StatusCode::OK)
        .insert_header(("Content-Type", "application/pem-certificate-chain"))
        .insert_header(("Link", alternate))
        .body("TEST DEFAULT CHAIN".to_owned())
        .map_into_boxed_body()
}

fn post_alternate_certificate() -> Response<BoxBody> {
    Response::build(StatusCode::OK)
        .insert_header(("Content-Type", "application/pem-certificate-chain"))
        .body("TEST ALTERNATE CHAIN".to_owned())
        .map_into_boxed_body()
}

fn get_renewal_info() -> Response<BoxBody> {
    const BODY: &str = r#"{
    "suggestedWindow": {
        "start": "2026-09-01T00:00:00Z",
        "end": "2026-09-08T00:00:00Z"
    },
    "explanationURL": "https://ca.example.org/docs/ari"
    }"#;

    Response::build(StatusCode::OK)
        .insert_header(("Content-Type", "application/json"))
        .insert_header(("Retry-After", "21600"))
        .body(BODY.to_owned())
        .map_into_boxed_body()
}

fn route_request(req: Request, url: &str, state: &ServerState) -> Response<BoxBody> {
    match (req.method(), req.path()) {
        (&Method::GET, "/directory") => get_directory(url, false),
        (&Method::GET, "/directory-ari") => get_directory(url, true),
        (&Method::GET, "/directory-flaky") => get_flaky_directory(url),
        (&Method::GET, "/directory-limited") => get_limited_directory(url, state),

        (&Method::HEAD, "/acme/new-nonce") => head_new_nonce(),

        (&Method::POST, "/acme/new-acct") => post_new_acct(url),
        (&Method::POST, "/acme/acct/1") => post_acct(url),
        (&Method::POST, "/acme/acct/1/orders") => post_orders_list(&req, url),
        (&Method::POST, "/acme/key-change") => post_acct(url),

        (&Method::POST, "/acme/new-order") => post_new_order(url),
        (&Method::POST, "/acme/flaky/new-order") => post_flaky_new_order(url, state),
        (&Method::POST, "/acme/order/1") => post_get_order(url),
        (&Method::POST, "/acme/finalize/1") => post_finalize(url),

        (&Method::POST, "/acme/authz/1") => post_authz(url),
        (&Method::POST, "/acme/challenge/1" | "/acme/challenge/2" | "/acme/challenge/3") => {
            post_challenge(url)
        }

        (&Method::POST, "/acme/cert/1") => post_certificate(url),
        (&Method::POST, "/acme/cert/1/alt") => post_alternate_certificate(),

        (&Method::POST, "/acme/revoke-cert") => {
            Response::build(StatusCode::OK).finish().map_into_boxed_body()
        }

        (&Method::GET, path) if path.starts_with("/acme/renewal-info/") => get_renewal_info(),
        (&Method::POST, "/acme/renewal-info") => {
            Response::build(StatusCode::OK).finish().map_into_boxed_body()
        }

        (_, _) => Response::build(StatusCode::NOT_FOUND).finish().map_into_boxed_body(),
    }
}

pub(crate) fn with_directory_server() -> TestServer {
    let _ = env_logger::builder().is_test(true).try_init();

    let lst = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = lst.local_addr().unwrap().port();

    let url = format!("http://127.0.0.1:{port}");
    let state = Arc::new(ServerState::default());

    let server = Server::build()
        .listen("acme", lst, {
            let url = url.clone();

            move || {
                let url = url.clone();
                let state = Arc::clone(&state);

                HttpService::build()
                    .finish(move |req| {
                        let mut res = route_request(req, &url, &state);

                        let nonce = state.nonce.fetch_add(1, Ordering::SeqCst);
                        res.headers_mut().insert(
                            HeaderName::from_static("replay-nonce"),
                            HeaderValue::from_str(&format!("test-nonce-{nonce}")).unwrap(),
                        );

                        ready(Ok::<_, Infallible>(res))
                    })
                    .tcp()
            }
        })
        .unwrap()
        .workers(1)
        .run();

    let handle = server.handle();

    tokio::spawn(server);

    TestServer {
        dir_url: format!("{url}/directory"),
        ari_dir_url: format!("{url}/directory-ari"),
        flaky_dir_url: format!("{url}/directory-flaky"),
        limited_dir_url: format!("{url}/directory-limited"),
        url,
        handle,
    }
}

fn test_context(dir_url: &str) -> AcmeContext {
    AcmeContext::new(dir_url, EcKeyPair::generate_p256())
}

#[tokio::test]
async fn serves_directory() {
    let server = with_directory_server();
    let res = reqwest::get(&server.dir_url).await.unwrap();
    assert!(res.status().is_success());
}

#[tokio::test]
async fn fetches_and_caches_directory() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let directory = ca.directory().await.unwrap();
    assert!(directory.new_nonce.ends_with("/acme/new-nonce"));
    assert!(!directory.supports_renewal_info());

    // second call answers from cache
    let again = ca.directory().await.unwrap();
    assert!(Arc::ptr_eq(&directory, &again));

    assert!(ca.try_directory().await.is_some());
}

#[tokio::test]
async fn terms_of_service_from_meta() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let tos = ca.terms_of_service().await.unwrap();
    assert!(tos.ends_with("/terms.pdf"));
}

#[tokio::test]
async fn registers_account() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let account = ca
        .new_account(vec!["mailto:admin@example.org".to_owned()], true, None)
        .await
        .unwrap();

    assert!(account.location().ends_with("/acme/acct/1"));

    let resource = account.resource().await.unwrap();
    assert!(resource.is_status_valid());
}

#[tokio::test]
async fn discovers_existing_account() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let account = ca.account().await.unwrap();
    assert!(account.location().ends_with("/acme/acct/1"));
}

#[tokio::test]
async fn updates_account_contact() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let account = ca.account().await.unwrap();
    let resource = account
        .update(vec!["mailto:new-admin@example.org".to_owned()])
        .await
        .unwrap();
    assert!(resource.is_status_valid());
}

#[tokio::test]
async fn walks_order_authorizations_and_challenges() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let order = ca.new_dns_order(["example.org"]).await.unwrap();
    assert!(order.location().ends_with("/acme/order/1"));

    let authorizations = order.authorizations().await.unwrap();
    assert_eq!(authorizations.len(), 1);

    let challenges = authorizations[0].challenges().await.unwrap();
    assert_eq!(challenges.len(), 3);

    let http = challenges
        .iter()
        .find(|c| c.challenge_type() == &api::ChallengeType::Http01)
        .unwrap();
    assert!(http.token().is_some());

    let tkauth = challenges
        .iter()
        .find(|c| c.challenge_type() == &api::ChallengeType::Tkauth01)
        .unwrap();
    assert!(tkauth.token().is_none());

    let resource = tkauth.resource().await.unwrap();
    assert_eq!(resource.status, api::ChallengeStatus::Processing);
}

#[tokio::test]
async fn authorization_carries_tkauth_fields() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let authz = ca.authorization(format!("{}/acme/authz/1", server.url));
    let resource = authz.resource().await.unwrap();

    let challenge = resource.challenge(&api::ChallengeType::Tkauth01).unwrap();
    assert_eq!(challenge.tkauth_type.as_deref(), Some("atc"));
    assert_eq!(
        challenge.token_authority.as_deref(),
        Some("https://authority.example.org/authz")
    );
}

#[tokio::test]
async fn validates_challenge() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let order = ca.new_dns_order(["example.org"]).await.unwrap();
    let authorizations = order.authorizations().await.unwrap();
    let challenges = authorizations[0].challenges().await.unwrap();

    let challenge = challenges[0].validate().await.unwrap();
    assert_eq!(challenge.status, api::ChallengeStatus::Processing);
}

#[tokio::test]
async fn finalizes_order() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let order = ca.order(format!("{}/acme/order/1", server.url));
    let resource = order.finalize(b"fake der csr").await.unwrap();
    assert!(resource.is_status_processing());
}

#[tokio::test]
async fn downloads_certificate_chain() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let order = ca.order(format!("{}/acme/order/1", server.url));
    let chain = order.download(None).await.unwrap();
    assert_eq!(chain, "TEST DEFAULT CHAIN");
}

#[tokio::test]
async fn download_without_matching_chain_falls_back_to_default() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    // neither chain parses as PEM, so no issuer matches and the default wins
    let order = ca.order(format!("{}/acme/order/1", server.url));
    let chain = order.download(Some("Preferred Root CA")).await.unwrap();
    assert_eq!(chain, "TEST DEFAULT CHAIN");
}

#[tokio::test]
async fn signs_external_payloads_in_kid_mode() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let jws = ca
        .sign(
            &serde_json::json!({ "atc": "sha256-fingerprint" }),
            "https://authority.example.org/exchange",
        )
        .await
        .unwrap();

    let header: serde_json::Value =
        serde_json::from_slice(&BASE64_URL_SAFE_NO_PAD.decode(jws.protected()).unwrap()).unwrap();

    assert!(header["kid"].as_str().unwrap().ends_with("/acme/acct/1"));
    assert!(header.get("jwk").is_none());
    assert_eq!(
        header["url"].as_str(),
        Some("https://authority.example.org/exchange")
    );
}

#[tokio::test]
async fn rolls_over_account_key() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    assert_eq!(ca.account_key().algorithm(), SigningAlgorithm::Es256);

    ca.change_key(EcKeyPair::generate_p384()).await.unwrap();
    assert_eq!(ca.account_key().algorithm(), SigningAlgorithm::Es384);
}

#[tokio::test]
async fn revokes_certificate() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    // account-key mode
    ca.revoke_certificate(b"fake der", Some(api::RevocationReason::Superseded), None)
        .await
        .unwrap();

    // certificate-key mode requires no account
    let certificate_key = EcKeyPair::generate_p256();
    ca.revoke_certificate(b"fake der", None, Some(&certificate_key as &dyn Signer))
        .await
        .unwrap();
}

#[tokio::test]
async fn renewal_info_absent_from_directory_is_none() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let info = ca.renewal_info("aYhba4dGQEHhs3uEe6CuLN4ByNQ.AIdlQyE").await;
    assert!(info.unwrap().is_none());

    // update is a no-op, not an error
    ca.update_renewal_info("aYhba4dGQEHhs3uEe6CuLN4ByNQ.AIdlQyE", true)
        .await
        .unwrap();
}

#[tokio::test]
async fn renewal_info_round_trip() {
    let server = with_directory_server();
    let ca = test_context(&server.ari_dir_url);

    let directory = ca.directory().await.unwrap();
    assert!(directory.supports_renewal_info());
    assert!(directory
        .meta
        .as_ref()
        .unwrap()
        .profiles
        .as_ref()
        .unwrap()
        .contains_key("shortlived"));

    let info = ca
        .renewal_info("aYhba4dGQEHhs3uEe6CuLN4ByNQ.AIdlQyE")
        .await
        .unwrap()
        .unwrap();
    assert!(info.suggested_window.start.is_some());
    assert!(info.explanation_url.is_some());

    ca.update_renewal_info("aYhba4dGQEHhs3uEe6CuLN4ByNQ.AIdlQyE", true)
        .await
        .unwrap();
}

#[tokio::test]
async fn bad_nonce_rejection_is_retried() {
    let server = with_directory_server();
    let ca = test_context(&server.flaky_dir_url);

    // first order request is rejected with badNonce, the re-signed one lands
    let order = ca.new_dns_order(["example.org"]).await.unwrap();
    assert!(order.location().ends_with("/acme/order/1"));
}

#[tokio::test]
async fn bad_nonce_retry_can_be_disabled() {
    let server = with_directory_server();
    let ca = AcmeContext::with_options(
        &server.flaky_dir_url,
        EcKeyPair::generate_p256(),
        AcmeOptions {
            bad_nonce_retries: 0,
            ..AcmeOptions::default()
        },
    );

    let err = ca.new_dns_order(["example.org"]).await.unwrap_err();
    match err {
        Error::Acme(problem) => assert!(problem.is_bad_nonce()),
        other => panic!("expected CA problem, got {other:?}"),
    }
}

#[tokio::test]
async fn lists_account_orders_across_pages() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let account = ca.account().await.unwrap();
    let orders = account.orders().await.unwrap();

    assert_eq!(orders.len(), 3);
    assert!(orders[0].location().ends_with("/acme/order/1"));
    assert!(orders[1].location().ends_with("/acme/order/2"));
    assert!(orders[2].location().ends_with("/acme/order/3"));
}

#[tokio::test]
async fn repeated_order_fetch_yields_equal_resources() {
    let server = with_directory_server();
    let ca = test_context(&server.dir_url);

    let order = ca.order(format!("{}/acme/order/1", server.url));
    let first = order.resource().await.unwrap();
    let second = order.resource().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn dropped_connection_on_fetch_is_retried() {
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        // first connection is closed before any bytes are written
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);

        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;

            let body = r#"{"newNonce":"http://127.0.0.1/acme/new-nonce","newAccount":"http://127.0.0.1/acme/new-acct","newOrder":"http://127.0.0.1/acme/new-order","revokeCert":"http://127.0.0.1/acme/revoke-cert","keyChange":"http://127.0.0.1/acme/key-change"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len(),
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    let ca = test_context(&format!("http://127.0.0.1:{port}/directory"));
    let directory = ca.directory().await.unwrap();
    assert!(directory.new_order.ends_with("/acme/new-order"));
}

#[tokio::test]
async fn fetch_failure_without_retries_surfaces_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        }
    });

    let ca = AcmeContext::with_options(
        format!("http://127.0.0.1:{port}/directory"),
        EcKeyPair::generate_p256(),
        AcmeOptions {
            retry_on_get: false,
            ..AcmeOptions::default()
        },
    );

    let err = ca.directory().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn rate_limited_directory_is_retried() {
    let server = with_directory_server();
    let ca = test_context(&server.limited_dir_url);

    // two 429 responses, then success
    let directory = ca.directory().await.unwrap();
    assert!(directory.new_order.ends_with("/acme/new-order"));
}

#[tokio::test]
async fn rate_limit_retry_can_be_disabled() {
    let server = with_directory_server();
    let ca = AcmeContext::with_options(
        &server.limited_dir_url,
        EcKeyPair::generate_p256(),
        AcmeOptions {
            retry_on_get: false,
            ..AcmeOptions::default()
        },
    );

    let err = ca.directory().await.unwrap_err();
    match err {
        Error::Acme(problem) => assert!(problem.is_rate_limited()),
        other => panic!("expected rate limit problem, got {other:?}"),
    }
}
