//! HTTP transport and nonce handling.
//!
//! Every response is reduced to an [`AcmeResponse`]: typed resource body,
//! structured problem, and the protocol-relevant header metadata (Location,
//! Link relations, Retry-After). Non-JSON error responses are normalized to
//! problem documents so callers never have to special-case them.

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::{
    api::Problem,
    error::{Error, Result},
    jws::Jws,
};

const MIME_JOSE_JSON: &str = "application/jose+json";

/// A decoded CA response with its protocol metadata.
#[derive(Debug)]
pub(crate) struct AcmeResponse<T> {
    /// Deserialized body on success, if the body was usable as `T`.
    pub resource: Option<T>,

    /// Structured (or synthesized) problem on failure.
    pub error: Option<Problem>,

    /// `Location` header; the URI of a newly created resource.
    pub location: Option<String>,

    /// `Link` headers as (rel, uri) pairs.
    pub links: Vec<(String, String)>,

    /// `Retry-After` in whole seconds, 0 if absent.
    pub retry_after: u64,

    pub status: u16,
}

impl<T> AcmeResponse<T> {
    /// URIs of all `Link` headers with the given relation type.
    pub(crate) fn links(&self, rel: &str) -> Vec<&str> {
        self.links
            .iter()
            .filter(|(link_rel, _)| link_rel == rel)
            .map(|(_, uri)| uri.as_str())
            .collect()
    }

    /// Fails with the CA's problem if one was returned.
    pub(crate) fn ensure_success(self) -> Result<Self> {
        match self.error {
            Some(problem) => Err(Error::Acme(problem)),
            None => Ok(self),
        }
    }

    /// The resource body, or the CA's problem as an error.
    pub(crate) fn into_resource(self) -> Result<T> {
        match (self.error, self.resource) {
            (Some(problem), _) => Err(Error::Acme(problem)),
            (None, Some(resource)) => Ok(resource),
            (None, None) => Err(Error::UnexpectedResponse("response body was empty")),
        }
    }
}

/// HTTP client wrapper owning the single current anti-replay nonce.
#[derive(Debug, Default)]
pub(crate) struct Transport {
    http: reqwest::Client,
    nonce: Mutex<Option<String>>,
}

impl Transport {
    pub(crate) fn new() -> Self {
        Transport::default()
    }

    /// Plain GET, JSON body expected on success.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<AcmeResponse<T>> {
        log::debug!("GET {url}");
        let res = self.http.get(url).send().await?;
        let parts = self.split_response(res).await;
        finish_json(parts)
    }

    /// Signed POST, JSON body expected on success.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &Jws,
    ) -> Result<AcmeResponse<T>> {
        let parts = self.dispatch_post(url, body).await?;
        finish_json(parts)
    }

    /// Signed POST whose success body is passed through verbatim.
    ///
    /// Used for certificate downloads (PEM) and operations with no body.
    pub(crate) async fn post_raw(&self, url: &str, body: &Jws) -> Result<AcmeResponse<String>> {
        let parts = self.dispatch_post(url, body).await?;
        let error = parts.problem();
        let resource = error.is_none().then(|| parts.body.clone());

        Ok(AcmeResponse {
            resource,
            error,
            location: parts.location,
            links: parts.links,
            retry_after: parts.retry_after,
            status: parts.status,
        })
    }

    async fn dispatch_post(&self, url: &str, body: &Jws) -> Result<ResponseParts> {
        log::debug!("POST {url}");
        let res = self
            .http
            .post(url)
            // no charset parameter: some CAs reject a suffix on this type
            .header(CONTENT_TYPE, MIME_JOSE_JSON)
            .body(serde_json::to_string(body)?)
            .send()
            .await?;
        Ok(self.split_response(res).await)
    }

    /// Atomically take the current nonce, fetching from `new_nonce_url` when
    /// none is held.
    ///
    /// A fetched nonce is stashed and re-taken, so a concurrent consumer may
    /// win the exchange; the loop then fetches again. A fetch response
    /// without `Replay-Nonce` is fatal.
    pub(crate) async fn consume_nonce(&self, new_nonce_url: &str) -> Result<String> {
        loop {
            if let Some(nonce) = self.nonce.lock().take() {
                log::trace!("using stored nonce");
                return Ok(nonce);
            }

            log::debug!("fetching new nonce");
            let res = self.http.head(new_nonce_url).send().await?;

            let nonce = res
                .headers()
                .get("replay-nonce")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
                .ok_or(Error::MissingNonce)?;

            *self.nonce.lock() = Some(nonce);
        }
    }

    /// Stores the replay nonce of any response, success or error.
    fn extract_nonce(&self, headers: &HeaderMap) {
        if let Some(nonce) = headers.get("replay-nonce").and_then(|v| v.to_str().ok()) {
            log::trace!("storing replay nonce");
            *self.nonce.lock() = Some(nonce.to_owned());
        }
    }

    async fn split_response(&self, res: reqwest::Response) -> ResponseParts {
        let status = res.status().as_u16();
        let headers = res.headers();

        self.extract_nonce(headers);

        let location = headers
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let links = parse_links(headers);
        let retry_after = parse_retry_after(headers);
        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_json_media);

        // some CAs close TLS abruptly after writing the body; keep what we got
        let body = res.text().await.unwrap_or_default();
        log::trace!("response {status}: {body}");

        ResponseParts {
            status,
            location,
            links,
            retry_after,
            is_json,
            body,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ResponseParts {
    status: u16,
    location: Option<String>,
    links: Vec<(String, String)>,
    retry_after: u64,
    is_json: bool,
    body: String,
}

impl ResponseParts {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The problem document for a failed response, synthesizing one when the
    /// body is not a problem document (HTML rate limiter pages and the like).
    fn problem(&self) -> Option<Problem> {
        if self.is_success() {
            return None;
        }

        if self.is_json {
            return Some(serde_json::from_str(&self.body).unwrap_or_else(|err| Problem {
                _type: "problemJsonFail".to_owned(),
                detail: Some(format!(
                    "failed to deserialize problem document ({err}) body: {}",
                    self.body
                )),
                status: Some(self.status),
                ..Problem::default()
            }));
        }

        let (acme_type, detail) = match self.status {
            429 => (
                "urn:ietf:params:acme:error:rateLimited",
                "request rate limited by the certificate authority (synthesized from status code)",
            ),
            500 => (
                "urn:ietf:params:acme:error:serverInternal",
                "the certificate authority encountered an internal error (synthesized from status code)",
            ),
            503 => (
                "urn:ietf:params:acme:error:serverInternal",
                "the certificate authority is unavailable (synthesized from status code)",
            ),
            _ => {
                return Some(Problem {
                    _type: "httpReqError".to_owned(),
                    detail: Some(format!("HTTP {} body: {}", self.status, self.body)),
                    status: Some(self.status),
                    ..Problem::default()
                })
            }
        };

        Some(Problem {
            _type: acme_type.to_owned(),
            detail: Some(detail.to_owned()),
            status: Some(self.status),
            ..Problem::default()
        })
    }

}

fn finish_json<T: DeserializeOwned>(parts: ResponseParts) -> Result<AcmeResponse<T>> {
    let error = parts.problem();

    let resource = if error.is_none() && parts.is_json && !parts.body.is_empty() {
        Some(serde_json::from_str::<T>(&parts.body)?)
    } else {
        None
    };

    Ok(AcmeResponse {
        resource,
        error,
        location: parts.location,
        links: parts.links,
        retry_after: parts.retry_after,
        status: parts.status,
    })
}

/// JSON media detection: `application/json` or any `application/*+json`
/// (problem documents arrive as `application/problem+json`).
fn is_json_media(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    media == "application/json" || (media.starts_with("application/") && media.ends_with("+json"))
}

/// Parses `Link` headers into (rel, uri) pairs.
///
/// Handles both repeated headers and the comma-separated form:
/// `<https://ca/issuer>;rel="up", <https://ca/alt>;rel="alternate"`.
fn parse_links(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut links = Vec::new();

    for header in headers.get_all("link") {
        let Ok(header) = header.to_str() else {
            continue;
        };

        for part in header.split(',') {
            let mut segments = part.split(';');

            let Some(uri) = segments
                .next()
                .map(str::trim)
                .and_then(|uri| uri.strip_prefix('<'))
                .and_then(|uri| uri.strip_suffix('>'))
            else {
                continue;
            };

            let rel = segments
                .map(str::trim)
                .find_map(|segment| segment.strip_prefix("rel="))
                .map(|rel| rel.trim_matches('"'));

            if let Some(rel) = rel {
                links.push((rel.to_owned(), uri.to_owned()));
            }
        }
    }

    links
}

/// `Retry-After` as whole seconds: either an integer delay or an HTTP-date,
/// clamped to zero for dates in the past. 0 when absent or unparseable.
fn parse_retry_after(headers: &HeaderMap) -> u64 {
    let Some(value) = headers.get("retry-after").and_then(|v| v.to_str().ok()) else {
        return 0;
    };

    if let Ok(seconds) = value.trim().parse::<u64>() {
        return seconds;
    }

    if let Ok(date) = OffsetDateTime::parse(value.trim(), &Rfc2822) {
        let delta = date - OffsetDateTime::now_utc();
        return delta.whole_seconds().max(0) as u64;
    }

    0
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn json_media_detection() {
        assert!(is_json_media("application/json"));
        assert!(is_json_media("application/problem+json"));
        assert!(is_json_media("application/pem-certificate-chain+json"));
        assert!(is_json_media("Application/Problem+JSON; charset=utf-8"));

        assert!(!is_json_media("application/pem-certificate-chain"));
        assert!(!is_json_media("text/html"));
        assert!(!is_json_media("text/json"));
    }

    #[test]
    fn link_headers_parse_to_multimap() {
        let mut headers = HeaderMap::new();
        headers.append(
            "link",
            HeaderValue::from_static(r#"<https://ca/acme/issuer>;rel="up""#),
        );
        headers.append(
            "link",
            HeaderValue::from_static(
                r#"<https://ca/acme/cert/1/1>;rel="alternate", <https://ca/acme/cert/1/2>;rel="alternate""#,
            ),
        );

        let links = parse_links(&headers);
        assert_eq!(links.len(), 3);

        let response = AcmeResponse::<()> {
            resource: None,
            error: None,
            location: None,
            links,
            retry_after: 0,
            status: 200,
        };
        assert_eq!(
            response.links("alternate"),
            ["https://ca/acme/cert/1/1", "https://ca/acme/cert/1/2"]
        );
        assert_eq!(response.links("up"), ["https://ca/acme/issuer"]);
    }

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("120"));
        assert_eq!(parse_retry_after(&headers), 120);
    }

    #[test]
    fn retry_after_http_date() {
        let future = OffsetDateTime::now_utc() + time::Duration::seconds(90);
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_str(&future.format(&Rfc2822).unwrap()).unwrap(),
        );

        let seconds = parse_retry_after(&headers);
        assert!((85..=90).contains(&seconds), "got {seconds}");
    }

    #[test]
    fn retry_after_past_date_clamps_to_zero() {
        let past = OffsetDateTime::now_utc() - time::Duration::seconds(90);
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_str(&past.format(&Rfc2822).unwrap()).unwrap(),
        );

        assert_eq!(parse_retry_after(&headers), 0);
    }

    #[test]
    fn rate_limited_html_synthesizes_problem() {
        let parts = ResponseParts {
            status: 429,
            location: None,
            links: Vec::new(),
            retry_after: 30,
            is_json: false,
            body: "<html><body>too many requests</body></html>".to_owned(),
        };

        let problem = parts.problem().unwrap();
        assert_eq!(problem._type, "urn:ietf:params:acme:error:rateLimited");
        assert_eq!(problem.status, Some(429));
    }

    #[test]
    fn unavailable_html_synthesizes_server_internal() {
        for status in [500, 503] {
            let parts = ResponseParts {
                status,
                location: None,
                links: Vec::new(),
                retry_after: 0,
                is_json: false,
                body: "<html>maintenance</html>".to_owned(),
            };

            let problem = parts.problem().unwrap();
            assert_eq!(problem._type, "urn:ietf:params:acme:error:serverInternal");
            assert_eq!(problem.status, Some(status));
        }
    }

    #[test]
    fn other_non_json_error_still_structured() {
        let parts = ResponseParts {
            status: 404,
            location: None,
            links: Vec::new(),
            retry_after: 0,
            is_json: false,
            body: "not found".to_owned(),
        };

        let problem = parts.problem().unwrap();
        assert_eq!(problem._type, "httpReqError");
        assert!(problem.detail.unwrap().contains("404"));
    }

    #[test]
    fn json_problem_body_passes_through() {
        let parts = ResponseParts {
            status: 400,
            location: None,
            links: Vec::new(),
            retry_after: 0,
            is_json: true,
            body: r#"{"type":"urn:ietf:params:acme:error:badNonce","detail":"stale"}"#.to_owned(),
        };

        let problem = parts.problem().unwrap();
        assert!(problem.is_bad_nonce());
    }

    #[tokio::test]
    async fn consume_prefers_stored_nonce() {
        let transport = Transport::new();
        *transport.nonce.lock() = Some("stored".to_owned());

        // URL is never contacted because a nonce is already held.
        let nonce = transport.consume_nonce("http://invalid.localhost/").await;
        assert_eq!(nonce.unwrap(), "stored");
        assert!(transport.nonce.lock().is_none());
    }

    #[test]
    fn extract_nonce_overwrites_stored_value() {
        let transport = Transport::new();
        *transport.nonce.lock() = Some("old".to_owned());

        let mut headers = HeaderMap::new();
        headers.insert("replay-nonce", HeaderValue::from_static("new"));
        transport.extract_nonce(&headers);

        assert_eq!(transport.nonce.lock().as_deref(), Some("new"));
    }
}
