//! Single request/response exchanges against the mirrored site.
//!
//! A [`Transport`] owns the HTTP client, built from an explicit
//! [`TransportConfig`]. Each request is an [`Action`]: it resolves its target
//! against the site's base URL, is issued once with [`Action::get`] or
//! [`Action::post`], and yields an [`Exchange`]. The exchange exposes the
//! status code and headers immediately and reads the body on first access,
//! classifying it by `Content-Type` exactly once.

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use regex::Regex;
use reqwest::Url;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::redirect::Policy;

use crate::config::TransportConfig;
use crate::error::{Error, Result};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>(.*?)</title>").expect("valid regex"));

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP client shared by every action of a run.
///
/// All clients built by one transport share a cookie jar, so a login
/// survives toggling redirect handling.
pub struct Transport {
    config: TransportConfig,
    base: Url,
    jar: Arc<Jar>,
    client: reqwest::Client,
}

impl Transport {
    /// Creates a transport resolving relative targets against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL or the client
    /// (including its proxy) cannot be built.
    pub fn new(base_url: &str, config: TransportConfig) -> Result<Self> {
        let base = Url::parse(base_url)?;
        let jar = Arc::new(Jar::default());
        let client = build_client(&config, &jar)?;
        if let Some(proxy) = &config.proxy {
            log::info!("Using proxy {}", proxy.url());
        }
        Ok(Self {
            config,
            base,
            jar,
            client,
        })
    }

    /// Returns the configuration the current client was built from.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns whether 3xx responses are currently followed.
    #[must_use]
    pub const fn follows_redirects(&self) -> bool {
        self.config.follow_redirects
    }

    /// Switches redirect handling for subsequent actions.
    ///
    /// The client is rebuilt only when the setting changes; cookies carry over.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be rebuilt.
    pub fn set_follow_redirects(&mut self, follow: bool) -> Result<()> {
        if self.config.follow_redirects == follow {
            return Ok(());
        }
        let config = self.config.clone().with_follow_redirects(follow);
        self.client = build_client(&config, &self.jar)?;
        self.config = config;
        Ok(())
    }

    /// Resolves a path or absolute URL to the URL that will be requested.
    ///
    /// Inputs carrying a scheme keep their own host; anything else is joined
    /// onto the base URL. Both go through the URL parser, which
    /// percent-encodes characters not allowed in a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the result is not a valid URL.
    pub fn resolve(&self, target: &str) -> Result<Url> {
        if target.contains("://") {
            Ok(Url::parse(target)?)
        } else {
            Ok(self.base.join(target)?)
        }
    }

    /// Prepares an action for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be resolved.
    pub fn action(&self, target: &str) -> Result<Action<'_>> {
        Ok(self.action_url(self.resolve(target)?))
    }

    /// Prepares an action for an already built URL.
    #[must_use]
    pub const fn action_url(&self, url: Url) -> Action<'_> {
        Action {
            transport: self,
            url,
        }
    }
}

fn build_client(config: &TransportConfig, jar: &Arc<Jar>) -> Result<reqwest::Client> {
    let policy = if config.follow_redirects {
        Policy::default()
    } else {
        Policy::none()
    };
    let mut builder = reqwest::Client::builder()
        .cookie_provider(Arc::clone(jar))
        .redirect(policy)
        .user_agent(config.user_agent.clone());
    builder = match &config.proxy {
        Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy.url())?),
        None => builder.no_proxy(),
    };
    Ok(builder.build()?)
}

/// One request against one URL, consumed when issued.
pub struct Action<'t> {
    transport: &'t Transport,
    url: Url,
}

impl Action<'_> {
    /// The resolved request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Issues a GET.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    pub async fn get(self) -> Result<Exchange> {
        let response = self.transport.client.get(self.url.clone()).send().await?;
        Ok(Exchange::new(self.url, response))
    }

    /// Issues a form-encoded POST from alternating key/value `pairs`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `pairs` has odd length, or an
    /// error on transport failure.
    pub async fn post(self, pairs: &[&str]) -> Result<Exchange> {
        let body = encode_form(pairs)?;
        let mut request = self.transport.client.post(self.url.clone());
        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, FORM_CONTENT_TYPE).body(body);
        }
        let response = request.send().await?;
        Ok(Exchange::new(self.url, response))
    }
}

/// Encodes alternating key/value pairs as `application/x-www-form-urlencoded`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `pairs` has odd length.
pub fn encode_form(pairs: &[&str]) -> Result<String> {
    if pairs.len() % 2 != 0 {
        return Err(Error::InvalidArgument(format!(
            "form fields must come in key/value pairs, got {} values",
            pairs.len()
        )));
    }
    let encoded: Vec<String> = pairs
        .chunks_exact(2)
        .map(|kv| {
            let key: String = url::form_urlencoded::byte_serialize(kv[0].as_bytes()).collect();
            let value: String = url::form_urlencoded::byte_serialize(kv[1].as_bytes()).collect();
            format!("{key}={value}")
        })
        .collect();
    Ok(encoded.join("&"))
}

/// How a response body is interpreted, decided from its `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `text/html*`, decoded as UTF-8.
    Html,
    /// `application/octet-stream*`, kept as raw bytes.
    Binary,
    /// Anything else; the body is never read.
    Other,
}

impl BodyKind {
    /// Classifies a `Content-Type` header value.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.starts_with("text/html") => Self::Html,
            Some(ct) if ct.starts_with("application/octet-stream") => Self::Binary,
            _ => Self::Other,
        }
    }
}

/// Status line and headers of an issued request.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    url: Url,
    code: u16,
    headers: HeaderMap,
    kind: BodyKind,
}

impl ResponseMeta {
    /// The URL that was requested.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// The HTTP status code.
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// Returns a response header value, if present and valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// The body classification.
    #[must_use]
    pub const fn kind(&self) -> BodyKind {
        self.kind
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// HTML page text.
    Text(String),
    /// Raw artifact bytes.
    Binary(Bytes),
    /// Neither HTML nor binary.
    Empty,
}

/// An issued request and its lazily read body.
///
/// The exchange owns the underlying response; dropping it releases the
/// connection whether or not the body was read.
pub struct Exchange {
    meta: ResponseMeta,
    response: Option<reqwest::Response>,
    body: Option<Body>,
}

impl Exchange {
    fn new(url: Url, response: reqwest::Response) -> Self {
        let headers = response.headers().clone();
        let kind = BodyKind::from_content_type(
            headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        );
        let meta = ResponseMeta {
            url,
            code: response.status().as_u16(),
            headers,
            kind,
        };
        log::debug!("{} -> {} ({:?})", meta.url, meta.code, meta.kind);
        Self {
            meta,
            response: Some(response),
            body: None,
        }
    }

    /// Status line and headers.
    #[must_use]
    pub const fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    /// The HTTP status code.
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.meta.code
    }

    /// Returns a response header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.meta.header(name)
    }

    /// Reads and classifies the body on first call; later calls return the cached value.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the body fails.
    pub async fn body(&mut self) -> Result<&Body> {
        if self.body.is_none() {
            let body = match self.response.take() {
                Some(response) => read_body(self.meta.kind, response).await?,
                None => Body::Empty,
            };
            self.body = Some(body);
        }
        Ok(&*self.body.get_or_insert(Body::Empty))
    }

    /// The HTML text, if the response is HTML.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the body fails.
    pub async fn html(&mut self) -> Result<Option<&str>> {
        match self.body().await? {
            Body::Text(text) => Ok(Some(text.as_str())),
            _ => Ok(None),
        }
    }

    /// The raw bytes, if the response is binary.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the body fails.
    pub async fn binary(&mut self) -> Result<Option<&Bytes>> {
        match self.body().await? {
            Body::Binary(bytes) => Ok(Some(bytes)),
            _ => Ok(None),
        }
    }

    /// The first `<title>` of an HTML body, or an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the body fails.
    pub async fn title(&mut self) -> Result<String> {
        Ok(self.html().await?.map(extract_title).unwrap_or_default())
    }
}

async fn read_body(kind: BodyKind, response: reqwest::Response) -> Result<Body> {
    match kind {
        BodyKind::Html => {
            let bytes = response.bytes().await?;
            Ok(Body::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
        BodyKind::Binary => Ok(Body::Binary(response.bytes().await?)),
        BodyKind::Other => Ok(Body::Empty),
    }
}

/// Extracts the first `<title>` text (case-insensitive), or an empty string.
#[must_use]
pub fn extract_title(html: &str) -> String {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn transport(base: &str) -> Transport {
        Transport::new(base, TransportConfig::default()).unwrap()
    }

    #[test]
    fn resolve_relative_against_base() {
        let t = transport("http://refcardz.example.com");
        assert_eq!(
            t.resolve("/user").unwrap().as_str(),
            "http://refcardz.example.com/user"
        );
    }

    #[test]
    fn resolve_keeps_absolute_host() {
        let t = transport("http://refcardz.example.com");
        assert_eq!(
            t.resolve("http://cdn.example.com/files/a.pdf")
                .unwrap()
                .host_str(),
            Some("cdn.example.com")
        );
    }

    #[test]
    fn resolve_percent_encodes_path() {
        let t = transport("http://refcardz.example.com");
        let url = t.resolve("http://cdn.example.com/files/Core Java.pdf").unwrap();
        assert_eq!(url.path(), "/files/Core%20Java.pdf");
    }

    #[test]
    fn resolve_keeps_query() {
        let t = transport("http://refcardz.example.com");
        let url = t
            .resolve("/assets/request/refcard/7?oid=rchom7&direct=true")
            .unwrap();
        assert_eq!(url.path(), "/assets/request/refcard/7");
        assert_eq!(url.query(), Some("oid=rchom7&direct=true"));
    }

    #[test]
    fn invalid_base_url_rejected() {
        let err = Transport::new("not a url", TransportConfig::default()).err();
        assert!(matches!(err, Some(Error::Url(_))));
    }

    #[test]
    fn encode_form_pairs() {
        let body = encode_form(&["form_id", "user_login", "name", "a b@c.d"]).unwrap();
        assert_eq!(body, "form_id=user_login&name=a+b%40c.d");
        assert_eq!(encode_form(&[]).unwrap(), "");
    }

    #[test]
    fn encode_form_rejects_odd_length() {
        let err = encode_form(&["lonely"]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn body_kind_from_content_type() {
        assert_eq!(
            BodyKind::from_content_type(Some("text/html; charset=utf-8")),
            BodyKind::Html
        );
        assert_eq!(
            BodyKind::from_content_type(Some("application/octet-stream")),
            BodyKind::Binary
        );
        assert_eq!(
            BodyKind::from_content_type(Some("application/pdf")),
            BodyKind::Other
        );
        assert_eq!(BodyKind::from_content_type(None), BodyKind::Other);
    }

    #[test]
    fn title_extraction() {
        assert_eq!(extract_title("<html><TITLE>Log in</TITLE></html>"), "Log in");
        assert_eq!(
            extract_title("<title>a</title><title>b</title>"),
            "a"
        );
        assert_eq!(extract_title("<p>no title</p>"), "");
    }

    #[tokio::test]
    async fn get_html_response() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><head><title>Refcardz</title></head></html>")
            .create_async()
            .await;

        let t = transport(&server.url());
        let mut exchange = t.action("/").unwrap().get().await.unwrap();
        assert_eq!(exchange.code(), 200);
        assert_eq!(exchange.meta().kind(), BodyKind::Html);
        assert_eq!(exchange.title().await.unwrap(), "Refcardz");
        assert!(exchange.html().await.unwrap().unwrap().contains("<head>"));
        assert!(exchange.binary().await.unwrap().is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_binary_response() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files/a.pdf")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(b"%PDF-1.4 data".as_slice())
            .create_async()
            .await;

        let t = transport(&server.url());
        let mut exchange = t.action("/files/a.pdf").unwrap().get().await.unwrap();
        assert_eq!(
            exchange.binary().await.unwrap().map(|b| b.to_vec()),
            Some(b"%PDF-1.4 data".to_vec())
        );
        assert!(exchange.html().await.unwrap().is_none());
        assert_eq!(exchange.title().await.unwrap(), "");
    }

    #[tokio::test]
    async fn other_content_type_yields_neither() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let t = transport(&server.url());
        let mut exchange = t.action("/data").unwrap().get().await.unwrap();
        assert_eq!(exchange.body().await.unwrap(), &Body::Empty);
        assert!(exchange.html().await.unwrap().is_none());
        assert!(exchange.binary().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn redirects_not_followed_when_disabled() {
        let mut server = Server::new_async().await;
        let target = server
            .mock("GET", "/target")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;
        server
            .mock("GET", "/jump")
            .with_status(302)
            .with_header("location", "/target")
            .create_async()
            .await;

        let mut t = transport(&server.url());
        t.set_follow_redirects(false).unwrap();
        assert!(!t.follows_redirects());
        let exchange = t.action("/jump").unwrap().get().await.unwrap();
        assert_eq!(exchange.code(), 302);
        assert_eq!(exchange.header("Location"), Some("/target"));
        target.assert_async().await;
    }

    #[tokio::test]
    async fn redirects_followed_by_default() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/jump")
            .with_status(302)
            .with_header("location", "/target")
            .create_async()
            .await;
        server
            .mock("GET", "/target")
            .with_status(200)
            .create_async()
            .await;

        let t = transport(&server.url());
        let exchange = t.action("/jump").unwrap().get().await.unwrap();
        assert_eq!(exchange.code(), 200);
    }

    #[tokio::test]
    async fn environment_proxy_ignored_without_configured_proxy() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .create_async()
            .await;

        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("HTTP_PROXY", "http://127.0.0.1:9") };
        let t = transport(&server.url());
        let exchange = t.action("/").unwrap().get().await.unwrap();

        assert_eq!(exchange.code(), 200);
        mock.assert_async().await;
    }

    #[test]
    fn action_url_is_used_verbatim() {
        let t = transport("http://refcardz.example.com");
        let url = Url::parse("http://cdn.example.com/files/rc%23007.pdf").unwrap();
        assert_eq!(
            t.action_url(url).url().as_str(),
            "http://cdn.example.com/files/rc%23007.pdf"
        );
    }

    #[tokio::test]
    async fn post_sends_form_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/user")
            .match_header("content-type", FORM_CONTENT_TYPE)
            .match_body("form_id=user_login&pass=p%26ss")
            .with_status(200)
            .create_async()
            .await;

        let t = transport(&server.url());
        let exchange = t
            .action("/user")
            .unwrap()
            .post(&["form_id", "user_login", "pass", "p&ss"])
            .await
            .unwrap();
        assert_eq!(exchange.code(), 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn post_rejects_odd_pairs_before_sending() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let t = transport(&server.url());
        let err = t
            .action("/user")
            .unwrap()
            .post(&["name", "pass", "x"])
            .await
            .err();
        assert!(matches!(err, Some(Error::InvalidArgument(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cookies_survive_redirect_toggle() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/user")
            .with_status(200)
            .with_header("set-cookie", "SESS=abc; Path=/")
            .create_async()
            .await;
        let check = server
            .mock("GET", "/private")
            .match_header("cookie", "SESS=abc")
            .with_status(200)
            .create_async()
            .await;

        let mut t = transport(&server.url());
        t.action("/user").unwrap().post(&[]).await.unwrap();
        t.set_follow_redirects(false).unwrap();
        let exchange = t.action("/private").unwrap().get().await.unwrap();
        assert_eq!(exchange.code(), 200);
        check.assert_async().await;
    }
}
