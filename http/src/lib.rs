#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{collections::BTreeMap, num::NonZeroU16, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt as _;
use strum::{AsRefStr, EnumString};

#[cfg(feature = "reqwest")]
pub mod reqwest;

#[cfg(feature = "simulator")]
pub mod simulator;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Host resolution failed: {0}")]
    Resolution(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Transfer timed out")]
    Timeout,
    #[error("Transfer interrupted: {0}")]
    TransferInterrupted(String),
    #[error("Non-success status: {0}")]
    NonSuccessStatus(StatusCode),
    #[error("Body sink aborted the transfer: consumed {consumed} of {expected} bytes")]
    CallbackAborted { consumed: usize, expected: usize },
    #[cfg(feature = "json")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(NonZeroU16);

impl StatusCode {
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match NonZeroU16::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0.get()
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0.get() >= 200 && self.0.get() < 300
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<u16> for StatusCode {
    fn eq(&self, other: &u16) -> bool {
        self.0.get() == *other
    }
}

#[derive(Debug, Clone, Copy, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

pub trait GenericClient: Send + Sync {
    fn request(&self, method: Method, url: &str) -> RequestBuilder;
}

/// Consumes response body chunks as the transport delivers them.
///
/// Returns the number of bytes consumed. Anything other than the full chunk
/// length aborts the transfer with [`Error::CallbackAborted`].
pub trait BodySink: Send {
    fn consume(&mut self, chunk: &[u8]) -> usize;
}

impl BodySink for Vec<u8> {
    fn consume(&mut self, chunk: &[u8]) -> usize {
        self.extend_from_slice(chunk);
        chunk.len()
    }
}

pub struct Client {
    backend: Box<dyn GenericClient>,
    timeout: Option<Duration>,
}

impl GenericClient for Client {
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self.backend.request(method, url);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// # Panics
    ///
    /// * If all HTTP backend features are disabled
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub const fn builder() -> ClientBuilder {
        ClientBuilder { timeout: None }
    }

    /// Wraps an explicit backend, bypassing feature-based selection.
    #[must_use]
    pub fn from_backend(backend: impl GenericClient + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            timeout: None,
        }
    }

    #[must_use]
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::Get, url)
    }

    /// Performs one GET and returns the full response body.
    ///
    /// # Errors
    ///
    /// * If the URL is malformed
    /// * If the transport fails to resolve, connect, or complete the transfer
    /// * If the response status is not 2xx
    pub async fn fetch(&self, url: &str) -> Result<Bytes, Error> {
        let mut body = Vec::new();
        self.fetch_with_sink(url, &mut body).await?;
        Ok(body.into())
    }

    /// Performs one GET, feeding each body chunk to `sink` in arrival order.
    ///
    /// # Errors
    ///
    /// * If the URL is malformed
    /// * If the transport fails to resolve, connect, or complete the transfer
    /// * If the response status is not 2xx
    /// * If `sink` consumes less than a full chunk
    pub async fn fetch_with_sink(
        &self,
        url: &str,
        sink: &mut (impl BodySink + ?Sized),
    ) -> Result<StatusCode, Error> {
        log::debug!("fetch url={url}");

        let response = self.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            log::debug!("fetch url={url} failed status={status}");
            return Err(Error::NonSuccessStatus(status));
        }

        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            log::trace!("fetch url={url} chunk len={}", chunk.len());

            let consumed = sink.consume(&chunk);
            if consumed != chunk.len() {
                return Err(Error::CallbackAborted {
                    consumed,
                    expected: chunk.len(),
                });
            }
        }

        Ok(status)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientBuilder {
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Overall deadline for each transfer, from connect through the last
    /// body byte.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// # Panics
    ///
    /// * If all HTTP backend features are disabled
    #[must_use]
    pub fn build(self) -> Client {
        if cfg!(feature = "reqwest") {
            #[cfg(feature = "reqwest")]
            {
                Client {
                    backend: Box::new(reqwest::ReqwestClient::default()),
                    timeout: self.timeout,
                }
            }
            #[cfg(not(feature = "reqwest"))]
            unreachable!()
        } else {
            panic!("No HTTP backend feature enabled")
        }
    }
}

/// Performs one GET on a default client and returns the full response body.
///
/// # Errors
///
/// * If the URL is malformed
/// * If the transport fails to resolve, connect, or complete the transfer
/// * If the response status is not 2xx
///
/// # Panics
///
/// * If all HTTP backend features are disabled
pub async fn fetch(url: &str) -> Result<Bytes, Error> {
    Client::new().fetch(url).await
}

#[async_trait]
pub trait GenericRequestBuilder: Send + Sync {
    fn header(&mut self, name: &str, value: &str);

    fn timeout(&mut self, timeout: Duration);

    async fn send(&mut self) -> Result<Response, Error>;
}

pub struct RequestBuilder {
    builder: Box<dyn GenericRequestBuilder>,
}

impl RequestBuilder {
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder.header(name, value);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.builder.timeout(timeout);
        self
    }

    /// # Errors
    ///
    /// * If the URL is malformed
    /// * If the transport fails to resolve, connect, or complete the request
    pub async fn send(mut self) -> Result<Response, Error> {
        self.builder.send().await
    }
}

#[async_trait]
pub trait GenericResponse: Send + Sync {
    fn status(&self) -> StatusCode;

    fn headers(&mut self) -> &BTreeMap<String, String>;

    async fn text(&mut self) -> Result<String, Error>;

    async fn bytes(&mut self) -> Result<Bytes, Error>;

    fn bytes_stream(
        &mut self,
    ) -> std::pin::Pin<Box<dyn futures_core::Stream<Item = Result<Bytes, Error>> + Send>>;
}

pub struct Response {
    inner: Box<dyn GenericResponse>,
}

impl Response {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&mut self) -> &BTreeMap<String, String> {
        self.inner.headers()
    }

    /// # Errors
    ///
    /// * If the transfer fails before the body completes
    pub async fn text(mut self) -> Result<String, Error> {
        self.inner.text().await
    }

    /// # Errors
    ///
    /// * If the transfer fails before the body completes
    pub async fn bytes(mut self) -> Result<Bytes, Error> {
        self.inner.bytes().await
    }

    /// # Errors
    ///
    /// * If the transfer fails before the body completes
    /// * If the body is not valid JSON for `T`
    #[cfg(feature = "json")]
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, Error> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[must_use]
    pub fn bytes_stream(
        mut self,
    ) -> std::pin::Pin<Box<dyn futures_core::Stream<Item = Result<Bytes, Error>> + Send>> {
        self.inner.bytes_stream()
    }
}

#[cfg(all(test, feature = "simulator"))]
mod test {
    use pretty_assertions::assert_eq;

    use crate::{
        Client, Error,
        simulator::{ScriptedResponse, SimulatorClient},
    };

    use super::BodySink;

    #[tokio::test]
    async fn accumulates_chunks_in_arrival_order() {
        let sim = SimulatorClient::new();
        sim.respond(
            "http://sim/chunks",
            ScriptedResponse::ok().chunk("ab").chunk("").chunk("cd"),
        );

        let body = Client::from_backend(sim)
            .fetch("http://sim/chunks")
            .await
            .unwrap();

        assert_eq!(&body[..], b"abcd");
    }

    #[tokio::test]
    async fn empty_body_yields_empty_result() {
        let sim = SimulatorClient::new();
        sim.respond("http://sim/empty", ScriptedResponse::ok());

        let body = Client::from_backend(sim)
            .fetch("http://sim/empty")
            .await
            .unwrap();

        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let sim = SimulatorClient::new();
        sim.respond("http://sim/missing", ScriptedResponse::status(404));

        let err = Client::from_backend(sim)
            .fetch("http://sim/missing")
            .await
            .unwrap_err();

        match err {
            Error::NonSuccessStatus(status) => assert_eq!(status.as_u16(), 404),
            _ => panic!("expected NonSuccessStatus, got {err:?}"),
        }
    }

    #[tokio::test]
    async fn unscripted_host_is_a_connection_failure() {
        let sim = SimulatorClient::new();

        let err = Client::from_backend(sim)
            .fetch("http://sim/unreachable")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn scripted_error_propagates_to_the_caller() {
        let sim = SimulatorClient::new();
        sim.fail(
            "http://sim/dns",
            Error::Resolution("no such host".to_string()),
        );

        let err = Client::from_backend(sim)
            .fetch("http://sim/dns")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resolution(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn interrupted_transfer_surfaces_mid_stream() {
        let sim = SimulatorClient::new();
        sim.respond(
            "http://sim/flaky",
            ScriptedResponse::ok().chunk("partial").interrupted(),
        );

        let err = Client::from_backend(sim)
            .fetch("http://sim/flaky")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TransferInterrupted(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn repeated_fetches_reuse_one_client() {
        let sim = SimulatorClient::new();

        for i in 0..32 {
            sim.respond(
                "http://sim/repeat",
                ScriptedResponse::ok().chunk(format!("body-{i}")),
            );
        }

        let client = Client::from_backend(sim);

        for i in 0..32 {
            let body = client.fetch("http://sim/repeat").await.unwrap();
            assert_eq!(body, format!("body-{i}"));
        }
    }

    #[tokio::test]
    async fn sink_refusing_a_chunk_aborts_the_transfer() {
        struct Refusing;

        impl BodySink for Refusing {
            fn consume(&mut self, chunk: &[u8]) -> usize {
                chunk.len() / 2
            }
        }

        let sim = SimulatorClient::new();
        sim.respond("http://sim/abort", ScriptedResponse::ok().chunk("abcd"));

        let err = Client::from_backend(sim)
            .fetch_with_sink("http://sim/abort", &mut Refusing)
            .await
            .unwrap_err();

        match err {
            Error::CallbackAborted { consumed, expected } => {
                assert_eq!(consumed, 2);
                assert_eq!(expected, 4);
            }
            _ => panic!("expected CallbackAborted, got {err:?}"),
        }
    }

    #[tokio::test]
    async fn response_exposes_status_and_headers() {
        let sim = SimulatorClient::new();
        sim.respond(
            "http://sim/headers",
            ScriptedResponse::ok()
                .header("content-type", "text/plain")
                .chunk("ok"),
        );

        let mut response = Client::from_backend(sim)
            .get("http://sim/headers")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(
            response.headers().get("content-type").map(String::as_str),
            Some("text/plain"),
        );
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[cfg(feature = "json")]
    #[tokio::test]
    async fn json_body_deserializes() {
        let sim = SimulatorClient::new();
        sim.respond(
            "http://sim/package",
            ScriptedResponse::ok().chunk(r#"{"version":"1.0.0"}"#),
        );

        let value: serde_json::Value = Client::from_backend(sim)
            .get("http://sim/package")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(value["version"], "1.0.0");
    }
}
