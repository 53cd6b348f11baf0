use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    Error, GenericClient, GenericRequestBuilder, GenericResponse, Method, RequestBuilder, Response,
    StatusCode,
};

/// Scripted in-process transport.
///
/// Outcomes are registered per URL and consumed in FIFO order; a URL with no
/// remaining script behaves like an unreachable host.
#[derive(Debug, Default, Clone)]
pub struct SimulatorClient {
    script: Arc<Mutex<BTreeMap<String, VecDeque<Outcome>>>>,
}

#[derive(Debug)]
enum Outcome {
    Response(ScriptedResponse),
    Error(Error),
}

impl SimulatorClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a scripted response for `url`.
    ///
    /// # Panics
    ///
    /// * If the script lock is poisoned
    pub fn respond(&self, url: &str, response: ScriptedResponse) {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Outcome::Response(response));
    }

    /// Queues a scripted failure for `url`.
    ///
    /// # Panics
    ///
    /// * If the script lock is poisoned
    pub fn fail(&self, url: &str, error: Error) {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Outcome::Error(error));
    }

    fn take(&self, url: &str) -> Option<Outcome> {
        self.script
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
    }
}

impl GenericClient for SimulatorClient {
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder {
            builder: Box::new(SimulatorRequestBuilder {
                client: self.clone(),
                method,
                url: url.to_string(),
            }),
        }
    }
}

pub struct SimulatorRequestBuilder {
    client: SimulatorClient,
    method: Method,
    url: String,
}

#[async_trait]
impl GenericRequestBuilder for SimulatorRequestBuilder {
    fn header(&mut self, _name: &str, _value: &str) {}

    fn timeout(&mut self, _timeout: Duration) {}

    async fn send(&mut self) -> Result<Response, Error> {
        log::debug!("simulator send method={} url={}", self.method, self.url);

        match self.client.take(&self.url) {
            Some(Outcome::Response(scripted)) => Ok(Response {
                inner: Box::new(SimulatorResponse::new(scripted)),
            }),
            Some(Outcome::Error(error)) => Err(error),
            None => Err(Error::Connection(format!(
                "no scripted response for {}",
                self.url
            ))),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedResponse {
    status: StatusCode,
    headers: BTreeMap<String, String>,
    chunks: Vec<Bytes>,
    interrupt: bool,
}

impl ScriptedResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self::status(200)
    }

    /// # Panics
    ///
    /// * If `status` is zero
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            headers: BTreeMap::new(),
            chunks: vec![],
            interrupt: false,
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Appends one body chunk. Zero-length chunks are delivered as-is.
    #[must_use]
    pub fn chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    /// Drops the connection after the scripted chunks are delivered.
    #[must_use]
    pub const fn interrupted(mut self) -> Self {
        self.interrupt = true;
        self
    }
}

pub struct SimulatorResponse {
    status: StatusCode,
    headers: BTreeMap<String, String>,
    chunks: Option<VecDeque<Bytes>>,
    interrupt: bool,
}

impl SimulatorResponse {
    fn new(scripted: ScriptedResponse) -> Self {
        Self {
            status: scripted.status,
            headers: scripted.headers,
            chunks: Some(scripted.chunks.into()),
            interrupt: scripted.interrupt,
        }
    }

    fn drain(&mut self) -> Vec<Result<Bytes, Error>> {
        let chunks = self.chunks.take().unwrap_or_default();
        let mut items = chunks.into_iter().map(Ok).collect::<Vec<_>>();

        if self.interrupt {
            items.push(Err(Error::TransferInterrupted(
                "connection dropped by script".to_string(),
            )));
        }

        items
    }
}

#[async_trait]
impl GenericResponse for SimulatorResponse {
    #[must_use]
    fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    fn headers(&mut self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    async fn text(&mut self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    #[must_use]
    async fn bytes(&mut self) -> Result<Bytes, Error> {
        let mut body = Vec::new();

        for item in self.drain() {
            body.extend_from_slice(&item?);
        }

        Ok(body.into())
    }

    #[must_use]
    fn bytes_stream(
        &mut self,
    ) -> std::pin::Pin<Box<dyn futures_core::Stream<Item = Result<Bytes, Error>> + Send>> {
        Box::pin(futures_util::stream::iter(self.drain()))
    }
}
