//! The request/response seam.
//!
//! The loader never talks to reqwest directly: it issues `Request`s through a
//! `Transport`. `HttpTransport` goes to the network; the offline cache wraps
//! another transport and implements the trait itself, which is how it sits
//! underneath every fetch without the loader knowing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::FetchError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Value of the `Accept` header, if any
    pub accept: Option<String>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            accept: None,
        }
    }

    /// A top-level page navigation.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_accept("text/html,application/xhtml+xml")
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn accepts_html(&self) -> bool {
        self.accept
            .as_deref()
            .is_some_and(|accept| accept.contains("text/html"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: Request) -> Result<Response, FetchError>;
}

/// Straight-to-network transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        let mut builder = self.client.request(request.method, request.url);
        if let Some(accept) = request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A canned-response transport for tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;

    enum Route {
        Respond(Response),
        Fail,
    }

    /// Serves scripted responses keyed by full URL. Unknown URLs get a 404.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<HashMap<String, Route>>,
        hits: Mutex<HashMap<String, usize>>,
        gates: Mutex<HashMap<String, Arc<Notify>>>,
        offline: AtomicBool,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: &str, response: Response) {
            self.routes
                .lock()
                .unwrap()
                .insert(url.to_string(), Route::Respond(response));
        }

        pub fn respond_json(&self, url: &str, json: &str) {
            self.respond(
                url,
                Response::new(StatusCode::OK, Some("application/json"), json.as_bytes()),
            );
        }

        pub fn respond_status(&self, url: &str, status: StatusCode) {
            self.respond(url, Response::new(status, None, Vec::new()));
        }

        pub fn fail(&self, url: &str) {
            self.routes.lock().unwrap().insert(url.to_string(), Route::Fail);
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        /// Park the next request for `url` until the returned handle is notified.
        pub fn hold(&self, url: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.gates.lock().unwrap().insert(url.to_string(), gate.clone());
            gate
        }

        pub fn hits(&self, url: &str) -> usize {
            self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
            let url = request.url.to_string();
            *self.hits.lock().unwrap().entry(url.clone()).or_default() += 1;

            let gate = self.gates.lock().unwrap().remove(&url);
            if let Some(gate) = gate {
                gate.notified().await;
            }

            if self.offline.load(Ordering::SeqCst) {
                return Err(FetchError::Unreachable(url));
            }

            match self.routes.lock().unwrap().get(&url) {
                Some(Route::Respond(response)) => Ok(response.clone()),
                Some(Route::Fail) => Err(FetchError::Unreachable(url)),
                None => Ok(Response::new(StatusCode::NOT_FOUND, None, Vec::new())),
            }
        }
    }
}
