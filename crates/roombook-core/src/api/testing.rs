use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::transport::{ApiRequest, ApiResponse, Transport};
use super::ApiError;

type Handler = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, String> + Send + Sync>;

/// In-memory transport: answers from a closure and records every request.
///
/// Each send yields to the scheduler once before answering so concurrent
/// callers interleave the way they would against a real server.
pub(crate) struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Option<(&'static str, Duration)>,
}

impl ScriptedTransport {
    pub(crate) fn new(
        handler: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    ) -> Self {
        Self::fallible(move |request| Ok(handler(request)))
    }

    /// `Err(reason)` from the handler simulates a connection failure
    pub(crate) fn fallible(
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Answers on `path` take `delay` to arrive (use with a paused clock)
    pub(crate) fn delayed_at(mut self, path: &'static str, delay: Duration) -> Self {
        self.delay = Some((path, delay));
        self
    }

    pub(crate) fn always(status: StatusCode, body: &'static str) -> Self {
        Self::new(move |_| ApiResponse::new(status, body))
    }

    /// Connection failure on `path`, `status` with an empty JSON body elsewhere
    pub(crate) fn unreachable_at(path: &'static str, status: StatusCode) -> Self {
        Self::fallible(move |request| {
            if request.path == path {
                Err("connection reset by peer".to_string())
            } else {
                Ok(ApiResponse::new(status, "{}"))
            }
        })
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.delay {
            Some((path, delay)) if request.path == path => tokio::time::sleep(delay).await,
            _ => tokio::task::yield_now().await,
        }
        (self.handler)(request).map_err(ApiError::InvalidResponse)
    }
}
