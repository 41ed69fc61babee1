use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::error::ChainError;
use crate::http::request::{Auth, Request};
use crate::http::response::Response;

/// 默认单次请求超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 请求未拿到任何 HTTP 响应的原因
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecuteError {
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("{0}")]
    Transport(String),
}

impl From<ExecuteError> for ChainError {
    fn from(err: ExecuteError) -> Self {
        match err {
            ExecuteError::Timeout(limit) => ChainError::Timeout(limit),
            ExecuteError::Transport(msg) => ChainError::Transport(msg),
        }
    }
}

/// Sends a single resolved request.
pub trait HttpExecutor: Send + Sync {
    fn execute(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> impl Future<Output = Result<Response, ExecuteError>> + Send;
}

#[derive(Clone, Default)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    fn classify(err: reqwest::Error, timeout: Duration) -> ExecuteError {
        if err.is_timeout() {
            ExecuteError::Timeout(timeout)
        } else if err.is_connect() {
            ExecuteError::Transport(format!("connection error: {}", err))
        } else {
            ExecuteError::Transport(format!("request failed: {}", err))
        }
    }
}

impl HttpExecutor for Client {
    async fn execute(&self, request: &Request, timeout: Duration) -> Result<Response, ExecuteError> {
        let url = request
            .full_url()
            .map_err(|e| ExecuteError::Transport(format!("invalid URL '{}': {}", request.url, e)))?;
        let headers = request
            .header_map()
            .map_err(|e| ExecuteError::Transport(e.to_string()))?;

        let mut req = self
            .inner
            .request(request.method.to_reqwest(), url)
            .headers(headers)
            .timeout(timeout);

        req = match &request.auth {
            Some(Auth::Bearer { token }) => req.bearer_auth(token),
            Some(Auth::Basic { username, password }) => req.basic_auth(username, Some(password)),
            // ApiKey 已经在 header_map 中
            Some(Auth::ApiKey { .. }) | None => req,
        };

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let start = Instant::now();
        let response = req.send().await.map_err(|e| Self::classify(e, timeout))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| Self::classify(e, timeout))?;
        let duration = start.elapsed();

        Response::new(status, headers, body, duration)
            .map_err(|e| ExecuteError::Transport(format!("malformed response: {}", e)))
    }
}
