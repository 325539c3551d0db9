use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Request};

use super::wire::response_head_size;

/// Result of executing one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    /// `None` when no response head arrived.
    pub status: Option<u16>,
    /// Response head plus body bytes actually read.
    pub response_bytes: u64,
    /// Raw transport error text, including the full source chain.
    pub error: Option<String>,
}

impl Exchange {
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: None,
            response_bytes: 0,
            error: Some(error.into()),
        }
    }
}

/// Capability to put a request on the wire.
///
/// Implementations never fail the worker: every problem is folded into the
/// returned [`Exchange`].
#[async_trait]
pub trait HttpExecutor: std::fmt::Debug + Send + Sync {
    async fn execute(&self, request: Request) -> Exchange;
}

#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: Request) -> Exchange {
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => return Exchange::failed(error_chain(&err)),
        };

        let status = response.status();
        let head = response_head_size(response.version(), status, response.headers());
        let mut stream = response.bytes_stream();
        let mut body_bytes: u64 = 0;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    body_bytes =
                        body_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
                }
                Err(err) => {
                    return Exchange {
                        status: Some(status.as_u16()),
                        response_bytes: head.saturating_add(body_bytes),
                        error: Some(error_chain(&err)),
                    };
                }
            }
        }

        Exchange {
            status: Some(status.as_u16()),
            response_bytes: head.saturating_add(body_bytes),
            error: None,
        }
    }
}

/// Joins an error and all of its sources with `": "`.
///
/// reqwest keeps the interesting part ("Connection refused", "connection
/// reset") several levels down the chain.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
