use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::args::{DEFAULT_USER_AGENT, HttpVersion};
use crate::error::{AppError, AppResult, HttpError};

use super::executor::{HttpExecutor, ReqwestExecutor};

/// Idle pooled connections are closed after this long, so the drain sees
/// the open-connection count fall once workers stop.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub http_version: HttpVersion,
    pub dial_timeout: Duration,
    pub request_timeout: Option<Duration>,
}

/// Hands each worker its execution capability.
///
/// Chosen once at setup from the protocol version so the hot loop never
/// branches on it.
#[derive(Debug, Clone)]
pub enum ExecutorProvider {
    /// One pooled client for all workers (HTTP/1.1).
    Shared(Arc<dyn HttpExecutor>),
    /// One client per worker (HTTP/2), keeping a connection per worker.
    Dedicated(Arc<[Arc<dyn HttpExecutor>]>),
}

impl ExecutorProvider {
    #[must_use]
    pub fn shared(executor: Arc<dyn HttpExecutor>) -> Self {
        ExecutorProvider::Shared(executor)
    }

    /// # Errors
    ///
    /// Returns an error when `executors` is empty.
    pub fn dedicated(executors: Vec<Arc<dyn HttpExecutor>>) -> AppResult<Self> {
        if executors.is_empty() {
            return Err(AppError::http(HttpError::EmptyExecutorPool));
        }
        Ok(ExecutorProvider::Dedicated(Arc::from(executors)))
    }

    /// Executor for worker `worker_id`; dedicated pools wrap around.
    ///
    /// # Errors
    ///
    /// Returns an error when a dedicated pool is empty.
    pub fn for_worker(&self, worker_id: usize) -> AppResult<Arc<dyn HttpExecutor>> {
        match self {
            ExecutorProvider::Shared(executor) => Ok(Arc::clone(executor)),
            ExecutorProvider::Dedicated(executors) => worker_id
                .checked_rem(executors.len())
                .and_then(|idx| executors.get(idx))
                .map(Arc::clone)
                .ok_or_else(|| AppError::http(HttpError::EmptyExecutorPool)),
        }
    }
}

/// Builds one reqwest client honouring the dial/request timeouts and protocol.
///
/// # Errors
///
/// Returns an error when the TLS backend or client cannot be initialised.
pub fn build_client(settings: &ClientSettings) -> AppResult<Client> {
    let mut builder = Client::builder()
        .connect_timeout(settings.dial_timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT);

    if let Some(timeout) = settings.request_timeout {
        builder = builder.timeout(timeout);
    }

    builder = match settings.http_version {
        HttpVersion::V1_1 => builder.http1_only(),
        HttpVersion::V2 => builder.http2_prior_knowledge().pool_max_idle_per_host(1),
    };

    builder
        .build()
        .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))
}

/// Shared pooled client for HTTP/1.1, one dedicated client per worker for HTTP/2.
///
/// # Errors
///
/// Returns an error when any client cannot be built.
pub fn build_executor_provider(
    settings: &ClientSettings,
    concurrency: usize,
) -> AppResult<ExecutorProvider> {
    match settings.http_version {
        HttpVersion::V1_1 => {
            debug!("Using one shared HTTP/1.1 client for {} workers", concurrency);
            let executor: Arc<dyn HttpExecutor> =
                Arc::new(ReqwestExecutor::new(build_client(settings)?));
            Ok(ExecutorProvider::shared(executor))
        }
        HttpVersion::V2 => {
            debug!("Building {} dedicated HTTP/2 clients", concurrency);
            let mut executors: Vec<Arc<dyn HttpExecutor>> = Vec::with_capacity(concurrency);
            for _ in 0..concurrency {
                executors.push(Arc::new(ReqwestExecutor::new(build_client(settings)?)));
            }
            ExecutorProvider::dedicated(executors)
        }
    }
}
