//! Request materialisation, execution, error classification, and the request worker.
mod classify;
mod executor;
mod provider;
mod template;
mod wire;
mod worker;


pub use classify::classify_transport_error;
pub use executor::{Exchange, HttpExecutor, ReqwestExecutor};
pub use provider::{ClientSettings, ExecutorProvider, build_client, build_executor_provider};
pub use template::{FormPart, RequestTemplate, TemplateBody};
pub use wire::{request_wire_size, response_head_size};
pub use worker::{RequestWorker, WorkerContext};
