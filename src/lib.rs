//! Access log interceptor for HTTP handler chains.
//!
//! [`RequestLogInterceptor`] wraps the next step of a chain and emits one
//! structured record per request, classified by response status.

pub mod cli;
pub mod colors;
pub mod error;
pub mod handlers;
pub mod interceptor;
pub mod middleware;
pub mod record;
pub mod sink;

pub use error::HandlerError;
pub use interceptor::{Config, RequestContext, RequestLogInterceptor};
pub use middleware::{AccessLog, log_requests, with_access_log};
pub use record::RequestRecord;
pub use sink::{LogSink, MemorySink, TracingSink};
