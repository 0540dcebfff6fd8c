//! Request logging interceptor.
//!
//! Wraps the next step of a handler chain, times it, and emits exactly one
//! classified access log record per request through the configured sink.

use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Instant};

use crate::record::{RequestRecord, classify};
use crate::sink::LogSink;

/// Header carrying the request correlation ID, on either side of the exchange.
pub const X_REQUEST_ID: &str = "x-request-id";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// View of one in-flight request/response exchange, provided by the host server.
pub trait RequestContext: Send {
    /// Opaque error returned by the next step of the chain
    type Error: fmt::Display + Send;

    fn real_ip(&self) -> String;
    fn host(&self) -> &str;
    fn method(&self) -> &str;
    /// Path and query as received
    fn request_uri(&self) -> &str;
    fn user_agent(&self) -> &str;
    fn request_header(&self, name: &str) -> Option<&str>;

    fn response_status(&self) -> u16;
    /// Bytes written (or known to be written) for the response body
    fn response_size(&self) -> u64;
    fn response_header(&self, name: &str) -> Option<&str>;

    /// Hands a handler error to the host's own error-response logic.
    fn report_error(&mut self, err: Self::Error);
}

/// Interceptor settings, fixed once the interceptor is built.
#[derive(Clone)]
pub struct Config {
    sink: Arc<dyn LogSink>,
    skip_2xx: bool,
}

impl Config {
    pub fn new(sink: impl LogSink) -> Self {
        Self::from_shared(Arc::new(sink))
    }

    pub fn from_shared(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            skip_2xx: false,
        }
    }

    /// Do not log requests answered with a 2xx status
    pub fn skip_2xx(mut self, skip: bool) -> Self {
        self.skip_2xx = skip;
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("skip_2xx", &self.skip_2xx)
            .finish_non_exhaustive()
    }
}

/// Produces access-logging wrappers around handler chains.
///
/// Cloning is cheap; every clone shares the same sink.
#[derive(Debug, Clone)]
pub struct RequestLogInterceptor {
    config: Config,
}

impl RequestLogInterceptor {
    pub fn build(config: Config) -> Self {
        Self { config }
    }

    /// Wraps `next` in a handler with the same signature that logs every call.
    pub fn wrap<C, F>(
        &self,
        next: F,
    ) -> impl for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), C::Error>> + Clone + Send + Sync + 'static
    where
        C: RequestContext + 'static,
        F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), C::Error>> + Send + Sync + 'static,
    {
        let interceptor = self.clone();
        let next = Arc::new(next);
        handler_fn(move |ctx: &mut C| {
            let interceptor = interceptor.clone();
            let next = Arc::clone(&next);
            Box::pin(async move { interceptor.intercept(ctx, |ctx| (*next)(ctx)).await })
        })
    }

    /// Runs `next` for one request and logs the outcome.
    ///
    /// Always returns `Ok(())`. A handler error is forwarded to
    /// [`RequestContext::report_error`] exactly once and recorded in the
    /// `error` field instead of being returned.
    pub async fn intercept<C, F>(&self, ctx: &mut C, next: F) -> Result<(), C::Error>
    where
        C: RequestContext,
        F: for<'b> FnOnce(&'b mut C) -> BoxFuture<'b, Result<(), C::Error>> + Send,
    {
        let start = Instant::now();
        let result = next(&mut *ctx).await;
        let elapsed = start.elapsed();

        let error = match result {
            Ok(()) => None,
            Err(err) => {
                let message = err.to_string();
                ctx.report_error(err);
                Some(message)
            }
        };

        // Read after reporting so the error handler's status is what gets logged
        let record = RequestRecord {
            remote_ip: ctx.real_ip(),
            elapsed,
            host: ctx.host().to_owned(),
            request: format!("{} {}", ctx.method(), ctx.request_uri()),
            status: ctx.response_status(),
            size: ctx.response_size(),
            user_agent: ctx.user_agent().to_owned(),
            request_id: resolve_request_id(ctx),
            error,
        };

        if let Some(class) = classify(record.status, self.config.skip_2xx) {
            self.config.sink.emit(class.level, class.message, &record);
        }
        Ok(())
    }
}

/// Request header wins; the response header is the fallback. Empty counts as absent.
fn resolve_request_id<C: RequestContext>(ctx: &C) -> Option<String> {
    [ctx.request_header(X_REQUEST_ID), ctx.response_header(X_REQUEST_ID)]
        .into_iter()
        .flatten()
        .find(|id| !id.is_empty())
        .map(str::to_owned)
}

// Pins the closure to a higher-ranked signature
fn handler_fn<C, E, F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), E>>,
{
    f
}
