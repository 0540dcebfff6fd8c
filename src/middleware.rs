//! Request logging middleware for axum.

use axum::{
    Router,
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{self, HeaderMap, HeaderName, HeaderValue, header, header::AsHeaderName},
    middleware::{self, Next},
    response::Response,
};
use nanoid::nanoid;
use std::{collections::HashSet, fmt, net::SocketAddr, sync::Arc};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

use crate::error::{ErrorHandler, HandlerError, render_error};
use crate::interceptor::{RequestContext, RequestLogInterceptor};

const REQUEST_ID_LEN: usize = 10;

/// State for [`log_requests`]: the interceptor plus the error handler that
/// renders reported handler errors.
#[derive(Clone)]
pub struct AccessLog {
    interceptor: RequestLogInterceptor,
    error_handler: ErrorHandler,
}

impl AccessLog {
    pub fn new(interceptor: RequestLogInterceptor) -> Self {
        Self {
            interceptor,
            error_handler: Arc::new(render_error),
        }
    }

    pub fn with_error_handler(
        mut self,
        handler: impl Fn(&HandlerError) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }
}

impl fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLog")
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}

/// Middleware that writes one access log record per request
///
/// Handler errors (responses carrying a [`HandlerError`]) are passed to the
/// error handler exactly once and logged in the `error` field.
pub async fn log_requests(
    State(access_log): State<AccessLog>,
    req: Request,
    next: Next,
) -> Response {
    let mut exchange = Exchange::new(req, access_log.error_handler.clone());
    let outcome = access_log
        .interceptor
        .intercept(&mut exchange, |exchange| Box::pin(exchange.run(next)))
        .await;
    // Handler errors were already reported; anything returned here goes the same way
    if let Err(err) = outcome {
        exchange.report_error(err);
    }
    exchange.into_response()
}

/// Installs request ID generation and the access log on a router.
///
/// The access log sits outermost, so IDs minted here show up on the response
/// `X-Request-Id` header rather than the inbound request.
pub fn with_access_log<S>(router: Router<S>, access_log: AccessLog) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(NanoRequestId))
        .layer(middleware::from_fn_with_state(access_log, log_requests))
}

/// Generates short nanoid request IDs for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NanoRequestId;

impl MakeRequestId for NanoRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&nanoid!(REQUEST_ID_LEN))
            .ok()
            .map(RequestId::new)
    }
}

/// One request/response pair as seen by the interceptor.
///
/// Request fields are captured up front because the request itself is
/// consumed by the rest of the chain.
struct Exchange {
    remote_ip: String,
    host: String,
    method: String,
    uri: String,
    user_agent: String,
    request_headers: HeaderMap,
    request: Option<Request>,
    response: Option<Response>,
    error_handler: ErrorHandler,
}

impl Exchange {
    fn new(req: Request, error_handler: ErrorHandler) -> Self {
        let headers = req.headers();
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let host = header_str(headers, header::HOST)
            .or_else(|| req.uri().host())
            .unwrap_or_default()
            .to_owned();
        let uri = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.uri().path().to_owned(), |pq| pq.as_str().to_owned());

        Self {
            remote_ip: real_ip(headers, peer),
            host,
            method: req.method().to_string(),
            uri,
            user_agent: header_str(headers, header::USER_AGENT)
                .unwrap_or_default()
                .to_owned(),
            request_headers: headers.clone(),
            request: Some(req),
            response: None,
            error_handler,
        }
    }

    async fn run(&mut self, next: Next) -> Result<(), HandlerError> {
        let Some(request) = self.request.take() else {
            return Ok(());
        };
        let mut response = next.run(request).await;
        let failure = response.extensions_mut().remove::<HandlerError>();
        self.response = Some(response);
        failure.map_or(Ok(()), Err)
    }

    fn into_response(self) -> Response {
        self.response.unwrap_or_else(|| {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
    }
}

impl RequestContext for Exchange {
    type Error = HandlerError;

    fn real_ip(&self) -> String {
        self.remote_ip.clone()
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn request_uri(&self) -> &str {
        &self.uri
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn request_header(&self, name: &str) -> Option<&str> {
        header_str(&self.request_headers, name)
    }

    fn response_status(&self) -> u16 {
        self.response
            .as_ref()
            .map_or(0, |response| response.status().as_u16())
    }

    fn response_size(&self) -> u64 {
        let Some(response) = &self.response else {
            return 0;
        };
        // Streaming bodies have no exact size until written
        response
            .body()
            .size_hint()
            .exact()
            .or_else(|| {
                header_str(response.headers(), header::CONTENT_LENGTH)
                    .and_then(|len| len.parse().ok())
            })
            .unwrap_or(0)
    }

    fn response_header(&self, name: &str) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|response| header_str(response.headers(), name))
    }

    fn report_error(&mut self, err: HandlerError) {
        let mut rendered = (self.error_handler)(&err);
        if let Some(previous) = self.response.take() {
            // Keep headers set further down the chain, e.g. the request ID,
            // including every value of repeated ones like Set-Cookie
            let own: HashSet<HeaderName> = rendered.headers().keys().cloned().collect();
            for (name, value) in previous.headers() {
                if *name != header::CONTENT_LENGTH && !own.contains(name) {
                    rendered.headers_mut().append(name.clone(), value.clone());
                }
            }
        }
        self.response = Some(rendered);
    }
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Client address as seen through reverse proxies
///
/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn real_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    let real = header_str(headers, "x-real-ip")
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded.or(real) {
        Some(ip) => ip.to_owned(),
        None => peer.map(|addr| addr.ip().to_string()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn request(uri: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::HOST, "shop.example.com")
            .header(header::USER_AGENT, "curl/8.4.0")
            .header("x-request-id", "from-client")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_real_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        let peer = Some("127.0.0.1:5000".parse().unwrap());
        assert_eq!(real_ip(&headers, peer), "198.51.100.4");
    }

    #[test]
    fn test_real_ip_falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        let peer = Some("127.0.0.1:5000".parse().unwrap());
        assert_eq!(real_ip(&headers, peer), "10.0.0.9");
        assert_eq!(real_ip(&HeaderMap::new(), peer), "127.0.0.1");
        assert_eq!(real_ip(&HeaderMap::new(), None), "");
    }

    #[test]
    fn test_exchange_captures_request_fields() {
        let exchange = Exchange::new(request("/cart/items?limit=5"), Arc::new(render_error));
        assert_eq!(exchange.host(), "shop.example.com");
        assert_eq!(exchange.method(), "POST");
        assert_eq!(exchange.request_uri(), "/cart/items?limit=5");
        assert_eq!(exchange.user_agent(), "curl/8.4.0");
        assert_eq!(exchange.request_header("x-request-id"), Some("from-client"));
        assert_eq!(exchange.response_status(), 0);
        assert_eq!(exchange.response_size(), 0);
        assert_eq!(exchange.response_header("x-request-id"), None);
    }

    #[test]
    fn test_exchange_response_fields() {
        let mut exchange = Exchange::new(request("/"), Arc::new(render_error));
        let mut response = (http::StatusCode::CREATED, "created!").into_response();
        response
            .headers_mut()
            .insert("x-request-id", HeaderValue::from_static("k3x9a"));
        exchange.response = Some(response);

        assert_eq!(exchange.response_status(), 201);
        assert_eq!(exchange.response_size(), 8);
        assert_eq!(exchange.response_header("x-request-id"), Some("k3x9a"));
    }

    #[test]
    fn test_report_error_renders_and_keeps_headers() {
        let mut exchange = Exchange::new(request("/"), Arc::new(render_error));
        let mut failed = HandlerError::internal("boom").into_response();
        failed
            .headers_mut()
            .insert("x-request-id", HeaderValue::from_static("k3x9a"));
        exchange.response = Some(failed);

        exchange.report_error(HandlerError::new(http::StatusCode::BAD_GATEWAY, "upstream"));

        assert_eq!(exchange.response_status(), 502);
        assert_eq!(exchange.response_size(), 8);
        assert_eq!(exchange.response_header("x-request-id"), Some("k3x9a"));
    }

    #[test]
    fn test_report_error_keeps_repeated_headers() {
        let mut exchange = Exchange::new(request("/"), Arc::new(render_error));
        let mut failed = HandlerError::internal("boom").into_response();
        failed
            .headers_mut()
            .append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        failed
            .headers_mut()
            .append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        exchange.response = Some(failed);

        exchange.report_error(HandlerError::internal("boom"));

        let response = exchange.response.as_ref().unwrap();
        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(response.headers().get_all(header::CONTENT_TYPE).iter().count(), 1);
    }

    #[test]
    fn test_streamed_body_without_length_logs_zero_size() {
        let mut exchange = Exchange::new(request("/"), Arc::new(render_error));
        let chunks = Body::from("streamed chunk").into_data_stream();
        exchange.response = Some(Response::new(Body::from_stream(chunks)));

        assert_eq!(exchange.response_status(), 200);
        assert_eq!(exchange.response_size(), 0);
    }

    #[test]
    fn test_streamed_body_uses_content_length() {
        let mut exchange = Exchange::new(request("/"), Arc::new(render_error));
        let chunks = Body::from("streamed chunk").into_data_stream();
        let mut response = Response::new(Body::from_stream(chunks));
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("14"));
        exchange.response = Some(response);

        assert_eq!(exchange.response_size(), 14);
    }

    #[test]
    fn test_nano_request_id_length() {
        let request = http::Request::new(());
        let id = NanoRequestId.make_request_id(&request).unwrap();
        assert_eq!(id.header_value().len(), REQUEST_ID_LEN);
    }
}
