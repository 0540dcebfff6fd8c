//! Demo server with the access log installed.
//!
//! Routes:
//! - `/` answers 200
//! - `/status/{code}` answers with the requested status
//! - `/redirect` answers 302
//! - `/fail` returns a handler error
//! - anything else falls through to 404

use access_log::{
    AccessLog, Config, RequestLogInterceptor, TracingSink, cli::Cli, colors::ConsoleSink,
    handlers, with_access_log,
};
use axum::{Router, routing::get};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args: Cli = argh::from_env();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let config = if args.pretty {
        Config::new(ConsoleSink)
    } else {
        Config::new(TracingSink)
    }
    .skip_2xx(args.skip_2xx);
    let access_log = AccessLog::new(RequestLogInterceptor::build(config));

    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/status/{code}", get(handlers::status))
        .route("/redirect", get(handlers::redirect))
        .route("/fail", get(handlers::fail));
    let app = with_access_log(app, access_log);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("Server running on: http://{}", listener.local_addr()?);
    if args.skip_2xx {
        info!("Skipping access log for 2xx responses");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
