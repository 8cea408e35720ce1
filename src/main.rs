use axum::{
    http::{HeaderName, Request},
    routing::get,
    Router,
};
use std::{sync::Arc, time::Duration};
use tokio::signal;
use tokio::sync::{mpsc, RwLock};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use metafeed::config::Config;
use metafeed::feed::FeedAdapter;
use metafeed::metrics;
use metafeed::monitor::TransactionMonitor;
use metafeed::routes::{healthz, message_routes, metrics_endpoint, readyz, MonitorState};

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("tungstenite=warn".parse().unwrap());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .json(),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_logging();

    let config = Config::from_env()?;
    let addr = config.socket_addr();

    info!("Initializing metrics...");
    let metrics_handle = metrics::init_metrics();
    info!("Metrics initialized");

    info!("Starting metafeed monitor");
    info!(feed_url = %config.feed_url(), "Feed endpoint");
    info!(host = %config.server_host, port = %config.server_port, "Server configuration");
    info!(
        max_queue_size = config.max_queue_size,
        max_incomplete_messages = config.max_incomplete_messages,
        "Pipeline limits"
    );

    let monitor = Arc::new(RwLock::new(TransactionMonitor::new(&config)));

    // Connect to the feed. A node that cannot be reached within the
    // connect timeout is a hard startup failure; reconnection only covers
    // connections lost later.
    info!("Connecting to event feed...");
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut adapter = FeedAdapter::new(&config);
    adapter
        .start(events_tx)
        .await
        .map_err(|e| anyhow::anyhow!("Feed connection failed: {}", e))?;
    info!("Event feed connected");

    // The event pump is the single writer of pipeline state.
    let pump_monitor = monitor.clone();
    let pump = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            pump_monitor.write().await.handle_event(event);
        }
        info!("Event pump finished");
    });

    let state = MonitorState {
        monitor,
        connected: adapter.connected(),
        metrics_handle,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_endpoint))
        .nest("/v1", message_routes())
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                })
                .on_response(|response: &axum::http::Response<_>, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = %response.status().as_u16(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                })
                .on_failure(|error: tower_http::classify::ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                    tracing::error!(
                        error = %error,
                        latency_ms = %latency.as_millis(),
                        "request failed"
                    );
                }),
        )
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping feed adapter...");
    adapter.stop();
    pump.abort();

    info!("Shutdown complete");
    Ok(())
}
