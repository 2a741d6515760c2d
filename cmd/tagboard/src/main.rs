//! # tagboard server
//!
//! Wires the concrete adapters to the router: configuration, tracing,
//! the MariaDB pool (with migrations), the local media store, and the
//! axum listener with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState, Ports, SiteSettings};
use configs::AppConfig;
use secrecy::ExposeSecret;
use services::Policy;
use storage_adapters::{LocalMediaStore, MariaRepo};
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(config.log_json);

    // sqlx's rustls backend needs a process-wide crypto provider before
    // the first connection.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let repo = Arc::new(
        MariaRepo::connect(
            config.database_url.expose_secret(),
            config.database_max_connections,
            config.similar_distance,
        )
        .await
        .context("connecting to the database")?,
    );
    let media = LocalMediaStore::open(config.image_directory.clone(), config.thumbs_directory())
        .await
        .context("opening the media store")?;

    let ports = Ports {
        accounts: repo.clone(),
        images: repo.clone(),
        tags: repo.clone(),
        collections: repo.clone(),
        media: Arc::new(media),
        audit: repo,
    };
    let policy = Policy {
        users_control_own_objects: config.users_control_own_objects,
    };
    let settings = SiteSettings {
        account_required_to_view: config.account_required_to_view,
        show_similar_on_images: config.show_similar_on_images,
        page_stride: config.page_stride,
        max_upload_bytes: config.max_upload_bytes,
        files_root: config.image_directory.clone(),
        thumbs_root: config.thumbs_directory(),
    };

    let state = AppState::assemble(ports, policy, settings);
    // Router::layer wraps everything added so far, so the last layer here
    // is the outermost: request ids exist before the trace span opens.
    let app = router(state)
        .layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "tagboard listening");

    // Tokens are bound to the client address, so the router needs
    // connect info.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    info!("tagboard stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("installing the Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing the SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
