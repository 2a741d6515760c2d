//! # api-adapters
//!
//! The HTTP surface of tagboard: an axum router over server-rendered
//! askama pages. Handlers talk to the service layer and the port traits
//! only; the binary decides which concrete adapters sit behind them.
//!
//! Routes:
//! - `GET /` redirects to the browse page
//! - `GET /images` paged tag search
//! - `GET|POST /image` image page and its mutation commands
//! - `GET /uploadform` the upload form
//! - `GET|POST /logon` session establishment and teardown
//! - `GET /metrics` OpenMetrics counters
//! - `/files`, `/thumbs` static media

pub mod context;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod metrics;
pub mod views;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use domains::ports::{AccountRepo, AuditRepo, CollectionRepo, ImageRepo, MediaStore, TagRepo};
use services::audit::AuditTrail;
use services::images::ImageCommands;
use services::query::QueryService;
use services::session::SessionService;
use services::upload::UploadService;
use services::Policy;

use crate::metrics::Metrics;

/// Deployment switches the handlers consult per request.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// When set, every page except `/logon` requires a session.
    pub account_required_to_view: bool,
    /// Whether image pages run the perceptual-hash similarity count.
    pub show_similar_on_images: bool,
    /// Results per browse page.
    pub page_stride: u64,
    /// Request body cap, sized for multipart upload batches.
    pub max_upload_bytes: usize,
    /// Directory served at `/files`.
    pub files_root: PathBuf,
    /// Directory served at `/thumbs`.
    pub thumbs_root: PathBuf,
}

impl Default for SiteSettings {
    fn default() -> Self {
        SiteSettings {
            account_required_to_view: false,
            show_similar_on_images: true,
            page_stride: 30,
            max_upload_bytes: 100 * 1024 * 1024,
            files_root: PathBuf::from("./data/images"),
            thumbs_root: PathBuf::from("./data/images/thumbs"),
        }
    }
}

/// The driven adapters the application runs on.
pub struct Ports {
    pub accounts: Arc<dyn AccountRepo>,
    pub images: Arc<dyn ImageRepo>,
    pub tags: Arc<dyn TagRepo>,
    pub collections: Arc<dyn CollectionRepo>,
    pub media: Arc<dyn MediaStore>,
    pub audit: Arc<dyn AuditRepo>,
}

/// Shared state behind every handler: the services, the repos the view
/// assembly reads directly, and the counters.
pub struct AppState {
    pub images: Arc<dyn ImageRepo>,
    pub tags: Arc<dyn TagRepo>,
    pub collections: Arc<dyn CollectionRepo>,
    pub sessions: SessionService,
    pub queries: QueryService,
    pub commands: ImageCommands,
    pub uploads: UploadService,
    pub settings: SiteSettings,
    pub metrics: Metrics,
}

impl AppState {
    pub fn assemble(ports: Ports, policy: Policy, settings: SiteSettings) -> Arc<Self> {
        let audit = AuditTrail::new(ports.audit);
        Arc::new(AppState {
            sessions: SessionService::new(ports.accounts, audit.clone()),
            queries: QueryService::new(ports.tags.clone()),
            commands: ImageCommands::new(
                ports.images.clone(),
                ports.tags.clone(),
                audit.clone(),
                policy,
            ),
            uploads: UploadService::new(
                ports.images.clone(),
                ports.tags.clone(),
                ports.collections.clone(),
                ports.media,
                audit,
                policy,
            ),
            metrics: Metrics::new(),
            images: ports.images,
            tags: ports.tags,
            collections: ports.collections,
            settings,
        })
    }
}

/// The full application router. Observability layers are the binary's
/// business; this only mounts routes, static media and the body cap.
pub fn router(state: Arc<AppState>) -> Router {
    let files = ServeDir::new(&state.settings.files_root);
    let thumbs = ServeDir::new(&state.settings.thumbs_root);
    let body_cap = state.settings.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::browse::home))
        .route("/images", get(handlers::browse::browse_page))
        .route(
            "/image",
            get(handlers::image::image_page).post(handlers::image::image_page),
        )
        .route("/uploadform", get(handlers::image::upload_form))
        .route(
            "/logon",
            get(handlers::logon::logon_page).post(handlers::logon::logon_action),
        )
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest_service("/files", files)
        .nest_service("/thumbs", thumbs)
        .layer(DefaultBodyLimit::max(body_cap))
        .with_state(state)
}
