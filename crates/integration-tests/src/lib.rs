//! Shared fixtures for the handler tests.
//!
//! Tests drive the real router with `tower::ServiceExt::oneshot` against
//! mocked ports. Requests built here carry the connect info the session
//! layer binds tokens to, and optionally the session cookie pair, so a
//! test reads like a browser session.

use std::net::SocketAddr;
use std::sync::Arc;

use api_adapters::{router, AppState, Ports, SiteSettings};
use auth_adapters::cookies::{ACCOUNT_COOKIE, TOKEN_COOKIE};
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_TYPE, COOKIE};
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use domains::models::{ImageRecord, ImageSummary, SessionState, TagRecord, UserRecord};
use domains::permissions::Permissions;
use domains::ports::{
    MockAccountRepo, MockAuditRepo, MockCollectionRepo, MockImageRepo, MockMediaStore, MockTagRepo,
};
use services::Policy;

/// Address every fixture request appears to come from.
pub const CLIENT_IP: &str = "203.0.113.9";

/// The token the cookie fixtures present.
pub const TOKEN: &str = "123e4567-e89b-42d3-a456-426614174000";

pub const MULTIPART_BOUNDARY: &str = "fixture-boundary";

/// The mocked driven adapters, one per port. Tests set expectations on
/// the fields, then turn the bundle into a router.
pub struct TestPorts {
    pub accounts: MockAccountRepo,
    pub images: MockImageRepo,
    pub tags: MockTagRepo,
    pub collections: MockCollectionRepo,
    pub media: MockMediaStore,
}

impl Default for TestPorts {
    fn default() -> Self {
        TestPorts {
            accounts: MockAccountRepo::new(),
            images: MockImageRepo::new(),
            tags: MockTagRepo::new(),
            collections: MockCollectionRepo::new(),
            media: MockMediaStore::new(),
        }
    }
}

impl TestPorts {
    /// Stores a live session for `user` so requests carrying
    /// [`session_cookie`] for that account resolve to it.
    pub fn logged_on(mut self, user: &UserRecord) -> Self {
        let record = user.clone();
        self.accounts.expect_session_state().returning(|_| {
            Ok(SessionState {
                disabled: false,
                token: Some(TOKEN.to_string()),
                ip: Some(CLIENT_IP.to_string()),
            })
        });
        self.accounts
            .expect_user_by_name()
            .returning(move |_| Ok(record.clone()));
        self
    }

    pub fn into_router(self) -> Router {
        self.into_router_with(SiteSettings::default(), Policy::default())
    }

    /// Audit writes are accepted and discarded; the services already have
    /// unit coverage for what gets audited.
    pub fn into_router_with(self, settings: SiteSettings, policy: Policy) -> Router {
        let mut audit = MockAuditRepo::new();
        audit.expect_record().returning(|_, _, _| Ok(()));
        let ports = Ports {
            accounts: Arc::new(self.accounts),
            images: Arc::new(self.images),
            tags: Arc::new(self.tags),
            collections: Arc::new(self.collections),
            media: Arc::new(self.media),
            audit: Arc::new(audit),
        };
        router(AppState::assemble(ports, policy, settings))
    }
}

/// Settings with the similar-image lookup off, so image-page tests do not
/// have to mock the extra search call.
pub fn plain_settings() -> SiteSettings {
    SiteSettings {
        show_similar_on_images: false,
        ..SiteSettings::default()
    }
}

pub fn user(id: u64, name: &str, permissions: Permissions) -> UserRecord {
    UserRecord {
        id,
        name: name.into(),
        disabled: false,
        permissions,
        search_filter: String::new(),
        created_at: Utc::now(),
    }
}

pub fn image(id: u64, uploader_id: u64) -> ImageRecord {
    ImageRecord {
        id,
        file_name: format!("{id:064x}.png"),
        display_name: format!("image-{id}"),
        description: String::new(),
        uploader_id,
        source: String::new(),
        rating: "unrated".into(),
        score_total: 0,
        score_voters: 0,
        score_average: 0.0,
        perceptual_hash: None,
        uploaded_at: Utc::now(),
    }
}

pub fn summary(id: u64, file_name: &str) -> ImageSummary {
    ImageSummary {
        id,
        file_name: file_name.into(),
        display_name: file_name.into(),
        rating: "safe".into(),
    }
}

pub fn tag(id: u64, name: &str) -> TagRecord {
    TagRecord {
        id,
        name: name.into(),
        description: String::new(),
        creator_id: 1,
        created_at: Utc::now(),
    }
}

pub fn session_cookie(account: &str) -> String {
    format!("{ACCOUNT_COOKIE}={account}; {TOKEN_COOKIE}={TOKEN}")
}

/// The listener normally records the peer address; oneshot requests have
/// to carry it themselves or no token can validate.
fn with_connect_info(mut req: Request<Body>) -> Request<Body> {
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 54321))));
    req
}

pub fn get(uri: &str) -> Request<Body> {
    with_connect_info(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("building the request"),
    )
}

pub fn get_as(uri: &str, account: &str) -> Request<Body> {
    with_connect_info(
        Request::builder()
            .uri(uri)
            .header(COOKIE, session_cookie(account))
            .body(Body::empty())
            .expect("building the request"),
    )
}

pub fn post_form(uri: &str, body: &str) -> Request<Body> {
    with_connect_info(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("building the request"),
    )
}

pub fn post_form_as(uri: &str, account: &str, body: &str) -> Request<Body> {
    with_connect_info(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(COOKIE, session_cookie(account))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("building the request"),
    )
}

/// A `multipart/form-data` body from text fields and `fileToUpload` parts.
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"fileToUpload\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn post_multipart_as(uri: &str, account: &str, body: Vec<u8>) -> Request<Body> {
    with_connect_info(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(COOKIE, session_cookie(account))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("building the request"),
    )
}

pub fn post_multipart(uri: &str, body: Vec<u8>) -> Request<Body> {
    with_connect_info(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("building the request"),
    )
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("reading the response body");
    String::from_utf8(bytes.to_vec()).expect("response body is not UTF-8")
}
