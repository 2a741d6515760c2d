//! Per-request page context.
//!
//! Every page handler starts from the same two facts: who is asking and
//! from which address. The extractor reads the session cookie pair and
//! validates it against the stored account state; any validation failure
//! downgrades the request to anonymous rather than producing an error
//! page, so a stale cookie behaves like no cookie at all.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use auth_adapters::cookies::SessionCookies;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use domains::models::UserRecord;
use domains::DomainError;
use tracing::{debug, warn};

use crate::AppState;

/// Who is making the request, resolved before any handler runs.
pub struct PageContext {
    /// The validated account, when the cookie pair survived validation.
    pub user: Option<UserRecord>,
    /// Client address, as bound to issued tokens.
    pub address: String,
}

impl FromRequestParts<Arc<AppState>> for PageContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let address = client_address(parts);
        let cookies = parts
            .headers
            .get(COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(SessionCookies::parse)
            .unwrap_or_default();

        let user = match (cookies.account, cookies.token) {
            (Some(account), Some(token)) => {
                match state.sessions.validate(&account, &token, &address).await {
                    Ok(user) => Some(user),
                    Err(DomainError::SessionRejected(reason)) => {
                        debug!(account = %account, reason, "session cookie rejected");
                        None
                    }
                    Err(err) => {
                        warn!(account = %account, error = %err, "session validation failed");
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(PageContext { user, address })
    }
}

/// The peer address recorded by the listener. Empty when the router was
/// built without connect info, in which case no token can validate.
fn client_address(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}
