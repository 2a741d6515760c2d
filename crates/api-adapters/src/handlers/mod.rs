//! Page handlers and the helpers they share.

pub mod browse;
pub mod image;
pub mod logon;

use std::sync::Arc;

use askama::Template;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Redirect, Response};
use tracing::warn;

use domains::query::QueryTag;
use domains::DomainError;

use crate::context::PageContext;
use crate::error::ApiError;
use crate::forms::PageForm;
use crate::views::encode_query;
use crate::AppState;

pub(crate) const LOGON_TO_ACT: &str = "You must be logged in to perform that action.";

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub(crate) fn render<T: Template>(template: &T) -> Result<Response, ApiError> {
    Ok(Html(template.render()?).into_response())
}

pub(crate) fn redirect_to_logon(message: &str) -> Response {
    Redirect::to(&format!("/logon?prevMessage={}", encode_query(message))).into_response()
}

/// The account gate for viewing pages. `/logon` itself is never gated.
pub(crate) fn gate_anonymous(state: &AppState, ctx: &PageContext) -> Option<Response> {
    if ctx.user.is_none() && state.settings.account_required_to_view {
        return Some(redirect_to_logon("Access to this server requires an account"));
    }
    None
}

/// Messages start out with whatever a redirect carried over.
pub(crate) fn seed_messages(form: &PageForm) -> Vec<String> {
    let prev = form.value("prevMessage");
    if prev.is_empty() {
        Vec::new()
    } else {
        vec![prev.to_string()]
    }
}

/// One visitor-facing line per failure kind. Internal detail stays in the
/// log; validation and permission reasons are already written for people.
pub(crate) fn message_for(err: &DomainError) -> String {
    match err {
        DomainError::NotFound(what) => format!("The requested {what} could not be found."),
        DomainError::Validation(msg) | DomainError::PermissionDenied(msg) => format!("{msg}."),
        DomainError::SessionRejected(_) => LOGON_TO_ACT.to_string(),
        DomainError::Database(_) | DomainError::Storage(_) => {
            "Internal error, please try again.".to_string()
        }
    }
}

/// Parses browse terms together with the viewer's stored filter. A
/// rejected query reports a message and yields no result rows.
pub(crate) async fn parse_with_filter(
    state: &AppState,
    ctx: &PageContext,
    terms: &str,
    messages: &mut Vec<String>,
) -> Option<Vec<QueryTag>> {
    let filter = ctx.user.as_ref().map(|user| user.search_filter.as_str());
    match state.queries.parse(terms, filter).await {
        Ok(query) => Some(query),
        Err(err) => {
            warn!(error = %err, "search query rejected");
            messages.push(message_for(&err));
            None
        }
    }
}

pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .encode_text()
        .map_err(|err| ApiError::Internal(format!("metrics encoding failed: {err}")))?;
    Ok(([(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response())
}
