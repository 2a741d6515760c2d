//! The browse page: paged search results as a thumbnail grid.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Redirect, Response};
use tracing::warn;

use crate::context::PageContext;
use crate::error::ApiError;
use crate::forms::PageForm;
use crate::views::{BrowsePage, PageChrome};
use crate::AppState;

use super::{gate_anonymous, parse_with_filter, render, seed_messages};

pub async fn home() -> Redirect {
    Redirect::to("/images")
}

pub async fn browse_page(
    State(state): State<Arc<AppState>>,
    ctx: PageContext,
    form: PageForm,
) -> Result<Response, ApiError> {
    if let Some(gate) = gate_anonymous(&state, &ctx) {
        return Ok(gate);
    }
    let mut messages = seed_messages(&form);
    let stride = state.settings.page_stride.max(1);
    let page = form.u64_field("Page").unwrap_or(1).max(1);
    // Page is visitor-supplied and may be absurd; a saturated offset just
    // lands past the last match.
    let offset = page.saturating_sub(1).saturating_mul(stride);

    let mut items = Vec::new();
    let mut total = 0;
    if let Some(query) =
        parse_with_filter(&state, &ctx, form.value("SearchTerms"), &mut messages).await
    {
        match state.images.search(query, offset, stride).await {
            Ok(found) => {
                items = found.items;
                total = found.total;
            }
            Err(err) => {
                warn!(error = %err, "image search failed");
                messages.push("Failed to search images.".to_string());
            }
        }
    }

    let page_count = total.div_ceil(stride).max(1);
    render(&BrowsePage {
        chrome: PageChrome::build(&ctx, &form, &messages),
        items,
        page,
        page_count,
        total,
        previous_page: (page > 1).then(|| page - 1),
        next_page: (page < page_count).then(|| page + 1),
    })
}
