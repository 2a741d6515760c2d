//! The image page: command dispatch followed by view assembly.
//!
//! `GET` and `POST /image` share one handler because every mutation form
//! lands back on the page it was submitted from. A command that needs a
//! logged-on uploader redirects anonymous visitors to `/logon`; the
//! smaller edit commands just report a message. Whatever the command did,
//! the page for the requested image is assembled afterwards, and partial
//! load failures degrade to messages instead of error pages.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use tracing::{debug, info, warn};

use domains::models::Neighbors;
use domains::query::{MetaFilter, QueryTag, TermKind};
use domains::DomainError;
use services::upload::UploadFields;

use crate::context::PageContext;
use crate::error::ApiError;
use crate::forms::PageForm;
use crate::views::{
    embed_kind, format_when, source_is_url, DuplicateLink, ImagePage, ImageView, PageChrome,
    SlideshowPage, UploadPage,
};
use crate::AppState;

use super::{
    gate_anonymous, message_for, parse_with_filter, redirect_to_logon, render, seed_messages,
    LOGON_TO_ACT,
};

pub async fn image_page(
    State(state): State<Arc<AppState>>,
    ctx: PageContext,
    form: PageForm,
) -> Result<Response, ApiError> {
    if let Some(gate) = gate_anonymous(&state, &ctx) {
        return Ok(gate);
    }
    let mut messages = seed_messages(&form);
    let effect = match run_command(&state, &ctx, &form, &mut messages).await {
        Ok(effect) => effect,
        Err(response) => return Ok(response),
    };
    assemble_page(&state, &ctx, &form, messages, effect).await
}

pub async fn upload_form(
    State(state): State<Arc<AppState>>,
    ctx: PageContext,
    form: PageForm,
) -> Result<Response, ApiError> {
    if let Some(gate) = gate_anonymous(&state, &ctx) {
        return Ok(gate);
    }
    let messages = seed_messages(&form);
    render(&UploadPage {
        chrome: PageChrome::build(&ctx, &form, &messages),
    })
}

/// What a command leaves behind for the page render.
#[derive(Default)]
struct CommandEffect {
    /// The image the page should show, once the id parsed.
    requested: Option<u64>,
    /// Upload batch files that mapped to existing rows.
    duplicates: Vec<DuplicateLink>,
}

/// Runs the form's command, collecting messages. `Err` short-circuits
/// with a finished response (the logon redirects).
async fn run_command(
    state: &AppState,
    ctx: &PageContext,
    form: &PageForm,
    messages: &mut Vec<String>,
) -> Result<CommandEffect, Response> {
    let mut effect = CommandEffect::default();

    match form.value("command") {
        "uploadFile" => {
            let Some(user) = &ctx.user else {
                return Err(redirect_to_logon("You must be logged in to upload images"));
            };
            let fields = UploadFields {
                source: form.value("Source").to_string(),
                tags: form.value("SearchTags").to_string(),
                collection_name: form.value("CollectionName").to_string(),
            };
            info!(user = %user.name, files = form.files.len(), "processing upload");
            match state.uploads.ingest(user, form.files.clone(), &fields).await {
                Ok(outcome) => {
                    state.metrics.uploads.inc_by(outcome.uploaded.len() as u64);
                    state
                        .metrics
                        .duplicate_uploads
                        .inc_by(outcome.duplicates.len() as u64);
                    for (name, err) in &outcome.rejected {
                        messages.push(match err {
                            DomainError::Validation(reason) => format!("{reason}."),
                            _ => format!("{name} could not be saved, internal error."),
                        });
                    }
                    messages.extend(outcome.notes.iter().cloned());
                    effect.duplicates = outcome
                        .duplicates
                        .iter()
                        .map(|(file_name, id)| DuplicateLink {
                            file_name: file_name.clone(),
                            id: *id,
                        })
                        .collect();
                    effect.requested = outcome.landing_id();
                    state
                        .metrics
                        .observe_command("uploadFile", outcome.rejected.is_empty());
                }
                Err(err) => {
                    warn!(user = %user.name, error = %err, "upload failed");
                    messages.push(message_for(&err));
                    state.metrics.observe_command("uploadFile", false);
                }
            }
        }
        "ChangeVote" => {
            let Some(user) = &ctx.user else {
                return Err(redirect_to_logon("You must be logged in to vote on images"));
            };
            if let Some(id) = parsed_id(form, messages) {
                effect.requested = Some(id);
                match form.i64_field("NewVote") {
                    None => messages.push("Failed to parse your vote value.".to_string()),
                    Some(score) => {
                        let ok = match state.commands.vote(user, id, score).await {
                            Ok(()) => {
                                messages.push("Successfully changed vote!".to_string());
                                true
                            }
                            Err(err) => {
                                warn!(user = %user.name, image = id, error = %err, "vote rejected");
                                messages.push(message_for(&err));
                                false
                            }
                        };
                        state.metrics.observe_command("ChangeVote", ok);
                    }
                }
            }
        }
        "ChangeSource" => {
            let Some(user) = &ctx.user else {
                return Err(redirect_to_logon("You must be logged in to edit images"));
            };
            if let Some(id) = parsed_id(form, messages) {
                effect.requested = Some(id);
                let source = form.value("NewSource");
                let ok = match state.commands.set_source(user, id, source).await {
                    Ok(()) => {
                        messages.push("Successfully changed source!".to_string());
                        true
                    }
                    Err(err) => {
                        warn!(user = %user.name, image = id, error = %err, "source change rejected");
                        messages.push(message_for(&err));
                        false
                    }
                };
                state.metrics.observe_command("ChangeSource", ok);
            }
        }
        "ChangeName" => {
            let Some(user) = &ctx.user else {
                return Err(redirect_to_logon("You must be logged in to edit images"));
            };
            if let Some(id) = parsed_id(form, messages) {
                effect.requested = Some(id);
                let name = form.value("NewName");
                let description = form.value("NewDescription");
                let ok = match state.commands.set_name(user, id, name, description).await {
                    Ok(()) => {
                        messages.push("Successfully changed name/description!".to_string());
                        true
                    }
                    Err(err) => {
                        warn!(user = %user.name, image = id, error = %err, "rename rejected");
                        messages.push(message_for(&err));
                        false
                    }
                };
                state.metrics.observe_command("ChangeName", ok);
            }
        }
        "RemoveTag" => match &ctx.user {
            None => messages.push(LOGON_TO_ACT.to_string()),
            Some(user) => {
                if let Some(id) = parsed_id(form, messages) {
                    effect.requested = Some(id);
                    match form.u64_field("TagID") {
                        None => messages.push("Failed to parse the tag id.".to_string()),
                        Some(tag_id) => {
                            let ok = match state.commands.remove_tag(user, id, tag_id).await {
                                Ok(()) => {
                                    messages.push("Tag removed successfully.".to_string());
                                    true
                                }
                                Err(DomainError::NotFound(_)) => {
                                    messages.push(
                                        "Failed to remove the tag. Was it attached in the first place?"
                                            .to_string(),
                                    );
                                    false
                                }
                                Err(err) => {
                                    warn!(user = %user.name, image = id, tag = tag_id, error = %err, "untag rejected");
                                    messages.push(message_for(&err));
                                    false
                                }
                            };
                            state.metrics.observe_command("RemoveTag", ok);
                        }
                    }
                }
            }
        },
        "AddTags" => match &ctx.user {
            None => messages.push(LOGON_TO_ACT.to_string()),
            Some(user) => {
                if let Some(id) = parsed_id(form, messages) {
                    effect.requested = Some(id);
                    let line = form.value("NewTags");
                    let ok = match state.commands.add_tags(user, id, line).await {
                        Ok(applied) => {
                            messages.extend(applied.notes.iter().cloned());
                            true
                        }
                        Err(err) => {
                            warn!(user = %user.name, image = id, error = %err, "tagging rejected");
                            messages.push(message_for(&err));
                            false
                        }
                    };
                    state.metrics.observe_command("AddTags", ok);
                }
            }
        },
        "ChangeRating" => match &ctx.user {
            None => messages.push(LOGON_TO_ACT.to_string()),
            Some(user) => {
                if let Some(id) = parsed_id(form, messages) {
                    effect.requested = Some(id);
                    let rating = form.value("NewRating");
                    let ok = match state.commands.set_rating(user, id, rating).await {
                        Ok(()) => true,
                        Err(err) => {
                            warn!(user = %user.name, image = id, error = %err, "rating change rejected");
                            messages.push(message_for(&err));
                            false
                        }
                    };
                    state.metrics.observe_command("ChangeRating", ok);
                }
            }
        },
        _ => match form.id() {
            Some(id) => effect.requested = Some(id),
            None => messages.push("No image selected.".to_string()),
        },
    }

    Ok(effect)
}

fn parsed_id(form: &PageForm, messages: &mut Vec<String>) -> Option<u64> {
    let id = form.id();
    if id.is_none() {
        messages.push("Failed to parse the image id.".to_string());
    }
    id
}

/// Loads everything the page shows about the requested image. Tag and
/// vote trouble degrade to messages; collection trouble is only logged.
async fn assemble_page(
    state: &AppState,
    ctx: &PageContext,
    form: &PageForm,
    mut messages: Vec<String>,
    effect: CommandEffect,
) -> Result<Response, ApiError> {
    let mut view: Option<ImageView> = None;

    if let Some(id) = effect.requested {
        match state.images.image(id).await {
            Ok(record) => {
                let tags = match state.tags.image_tags(id).await {
                    Ok(tags) => tags,
                    Err(err) => {
                        warn!(image = id, error = %err, "failed to load tags");
                        messages.push("Failed to load tags.".to_string());
                        Vec::new()
                    }
                };
                let collections = match state.collections.collections_with_image(id).await {
                    Ok(collections) => collections,
                    Err(err) => {
                        warn!(image = id, error = %err, "failed to load collections");
                        Vec::new()
                    }
                };
                let own_vote = match &ctx.user {
                    Some(user) => {
                        state
                            .images
                            .user_vote(user.id, id)
                            .await
                            .unwrap_or_else(|err| {
                                warn!(image = id, error = %err, "failed to load own vote");
                                None
                            })
                    }
                    None => None,
                };
                let neighbors = neighbors_for(state, ctx, form, id, &mut messages).await;
                let similar_count = similar_count(state, id).await;

                view = Some(ImageView {
                    id: record.id,
                    source_is_url: source_is_url(&record.source),
                    embed: embed_kind(&record.file_name),
                    score_text: format!("{:.2}", record.score_average),
                    uploaded_text: format_when(record.uploaded_at),
                    file_name: record.file_name,
                    display_name: record.display_name,
                    description: record.description,
                    source: record.source,
                    rating: record.rating,
                    score_voters: record.score_voters,
                    own_vote,
                    tags,
                    collections,
                    previous: neighbors.previous,
                    next: neighbors.next,
                    similar_count,
                });
            }
            Err(err) => {
                warn!(image = id, error = %err, "failed to load image");
                messages.push("Failed to get image information.".to_string());
            }
        }
    }

    let chrome = PageChrome::build(ctx, form, &messages);
    if form.value("ViewMode") == "slideshow" {
        if let Some(view) = view {
            return render(&SlideshowPage { chrome, view });
        }
    }
    render(&ImagePage {
        chrome,
        view,
        duplicates: effect.duplicates,
    })
}

/// Previous and next match within the query the visitor browsed in with.
async fn neighbors_for(
    state: &AppState,
    ctx: &PageContext,
    form: &PageForm,
    image_id: u64,
    messages: &mut Vec<String>,
) -> Neighbors {
    let terms = form.value("SearchTerms");
    if terms.trim().is_empty() {
        return Neighbors::default();
    }
    let Some(query) = parse_with_filter(state, ctx, terms, messages).await else {
        return Neighbors::default();
    };
    match state.images.neighbors(query, image_id).await {
        Ok(neighbors) => neighbors,
        Err(err) => {
            warn!(image = image_id, error = %err, "failed to find query neighbors");
            Neighbors::default()
        }
    }
}

/// Count of near-matches by perceptual hash, minus the image itself.
async fn similar_count(state: &AppState, image_id: u64) -> Option<u64> {
    if !state.settings.show_similar_on_images {
        return None;
    }
    let query = vec![QueryTag {
        name: format!("similar:{image_id}"),
        exclude: false,
        kind: TermKind::Meta(MetaFilter::Similar(image_id)),
    }];
    match state.images.search(query, 0, 1).await {
        Ok(page) if page.total > 1 => Some(page.total - 1),
        Ok(_) => None,
        Err(err) => {
            debug!(image = image_id, error = %err, "similar lookup failed");
            None
        }
    }
}
