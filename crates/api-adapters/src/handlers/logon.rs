//! The logon page and the session cookie boundary.
//!
//! This page is never behind the account gate; it is where the gate
//! sends people. Logon failures re-render the form with a message and
//! deliberately do not say whether the account exists.

use std::sync::Arc;

use auth_adapters::cookies::{clear_cookies, issue_cookies};
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use tracing::{info, warn};

use domains::DomainError;

use crate::context::PageContext;
use crate::error::ApiError;
use crate::forms::PageForm;
use crate::views::{LogonPage, PageChrome};
use crate::AppState;

use super::{render, seed_messages};

pub async fn logon_page(
    State(_state): State<Arc<AppState>>,
    ctx: PageContext,
    form: PageForm,
) -> Result<Response, ApiError> {
    let messages = seed_messages(&form);
    render(&LogonPage {
        logged_on: ctx.user.is_some(),
        chrome: PageChrome::build(&ctx, &form, &messages),
    })
}

pub async fn logon_action(
    State(state): State<Arc<AppState>>,
    ctx: PageContext,
    form: PageForm,
) -> Result<Response, ApiError> {
    let mut messages = seed_messages(&form);
    match form.value("command") {
        "logon" => {
            let name = form.value("AccountName").trim().to_string();
            let password = form.value("Password");
            match state.sessions.logon(&name, password, &ctx.address).await {
                Ok((user, token)) => {
                    info!(account = %user.name, "logon succeeded");
                    let [account_cookie, token_cookie] = issue_cookies(&user.name, &token);
                    Ok((
                        AppendHeaders([(SET_COOKIE, account_cookie), (SET_COOKIE, token_cookie)]),
                        Redirect::to("/images"),
                    )
                        .into_response())
                }
                Err(err) => {
                    info!(account = %name, error = %err, "logon rejected");
                    messages.push(
                        match err {
                            DomainError::SessionRejected("account disabled") => {
                                "This account is disabled."
                            }
                            DomainError::SessionRejected(_) => {
                                "Either the account name or password is incorrect."
                            }
                            _ => "Internal error, please try again.",
                        }
                        .to_string(),
                    );
                    render(&LogonPage {
                        logged_on: false,
                        chrome: PageChrome::build(&ctx, &form, &messages),
                    })
                }
            }
        }
        "logout" => {
            if let Some(user) = &ctx.user {
                if let Err(err) = state.sessions.logout(user).await {
                    warn!(account = %user.name, error = %err, "logout failed");
                }
            }
            // The cookies expire either way; a dangling server-side token
            // only dies at the next logon.
            let [account_cookie, token_cookie] = clear_cookies();
            Ok((
                AppendHeaders([(SET_COOKIE, account_cookie), (SET_COOKIE, token_cookie)]),
                Redirect::to("/logon"),
            )
                .into_response())
        }
        _ => render(&LogonPage {
            logged_on: ctx.user.is_some(),
            chrome: PageChrome::build(&ctx, &form, &messages),
        }),
    }
}
