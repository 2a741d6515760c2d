//! Session cookie codec.
//!
//! Two cookies carry a session: the account name and the token UUID. The
//! pair is issued together at logon and cleared together at logout. Values
//! are form-urlencoded so account names with spaces or separators survive
//! the round trip.

use url::form_urlencoded;

pub const ACCOUNT_COOKIE: &str = "tagboard_account";
pub const TOKEN_COOKIE: &str = "tagboard_token";

/// Thirty days, matching the token's server-side shelf life expectations.
const COOKIE_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// The session pair as read off a request's `Cookie` header.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionCookies {
    pub account: Option<String>,
    pub token: Option<String>,
}

impl SessionCookies {
    /// Parses a raw `Cookie` header value. Unrelated cookies are ignored;
    /// a repeated name keeps the last occurrence.
    pub fn parse(header: &str) -> Self {
        let mut cookies = SessionCookies::default();
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let value = decode(value.trim());
            match name.trim() {
                ACCOUNT_COOKIE => cookies.account = Some(value),
                TOKEN_COOKIE => cookies.token = Some(value),
                _ => {}
            }
        }
        cookies
    }

    /// True when both halves of the pair are present.
    pub fn is_complete(&self) -> bool {
        self.account.is_some() && self.token.is_some()
    }
}

/// `Set-Cookie` values establishing a session.
pub fn issue_cookies(account: &str, token: &str) -> [String; 2] {
    [
        set_cookie(ACCOUNT_COOKIE, account, COOKIE_MAX_AGE_SECS),
        set_cookie(TOKEN_COOKIE, token, COOKIE_MAX_AGE_SECS),
    ]
}

/// `Set-Cookie` values tearing a session down.
pub fn clear_cookies() -> [String; 2] {
    [
        set_cookie(ACCOUNT_COOKIE, "", 0),
        set_cookie(TOKEN_COOKIE, "", 0),
    ]
}

fn set_cookie(name: &str, value: &str, max_age: u64) -> String {
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{name}={encoded}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax")
}

fn decode(value: &str) -> String {
    form_urlencoded::parse(format!("v={value}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
