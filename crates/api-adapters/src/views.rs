//! Template structures for the server-rendered pages.
//!
//! Anything that needs computing is computed here; the templates only
//! interpolate. Link queries are pre-encoded because raw terms may carry
//! spaces and meta punctuation.

use askama::Template;
use chrono::{DateTime, Utc};
use domains::models::{CollectionRecord, ImageSummary, TagRecord};
use url::form_urlencoded;

use crate::context::PageContext;
use crate::forms::PageForm;

/// Chrome shared by every page: the viewer, the joined message line and
/// the saved browse query the visitor navigated in with.
pub struct PageChrome {
    /// Empty when the request is anonymous.
    pub user_name: String,
    pub message: String,
    pub search_terms: String,
    /// `search_terms` urlencoded for links.
    pub search_encoded: String,
    pub view_mode: String,
}

impl PageChrome {
    pub fn build(ctx: &PageContext, form: &PageForm, messages: &[String]) -> Self {
        let search_terms = form.value("SearchTerms").to_string();
        PageChrome {
            user_name: ctx
                .user
                .as_ref()
                .map(|user| user.name.clone())
                .unwrap_or_default(),
            message: messages.join(" "),
            search_encoded: encode_query(&search_terms),
            view_mode: form.value("ViewMode").to_string(),
            search_terms,
        }
    }
}

pub fn encode_query(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

/// How the media file is embedded on the page, keyed off the extension.
pub fn embed_kind(file_name: &str) -> &'static str {
    match mime_guess::from_path(file_name).first() {
        Some(m) if m.type_() == mime::IMAGE => "image",
        Some(m) if m.type_() == mime::VIDEO => "video",
        Some(m) if m.type_() == mime::AUDIO => "audio",
        _ => "other",
    }
}

/// Whether the source line can be rendered as a link.
pub fn source_is_url(source: &str) -> bool {
    url::Url::parse(source).is_ok()
}

pub fn format_when(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// An upload that matched an existing row, linked from the result page.
pub struct DuplicateLink {
    pub file_name: String,
    pub id: u64,
}

/// Everything the image page shows about one row.
pub struct ImageView {
    pub id: u64,
    pub file_name: String,
    pub display_name: String,
    pub description: String,
    pub source: String,
    pub source_is_url: bool,
    pub rating: String,
    pub score_text: String,
    pub score_voters: i64,
    pub own_vote: Option<i64>,
    pub embed: &'static str,
    pub uploaded_text: String,
    pub tags: Vec<TagRecord>,
    pub collections: Vec<CollectionRecord>,
    pub previous: Option<u64>,
    pub next: Option<u64>,
    pub similar_count: Option<u64>,
}

#[derive(Template)]
#[template(path = "image.html")]
pub struct ImagePage {
    pub chrome: PageChrome,
    pub view: Option<ImageView>,
    pub duplicates: Vec<DuplicateLink>,
}

#[derive(Template)]
#[template(path = "image-slideshow.html")]
pub struct SlideshowPage {
    pub chrome: PageChrome,
    pub view: ImageView,
}

#[derive(Template)]
#[template(path = "images.html")]
pub struct BrowsePage {
    pub chrome: PageChrome,
    pub items: Vec<ImageSummary>,
    pub page: u64,
    pub page_count: u64,
    pub total: u64,
    pub previous_page: Option<u64>,
    pub next_page: Option<u64>,
}

#[derive(Template)]
#[template(path = "uploadform.html")]
pub struct UploadPage {
    pub chrome: PageChrome,
}

#[derive(Template)]
#[template(path = "logon.html")]
pub struct LogonPage {
    pub chrome: PageChrome,
    pub logged_on: bool,
}
