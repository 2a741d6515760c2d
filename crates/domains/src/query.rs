//! # Tag-query model
//!
//! A query is whitespace-separated terms. A `-` prefix negates a term. A
//! `key:value` term with a recognized key is a *meta tag*: a query
//! modifier, never a stored label. Parsing and resolution against the tags
//! table happen in the service layer; this module only defines the shapes
//! the search adapter consumes.

/// Meta filters understood by the search layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaFilter {
    /// `rating:<value>` — match the stored rating label.
    Rating(String),
    /// `uploader:<name>` — match images uploaded by the named account.
    Uploader(String),
    /// `similar:<id>` — match images within perceptual-hash distance of
    /// the given image.
    Similar(u64),
}

/// What a single query term denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermKind {
    /// A stored label; `id` is `None` when no tag by that name exists.
    Label { id: Option<u64> },
    /// A query modifier.
    Meta(MetaFilter),
}

/// One term of a parsed, resolved tag query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTag {
    pub name: String,
    pub exclude: bool,
    pub kind: TermKind,
}

impl QueryTag {
    pub fn is_meta(&self) -> bool {
        matches!(self.kind, TermKind::Meta(_))
    }

    /// Id of the stored label, when this term is a label that resolved.
    pub fn label_id(&self) -> Option<u64> {
        match self.kind {
            TermKind::Label { id } => id,
            TermKind::Meta(_) => None,
        }
    }
}
