//! Tag-query parsing and resolution.
//!
//! Query text is whitespace-separated terms, lowercased. A `-` prefix
//! excludes a term. `rating:`, `uploader:` and `similar:` terms are meta
//! filters handled by the search adapter; everything else is a label name
//! resolved against the tags table. An account's saved search filter is
//! prepended to whatever the account typed.

use std::collections::HashSet;
use std::sync::Arc;

use domains::ports::TagRepo;
use domains::query::{MetaFilter, QueryTag, TermKind};
use domains::{DomainError, Result};

pub struct QueryService {
    tags: Arc<dyn TagRepo>,
}

impl QueryService {
    pub fn new(tags: Arc<dyn TagRepo>) -> Self {
        Self { tags }
    }

    /// Parses query text into resolved terms. Duplicate names keep their
    /// first occurrence, so a saved filter's `-gore` beats a typed `gore`.
    pub async fn parse(&self, text: &str, account_filter: Option<&str>) -> Result<Vec<QueryTag>> {
        let mut query: Vec<QueryTag> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut label_names: Vec<String> = Vec::new();

        for source in [account_filter.unwrap_or(""), text] {
            for raw in source.split_whitespace() {
                let (exclude, name) = match raw.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, raw),
                };
                if name.is_empty() {
                    continue;
                }
                let name = name.to_lowercase();
                if !seen.insert(name.clone()) {
                    continue;
                }
                let kind = match parse_meta(&name)? {
                    Some(meta) => TermKind::Meta(meta),
                    None => {
                        label_names.push(name.clone());
                        TermKind::Label { id: None }
                    }
                };
                query.push(QueryTag { name, exclude, kind });
            }
        }

        if !label_names.is_empty() {
            for tag in self.tags.tags_by_names(label_names).await? {
                let resolved = query
                    .iter_mut()
                    .find(|term| !term.is_meta() && term.name == tag.name);
                if let Some(term) = resolved {
                    term.kind = TermKind::Label { id: Some(tag.id) };
                }
            }
        }
        Ok(query)
    }
}

/// A `key:value` term with a recognized key. Unrecognized keys fall
/// through and are treated as plain label names.
fn parse_meta(name: &str) -> Result<Option<MetaFilter>> {
    let Some((key, value)) = name.split_once(':') else {
        return Ok(None);
    };
    match key {
        "rating" => Ok(Some(MetaFilter::Rating(value.to_string()))),
        "uploader" => Ok(Some(MetaFilter::Uploader(value.to_string()))),
        "similar" => {
            let id = value.parse::<u64>().map_err(|_| {
                DomainError::Validation(format!("similar: wants an image id, got {value:?}"))
            })?;
            Ok(Some(MetaFilter::Similar(id)))
        }
        _ => Ok(None),
    }
}
