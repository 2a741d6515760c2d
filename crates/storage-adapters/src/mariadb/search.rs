//! Shared `WHERE`-clause assembly for resolved tag queries.
//!
//! Search, the match count and prev/next navigation all filter the same
//! way, so the clause is built once here. The image table is aliased `i`
//! in every consuming statement.

use domains::query::{MetaFilter, QueryTag, TermKind};
use sqlx::{MySql, QueryBuilder};

/// Appends a `WHERE` clause for the query. The clause always opens with
/// a tautology so callers can tack further conditions on with `AND`.
pub(super) fn push_query_filters(
    qb: &mut QueryBuilder<'_, MySql>,
    query: &[QueryTag],
    similar_distance: u32,
) {
    qb.push(" WHERE 1=1");
    for term in query {
        qb.push(" AND ");
        match &term.kind {
            TermKind::Label { id: Some(id) } => {
                if term.exclude {
                    qb.push("NOT ");
                }
                qb.push("EXISTS (SELECT 1 FROM image_tags it WHERE it.image_id = i.id AND it.tag_id = ");
                qb.push_bind(*id);
                qb.push(")");
            }
            // An unknown included label can match nothing; an unknown
            // excluded label excludes nothing.
            TermKind::Label { id: None } => {
                qb.push(if term.exclude { "1=1" } else { "1=0" });
            }
            TermKind::Meta(MetaFilter::Rating(rating)) => {
                qb.push("i.rating ");
                qb.push(if term.exclude { "<> " } else { "= " });
                qb.push_bind(rating.clone());
            }
            TermKind::Meta(MetaFilter::Uploader(name)) => {
                if term.exclude {
                    qb.push("NOT ");
                }
                qb.push("EXISTS (SELECT 1 FROM users u WHERE u.id = i.uploader_id AND u.name = ");
                qb.push_bind(name.clone());
                qb.push(")");
            }
            // Rows without a hash are never similar, so exclusion keeps
            // them; COALESCE pins the NULL arithmetic down to FALSE.
            TermKind::Meta(MetaFilter::Similar(image_id)) => {
                if term.exclude {
                    qb.push("NOT ");
                }
                qb.push("COALESCE(BIT_COUNT(i.perceptual_hash ^ (SELECT s.perceptual_hash FROM images s WHERE s.id = ");
                qb.push_bind(*image_id);
                qb.push(")) <= ");
                qb.push_bind(similar_distance);
                qb.push(", FALSE)");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(name: &str, id: Option<u64>, exclude: bool) -> QueryTag {
        QueryTag {
            name: name.into(),
            exclude,
            kind: TermKind::Label { id },
        }
    }

    #[test]
    fn empty_query_is_a_tautology() {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM images i");
        push_query_filters(&mut qb, &[], 8);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM images i WHERE 1=1");
    }

    #[test]
    fn resolved_labels_become_exists_subqueries() {
        let mut qb = QueryBuilder::new("SELECT i.id FROM images i");
        push_query_filters(
            &mut qb,
            &[label("beach", Some(3), false), label("gore", Some(9), true)],
            8,
        );
        let sql = qb.sql();
        assert!(sql.contains("EXISTS (SELECT 1 FROM image_tags it"));
        assert!(sql.contains("AND NOT EXISTS"));
    }

    #[test]
    fn unknown_labels_pin_the_clause_instead_of_binding() {
        let mut qb = QueryBuilder::new("SELECT i.id FROM images i");
        push_query_filters(
            &mut qb,
            &[label("nosuch", None, false), label("nosuch2", None, true)],
            8,
        );
        assert!(qb.sql().contains("AND 1=0"));
        assert!(qb.sql().contains("AND 1=1"));
    }

    #[test]
    fn rating_filters_compare_the_column() {
        let mut qb = QueryBuilder::new("SELECT i.id FROM images i");
        push_query_filters(
            &mut qb,
            &[QueryTag {
                name: "rating:safe".into(),
                exclude: true,
                kind: TermKind::Meta(MetaFilter::Rating("safe".into())),
            }],
            8,
        );
        assert!(qb.sql().contains("i.rating <> "));
    }

    #[test]
    fn similar_filters_use_hamming_distance() {
        let mut qb = QueryBuilder::new("SELECT i.id FROM images i");
        push_query_filters(
            &mut qb,
            &[QueryTag {
                name: "similar:42".into(),
                exclude: false,
                kind: TermKind::Meta(MetaFilter::Similar(42)),
            }],
            8,
        );
        assert!(qb.sql().contains("BIT_COUNT(i.perceptual_hash ^"));
    }
}
