//! Decode driver errors into constraint violations.
//!
//! Servers since 9.2 attach the constraint name to the error payload;
//! older ones only mention it inside the human-readable message, so the
//! decoder falls back to splitting the message on the sentinel phrases
//! the server uses. Non-constraint errors decode to an empty list and are
//! expected to propagate through other channels untouched.

use tokio_postgres::error::{DbError, SqlState};

/// The kind of constraint a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Exclusion,
    Check,
}

/// Decode a driver error into `(kind, constraint name)` pairs.
pub fn to_constraints(error: &tokio_postgres::Error) -> Vec<(ConstraintKind, String)> {
    match error.as_db_error() {
        Some(db_error) => db_constraints(db_error),
        None => Vec::new(),
    }
}

/// Decode a server error payload into `(kind, constraint name)` pairs.
pub fn db_constraints(error: &DbError) -> Vec<(ConstraintKind, String)> {
    constraints_from_parts(error.code(), error.constraint(), error.message())
}

fn constraints_from_parts(
    code: &SqlState,
    constraint: Option<&str>,
    message: &str,
) -> Vec<(ConstraintKind, String)> {
    let kind = if *code == SqlState::UNIQUE_VIOLATION {
        ConstraintKind::Unique
    } else if *code == SqlState::FOREIGN_KEY_VIOLATION {
        ConstraintKind::ForeignKey
    } else if *code == SqlState::EXCLUSION_VIOLATION {
        ConstraintKind::Exclusion
    } else if *code == SqlState::CHECK_VIOLATION {
        ConstraintKind::Check
    } else {
        return Vec::new();
    };
    if let Some(name) = constraint {
        return vec![(kind, name.to_string())];
    }
    legacy_constraint(kind, message).into_iter().collect()
}

/// Extract the constraint name from a pre-9.2 message. Foreign-key
/// messages repeat the table after the name, so that part is cut first.
fn legacy_constraint(kind: ConstraintKind, message: &str) -> Option<(ConstraintKind, String)> {
    let sentinel = match kind {
        ConstraintKind::Unique => " unique constraint ",
        ConstraintKind::ForeignKey => " foreign key constraint ",
        ConstraintKind::Exclusion => " exclusion constraint ",
        ConstraintKind::Check => " check constraint ",
    };
    let (_, rest) = message.split_once(sentinel)?;
    let quoted = match kind {
        ConstraintKind::ForeignKey => rest.split(" on table ").next().unwrap_or(rest),
        _ => rest,
    };
    Some((kind, strip_quotes(quoted).to_string()))
}

fn strip_quotes(quoted: &str) -> &str {
    quoted
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(quoted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_shape_uses_the_attached_name() {
        assert_eq!(
            constraints_from_parts(
                &SqlState::FOREIGN_KEY_VIOLATION,
                Some("posts_author_id_fkey"),
                "irrelevant"
            ),
            vec![(ConstraintKind::ForeignKey, "posts_author_id_fkey".to_string())]
        );
        assert_eq!(
            constraints_from_parts(&SqlState::UNIQUE_VIOLATION, Some("products_handle_key"), ""),
            vec![(ConstraintKind::Unique, "products_handle_key".to_string())]
        );
    }

    #[test]
    fn legacy_shape_matches_the_structured_one() {
        let structured = constraints_from_parts(
            &SqlState::FOREIGN_KEY_VIOLATION,
            Some("posts_author_id_fkey"),
            "",
        );
        let legacy = constraints_from_parts(
            &SqlState::FOREIGN_KEY_VIOLATION,
            None,
            "update or delete on table \"users\" violates foreign key constraint \
             \"posts_author_id_fkey\" on table \"posts\"",
        );
        assert_eq!(structured, legacy);
    }

    #[test]
    fn legacy_unique_and_check_and_exclusion() {
        assert_eq!(
            constraints_from_parts(
                &SqlState::UNIQUE_VIOLATION,
                None,
                "duplicate key value violates unique constraint \"products_handle_key\""
            ),
            vec![(ConstraintKind::Unique, "products_handle_key".to_string())]
        );
        assert_eq!(
            constraints_from_parts(
                &SqlState::CHECK_VIOLATION,
                None,
                "new row for relation \"products\" violates check constraint \"price_must_be_positive\""
            ),
            vec![(ConstraintKind::Check, "price_must_be_positive".to_string())]
        );
        assert_eq!(
            constraints_from_parts(
                &SqlState::EXCLUSION_VIOLATION,
                None,
                "conflicting key value violates exclusion constraint \"reservations_overlap\""
            ),
            vec![(ConstraintKind::Exclusion, "reservations_overlap".to_string())]
        );
    }

    #[test]
    fn unrecognized_errors_decode_to_nothing() {
        assert_eq!(
            constraints_from_parts(&SqlState::SYNTAX_ERROR, None, "syntax error at or near"),
            vec![]
        );
        assert_eq!(
            constraints_from_parts(&SqlState::UNIQUE_VIOLATION, None, "message without sentinel"),
            vec![]
        );
    }
}
