//! Translation of pool and Diesel failures into [`StoreError`].

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::StoreError;

use super::pool::PoolError;

/// Pool failures mean the database is unreachable.
pub(super) fn map_pool_error(error: PoolError) -> StoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            StoreError::connection(message)
        }
    }
}

/// Classify a Diesel error.
///
/// Serialisation failures become [`StoreError::Conflict`] so callers see a
/// retryable outcome; unique violations become [`StoreError::Duplicate`].
pub(super) fn map_diesel_error(error: DieselError) -> StoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
            StoreError::conflict(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StoreError::duplicate(unique_violation_message(
                info.constraint_name(),
                info.message(),
            ))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            StoreError::connection(info.message().to_owned())
        }
        DieselError::DatabaseError(_, info) => StoreError::query(info.message().to_owned()),
        DieselError::NotFound => StoreError::query("record not found"),
        other => StoreError::query(other.to_string()),
    }
}

fn unique_violation_message(constraint: Option<&str>, fallback: &str) -> String {
    match constraint {
        Some("teams_name_key") => "a team with this name already exists".to_owned(),
        Some("teams_manager_id_key") => "this user already manages a team".to_owned(),
        _ => fallback.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug)]
    struct Info {
        message: &'static str,
        constraint: Option<&'static str>,
    }

    impl diesel::result::DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.message
        }

        fn details(&self) -> Option<&str> {
            None
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            None
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn database_error(kind: DatabaseErrorKind, constraint: Option<&'static str>) -> DieselError {
        DieselError::DatabaseError(
            kind,
            Box::new(Info {
                message: "database said no",
                constraint,
            }),
        )
    }

    #[rstest]
    fn serialization_failures_are_conflicts() {
        let mapped = map_diesel_error(database_error(DatabaseErrorKind::SerializationFailure, None));
        assert!(matches!(mapped, StoreError::Conflict { .. }));
    }

    #[rstest]
    fn duplicate_team_names_are_named() {
        let mapped = map_diesel_error(database_error(
            DatabaseErrorKind::UniqueViolation,
            Some("teams_name_key"),
        ));
        assert_eq!(
            mapped,
            StoreError::duplicate("a team with this name already exists")
        );
    }

    #[rstest]
    fn closed_connections_are_connection_errors() {
        let mapped = map_diesel_error(database_error(DatabaseErrorKind::ClosedConnection, None));
        assert!(matches!(mapped, StoreError::Connection { .. }));
    }

    #[rstest]
    fn pool_failures_are_connection_errors() {
        let mapped = map_pool_error(PoolError::checkout("timed out"));
        assert_eq!(mapped, StoreError::connection("timed out"));
    }
}
