//! Diesel table definitions for the PostgreSQL schema.
//!
//! These must match `migrations/` exactly. `users.team_id` and
//! `teams.manager_id` reference each other, so no `joinable!` is declared;
//! queries filter by id instead of joining.

diesel::table! {
    /// Accounts owned by the identity subsystem.
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        /// Opaque to the engine; never selected.
        password_hash -> Text,
        role -> Varchar,
        team_id -> Nullable<Uuid>,
        status -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Teams and their optional manager.
    teams (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        manager_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Feedback records. `team_id` is a snapshot with no foreign key.
    feedback (id) {
        id -> Uuid,
        title -> Varchar,
        content -> Text,
        kind -> Varchar,
        author_id -> Nullable<Uuid>,
        recipient_id -> Uuid,
        anonymous -> Bool,
        team_id -> Nullable<Uuid>,
        score -> Nullable<Int2>,
        status -> Varchar,
        created_at -> Timestamptz,
        status_changed_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(users, teams, feedback);
