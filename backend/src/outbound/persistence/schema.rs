//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Profile records keyed by upstream user identity.
    ///
    /// `nickname` carries the `profiles_nickname_key` unique constraint and
    /// `user_id` the `profiles_pkey` primary key; the repository relies on
    /// both names to classify insert conflicts.
    profiles (user_id) {
        /// Primary key supplied by the upstream identity system.
        user_id -> Uuid,
        /// Globally unique public handle; `NULL` once hard-deleted.
        nickname -> Nullable<Varchar>,
        /// Optional contact email.
        email -> Nullable<Varchar>,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
        /// Soft-deletion marker; `NULL` for live profiles.
        deleted_at -> Nullable<Timestamptz>,
    }
}
