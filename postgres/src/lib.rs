//! `PostgreSQL` storage for the Upkeep assignment coordinator.
//!
//! Implements the `upkeep-core` storage seams over a `PgPool`:
//!
//! - [`PostgresRequestStore`]: service-request rows; the
//!   compare-and-transition primitive is one conditional `UPDATE`, and the
//!   one-pending-per-(issue, provider) invariant is a partial unique index.
//! - [`PostgresAssignmentLedger`]: the per-issue assignment; `try_assign`
//!   is a single `INSERT .. ON CONFLICT DO NOTHING` against the
//!   issue-keyed primary key, so the database serializes racing accepts
//!   and exactly one wins.
//! - [`PostgresDirectory`]: read-only lookups against the issue and
//!   provider-registration tables owned by the surrounding CRUD system.
//!
//! Queries use runtime binding (`sqlx::query` + `.bind()`), so no database
//! is needed at compile time. Migrations are embedded via
//! [`sqlx::migrate!`] and applied with [`migrate`].

mod directory;
mod ledger;
mod requests;

pub use directory::PostgresDirectory;
pub use ledger::PostgresAssignmentLedger;
pub use requests::PostgresRequestStore;

use sqlx::PgPool;
use upkeep_core::CoordinatorError;

/// Apply the embedded migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub(crate) fn storage_error(e: sqlx::Error) -> CoordinatorError {
    CoordinatorError::Storage(e.to_string())
}
