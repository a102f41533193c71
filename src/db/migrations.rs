//! Schema migrations, applied exactly once each and tracked in an
//! append-only ledger table.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::models::Migration;
use crate::db::statements::*;
use crate::error::TransitError;

/// A named schema change. `up` statements run inside a single transaction
/// together with the ledger insert; `down` statements are retained for
/// symmetry but never executed by the sync path.
pub struct Changeset {
    /// Stored in the migrations table; positional order is the contract.
    pub name: &'static str,
    pub up: &'static [&'static str],
    #[allow(dead_code)]
    pub down: &'static [&'static str],
}

/// The list of all migrations to run, in order. Append only — reordering or
/// renaming entries breaks ledgers already written to user machines.
pub const CHANGESETS: &[Changeset] = &[
    Changeset {
        name: "0001_Init",
        up: &[
            CREATE_LOCATIONS_TABLE,
            CREATE_AGENCIES_TABLE,
            CREATE_STOPS_TABLE,
            CREATE_STOP_LOCATION_INDEX,
            CREATE_AGENCY_LOCATION_INDEX,
        ],
        down: &[],
    },
    Changeset {
        name: "0002_Add_DMV",
        up: &[INSERT_DMV_LOCATION],
        down: &[],
    },
    Changeset {
        name: "0003_Add_SF",
        up: &[INSERT_SF_LOCATION],
        down: &[],
    },
];

/// Creates the migrations ledger table. Safe to call on every startup.
pub async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CREATE_MIGRATIONS_TABLE)
        .execute(pool)
        .await
        .context("failed to create migrations table")?;
    Ok(())
}

pub async fn migration_count(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar(COUNT_MIGRATIONS)
        .fetch_one(pool)
        .await
        .context("failed to count migrations")
}

/// Ledger rows applied so far, in insertion order.
pub async fn applied_migrations(pool: &SqlitePool) -> Result<Vec<Migration>> {
    sqlx::query_as(SELECT_MIGRATIONS)
        .fetch_all(pool)
        .await
        .context("failed to fetch applied migrations")
}

/// Applies every changeset past the applied prefix, verifying that each
/// already-applied ledger entry matches the changeset at the same position.
pub async fn run_pending(pool: &SqlitePool, applied: &[Migration]) -> Result<()> {
    for (position, changeset) in CHANGESETS.iter().enumerate() {
        match applied.get(position) {
            Some(row) => {
                if row.name != changeset.name {
                    return Err(TransitError::CorruptMigrations {
                        position,
                        expected: changeset.name.to_string(),
                        found: row.name.clone(),
                    }
                    .into());
                }
            }
            None => apply(pool, changeset).await?,
        }
    }

    Ok(())
}

/// Runs one changeset's forward statements plus its ledger insert in a single
/// transaction; any failure rolls back the whole changeset.
async fn apply(pool: &SqlitePool, changeset: &Changeset) -> Result<()> {
    debug!(name = changeset.name, "running database migration");

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin migration transaction")?;

    for statement in changeset.up {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration '{}' failed", changeset.name))?;
    }

    sqlx::query(INSERT_MIGRATION)
        .bind(changeset.name)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to record migration '{}'", changeset.name))?;

    tx.commit()
        .await
        .with_context(|| format!("failed to commit migration '{}'", changeset.name))?;

    Ok(())
}
