//! Audit Log
//!
//! Append-only per-contract event store. Writes go through the caller's connection so
//! an event commits or rolls back together with the state change it describes.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

use crate::audit::entry::{AuditEvent, EventKind, GENESIS_HASH};
use crate::database::{self, Database};
use crate::error::ContractError;

#[derive(Clone)]
pub struct AuditLog {
    database: Database,
}

impl AuditLog {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Append an event for `contract_id`. There is no update or delete counterpart.
    pub async fn record(
        &self,
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        kind: EventKind,
        description: impl Into<String>,
        metadata: Option<serde_json::Value>,
        actor: Option<Uuid>,
    ) -> Result<AuditEvent, ContractError> {
        let head = sqlx::query(
            r#"
            SELECT sequence, created_at, this_hash
            FROM contract_events
            WHERE contract_id = ?
            ORDER BY sequence DESC
            LIMIT 1
            "#,
        )
        .bind(contract_id)
        .fetch_optional(&mut *conn)
        .await?;

        let (sequence, previous_hash, created_at) = match head {
            Some(row) => {
                let last_sequence: i64 = row.try_get("sequence")?;
                let last_created: DateTime<Utc> = row.try_get("created_at")?;
                let last_hash: String = row.try_get("this_hash")?;
                // Clamp so creation time never runs backwards within a contract.
                (last_sequence + 1, last_hash, database::now().max(last_created))
            }
            None => (0, GENESIS_HASH.to_string(), database::now()),
        };

        let event = AuditEvent::new(
            contract_id,
            sequence,
            kind,
            description.into(),
            metadata,
            actor,
            created_at,
            previous_hash,
        );

        let metadata_json = event
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO contract_events
            (contract_id, sequence, event_type, description, metadata, user_id, created_at,
             previous_hash, this_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.contract_id)
        .bind(event.sequence)
        .bind(event.kind.as_str())
        .bind(&event.description)
        .bind(metadata_json)
        .bind(event.actor)
        .bind(event.created_at)
        .bind(&event.previous_hash)
        .bind(&event.this_hash)
        .execute(&mut *conn)
        .await
        .map_err(|e| ContractError::DatabaseError(format!("Failed to append audit event: {}", e)))?;

        debug!(%contract_id, "Appended audit event {}", event.summary());
        Ok(event)
    }

    /// Events in creation order, ties broken by insertion order.
    pub async fn list_for_contract(&self, contract_id: Uuid) -> Result<Vec<AuditEvent>, ContractError> {
        let mut conn = self.database.pool().acquire().await?;
        Self::list_with(&mut conn, contract_id).await
    }

    pub async fn list_with(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
    ) -> Result<Vec<AuditEvent>, ContractError> {
        let rows = sqlx::query(
            r#"
            SELECT contract_id, sequence, event_type, description, metadata, user_id,
                   created_at, previous_hash, this_hash
            FROM contract_events
            WHERE contract_id = ?
            ORDER BY sequence ASC
            "#,
        )
        .bind(contract_id)
        .fetch_all(conn)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    pub async fn count_kind(&self, contract_id: Uuid, kind: EventKind) -> Result<i64, ContractError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contract_events WHERE contract_id = ? AND event_type = ?",
        )
        .bind(contract_id)
        .bind(kind.as_str())
        .fetch_one(self.database.pool())
        .await?;
        Ok(count)
    }
}

fn event_from_row(row: &SqliteRow) -> Result<AuditEvent, ContractError> {
    let kind: String = row.try_get("event_type")?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(AuditEvent {
        contract_id: row.try_get("contract_id")?,
        sequence: row.try_get("sequence")?,
        kind: EventKind::from_str(&kind)
            .ok_or_else(|| ContractError::DatabaseError(format!("Unknown event kind: {}", kind)))?,
        description: row.try_get("description")?,
        metadata: metadata.map(|m| serde_json::from_str(&m)).transpose()?,
        actor: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        previous_hash: row.try_get("previous_hash")?,
        this_hash: row.try_get("this_hash")?,
    })
}
