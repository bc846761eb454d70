//! Party Registry
//!
//! Persists the owner and optional counterpart of each contract. Every method takes the
//! caller's connection so party writes share the coordinator's transaction.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

use super::types::*;
use crate::error::ContractError;

pub struct PartyRegistry;

impl PartyRegistry {
    /// Load the pairing of a contract. A contract without a first party does not exist
    /// as far as approval is concerned.
    pub async fn load_pairing(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
    ) -> Result<Pairing, ContractError> {
        let rows = sqlx::query(
            r#"
            SELECT contract_id, user_id, role, approval_status, approved_at, created_at
            FROM contract_parties
            WHERE contract_id = ?
            "#,
        )
        .bind(contract_id)
        .fetch_all(conn)
        .await?;

        let mut first = None;
        let mut second = SecondParty::Absent;
        for row in &rows {
            let party = party_from_row(row)?;
            match party.role {
                PartyRole::FirstParty => first = Some(party),
                PartyRole::SecondParty => second = SecondParty::Present(party),
            }
        }

        let first = first.ok_or_else(|| ContractError::contract_not_found(contract_id))?;
        Ok(Pairing { first, second })
    }

    /// Attach a user in `role`, starting from `pending`.
    pub async fn attach(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        user_id: Uuid,
        role: PartyRole,
        now: DateTime<Utc>,
    ) -> Result<Party, ContractError> {
        let party = Party {
            contract_id,
            user_id,
            role,
            approval: PartyApproval::Pending,
            approved_at: None,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO contract_parties (contract_id, user_id, role, approval_status, approved_at, created_at)
            VALUES (?, ?, ?, ?, NULL, ?)
            "#,
        )
        .bind(contract_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(party.approval.as_str())
        .bind(now)
        .execute(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => ContractError::ConflictError(
                format!("Contract {} already has a {}", contract_id, role.as_str()),
            ),
            other => ContractError::from(other),
        })?;

        debug!(%contract_id, %user_id, "Attached {}", role.as_str());
        Ok(party)
    }

    /// Remove the party holding `role`. Returns whether a row was removed.
    pub async fn detach(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        role: PartyRole,
    ) -> Result<bool, ContractError> {
        let result = sqlx::query("DELETE FROM contract_parties WHERE contract_id = ? AND role = ?")
            .bind(contract_id)
            .bind(role.as_str())
            .execute(conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a decision; `decided_at` is `None` only when resetting to `pending`.
    pub async fn set_approval(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        role: PartyRole,
        approval: PartyApproval,
        decided_at: Option<DateTime<Utc>>,
    ) -> Result<(), ContractError> {
        let result = sqlx::query(
            r#"
            UPDATE contract_parties
            SET approval_status = ?, approved_at = ?
            WHERE contract_id = ? AND role = ?
            "#,
        )
        .bind(approval.as_str())
        .bind(decided_at)
        .bind(contract_id)
        .bind(role.as_str())
        .execute(conn)
        .await?;

        if result.rows_affected() != 1 {
            return Err(ContractError::NotFoundError(format!(
                "No {} on contract {}",
                role.as_str(),
                contract_id
            )));
        }
        Ok(())
    }

    pub async fn reset(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        role: PartyRole,
    ) -> Result<(), ContractError> {
        Self::set_approval(conn, contract_id, role, PartyApproval::Pending, None).await
    }
}

fn party_from_row(row: &SqliteRow) -> Result<Party, ContractError> {
    let role: String = row.try_get("role")?;
    let approval: String = row.try_get("approval_status")?;

    Ok(Party {
        contract_id: row.try_get("contract_id")?,
        user_id: row.try_get("user_id")?,
        role: PartyRole::from_str(&role)
            .ok_or_else(|| ContractError::DatabaseError(format!("Invalid role: {}", role)))?,
        approval: PartyApproval::from_str(&approval).ok_or_else(|| {
            ContractError::DatabaseError(format!("Invalid approval status: {}", approval))
        })?,
        approved_at: row.try_get("approved_at")?,
        created_at: row.try_get("created_at")?,
    })
}
