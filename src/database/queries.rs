use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::database::models::*;
use crate::error::ContractError;

pub struct Queries;

impl Queries {
    pub async fn insert_user(conn: &mut SqliteConnection, user: &User) -> Result<(), ContractError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.created_at)
        .execute(conn)
        .await
        .map_err(|e| ContractError::DatabaseError(format!("Failed to insert user: {}", e)))?;
        Ok(())
    }

    pub async fn find_user_by_email(
        conn: &mut SqliteConnection,
        email: &str,
    ) -> Result<Option<User>, ContractError> {
        let row = sqlx::query("SELECT id, email, full_name, created_at FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(conn)
            .await?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    pub async fn find_user_by_id(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<User>, ContractError> {
        let row = sqlx::query("SELECT id, email, full_name, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    pub async fn insert_contract(
        conn: &mut SqliteConnection,
        contract: &ContractRecord,
    ) -> Result<(), ContractError> {
        sqlx::query(
            r#"
            INSERT INTO contracts
            (id, owner_id, filename, document, status, risk_summary, category, expiry_date,
             finalized_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(contract.id)
        .bind(contract.owner_id)
        .bind(&contract.filename)
        .bind(&contract.document)
        .bind(contract.status.as_str())
        .bind(&contract.risk_summary)
        .bind(contract.category.map(|c| c.as_str()))
        .bind(contract.expiry_date)
        .bind(contract.finalized_at)
        .bind(contract.created_at)
        .bind(contract.updated_at)
        .execute(conn)
        .await
        .map_err(|e| ContractError::DatabaseError(format!("Failed to insert contract: {}", e)))?;
        Ok(())
    }

    pub async fn get_contract(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<ContractRecord>, ContractError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, filename, document, status, risk_summary, category,
                   expiry_date, finalized_at, created_at, updated_at
            FROM contracts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        row.map(|r| contract_from_row(&r)).transpose()
    }

    pub async fn require_contract(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<ContractRecord, ContractError> {
        Self::get_contract(conn, id)
            .await?
            .ok_or_else(|| ContractError::contract_not_found(id))
    }

    pub async fn update_contract_status(
        conn: &mut SqliteConnection,
        id: Uuid,
        status: ContractStatus,
        finalized_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), ContractError> {
        sqlx::query(
            r#"
            UPDATE contracts
            SET status = ?, finalized_at = COALESCE(finalized_at, ?), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(finalized_at)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update_contract_details(
        conn: &mut SqliteConnection,
        id: Uuid,
        category: Option<ContractCategory>,
        expiry_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), ContractError> {
        sqlx::query(
            r#"
            UPDATE contracts
            SET category = COALESCE(?, category),
                expiry_date = COALESCE(?, expiry_date),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(category.map(|c| c.as_str()))
        .bind(expiry_date)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Contracts the user is a party to whose expiry falls within `[from, until]`,
    /// soonest first. Stored timestamps vary in fractional precision, so the window
    /// and order compare `julianday` values rather than the raw text.
    pub async fn expiring_contracts(
        conn: &mut SqliteConnection,
        user_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ContractRecord>, ContractError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.owner_id, c.filename, c.document, c.status, c.risk_summary,
                   c.category, c.expiry_date, c.finalized_at, c.created_at, c.updated_at
            FROM contracts c
            WHERE c.id IN (SELECT contract_id FROM contract_parties WHERE user_id = ?)
              AND c.expiry_date IS NOT NULL
              AND julianday(c.expiry_date) BETWEEN julianday(?) AND julianday(?)
            ORDER BY julianday(c.expiry_date), c.id
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .bind(limit.max(0))
        .fetch_all(conn)
        .await?;

        rows.iter().map(contract_from_row).collect()
    }

    pub async fn get_anchor(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
    ) -> Result<Option<AnchorRecord>, ContractError> {
        let row = sqlx::query(
            r#"
            SELECT contract_id, document_hash, tx_reference, chain_status, attempts,
                   last_error, confirmed_at, created_at
            FROM anchor_records
            WHERE contract_id = ?
            "#,
        )
        .bind(contract_id)
        .fetch_optional(conn)
        .await?;
        row.map(|r| anchor_from_row(&r)).transpose()
    }

    /// Conditional insert keyed by contract id. Returns false when a record already
    /// existed, in which case nothing was written.
    pub async fn insert_anchor_if_absent(
        conn: &mut SqliteConnection,
        record: &AnchorRecord,
    ) -> Result<bool, ContractError> {
        let result = sqlx::query(
            r#"
            INSERT INTO anchor_records
            (contract_id, document_hash, tx_reference, chain_status, attempts, last_error,
             confirmed_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (contract_id) DO NOTHING
            "#,
        )
        .bind(record.contract_id)
        .bind(&record.document_hash)
        .bind(&record.tx_reference)
        .bind(record.chain_status.as_str())
        .bind(record.attempts)
        .bind(&record.last_error)
        .bind(record.confirmed_at)
        .bind(record.created_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Attach the ledger transaction. Only succeeds while no transaction is recorded.
    pub async fn confirm_anchor(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        tx_reference: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<bool, ContractError> {
        let result = sqlx::query(
            r#"
            UPDATE anchor_records
            SET tx_reference = ?, confirmed_at = ?, chain_status = 'confirmed',
                attempts = attempts + 1, last_error = NULL
            WHERE contract_id = ? AND tx_reference IS NULL
            "#,
        )
        .bind(tx_reference)
        .bind(confirmed_at)
        .bind(contract_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn record_anchor_failure(
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        attempts: u32,
        error: &str,
    ) -> Result<(), ContractError> {
        sqlx::query(
            r#"
            UPDATE anchor_records
            SET attempts = attempts + ?, last_error = ?, chain_status = 'pending'
            WHERE contract_id = ? AND tx_reference IS NULL
            "#,
        )
        .bind(attempts as i64)
        .bind(error)
        .bind(contract_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Hash-only records still waiting on the ledger.
    pub async fn unconfirmed_anchors(
        conn: &mut SqliteConnection,
        limit: i64,
    ) -> Result<Vec<AnchorRecord>, ContractError> {
        let rows = sqlx::query(
            r#"
            SELECT contract_id, document_hash, tx_reference, chain_status, attempts,
                   last_error, confirmed_at, created_at
            FROM anchor_records
            WHERE tx_reference IS NULL AND chain_status = 'pending'
            ORDER BY rowid ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(conn)
        .await?;
        rows.iter().map(anchor_from_row).collect()
    }
}

fn decode_error(column: &str, value: &str) -> ContractError {
    ContractError::DatabaseError(format!("Invalid {} value: {}", column, value))
}

fn user_from_row(row: &SqliteRow) -> Result<User, ContractError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn contract_from_row(row: &SqliteRow) -> Result<ContractRecord, ContractError> {
    let status: String = row.try_get("status")?;
    let category: Option<String> = row.try_get("category")?;
    let category = match category {
        Some(raw) => {
            Some(ContractCategory::from_str(&raw).ok_or_else(|| decode_error("category", &raw))?)
        }
        None => None,
    };

    Ok(ContractRecord {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        filename: row.try_get("filename")?,
        document: row.try_get("document")?,
        status: ContractStatus::from_str(&status).ok_or_else(|| decode_error("status", &status))?,
        risk_summary: row.try_get("risk_summary")?,
        category,
        expiry_date: row.try_get("expiry_date")?,
        finalized_at: row.try_get("finalized_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn anchor_from_row(row: &SqliteRow) -> Result<AnchorRecord, ContractError> {
    let chain_status: String = row.try_get("chain_status")?;
    Ok(AnchorRecord {
        contract_id: row.try_get("contract_id")?,
        document_hash: row.try_get("document_hash")?,
        tx_reference: row.try_get("tx_reference")?,
        chain_status: ChainStatus::from_str(&chain_status)
            .ok_or_else(|| decode_error("chain_status", &chain_status))?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        confirmed_at: row.try_get("confirmed_at")?,
        created_at: row.try_get("created_at")?,
    })
}
