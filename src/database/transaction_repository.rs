use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::database::repository::{Transition, TransactionStore};
use crate::payments::types::{
    ChargeDetails, Transaction, TransactionDetails, TransactionKind, TransactionStatus,
    WithdrawalDetails,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const CHARGE_COLUMNS: &str = "id, owner_id, provider_id, external_id, amount, status, \
     payer_name, payer_cpf, payment_date, \
     NULL::jsonb AS bank_account, NULL::timestamptz AS requested_at, NULL::timestamptz AS completed_at, \
     metadata, created_at, updated_at";

const WITHDRAWAL_COLUMNS: &str = "id, owner_id, provider_id, external_id, amount, status, \
     NULL::text AS payer_name, NULL::text AS payer_cpf, NULL::timestamptz AS payment_date, \
     bank_account, requested_at, completed_at, \
     metadata, created_at, updated_at";

fn table(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Charge => "charges",
        TransactionKind::Withdrawal => "withdrawals",
    }
}

fn columns(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Charge => CHARGE_COLUMNS,
        TransactionKind::Withdrawal => WITHDRAWAL_COLUMNS,
    }
}

/// Row shape shared by both tables
#[derive(Debug, Clone, FromRow)]
struct TransactionRow {
    id: Uuid,
    owner_id: Uuid,
    provider_id: Uuid,
    external_id: Option<String>,
    amount: Decimal,
    status: String,
    payer_name: Option<String>,
    payer_cpf: Option<String>,
    payment_date: Option<DateTime<Utc>>,
    bank_account: Option<Value>,
    requested_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_transaction(self, kind: TransactionKind) -> DbResult<Transaction> {
        let status: TransactionStatus = self.status.parse().map_err(|message| {
            DatabaseError::new(DatabaseErrorKind::Corrupt { message })
                .with_context(format!("{} {}", table(kind), self.id))
        })?;

        let details = match kind {
            TransactionKind::Charge => TransactionDetails::Charge(ChargeDetails {
                payer_name: self.payer_name,
                payer_document: self.payer_cpf,
                payment_date: self.payment_date,
            }),
            TransactionKind::Withdrawal => TransactionDetails::Withdrawal(WithdrawalDetails {
                bank_account: self.bank_account,
                requested_at: self.requested_at,
                completed_at: self.completed_at,
            }),
        };

        Ok(Transaction {
            id: self.id,
            owner_id: self.owner_id,
            provider_id: self.provider_id,
            external_id: self.external_id,
            amount: self.amount,
            status,
            details,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Postgres storage for charges and withdrawals
///
/// Webhook updates lock the row with `SELECT ... FOR UPDATE` for the
/// duration of the read-modify-write.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_row(conn: &mut PgConnection, tx: &Transaction) -> DbResult<Transaction> {
        let kind = tx.kind();
        let row = match &tx.details {
            TransactionDetails::Charge(details) => {
                let sql = format!(
                    "UPDATE charges
                     SET external_id = COALESCE(external_id, $2), amount = $3, status = $4,
                         payer_name = $5, payer_cpf = $6, payment_date = $7, metadata = $8, updated_at = $9
                     WHERE id = $1
                     RETURNING {}",
                    CHARGE_COLUMNS
                );
                sqlx::query_as::<_, TransactionRow>(&sql)
                    .bind(tx.id)
                    .bind(&tx.external_id)
                    .bind(tx.amount)
                    .bind(tx.status.as_str())
                    .bind(&details.payer_name)
                    .bind(&details.payer_document)
                    .bind(details.payment_date)
                    .bind(&tx.metadata)
                    .bind(tx.updated_at)
                    .fetch_one(&mut *conn)
                    .await
            }
            TransactionDetails::Withdrawal(details) => {
                let sql = format!(
                    "UPDATE withdrawals
                     SET external_id = COALESCE(external_id, $2), amount = $3, status = $4,
                         bank_account = $5, requested_at = $6, completed_at = $7, metadata = $8, updated_at = $9
                     WHERE id = $1
                     RETURNING {}",
                    WITHDRAWAL_COLUMNS
                );
                sqlx::query_as::<_, TransactionRow>(&sql)
                    .bind(tx.id)
                    .bind(&tx.external_id)
                    .bind(tx.amount)
                    .bind(tx.status.as_str())
                    .bind(&details.bank_account)
                    .bind(details.requested_at)
                    .bind(details.completed_at)
                    .bind(&tx.metadata)
                    .bind(tx.updated_at)
                    .fetch_one(&mut *conn)
                    .await
            }
        }
        .map_err(DatabaseError::from_sqlx)?;

        row.into_transaction(kind)
    }
}

#[async_trait]
impl TransactionStore for TransactionRepository {
    async fn insert(&self, transaction: &Transaction) -> Result<Transaction, DatabaseError> {
        let kind = transaction.kind();
        let row = match &transaction.details {
            TransactionDetails::Charge(details) => {
                let sql = format!(
                    "INSERT INTO charges (id, owner_id, provider_id, external_id, amount, status,
                         payer_name, payer_cpf, payment_date, metadata, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                     RETURNING {}",
                    CHARGE_COLUMNS
                );
                sqlx::query_as::<_, TransactionRow>(&sql)
                    .bind(transaction.id)
                    .bind(transaction.owner_id)
                    .bind(transaction.provider_id)
                    .bind(&transaction.external_id)
                    .bind(transaction.amount)
                    .bind(transaction.status.as_str())
                    .bind(&details.payer_name)
                    .bind(&details.payer_document)
                    .bind(details.payment_date)
                    .bind(&transaction.metadata)
                    .bind(transaction.created_at)
                    .bind(transaction.updated_at)
                    .fetch_one(&self.pool)
                    .await
            }
            TransactionDetails::Withdrawal(details) => {
                let sql = format!(
                    "INSERT INTO withdrawals (id, owner_id, provider_id, external_id, amount, status,
                         bank_account, requested_at, completed_at, metadata, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                     RETURNING {}",
                    WITHDRAWAL_COLUMNS
                );
                sqlx::query_as::<_, TransactionRow>(&sql)
                    .bind(transaction.id)
                    .bind(transaction.owner_id)
                    .bind(transaction.provider_id)
                    .bind(&transaction.external_id)
                    .bind(transaction.amount)
                    .bind(transaction.status.as_str())
                    .bind(&details.bank_account)
                    .bind(details.requested_at)
                    .bind(details.completed_at)
                    .bind(&transaction.metadata)
                    .bind(transaction.created_at)
                    .bind(transaction.updated_at)
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(DatabaseError::from_sqlx)?;

        row.into_transaction(kind)
    }

    async fn find_by_id(
        &self,
        kind: TransactionKind,
        id: Uuid,
    ) -> Result<Option<Transaction>, DatabaseError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", columns(kind), table(kind));
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .map(|row| row.into_transaction(kind))
            .transpose()
    }

    async fn find_by_external_id(
        &self,
        kind: TransactionKind,
        external_id: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE external_id = $1",
            columns(kind),
            table(kind)
        );
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .map(|row| row.into_transaction(kind))
            .transpose()
    }

    async fn list_by_owner(
        &self,
        kind: TransactionKind,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            columns(kind),
            table(kind)
        );
        sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .into_iter()
            .map(|row| row.into_transaction(kind))
            .collect()
    }

    async fn update_locked(
        &self,
        kind: TransactionKind,
        id: Uuid,
        transition: Transition,
    ) -> Result<(Transaction, Transaction), DatabaseError> {
        let mut db_tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            columns(kind),
            table(kind)
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .ok_or_else(|| DatabaseError::not_found(table(kind), id))?;

        let before = row.into_transaction(kind)?;
        let after = transition(&before);
        let stored = Self::write_row(&mut db_tx, &after)
            .await
            .map_err(|e| e.with_context("update_locked"))?;

        db_tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok((before, stored))
    }
}
