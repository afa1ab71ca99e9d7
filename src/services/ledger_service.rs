use crate::{
    config::LedgerConfig,
    error::{ApiError, Result},
};
use entity::sea_orm_active_enums::LedgerEntryType;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, sea_query::OnConflict, DatabaseConnection,
    DatabaseTransaction, TransactionTrait,
};
use tracing::{info, instrument};
use uuid::Uuid;

pub struct LedgerService {
    db: DatabaseConnection,
    config: LedgerConfig,
}

#[derive(Debug, Clone)]
pub struct LedgerStatus {
    pub credits: i32,
    pub subscription_end: Option<time::OffsetDateTime>,
    pub is_expired: bool,
}

impl LedgerService {
    pub fn new(db: DatabaseConnection, config: &LedgerConfig) -> Self {
        Self {
            db,
            config: config.clone(),
        }
    }

    /// Take `amount` credits from the account and append the audit entry.
    ///
    /// Both writes commit as one transaction. The balance decrement is a
    /// single conditional UPDATE guarded by `credits >= amount`, so two
    /// concurrent debits can never both observe sufficient balance and
    /// overdraw the account.
    #[instrument(skip(self))]
    pub async fn debit(&self, user_id: Uuid, amount: i32, description: &str) -> Result<Uuid> {
        if amount <= 0 {
            return Err(ApiError::BadRequest(
                "Debit amount must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        self.ensure_account_in_txn(user_id, None, &txn).await?;

        let now = time::OffsetDateTime::now_utc();
        let result = entity::accounts::Entity::update_many()
            .col_expr(
                entity::accounts::Column::Credits,
                Expr::col(entity::accounts::Column::Credits).sub(amount),
            )
            .col_expr(entity::accounts::Column::UpdatedAt, Expr::value(now))
            .filter(entity::accounts::Column::UserId.eq(user_id))
            .filter(entity::accounts::Column::Credits.gte(amount))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            // Balance was below `amount`; report what the user actually has.
            let available = entity::accounts::Entity::find()
                .filter(entity::accounts::Column::UserId.eq(user_id))
                .one(&txn)
                .await?
                .map(|a| a.credits)
                .unwrap_or(0);
            txn.rollback().await?;
            return Err(ApiError::InsufficientCredits {
                required: amount,
                available,
            });
        }

        let log_id = self
            .append_entry_in_txn(user_id, amount, LedgerEntryType::Debit, description, &txn)
            .await?;

        txn.commit().await?;

        info!(
            "Debited {} credits from user {} (usage_log {})",
            amount, user_id, log_id
        );

        Ok(log_id)
    }

    /// Return `amount` credits to the account (refunds and grants).
    ///
    /// Never fails on business grounds, only on storage errors.
    #[instrument(skip(self))]
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        entry_type: LedgerEntryType,
        description: &str,
    ) -> Result<Uuid> {
        let txn = self.db.begin().await?;
        let log_id = self
            .credit_in_txn(user_id, amount, entry_type, description, &txn)
            .await?;
        txn.commit().await?;
        Ok(log_id)
    }

    /// Credit within an existing transaction.
    /// Used by services that combine a refund or grant with their own state
    /// change (job finalization, settlement, gift codes) in one commit.
    #[instrument(skip(self, txn))]
    pub async fn credit_in_txn(
        &self,
        user_id: Uuid,
        amount: i32,
        entry_type: LedgerEntryType,
        description: &str,
        txn: &DatabaseTransaction,
    ) -> Result<Uuid> {
        if amount <= 0 {
            return Err(ApiError::BadRequest(
                "Credit amount must be positive".to_string(),
            ));
        }
        if entry_type == LedgerEntryType::Debit {
            return Err(ApiError::BadRequest(
                "Credit entries must be refund or grant".to_string(),
            ));
        }

        self.ensure_account_in_txn(user_id, None, txn).await?;

        let now = time::OffsetDateTime::now_utc();
        entity::accounts::Entity::update_many()
            .col_expr(
                entity::accounts::Column::Credits,
                Expr::col(entity::accounts::Column::Credits).add(amount),
            )
            .col_expr(entity::accounts::Column::UpdatedAt, Expr::value(now))
            .filter(entity::accounts::Column::UserId.eq(user_id))
            .exec(txn)
            .await?;

        let log_id = self
            .append_entry_in_txn(user_id, amount, entry_type, description, txn)
            .await?;

        info!(
            "Credited {} credits to user {} ({:?}, usage_log {})",
            amount, user_id, entry_type, log_id
        );

        Ok(log_id)
    }

    /// Read path; provisions the account with the signup grant on first touch.
    #[instrument(skip(self))]
    pub async fn get_status(&self, user_id: Uuid, email: Option<&str>) -> Result<LedgerStatus> {
        let account = self.ensure_account(user_id, email).await?;
        let now = time::OffsetDateTime::now_utc();

        Ok(LedgerStatus {
            credits: account.credits,
            subscription_end: account.subscription_end,
            is_expired: account.subscription_end.is_some_and(|end| end < now),
        })
    }

    /// Push `subscription_end` forward by `days`, counting from whichever is
    /// later: now or the current end.
    pub async fn extend_subscription_in_txn(
        &self,
        user_id: Uuid,
        days: i64,
        txn: &DatabaseTransaction,
    ) -> Result<()> {
        if days <= 0 {
            return Ok(());
        }

        let account = entity::accounts::Entity::find()
            .filter(entity::accounts::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Account for user {}", user_id)))?;

        let now = time::OffsetDateTime::now_utc();
        let base = match account.subscription_end {
            Some(end) if end > now => end,
            _ => now,
        };

        let mut active: entity::accounts::ActiveModel = account.into();
        active.subscription_end = Set(Some(base + time::Duration::days(days)));
        active.updated_at = Set(now);
        active.update(txn).await?;

        Ok(())
    }

    /// Latest audit entries for the user, newest first.
    #[instrument(skip(self))]
    pub async fn recent_entries(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<entity::usage_logs::Model>> {
        let entries = entity::usage_logs::Entity::find()
            .filter(entity::usage_logs::Column::UserId.eq(user_id))
            .order_by_desc(entity::usage_logs::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(entries)
    }

    /// Get or create the account row (first-touch provisioning).
    pub async fn ensure_account(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<entity::accounts::Model> {
        if let Some(account) = entity::accounts::Entity::find()
            .filter(entity::accounts::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
        {
            return Ok(account);
        }

        let txn = self.db.begin().await?;
        self.ensure_account_in_txn(user_id, email, &txn).await?;
        txn.commit().await?;

        entity::accounts::Entity::find()
            .filter(entity::accounts::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!(
                    "Failed to find account record after upsert for user {}",
                    user_id
                ))
            })
    }

    /// Insert the account row with the signup grant if it does not exist.
    /// ON CONFLICT DO NOTHING keeps concurrent first touches race-safe.
    pub(crate) async fn ensure_account_in_txn(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        txn: &DatabaseTransaction,
    ) -> Result<()> {
        if entity::accounts::Entity::find()
            .filter(entity::accounts::Column::UserId.eq(user_id))
            .one(txn)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let now = time::OffsetDateTime::now_utc();
        let grant = self.config.signup_grant;

        let new_account = entity::accounts::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            email: Set(email.map(|e| e.to_string())),
            credits: Set(grant),
            subscription_end: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let insert = entity::accounts::Entity::insert(new_account)
            .on_conflict(
                OnConflict::column(entity::accounts::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(txn)
            .await;

        match insert {
            // Our insert won; the signup-grant audit row belongs to us
            Ok(_) => {
                if grant > 0 {
                    self.append_entry_in_txn(
                        user_id,
                        grant,
                        LedgerEntryType::Grant,
                        "Signup grant",
                        txn,
                    )
                    .await?;
                }
                Ok(())
            }
            // A concurrent first touch created the row between our probe
            // and the insert; DO NOTHING surfaces as RecordNotInserted
            Err(sea_orm::DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_entry_in_txn(
        &self,
        user_id: Uuid,
        amount: i32,
        entry_type: LedgerEntryType,
        description: &str,
        txn: &DatabaseTransaction,
    ) -> Result<Uuid> {
        let log_id = Uuid::new_v4();
        let entry = entity::usage_logs::ActiveModel {
            id: Set(log_id),
            user_id: Set(user_id),
            amount: Set(amount),
            entry_type: Set(entry_type),
            description: Set(description.to_string()),
            created_at: Set(time::OffsetDateTime::now_utc()),
        };

        entity::usage_logs::Entity::insert(entry).exec(txn).await?;

        Ok(log_id)
    }
}
