use crate::{
    config::{PaymentConfig, PlanConfig},
    error::{ApiError, Result},
    services::{
        completion_hub::{CompletionHub, CompletionSubscription},
        ledger_service::LedgerService,
        voucher_service::{discounted_amount, VoucherService},
    },
};
use entity::sea_orm_active_enums::{LedgerEntryType, OrderStatus};
use rand::Rng;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, DatabaseConnection, TransactionTrait,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Memo codes avoid lookalike characters; payers type them by hand.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_SUFFIX_LEN: usize = 8;

pub struct PaymentService {
    db: DatabaseConnection,
    ledger: Arc<LedgerService>,
    vouchers: Arc<VoucherService>,
    hub: Arc<CompletionHub>,
    config: PaymentConfig,
}

impl PaymentService {
    pub fn new(
        db: DatabaseConnection,
        ledger: Arc<LedgerService>,
        vouchers: Arc<VoucherService>,
        config: &PaymentConfig,
    ) -> Self {
        Self {
            db,
            ledger,
            vouchers,
            hub: CompletionHub::new(),
            config: config.clone(),
        }
    }

    /// Return the live pending order for `(user, plan)` or create one.
    ///
    /// Reuse requires the amount to match the (possibly discounted) price
    /// and the code to carry the current scheme version; anything else
    /// cancels every pending order of the user and inserts a fresh row, so
    /// at most one pending order exists per user afterwards.
    #[instrument(skip(self))]
    pub async fn get_or_create_pending_order(
        &self,
        user_id: Uuid,
        plan_id: &str,
        voucher_code: Option<&str>,
    ) -> Result<entity::payment_orders::Model> {
        let plan = self
            .config
            .plan(plan_id)
            .ok_or_else(|| ApiError::NotFound(format!("Plan '{}'", plan_id)))?
            .clone();

        // Voucher problems surface before any write happens
        let price = self.price_for(&plan, voucher_code).await?;

        let txn = self.db.begin().await?;

        // The locked account row serializes find-or-create per user; two
        // concurrent calls cannot both pass the reuse check and insert.
        self.ledger.ensure_account_in_txn(user_id, None, &txn).await?;
        entity::accounts::Entity::find()
            .filter(entity::accounts::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(&txn)
            .await?;

        let existing = entity::payment_orders::Entity::find()
            .filter(entity::payment_orders::Column::UserId.eq(user_id))
            .filter(entity::payment_orders::Column::PlanId.eq(plan_id))
            .filter(entity::payment_orders::Column::Status.eq(OrderStatus::Pending))
            .order_by_desc(entity::payment_orders::Column::CreatedAt)
            .one(&txn)
            .await?;

        if let Some(order) = existing {
            if order_reusable(&order, price, self.config.code_version) {
                txn.commit().await?;
                info!(
                    "Reusing pending order {} ({}) for user {}",
                    order.id, order.transaction_code, user_id
                );
                return Ok(order);
            }
        }

        // One sweep covers the stale same-plan order and any cross-plan
        // leftovers from the user bouncing between plan choices.
        let now = time::OffsetDateTime::now_utc();
        let cancelled = entity::payment_orders::Entity::update_many()
            .col_expr(
                entity::payment_orders::Column::Status,
                Expr::value(OrderStatus::Cancelled),
            )
            .col_expr(entity::payment_orders::Column::UpdatedAt, Expr::value(now))
            .filter(entity::payment_orders::Column::UserId.eq(user_id))
            .filter(entity::payment_orders::Column::Status.eq(OrderStatus::Pending))
            .exec(&txn)
            .await?;

        let order = entity::payment_orders::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            plan_id: Set(plan.id.clone()),
            plan_name: Set(plan.name.clone()),
            amount: Set(price),
            currency: Set(self.config.currency.clone()),
            order_type: Set(plan.order_type.clone()),
            credits_added: Set(plan.credits),
            status: Set(OrderStatus::Pending),
            payment_method: Set(self.config.payment_method.clone()),
            transaction_code: Set(generate_transaction_code(&self.config.code_prefix)),
            code_version: Set(self.config.code_version),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let order = order.insert(&txn).await?;
        txn.commit().await?;

        info!(
            "Created pending order {} ({}) for user {} plan {} amount {} ({} older cancelled)",
            order.id,
            order.transaction_code,
            user_id,
            plan_id,
            price,
            cancelled.rows_affected
        );

        Ok(order)
    }

    /// Validate a voucher against a plan and return the discounted price.
    #[instrument(skip(self))]
    pub async fn apply_voucher(&self, plan_id: &str, code: &str) -> Result<(i32, i64)> {
        let plan = self
            .config
            .plan(plan_id)
            .ok_or_else(|| ApiError::NotFound(format!("Plan '{}'", plan_id)))?;

        let voucher = self
            .vouchers
            .validate_voucher(code, time::OffsetDateTime::now_utc())
            .await?;

        Ok((
            voucher.discount_percent,
            discounted_amount(plan.price, voucher.discount_percent),
        ))
    }

    /// Redeem a one-shot gift code: claim it, grant its credits, optionally
    /// extend the subscription. All in one transaction; the claim is a
    /// conditional update on `redeemed_at IS NULL`, so a second redemption
    /// fails and grants nothing.
    #[instrument(skip(self))]
    pub async fn redeem_giftcode(&self, user_id: Uuid, code: &str) -> Result<i32> {
        let gift = self.vouchers.find_gift_code(code).await?;

        let txn = self.db.begin().await?;

        let now = time::OffsetDateTime::now_utc();
        let claimed = entity::gift_codes::Entity::update_many()
            .col_expr(
                entity::gift_codes::Column::RedeemedBy,
                Expr::value(Some(user_id)),
            )
            .col_expr(
                entity::gift_codes::Column::RedeemedAt,
                Expr::value(Some(now)),
            )
            .filter(entity::gift_codes::Column::Id.eq(gift.id))
            .filter(entity::gift_codes::Column::RedeemedAt.is_null())
            .exec(&txn)
            .await?;

        if claimed.rows_affected == 0 {
            txn.rollback().await?;
            return Err(ApiError::InvalidGiftcode(format!(
                "Gift code '{}' has already been used",
                code
            )));
        }

        self.ledger
            .credit_in_txn(
                user_id,
                gift.credits,
                LedgerEntryType::Grant,
                &format!("Gift code {}", gift.code),
                &txn,
            )
            .await?;

        self.ledger
            .extend_subscription_in_txn(user_id, i64::from(gift.extend_days), &txn)
            .await?;

        txn.commit().await?;

        info!(
            "Gift code {} redeemed by user {}: +{} credits, +{} days",
            gift.code, user_id, gift.credits, gift.extend_days
        );

        Ok(gift.credits)
    }

    /// Settle an order from the external notifier (webhook or poller).
    ///
    /// The paid amount must match the order exactly; a mismatch is rejected,
    /// never silently accepted. The `pending -> completed` write is
    /// conditional, so a duplicate notification grants nothing.
    #[instrument(skip(self))]
    pub async fn confirm_settlement(
        &self,
        transaction_code: &str,
        paid_amount: i64,
    ) -> Result<entity::payment_orders::Model> {
        let order = entity::payment_orders::Entity::find()
            .filter(entity::payment_orders::Column::TransactionCode.eq(transaction_code))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Order with code '{}'", transaction_code))
            })?;

        if order.amount != paid_amount {
            return Err(ApiError::Conflict(format!(
                "Paid amount {} does not match order amount {} for code {}",
                paid_amount, order.amount, transaction_code
            )));
        }

        let txn = self.db.begin().await?;

        let now = time::OffsetDateTime::now_utc();
        let result = entity::payment_orders::Entity::update_many()
            .col_expr(
                entity::payment_orders::Column::Status,
                Expr::value(OrderStatus::Completed),
            )
            .col_expr(entity::payment_orders::Column::UpdatedAt, Expr::value(now))
            .filter(entity::payment_orders::Column::Id.eq(order.id))
            .filter(entity::payment_orders::Column::Status.eq(OrderStatus::Pending))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(ApiError::Conflict(format!(
                "Order {} is no longer pending",
                order.id
            )));
        }

        self.ledger
            .credit_in_txn(
                order.user_id,
                order.credits_added,
                LedgerEntryType::Grant,
                &format!("Top-up {} ({})", order.plan_name, order.transaction_code),
                &txn,
            )
            .await?;

        // Plans may rotate out of the catalog while an order waits; credits
        // were recorded on the order, the extension is best known from config.
        match self.config.plan(&order.plan_id) {
            Some(plan) => {
                self.ledger
                    .extend_subscription_in_txn(order.user_id, plan.extend_days, &txn)
                    .await?;
            }
            None => warn!(
                "Plan {} of order {} is not in the catalog; skipping subscription extension",
                order.plan_id, order.id
            ),
        }

        txn.commit().await?;

        let completed = entity::payment_orders::Model {
            status: OrderStatus::Completed,
            updated_at: now,
            ..order
        };

        info!(
            "Order {} ({}) settled: +{} credits for user {}",
            completed.id, completed.transaction_code, completed.credits_added, completed.user_id
        );

        self.hub.notify(completed.clone());

        Ok(completed)
    }

    /// Register a one-shot, cancellable waiter for an order's completion.
    pub fn subscribe_completion(&self, order_id: Uuid) -> CompletionSubscription {
        self.hub.subscribe(order_id)
    }

    /// Wait until the order completes or the timeout passes.
    ///
    /// Subscribes first, then re-reads the order, so a settlement that
    /// landed just before the subscription still resolves immediately.
    #[instrument(skip(self))]
    pub async fn wait_for_completion(
        &self,
        order_id: Uuid,
        timeout: Duration,
    ) -> Result<Option<entity::payment_orders::Model>> {
        let mut subscription = self.subscribe_completion(order_id);

        let order = self.get_order(order_id).await?;
        if order.status == OrderStatus::Completed {
            return Ok(Some(order));
        }

        match tokio::time::timeout(timeout, subscription.wait()).await {
            Ok(delivered) => Ok(delivered),
            Err(_elapsed) => Ok(None),
        }
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<entity::payment_orders::Model> {
        entity::payment_orders::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Order {}", order_id)))
    }

    pub fn bank(&self) -> &crate::config::BankConfig {
        &self.config.bank
    }

    pub fn plans(&self) -> &[PlanConfig] {
        &self.config.plans
    }

    async fn price_for(&self, plan: &PlanConfig, voucher_code: Option<&str>) -> Result<i64> {
        match voucher_code {
            Some(code) => {
                let voucher = self
                    .vouchers
                    .validate_voucher(code, time::OffsetDateTime::now_utc())
                    .await?;
                Ok(discounted_amount(plan.price, voucher.discount_percent))
            }
            None => Ok(plan.price),
        }
    }
}

/// Reuse only a pending order whose amount and code scheme still match.
fn order_reusable(
    order: &entity::payment_orders::Model,
    price: i64,
    code_version: i16,
) -> bool {
    order.status == OrderStatus::Pending
        && order.amount == price
        && order.code_version == code_version
}

fn generate_transaction_code(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_CHARSET.len());
            CODE_CHARSET[idx] as char
        })
        .collect();

    format!("{}{}", prefix, suffix)
}
