use crate::error::{ApiError, Result};
use sea_orm::{entity::*, query::*, DatabaseConnection};
use tracing::instrument;

pub struct VoucherService {
    db: DatabaseConnection,
}

impl VoucherService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Look up a discount code and check it against `now`.
    ///
    /// Fails with distinct kinds so callers can present different messages:
    /// `VoucherNotFound`, `VoucherInactive`, `VoucherExpired`.
    #[instrument(skip(self))]
    pub async fn validate_voucher(
        &self,
        code: &str,
        now: time::OffsetDateTime,
    ) -> Result<entity::vouchers::Model> {
        let voucher = entity::vouchers::Entity::find()
            .filter(entity::vouchers::Column::Code.eq(code))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::VoucherNotFound(code.to_string()))?;

        check_voucher_window(&voucher, now)?;

        Ok(voucher)
    }

    /// Look up a gift code without claiming it. The exactly-once claim is a
    /// conditional update owned by the payment service's transaction.
    #[instrument(skip(self))]
    pub async fn find_gift_code(&self, code: &str) -> Result<entity::gift_codes::Model> {
        entity::gift_codes::Entity::find()
            .filter(entity::gift_codes::Column::Code.eq(code))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::InvalidGiftcode(format!("Gift code '{}' not found", code)))
    }
}

/// Activity flag plus inclusive `[starts_at, ends_at]` window.
pub fn check_voucher_window(
    voucher: &entity::vouchers::Model,
    now: time::OffsetDateTime,
) -> Result<()> {
    if !voucher.is_active {
        return Err(ApiError::VoucherInactive(voucher.code.clone()));
    }

    if let Some(starts_at) = voucher.starts_at {
        if now < starts_at {
            return Err(ApiError::VoucherExpired(voucher.code.clone()));
        }
    }

    if let Some(ends_at) = voucher.ends_at {
        if now > ends_at {
            return Err(ApiError::VoucherExpired(voucher.code.clone()));
        }
    }

    Ok(())
}

/// Price after an integer percentage discount, in minor currency units.
pub fn discounted_amount(price: i64, discount_percent: i32) -> i64 {
    let discount_percent = i64::from(discount_percent.clamp(0, 100));
    price * (100 - discount_percent) / 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    fn voucher(
        is_active: bool,
        starts_at: Option<time::OffsetDateTime>,
        ends_at: Option<time::OffsetDateTime>,
    ) -> entity::vouchers::Model {
        entity::vouchers::Model {
            id: Uuid::new_v4(),
            code: "TEST10".to_string(),
            discount_percent: 10,
            is_active,
            starts_at,
            ends_at,
            created_at: datetime!(2026-01-01 0:00 UTC),
        }
    }

    #[test]
    fn accepts_voucher_inside_window() {
        let v = voucher(
            true,
            Some(datetime!(2026-01-01 0:00 UTC)),
            Some(datetime!(2026-12-31 23:59 UTC)),
        );
        assert!(check_voucher_window(&v, datetime!(2026-06-15 12:00 UTC)).is_ok());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let start = datetime!(2026-01-01 0:00 UTC);
        let end = datetime!(2026-12-31 23:59 UTC);
        let v = voucher(true, Some(start), Some(end));

        assert!(check_voucher_window(&v, start).is_ok());
        assert!(check_voucher_window(&v, end).is_ok());
    }

    #[test]
    fn rejects_inactive_voucher() {
        let v = voucher(false, None, None);
        assert!(matches!(
            check_voucher_window(&v, datetime!(2026-06-15 12:00 UTC)),
            Err(ApiError::VoucherInactive(_))
        ));
    }

    #[test]
    fn rejects_voucher_outside_window() {
        let v = voucher(
            true,
            Some(datetime!(2026-01-01 0:00 UTC)),
            Some(datetime!(2026-06-01 0:00 UTC)),
        );

        assert!(matches!(
            check_voucher_window(&v, datetime!(2025-12-31 23:59 UTC)),
            Err(ApiError::VoucherExpired(_))
        ));
        assert!(matches!(
            check_voucher_window(&v, datetime!(2026-06-01 0:01 UTC)),
            Err(ApiError::VoucherExpired(_))
        ));
    }

    #[test]
    fn missing_dates_mean_unbounded() {
        let v = voucher(true, None, None);
        assert!(check_voucher_window(&v, datetime!(2030-01-01 0:00 UTC)).is_ok());
    }

    #[test]
    fn computes_discounted_amount() {
        assert_eq!(discounted_amount(599_000, 10), 539_100);
        assert_eq!(discounted_amount(599_000, 0), 599_000);
        assert_eq!(discounted_amount(599_000, 100), 0);
    }

    #[test]
    fn clamps_out_of_range_discounts() {
        assert_eq!(discounted_amount(1_000, -5), 1_000);
        assert_eq!(discounted_amount(1_000, 150), 0);
    }
}
