pub mod prelude;

pub mod accounts;
pub mod generation_jobs;
pub mod gift_codes;
pub mod payment_orders;
pub mod sea_orm_active_enums;
pub mod usage_logs;
pub mod vouchers;
