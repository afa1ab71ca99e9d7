pub use super::accounts::Entity as Accounts;
pub use super::generation_jobs::Entity as GenerationJobs;
pub use super::gift_codes::Entity as GiftCodes;
pub use super::payment_orders::Entity as PaymentOrders;
pub use super::usage_logs::Entity as UsageLogs;
pub use super::vouchers::Entity as Vouchers;
