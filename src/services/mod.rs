// Service modules
pub mod completion_hub;
pub mod job_service;
pub mod ledger_service;
pub mod payment_service;
pub mod settlement_service;
pub mod voucher_service;

pub use job_service::JobService;
pub use ledger_service::LedgerService;
pub use payment_service::PaymentService;
pub use settlement_service::SettlementService;
pub use voucher_service::VoucherService;
