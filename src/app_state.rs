use crate::{
    config::Config,
    services::{JobService, LedgerService, PaymentService, SettlementService, VoucherService},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub ledger_service: Arc<LedgerService>,
    pub job_service: Arc<JobService>,
    pub voucher_service: Arc<VoucherService>,
    pub payment_service: Arc<PaymentService>,
    pub settlement_service: Arc<SettlementService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = sea_orm::Database::connect(&config.database.url).await?;

        // Initialize services; the ledger is shared by everything that
        // moves credits
        let ledger_service = Arc::new(LedgerService::new(db.clone(), &config.ledger));
        let job_service = Arc::new(JobService::new(
            db.clone(),
            ledger_service.clone(),
            &config.jobs,
        ));
        let voucher_service = Arc::new(VoucherService::new(db.clone()));
        let payment_service = Arc::new(PaymentService::new(
            db.clone(),
            ledger_service.clone(),
            voucher_service.clone(),
            &config.payment,
        ));
        let settlement_service = Arc::new(SettlementService::new(
            &config.settlement,
            payment_service.clone(),
        ));

        Ok(Self {
            db,
            ledger_service,
            job_service,
            voucher_service,
            payment_service,
            settlement_service,
            config: Arc::new(config),
        })
    }
}
