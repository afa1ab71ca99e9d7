pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_accounts;
mod m20250901_000002_create_generation_jobs;
mod m20250901_000003_create_payment_orders;
mod m20250901_000004_create_vouchers;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_accounts::Migration),
            Box::new(m20250901_000002_create_generation_jobs::Migration),
            Box::new(m20250901_000003_create_payment_orders::Migration),
            Box::new(m20250901_000004_create_vouchers::Migration),
        ]
    }
}
