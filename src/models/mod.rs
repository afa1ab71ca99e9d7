// Request/Response models
pub mod common;
pub mod jobs;
pub mod ledger;
pub mod payments;
