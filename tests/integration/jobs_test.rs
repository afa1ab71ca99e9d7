/// Job lifecycle: debit-backed creation, forward-only transitions, and the
/// stale sweep refunding abandoned work exactly once.
use crate::{jobs_config, ledger_config, setup_test_db};
use entity::sea_orm_active_enums::JobStatus;
use opzen::services::{JobService, LedgerService};
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection};
use std::sync::Arc;
use uuid::Uuid;

fn services(db: DatabaseConnection) -> (Arc<LedgerService>, JobService) {
    let ledger = Arc::new(LedgerService::new(db.clone(), &ledger_config(100)));
    let jobs = JobService::new(db, ledger.clone(), &jobs_config());
    (ledger, jobs)
}

/// Rewind a job's heartbeat so the sweep sees it as abandoned.
async fn age_job(db: &DatabaseConnection, job_id: Uuid, minutes: i64) {
    let aged = time::OffsetDateTime::now_utc() - time::Duration::minutes(minutes);
    entity::generation_jobs::Entity::update_many()
        .col_expr(
            entity::generation_jobs::Column::UpdatedAt,
            Expr::value(aged),
        )
        .filter(entity::generation_jobs::Column::Id.eq(job_id))
        .exec(db)
        .await
        .expect("Failed to age job");
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn start_job_debits_and_tracks_the_debit() {
    let db = setup_test_db().await;
    let (ledger, jobs) = services(db);

    let user_id = Uuid::new_v4();
    let job = jobs
        .start_job(user_id, "video-gen", "a lighthouse at dusk", 5)
        .await
        .expect("job creation should succeed");

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.cost, 5);

    let status = ledger.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 95);

    // The job references the usage log that proves money was taken
    let entries = ledger.recent_entries(user_id, 10).await.unwrap();
    assert!(entries.iter().any(|e| e.id == job.usage_log_id));
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn transitions_are_forward_only() {
    let db = setup_test_db().await;
    let (_ledger, jobs) = services(db);

    let user_id = Uuid::new_v4();
    let job = jobs.start_job(user_id, "video-gen", "prompt", 5).await.unwrap();

    assert!(jobs.mark_processing(job.id).await.unwrap());
    assert!(jobs.mark_completed(job.id, "https://cdn.example/result.mp4").await.unwrap());

    // Terminal state absorbs everything that follows
    assert!(!jobs.mark_processing(job.id).await.unwrap());
    assert!(!jobs.mark_completed(job.id, "https://cdn.example/other.mp4").await.unwrap());
    assert!(!jobs.mark_failed(job.id, "late failure").await.unwrap());

    let job = jobs.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.status.is_terminal());
    assert_eq!(job.result_url.as_deref(), Some("https://cdn.example/result.mp4"));
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn failed_job_refunds_exactly_once() {
    let db = setup_test_db().await;
    let (ledger, jobs) = services(db);

    let user_id = Uuid::new_v4();
    let job = jobs.start_job(user_id, "video-gen", "prompt", 5).await.unwrap();
    jobs.mark_processing(job.id).await.unwrap();

    assert!(jobs.mark_failed(job.id, "Provider error").await.unwrap());

    let status = ledger.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 100, "cost should be refunded");

    // Second failure call is a no-op, never a second refund
    assert!(!jobs.mark_failed(job.id, "Provider error").await.unwrap());
    let status = ledger.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 100);
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn completed_job_keeps_the_debit() {
    let db = setup_test_db().await;
    let (ledger, jobs) = services(db);

    let user_id = Uuid::new_v4();
    let job = jobs.start_job(user_id, "video-gen", "prompt", 5).await.unwrap();
    jobs.mark_processing(job.id).await.unwrap();
    jobs.mark_completed(job.id, "https://cdn.example/result.mp4")
        .await
        .unwrap();

    let status = ledger.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 95, "completed work stays paid for");
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn sweep_refunds_stale_processing_job_once() {
    let db = setup_test_db().await;
    let (ledger, jobs) = services(db.clone());

    let user_id = Uuid::new_v4();
    let job = jobs.start_job(user_id, "video-gen", "prompt", 5).await.unwrap();
    jobs.mark_processing(job.id).await.unwrap();

    // 20 minutes beats the 15-minute TTL
    age_job(&db, job.id, 20).await;

    let swept = jobs.sweep_stale(user_id).await.unwrap();
    assert_eq!(swept, 1);

    let job = jobs.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("System Timeout"));

    let status = ledger.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 100);

    // Running the sweep again finds nothing to do
    let swept = jobs.sweep_stale(user_id).await.unwrap();
    assert_eq!(swept, 0);
    let status = ledger.get_status(user_id, None).await.unwrap();
    assert_eq!(status.credits, 100);
}

#[tokio::test]
#[ignore] // Run only when database is available
async fn sweep_ignores_fresh_and_finished_jobs() {
    let db = setup_test_db().await;
    let (_ledger, jobs) = services(db.clone());

    let user_id = Uuid::new_v4();

    // Fresh processing job: inside the TTL
    let fresh = jobs.start_job(user_id, "video-gen", "fresh", 5).await.unwrap();
    jobs.mark_processing(fresh.id).await.unwrap();

    // Old but already completed
    let done = jobs.start_job(user_id, "video-gen", "done", 5).await.unwrap();
    jobs.mark_processing(done.id).await.unwrap();
    jobs.mark_completed(done.id, "https://cdn.example/r.mp4")
        .await
        .unwrap();
    age_job(&db, done.id, 30).await;

    let swept = jobs.sweep_stale(user_id).await.unwrap();
    assert_eq!(swept, 0);

    assert_eq!(
        jobs.get_job(fresh.id).await.unwrap().status,
        JobStatus::Processing
    );
    assert_eq!(
        jobs.get_job(done.id).await.unwrap().status,
        JobStatus::Completed
    );
}
