use entity::sea_orm_active_enums::JobStatus;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::SuccessResponse;

/// Request to start a generation job (debits the cost up front)
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 64))]
    pub tool_id: String,

    #[validate(length(min = 1, max = 8000))]
    pub prompt: String,

    #[validate(range(min = 1))]
    pub cost: i32,
}

/// Worker callback reporting a finished generation
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteJobRequest {
    #[validate(length(min = 1, max = 2048))]
    pub result_url: String,
}

/// Worker callback reporting a failed generation
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FailJobRequest {
    #[validate(length(min = 1, max = 2000))]
    pub error_message: String,
}

pub type JobResponse = SuccessResponse<JobRecord>;
pub type JobListResponse = SuccessResponse<JobListData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListData {
    pub jobs: Vec<JobRecord>,
    /// Stale jobs refunded by the opportunistic sweep that ran first
    pub swept: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: uuid::Uuid,
    pub tool_id: String,
    pub cost: i32,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

impl From<entity::generation_jobs::Model> for JobRecord {
    fn from(job: entity::generation_jobs::Model) -> Self {
        Self {
            id: job.id,
            tool_id: job.tool_id,
            cost: job.cost,
            status: job.status,
            result_url: job.result_url,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_cost_jobs() {
        let request = CreateJobRequest {
            tool_id: "video-gen".to_string(),
            prompt: "a lighthouse at dusk".to_string(),
            cost: 0,
        };
        assert!(request.validate().is_err(), "Zero cost should fail validation");
    }

    #[test]
    fn rejects_empty_prompt() {
        let request = CreateJobRequest {
            tool_id: "video-gen".to_string(),
            prompt: "".to_string(),
            cost: 5,
        };
        assert!(request.validate().is_err(), "Empty prompt should fail validation");
    }

    #[test]
    fn accepts_valid_request() {
        let request = CreateJobRequest {
            tool_id: "video-gen".to_string(),
            prompt: "a lighthouse at dusk".to_string(),
            cost: 5,
        };
        assert!(request.validate().is_ok());
    }
}
