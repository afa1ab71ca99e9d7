use crate::{
    config::SettlementConfig,
    error::{ApiError, Result},
    models::payments::SettlementNotification,
    services::payment_service::PaymentService,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Glue between the external settlement source and the payment service.
///
/// Two inbound paths feed the same `confirm_settlement` call: the bank
/// webhook (authenticated by API key) and an optional polling fallback for
/// deployments where the provider cannot reach us.
pub struct SettlementService {
    config: SettlementConfig,
    http_client: reqwest::Client,
    payments: Arc<PaymentService>,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    transactions: Vec<PolledSettlement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolledSettlement {
    transaction_code: String,
    amount: i64,
}

impl SettlementService {
    pub fn new(config: &SettlementConfig, payments: Arc<PaymentService>) -> Self {
        Self {
            config: config.clone(),
            http_client: reqwest::Client::new(),
            payments,
        }
    }

    /// Check the webhook's `Authorization: Apikey <key>` header.
    pub fn verify_api_key(&self, authorization: Option<&str>) -> Result<()> {
        let presented = authorization
            .and_then(|h| h.strip_prefix("Apikey "))
            .ok_or_else(|| {
                ApiError::Unauthorized(
                    "Missing Authorization header, expected 'Apikey <key>'".to_string(),
                )
            })?;

        if !token_matches(presented, &self.config.api_key) {
            return Err(ApiError::Unauthorized(
                "Invalid settlement API key".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply one verified webhook notification.
    #[instrument(skip(self))]
    pub async fn handle_notification(
        &self,
        notification: &SettlementNotification,
    ) -> Result<entity::payment_orders::Model> {
        self.payments
            .confirm_settlement(&notification.transaction_code, notification.amount)
            .await
    }

    /// Fetch the provider's recent transfers and settle any that match.
    /// Codes we don't know and orders already settled are expected noise.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> Result<usize> {
        let Some(url) = self.config.poll_url.as_deref() else {
            return Ok(0);
        };

        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Apikey {}", self.config.api_key))
            .send()
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Settlement poll failed: {}", e)))?;

        let payload: PollResponse = response.json().await.map_err(|e| {
            ApiError::Internal(anyhow::anyhow!("Invalid settlement poll response: {}", e))
        })?;

        let mut settled = 0;
        for item in payload.transactions {
            match self
                .payments
                .confirm_settlement(&item.transaction_code, item.amount)
                .await
            {
                Ok(_) => settled += 1,
                Err(ApiError::NotFound(_)) | Err(ApiError::Conflict(_)) => {
                    debug!("Skipping polled transfer {}", item.transaction_code);
                }
                Err(e) => {
                    warn!(
                        "Failed to settle polled transfer {}: {}",
                        item.transaction_code, e
                    );
                }
            }
        }

        Ok(settled)
    }

    pub fn poll_enabled(&self) -> bool {
        self.config.poll_url.is_some()
    }
}

/// Compare digests so the comparison cost does not depend on how much of
/// the key matched.
fn token_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_tokens_pass() {
        assert!(token_matches("secret-key", "secret-key"));
    }

    #[test]
    fn mismatched_tokens_fail() {
        assert!(!token_matches("secret-key", "other-key"));
        assert!(!token_matches("secret", "secret-key"));
        assert!(!token_matches("", "secret-key"));
    }
}
