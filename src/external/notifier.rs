use crate::config::MailerConfig;
use crate::entities::{ChangeReason, PlanTier, account_entity as accounts};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

/// Outbound notification capability consumed by the scheduler and the quota
/// tracker. One concrete implementation is injected at startup; tests swap
/// in a recording stub.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_expiration_warning(
        &self,
        account: &accounts::Model,
        days_left: i64,
    ) -> AppResult<()>;

    async fn send_grace_period(
        &self,
        account: &accounts::Model,
        grace_until: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn send_tier_change(
        &self,
        account: &accounts::Model,
        previous_plan: &PlanTier,
        new_plan: &PlanTier,
        reason: &ChangeReason,
    ) -> AppResult<()>;

    async fn send_upgrade_prompt(
        &self,
        account: &accounts::Model,
        feature: &str,
    ) -> AppResult<()>;
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    pub success: bool,
    pub message: Option<String>,
}

/// Mail relay client. Posts templated messages to the transactional mail
/// service; template rendering happens on the relay side.
#[derive(Clone)]
pub struct EmailNotifier {
    client: Client,
    config: MailerConfig,
}

impl EmailNotifier {
    pub fn new(config: MailerConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn deliver(
        &self,
        to: &str,
        template: &str,
        payload: serde_json::Value,
    ) -> AppResult<()> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let body = serde_json::json!({
            "from": self.config.from_address,
            "to": to,
            "template": template,
            "variables": payload,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AppError::NotificationError(format!(
                "mail relay returned {} for template {template}",
                resp.status()
            )));
        }
        let parsed: RelayResponse = resp.json().await?;
        if !parsed.success {
            return Err(AppError::NotificationError(
                parsed.message.unwrap_or_else(|| "relay rejected message".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for EmailNotifier {
    async fn send_expiration_warning(
        &self,
        account: &accounts::Model,
        days_left: i64,
    ) -> AppResult<()> {
        let payload = serde_json::json!({
            "name": account.display_name.clone().unwrap_or_else(|| account.email.clone()),
            "days_left": days_left,
        });
        self.deliver(&account.email, "tier_expiring_warning", payload)
            .await
    }

    async fn send_grace_period(
        &self,
        account: &accounts::Model,
        grace_until: DateTime<Utc>,
    ) -> AppResult<()> {
        let payload = serde_json::json!({
            "name": account.display_name.clone().unwrap_or_else(|| account.email.clone()),
            "grace_until": grace_until.to_rfc3339(),
        });
        self.deliver(&account.email, "tier_grace_period", payload)
            .await
    }

    async fn send_tier_change(
        &self,
        account: &accounts::Model,
        previous_plan: &PlanTier,
        new_plan: &PlanTier,
        reason: &ChangeReason,
    ) -> AppResult<()> {
        let payload = serde_json::json!({
            "name": account.display_name.clone().unwrap_or_else(|| account.email.clone()),
            "previous_plan": previous_plan.to_string(),
            "new_plan": new_plan.to_string(),
            "reason": reason.to_string(),
        });
        self.deliver(&account.email, "tier_changed", payload).await
    }

    async fn send_upgrade_prompt(
        &self,
        account: &accounts::Model,
        feature: &str,
    ) -> AppResult<()> {
        let payload = serde_json::json!({
            "name": account.display_name.clone().unwrap_or_else(|| account.email.clone()),
            "feature": feature,
        });
        self.deliver(&account.email, "upgrade_prompt", payload).await
    }
}
