use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Body of a webhook registration: notify `url` on every `calls`-th lookup
/// of `country`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
    pub country: String,
    pub calls: u64,
}

impl Webhook {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(AppError::BadRequest("webhook url must not be empty".to_string()));
        }
        if self.country.trim().is_empty() {
            return Err(AppError::BadRequest("webhook country must not be empty".to_string()));
        }
        if self.calls == 0 {
            return Err(AppError::BadRequest("webhook calls must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    #[serde(rename = "webhook_id")]
    pub id: String,
    #[serde(flatten)]
    pub webhook: Webhook,
}

impl WebhookSubscription {
    pub fn matches_country(&self, country: &str) -> bool {
        self.webhook.country.trim().eq_ignore_ascii_case(country.trim())
    }
}

#[async_trait]
pub trait WebhookRegistry: Send + Sync {
    async fn create(&self, webhook: Webhook) -> Result<WebhookSubscription>;
    async fn get(&self, id: &str) -> Result<WebhookSubscription>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<WebhookSubscription>>;

    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    webhooks: DashMap<String, Webhook>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookRegistry for MemoryRegistry {
    async fn create(&self, webhook: Webhook) -> Result<WebhookSubscription> {
        webhook.validate()?;
        let id = Uuid::new_v4().to_string();
        self.webhooks.insert(id.clone(), webhook.clone());
        Ok(WebhookSubscription { id, webhook })
    }

    async fn get(&self, id: &str) -> Result<WebhookSubscription> {
        self.webhooks
            .get(id)
            .map(|webhook| WebhookSubscription {
                id: id.to_string(),
                webhook: webhook.clone(),
            })
            .ok_or_else(|| AppError::NotFound(format!("webhook not found: {}", id)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.webhooks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("webhook not found: {}", id)))
    }

    async fn list(&self) -> Result<Vec<WebhookSubscription>> {
        Ok(self
            .webhooks
            .iter()
            .map(|entry| WebhookSubscription {
                id: entry.key().clone(),
                webhook: entry.value().clone(),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.webhooks.len())
    }
}
