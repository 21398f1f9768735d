//! Per-country call counting and threshold webhooks.
//!
//! Every lookup attributed to a country bumps that country's counter by one.
//! The increment and the read of the new value happen under the map's
//! per-key lock, so each count value is handed to exactly one caller and a
//! subscription with interval `n` fires once per multiple of `n`, even under
//! concurrent load. Delivery happens after the lock is released.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::registry::{WebhookRegistry, WebhookSubscription};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, subscription: &WebhookSubscription) -> Result<()>;
}

/// Posts the subscription itself as JSON to its url.
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn deliver(&self, subscription: &WebhookSubscription) -> Result<()> {
        let response = self
            .client
            .post(&subscription.webhook.url)
            .json(subscription)
            .send()
            .await
            .map_err(|e| AppError::DispatchDelivery(format!("{}: {}", subscription.webhook.url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::DispatchDelivery(format!(
                "{}: status {}",
                subscription.webhook.url,
                response.status()
            )));
        }
        Ok(())
    }
}

pub struct Dispatcher {
    counts: DashMap<String, u64>,
    registry: Arc<dyn WebhookRegistry>,
    notifier: Arc<dyn Notifier>,
}

fn counter_key(country: &str) -> String {
    country.trim().to_lowercase()
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn WebhookRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            counts: DashMap::new(),
            registry,
            notifier,
        }
    }

    pub fn call_count(&self, country: &str) -> u64 {
        self.counts.get(&counter_key(country)).map(|c| *c).unwrap_or(0)
    }

    fn increment(&self, country: &str) -> u64 {
        let mut count = self.counts.entry(counter_key(country)).or_insert(0);
        *count += 1;
        *count
    }

    /// Counts one lookup of `country` and notifies every subscription whose
    /// interval divides the new count. The count is never rolled back; a
    /// failed delivery drops that notification only and is reported after
    /// the remaining subscriptions have been tried.
    pub async fn record_call(&self, country: &str) -> Result<()> {
        let count = self.increment(country);
        debug!(country, count, "call recorded");

        let due: Vec<WebhookSubscription> = self
            .registry
            .list()
            .await?
            .into_iter()
            .filter(|sub| sub.matches_country(country))
            .filter(|sub| sub.webhook.calls > 0 && count % sub.webhook.calls == 0)
            .collect();

        let mut failed = 0;
        for subscription in &due {
            match self.notifier.deliver(subscription).await {
                Ok(()) => info!(
                    id = %subscription.id,
                    url = %subscription.webhook.url,
                    count,
                    "webhook notified"
                ),
                Err(e) => {
                    failed += 1;
                    warn!(id = %subscription.id, "webhook delivery failed: {}", e);
                }
            }
        }

        if failed > 0 {
            return Err(AppError::DispatchDelivery(format!(
                "{} of {} webhook(s) for '{}' failed at call {}",
                failed,
                due.len(),
                country,
                count
            )));
        }
        Ok(())
    }
}
