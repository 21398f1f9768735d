pub mod api;
pub mod cache;
pub mod config;
pub mod countries;
pub mod dataset;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod index;
pub mod registry;
pub mod service;

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;

use cache::Cache;
use config::Config;
use countries::CountryDirectory;
use dispatcher::{Dispatcher, Notifier};
use index::LetterIndex;
use registry::WebhookRegistry;
use service::RenewablesService;

/// Process start, for the uptime on the status page. Forced in `main`.
pub static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: RenewablesService,
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<dyn WebhookRegistry>,
    pub countries: Arc<dyn CountryDirectory>,
}

impl AppState {
    pub fn new(
        config: Config,
        index: LetterIndex,
        cache: Cache,
        registry: Arc<dyn WebhookRegistry>,
        notifier: Arc<dyn Notifier>,
        countries: Arc<dyn CountryDirectory>,
    ) -> Self {
        let service = RenewablesService::new(Arc::new(index), cache, config.current_year);
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), notifier));
        Self {
            config: Arc::new(config),
            service,
            dispatcher,
            registry,
            countries,
        }
    }
}
