//! USD to RUB exchange rate
//!
//! `ExchangeRateService` keeps the last live snapshot for `rates.ttl_secs`.
//! When it is stale the source is queried again; on failure the configured
//! fallback rate is returned, tagged as such.

use crate::{
    common::{
        traits::RateSource,
        types::{ExchangeRate, RateOrigin},
    },
    config::RatesConfig,
    errors::{CaseboxResult, UpstreamError},
    storage::OptimizedStorage,
    store::rates::{load_rate, store_rate},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

const SERVICE: &str = "exchange_rate";

#[derive(Debug, Deserialize)]
struct LatestRates {
    rates: HashMap<String, f64>,
}

/// exchangerate-api.com style `latest/USD` endpoint
pub struct ExchangeRateClient {
    http: Client,
    endpoint: String,
}

impl ExchangeRateClient {
    pub fn new(config: &RatesConfig) -> CaseboxResult<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| UpstreamError::RequestFailed {
                service: SERVICE,
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl RateSource for ExchangeRateClient {
    async fn fetch_usd_to_rub(&self) -> CaseboxResult<f64> {
        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| UpstreamError::RequestFailed {
                service: SERVICE,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(UpstreamError::BadStatus {
                service: SERVICE,
                status: response.status().as_u16(),
            }
            .into());
        }

        let latest: LatestRates = response.json().await.map_err(|e| UpstreamError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })?;

        latest.rates.get("RUB").copied().ok_or_else(|| {
            UpstreamError::InvalidResponse {
                service: SERVICE,
                message: "no RUB rate in response".to_string(),
            }
            .into()
        })
    }
}

pub struct ExchangeRateService {
    source: Arc<dyn RateSource>,
    storage: OptimizedStorage,
    ttl: Duration,
    fallback_rate: f64,
    snapshot: RwLock<Option<ExchangeRate>>,
}

impl ExchangeRateService {
    /// Seeds the in-memory snapshot from the last persisted rate, if any
    pub fn new(source: Arc<dyn RateSource>, storage: OptimizedStorage, config: &RatesConfig) -> Self {
        let persisted = match load_rate(&storage, "USD", "RUB") {
            Ok(rate) => rate,
            Err(e) => {
                warn!(error = %e, "Could not load persisted exchange rate");
                None
            }
        };

        Self {
            source,
            storage,
            // Bounded by `AppConfig::validate`
            ttl: Duration::from_std(config.ttl()).unwrap_or(Duration::MAX),
            fallback_rate: config.fallback_rate,
            snapshot: RwLock::new(persisted),
        }
    }

    fn is_fresh(&self, rate: &ExchangeRate) -> bool {
        Utc::now() - rate.updated_at < self.ttl
    }

    /// Always yields a usable rate
    pub async fn current(&self) -> ExchangeRate {
        if let Some(rate) = self.snapshot.read().await.as_ref().filter(|r| self.is_fresh(r)) {
            return ExchangeRate {
                source: RateOrigin::Cached,
                ..rate.clone()
            };
        }

        match self.source.fetch_usd_to_rub().await {
            Ok(value) if value.is_finite() && value > 0.0 => {
                let rate = ExchangeRate::usd_to_rub(value, RateOrigin::Live);
                if let Err(e) = store_rate(&self.storage, &rate) {
                    warn!(error = %e, "Failed to persist exchange rate");
                }
                *self.snapshot.write().await = Some(rate.clone());
                info!(rate = value, "💱 Exchange rate refreshed");
                rate
            }
            Ok(value) => {
                error!(rate = value, "Rate source returned an unusable value, using fallback");
                self.fallback()
            }
            Err(e) => {
                error!(error = %e, "Failed to get exchange rate, using fallback");
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> ExchangeRate {
        debug!(rate = self.fallback_rate, "Serving fallback exchange rate");
        ExchangeRate::usd_to_rub(self.fallback_rate, RateOrigin::Fallback)
    }
}
