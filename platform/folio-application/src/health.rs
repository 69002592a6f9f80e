use crate::config::ExchangeConfig;
use crate::envelope::{Reply, STATUS_OK, STATUS_UNAVAILABLE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn status(&self) -> u16 {
        if self.healthy {
            STATUS_OK
        } else {
            STATUS_UNAVAILABLE
        }
    }
}

/// Reads the credential variables named by `exchange` from the process environment.
pub fn check(exchange: &ExchangeConfig) -> HealthReport {
    check_with(exchange, |name| std::env::var(name).ok())
}

pub fn check_with<F>(exchange: &ExchangeConfig, lookup: F) -> HealthReport
where
    F: Fn(&str) -> Option<String>,
{
    let key_env = exchange.api_key_env();
    let secret_env = exchange.api_secret_env();
    let missing = [key_env, secret_env]
        .into_iter()
        .find(|name| lookup(name).map_or(true, |value| value.trim().is_empty()));

    match missing {
        Some(name) => {
            tracing::warn!(variable = name, "exchange credentials missing");
            HealthReport {
                healthy: false,
                error: Some(format!("{name} is not configured")),
            }
        }
        None => HealthReport {
            healthy: true,
            error: None,
        },
    }
}

pub fn health_reply(report: HealthReport, now: DateTime<Utc>) -> Reply<HealthReport> {
    match report.error.clone() {
        Some(err) => Reply::error(report.status(), err, now),
        None => Reply::ok(report, now),
    }
}
