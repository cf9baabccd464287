//! Reachability probe for the environments under test

use std::time::Duration;

use pagediff_common::Environment;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::E2eResult;

/// Outcome of probing an environment's base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reachability {
    Reachable { status: u16 },
    Unreachable { reason: String },
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable { .. })
    }
}

/// Probe settings
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub attempts: usize,
    pub request_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            request_timeout: Duration::from_secs(2),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// GET `base_url`, retrying transport errors.
///
/// Any HTTP response counts as reachable; the status is reported for the
/// caller to judge.
pub async fn probe_environment(base_url: &str, config: &ProbeConfig) -> E2eResult<Reachability> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let mut last_error = String::from("no attempts made");
    for attempt in 1..=config.attempts {
        match client.get(base_url).send().await {
            Ok(resp) => {
                return Ok(Reachability::Reachable {
                    status: resp.status().as_u16(),
                });
            }
            Err(e) => {
                if attempt == 1 {
                    info!("Waiting for {} to respond...", base_url);
                }
                last_error = e.to_string();
            }
        }
        if attempt < config.attempts {
            sleep(config.retry_delay).await;
        }
    }

    Ok(Reachability::Unreachable { reason: last_error })
}

/// Probe one environment and log the outcome; never fails the run
pub async fn check_environment(env: Environment, base_url: &str) -> Reachability {
    let outcome = match probe_environment(base_url, &ProbeConfig::default()).await {
        Ok(outcome) => outcome,
        Err(e) => Reachability::Unreachable { reason: e.to_string() },
    };

    match &outcome {
        Reachability::Reachable { status } if *status < 400 => {
            info!("{} is reachable at {} ({})", env, base_url, status)
        }
        Reachability::Reachable { status } => {
            warn!("{} answered {} at {}; pages may fail", env, status, base_url)
        }
        Reachability::Unreachable { reason } => {
            warn!("{} is unreachable at {}: {}; pages will degrade to errors", env, base_url, reason)
        }
    }

    outcome
}
