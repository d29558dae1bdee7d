use std::time::Duration;

use bookmark_logging::{pipeline_debug, pipeline_info};
use futures_util::{stream, StreamExt};
use reqwest::StatusCode;

use crate::types::map_reqwest_error;
use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct LivenessSettings {
    pub timeout: Duration,
    pub redirect_limit: usize,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            redirect_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead(String),
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, Liveness::Alive)
    }
}

/// HEAD-only reachability check. One attempt per URL, no retries.
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    client: reqwest::Client,
}

impl LivenessProbe {
    pub fn new(settings: LivenessSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client })
    }

    /// Alive only when the redirect chain ends in a 200.
    pub async fn classify(&self, url: &str) -> Liveness {
        match self.client.head(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => Liveness::Alive,
            Ok(response) => Liveness::Dead(format!("http status {}", response.status().as_u16())),
            Err(err) => Liveness::Dead(map_reqwest_error(err).to_string()),
        }
    }

    pub async fn is_alive(&self, url: &str) -> bool {
        match self.classify(url).await {
            Liveness::Alive => true,
            Liveness::Dead(reason) => {
                pipeline_debug!("Dead url {}: {}", url, reason);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessReport {
    pub valid: Vec<String>,
    pub broken: Vec<String>,
}

/// Probe every URL with at most `concurrency` requests in flight.
///
/// Both output lists keep the relative input order.
pub async fn partition_by_liveness(
    probe: &LivenessProbe,
    urls: Vec<String>,
    concurrency: usize,
) -> LivenessReport {
    let total = urls.len();
    let mut checked = stream::iter(urls.into_iter().enumerate())
        .map(move |(index, url)| async move {
            let alive = probe.is_alive(&url).await;
            (index, url, alive)
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;
    checked.sort_by_key(|(index, _, _)| *index);

    let mut report = LivenessReport::default();
    for (_, url, alive) in checked {
        if alive {
            report.valid.push(url);
        } else {
            report.broken.push(url);
        }
    }

    pipeline_info!(
        "Liveness check: {} of {} urls alive",
        report.valid.len(),
        total
    );
    report
}
