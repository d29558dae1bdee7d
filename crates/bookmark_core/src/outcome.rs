use std::fmt;

use crate::UrlRecord;

/// Pipeline stage at which a URL gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    Fetch,
    Summarize,
    Store,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Fetch => write!(f, "fetch"),
            FailureStage::Summarize => write!(f, "summarize"),
            FailureStage::Store => write!(f, "store"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Already in the store or handled earlier in this run.
    AlreadyProcessed,
    /// Lost the insert race to another writer.
    StoredConcurrently,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => write!(f, "already processed"),
            SkipReason::StoredConcurrently => write!(f, "stored concurrently"),
        }
    }
}

/// Terminal state of one URL in a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlOutcome {
    Stored(UrlRecord),
    Skipped(SkipReason),
    Failed { stage: FailureStage, reason: String },
}

impl UrlOutcome {
    pub fn failed(stage: FailureStage, reason: impl Into<String>) -> Self {
        UrlOutcome::Failed {
            stage,
            reason: reason.into(),
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, UrlOutcome::Stored(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReport {
    /// Position in the input list.
    pub index: usize,
    pub raw_url: String,
    pub normalized_url: String,
    pub outcome: UrlOutcome,
}

/// A failed URL as it appeared in the input, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenUrl {
    pub raw_url: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    reports: Vec<UrlReport>,
}

impl BatchReport {
    /// Builds a report in input order regardless of completion order.
    pub fn from_reports(mut reports: Vec<UrlReport>) -> Self {
        reports.sort_by_key(|report| report.index);
        Self { reports }
    }

    pub fn reports(&self) -> &[UrlReport] {
        &self.reports
    }

    pub fn stored_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.is_stored())
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| matches!(report.outcome, UrlOutcome::Skipped(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.broken_urls().len()
    }

    pub fn stored_records(&self) -> Vec<&UrlRecord> {
        self.reports
            .iter()
            .filter_map(|report| match &report.outcome {
                UrlOutcome::Stored(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn broken_urls(&self) -> Vec<BrokenUrl> {
        self.reports
            .iter()
            .filter_map(|report| match &report.outcome {
                UrlOutcome::Failed { stage, reason } => Some(BrokenUrl {
                    raw_url: report.raw_url.clone(),
                    stage: *stage,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}
