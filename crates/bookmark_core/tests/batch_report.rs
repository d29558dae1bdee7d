use bookmark_core::{
    BatchReport, FailureStage, ParsedSummary, SkipReason, UrlOutcome, UrlRecord, UrlReport,
    NO_TITLE,
};
use pretty_assertions::assert_eq;

fn report(index: usize, raw: &str, outcome: UrlOutcome) -> UrlReport {
    UrlReport {
        index,
        raw_url: raw.to_string(),
        normalized_url: raw.to_string(),
        outcome,
    }
}

fn record(url: &str) -> UrlRecord {
    UrlRecord::new(
        url,
        None,
        ParsedSummary {
            summary: "s".to_string(),
            tags: "alpha, beta".to_string(),
        },
        "2024-01-01T00:00:00Z",
    )
}

#[test]
fn report_counts_each_terminal_state_and_restores_input_order() {
    let report = BatchReport::from_reports(vec![
        report(2, "https://c", UrlOutcome::failed(FailureStage::Summarize, "boom")),
        report(0, "https://a", UrlOutcome::Stored(record("https://a"))),
        report(3, "https://d", UrlOutcome::Skipped(SkipReason::AlreadyProcessed)),
        report(1, "https://b?utm_source=x", UrlOutcome::failed(FailureStage::Fetch, "timeout")),
    ]);

    assert_eq!(report.stored_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.failed_count(), 2);

    let broken: Vec<_> = report
        .broken_urls()
        .into_iter()
        .map(|broken| (broken.raw_url, broken.stage))
        .collect();
    assert_eq!(
        broken,
        vec![
            ("https://b?utm_source=x".to_string(), FailureStage::Fetch),
            ("https://c".to_string(), FailureStage::Summarize),
        ]
    );
    assert_eq!(report.stored_records()[0].url, "https://a");
}

#[test]
fn record_defaults_heading_and_splits_tags() {
    let record = record("https://a");
    assert_eq!(record.heading, NO_TITLE);
    assert_eq!(record.tag_list(), vec!["alpha", "beta"]);
}

#[test]
fn record_ids_are_unique_per_creation() {
    assert_ne!(record("https://a").id, record("https://a").id);
}
