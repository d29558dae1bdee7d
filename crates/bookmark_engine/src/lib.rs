//! Bookmark engine: network, storage and the batch enrichment pipeline.
mod decode;
mod extract;
mod fetch;
mod liveness;
mod persist;
mod pipeline;
mod store;
mod summarize;
mod types;

pub use decode::{decode_html, host_tld, DecodedHtml};
pub use extract::{extract_page, ExtractedPage};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use liveness::{partition_by_liveness, Liveness, LivenessProbe, LivenessReport, LivenessSettings};
pub use persist::{ensure_output_dir, write_atomically, write_url_list, PersistError};
pub use pipeline::{BatchContext, Clock, Orchestrator, PipelineSettings, ProgressSink};
pub use store::{RecordStore, RedbRecordStore, StoreError};
pub use summarize::{
    clean_output, FragmentStream, GenerationOptions, OllamaSummarizer, SummarizeError, Summarizer,
    SummarizerConfig,
};
pub use types::{FailureKind, FetchError, FetchedPage, PipelineEvent, Stage};
