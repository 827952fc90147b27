pub mod alert_engine;
pub mod extractor;
pub mod manuals;
pub mod monitoring;
pub mod notifier;
pub mod retention;

pub use extractor::{ExtractionJob, ExtractorHandle};
