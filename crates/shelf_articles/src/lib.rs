pub mod extractor;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod ratings;
pub mod retry;
pub mod service;

pub use extractor::{parse_html, ExtractedMetadata, HtmlMetadataExtractor, MetadataExtractor};
pub use logging::{init_logging, Logger};
pub use pipeline::{ArticlePipeline, ExtractionTicket};
pub use processor::{ArticleProcessor, RetrySummary};
pub use ratings::RatingService;
pub use retry::{RetryJob, RetryWorker};
pub use service::{ArticlePage, ArticleService};

pub mod prelude {
    pub use super::{
        ArticlePipeline, ArticleProcessor, ArticleService, HtmlMetadataExtractor, MetadataExtractor, RatingService,
        RetryWorker,
    };
}
