//! cuneilemma — neural lemmatization pipeline for transliterated
//! ancient-language corpora.
//!
//! Drives two external sequence-labeling predictions (POS tagging, then
//! lemmatization) across a shared CoNLL-U+ corpus, merges each prediction
//! back positionally, and preserves human corrections across reruns through
//! a per-model override corpus and per-token locks.
//!
//! ```no_run
//! use cuneilemma::corpus::store::Corpus;
//! use cuneilemma::pipeline::orchestrator::LemmatizerPipeline;
//! use cuneilemma::pipeline::predictor::{Device, OnmtPredictor};
//!
//! # fn main() -> Result<(), cuneilemma::pipeline::PipelineError> {
//! let corpus = Corpus::from_text_lines(&["šum-ma a-wi-lum"]);
//! let predictor = Box::new(OnmtPredictor::new("python3"));
//! let mut pipeline = LemmatizerPipeline::from_corpus(corpus, None, predictor)?;
//! let lemmatized = pipeline.run_model("assyrian", Device::Cpu)?;
//! # let _ = lemmatized;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod corpus;
pub mod model_config;
pub mod pipeline;

pub use corpus::store::Corpus;
pub use corpus::token::{Field, Token, PLACEHOLDER};
pub use corpus::CorpusError;
pub use model_config::ModelConfig;
pub use pipeline::orchestrator::{CorpusSource, LemmatizerPipeline, PipelineOptions, RunSummary};
pub use pipeline::predictor::{Device, OnmtPredictor, SequencePredictor};
pub use pipeline::PipelineError;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binary callers. Safe to call more than once; the
/// first subscriber wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
