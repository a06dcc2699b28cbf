//! The lemmatization pipeline: preprocessing, predictor invocation, merge,
//! postprocessing and run orchestration.

pub mod features;
pub mod merge;
pub mod orchestrator;
pub mod postprocess;
pub mod predictor;
pub mod workspace;

use std::path::PathBuf;

use thiserror::Error;

use crate::corpus::CorpusError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Failed to launch predictor '{runner}': {source}")]
    PredictorLaunch {
        runner: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Predictor timed out after {secs}s")]
    PredictorTimeout { secs: u64 },

    #[error("Model artifact not found: {0}")]
    ModelArtifactMissing(PathBuf),

    #[error("Prediction/corpus alignment mismatch in {path}: expected {expected} labels, found {actual}")]
    AlignmentMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Empty prediction at {path}:{line}")]
    EmptyPrediction { path: PathBuf, line: usize },

    #[error("Source path has no usable file stem: {0}")]
    InvalidSourcePath(PathBuf),
}
