//! CoNLL-U+ corpus model: tokens, sentences, context windows, persistence.

pub mod context;
pub mod store;
pub mod token;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}:{line}: expected 10 to 17 tab-separated fields, found {found}")]
    MalformedRow {
        path: String,
        line: usize,
        found: usize,
    },

    #[error("{path}: sentence {sentence}: token ID out of sequence, expected {expected}, found '{found}'")]
    BrokenIdSequence {
        path: String,
        sentence: usize,
        expected: usize,
        found: String,
    },

    #[error("bulk assignment to {field}: corpus has {expected} tokens, got {actual} values")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{path}:{line}: correction row needs at least FORM and LEMMA columns")]
    MalformedCorrection { path: String, line: usize },
}
