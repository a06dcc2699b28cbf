//! Merging predictor output back into the corpus.
//!
//! Predictor output and corpus tokens are two sequences whose alignment is
//! never assumed: the label count must equal the token count and no label may
//! be empty before anything is assigned. A mismatch raises
//! [`PipelineError::AlignmentMismatch`] — positional pairing is only applied
//! once both checks pass.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::corpus::store::Corpus;
use crate::corpus::token::Field;
use crate::model_config::ModelConfig;
use crate::pipeline::features;
use crate::pipeline::PipelineError;

/// Merge the label file at `predictions` into `target`, in document token
/// order. With `context_field` set, the window over `target` is recomputed
/// (half-width per field from `config`) and stored. With both `context_field`
/// and `next_input` set, the next predictor stage's input file is emitted by
/// pairing FORM with the fresh context.
pub fn merge_predictions(
    predictions: &Path,
    corpus: &mut Corpus,
    target: Field,
    context_field: Option<Field>,
    next_input: Option<&Path>,
    config: &ModelConfig,
) -> Result<(), PipelineError> {
    let labels = read_labels(predictions)?;
    let expected = corpus.word_count();
    if labels.len() != expected {
        return Err(PipelineError::AlignmentMismatch {
            path: predictions.to_path_buf(),
            expected,
            actual: labels.len(),
        });
    }

    corpus.update_value(target, &labels)?;
    tracing::info!(
        field = target.name(),
        labels = labels.len(),
        "merged predictions"
    );

    let Some(context_field) = context_field else {
        return Ok(());
    };
    let width = config.context_width(target);
    let contexts = corpus.get_contexts(target, width);
    corpus.update_value(context_field, &contexts)?;

    if let Some(path) = next_input {
        let mut writer = BufWriter::new(File::create(path)?);
        for row in corpus.rows(&[Field::Form, context_field]) {
            writeln!(
                writer,
                "{}",
                features::lemmatizer_line(row[0], row[1], config.tokenizer)
            )?;
        }
        writer.flush()?;
    }
    Ok(())
}

/// Read label lines: whitespace trimmed, inner spaces removed (the runner
/// emits space-joined subword units). An empty line is a data-integrity
/// error — a predictor never legitimately yields an empty label.
fn read_labels(path: &Path) -> Result<Vec<String>, PipelineError> {
    let text = fs::read_to_string(path)?;
    let mut labels = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let label: String = line.split_whitespace().collect();
        if label.is_empty() {
            return Err(PipelineError::EmptyPrediction {
                path: path.to_path_buf(),
                line: idx + 1,
            });
        }
        labels.push(label);
    }
    Ok(labels)
}
