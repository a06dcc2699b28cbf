//! Run orchestration: drives preprocessing, the two predictor stages, the
//! merges and postprocessing across one shared corpus.
//!
//! Two construction modes share a single run surface and must yield
//! equivalent merge results: a durable file-backed mode that persists every
//! stage beside the source corpus, and an ephemeral in-memory mode that
//! leaves no files behind unless an output path was supplied.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::corpus::store::Corpus;
use crate::corpus::token::{Field, PLACEHOLDER};
use crate::model_config::ModelConfig;
use crate::pipeline::merge::merge_predictions;
use crate::pipeline::postprocess::{thresholds, Postprocessor};
use crate::pipeline::predictor::{Device, SequencePredictor};
use crate::pipeline::workspace::RunWorkspace;
use crate::pipeline::{features, PipelineError};

/// Where the corpus comes from and where results go.
pub enum CorpusSource {
    /// Durable mode: load from this path, persist every artifact beside it.
    File(PathBuf),
    /// Ephemeral mode: operate on the given corpus; write a single output
    /// file only if a path is supplied.
    Memory {
        corpus: Corpus,
        output: Option<PathBuf>,
    },
}

/// Orchestrator-level settings, passed at construction.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Root directory holding one subdirectory per trained model.
    pub models_root: PathBuf,
    /// Blank LEMMA on numeral tokens after postprocessing.
    pub ignore_numbers: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            models_root: crate::config::models_dir(),
            ignore_numbers: true,
        }
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub model: String,
    pub mode: &'static str,
    pub token_count: usize,
    pub segment_count: usize,
}

/// Drives the full tag → lemmatize → postprocess pipeline over one corpus.
pub struct LemmatizerPipeline {
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    corpus: Corpus,
    workspace: RunWorkspace,
    predictor: Box<dyn SequencePredictor>,
    options: PipelineOptions,
    token_count: usize,
    segment_count: usize,
    last_model: Option<String>,
}

impl LemmatizerPipeline {
    pub fn new(
        source: CorpusSource,
        predictor: Box<dyn SequencePredictor>,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let (source, output, corpus, workspace) = match source {
            CorpusSource::File(path) => {
                let workspace = RunWorkspace::for_file(&path)?;
                let corpus = Corpus::from_file(&path, false)?;
                (Some(path), None, corpus, workspace)
            }
            CorpusSource::Memory { corpus, output } => {
                (None, output, corpus, RunWorkspace::ephemeral()?)
            }
        };
        Ok(Self {
            source,
            output,
            corpus,
            workspace,
            predictor,
            options,
            token_count: 0,
            segment_count: 0,
            last_model: None,
        })
    }

    pub fn from_file(
        path: impl Into<PathBuf>,
        predictor: Box<dyn SequencePredictor>,
    ) -> Result<Self, PipelineError> {
        Self::new(
            CorpusSource::File(path.into()),
            predictor,
            PipelineOptions::default(),
        )
    }

    pub fn from_corpus(
        corpus: Corpus,
        output: Option<PathBuf>,
        predictor: Box<dyn SequencePredictor>,
    ) -> Result<Self, PipelineError> {
        Self::new(
            CorpusSource::Memory { corpus, output },
            predictor,
            PipelineOptions::default(),
        )
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn into_corpus(self) -> Corpus {
        self.corpus
    }

    /// The directory scanned for pending `.tsv` correction files.
    pub fn working_dir(&self) -> &Path {
        self.workspace.root()
    }

    /// Summary of the most recent completed run.
    pub fn summary(&self) -> Option<RunSummary> {
        self.last_model.as_ref().map(|model| RunSummary {
            run_id: self.workspace.run_id(),
            model: model.clone(),
            mode: if self.source.is_some() { "file" } else { "memory" },
            token_count: self.token_count,
            segment_count: self.segment_count,
        })
    }

    /// Normalize the corpus, compute the FORM context window and emit the two
    /// token-aligned streams the tagger stage needs: one feature line and one
    /// segmented-form line per token. Counts tokens and segments (ID == 1
    /// marks a segment start).
    pub fn preprocess_source(&mut self, config: &ModelConfig) -> Result<(), PipelineError> {
        self.corpus.normalize();
        let contexts = self.corpus.get_contexts(Field::Form, config.tagger_context);
        self.corpus.update_value(Field::FormCtx, &contexts)?;

        let stages = self.workspace.stages();
        let mut tagger_input = BufWriter::new(File::create(&stages.tagger_input)?);
        let mut word_forms = BufWriter::new(File::create(&stages.word_forms)?);

        let mut token_count = 0usize;
        let mut segment_count = 0usize;
        for row in self.corpus.rows(&[Field::Id, Field::Form, Field::FormCtx]) {
            writeln!(tagger_input, "{}", features::tagger_line(row[2], config.tokenizer))?;
            writeln!(word_forms, "{}", features::segment_form(row[1], config.tokenizer))?;
            token_count += 1;
            if row[0] == "1" {
                segment_count += 1;
            }
        }
        tagger_input.flush()?;
        word_forms.flush()?;

        self.token_count = token_count;
        self.segment_count = segment_count;
        tracing::info!(
            tokens = token_count,
            segments = segment_count,
            "generated predictor input"
        );
        Ok(())
    }

    /// Fold pending correction files from the working directory into the
    /// model's override corpus, one at a time in lexicographic filename
    /// order. Each file is deleted only after the fold has been durably
    /// written, so a crash between the two never loses a correction.
    /// Returns the number of files folded.
    pub fn update_model(&mut self, model_name: &str) -> Result<usize, PipelineError> {
        let mut pending: Vec<PathBuf> = fs::read_dir(self.workspace.root())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_correction_file(path))
            .collect();
        pending.sort();
        if pending.is_empty() {
            return Ok(0);
        }

        let override_path = self
            .options
            .models_root
            .join(model_name)
            .join("override")
            .join("override.conllu");
        let mut override_corpus = if override_path.is_file() {
            Corpus::from_file(&override_path, false)?
        } else {
            Corpus::new()
        };

        let mut folded = 0usize;
        for file in pending {
            override_corpus.read_corrections(&file)?;
            override_corpus.normalize();
            override_corpus.write_file(&override_path, false)?;
            fs::remove_file(&file)?;
            folded += 1;
            tracing::info!(file = %file.display(), model = model_name, "correction file folded");
        }
        Ok(folded)
    }

    /// Run the full pipeline with the named model. Returns the mutated
    /// corpus so callers can chain further processing without re-reading
    /// from disk.
    pub fn run_model(
        &mut self,
        model_name: &str,
        device: Device,
    ) -> Result<&Corpus, PipelineError> {
        // A fresh workspace when a previous ephemeral run already released
        // the last one.
        if self.source.is_none() && !self.workspace.is_ephemeral() {
            self.workspace = RunWorkspace::ephemeral()?;
        }

        let span = tracing::info_span!(
            "run_model",
            model = model_name,
            run = %self.workspace.run_id()
        )
        .entered();

        let model_dir = self.options.models_root.join(model_name);

        // 1. Per-model configuration, defaults with a warning if absent.
        let config = ModelConfig::load(&model_dir);

        // 2. Pending overrides.
        self.update_model(model_name)?;

        // 3. File mode: reload fresh from the source; snapshot a previous
        //    postprocessed artifact as the backup.
        if let Some(source) = self.source.clone() {
            self.corpus = Corpus::from_file(&source, false)?;
            let postprocessed = sibling_with_suffix(&source, "_pp");
            if postprocessed.is_file() {
                fs::copy(&postprocessed, &self.workspace.stages().backup)?;
            }
        }

        // 4. Preprocess: normalize, FORM contexts, tagger input.
        self.preprocess_source(&config)?;

        let stages = self.workspace.stages().clone();

        // 5. Tag.
        tracing::info!(model = model_name, "tagging");
        self.predictor.predict(
            &model_dir.join("tagger").join("model.pt"),
            &stages.tagger_input,
            &stages.tagger_output,
            device,
        )?;

        // 6. Merge tags into XPOS, recompute the XPOS context, emit the
        //    lemmatizer input.
        merge_predictions(
            &stages.tagger_output,
            &mut self.corpus,
            Field::Xpos,
            Some(Field::XposCtx),
            Some(&stages.lemmatizer_input),
            &config,
        )?;

        // 7. Lemmatize.
        tracing::info!(model = model_name, "lemmatizing");
        self.predictor.predict(
            &model_dir.join("lemmatizer").join("model.pt"),
            &stages.lemmatizer_input,
            &stages.lemmatizer_output,
            device,
        )?;

        // 8. Merge lemmata — no context recompute, no cascade.
        merge_predictions(
            &stages.lemmatizer_output,
            &mut self.corpus,
            Field::Lemma,
            None,
            None,
            &config,
        )?;

        // 9. File mode: auditable merged-but-not-postprocessed snapshot.
        if let Some(source) = &self.source {
            self.corpus
                .write_file(&sibling_with_suffix(source, "_nn"), false)?;
        }

        // 10. Postprocess.
        let mut post = Postprocessor::new(&mut self.corpus, &model_dir)?;
        post.initialize_scores();
        post.fill_unambiguous(thresholds::ACCEPT);
        post.disambiguate_by_pos_context(thresholds::ACCEPT);
        post.apply_override();

        // 11. Numeral lemmas.
        if self.options.ignore_numbers {
            self.corpus.unlemmatize(true);
        }

        // 12. Context fields are transient and never persisted.
        self.corpus.force_value(Field::FormCtx, PLACEHOLDER);
        self.corpus.force_value(Field::XposCtx, PLACEHOLDER);

        // 13. Persist.
        if let Some(source) = &self.source {
            self.corpus
                .write_file(&sibling_with_suffix(source, "_pp"), true)?;
            self.corpus
                .make_lemmalists(&lemmalist_path(source))?;
        } else if let Some(output) = &self.output {
            self.corpus.write_file(output, true)?;
            tracing::info!(path = %output.display(), "output saved");
        }

        // 14. Ephemeral storage goes away; release never fails the run.
        if self.source.is_none() {
            self.workspace.release();
        }

        self.last_model = Some(model_name.to_string());
        drop(span);
        Ok(&self.corpus)
    }
}

/// Pending correction files are `.tsv`, excluding the lemma-frequency list
/// the pipeline itself regenerates beside the source.
fn is_correction_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "tsv")
        && !path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("_lemmalist.tsv"))
}

/// `dir/name.conllu` → `dir/name<suffix>.conllu`.
fn sibling_with_suffix(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("conllu");
    source.with_file_name(format!("{stem}{suffix}.{extension}"))
}

fn lemmalist_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}_lemmalist.tsv"))
}
