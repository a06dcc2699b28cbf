//! Per-run working directory and intermediate-artifact paths.
//!
//! File mode keeps its six stage files in a `steps` subdirectory beside the
//! source corpus so runs are auditable; ephemeral mode keeps them in a
//! uniquely named temporary directory that is removed when the run ends.
//! Release is best-effort: a failure to remove temporary storage is logged
//! and never propagates past the run boundary.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use super::PipelineError;

/// The per-stage intermediate files of one run.
#[derive(Debug, Clone)]
pub struct StagePaths {
    pub word_forms: PathBuf,
    pub tagger_input: PathBuf,
    pub tagger_output: PathBuf,
    pub lemmatizer_input: PathBuf,
    pub lemmatizer_output: PathBuf,
    pub final_output: PathBuf,
    pub backup: PathBuf,
}

impl StagePaths {
    fn at(dir: &Path, stem: &str, backup: PathBuf) -> Self {
        Self {
            word_forms: dir.join(format!("{stem}.forms")),
            tagger_input: dir.join(format!("{stem}.tag_src")),
            tagger_output: dir.join(format!("{stem}.tag_pred")),
            lemmatizer_input: dir.join(format!("{stem}.lem_src")),
            lemmatizer_output: dir.join(format!("{stem}.lem_pred")),
            final_output: dir.join(format!("{stem}.final")),
            backup,
        }
    }
}

/// Working-directory abstraction shared by both execution modes.
pub struct RunWorkspace {
    run_id: Uuid,
    /// Directory scanned for pending correction files.
    root: PathBuf,
    stages: StagePaths,
    temp: Option<TempDir>,
}

impl RunWorkspace {
    /// Durable workspace beside `source`: intermediates in `<dir>/steps/`,
    /// backup as `backup_<stem>.conllu` next to the source.
    pub fn for_file(source: &Path) -> Result<Self, PipelineError> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PipelineError::InvalidSourcePath(source.to_path_buf()))?
            .to_string();
        let dir = match source.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let steps = dir.join("steps");
        fs::create_dir_all(&steps)?;
        let backup = dir.join(format!("backup_{stem}.conllu"));
        Ok(Self {
            run_id: Uuid::new_v4(),
            root: dir,
            stages: StagePaths::at(&steps, &stem, backup),
            temp: None,
        })
    }

    /// Ephemeral workspace in a uniquely named temporary directory.
    pub fn ephemeral() -> Result<Self, PipelineError> {
        let temp = tempfile::Builder::new().prefix("cuneilemma-").tempdir()?;
        let backup = temp.path().join("backup_run.conllu");
        let stages = StagePaths::at(temp.path(), "run", backup);
        Ok(Self {
            run_id: Uuid::new_v4(),
            root: temp.path().to_path_buf(),
            stages,
            temp: Some(temp),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The directory scanned for pending `.tsv` correction files. Callers
    /// drop corrections here between runs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stages(&self) -> &StagePaths {
        &self.stages
    }

    pub fn is_ephemeral(&self) -> bool {
        self.temp.is_some()
    }

    /// Remove ephemeral storage. Never fails: a release problem is logged at
    /// `warn` and swallowed. No-op in file mode and on repeated calls.
    pub fn release(&mut self) {
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            if let Err(error) = temp.close() {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "failed to remove temporary working directory"
                );
            } else {
                tracing::debug!(path = %path.display(), "temporary working directory removed");
            }
        }
    }
}
