//! Sequence-predictor invocation.
//!
//! The predictor is an opaque external sequence labeler: given a feature file
//! it writes one label line per input line, in the same order. The production
//! implementation shells out to an OpenNMT-style translate runner; tests use
//! [`StubPredictor`].

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::PipelineError;

/// Target device for predictor execution. Chooses CPU versus accelerator
/// only — it must not alter output semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Accelerator(u32),
}

impl Device {
    fn gpu_flag(self) -> String {
        match self {
            Device::Cpu => "-1".to_string(),
            Device::Accelerator(id) => id.to_string(),
        }
    }
}

/// Outcome of one predictor invocation. A non-zero exit is reported here
/// rather than raised; only launch-level failures become errors.
#[derive(Debug, Clone)]
pub struct PredictorStatus {
    pub exit_code: Option<i32>,
    pub stderr_excerpt: String,
}

impl PredictorStatus {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait SequencePredictor {
    /// Label every line of `input` into `output`: one label line per input
    /// line, same order. Blocks until the predictor exits.
    fn predict(
        &self,
        model: &Path,
        input: &Path,
        output: &Path,
        device: Device,
    ) -> Result<PredictorStatus, PipelineError>;
}

/// Maximum stderr bytes kept for diagnostics.
const STDERR_EXCERPT_BYTES: usize = 500;

/// How often a time-limited wait polls the child process.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Subprocess predictor invoking an OpenNMT-style translate runner:
/// `<runner> -m <module> -model … -src … -output … -min_length 1 -gpu <id|-1>`.
pub struct OnmtPredictor {
    runner: PathBuf,
    translate_module: String,
    timeout: Option<Duration>,
}

impl OnmtPredictor {
    /// `runner` is the Python interpreter (or equivalent) that exposes the
    /// translate module.
    pub fn new(runner: impl Into<PathBuf>) -> Self {
        Self {
            runner: runner.into(),
            translate_module: "onmt.bin.translate".to_string(),
            timeout: None,
        }
    }

    /// Bound the wait for the subprocess; on expiry the child is killed and a
    /// hard error is returned. Without a timeout the call can block
    /// indefinitely on a stuck predictor.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_module(mut self, module: &str) -> Self {
        self.translate_module = module.to_string();
        self
    }

    fn wait_with_timeout(
        &self,
        child: &mut std::process::Child,
    ) -> Result<std::process::ExitStatus, PipelineError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PipelineError::PredictorTimeout {
                    secs: timeout.as_secs(),
                });
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

impl SequencePredictor for OnmtPredictor {
    fn predict(
        &self,
        model: &Path,
        input: &Path,
        output: &Path,
        device: Device,
    ) -> Result<PredictorStatus, PipelineError> {
        if !model.is_file() {
            return Err(PipelineError::ModelArtifactMissing(model.to_path_buf()));
        }

        let mut command = Command::new(&self.runner);
        command
            .arg("-m")
            .arg(&self.translate_module)
            .arg("-model")
            .arg(model)
            .arg("-src")
            .arg(input)
            .arg("-output")
            .arg(output)
            .arg("-min_length")
            .arg("1")
            .arg("-gpu")
            .arg(device.gpu_flag())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| PipelineError::PredictorLaunch {
            runner: self.runner.clone(),
            source,
        })?;

        // Drain stderr on a separate thread so a chatty child cannot block
        // on a full pipe while we wait for it.
        let mut stderr = child.stderr.take();
        let drain = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(ref mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let status = self.wait_with_timeout(&mut child)?;
        let stderr_text = drain.join().unwrap_or_default();
        let excerpt = truncate_excerpt(&stderr_text);

        if !status.success() {
            tracing::warn!(
                code = status.code(),
                stderr = %excerpt,
                model = %model.display(),
                "predictor exited with non-zero status"
            );
        }

        Ok(PredictorStatus {
            exit_code: status.code(),
            stderr_excerpt: excerpt,
        })
    }
}

fn truncate_excerpt(text: &str) -> String {
    if text.len() <= STDERR_EXCERPT_BYTES {
        return text.trim_end().to_string();
    }
    let mut end = STDERR_EXCERPT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

enum StubLabels {
    /// Written verbatim, regardless of input length, so alignment failures
    /// are testable.
    Fixed(Vec<String>),
    /// One copy per input line.
    Constant(String),
}

/// Stub predictor for tests.
pub struct StubPredictor {
    labels: StubLabels,
    exit_code: i32,
}

impl StubPredictor {
    pub fn new(labels: &[&str]) -> Self {
        Self {
            labels: StubLabels::Fixed(labels.iter().map(|l| l.to_string()).collect()),
            exit_code: 0,
        }
    }

    /// One fixed label per input line, however many lines there are.
    pub fn constant(label: &str) -> Self {
        Self {
            labels: StubLabels::Constant(label.to_string()),
            exit_code: 0,
        }
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }
}

impl SequencePredictor for StubPredictor {
    fn predict(
        &self,
        _model: &Path,
        input: &Path,
        output: &Path,
        _device: Device,
    ) -> Result<PredictorStatus, PipelineError> {
        let line_count = fs::read_to_string(input)?.lines().count();
        let body = match &self.labels {
            StubLabels::Constant(label) => {
                (0..line_count).map(|_| label.as_str()).collect::<Vec<_>>().join("\n")
            }
            StubLabels::Fixed(labels) => {
                labels.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
            }
        };
        let content = if body.is_empty() { body } else { body + "\n" };
        fs::write(output, content)?;
        Ok(PredictorStatus {
            exit_code: Some(self.exit_code),
            stderr_excerpt: String::new(),
        })
    }
}
