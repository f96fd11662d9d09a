//! Detector backed by an external process
//!
//! Protocol, one process per image:
//! - argv: `<model_path> <width> <height>` after any configured arguments
//! - stdin: `width * height * 3` bytes of packed RGB8
//! - stdout: JSON array of `{"label": ..., "confidence": ...}`
//!
//! Any runtime that can load the weights (ultralytics, onnxruntime, ...) can
//! sit behind this without linking it into the service.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;

use image::RgbImage;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::infer::{Classifier, ClassifierError, Detection};

#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    model_path: PathBuf,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            model_path: model_path.into(),
        }
    }

    /// Split a command line like `python3 detect.py` into program and arguments
    pub fn from_command_line(command: &str, model_path: impl Into<PathBuf>) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self::new(program, model_path).with_args(parts)
    }

    /// Arguments placed before the model path
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait::async_trait]
impl Classifier for CommandClassifier {
    async fn predict(&self, image: &RgbImage) -> Result<Vec<Detection>, ClassifierError> {
        let (width, height) = image.dimensions();
        debug!(program = %self.program, width, height, "Running detector");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.model_path)
            .arg(width.to_string())
            .arg(height.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let pixels = image.as_raw();
        // Feed stdin while draining stdout so neither pipe can fill up
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(pixels).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            return Err(ClassifierError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        match fed {
            // The detector may legitimately stop reading early
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                warn!("Detector closed stdin before reading the whole image");
            }
            other => other?,
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}
