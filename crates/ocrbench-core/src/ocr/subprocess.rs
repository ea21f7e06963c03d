//! Model-server engines driven as long-lived helper processes.
//!
//! DocTR, GOT-OCR2 and SmolVLM run in their own Python runtimes. Each is
//! wrapped by a helper that loads the model once, prints `{"ready": true}`,
//! then answers one JSON request per stdin line:
//!
//! ```text
//! -> {"path": "/data/doc.png", "device": "cpu"}
//! <- {"lines": [{"text": "...", "confidence": 0.93, "words": [...]}]}
//! <- {"error": "CUDA out of memory"}
//! ```
//!
//! Lines on stdout that are not JSON objects are ignored, as are objects
//! carrying neither `lines` nor `error`, so helpers may keep their
//! libraries' chatter and progress output.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{Device, ExtractionResult, Extractor, TextLine, WordBox};
use crate::document::{self, DocumentKind};
use crate::error::EngineError;
use crate::models::config::{ConfidenceScale, SubprocessEngineConfig};

struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

#[derive(Serialize)]
struct Request<'a> {
    path: &'a Path,
    device: Device,
}

#[derive(Deserialize, Default)]
struct Reply {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    lines: Option<Vec<ReplyLine>>,
    #[serde(default)]
    error: Option<String>,
}

impl Reply {
    /// Only `lines` or `error` objects answer a request; anything else is
    /// progress or log output.
    fn is_answer(&self) -> bool {
        self.lines.is_some() || self.error.is_some()
    }
}

#[derive(Deserialize)]
struct ReplyLine {
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    bbox: Option<[f32; 4]>,
    #[serde(default)]
    words: Vec<ReplyWord>,
}

#[derive(Deserialize)]
struct ReplyWord {
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    bbox: Option<[f32; 4]>,
}

/// Adapter for an engine served by a helper process.
pub struct SubprocessExtractor {
    name: String,
    config: SubprocessEngineConfig,
    inference_timeout: Option<Duration>,
    render_dpi: u32,
    worker: Option<Worker>,
}

impl SubprocessExtractor {
    pub fn new(
        name: impl Into<String>,
        config: SubprocessEngineConfig,
        inference_timeout: Option<Duration>,
        render_dpi: u32,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            inference_timeout,
            render_dpi,
            worker: None,
        }
    }

    async fn spawn(&self) -> Result<Worker, EngineError> {
        let command = self
            .config
            .command
            .as_ref()
            .ok_or_else(|| EngineError::Unavailable(format!("no command configured for {}", self.name)))?;

        let mut cmd = Command::new(command);
        cmd.args(&self.config.args);
        cmd.envs(&self.config.env);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("failed to start {}: {}", command.display(), e)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(EngineError::Unavailable(format!("{} helper has no stdio pipes", self.name)));
        };

        let mut worker = Worker {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let start = Instant::now();
        let startup = Duration::from_secs(self.config.startup_timeout_secs);
        let ready = with_timeout(Some(startup), async {
            loop {
                match read_reply(&mut worker.stdout).await? {
                    Some(reply) if reply.ready => return Ok(()),
                    Some(_) => continue,
                    None => return Err(format!("{} helper exited before becoming ready", self.name)),
                }
            }
        })
        .await;

        match ready {
            Ok(Ok(())) => {
                info!("{} helper ready in {:.2}s", self.name, start.elapsed().as_secs_f64());
                Ok(worker)
            }
            Ok(Err(reason)) => Err(EngineError::Unavailable(reason)),
            Err(limit) => {
                let _ = worker.child.start_kill();
                Err(EngineError::Unavailable(format!(
                    "{} helper did not become ready within {:?}",
                    self.name, limit
                )))
            }
        }
    }

    async fn request(&mut self, path: &Path, device: Device) -> Result<(Vec<ReplyLine>, f64), EngineError> {
        if self.worker.is_none() {
            self.worker = Some(self.spawn().await?);
        }
        let Some(worker) = self.worker.as_mut() else {
            return Err(EngineError::Unavailable(format!("{} helper not running", self.name)));
        };

        let mut payload = serde_json::to_string(&Request { path, device })
            .map_err(|e| EngineError::ExtractionFailed(e.to_string()))?;
        payload.push('\n');

        let start = Instant::now();
        let exchange = with_timeout(self.inference_timeout, async {
            worker
                .stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| format!("failed to send request: {}", e))?;
            worker
                .stdin
                .flush()
                .await
                .map_err(|e| format!("failed to send request: {}", e))?;

            loop {
                match read_reply(&mut worker.stdout).await? {
                    Some(reply) if reply.is_answer() => return Ok(Some(reply)),
                    Some(_) => debug!("Skipping helper status line"),
                    None => return Ok(None),
                }
            }
        })
        .await;
        let elapsed = start.elapsed().as_secs_f64();

        match exchange {
            Ok(Ok(Some(reply))) => match (reply.error, reply.lines) {
                (Some(error), _) => Err(EngineError::ExtractionFailed(error)),
                (None, lines) => Ok((lines.unwrap_or_default(), elapsed)),
            },
            Ok(Ok(None)) => {
                self.discard_worker();
                Err(EngineError::ExtractionFailed(format!("{} helper exited mid-request", self.name)))
            }
            Ok(Err(reason)) => {
                self.discard_worker();
                Err(EngineError::ExtractionFailed(reason))
            }
            Err(limit) => {
                warn!("{} exceeded {:?}, restarting helper on next call", self.name, limit);
                self.discard_worker();
                Err(EngineError::Timeout(limit))
            }
        }
    }

    fn discard_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            let _ = worker.child.start_kill();
        }
    }
}

#[async_trait(?Send)]
impl Extractor for SubprocessExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_loaded(&self) -> bool {
        self.worker.is_some()
    }

    async fn extract(&mut self, document: &Path, device: Device) -> Result<ExtractionResult, EngineError> {
        if !document.is_file() {
            return Err(EngineError::DocumentUnreadable(format!("{}: not a file", document.display())));
        }

        // Helpers only take images, so PDFs are rasterized here first.
        let is_pdf = document
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

        let rasterized = if is_pdf {
            Some(rasterize_to_temp(document, self.render_dpi)?)
        } else {
            None
        };
        let path = rasterized.as_ref().map(|t| t.path()).unwrap_or(document);

        debug!("Sending {} to {} on {}", path.display(), self.name, device.as_str());
        let (lines, processing_time) = self.request(path, device).await?;

        Ok(ExtractionResult::new(
            self.name.clone(),
            normalize_lines(lines, self.config.confidence_scale),
            processing_time,
            device,
        ))
    }
}

/// Read stdout until a JSON object arrives, skipping other lines.
///
/// `Ok(None)` means the helper closed its stdout.
async fn read_reply(stdout: &mut Lines<BufReader<ChildStdout>>) -> Result<Option<Reply>, String> {
    loop {
        let line = stdout
            .next_line()
            .await
            .map_err(|e| format!("failed to read helper output: {}", e))?;
        let Some(line) = line else {
            return Ok(None);
        };

        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            continue;
        }
        match serde_json::from_str::<Reply>(trimmed) {
            Ok(reply) => return Ok(Some(reply)),
            Err(e) => debug!("Ignoring malformed helper line: {}", e),
        }
    }
}

async fn with_timeout<T>(limit: Option<Duration>, fut: impl Future<Output = T>) -> Result<T, Duration> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
        None => Ok(fut.await),
    }
}

fn rasterize_to_temp(document: &Path, render_dpi: u32) -> Result<tempfile::NamedTempFile, EngineError> {
    let bytes = std::fs::read(document)
        .map_err(|e| EngineError::DocumentUnreadable(format!("{}: {}", document.display(), e)))?;
    if DocumentKind::sniff(&bytes) != DocumentKind::Pdf {
        return Err(EngineError::DocumentUnreadable(format!(
            "{}: .pdf extension but not a PDF",
            document.display()
        )));
    }

    let image = document::decode_document(&bytes, render_dpi)?;
    let temp = tempfile::Builder::new()
        .prefix("ocrbench-page-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| EngineError::DocumentUnreadable(format!("failed to create temp file: {}", e)))?;
    image.save_with_format(temp.path(), image::ImageFormat::Png)?;
    Ok(temp)
}

fn normalize_lines(lines: Vec<ReplyLine>, scale: ConfidenceScale) -> Vec<TextLine> {
    lines
        .into_iter()
        .map(|line| {
            let words: Vec<WordBox> = line
                .words
                .into_iter()
                .map(|w| WordBox {
                    text: w.text,
                    confidence: w.confidence.map(|c| scale.normalize(c)),
                    bbox: w.bbox,
                })
                .collect();

            let word_confidences: Vec<f64> = words.iter().filter_map(|w| w.confidence).collect();
            let confidence = if word_confidences.is_empty() {
                line.confidence.map(|c| scale.normalize(c))
            } else {
                Some(word_confidences.iter().sum::<f64>() / word_confidences.len() as f64)
            };

            TextLine {
                text: line.text,
                confidence,
                bbox: line.bbox,
                words,
            }
        })
        .collect()
}
