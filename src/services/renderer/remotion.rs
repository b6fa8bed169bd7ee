//! Engine basato sulla CLI di Remotion
//!
//! Il progetto Remotion resta in Node: la CLI viene invocata come processo
//! esterno, il progress viene letto dalle righe di stdout e la cancellazione
//! termina il processo figlio.

use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use super::{Composition, RenderEngine, RenderEngineError, RenderMediaOptions, RenderOutput};

pub struct RemotionCliEngine {
    command: String,
}

impl RemotionCliEngine {
    pub fn new() -> Self {
        Self {
            command: "npx".to_string(),
        }
    }

    /// Usa un eseguibile diverso da `npx` per lanciare la CLI
    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn available(&self) -> bool {
        std::process::Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn parse_progress(line: &str) -> Option<f64> {
        let re = regex_lite::Regex::new(r"(\d{1,3})%").ok()?;
        let captures = re.captures(line)?;
        let percent: f64 = captures.get(1)?.as_str().parse().ok()?;
        Some((percent / 100.0).clamp(0.0, 1.0))
    }

    fn parse_dimensions(token: &str) -> Option<(u32, u32)> {
        let (width, height) = token.split_once('x')?;
        Some((width.parse().ok()?, height.parse().ok()?))
    }
}

impl Default for RemotionCliEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RenderEngine for RemotionCliEngine {
    async fn select_composition(
        &self,
        serve_url: &str,
        composition_id: &str,
        input_props: &serde_json::Value,
    ) -> std::result::Result<Composition, RenderEngineError> {
        let output = Command::new(&self.command)
            .arg("remotion")
            .arg("compositions")
            .arg(serve_url)
            .arg(format!("--props={}", input_props))
            .arg("--quiet")
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(RenderEngineError::Engine(format!(
                "elenco composizioni fallito: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let mut tokens = line.split_whitespace();
            let Some(id) = tokens.next() else { continue };
            if id != composition_id {
                continue;
            }

            let dimensions = tokens.next().and_then(Self::parse_dimensions);
            return Ok(Composition {
                id: id.to_string(),
                input_props: input_props.clone(),
                width: dimensions.map(|(w, _)| w),
                height: dimensions.map(|(_, h)| h),
            });
        }

        Err(RenderEngineError::CompositionNotFound(
            composition_id.to_string(),
        ))
    }

    async fn render_media(
        &self,
        mut options: RenderMediaOptions,
    ) -> std::result::Result<RenderOutput, RenderEngineError> {
        let scratch = tempfile::tempdir()?;
        let output_path = scratch.path().join("out.mp4");
        let props = options.composition.input_props.to_string();

        let mut child = Command::new(&self.command)
            .arg("remotion")
            .arg("render")
            .arg(&options.serve_url)
            .arg(&options.composition.id)
            .arg(&output_path)
            .arg("--codec")
            .arg(&options.codec)
            .arg(format!("--props={}", props))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            RenderEngineError::Engine("stdout della CLI non disponibile".to_string())
        })?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                _ = options.cancel_signal.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(RenderEngineError::Cancelled);
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(progress) = Self::parse_progress(&line) {
                            let _ = options.progress.send(progress);
                        }
                    }
                    Ok(None) | Err(_) => break,
                },
            }
        }

        let status = tokio::select! {
            _ = options.cancel_signal.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(RenderEngineError::Cancelled);
            }
            status = child.wait() => status?,
        };

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            return Err(RenderEngineError::Engine(format!(
                "rendering fallito ({}): {}",
                status,
                stderr.trim()
            )));
        }

        let buffer = tokio::fs::read(&output_path)
            .await
            .map(Bytes::from)
            .unwrap_or_default();

        Ok(RenderOutput { buffer })
    }
}
