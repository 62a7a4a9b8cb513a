use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::tablify::Tablifier;

use super::{DataTransformer, TransformError};

/// CSV rendering options. `delimiter` defaults to `,` when empty; only its
/// first character is used, matching the single-rune delimiter of the
/// implementation this mirrors.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CSVTransformerConfig {
    #[serde(default)]
    pub use_header: bool,
    #[serde(default)]
    pub delimiter: String,
    #[serde(default)]
    pub use_crlf: bool,
}

impl Default for CSVTransformerConfig {
    fn default() -> Self {
        Self {
            use_header: false,
            delimiter: String::new(),
            use_crlf: false,
        }
    }
}

/// Renders each incoming page's table as CSV rows, writing a single header
/// row before the first page's data when `use_header` is set.
pub struct CSVTransformer {
    tablifier: Arc<dyn Tablifier>,
    config: CSVTransformerConfig,
}

impl CSVTransformer {
    pub fn new(tablifier: Arc<dyn Tablifier>, config: CSVTransformerConfig) -> Self {
        Self { tablifier, config }
    }

    fn build_writer(&self, buf: &mut Vec<u8>) -> ::csv::Writer<&mut Vec<u8>> {
        let delimiter = self
            .config
            .delimiter
            .bytes()
            .next()
            .unwrap_or(b',');
        ::csv::WriterBuilder::new()
            .delimiter(delimiter)
            .terminator(if self.config.use_crlf {
                ::csv::Terminator::CRLF
            } else {
                ::csv::Terminator::Any(b'\n')
            })
            .from_writer(buf)
    }
}

#[async_trait]
impl DataTransformer for CSVTransformer {
    async fn transform(
        &self,
        mut pages: mpsc::Receiver<Bytes>,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), TransformError> {
        let mut header_written = false;
        while let Some(page) = pages.recv().await {
            let table = self.tablifier.table(&page)?;

            let mut buf = Vec::new();
            {
                let mut csv_writer = self.build_writer(&mut buf);
                if self.config.use_header && !header_written {
                    header_written = true;
                    csv_writer
                        .write_record(table.header())
                        .map_err(|e| TransformError::Renderer(e.to_string()))?;
                }
                for row in table.string_rows() {
                    csv_writer
                        .write_record(&row)
                        .map_err(|e| TransformError::Renderer(e.to_string()))?;
                }
                csv_writer
                    .flush()
                    .map_err(|e| TransformError::Renderer(e.to_string()))?;
            }
            writer.write_all(&buf).await?;
        }
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tablify::{JSONTablifier, JSONTablifierConfig, NoOpRemapper};

    #[tokio::test]
    async fn writes_header_once_then_rows_across_pages() {
        let tablifier = Arc::new(JSONTablifier::new(
            Arc::new(NoOpRemapper),
            JSONTablifierConfig::default(),
        ));
        let transformer = CSVTransformer::new(
            tablifier,
            CSVTransformerConfig {
                use_header: true,
                ..Default::default()
            },
        );

        let (tx, rx) = mpsc::channel(1);
        let mut output = Vec::new();
        let send_task = tokio::spawn(async move {
            tx.send(Bytes::from_static(br#"{"name": ["a"], "age": [1]}"#))
                .await
                .unwrap();
            tx.send(Bytes::from_static(br#"{"name": ["b"], "age": [2]}"#))
                .await
                .unwrap();
        });

        transformer.transform(rx, &mut output).await.unwrap();
        send_task.await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "age,name");
        assert_eq!(lines.len(), 3);
    }
}
