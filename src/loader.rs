//! Document loading: read a local file or URL and split it into chunks.
//!
//! The document type is decided by the lowercase extension of the
//! location. `.txt` is read as UTF-8 and `.pdf` goes through
//! `pdf-extract`. Any other extension is not an error: loading yields
//! `Ok(None)` and callers skip the document.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::chunk::{TextSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, PDF_SEPARATORS, TEXT_SEPARATORS};
use crate::error::RagError;
use crate::models::Chunk;

/// Where to find a document and how to chunk it.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Filesystem path or `http(s)://` URL.
    pub location: String,
    /// Defaults to 400 characters.
    pub chunk_size: Option<usize>,
    /// Defaults to 50 characters.
    pub chunk_overlap: Option<usize>,
}

impl DocumentSource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            chunk_size: None,
            chunk_overlap: None,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self.chunk_overlap = Some(chunk_overlap);
        self
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    /// Detect the kind from a path or URL. Query strings and fragments are ignored.
    pub fn detect(location: &str) -> Option<Self> {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or(location);
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        match ext.as_str() {
            "txt" => Some(DocumentKind::Text),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }

    fn separators(&self) -> &'static [&'static str] {
        match self {
            DocumentKind::Text => TEXT_SEPARATORS,
            DocumentKind::Pdf => PDF_SEPARATORS,
        }
    }
}

/// Plain text pulled out of a document.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub kind: DocumentKind,
    pub text: String,
}

/// Read and extract the text of a document.
///
/// Returns `Ok(None)` for unsupported extensions.
///
/// # Errors
///
/// - [`RagError::MissingConfig`] if `location` is empty.
/// - Read, download, UTF-8, or PDF parse failures, with the location in
///   the error context.
pub async fn load_document(location: &str) -> Result<Option<LoadedDocument>> {
    if location.trim().is_empty() {
        return Err(RagError::MissingConfig("document location").into());
    }

    let kind = match DocumentKind::detect(location) {
        Some(kind) => kind,
        None => {
            debug!(location, "unsupported document type, skipping");
            return Ok(None);
        }
    };

    let bytes = read_bytes(location)
        .await
        .with_context(|| format!("Failed to read document: {}", location))?;

    let text = extract_text(&bytes, kind)
        .with_context(|| format!("Failed to extract text from: {}", location))?;

    Ok(Some(LoadedDocument { kind, text }))
}

/// Load a document and split it into chunks.
///
/// Returns `Ok(None)` for unsupported extensions.
pub async fn split_document(source: &DocumentSource) -> Result<Option<Vec<Chunk>>> {
    let splitter = TextSplitter::new(
        source.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
        source.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
    )?;

    let doc = match load_document(&source.location).await? {
        Some(doc) => doc,
        None => return Ok(None),
    };

    let chunks = splitter
        .with_separators(doc.kind.separators())
        .split_chunks(&doc.text);
    debug!(location = %source.location, chunks = chunks.len(), "document split");
    Ok(Some(chunks))
}

async fn read_bytes(location: &str) -> Result<Vec<u8>> {
    if is_url(location) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let response = client.get(location).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    } else {
        Ok(tokio::fs::read(location).await?)
    }
}

fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String> {
    match kind {
        DocumentKind::Text => {
            String::from_utf8(bytes.to_vec()).context("document is not valid UTF-8")
        }
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_kind() {
        assert_eq!(DocumentKind::detect("notes.txt"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::detect("./a/B.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::detect("https://example.com/paper.pdf?download=1"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::detect("slides.pptx"), None);
        assert_eq!(DocumentKind::detect("README"), None);
    }

    #[test]
    fn test_pdf_text_keeps_line_breaks_inside_chunks() {
        let short = "short one\nshort two";
        let long = "alpha line\nbravo line\ncharlie line";
        let text = format!("{}\n\n{}", short, long);

        let split = |kind: DocumentKind| {
            TextSplitter::new(30, 0)
                .unwrap()
                .with_separators(kind.separators())
                .split_text(&text)
        };
        let pdf = split(DocumentKind::Pdf);
        let txt = split(DocumentKind::Text);

        // A paragraph that fits stays whole in both.
        assert_eq!(pdf[0], short);
        assert_eq!(txt[0], short);

        // The oversized paragraph is cut by characters for PDFs, by lines for text.
        assert_eq!(pdf[1..], ["alpha line\nbravo line\ncharli", "e line"]);
        assert_eq!(txt[1..], ["alpha line\nbravo line", "charlie line"]);
        assert_ne!(pdf, txt);
        assert!(pdf.iter().all(|c| c.chars().count() <= 30));
    }

    #[tokio::test]
    async fn test_empty_location_is_config_error() {
        let err = load_document("  ").await.unwrap_err();
        assert!(matches!(
            crate::error::find_rag_error(&err),
            Some(RagError::MissingConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");
        std::fs::write(&path, "a,b,c").unwrap();
        let result = split_document(&DocumentSource::new(path.to_string_lossy()))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_split_text_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        let body = (0..40)
            .map(|i| format!("Line {} talks about data mining.", i))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, &body).unwrap();

        let chunks = split_document(&DocumentSource::new(path.to_string_lossy()))
            .await
            .unwrap()
            .unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 400);
        }
    }

    #[tokio::test]
    async fn test_short_text_file_single_chunk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("short.txt");
        std::fs::write(&path, "Data mining finds patterns.").unwrap();
        let chunks = split_document(&DocumentSource::new(path.to_string_lossy()).with_chunking(400, 50))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Data mining finds patterns.");
    }

    #[tokio::test]
    async fn test_missing_file_has_context() {
        let err = load_document("/definitely/not/here.txt").await.unwrap_err();
        assert!(format!("{:#}", err).contains("/definitely/not/here.txt"));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(load_document(&path.to_string_lossy()).await.is_err());
    }

    #[tokio::test]
    async fn test_remote_text_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/docs/intro.txt")
            .with_status(200)
            .with_body("Remote paragraph one.\n\nRemote paragraph two.")
            .create_async()
            .await;

        let url = format!("{}/docs/intro.txt", server.url());
        let doc = load_document(&url).await.unwrap().unwrap();
        assert_eq!(doc.kind, DocumentKind::Text);
        assert!(doc.text.contains("Remote paragraph two."));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_remote_not_found_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.txt")
            .with_status(404)
            .create_async()
            .await;
        let url = format!("{}/missing.txt", server.url());
        assert!(load_document(&url).await.is_err());
    }
}
