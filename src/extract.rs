use lopdf::Document as LoDocument;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::{SignSenseError, SignSenseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
}

impl DocumentKind {
    /// Classifies by extension, case-insensitively.
    pub fn from_file_name(name: &str) -> SignSenseResult<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            "txt" => Ok(DocumentKind::Txt),
            _ => Err(SignSenseError::unsupported_file_type(name)),
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split(';').next().unwrap_or("").trim() {
            "application/pdf" => Some(DocumentKind::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentKind::Docx)
            }
            "text/plain" => Some(DocumentKind::Txt),
            _ => None,
        }
    }
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> SignSenseResult<String>;
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> SignSenseResult<String> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> SignSenseResult<String> {
        let pdf = LoDocument::load_mem(bytes)
            .map_err(|err| SignSenseError::input_validation(format!("unreadable pdf: {err}")))?;
        if pdf.is_encrypted() {
            return Err(SignSenseError::input_validation(
                "encrypted pdfs are not supported",
            ));
        }
        let pages: Vec<u32> = pdf.get_pages().keys().copied().collect();
        pdf.extract_text(&pages)
            .map_err(|err| SignSenseError::input_validation(format!("pdf text extraction failed: {err}")))
    }
}

const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Reads `word/document.xml`; one line per `w:p`, tabs and breaks kept.
pub struct DocxTextExtractor;

impl TextExtractor for DocxTextExtractor {
    fn extract(&self, bytes: &[u8]) -> SignSenseResult<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| SignSenseError::input_validation(format!("unreadable docx: {err}")))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|err| SignSenseError::input_validation(format!("docx has no document part: {err}")))?
            .read_to_string(&mut xml)?;
        let doc = roxmltree::Document::parse(&xml)
            .map_err(|err| SignSenseError::input_validation(format!("malformed docx xml: {err}")))?;

        let mut paragraphs = Vec::new();
        for paragraph in doc
            .descendants()
            .filter(|node| node.has_tag_name((WORDML_NS, "p")))
        {
            let mut line = String::new();
            for node in paragraph.descendants() {
                if node.has_tag_name((WORDML_NS, "t")) {
                    line.push_str(node.text().unwrap_or_default());
                } else if node.has_tag_name((WORDML_NS, "tab")) {
                    line.push('\t');
                } else if node.has_tag_name((WORDML_NS, "br")) {
                    line.push('\n');
                }
            }
            paragraphs.push(line);
        }
        Ok(paragraphs.join("\n"))
    }
}

/// Extractors keyed by document kind.
pub struct Extractors {
    by_kind: BTreeMap<DocumentKind, Box<dyn TextExtractor>>,
}

impl Default for Extractors {
    fn default() -> Self {
        let mut by_kind: BTreeMap<DocumentKind, Box<dyn TextExtractor>> = BTreeMap::new();
        by_kind.insert(DocumentKind::Txt, Box::new(PlainTextExtractor));
        by_kind.insert(DocumentKind::Pdf, Box::new(PdfTextExtractor));
        by_kind.insert(DocumentKind::Docx, Box::new(DocxTextExtractor));
        Self { by_kind }
    }
}

impl Extractors {
    pub fn register(mut self, kind: DocumentKind, extractor: impl TextExtractor + 'static) -> Self {
        self.by_kind.insert(kind, Box::new(extractor));
        self
    }

    pub fn extract(&self, file_name: &str, bytes: &[u8]) -> SignSenseResult<String> {
        self.extract_as(DocumentKind::from_file_name(file_name)?, file_name, bytes)
    }

    /// Upload form: the declared MIME type wins, the file name is the fallback.
    pub fn extract_upload(
        &self,
        file_name: &str,
        mime: Option<&str>,
        bytes: &[u8],
    ) -> SignSenseResult<String> {
        let kind = match mime.and_then(DocumentKind::from_mime) {
            Some(kind) => kind,
            None => DocumentKind::from_file_name(file_name)?,
        };
        self.extract_as(kind, file_name, bytes)
    }

    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn extract_as(&self, kind: DocumentKind, file_name: &str, bytes: &[u8]) -> SignSenseResult<String> {
        let Some(extractor) = self.by_kind.get(&kind) else {
            tracing::warn!(?kind, "no extractor registered");
            return Err(SignSenseError::unsupported_file_type(file_name));
        };
        let text = extractor.extract(bytes)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SignSenseError::EmptyDocument);
        }
        tracing::debug!(chars = text.chars().count(), "text extracted");
        Ok(text.to_string())
    }

    pub fn extract_path(&self, path: &Path) -> SignSenseResult<String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        // Reject by name before touching the file.
        DocumentKind::from_file_name(&name)?;
        let bytes = std::fs::read(path)?;
        self.extract(&name, &bytes)
    }
}
