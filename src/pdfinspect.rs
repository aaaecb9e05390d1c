use lopdf::{Document as LoDocument, Object};
use std::path::Path;

use crate::error::{SignSenseError, SignSenseResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    pub title: Option<String>,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> SignSenseResult<PdfInspectReport> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| {
        SignSenseError::render(format!("produced output is not a readable pdf: {err}"))
    })?;

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        title: document_title(&pdf),
    })
}

pub fn inspect_pdf_path(path: &Path) -> SignSenseResult<PdfInspectReport> {
    let data = std::fs::read(path)?;
    inspect_pdf_bytes(&data)
}

/// A report document always has exactly `expected` pages; anything else is a failed render.
pub fn require_page_count(report: &PdfInspectReport, expected: usize) -> SignSenseResult<()> {
    if report.encrypted {
        return Err(SignSenseError::render("produced pdf is unexpectedly encrypted"));
    }
    if report.page_count != expected {
        return Err(SignSenseError::render(format!(
            "expected {expected} pages, produced {}",
            report.page_count
        )));
    }
    Ok(())
}

fn document_title(pdf: &LoDocument) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").and_then(Object::as_reference).ok()?;
    let raw = pdf
        .get_dictionary(info_id)
        .and_then(|info| info.get(b"Title"))
        .and_then(Object::as_str)
        .ok()?;
    match raw.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            Some(String::from_utf16_lossy(&units))
        }
        // PDFDocEncoding agrees with Latin-1 outside 0x80..0xA0.
        None => Some(raw.iter().map(|b| *b as char).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream as LoStream, dictionary};
    use std::io::Write;

    fn make_pdf_bytes(pages: usize, title: Option<&str>) -> Vec<u8> {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<Object> = Vec::new();
        for index in 0..pages {
            let content = format!("BT /F1 18 Tf 72 720 Td (Page {}) Tj ET", index + 1).into_bytes();
            let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title),
            });
            doc.trailer.set("Info", info_id);
        }
        doc.compress();

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    #[test]
    fn inspect_pdf_bytes_reads_version_page_count_and_title() {
        let bytes = make_pdf_bytes(2, Some("Lease Agreement"));
        let report = inspect_pdf_bytes(&bytes).expect("inspect");
        assert_eq!(report.page_count, 2);
        assert!(!report.encrypted);
        assert_eq!(report.file_size_bytes, bytes.len());
        assert!(!report.pdf_version.is_empty());
        assert_eq!(report.title.as_deref(), Some("Lease Agreement"));
        require_page_count(&report, 2).expect("two pages");
    }

    #[test]
    fn inspect_pdf_bytes_rejects_malformed_data() {
        let err = inspect_pdf_bytes(b"not a pdf").expect_err("invalid");
        assert!(matches!(err, SignSenseError::Render(_)));
    }

    #[test]
    fn wrong_page_count_is_a_render_error() {
        let report = inspect_pdf_bytes(&make_pdf_bytes(3, None)).expect("inspect");
        assert_eq!(report.title, None);
        let err = require_page_count(&report, 2).expect_err("three pages");
        assert!(err.to_string().contains("expected 2 pages, produced 3"));
    }

    #[test]
    fn inspect_pdf_path_matches_bytes_report() {
        let bytes = make_pdf_bytes(1, None);
        let temp_dir = std::env::temp_dir().join(format!(
            "signsense_pdfinspect_path_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&temp_dir).expect("mkdir");
        let path = temp_dir.join("one.pdf");
        let mut f = std::fs::File::create(&path).expect("create");
        f.write_all(&bytes).expect("write");

        let from_path = inspect_pdf_path(&path).expect("inspect path");
        let from_bytes = inspect_pdf_bytes(&bytes).expect("inspect bytes");
        assert_eq!(from_path, from_bytes);

        let missing = inspect_pdf_path(&temp_dir.join("missing.pdf")).expect_err("missing");
        assert!(matches!(missing, SignSenseError::Io(_)));
    }
}
