mod assemble;
mod assets;
mod canvas;
mod chart;
mod compose;
mod error;
mod extract;
mod font;
mod locale;
mod metrics;
mod pdf;
mod pdfinspect;
mod report;
mod response;
mod style;
mod types;

pub use assemble::{AssemblyState, Assembler, PAGE_COUNT, assemble};
pub use assets::{AssetKind, AssetManifest, Degradation, IconAsset, Prefetched, load_source, prefetch};
pub use canvas::{Canvas, Command, Document, Page};
pub use chart::{
    FillShape, RenderedAsset, clamp_percentage, fill_shape, render_gauge, render_indicator_bar,
    render_progress_bar, tick_overhang_px,
};
pub use compose::{Composer, LayoutCursor, ListMarker, PLACEHOLDER, Placed, TextStyle, wrap_text};
pub use error::{SignSenseError, SignSenseResult};
pub use extract::{
    DocumentKind, DocxTextExtractor, Extractors, PdfTextExtractor, PlainTextExtractor, TextExtractor,
};
pub use font::{BODY_FONT, BOLD_FONT, EmbeddedFont, FontRegistry};
pub use locale::{Labels, Locale};
pub use metrics::{PageMetrics, RenderMetrics};
pub use pdf::{PdfOptions, document_to_pdf, document_to_pdf_with_metrics};
pub use pdfinspect::{PdfInspectReport, inspect_pdf_bytes, inspect_pdf_path, require_page_count};
pub use report::{AnalysisReport, Band, Metric, Polarity, Scores, clamp_score, split_sentences};
pub use response::{
    ANALYSIS_CHAR_BUDGET, TranslatableText, TranslationRequest, apply_translation,
    build_analysis_prompt, check_upstream_status, extract_json_object, parse_analysis_response,
};
pub use style::{LayoutStyle, palette};
pub use types::{Color, Pt, Rect, Size};

use std::path::{Path, PathBuf};

const DEFAULT_FILE_STEM: &str = "signsense-report";

/// Report engine. Holds configuration only; every call resolves its own assets.
#[derive(Debug, Clone)]
pub struct ReportEngine {
    page_size: Size,
    default_locale: Locale,
    manifest: AssetManifest,
    pdf_options: PdfOptions,
    style: LayoutStyle,
}

#[derive(Debug, Clone)]
pub struct ReportEngineBuilder {
    page_size: Size,
    default_locale: Locale,
    manifest: AssetManifest,
    pdf_options: PdfOptions,
    style: LayoutStyle,
    raster_scale: Option<f32>,
}

/// A composed, not yet serialized, report.
#[derive(Debug, Clone)]
pub struct ComposedReport {
    pub document: Document,
    pub degradations: Vec<Degradation>,
    pub fonts: FontRegistry,
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub metrics: RenderMetrics,
    pub degradations: Vec<Degradation>,
}

impl RenderedReport {
    /// Writes the PDF into `dir` under its sanitized filename.
    pub fn save(&self, dir: impl AsRef<Path>) -> SignSenseResult<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

impl ReportEngine {
    pub fn builder() -> ReportEngineBuilder {
        ReportEngineBuilder::new()
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// Prefetches the manifest's assets and lays out both pages.
    #[tracing::instrument(skip_all, fields(title = %report.title, locale = ?locale))]
    pub fn compose(
        &self,
        report: &AnalysisReport,
        locale: Option<Locale>,
    ) -> SignSenseResult<ComposedReport> {
        let locale = locale.unwrap_or(self.default_locale);
        let prefetched = prefetch(&self.manifest);
        let document = assemble(report, &prefetched, &self.style, locale, self.page_size)?;
        let Prefetched {
            fonts,
            degradations,
            ..
        } = prefetched;
        Ok(ComposedReport {
            document,
            degradations,
            fonts,
        })
    }

    /// Composes and serializes a report, then re-opens the bytes to confirm the page count.
    #[tracing::instrument(skip_all, fields(title = %report.title, filename))]
    pub fn render(
        &self,
        report: &AnalysisReport,
        filename: &str,
        locale: Option<Locale>,
    ) -> SignSenseResult<RenderedReport> {
        let locale = locale.unwrap_or(self.default_locale);
        let composed = self.compose(report, Some(locale))?;

        let mut options = self.pdf_options.clone();
        if options.title.is_none() {
            let title = report.title.trim();
            options.title = Some(if title.is_empty() {
                locale.labels().untitled.to_string()
            } else {
                title.to_string()
            });
        }
        let (bytes, metrics) =
            document_to_pdf_with_metrics(&composed.document, &composed.fonts, &options)?;

        let inspected = inspect_pdf_bytes(&bytes)?;
        require_page_count(&inspected, PAGE_COUNT)?;

        let filename = sanitize_filename(filename);
        tracing::Span::current().record("filename", filename.as_str());
        if !composed.degradations.is_empty() {
            tracing::warn!(
                degraded = composed.degradations.len(),
                "report rendered with missing assets"
            );
        }
        tracing::debug!(bytes = bytes.len(), ms = metrics.total_render_ms, "report rendered");
        Ok(RenderedReport {
            filename,
            bytes,
            metrics,
            degradations: composed.degradations,
        })
    }
}

impl Default for ReportEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEngineBuilder {
    pub fn new() -> Self {
        Self {
            page_size: Size::a4(),
            default_locale: Locale::En,
            manifest: AssetManifest::default(),
            pdf_options: PdfOptions::default(),
            style: LayoutStyle::default(),
            raster_scale: None,
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.default_locale = locale;
        self
    }

    pub fn assets(mut self, manifest: AssetManifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn icon(mut self, metric: Metric, source: impl Into<String>) -> Self {
        self.manifest = self.manifest.with_icon(metric, source);
        self
    }

    pub fn display_font(mut self, source: impl Into<String>) -> Self {
        self.manifest = self.manifest.with_display_font(source);
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.pdf_options.compress = enabled;
        self
    }

    // Overrides the document title; by default each render uses the report title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.pdf_options.title = Some(title.into());
        self
    }

    pub fn style(mut self, style: LayoutStyle) -> Self {
        self.style = style;
        self
    }

    pub fn raster_scale(mut self, scale: f32) -> Self {
        self.raster_scale = Some(scale);
        self
    }

    pub fn build(self) -> SignSenseResult<ReportEngine> {
        let mut style = self.style;
        if let Some(scale) = self.raster_scale {
            style.raster_scale = scale;
        }
        if !style.raster_scale.is_finite() || style.raster_scale <= 0.0 {
            return Err(SignSenseError::input_validation(format!(
                "raster scale must be a positive number, got {}",
                style.raster_scale
            )));
        }
        Ok(ReportEngine {
            page_size: self.page_size,
            default_locale: self.default_locale,
            manifest: self.manifest,
            pdf_options: self.pdf_options,
            style,
        })
    }
}

/// Reduces a requested name to one safe path component ending in `.pdf`.
pub fn sanitize_filename(requested: &str) -> String {
    let last = requested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let stem = if last.to_ascii_lowercase().ends_with(".pdf") {
        &last[..last.len() - 4]
    } else {
        last
    };
    let cleaned: String = stem
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|ch| ch == '.' || ch == '_');
    if cleaned.is_empty() {
        format!("{DEFAULT_FILE_STEM}.pdf")
    } else {
        format!("{cleaned}.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::png_data_uri;

    fn lease_agreement() -> AnalysisReport {
        AnalysisReport {
            title: "Lease Agreement".to_string(),
            scores: Scores::default()
                .with(Metric::Risk, 75.0)
                .with(Metric::Clarity, 40.0)
                .with(Metric::OverallScore, 55.0),
            clauses: vec!["Clause A".to_string()],
            suggestions: vec!["Add a termination clause".to_string()],
            ..AnalysisReport::default()
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "signsense_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    #[test]
    fn render_produces_two_pages_with_title() {
        let engine = ReportEngine::builder().build().expect("engine");
        let rendered = engine
            .render(&lease_agreement(), "lease", None)
            .expect("render");
        assert_eq!(rendered.filename, "lease.pdf");
        assert!(rendered.degradations.is_empty());
        assert_eq!(rendered.metrics.pages.len(), 2);

        let inspected = inspect_pdf_bytes(&rendered.bytes).expect("inspect");
        assert_eq!(inspected.page_count, 2);
        assert_eq!(inspected.title.as_deref(), Some("Lease Agreement"));
    }

    #[test]
    fn render_is_deterministic() {
        let engine = ReportEngine::builder().build().expect("engine");
        let a = engine.render(&lease_agreement(), "a", None).expect("a");
        let b = engine.render(&lease_agreement(), "a", None).expect("b");
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn failed_icon_degrades_instead_of_failing() {
        let engine = ReportEngine::builder()
            .icon(Metric::Risk, "data:image/png;base64,AAAA")
            .icon(Metric::Clarity, png_data_uri(8, 8))
            .build()
            .expect("engine");
        let rendered = engine
            .render(&lease_agreement(), "lease.pdf", Some(Locale::Es))
            .expect("render");
        assert_eq!(rendered.degradations.len(), 1);
        assert_eq!(rendered.degradations[0].asset, "icon:risk");
        assert_eq!(inspect_pdf_bytes(&rendered.bytes).expect("inspect").page_count, 2);
    }

    #[test]
    fn empty_report_uses_localized_untitled_title() {
        let engine = ReportEngine::builder()
            .locale(Locale::Es)
            .compress(false)
            .build()
            .expect("engine");
        let rendered = engine
            .render(&AnalysisReport::default(), "", None)
            .expect("render");
        assert_eq!(rendered.filename, "signsense-report.pdf");
        let inspected = inspect_pdf_bytes(&rendered.bytes).expect("inspect");
        assert_eq!(
            inspected.title.as_deref(),
            Some(Locale::Es.labels().untitled)
        );
    }

    #[test]
    fn compose_keeps_document_in_memory() {
        let engine = ReportEngine::builder()
            .page_size(Size::letter())
            .build()
            .expect("engine");
        let composed = engine.compose(&lease_agreement(), None).expect("compose");
        assert_eq!(composed.document.pages.len(), PAGE_COUNT);
        assert_eq!(composed.document.page_size, Size::letter());
        assert!(composed.fonts.display().is_none());
    }

    #[test]
    fn save_writes_under_sanitized_name() {
        let engine = ReportEngine::builder().build().expect("engine");
        let rendered = engine
            .render(&lease_agreement(), "../../etc/Lease Agreement.PDF", None)
            .expect("render");
        assert_eq!(rendered.filename, "Lease_Agreement.pdf");

        let dir = temp_dir("save");
        let path = rendered.save(&dir).expect("save");
        assert_eq!(path, dir.join("Lease_Agreement.pdf"));
        assert_eq!(std::fs::read(&path).expect("read"), rendered.bytes);
    }

    #[test]
    fn filenames_are_single_pdf_components() {
        assert_eq!(sanitize_filename("report"), "report.pdf");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("C:\\tmp\\x.pdf"), "x.pdf");
        assert_eq!(sanitize_filename("dir/"), "signsense-report.pdf");
        assert_eq!(sanitize_filename("..."), "signsense-report.pdf");
        assert_eq!(sanitize_filename("contrato año"), "contrato_a_o.pdf");
    }

    #[test]
    fn builder_rejects_bad_raster_scale() {
        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = ReportEngine::builder()
                .raster_scale(scale)
                .build()
                .expect_err("invalid scale");
            assert!(matches!(err, SignSenseError::InputValidation(_)));
        }
        assert!(ReportEngine::builder().raster_scale(2.0).build().is_ok());
    }
}
