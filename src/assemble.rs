use crate::assets::Prefetched;
use crate::canvas::{Canvas, Document};
use crate::compose::{Composer, LayoutCursor, ListMarker, Placed};
use crate::error::{SignSenseError, SignSenseResult};
use crate::locale::{Labels, Locale};
use crate::report::{AnalysisReport, Metric};
use crate::style::LayoutStyle;
use crate::types::{Pt, Size};

/// Every report has exactly this many pages.
pub const PAGE_COUNT: usize = 2;

const STAT_METRICS: [Metric; 3] = [
    Metric::Professionalism,
    Metric::Favorability,
    Metric::DeadlinePressure,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Page1Rendering,
    Page2Rendering,
    Finalized,
}

pub struct Assembler<'a> {
    state: AssemblyState,
    canvas: Canvas,
    report: &'a AnalysisReport,
    prefetched: &'a Prefetched,
    style: &'a LayoutStyle,
    labels: &'static Labels,
}

impl<'a> Assembler<'a> {
    pub fn new(
        report: &'a AnalysisReport,
        prefetched: &'a Prefetched,
        style: &'a LayoutStyle,
        locale: Locale,
        page_size: Size,
    ) -> Self {
        Self {
            state: AssemblyState::Page1Rendering,
            canvas: Canvas::new(page_size),
            report,
            prefetched,
            style,
            labels: locale.labels(),
        }
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    fn expect_state(&self, expected: AssemblyState, step: &str) -> SignSenseResult<()> {
        if self.state != expected {
            return Err(SignSenseError::render(format!(
                "{step} called in state {:?}",
                self.state
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn render_overview(&mut self) -> SignSenseResult<()> {
        self.expect_state(AssemblyState::Page1Rendering, "render_overview")?;
        let report = self.report;
        let prefetched = self.prefetched;
        let labels = self.labels;
        let gap = LayoutStyle::pt(self.style.section_gap);
        let mut composer = Composer::new(
            &mut self.canvas,
            &prefetched.fonts,
            self.style,
            labels,
        );
        let (x, width) = composer.content_column();
        let mut cursor = LayoutCursor::new(0, LayoutStyle::pt(self.style.margin_top));

        cursor = composer.header(cursor).cursor.advance(gap);

        let title = if report.title.trim().is_empty() {
            labels.untitled
        } else {
            report.title.trim()
        };
        cursor = composer
            .card(cursor, x, width, "summary", None, |c, inner, ix, iw| {
                let title_text = c.title_text();
                let body = c.body_text();
                let after_title = c.paragraph(inner, ix, iw, &title_text, title).cursor;
                let heading = c.heading_text();
                let after_heading = c
                    .paragraph(after_title, ix, iw, &heading, labels.summary)
                    .cursor;
                if report.summary.is_empty() {
                    return Ok(c.list(after_heading, ix, iw, &body, &[], ListMarker::Bullet).cursor);
                }
                Ok(c.paragraphs(after_heading, ix, iw, &body, &report.summary).cursor)
            })?
            .cursor
            .advance(gap);

        let heading = composer.heading_text();
        cursor = composer
            .paragraph(cursor, x, width, &heading, labels.breakdown)
            .cursor;
        let card_gap = LayoutStyle::pt(self.style.metric_card_gap);
        let card_width = (width - card_gap) / 2;
        let left = composer.metric_card(
            cursor,
            x,
            card_width,
            Metric::Risk,
            report.score(Metric::Risk),
            prefetched.icon(Metric::Risk),
        )?;
        let right = composer.metric_card(
            cursor,
            x + card_width + card_gap,
            card_width,
            Metric::Clarity,
            report.score(Metric::Clarity),
            prefetched.icon(Metric::Clarity),
        )?;
        cursor = lower(left, right).cursor.advance(gap);

        cursor = composer
            .card(
                cursor,
                x,
                width,
                "statistics",
                Some(labels.statistics),
                |c, inner, ix, iw| {
                    let mut row = inner;
                    for metric in STAT_METRICS {
                        row = c.bar_row(row, ix, iw, metric, report.score(metric))?.cursor;
                    }
                    Ok(row)
                },
            )?
            .cursor
            .advance(gap);

        cursor = composer
            .card(
                cursor,
                x,
                width,
                "clauses",
                Some(labels.clauses),
                |c, inner, ix, iw| {
                    let body = c.body_text();
                    Ok(c.list(inner, ix, iw, &body, &report.clauses, ListMarker::Bullet)
                        .cursor)
                },
            )?
            .cursor;

        warn_on_overflow(1, cursor.y, composer.footer_top());
        composer.footer(1, PAGE_COUNT);

        self.canvas.show_page();
        self.state = AssemblyState::Page2Rendering;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn render_details(&mut self) -> SignSenseResult<()> {
        self.expect_state(AssemblyState::Page2Rendering, "render_details")?;
        let report = self.report;
        let labels = self.labels;
        let gap = LayoutStyle::pt(self.style.section_gap);
        let mut composer = Composer::new(
            &mut self.canvas,
            &self.prefetched.fonts,
            self.style,
            labels,
        );
        let (x, width) = composer.content_column();
        let mut cursor = LayoutCursor::new(1, LayoutStyle::pt(self.style.margin_top));

        cursor = composer.header(cursor).cursor.advance(gap);

        cursor = composer
            .card(
                cursor,
                x,
                width,
                "issues",
                Some(labels.issues),
                |c, inner, ix, iw| {
                    let body = c.body_text();
                    Ok(c.list(inner, ix, iw, &body, &report.issues, ListMarker::Bullet)
                        .cursor)
                },
            )?
            .cursor
            .advance(gap);

        cursor = composer
            .card(
                cursor,
                x,
                width,
                "suggestions",
                Some(labels.suggestions),
                |c, inner, ix, iw| {
                    let body = c.body_text();
                    Ok(c.list(inner, ix, iw, &body, &report.suggestions, ListMarker::Numbered)
                        .cursor)
                },
            )?
            .cursor
            .advance(gap);

        cursor = composer
            .card(cursor, x, width, "overall", None, |c, inner, ix, iw| {
                let after = c
                    .indicator(inner, ix, iw, Metric::OverallScore, report.score(Metric::OverallScore))?
                    .cursor;
                Ok(c
                    .bar_row(after, ix, iw, Metric::ConfidenceToSign, report.score(Metric::ConfidenceToSign))?
                    .cursor)
            })?
            .cursor;

        warn_on_overflow(2, cursor.y, composer.footer_top());
        composer.footer(2, PAGE_COUNT);

        self.canvas.show_page();
        self.state = AssemblyState::Finalized;
        Ok(())
    }

    pub fn finish(self) -> SignSenseResult<Document> {
        self.expect_state(AssemblyState::Finalized, "finish")?;
        let document = self.canvas.finish();
        if document.pages.len() != PAGE_COUNT {
            return Err(SignSenseError::render(format!(
                "assembled {} pages, expected {PAGE_COUNT}",
                document.pages.len()
            )));
        }
        Ok(document)
    }
}

fn lower(a: Placed, b: Placed) -> Placed {
    if a.cursor.y >= b.cursor.y { a } else { b }
}

// Long content grows cards past the footer; the page count never changes.
fn warn_on_overflow(page: usize, content_bottom: Pt, footer_top: Pt) {
    if content_bottom > footer_top {
        tracing::debug!(
            page,
            overflow_pt = (content_bottom - footer_top).to_f32(),
            "content runs into the footer area"
        );
    }
}

/// Runs both pages and returns the finished two-page document.
pub fn assemble(
    report: &AnalysisReport,
    prefetched: &Prefetched,
    style: &LayoutStyle,
    locale: Locale,
    page_size: Size,
) -> SignSenseResult<Document> {
    let mut assembler = Assembler::new(report, prefetched, style, locale, page_size);
    assembler.render_overview()?;
    assembler.render_details()?;
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetManifest, prefetch, tests::png_data_uri};
    use crate::canvas::{Command, Page};
    use crate::compose::PLACEHOLDER;
    use crate::report::{Band, Scores};

    fn lease_agreement() -> AnalysisReport {
        AnalysisReport {
            title: "Lease Agreement".to_string(),
            scores: Scores::default()
                .with(Metric::Risk, 75.0)
                .with(Metric::Clarity, 40.0)
                .with(Metric::OverallScore, 55.0),
            clauses: vec!["Clause A".to_string()],
            issues: Vec::new(),
            suggestions: vec!["Add a termination clause".to_string()],
            ..AnalysisReport::default()
        }
    }

    fn assemble_default(report: &AnalysisReport, prefetched: &Prefetched) -> Document {
        assemble(
            report,
            prefetched,
            &LayoutStyle::default(),
            Locale::En,
            Size::a4(),
        )
        .expect("assemble")
    }

    fn element_image(document: &Document, page: &Page, element: &str) -> image::RgbaImage {
        let marker = page
            .commands
            .iter()
            .position(|cmd| {
                matches!(cmd, Command::Meta { key, value } if key == "element" && value == element)
            })
            .expect("element marker");
        let resource = page.commands[marker..]
            .iter()
            .find_map(|cmd| match cmd {
                Command::DrawImage { resource_id, .. } => Some(resource_id.clone()),
                _ => None,
            })
            .expect("image after marker");
        image::load_from_memory(&document.images[&resource])
            .expect("decode")
            .to_rgba8()
    }

    fn ring_color(gauge: &image::RgbaImage) -> [u8; 3] {
        // 45 degrees clockwise from 12 o'clock, midway through the ring.
        let center = gauge.width() as f32 / 2.0;
        let radius = center * 0.86;
        let offset = radius * std::f32::consts::FRAC_1_SQRT_2;
        let pixel = gauge.get_pixel((center + offset) as u32, (center - offset) as u32);
        [pixel[0], pixel[1], pixel[2]]
    }

    fn rgb(band: Band) -> [u8; 3] {
        let [r, g, b, _] = band.color().to_rgba8();
        [r, g, b]
    }

    #[test]
    fn lease_agreement_renders_two_pages() {
        let report = lease_agreement();
        let prefetched = Prefetched::default();
        let document = assemble_default(&report, &prefetched);
        assert_eq!(document.pages.len(), 2);

        let page1 = &document.pages[0];
        let strings1: Vec<&str> = page1.strings().collect();
        assert!(strings1.contains(&"Lease Agreement"));
        assert!(strings1.contains(&"Clause A"));
        assert!(strings1.contains(&"Page 1 of 2"));
        assert_eq!(ring_color(&element_image(&document, page1, "metric.risk.gauge")), rgb(Band::Unfavorable));
        assert_eq!(ring_color(&element_image(&document, page1, "metric.clarity.gauge")), rgb(Band::Caution));

        let page2 = &document.pages[1];
        let strings2: Vec<&str> = page2.strings().collect();
        assert!(strings2.contains(&"1. "));
        assert!(strings2.contains(&"Add a termination clause"));
        assert!(strings2.contains(&PLACEHOLDER));
        assert!(!strings2.contains(&"2. "));
        assert!(page2.has_meta("element", "footer.copyright"));
        assert!(!page1.has_meta("element", "footer.copyright"));
        assert!(page2.has_meta("element", "metric.overallScore.indicator"));
    }

    #[test]
    fn failed_risk_icon_keeps_the_rest_of_the_row() {
        let manifest = AssetManifest::default()
            .with_icon(Metric::Risk, "/nonexistent/signsense/risk.png")
            .with_icon(Metric::Clarity, png_data_uri(4, 4));
        let prefetched = prefetch(&manifest);
        assert_eq!(prefetched.degradations.len(), 1);

        let document = assemble_default(&lease_agreement(), &prefetched);
        let page1 = &document.pages[0];
        assert!(!page1.has_meta("element", "metric.risk.icon"));
        assert!(page1.has_meta("element", "metric.risk.gauge"));
        assert!(page1.has_meta("element", "metric.risk.label"));
        assert!(page1.has_meta("element", "metric.risk.status"));
        assert!(page1.has_meta("element", "metric.clarity.icon"));
        assert!(page1.strings().any(|s| s == "Risk"));
    }

    #[test]
    fn empty_report_still_produces_two_pages() {
        let report = AnalysisReport::default();
        let document = assemble_default(&report, &Prefetched::default());
        assert_eq!(document.pages.len(), 2);
        assert!(document.pages[0].strings().any(|s| s == "Untitled Contract"));
        let placeholders = document
            .pages
            .iter()
            .flat_map(|page| page.strings())
            .filter(|s| *s == PLACEHOLDER)
            .count();
        // summary, clauses, issues, suggestions
        assert_eq!(placeholders, 4);
    }

    #[test]
    fn long_content_grows_cards_without_adding_pages() {
        let mut report = lease_agreement();
        report.clauses = (0..80).map(|i| format!("Clause number {i} with some text")).collect();
        let document = assemble_default(&report, &Prefetched::default());
        assert_eq!(document.pages.len(), 2);
    }

    #[test]
    fn steps_must_run_in_order() {
        let report = lease_agreement();
        let prefetched = Prefetched::default();
        let style = LayoutStyle::default();
        let mut assembler = Assembler::new(&report, &prefetched, &style, Locale::En, Size::a4());
        assert_eq!(assembler.state(), AssemblyState::Page1Rendering);
        assert!(assembler.render_details().is_err());
        assembler.render_overview().expect("page 1");
        assert_eq!(assembler.state(), AssemblyState::Page2Rendering);
        assert!(assembler.render_overview().is_err());
        assembler.render_details().expect("page 2");
        assert_eq!(assembler.state(), AssemblyState::Finalized);
        assert_eq!(assembler.finish().expect("finish").pages.len(), 2);

        let early = Assembler::new(&report, &prefetched, &style, Locale::En, Size::a4());
        assert!(matches!(early.finish(), Err(SignSenseError::Render(_))));
    }

    #[test]
    fn labels_follow_the_locale() {
        let document = assemble(
            &lease_agreement(),
            &Prefetched::default(),
            &LayoutStyle::default(),
            Locale::Es,
            Size::letter(),
        )
        .expect("assemble");
        assert!(document.pages[1].strings().any(|s| s == "P\u{e1}gina 2 de 2"));
        assert!(document.pages[0].strings().any(|s| s == "Riesgo"));
    }
}
