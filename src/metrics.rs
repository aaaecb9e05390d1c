use crate::canvas::{Command, Page};

#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    pub render_ms: f64,
    pub command_count: usize,
    pub string_count: usize,
    pub image_count: usize,
    pub content_bytes: usize,
}

impl PageMetrics {
    pub(crate) fn from_page(
        page_number: usize,
        page: &Page,
        content_bytes: usize,
        render_ms: f64,
    ) -> Self {
        let drawing = page
            .commands
            .iter()
            .filter(|cmd| !matches!(cmd, Command::Meta { .. }));
        Self {
            page_number,
            render_ms,
            command_count: drawing.count(),
            string_count: page.strings().count(),
            image_count: page.image_count(),
            content_bytes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderMetrics {
    pub pages: Vec<PageMetrics>,
    /// Distinct embedded images across the document.
    pub image_count: usize,
    pub total_render_ms: f64,
    pub total_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::{Pt, Size};

    #[test]
    fn page_metrics_skip_meta_markers() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.meta("section", "header");
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "SignSense");
        canvas.draw_image(Pt::ZERO, Pt::ZERO, Pt::from_i32(4), Pt::from_i32(4), "chart:x");
        let doc = canvas.finish();
        let metrics = PageMetrics::from_page(1, &doc.pages[0], 64, 0.5);
        assert_eq!(metrics.command_count, 2);
        assert_eq!(metrics.string_count, 1);
        assert_eq!(metrics.image_count, 1);
        assert_eq!(metrics.content_bytes, 64);
    }
}
