use crate::assets::IconAsset;
use crate::canvas::Canvas;
use crate::chart::{self, RenderedAsset};
use crate::error::SignSenseResult;
use crate::font::{BODY_FONT, BOLD_FONT, FontRegistry};
use crate::locale::Labels;
use crate::report::{Band, Metric};
use crate::style::{LayoutStyle, palette};
use crate::types::{Color, Pt, Rect};

const KAPPA: f32 = 0.552_284_8;
const PILL_PADDING: f32 = 8.0;
/// Shown in place of an empty list.
pub const PLACEHOLDER: &str = "\u{2014}";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutCursor {
    pub page: usize,
    pub y: Pt,
}

impl LayoutCursor {
    pub fn new(page: usize, y: Pt) -> Self {
        Self { page, y }
    }

    pub fn advance(self, dy: Pt) -> Self {
        Self {
            page: self.page,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placed {
    pub cursor: LayoutCursor,
    pub height: Pt,
}

impl Placed {
    fn between(start: LayoutCursor, end: LayoutCursor) -> Self {
        Self {
            cursor: end,
            height: end.y - start.y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    Numbered,
    Bullet,
}

impl ListMarker {
    fn label(self, index: usize) -> String {
        match self {
            ListMarker::Numbered => format!("{}. ", index + 1),
            ListMarker::Bullet => "\u{2022}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextStyle<'f> {
    pub font: &'f str,
    pub size: f32,
    pub color: Color,
}

/// Greedy word wrap against measured widths. Words longer than the line are broken
/// between characters; a single character is never split.
pub fn wrap_text(
    fonts: &FontRegistry,
    font_name: &str,
    font_size: Pt,
    text: &str,
    max_width: Pt,
) -> Vec<String> {
    let fits = |candidate: &str| fonts.measure_text_width(font_name, font_size, candidate) <= max_width;
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if fits(word) {
            current = word.to_string();
            continue;
        }
        for ch in word.chars() {
            let mut next = current.clone();
            next.push(ch);
            if !current.is_empty() && !fits(&next) {
                lines.push(std::mem::replace(&mut current, ch.to_string()));
            } else {
                current = next;
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn percent_label(value: f64) -> String {
    format!("{}%", chart::clamp_percentage(value).round() as i64)
}

fn px(points: f32, scale: f32) -> u32 {
    (points * scale).round().max(1.0) as u32
}

pub struct Composer<'a> {
    canvas: &'a mut Canvas,
    fonts: &'a FontRegistry,
    style: &'a LayoutStyle,
    labels: &'a Labels,
}

impl<'a> Composer<'a> {
    pub fn new(
        canvas: &'a mut Canvas,
        fonts: &'a FontRegistry,
        style: &'a LayoutStyle,
        labels: &'a Labels,
    ) -> Self {
        Self {
            canvas,
            fonts,
            style,
            labels,
        }
    }

    pub fn content_column(&self) -> (Pt, Pt) {
        let margin = LayoutStyle::pt(self.style.margin_x);
        (margin, self.canvas.page_size().width - margin * 2)
    }

    /// Top edge of the footer; content drawn below it overflows the page.
    pub fn footer_top(&self) -> Pt {
        self.canvas.page_size().height
            - LayoutStyle::pt(self.style.margin_bottom + self.style.footer_height)
    }

    pub fn body_text(&self) -> TextStyle<'static> {
        TextStyle {
            font: BODY_FONT,
            size: self.style.body_size,
            color: palette::INK,
        }
    }

    // Borrowed for 'a so text styles stay usable while the canvas is drawn to.
    fn display_font(&self) -> &'a str {
        let fonts: &'a FontRegistry = self.fonts;
        fonts.display_font_name()
    }

    pub fn heading_text(&self) -> TextStyle<'a> {
        TextStyle {
            font: self.display_font(),
            size: self.style.heading_size,
            color: palette::BRAND,
        }
    }

    pub fn title_text(&self) -> TextStyle<'a> {
        TextStyle {
            size: self.style.title_size,
            color: palette::INK,
            ..self.heading_text()
        }
    }

    fn measure(&self, text: &TextStyle<'_>, value: &str) -> Pt {
        self.fonts
            .measure_text_width(text.font, LayoutStyle::pt(text.size), value)
    }

    fn text_at(&mut self, x: Pt, y: Pt, text: &TextStyle<'_>, value: &str) {
        self.canvas.set_fill_color(text.color);
        self.canvas.set_font(text.font, LayoutStyle::pt(text.size));
        self.canvas.draw_string(x, y, value);
    }

    fn lines_at(
        &mut self,
        cursor: LayoutCursor,
        x: Pt,
        text: &TextStyle<'_>,
        lines: &[String],
    ) -> LayoutCursor {
        let line_height = self.style.line_height(text.size);
        let lead = (line_height - LayoutStyle::pt(text.size)) / 2;
        let mut y = cursor.y;
        for line in lines {
            self.text_at(x, y + lead, text, line);
            y += line_height;
        }
        LayoutCursor::new(cursor.page, y)
    }

    pub fn paragraph(
        &mut self,
        cursor: LayoutCursor,
        x: Pt,
        width: Pt,
        text: &TextStyle<'_>,
        content: &str,
    ) -> Placed {
        let lines = wrap_text(self.fonts, text.font, LayoutStyle::pt(text.size), content, width);
        let end = self
            .lines_at(cursor, x, text, &lines)
            .advance(LayoutStyle::pt(self.style.item_spacing));
        Placed::between(cursor, end)
    }

    pub fn paragraphs(
        &mut self,
        cursor: LayoutCursor,
        x: Pt,
        width: Pt,
        text: &TextStyle<'_>,
        items: &[String],
    ) -> Placed {
        let mut end = cursor;
        for item in items {
            end = self.paragraph(end, x, width, text, item).cursor;
        }
        Placed::between(cursor, end)
    }

    pub fn list(
        &mut self,
        cursor: LayoutCursor,
        x: Pt,
        width: Pt,
        text: &TextStyle<'_>,
        items: &[String],
        marker: ListMarker,
    ) -> Placed {
        if items.is_empty() {
            let muted = TextStyle {
                color: palette::MUTED,
                ..*text
            };
            return self.paragraph(cursor, x, width, &muted, PLACEHOLDER);
        }
        let gutter = LayoutStyle::pt(self.style.list_gutter);
        let text_width = (width - gutter).max(LayoutStyle::pt(1.0));
        let line_height = self.style.line_height(text.size);
        let lead = (line_height - LayoutStyle::pt(text.size)) / 2;
        let spacing = LayoutStyle::pt(self.style.item_spacing);

        let mut end = cursor;
        for (index, item) in items.iter().enumerate() {
            let lines = wrap_text(self.fonts, text.font, LayoutStyle::pt(text.size), item, text_width);
            self.text_at(x, end.y + lead, text, &marker.label(index));
            if lines.is_empty() {
                end = end.advance(line_height + spacing);
                continue;
            }
            end = self.lines_at(end, x + gutter, text, &lines).advance(spacing);
        }
        Placed::between(cursor, end)
    }

    /// Bordered card. The heading and `body` are drawn first; the border follows,
    /// sized from the cursor delta plus padding.
    pub fn card<F>(
        &mut self,
        cursor: LayoutCursor,
        x: Pt,
        width: Pt,
        section: &str,
        heading: Option<&str>,
        body: F,
    ) -> SignSenseResult<Placed>
    where
        F: FnOnce(&mut Self, LayoutCursor, Pt, Pt) -> SignSenseResult<LayoutCursor>,
    {
        let padding = LayoutStyle::pt(self.style.card_padding);
        let inner_x = x + padding;
        let inner_width = width - padding * 2;
        self.canvas.meta("section", section);

        let mut inner = cursor.advance(padding);
        if let Some(heading) = heading {
            let text = self.heading_text();
            let lines = wrap_text(
                self.fonts,
                text.font,
                LayoutStyle::pt(text.size),
                heading,
                inner_width,
            );
            inner = self
                .lines_at(inner, inner_x, &text, &lines)
                .advance(LayoutStyle::pt(self.style.item_spacing));
        }
        let end = body(self, inner, inner_x, inner_width)?;

        let height = (end.y - cursor.y) + padding;
        self.canvas.save_state();
        self.canvas.set_stroke_color(palette::BORDER);
        self.canvas
            .set_line_width(LayoutStyle::pt(self.style.card_border_width));
        self.rounded_rect(
            Rect::new(x, cursor.y, width, height),
            LayoutStyle::pt(self.style.card_radius),
        );
        self.canvas.stroke();
        self.canvas.restore_state();

        Ok(Placed::between(cursor, cursor.advance(height)))
    }

    pub fn header(&mut self, cursor: LayoutCursor) -> Placed {
        let page_width = self.canvas.page_size().width;
        let height = LayoutStyle::pt(self.style.header_height);
        let (x, _) = self.content_column();
        self.canvas.meta("section", "header");
        self.canvas.set_fill_color(palette::BRAND);
        self.canvas.draw_rect(Pt::ZERO, cursor.y, page_width, height);
        self.canvas.fill();

        let title = TextStyle {
            font: self.display_font(),
            size: self.style.header_title_size,
            color: Color::WHITE,
        };
        let subtitle = TextStyle {
            font: BODY_FONT,
            size: self.style.header_subtitle_size,
            color: palette::BRAND_LIGHT,
        };
        let block = LayoutStyle::pt(self.style.header_title_size + 4.0 + self.style.header_subtitle_size);
        let top = cursor.y + (height - block) / 2;
        self.text_at(x, top, &title, self.labels.brand);
        self.text_at(
            x,
            top + LayoutStyle::pt(self.style.header_title_size + 4.0),
            &subtitle,
            self.labels.subtitle,
        );
        Placed::between(cursor, cursor.advance(height))
    }

    fn embed(&mut self, asset: &RenderedAsset) -> String {
        let id = asset.resource_id();
        self.canvas.register_image(id.clone(), asset.png.clone());
        id
    }

    /// Two-column metric card: gauge in a fixed chart column, text column with the
    /// icon badge top-left, explanation centered and status dot plus verdict bottom-left.
    /// A missing icon drops only the icon image from the badge.
    pub fn metric_card(
        &mut self,
        cursor: LayoutCursor,
        x: Pt,
        width: Pt,
        metric: Metric,
        value: f64,
        icon: Option<&IconAsset>,
    ) -> SignSenseResult<Placed> {
        let style = self.style;
        let key = metric.key();
        let band = Band::classify(metric, value);
        let padding = LayoutStyle::pt(style.card_padding);
        let frame = Rect::new(x, cursor.y, width, LayoutStyle::pt(style.metric_card_height));
        self.canvas.meta("section", format!("metric.{key}"));

        // Chart column.
        let diameter = LayoutStyle::pt(style.gauge_diameter);
        let column = LayoutStyle::pt(style.chart_column_width);
        let gauge_x = frame.x + padding + (column - diameter) / 2;
        let gauge_y = frame.y + (frame.height - diameter) / 2;
        let gauge = chart::render_gauge(
            value,
            band.color(),
            px(style.gauge_diameter, style.raster_scale),
            self.fonts.display().map(|font| font.as_ref()),
        )?;
        let gauge_id = self.embed(&gauge);
        self.canvas.meta("element", format!("metric.{key}.gauge"));
        self.canvas
            .draw_image(gauge_x, gauge_y, diameter, diameter, gauge_id);
        if !gauge.label_drawn {
            let label = TextStyle {
                font: BOLD_FONT,
                size: style.heading_size,
                color: palette::INK,
            };
            let value_text = percent_label(value);
            let text_width = self.measure(&label, &value_text);
            let size = LayoutStyle::pt(label.size);
            self.text_at(
                gauge_x + (diameter - text_width) / 2,
                gauge_y + (diameter - size) / 2,
                &label,
                &value_text,
            );
        }

        // Text column.
        let text_x = frame.x + padding + column + padding;
        let text_width = frame.right() - padding - text_x;

        let badge_h = LayoutStyle::pt(style.badge_height);
        let badge_y = frame.y + padding;
        let badge_label = TextStyle {
            font: BOLD_FONT,
            size: style.small_size + 1.0,
            color: palette::INK,
        };
        let name = self.labels.metric(metric);
        let icon_size = LayoutStyle::pt(style.badge_icon_size);
        let pad = LayoutStyle::pt(PILL_PADDING);
        let icon_space = if icon.is_some() { icon_size + pad / 2 } else { Pt::ZERO };
        let badge_w = pad + icon_space + self.measure(&badge_label, name) + pad;
        self.canvas.meta("element", format!("metric.{key}.badge"));
        self.canvas.set_fill_color(palette::BADGE);
        self.pill(Rect::new(text_x, badge_y, badge_w, badge_h));
        self.canvas.fill();
        if let Some(icon) = icon {
            self.canvas
                .register_image(icon.resource_id.clone(), icon.bytes.clone());
            self.canvas.meta("element", format!("metric.{key}.icon"));
            self.canvas.draw_image(
                text_x + pad,
                badge_y + (badge_h - icon_size) / 2,
                icon_size,
                icon_size,
                icon.resource_id.clone(),
            );
        }
        self.canvas.meta("element", format!("metric.{key}.label"));
        self.text_at(
            text_x + pad + icon_space,
            badge_y + (badge_h - LayoutStyle::pt(badge_label.size)) / 2,
            &badge_label,
            name,
        );

        let dot_r = LayoutStyle::pt(style.status_dot_radius);
        let status = TextStyle {
            font: BOLD_FONT,
            size: style.small_size + 1.0,
            color: band.color(),
        };
        let status_size = LayoutStyle::pt(status.size);
        let status_y = frame.bottom() - padding - status_size;
        self.canvas.meta("element", format!("metric.{key}.status"));
        self.canvas.set_fill_color(band.color());
        self.circle(text_x + dot_r, status_y + status_size / 2, dot_r);
        self.canvas.fill();
        self.text_at(
            text_x + dot_r * 2 + LayoutStyle::pt(4.0),
            status_y,
            &status,
            self.labels.verdict(band),
        );

        let explanation = TextStyle {
            font: BODY_FONT,
            size: style.small_size + 1.0,
            color: palette::MUTED,
        };
        let lines = wrap_text(
            self.fonts,
            explanation.font,
            LayoutStyle::pt(explanation.size),
            &self.labels.explanation(metric, band),
            text_width,
        );
        let block = style.line_height(explanation.size) * lines.len() as i32;
        let gap_top = badge_y + badge_h;
        let middle = gap_top + (status_y - gap_top) / 2;
        self.lines_at(
            LayoutCursor::new(cursor.page, middle - block / 2),
            text_x,
            &explanation,
            &lines,
        );

        self.canvas.save_state();
        self.canvas.set_stroke_color(palette::BORDER);
        self.canvas
            .set_line_width(LayoutStyle::pt(style.card_border_width));
        self.rounded_rect(frame, LayoutStyle::pt(style.card_radius));
        self.canvas.stroke();
        self.canvas.restore_state();

        Ok(Placed::between(cursor, cursor.advance(frame.height)))
    }

    pub fn bar_row(
        &mut self,
        cursor: LayoutCursor,
        x: Pt,
        width: Pt,
        metric: Metric,
        value: f64,
    ) -> SignSenseResult<Placed> {
        let style = self.style;
        let row_h = LayoutStyle::pt(style.bar_row_height);
        let label = self.body_text();
        let value_style = TextStyle {
            font: BOLD_FONT,
            ..label
        };
        let size = LayoutStyle::pt(label.size);
        let text_y = cursor.y + (row_h - size) / 2;
        let value_text = percent_label(value);
        let value_w = self.measure(&value_style, "100%");
        let label_w = LayoutStyle::pt(style.bar_label_width);
        let gap = LayoutStyle::pt(8.0);
        let bar_x = x + label_w;
        let bar_w = (width - label_w - value_w - gap).max(LayoutStyle::pt(4.0));
        let bar_h = LayoutStyle::pt(style.bar_height);

        self.text_at(x, text_y, &label, self.labels.metric(metric));
        let bar = chart::render_progress_bar(
            value,
            px(bar_w.to_f32(), style.raster_scale),
            px(style.bar_height, style.raster_scale),
            Band::classify(metric, value).color(),
        )?;
        let id = self.embed(&bar);
        self.canvas
            .meta("element", format!("metric.{}.bar", metric.key()));
        self.canvas
            .draw_image(bar_x, cursor.y + (row_h - bar_h) / 2, bar_w, bar_h, id);
        let value_x = x + width - self.measure(&value_style, &value_text);
        self.text_at(value_x, text_y, &value_style, &value_text);

        Ok(Placed::between(cursor, cursor.advance(row_h)))
    }

    pub fn indicator(
        &mut self,
        cursor: LayoutCursor,
        x: Pt,
        width: Pt,
        metric: Metric,
        value: f64,
    ) -> SignSenseResult<Placed> {
        let style = self.style;
        let heading = TextStyle {
            font: self.display_font(),
            size: style.heading_size,
            color: palette::INK,
        };
        let value_text = percent_label(value);
        let value_w = self.measure(&heading, &value_text);
        self.text_at(x, cursor.y, &heading, self.labels.metric(metric));
        self.text_at(x + width - value_w, cursor.y, &heading, &value_text);
        let mut y = cursor.y + style.line_height(style.heading_size);

        let overhang_px = chart::tick_overhang_px(style.raster_scale);
        let bar = chart::render_indicator_bar(
            px(width.to_f32(), style.raster_scale),
            px(style.indicator_height, style.raster_scale),
            chart::clamp_percentage(value) / 100.0,
            overhang_px,
        )?;
        let image_h = LayoutStyle::pt(style.indicator_height + 2.0 * overhang_px as f32 / style.raster_scale);
        let id = self.embed(&bar);
        self.canvas
            .meta("element", format!("metric.{}.indicator", metric.key()));
        self.canvas.draw_image(x, y, width, image_h, id);
        y += image_h + LayoutStyle::pt(style.item_spacing);

        let scale = TextStyle {
            font: BODY_FONT,
            size: style.small_size,
            color: palette::MUTED,
        };
        let [low, mid, high] = self.labels.overall_scale;
        let mid_w = self.measure(&scale, mid);
        let high_w = self.measure(&scale, high);
        self.text_at(x, y, &scale, low);
        self.text_at(x + (width - mid_w) / 2, y, &scale, mid);
        self.text_at(x + width - high_w, y, &scale, high);
        y += style.line_height(style.small_size);

        Ok(Placed::between(cursor, LayoutCursor::new(cursor.page, y)))
    }

    /// Footer pinned to the page bottom: page pill, disclaimer, branding pill and, on the
    /// last page, the copyright pill. Independent of the content cursor.
    pub fn footer(&mut self, page_number: usize, page_count: usize) {
        let style = self.style;
        let (x, width) = self.content_column();
        let top = self.footer_top();
        let pill_h = LayoutStyle::pt(style.pill_height);
        let pad = LayoutStyle::pt(PILL_PADDING);
        let row_y = top + LayoutStyle::pt(8.0);

        self.canvas.meta("section", "footer");
        self.canvas.save_state();
        self.canvas.set_stroke_color(palette::BORDER);
        self.canvas
            .set_line_width(LayoutStyle::pt(style.card_border_width));
        self.canvas.move_to(x, top);
        self.canvas.line_to(x + width, top);
        self.canvas.stroke();
        self.canvas.restore_state();

        let pill_text = TextStyle {
            font: BOLD_FONT,
            size: style.small_size,
            color: palette::BRAND,
        };
        let page_label = self.labels.page_label(page_number, page_count);
        self.canvas.meta("element", "footer.page");
        let page_w = self.text_pill(x, row_y, &pill_text, palette::BRAND_LIGHT, &page_label);

        let brand_text = TextStyle {
            color: Color::WHITE,
            ..pill_text
        };
        let brand_w = self.measure(&brand_text, self.labels.brand) + pad * 2;
        self.canvas.meta("element", "footer.brand");
        self.text_pill(
            x + width - brand_w,
            row_y,
            &brand_text,
            palette::BRAND,
            self.labels.brand,
        );

        let disclaimer = TextStyle {
            font: BODY_FONT,
            size: style.small_size,
            color: palette::MUTED,
        };
        let gap = LayoutStyle::pt(10.0);
        let disclaimer_x = x + page_w + gap;
        let disclaimer_w = width - page_w - brand_w - gap * 2;
        let lines = wrap_text(
            self.fonts,
            disclaimer.font,
            LayoutStyle::pt(disclaimer.size),
            self.labels.disclaimer,
            disclaimer_w,
        );
        self.canvas.meta("element", "footer.disclaimer");
        self.lines_at(
            LayoutCursor::new(page_number.saturating_sub(1), row_y),
            disclaimer_x,
            &disclaimer,
            &lines,
        );

        if page_number == page_count {
            let copyright = TextStyle {
                font: BODY_FONT,
                color: palette::MUTED,
                ..pill_text
            };
            let copy_w = self.measure(&copyright, self.labels.copyright) + pad * 2;
            self.canvas.meta("element", "footer.copyright");
            self.text_pill(
                x + (width - copy_w) / 2,
                row_y + pill_h + LayoutStyle::pt(6.0),
                &copyright,
                palette::BADGE,
                self.labels.copyright,
            );
        }
    }

    fn text_pill(&mut self, x: Pt, y: Pt, text: &TextStyle<'_>, fill: Color, value: &str) -> Pt {
        let pad = LayoutStyle::pt(PILL_PADDING);
        let height = LayoutStyle::pt(self.style.pill_height);
        let width = self.measure(text, value) + pad * 2;
        self.canvas.set_fill_color(fill);
        self.pill(Rect::new(x, y, width, height));
        self.canvas.fill();
        self.text_at(x + pad, y + (height - LayoutStyle::pt(text.size)) / 2, text, value);
        width
    }

    fn pill(&mut self, rect: Rect) {
        self.rounded_rect(rect, rect.height / 2);
    }

    fn rounded_rect(&mut self, rect: Rect, radius: Pt) {
        let (x, y, w, h) = (
            rect.x.to_f32(),
            rect.y.to_f32(),
            rect.width.to_f32(),
            rect.height.to_f32(),
        );
        let r = radius.to_f32().min(w / 2.0).min(h / 2.0).max(0.0);
        let k = r * KAPPA;
        let p = Pt::from_f32;
        let c = &mut *self.canvas;
        c.move_to(p(x + r), p(y));
        c.line_to(p(x + w - r), p(y));
        c.curve_to(p(x + w - r + k), p(y), p(x + w), p(y + r - k), p(x + w), p(y + r));
        c.line_to(p(x + w), p(y + h - r));
        c.curve_to(
            p(x + w),
            p(y + h - r + k),
            p(x + w - r + k),
            p(y + h),
            p(x + w - r),
            p(y + h),
        );
        c.line_to(p(x + r), p(y + h));
        c.curve_to(p(x + r - k), p(y + h), p(x), p(y + h - r + k), p(x), p(y + h - r));
        c.line_to(p(x), p(y + r));
        c.curve_to(p(x), p(y + r - k), p(x + r - k), p(y), p(x + r), p(y));
        c.close_path();
    }

    fn circle(&mut self, cx: Pt, cy: Pt, radius: Pt) {
        let d = radius * 2;
        self.rounded_rect(Rect::new(cx - radius, cy - radius, d, d), radius);
    }
}
