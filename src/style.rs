use crate::types::{Color, Pt};

/// Fixed table of margins, spacings, font sizes and box dimensions used by every
/// drawing routine. Values are in points unless noted.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutStyle {
    pub margin_x: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,

    pub header_height: f32,
    pub header_title_size: f32,
    pub header_subtitle_size: f32,

    pub title_size: f32,
    pub heading_size: f32,
    pub body_size: f32,
    pub small_size: f32,
    pub line_height_factor: f32,
    pub item_spacing: f32,
    pub section_gap: f32,

    pub card_padding: f32,
    pub card_radius: f32,
    pub card_border_width: f32,
    /// Width of the marker gutter in numbered and bulleted lists.
    pub list_gutter: f32,

    pub metric_card_height: f32,
    pub metric_card_gap: f32,
    pub chart_column_width: f32,
    pub gauge_diameter: f32,
    pub badge_height: f32,
    pub badge_icon_size: f32,
    pub status_dot_radius: f32,

    pub bar_row_height: f32,
    pub bar_height: f32,
    pub bar_label_width: f32,
    pub indicator_height: f32,

    pub footer_height: f32,
    pub pill_height: f32,

    /// Raster pixels per point for chart images.
    pub raster_scale: f32,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self {
            margin_x: 36.0,
            margin_top: 0.0,
            margin_bottom: 28.0,

            header_height: 64.0,
            header_title_size: 20.0,
            header_subtitle_size: 10.0,

            title_size: 18.0,
            heading_size: 13.0,
            body_size: 10.0,
            small_size: 7.5,
            line_height_factor: 1.4,
            item_spacing: 4.0,
            section_gap: 14.0,

            card_padding: 12.0,
            card_radius: 8.0,
            card_border_width: 0.8,
            list_gutter: 18.0,

            metric_card_height: 104.0,
            metric_card_gap: 12.0,
            chart_column_width: 96.0,
            gauge_diameter: 76.0,
            badge_height: 18.0,
            badge_icon_size: 12.0,
            status_dot_radius: 4.0,

            bar_row_height: 30.0,
            bar_height: 12.0,
            bar_label_width: 150.0,
            indicator_height: 14.0,

            footer_height: 46.0,
            pill_height: 16.0,

            raster_scale: 3.0,
        }
    }
}

impl LayoutStyle {
    pub fn pt(value: f32) -> Pt {
        Pt::from_f32(value)
    }

    pub fn line_height(&self, font_size: f32) -> Pt {
        Pt::from_f32(font_size * self.line_height_factor)
    }
}

pub mod palette {
    use super::Color;

    pub const BRAND: Color = Color::rgb8(0x1E, 0x3A, 0x8A);
    pub const BRAND_LIGHT: Color = Color::rgb8(0xDB, 0xEA, 0xFE);
    pub const INK: Color = Color::rgb8(0x11, 0x18, 0x27);
    pub const MUTED: Color = Color::rgb8(0x6B, 0x72, 0x80);
    pub const BORDER: Color = Color::rgb8(0xD1, 0xD5, 0xDB);
    pub const TRACK: Color = Color::rgb8(0xE5, 0xE7, 0xEB);
    pub const BADGE: Color = Color::rgb8(0xF3, 0xF4, 0xF6);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_text_column_has_room_on_a4() {
        let style = LayoutStyle::default();
        let content = 595.28 - 2.0 * style.margin_x;
        let card = (content - style.metric_card_gap) / 2.0;
        assert!(card - style.chart_column_width > 120.0);
        assert!(style.gauge_diameter < style.chart_column_width);
        assert!(style.gauge_diameter < style.metric_card_height);
    }

    #[test]
    fn line_height_scales_with_font_size() {
        let style = LayoutStyle::default();
        assert_eq!(style.line_height(10.0), Pt::from_f32(14.0));
    }
}
