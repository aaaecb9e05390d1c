use sha2::{Digest, Sha256};
use std::sync::Arc;
use tiny_skia::{
    Color as SkColor, FillRule, GradientStop, LinearGradient, Mask, Paint, Path, PathBuilder,
    Pixmap, Point, Rect as SkRect, SpreadMode, Transform,
};
use ttf_parser::OutlineBuilder;

use crate::error::{SignSenseError, SignSenseResult};
use crate::font::EmbeddedFont;
use crate::style::palette;
use crate::types::Color;

/// Fill spans at least this share of the inner track: draw the full pill.
const FULL_FILL_RATIO: f32 = 0.99;
/// Fill wider than this many corner radii keeps a rounded right edge.
const ROUNDED_FILL_RADII: f32 = 1.8;
const TICK_OVERHANG: f32 = 2.0;

const GRADIENT_RED: Color = Color::rgb8(0xEF, 0x44, 0x44);
const GRADIENT_YELLOW: Color = Color::rgb8(0xFA, 0xCC, 0x15);
const GRADIENT_GREEN: Color = Color::rgb8(0x22, 0xC5, 0x5E);

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAsset {
    pub width_px: u32,
    pub height_px: u32,
    pub png: Arc<Vec<u8>>,
    pub label_drawn: bool,
}

impl RenderedAsset {
    fn encode(pixmap: &Pixmap, label_drawn: bool) -> SignSenseResult<Self> {
        let png = pixmap
            .encode_png()
            .map_err(|err| SignSenseError::render(format!("png encode failed: {err}")))?;
        Ok(Self {
            width_px: pixmap.width(),
            height_px: pixmap.height(),
            png: Arc::new(png),
            label_drawn,
        })
    }

    /// Content-addressed resource id; identical charts share one PDF image object.
    pub fn resource_id(&self) -> String {
        let digest = Sha256::digest(self.png.as_slice());
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        format!("chart:{hex}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillShape {
    Empty,
    FullPill { width: f32 },
    RoundedBoth { width: f32 },
    FlatRight { width: f32 },
}

/// Chooses the fill outline. The radius comparison keeps narrow fills from producing
/// corners wider than the fill itself.
pub fn fill_shape(inner_width: f32, radius: f32, percentage: f64) -> FillShape {
    let fraction = clamp_percentage(percentage) as f32 / 100.0;
    let fill_width = inner_width * fraction;
    if fill_width <= 0.0 {
        FillShape::Empty
    } else if fill_width >= inner_width * FULL_FILL_RATIO {
        FillShape::FullPill { width: inner_width }
    } else if fill_width > radius * ROUNDED_FILL_RADII {
        FillShape::RoundedBoth { width: fill_width }
    } else {
        FillShape::FlatRight { width: fill_width }
    }
}

pub fn clamp_percentage(percentage: f64) -> f64 {
    if percentage.is_nan() {
        return 0.0;
    }
    percentage.clamp(0.0, 100.0)
}

/// Draws a donut gauge: grey track, arc from 12 o'clock clockwise, white center and
/// the rounded percentage. The label needs glyph outlines, so it is only rastered when
/// a display font is available; otherwise `label_drawn` is false and the caller
/// overlays it as text.
pub fn render_gauge(
    percentage: f64,
    color: Color,
    diameter_px: u32,
    font: Option<&EmbeddedFont>,
) -> SignSenseResult<RenderedAsset> {
    let pixmap = gauge_pixmap(percentage, color, diameter_px, font)?;
    let label_drawn = font.is_some_and(|f| f.face().is_some());
    RenderedAsset::encode(&pixmap, label_drawn)
}

pub(crate) fn gauge_pixmap(
    percentage: f64,
    color: Color,
    diameter_px: u32,
    font: Option<&EmbeddedFont>,
) -> SignSenseResult<Pixmap> {
    let percentage = clamp_percentage(percentage);
    let size = diameter_px.max(8);
    let mut pixmap = new_pixmap(size, size)?;
    let center = size as f32 / 2.0;
    let outer = center;
    let inner = outer * 0.72;

    let track = PathBuilder::from_circle(center, center, outer)
        .ok_or_else(|| SignSenseError::render("gauge track path"))?;
    pixmap.fill_path(
        &track,
        &solid_paint(palette::TRACK),
        FillRule::Winding,
        Transform::identity(),
        None,
    );

    let sweep = (percentage / 100.0) as f32 * std::f32::consts::TAU;
    if sweep > 0.0 {
        let wedge = if percentage >= 100.0 {
            PathBuilder::from_circle(center, center, outer)
        } else {
            wedge_path(center, center, outer, sweep)
        };
        if let Some(wedge) = wedge {
            pixmap.fill_path(
                &wedge,
                &solid_paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    let mask = PathBuilder::from_circle(center, center, inner)
        .ok_or_else(|| SignSenseError::render("gauge center path"))?;
    pixmap.fill_path(
        &mask,
        &solid_paint(Color::WHITE),
        FillRule::Winding,
        Transform::identity(),
        None,
    );

    if let Some(font) = font {
        let label = format!("{}%", percentage.round() as i32);
        let font_px = inner * 0.62;
        if let Some((path, _width)) = text_path(font, &label, font_px, center, center) {
            pixmap.fill_path(
                &path,
                &solid_paint(palette::INK),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    Ok(pixmap)
}

// Pie slice from 12 o'clock, clockwise in raster space (y grows down).
fn wedge_path(cx: f32, cy: f32, radius: f32, sweep: f32) -> Option<Path> {
    let start = -std::f32::consts::FRAC_PI_2;
    let steps = ((sweep.to_degrees()).ceil() as usize).max(2);
    let mut pb = PathBuilder::new();
    pb.move_to(cx, cy);
    for step in 0..=steps {
        let angle = start + sweep * step as f32 / steps as f32;
        pb.line_to(cx + radius * libm::cosf(angle), cy + radius * libm::sinf(angle));
    }
    pb.close();
    pb.finish()
}

pub fn render_progress_bar(
    percentage: f64,
    width_px: u32,
    height_px: u32,
    fill_color: Color,
) -> SignSenseResult<RenderedAsset> {
    let pixmap = progress_bar_pixmap(percentage, width_px, height_px, fill_color)?;
    RenderedAsset::encode(&pixmap, false)
}

pub(crate) fn progress_bar_pixmap(
    percentage: f64,
    width_px: u32,
    height_px: u32,
    fill_color: Color,
) -> SignSenseResult<Pixmap> {
    let width = width_px.max(4);
    let height = height_px.max(4);
    let mut pixmap = new_pixmap(width, height)?;
    let (w, h) = (width as f32, height as f32);

    let track = pill_path(0.0, 0.0, w, h).ok_or_else(|| SignSenseError::render("track path"))?;
    pixmap.fill_path(
        &track,
        &solid_paint(Color::BLACK),
        FillRule::Winding,
        Transform::identity(),
        None,
    );

    let inset = (h * 0.18).max(1.0);
    let inner_x = inset;
    let inner_y = inset;
    let inner_w = w - 2.0 * inset;
    let inner_h = h - 2.0 * inset;
    let radius = inner_h / 2.0;
    let paint = solid_paint(fill_color);

    match fill_shape(inner_w, radius, percentage) {
        FillShape::Empty => {}
        FillShape::FullPill { width } | FillShape::RoundedBoth { width } => {
            if let Some(path) = pill_path(inner_x, inner_y, width, inner_h) {
                pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
            }
        }
        FillShape::FlatRight { width } => {
            // Draw a pill at least one diameter wide and clip it flat at the fill width.
            let shape_w = width.max(inner_h);
            let clip_rect = SkRect::from_xywh(inner_x, 0.0, width, h);
            if let (Some(path), Some(clip_rect)) =
                (pill_path(inner_x, inner_y, shape_w, inner_h), clip_rect)
            {
                let mut clip = Mask::new(width_px.max(4), height_px.max(4))
                    .ok_or_else(|| SignSenseError::render("progress clip mask"))?;
                clip.fill_path(
                    &PathBuilder::from_rect(clip_rect),
                    FillRule::Winding,
                    false,
                    Transform::identity(),
                );
                pixmap.fill_path(
                    &path,
                    &paint,
                    FillRule::Winding,
                    Transform::identity(),
                    Some(&clip),
                );
            }
        }
    }

    Ok(pixmap)
}

pub fn render_indicator_bar(
    width_px: u32,
    height_px: u32,
    indicator_position: f64,
    overhang_px: u32,
) -> SignSenseResult<RenderedAsset> {
    let pixmap = indicator_bar_pixmap(width_px, height_px, indicator_position, overhang_px)?;
    RenderedAsset::encode(&pixmap, false)
}

pub fn tick_overhang_px(raster_scale: f32) -> u32 {
    (TICK_OVERHANG * raster_scale).round().max(1.0) as u32
}

pub(crate) fn indicator_bar_pixmap(
    width_px: u32,
    height_px: u32,
    indicator_position: f64,
    overhang_px: u32,
) -> SignSenseResult<Pixmap> {
    let width = width_px.max(4);
    let bar_height = height_px.max(2);
    let total_height = bar_height + 2 * overhang_px;
    let mut pixmap = new_pixmap(width, total_height)?;
    let (w, bar_h, top) = (width as f32, bar_height as f32, overhang_px as f32);

    let shader = LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(w, 0.0),
        vec![
            GradientStop::new(0.0, sk_color(GRADIENT_RED)),
            GradientStop::new(0.5, sk_color(GRADIENT_YELLOW)),
            GradientStop::new(1.0, sk_color(GRADIENT_GREEN)),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    )
    .ok_or_else(|| SignSenseError::render("indicator gradient"))?;
    let paint = Paint {
        shader,
        anti_alias: true,
        ..Paint::default()
    };
    let bar = pill_path(0.0, top, w, bar_h).ok_or_else(|| SignSenseError::render("bar path"))?;
    pixmap.fill_path(&bar, &paint, FillRule::Winding, Transform::identity(), None);

    let position = if indicator_position.is_nan() {
        0.0
    } else {
        indicator_position.clamp(0.0, 1.0) as f32
    };
    let tick_w = (overhang_px as f32).max(2.0).min(w);
    let tick_x = (position * w - tick_w / 2.0).clamp(0.0, w - tick_w);
    if let Some(tick) = SkRect::from_xywh(tick_x, 0.0, tick_w, total_height as f32) {
        pixmap.fill_rect(tick, &solid_paint(palette::INK), Transform::identity(), None);
    }

    Ok(pixmap)
}

fn new_pixmap(width: u32, height: u32) -> SignSenseResult<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| SignSenseError::render(format!("cannot allocate {width}x{height} pixmap")))
}

fn sk_color(color: Color) -> SkColor {
    let [r, g, b, a] = color.to_rgba8();
    SkColor::from_rgba8(r, g, b, a)
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(sk_color(color));
    paint.anti_alias = true;
    paint
}

pub(crate) fn pill_path(x: f32, y: f32, width: f32, height: f32) -> Option<Path> {
    let r = (height / 2.0).min(width / 2.0);
    // Cubic approximation constant for a quarter circle.
    let k = 0.552_284_8 * r;
    let (right, bottom) = (x + width, y + height);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.cubic_to(right - r + k, y, right, y + r - k, right, y + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.cubic_to(x + r - k, bottom, x, bottom - r + k, x, bottom - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    scale: f32,
    origin_x: f32,
    origin_y: f32,
}

// Font units are y-up; raster space is y-down.
impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder
            .move_to(self.origin_x + x * self.scale, self.origin_y - y * self.scale);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder
            .line_to(self.origin_x + x * self.scale, self.origin_y - y * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(
            self.origin_x + x1 * self.scale,
            self.origin_y - y1 * self.scale,
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(
            self.origin_x + x1 * self.scale,
            self.origin_y - y1 * self.scale,
            self.origin_x + x2 * self.scale,
            self.origin_y - y2 * self.scale,
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn text_path(
    font: &EmbeddedFont,
    text: &str,
    font_px: f32,
    cx: f32,
    cy: f32,
) -> Option<(Path, f32)> {
    let face = font.face()?;
    let scale = font_px / face.units_per_em().max(1) as f32;
    let advance: f32 = text
        .chars()
        .filter_map(|ch| face.glyph_index(ch))
        .filter_map(|gid| face.glyph_hor_advance(gid))
        .map(|adv| adv as f32 * scale)
        .sum();
    let cap = face
        .capital_height()
        .unwrap_or_else(|| face.ascender()) as f32
        * scale;

    let mut builder = GlyphPathBuilder {
        builder: PathBuilder::new(),
        scale,
        origin_x: cx - advance / 2.0,
        origin_y: cy + cap / 2.0,
    };
    for ch in text.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            continue;
        };
        let _ = face.outline_glyph(gid, &mut builder);
        builder.origin_x += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
    }
    builder.builder.finish().map(|path| (path, advance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Band;

    fn alpha_at(pixmap: &Pixmap, x: u32, y: u32) -> u8 {
        pixmap.pixel(x, y).map(|p| p.alpha()).unwrap_or(0)
    }

    fn rgb_at(pixmap: &Pixmap, x: u32, y: u32) -> (u8, u8, u8) {
        let p = pixmap.pixel(x, y).expect("pixel").demultiply();
        (p.red(), p.green(), p.blue())
    }

    #[test]
    fn gauge_clamps_out_of_range_percentages() {
        let red = Color::rgb8(0xEF, 0x44, 0x44);
        let below = render_gauge(-25.0, red, 60, None).expect("gauge");
        let zero = render_gauge(0.0, red, 60, None).expect("gauge");
        let above = render_gauge(250.0, red, 60, None).expect("gauge");
        let full = render_gauge(100.0, red, 60, None).expect("gauge");
        assert_eq!(below.png, zero.png);
        assert_eq!(above.png, full.png);
        assert!(render_gauge(f64::NAN, red, 60, None).is_ok());
    }

    #[test]
    fn gauge_arc_starts_at_twelve_and_runs_clockwise() {
        let color = Color::rgb8(0xEF, 0x44, 0x44);
        let pixmap = gauge_pixmap(25.0, color, 100, None).expect("gauge");
        // Ring sample points at radius ~43px.
        let right_of_top = rgb_at(&pixmap, 65, 12);
        let left_of_top = rgb_at(&pixmap, 35, 12);
        assert_eq!(right_of_top, (0xEF, 0x44, 0x44));
        assert_eq!(left_of_top, (0xE5, 0xE7, 0xEB));
        // Center is masked white.
        assert_eq!(rgb_at(&pixmap, 50, 50), (255, 255, 255));
    }

    #[test]
    fn gauge_without_font_leaves_label_to_caller() {
        let asset = render_gauge(55.0, Color::BLACK, 40, None).expect("gauge");
        assert!(!asset.label_drawn);
        assert_eq!((asset.width_px, asset.height_px), (40, 40));
    }

    #[test]
    fn fill_shape_boundaries() {
        // inner 200px, radius 5px.
        assert_eq!(fill_shape(200.0, 5.0, 0.0), FillShape::Empty);
        assert_eq!(fill_shape(200.0, 5.0, -3.0), FillShape::Empty);
        assert_eq!(
            fill_shape(200.0, 5.0, 99.0),
            FillShape::FullPill { width: 200.0 }
        );
        assert_eq!(
            fill_shape(200.0, 5.0, 140.0),
            FillShape::FullPill { width: 200.0 }
        );
        assert_eq!(
            fill_shape(200.0, 5.0, 50.0),
            FillShape::RoundedBoth { width: 100.0 }
        );
        // 2% of 200 = 4px, below 1.8 * radius.
        assert_eq!(fill_shape(200.0, 5.0, 2.0), FillShape::FlatRight { width: 4.0 });
        // 5% = 10px > 9px.
        assert_eq!(
            fill_shape(200.0, 5.0, 5.0),
            FillShape::RoundedBoth { width: 10.0 }
        );
    }

    #[test]
    fn tiny_progress_fill_has_flat_right_edge() {
        let green = Color::rgb8(0x22, 0xC5, 0x5E);
        let pixmap = progress_bar_pixmap(2.0, 600, 36, green).expect("bar");
        // inset = 6.48, inner 587.04 wide, fill ~11.74px, radius ~11.52.
        let mid = 18;
        // Inside the fill near its right edge the color is the fill color...
        assert_eq!(rgb_at(&pixmap, 16, mid), (0x22, 0xC5, 0x5E));
        // ...and immediately past the cut it is the black track, at full height.
        assert_eq!(rgb_at(&pixmap, 20, mid), (0, 0, 0));
        assert_eq!(rgb_at(&pixmap, 17, 9), (0x22, 0xC5, 0x5E));
    }

    #[test]
    fn full_progress_fill_is_rounded_on_both_ends() {
        let green = Color::rgb8(0x22, 0xC5, 0x5E);
        let pixmap = progress_bar_pixmap(100.0, 300, 30, green).expect("bar");
        // Far right corner of the inner area stays black (rounded), center-right is filled.
        assert_eq!(rgb_at(&pixmap, 290, 15), (0x22, 0xC5, 0x5E));
        assert_eq!(rgb_at(&pixmap, 294, 7), (0, 0, 0));
        // Track corner outside the pill is transparent.
        assert_eq!(alpha_at(&pixmap, 0, 0), 0);
    }

    #[test]
    fn progress_bar_clamps_like_gauge() {
        let c = Color::rgb8(0x22, 0xC5, 0x5E);
        assert_eq!(
            render_progress_bar(-10.0, 120, 12, c).expect("bar").png,
            render_progress_bar(0.0, 120, 12, c).expect("bar").png
        );
        assert_eq!(
            render_progress_bar(180.0, 120, 12, c).expect("bar").png,
            render_progress_bar(100.0, 120, 12, c).expect("bar").png
        );
    }

    #[test]
    fn indicator_tick_overhangs_bar() {
        let overhang = tick_overhang_px(3.0);
        assert_eq!(overhang, 6);
        let pixmap = indicator_bar_pixmap(300, 30, 0.5, overhang).expect("bar");
        assert_eq!(pixmap.height(), 42);
        // Tick occupies the overhang rows above and below the bar.
        assert_eq!(alpha_at(&pixmap, 150, 1), 255);
        assert_eq!(alpha_at(&pixmap, 150, 40), 255);
        // Away from the tick, the overhang rows are empty.
        assert_eq!(alpha_at(&pixmap, 100, 1), 0);
        // Gradient runs red to green.
        let (r_left, g_left, _) = rgb_at(&pixmap, 20, 21);
        let (r_right, g_right, _) = rgb_at(&pixmap, 280, 21);
        assert!(r_left > g_left);
        assert!(g_right > r_right);
    }

    #[test]
    fn indicator_position_is_clamped_inside_the_image() {
        let left = indicator_bar_pixmap(100, 10, -1.0, 2).expect("bar");
        let right = indicator_bar_pixmap(100, 10, 7.0, 2).expect("bar");
        assert_eq!(alpha_at(&left, 0, 0), 255);
        assert_eq!(alpha_at(&right, 99, 0), 255);
    }

    #[test]
    fn tick_wider_than_bar_stays_inside_the_image() {
        let asset = render_indicator_bar(4, 4, 0.5, 6).expect("narrow bar");
        assert_eq!(asset.width_px, 4);
        let pixmap = indicator_bar_pixmap(4, 4, 0.5, 6).expect("narrow bar");
        assert_eq!(alpha_at(&pixmap, 0, 0), 255);
        assert_eq!(alpha_at(&pixmap, 3, 0), 255);
    }

    #[test]
    fn identical_charts_share_resource_ids() {
        let fill = Band::Favorable.color();
        let a = render_progress_bar(40.0, 90, 10, fill).expect("bar");
        let b = render_progress_bar(40.0, 90, 10, fill).expect("bar");
        let c = render_progress_bar(41.0, 90, 10, fill).expect("bar");
        assert_eq!(a.resource_id(), b.resource_id());
        assert_ne!(a.resource_id(), c.resource_id());
        assert!(a.resource_id().starts_with("chart:"));
    }
}
