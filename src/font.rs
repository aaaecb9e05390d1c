use std::sync::Arc;

use crate::error::{SignSenseError, SignSenseResult};
use crate::types::Pt;

pub const BODY_FONT: &str = "Helvetica";
pub const BOLD_FONT: &str = "Helvetica-Bold";

const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

// Advance widths (1/1000 em) for U+0020..U+007E, from the standard Helvetica AFM files.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[derive(Debug)]
pub struct EmbeddedFont {
    pub(crate) name: String,
    pub(crate) data: Arc<Vec<u8>>,
    pub(crate) metrics: FontMetrics,
}

#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    /// Widths for WinAnsi codes FIRST_CHAR..=LAST_CHAR, in 1/1000 em.
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

impl EmbeddedFont {
    pub fn from_bytes(data: Vec<u8>, source: &str) -> SignSenseResult<Self> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|err| {
            SignSenseError::asset_load(source, format!("invalid font data: {err}"))
        })?;
        let name = font_name(&face).unwrap_or_else(|| "SignSenseDisplay".to_string());
        let metrics = FontMetrics::from_face(&face);
        Ok(Self {
            name,
            data: Arc::new(data),
            metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, 0).ok()
    }

    pub(crate) fn first_char(&self) -> u8 {
        FIRST_CHAR
    }

    pub(crate) fn last_char(&self) -> u8 {
        LAST_CHAR
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let widths: Vec<u16> = (FIRST_CHAR..=LAST_CHAR)
            .map(|code| {
                winansi_char(code)
                    .and_then(|ch| face.glyph_index(ch))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|adv| (adv as f32 * scale).round().clamp(0.0, u16::MAX as f32) as u16)
                    .unwrap_or(0)
            })
            .collect();
        let missing_width = widths
            .get((b' ' - FIRST_CHAR) as usize)
            .copied()
            .unwrap_or(0);
        let ascent = scale_i16(face.ascender(), scale);
        let bbox = face.global_bounding_box();
        Self {
            widths,
            ascent,
            descent: scale_i16(face.descender(), scale),
            cap_height: face
                .capital_height()
                .map(|value| scale_i16(value, scale))
                .unwrap_or(ascent),
            italic_angle: face
                .italic_angle()
                .map(|value| value.round() as i16)
                .unwrap_or(0),
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
        }
    }

    fn width_of(&self, byte: u8) -> u16 {
        if byte < FIRST_CHAR {
            return self.missing_width;
        }
        match self.widths.get((byte - FIRST_CHAR) as usize) {
            Some(0) | None => self.missing_width,
            Some(width) => *width,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct FontRegistry {
    display: Option<Arc<EmbeddedFont>>,
}

impl FontRegistry {
    pub fn new(display: Option<Arc<EmbeddedFont>>) -> Self {
        Self { display }
    }

    pub fn display(&self) -> Option<&Arc<EmbeddedFont>> {
        self.display.as_ref()
    }

    pub fn display_font_name(&self) -> &str {
        self.display
            .as_deref()
            .map(EmbeddedFont::name)
            .unwrap_or(BOLD_FONT)
    }

    pub fn measure_text_width(&self, font_name: &str, font_size: Pt, text: &str) -> Pt {
        let units: u64 = if let Some(font) = self
            .display
            .as_deref()
            .filter(|font| font.name == font_name)
        {
            text.chars()
                .map(|ch| font.metrics.width_of(winansi_byte(ch).unwrap_or(b'?')) as u64)
                .sum()
        } else {
            let table = if font_name == BOLD_FONT {
                &HELVETICA_BOLD_WIDTHS
            } else {
                &HELVETICA_WIDTHS
            };
            text.chars().map(|ch| base14_width(table, ch) as u64).sum()
        };
        Pt::from_f32(font_size.to_f32() * units as f32 / 1000.0)
    }
}

fn base14_width(table: &[u16; 95], ch: char) -> u16 {
    let code = ch as u32;
    if (0x20..=0x7E).contains(&code) {
        return table[(code - 0x20) as usize];
    }
    match ch {
        '\u{2022}' => 350,
        '\u{2014}' => 1000,
        '\u{2013}' => 556,
        '\u{a9}' => 737,
        _ => 556,
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn font_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    let raw = face
        .names()
        .into_iter()
        .filter(|name| {
            name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME
                || name.name_id == ttf_parser::name_id::FULL_NAME
        })
        .find_map(|name| name.to_string())?;
    let cleaned: String = raw
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

// cp1252 codes 0x80..=0x9F that differ from Latin-1.
const WINANSI_EXTENSIONS: [(char, u8); 27] = [
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

pub(crate) fn winansi_byte(ch: char) -> Option<u8> {
    match ch {
        '\u{0000}'..='\u{007F}' | '\u{00A0}'..='\u{00FF}' => Some(ch as u32 as u8),
        _ => WINANSI_EXTENSIONS
            .iter()
            .find(|(c, _)| *c == ch)
            .map(|(_, byte)| *byte),
    }
}

pub(crate) fn winansi_char(byte: u8) -> Option<char> {
    match byte {
        0x00..=0x7F | 0xA0..=0xFF => Some(byte as char),
        _ => WINANSI_EXTENSIONS
            .iter()
            .find(|(_, b)| *b == byte)
            .map(|(ch, _)| *ch),
    }
}

/// Encodes text for a WinAnsi simple font. Unmappable characters become `?`.
pub(crate) fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| winansi_byte(ch).unwrap_or(b'?'))
        .collect()
}
