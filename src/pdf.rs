use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, Stream, StringFormat, dictionary};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::canvas::{Command, Document, Page};
use crate::error::{SignSenseError, SignSenseResult};
use crate::font::{BODY_FONT, BOLD_FONT, EmbeddedFont, FontRegistry, encode_winansi};
use crate::metrics::{PageMetrics, RenderMetrics};
use crate::types::{Color, Pt};

const PDF_VERSION: &str = "1.7";

#[derive(Debug, Clone)]
pub struct PdfOptions {
    /// Flate-compress content streams. Image and font streams are always compressed.
    pub compress: bool,
    pub title: Option<String>,
    pub producer: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            compress: true,
            title: None,
            producer: concat!("signsense ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

struct FontResource {
    resource: String,
    object_id: ObjectId,
}

struct ImageResource {
    resource: String,
    object_id: ObjectId,
}

pub fn document_to_pdf(
    document: &Document,
    fonts: &FontRegistry,
    options: &PdfOptions,
) -> SignSenseResult<Vec<u8>> {
    document_to_pdf_with_metrics(document, fonts, options).map(|(bytes, _)| bytes)
}

#[tracing::instrument(skip_all, fields(pages = document.pages.len(), images = document.images.len()))]
pub fn document_to_pdf_with_metrics(
    document: &Document,
    fonts: &FontRegistry,
    options: &PdfOptions,
) -> SignSenseResult<(Vec<u8>, RenderMetrics)> {
    let started = Instant::now();
    let mut doc = LoDocument::with_version(PDF_VERSION);
    let pages_id = doc.new_object_id();

    let font_map = build_font_objects(&mut doc, document, fonts)?;
    let image_map = build_image_objects(&mut doc, document)?;

    let page_height = document.page_size.height;
    let media_box: Vec<Object> = vec![
        0.into(),
        0.into(),
        document.page_size.width.to_f32().into(),
        page_height.to_f32().into(),
    ];

    let mut kids = Vec::with_capacity(document.pages.len());
    let mut metrics = RenderMetrics::default();
    for (index, page) in document.pages.iter().enumerate() {
        let page_started = Instant::now();
        let content = render_page(page, page_height, &font_map, &image_map);
        let encoded = content
            .encode()
            .map_err(|err| SignSenseError::render(format!("content stream encode failed: {err}")))?;
        let content_bytes = encoded.len();
        let mut stream = Stream::new(dictionary! {}, encoded);
        if options.compress {
            let _ = stream.compress();
        }
        let content_id = doc.add_object(stream);

        let mut font_resources = Dictionary::new();
        for font in font_map.values() {
            font_resources.set(font.resource.as_bytes(), font.object_id);
        }
        let mut xobjects = Dictionary::new();
        for image in page_images(page, &image_map) {
            xobjects.set(image.resource.as_bytes(), image.object_id);
        }
        let resources = dictionary! {
            "Font" => font_resources,
            "XObject" => xobjects,
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(Object::Reference(page_id));

        metrics.pages.push(PageMetrics::from_page(
            index + 1,
            page,
            content_bytes,
            page_started.elapsed().as_secs_f64() * 1000.0,
        ));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => pdf_string(&options.producer),
    };
    if let Some(title) = options.title.as_deref() {
        info.set("Title", pdf_string(title));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| SignSenseError::render(format!("pdf serialization failed: {err}")))?;

    metrics.total_bytes = out.len();
    metrics.image_count = document.images.len();
    metrics.total_render_ms = started.elapsed().as_secs_f64() * 1000.0;
    tracing::debug!(bytes = out.len(), "pdf serialized");
    Ok((out, metrics))
}

// Info strings: plain ASCII as is, anything else as UTF-16BE with a byte order mark.
fn pdf_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn used_font_names(document: &Document) -> Vec<String> {
    let mut names = vec![BODY_FONT.to_string()];
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::SetFontName(name) = cmd {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
    }
    names
}

fn build_font_objects(
    doc: &mut LoDocument,
    document: &Document,
    fonts: &FontRegistry,
) -> SignSenseResult<BTreeMap<String, FontResource>> {
    let mut map = BTreeMap::new();
    for (index, name) in used_font_names(document).into_iter().enumerate() {
        let object_id = match fonts.display().filter(|font| font.name() == name) {
            Some(font) => build_truetype_font_objects(doc, font)?,
            None => {
                let base = if name == BOLD_FONT { BOLD_FONT } else { BODY_FONT };
                if name != base {
                    tracing::warn!(font = name.as_str(), "unknown font; using {base}");
                }
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => base,
                    "Encoding" => "WinAnsiEncoding",
                })
            }
        };
        map.insert(
            name,
            FontResource {
                resource: format!("F{}", index + 1),
                object_id,
            },
        );
    }
    Ok(map)
}

fn build_truetype_font_objects(
    doc: &mut LoDocument,
    font: &EmbeddedFont,
) -> SignSenseResult<ObjectId> {
    let metrics = &font.metrics;
    let mut file = Stream::new(
        dictionary! { "Length1" => font.data.len() as i64 },
        font.data.to_vec(),
    );
    let _ = file.compress();
    let file_id = doc.add_object(file);

    let (x_min, y_min, x_max, y_max) = metrics.bbox;
    let mut flags: i64 = 1 << 5;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(font.name().as_bytes().to_vec()),
        "Flags" => flags,
        "FontBBox" => vec![
            (x_min as i64).into(),
            (y_min as i64).into(),
            (x_max as i64).into(),
            (y_max as i64).into(),
        ],
        "ItalicAngle" => metrics.italic_angle as i64,
        "Ascent" => metrics.ascent as i64,
        "Descent" => metrics.descent as i64,
        "CapHeight" => metrics.cap_height as i64,
        "StemV" => 80,
        "MissingWidth" => metrics.missing_width as i64,
        "FontFile2" => file_id,
    });

    let widths: Vec<Object> = metrics
        .widths
        .iter()
        .map(|w| Object::Integer(*w as i64))
        .collect();
    Ok(doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => Object::Name(font.name().as_bytes().to_vec()),
        "FirstChar" => font.first_char() as i64,
        "LastChar" => font.last_char() as i64,
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
        "Encoding" => "WinAnsiEncoding",
    }))
}

fn build_image_objects(
    doc: &mut LoDocument,
    document: &Document,
) -> SignSenseResult<BTreeMap<String, ImageResource>> {
    let mut map = BTreeMap::new();
    for (index, (resource_id, bytes)) in document.images.iter().enumerate() {
        let object_id = match image_object(doc, bytes) {
            Ok(id) => id,
            Err(err) => {
                // Referenced images that cannot be decoded are dropped from the page.
                tracing::warn!(resource = resource_id.as_str(), error = %err, "skipping image");
                continue;
            }
        };
        map.insert(
            resource_id.clone(),
            ImageResource {
                resource: format!("Im{}", index + 1),
                object_id,
            },
        );
    }
    Ok(map)
}

fn image_object(doc: &mut LoDocument, bytes: &[u8]) -> SignSenseResult<ObjectId> {
    let format = image::guess_format(bytes).ok();
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| SignSenseError::render(format!("image decode failed: {err}")))?;
    let (width, height) = (decoded.width() as i64, decoded.height() as i64);

    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "DeviceGray",
            _ => "DeviceRGB",
        };
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes.to_vec(),
        )
        .with_compression(false);
        return Ok(doc.add_object(stream));
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if alpha.iter().any(|a| *a != 255) {
        let mut mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        );
        let _ = mask.compress();
        let mask_id = doc.add_object(mask);
        dict.set("SMask", mask_id);
    }
    let mut stream = Stream::new(dict, rgb);
    let _ = stream.compress();
    Ok(doc.add_object(stream))
}

fn page_images<'m>(
    page: &Page,
    image_map: &'m BTreeMap<String, ImageResource>,
) -> Vec<&'m ImageResource> {
    let mut used: Vec<&ImageResource> = Vec::new();
    for cmd in &page.commands {
        if let Command::DrawImage { resource_id, .. } = cmd {
            if let Some(image) = image_map.get(resource_id) {
                if !used.iter().any(|u| u.object_id == image.object_id) {
                    used.push(image);
                }
            }
        }
    }
    used
}

fn num(value: Pt) -> Object {
    value.to_f32().into()
}

fn color_operands(color: Color) -> Vec<Object> {
    vec![color.r.into(), color.g.into(), color.b.into()]
}

/// Translates page commands into PDF operators, flipping y into bottom-left space.
fn render_page(
    page: &Page,
    page_height: Pt,
    font_map: &BTreeMap<String, FontResource>,
    image_map: &BTreeMap<String, ImageResource>,
) -> Content {
    let mut ops = Vec::new();
    let mut font_name = BODY_FONT.to_string();
    let mut font_size = Pt::from_f32(12.0);
    // Font selection is emitted per string, so it has to unwind with q/Q like the canvas does.
    let mut saved_fonts: Vec<(String, Pt)> = Vec::new();
    let flip = |y: Pt| num(page_height - y);

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                saved_fonts.push((font_name.clone(), font_size));
                ops.push(Operation::new("q", vec![]));
            }
            Command::RestoreState => {
                if let Some((name, size)) = saved_fonts.pop() {
                    font_name = name;
                    font_size = size;
                }
                ops.push(Operation::new("Q", vec![]));
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => ops.push(Operation::new("rg", color_operands(*color))),
            Command::SetStrokeColor(color) => {
                ops.push(Operation::new("RG", color_operands(*color)))
            }
            Command::SetLineWidth(width) => ops.push(Operation::new("w", vec![num(*width)])),
            Command::SetFontName(name) => font_name = name.clone(),
            Command::SetFontSize(size) => font_size = *size,
            Command::MoveTo { x, y } => ops.push(Operation::new("m", vec![num(*x), flip(*y)])),
            Command::LineTo { x, y } => ops.push(Operation::new("l", vec![num(*x), flip(*y)])),
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => ops.push(Operation::new(
                "c",
                vec![num(*x1), flip(*y1), num(*x2), flip(*y2), num(*x), flip(*y)],
            )),
            Command::ClosePath => ops.push(Operation::new("h", vec![])),
            Command::Fill => ops.push(Operation::new("f", vec![])),
            Command::Stroke => ops.push(Operation::new("S", vec![])),
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => ops.push(Operation::new(
                "re",
                vec![num(*x), flip(*y + *height), num(*width), num(*height)],
            )),
            Command::DrawString { x, y, text } => {
                let resource = font_map
                    .get(&font_name)
                    .or_else(|| font_map.get(BODY_FONT))
                    .map(|font| font.resource.clone())
                    .unwrap_or_else(|| "F1".to_string());
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(resource.into_bytes()), num(font_size)],
                ));
                ops.push(Operation::new("Td", vec![num(*x), flip(*y + font_size)]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_winansi(text), StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let Some(image) = image_map.get(resource_id) else {
                    continue;
                };
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        num(*width),
                        0.into(),
                        0.into(),
                        num(*height),
                        num(*x),
                        flip(*y + *height),
                    ],
                ));
                ops.push(Operation::new(
                    "Do",
                    vec![Object::Name(image.resource.clone().into_bytes())],
                ));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    Content { operations: ops }
}
