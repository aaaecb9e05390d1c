use base64::Engine;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{SignSenseError, SignSenseResult};
use crate::font::{EmbeddedFont, FontRegistry};
use crate::report::Metric;

/// Decorative assets for one engine: an icon per metric and an optional display font.
/// Sources are file paths or `data:` URIs. Resolved once per render session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    #[serde(default)]
    pub icons: BTreeMap<Metric, String>,
    #[serde(default)]
    pub display_font: Option<String>,
}

impl AssetManifest {
    pub fn from_json_str(raw: &str) -> SignSenseResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| SignSenseError::parse(format!("invalid asset manifest: {err}"), raw))
    }

    pub fn from_path(path: impl AsRef<Path>) -> SignSenseResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn with_icon(mut self, metric: Metric, source: impl Into<String>) -> Self {
        self.icons.insert(metric, source.into());
        self
    }

    pub fn with_display_font(mut self, source: impl Into<String>) -> Self {
        self.display_font = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Font,
    Image,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Font => "font",
            AssetKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconAsset {
    pub resource_id: String,
    pub bytes: Arc<Vec<u8>>,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub asset: String,
    pub kind: AssetKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Prefetched {
    pub icons: BTreeMap<Metric, IconAsset>,
    pub fonts: FontRegistry,
    pub degradations: Vec<Degradation>,
}

impl Prefetched {
    pub fn icon(&self, metric: Metric) -> Option<&IconAsset> {
        self.icons.get(&metric)
    }
}

enum Loaded {
    Icon(Metric, IconAsset),
    Font(EmbeddedFont),
}

struct Job<'a> {
    name: String,
    kind: AssetKind,
    metric: Option<Metric>,
    source: &'a str,
}

/// Resolves every manifest entry concurrently and waits for all of them.
///
/// Failures never abort: each becomes a `Degradation` and the asset is omitted
/// (icons) or replaced by Helvetica-Bold (display font).
#[tracing::instrument(skip_all, fields(icons = manifest.icons.len(), font = manifest.display_font.is_some()))]
pub fn prefetch(manifest: &AssetManifest) -> Prefetched {
    let mut jobs: Vec<Job<'_>> = manifest
        .icons
        .iter()
        .map(|(metric, source)| Job {
            name: format!("icon:{}", metric.key()),
            kind: AssetKind::Image,
            metric: Some(*metric),
            source: source.as_str(),
        })
        .collect();
    if let Some(source) = manifest.display_font.as_deref() {
        jobs.push(Job {
            name: "font:display".to_string(),
            kind: AssetKind::Font,
            metric: None,
            source,
        });
    }

    let results: Vec<(String, AssetKind, SignSenseResult<Loaded>)> = jobs
        .par_iter()
        .map(|job| (job.name.clone(), job.kind, load_job(job)))
        .collect();

    let mut prefetched = Prefetched::default();
    let mut display = None;
    for (name, kind, result) in results {
        match result {
            Ok(Loaded::Icon(metric, icon)) => {
                prefetched.icons.insert(metric, icon);
            }
            Ok(Loaded::Font(font)) => {
                tracing::debug!(font = font.name(), "display font loaded");
                display = Some(Arc::new(font));
            }
            Err(err) => {
                tracing::warn!(asset = name.as_str(), kind = kind.as_str(), error = %err, "asset unavailable; degrading");
                prefetched.degradations.push(Degradation {
                    asset: name,
                    kind,
                    message: err.to_string(),
                });
            }
        }
    }
    prefetched.fonts = FontRegistry::new(display);
    prefetched
}

fn load_job(job: &Job<'_>) -> SignSenseResult<Loaded> {
    let bytes = load_source(job.source).map_err(|err| match err {
        SignSenseError::Io(io) => SignSenseError::asset_load(&job.name, io.to_string()),
        other => other,
    })?;
    match (job.kind, job.metric) {
        (AssetKind::Image, Some(metric)) => {
            let decoded = image::load_from_memory(&bytes).map_err(|err| {
                SignSenseError::asset_load(&job.name, format!("undecodable image: {err}"))
            })?;
            Ok(Loaded::Icon(
                metric,
                IconAsset {
                    resource_id: job.name.clone(),
                    bytes: Arc::new(bytes),
                    width_px: decoded.width(),
                    height_px: decoded.height(),
                },
            ))
        }
        _ => EmbeddedFont::from_bytes(bytes, &job.name).map(Loaded::Font),
    }
}

pub fn load_source(source: &str) -> SignSenseResult<Vec<u8>> {
    if let Some(result) = parse_data_uri(source) {
        return result.map(|(_mime, data)| data);
    }
    Ok(std::fs::read(Path::new(source))?)
}

fn parse_data_uri(uri: &str) -> Option<SignSenseResult<(String, Vec<u8>)>> {
    let rest = uri.strip_prefix("data:")?;
    let Some((header, data_part)) = rest.split_once(',') else {
        return Some(Err(SignSenseError::asset_load(
            truncate_preview(uri, 32),
            "data uri has no payload separator",
        )));
    };
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.split(';').any(|part| part == "base64") {
        match base64::engine::general_purpose::STANDARD.decode(data_part.trim()) {
            Ok(data) => data,
            Err(err) => {
                return Some(Err(SignSenseError::asset_load(
                    truncate_preview(uri, 32),
                    format!("invalid base64: {err}"),
                )));
            }
        }
    } else {
        data_part.as_bytes().to_vec()
    };
    Some(Ok((mime, data)))
}

fn truncate_preview(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
        let mut pixmap = tiny_skia::Pixmap::new(width, height).expect("pixmap");
        pixmap.fill(tiny_skia::Color::from_rgba8(0x1E, 0x3A, 0x8A, 255));
        let png = pixmap.encode_png().expect("png");
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        )
    }

    #[test]
    fn data_uri_payloads_decode() {
        let (mime, data) = parse_data_uri("data:text/plain,hello")
            .expect("data uri")
            .expect("payload");
        assert_eq!(mime, "text/plain");
        assert_eq!(data, b"hello");
        assert!(parse_data_uri("/tmp/icon.png").is_none());
        assert!(matches!(
            parse_data_uri("data:image/png;base64,@@@"),
            Some(Err(SignSenseError::AssetLoad { .. }))
        ));
    }

    #[test]
    fn manifest_parses_metric_keys() {
        let manifest = AssetManifest::from_json_str(
            r#"{"icons":{"risk":"icons/risk.png","deadlinePressure":"icons/clock.png"}}"#,
        )
        .expect("manifest");
        assert_eq!(manifest.icons.len(), 2);
        assert_eq!(
            manifest.icons.get(&Metric::DeadlinePressure).map(String::as_str),
            Some("icons/clock.png")
        );
        assert!(manifest.display_font.is_none());
        assert!(AssetManifest::from_json_str(r#"{"icons":{"nope":"x"}}"#).is_err());
    }

    #[test]
    fn prefetch_loads_good_assets_and_records_failures() {
        let manifest = AssetManifest::default()
            .with_icon(Metric::Clarity, png_data_uri(8, 8))
            .with_icon(Metric::Risk, "/nonexistent/signsense/risk.png")
            .with_icon(Metric::Favorability, "data:image/png;base64,aGVsbG8=")
            .with_display_font("/nonexistent/signsense/display.ttf");
        let prefetched = prefetch(&manifest);

        let clarity = prefetched.icon(Metric::Clarity).expect("clarity icon");
        assert_eq!((clarity.width_px, clarity.height_px), (8, 8));
        assert_eq!(clarity.resource_id, "icon:clarity");
        assert!(prefetched.icon(Metric::Risk).is_none());
        assert!(prefetched.icon(Metric::Favorability).is_none());
        assert!(prefetched.fonts.display().is_none());

        let mut failed: Vec<&str> = prefetched
            .degradations
            .iter()
            .map(|d| d.asset.as_str())
            .collect();
        failed.sort();
        assert_eq!(failed, vec!["font:display", "icon:favorability", "icon:risk"]);
    }

    #[test]
    fn empty_manifest_prefetches_nothing() {
        let prefetched = prefetch(&AssetManifest::default());
        assert!(prefetched.icons.is_empty());
        assert!(prefetched.degradations.is_empty());
    }
}
