//! Font availability probe
//!
//! Detects which of a fixed candidate catalog are installed by comparing
//! rendered text widths against three generic baseline families. A candidate
//! counts as available when its measured width differs from at least one
//! baseline's width; a font that happens to coincide with all three is an
//! accepted false negative of the heuristic.
//!
//! Detected fonts accumulate in catalog order (never sorted) because the
//! digest input is the comma-joined detected sequence and must be
//! reproducible byte for byte.

use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
use std::collections::BTreeMap;

#[cfg(target_arch = "wasm32")]
use async_trait::async_trait;

#[cfg(target_arch = "wasm32")]
use crate::error::Result;

#[cfg(target_arch = "wasm32")]
use super::{CapabilityProbe, ProbeId, ProbeResult};

/// Fixed test string, chosen for wide glyph coverage at minimal length.
pub const TEST_STRING: &str = "mmmmmmmmmmlli";

/// Fixed test size.
pub const TEST_FONT_SIZE: &str = "72px";

/// Baseline generic families a candidate is compared against.
pub const BASELINES: [&str; 3] = ["monospace", "serif", "sans-serif"];

/// Injected, ordered catalog of candidate font names.
///
/// Treated as configuration data rather than hidden module state so tests
/// can substitute a reduced catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontCatalog {
    pub names: Vec<String>,
}

impl FontCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FontCatalog {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for FontCatalog {
    /// ~70 candidates spanning the common Windows, macOS and Linux sets.
    fn default() -> Self {
        FontCatalog::new([
            "Andale Mono",
            "Arial",
            "Arial Black",
            "Arial Narrow",
            "Arial Rounded MT Bold",
            "Arial Unicode MS",
            "Avant Garde",
            "Baskerville",
            "Big Caslon",
            "Bookman",
            "Brush Script MT",
            "Calibri",
            "Cambria",
            "Cambria Math",
            "Candara",
            "Century Gothic",
            "Comic Sans MS",
            "Consolas",
            "Constantia",
            "Copperplate",
            "Corbel",
            "Courier",
            "Courier New",
            "DejaVu Sans",
            "DejaVu Sans Mono",
            "DejaVu Serif",
            "Didot",
            "Droid Sans",
            "Droid Serif",
            "Franklin Gothic Medium",
            "Futura",
            "Garamond",
            "Geneva",
            "Georgia",
            "Gill Sans",
            "Helvetica",
            "Helvetica Neue",
            "Hoefler Text",
            "Impact",
            "Liberation Mono",
            "Liberation Sans",
            "Liberation Serif",
            "Lucida Bright",
            "Lucida Console",
            "Lucida Grande",
            "Lucida Sans Unicode",
            "Menlo",
            "Microsoft Sans Serif",
            "Monaco",
            "MS Gothic",
            "MS PGothic",
            "MS Reference Sans Serif",
            "Noto Sans",
            "Noto Serif",
            "Optima",
            "Palatino",
            "Palatino Linotype",
            "Papyrus",
            "Rockwell",
            "Roboto",
            "Segoe Print",
            "Segoe Script",
            "Segoe UI",
            "Segoe UI Light",
            "Segoe UI Symbol",
            "Tahoma",
            "Times",
            "Times New Roman",
            "Trebuchet MS",
            "Ubuntu",
            "Verdana",
        ])
    }
}

/// Capability provider for text measurement. The production implementation
/// wraps a canvas 2D context; tests substitute a table-driven fake.
pub trait FontMeasurer {
    /// Measured width of `text` rendered with the CSS `font` value, or
    /// `None` when measurement is impossible.
    fn measure(&self, font: &str, text: &str) -> Option<f64>;
}

/// Outcome of font detection: the injected catalog, the detected ordered
/// subsequence, and the digest over the joined detected names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontInventory {
    pub catalog: Vec<String>,
    pub detected: Vec<String>,
    pub hash: String,
}

/// CSS font value for a candidate rendered over a baseline family.
fn candidate_font(candidate: &str, baseline: &str) -> String {
    format!("{} \"{}\", {}", TEST_FONT_SIZE, candidate, baseline)
}

/// Walk the catalog in order and collect every candidate whose width differs
/// from at least one baseline. `None` when the baselines themselves cannot
/// be measured (no measurement capability).
pub fn detect_available(
    catalog: &FontCatalog,
    measurer: &dyn FontMeasurer,
) -> Option<Vec<String>> {
    let mut baseline_widths = [0.0f64; 3];
    for (i, baseline) in BASELINES.iter().enumerate() {
        let font = format!("{} {}", TEST_FONT_SIZE, baseline);
        baseline_widths[i] = measurer.measure(&font, TEST_STRING)?;
    }

    let mut detected = Vec::new();
    for candidate in &catalog.names {
        let available = BASELINES.iter().zip(baseline_widths).any(|(baseline, base_width)| {
            match measurer.measure(&candidate_font(candidate, baseline), TEST_STRING) {
                Some(width) => width != base_width,
                None => false,
            }
        });
        if available {
            detected.push(candidate.clone());
        }
    }
    Some(detected)
}

/// Detect and digest in one step. `None` when measurement is impossible.
///
/// The hash input is the comma-joined detected sequence, byte-for-byte
/// reproducible for the same environment.
pub async fn build_inventory(
    catalog: &FontCatalog,
    measurer: &dyn FontMeasurer,
) -> Option<FontInventory> {
    let detected = detect_available(catalog, measurer)?;
    let hash = crate::digest::digest_bytes(detected.join(",").as_bytes()).await;
    Some(FontInventory {
        catalog: catalog.names.clone(),
        detected,
        hash,
    })
}

/// Probe over the font availability signal.
#[derive(Debug, Clone)]
pub struct FontProbe {
    pub catalog: FontCatalog,
}

impl FontProbe {
    pub fn new(catalog: FontCatalog) -> Self {
        FontProbe { catalog }
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait(?Send)]
impl CapabilityProbe for FontProbe {
    fn id(&self) -> ProbeId {
        ProbeId::Fonts
    }

    async fn detect(&mut self) -> Result<ProbeResult> {
        let measurer = match CanvasFontMeasurer::acquire() {
            Some(m) => m,
            None => {
                log::debug!("fonts: text measurement capability absent");
                return Ok(ProbeResult::unsupported(ProbeId::Fonts));
            }
        };

        // An empty detected set is still a supported outcome: hash of ""
        let inventory = match build_inventory(&self.catalog, &measurer).await {
            Some(inv) => inv,
            None => return Ok(ProbeResult::unsupported(ProbeId::Fonts)),
        };

        let mut features = BTreeMap::new();
        features.insert(
            "fontCount".to_string(),
            inventory.detected.len().to_string(),
        );

        Ok(ProbeResult {
            probe_id: ProbeId::Fonts,
            canonical_encoding: inventory.detected.join(",").into_bytes(),
            digest: inventory.hash,
            supported: true,
            features,
        })
    }
}

/// Production measurer backed by an offscreen canvas 2D context.
#[cfg(target_arch = "wasm32")]
pub struct CanvasFontMeasurer {
    ctx: web_sys::CanvasRenderingContext2d,
}

#[cfg(target_arch = "wasm32")]
impl CanvasFontMeasurer {
    /// Acquire a measurement context, or `None` when the platform cannot
    /// provide one. Scoped to the probe call; dropped with the value.
    pub fn acquire() -> Option<Self> {
        use wasm_bindgen::JsCast;

        let document = web_sys::window()?.document()?;
        let canvas: web_sys::HtmlCanvasElement = document
            .create_element("canvas")
            .ok()?
            .dyn_into()
            .ok()?;
        let ctx: web_sys::CanvasRenderingContext2d =
            canvas.get_context("2d").ok()??.dyn_into().ok()?;
        Some(CanvasFontMeasurer { ctx })
    }
}

#[cfg(target_arch = "wasm32")]
impl FontMeasurer for CanvasFontMeasurer {
    fn measure(&self, font: &str, text: &str) -> Option<f64> {
        self.ctx.set_font(font);
        self.ctx.measure_text(text).ok().map(|m| m.width())
    }
}
