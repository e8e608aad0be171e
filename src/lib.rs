//! # Fingerprint Scan Engine (WASM)
//!
//! Quantifies how identifiable a browser instance is. A scan runs several
//! independent probes (canvas rendering, font availability, WebGL
//! parameters, audio processing), reduces each raw signal to a canonical
//! encoding and a digest, combines the digests into one composite
//! fingerprint, and maps the result to a 0-100 uniqueness score with a
//! discrete risk band.
//!
//! ## Architecture
//!
//! ```text
//! ScanOrchestrator (generations, progress)
//!   ↓
//! FingerprintAggregator (per-probe fault isolation)
//!   ↓
//! CapabilityProbe × {canvas, fonts, webgl, audio}
//!   ↓                         ↓
//! DigestService          UniquenessScorer → RiskBands
//! ```
//!
//! The engine guarantees reproducibility on a fixed rendering engine and
//! configuration, not stability across engines. Nothing is persisted; every
//! scan builds its records fresh and the serialized report is the only
//! output surface.

// Modules
pub mod aggregate;
mod error;
pub mod digest;
pub mod orchestrator;
pub mod probes;
pub mod score;

pub use aggregate::{CompositeFingerprint, FingerprintAggregator};
pub use digest::{digest_bytes, fallback_digest, UNSUPPORTED_DIGEST};
pub use error::{ErrorCode, ErrorInfo, Result, ScanError};
pub use orchestrator::{run_scan, ScanOrchestrator, ScanOutcome, ScanProgress, ScanState};
pub use probes::{
    AudioProbe, CanvasProbe, CapabilityProbe, FontCatalog, FontInventory, FontMeasurer,
    FontProbe, ProbeId, ProbeResult, WebGlProbe,
};
pub use score::{
    RiskBands, RiskLevel, ScoreFactor, ScoreWeights, UniquenessScore, UniquenessScorer,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Initialize the engine module
///
/// This sets up logging and any global state needed.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn init() {
    // Repeated init is harmless; only the first logger wins
    let _ = console_log::init_with_level(log::Level::Info);

    log::info!("fingerprint scan engine initialized");
}

/// Run a full fingerprint scan with the default probe set.
///
/// `progress` (optional) is invoked with the completion percentage after
/// each probe finishes. Resolves to
/// `{ generation, results, compositeDigest, createdAtMs, uniqueness }`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn scan(progress: Option<js_sys::Function>) -> std::result::Result<JsValue, JsValue> {
    use serde::Serialize;

    let outcome = run_default_scan(progress).await?;
    // Plain JS objects (not ES Maps) for the probe-id keyed results
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    outcome
        .serialize(&serializer)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Run a full scan and return the stable JSON report string consumed by the
/// report-sharing backend.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn scan_report_json() -> std::result::Result<String, JsValue> {
    let outcome = run_default_scan(None).await?;
    outcome
        .to_report_json()
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(target_arch = "wasm32")]
async fn run_default_scan(
    progress: Option<js_sys::Function>,
) -> std::result::Result<ScanOutcome, JsValue> {
    use std::cell::RefCell;
    use std::rc::Rc;

    let orchestrator = Rc::new(RefCell::new(ScanOrchestrator::new()));
    let mut probes = probes::default_probe_set();
    let scorer = UniquenessScorer::new();

    let outcome = orchestrator::run_scan(&orchestrator, &mut probes, &scorer, |update| {
        if let Some(callback) = &progress {
            let _ = callback.call1(&JsValue::NULL, &JsValue::from_f64(update.percent));
        }
    })
    .await
    .ok_or_else(|| JsValue::from_str("scan superseded by a newer generation"))?;

    log::info!(
        "✅ scan generation {} complete: score {:.1} ({:?})",
        outcome.generation,
        outcome.uniqueness.value,
        outcome.uniqueness.risk_level
    );

    Ok(outcome)
}
