//! Capability probes
//!
//! Each probe elicits one class of platform signal (canvas rendering, font
//! availability, WebGL parameters, audio processing), reduces the raw output
//! to a canonical byte encoding, and digests it. A probe whose capability is
//! missing reports the unsupported sentinel instead of failing the scan.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::digest::UNSUPPORTED_DIGEST;
use crate::error::Result;

pub mod audio;
pub mod canvas;
pub mod fonts;
pub mod webgl;

pub use audio::AudioProbe;
pub use canvas::CanvasProbe;
pub use fonts::{FontCatalog, FontInventory, FontMeasurer, FontProbe};
pub use webgl::WebGlProbe;

/// Identity of a probe. The declaration order is the canonical probe order:
/// composite digests are always computed over probe digests sorted by this
/// order, never by execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProbeId {
    Canvas,
    Fonts,
    WebGl,
    Audio,
}

impl ProbeId {
    /// All probe ids in canonical order.
    pub const ALL: [ProbeId; 4] = [
        ProbeId::Canvas,
        ProbeId::Fonts,
        ProbeId::WebGl,
        ProbeId::Audio,
    ];

    /// Stable wire name, used as the key in serialized reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeId::Canvas => "canvas",
            ProbeId::Fonts => "fonts",
            ProbeId::WebGl => "webgl",
            ProbeId::Audio => "audio",
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub probe_id: ProbeId,
    /// Exact bytes fed to the digest function. Not serialized: raw pixel
    /// buffers are large and the digest already stands in for them.
    #[serde(skip)]
    pub canonical_encoding: Vec<u8>,
    /// Digest of `canonical_encoding`, or the `"unsupported"` sentinel.
    pub digest: String,
    pub supported: bool,
    /// Auxiliary display signals, independent of the digest input.
    pub features: BTreeMap<String, String>,
}

impl ProbeResult {
    /// Sentinel result for a missing capability: empty encoding, reserved
    /// digest, no features.
    pub fn unsupported(probe_id: ProbeId) -> Self {
        ProbeResult {
            probe_id,
            canonical_encoding: Vec::new(),
            digest: UNSUPPORTED_DIGEST.to_string(),
            supported: false,
            features: BTreeMap::new(),
        }
    }

    /// Build a supported result by digesting the canonical encoding.
    pub async fn from_encoding(
        probe_id: ProbeId,
        canonical_encoding: Vec<u8>,
        features: BTreeMap<String, String>,
    ) -> Self {
        let digest = crate::digest::digest_bytes(&canonical_encoding).await;
        ProbeResult {
            probe_id,
            canonical_encoding,
            digest,
            supported: true,
            features,
        }
    }
}

/// A self-contained unit that elicits one class of platform signal.
///
/// `detect` acquires whatever platform resource it needs (an offscreen
/// canvas, an audio context) for the duration of the call and releases it on
/// every exit path. `release` drops anything the probe value itself still
/// caches, and is invoked by the aggregator after each run.
#[async_trait(?Send)]
pub trait CapabilityProbe {
    fn id(&self) -> ProbeId;

    /// Run the probe. A missing capability yields `Ok` with the unsupported
    /// sentinel; `Err` is reserved for unexpected faults, which the
    /// aggregator downgrades to the sentinel as well.
    async fn detect(&mut self) -> Result<ProbeResult>;

    fn release(&mut self) {}
}

/// The full probe set in canonical order.
#[cfg(target_arch = "wasm32")]
pub fn default_probe_set() -> Vec<Box<dyn CapabilityProbe>> {
    vec![
        Box::new(CanvasProbe::new()),
        Box::new(FontProbe::new(FontCatalog::default())),
        Box::new(WebGlProbe::new()),
        Box::new(AudioProbe::new()),
    ]
}
