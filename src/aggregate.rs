//! Fingerprint aggregation
//!
//! Runs the probe set, isolates per-probe faults, and assembles the results
//! into one composite fingerprint. The composite digest is computed over the
//! per-probe digests in canonical probe order, so neither execution order
//! nor completion order can ever change it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::digest_bytes;
use crate::probes::{CapabilityProbe, ProbeId, ProbeResult};

/// The ordered combination of every probe's result into one identity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeFingerprint {
    /// Keyed by probe id; BTreeMap iteration follows the canonical order.
    pub results: BTreeMap<ProbeId, ProbeResult>,
    pub composite_digest: String,
    pub created_at_ms: f64,
}

impl CompositeFingerprint {
    /// Assemble a fingerprint from collected results, in whatever order
    /// they arrived.
    pub async fn assemble(results: BTreeMap<ProbeId, ProbeResult>) -> Self {
        let composite_digest = composite_digest(&results).await;
        CompositeFingerprint {
            results,
            composite_digest,
            created_at_ms: now_ms(),
        }
    }

    /// Stable JSON shape for the report-sharing boundary.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Digest over the ordered sequence of probe digests.
pub async fn composite_digest(results: &BTreeMap<ProbeId, ProbeResult>) -> String {
    let joined = results
        .values()
        .map(|r| r.digest.as_str())
        .collect::<Vec<_>>()
        .join(",");
    digest_bytes(joined.as_bytes()).await
}

/// Timestamp in milliseconds (WASM-compatible)
fn now_ms() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as f64
    }
}

/// Runs every registered probe and assembles the composite record.
pub struct FingerprintAggregator;

impl FingerprintAggregator {
    /// Execute the probe set. A probe `Err` is logged and recorded exactly
    /// as an unsupported result; no probe fault aborts the others. Every
    /// probe's `release` runs afterwards, fault or not.
    ///
    /// `on_complete(done, total)` fires after each probe finishes.
    pub async fn run_with<F>(
        probes: &mut [Box<dyn CapabilityProbe>],
        mut on_complete: F,
    ) -> CompositeFingerprint
    where
        F: FnMut(usize, usize),
    {
        let total = probes.len();
        let mut results = BTreeMap::new();

        for (done, probe) in probes.iter_mut().enumerate() {
            let id = probe.id();
            let result = match probe.detect().await {
                Ok(result) => result,
                Err(err) => {
                    log::warn!("⚠️ probe {} faulted, recording unsupported: {}", id.as_str(), err);
                    ProbeResult::unsupported(id)
                }
            };
            probe.release();
            results.insert(id, result);
            on_complete(done + 1, total);
        }

        CompositeFingerprint::assemble(results).await
    }

    /// Execute the probe set without progress reporting.
    pub async fn run(probes: &mut [Box<dyn CapabilityProbe>]) -> CompositeFingerprint {
        Self::run_with(probes, |_, _| {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::UNSUPPORTED_DIGEST;
    use crate::error::{Result, ScanError};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FixedProbe {
        id: ProbeId,
        encoding: &'static [u8],
        released: Rc<Cell<bool>>,
    }

    #[async_trait(?Send)]
    impl CapabilityProbe for FixedProbe {
        fn id(&self) -> ProbeId {
            self.id
        }
        async fn detect(&mut self) -> Result<ProbeResult> {
            Ok(ProbeResult::from_encoding(self.id, self.encoding.to_vec(), Default::default())
                .await)
        }
        fn release(&mut self) {
            self.released.set(true);
        }
    }

    struct FaultyProbe {
        id: ProbeId,
        released: Rc<Cell<bool>>,
    }

    #[async_trait(?Send)]
    impl CapabilityProbe for FaultyProbe {
        fn id(&self) -> ProbeId {
            self.id
        }
        async fn detect(&mut self) -> Result<ProbeResult> {
            Err(ScanError::ProbeFault {
                probe: self.id.as_str().into(),
                detail: "synthetic".into(),
            })
        }
        fn release(&mut self) {
            self.released.set(true);
        }
    }

    fn fixed(id: ProbeId, encoding: &'static [u8]) -> (Box<dyn CapabilityProbe>, Rc<Cell<bool>>) {
        let released = Rc::new(Cell::new(false));
        (
            Box::new(FixedProbe {
                id,
                encoding,
                released: released.clone(),
            }),
            released,
        )
    }

    #[test]
    fn test_composite_invariant_under_execution_order() {
        let (a, _) = fixed(ProbeId::Canvas, b"pixels");
        let (b, _) = fixed(ProbeId::Fonts, b"Arial,Georgia");
        let (c, _) = fixed(ProbeId::WebGl, b"v|r");
        let (d, _) = fixed(ProbeId::Audio, b"sampleRate:44100|sum:1.00000");
        let mut forward: Vec<Box<dyn CapabilityProbe>> = vec![a, b, c, d];

        let (a, _) = fixed(ProbeId::Canvas, b"pixels");
        let (b, _) = fixed(ProbeId::Fonts, b"Arial,Georgia");
        let (c, _) = fixed(ProbeId::WebGl, b"v|r");
        let (d, _) = fixed(ProbeId::Audio, b"sampleRate:44100|sum:1.00000");
        let mut reversed: Vec<Box<dyn CapabilityProbe>> = vec![d, c, b, a];

        let fp1 = block_on(FingerprintAggregator::run(&mut forward));
        let fp2 = block_on(FingerprintAggregator::run(&mut reversed));
        assert_eq!(fp1.composite_digest, fp2.composite_digest);
    }

    #[test]
    fn test_repeat_scan_is_stable() {
        // Two consecutive scans on an unchanged environment
        let mut first: Vec<Box<dyn CapabilityProbe>> = vec![
            fixed(ProbeId::Canvas, b"pixels").0,
            fixed(ProbeId::Fonts, b"Arial").0,
        ];
        let mut second: Vec<Box<dyn CapabilityProbe>> = vec![
            fixed(ProbeId::Canvas, b"pixels").0,
            fixed(ProbeId::Fonts, b"Arial").0,
        ];
        let fp1 = block_on(FingerprintAggregator::run(&mut first));
        let fp2 = block_on(FingerprintAggregator::run(&mut second));
        assert_eq!(fp1.composite_digest, fp2.composite_digest);
    }

    #[test]
    fn test_fault_isolated_as_unsupported() {
        let released = Rc::new(Cell::new(false));
        let mut probes: Vec<Box<dyn CapabilityProbe>> = vec![
            fixed(ProbeId::Canvas, b"pixels").0,
            Box::new(FaultyProbe {
                id: ProbeId::WebGl,
                released: released.clone(),
            }),
        ];

        let fp = block_on(FingerprintAggregator::run(&mut probes));
        let webgl = &fp.results[&ProbeId::WebGl];
        assert!(!webgl.supported);
        assert_eq!(webgl.digest, UNSUPPORTED_DIGEST);
        // The healthy probe still produced a real result
        assert!(fp.results[&ProbeId::Canvas].supported);
        // And release ran despite the fault
        assert!(released.get());
    }

    #[test]
    fn test_release_runs_on_success() {
        let (probe, released) = fixed(ProbeId::Audio, b"sig");
        let mut probes = vec![probe];
        let _ = block_on(FingerprintAggregator::run(&mut probes));
        assert!(released.get());
    }

    #[test]
    fn test_progress_counts() {
        let mut probes: Vec<Box<dyn CapabilityProbe>> = vec![
            fixed(ProbeId::Canvas, b"a").0,
            fixed(ProbeId::Fonts, b"b").0,
            fixed(ProbeId::Audio, b"c").0,
        ];
        let mut seen = Vec::new();
        let _ = block_on(FingerprintAggregator::run_with(&mut probes, |done, total| {
            seen.push((done, total));
        }));
        assert_eq!(seen, [(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_results_keyed_in_canonical_order() {
        let mut probes: Vec<Box<dyn CapabilityProbe>> = vec![
            fixed(ProbeId::Audio, b"a").0,
            fixed(ProbeId::Canvas, b"c").0,
        ];
        let fp = block_on(FingerprintAggregator::run(&mut probes));
        let keys: Vec<ProbeId> = fp.results.keys().copied().collect();
        assert_eq!(keys, [ProbeId::Canvas, ProbeId::Audio]);
    }

    #[test]
    fn test_json_shape_round_trips() {
        let mut probes: Vec<Box<dyn CapabilityProbe>> = vec![fixed(ProbeId::Fonts, b"Arial").0];
        let fp = block_on(FingerprintAggregator::run(&mut probes));
        let json = fp.to_json().unwrap();
        assert!(json.contains("\"compositeDigest\""));
        assert!(json.contains("\"fonts\""));

        let parsed: CompositeFingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.composite_digest, fp.composite_digest);
    }
}
