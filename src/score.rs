//! Uniqueness scoring and risk classification
//!
//! Maps a composite fingerprint to a 0-100 rarity estimate and a discrete
//! risk band. Every numeric knob lives in `ScoreWeights`/`RiskBands` so the
//! formula can be retuned without touching the algorithm; the invariant the
//! engine guarantees is monotonicity, not exact values: adding distinguishing
//! signal to any probe never lowers the score.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::CompositeFingerprint;
use crate::probes::ProbeId;

/// Tunable weights of the scoring formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Points any supported probe earns just for being present.
    pub supported_bonus: f64,
    /// Extra points when a probe's digest differs from the configured
    /// "common configuration" baseline for that probe. Granted
    /// unconditionally when no baseline is configured.
    pub uncommon_bonus: f64,
    /// Minimal weight of an unsupported probe; the absence of a capability
    /// is itself weakly distinguishing.
    pub unsupported_weight: f64,
    /// Detected-font count at which the font contribution saturates;
    /// marginal fonts past it add no distinguishing power.
    pub font_saturation: usize,
    /// Font contribution at saturation, on top of the supported bonus.
    pub font_max_points: f64,
    /// Known common-configuration digests, per probe.
    pub common_digests: BTreeMap<ProbeId, String>,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            supported_bonus: 15.0,
            uncommon_bonus: 10.0,
            unsupported_weight: 1.5,
            font_saturation: 30,
            font_max_points: 20.0,
            common_digests: BTreeMap::new(),
        }
    }
}

impl ScoreWeights {
    /// Maximum contribution a probe can make under these weights.
    pub fn max_weight(&self, probe_id: ProbeId) -> f64 {
        match probe_id {
            ProbeId::Fonts => self.supported_bonus + self.font_max_points,
            _ => self.supported_bonus + self.uncommon_bonus,
        }
    }
}

/// Risk band thresholds. Half-open, non-overlapping:
/// `[0, medium) -> low`, `[medium, high) -> medium`,
/// `[high, critical) -> high`, `[critical, 100] -> critical`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBands {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        RiskBands {
            medium: 30.0,
            high: 60.0,
            critical: 85.0,
        }
    }
}

impl RiskBands {
    /// Pure mapping from score to band.
    pub fn classify(&self, value: f64) -> RiskLevel {
        if value >= self.critical {
            RiskLevel::Critical
        } else if value >= self.high {
            RiskLevel::High
        } else if value >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// One probe's contribution to the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactor {
    pub probe_id: ProbeId,
    /// Maximum the probe could have contributed.
    pub weight: f64,
    /// What it actually contributed.
    pub contribution: f64,
}

/// A 0-100 rarity estimate with its band and per-probe breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniquenessScore {
    pub value: f64,
    pub risk_level: RiskLevel,
    /// Canonical probe order.
    pub factors: Vec<ScoreFactor>,
}

/// Weighted, saturating scorer over the probe feature vector.
#[derive(Debug, Clone, Default)]
pub struct UniquenessScorer {
    weights: ScoreWeights,
    bands: RiskBands,
}

impl UniquenessScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(weights: ScoreWeights, bands: RiskBands) -> Self {
        UniquenessScorer { weights, bands }
    }

    pub fn score(&self, fingerprint: &CompositeFingerprint) -> UniquenessScore {
        let mut factors = Vec::with_capacity(fingerprint.results.len());
        let mut total = 0.0;

        for (probe_id, result) in &fingerprint.results {
            let contribution = if !result.supported {
                self.weights.unsupported_weight
            } else {
                self.weights.supported_bonus + self.distinguishing_points(*probe_id, result)
            };
            total += contribution;
            factors.push(ScoreFactor {
                probe_id: *probe_id,
                weight: self.weights.max_weight(*probe_id),
                contribution,
            });
        }

        let value = total.clamp(0.0, 100.0);
        UniquenessScore {
            value,
            risk_level: self.bands.classify(value),
            factors,
        }
    }

    /// Points above the supported bonus: the saturating font curve for the
    /// font probe, the uncommon-digest bonus for the rest.
    fn distinguishing_points(&self, probe_id: ProbeId, result: &crate::probes::ProbeResult) -> f64 {
        if probe_id == ProbeId::Fonts {
            let count = result
                .features
                .get("fontCount")
                .and_then(|c| c.parse::<usize>().ok())
                .unwrap_or(0);
            let saturation = self.weights.font_saturation.max(1);
            let saturated = count.min(saturation) as f64 / saturation as f64;
            return saturated * self.weights.font_max_points;
        }

        match self.weights.common_digests.get(&probe_id) {
            Some(common) if *common == result.digest => 0.0,
            // Differs from the known common configuration, or no baseline
            // is configured for this probe
            _ => self.weights.uncommon_bonus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::UNSUPPORTED_DIGEST;
    use crate::probes::ProbeResult;
    use futures::executor::block_on;

    fn fingerprint(results: Vec<ProbeResult>) -> CompositeFingerprint {
        let map = results.into_iter().map(|r| (r.probe_id, r)).collect();
        block_on(CompositeFingerprint::assemble(map))
    }

    fn supported(probe_id: ProbeId, encoding: &[u8]) -> ProbeResult {
        block_on(ProbeResult::from_encoding(
            probe_id,
            encoding.to_vec(),
            Default::default(),
        ))
    }

    fn supported_fonts(count: usize) -> ProbeResult {
        let names: Vec<String> = (0..count).map(|i| format!("Font{}", i)).collect();
        let mut result = supported(ProbeId::Fonts, names.join(",").as_bytes());
        result
            .features
            .insert("fontCount".to_string(), count.to_string());
        result
    }

    fn all_unsupported() -> CompositeFingerprint {
        fingerprint(ProbeId::ALL.iter().map(|id| ProbeResult::unsupported(*id)).collect())
    }

    fn all_supported(font_count: usize) -> CompositeFingerprint {
        fingerprint(vec![
            supported(ProbeId::Canvas, b"pixels"),
            supported_fonts(font_count),
            supported(ProbeId::WebGl, b"vendor|renderer"),
            supported(ProbeId::Audio, b"sampleRate:44100|sum:1.23456"),
        ])
    }

    #[test]
    fn test_all_unsupported_scores_near_floor() {
        let score = UniquenessScorer::new().score(&all_unsupported());
        assert!(score.value <= 10.0, "floor score was {}", score.value);
        assert_eq!(score.risk_level, RiskLevel::Low);
        // Absence still contributes a little
        assert!(score.value > 0.0);
    }

    #[test]
    fn test_all_supported_maximal_scores_near_ceiling() {
        let score = UniquenessScorer::new().score(&all_supported(60));
        assert!(score.value >= 95.0, "ceiling score was {}", score.value);
        assert_eq!(score.risk_level, RiskLevel::Critical);
        assert!(score.value <= 100.0);
    }

    #[test]
    fn test_supported_never_scores_below_unsupported() {
        // Monotonicity across the unsupported -> supported transition,
        // holding the other probes fixed, for every probe
        let scorer = UniquenessScorer::new();
        for id in ProbeId::ALL {
            let mut base: Vec<ProbeResult> =
                ProbeId::ALL.iter().map(|p| ProbeResult::unsupported(*p)).collect();
            let floor = scorer.score(&fingerprint(base.clone())).value;

            let upgraded = if id == ProbeId::Fonts {
                supported_fonts(1)
            } else {
                supported(id, b"distinct")
            };
            let idx = ProbeId::ALL.iter().position(|p| *p == id).unwrap();
            base[idx] = upgraded;
            let raised = scorer.score(&fingerprint(base)).value;

            assert!(
                raised >= floor,
                "{:?}: {} < {}",
                id,
                raised,
                floor
            );
        }
    }

    #[test]
    fn test_font_count_is_monotone_and_saturating() {
        let scorer = UniquenessScorer::new();
        let mut previous = -1.0;
        for count in [0, 1, 5, 15, 30, 50, 70] {
            let value = scorer.score(&fingerprint(vec![supported_fonts(count)])).value;
            assert!(value >= previous, "count {} lowered the score", count);
            previous = value;
        }

        // Past saturation the marginal font adds nothing
        let at_saturation = scorer.score(&fingerprint(vec![supported_fonts(30)])).value;
        let past_saturation = scorer.score(&fingerprint(vec![supported_fonts(70)])).value;
        assert_eq!(at_saturation, past_saturation);
    }

    #[test]
    fn test_common_digest_drops_uncommon_bonus() {
        let common = supported(ProbeId::Canvas, b"stock pixels");
        let mut weights = ScoreWeights::default();
        weights
            .common_digests
            .insert(ProbeId::Canvas, common.digest.clone());
        let scorer = UniquenessScorer::with_config(weights, RiskBands::default());

        let common_score = scorer.score(&fingerprint(vec![common])).value;
        let uncommon_score = scorer
            .score(&fingerprint(vec![supported(ProbeId::Canvas, b"odd pixels")]))
            .value;
        assert!(uncommon_score > common_score);
    }

    #[test]
    fn test_value_clamped_to_100() {
        let mut weights = ScoreWeights::default();
        weights.supported_bonus = 90.0;
        let scorer = UniquenessScorer::with_config(weights, RiskBands::default());
        let score = scorer.score(&all_supported(70));
        assert_eq!(score.value, 100.0);
    }

    #[test]
    fn test_factors_follow_canonical_order() {
        let score = UniquenessScorer::new().score(&all_supported(10));
        let ids: Vec<ProbeId> = score.factors.iter().map(|f| f.probe_id).collect();
        assert_eq!(ids, ProbeId::ALL);
        for factor in &score.factors {
            assert!(factor.contribution <= factor.weight);
        }
    }

    #[test]
    fn test_band_edges() {
        let bands = RiskBands::default();
        assert_eq!(bands.classify(0.0), RiskLevel::Low);
        assert_eq!(bands.classify(29.9), RiskLevel::Low);
        assert_eq!(bands.classify(30.0), RiskLevel::Medium);
        assert_eq!(bands.classify(59.9), RiskLevel::Medium);
        assert_eq!(bands.classify(60.0), RiskLevel::High);
        assert_eq!(bands.classify(84.9), RiskLevel::High);
        assert_eq!(bands.classify(85.0), RiskLevel::Critical);
        assert_eq!(bands.classify(100.0), RiskLevel::Critical);
    }

    #[test]
    fn test_unsupported_sentinel_never_counts_as_uncommon() {
        // An unsupported probe takes the unsupported weight even when a
        // common baseline exists for it
        let mut weights = ScoreWeights::default();
        weights
            .common_digests
            .insert(ProbeId::Audio, UNSUPPORTED_DIGEST.to_string());
        let scorer = UniquenessScorer::with_config(weights.clone(), RiskBands::default());
        let score = scorer.score(&fingerprint(vec![ProbeResult::unsupported(ProbeId::Audio)]));
        assert_eq!(score.factors[0].contribution, weights.unsupported_weight);
    }
}
