//! Scan orchestration
//!
//! Drives the probe set through a progress-reporting state machine:
//! `Idle -> Running -> {Complete, Failed}`. Every started scan gets a
//! strictly increasing generation id; updates tagged with a superseded
//! generation are discarded on arrival, so a newer scan can never be
//! overwritten by a stale one. Probes of a superseded run may keep
//! executing; only their results are ignored.
//!
//! Probe faults never fail the orchestrator (the aggregator isolates them);
//! `Failed` is reserved for orchestrator-internal faults.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::aggregate::{CompositeFingerprint, FingerprintAggregator};
use crate::probes::CapabilityProbe;
use crate::score::{UniquenessScore, UniquenessScorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Running,
    Complete,
    Failed,
}

/// Progress of one scan generation. `percent` is monotonically
/// non-decreasing within a generation and reaches exactly 100 once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub generation: u64,
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

/// Final product of a scan generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub generation: u64,
    #[serde(flatten)]
    pub fingerprint: CompositeFingerprint,
    pub uniqueness: UniquenessScore,
}

impl ScanOutcome {
    /// Stable JSON shape for the report-sharing boundary.
    pub fn to_report_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// The scan state machine. Owns no probes; it tracks generations and
/// arbitrates which run's updates are current.
#[derive(Debug)]
pub struct ScanOrchestrator {
    state: ScanState,
    generation: u64,
    last_progress: Option<ScanProgress>,
    latest: Option<ScanOutcome>,
}

impl Default for ScanOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanOrchestrator {
    pub fn new() -> Self {
        ScanOrchestrator {
            state: ScanState::Idle,
            generation: 0,
            last_progress: None,
            latest: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn latest(&self) -> Option<&ScanOutcome> {
        self.latest.as_ref()
    }

    /// Begin a new scan. Starting while `Running` supersedes the previous
    /// generation: its in-flight updates will be discarded on arrival.
    pub fn start(&mut self) -> u64 {
        self.generation += 1;
        if self.state == ScanState::Running {
            log::debug!(
                "scan generation {} supersedes a running scan",
                self.generation
            );
        }
        self.state = ScanState::Running;
        self.last_progress = None;
        log::debug!("scan generation {} started", self.generation);
        self.generation
    }

    /// Record a probe completion for `generation`. Returns the progress
    /// update to publish, or `None` when the generation is stale.
    pub fn record_progress(
        &mut self,
        generation: u64,
        completed: usize,
        total: usize,
    ) -> Option<ScanProgress> {
        if generation != self.generation {
            log::debug!("discarding stale progress from generation {}", generation);
            return None;
        }
        let percent = if total == 0 {
            100.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        let progress = ScanProgress {
            generation,
            completed,
            total,
            percent,
        };
        self.last_progress = Some(progress);
        Some(progress)
    }

    /// Publish the outcome of `generation`. Returns false (and keeps the
    /// newer state untouched) when the generation is stale.
    pub fn complete(&mut self, generation: u64, outcome: ScanOutcome) -> bool {
        if generation != self.generation {
            log::debug!("discarding stale result from generation {}", generation);
            return false;
        }
        self.state = ScanState::Complete;
        self.latest = Some(outcome);
        true
    }

    /// Record an orchestrator-internal fault for `generation`.
    pub fn fail(&mut self, generation: u64, err: &crate::error::ScanError) -> bool {
        if generation != self.generation {
            return false;
        }
        log::warn!("scan generation {} failed: {}", generation, err);
        self.state = ScanState::Failed;
        true
    }
}

/// Run one scan through a shared orchestrator: start a generation, execute
/// the probe set with progress callbacks, score the fingerprint, and publish
/// the outcome. Returns `None` when this run was superseded before it
/// finished (its result has been discarded).
pub async fn run_scan<F>(
    orchestrator: &Rc<RefCell<ScanOrchestrator>>,
    probes: &mut [Box<dyn CapabilityProbe>],
    scorer: &UniquenessScorer,
    mut on_progress: F,
) -> Option<ScanOutcome>
where
    F: FnMut(ScanProgress),
{
    let generation = orchestrator.borrow_mut().start();

    let fingerprint = FingerprintAggregator::run_with(probes, |completed, total| {
        let update = orchestrator
            .borrow_mut()
            .record_progress(generation, completed, total);
        if let Some(progress) = update {
            on_progress(progress);
        }
    })
    .await;

    let uniqueness = scorer.score(&fingerprint);
    let outcome = ScanOutcome {
        generation,
        fingerprint,
        uniqueness,
    };

    if orchestrator.borrow_mut().complete(generation, outcome.clone()) {
        Some(outcome)
    } else {
        None
    }
}
