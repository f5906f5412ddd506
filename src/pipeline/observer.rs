//! Stage-boundary observation.
//!
//! [`Pipeline::dispatch_with`](super::runner::Pipeline::dispatch_with) and
//! friends call a [`PipelineObserver`] before and after each stage an item
//! passes through. [`NoopObserver`] compiles down to nothing;
//! [`StageTimingObserver`] records a [`StageReport`] per stage.

use std::time::{Duration, Instant};

use super::traits::StageType;

/// What happened to an item in one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The item continues to the next stage.
    Passed,
    /// A module returned `None`; the item went no further.
    Consumed,
    /// A module returned an error.
    Failed,
}

/// Measurements for one stage of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    elapsed: Duration,
    outcome: StageOutcome,
    modules: Option<usize>,
}

impl StageReport {
    pub fn new(elapsed: Duration, outcome: StageOutcome) -> Self {
        Self {
            elapsed,
            outcome,
            modules: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn outcome(&self) -> StageOutcome {
        self.outcome
    }

    /// Number of modules in the stage's link, when reported.
    pub fn modules(&self) -> Option<usize> {
        self.modules
    }
}

/// Builder for reports carrying optional metrics.
#[derive(Debug, Clone)]
pub struct StageReportBuilder {
    report: StageReport,
}

impl StageReportBuilder {
    pub fn new(elapsed: Duration, outcome: StageOutcome) -> Self {
        Self {
            report: StageReport::new(elapsed, outcome),
        }
    }

    pub fn modules(mut self, n: usize) -> Self {
        self.report.modules = Some(n);
        self
    }

    pub fn build(self) -> StageReport {
        self.report
    }
}

/// Wall-clock timer for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageClock(Instant);

impl StageClock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Receives stage-boundary callbacks during dispatch.
///
/// All methods default to no-ops, so implementors override only what they
/// need.
pub trait PipelineObserver {
    fn on_stage_start(&mut self, _stage: StageType) {}

    fn on_stage_end(&mut self, _stage: StageType, _report: &StageReport) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Observer that keeps every stage report in arrival order.
#[derive(Debug, Clone, Default)]
pub struct StageTimingObserver {
    reports: Vec<(StageType, StageReport)>,
}

impl StageTimingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[(StageType, StageReport)] {
        &self.reports
    }

    /// Total time spent in `stage` across all recorded items.
    pub fn total(&self, stage: StageType) -> Duration {
        self.reports
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, r)| r.elapsed())
            .sum()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }
}

impl PipelineObserver for StageTimingObserver {
    fn on_stage_end(&mut self, stage: StageType, report: &StageReport) {
        self.reports.push((stage, report.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_observer_records_in_order() {
        let mut obs = StageTimingObserver::new();
        for stage in [StageType::Input, StageType::Classify] {
            obs.on_stage_start(stage);
            let report = StageReportBuilder::new(Duration::from_millis(2), StageOutcome::Passed)
                .modules(1)
                .build();
            obs.on_stage_end(stage, &report);
        }
        let stages: Vec<StageType> = obs.reports().iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, vec![StageType::Input, StageType::Classify]);
        assert_eq!(obs.reports()[0].1.modules(), Some(1));
        assert_eq!(obs.total(StageType::Classify), Duration::from_millis(2));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = StageClock::start();
        let a = clock.elapsed();
        let b = clock.elapsed();
        assert!(b >= a);
    }
}
