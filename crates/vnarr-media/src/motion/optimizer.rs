//! Grid search for a motion configuration that lands in a target duration.
//!
//! Candidates are tried in [`ParamGrid::candidates`] order and the first one
//! whose resulting duration falls inside the target range wins. With
//! `parallel` enabled candidates are scanned concurrently on the rayon pool,
//! but the winner is still the earliest hit in grid order.

use std::time::Instant;

use metrics::counter;
use rayon::prelude::*;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};
use vnarr_models::{MotionConfig, ParamGrid};

use super::detector::MotionDetector;
use crate::error::{MediaError, MediaResult};
use crate::frames::FrameProvider;
use crate::names;

/// Result of a grid search. `NotFound` is an ordinary outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OptimizeOutcome {
    Found {
        config: MotionConfig,
        resulting_duration: f64,
        /// 1-based position of the winner in search order.
        evaluated: usize,
    },
    NotFound {
        evaluated: usize,
    },
}

impl OptimizeOutcome {
    pub fn config(&self) -> Option<&MotionConfig> {
        match self {
            OptimizeOutcome::Found { config, .. } => Some(config),
            OptimizeOutcome::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, OptimizeOutcome::Found { .. })
    }
}

/// Exhaustive first-fit search over a [`ParamGrid`].
#[derive(Debug, Clone)]
pub struct ParameterOptimizer {
    grid: ParamGrid,
    /// Metric and compare size shared by every candidate.
    base: MotionConfig,
    parallel: bool,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl Default for ParameterOptimizer {
    fn default() -> Self {
        Self::new(ParamGrid::default())
    }
}

impl ParameterOptimizer {
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            base: MotionConfig::default(),
            parallel: true,
            cancel_rx: None,
        }
    }

    /// Optimizer over the default grid for `base`'s metric.
    pub fn for_base(base: MotionConfig) -> Self {
        Self::new(ParamGrid::for_metric(base.metric)).with_base(base)
    }

    pub fn with_base(mut self, base: MotionConfig) -> Self {
        self.base = base;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    fn detector(&self, config: &MotionConfig) -> MotionDetector {
        let detector = MotionDetector::new(config.clone());
        match &self.cancel_rx {
            Some(rx) => detector.with_cancel(rx.clone()),
            None => detector,
        }
    }

    /// Scan with one candidate; `Some(resulting_duration)` when it fits.
    fn evaluate(
        &self,
        provider: &dyn FrameProvider,
        config: &MotionConfig,
        (min, max): (f64, f64),
    ) -> MediaResult<Option<f64>> {
        let run = self.detector(config).detect_from(provider)?;
        counter!(names::OPTIMIZER_CANDIDATES_TOTAL).increment(1);

        let resulting = run.resulting_duration();
        debug!(
            threshold = config.motion_threshold,
            min_static = config.min_static_duration,
            step = config.sample_step,
            resulting,
            "Evaluated candidate"
        );
        Ok((min..=max).contains(&resulting).then_some(resulting))
    }

    /// Find the first configuration whose resulting duration lies in
    /// `[target.0, target.1]`. Any scan error aborts the search.
    pub fn optimize(
        &self,
        provider: &dyn FrameProvider,
        target: (f64, f64),
    ) -> MediaResult<OptimizeOutcome> {
        let (min, max) = target;
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
            return Err(MediaError::invalid_config(format!(
                "target range [{}, {}] is not a valid duration range",
                min, max
            )));
        }

        let candidates = self.grid.candidates(&self.base);
        let started = Instant::now();
        info!(
            source = %provider.describe(),
            candidates = candidates.len(),
            min,
            max,
            parallel = self.parallel,
            "Starting parameter search"
        );

        let step = |(index, config): (usize, &MotionConfig)| {
            match self.evaluate(provider, config, target) {
                Ok(None) => None,
                Ok(Some(resulting)) => Some(Ok((index, config.clone(), resulting))),
                Err(e) => Some(Err(e)),
            }
        };

        let hit = if self.parallel {
            candidates.par_iter().enumerate().find_map_first(step)
        } else {
            candidates.iter().enumerate().find_map(step)
        };

        let outcome = match hit.transpose()? {
            Some((index, config, resulting_duration)) => OptimizeOutcome::Found {
                config,
                resulting_duration,
                evaluated: index + 1,
            },
            None => OptimizeOutcome::NotFound {
                evaluated: candidates.len(),
            },
        };

        info!(
            found = outcome.is_found(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Parameter search finished"
        );
        Ok(outcome)
    }
}
