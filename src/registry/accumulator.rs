//! Typed per-metric accumulators, tagged by [`AccumulatorKind`].

use crate::config::HistogramConfig;
use crate::error::MetricsError;
use crate::sample::MetricType;
use crate::sketch::{Hll, TimerSketch};

/// The shape of accumulator a name is bound to at first insertion.
/// `Gauge` and `GaugeDelta` samples share one shape (a single gauge
/// value); every other `MetricType` maps to its own kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccumulatorKind {
    Counter,
    Timer,
    Gauge,
    Set,
    KeyVal,
}

impl MetricType {
    /// The accumulator shape this sample type is folded into.
    #[must_use]
    pub const fn accumulator_kind(self) -> AccumulatorKind {
        match self {
            Self::Counter => AccumulatorKind::Counter,
            Self::Timer => AccumulatorKind::Timer,
            Self::Gauge | Self::GaugeDelta => AccumulatorKind::Gauge,
            Self::Set => AccumulatorKind::Set,
            Self::KeyVal => AccumulatorKind::KeyVal,
        }
    }
}

/// Running sum / sum-of-squares / count / min / max, shared by counters
/// and timers.
#[derive(Debug, Clone, Copy)]
pub struct Moments {
    pub sum: f64,
    pub sum_sq: f64,
    pub count: u64,
    min: f64,
    max: f64,
}

impl Moments {
    fn new() -> Self {
        Self {
            sum: 0.0,
            sum_sq: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn record(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
        self.count += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            (self.sum / self.count as f64)
        }
    }

    #[must_use]
    pub fn stddev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.count as f64;
        let mean = self.mean();
        (self.sum_sq / count - mean * mean).max(0.0).sqrt()
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min
        }
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.max
        }
    }
}

/// Sum, sum-of-squares, count, min, max. Derived mean/stddev come from
/// the shared [`Moments`] machinery.
pub struct CounterAcc {
    pub moments: Moments,
}

impl CounterAcc {
    fn new() -> Self {
        Self {
            moments: Moments::new(),
        }
    }

    pub fn add(&mut self, value: f64) {
        self.moments.record(value);
    }
}

/// Fixed-grid histogram: floor bucket, linear bins, ceiling bucket.
pub struct HistogramBins {
    pub config: HistogramConfig,
    pub floor: u64,
    pub bins: Vec<u64>,
    pub ceil: u64,
}

impl HistogramBins {
    /// # Errors
    /// Returns [`MetricsError::InvalidHistogramConfig`] if `config` has
    /// fewer than 3 total bins (see [`HistogramConfig::num_bins`]).
    pub fn new(config: HistogramConfig) -> Result<Self, MetricsError> {
        let num_bins = config.num_bins()?;
        Ok(Self {
            config,
            floor: 0,
            bins: vec![0; num_bins - 2],
            ceil: 0,
        })
    }

    pub fn record(&mut self, value: f64) {
        if value < self.config.min_val {
            self.floor += 1;
            return;
        }
        if value >= self.config.max_val {
            self.ceil += 1;
            return;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = ((value - self.config.min_val) / self.config.bin_width) as usize;
        let idx = idx.min(self.bins.len() - 1);
        self.bins[idx] += 1;
    }
}

/// Streaming quantile sketch, plus the same moments a counter tracks,
/// plus an optional fixed-grid histogram.
pub struct TimerAcc {
    pub sketch: TimerSketch,
    pub moments: Moments,
    pub histogram: Option<HistogramBins>,
}

impl TimerAcc {
    fn new(sig_figs: u8, histogram_config: Option<HistogramConfig>) -> Result<Self, MetricsError> {
        let histogram = histogram_config.map(HistogramBins::new).transpose()?;
        Ok(Self {
            sketch: TimerSketch::new(sig_figs)?,
            moments: Moments::new(),
            histogram,
        })
    }

    pub fn add(&mut self, value: f64) -> Result<(), MetricsError> {
        self.sketch.record(value)?;
        self.moments.record(value);
        if let Some(hist) = &mut self.histogram {
            hist.record(value);
        }
        Ok(())
    }
}

/// A single absolute value, mutated by both `Gauge` (replace) and
/// `GaugeDelta` (add, creating at 0 if absent) samples.
pub struct GaugeAcc {
    pub value: f64,
}

impl GaugeAcc {
    fn new() -> Self {
        Self { value: 0.0 }
    }

    pub fn replace(&mut self, value: f64) {
        self.value = value;
    }

    pub fn delta_add(&mut self, value: f64) {
        self.value += value;
    }
}

/// A probabilistic cardinality estimator.
pub struct SetAcc {
    pub hll: Hll,
}

impl SetAcc {
    fn new(precision: u8) -> Self {
        Self {
            hll: Hll::new(precision),
        }
    }

    pub fn add_member(&mut self, member: &[u8]) {
        self.hll.add(member);
    }

    #[must_use]
    pub fn cardinality(&self) -> u64 {
        self.hll.cardinality()
    }
}

/// Most-recently-observed value (open question (c): replace, not append —
/// see SPEC_FULL.md §3).
pub struct KeyValAcc {
    pub value: f64,
}

impl KeyValAcc {
    fn new() -> Self {
        Self { value: 0.0 }
    }

    pub fn replace(&mut self, value: f64) {
        self.value = value;
    }
}

/// A tagged accumulator, one variant per [`AccumulatorKind`].
pub enum Accumulator {
    Counter(CounterAcc),
    Timer(Box<TimerAcc>),
    Gauge(GaugeAcc),
    Set(Box<SetAcc>),
    KeyVal(KeyValAcc),
}

impl Accumulator {
    #[must_use]
    pub const fn kind(&self) -> AccumulatorKind {
        match self {
            Self::Counter(_) => AccumulatorKind::Counter,
            Self::Timer(_) => AccumulatorKind::Timer,
            Self::Gauge(_) => AccumulatorKind::Gauge,
            Self::Set(_) => AccumulatorKind::Set,
            Self::KeyVal(_) => AccumulatorKind::KeyVal,
        }
    }

    pub(crate) fn new_counter() -> Self {
        Self::Counter(CounterAcc::new())
    }

    pub(crate) fn new_timer(
        sig_figs: u8,
        histogram_config: Option<HistogramConfig>,
    ) -> Result<Self, MetricsError> {
        Ok(Self::Timer(Box::new(TimerAcc::new(
            sig_figs,
            histogram_config,
        )?)))
    }

    pub(crate) fn new_gauge() -> Self {
        Self::Gauge(GaugeAcc::new())
    }

    pub(crate) fn new_set(precision: u8) -> Self {
        Self::Set(Box::new(SetAcc::new(precision)))
    }

    pub(crate) fn new_keyval() -> Self {
        Self::KeyVal(KeyValAcc::new())
    }
}
