//! Streaming quantile sketch for `TimerAcc`, specified by contract in
//! spec.md §3/§9 ("any sketch satisfying the stated error bounds is
//! acceptable"). This implementation reuses the teacher's existing
//! `hdrhistogram` dependency and its `HistogramWrapper` pooling idiom,
//! scaling doubles to the fixed-point integers hdrhistogram requires.

use hdrhistogram::Histogram;

use crate::error::MetricsError;

/// Doubles are scaled by this factor before being recorded, giving three
/// decimal digits of sub-integer precision before truncation.
const SCALE: f64 = 1000.0;

/// A `hdrhistogram`-backed quantile sketch over `f64` samples.
pub struct TimerSketch {
    histogram: Histogram<u64>,
}

impl TimerSketch {
    /// Builds a new sketch with `sig_figs` significant decimal digits of
    /// precision (0..=5 per hdrhistogram's contract).
    ///
    /// # Errors
    /// Returns [`MetricsError`] if hdrhistogram rejects the bounds.
    pub fn new(sig_figs: u8) -> Result<Self, MetricsError> {
        let histogram = Histogram::new_with_bounds(1, u64::MAX, sig_figs)?;
        Ok(Self { histogram })
    }

    /// Records one sample. Negative or non-finite values are clamped to
    /// the smallest representable bucket rather than rejected, since the
    /// wire grammar only forbids negative timer values by convention, not
    /// by parser contract.
    ///
    /// # Errors
    /// Returns [`MetricsError`] if hdrhistogram's internal recording fails.
    pub fn record(&mut self, value: f64) -> Result<(), MetricsError> {
        let scaled = Self::to_fixed_point(value);
        self.histogram.record(scaled)?;
        Ok(())
    }

    fn to_fixed_point(value: f64) -> u64 {
        if !value.is_finite() {
            return 1;
        }
        let scaled = (value * SCALE).round();
        if scaled < 1.0 {
            1
        } else if scaled > u64::MAX as f64 {
            u64::MAX
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u64
            }
        }
    }

    /// The value at quantile `q` (`0.0..=1.0`), or `0.0` if the sketch is
    /// empty (the serializer's "quantile rule": never divide by zero).
    #[must_use]
    pub fn value_at_quantile(&self, q: f64) -> f64 {
        if self.histogram.len() == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.histogram.value_at_quantile(q) as f64 / SCALE
        }
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    /// True if no samples have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }
}
