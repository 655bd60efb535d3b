//! Static, process-lifetime configuration: the "Epoch clock + config
//! surface" component of the system overview.

use std::sync::Arc;

use crate::error::MetricsError;

/// A fixed-grid histogram configuration for one metric name, resolved
/// externally (typically pattern-matched against a config file).
///
/// Produces `num_bins` counters: a floor bucket for values below
/// `min_val`, `num_bins - 2` linear bins of width `bin_width`, and a
/// ceiling bucket for values at or above `max_val`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramConfig {
    /// Lower bound of the linear region (exclusive of the floor bucket).
    pub min_val: f64,
    /// Upper bound of the linear region (exclusive of the ceiling bucket).
    pub max_val: f64,
    /// Width of each linear bin.
    pub bin_width: f64,
}

impl HistogramConfig {
    /// Number of bins this config produces: floor + linear bins + ceiling.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidHistogramConfig`] if `bin_width` is
    /// not positive, `max_val <= min_val`, or the resulting bin count is
    /// fewer than 3 (open question (b): a histogram with fewer than two
    /// linear bins is rejected at load time rather than producing a
    /// malformed serialized line).
    pub fn num_bins(&self) -> Result<usize, MetricsError> {
        if !(self.bin_width > 0.0) || !(self.max_val > self.min_val) {
            return Err(MetricsError::InvalidHistogramConfig(format!(
                "non-monotonic or non-positive bounds: min={}, max={}, width={}",
                self.min_val, self.max_val, self.bin_width
            )));
        }
        let span = self.max_val - self.min_val;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let linear_bins = (span / self.bin_width).ceil() as usize;
        let num_bins = linear_bins + 2;
        if num_bins < 3 {
            return Err(MetricsError::InvalidHistogramConfig(format!(
                "num_bins {num_bins} < 3 (floor + at least one linear bin + ceiling required)"
            )));
        }
        Ok(num_bins)
    }

    /// Validates the config, discarding the bin count.
    ///
    /// # Errors
    /// See [`Self::num_bins`].
    pub fn validate(&self) -> Result<(), MetricsError> {
        self.num_bins().map(|_| ())
    }
}

/// Resolves a metric name to an optional histogram configuration.
pub type HistogramResolver = Arc<dyn Fn(&str) -> Option<HistogramConfig> + Send + Sync>;

/// Process-lifetime configuration, shared read-only by every ingress
/// thread, the flush controller, and the serializer.
pub struct DaemonConfig {
    /// Target error bound for the timer quantile sketch, `0 < eps < 1`.
    pub timer_eps: f64,
    /// HyperLogLog precision (number of register-index bits, 4..=16).
    pub set_precision: u8,
    /// `name -> HistogramConfig` lookup; `None` means "no histogram for
    /// this timer".
    pub histograms: HistogramResolver,
    /// If true, the serializer emits the binary wire format; otherwise text.
    pub binary_stream: bool,
    /// If set, every accepted sample increments this named counter in the
    /// registry that received it.
    pub input_counter: Option<String>,
}

impl DaemonConfig {
    /// Builds a config with no histograms configured for any metric.
    #[must_use]
    pub fn new(timer_eps: f64, set_precision: u8) -> Self {
        Self {
            timer_eps,
            set_precision,
            histograms: Arc::new(|_| None),
            binary_stream: false,
            input_counter: None,
        }
    }

    /// Converts `timer_eps` into the hdrhistogram significant-figures
    /// parameter used by [`crate::sketch::quantile::TimerSketch`].
    ///
    /// hdrhistogram only accepts integral significant figures in
    /// `0..=5`; we round `-log10(eps)` to the nearest such value. A
    /// smaller `eps` (tighter bound) maps to more significant figures.
    #[must_use]
    pub fn sig_figs(&self) -> u8 {
        if !(self.timer_eps > 0.0) || !(self.timer_eps < 1.0) {
            return 3;
        }
        let sig_figs = (-self.timer_eps.log10()).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sig_figs = sig_figs.clamp(0.0, 5.0) as u8;
        sig_figs
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::new(0.01, 14)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_num_bins_matches_s2_scenario() {
        // S2: min=0, max=10, width=5 -> floor, [0,5), [5,10), ceil = 4 bins.
        let cfg = HistogramConfig {
            min_val: 0.0,
            max_val: 10.0,
            bin_width: 5.0,
        };
        assert_eq!(cfg.num_bins().unwrap(), 4);
    }

    #[test]
    fn histogram_rejects_too_few_bins() {
        let cfg = HistogramConfig {
            min_val: 0.0,
            max_val: 1.0,
            bin_width: 10.0,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sig_figs_clamped_and_monotonic() {
        let loose = DaemonConfig::new(0.5, 14).sig_figs();
        let tight = DaemonConfig::new(0.0001, 14).sig_figs();
        assert!(tight >= loose);
        assert!(tight <= 5);
    }
}
