//! The current-epoch metrics table: a mapping from metric name to typed
//! accumulator, mutated by every ingress thread during one epoch.

pub mod accumulator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::warn;

use crate::config::DaemonConfig;
use crate::sample::{MetricType, Sample, SampleValue};

pub use accumulator::{Accumulator, AccumulatorKind, CounterAcc, GaugeAcc, KeyValAcc, SetAcc, TimerAcc};

/// A mapping from metric name to typed accumulator, born empty at the
/// start of an epoch and made immutable by rotation.
pub struct Registry {
    entries: DashMap<String, Accumulator>,
    config: Arc<DaemonConfig>,
    sig_figs: u8,
    created_at: u64,
    rotated: AtomicBool,
}

impl Registry {
    /// Builds a fresh, empty registry for the epoch starting at
    /// `created_at` (Unix seconds, supplied by the caller's epoch clock).
    #[must_use]
    pub fn new(config: Arc<DaemonConfig>, created_at: u64) -> Self {
        let sig_figs = config.sig_figs();
        Self {
            entries: DashMap::new(),
            config,
            sig_figs,
            created_at,
            rotated: AtomicBool::new(false),
        }
    }

    /// The Unix-second timestamp every record emitted from this registry
    /// carries.
    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The name of the configured input counter, if any (§4.4: every
    /// accepted sample increments this counter in the registry that
    /// received it).
    #[must_use]
    pub fn input_counter_name(&self) -> Option<&str> {
        self.config.input_counter.as_deref()
    }

    /// The configuration this registry (and its epoch) was built with.
    #[must_use]
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Folds one sample into its named accumulator, creating the
    /// accumulator on first sight of the name. If `name` already exists
    /// bound to a different [`AccumulatorKind`], the sample is silently
    /// ignored (open question (a), pinned down in SPEC_FULL.md §3).
    pub fn add_sample(&self, sample: &Sample<'_>) {
        if self.rotated.load(Ordering::Acquire) {
            warn!(metric = sample.name, "add_sample after rotation, dropped");
            return;
        }

        match (sample.metric_type, sample.value) {
            (MetricType::Counter, SampleValue::Number(v)) => self.with_counter(sample.name, v),
            (MetricType::Timer, SampleValue::Number(v)) => self.with_timer(sample.name, v),
            (MetricType::Gauge, SampleValue::Number(v)) => self.with_gauge(sample.name, v, false),
            (MetricType::GaugeDelta, SampleValue::Number(v)) => {
                self.with_gauge(sample.name, v, true);
            }
            (MetricType::KeyVal, SampleValue::Number(v)) => self.with_keyval(sample.name, v),
            (MetricType::Set, SampleValue::Member(member)) => self.set_update(sample.name, member),
            _ => warn!(metric = sample.name, "sample value/type mismatch, dropped"),
        }
    }

    /// Folds `member` into the set accumulator named `name`.
    pub fn set_update(&self, name: &str, member: &[u8]) {
        if self.rotated.load(Ordering::Acquire) {
            warn!(metric = name, "set_update after rotation, dropped");
            return;
        }
        let precision = self.config.set_precision;
        self.with_kind(
            name,
            AccumulatorKind::Set,
            || Accumulator::new_set(precision),
            |acc| {
                if let Accumulator::Set(set) = acc {
                    set.add_member(member);
                }
            },
        );
    }

    fn with_counter(&self, name: &str, value: f64) {
        self.with_kind(
            name,
            AccumulatorKind::Counter,
            Accumulator::new_counter,
            |acc| {
                if let Accumulator::Counter(counter) = acc {
                    counter.add(value);
                }
            },
        );
    }

    fn with_timer(&self, name: &str, value: f64) {
        // Timer construction is fallible (a bad histogram config) and
        // expensive (a full hdrhistogram::Histogram), so unlike the other
        // kinds it can't go through a plain `or_insert_with` closure built
        // from an already-evaluated value — it must only run on the
        // vacant-entry path, never on every sample for an existing name.
        let mut entry = match self.entries.entry(name.to_string()) {
            Entry::Occupied(occ) => occ.into_ref(),
            Entry::Vacant(vac) => {
                let sig_figs = self.sig_figs;
                let histogram_config = (self.config.histograms)(name);
                let built = match Accumulator::new_timer(sig_figs, histogram_config) {
                    Ok(acc) => acc,
                    Err(err) => {
                        warn!(metric = name, error = %err, "failed to build timer accumulator, sample dropped");
                        return;
                    }
                };
                vac.insert(built)
            }
        };

        if entry.kind() != AccumulatorKind::Timer {
            warn!(
                metric = name,
                existing = ?entry.kind(),
                incoming = ?AccumulatorKind::Timer,
                "metric type conflict, sample dropped"
            );
            return;
        }
        if let Accumulator::Timer(timer) = &mut *entry {
            if let Err(err) = timer.add(value) {
                warn!(metric = name, error = %err, "failed to record timer sample");
            }
        }
    }

    fn with_gauge(&self, name: &str, value: f64, is_delta: bool) {
        self.with_kind(name, AccumulatorKind::Gauge, Accumulator::new_gauge, |acc| {
            if let Accumulator::Gauge(gauge) = acc {
                if is_delta {
                    gauge.delta_add(value);
                } else {
                    gauge.replace(value);
                }
            }
        });
    }

    fn with_keyval(&self, name: &str, value: f64) {
        self.with_kind(
            name,
            AccumulatorKind::KeyVal,
            Accumulator::new_keyval,
            |acc| {
                if let Accumulator::KeyVal(keyval) = acc {
                    keyval.replace(value);
                }
            },
        );
    }

    /// Looks up (or lazily builds via `new_fn`) the accumulator for
    /// `name`, checking it matches `kind` before mutating it with `f`.
    ///
    /// `new_fn` is only invoked when `name` is not yet present —
    /// `DashMap::entry().or_insert_with` defers the closure itself, so
    /// an existing entry never pays the allocation cost of building a
    /// fresh accumulator it is about to discard.
    fn with_kind(
        &self,
        name: &str,
        kind: AccumulatorKind,
        new_fn: impl FnOnce() -> Accumulator,
        f: impl FnOnce(&mut Accumulator),
    ) {
        let mut entry = self.entries.entry(name.to_string()).or_insert_with(new_fn);
        if entry.kind() != kind {
            warn!(
                metric = name,
                existing = ?entry.kind(),
                incoming = ?kind,
                "metric type conflict, sample dropped"
            );
            return;
        }
        f(&mut entry);
    }

    /// Visits every `(name, accumulator)` pair in unspecified order. Only
    /// called after rotation, on the worker thread owning this registry.
    pub fn iterate(&self, mut visitor: impl FnMut(&str, &Accumulator)) {
        for entry in &self.entries {
            visitor(entry.key(), entry.value());
        }
    }

    /// Marks this registry as rotated: subsequent `add_sample`/
    /// `set_update` calls become no-ops instead of mutating retired data.
    pub fn mark_rotated(&self) {
        self.rotated.store(true, Ordering::Release);
    }

    /// Releases all accumulators. The registry can still be dropped
    /// normally; this exists for callers that want an explicit release
    /// point distinct from the registry's last reference going away.
    pub fn destroy(&self) {
        self.entries.clear();
    }
}
