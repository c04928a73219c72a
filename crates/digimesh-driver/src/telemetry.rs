//! Driver metrics.
//!
//! Every metric is declared once as a [`Metric`] constant in [`metric_defs`]
//! and described at startup by [`describe_metrics`].
//!
//! ```rust,ignore
//! use digimesh_driver::telemetry::{describe_metrics, metric_defs};
//!
//! describe_metrics();
//! metrics::counter!(metric_defs::FRAMES_RX.name).increment(1);
//! ```

use ::metrics::{describe_counter, describe_gauge, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name.
    pub name: &'static str,
    /// Counter or gauge.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement.
    pub unit: Option<Unit>,
}

impl Metric {
    /// A counter named `name`.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
        }
    }

    /// A gauge named `name`.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
        }
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
        }
    }
}

/// All metrics recorded by the driver.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Valid frames decoded from the serial line.
    pub const FRAMES_RX: Metric = Metric::counter("digimesh.frames.rx")
        .with_description("Frames decoded from the module")
        .with_unit(Unit::Count);

    /// Frames written to the serial line.
    pub const FRAMES_TX: Metric = Metric::counter("digimesh.frames.tx")
        .with_description("Frames sent to the module")
        .with_unit(Unit::Count);

    /// Fragments dropped for a bad checksum, length or layout.
    pub const FRAMES_DROPPED: Metric = Metric::counter("digimesh.frames.dropped")
        .with_description("Malformed frames dropped")
        .with_unit(Unit::Count);

    /// Well-formed frames of a type the driver does not decode.
    pub const FRAMES_UNRECOGNIZED: Metric = Metric::counter("digimesh.frames.unrecognized")
        .with_description("Frames of an unrecognized type")
        .with_unit(Unit::Count);

    /// Raw bytes read from the serial line.
    pub const BYTES_RX: Metric = Metric::counter("digimesh.bytes.rx")
        .with_description("Bytes read from the module")
        .with_unit(Unit::Bytes);

    /// Bytes held in the receive buffer after a read pass.
    pub const RX_BUFFERED: Metric = Metric::gauge("digimesh.rx.buffered")
        .with_description("Bytes waiting in the receive buffer")
        .with_unit(Unit::Bytes);

    /// Every metric above.
    pub const ALL: &[&Metric] = &[
        &FRAMES_RX,
        &FRAMES_TX,
        &FRAMES_DROPPED,
        &FRAMES_UNRECOGNIZED,
        &BYTES_RX,
        &RX_BUFFERED,
    ];
}

/// Describe all metrics. Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
