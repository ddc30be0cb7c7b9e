//! Sample conversion from raw ADC counts to voltages and display values.

use std::fmt;

use rtlink_frame::{MessageKind, SampleArray, ARRAY_LEN};

/// Full-scale input voltage.
pub const FULL_SCALE_VOLTS: f64 = 10.0;
/// Raw count that maps to [`FULL_SCALE_VOLTS`].
pub const FULL_SCALE_COUNTS: f64 = 32767.0;
/// Default display gain.
pub const DEFAULT_DISPLAY_SCALE: i32 = 1004;

/// Normalize a raw sample: `raw * 10 / 32767`.
#[inline]
pub fn raw_to_voltage(raw: i16) -> f64 {
    f64::from(raw) * FULL_SCALE_VOLTS / FULL_SCALE_COUNTS
}

/// Scale a voltage for display, truncating toward zero.
#[inline]
pub fn voltage_to_scaled(voltage: f64, scale: i32) -> i32 {
    (voltage / FULL_SCALE_VOLTS * f64::from(scale)) as i32
}

/// Which inbound signal an array belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Reference,
    Error,
}

impl SignalKind {
    pub const ALL: [SignalKind; 2] = [Self::Reference, Self::Error];

    /// Signal carried by an inbound message kind.
    pub fn from_message(kind: MessageKind) -> Option<Self> {
        match kind {
            MessageKind::RefArray => Some(Self::Reference),
            MessageKind::ErrArray => Some(Self::Error),
            MessageKind::Command | MessageKind::SetParam => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "ref",
            Self::Error => "err",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running voltage extremes of one signal.
///
/// Starts inverted (`min = 10`, `max = -10`) so the first sample sets both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRange {
    pub min: f64,
    pub max: f64,
}

impl Default for SignalRange {
    fn default() -> Self {
        Self {
            min: FULL_SCALE_VOLTS,
            max: -FULL_SCALE_VOLTS,
        }
    }
}

impl SignalRange {
    pub fn include(&mut self, voltage: f64) {
        if voltage < self.min {
            self.min = voltage;
        }
        if voltage > self.max {
            self.max = voltage;
        }
    }
}

/// One converted array, ready for a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArray {
    pub kind: SignalKind,
    /// Per-signal count of arrays converted, starting at 1.
    pub sequence: u64,
    pub raw: Box<SampleArray>,
    pub voltage: Box<[f64; ARRAY_LEN]>,
    pub scaled: Box<[i32; ARRAY_LEN]>,
    /// Running range after this array was folded in.
    pub range: SignalRange,
}

/// Per-signal converter state.
#[derive(Debug, Clone)]
pub struct SignalConverter {
    kind: SignalKind,
    scale: i32,
    range: SignalRange,
    sequence: u64,
}

impl SignalConverter {
    pub fn new(kind: SignalKind, scale: i32) -> Self {
        Self {
            kind,
            scale,
            range: SignalRange::default(),
            sequence: 0,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn range(&self) -> SignalRange {
        self.range
    }

    pub fn convert(&mut self, raw: Box<SampleArray>) -> DecodedArray {
        let mut voltage = Box::new([0.0f64; ARRAY_LEN]);
        let mut scaled = Box::new([0i32; ARRAY_LEN]);
        for (i, sample) in raw.iter().enumerate() {
            let v = raw_to_voltage(*sample);
            self.range.include(v);
            voltage[i] = v;
            scaled[i] = voltage_to_scaled(v, self.scale);
        }
        self.sequence += 1;

        DecodedArray {
            kind: self.kind,
            sequence: self.sequence,
            raw,
            voltage,
            scaled,
            range: self.range,
        }
    }
}
