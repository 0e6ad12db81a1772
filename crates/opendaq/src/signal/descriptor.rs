//! Data descriptors: the static metadata a signal or domain signal
//! attaches to every `DataPacket` it emits.

use std::collections::HashMap;

use crate::property::{PropertyValue, Ratio, Unit};

/// Physical sample layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    Undefined,
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    ComplexFloat32,
    ComplexFloat64,
    Binary,
    String,
    Struct,
}

impl SampleType {
    /// Size in bytes of one sample, or `None` for variable-length types
    /// (`Binary`, `String`, `Struct`).
    #[must_use]
    pub fn size_bytes(self) -> Option<usize> {
        match self {
            SampleType::Undefined => None,
            SampleType::Int8 | SampleType::UInt8 => Some(1),
            SampleType::Int16 | SampleType::UInt16 => Some(2),
            SampleType::Int32 | SampleType::UInt32 | SampleType::Float32 => Some(4),
            SampleType::Int64 | SampleType::UInt64 | SampleType::Float64 | SampleType::ComplexFloat32 => Some(8),
            SampleType::ComplexFloat64 => Some(16),
            SampleType::Binary | SampleType::String | SampleType::Struct => None,
        }
    }
}

/// How sample values at a given index map to domain (e.g. time) values.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Values are carried explicitly in each packet's buffer.
    Explicit,
    /// `value(n) = start + n * delta`; no buffer is sent, only a sample
    /// count, until the rule's parameters change.
    Linear { delta: i64, start: i64 },
    /// Every sample in the packet shares one value until a later packet
    /// changes it.
    Constant { value: PropertyValue },
}

/// One dimension of a multi-dimensional signal (e.g. an FFT bin axis).
#[derive(Debug, Clone)]
pub struct Dimension {
    pub name: String,
    pub rule: Rule,
    pub unit: Option<Unit>,
}

/// Static metadata describing the samples a signal emits.
#[derive(Debug, Clone)]
pub struct DataDescriptor {
    pub name: String,
    pub sample_type: SampleType,
    pub rule: Rule,
    pub dimensions: Vec<Dimension>,
    pub unit: Option<Unit>,
    /// Domain tick resolution, e.g. 1/1_000_000 seconds per tick.
    pub tick_resolution: Option<Ratio>,
    pub origin: Option<String>,
    pub post_scaling: Option<ScalingRule>,
    pub metadata: HashMap<String, String>,
}

/// Linear post-scaling applied after decoding raw samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingRule {
    pub scale: f64,
    pub offset: f64,
}

impl DataDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, sample_type: SampleType, rule: Rule) -> Self {
        Self {
            name: name.into(),
            sample_type,
            rule,
            dimensions: Vec::new(),
            unit: None,
            tick_resolution: None,
            origin: None,
            post_scaling: None,
            metadata: HashMap::new(),
        }
    }

    /// Whether a packet using this descriptor carries sample values in
    /// its buffer at all (`Explicit` does; `Linear`/`Constant` encode
    /// values structurally and only need a count).
    #[must_use]
    pub fn carries_buffer(&self) -> bool {
        matches!(self.rule, Rule::Explicit)
    }
}
