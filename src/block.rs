//! Block kind catalog: port arities and default properties.
//!
//! The catalog is closed: every block in a diagram has one of these kinds,
//! with port counts and initial properties fixed at creation time. Kinds that
//! fall outside the catalog deserialize as [`BlockKind::Unknown`] with zero
//! ports, so foreign documents still load without inventing connectivity.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The closed set of block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Step,
    Gain,
    Sum,
    Scope,
    Ramp,
    Waveform,
    Constant,
    Lti,
    /// Fallback for kinds outside the catalog. Zero ports, no properties.
    Unknown,
}

impl BlockKind {
    /// Display name used for block naming and the persisted `type` field.
    pub fn label(self) -> &'static str {
        match self {
            BlockKind::Step => "STEP",
            BlockKind::Gain => "GAIN",
            BlockKind::Sum => "SUM",
            BlockKind::Scope => "SCOPE",
            BlockKind::Ramp => "RAMP",
            BlockKind::Waveform => "WAVEFORM",
            BlockKind::Constant => "CONSTANT",
            BlockKind::Lti => "LTI",
            BlockKind::Unknown => "UNKNOWN",
        }
    }

    /// Fixed `(inputs, outputs)` port counts for this kind.
    pub fn port_counts(self) -> (usize, usize) {
        match self {
            BlockKind::Step
            | BlockKind::Ramp
            | BlockKind::Waveform
            | BlockKind::Constant => (0, 1),
            BlockKind::Gain | BlockKind::Lti => (1, 1),
            BlockKind::Sum => (2, 1),
            BlockKind::Scope => (1, 0),
            BlockKind::Unknown => (0, 0),
        }
    }

    /// True if this kind records simulation output (a sink).
    pub fn is_sink(self) -> bool {
        matches!(self, BlockKind::Scope)
    }

    /// Default property map applied at block creation.
    pub fn default_properties(self) -> PropertyMap {
        let mut props = PropertyMap::new();
        match self {
            BlockKind::Step => {
                props.insert("Amplitude".into(), PropertyValue::Number(1.0));
                props.insert("Start Time".into(), PropertyValue::Number(1.0));
            }
            BlockKind::Gain => {
                props.insert("Gain".into(), PropertyValue::Number(1.0));
            }
            BlockKind::Sum => {
                props.insert("Signs".into(), PropertyValue::Text("++".into()));
            }
            BlockKind::Scope => {
                props.insert("Style".into(), PropertyValue::Text("line".into()));
            }
            BlockKind::Ramp => {
                props.insert("Start Time".into(), PropertyValue::Number(0.0));
                props.insert("Slope".into(), PropertyValue::Number(1.0));
            }
            BlockKind::Waveform => {
                props.insert("Wave Type".into(), PropertyValue::Text("sine".into()));
                props.insert("Frequency".into(), PropertyValue::Number(1.0));
                props.insert("Amplitude".into(), PropertyValue::Number(1.0));
                props.insert("Offset".into(), PropertyValue::Number(0.0));
                props.insert("Phase".into(), PropertyValue::Number(0.0));
            }
            BlockKind::Constant => {
                props.insert("Value".into(), PropertyValue::Number(0.0));
            }
            BlockKind::Lti => {
                props.insert("Numerator".into(), PropertyValue::List(vec![1.0]));
                props.insert("Denominator".into(), PropertyValue::List(vec![1.0, 1.0]));
            }
            BlockKind::Unknown => {}
        }
        props
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for BlockKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for BlockKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(match label.as_str() {
            "STEP" => BlockKind::Step,
            "GAIN" => BlockKind::Gain,
            "SUM" => BlockKind::Sum,
            "SCOPE" => BlockKind::Scope,
            "RAMP" => BlockKind::Ramp,
            "WAVEFORM" => BlockKind::Waveform,
            "CONSTANT" => BlockKind::Constant,
            "LTI" => BlockKind::Lti,
            _ => BlockKind::Unknown,
        })
    }
}

/// A typed block property value.
///
/// Untagged so the persisted JSON reads naturally: `{"Gain": 2}`,
/// `{"Signs": "++"}`, `{"Numerator": [1, 0]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
    List(Vec<f64>),
}

impl PropertyValue {
    /// Numeric view of this value. Text is parsed as a decimal number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Text(s) => s.trim().parse().ok(),
            PropertyValue::List(_) => None,
        }
    }

    /// List view of this value. A scalar becomes a one-element list; text is
    /// parsed as comma- or whitespace-separated numbers.
    pub fn as_list(&self) -> Option<Vec<f64>> {
        match self {
            PropertyValue::List(v) => Some(v.clone()),
            PropertyValue::Number(n) => Some(vec![*n]),
            PropertyValue::Text(s) => {
                let parts: Vec<&str> = s
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|p| !p.is_empty())
                    .collect();
                if parts.is_empty() {
                    return None;
                }
                parts.iter().map(|p| p.parse().ok()).collect()
            }
        }
    }

    /// Text view of this value.
    pub fn as_text(&self) -> String {
        match self {
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Number(n) => n.to_string(),
            PropertyValue::List(v) => v
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Ordered property map. Insertion order is preserved so documents
/// round-trip with stable key order.
pub type PropertyMap = IndexMap<String, PropertyValue>;
