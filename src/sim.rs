//! Simulation bridge.
//!
//! Compiles a diagram snapshot into an [`EngineRequest`] for an external
//! numerical simulation engine and maps its results back. The engine itself
//! is opaque behind the [`SimulationEngine`] trait: this crate never performs
//! numerical integration, it only guarantees that the request it submits is
//! structurally sound (a sink exists, every wire endpoint is live, every
//! property coerces to the parameter type the engine expects).

use std::collections::BTreeMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::block::{BlockKind, PropertyMap};
use crate::document::DiagramDoc;
use crate::error::{CompileError, EngineError};

// ────────────────────────────────────────────────────────────────────────────
// Engine request
// ────────────────────────────────────────────────────────────────────────────

/// A parameter value in the engine's expected type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Scalar(f64),
    Text(String),
    Series(Vec<f64>),
}

/// One named engine parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParam {
    pub name: String,
    pub value: ParamValue,
}

/// One block instance to construct engine-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineBlock {
    pub name: String,
    pub kind: BlockKind,
    pub params: Vec<EngineParam>,
}

/// One terminal-to-terminal connection request. Terminals correspond to the
/// diagram's port indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConnection {
    pub source: String,
    pub source_terminal: usize,
    pub target: String,
    pub target_terminal: usize,
}

/// A compiled graph, ready for submission to the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineRequest {
    pub blocks: Vec<EngineBlock>,
    pub connections: Vec<EngineConnection>,
}

/// One recorded time/value series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    pub time: Vec<f64>,
    pub values: Vec<f64>,
}

/// Simulation output, keyed by sink block name.
pub type EngineResults = BTreeMap<String, TimeSeries>;

/// The external simulation engine boundary.
///
/// Failures are surfaced unchanged as [`EngineError`] and never retried here.
pub trait SimulationEngine {
    fn run(&mut self, request: &EngineRequest, duration: f64) -> Result<EngineResults, EngineError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Per-kind parameter registry
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum ParamTarget {
    Scalar,
    Text,
    Series,
}

impl ParamTarget {
    fn expected(self) -> &'static str {
        match self {
            ParamTarget::Scalar => "a number",
            ParamTarget::Text => "text",
            ParamTarget::Series => "a numeric list",
        }
    }
}

/// Which properties a kind hands to the engine, and as what type.
struct ParamSpec {
    property: &'static str,
    target: ParamTarget,
}

const fn spec(property: &'static str, target: ParamTarget) -> ParamSpec {
    ParamSpec { property, target }
}

/// Static constructor registry: property set per block kind, in the order
/// the engine expects. `None` means the kind has no engine constructor.
fn kind_params(kind: BlockKind) -> Option<&'static [ParamSpec]> {
    use ParamTarget::*;
    match kind {
        BlockKind::Step => Some(const {
            &[
                spec("Amplitude", Scalar),
                spec("Start Time", Scalar),
            ]
        }),
        BlockKind::Gain => Some(const { &[spec("Gain", Scalar)] }),
        BlockKind::Sum => Some(const { &[spec("Signs", Text)] }),
        BlockKind::Scope => Some(const { &[spec("Style", Text)] }),
        BlockKind::Ramp => Some(const { &[spec("Start Time", Scalar), spec("Slope", Scalar)] }),
        BlockKind::Waveform => Some(const {
            &[
                spec("Wave Type", Text),
                spec("Frequency", Scalar),
                spec("Amplitude", Scalar),
                spec("Offset", Scalar),
                spec("Phase", Scalar),
            ]
        }),
        BlockKind::Constant => Some(const { &[spec("Value", Scalar)] }),
        BlockKind::Lti => Some(const {
            &[
                spec("Numerator", Series),
                spec("Denominator", Series),
            ]
        }),
        BlockKind::Unknown => None,
    }
}

fn coerce(
    block: &str,
    properties: &PropertyMap,
    spec: &ParamSpec,
) -> Result<ParamValue, CompileError> {
    let value = properties
        .get(spec.property)
        .ok_or_else(|| CompileError::MissingProperty {
            block: block.to_string(),
            property: spec.property.to_string(),
        })?;
    let coerced = match spec.target {
        ParamTarget::Scalar => value.as_number().map(ParamValue::Scalar),
        ParamTarget::Series => value.as_list().map(ParamValue::Series),
        ParamTarget::Text => Some(ParamValue::Text(value.as_text())),
    };
    coerced.ok_or_else(|| CompileError::PropertyCoercion {
        block: block.to_string(),
        property: spec.property.to_string(),
        expected: spec.target.expected(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Validation & compilation
// ────────────────────────────────────────────────────────────────────────────

/// Structural checks that must pass before the engine is ever invoked:
/// at least one sink block exists, and every wire endpoint names a block
/// present in the snapshot.
pub fn validate_for_simulation(snapshot: &DiagramDoc) -> Result<(), CompileError> {
    if !snapshot.blocks.iter().any(|b| b.kind.is_sink()) {
        return Err(CompileError::MissingSink);
    }
    for wire in &snapshot.wires {
        for name in [&wire.start, &wire.end] {
            if !snapshot.blocks.iter().any(|b| &b.name == name) {
                return Err(CompileError::DanglingWire(name.clone()));
            }
        }
    }
    Ok(())
}

/// Compile a snapshot into an engine request.
///
/// Any coercion or lookup failure aborts the whole compilation; no partial
/// request is ever produced.
pub fn compile(snapshot: &DiagramDoc) -> Result<EngineRequest, CompileError> {
    validate_for_simulation(snapshot)?;

    let mut request = EngineRequest::default();
    for entry in &snapshot.blocks {
        let specs = kind_params(entry.kind)
            .ok_or_else(|| CompileError::NoConstructor(entry.name.clone()))?;
        let params = specs
            .iter()
            .map(|s| {
                coerce(&entry.name, &entry.properties, s).map(|value| EngineParam {
                    name: s.property.to_string(),
                    value,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        request.blocks.push(EngineBlock {
            name: entry.name.clone(),
            kind: entry.kind,
            params,
        });
    }

    for wire in &snapshot.wires {
        request.connections.push(EngineConnection {
            source: wire.start.clone(),
            source_terminal: wire.start_port_index,
            target: wire.end.clone(),
            target_terminal: wire.end_port_index,
        });
    }

    info!(
        "compiled {} blocks, {} connections",
        request.blocks.len(),
        request.connections.len()
    );
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::PropertyValue;
    use crate::document::{BlockEntry, WireEntry};

    fn entry(kind: BlockKind, name: &str) -> BlockEntry {
        BlockEntry {
            kind,
            name: name.to_string(),
            properties: kind.default_properties(),
            x: 0.0,
            y: 0.0,
        }
    }

    fn wired_snapshot() -> DiagramDoc {
        DiagramDoc {
            blocks: vec![
                entry(BlockKind::Step, "STEP 1"),
                entry(BlockKind::Gain, "GAIN 1"),
                entry(BlockKind::Scope, "SCOPE 1"),
            ],
            wires: vec![
                WireEntry {
                    start: "STEP 1".into(),
                    start_port_index: 0,
                    end: "GAIN 1".into(),
                    end_port_index: 0,
                },
                WireEntry {
                    start: "GAIN 1".into(),
                    start_port_index: 0,
                    end: "SCOPE 1".into(),
                    end_port_index: 0,
                },
            ],
        }
    }

    #[test]
    fn compile_produces_blocks_and_connections() {
        let request = compile(&wired_snapshot()).unwrap();
        assert_eq!(request.blocks.len(), 3);
        assert_eq!(request.connections.len(), 2);
        let gain = &request.blocks[1];
        assert_eq!(gain.params[0].name, "Gain");
        assert_eq!(gain.params[0].value, ParamValue::Scalar(1.0));
        assert_eq!(request.connections[1].source, "GAIN 1");
        assert_eq!(request.connections[1].target_terminal, 0);
    }

    #[test]
    fn missing_sink_rejected_before_engine() {
        let mut snapshot = wired_snapshot();
        snapshot.blocks.retain(|b| b.kind != BlockKind::Scope);
        snapshot.wires.truncate(1);
        assert_eq!(compile(&snapshot), Err(CompileError::MissingSink));
    }

    #[test]
    fn scope_with_no_wires_still_validates() {
        let snapshot = DiagramDoc {
            blocks: vec![entry(BlockKind::Scope, "SCOPE 1")],
            wires: vec![],
        };
        assert!(compile(&snapshot).is_ok());
    }

    #[test]
    fn dangling_wire_rejected() {
        let mut snapshot = wired_snapshot();
        snapshot.blocks.remove(0);
        let err = compile(&snapshot).unwrap_err();
        assert_eq!(err, CompileError::DanglingWire("STEP 1".into()));
    }

    #[test]
    fn text_property_coerces_to_scalar() {
        let mut snapshot = wired_snapshot();
        snapshot.blocks[1]
            .properties
            .insert("Gain".into(), PropertyValue::Text("2.5".into()));
        let request = compile(&snapshot).unwrap();
        assert_eq!(request.blocks[1].params[0].value, ParamValue::Scalar(2.5));
    }

    #[test]
    fn bad_coercion_names_block_and_property() {
        let mut snapshot = wired_snapshot();
        snapshot.blocks[1]
            .properties
            .insert("Gain".into(), PropertyValue::Text("huge".into()));
        let err = compile(&snapshot).unwrap_err();
        assert_eq!(
            err,
            CompileError::PropertyCoercion {
                block: "GAIN 1".into(),
                property: "Gain".into(),
                expected: "a number",
            }
        );
    }

    #[test]
    fn lti_series_parameters() {
        let snapshot = DiagramDoc {
            blocks: vec![
                entry(BlockKind::Lti, "LTI 1"),
                entry(BlockKind::Scope, "SCOPE 1"),
            ],
            wires: vec![],
        };
        let request = compile(&snapshot).unwrap();
        let lti = &request.blocks[0];
        assert_eq!(lti.params[0].value, ParamValue::Series(vec![1.0]));
        assert_eq!(lti.params[1].value, ParamValue::Series(vec![1.0, 1.0]));
    }

    #[test]
    fn unknown_kind_has_no_constructor() {
        let snapshot = DiagramDoc {
            blocks: vec![
                entry(BlockKind::Unknown, "UNKNOWN 1"),
                entry(BlockKind::Scope, "SCOPE 1"),
            ],
            wires: vec![],
        };
        assert_eq!(
            compile(&snapshot),
            Err(CompileError::NoConstructor("UNKNOWN 1".into()))
        );
    }
}
