//! Error taxonomy for the diagram engine.
//!
//! Structural errors (`DiagramError`) are resolved at the store boundary: the
//! attempted operation simply does not apply and invariants stay intact.
//! Document and compile errors abort their whole operation so that neither the
//! live diagram nor the engine ever sees a partial result.

use thiserror::Error;

use crate::diagram::{BlockId, GroupId, WireId};

/// Why a candidate wire was rejected by the connection validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("both ports belong to the same block")]
    SelfLoop,
    #[error("a wire must connect exactly one output port to one input port")]
    DirectionMismatch,
    #[error("the destination input port already has a wire attached")]
    PortOccupied,
}

/// Errors raised by Diagram Store mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagramError {
    #[error("no block with id {0:?}")]
    BlockNotFound(BlockId),
    #[error("no wire with id {0:?}")]
    WireNotFound(WireId),
    #[error("no group with id {0:?}")]
    GroupNotFound(GroupId),
    #[error("port index {index} out of range for {direction} ports of block {block:?}")]
    PortOutOfRange {
        block: BlockId,
        direction: &'static str,
        index: usize,
    },
    #[error("a group must contain at least one item")]
    EmptyGroup,
    #[error("group membership would become cyclic")]
    GroupCycle,
    #[error("item already belongs to another group")]
    AlreadyGrouped,
    #[error("invalid connection: {0}")]
    Connection(#[from] ConnectionError),
}

/// Errors raised while reading or staging a persisted document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("wire references unknown block name {0:?}")]
    UnknownBlock(String),
    #[error("wire references port index {index} on block {block:?}, which has {available} {direction} ports")]
    PortIndexOutOfRange {
        block: String,
        direction: &'static str,
        index: usize,
        available: usize,
    },
    #[error("wire from {start:?} to {end:?} is not a valid connection: {reason}")]
    InvalidWire {
        start: String,
        end: String,
        reason: ConnectionError,
    },
    #[error("duplicate block name {0:?} in document")]
    DuplicateName(String),
    #[error("invalid magic bytes: expected 'SIGFLOW'")]
    BadMagic,
    #[error("unsupported document version: {0}")]
    UnsupportedVersion(u32),
}

/// Errors raised while compiling a snapshot for the simulation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("diagram has no SCOPE block to record results")]
    MissingSink,
    #[error("wire references block {0:?}, which is not present in the snapshot")]
    DanglingWire(String),
    #[error("block {block:?}: property {property:?} cannot be coerced to {expected}")]
    PropertyCoercion {
        block: String,
        property: String,
        expected: &'static str,
    },
    #[error("block {block:?}: missing required property {property:?}")]
    MissingProperty { block: String, property: String },
    #[error("block {0:?} has no engine constructor (unknown kind)")]
    NoConstructor(String),
}

/// Opaque failure surfaced by the external simulation engine.
///
/// The engine's message is passed through unchanged and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine error: {0}")]
pub struct EngineError(pub String);

/// Errors surfaced by the `simulate` editing operation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("a simulation is already running")]
    Busy,
    #[error(transparent)]
    Engine(#[from] EngineError),
}
