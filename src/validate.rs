//! Connection validation.
//!
//! Decides whether a candidate wire may be created and normalizes the pair so
//! the output port is always the wire's start. Only direction and occupancy
//! are checked; signal-type compatibility between ports is deliberately not
//! enforced.

use crate::diagram::{Diagram, PortDir, PortRef};
use crate::error::ConnectionError;

/// Validate a candidate wire between `a` and `b`.
///
/// Both references must already resolve against the diagram. On success
/// returns the `(output, input)` pair in wire order.
///
/// Rules, in order:
/// 1. no self-loops: the ports must belong to different blocks;
/// 2. exactly one port is an output and the other an input;
/// 3. the input port must be free. Multi-input blocks (SUM) expose multiple
///    distinct input ports; fan-in on a single port is never allowed.
pub fn validate_connection(
    diagram: &Diagram,
    a: PortRef,
    b: PortRef,
) -> Result<(PortRef, PortRef), ConnectionError> {
    if a.block == b.block {
        return Err(ConnectionError::SelfLoop);
    }

    let (start, end) = match (a.dir, b.dir) {
        (PortDir::Output, PortDir::Input) => (a, b),
        (PortDir::Input, PortDir::Output) => (b, a),
        _ => return Err(ConnectionError::DirectionMismatch),
    };

    let occupied = diagram
        .port(end)
        .map(|p| !p.attached.is_empty())
        .unwrap_or(false);
    if occupied {
        return Err(ConnectionError::PortOccupied);
    }

    Ok((start, end))
}
