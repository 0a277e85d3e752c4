//! Undo/redo command history.
//!
//! Each [`Command`] describes one already-applied Diagram Store mutation and
//! carries enough serializable entity state to invert itself: removals keep
//! the full records of what they removed (a block removal includes the wires
//! severed by the cascade, a clear keeps the entire prior graph). Commands
//! never hold references into the live graph, so they stay valid however the
//! graph changes around them.
//!
//! Undo applies a command's inverse and pushes the opposite-direction command
//! onto the redo stack; redo does the same in reverse. New commands clear the
//! redo stack (linear history).

use log::debug;

use crate::diagram::{BlockId, ClearedState, Diagram, GroupId, GroupRecord, RemovedBlock, WireId, WireRecord};
use crate::error::DiagramError;

/// A single undoable mutation, as applied.
#[derive(Debug, Clone)]
pub enum Command {
    /// A block was created.
    AddBlock { id: BlockId },
    /// A block was removed, along with every wire touching it.
    RemoveBlock { removed: RemovedBlock },
    /// A wire was created.
    Connect { id: WireId },
    /// A wire was removed.
    Disconnect { removed: WireRecord },
    /// A group was created.
    Group { id: GroupId },
    /// A group was dissolved.
    Ungroup { removed: GroupRecord },
    /// The whole diagram was cleared; `prior` restores it id-for-id,
    /// including the name allocator counters.
    Clear { prior: ClearedState },
    /// Redo-side counterpart of an undone clear: re-clears the diagram and
    /// recaptures the prior state.
    Reclear,
    /// Several commands applied as one step (e.g. delete-selected).
    Batch(Vec<Command>),
}

/// Apply the inverse of `cmd` to the diagram, returning the command for the
/// opposite stack. The pairing is involutive: applying the inverse of the
/// returned command re-applies `cmd`.
fn apply_inverse(diagram: &mut Diagram, cmd: Command) -> Result<Command, DiagramError> {
    match cmd {
        Command::AddBlock { id } => {
            let removed = diagram.remove_block(id)?;
            Ok(Command::RemoveBlock { removed })
        }
        Command::RemoveBlock { removed } => {
            let id = removed.block.id;
            diagram.restore_block(removed.block);
            for wire in removed.wires {
                diagram.restore_wire(wire)?;
            }
            Ok(Command::AddBlock { id })
        }
        Command::Connect { id } => {
            let removed = diagram.disconnect(id)?;
            Ok(Command::Disconnect { removed })
        }
        Command::Disconnect { removed } => {
            let id = removed.id;
            diagram.restore_wire(removed)?;
            Ok(Command::Connect { id })
        }
        Command::Group { id } => {
            let removed = diagram.dissolve_group(id)?;
            Ok(Command::Ungroup { removed })
        }
        Command::Ungroup { removed } => {
            let id = removed.id;
            diagram.restore_group(removed);
            Ok(Command::Group { id })
        }
        Command::Clear { prior } => {
            diagram.restore_state(prior);
            Ok(Command::Reclear)
        }
        Command::Reclear => {
            let prior = diagram.clear();
            Ok(Command::Clear { prior })
        }
        Command::Batch(cmds) => {
            // Invert in reverse application order.
            let mut inverses = Vec::with_capacity(cmds.len());
            for cmd in cmds.into_iter().rev() {
                inverses.push(apply_inverse(diagram, cmd)?);
            }
            inverses.reverse();
            Ok(Command::Batch(inverses))
        }
    }
}

/// Linear undo/redo history over a [`Diagram`]. Unbounded depth.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an already-applied command and invalidate the redo history.
    pub fn push(&mut self, cmd: Command) {
        self.undo_stack.push(cmd);
        self.redo_stack.clear();
    }

    /// Undo the most recent command. Returns false (and does nothing) if the
    /// undo stack is empty.
    pub fn undo(&mut self, diagram: &mut Diagram) -> Result<bool, DiagramError> {
        let Some(cmd) = self.undo_stack.pop() else {
            return Ok(false);
        };
        debug!("undo {}", discriminant_name(&cmd));
        let inverse = apply_inverse(diagram, cmd)?;
        self.redo_stack.push(inverse);
        Ok(true)
    }

    /// Redo the most recently undone command. Returns false (and does
    /// nothing) if the redo stack is empty.
    pub fn redo(&mut self, diagram: &mut Diagram) -> Result<bool, DiagramError> {
        let Some(cmd) = self.redo_stack.pop() else {
            return Ok(false);
        };
        debug!("redo {}", discriminant_name(&cmd));
        let inverse = apply_inverse(diagram, cmd)?;
        self.undo_stack.push(inverse);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Drop all history. Used when a new diagram is adopted wholesale.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn discriminant_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::AddBlock { .. } => "AddBlock",
        Command::RemoveBlock { .. } => "RemoveBlock",
        Command::Connect { .. } => "Connect",
        Command::Disconnect { .. } => "Disconnect",
        Command::Group { .. } => "Group",
        Command::Ungroup { .. } => "Ungroup",
        Command::Clear { .. } => "Clear",
        Command::Reclear => "Reclear",
        Command::Batch(_) => "Batch",
    }
}
