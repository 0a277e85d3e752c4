//! The editing surface consumed by a UI layer.
//!
//! [`Editor`] owns the Diagram Store and its command history and exposes the
//! operations a toolbar/canvas would issue: add/delete, wire, group, undo,
//! redo, save, load, new-diagram, simulate. Every mutating operation is
//! recorded as one undoable step. All methods are synchronous and the editor
//! is single-threaded by construction; the only long-running call is
//! `simulate`, which operates on an immutable snapshot taken at compile time,
//! so edits made afterwards never affect a submission already handed to the
//! engine.

use std::path::Path;

use log::info;

use crate::block::{BlockKind, PropertyValue};
use crate::diagram::{BlockId, Diagram, GroupId, ItemId, PortRef, WireId};
use crate::document::{self, DiagramDoc};
use crate::error::{DiagramError, SimulationError};
use crate::history::{Command, History};
use crate::sim::{self, EngineRequest, EngineResults, SimulationEngine};

#[derive(Debug, Default)]
pub struct Editor {
    diagram: Diagram,
    history: History,
    /// Set while a compiled request is outstanding; re-entrant simulation
    /// requests are rejected rather than queued.
    simulating: bool,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the live graph.
    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    /// Read-only materialized view of the current graph.
    pub fn snapshot(&self) -> DiagramDoc {
        self.diagram.snapshot()
    }

    // ── editing ─────────────────────────────────────────────────────────────

    pub fn add_block(&mut self, kind: BlockKind, x: f64, y: f64) -> BlockId {
        let id = self.diagram.add_block(kind, x, y);
        self.history.push(Command::AddBlock { id });
        id
    }

    pub fn remove_block(&mut self, id: BlockId) -> Result<(), DiagramError> {
        let removed = self.diagram.remove_block(id)?;
        self.history.push(Command::RemoveBlock { removed });
        Ok(())
    }

    pub fn connect(&mut self, a: PortRef, b: PortRef) -> Result<WireId, DiagramError> {
        let id = self.diagram.connect(a, b)?;
        self.history.push(Command::Connect { id });
        Ok(id)
    }

    pub fn disconnect(&mut self, id: WireId) -> Result<(), DiagramError> {
        let removed = self.diagram.disconnect(id)?;
        self.history.push(Command::Disconnect { removed });
        Ok(())
    }

    /// Delete a mixed selection of items as one undoable step.
    ///
    /// Every listed item must exist up front; after that the whole batch
    /// applies. Wires are severed first so that block cascades do not race
    /// the explicit deletions; a listed wire that a block cascade has already
    /// removed is simply skipped.
    pub fn delete_selected(&mut self, items: &[ItemId]) -> Result<(), DiagramError> {
        for item in items {
            match *item {
                ItemId::Block(id) if self.diagram.block(id).is_none() => {
                    return Err(DiagramError::BlockNotFound(id));
                }
                ItemId::Wire(id) if self.diagram.wire(id).is_none() => {
                    return Err(DiagramError::WireNotFound(id));
                }
                ItemId::Group(id) if self.diagram.group(id).is_none() => {
                    return Err(DiagramError::GroupNotFound(id));
                }
                _ => {}
            }
        }

        let mut batch = Vec::new();
        for item in items {
            if let ItemId::Wire(id) = *item {
                let removed = self.diagram.disconnect(id)?;
                batch.push(Command::Disconnect { removed });
            }
        }
        for item in items {
            match *item {
                ItemId::Block(id) => {
                    let removed = self.diagram.remove_block(id)?;
                    batch.push(Command::RemoveBlock { removed });
                }
                ItemId::Group(id) => {
                    let removed = self.diagram.dissolve_group(id)?;
                    batch.push(Command::Ungroup { removed });
                }
                ItemId::Wire(_) => {}
            }
        }
        if !batch.is_empty() {
            self.history.push(Command::Batch(batch));
        }
        Ok(())
    }

    pub fn group(
        &mut self,
        name: impl Into<String>,
        members: Vec<ItemId>,
    ) -> Result<GroupId, DiagramError> {
        let id = self.diagram.create_group(name, members)?;
        self.history.push(Command::Group { id });
        Ok(id)
    }

    pub fn ungroup(&mut self, id: GroupId) -> Result<(), DiagramError> {
        let removed = self.diagram.dissolve_group(id)?;
        self.history.push(Command::Ungroup { removed });
        Ok(())
    }

    /// Move a block. Positional tweaks are not recorded in the history.
    pub fn set_position(&mut self, id: BlockId, x: f64, y: f64) -> Result<(), DiagramError> {
        self.diagram.set_position(id, x, y)
    }

    /// Edit one block property (the property-inspector surface).
    pub fn set_property(
        &mut self,
        id: BlockId,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), DiagramError> {
        self.diagram.set_property(id, name, value)
    }

    /// Clear the diagram as an undoable step.
    pub fn clear(&mut self) {
        let prior = self.diagram.clear();
        self.history.push(Command::Clear { prior });
    }

    /// Start over with an empty diagram and no history.
    pub fn new_diagram(&mut self) {
        info!("new diagram");
        self.diagram.clear();
        self.history.clear();
    }

    // ── undo / redo ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> Result<bool, DiagramError> {
        self.history.undo(&mut self.diagram)
    }

    pub fn redo(&mut self) -> Result<bool, DiagramError> {
        self.history.redo(&mut self.diagram)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ── persistence ─────────────────────────────────────────────────────────

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        self.snapshot().save_json(path)
    }

    pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        self.snapshot().save_binary(path)
    }

    /// Load a JSON document, replacing the live diagram only on full success.
    /// A successful load drops the undo history: its commands refer to the
    /// replaced graph.
    pub fn load_json<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<()> {
        let doc = DiagramDoc::load_json(path)?;
        document::load_into(&mut self.diagram, &doc)?;
        self.history.clear();
        Ok(())
    }

    pub fn load_binary<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<()> {
        let doc = DiagramDoc::load_binary(path)?;
        document::load_into(&mut self.diagram, &doc)?;
        self.history.clear();
        Ok(())
    }

    // ── simulation ──────────────────────────────────────────────────────────

    /// Validate and compile the current graph, marking a simulation as
    /// outstanding. Fails with [`SimulationError::Busy`] if one already is.
    /// The caller hands the request to the engine and then calls
    /// [`Editor::finish_simulation`].
    pub fn begin_simulation(&mut self) -> Result<EngineRequest, SimulationError> {
        if self.simulating {
            return Err(SimulationError::Busy);
        }
        let request = sim::compile(&self.snapshot())?;
        self.simulating = true;
        Ok(request)
    }

    /// Mark the outstanding simulation as finished.
    pub fn finish_simulation(&mut self) {
        self.simulating = false;
    }

    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    /// Compile the current graph and run it to completion on `engine`.
    ///
    /// The request is built from a snapshot taken here; the engine failure,
    /// if any, is passed through unchanged.
    pub fn simulate(
        &mut self,
        engine: &mut dyn SimulationEngine,
        duration: f64,
    ) -> Result<EngineResults, SimulationError> {
        let request = self.begin_simulation()?;
        let result = engine.run(&request, duration);
        self.finish_simulation();
        Ok(result?)
    }
}
