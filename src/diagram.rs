//! The Diagram Store: the authoritative in-memory graph.
//!
//! Entities live in creation-ordered arenas keyed by id. Ports are owned
//! inline by their block; wires reference their endpoints by
//! [`PortRef`] (block id, direction, index) rather than by direct reference,
//! so cascade deletion is a lookup-and-remove over the arenas and no ownership
//! cycles exist. Every mutation either fully applies or fails without
//! touching the graph.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::block::{BlockKind, PropertyMap, PropertyValue};
use crate::error::DiagramError;
use crate::naming::NameAllocator;
use crate::validate::validate_connection;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Any diagram item that can belong to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemId {
    Block(BlockId),
    Wire(WireId),
    Group(GroupId),
}

// ────────────────────────────────────────────────────────────────────────────
// Entities
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDir {
    Input,
    Output,
}

impl PortDir {
    pub fn label(self) -> &'static str {
        match self {
            PortDir::Input => "input",
            PortDir::Output => "output",
        }
    }
}

/// Reference to one port of one block. Indices are stable and contiguous
/// within their direction for the block's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub block: BlockId,
    pub dir: PortDir,
    pub index: usize,
}

/// A connection point owned by exactly one block.
///
/// `attached` is a non-owning back-reference used only for traversal and
/// cascade deletion; the wires themselves live in the store's arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub dir: PortDir,
    pub index: usize,
    pub attached: Vec<WireId>,
}

/// A typed node with fixed port arity.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub name: String,
    pub properties: PropertyMap,
    pub x: f64,
    pub y: f64,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl Block {
    fn new(kind: BlockKind, name: String, x: f64, y: f64) -> Self {
        let (n_in, n_out) = kind.port_counts();
        let make_ports = |dir, n| {
            (0..n)
                .map(|index| Port {
                    dir,
                    index,
                    attached: Vec::new(),
                })
                .collect()
        };
        Block {
            kind,
            name,
            properties: kind.default_properties(),
            x,
            y,
            inputs: make_ports(PortDir::Input, n_in),
            outputs: make_ports(PortDir::Output, n_out),
        }
    }

    fn port(&self, dir: PortDir, index: usize) -> Option<&Port> {
        match dir {
            PortDir::Input => self.inputs.get(index),
            PortDir::Output => self.outputs.get(index),
        }
    }

    fn port_mut(&mut self, dir: PortDir, index: usize) -> Option<&mut Port> {
        match dir {
            PortDir::Input => self.inputs.get_mut(index),
            PortDir::Output => self.outputs.get_mut(index),
        }
    }
}

/// A directed edge from one output port to one input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    /// Always an output port.
    pub start: PortRef,
    /// Always an input port.
    pub end: PortRef,
}

/// A named set of items treated as one unit. Groups may nest; membership is
/// acyclic and every item has at most one immediate group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub members: Vec<ItemId>,
}

// ────────────────────────────────────────────────────────────────────────────
// Records (serializable entity state for undo/redo)
// ────────────────────────────────────────────────────────────────────────────

/// Full state of a removed block, sufficient to recreate it with the same id.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub id: BlockId,
    pub kind: BlockKind,
    pub name: String,
    pub properties: PropertyMap,
    pub x: f64,
    pub y: f64,
    /// Immediate group the block belonged to, if any.
    pub group: Option<GroupId>,
}

/// Full state of a removed wire.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRecord {
    pub id: WireId,
    pub start: PortRef,
    pub end: PortRef,
    pub group: Option<GroupId>,
}

/// A block removal together with the wires severed by the cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedBlock {
    pub block: BlockRecord,
    pub wires: Vec<WireRecord>,
}

/// Full state of a dissolved group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    pub members: Vec<ItemId>,
    pub parent: Option<GroupId>,
}

/// Entire graph state captured by `clear`, restorable id-for-id.
#[derive(Debug, Clone, PartialEq)]
pub struct ClearedState {
    pub blocks: Vec<BlockRecord>,
    pub wires: Vec<WireRecord>,
    pub groups: Vec<GroupRecord>,
    pub(crate) counters: HashMap<BlockKind, u32>,
    next_block: u32,
    next_wire: u32,
    next_group: u32,
}

// ────────────────────────────────────────────────────────────────────────────
// Diagram
// ────────────────────────────────────────────────────────────────────────────

/// The authoritative graph of blocks, wires, and groups.
///
/// Arenas preserve creation order (ids are allocated monotonically), which is
/// the order entities appear in snapshots and persisted documents.
#[derive(Debug, Clone, Default)]
pub struct Diagram {
    blocks: IndexMap<BlockId, Block>,
    wires: IndexMap<WireId, Wire>,
    groups: IndexMap<GroupId, Group>,
    /// Immediate containing group per item.
    membership: HashMap<ItemId, GroupId>,
    names: NameAllocator,
    next_block: u32,
    next_wire: u32,
    next_group: u32,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    // ── read access ─────────────────────────────────────────────────────────

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter().map(|(id, b)| (*id, b))
    }

    pub fn wires(&self) -> impl Iterator<Item = (WireId, &Wire)> {
        self.wires.iter().map(|(id, w)| (*id, w))
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups.iter().map(|(id, g)| (*id, g))
    }

    pub fn block_by_name(&self, name: &str) -> Option<(BlockId, &Block)> {
        self.blocks
            .iter()
            .find(|(_, b)| b.name == name)
            .map(|(id, b)| (*id, b))
    }

    /// Resolve a port reference, checking that the block exists and the index
    /// is within the block's ports for that direction.
    pub fn port(&self, r: PortRef) -> Result<&Port, DiagramError> {
        let block = self
            .blocks
            .get(&r.block)
            .ok_or(DiagramError::BlockNotFound(r.block))?;
        block.port(r.dir, r.index).ok_or(DiagramError::PortOutOfRange {
            block: r.block,
            direction: r.dir.label(),
            index: r.index,
        })
    }

    /// The immediate group an item belongs to, if any.
    pub fn group_of(&self, item: ItemId) -> Option<GroupId> {
        self.membership.get(&item).copied()
    }

    pub fn name_allocator(&self) -> &NameAllocator {
        &self.names
    }

    pub(crate) fn name_allocator_mut(&mut self) -> &mut NameAllocator {
        &mut self.names
    }

    // ── block operations ────────────────────────────────────────────────────

    /// Create a block of `kind` at `(x, y)` with a fresh unique name, the
    /// kind's fixed port arity, and its default properties.
    pub fn add_block(&mut self, kind: BlockKind, x: f64, y: f64) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        let name = self.names.next_name(kind);
        debug!("add block {:?} {} at ({}, {})", id, name, x, y);
        self.blocks.insert(id, Block::new(kind, name, x, y));
        id
    }

    /// Remove a block, cascading deletion of every wire attached to any of
    /// its ports. Returns the removed state for undo.
    pub fn remove_block(&mut self, id: BlockId) -> Result<RemovedBlock, DiagramError> {
        let block = self
            .blocks
            .get(&id)
            .ok_or(DiagramError::BlockNotFound(id))?;

        // Wires touching any port of this block, in creation order.
        let mut touching: Vec<WireId> = block
            .inputs
            .iter()
            .chain(block.outputs.iter())
            .flat_map(|p| p.attached.iter().copied())
            .collect();
        touching.sort_unstable();
        touching.dedup();

        let mut wires = Vec::with_capacity(touching.len());
        for wire_id in touching {
            wires.push(self.disconnect(wire_id)?);
        }

        let group = self.remove_from_group(ItemId::Block(id));
        let block = self.blocks.shift_remove(&id).expect("block checked above");
        debug!("remove block {:?} {} ({} wires severed)", id, block.name, wires.len());
        Ok(RemovedBlock {
            block: BlockRecord {
                id,
                kind: block.kind,
                name: block.name,
                properties: block.properties,
                x: block.x,
                y: block.y,
                group,
            },
            wires,
        })
    }

    /// Re-insert a previously removed block with its original id and name.
    /// Used by undo; the id must not be live.
    pub(crate) fn restore_block(&mut self, record: BlockRecord) {
        debug_assert!(!self.blocks.contains_key(&record.id));
        let mut block = Block::new(record.kind, record.name, record.x, record.y);
        block.properties = record.properties;
        let position = self.blocks.keys().filter(|k| **k < record.id).count();
        self.blocks.shift_insert(position, record.id, block);
        if let Some(group) = record.group {
            self.add_to_group_if_live(ItemId::Block(record.id), group);
        }
        self.next_block = self.next_block.max(record.id.0 + 1);
    }

    /// Overwrite a block's display name. Only used while staging a loaded
    /// document, where name uniqueness is checked against the whole document
    /// before any block is created.
    pub(crate) fn set_name_unchecked(&mut self, id: BlockId, name: String) {
        if let Some(block) = self.blocks.get_mut(&id) {
            block.name = name;
        }
    }

    /// Replace a block's whole property map. Only used while staging a
    /// loaded document.
    pub(crate) fn replace_properties(&mut self, id: BlockId, properties: PropertyMap) {
        if let Some(block) = self.blocks.get_mut(&id) {
            block.properties = properties;
        }
    }

    /// Move a block. Not part of the undo history.
    pub fn set_position(&mut self, id: BlockId, x: f64, y: f64) -> Result<(), DiagramError> {
        let block = self
            .blocks
            .get_mut(&id)
            .ok_or(DiagramError::BlockNotFound(id))?;
        block.x = x;
        block.y = y;
        Ok(())
    }

    /// Overwrite one property of a block. Not part of the undo history.
    pub fn set_property(
        &mut self,
        id: BlockId,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), DiagramError> {
        let block = self
            .blocks
            .get_mut(&id)
            .ok_or(DiagramError::BlockNotFound(id))?;
        block.properties.insert(name.to_string(), value);
        Ok(())
    }

    // ── wire operations ─────────────────────────────────────────────────────

    /// Create a wire between two ports. The pair is validated and normalized
    /// so the wire always runs output → input.
    pub fn connect(&mut self, a: PortRef, b: PortRef) -> Result<WireId, DiagramError> {
        // Existence first: a dangling reference is NotFound, not InvalidConnection.
        self.port(a)?;
        self.port(b)?;
        let (start, end) = validate_connection(self, a, b)?;

        let id = WireId(self.next_wire);
        self.next_wire += 1;
        self.attach(id, start, end);
        debug!("connect {:?}: {:?} -> {:?}", id, start, end);
        Ok(id)
    }

    /// Remove a wire, detaching it from both ports.
    pub fn disconnect(&mut self, id: WireId) -> Result<WireRecord, DiagramError> {
        let wire = self
            .wires
            .get(&id)
            .cloned()
            .ok_or(DiagramError::WireNotFound(id))?;
        for end in [wire.start, wire.end] {
            if let Some(block) = self.blocks.get_mut(&end.block) {
                if let Some(port) = block.port_mut(end.dir, end.index) {
                    port.attached.retain(|w| *w != id);
                }
            }
        }
        let group = self.remove_from_group(ItemId::Wire(id));
        self.wires.shift_remove(&id);
        debug!("disconnect {:?}", id);
        Ok(WireRecord {
            id,
            start: wire.start,
            end: wire.end,
            group,
        })
    }

    /// Re-insert a previously removed wire with its original id. Used by
    /// undo; both endpoint blocks must be live again.
    pub(crate) fn restore_wire(&mut self, record: WireRecord) -> Result<(), DiagramError> {
        self.port(record.start)?;
        self.port(record.end)?;
        debug_assert!(!self.wires.contains_key(&record.id));
        self.attach_at(record.id, record.start, record.end);
        if let Some(group) = record.group {
            self.add_to_group_if_live(ItemId::Wire(record.id), group);
        }
        self.next_wire = self.next_wire.max(record.id.0 + 1);
        Ok(())
    }

    fn attach(&mut self, id: WireId, start: PortRef, end: PortRef) {
        self.wires.insert(id, Wire { start, end });
        self.register_on_ports(id, start, end);
    }

    fn attach_at(&mut self, id: WireId, start: PortRef, end: PortRef) {
        let position = self.wires.keys().filter(|k| **k < id).count();
        self.wires.shift_insert(position, id, Wire { start, end });
        self.register_on_ports(id, start, end);
    }

    fn register_on_ports(&mut self, id: WireId, start: PortRef, end: PortRef) {
        for r in [start, end] {
            let port = self
                .blocks
                .get_mut(&r.block)
                .and_then(|b| b.port_mut(r.dir, r.index))
                .expect("endpoints resolved before attach");
            port.attached.push(id);
        }
    }

    // ── group operations ────────────────────────────────────────────────────

    /// Create a group from a non-empty set of live items. Every item must be
    /// currently ungrouped; nested groups stay acyclic because the new group
    /// itself cannot already be a member of anything.
    pub fn create_group(
        &mut self,
        name: impl Into<String>,
        members: Vec<ItemId>,
    ) -> Result<GroupId, DiagramError> {
        if members.is_empty() {
            return Err(DiagramError::EmptyGroup);
        }
        for item in &members {
            self.check_item(*item)?;
            if self.membership.contains_key(item) {
                return Err(DiagramError::AlreadyGrouped);
            }
        }

        let id = GroupId(self.next_group);
        // A member list containing the new group's own id can never be valid.
        if members.contains(&ItemId::Group(id)) {
            return Err(DiagramError::GroupCycle);
        }
        self.next_group += 1;
        for item in &members {
            self.membership.insert(*item, id);
        }
        let name = name.into();
        debug!("create group {:?} {} ({} members)", id, name, members.len());
        self.groups.insert(id, Group { name, members });
        Ok(id)
    }

    /// Dissolve a group, restoring its members' standalone selectability.
    /// Nested member groups are kept intact, merely un-parented.
    pub fn dissolve_group(&mut self, id: GroupId) -> Result<GroupRecord, DiagramError> {
        let group = self
            .groups
            .get(&id)
            .cloned()
            .ok_or(DiagramError::GroupNotFound(id))?;
        for item in &group.members {
            self.membership.remove(item);
        }
        let parent = self.remove_from_group(ItemId::Group(id));
        self.groups.shift_remove(&id);
        debug!("dissolve group {:?} {}", id, group.name);
        Ok(GroupRecord {
            id,
            name: group.name,
            members: group.members,
            parent,
        })
    }

    /// Re-create a previously dissolved group. Members that are no longer
    /// live, or that have since joined another group, are skipped.
    pub(crate) fn restore_group(&mut self, record: GroupRecord) {
        let members: Vec<ItemId> = record
            .members
            .into_iter()
            .filter(|item| self.check_item(*item).is_ok() && !self.membership.contains_key(item))
            .collect();
        for item in &members {
            self.membership.insert(*item, record.id);
        }
        let position = self.groups.keys().filter(|k| **k < record.id).count();
        self.groups.shift_insert(
            position,
            record.id,
            Group {
                name: record.name,
                members,
            },
        );
        if let Some(parent) = record.parent {
            self.add_to_group_if_live(ItemId::Group(record.id), parent);
        }
        self.next_group = self.next_group.max(record.id.0 + 1);
    }

    /// True if `outer` contains `inner` directly or transitively.
    pub fn contains_transitively(&self, outer: GroupId, inner: ItemId) -> bool {
        let Some(group) = self.groups.get(&outer) else {
            return false;
        };
        group.members.iter().any(|m| {
            *m == inner
                || matches!(m, ItemId::Group(g) if self.contains_transitively(*g, inner))
        })
    }

    fn check_item(&self, item: ItemId) -> Result<(), DiagramError> {
        match item {
            ItemId::Block(id) if !self.blocks.contains_key(&id) => {
                Err(DiagramError::BlockNotFound(id))
            }
            ItemId::Wire(id) if !self.wires.contains_key(&id) => {
                Err(DiagramError::WireNotFound(id))
            }
            ItemId::Group(id) if !self.groups.contains_key(&id) => {
                Err(DiagramError::GroupNotFound(id))
            }
            _ => Ok(()),
        }
    }

    /// Detach `item` from its immediate group, if any, returning that group.
    fn remove_from_group(&mut self, item: ItemId) -> Option<GroupId> {
        let group_id = self.membership.remove(&item)?;
        if let Some(group) = self.groups.get_mut(&group_id) {
            group.members.retain(|m| *m != item);
        }
        Some(group_id)
    }

    fn add_to_group_if_live(&mut self, item: ItemId, group_id: GroupId) {
        if let Some(group) = self.groups.get_mut(&group_id) {
            group.members.push(item);
            self.membership.insert(item, group_id);
        }
    }

    // ── whole-graph operations ──────────────────────────────────────────────

    /// Remove every block, wire, and group and reset the name allocator.
    /// Returns the prior state, restorable id-for-id.
    pub fn clear(&mut self) -> ClearedState {
        debug!(
            "clear diagram ({} blocks, {} wires, {} groups)",
            self.blocks.len(),
            self.wires.len(),
            self.groups.len()
        );
        let state = ClearedState {
            blocks: self
                .blocks
                .iter()
                .map(|(id, b)| BlockRecord {
                    id: *id,
                    kind: b.kind,
                    name: b.name.clone(),
                    properties: b.properties.clone(),
                    x: b.x,
                    y: b.y,
                    group: self.membership.get(&ItemId::Block(*id)).copied(),
                })
                .collect(),
            wires: self
                .wires
                .iter()
                .map(|(id, w)| WireRecord {
                    id: *id,
                    start: w.start,
                    end: w.end,
                    group: self.membership.get(&ItemId::Wire(*id)).copied(),
                })
                .collect(),
            groups: self
                .groups
                .iter()
                .map(|(id, g)| GroupRecord {
                    id: *id,
                    name: g.name.clone(),
                    members: g.members.clone(),
                    parent: self.membership.get(&ItemId::Group(*id)).copied(),
                })
                .collect(),
            counters: self.names.counters(),
            next_block: self.next_block,
            next_wire: self.next_wire,
            next_group: self.next_group,
        };
        self.blocks.clear();
        self.wires.clear();
        self.groups.clear();
        self.membership.clear();
        self.names.reset();
        self.next_block = 0;
        self.next_wire = 0;
        self.next_group = 0;
        state
    }

    /// Restore the exact state captured by [`Diagram::clear`]. The diagram
    /// must be empty (undo of a clear always runs against the cleared graph).
    pub(crate) fn restore_state(&mut self, state: ClearedState) {
        debug_assert!(self.blocks.is_empty() && self.wires.is_empty());
        for record in state.blocks {
            let mut block = Block::new(record.kind, record.name, record.x, record.y);
            block.properties = record.properties;
            self.blocks.insert(record.id, block);
        }
        for record in state.wires {
            self.attach(record.id, record.start, record.end);
        }
        for record in state.groups {
            for item in &record.members {
                self.membership.insert(*item, record.id);
            }
            self.groups.insert(
                record.id,
                Group {
                    name: record.name,
                    members: record.members,
                },
            );
        }
        self.names.restore(state.counters);
        self.next_block = state.next_block;
        self.next_wire = state.next_wire;
        self.next_group = state.next_group;
    }

    /// Atomically replace this diagram's contents with `staged`, taking over
    /// its entities, allocator state, and id counters. Used by document load.
    pub(crate) fn adopt(&mut self, staged: Diagram) {
        *self = staged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;

    fn out0(id: BlockId) -> PortRef {
        PortRef {
            block: id,
            dir: PortDir::Output,
            index: 0,
        }
    }

    fn in0(id: BlockId) -> PortRef {
        PortRef {
            block: id,
            dir: PortDir::Input,
            index: 0,
        }
    }

    #[test]
    fn add_block_allocates_ports_and_defaults() {
        let mut d = Diagram::new();
        let id = d.add_block(BlockKind::Sum, 10.0, 20.0);
        let block = d.block(id).unwrap();
        assert_eq!(block.name, "SUM 1");
        assert_eq!(block.inputs.len(), 2);
        assert_eq!(block.outputs.len(), 1);
        assert!(block.properties.contains_key("Signs"));
        assert_eq!(block.x, 10.0);
    }

    #[test]
    fn names_stay_unique_across_delete_and_recreate() {
        let mut d = Diagram::new();
        let a = d.add_block(BlockKind::Step, 0.0, 0.0);
        let b = d.add_block(BlockKind::Step, 0.0, 0.0);
        d.remove_block(a).unwrap();
        let c = d.add_block(BlockKind::Step, 0.0, 0.0);
        let names: Vec<&str> = [b, c]
            .iter()
            .map(|id| d.block(*id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, ["STEP 2", "STEP 3"]);
    }

    #[test]
    fn remove_block_cascades_wires() {
        let mut d = Diagram::new();
        let step = d.add_block(BlockKind::Step, 0.0, 0.0);
        let gain = d.add_block(BlockKind::Gain, 0.0, 0.0);
        let scope = d.add_block(BlockKind::Scope, 0.0, 0.0);
        d.connect(out0(step), in0(gain)).unwrap();
        d.connect(out0(gain), in0(scope)).unwrap();

        let removed = d.remove_block(gain).unwrap();
        assert_eq!(removed.wires.len(), 2);
        assert_eq!(d.wires().count(), 0);
        // Remaining ports hold no dangling back-references.
        assert!(d.block(step).unwrap().outputs[0].attached.is_empty());
        assert!(d.block(scope).unwrap().inputs[0].attached.is_empty());
    }

    #[test]
    fn remove_missing_block_is_not_found() {
        let mut d = Diagram::new();
        let err = d.remove_block(BlockId(99)).unwrap_err();
        assert_eq!(err, DiagramError::BlockNotFound(BlockId(99)));
    }

    #[test]
    fn connect_normalizes_direction() {
        let mut d = Diagram::new();
        let step = d.add_block(BlockKind::Step, 0.0, 0.0);
        let gain = d.add_block(BlockKind::Gain, 0.0, 0.0);
        // Input given first; the stored wire still runs output -> input.
        let id = d.connect(in0(gain), out0(step)).unwrap();
        let wire = d.wire(id).unwrap();
        assert_eq!(wire.start, out0(step));
        assert_eq!(wire.end, in0(gain));
    }

    #[test]
    fn occupied_input_is_rejected_and_graph_unchanged() {
        let mut d = Diagram::new();
        let step = d.add_block(BlockKind::Step, 0.0, 0.0);
        let constant = d.add_block(BlockKind::Constant, 0.0, 0.0);
        let scope = d.add_block(BlockKind::Scope, 0.0, 0.0);
        d.connect(out0(step), in0(scope)).unwrap();

        let err = d.connect(out0(constant), in0(scope)).unwrap_err();
        assert_eq!(err, DiagramError::Connection(ConnectionError::PortOccupied));
        assert_eq!(d.wires().count(), 1);
    }

    #[test]
    fn output_fan_out_is_allowed() {
        let mut d = Diagram::new();
        let step = d.add_block(BlockKind::Step, 0.0, 0.0);
        let gain = d.add_block(BlockKind::Gain, 0.0, 0.0);
        let scope = d.add_block(BlockKind::Scope, 0.0, 0.0);
        d.connect(out0(step), in0(gain)).unwrap();
        d.connect(out0(step), in0(scope)).unwrap();
        assert_eq!(d.block(step).unwrap().outputs[0].attached.len(), 2);
    }

    #[test]
    fn sum_accepts_one_wire_per_input_port() {
        let mut d = Diagram::new();
        let step = d.add_block(BlockKind::Step, 0.0, 0.0);
        let ramp = d.add_block(BlockKind::Ramp, 0.0, 0.0);
        let sum = d.add_block(BlockKind::Sum, 0.0, 0.0);
        d.connect(out0(step), in0(sum)).unwrap();
        let second = PortRef {
            block: sum,
            dir: PortDir::Input,
            index: 1,
        };
        d.connect(out0(ramp), second).unwrap();
        // Fan-in on an already-wired port is still rejected.
        let err = d.connect(out0(ramp), in0(sum)).unwrap_err();
        assert_eq!(err, DiagramError::Connection(ConnectionError::PortOccupied));
    }

    #[test]
    fn connect_to_missing_port_is_not_found() {
        let mut d = Diagram::new();
        let step = d.add_block(BlockKind::Step, 0.0, 0.0);
        let bad = PortRef {
            block: step,
            dir: PortDir::Input,
            index: 0,
        };
        let gain = d.add_block(BlockKind::Gain, 0.0, 0.0);
        // STEP has no inputs, so index 0 is out of range.
        let err = d.connect(out0(gain), bad).unwrap_err();
        assert!(matches!(err, DiagramError::PortOutOfRange { .. }));
    }

    #[test]
    fn group_lifecycle() {
        let mut d = Diagram::new();
        let a = d.add_block(BlockKind::Step, 0.0, 0.0);
        let b = d.add_block(BlockKind::Gain, 0.0, 0.0);
        let g = d
            .create_group("pair", vec![ItemId::Block(a), ItemId::Block(b)])
            .unwrap();
        assert_eq!(d.group_of(ItemId::Block(a)), Some(g));

        // An item cannot join two groups.
        let err = d.create_group("again", vec![ItemId::Block(a)]).unwrap_err();
        assert_eq!(err, DiagramError::AlreadyGrouped);

        // Nesting: a group can be a member of another group.
        let outer = d.create_group("outer", vec![ItemId::Group(g)]).unwrap();
        assert!(d.contains_transitively(outer, ItemId::Block(a)));

        d.dissolve_group(outer).unwrap();
        assert_eq!(d.group_of(ItemId::Group(g)), None);
        let record = d.dissolve_group(g).unwrap();
        assert_eq!(record.members.len(), 2);
        assert_eq!(d.group_of(ItemId::Block(a)), None);
    }

    #[test]
    fn empty_group_rejected() {
        let mut d = Diagram::new();
        assert_eq!(
            d.create_group("nothing", vec![]).unwrap_err(),
            DiagramError::EmptyGroup
        );
    }

    #[test]
    fn clear_resets_names_and_state_restores_exactly() {
        let mut d = Diagram::new();
        let step = d.add_block(BlockKind::Step, 1.0, 2.0);
        let scope = d.add_block(BlockKind::Scope, 3.0, 4.0);
        d.connect(out0(step), in0(scope)).unwrap();
        let before = d.clone();

        let state = d.clear();
        assert_eq!(d.blocks().count(), 0);
        // Allocator was reset: fresh diagram names start over.
        let fresh = d.add_block(BlockKind::Step, 0.0, 0.0);
        assert_eq!(d.block(fresh).unwrap().name, "STEP 1");

        let mut d2 = before.clone();
        d2.clear();
        d2.restore_state(state);
        assert_eq!(d2.blocks().count(), 2);
        assert_eq!(d2.wires().count(), 1);
        assert_eq!(d2.block(step).unwrap().name, "STEP 1");
        // Counters restored too: next STEP continues from 2.
        let next = d2.add_block(BlockKind::Step, 0.0, 0.0);
        assert_eq!(d2.block(next).unwrap().name, "STEP 2");
    }

    #[test]
    fn restore_block_preserves_creation_order() {
        let mut d = Diagram::new();
        let a = d.add_block(BlockKind::Step, 0.0, 0.0);
        let b = d.add_block(BlockKind::Gain, 0.0, 0.0);
        let c = d.add_block(BlockKind::Scope, 0.0, 0.0);
        let removed = d.remove_block(b).unwrap();
        d.restore_block(removed.block);
        let order: Vec<BlockId> = d.blocks().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b, c]);
    }
}
