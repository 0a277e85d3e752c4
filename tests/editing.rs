//! End-to-end editing-surface behavior: wiring rules, naming, grouping.

use signalflow::block::BlockKind;
use signalflow::diagram::{BlockId, ItemId, PortDir, PortRef};
use signalflow::editor::Editor;
use signalflow::error::{ConnectionError, DiagramError};

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
fn display_names_stay_distinct_across_interleaved_deletions() {
    let mut editor = Editor::new();
    let mut live = Vec::new();
    for round in 0..5 {
        let id = editor.add_block(BlockKind::Gain, 0.0, 0.0);
        live.push(id);
        if round % 2 == 1 {
            let victim = live.remove(0);
            editor.remove_block(victim).unwrap();
        }
    }
    let names: Vec<String> = editor
        .snapshot()
        .blocks
        .iter()
        .map(|b| b.name.clone())
        .collect();
    let mut deduped = names.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), names.len());
}

#[test]
fn wiring_two_inputs_fails_and_leaves_store_unchanged() {
    let mut editor = Editor::new();
    let gain = editor.add_block(BlockKind::Gain, 0.0, 0.0);
    let scope = editor.add_block(BlockKind::Scope, 0.0, 0.0);
    let before = editor.snapshot();

    let err = editor.connect(in0(gain), in0(scope)).unwrap_err();
    assert_eq!(
        err,
        DiagramError::Connection(ConnectionError::DirectionMismatch)
    );
    assert_eq!(editor.snapshot(), before);
    // The failed attempt was never recorded: undo pops the last add-block.
    editor.undo().unwrap();
    assert_eq!(editor.snapshot().blocks.len(), 1);
}

#[test]
fn second_wire_into_same_input_port_is_rejected() {
    let mut editor = Editor::new();
    let gain = editor.add_block(BlockKind::Gain, 0.0, 0.0);
    let step = editor.add_block(BlockKind::Step, 0.0, 0.0);
    let scope = editor.add_block(BlockKind::Scope, 0.0, 0.0);
    editor.connect(out0(gain), in0(scope)).unwrap();

    let err = editor.connect(out0(step), in0(scope)).unwrap_err();
    assert_eq!(err, DiagramError::Connection(ConnectionError::PortOccupied));
    assert_eq!(editor.snapshot().wires.len(), 1);
}

#[test]
fn self_loop_is_rejected() {
    let mut editor = Editor::new();
    let gain = editor.add_block(BlockKind::Gain, 0.0, 0.0);
    let err = editor.connect(out0(gain), in0(gain)).unwrap_err();
    assert_eq!(err, DiagramError::Connection(ConnectionError::SelfLoop));
}

#[test]
fn deleting_a_block_deletes_every_touching_wire() {
    let mut editor = Editor::new();
    let step = editor.add_block(BlockKind::Step, 0.0, 0.0);
    let sum = editor.add_block(BlockKind::Sum, 0.0, 0.0);
    let ramp = editor.add_block(BlockKind::Ramp, 0.0, 0.0);
    let scope = editor.add_block(BlockKind::Scope, 0.0, 0.0);
    editor.connect(out0(step), in0(sum)).unwrap();
    editor
        .connect(
            out0(ramp),
            PortRef {
                block: sum,
                dir: PortDir::Input,
                index: 1,
            },
        )
        .unwrap();
    editor.connect(out0(sum), in0(scope)).unwrap();

    editor.remove_block(sum).unwrap();
    let snap = editor.snapshot();
    assert!(snap.wires.is_empty());
    assert!(snap.blocks.iter().all(|b| b.name != "SUM 1"));
}

#[test]
fn groups_nest_and_dissolve() {
    let mut editor = Editor::new();
    let a = editor.add_block(BlockKind::Step, 0.0, 0.0);
    let b = editor.add_block(BlockKind::Gain, 0.0, 0.0);
    let inner = editor
        .group("inner", vec![ItemId::Block(a), ItemId::Block(b)])
        .unwrap();
    let c = editor.add_block(BlockKind::Scope, 0.0, 0.0);
    let outer = editor
        .group("outer", vec![ItemId::Group(inner), ItemId::Block(c)])
        .unwrap();

    assert!(editor.diagram().contains_transitively(outer, ItemId::Block(a)));

    editor.ungroup(outer).unwrap();
    assert_eq!(editor.diagram().group_of(ItemId::Group(inner)), None);
    // Undo re-creates the outer group with its members.
    editor.undo().unwrap();
    assert_eq!(
        editor.diagram().group_of(ItemId::Group(inner)),
        Some(outer)
    );
}

#[test]
fn grouping_a_grouped_item_is_rejected() {
    let mut editor = Editor::new();
    let a = editor.add_block(BlockKind::Step, 0.0, 0.0);
    editor.group("one", vec![ItemId::Block(a)]).unwrap();
    let err = editor.group("two", vec![ItemId::Block(a)]).unwrap_err();
    assert_eq!(err, DiagramError::AlreadyGrouped);
}
