//! Persisted diagram documents.
//!
//! The document is a plain serde shape:
//!
//! ```json
//! { "blocks": [ { "type": "GAIN", "name": "GAIN 1", "properties": {"Gain": 2},
//!                 "x": 120.0, "y": 80.0 } ],
//!   "wires":  [ { "start": "STEP 1", "start_port_index": 0,
//!                 "end": "GAIN 1", "end_port_index": 0 } ] }
//! ```
//!
//! Wire endpoints are stored as block name plus port index, never as raw
//! identifiers, so documents stay meaningful across save/load. Entity order
//! follows creation order. The same shape is also the store's snapshot type
//! for undo and for the simulation bridge.
//!
//! Loading stages a complete detached diagram first and only swaps it into
//! the live store on full success: a malformed document never leaves the
//! diagram half-loaded.

use std::path::Path;

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

use crate::block::{BlockKind, PropertyMap};
use crate::diagram::{Diagram, PortDir, PortRef};
use crate::error::{DiagramError, DocumentError};

/// Magic bytes at the start of the binary container format.
const MAGIC: &[u8; 7] = b"SIGFLOW";
/// Current binary container version.
const VERSION: u32 = 1;

// ────────────────────────────────────────────────────────────────────────────
// Document shape
// ────────────────────────────────────────────────────────────────────────────

/// One block in a persisted document or snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEntry {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub name: String,
    pub properties: PropertyMap,
    pub x: f64,
    pub y: f64,
}

/// One wire in a persisted document or snapshot, endpoint-addressed by
/// block name and port index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
    pub start: String,
    pub start_port_index: usize,
    pub end: String,
    pub end_port_index: usize,
}

/// A complete persisted diagram, and the store's read-only snapshot type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagramDoc {
    pub blocks: Vec<BlockEntry>,
    pub wires: Vec<WireEntry>,
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshot & staging
// ────────────────────────────────────────────────────────────────────────────

impl Diagram {
    /// Materialize a read-only snapshot of the live graph. Blocks and wires
    /// appear in creation order; wire endpoints are resolved to name + index.
    pub fn snapshot(&self) -> DiagramDoc {
        let blocks = self
            .blocks()
            .map(|(_, b)| BlockEntry {
                kind: b.kind,
                name: b.name.clone(),
                properties: b.properties.clone(),
                x: b.x,
                y: b.y,
            })
            .collect();
        let wires = self
            .wires()
            .map(|(_, w)| {
                let name_of = |r: PortRef| {
                    self.block(r.block)
                        .map(|b| b.name.clone())
                        .unwrap_or_default()
                };
                WireEntry {
                    start: name_of(w.start),
                    start_port_index: w.start.index,
                    end: name_of(w.end),
                    end_port_index: w.end.index,
                }
            })
            .collect();
        DiagramDoc { blocks, wires }
    }
}

/// Build a detached diagram from a document by replaying block creation and
/// wiring. Nothing observable happens to any live store; callers swap the
/// result in only after this returns `Ok`.
pub fn stage(doc: &DiagramDoc) -> Result<Diagram, DocumentError> {
    let mut diagram = Diagram::new();

    for entry in &doc.blocks {
        if diagram.block_by_name(&entry.name).is_some() {
            return Err(DocumentError::DuplicateName(entry.name.clone()));
        }
        let id = diagram.add_block(entry.kind, entry.x, entry.y);
        diagram.set_name_unchecked(id, entry.name.clone());
        // Document values overwrite the kind's defaults; default keys the
        // document does not mention are kept.
        let mut properties: PropertyMap = entry.kind.default_properties();
        for (key, value) in &entry.properties {
            properties.insert(key.clone(), value.clone());
        }
        diagram.replace_properties(id, properties);
    }

    for entry in &doc.wires {
        let start = resolve(&diagram, &entry.start, PortDir::Output, entry.start_port_index)?;
        let end = resolve(&diagram, &entry.end, PortDir::Input, entry.end_port_index)?;
        diagram.connect(start, end).map_err(|e| {
            let reason = match e {
                DiagramError::Connection(reason) => reason,
                // Both endpoints were resolved above; only validation can fail.
                _ => unreachable!("endpoints resolved before connect"),
            };
            DocumentError::InvalidWire {
                start: entry.start.clone(),
                end: entry.end.clone(),
                reason,
            }
        })?;
    }

    // Later block creation must not collide with loaded names.
    let names: Vec<(BlockKind, String)> = diagram
        .blocks()
        .map(|(_, b)| (b.kind, b.name.clone()))
        .collect();
    diagram
        .name_allocator_mut()
        .resync(names.iter().map(|(k, n)| (*k, n.as_str())));

    Ok(diagram)
}

fn resolve(
    diagram: &Diagram,
    name: &str,
    dir: PortDir,
    index: usize,
) -> Result<PortRef, DocumentError> {
    let (id, block) = diagram
        .block_by_name(name)
        .ok_or_else(|| DocumentError::UnknownBlock(name.to_string()))?;
    let available = match dir {
        PortDir::Input => block.inputs.len(),
        PortDir::Output => block.outputs.len(),
    };
    if index >= available {
        return Err(DocumentError::PortIndexOutOfRange {
            block: name.to_string(),
            direction: dir.label(),
            index,
            available,
        });
    }
    Ok(PortRef {
        block: id,
        dir,
        index,
    })
}

/// Stage `doc` and, on full success, atomically replace the live diagram's
/// contents. On failure the live diagram is untouched.
pub fn load_into(diagram: &mut Diagram, doc: &DiagramDoc) -> Result<(), DocumentError> {
    let staged = stage(doc)?;
    info!(
        "loaded document: {} blocks, {} wires",
        doc.blocks.len(),
        doc.wires.len()
    );
    diagram.adopt(staged);
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// File I/O: JSON and binary container
// ────────────────────────────────────────────────────────────────────────────

impl DiagramDoc {
    /// Write the document as pretty-printed JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = std::fs::File::create(path.as_ref())
            .with_context(|| format!("create {}", path.as_ref().display()))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read a JSON document.
    pub fn load_json<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("open {}", path.as_ref().display()))?;
        let reader = std::io::BufReader::new(file);
        let doc = serde_json::from_reader(reader)
            .with_context(|| format!("parse {}", path.as_ref().display()))?;
        Ok(doc)
    }

    /// Write the document to a binary file with magic bytes and versioning.
    pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = std::fs::File::create(path.as_ref())
            .with_context(|| format!("create {}", path.as_ref().display()))?;
        let mut writer = std::io::BufWriter::new(file);
        std::io::Write::write_all(&mut writer, MAGIC)?;
        std::io::Write::write_all(&mut writer, &VERSION.to_le_bytes())?;
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    /// Load a binary document, checking magic bytes and version.
    pub fn load_binary<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("open {}", path.as_ref().display()))?;
        let mut reader = std::io::BufReader::new(file);
        let mut magic = [0u8; 7];
        std::io::Read::read_exact(&mut reader, &mut magic)?;
        if &magic != MAGIC {
            return Err(DocumentError::BadMagic.into());
        }
        let mut version_bytes = [0u8; 4];
        std::io::Read::read_exact(&mut reader, &mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != VERSION {
            return Err(DocumentError::UnsupportedVersion(version).into());
        }
        let doc: DiagramDoc =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        Ok(doc)
    }
}
