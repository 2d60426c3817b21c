//! FreeSurfer annotation files.
//!
//! An annotation assigns every vertex of a hemisphere a packed RGB label and
//! carries a colour table describing the regions. Vertex labels are kept as
//! stored on disk (original ids); [`ColorTable::lookup`] translates them to
//! 0-based table rows.
//!
//! On-disk layout (big-endian):
//!
//! ```text
//! n_vertices                          i32
//! n_vertices × (vertex_no, label)     i32, i32
//! has_colortable                      i32   (1)
//! ── version 2 (next i32 is -2) ──────────────────────────────────
//! -2, max_struct                      i32, i32   table size
//! len, orig_filename                  i32, bytes
//! n_entries                           i32
//! n_entries × (struct_id, len, name, r, g, b, a)
//! ── legacy (next i32 is n_entries > 0) ──────────────────────────
//! n_entries, len, orig_filename       i32, i32, bytes
//! n_entries × (len, name, r, g, b, a)
//! ```
//!
//! In version 2 entries are placed at row `struct_id`, so the table can
//! contain unused rows; those stay zero-coloured, as FreeSurfer readers do.
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use super::ByteReader;
use crate::error::Result;

/// One colour-table row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorTableEntry {
    pub name: String,
    pub r: i32,
    pub g: i32,
    pub b: i32,
    /// Transparency; not part of the packed label.
    pub a: i32,
}

impl ColorTableEntry {
    pub fn new(name: &str, r: i32, g: i32, b: i32) -> Self {
        Self { name: name.to_string(), r, g, b, a: 0 }
    }

    /// The value vertices carry for this region: `r + g·2⁸ + b·2¹⁶`.
    #[inline]
    pub fn packed_label(&self) -> i32 {
        self.r
            .wrapping_add(self.g.wrapping_shl(8))
            .wrapping_add(self.b.wrapping_shl(16))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorTable {
    pub orig_filename: String,
    pub entries: Vec<ColorTableEntry>,
}

impl ColorTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the packed-label → row map. When two rows share a colour the
    /// first one wins.
    pub fn lookup(&self) -> LabelLookup {
        let mut map = HashMap::with_capacity(self.entries.len());
        for (row, e) in self.entries.iter().enumerate() {
            map.entry(e.packed_label()).or_insert(row);
        }
        LabelLookup(map)
    }
}

/// Packed vertex label → 0-based colour-table row.
#[derive(Debug, Clone)]
pub struct LabelLookup(HashMap<i32, usize>);

impl LabelLookup {
    #[inline]
    pub fn get(&self, label: i32) -> Option<usize> {
        self.0.get(&label).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annot {
    /// One packed label per vertex, in vertex order.
    pub vertex_labels: Vec<i32>,
    pub ctab: ColorTable,
}

impl Annot {
    pub fn n_vertices(&self) -> usize {
        self.vertex_labels.len()
    }

    /// Write in the version-2 layout, entry `i` stored with struct id `i`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut buf: Vec<u8> = Vec::new();
        let push = |buf: &mut Vec<u8>, v: i32| buf.extend_from_slice(&v.to_be_bytes());
        let push_str = |buf: &mut Vec<u8>, s: &str| {
            buf.extend_from_slice(&((s.len() + 1) as i32).to_be_bytes());
            buf.extend_from_slice(s.as_bytes());
            buf.push(0);
        };

        push(&mut buf, self.vertex_labels.len() as i32);
        for (vno, &label) in self.vertex_labels.iter().enumerate() {
            push(&mut buf, vno as i32);
            push(&mut buf, label);
        }
        push(&mut buf, 1);
        push(&mut buf, -2);
        push(&mut buf, self.ctab.len() as i32);
        push_str(&mut buf, &self.ctab.orig_filename);
        push(&mut buf, self.ctab.len() as i32);
        for (id, e) in self.ctab.entries.iter().enumerate() {
            push(&mut buf, id as i32);
            push_str(&mut buf, &e.name);
            for c in [e.r, e.g, e.b, e.a] {
                push(&mut buf, c);
            }
        }
        std::fs::File::create(path)?.write_all(&buf)?;
        Ok(())
    }
}

/// Read an annotation file.
pub fn read_annot(path: &Path) -> Result<Annot> {
    let bytes = std::fs::read(path)?;
    let mut r = ByteReader::new(&bytes, path);

    let n_vertices = r.count("vertex count")?;
    let mut vertex_labels = Vec::with_capacity(n_vertices);
    for _ in 0..n_vertices {
        let _vertex_no = r.i32()?;
        vertex_labels.push(r.i32()?);
    }

    if r.remaining() < 4 || r.i32()? != 1 {
        return Err(r.invalid("annotation has no colour table".to_string()));
    }

    let first = r.i32()?;
    let ctab = if first > 0 {
        read_legacy_ctab(&mut r, first as usize)?
    } else if first == -2 {
        read_v2_ctab(&mut r)?
    } else {
        return Err(r.invalid(format!("unsupported colour table version {}", -first)));
    };

    Ok(Annot { vertex_labels, ctab })
}

fn read_entry_body(r: &mut ByteReader<'_>) -> Result<ColorTableEntry> {
    let name_len = r.count("name length")?;
    let name = r.string(name_len)?;
    let (cr, cg, cb, ca) = (r.i32()?, r.i32()?, r.i32()?, r.i32()?);
    if [cr, cg, cb, ca].iter().any(|c| !(0..=255).contains(c)) {
        return Err(r.invalid(format!("colour ({cr}, {cg}, {cb}, {ca}) of {name:?} is outside 0..=255")));
    }
    Ok(ColorTableEntry { name, r: cr, g: cg, b: cb, a: ca })
}

fn read_legacy_ctab(r: &mut ByteReader<'_>, n_entries: usize) -> Result<ColorTable> {
    let len = r.count("filename length")?;
    let orig_filename = r.string(len)?;
    let mut entries = Vec::with_capacity(n_entries);
    for _ in 0..n_entries {
        entries.push(read_entry_body(r)?);
    }
    Ok(ColorTable { orig_filename, entries })
}

fn read_v2_ctab(r: &mut ByteReader<'_>) -> Result<ColorTable> {
    let max_struct = r.count("table size")?;
    let len = r.count("filename length")?;
    let orig_filename = r.string(len)?;
    let n_entries = r.count("entry count")?;

    let mut entries = vec![ColorTableEntry::default(); max_struct];
    for _ in 0..n_entries {
        let id = r.count("structure id")?;
        let entry = read_entry_body(r)?;
        let slot = entries
            .get_mut(id)
            .ok_or_else(|| r.invalid(format!("structure id {id} outside table of {max_struct}")))?;
        *slot = entry;
    }
    Ok(ColorTable { orig_filename, entries })
}
