//! Node-coordinate map backends used by the Topology Builder's two-pass
//! pipeline. Node coordinates are the dominant memory cost for a
//! country-scale extract, so callers can pick between an in-memory
//! backend and a file-backed sparse array.
//!
//! Pass 1 marks the ids of every node referenced by an accepted way,
//! without yet knowing its coordinate. Pass 2 fills in coordinates as
//! nodes stream past, then the Way Splitter inserts a handful of
//! synthetic coordinates directly. Both backends expose the same three
//! operations: `mark`, `fill`, and `insert_coord`.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};
use rustc_hash::FxHashMap;

use crate::model::NodeRef;

/// In-memory backend: a hash map from node id to `Option<(lon, lat)>`.
///
/// `None` means "marked, coordinate not seen yet" - the same two-state
/// shape the Python original's `self.way_nodes[node_id] = None` uses.
#[derive(Debug, Default)]
struct InMemoryMap {
    nodes: FxHashMap<NodeRef, Option<(f64, f64)>>,
}

impl InMemoryMap {
    fn mark(&mut self, id: NodeRef) -> bool {
        let already = self.nodes.contains_key(&id);
        self.nodes.entry(id).or_insert(None);
        already
    }

    fn fill(&mut self, id: NodeRef, lon: f64, lat: f64) {
        if let Some(slot) = self.nodes.get_mut(&id) {
            *slot = Some((lon, lat));
        }
    }

    fn insert_coord(&mut self, id: NodeRef, lon: f64, lat: f64) {
        self.nodes.insert(id, Some((lon, lat)));
    }

    fn get(&self, id: NodeRef) -> Option<(f64, f64)> {
        self.nodes.get(&id).copied().flatten()
    }

    fn contains(&self, id: NodeRef) -> bool {
        self.nodes.contains_key(&id)
    }
}

/// Each slot is 24 bytes: an `f64` marker (0 = unmarked, 1 = marked with
/// no coordinate yet, 2 = filled) followed by lon and lat as `f64`s.
///
/// Slots are addressed directly by `node_id * SLOT_BYTES`, relying on the
/// filesystem to keep the file sparse: with country-scale extracts the
/// node id space is sparsely populated relative to the full OSM id range,
/// so the backing file's *apparent* size can be large while its actual
/// disk usage stays proportional to the number of touched nodes.
const SLOT_BYTES: u64 = 24;

struct SparseFileMap {
    _file: File,
    mmap: MmapMut,
    capacity_slots: u64,
}

impl SparseFileMap {
    fn create(path: &Path, initial_capacity_slots: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(initial_capacity_slots * SLOT_BYTES)?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        Ok(Self {
            _file: file,
            mmap,
            capacity_slots: initial_capacity_slots,
        })
    }

    fn ensure_capacity(&mut self, id: NodeRef) -> io::Result<()> {
        let needed = id as u64 + 1;
        if needed <= self.capacity_slots {
            return Ok(());
        }
        let new_capacity = needed.max(self.capacity_slots * 2).max(1024);
        self._file.set_len(new_capacity * SLOT_BYTES)?;
        self.mmap = unsafe { MmapOptions::new().map_mut(&self._file)? };
        self.capacity_slots = new_capacity;
        Ok(())
    }

    fn offset(id: NodeRef) -> usize {
        (id as u64 * SLOT_BYTES) as usize
    }

    fn read_marker(&self, id: NodeRef) -> f64 {
        if id as u64 >= self.capacity_slots {
            return 0.0;
        }
        let off = Self::offset(id);
        f64::from_le_bytes(self.mmap[off..off + 8].try_into().unwrap())
    }

    fn write_slot(&mut self, id: NodeRef, marker: f64, lon: f64, lat: f64) -> io::Result<()> {
        self.ensure_capacity(id)?;
        let off = Self::offset(id);
        self.mmap[off..off + 8].copy_from_slice(&marker.to_le_bytes());
        self.mmap[off + 8..off + 16].copy_from_slice(&lon.to_le_bytes());
        self.mmap[off + 16..off + 24].copy_from_slice(&lat.to_le_bytes());
        Ok(())
    }

    fn mark(&mut self, id: NodeRef) -> io::Result<bool> {
        let already = self.read_marker(id) != 0.0;
        if !already {
            self.write_slot(id, 1.0, 0.0, 0.0)?;
        }
        Ok(already)
    }

    fn fill(&mut self, id: NodeRef, lon: f64, lat: f64) -> io::Result<()> {
        if self.read_marker(id) != 0.0 {
            self.write_slot(id, 2.0, lon, lat)?;
        }
        Ok(())
    }

    fn insert_coord(&mut self, id: NodeRef, lon: f64, lat: f64) -> io::Result<()> {
        self.write_slot(id, 2.0, lon, lat)
    }

    fn get(&self, id: NodeRef) -> Option<(f64, f64)> {
        if self.read_marker(id) != 2.0 {
            return None;
        }
        let off = Self::offset(id);
        let lon = f64::from_le_bytes(self.mmap[off + 8..off + 16].try_into().unwrap());
        let lat = f64::from_le_bytes(self.mmap[off + 16..off + 24].try_into().unwrap());
        Some((lon, lat))
    }

    fn contains(&self, id: NodeRef) -> bool {
        self.read_marker(id) != 0.0
    }
}

/// Selects which [`NodeCoordMap`] backend to build: fully in-memory, or
/// a file-backed sparse array, chosen by the caller.
#[derive(Debug, Clone)]
pub enum NodeCacheBackend {
    /// Fully in-memory; fastest, but O(node count) resident memory.
    InMemory,
    /// Memory-mapped sparse file at the given path; bounded resident
    /// memory at the cost of page faults against disk.
    SparseFile { path: std::path::PathBuf },
}

/// Node-coordinate map used by the Topology Builder's two passes.
pub enum NodeCoordMap {
    InMemory(InMemoryMap),
    SparseFile(SparseFileMap),
}

impl NodeCoordMap {
    pub fn new(backend: &NodeCacheBackend) -> io::Result<Self> {
        match backend {
            NodeCacheBackend::InMemory => Ok(Self::InMemory(InMemoryMap::default())),
            NodeCacheBackend::SparseFile { path } => {
                Ok(Self::SparseFile(SparseFileMap::create(path, 1 << 20)?))
            }
        }
    }

    /// Mark `id` as used by an accepted way. Returns `true` if it was
    /// already marked (i.e. this occurrence makes it an intersection).
    pub fn mark(&mut self, id: NodeRef) -> io::Result<bool> {
        match self {
            Self::InMemory(m) => Ok(m.mark(id)),
            Self::SparseFile(m) => m.mark(id),
        }
    }

    /// Fill in the coordinate for a previously marked node. A no-op if
    /// `id` was never marked.
    pub fn fill(&mut self, id: NodeRef, lon: f64, lat: f64) -> io::Result<()> {
        match self {
            Self::InMemory(m) => {
                m.fill(id, lon, lat);
                Ok(())
            }
            Self::SparseFile(m) => m.fill(id, lon, lat),
        }
    }

    /// Insert a coordinate unconditionally (used for the Way Splitter's
    /// synthetic nodes, which were never marked in pass 1).
    pub fn insert_coord(&mut self, id: NodeRef, lon: f64, lat: f64) -> io::Result<()> {
        match self {
            Self::InMemory(m) => {
                m.insert_coord(id, lon, lat);
                Ok(())
            }
            Self::SparseFile(m) => m.insert_coord(id, lon, lat),
        }
    }

    pub fn get(&self, id: NodeRef) -> Option<(f64, f64)> {
        match self {
            Self::InMemory(m) => m.get(id),
            Self::SparseFile(m) => m.get(id),
        }
    }

    pub fn contains(&self, id: NodeRef) -> bool {
        match self {
            Self::InMemory(m) => m.contains(id),
            Self::SparseFile(m) => m.contains(id),
        }
    }
}
