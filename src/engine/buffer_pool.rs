//! Pre-allocated output buffers for the render graph.
//!
//! Each module owns one buffer per output port. The buffers arrive
//! pre-built with the module (allocation happens on the interactive side);
//! during a block the graph takes a module's outputs out of the pool, runs
//! the unit, and puts them back, so consumers can read them without
//! aliasing.

use std::collections::HashMap;
use std::mem;

use crate::dsp::SignalBuffer;
use crate::graph::ModuleId;

/// Module count the pool's map is pre-sized for, so inserts at edit time
/// rehash only when a rack outgrows it.
const MODULE_CAPACITY: usize = 64;

/// Owns every module's output buffers, keyed by module id.
pub struct BufferPool {
    buffers: HashMap<ModuleId, Vec<SignalBuffer>>,
    block_size: usize,
}

impl BufferPool {
    /// Creates an empty pool for the given block size.
    pub fn new(block_size: usize) -> Self {
        Self {
            buffers: HashMap::with_capacity(MODULE_CAPACITY),
            block_size,
        }
    }

    /// Installs a module's pre-built output set, replacing any existing
    /// one.
    pub fn insert(&mut self, module: ModuleId, set: Vec<SignalBuffer>) {
        self.buffers.insert(module, set);
    }

    /// Drops a module's buffers.
    pub fn deallocate(&mut self, module: ModuleId) {
        self.buffers.remove(&module);
    }

    /// Takes a module's output set out of the pool for processing. The
    /// slot stays registered; `restore` puts the set back. Swap only, no
    /// allocation.
    pub fn take(&mut self, module: ModuleId) -> Option<Vec<SignalBuffer>> {
        self.buffers.get_mut(&module).map(mem::take)
    }

    /// Returns a module's output set after processing.
    pub fn restore(&mut self, module: ModuleId, set: Vec<SignalBuffer>) {
        if let Some(slot) = self.buffers.get_mut(&module) {
            *slot = set;
        }
    }

    /// Reads one output buffer of a module.
    pub fn get(&self, module: ModuleId, output_index: usize) -> Option<&SignalBuffer> {
        self.buffers.get(&module).and_then(|set| set.get(output_index))
    }

    /// Zeroes every buffer in the pool.
    pub fn clear_all(&mut self) {
        for set in self.buffers.values_mut() {
            for buffer in set {
                buffer.clear();
            }
        }
    }

    /// Resizes every buffer for a new block size.
    pub fn resize_all(&mut self, block_size: usize) {
        self.block_size = block_size;
        for set in self.buffers.values_mut() {
            for buffer in set {
                buffer.resize(block_size);
            }
        }
    }

    /// Drops every module's buffers.
    pub fn clear_pool(&mut self) {
        self.buffers.clear();
    }

    /// The current block size.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of modules with allocated buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if no module has buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(256)
    }
}
