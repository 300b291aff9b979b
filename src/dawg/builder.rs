use smallvec::SmallVec;

use crate::bitvec::BitVector;
use crate::BuildError;

use super::node::{DawgNode, DawgUnit};

const INITIAL_TABLE_SIZE: usize = 1 << 10;

/// An incremental builder for a minimized word graph.
///
/// Keys must be inserted in strict lexicographic order, each with a 31-bit
/// value. Whenever an insertion branches away from the previous key, the
/// subtree that can no longer grow is flushed: its sibling chains are hashed
/// and either merged with an identical chain seen before or appended to the
/// frozen unit array. The result is a minimal DAWG: keys sharing a suffix
/// (and the values below it) share one subgraph.
///
/// # Examples
///
/// ```
/// use dawgdict::{DawgBuilder, DoubleArray};
///
/// let mut builder = DawgBuilder::new();
/// builder.insert(b"bake", 1).unwrap();
/// builder.insert(b"cake", 1).unwrap();
/// let dawg = builder.finish();
///
/// let dict = DoubleArray::from_dawg(&dawg).unwrap();
/// assert_eq!(dict.exact_match(b"cake"), Some(1));
/// ```
pub struct DawgBuilder {
    nodes: Vec<DawgNode>,
    units: Vec<DawgUnit>,
    labels: Vec<u8>,
    is_intersection: BitVector,
    table: Vec<u32>,
    node_stack: Vec<u32>,
    recycle_bin: Vec<u32>,
    num_states: usize,
    last_key: SmallVec<[u8; 32]>,
}

impl DawgBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        let mut builder = DawgBuilder {
            nodes: Vec::new(),
            units: Vec::new(),
            labels: Vec::new(),
            is_intersection: BitVector::new(),
            table: vec![0; INITIAL_TABLE_SIZE],
            node_stack: Vec::new(),
            recycle_bin: Vec::new(),
            num_states: 1,
            last_key: SmallVec::new(),
        };
        builder.append_node();
        builder.append_unit();
        // The root carries a label no key byte can produce, so it never
        // compares equal to a terminal during hashing.
        builder.nodes[0].set_label(0xFF);
        builder.node_stack.push(0);
        builder
    }

    /// Inserts a key with its value.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::KeyOrder`] if `key` does not sort strictly
    /// after the previous key, [`BuildError::EmptyKey`] for an empty key,
    /// [`BuildError::NulByte`] if the key contains `0x00` (reserved for the
    /// terminal label), and [`BuildError::ValueOutOfRange`] for values that
    /// do not fit in 31 bits.
    pub fn insert(&mut self, key: &[u8], value: u32) -> Result<(), BuildError> {
        if value >> 31 != 0 {
            return Err(BuildError::ValueOutOfRange { value });
        }
        if key.is_empty() {
            return Err(BuildError::EmptyKey);
        }
        if key.contains(&0) {
            return Err(BuildError::NulByte { key: key.to_vec() });
        }

        let mut id = 0u32;
        let mut key_pos = 0usize;

        // Walk down the rightmost path as long as the key agrees with it.
        while key_pos <= key.len() {
            let child_id = self.nodes[id as usize].child();
            if child_id == 0 {
                break;
            }

            let key_label = key.get(key_pos).copied().unwrap_or(0);
            let unit_label = self.nodes[child_id as usize].label();

            if key_label < unit_label {
                return Err(self.key_order_error(key));
            }
            if key_label > unit_label {
                // The key branches off: everything below the existing child
                // is final now and can be minimized.
                self.nodes[child_id as usize].set_has_sibling(true);
                self.flush(child_id);
                break;
            }

            id = child_id;
            key_pos += 1;
        }

        if key_pos > key.len() {
            // Identical to the previous key.
            return Err(self.key_order_error(key));
        }

        // Append the unshared tail, terminal node included.
        for pos in key_pos..=key.len() {
            let key_label = key.get(pos).copied().unwrap_or(0);
            let child_id = self.append_node();

            if self.nodes[id as usize].child() == 0 {
                self.nodes[child_id as usize].set_is_state(true);
            }
            let id_child = self.nodes[id as usize].child();
            self.nodes[child_id as usize].set_sibling(id_child);
            self.nodes[child_id as usize].set_label(key_label);
            self.nodes[id as usize].set_child(child_id);
            self.node_stack.push(child_id);

            id = child_id;
        }
        self.nodes[id as usize].set_value(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        Ok(())
    }

    /// Finalizes the graph, consuming the builder.
    pub fn finish(mut self) -> Dawg {
        self.flush(0);

        self.units[0] = DawgUnit::new(self.nodes[0].packed());
        self.labels[0] = self.nodes[0].label();
        self.is_intersection.build();

        Dawg {
            units: self.units,
            labels: self.labels,
            is_intersection: self.is_intersection,
        }
    }

    fn key_order_error(&self, key: &[u8]) -> BuildError {
        BuildError::KeyOrder {
            prev: self.last_key.to_vec(),
            next: key.to_vec(),
        }
    }

    /// Minimizes every pending node strictly below `boundary` and pops
    /// `boundary` itself off the stack.
    fn flush(&mut self, boundary: u32) {
        while *self.node_stack.last().expect("stack holds at least the root") != boundary {
            let node_id = self.node_stack.pop().expect("checked non-empty above");

            if self.num_states >= self.table.len() - (self.table.len() >> 2) {
                self.expand_table();
            }

            let mut num_siblings = 0usize;
            let mut i = node_id;
            while i != 0 {
                num_siblings += 1;
                i = self.nodes[i as usize].sibling();
            }

            let (mut match_id, hash_id) = self.find_node(node_id);
            if match_id != 0 {
                self.is_intersection.set(match_id as usize, true);
            } else {
                // Append the chain in reverse so that walking the dense
                // array upward visits siblings in label order.
                let mut unit_id = 0;
                for _ in 0..num_siblings {
                    unit_id = self.append_unit();
                }
                let mut i = node_id;
                while i != 0 {
                    self.units[unit_id as usize] = DawgUnit::new(self.nodes[i as usize].packed());
                    self.labels[unit_id as usize] = self.nodes[i as usize].label();
                    unit_id -= 1;
                    i = self.nodes[i as usize].sibling();
                }
                match_id = unit_id + 1;
                self.table[hash_id as usize] = match_id;
                self.num_states += 1;
            }

            let mut i = node_id;
            while i != 0 {
                let next = self.nodes[i as usize].sibling();
                self.free_node(i);
                i = next;
            }

            let parent = *self.node_stack.last().expect("boundary still on stack");
            self.nodes[parent as usize].set_child(match_id);
        }
        self.node_stack.pop();
    }

    fn expand_table(&mut self) {
        let table_size = self.table.len() << 1;
        self.table.clear();
        self.table.resize(table_size, 0);

        // Re-register every chain head: terminals, plus the one node per
        // chain that was its parent's first child.
        for id in 1..self.units.len() as u32 {
            if self.labels[id as usize] == 0 || self.units[id as usize].is_state() {
                let hash_id = self.find_unit(id);
                self.table[hash_id as usize] = id;
            }
        }
    }

    /// Probes for a registered chain identical to the one headed at
    /// `node_id`. Returns the matching unit id (0 if none) and the probed
    /// table slot.
    fn find_node(&self, node_id: u32) -> (u32, u32) {
        let mut hash_id = self.hash_node(node_id) as usize % self.table.len();
        loop {
            let unit_id = self.table[hash_id];
            if unit_id == 0 {
                return (0, hash_id as u32);
            }
            if self.are_equal(node_id, unit_id) {
                return (unit_id, hash_id as u32);
            }
            hash_id = (hash_id + 1) % self.table.len();
        }
    }

    /// Finds the table slot for an already-registered chain during rehash.
    /// Registered chains are distinct, so the first empty slot is the one.
    fn find_unit(&self, id: u32) -> u32 {
        let mut hash_id = self.hash_unit(id) as usize % self.table.len();
        while self.table[hash_id] != 0 {
            hash_id = (hash_id + 1) % self.table.len();
        }
        hash_id as u32
    }

    /// Compares the pending chain headed at `node_id` with the frozen chain
    /// registered at `unit_id` (its lowest dense index).
    fn are_equal(&self, node_id: u32, unit_id: u32) -> bool {
        let mut unit_id = unit_id;

        let mut i = self.nodes[node_id as usize].sibling();
        while i != 0 {
            if !self.units[unit_id as usize].has_sibling() {
                return false;
            }
            unit_id += 1;
            i = self.nodes[i as usize].sibling();
        }
        if self.units[unit_id as usize].has_sibling() {
            return false;
        }

        let mut i = node_id;
        while i != 0 {
            if self.nodes[i as usize].packed() != self.units[unit_id as usize].raw()
                || self.nodes[i as usize].label() != self.labels[unit_id as usize]
            {
                return false;
            }
            unit_id -= 1;
            i = self.nodes[i as usize].sibling();
        }
        true
    }

    fn hash_unit(&self, id: u32) -> u32 {
        let mut hash_value = 0;
        let mut id = id;
        loop {
            let unit = self.units[id as usize].raw();
            let label = u32::from(self.labels[id as usize]);
            hash_value ^= hash((label << 24) ^ unit);

            if !self.units[id as usize].has_sibling() {
                break;
            }
            id += 1;
        }
        hash_value
    }

    fn hash_node(&self, id: u32) -> u32 {
        let mut hash_value = 0;
        let mut id = id;
        while id != 0 {
            let unit = self.nodes[id as usize].packed();
            let label = u32::from(self.nodes[id as usize].label());
            hash_value ^= hash((label << 24) ^ unit);
            id = self.nodes[id as usize].sibling();
        }
        hash_value
    }

    fn append_unit(&mut self) -> u32 {
        self.is_intersection.append();
        self.units.push(DawgUnit::default());
        self.labels.push(0);
        (self.is_intersection.len() - 1) as u32
    }

    fn append_node(&mut self) -> u32 {
        match self.recycle_bin.pop() {
            Some(id) => {
                self.nodes[id as usize] = DawgNode::default();
                id
            }
            None => {
                let id = self.nodes.len() as u32;
                self.nodes.push(DawgNode::default());
                id
            }
        }
    }

    fn free_node(&mut self, id: u32) {
        self.recycle_bin.push(id);
    }
}

impl Default for DawgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Thomas Wang's 32-bit integer mix. The table layout, and through it the
/// final double-array image, is deterministic given this exact function.
fn hash(mut key: u32) -> u32 {
    key = (!key).wrapping_add(key << 15);
    key ^= key >> 12;
    key = key.wrapping_add(key << 2);
    key ^= key >> 4;
    key = key.wrapping_mul(2057);
    key ^= key >> 16;
    key
}

/// A finished, minimized word graph.
///
/// Sibling chains live in a dense unit array, each chain a contiguous run
/// ending at the unit whose sibling flag is clear. Chains reachable from
/// more than one parent are marked in a rank-indexed bit vector so that the
/// double-array layout can place them once and share the slot range.
pub struct Dawg {
    units: Vec<DawgUnit>,
    labels: Vec<u8>,
    is_intersection: BitVector,
}

impl Dawg {
    /// Id of the root node.
    pub fn root(&self) -> u32 {
        0
    }

    /// Number of frozen units in the graph.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the graph holds no keys.
    pub fn is_empty(&self) -> bool {
        self.child(self.root()) == 0
    }

    pub(crate) fn child(&self, id: u32) -> u32 {
        self.units[id as usize].child()
    }

    pub(crate) fn sibling(&self, id: u32) -> u32 {
        if self.units[id as usize].has_sibling() {
            id + 1
        } else {
            0
        }
    }

    pub(crate) fn value(&self, id: u32) -> u32 {
        self.units[id as usize].value()
    }

    pub(crate) fn is_leaf(&self, id: u32) -> bool {
        self.label(id) == 0
    }

    pub(crate) fn label(&self, id: u32) -> u8 {
        self.labels[id as usize]
    }

    pub(crate) fn is_intersection(&self, id: u32) -> bool {
        self.is_intersection.get(id as usize)
    }

    pub(crate) fn intersection_id(&self, id: u32) -> u32 {
        (self.is_intersection.rank(id as usize) - 1) as u32
    }

    pub(crate) fn num_intersections(&self) -> usize {
        self.is_intersection.num_ones()
    }
}
