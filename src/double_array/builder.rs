use smallvec::SmallVec;

use crate::dawg::Dawg;
use crate::BuildError;

use super::unit::{BuilderUnit, DoubleArrayUnit};

const BLOCK_SIZE: usize = 256;
const NUM_EXTRA_BLOCKS: usize = 16;
const NUM_EXTRAS: usize = BLOCK_SIZE * NUM_EXTRA_BLOCKS;

/// A relative offset is encodable iff its high or low byte is clear.
const UPPER_MASK: u32 = 0xFF << 21;
const LOWER_MASK: u32 = 0xFF;

/// Bookkeeping for one slot of the live window.
///
/// `prev`/`next` thread the non-fixed slots into a circular free list.
/// A fixed slot has its position settled; a used slot additionally serves
/// as some parent's base and may not be picked as a base again.
#[derive(Clone, Copy, Default)]
struct ExtraUnit {
    prev: u32,
    next: u32,
    is_fixed: bool,
    is_used: bool,
}

/// Lays a finished word graph out into a flat array of packed units.
///
/// Each sibling group gets a common base such that the child on label `c`
/// lands at `base XOR c` on a currently free slot. Only the most recent
/// 4096 slots keep free-list bookkeeping; older blocks are frozen as the
/// array grows, with never-matching labels baked into their empty cells.
pub(crate) struct DoubleArrayBuilder {
    units: Vec<BuilderUnit>,
    extras: Box<[ExtraUnit]>,
    labels: SmallVec<[u8; 64]>,
    table: Vec<u32>,
    extras_head: u32,
}

impl DoubleArrayBuilder {
    /// Converts `dawg` into the packed unit array.
    pub(crate) fn build(dawg: &Dawg) -> Result<Vec<DoubleArrayUnit>, BuildError> {
        let mut builder = DoubleArrayBuilder {
            units: Vec::with_capacity(dawg.len().next_power_of_two()),
            extras: vec![ExtraUnit::default(); NUM_EXTRAS].into_boxed_slice(),
            labels: SmallVec::new(),
            table: vec![0; dawg.num_intersections()],
            extras_head: 0,
        };

        builder.reserve_id(0);
        builder.extra_mut(0).is_used = true;
        builder.units[0].set_offset(1)?;
        builder.units[0].set_label(0);

        if dawg.child(dawg.root()) != 0 {
            builder.build_double_array(dawg, dawg.root(), 0)?;
        }

        builder.fix_all_blocks();

        Ok(builder.units.into_iter().map(BuilderUnit::freeze).collect())
    }

    fn num_blocks(&self) -> usize {
        self.units.len() / BLOCK_SIZE
    }

    fn extra(&self, id: u32) -> ExtraUnit {
        self.extras[id as usize % NUM_EXTRAS]
    }

    fn extra_mut(&mut self, id: u32) -> &mut ExtraUnit {
        &mut self.extras[id as usize % NUM_EXTRAS]
    }

    fn build_double_array(
        &mut self,
        dawg: &Dawg,
        dawg_id: u32,
        dic_id: u32,
    ) -> Result<(), BuildError> {
        if dawg.is_leaf(dawg_id) {
            return Ok(());
        }

        let dawg_child_id = dawg.child(dawg_id);
        if dawg.is_intersection(dawg_child_id) {
            // A shared sibling group may already be laid out; reuse the
            // placement if this parent can encode the relative offset.
            let offset = self.table[dawg.intersection_id(dawg_child_id) as usize];
            if offset != 0 {
                let offset = offset ^ dic_id;
                if offset & UPPER_MASK == 0 || offset & LOWER_MASK == 0 {
                    if dawg.is_leaf(dawg_child_id) {
                        self.units[dic_id as usize].set_has_leaf(true);
                    }
                    self.units[dic_id as usize].set_offset(offset)?;
                    return Ok(());
                }
            }
        }

        let offset = self.arrange_children(dawg, dawg_id, dic_id)?;
        if dawg.is_intersection(dawg_child_id) {
            self.table[dawg.intersection_id(dawg_child_id) as usize] = offset;
        }

        let mut dawg_child_id = dawg_child_id;
        while dawg_child_id != 0 {
            let dic_child_id = offset ^ u32::from(dawg.label(dawg_child_id));
            self.build_double_array(dawg, dawg_child_id, dic_child_id)?;
            dawg_child_id = dawg.sibling(dawg_child_id);
        }
        Ok(())
    }

    /// Picks a base for `dawg_id`'s children, reserves their slots and
    /// writes their labels or values. Returns the chosen base.
    fn arrange_children(
        &mut self,
        dawg: &Dawg,
        dawg_id: u32,
        dic_id: u32,
    ) -> Result<u32, BuildError> {
        self.labels.clear();
        let mut dawg_child_id = dawg.child(dawg_id);
        while dawg_child_id != 0 {
            self.labels.push(dawg.label(dawg_child_id));
            dawg_child_id = dawg.sibling(dawg_child_id);
        }

        let offset = self.find_valid_offset(dic_id);
        self.units[dic_id as usize].set_offset(dic_id ^ offset)?;

        let mut dawg_child_id = dawg.child(dawg_id);
        for i in 0..self.labels.len() {
            let label = self.labels[i];
            let dic_child_id = offset ^ u32::from(label);
            self.reserve_id(dic_child_id);

            if dawg.is_leaf(dawg_child_id) {
                self.units[dic_id as usize].set_has_leaf(true);
                self.units[dic_child_id as usize].set_value(dawg.value(dawg_child_id));
            } else {
                self.units[dic_child_id as usize].set_label(label);
            }

            dawg_child_id = dawg.sibling(dawg_child_id);
        }
        self.extra_mut(offset).is_used = true;

        Ok(offset)
    }

    /// Walks the free list for a base whose child slots are all available
    /// and whose relative offset stays encodable. Falls back to a base at
    /// or past the end of the array, which grows on reservation.
    fn find_valid_offset(&self, id: u32) -> u32 {
        if self.extras_head as usize >= self.units.len() {
            return self.units.len() as u32 | (id & LOWER_MASK);
        }

        let mut unfixed_id = self.extras_head;
        loop {
            let offset = unfixed_id ^ u32::from(self.labels[0]);
            if self.is_valid_offset(id, offset) {
                return offset;
            }
            unfixed_id = self.extra(unfixed_id).next;
            if unfixed_id == self.extras_head {
                break;
            }
        }

        self.units.len() as u32 | (id & LOWER_MASK)
    }

    fn is_valid_offset(&self, id: u32, offset: u32) -> bool {
        if self.extra(offset).is_used {
            return false;
        }

        let rel_offset = id ^ offset;
        if rel_offset & LOWER_MASK != 0 && rel_offset & UPPER_MASK != 0 {
            return false;
        }

        self.labels[1..]
            .iter()
            .all(|&label| !self.extra(offset ^ u32::from(label)).is_fixed)
    }

    /// Takes the slot `id` out of the free list, growing the array first
    /// when `id` lies past the end.
    fn reserve_id(&mut self, id: u32) {
        if id as usize >= self.units.len() {
            self.expand_units();
        }

        if id == self.extras_head {
            self.extras_head = self.extra(id).next;
            if self.extras_head == id {
                self.extras_head = self.units.len() as u32;
            }
        }
        let ExtraUnit { prev, next, .. } = self.extra(id);
        self.extra_mut(prev).next = next;
        self.extra_mut(next).prev = prev;
        self.extra_mut(id).is_fixed = true;
    }

    /// Appends one block of slots, recycling their window entries and
    /// splicing them into the free list ahead of the current head.
    fn expand_units(&mut self) {
        let src_num_units = self.units.len() as u32;
        let src_num_blocks = self.num_blocks();

        let dest_num_units = src_num_units + BLOCK_SIZE as u32;
        let dest_num_blocks = src_num_blocks + 1;

        if dest_num_blocks > NUM_EXTRA_BLOCKS {
            self.fix_block((src_num_blocks - NUM_EXTRA_BLOCKS) as u32);
        }

        self.units.resize(dest_num_units as usize, BuilderUnit::default());

        if dest_num_blocks > NUM_EXTRA_BLOCKS {
            for id in src_num_units..dest_num_units {
                let extra = self.extra_mut(id);
                extra.is_used = false;
                extra.is_fixed = false;
            }
        }

        for i in src_num_units + 1..dest_num_units {
            self.extra_mut(i - 1).next = i;
            self.extra_mut(i).prev = i - 1;
        }
        self.extra_mut(src_num_units).prev = dest_num_units - 1;
        self.extra_mut(dest_num_units - 1).next = src_num_units;

        let head = self.extras_head;
        let head_prev = self.extra(head).prev;
        self.extra_mut(src_num_units).prev = head_prev;
        self.extra_mut(dest_num_units - 1).next = head;
        self.extra_mut(head_prev).next = src_num_units;
        self.extra_mut(head).prev = dest_num_units - 1;
    }

    /// Freezes the trailing window once the whole graph is placed.
    fn fix_all_blocks(&mut self) {
        let num_blocks = self.num_blocks();
        let begin = num_blocks.saturating_sub(NUM_EXTRA_BLOCKS);
        for block_id in begin..num_blocks {
            self.fix_block(block_id as u32);
        }
    }

    /// Settles every slot of a block leaving the live window. Empty cells
    /// get the label `slot XOR unused_offset`; since `unused_offset` is
    /// never any parent's base, such a cell can never satisfy a lookup.
    fn fix_block(&mut self, block_id: u32) {
        let begin = block_id * BLOCK_SIZE as u32;
        let end = begin + BLOCK_SIZE as u32;

        let mut unused_offset = 0;
        for offset in begin..end {
            if !self.extra(offset).is_used {
                unused_offset = offset;
                break;
            }
        }

        for id in begin..end {
            if !self.extra(id).is_fixed {
                self.reserve_id(id);
                self.units[id as usize].set_label((id ^ unused_offset) as u8);
            }
        }
    }
}
