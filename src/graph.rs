use crate::block::{BlockHandle, SampleBlock};
use crate::segment::{Segment, SegmentId};

enum Slot {
    Occupied { seg: Segment, generation: u32 },
    Vacant { generation: u32 },
}

/// The shared arena backing every [`Track`](crate::track::Track) that may
/// alias another track's segments.
///
/// Two tracks must share a `Graph` to alias each other's segments, because a
/// segment's `parent`/`children` edges are arena indices into exactly one
/// arena. `Track::pair()` is the only public way to get two tracks that
/// share one.
#[derive(Default)]
pub(crate) struct Graph {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, seg: Segment) -> SegmentId {
        if let Some(index) = self.free.pop() {
            let generation = match &self.slots[index as usize] {
                Slot::Vacant { generation } => *generation,
                Slot::Occupied { .. } => unreachable!("free list pointed at an occupied slot"),
            };
            self.slots[index as usize] = Slot::Occupied { seg, generation };
            SegmentId { index, generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot::Occupied { seg, generation: 0 });
            SegmentId {
                index,
                generation: 0,
            }
        }
    }

    /// Removes a segment from the arena and returns it. Callers are
    /// responsible for having already unlinked it from any chain and
    /// parent/children edges, and for decrementing its block's refcount.
    pub fn dealloc(&mut self, id: SegmentId) -> Segment {
        let slot = &mut self.slots[id.index as usize];
        match slot {
            Slot::Occupied { generation, .. } if *generation == id.generation => {
                let next_generation = generation.wrapping_add(1);
                let old = std::mem::replace(
                    slot,
                    Slot::Vacant {
                        generation: next_generation,
                    },
                );
                self.free.push(id.index);
                match old {
                    Slot::Occupied { seg, .. } => seg,
                    Slot::Vacant { .. } => unreachable!(),
                }
            }
            _ => panic!("dealloc on a stale or already-freed SegmentId"),
        }
    }

    pub fn get(&self, id: SegmentId) -> &Segment {
        match &self.slots[id.index as usize] {
            Slot::Occupied { seg, generation } if *generation == id.generation => seg,
            _ => panic!("use of a stale or freed SegmentId"),
        }
    }

    pub fn get_mut(&mut self, id: SegmentId) -> &mut Segment {
        match &mut self.slots[id.index as usize] {
            Slot::Occupied { seg, generation } if *generation == id.generation => seg,
            _ => panic!("use of a stale or freed SegmentId"),
        }
    }

    /// Cuts `seg` at local offset `k`, ascending to the root of its family
    /// first and propagating the cut down through every current descendant,
    /// so the whole aliased family stays consistent. No-op if `k` is `0` or
    /// the segment's full length.
    pub fn split(&mut self, seg: SegmentId, k: usize) {
        let length = self.get(seg).length;
        if k == 0 || k >= length {
            return;
        }

        let mut root = seg;
        while let Some(parent) = self.get(root).parent {
            root = parent;
        }

        self.split_node(root, k, None, None);
    }

    fn split_node(
        &mut self,
        node: SegmentId,
        cut_down: usize,
        left_parent: Option<SegmentId>,
        right_parent: Option<SegmentId>,
    ) {
        let length = self.get(node).length;
        if cut_down == 0 || cut_down == length {
            return;
        }

        let block = self.get(node).block.clone();
        let offset = self.get(node).offset;
        let old_next = self.get(node).next;
        let children = std::mem::take(&mut self.get_mut(node).children);

        SampleBlock::incref(&block);

        let right = self.alloc(Segment {
            block,
            offset: offset + cut_down,
            length: length - cut_down,
            parent: right_parent,
            children: Vec::new(),
            next: old_next,
        });

        {
            let left = self.get_mut(node);
            left.length = cut_down;
            left.next = Some(right);
            left.parent = left_parent;
        }

        if let Some(lp) = left_parent {
            self.get_mut(lp).children.push(node);
        }
        if let Some(rp) = right_parent {
            self.get_mut(rp).children.push(right);
        }

        tracing::debug!(
            node = node.index,
            right = right.index,
            cut_down,
            "split segment"
        );

        for child in children {
            self.split_node(child, cut_down, Some(node), Some(right));
        }
    }

    /// Creates a fresh, block-owning orphan segment (no parent, no children)
    /// and bumps that block's refcount to 1.
    pub fn new_orphan(&mut self, block: BlockHandle, offset: usize, length: usize) -> SegmentId {
        SampleBlock::incref(&block);
        self.alloc(Segment {
            block,
            offset,
            length,
            parent: None,
            children: Vec::new(),
            next: None,
        })
    }

    /// Creates an alias segment viewing the exact same `(block, offset,
    /// length)` as `source`, registers it as `source`'s child, and bumps
    /// the block's refcount for the new reference.
    pub fn new_alias(&mut self, source: SegmentId) -> SegmentId {
        let (block, offset, length) = {
            let seg = self.get(source);
            (seg.block.clone(), seg.offset, seg.length)
        };
        SampleBlock::incref(&block);
        let alias = self.alloc(Segment {
            block,
            offset,
            length,
            parent: Some(source),
            children: Vec::new(),
            next: None,
        });
        self.get_mut(source).children.push(alias);
        alias
    }

    /// Unlinks `id` from its parent's children list and frees its arena
    /// slot, decrementing its block's refcount (freeing the block if this
    /// was the last reference). Panics if `id` still has outstanding
    /// children; callers must check `view_refcount() == 0` first.
    pub fn free_segment(&mut self, id: SegmentId) {
        let parent = self.get(id).parent;
        debug_assert!(
            self.get(id).children.is_empty(),
            "free_segment called on a segment with outstanding views"
        );

        if let Some(parent) = parent {
            self.get_mut(parent).children.retain(|&c| c != id);
        }

        let seg = self.dealloc(id);
        let remaining = SampleBlock::decref(&seg.block);
        tracing::debug!(
            segment = id.index,
            block_refcount = remaining,
            "freed segment"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(block: &BlockHandle, offset: usize, length: usize) -> Segment {
        Segment {
            block: block.clone(),
            offset,
            length,
            parent: None,
            children: Vec::new(),
            next: None,
        }
    }

    #[test]
    fn alloc_and_free_reuses_slots_with_new_generation() {
        let mut graph = Graph::new();
        let block = SampleBlock::new(vec![0; 4]);
        SampleBlock::incref(&block);

        let a = graph.alloc(leaf(&block, 0, 4));
        graph.free_segment(a);

        let b = graph.alloc(leaf(&block, 0, 4));
        assert_eq!(a.index, b.index);
        assert_ne!(a.generation, b.generation);
    }

    #[test]
    #[should_panic]
    fn stale_handle_panics() {
        let mut graph = Graph::new();
        let block = SampleBlock::new(vec![0; 4]);
        SampleBlock::incref(&block);

        let a = graph.alloc(leaf(&block, 0, 4));
        graph.free_segment(a);
        graph.alloc(leaf(&block, 0, 4));

        graph.get(a);
    }

    #[test]
    fn split_propagates_to_alias_children() {
        let mut graph = Graph::new();
        let block = SampleBlock::new(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let root = graph.new_orphan(block, 0, 10);
        let alias = graph.new_alias(root);

        graph.split(root, 4);

        let left = root;
        let right = graph.get(left).next.unwrap();
        assert_eq!(graph.get(left).length, 4);
        assert_eq!(graph.get(right).length, 6);
        assert_eq!(graph.get(right).offset, 4);

        // The alias must have been split into two children mirroring the
        // same boundary, one parented to `left` and one to `right`.
        assert_eq!(graph.get(left).children.len(), 1);
        assert_eq!(graph.get(right).children.len(), 1);
        let alias_left = graph.get(left).children[0];
        let alias_right = graph.get(right).children[0];
        assert_eq!(graph.get(alias_left).length, 4);
        assert_eq!(graph.get(alias_right).length, 6);
        assert_eq!(graph.get(alias_left).offset, graph.get(left).offset);
        assert_eq!(graph.get(alias_right).offset, graph.get(right).offset);
        assert_ne!(alias, alias_left);
        assert_ne!(alias, alias_right);
    }

    #[test]
    fn split_is_noop_at_boundaries() {
        let mut graph = Graph::new();
        let block = SampleBlock::new(vec![0; 4]);
        let seg = graph.new_orphan(block, 0, 4);

        graph.split(seg, 0);
        assert!(graph.get(seg).next.is_none());

        graph.split(seg, 4);
        assert!(graph.get(seg).next.is_none());
    }
}
