use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::block::SampleBlock;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::segment::SegmentId;

/// An ordered sequence of segments presenting a flat sample-position space.
///
/// A `Track` owns only a reference to its head segment; the segments
/// themselves (and the block storage they view) live in a shared [`Graph`]
/// arena so that segments can be aliased across tracks (see
/// [`Track::pair`] / [`Track::insert`]).
pub struct Track {
    graph: Rc<RefCell<Graph>>,
    head: Option<SegmentId>,
}

impl Track {
    /// Creates a new, empty track with its own private graph. A track
    /// created this way cannot alias segments with another independently
    /// created track; use [`Track::pair`] for two tracks that need to
    /// exchange slices via [`Track::insert`].
    pub fn new() -> Track {
        Track {
            graph: Rc::new(RefCell::new(Graph::new())),
            head: None,
        }
    }

    /// Creates two empty tracks that share one graph, so that segments may
    /// later be aliased between them with [`Track::insert`].
    pub fn pair() -> (Track, Track) {
        let graph = Rc::new(RefCell::new(Graph::new()));
        (
            Track {
                graph: graph.clone(),
                head: None,
            },
            Track { graph, head: None },
        )
    }

    fn shares_graph_with(&self, other: &Track) -> bool {
        Rc::ptr_eq(&self.graph, &other.graph)
    }

    /// The number of samples currently in the track. `O(n)` in segment
    /// count; not cached, per the specification.
    pub fn length(&self) -> usize {
        let graph = self.graph.borrow();
        let mut total = 0usize;
        let mut cur = self.head;
        while let Some(id) = cur {
            let seg = graph.get(id);
            total += seg.length;
            cur = seg.next;
        }
        total
    }

    fn chain(&self) -> Vec<SegmentId> {
        let graph = self.graph.borrow();
        let mut ids = Vec::new();
        let mut cur = self.head;
        while let Some(id) = cur {
            ids.push(id);
            cur = graph.get(id).next;
        }
        ids
    }

    /// Copies up to `min(dst.len(), length() - pos)` samples starting at
    /// `pos` into `dst`, returning how many were copied. A no-op (returns
    /// `0`) if `pos` is at or past the end of the track, or `dst` is empty.
    pub fn read(&self, dst: &mut [i16], pos: usize) -> usize {
        let total = self.length();
        tracing::trace!(pos, requested = dst.len(), total, "read");
        if pos >= total || dst.is_empty() {
            return 0;
        }
        let to_read = dst.len().min(total - pos);

        let graph = self.graph.borrow();
        let mut seg_start = 0usize;
        let mut cursor = pos;
        let mut remaining = to_read;
        let mut dst_off = 0usize;
        let mut cur = self.head;

        while let Some(id) = cur {
            if remaining == 0 {
                break;
            }
            let seg = graph.get(id);
            let seg_end = seg_start + seg.length;
            if cursor < seg_end {
                let local_offset = cursor.saturating_sub(seg_start);
                let readable = seg.length - local_offset;
                let chunk = remaining.min(readable);
                let block = seg.block.borrow();
                let src_start = seg.offset + local_offset;
                dst[dst_off..dst_off + chunk]
                    .copy_from_slice(&block.data()[src_start..src_start + chunk]);
                cursor += chunk;
                dst_off += chunk;
                remaining -= chunk;
            }
            seg_start = seg_end;
            cur = seg.next;
        }

        to_read
    }

    /// Overwrites `[pos, pos+src.len())` in place (visible through any
    /// aliasing child segment or cross-track alias (this is intentional
    /// shared-storage editing, not a defect), appending a freshly allocated
    /// segment for any part of `src` that extends past the current length.
    ///
    /// Returns `Err(Error::WriteBeyondEnd)` if `pos` is strictly past the
    /// current track length, rather than silently shifting `src` backward
    /// to start the append at `length()` (see `SPEC_FULL.md` §4.3 for why
    /// this open question is resolved as a rejection).
    pub fn write(&mut self, src: &[i16], pos: usize) -> Result<usize> {
        let total = self.length();
        if pos > total {
            return Err(Error::WriteBeyondEnd { pos, length: total });
        }
        if src.is_empty() {
            return Ok(0);
        }

        tracing::trace!(pos, len = src.len(), total, "write");

        let prefix_len = src.len().min(total - pos);
        if prefix_len > 0 {
            let mut graph = self.graph.borrow_mut();
            let mut seg_start = 0usize;
            let mut cursor = pos;
            let mut remaining = prefix_len;
            let mut src_off = 0usize;
            let mut cur = self.head;

            while let Some(id) = cur {
                if remaining == 0 {
                    break;
                }
                let seg = graph.get_mut(id);
                let seg_end = seg_start + seg.length;
                if cursor < seg_end {
                    let local_offset = cursor.saturating_sub(seg_start);
                    let writable = seg.length - local_offset;
                    let chunk = remaining.min(writable);
                    let dst_start = seg.offset + local_offset;
                    let mut block = seg.block.borrow_mut();
                    block.data_mut()[dst_start..dst_start + chunk]
                        .copy_from_slice(&src[src_off..src_off + chunk]);
                    drop(block);
                    cursor += chunk;
                    src_off += chunk;
                    remaining -= chunk;
                }
                seg_start = seg_end;
                cur = seg.next;
            }
        }

        let tail = &src[prefix_len..];
        if !tail.is_empty() {
            let block = SampleBlock::new(tail.to_vec());
            let new_id = {
                let mut graph = self.graph.borrow_mut();
                graph.new_orphan(block, 0, tail.len())
            };
            self.append_segment(new_id);
        }

        Ok(src.len())
    }

    fn append_segment(&mut self, new_id: SegmentId) {
        match self.head {
            None => self.head = Some(new_id),
            Some(head) => {
                let mut graph = self.graph.borrow_mut();
                let mut cur = head;
                loop {
                    let next = graph.get(cur).next;
                    match next {
                        Some(n) => cur = n,
                        None => break,
                    }
                }
                graph.get_mut(cur).next = Some(new_id);
            }
        }
    }

    /// Deletes `[pos, pos+len)` (clamped to the track's length). Returns
    /// `Ok(false)` without changing any state if the range is empty/out of
    /// range, or if any segment intersecting the range has an outstanding
    /// view (`view_refcount > 0`); deletion is atomic-or-nothing.
    pub fn delete_range(&mut self, pos: usize, len: usize) -> Result<bool> {
        let total = self.length();
        if pos >= total || len == 0 {
            return Ok(false);
        }
        let len = len.min(total - pos);

        if !self.delete_precheck(pos, len) {
            tracing::debug!(pos, len, "delete_range refused: outstanding view");
            return Ok(false);
        }

        self.split_delete_boundaries(pos, len);
        let freed = self.unlink_inside_range(pos, len);

        tracing::debug!(pos, len, freed, "delete_range succeeded");
        Ok(true)
    }

    fn delete_precheck(&self, pos: usize, len: usize) -> bool {
        let graph = self.graph.borrow();
        let mut seg_start = 0usize;
        let mut cur = self.head;
        while let Some(id) = cur {
            let seg = graph.get(id);
            let seg_end = seg_start + seg.length;
            if seg_end > pos && seg_start < pos + len && seg.view_refcount() > 0 {
                return false;
            }
            seg_start = seg_end;
            cur = seg.next;
        }
        true
    }

    fn split_delete_boundaries(&mut self, pos: usize, len: usize) {
        let ids = self.chain();
        let mut seg_start = 0usize;
        for id in ids {
            let length = self.graph.borrow().get(id).length;
            let seg_end = seg_start + length;
            if seg_end > pos && seg_start < pos + len {
                let del_start = pos.saturating_sub(seg_start).min(length);
                let del_end = (pos + len).saturating_sub(seg_start).min(length);
                let mut graph = self.graph.borrow_mut();
                graph.split(id, del_end);
                graph.split(id, del_start);
            }
            seg_start = seg_end;
        }
    }

    fn unlink_inside_range(&mut self, pos: usize, len: usize) -> usize {
        let mut seg_start = 0usize;
        let mut prev: Option<SegmentId> = None;
        let mut cur = self.head;
        let mut freed = 0usize;

        while let Some(id) = cur {
            let (length, next) = {
                let graph = self.graph.borrow();
                let seg = graph.get(id);
                (seg.length, seg.next)
            };
            let seg_end = seg_start + length;

            if seg_start >= pos && seg_end <= pos + len {
                match prev {
                    Some(p) => {
                        self.graph.borrow_mut().get_mut(p).next = next;
                    }
                    None => self.head = next,
                }
                self.graph.borrow_mut().free_segment(id);
                freed += 1;
                cur = next;
                seg_start = seg_end;
            } else {
                prev = Some(id);
                cur = next;
                seg_start = seg_end;
            }
        }

        freed
    }

    /// Aliases `[src_pos, src_pos+len)` of `src` into `self` at `dst_pos`,
    /// without copying samples. `self` and `src` must share a graph (see
    /// [`Track::pair`]); writing through either view afterwards is visible
    /// through the other.
    pub fn insert(&mut self, src: &mut Track, dst_pos: usize, src_pos: usize, len: usize) -> Result<()> {
        if !self.shares_graph_with(src) {
            return Err(Error::UnrelatedTracks);
        }

        let src_len = src.length();
        let dst_len = self.length();
        if len == 0 || src_pos + len > src_len || dst_pos > dst_len {
            return Err(Error::OutOfRange {
                pos: src_pos,
                len,
                length: src_len,
            });
        }

        tracing::debug!(dst_pos, src_pos, len, "insert");

        src.split_delete_boundaries(src_pos, len);

        let range_ids = src.segments_fully_inside(src_pos, len);

        let (chain_head, chain_tail) = {
            let mut graph = self.graph.borrow_mut();
            let mut head: Option<SegmentId> = None;
            let mut tail: Option<SegmentId> = None;
            for id in range_ids {
                let alias = graph.new_alias(id);
                match tail {
                    None => head = Some(alias),
                    Some(t) => graph.get_mut(t).next = Some(alias),
                }
                tail = Some(alias);
            }
            (head, tail)
        };

        if let (Some(head), Some(tail)) = (chain_head, chain_tail) {
            self.splice_in(head, tail, dst_pos);
        }

        Ok(())
    }

    fn segments_fully_inside(&self, pos: usize, len: usize) -> Vec<SegmentId> {
        let graph = self.graph.borrow();
        let mut ids = Vec::new();
        let mut seg_start = 0usize;
        let mut cur = self.head;
        while let Some(id) = cur {
            let seg = graph.get(id);
            let seg_end = seg_start + seg.length;
            if seg_start >= pos && seg_end <= pos + len {
                ids.push(id);
            }
            seg_start = seg_end;
            cur = seg.next;
        }
        ids
    }

    fn splice_in(&mut self, chain_head: SegmentId, chain_tail: SegmentId, dst_pos: usize) {
        if dst_pos == 0 {
            let mut graph = self.graph.borrow_mut();
            graph.get_mut(chain_tail).next = self.head;
            drop(graph);
            self.head = Some(chain_head);
            return;
        }

        let mut seg_start = 0usize;
        let mut prev: Option<SegmentId> = None;
        let mut cur = self.head;

        while let Some(id) = cur {
            let length = self.graph.borrow().get(id).length;
            let seg_end = seg_start + length;

            if dst_pos <= seg_end {
                let local_offset = dst_pos - seg_start;
                let mut graph = self.graph.borrow_mut();

                if local_offset == 0 {
                    graph.get_mut(chain_tail).next = Some(id);
                    match prev {
                        Some(p) => graph.get_mut(p).next = Some(chain_head),
                        None => {
                            drop(graph);
                            self.head = Some(chain_head);
                        }
                    }
                } else if local_offset == length {
                    let next_of_id = graph.get(id).next;
                    graph.get_mut(chain_tail).next = next_of_id;
                    graph.get_mut(id).next = Some(chain_head);
                } else {
                    graph.split(id, local_offset);
                    let next_of_id = graph.get(id).next;
                    graph.get_mut(chain_tail).next = next_of_id;
                    graph.get_mut(id).next = Some(chain_head);
                }
                return;
            }

            seg_start = seg_end;
            prev = Some(id);
            cur = self.graph.borrow().get(id).next;
        }

        // dst_pos == length(): append at the end.
        match prev {
            Some(p) => {
                self.graph.borrow_mut().get_mut(p).next = Some(chain_head);
            }
            None => self.head = Some(chain_head),
        }
    }

    /// Loads an entire WAV file into a fresh single-segment track.
    pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<Track> {
        let samples = wavio::load(path)?;
        let mut track = Track::new();
        if !samples.is_empty() {
            let len = samples.len();
            let block = SampleBlock::new(samples);
            let id = {
                let mut graph = track.graph.borrow_mut();
                graph.new_orphan(block, 0, len)
            };
            track.head = Some(id);
        }
        Ok(track)
    }

    /// Writes the track's entire flattened sample stream to a canonical
    /// PCM16/8kHz/mono WAV file.
    pub fn save_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let total = self.length();
        let mut buf = vec![0i16; total];
        self.read(&mut buf, 0);
        wavio::save(path, &buf)?;
        Ok(())
    }

    /// Releases every segment this track owns in its chain, decrementing
    /// block refcounts along the way. A chain segment with outstanding
    /// children (some other track still aliases it) is left in the arena
    /// rather than freed, the same guard `delete_range` applies, since its
    /// children's `parent` edge must stay valid.
    fn release_chain(&mut self) {
        let mut cur = self.head.take();
        while let Some(id) = cur {
            let mut graph = self.graph.borrow_mut();
            let next = graph.get(id).next;
            if graph.get(id).view_refcount() == 0 {
                graph.free_segment(id);
            }
            drop(graph);
            cur = next;
        }
    }
}

impl Drop for Track {
    /// Mirrors the original `tr_destroy`: frees every owned segment whose
    /// views have all gone, and with them any block whose refcount drops to
    /// zero. A `Track::new()` track's private graph would be reclaimed by
    /// ordinary `Rc` drop anyway, but a `Track::pair()` sibling shares its
    /// graph with the other half, so this has to run explicitly at drop
    /// time rather than rely on the graph itself going away.
    fn drop(&mut self) {
        self.release_chain();
    }
}

impl Default for Track {
    fn default() -> Self {
        Track::new()
    }
}
