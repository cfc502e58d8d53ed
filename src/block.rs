use std::cell::RefCell;
use std::rc::Rc;

/// A heap-resident `i16` sample buffer shared by every segment that views
/// it. `refcount` is tracked explicitly rather than read off `Rc::strong_count`,
/// so that block lifetime accounting matches the specification's two-level
/// refcounting model regardless of how many transient `Rc` clones exist
/// during an operation.
#[derive(Debug)]
pub struct SampleBlock {
    data: Vec<i16>,
    refcount: u32,
}

pub type BlockHandle = Rc<RefCell<SampleBlock>>;

impl SampleBlock {
    pub fn new(data: Vec<i16>) -> BlockHandle {
        Rc::new(RefCell::new(SampleBlock { data, refcount: 0 }))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[i16] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [i16] {
        &mut self.data
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn incref(handle: &BlockHandle) {
        handle.borrow_mut().refcount += 1;
    }

    /// Decrements the block's refcount. The caller is responsible for
    /// dropping its own `BlockHandle` afterwards; once every segment that
    /// referenced the block has done so, both this counter and the
    /// underlying `Rc` reach zero together.
    pub fn decref(handle: &BlockHandle) -> u32 {
        let mut block = handle.borrow_mut();
        debug_assert!(block.refcount > 0, "decref on a block with refcount 0");
        block.refcount = block.refcount.saturating_sub(1);
        block.refcount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incref_decref_track_refcount() {
        let block = SampleBlock::new(vec![1, 2, 3]);
        assert_eq!(block.borrow().refcount(), 0);

        SampleBlock::incref(&block);
        SampleBlock::incref(&block);
        assert_eq!(block.borrow().refcount(), 2);

        assert_eq!(SampleBlock::decref(&block), 1);
        assert_eq!(SampleBlock::decref(&block), 0);
    }
}
