//! Umbrella crate over the workspace members:
//!
//! - [`syncpool`]: a lock-free object pool with lazily built elements;
//! - [`fast_buffer`]: size-classed slab pools and the dual-cursor `FastBuffer` built on them.
//!
//! ```
//! use fastbuf_tools::prelude::*;
//!
//! let mut fb = Allocator::global().acquire(16);
//! fb.copy_from(b"hello").unwrap();
//! assert_eq!(fb.unread(), b"hello");
//! Allocator::global().release(fb);
//! ```

pub use fast_buffer;
pub use syncpool;

pub mod prelude {
    pub use fast_buffer::prelude::*;
    pub use syncpool::prelude::*;
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use std::io::Read;

    #[test]
    fn members_work_together() {
        let alloc = Allocator::new();
        let shared: SyncPool<Vec<u8>> = SyncPool::with_size(8);

        let mut fb = alloc.acquire(32);
        fb.copy_from(b"pooled bytes").unwrap();

        let mut scratch = shared.get();
        fb.read_to_end(&mut scratch).unwrap();
        assert_eq!(&scratch[..], b"pooled bytes");

        scratch.clear();
        assert!(shared.put(scratch).is_none());

        alloc.release(fb);
        assert_eq!(alloc.check(), LeakReport::default());
    }
}
