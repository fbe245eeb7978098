//! [`SyncPool`]
//! A simple and thread-safe objects pool to reuse heavy objects placed in the heap.
//!
//! ## What this crate is for
//! Inspired by Go's `sync.Pool` module, this crate provides a multithreading-friendly
//! library to recycle and reuse heavy, heap-based objects, such that the overall
//! allocation and memory pressure will be reduced, and hence boosting the performance.
//!
//! The pool is typed: a `SyncPool<T>` only ever stores `Box<T>`, so elements come back out
//! exactly as they went in, with no runtime type checks. Both `get` and `put` take `&self`
//! and can be called from any number of threads at once; share the pool behind an `Arc`
//! or embed it into a longer-lived context object.
//!
//! ## What this crate is NOT for
//! If your struct is nibble enough to live in the stack without blowing it, or if it's
//! not in middle of the hottest code path, you most likely won't need the library to
//! labor for you, allocators nowadays work quite marvelously, especially on the stack.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use syncpool::prelude::*;
//!
//! #[derive(Default)]
//! struct Frame {
//!     id: usize,
//!     payload: Vec<u8>,
//! }
//!
//! let mut pool: SyncPool<Frame> = SyncPool::with_size(16);
//!
//! // wipe the frame before it goes back into the pool
//! pool.reset_handle(|frame: &mut Frame| {
//!     frame.id = 0;
//!     frame.payload.clear();
//! });
//!
//! let pool = Arc::new(pool);
//! let workers: Vec<_> = (0..4)
//!     .map(|i| {
//!         let pool = Arc::clone(&pool);
//!         thread::spawn(move || {
//!             let mut frame = pool.get();
//!             frame.id = i;
//!             frame.payload.extend_from_slice(b"data");
//!             pool.put(frame);
//!         })
//!     })
//!     .collect();
//!
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//!
//! let frame = pool.get();
//! assert_eq!(frame.id, 0);
//! assert!(frame.payload.is_empty());
//! ```

mod bucket;
mod pool;
mod utils;

pub use crate::pool::{PoolManager, PoolState, SyncPool};

pub mod prelude {
    pub use crate::{PoolManager, PoolState, SyncPool};
}
