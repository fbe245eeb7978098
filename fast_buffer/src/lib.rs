//! This crate provides recyclable, size-classed byte buffers for I/O code, where implementations
//! of the Read/Write traits are used extensively. Slabs come out of one pre-sized pool per
//! power-of-two size class, so hot paths don't pay for a heap allocation per request; the
//! [`FastBuffer`] on top of a slab is at the same time the fill target of a producer and the drain
//! source of a consumer, without any intermediate copy.
//!
//! To use this crate, add the crate dependency in your project's Cargo.toml file:
//!
//! ```toml
//! [dependencies]
//! fast_buffer = "0.2"
//! ```
//!
//! # Examples
//!
//! ```
//! use fast_buffer::prelude::*;
//! use std::io;
//!
//! let alloc = Allocator::new();
//!
//! // a buffer from the 4 KiB class
//! let mut fb = alloc.acquire(4096);
//!
//! // pull everything the source has, up to the buffer's capacity
//! let mut src = io::repeat(0b101);
//! let mut src = io::Read::take(&mut src, 100);
//! assert_eq!(fb.read_from(&mut src).unwrap(), 100);
//!
//! // push it to the consumer; the buffer rewinds once it's fully drained
//! let mut sink = Vec::new();
//! fb.write_to(&mut sink).unwrap();
//! assert_eq!(sink, vec![0b101; 100]);
//!
//! // hand the slab and the buffer back to their pools
//! alloc.release(fb);
//! assert_eq!(alloc.check(), LeakReport::default());
//! ```

pub mod config;
pub mod diag;
pub mod error;
pub mod manager;
pub mod mem;
pub mod zero;
mod buffer;

pub use crate::{
    buffer::FastBuffer,
    config::AllocatorConfig,
    diag::{DebugFlags, FnLogger, LeakReport, Logger},
    error::{BufferError, Result},
    manager::Allocator,
    mem::Slab,
};

pub mod prelude {
    pub use crate::{
        Allocator, AllocatorConfig, BufferError, DebugFlags, FastBuffer, FnLogger, LeakReport,
        Logger, Slab,
    };
}
