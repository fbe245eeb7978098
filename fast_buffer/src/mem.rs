//! Slabs and the size classes they are bucketed into.

use crate::error::{BufferError, Result};
use std::fmt;
use std::ops::{Deref, DerefMut};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Checked out of a size-class pool.
    Pooled,
    /// Served outside of the pools, with exactly the requested capacity.
    Oversize,
    /// Built by a caller out of its own memory.
    Foreign,
}

/// A fixed-capacity block of bytes with an adjustable logical length.
///
/// The capacity never changes for the lifetime of the slab; the logical length is the portion the
/// current tenant declared it uses. Bytes past the length, and any bytes of a slab obtained through
/// [`Allocator::allocate`](crate::manager::Allocator::allocate), may still hold whatever a previous
/// tenant left there.
pub struct Slab {
    data: Box<[u8]>,
    len: usize,
    origin: Origin,
    /// id of the issuing allocator, 0 for caller-built slabs
    owner: usize,
}

impl Slab {
    pub(crate) fn with_capacity(capacity: usize, origin: Origin) -> Self {
        Slab {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            origin,
            owner: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Move the logical length anywhere within the capacity, without touching the content.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(BufferError::OutOfRange {
                offset: len,
                capacity: self.capacity(),
            });
        }

        self.fit(len);
        Ok(())
    }

    /// Set the logical length on paths where `len` is already known to fit the capacity.
    #[inline]
    pub(crate) fn fit(&mut self, len: usize) {
        debug_assert!(len <= self.capacity());
        self.len = len.min(self.capacity());
    }

    /// The whole backing block, regardless of the logical length.
    #[inline]
    pub fn as_full_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub(crate) fn full(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }

    #[inline]
    pub(crate) fn set_origin(&mut self, origin: Origin) {
        self.origin = origin;
    }

    #[inline]
    pub(crate) fn owner(&self) -> usize {
        self.owner
    }

    #[inline]
    pub(crate) fn set_owner(&mut self, owner: usize) {
        self.owner = owner;
    }

    /// Logical length only moves forward here; used by fills that went past the declared length.
    #[inline]
    pub(crate) fn cover(&mut self, end: usize) {
        if end > self.len {
            self.len = end;
        }
    }

    #[inline]
    pub(crate) fn truncate(&mut self) {
        self.len = 0;
    }
}

impl Deref for Slab {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data[..self.len]
    }
}

impl DerefMut for Slab {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data[..self.len]
    }
}

impl fmt::Debug for Slab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("origin", &self.origin)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Wrap caller-owned memory. The slab's capacity and length are the vector's length; such a slab is
/// only accepted back by `free` if that capacity happens to match a size class.
impl From<Vec<u8>> for Slab {
    fn from(vec: Vec<u8>) -> Self {
        let len = vec.len();
        Slab {
            data: vec.into_boxed_slice(),
            len,
            origin: Origin::Foreign,
            owner: 0,
        }
    }
}

/// The doubling sequence of capacities `min_size << i`, for every class below `max_size`.
pub(crate) struct SizeClasses {
    min_size: usize,
    capacities: Box<[usize]>,
}

impl SizeClasses {
    pub(crate) fn new(min_size: usize, max_size: usize) -> Self {
        let count = class_index(min_size, max_size);
        let capacities = (0..count)
            .map(|i| min_size << i)
            .collect::<Vec<_>>()
            .into_boxed_slice();

        SizeClasses {
            min_size,
            capacities,
        }
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.capacities.len()
    }

    #[inline]
    pub(crate) fn capacity_of(&self, index: usize) -> usize {
        self.capacities[index]
    }

    /// Index of the smallest class fitting `size`, or `None` if the request is oversize.
    #[inline]
    pub(crate) fn index_for(&self, size: usize) -> Option<usize> {
        let index = class_index(self.min_size, size);
        if index < self.count() {
            Some(index)
        } else {
            None
        }
    }

    /// Index of the class whose capacity is exactly `capacity`.
    #[inline]
    pub(crate) fn index_of_capacity(&self, capacity: usize) -> Option<usize> {
        self.capacities.binary_search(&capacity).ok()
    }
}

/// Ceiling-halve `size` until it fits the smallest class, counting the steps: the result is
/// `ceil(log2(size / min_size))`, clamped to 0.
pub fn class_index(min_size: usize, mut size: usize) -> usize {
    let mut count = 0;
    while size > min_size {
        size = (size >> 1) + (size & 1);
        count += 1;
    }

    count
}
