use crate::pool::ElemBuilder;
use crate::utils::{count_elems, cpu_relax, elem_bit, enter, lock_bit};
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU16, AtomicUsize, Ordering};

/// Constants
pub(crate) const SLOT_CAP: usize = 8;
const TRIALS_COUNT: usize = 4;

pub(crate) struct Bucket<T> {
    /// The actual data store. Elements live in the heap behind raw pointers handed out by
    /// `Box::into_raw`, so the bucket must restore and drop them when it's dropped itself.
    slot: [AtomicPtr<T>; SLOT_CAP],

    /// Reservation counter: how many elements are in the bucket once all in-flight operations are
    /// done. It may run ahead of the bitmap while other threads are checking in or out.
    len: AtomicUsize,

    /// The bitmap of the slots, 2 bits per position. Bit `2 * pos` tells if the slot holds an
    /// element, bit `2 * pos + 1` tells if someone is operating at the slot, in which case everyone
    /// else shall stay away from it.
    bitmap: AtomicU16,

    _marker: PhantomData<Box<T>>,
}

impl<T> Bucket<T> {
    /// Create the bucket. If a filler is provided, all slots are packed with elements built by it.
    pub(crate) fn new(filler: Option<&ElemBuilder<T>>) -> Self {
        let slot: [AtomicPtr<T>; SLOT_CAP] = Default::default();
        let mut bitmap: u16 = 0;
        let mut len = 0;

        if let Some(builder) = filler {
            for (i, item) in slot.iter().enumerate() {
                item.store(Box::into_raw(builder.build()), Ordering::Relaxed);
                bitmap |= elem_bit(i as u16);
                len += 1;
            }
        }

        Bucket {
            slot,
            len: AtomicUsize::new(len),
            bitmap: AtomicU16::new(bitmap),
            _marker: PhantomData,
        }
    }

    /// Number of elements sitting in the bucket right now.
    pub(crate) fn size_hint(&self) -> usize {
        count_elems(self.bitmap.load(Ordering::Acquire))
    }

    /// Lock a position where the request can be fulfilled: one holding an element for `get`, or an
    /// empty one for `put`. The caller must `leave` the returned position afterwards.
    pub(crate) fn access(&self, get: bool) -> Result<u16, ()> {
        // register the intention first, so concurrent attempts that can't succeed bail out early
        let curr_len = if get {
            self.len.fetch_sub(1, Ordering::AcqRel)
        } else {
            self.len.fetch_add(1, Ordering::AcqRel)
        };

        // 0 - 1 wraps to usize::MAX, which is also way off the roof
        if (get && (curr_len == 0 || curr_len > SLOT_CAP)) || (!get && curr_len >= SLOT_CAP) {
            return self.access_failure(get);
        }

        let mut trials: usize = TRIALS_COUNT;
        while trials > 0 {
            trials -= 1;

            let pos = match enter(self.bitmap.load(Ordering::Acquire), get) {
                Ok(pos) => pos,
                Err(()) => {
                    cpu_relax(trials + 1);
                    continue;
                }
            };

            let mask = lock_bit(pos);
            let old = self.bitmap.fetch_or(mask, Ordering::AcqRel);

            if old & mask == 0 {
                // we own the lock bit now, but the slot may have changed since we peeked at it
                if (old & elem_bit(pos) != 0) == get {
                    return Ok(pos);
                }

                self.bitmap.fetch_and(!mask, Ordering::Release);
            }

            // the earliest registered tries more often than the later ones
            cpu_relax(trials + 1);
        }

        self.access_failure(get)
    }

    /// Unlock the position. If the element was moved in or out (`done`), the element bit flips as
    /// well.
    pub(crate) fn leave(&self, pos: u16, done: bool) {
        if done {
            self.bitmap
                .fetch_xor(lock_bit(pos) | elem_bit(pos), Ordering::AcqRel);
        } else {
            self.bitmap.fetch_and(!lock_bit(pos), Ordering::Release);
        }
    }

    /// Take the element out of a position previously locked via `access(true)`.
    pub(crate) fn checkout(&self, pos: u16) -> Option<Box<T>> {
        let val = self.slot[pos as usize].swap(ptr::null_mut(), Ordering::AcqRel);
        if val.is_null() {
            return None;
        }

        // the pointer came out of `Box::into_raw` in `new` or `release`
        Some(unsafe { Box::from_raw(val) })
    }

    /// Move the element into a position previously locked via `access(false)`, running the reset
    /// handle on it first. Hands the element back if the position is unexpectedly taken.
    pub(crate) fn release(
        &self,
        pos: u16,
        mut val: Box<T>,
        reset: Option<&(dyn Fn(&mut T) + Send + Sync)>,
    ) -> Result<(), Box<T>> {
        let slot = &self.slot[pos as usize];
        if !slot.load(Ordering::Acquire).is_null() {
            return Err(val);
        }

        if let Some(handle) = reset {
            handle(&mut val);
        }

        slot.store(Box::into_raw(val), Ordering::Release);
        Ok(())
    }

    /// Undo the reservation made in `access` when no element actually moved.
    pub(crate) fn access_failure(&self, get: bool) -> Result<u16, ()> {
        if get {
            self.len.fetch_add(1, Ordering::AcqRel);
        } else {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }

        Err(())
    }
}

impl<T> Drop for Bucket<T> {
    fn drop(&mut self) {
        for item in self.slot.iter_mut() {
            let val = *item.get_mut();
            if val.is_null() {
                continue;
            }

            unsafe { drop(Box::from_raw(val)) };
            *item.get_mut() = ptr::null_mut();
        }
    }
}

// Elements are only ever touched by the thread holding the slot's lock bit.
unsafe impl<T: Send> Send for Bucket<T> {}
unsafe impl<T: Send> Sync for Bucket<T> {}
