use crate::bucket::*;
use crate::utils::cpu_relax;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const POOL_SIZE: usize = 8;
const SPIN_PERIOD: usize = 4;

type ResetHandle<T> = Box<dyn Fn(&mut T) + Send + Sync>;

pub(crate) enum ElemBuilder<T> {
    Default(fn() -> Box<T>),
    Builder(Box<dyn Fn() -> T + Send + Sync>),
}

impl<T> ElemBuilder<T> {
    pub(crate) fn build(&self) -> Box<T> {
        match self {
            ElemBuilder::Default(handle) => handle(),
            ElemBuilder::Builder(handle) => Box::new(handle()),
        }
    }
}

pub struct SyncPool<T> {
    /// The slots storage
    slots: Vec<Bucket<T>>,

    /// the next bucket to try: (get, put)
    curr: (AtomicUsize, AtomicUsize),

    /// the number of times we failed to find an in-store element to offer
    miss_count: AtomicUsize,

    /// the handle to be invoked before putting the element back
    reset_handle: Option<ResetHandle<T>>,

    /// The builder that will be tasked to create a new instance of the data when the pool is unable
    /// to render one.
    builder: ElemBuilder<T>,
}

impl<T: Default> SyncPool<T> {
    /// Create a pool with room for 64 elements. Elements are built lazily upon the first misses.
    pub fn new() -> Self {
        Self::make_pool(POOL_SIZE, ElemBuilder::Default(Default::default))
    }

    /// Create a `SyncPool` with room for at least `size` elements. Note that we will round-up the
    /// size such that the total number of slots in the pool will mod to 8.
    pub fn with_size(size: usize) -> Self {
        Self::make_pool(bucket_count(size), ElemBuilder::Default(Default::default))
    }
}

impl<T> SyncPool<T> {
    /// Create a pool with room for 64 elements, which will use the `builder` handler to obtain the
    /// initialized instance of the element whenever the pool runs dry.
    ///
    /// Unlike a plain function pointer, the builder may capture its environment, e.g. the byte size
    /// of the buffers a pool is meant to hand out.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncpool::prelude::*;
    ///
    /// let size = 4096;
    /// let pool = SyncPool::with_builder(move || vec![0u8; size]);
    ///
    /// let buf: Box<Vec<u8>> = pool.get();
    /// assert_eq!(buf.len(), 4096);
    ///
    /// pool.put(buf);
    /// assert_eq!(pool.len(), 1);
    /// ```
    pub fn with_builder<F>(builder: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::make_pool(POOL_SIZE, ElemBuilder::Builder(Box::new(builder)))
    }

    /// Same as `with_builder`, but with room for at least `size` elements. The size is rounded up to
    /// a multiple of 8.
    pub fn with_builder_and_size<F>(size: usize, builder: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::make_pool(bucket_count(size), ElemBuilder::Builder(Box::new(builder)))
    }

    /// Obtain an element from the pool. This method always succeeds: if the pool is empty or too
    /// contended, a new boxed element is built instead.
    pub fn get(&self) -> Box<T> {
        let cap = self.slots.len();
        let mut trials = cap;
        let mut pos: usize = self.curr.0.load(Ordering::Acquire) % cap;

        loop {
            let slot = &self.slots[pos];

            if let Ok(i) = slot.access(true) {
                match slot.checkout(i) {
                    Some(val) => {
                        slot.leave(i, true);
                        self.curr.0.store(pos, Ordering::Release);
                        return val;
                    }
                    None => {
                        slot.leave(i, false);
                        let _ = slot.access_failure(true);
                    }
                }
            }

            // hold off a bit to reduce contentions
            cpu_relax(SPIN_PERIOD);

            pos = self.curr.0.fetch_add(1, Ordering::AcqRel).wrapping_add(1) % cap;
            trials -= 1;

            // we've finished 1 loop but not finding a value to extract, quit
            if trials == 0 {
                break;
            }
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        self.builder.build()
    }

    /// Try to return an element to the `SyncPool`. If succeed, we will return `None` to indicate that
    /// the value has been placed in an empty slot; otherwise, we will return `Some(Box<T>)` such
    /// that the caller can decide if the element shall be just discarded, or try put it back again.
    pub fn put(&self, val: Box<T>) -> Option<Box<T>> {
        let cap = self.slots.len();
        let mut trials = 2 * cap;
        let mut pos: usize = self.curr.1.load(Ordering::Acquire) % cap;
        let reset = self.reset_handle.as_deref();
        let mut val = val;

        loop {
            let slot = &self.slots[pos];

            if let Ok(i) = slot.access(false) {
                match slot.release(i, val, reset) {
                    Ok(()) => {
                        slot.leave(i, true);
                        self.curr.1.store(pos, Ordering::Release);
                        return None;
                    }
                    Err(back) => {
                        slot.leave(i, false);
                        let _ = slot.access_failure(false);
                        val = back;
                    }
                }
            }

            if trials < cap {
                cpu_relax(SPIN_PERIOD);
            } else {
                thread::yield_now();
            }

            pos = self.curr.1.fetch_add(1, Ordering::AcqRel).wrapping_add(1) % cap;
            trials -= 1;

            if trials == 0 {
                return Some(val);
            }
        }
    }

    fn make_pool(size: usize, builder: ElemBuilder<T>) -> Self {
        let mut slots = Vec::with_capacity(size);
        (0..size).for_each(|_| slots.push(Bucket::new(None)));

        SyncPool {
            slots,
            curr: (AtomicUsize::new(0), AtomicUsize::new(0)),
            miss_count: AtomicUsize::new(0),
            reset_handle: None,
            builder,
        }
    }
}

impl<T> Default for SyncPool<T>
where
    T: Default,
{
    fn default() -> Self {
        SyncPool::new()
    }
}

#[inline]
fn bucket_count(size: usize) -> usize {
    ((size + SLOT_CAP - 1) / SLOT_CAP).max(1)
}

pub trait PoolState {
    fn miss_count(&self) -> usize;

    fn capacity(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> PoolState for SyncPool<T> {
    fn miss_count(&self) -> usize {
        self.miss_count.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.slots.len() * SLOT_CAP
    }

    fn len(&self) -> usize {
        self.slots
            .iter()
            .fold(0, |sum, item| sum + item.size_hint())
    }
}

pub trait PoolManager<T> {
    fn reset_handle<F>(&mut self, handle: F) -> &mut Self
    where
        F: Fn(&mut T) + Send + Sync + 'static;

    fn refill(&self, count: usize) -> usize;
}

/// The pool manager that provide many useful utilities to keep the SyncPool close to the needs of
/// the caller program.
impl<T> PoolManager<T> for SyncPool<T> {
    /// Set or update the reset handle. If set, the reset handle will be invoked every time an element
    /// is returned back to the pool (i.e. calling the `put` method), regardless of if the element
    /// is created by the pool or not. Taking `&mut self` guarantees nobody is using the pool while
    /// the handle is swapped.
    fn reset_handle<F>(&mut self, handle: F) -> &mut Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.reset_handle.replace(Box::new(handle));
        self
    }

    /// Pre-populate the pool with up to `additional` freshly built elements, e.g. to warm the pool up
    /// ahead of a burst. Returns the number of elements actually placed.
    fn refill(&self, additional: usize) -> usize {
        let empty_slots = self.capacity() - self.len();
        let quota = additional.min(empty_slots);

        let mut count = 0;
        while count < quota {
            if let Some(val) = self.put(self.builder.build()) {
                // contended or already full, the element has nowhere to go
                drop(val);
                break;
            }

            count += 1;
        }

        count
    }
}

#[cfg(test)]
mod pool_tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    struct BigStruct {
        a: u32,
        b: u32,
        c: Vec<u8>,
    }

    impl BigStruct {
        fn new() -> Self {
            BigStruct {
                a: 1,
                b: 42,
                c: vec![0u8; 0x1_000],
            }
        }
    }

    #[test]
    fn use_builder() {
        let pool = SyncPool::with_builder(BigStruct::new);

        let big_box = pool.get();

        assert_eq!(big_box.a, 1);
        assert_eq!(big_box.b, 42);
        assert_eq!(big_box.c.len(), 0x1_000);
        assert_eq!(pool.miss_count(), 1);
    }

    #[test]
    fn capturing_builder() {
        let size = 24;
        let pool = SyncPool::with_builder_and_size(3, move || vec![1u8; size]);

        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.get().len(), 24);
    }

    #[test]
    fn recycles_the_same_element() {
        let pool: SyncPool<Vec<u8>> = SyncPool::with_size(8);

        let mut first = pool.get();
        first.extend_from_slice(b"stale");
        let addr = first.as_ptr();
        assert!(pool.put(first).is_none());
        assert_eq!(pool.len(), 1);

        let second = pool.get();
        assert_eq!(second.as_ptr(), addr);
        assert_eq!(&second[..], b"stale");
        assert!(pool.is_empty());
    }

    #[test]
    fn reset_handle_cleans_on_put() {
        let mut pool: SyncPool<Vec<u8>> = SyncPool::new();
        pool.reset_handle(|v: &mut Vec<u8>| v.clear());

        let mut buf = pool.get();
        buf.push(9);
        pool.put(buf);

        assert!(pool.get().is_empty());
    }

    #[test]
    fn full_pool_hands_back() {
        let pool: SyncPool<u64> = SyncPool::with_size(8);

        for i in 0..8 {
            assert!(pool.put(Box::new(i)).is_none());
        }

        assert_eq!(pool.len(), pool.capacity());
        assert_eq!(pool.put(Box::new(99)).map(|v| *v), Some(99));
    }

    #[test]
    fn refill_stops_at_capacity() {
        let pool: SyncPool<u64> = SyncPool::with_size(16);

        assert_eq!(pool.refill(4), 4);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.refill(100), 12);
        assert_eq!(pool.len(), 16);
        assert_eq!(pool.refill(1), 0);
    }

    #[test]
    fn concurrent_get_and_put() {
        let pool: Arc<SyncPool<Vec<u8>>> = Arc::new(SyncPool::with_size(32));
        let in_flight: Arc<Mutex<HashSet<usize>>> = Arc::new(Mutex::new(HashSet::new()));

        let handles: Vec<_> = (0..16)
            .map(|id| {
                let pool = Arc::clone(&pool);
                let in_flight = Arc::clone(&in_flight);

                thread::spawn(move || {
                    for round in 0..5_000 {
                        let mut buf = pool.get();
                        let addr = &*buf as *const Vec<u8> as usize;

                        // no other thread may hold the same element right now
                        assert!(in_flight.lock().unwrap().insert(addr));

                        buf.clear();
                        buf.push(id as u8);
                        buf.push(round as u8);
                        assert_eq!(&buf[..], &[id as u8, round as u8]);

                        assert!(in_flight.lock().unwrap().remove(&addr));
                        pool.put(buf);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(in_flight.lock().unwrap().is_empty());
        assert!(pool.len() <= pool.capacity());
    }
}
