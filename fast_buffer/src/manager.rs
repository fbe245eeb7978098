use crate::buffer::FastBuffer;
use crate::config::AllocatorConfig;
use crate::diag::{Counter, Counters, DebugFlags, Diagnostics, LeakReport, Logger, Site};
use crate::error::{BufferError, Result};
use crate::mem::{Origin, SizeClasses, Slab};
use crate::zero;
use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use syncpool::prelude::*;

static GLOBAL: OnceLock<Allocator> = OnceLock::new();

// 0 is left to caller-built slabs
static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// The allocator context: one pool of slabs per size class, the pool of `FastBuffer` objects, and
/// the leak counters of everything handed out of them.
///
/// All methods take `&self` and can be called from any thread. Create one per process (or use
/// [`Allocator::global`]), or one per test to keep the counters isolated.
///
/// ```rust
/// use fast_buffer::prelude::*;
/// use std::io::Read;
///
/// let alloc = Allocator::new();
///
/// let mut fb = alloc.acquire(1024);
/// fb.copy_from(b"hello").unwrap();
///
/// let mut out = String::new();
/// fb.read_to_string(&mut out).unwrap();
/// assert_eq!(out, "hello");
///
/// alloc.release(fb);
/// assert_eq!(alloc.check(), LeakReport::default());
/// ```
pub struct Allocator {
    id: usize,
    classes: SizeClasses,
    pools: Box<[SyncPool<Slab>]>,
    buffers: SyncPool<FastBuffer>,
    counters: Counters,
    diag: Diagnostics,
}

impl Default for Allocator {
    fn default() -> Self {
        Allocator::new()
    }
}

impl Allocator {
    /// An allocator with the default classes: 8 bytes up to 32 MiB.
    pub fn new() -> Self {
        Self::make(AllocatorConfig::default())
    }

    pub fn with_config(config: AllocatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::make(config))
    }

    /// The process-wide allocator with the default configuration, created upon first use.
    pub fn global() -> &'static Allocator {
        GLOBAL.get_or_init(Allocator::new)
    }

    fn make(config: AllocatorConfig) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let classes = SizeClasses::new(config.min_size, config.max_size);

        let pools = (0..classes.count())
            .map(|index| {
                let capacity = classes.capacity_of(index);
                let slots = config.slots_for(capacity);
                let mut pool = SyncPool::with_builder_and_size(slots, move || {
                    let mut slab = Slab::with_capacity(capacity, Origin::Pooled);
                    slab.set_owner(id);
                    slab
                });

                pool.reset_handle(move |slab: &mut Slab| {
                    slab.truncate();
                    slab.set_origin(Origin::Pooled);
                    slab.set_owner(id);
                });

                pool
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let mut buffers: SyncPool<FastBuffer> = SyncPool::with_size(config.buffer_slots);
        buffers.reset_handle(FastBuffer::scrub);

        Allocator {
            id,
            classes,
            pools,
            buffers,
            counters: Counters::default(),
            diag: Diagnostics::new(config.debug),
        }
    }

    /// Inject the logging collaborator. Until then, reports only go out as `tracing` events.
    pub fn init_logger<L>(&self, logger: L)
    where
        L: Logger + 'static,
    {
        self.diag.set_logger(Arc::new(logger));
    }

    pub fn set_debug(&self, flags: DebugFlags) {
        self.diag.set_flags(flags);
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.diag.flags()
    }

    /// Leak check: what is currently checked out.
    pub fn check(&self) -> LeakReport {
        self.counters.snapshot()
    }

    /// Capacities of all size classes, smallest first.
    pub fn size_classes(&self) -> Vec<usize> {
        (0..self.classes.count())
            .map(|i| self.classes.capacity_of(i))
            .collect()
    }

    /// Index of the smallest size class holding `size` bytes. Anything at or past the number of
    /// classes is served unpooled.
    pub fn size_class_index(&self, size: usize) -> usize {
        self.classes
            .index_for(size)
            .unwrap_or_else(|| self.classes.count())
    }

    /// Get a slab of `size` bytes from its size class. The content may be dirty: only the bytes the
    /// caller writes itself are meaningful. Every slab must be handed back with [`free`].
    ///
    /// [`free`]: Allocator::free
    #[track_caller]
    pub fn allocate(&self, size: usize) -> Box<Slab> {
        self.checkout(size, false, Site(Location::caller()))
    }

    /// Same as [`allocate`](Allocator::allocate), but the whole slab is zeroed first.
    #[track_caller]
    pub fn allocate_new(&self, size: usize) -> Box<Slab> {
        self.checkout(size, true, Site(Location::caller()))
    }

    /// Return a slab to its size class. A slab whose capacity matches no class is dropped instead,
    /// so it can never pollute a pool of the wrong class.
    ///
    /// Slabs must come back to the allocator that issued them. One issued by another allocator is
    /// reported and treated as caller-built: the counters of neither allocator move, and it stays
    /// counted as outstanding by its issuer.
    #[track_caller]
    pub fn free(&self, slab: Box<Slab>) -> Result<()> {
        self.checkin(slab, Site(Location::caller()))
    }

    /// Get a `FastBuffer` bound to a slab of `size` bytes, with both cursors at 0.
    #[track_caller]
    pub fn acquire(&self, size: usize) -> Box<FastBuffer> {
        let site = Site(Location::caller());

        let mut fb = loop {
            let fb = self.buffers.get();
            if !fb.is_in_use() {
                break fb;
            }

            // never re-issue it; a freshly built object is never in use, so this ends
            self.diag.warn(format_args!(
                "Bug warning! {}: it has been released more than once somewhere. buf:{} roff:{} woff:{} site:{}",
                BufferError::DoubleCheckout,
                self.counters.get(Counter::Buffers),
                fb.read_offset(),
                fb.write_offset(),
                site
            ));
        };

        let slab = self.checkout(size, false, site);
        fb.bind(slab);

        let total = self.counters.inc(Counter::Buffers);
        if self.diag.enabled(DebugFlags::BUFFER) {
            self.diag.trace(format_args!(
                "buf ++ total:{} size:{} site:{}",
                total, size, site
            ));
        }

        fb
    }

    /// Hand a buffer back: its slab returns to its size class, the object to its own pool. A buffer
    /// that is not in use is refused and reported.
    #[track_caller]
    pub fn release(&self, mut fb: Box<FastBuffer>) {
        let site = Site(Location::caller());

        if !fb.is_in_use() {
            self.diag.warn(format_args!(
                "Bug warning! {}. buf:{} roff:{} woff:{} site:{}",
                BufferError::DoubleFree,
                self.counters.get(Counter::Buffers),
                fb.read_offset(),
                fb.write_offset(),
                site
            ));
            return;
        }

        if let Some(slab) = fb.unbind() {
            // already reported by checkin
            let _ = self.checkin(slab, site);
        }

        let total = self.counters.dec(Counter::Buffers);
        if self.diag.enabled(DebugFlags::BUFFER) {
            self.diag
                .trace(format_args!("buf -- total:{} site:{}", total, site));
        }

        // a full pool just lets the object go
        let _ = self.buffers.put(fb);
    }

    fn checkout(&self, size: usize, zeroed: bool, site: Site) -> Box<Slab> {
        let index = match self.classes.index_for(size) {
            Some(index) => index,
            None => return self.oversize(size, site),
        };

        let mut slab = self.pools[index].get();
        if zeroed {
            zero::memset(slab.as_full_mut());
        }

        // the class capacity is never below `size`
        slab.fit(size);

        let total = self.counters.inc(Counter::Slabs);
        if self.diag.enabled(DebugFlags::MEM) {
            self.diag.trace(format_args!(
                "mem ++ total:{} size:{} cap:{} site:{}",
                total,
                size,
                slab.capacity(),
                site
            ));
        }

        slab
    }

    fn oversize(&self, size: usize, site: Site) -> Box<Slab> {
        let total = self.counters.inc(Counter::Oversize);
        self.diag.warn(format_args!(
            "extra: {} bytes served outside the pools, total:{} site:{}",
            size, total, site
        ));

        let mut slab = Box::new(Slab::with_capacity(size, Origin::Oversize));
        slab.set_owner(self.id);
        slab.fit(size);
        slab
    }

    fn checkin(&self, mut slab: Box<Slab>, site: Site) -> Result<()> {
        if slab.origin() != Origin::Foreign && slab.owner() != self.id {
            self.diag.warn(format_args!(
                "stray slab: cap:{} was issued by another allocator, site:{}",
                slab.capacity(),
                site
            ));

            if slab.origin() == Origin::Oversize {
                return Ok(());
            }

            slab.set_origin(Origin::Foreign);
        }

        if slab.origin() == Origin::Oversize {
            let total = self.counters.dec(Counter::Oversize);
            if self.diag.enabled(DebugFlags::MEM) {
                self.diag.trace(format_args!(
                    "extra -- total:{} cap:{} site:{}",
                    total,
                    slab.capacity(),
                    site
                ));
            }

            return Ok(());
        }

        let capacity = slab.capacity();
        let index = match self.classes.index_of_capacity(capacity) {
            Some(index) => index,
            None => {
                let err = BufferError::UnrecognizedCapacity { capacity };
                self.diag.warn(format_args!("{} site:{}", err, site));
                return Err(err);
            }
        };

        if slab.origin() == Origin::Pooled {
            let total = self.counters.dec(Counter::Slabs);
            if self.diag.enabled(DebugFlags::MEM) {
                self.diag.trace(format_args!(
                    "mem -- total:{} cap:{} site:{}",
                    total, capacity, site
                ));
            }
        }

        // the reset handle truncates it; a full pool just lets it go
        let _ = self.pools[index].put(slab);
        Ok(())
    }
}
