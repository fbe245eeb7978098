//! Leak accounting and diagnostics.
//!
//! Every allocator owns a set of counters for the slabs, buffer objects and oversize allocations
//! currently checked out, so a balanced program can assert it returns to its baseline. Anomalies
//! (oversize requests, foreign slabs, double checkout/free) are always reported; per-call tracing
//! of allocate/free and acquire/release is opt-in through [`DebugFlags`].
//!
//! Reports go out as `tracing` events under the `fast_buffer` target, and are also forwarded to an
//! injected [`Logger`] if there is one.

use parking_lot::RwLock;
use std::fmt;
use std::ops::BitOr;
use std::panic::Location;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

const TARGET: &str = "fast_buffer";

/// Verbosity bitmask for the call-site tracing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugFlags(u32);

impl DebugFlags {
    pub const NONE: DebugFlags = DebugFlags(0);

    /// Trace every slab allocate and free.
    pub const MEM: DebugFlags = DebugFlags(1);

    /// Trace every buffer acquire and release.
    pub const BUFFER: DebugFlags = DebugFlags(2);

    pub const ALL: DebugFlags = DebugFlags(3);

    pub const fn from_bits(bits: u32) -> Self {
        DebugFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: DebugFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for DebugFlags {
    type Output = DebugFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        DebugFlags(self.0 | rhs.0)
    }
}

/// The logging collaborator: an unformatted line sink and a formatted one.
pub trait Logger: Send + Sync {
    fn println(&self, msg: &str);

    fn printf(&self, args: fmt::Arguments<'_>);
}

/// A [`Logger`] made of two closures.
///
/// ```rust
/// use fast_buffer::prelude::*;
///
/// let alloc = Allocator::new();
/// alloc.init_logger(FnLogger::new(
///     |msg: &str| println!("{}", msg),
///     |args: std::fmt::Arguments<'_>| print!("{}", args),
/// ));
/// ```
pub struct FnLogger<P, F> {
    println: P,
    printf: F,
}

impl<P, F> FnLogger<P, F>
where
    P: Fn(&str) + Send + Sync,
    F: Fn(fmt::Arguments<'_>) + Send + Sync,
{
    pub fn new(println: P, printf: F) -> Self {
        FnLogger { println, printf }
    }
}

impl<P, F> Logger for FnLogger<P, F>
where
    P: Fn(&str) + Send + Sync,
    F: Fn(fmt::Arguments<'_>) + Send + Sync,
{
    fn println(&self, msg: &str) {
        (self.println)(msg)
    }

    fn printf(&self, args: fmt::Arguments<'_>) {
        (self.printf)(args)
    }
}

/// Snapshot of the outstanding checkouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeakReport {
    /// Pooled slabs handed out and not yet freed.
    pub slabs: i64,
    /// `FastBuffer` objects acquired and not yet released.
    pub buffers: i64,
    /// Oversize allocations served outside the pools and not yet freed.
    pub oversize: i64,
}

#[derive(Default)]
pub(crate) struct Counters {
    slabs: AtomicI64,
    buffers: AtomicI64,
    oversize: AtomicI64,
}

#[derive(Clone, Copy)]
pub(crate) enum Counter {
    Slabs,
    Buffers,
    Oversize,
}

impl Counters {
    fn cell(&self, counter: Counter) -> &AtomicI64 {
        match counter {
            Counter::Slabs => &self.slabs,
            Counter::Buffers => &self.buffers,
            Counter::Oversize => &self.oversize,
        }
    }

    /// Returns the updated total.
    pub(crate) fn inc(&self, counter: Counter) -> i64 {
        self.cell(counter).fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn dec(&self, counter: Counter) -> i64 {
        self.cell(counter).fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub(crate) fn get(&self, counter: Counter) -> i64 {
        self.cell(counter).load(Ordering::Acquire)
    }

    pub(crate) fn snapshot(&self) -> LeakReport {
        LeakReport {
            slabs: self.get(Counter::Slabs),
            buffers: self.get(Counter::Buffers),
            oversize: self.get(Counter::Oversize),
        }
    }
}

pub(crate) struct Diagnostics {
    level: AtomicU32,
    logger: RwLock<Option<Arc<dyn Logger>>>,
}

impl Diagnostics {
    pub(crate) fn new(flags: DebugFlags) -> Self {
        Diagnostics {
            level: AtomicU32::new(flags.bits()),
            logger: RwLock::new(None),
        }
    }

    pub(crate) fn set_logger(&self, logger: Arc<dyn Logger>) {
        self.logger.write().replace(logger);
    }

    pub(crate) fn flags(&self) -> DebugFlags {
        DebugFlags::from_bits(self.level.load(Ordering::Relaxed))
    }

    pub(crate) fn set_flags(&self, flags: DebugFlags) {
        self.level.store(flags.bits(), Ordering::Relaxed);

        let msg = format!("fast buffer debug level changes to {}", flags.bits());
        tracing::info!(target: TARGET, "{}", msg);
        if let Some(logger) = self.logger() {
            logger.println(&msg);
        }
    }

    #[inline]
    pub(crate) fn enabled(&self, flags: DebugFlags) -> bool {
        self.flags().contains(flags)
    }

    /// Report an anomaly.
    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(target: TARGET, "{}", args);
        self.forward(args);
    }

    /// Report a traced call; only reached when the matching debug flag is on.
    pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(target: TARGET, "{}", args);
        self.forward(args);
    }

    fn forward(&self, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.logger() {
            logger.printf(args);
        }
    }

    // cloned out, so a logger may call back into the allocator
    fn logger(&self) -> Option<Arc<dyn Logger>> {
        self.logger.read().clone()
    }
}

/// `file:line` of the call site, with the directories stripped.
#[derive(Clone, Copy)]
pub(crate) struct Site(pub(crate) &'static Location<'static>);

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.0.file();
        let file = file.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(file);
        write!(f, "{}:{}", file, self.0.line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn flags() {
        assert!(DebugFlags::ALL.contains(DebugFlags::MEM));
        assert!(DebugFlags::ALL.contains(DebugFlags::BUFFER));
        assert!(!DebugFlags::MEM.contains(DebugFlags::BUFFER));
        assert!(!DebugFlags::NONE.contains(DebugFlags::NONE));
        assert_eq!(DebugFlags::MEM | DebugFlags::BUFFER, DebugFlags::ALL);
        assert_eq!(DebugFlags::from_bits(2), DebugFlags::BUFFER);
    }

    #[test]
    fn counters_track_totals() {
        let counters = Counters::default();
        assert_eq!(counters.inc(Counter::Slabs), 1);
        assert_eq!(counters.inc(Counter::Slabs), 2);
        assert_eq!(counters.inc(Counter::Oversize), 1);
        assert_eq!(counters.dec(Counter::Slabs), 1);

        assert_eq!(
            counters.snapshot(),
            LeakReport {
                slabs: 1,
                buffers: 0,
                oversize: 1,
            }
        );
    }

    #[test]
    fn absorbed_without_logger() {
        let diag = Diagnostics::new(DebugFlags::NONE);
        diag.warn(format_args!("nobody listens {}", 1));
        diag.set_flags(DebugFlags::MEM);
        assert!(diag.enabled(DebugFlags::MEM));
        assert!(!diag.enabled(DebugFlags::BUFFER));
    }

    #[test]
    fn forwards_to_logger() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let (l1, l2) = (Arc::clone(&lines), Arc::clone(&lines));

        let diag = Diagnostics::new(DebugFlags::NONE);
        diag.set_logger(Arc::new(FnLogger::new(
            move |msg: &str| l1.lock().push(msg.to_string()),
            move |args: fmt::Arguments<'_>| l2.lock().push(args.to_string()),
        )));

        diag.set_flags(DebugFlags::BUFFER);
        diag.warn(format_args!("extra: {}", 42));

        let lines = lines.lock();
        assert_eq!(lines[0], "fast buffer debug level changes to 2");
        assert_eq!(lines[1], "extra: 42");
    }

    #[test]
    fn site_strips_directories() {
        let site = Site(Location::caller()).to_string();
        assert!(site.starts_with("diag.rs:"));
    }
}
