use crate::diag::DebugFlags;
use crate::error::{BufferError, Result};

pub const KB_SIZE: usize = 1024;
pub const MB_SIZE: usize = KB_SIZE * KB_SIZE;

/// Smallest size class, included in the pools.
pub const MIN_SIZE: usize = 8;

/// Upper bound of the size classes, never included in the pools.
pub const MAX_SIZE: usize = 64 * MB_SIZE;

const SLOTS_PER_CLASS: usize = 64;
const CLASS_BUDGET: usize = 64 * MB_SIZE;
const BUFFER_SLOTS: usize = 256;

/// Knobs of an [`Allocator`](crate::manager::Allocator). The defaults mirror the classic layout: 23
/// classes from 8 bytes up to 32 MiB.
#[derive(Clone, Debug)]
pub struct AllocatorConfig {
    pub(crate) min_size: usize,
    pub(crate) max_size: usize,
    pub(crate) slots_per_class: usize,
    pub(crate) class_budget: usize,
    pub(crate) buffer_slots: usize,
    pub(crate) debug: DebugFlags,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            min_size: MIN_SIZE,
            max_size: MAX_SIZE,
            slots_per_class: SLOTS_PER_CLASS,
            class_budget: CLASS_BUDGET,
            buffer_slots: BUFFER_SLOTS,
            debug: DebugFlags::NONE,
        }
    }
}

impl AllocatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity of the smallest size class.
    pub fn min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Exclusive upper bound of the size classes; bigger requests are served unpooled.
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// How many idle slabs each size class may retain, rounded up to a multiple of 8.
    ///
    /// Idle slabs are never handed back to the system allocator, so this is also a bound on the
    /// memory a class can pin. Large classes are further limited by
    /// [`class_budget`](AllocatorConfig::class_budget).
    pub fn slots_per_class(mut self, slots: usize) -> Self {
        self.slots_per_class = slots;
        self
    }

    /// Bytes of idle slabs a single class may retain. A class keeps
    /// `min(slots_per_class, class_budget / capacity)` slots, at least one, and the pool rounds
    /// that up to a multiple of 8. With the defaults every class up to 1 MiB keeps 64 slots and the
    /// 32 MiB class keeps 8.
    pub fn class_budget(mut self, bytes: usize) -> Self {
        self.class_budget = bytes;
        self
    }

    /// How many idle `FastBuffer` objects may be retained, rounded up to a multiple of 8.
    pub fn buffer_slots(mut self, slots: usize) -> Self {
        self.buffer_slots = slots;
        self
    }

    pub fn debug(mut self, flags: DebugFlags) -> Self {
        self.debug = flags;
        self
    }

    /// Idle slots granted to the class of `capacity`.
    pub(crate) fn slots_for(&self, capacity: usize) -> usize {
        (self.class_budget / capacity.max(1)).clamp(1, self.slots_per_class.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_size == 0 {
            return Err(BufferError::InvalidConfig(
                "min_size must be at least 1 byte".to_string(),
            ));
        }

        if self.max_size <= self.min_size {
            return Err(BufferError::InvalidConfig(format!(
                "max_size ({}) must be greater than min_size ({})",
                self.max_size, self.min_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = AllocatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_size, 8);
        assert_eq!(config.max_size, 64 * 1024 * 1024);
    }

    #[test]
    fn large_classes_retain_fewer_slots() {
        let config = AllocatorConfig::default();
        assert_eq!(config.slots_for(8), 64);
        assert_eq!(config.slots_for(MB_SIZE), 64);
        assert_eq!(config.slots_for(2 * MB_SIZE), 32);
        assert_eq!(config.slots_for(32 * MB_SIZE), 2);

        let tight = AllocatorConfig::new().class_budget(0);
        assert_eq!(tight.slots_for(8), 1);

        let few = AllocatorConfig::new().slots_per_class(4);
        assert_eq!(few.slots_for(8), 4);
    }

    #[test]
    fn rejects_bad_bounds() {
        assert!(matches!(
            AllocatorConfig::new().min_size(0).validate(),
            Err(BufferError::InvalidConfig(_))
        ));
        assert!(matches!(
            AllocatorConfig::new().min_size(64).max_size(64).validate(),
            Err(BufferError::InvalidConfig(_))
        ));
        assert!(AllocatorConfig::new()
            .min_size(16)
            .max_size(4096)
            .validate()
            .is_ok());
    }
}
