use std::hint;

/// Each slot owns 2 bits of the bucket bitmap: bit `2 * pos` marks an element in the slot, bit
/// `2 * pos + 1` marks someone operating on the slot.
const GET_MASK: u16 = 0b1010_1010_1010_1010;
const PUT_MASK: u16 = 0b1111_1111_1111_1111;
const FULL_FLAG: u16 = 0b0101_0101_0101_0101;

#[inline(always)]
pub(crate) fn cpu_relax(count: usize) {
    for _ in 0..(1 << count.min(8)) {
        hint::spin_loop()
    }
}

#[inline(always)]
pub(crate) const fn elem_bit(pos: u16) -> u16 {
    0b01 << (2 * pos)
}

#[inline(always)]
pub(crate) const fn lock_bit(pos: u16) -> u16 {
    0b10 << (2 * pos)
}

/// Count the slots holding an element in the bitmap.
pub(crate) fn count_elems(src: u16) -> usize {
    (src & FULL_FLAG).count_ones() as usize
}

/// Find a slot that can serve the request: an unlocked slot with an element for `get`, an unlocked
/// empty slot for `put`. Assuming 8 slots per bucket, otherwise the masks must be updated.
pub(crate) fn enter(src: u16, get: bool) -> Result<u16, ()> {
    // flip the bits so a usable slot always reads as `0b11`
    let mut base = if get {
        if src & FULL_FLAG == 0 {
            return Err(());
        }

        src ^ GET_MASK
    } else {
        if src & FULL_FLAG == FULL_FLAG {
            return Err(());
        }

        src ^ PUT_MASK
    };

    // skip the leading pairs that can't possibly match
    let mut pos: u16 = {
        let val = base.trailing_zeros() as u16;
        if val > 14 {
            return Err(());
        }

        if val % 2 == 1 {
            base >>= val + 1;
            (val + 1) / 2
        } else {
            base >>= val;
            val / 2
        }
    };

    while base > 0 {
        if base & 0b11 == 0b11 {
            return Ok(pos);
        }

        pos += 1;
        base >>= 2;
    }

    Err(())
}

#[cfg(test)]
mod utils_test {
    use super::*;

    #[test]
    fn access_pass() {
        let test1 = 0b0101010001010100;
        assert_eq!(enter(test1, false), Ok(0));
        assert_eq!(enter(test1, true), Ok(1));

        let test2 = 0b0101010001010101;
        assert_eq!(enter(test2, false), Ok(4));
        assert_eq!(enter(test2, true), Ok(0));

        let test3 = 0b0101010001010111;
        assert_eq!(enter(test3, false), Ok(4));
        assert_eq!(enter(test3, true), Ok(1));

        let test4 = 0b0101010001011011;
        assert_eq!(enter(test4, false), Ok(4));
        assert_eq!(enter(test4, true), Ok(2));
    }

    #[test]
    fn access_deny() {
        // slot 6 is locked and empty, everything else is empty
        let test1 = 0b0010000000000000;
        assert_eq!(enter(test1, false), Ok(0));
        assert_eq!(enter(test1, true), Err(()));

        let test2 = 0b0111010101010111;
        assert_eq!(enter(test2, false), Err(()));
        assert_eq!(enter(test2, true), Ok(1));

        assert_eq!(enter(0, true), Err(()));
        assert_eq!(enter(FULL_FLAG, false), Err(()));
    }

    #[test]
    fn bits_and_counts() {
        assert_eq!(elem_bit(0), 0b01);
        assert_eq!(lock_bit(0), 0b10);
        assert_eq!(elem_bit(7), 0b01 << 14);
        assert_eq!(lock_bit(7), 0b10 << 14);

        assert_eq!(count_elems(0), 0);
        assert_eq!(count_elems(FULL_FLAG), 8);
        assert_eq!(count_elems(0b1011_0001), 2);
    }
}
