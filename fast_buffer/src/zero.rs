/// Zero the whole slice. `fill(0)` lowers to the platform `memset`, which is vectorized where the
/// target allows it.
#[inline]
pub fn memset(buf: &mut [u8]) {
    if buf.is_empty() {
        return;
    }

    buf.fill(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroes_everything() {
        let mut buf = vec![0xAB_u8; 4099];
        memset(&mut buf);
        assert!(buf.iter().all(|b| *b == 0));

        memset(&mut []);
    }
}
