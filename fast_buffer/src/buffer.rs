use crate::error::{BufferError, Result};
use crate::mem::Slab;
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};

/// A slab paired with a fill cursor and a drain cursor.
///
/// The producer side writes at `roff` (through [`read_from`](FastBuffer::read_from),
/// [`copy_from`](FastBuffer::copy_from) or the `Write` impl), the consumer side drains from `woff`
/// (through the `Read` impl or [`write_to`](FastBuffer::write_to)). The unread payload is always
/// `slab[woff..roff]`, and `woff <= roff <= slab.len() <= slab.capacity()` holds between calls.
///
/// Buffers are handed out by [`Allocator::acquire`](crate::manager::Allocator::acquire) and must be
/// handed back with [`Allocator::release`](crate::manager::Allocator::release). A buffer is owned by
/// exactly one task at a time; moving the box is the only way to share it.
#[derive(Default)]
pub struct FastBuffer {
    slab: Option<Box<Slab>>,
    /// bytes read into the buffer from the producer
    roff: usize,
    /// bytes sent out of the buffer to the consumer
    woff: usize,
    inuse: bool,
}

impl FastBuffer {
    pub(crate) fn bind(&mut self, slab: Box<Slab>) {
        self.slab = Some(slab);
        self.roff = 0;
        self.woff = 0;
        self.inuse = true;
    }

    /// Detach the slab, truncated and with both cursors zeroed; the object is left not in use.
    pub(crate) fn unbind(&mut self) -> Option<Box<Slab>> {
        self.recycle();
        self.inuse = false;
        self.slab.take()
    }

    /// Wipe every field before the object goes back to its pool.
    pub(crate) fn scrub(&mut self) {
        self.slab = None;
        self.roff = 0;
        self.woff = 0;
    }

    #[cfg(test)]
    pub(crate) fn force_in_use(&mut self) {
        self.inuse = true;
    }

    #[inline]
    pub fn is_in_use(&self) -> bool {
        self.inuse
    }

    /// The logical view of the slab, from the very first byte.
    pub fn buf(&self) -> &[u8] {
        match self.slab.as_deref() {
            Some(slab) => &slab[..],
            None => &[],
        }
    }

    /// The unread payload.
    pub fn unread(&self) -> &[u8] {
        match self.slab.as_deref() {
            Some(slab) => &slab.full()[self.woff..self.roff],
            None => &[],
        }
    }

    /// Number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.roff - self.woff
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.roff == self.woff
    }

    /// Capacity of the underlying slab: the hard limit for fills.
    pub fn capacity(&self) -> usize {
        self.slab.as_ref().map_or(0, |slab| slab.capacity())
    }

    /// The fill cursor.
    #[inline]
    pub fn read_offset(&self) -> usize {
        self.roff
    }

    /// The drain cursor.
    #[inline]
    pub fn write_offset(&self) -> usize {
        self.woff
    }

    /// Reposition the logical view without copying anything.
    ///
    /// With `start == 0` the first `length` bytes count as filled and nothing as drained. Otherwise
    /// `[0, start)` counts as drained already and `[start, start + length)` as the unread payload.
    pub fn resize(&mut self, start: usize, length: usize) -> Result<()> {
        let slab = self.slab.as_mut().ok_or(BufferError::EmptyBuffer)?;
        let capacity = slab.capacity();

        let end = match start.checked_add(length) {
            Some(end) if start <= capacity && end <= capacity => end,
            _ => {
                return Err(BufferError::OutOfRange {
                    offset: start.saturating_add(length),
                    capacity,
                })
            }
        };

        slab.set_len(end)?;
        self.woff = start;
        self.roff = end;
        Ok(())
    }

    /// Overwrite the cursors directly; `None` leaves a cursor where it is. Nothing changes if the
    /// outcome would break `woff <= roff <= capacity`.
    pub fn reset(&mut self, roff: Option<usize>, woff: Option<usize>) -> Result<()> {
        let slab = self.slab.as_mut().ok_or(BufferError::EmptyBuffer)?;
        let capacity = slab.capacity();

        let new_roff = roff.unwrap_or(self.roff);
        let new_woff = woff.unwrap_or(self.woff);

        if new_roff > capacity {
            return Err(BufferError::OutOfRange {
                offset: new_roff,
                capacity,
            });
        }

        if new_woff > new_roff {
            return Err(BufferError::OutOfRange {
                offset: new_woff,
                capacity: new_roff,
            });
        }

        slab.cover(new_roff);
        self.roff = new_roff;
        self.woff = new_woff;
        Ok(())
    }

    /// Pull from `src` into the free room of the slab until the source runs dry or the slab is full.
    ///
    /// Once the slab is full, or the source makes no more progress, whatever is left in the source
    /// is drained into a sink, so the source is never left half read. Returns the number of bytes
    /// stored. A failing source yields [`BufferError::Io`] carrying the bytes stored before the
    /// failure; they stay in the buffer.
    pub fn read_from<R>(&mut self, src: &mut R) -> Result<u64>
    where
        R: Read + ?Sized,
    {
        let slab = self.slab.as_mut().ok_or(BufferError::EmptyBuffer)?;
        let capacity = slab.capacity();
        let mut sum: u64 = 0;

        loop {
            if self.roff >= capacity {
                return discard(src, sum);
            }

            let window = capacity - self.roff;
            let n = match src.read(&mut slab.as_full_mut()[self.roff..]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(BufferError::io(sum, e)),
            };

            if n > window {
                return Err(BufferError::InvalidReadCount {
                    reported: n,
                    window,
                });
            }

            if n == 0 {
                return discard(src, sum);
            }

            self.roff += n;
            slab.cover(self.roff);
            sum += n as u64;
        }
    }

    /// Copy `data` in at the fill cursor, as much as fits. Fails if `data` could never fit, i.e.
    /// it's longer than the whole slab.
    pub fn copy_from(&mut self, data: &[u8]) -> Result<usize> {
        let slab = self.slab.as_mut().ok_or(BufferError::EmptyBuffer)?;
        if data.len() > slab.capacity() {
            return Err(BufferError::OutOfRange {
                offset: data.len(),
                capacity: slab.capacity(),
            });
        }

        Ok(self.append(data))
    }

    /// Push the unread payload into `dst` with a single write.
    ///
    /// On a full drain both cursors go back to 0 and the slab is ready for the next fill. A sink
    /// taking only part of the payload moves the drain cursor by what it took and fails with
    /// [`BufferError::ShortWrite`].
    pub fn write_to<W>(&mut self, dst: &mut W) -> Result<u64>
    where
        W: Write + ?Sized,
    {
        let slab = match self.slab.as_ref() {
            Some(slab) => slab,
            None => return Ok(0),
        };

        let offered = self.roff - self.woff;
        if offered > 0 {
            let m = dst
                .write(&slab.full()[self.woff..self.roff])
                .map_err(|e| BufferError::io(0, e))?;

            if m > offered {
                return Err(BufferError::InvalidWriteCount {
                    reported: m,
                    offered,
                });
            }

            self.woff += m;
            if m != offered {
                return Err(BufferError::ShortWrite {
                    written: m,
                    offered,
                });
            }
        }

        self.recycle();
        Ok(offered as u64)
    }

    /// Copy as much of `data` as the free room allows.
    fn append(&mut self, data: &[u8]) -> usize {
        let slab = match self.slab.as_mut() {
            Some(slab) => slab,
            None => return 0,
        };

        let room = &mut slab.as_full_mut()[self.roff..];
        let m = room.len().min(data.len());
        room[..m].copy_from_slice(&data[..m]);

        self.roff += m;
        slab.cover(self.roff);
        m
    }

    /// Everything has been drained: rewind in place so the slab can be filled again.
    fn recycle(&mut self) {
        if let Some(slab) = self.slab.as_mut() {
            slab.truncate();
        }

        self.roff = 0;
        self.woff = 0;
    }
}

fn discard<R>(src: &mut R, sum: u64) -> Result<u64>
where
    R: Read + ?Sized,
{
    match io::copy(src, &mut io::sink()) {
        Ok(_) => Ok(sum),
        Err(e) => Err(BufferError::io(sum, e)),
    }
}

/// Drain the unread payload into `buf`. An exhausted buffer rewinds itself and reports `Ok(0)`.
impl Read for FastBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_empty() {
            self.recycle();
            return Ok(0);
        }

        let src = self.unread();
        let n = src.len().min(buf.len());
        buf[..n].copy_from_slice(&src[..n]);

        self.woff += n;
        Ok(n)
    }
}

/// Fill from a producer that pushes; a full buffer accepts nothing.
impl Write for FastBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.slab.is_none() {
            return Err(BufferError::EmptyBuffer.into());
        }

        Ok(self.append(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for FastBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastBuffer")
            .field("roff", &self.roff)
            .field("woff", &self.woff)
            .field("inuse", &self.inuse)
            .field("slab", &self.slab)
            .finish()
    }
}
