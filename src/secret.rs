//! In-memory container for sensitive byte strings: copy-on-construct,
//! explicit read-only view, and a release sequence that overwrites the
//! backing storage before it is freed.
//!
//! Page-locking (`mlock`) is attempted best-effort on unix: failure is
//! logged once at construction and otherwise tolerated, since a KMS
//! should not refuse to start on a host where locking is unavailable
//! (container limits, missing capability, etc).

use std::ptr;

#[cfg(unix)]
use std::os::raw::c_void;

/// Holds sensitive bytes and guarantees they are overwritten on drop.
pub struct SecretBuffer {
    bytes: Vec<u8>,
    locked: bool,
}

impl SecretBuffer {
    /// Copies `data` into a private allocation. The caller's slice is not
    /// retained or modified.
    pub fn new(data: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(data.len());
        bytes.extend_from_slice(data);

        let locked = lock_memory(&bytes);
        if !locked && !bytes.is_empty() {
            tracing::warn!("failed to lock secret buffer pages in memory; continuing without mlock");
        }

        Self { bytes, locked }
    }

    /// Borrow the bytes for the duration of the call. Callers must not
    /// retain this slice beyond the borrow.
    pub fn view(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Overwrites the backing storage (two random passes, one zero pass)
    /// and marks it empty. Safe to call more than once. Does not shrink
    /// the allocation away immediately — it is already zeroed, so
    /// whether the allocator reclaims it now or when the buffer drops
    /// makes no difference to what a later occupant of that memory could
    /// read.
    pub fn clear(&mut self) {
        if self.bytes.is_empty() {
            return;
        }

        overwrite_random(&mut self.bytes);
        overwrite_random(&mut self.bytes);
        overwrite_zero(&mut self.bytes);

        if self.locked {
            unlock_memory(&self.bytes);
            self.locked = false;
        }

        self.bytes.clear();
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}

fn overwrite_random(bytes: &mut [u8]) {
    use rand::RngCore;
    use rand::rngs::OsRng;
    let mut tmp = vec![0u8; bytes.len()];
    OsRng.fill_bytes(&mut tmp);
    for (dst, src) in bytes.iter_mut().zip(tmp.iter()) {
        unsafe { ptr::write_volatile(dst, *src) };
    }
}

fn overwrite_zero(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        unsafe { ptr::write_volatile(b, 0) };
    }
}

#[cfg(unix)]
fn lock_memory(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    let rc = unsafe { libc::mlock(bytes.as_ptr() as *const c_void, bytes.len()) };
    rc == 0
}

#[cfg(unix)]
fn unlock_memory(bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    unsafe {
        libc::munlock(bytes.as_ptr() as *const c_void, bytes.len());
    }
}

#[cfg(not(unix))]
fn lock_memory(_bytes: &[u8]) -> bool {
    false
}

#[cfg(not(unix))]
fn unlock_memory(_bytes: &[u8]) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_returns_original_bytes() {
        let buf = SecretBuffer::new(b"top secret");
        assert_eq!(buf.view(), b"top secret");
    }

    #[test]
    fn clear_zeroes_backing_storage() {
        let mut buf = SecretBuffer::new(&[0xABu8; 32]);

        // Capture the allocation's address and length before `clear`
        // truncates the Vec, so we can inspect the same memory afterward
        // instead of just observing `Vec::clear`'s bookkeeping.
        let ptr = buf.bytes.as_ptr();
        let len = buf.bytes.len();

        buf.clear();
        assert!(buf.is_empty());

        let surviving = unsafe { std::slice::from_raw_parts(ptr, len) };
        assert!(
            surviving.iter().all(|&b| b == 0),
            "backing storage was not zeroed before release"
        );
    }

    #[test]
    fn clear_is_idempotent() {
        let mut buf = SecretBuffer::new(b"abc");
        buf.clear();
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_buffer_does_not_panic() {
        let mut buf = SecretBuffer::new(&[]);
        buf.clear();
        assert!(buf.is_empty());
    }
}
