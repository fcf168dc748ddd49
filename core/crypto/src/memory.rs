//! Secure erasure and constant-time comparison of secret buffers.

use std::sync::atomic::{compiler_fence, fence, Ordering};
use subtle::ConstantTimeEq;

fn fill_volatile(buffer: &mut [u8], value: u8) {
    for byte in buffer.iter_mut() {
        // SAFETY: `byte` is a valid, aligned, exclusive reference.
        unsafe { std::ptr::write_volatile(byte, value) };
    }
    barrier();
}

fn barrier() {
    compiler_fence(Ordering::SeqCst);
    fence(Ordering::SeqCst);
}

/// Overwrite `buffer` in four passes: all-ones, all-zeros, fresh random
/// bytes, all-zeros. A compiler and CPU fence follows every pass so the
/// stores cannot be elided or reordered past the end of the call.
///
/// If the random source is unavailable the random pass is skipped; the
/// buffer still ends up zeroed.
pub fn secure_wipe(buffer: &mut [u8]) {
    if buffer.is_empty() {
        return;
    }

    fill_volatile(buffer, 0xFF);
    fill_volatile(buffer, 0x00);

    if getrandom::getrandom(buffer).is_err() {
        tracing::warn!("Random pass skipped during secure wipe");
    }
    barrier();

    fill_volatile(buffer, 0x00);
}

/// Wipe a vector's contents, then truncate it.
pub fn wipe_vec(buffer: &mut Vec<u8>) {
    secure_wipe(buffer.as_mut_slice());
    buffer.clear();
}

/// Compare two byte strings without data-dependent early exit.
///
/// Inputs of different lengths compare unequal; the length itself is not
/// treated as secret.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_wipe_clears_pattern() {
        let mut buffer = vec![0xABu8; 257];
        secure_wipe(&mut buffer);

        assert_eq!(buffer.len(), 257);
        assert!(buffer.iter().all(|&b| b != 0xAB));
        assert!(buffer.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_secure_wipe_empty_is_noop() {
        let mut buffer: [u8; 0] = [];
        secure_wipe(&mut buffer);
    }

    #[test]
    fn test_wipe_vec_truncates() {
        let mut secret = b"hunter2".to_vec();
        wipe_vec(&mut secret);
        assert!(secret.is_empty());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"same-tag", b"same-tag"));
        assert!(!constant_time_compare(b"same-tag", b"same-taG"));
        assert!(!constant_time_compare(b"short", b"longer"));
        assert!(constant_time_compare(b"", b""));
    }
}
