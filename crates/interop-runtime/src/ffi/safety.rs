//! Scoped buffer pinning and pointer checks
//!
//! A `PinnedBuffer` holds the exclusive borrow of a caller-owned region for
//! exactly one native call. While it exists the region cannot move, be
//! reallocated, or be touched from managed code; dropping it releases the
//! region on every exit path, including errors raised after the pin was taken.

use crate::error::{BridgeError, BridgeResult};
use std::marker::PhantomData;
use std::os::raw::c_int;
use tracing::trace;

/// A contiguous caller-owned byte region with an explicit length
///
/// The managed side allocates and owns the region; native code may read it or
/// write in place, but must not retain the pointer past return.
#[derive(Debug)]
pub struct MarshaledBuffer<'a> {
    data: &'a mut [u8],
    declared_len: usize,
}

impl<'a> MarshaledBuffer<'a> {
    /// Wrap a region with a declared length
    ///
    /// The length is not checked here; it is checked before any call crosses
    /// the boundary, so an oversize declaration fails as `BufferOverrun`.
    pub fn new(data: &'a mut [u8], declared_len: usize) -> Self {
        Self { data, declared_len }
    }

    /// Wrap a region declaring its full length
    pub fn whole(data: &'a mut [u8]) -> Self {
        let declared_len = data.len();
        Self { data, declared_len }
    }

    /// Length the native side will be told about
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    /// Actual size of the region
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Verify the declared length fits the region and the native `int` length
    pub fn check(&self) -> BridgeResult<()> {
        if self.declared_len > self.data.len() || self.declared_len > c_int::MAX as usize {
            return Err(BridgeError::BufferOverrun {
                declared: self.declared_len,
                capacity: self.data.len(),
            });
        }
        Ok(())
    }
}

impl<'a> From<&'a mut [u8]> for MarshaledBuffer<'a> {
    fn from(data: &'a mut [u8]) -> Self {
        MarshaledBuffer::whole(data)
    }
}

impl<'a, const N: usize> From<&'a mut [u8; N]> for MarshaledBuffer<'a> {
    fn from(data: &'a mut [u8; N]) -> Self {
        MarshaledBuffer::whole(data.as_mut_slice())
    }
}

/// RAII pin over a checked buffer
pub struct PinnedBuffer<'a> {
    ptr: *mut u8,
    len: c_int,
    // Holds the caller's exclusive borrow until the pin is released
    _region: PhantomData<&'a mut [u8]>,
}

impl<'a> PinnedBuffer<'a> {
    /// Check the buffer and take the pin
    ///
    /// Zero-length buffers pin to a non-null, aligned dangling pointer with
    /// length 0, which native code must not dereference.
    pub fn acquire(buffer: MarshaledBuffer<'a>) -> BridgeResult<Self> {
        buffer.check()?;

        let capacity = buffer.data.len();
        let ptr = buffer.data.as_mut_ptr();
        // check() bounded the declared length by c_int::MAX
        let len = buffer.declared_len as c_int;

        trace!(len, capacity, "pinned buffer");

        Ok(Self {
            ptr,
            len,
            _region: PhantomData,
        })
    }

    /// Native view: base pointer and length
    pub fn as_native(&self) -> (*mut u8, c_int) {
        (self.ptr, self.len)
    }

    /// Declared length
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Check if the declared length is zero
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for PinnedBuffer<'_> {
    fn drop(&mut self) {
        trace!(len = self.len, "unpinned buffer");
    }
}

/// Reject null addresses
pub fn check_null<T>(ptr: *const T) -> Result<*const T, &'static str> {
    if ptr.is_null() {
        Err("Null pointer")
    } else {
        Ok(ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_whole_buffer() {
        let mut data = [1u8, 2, 3, 4];
        let pinned = PinnedBuffer::acquire(MarshaledBuffer::from(&mut data)).unwrap();
        let (ptr, len) = pinned.as_native();
        assert!(!ptr.is_null());
        assert_eq!(len, 4);
    }

    #[test]
    fn test_pin_prefix() {
        let mut data = [0u8; 16];
        let pinned = PinnedBuffer::acquire(MarshaledBuffer::new(&mut data, 8)).unwrap();
        assert_eq!(pinned.len(), 8);
    }

    #[test]
    fn test_overrun_rejected_before_pin() {
        let mut data = [0u8; 4];
        let result = PinnedBuffer::acquire(MarshaledBuffer::new(&mut data, 5));
        assert!(matches!(
            result,
            Err(BridgeError::BufferOverrun {
                declared: 5,
                capacity: 4
            })
        ));
    }

    #[test]
    fn test_zero_length_buffer_is_non_null() {
        let mut data: [u8; 0] = [];
        let pinned = PinnedBuffer::acquire(MarshaledBuffer::from(&mut data)).unwrap();
        let (ptr, len) = pinned.as_native();
        assert!(!ptr.is_null());
        assert_eq!(len, 0);
        assert!(pinned.is_empty());
    }

    #[test]
    fn test_zero_declared_on_non_empty_buffer() {
        let mut data = [9u8; 3];
        let pinned = PinnedBuffer::acquire(MarshaledBuffer::new(&mut data, 0)).unwrap();
        assert!(pinned.is_empty());
    }

    #[test]
    fn test_region_usable_after_unpin() {
        let mut data = [0u8; 2];
        {
            let pinned = PinnedBuffer::acquire(MarshaledBuffer::from(&mut data)).unwrap();
            let (ptr, _) = pinned.as_native();
            unsafe { *ptr = 7 };
        }
        assert_eq!(data, [7, 0]);
    }

    #[test]
    fn test_check_null() {
        let x = 42;
        assert!(check_null(&x as *const i32).is_ok());
        assert!(check_null(std::ptr::null::<i32>()).is_err());
    }
}
