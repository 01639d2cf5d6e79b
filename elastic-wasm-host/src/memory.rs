//! Bounds-checked access to guest linear memory
//!
//! Every `(pointer, length)` pair handed over by the guest goes through
//! [`MemoryView`]. A view borrows the memory for the duration of one access
//! only: the guest may grow its memory between host calls (for example inside
//! `malloc`), so bounds are revalidated against the current size every time.

use std::ops::Range;
use thiserror::Error;

/// Errors for guest memory accesses
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// `ptr + len` does not fit in the 32-bit guest address space
    #[error("Guest range overflows: ptr={ptr}, len={len}")]
    Overflow { ptr: u32, len: u32 },

    /// Range ends past the current memory size
    #[error("Out of bounds: ptr={ptr}, len={len}, memory_size={memory_size}")]
    OutOfBounds {
        ptr: u32,
        len: u32,
        memory_size: usize,
    },
}

/// A view over the current contents of a guest's linear memory
pub struct MemoryView<'a> {
    data: &'a mut [u8],
}

impl<'a> MemoryView<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// Current memory size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Validate a guest range and translate it into a host slice range
    pub fn check(&self, ptr: u32, len: u32) -> Result<Range<usize>, MemoryError> {
        let end = ptr
            .checked_add(len)
            .ok_or(MemoryError::Overflow { ptr, len })?;
        if end as usize > self.size() {
            return Err(MemoryError::OutOfBounds {
                ptr,
                len,
                memory_size: self.size(),
            });
        }
        Ok(ptr as usize..end as usize)
    }

    pub fn read(&self, ptr: u32, len: u32) -> Result<&[u8], MemoryError> {
        let range = self.check(ptr, len)?;
        Ok(&self.data[range])
    }

    /// Copy a guest range out of linear memory
    pub fn read_vec(&self, ptr: u32, len: u32) -> Result<Vec<u8>, MemoryError> {
        self.read(ptr, len).map(<[u8]>::to_vec)
    }

    /// Write `bytes` at `ptr`. Nothing is written unless the range is valid.
    pub fn write(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| MemoryError::Overflow { ptr, len: u32::MAX })?;
        let range = self.check(ptr, len)?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_u32_le(&mut self, ptr: u32, value: u32) -> Result<(), MemoryError> {
        self.write(ptr, &value.to_le_bytes())
    }

    pub fn write_u64_le(&mut self, ptr: u32, value: u64) -> Result<(), MemoryError> {
        self.write(ptr, &value.to_le_bytes())
    }
}
