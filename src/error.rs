// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Composes the component crates' error types into the single error
//! enum the filesystem API returns.

/// Every way a [`crate::Filesystem`] operation can fail.
///
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `handle` does not refer to any entry the file table knows about.
    #[error("invalid handle: {0}")]
    InvalidHandle(filetable::Handle),

    /// `handle` names a file that exists but is not currently open.
    #[error("handle not open: {0}")]
    HandleNotOpen(filetable::Handle),

    /// `open` was called for a name that is already open.
    #[error("file is already open")]
    AlreadyOpen,

    /// `seek` targeted an offset past the file's length.
    #[error("seek offset {offset} exceeds file length {length}")]
    SeekOutOfRange { offset: u32, length: u32 },

    /// The frame allocator has no slots left to hand out.
    #[error("frame allocator exhausted: {0}")]
    AllocatorExhausted(#[from] allocator::Exhausted),

    /// The device driver reported a failure: a non-zero `ret` from the
    /// simulated device, or a transport I/O error.
    #[error("device error: {0}")]
    Device(#[from] device::Error),

    /// A file operation was attempted before `power_on` initialized the
    /// cache, or after `power_off` tore it down.
    #[error("cache is not initialized; call power_on first")]
    CacheNotInitialized,

    /// Reserved for parity with the device's documented error kinds.
    /// Rust's allocator aborts rather than returning an error on the
    /// allocation paths this driver uses, so this variant is never
    /// constructed; it exists so callers matching exhaustively on
    /// every documented kind compile against a stable enum.
    #[error("out of memory")]
    OutOfMemory,
}

impl From<filetable::Error> for Error {
    fn from(err: filetable::Error) -> Self {
        match err {
            filetable::Error::InvalidHandle(h) => Error::InvalidHandle(h),
            filetable::Error::HandleNotOpen(h) => Error::HandleNotOpen(h),
            filetable::Error::AlreadyOpen => Error::AlreadyOpen,
            filetable::Error::SeekOutOfRange { offset, length } => {
                Error::SeekOutOfRange { offset, length }
            }
        }
    }
}
