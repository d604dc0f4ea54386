//! portrelay-ffi: C-ABI exports for the portrelay wire codec.
//!
//! Strings returned by this library are owned by it and must be released
//! with [`portrelay_string_free`]. On failure, functions return null and
//! record a message readable through [`portrelay_last_error`].

mod args;
mod codec;
mod error;

use std::panic::AssertUnwindSafe;

pub use codec::{portrelay_decode, portrelay_encode, portrelay_string_free, DECODE_ERROR_PREFIX};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Clear the calling thread's last error.
#[no_mangle]
pub extern "C" fn portrelay_clear_error() {
    ffi_boundary((), error::clear_error_state);
}

/// Last error recorded on the calling thread; empty if none.
///
/// The pointer stays valid until the next call into this library on the
/// same thread.
#[no_mangle]
pub extern "C" fn portrelay_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}
