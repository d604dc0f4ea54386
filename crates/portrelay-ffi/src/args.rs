use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use crate::error;

/// Convert a required C string argument into UTF-8 `&str`.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn required_str_arg<'a>(value: *const c_char, name: &str) -> Option<&'a str> {
    let bytes = unsafe { required_bytes_arg(value, name) }?;
    match std::str::from_utf8(bytes) {
        Ok(v) => Some(v),
        Err(_) => {
            error::set_error_message(format!("{name} must be valid UTF-8"));
            None
        }
    }
}

/// Borrow the bytes of a required C string argument, without the NUL.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn required_bytes_arg<'a>(value: *const c_char, name: &str) -> Option<&'a [u8]> {
    if value.is_null() {
        error::set_error_message(format!("{name} cannot be null"));
        return None;
    }

    // SAFETY: The caller guarantees `value` points to a valid NUL-terminated C string.
    Some(unsafe { CStr::from_ptr(value) }.to_bytes())
}

/// Convert an `argc`/`argv` pair into UTF-8 strings.
///
/// # Safety
/// If `argc > 0`, `argv` must be non-null and readable for `argc` pointers,
/// each a valid NUL-terminated C string.
pub(crate) unsafe fn string_array_arg<'a>(
    argv: *const *const c_char,
    argc: c_int,
) -> Option<Vec<&'a str>> {
    let Ok(count) = usize::try_from(argc) else {
        error::set_error_message("argc cannot be negative");
        return None;
    };
    if count == 0 {
        return Some(Vec::new());
    }
    if argv.is_null() {
        error::set_error_message("argv cannot be null when argc > 0");
        return None;
    }

    // SAFETY: Pointer and length are validated above and owned by caller for the call duration.
    let pointers = unsafe { std::slice::from_raw_parts(argv, count) };
    pointers
        .iter()
        .enumerate()
        .map(|(index, &ptr)| {
            // SAFETY: Each entry is a C string per the caller contract; null is checked inside.
            unsafe { required_str_arg(ptr, &format!("argv[{index}]")) }
        })
        .collect()
}
