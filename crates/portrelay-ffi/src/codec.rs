use std::ffi::CString;
use std::os::raw::{c_char, c_int};

use portrelay_frame::{decode_bytes, encode, Command};
use serde::Serialize;

use crate::args;
use crate::error;

/// Prefix of the string returned by [`portrelay_decode`] on failure.
pub const DECODE_ERROR_PREFIX: &str = "ERROR:";

#[derive(Serialize)]
struct DecodedCommand<'a> {
    command: &'a str,
    args: Vec<String>,
}

fn into_raw_string(bytes: Vec<u8>) -> *mut c_char {
    match CString::new(bytes) {
        Ok(value) => value.into_raw(),
        Err(_) => {
            error::set_error_message("result contains an interior NUL byte");
            std::ptr::null_mut()
        }
    }
}

fn render_decoded(command: &Command) -> Result<String, serde_json::Error> {
    let decoded = DecodedCommand {
        command: command.name(),
        args: command
            .arguments()
            .iter()
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
            .collect(),
    };
    serde_json::to_string(&decoded)
}

/// Encode `name` and `argv[0..argc]` as one wire frame.
///
/// Returns a string owned by this library; release it with
/// `portrelay_string_free`. Returns null and sets the last error on invalid
/// arguments.
///
/// # Safety
/// `name` must be a valid NUL-terminated C string. If `argc > 0`, `argv`
/// must point to `argc` valid NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn portrelay_encode(
    name: *const c_char,
    argc: c_int,
    argv: *const *const c_char,
) -> *mut c_char {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        // SAFETY: Null and UTF-8 are validated in the helpers.
        let Some(name) = (unsafe { args::required_str_arg(name, "name") }) else {
            return std::ptr::null_mut();
        };
        // SAFETY: Caller contract forwarded to the helper.
        let Some(arguments) = (unsafe { args::string_array_arg(argv, argc) }) else {
            return std::ptr::null_mut();
        };

        let command = Command::with_args(name, arguments.into_iter().map(str::to_owned));
        into_raw_string(encode(&command).to_vec())
    })
}

/// Decode one wire frame and render it as
/// `{"command":"...","args":["...",...]}`.
///
/// A decode failure yields `ERROR:` followed by the error message. Arguments
/// that are not UTF-8 are rendered lossily. Release the result with
/// `portrelay_string_free`.
///
/// # Safety
/// `data` must be a valid NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn portrelay_decode(data: *const c_char) -> *mut c_char {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        // SAFETY: Null is validated in the helper.
        let Some(data) = (unsafe { args::required_bytes_arg(data, "data") }) else {
            return std::ptr::null_mut();
        };

        let rendered = match decode_bytes(data) {
            Ok(command) => match render_decoded(&command) {
                Ok(json) => json,
                Err(err) => format!("{DECODE_ERROR_PREFIX}{err}"),
            },
            Err(err) => {
                error::set_error_message(err.to_string());
                format!("{DECODE_ERROR_PREFIX}{err}")
            }
        };
        into_raw_string(rendered.replace('\0', "?").into_bytes())
    })
}

/// Release a string returned by `portrelay_encode` or `portrelay_decode`.
///
/// # Safety
/// `value` must be null or a pointer returned by this library that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn portrelay_string_free(value: *mut c_char) {
    crate::ffi_boundary((), || {
        if value.is_null() {
            return;
        }
        // SAFETY: The pointer came from `CString::into_raw` in this library.
        drop(unsafe { CString::from_raw(value) });
    });
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};

    use super::*;

    fn take(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        // SAFETY: Non-null results are NUL-terminated strings from this library.
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        // SAFETY: The pointer is freed exactly once.
        unsafe { portrelay_string_free(ptr) };
        text
    }

    #[test]
    fn encode_matches_wire_format() {
        let name = CString::new("TestCommand").unwrap();
        let args = [CString::new("-t").unwrap(), CString::new("TestArgument").unwrap()];
        let argv: Vec<*const c_char> = args.iter().map(|a| a.as_ptr()).collect();

        // SAFETY: All pointers are valid for the duration of the call.
        let out = unsafe { portrelay_encode(name.as_ptr(), 2, argv.as_ptr()) };
        assert_eq!(
            take(out),
            "*3\n$11\nTestCommand\n$2\n-t\n$12\nTestArgument\n"
        );
    }

    #[test]
    fn encode_without_arguments_accepts_null_argv() {
        let name = CString::new("TestCommand").unwrap();
        // SAFETY: argc is zero, so argv is never read.
        let out = unsafe { portrelay_encode(name.as_ptr(), 0, std::ptr::null()) };
        assert_eq!(take(out), "*1\n$11\nTestCommand\n");
    }

    #[test]
    fn encode_rejects_null_name_and_negative_argc() {
        // SAFETY: Null is a documented input.
        let out = unsafe { portrelay_encode(std::ptr::null(), 0, std::ptr::null()) };
        assert!(out.is_null());
        assert_eq!(crate::tests::last_error(), "name cannot be null");

        let name = CString::new("x").unwrap();
        // SAFETY: A negative argc is rejected before argv is read.
        let out = unsafe { portrelay_encode(name.as_ptr(), -1, std::ptr::null()) };
        assert!(out.is_null());
        assert_eq!(crate::tests::last_error(), "argc cannot be negative");
    }

    #[test]
    fn decode_renders_json_with_escaping() {
        let data = CString::new("*3\n$3\nsay\n$8\n\"quoted\"\n$3\na\nb\n").unwrap();
        // SAFETY: `data` is a valid C string.
        let out = unsafe { portrelay_decode(data.as_ptr()) };
        let json: serde_json::Value = serde_json::from_str(&take(out)).unwrap();
        assert_eq!(json["command"], "say");
        assert_eq!(json["args"][0], "\"quoted\"");
        assert_eq!(json["args"][1], "a\nb");
    }

    #[test]
    fn decode_failure_is_prefixed() {
        let data = CString::new("Invalid Input").unwrap();
        // SAFETY: `data` is a valid C string.
        let out = unsafe { portrelay_decode(data.as_ptr()) };
        let text = take(out);
        assert!(text.starts_with(DECODE_ERROR_PREFIX), "{text}");
        assert!(text.contains("read count"), "{text}");
        assert!(!crate::tests::last_error().is_empty());
    }

    #[test]
    fn string_free_accepts_null() {
        // SAFETY: Null is a documented input.
        unsafe { portrelay_string_free(std::ptr::null_mut()) };
    }
}
