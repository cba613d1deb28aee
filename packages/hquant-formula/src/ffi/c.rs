use core::ffi::{c_char, c_int, c_void, CStr};
use std::ffi::CString;

use crate::engine::Engine;
use crate::parser::{Diagnostic, DiagnosticHandler, Flow};
use crate::quote::Quote;
use crate::session::Session;
use crate::Bar;

/// Receives every parse diagnostic. Return nonzero to abort parsing.
///
/// `message` is only valid for the duration of the call.
pub type HqfDiagnosticCallback = unsafe extern "C" fn(
    line: u32,
    column: u32,
    severity: u8,
    message: *const c_char,
    userdata: *mut c_void,
) -> c_int;

struct CallbackHandler {
    callback: Option<HqfDiagnosticCallback>,
    userdata: *mut c_void,
}

impl DiagnosticHandler for CallbackHandler {
    fn on_diagnostic(&mut self, d: &Diagnostic) -> Flow {
        let Some(callback) = self.callback else {
            return Flow::Continue;
        };
        let message = CString::new(d.message.replace('\0', " ")).unwrap_or_default();
        // Safety: the caller registered `callback` and `userdata` together.
        let rc = unsafe {
            callback(
                d.line,
                d.column,
                d.severity as u8,
                message.as_ptr(),
                self.userdata,
            )
        };
        if rc != 0 {
            Flow::Abort
        } else {
            Flow::Continue
        }
    }
}

#[no_mangle]
pub extern "C" fn hqf_engine_init() -> *mut Engine {
    Box::into_raw(Box::new(Engine::init()))
}

#[no_mangle]
pub unsafe extern "C" fn hqf_engine_shutdown(ptr: *mut Engine) {
    if !ptr.is_null() {
        let engine = *Box::from_raw(ptr);
        engine.shutdown();
    }
}

/// Creates a session; `callback` may be null to ignore diagnostics.
#[no_mangle]
pub unsafe extern "C" fn hqf_session_new(
    engine: *const Engine,
    callback: Option<HqfDiagnosticCallback>,
    userdata: *mut c_void,
) -> *mut Session {
    if engine.is_null() {
        return core::ptr::null_mut();
    }
    let engine = &*engine;
    let session = engine.create_session(CallbackHandler { callback, userdata });
    Box::into_raw(Box::new(session))
}

#[no_mangle]
pub unsafe extern "C" fn hqf_session_free(ptr: *mut Session) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr));
    }
}

/// Parses UTF-8 formula text. Returns the error count, or -1 when parsing was
/// aborted or the arguments are invalid.
#[no_mangle]
pub unsafe extern "C" fn hqf_session_parse(
    ptr: *mut Session,
    src_utf8: *const u8,
    src_len: usize,
) -> c_int {
    if ptr.is_null() || src_utf8.is_null() {
        return -1;
    }
    let session = &mut *ptr;
    let Ok(src) = core::str::from_utf8(core::slice::from_raw_parts(src_utf8, src_len)) else {
        return -1;
    };
    let report = session.parse(src);
    if report.aborted {
        return -1;
    }
    c_int::try_from(report.error_count).unwrap_or(c_int::MAX)
}

/// Returns the number of failed statements, or -1 when the session has no
/// usable formula.
#[no_mangle]
pub unsafe extern "C" fn hqf_session_interpret(ptr: *mut Session, quote: *const Quote) -> c_int {
    if ptr.is_null() || quote.is_null() {
        return -1;
    }
    let session = &mut *ptr;
    match session.interpret(&*quote) {
        Ok(report) => c_int::try_from(report.failures.len()).unwrap_or(c_int::MAX),
        Err(_) => -1,
    }
}

/// Newest value of an output, or NaN when it has none.
#[no_mangle]
pub unsafe extern "C" fn hqf_session_get_indicator(ptr: *const Session, name: *const c_char) -> f64 {
    if ptr.is_null() || name.is_null() {
        return f64::NAN;
    }
    let session = &*ptr;
    CStr::from_ptr(name)
        .to_str()
        .ok()
        .and_then(|n| session.indicator(n))
        .unwrap_or(f64::NAN)
}

#[no_mangle]
pub extern "C" fn hqf_quote_new(capacity: usize) -> *mut Quote {
    Box::into_raw(Box::new(Quote::with_capacity(capacity)))
}

#[no_mangle]
pub unsafe extern "C" fn hqf_quote_free(ptr: *mut Quote) {
    if !ptr.is_null() {
        drop(Box::from_raw(ptr));
    }
}

#[no_mangle]
pub unsafe extern "C" fn hqf_quote_push(ptr: *mut Quote, bar: Bar) {
    if ptr.is_null() {
        return;
    }
    let quote = &mut *ptr;
    quote.push(bar);
}

/// Returns 0 when there was no bar to replace.
#[no_mangle]
pub unsafe extern "C" fn hqf_quote_update_last(ptr: *mut Quote, bar: Bar) -> c_int {
    if ptr.is_null() {
        return 0;
    }
    let quote = &mut *ptr;
    c_int::from(quote.update_last(bar).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn count_and_abort(
        _line: u32,
        _column: u32,
        severity: u8,
        _message: *const c_char,
        userdata: *mut c_void,
    ) -> c_int {
        *(userdata as *mut u32) += 1;
        c_int::from(severity == crate::Severity::Error as u8)
    }

    #[test]
    fn round_trip_through_the_c_surface() {
        unsafe {
            let engine = hqf_engine_init();
            let session = hqf_session_new(engine, None, core::ptr::null_mut());
            let src = "M:MA(CLOSE,2);";
            assert_eq!(hqf_session_parse(session, src.as_ptr(), src.len()), 0);

            let quote = hqf_quote_new(16);
            hqf_quote_push(quote, Bar::flat(1.0));
            assert_eq!(hqf_session_interpret(session, quote), 0);
            assert!(hqf_session_get_indicator(session, b"M\0".as_ptr().cast()).is_nan());

            hqf_quote_push(quote, Bar::flat(3.0));
            assert_eq!(hqf_quote_update_last(quote, Bar::flat(5.0)), 1);
            hqf_session_interpret(session, quote);
            assert_eq!(hqf_session_get_indicator(session, b"M\0".as_ptr().cast()), 3.0);

            hqf_quote_free(quote);
            hqf_session_free(session);
            hqf_engine_shutdown(engine);
        }
    }

    #[test]
    fn callback_can_abort() {
        unsafe {
            let engine = hqf_engine_init();
            let mut seen: u32 = 0;
            let session = hqf_session_new(
                engine,
                Some(count_and_abort),
                &mut seen as *mut u32 as *mut c_void,
            );
            let src = "A:(;\nB:1;";
            assert_eq!(hqf_session_parse(session, src.as_ptr(), src.len()), -1);
            assert_eq!(seen, 1);

            let quote = hqf_quote_new(0);
            assert_eq!(hqf_session_interpret(session, quote), -1);
            assert_eq!(hqf_session_parse(core::ptr::null_mut(), src.as_ptr(), 0), -1);

            hqf_quote_free(quote);
            hqf_session_free(session);
            hqf_engine_shutdown(engine);
        }
    }
}
