//! FFI module.
//!
//! - `c`: C ABI over engine, session and quote handles

pub mod c;
