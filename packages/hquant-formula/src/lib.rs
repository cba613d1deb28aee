//! Incremental formula engine for technical-analysis indicators.
//!
//! A formula such as `DIF:EMA(CLOSE,12)-EMA(CLOSE,26);` is parsed once and then
//! re-evaluated every time the caller's [`Quote`] grows. Series values extend in
//! place instead of being recomputed from the first bar.
//!
//! ```
//! use hquant_formula::{Bar, Engine, Quote};
//!
//! let engine = Engine::init();
//! let mut session = engine.create_session(|_: &hquant_formula::Diagnostic| hquant_formula::Flow::Continue);
//! session.parse("M:MA(CLOSE,2);");
//!
//! let mut quote = Quote::new();
//! quote.push(Bar::new(1.0, 1.0, 1.0, 1.0));
//! quote.push(Bar::new(3.0, 3.0, 3.0, 3.0));
//! session.interpret(&quote).unwrap();
//! assert_eq!(session.indicator("M"), Some(2.0));
//! ```

mod types;
pub use types::*;

pub mod config;
pub mod error;

pub mod lexer;
pub mod ast;
pub mod parser;

pub mod value;
pub mod quote;
pub mod library;
pub mod registry;

pub mod interpreter;
pub mod session;
pub mod engine;

pub mod ffi;

pub use config::SessionConfig;
pub use engine::{Engine, FormulaIndicator};
pub use error::{CallError, ConfigError, EvalError, SessionError};
pub use parser::{Diagnostic, DiagnosticHandler, DiagnosticKind, Flow};
pub use quote::Quote;
pub use registry::Registry;
pub use session::{InterpretReport, ParseReport, Session};
pub use value::{Series, Value};
