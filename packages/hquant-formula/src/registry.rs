use std::collections::HashMap;

use crate::error::CallError;
use crate::library;
use crate::quote::Quote;
use crate::value::Value;

/// Reads a series straight from the quote, e.g. `CLOSE`.
pub type VariableFn = fn(&Quote) -> Value;

/// A native function: evaluated arguments plus this call site's previous result,
/// which it extends in place. On `Err` the previous result must be left as is.
pub type FunctionFn = fn(&[Value], &mut Option<Value>) -> Result<(), CallError>;

/// Name → native maps. Lookups are exact and case-sensitive. A `Registry` is
/// immutable once built; share it between sessions behind an `Arc`.
#[derive(Clone, Default)]
pub struct Registry {
    variables: HashMap<String, VariableFn>,
    functions: HashMap<String, FunctionFn>,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("variables", &self.variables.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}

impl Registry {
    /// OPEN/HIGH/LOW/CLOSE and the built-in function library.
    pub fn builtin() -> Self {
        Self::builder().with_builtins().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn variable(&self, name: &str) -> Option<VariableFn> {
        self.variables.get(name).copied()
    }

    pub fn function(&self, name: &str) -> Option<FunctionFn> {
        self.functions.get(name).copied()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    inner: Registry,
}

impl RegistryBuilder {
    pub fn with_builtins(self) -> Self {
        self.variable("OPEN", library::open)
            .variable("HIGH", library::high)
            .variable("LOW", library::low)
            .variable("CLOSE", library::close)
            .function("ADD", library::add)
            .function("SUB", library::sub)
            .function("MUL", library::mul)
            .function("DIV", library::div)
            .function("REF", library::ref_)
            .function("MAX", library::max)
            .function("ABS", library::abs)
            .function("HHV", library::hhv)
            .function("LLV", library::llv)
            .function("MA", library::ma)
            .function("EMA", library::ema)
            .function("SMA", library::sma)
    }

    /// Registers (or replaces) a variable.
    pub fn variable(mut self, name: impl Into<String>, f: VariableFn) -> Self {
        self.inner.variables.insert(name.into(), f);
        self
    }

    /// Registers (or replaces) a function.
    pub fn function(mut self, name: impl Into<String>, f: FunctionFn) -> Self {
        self.inner.functions.insert(name.into(), f);
        self
    }

    pub fn build(self) -> Registry {
        self.inner
    }
}
