use std::sync::Arc;

use tracing::{debug, info};

use crate::ast::{Binding, Formula};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::interpreter::{self, Environment};
use crate::parser::{parse_formula_with, Diagnostic, DiagnosticHandler};
use crate::quote::Quote;
use crate::registry::Registry;
use crate::value::Value;

pub use crate::interpreter::InterpretReport;

/// What [`Session::parse`] saw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    pub error_count: usize,
    pub diagnostics: Vec<Diagnostic>,
    /// The handler (or `max_errors`) stopped parsing; the session is unusable
    /// until the next successful `parse`.
    pub aborted: bool,
}

impl ParseReport {
    pub fn is_ok(&self) -> bool {
        !self.aborted && self.error_count == 0
    }
}

/// One formula, its retained values, and the diagnostics handler it reports to.
///
/// A session is created by [`Engine::create_session`](crate::Engine::create_session)
/// and is destroyed by dropping it.
pub struct Session {
    config: SessionConfig,
    registry: Arc<Registry>,
    handler: Box<dyn DiagnosticHandler>,
    formula: Option<Formula>,
    env: Environment,
    quit: bool,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("statements", &self.formula.as_ref().map(|f| f.statements.len()))
            .field("quit", &self.quit)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        registry: Arc<Registry>,
        config: SessionConfig,
        handler: Box<dyn DiagnosticHandler>,
    ) -> Self {
        Self {
            config,
            registry,
            handler,
            formula: None,
            env: Environment::default(),
            quit: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn formula(&self) -> Option<&Formula> {
        self.formula.as_ref()
    }

    /// True after a parse was aborted.
    pub fn is_aborted(&self) -> bool {
        self.quit
    }

    /// An empty quote sized by `series_capacity`.
    pub fn new_quote(&self) -> Quote {
        Quote::with_capacity(self.config.series_capacity)
    }

    /// Compiles `src`, replacing any previous formula and its retained values.
    ///
    /// Every diagnostic goes to the session's handler first. Statements that
    /// failed to parse are left out of the formula; the rest still run.
    pub fn parse(&mut self, src: &str) -> ParseReport {
        let out = parse_formula_with(src, self.handler.as_mut(), self.config.max_errors);

        self.quit = out.aborted;
        self.env = out
            .formula
            .as_ref()
            .map(Environment::new)
            .unwrap_or_default();
        self.formula = out.formula;

        if out.aborted {
            info!(errors = out.error_count, "formula rejected");
        } else {
            debug!(
                statements = self.formula.as_ref().map_or(0, |f| f.statements.len()),
                errors = out.error_count,
                "session ready"
            );
        }

        ParseReport {
            error_count: out.error_count,
            diagnostics: out.diagnostics,
            aborted: out.aborted,
        }
    }

    /// Evaluates the formula over `quote`, extending the values kept from the
    /// previous call.
    ///
    /// The quote should be the same one as last time, grown by `push` or edited
    /// by `update_last`. After feeding an unrelated quote, call [`reset`](Self::reset).
    pub fn interpret(&mut self, quote: &Quote) -> Result<InterpretReport, SessionError> {
        if self.quit {
            return Err(SessionError::Aborted);
        }
        let formula = self.formula.as_ref().ok_or(SessionError::NotParsed)?;
        Ok(interpreter::interpret(
            formula,
            &self.registry,
            &mut self.env,
            quote,
        ))
    }

    /// Drops retained values so the next `interpret` starts from the first bar.
    pub fn reset(&mut self) {
        self.env.clear();
    }

    /// Newest value of the output `name`.
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.series(name)?.last()
    }

    /// Current value of the output `name`. Locals (`:=`) are not visible here.
    pub fn series(&self, name: &str) -> Option<&Value> {
        let formula = self.formula.as_ref()?;
        let i = formula
            .statements
            .iter()
            .rposition(|s| s.name == name && s.binding == Binding::Output)?;
        self.env.binding(i)
    }

    /// Every output in declaration order with its current value.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, Option<&Value>)> + '_ {
        self.formula
            .iter()
            .flat_map(|f| f.statements.iter().enumerate())
            .filter(|(_, s)| s.binding == Binding::Output)
            .map(|(i, s)| (s.name.as_str(), self.env.binding(i)))
    }
}
