use std::sync::Arc;

use tracing::info;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::parser::DiagnosticHandler;
use crate::quote::Quote;
use crate::registry::Registry;
use crate::session::{InterpretReport, ParseReport, Session};
use crate::Bar;

/// Owns the frozen native registry and hands out sessions that share it.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<Registry>,
}

impl Engine {
    /// An engine with the built-in variables and functions.
    pub fn init() -> Self {
        Self::with_registry(Registry::builtin())
    }

    pub fn with_registry(registry: Registry) -> Self {
        info!(
            variables = registry.variable_names().count(),
            functions = registry.function_names().count(),
            "formula engine initialized"
        );
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn create_session<H>(&self, handler: H) -> Session
    where
        H: DiagnosticHandler + 'static,
    {
        self.create_session_with_config(handler, SessionConfig::default())
    }

    pub fn create_session_with_config<H>(&self, handler: H, config: SessionConfig) -> Session
    where
        H: DiagnosticHandler + 'static,
    {
        Session::new(Arc::clone(&self.registry), config, Box::new(handler))
    }

    /// Releases the engine's share of the registry. Live sessions keep theirs.
    pub fn shutdown(self) {
        info!(
            sessions = Arc::strong_count(&self.registry) - 1,
            "formula engine shut down"
        );
    }
}

/// A session bundled with the quote it runs over: push bars, read outputs.
#[derive(Debug)]
pub struct FormulaIndicator {
    quote: Quote,
    session: Session,
}

impl FormulaIndicator {
    /// Parses `src` in a fresh session. Fails with [`SessionError::Aborted`]
    /// when the handler (or `max_errors`) stopped parsing.
    pub fn new<H>(
        engine: &Engine,
        src: &str,
        handler: H,
        config: SessionConfig,
    ) -> Result<(Self, ParseReport), SessionError>
    where
        H: DiagnosticHandler + 'static,
    {
        let mut session = engine.create_session_with_config(handler, config);
        let report = session.parse(src);
        if report.aborted {
            return Err(SessionError::Aborted);
        }
        let quote = session.new_quote();
        Ok((Self { quote, session }, report))
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn push_bar(&mut self, bar: Bar) -> Result<InterpretReport, SessionError> {
        self.quote.push(bar);
        self.session.interpret(&self.quote)
    }

    /// Replaces the newest bar and re-evaluates. Without any bar yet this
    /// behaves like [`push_bar`](Self::push_bar).
    pub fn update_last(&mut self, bar: Bar) -> Result<InterpretReport, SessionError> {
        if self.quote.update_last(bar).is_none() {
            self.quote.push(bar);
        }
        self.session.interpret(&self.quote)
    }

    /// Newest value of the output `name`.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.session.indicator(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Diagnostic, Flow};
    use crate::value::Value;

    fn quiet(_: &Diagnostic) -> Flow {
        Flow::Continue
    }

    #[test]
    fn sessions_share_the_registry() {
        let engine = Engine::init();
        let a = engine.create_session(quiet);
        let b = engine.create_session(quiet);
        assert_eq!(Arc::strong_count(engine.registry()), 3);
        engine.shutdown();
        drop((a, b));
    }

    #[test]
    fn host_natives_are_callable() {
        fn double(args: &[Value], out: &mut Option<Value>) -> Result<(), crate::CallError> {
            *out = args.first().and_then(Value::last).map(|v| Value::Double(v * 2.0));
            Ok(())
        }
        let engine = Engine::with_registry(
            Registry::builder()
                .with_builtins()
                .function("TWICE", double)
                .build(),
        );
        let mut s = engine.create_session(quiet);
        assert!(s.parse("T:TWICE(CLOSE);").is_ok());
        s.interpret(&Quote::from_bars([Bar::flat(1.5)])).unwrap();
        assert_eq!(s.indicator("T"), Some(3.0));
    }

    #[test]
    fn streaming_indicator() {
        let engine = Engine::init();
        let (mut ind, report) = FormulaIndicator::new(
            &engine,
            "M:MA(CLOSE,3);\nR:CLOSE-REF(CLOSE,1);",
            quiet,
            SessionConfig::default(),
        )
        .unwrap();
        assert!(report.is_ok());

        assert!(ind.update_last(Bar::flat(1.0)).unwrap().is_clean());
        ind.push_bar(Bar::flat(2.0)).unwrap();
        assert_eq!(ind.value("M"), None);
        assert_eq!(ind.value("R"), Some(1.0));

        ind.push_bar(Bar::flat(3.0)).unwrap();
        assert_eq!(ind.value("M"), Some(2.0));

        ind.update_last(Bar::flat(6.0)).unwrap();
        assert_eq!(ind.value("M"), Some(3.0));
        assert_eq!(ind.value("R"), Some(4.0));
        assert_eq!(ind.quote().len(), 3);
    }

    #[test]
    fn rejected_formula_is_an_error() {
        let engine = Engine::init();
        let r = FormulaIndicator::new(
            &engine,
            "A:(;",
            |_: &Diagnostic| Flow::Abort,
            SessionConfig::default(),
        );
        assert_eq!(r.err(), Some(SessionError::Aborted));
    }
}
