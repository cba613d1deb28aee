//! Tree-walking evaluation of a [`Formula`] against a [`Quote`].
//!
//! Every expression node owns a slot holding the value it produced last time.
//! Function calls and binary expressions hand that slot to the native, which
//! extends it from its watermark, so re-running after one new bar costs one
//! element per node instead of the whole history.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ast::{Expr, ExprKind, Formula};
use crate::error::EvalError;
use crate::quote::Quote;
use crate::registry::Registry;
use crate::value::{self, Series, Value};

/// Values retained between runs: one binding per statement and one previous
/// result per expression node.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: Vec<Option<Value>>,
    slots: Vec<Option<Value>>,
}

impl Environment {
    pub fn new(formula: &Formula) -> Self {
        Self {
            bindings: vec![None; formula.statements.len()],
            slots: vec![None; formula.node_count],
        }
    }

    /// Value bound by the statement at `index` on the last run.
    pub fn binding(&self, index: usize) -> Option<&Value> {
        self.bindings.get(index)?.as_ref()
    }

    /// Forgets every retained value; the next run starts from the first bar.
    pub fn clear(&mut self) {
        self.bindings.iter_mut().for_each(|b| *b = None);
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpretReport {
    /// Statements evaluated without error (their value may still be absent).
    pub evaluated: usize,
    /// Statements that failed, by name, in evaluation order.
    pub failures: Vec<(String, EvalError)>,
}

impl InterpretReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Evaluates every statement of `formula` in order.
///
/// A failing statement binds nothing for this run and the next statements
/// continue; referring to it later yields an absent value, not a new failure.
pub fn interpret(
    formula: &Formula,
    registry: &Registry,
    env: &mut Environment,
    quote: &Quote,
) -> InterpretReport {
    if env.bindings.len() != formula.statements.len() || env.slots.len() != formula.node_count {
        *env = Environment::new(formula);
    }

    let mut report = InterpretReport::default();
    let mut visible: HashMap<&str, usize> = HashMap::new();

    for (i, stmt) in formula.statements.iter().enumerate() {
        // Drop our share first so the slots can grow their buffers in place.
        env.bindings[i] = None;

        let mut eval = Evaluator {
            registry,
            quote,
            visible: &visible,
            bindings: &env.bindings[..i],
            slots: &mut env.slots,
        };
        match eval.expr(&stmt.expr) {
            Ok(v) => {
                env.bindings[i] = v;
                report.evaluated += 1;
            }
            Err(e) => {
                warn!(
                    statement = %stmt.name,
                    line = stmt.line,
                    error = %e,
                    "statement failed"
                );
                report.failures.push((stmt.name.clone(), e));
            }
        }
        visible.insert(stmt.name.as_str(), i);
    }

    debug!(
        bars = quote.len(),
        evaluated = report.evaluated,
        failed = report.failures.len(),
        "formula evaluated"
    );
    report
}

struct Evaluator<'a> {
    registry: &'a Registry,
    quote: &'a Quote,
    visible: &'a HashMap<&'a str, usize>,
    bindings: &'a [Option<Value>],
    slots: &'a mut [Option<Value>],
}

impl Evaluator<'_> {
    /// `Ok(None)` is an absent value: not enough bars yet, or an operand that
    /// is itself absent.
    fn expr(&mut self, e: &Expr) -> Result<Option<Value>, EvalError> {
        match &e.kind {
            ExprKind::Int(v) => Ok(Some(Value::Int(*v))),
            ExprKind::Decimal(v) => Ok(Some(Value::Double(*v))),
            ExprKind::Ident(name) => self.ident(name),
            ExprKind::Call { name, args } => {
                let f = self
                    .registry
                    .function(name)
                    .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;

                let mut values = Vec::with_capacity(args.len());
                let mut absent = false;
                for a in args {
                    match self.expr(a)? {
                        Some(v) => values.push(v),
                        None => absent = true,
                    }
                }
                if absent {
                    return Ok(None);
                }

                let slot = &mut self.slots[e.id.index()];
                f(&values, slot).map_err(|source| EvalError::Call {
                    name: name.clone(),
                    source,
                })?;
                // Views (REF) are never extended in place; holding one pins its
                // input's buffer.
                let shared = slot
                    .as_ref()
                    .and_then(Value::as_series)
                    .is_some_and(Series::is_shared);
                if shared {
                    return Ok(slot.take().filter(|v| !v.is_empty_series()));
                }
                Ok(present(slot))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.expr(lhs)?;
                let r = self.expr(rhs)?;
                let (Some(l), Some(r)) = (l, r) else {
                    return Ok(None);
                };
                let op = *op;
                let slot = &mut self.slots[e.id.index()];
                *slot = value::combine(&l, &r, slot.take(), |x, y| op.apply(x, y));
                Ok(present(slot))
            }
        }
    }

    fn ident(&self, name: &str) -> Result<Option<Value>, EvalError> {
        if let Some(&i) = self.visible.get(name) {
            return Ok(present(&self.bindings[i]));
        }
        match self.registry.variable(name) {
            Some(f) => {
                let v = f(self.quote);
                Ok((!v.is_empty_series()).then_some(v))
            }
            None => Err(EvalError::UnknownIdentifier(name.to_string())),
        }
    }
}

fn present(v: &Option<Value>) -> Option<Value> {
    v.as_ref().filter(|v| !v.is_empty_series()).cloned()
}
