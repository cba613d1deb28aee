//! Recursive-descent parser.
//!
//! ```text
//! formula := stmt*
//! stmt    := ID (":=" | ":") expr ";"
//! expr    := term (("+"|"-") term)*
//! term    := factor (("*"|"/") factor)*
//! factor  := INT | DECIMAL | ID | ID "(" args? ")" | "(" expr ")"
//! args    := expr ("," expr)*
//! ```
//!
//! The parser never calls back into the host. [`Parser::next_step`] hands out
//! statements and diagnostics one at a time; after a diagnostic the caller
//! either stops or asks for the next step, which makes the parser resynchronize
//! at the next statement boundary.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::ast::{BinOp, Binding, Expr, ExprKind, Formula, NodeId, Statement};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::Severity;

/// Deepest allowed nesting of parentheses and call arguments.
pub const MAX_NESTING: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Unrecognized character; skipped.
    Lex,
    /// Malformed statement; the parser skips to the next statement boundary.
    Syntax,
    /// A statement name that was already bound earlier in the formula.
    Redefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sev = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}:{}: {}: {}", self.line, self.column, sev, self.message)
    }
}

/// The caller's decision after seeing a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

pub trait DiagnosticHandler {
    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) -> Flow;
}

impl<F> DiagnosticHandler for F
where
    F: FnMut(&Diagnostic) -> Flow,
{
    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) -> Flow {
        self(diagnostic)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Statement(Statement),
    Diagnostic(Diagnostic),
    Done,
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    tok: Token<'src>,
    next_id: u32,
    depth: u32,
    pending: VecDeque<Diagnostic>,
    ready: Option<Statement>,
    recovering: bool,
    names: HashSet<String>,
}

impl<'src> Parser<'src> {
    pub fn new(src: &'src str) -> Self {
        let mut lexer = Lexer::new(src);
        let tok = lexer.next_token();
        let mut p = Self {
            lexer,
            tok,
            next_id: 0,
            depth: 0,
            pending: VecDeque::new(),
            ready: None,
            recovering: false,
            names: HashSet::new(),
        };
        p.skip_error_tokens();
        p
    }

    /// Number of expression nodes allocated so far.
    pub fn node_count(&self) -> usize {
        self.next_id as usize
    }

    pub fn next_step(&mut self) -> Step {
        loop {
            if let Some(d) = self.pending.pop_front() {
                return Step::Diagnostic(d);
            }
            if let Some(stmt) = self.ready.take() {
                return Step::Statement(stmt);
            }
            if self.recovering {
                self.recovering = false;
                self.synchronize();
                continue;
            }
            if self.tok.kind == TokenKind::Eof {
                return Step::Done;
            }
            match self.statement() {
                Ok(stmt) => {
                    if !self.names.insert(stmt.name.clone()) {
                        self.pending.push_back(Diagnostic {
                            line: stmt.line,
                            column: stmt.column,
                            severity: Severity::Warning,
                            kind: DiagnosticKind::Redefinition,
                            message: format!("`{}` shadows an earlier statement", stmt.name),
                        });
                    }
                    self.ready = Some(stmt);
                }
                Err(d) => {
                    self.pending.push_back(d);
                    self.recovering = true;
                }
            }
        }
    }

    // ===== tokens =====

    fn bump(&mut self) {
        self.tok = self.lexer.next_token();
        self.skip_error_tokens();
    }

    fn skip_error_tokens(&mut self) {
        while self.tok.kind == TokenKind::Error {
            self.pending.push_back(Diagnostic {
                line: self.tok.line,
                column: self.tok.column,
                severity: Severity::Error,
                kind: DiagnosticKind::Lex,
                message: if self.tok.text.chars().nth(1).is_some() {
                    "input could not be tokenized from here".to_string()
                } else {
                    format!("unexpected character `{}`", self.tok.text)
                },
            });
            self.tok = self.lexer.next_token();
        }
    }

    /// Looks one token past the current one without reporting anything.
    fn peek_kind(&self) -> TokenKind {
        let mut lx = self.lexer.clone();
        loop {
            let t = lx.next_token();
            if t.kind != TokenKind::Error {
                return t.kind;
            }
        }
    }

    fn starts_statement(&self) -> bool {
        self.tok.kind == TokenKind::Ident
            && matches!(self.peek_kind(), TokenKind::Colon | TokenKind::ColonEq)
    }

    fn synchronize(&mut self) {
        loop {
            match self.tok.kind {
                TokenKind::Eof => return,
                TokenKind::Semicolon => {
                    self.bump();
                    return;
                }
                TokenKind::Ident if self.starts_statement() => return,
                _ => self.bump(),
            }
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let found = match self.tok.kind {
            TokenKind::Eof => self.tok.kind.to_string(),
            kind => format!("{kind} `{}`", self.tok.text),
        };
        self.syntax_error(format!("expected {expected}, found {found}"))
    }

    fn syntax_error(&self, message: String) -> Diagnostic {
        Diagnostic {
            line: self.tok.line,
            column: self.tok.column,
            severity: Severity::Error,
            kind: DiagnosticKind::Syntax,
            message,
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), Diagnostic> {
        if self.tok.kind != kind {
            return Err(self.unexpected(&kind.to_string()));
        }
        self.bump();
        Ok(())
    }

    fn node(&mut self, kind: ExprKind) -> Expr {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Expr { id, kind }
    }

    // ===== grammar =====

    fn statement(&mut self) -> Result<Statement, Diagnostic> {
        let head = self.tok;
        if head.kind != TokenKind::Ident {
            return Err(self.unexpected("statement name"));
        }
        self.bump();
        let binding = match self.tok.kind {
            TokenKind::ColonEq => Binding::Local,
            TokenKind::Colon => Binding::Output,
            _ => return Err(self.unexpected("`:` or `:=`")),
        };
        self.bump();
        let expr = self.expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Statement {
            name: head.text.to_string(),
            binding,
            expr,
            line: head.line,
            column: head.column,
        })
    }

    fn expr(&mut self) -> Result<Expr, Diagnostic> {
        if self.depth >= MAX_NESTING {
            return Err(self.syntax_error(format!(
                "expression nested too deeply (limit {MAX_NESTING})"
            )));
        }
        self.depth += 1;
        let e = self.sum();
        self.depth -= 1;
        e
    }

    fn sum(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.tok.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.term()?;
            lhs = self.node(ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
    }

    fn term(&mut self) -> Result<Expr, Diagnostic> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.tok.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.factor()?;
            lhs = self.node(ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
    }

    fn factor(&mut self) -> Result<Expr, Diagnostic> {
        let tok = self.tok;
        match tok.kind {
            TokenKind::Int => {
                let v: i64 = tok.text.parse().map_err(|_| {
                    self.syntax_error(format!("integer literal `{}` is out of range", tok.text))
                })?;
                self.bump();
                Ok(self.node(ExprKind::Int(v)))
            }
            TokenKind::Decimal => {
                let v: f64 = tok.text.parse().map_err(|_| {
                    self.syntax_error(format!("invalid decimal literal `{}`", tok.text))
                })?;
                self.bump();
                Ok(self.node(ExprKind::Decimal(v)))
            }
            TokenKind::Ident => {
                self.bump();
                if self.tok.kind != TokenKind::LParen {
                    return Ok(self.node(ExprKind::Ident(tok.text.to_string())));
                }
                self.bump();
                let mut args = Vec::new();
                if self.tok.kind != TokenKind::RParen {
                    args.push(self.expr()?);
                    while self.tok.kind == TokenKind::Comma {
                        self.bump();
                        args.push(self.expr()?);
                    }
                }
                self.expect(TokenKind::RParen)?;
                Ok(self.node(ExprKind::Call {
                    name: tok.text.to_string(),
                    args,
                }))
            }
            TokenKind::LParen => {
                self.bump();
                let e = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

/// Result of driving a [`Parser`] to completion.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// `None` when parsing was aborted; a partial formula is never returned.
    pub formula: Option<Formula>,
    pub diagnostics: Vec<Diagnostic>,
    pub error_count: usize,
    pub aborted: bool,
}

pub fn parse_formula(src: &str, handler: &mut dyn DiagnosticHandler) -> ParseOutcome {
    parse_formula_with(src, handler, usize::MAX)
}

/// Parses `src`, asking `handler` what to do after each diagnostic and aborting
/// on its own once `max_errors` errors were seen.
pub fn parse_formula_with(
    src: &str,
    handler: &mut dyn DiagnosticHandler,
    max_errors: usize,
) -> ParseOutcome {
    let mut parser = Parser::new(src);
    let mut out = ParseOutcome::default();
    let mut statements = Vec::new();

    loop {
        match parser.next_step() {
            Step::Statement(stmt) => statements.push(stmt),
            Step::Diagnostic(d) => {
                if d.is_error() {
                    out.error_count += 1;
                }
                let flow = handler.on_diagnostic(&d);
                out.diagnostics.push(d);
                if flow == Flow::Abort || out.error_count >= max_errors {
                    out.aborted = true;
                    debug!(errors = out.error_count, "parse aborted");
                    return out;
                }
            }
            Step::Done => break,
        }
    }

    debug!(
        statements = statements.len(),
        errors = out.error_count,
        "formula parsed"
    );
    out.formula = Some(Formula {
        statements,
        node_count: parser.node_count(),
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Formula {
        let out = parse_formula(src, &mut |d: &Diagnostic| -> Flow {
            panic!("unexpected diagnostic: {d}")
        });
        out.formula.unwrap()
    }

    fn collect(src: &str) -> ParseOutcome {
        parse_formula(src, &mut |_: &Diagnostic| Flow::Continue)
    }

    #[test]
    fn binding_kind_follows_operator() {
        let f = parse_ok("A:=1;\nB:A;");
        assert_eq!(f.statements.len(), 2);
        assert_eq!(f.statements[0].binding, Binding::Local);
        assert_eq!(f.statements[1].binding, Binding::Output);
        assert_eq!(f.statements[1].line, 2);
        assert_eq!(f.outputs().count(), 1);
    }

    #[test]
    fn precedence_and_left_associativity() {
        let f = parse_ok("X:1-2-3*4/5+(6-7);");
        assert_eq!(f.statements[0].expr.to_string(), "(((1-2)-((3*4)/5))+(6-7))");
    }

    #[test]
    fn calls_with_nested_args() {
        let f = parse_ok("RSV:=(CLOSE-LLV(LOW,9))/(HHV(HIGH,9)-LLV(LOW,9))*100;");
        assert_eq!(
            f.statements[0].to_string(),
            "RSV:=(((CLOSE-LLV(LOW,9))/(HHV(HIGH,9)-LLV(LOW,9)))*100);"
        );
        let f = parse_ok("Z:F();");
        match &f.statements[0].expr.kind {
            ExprKind::Call { name, args } => {
                assert_eq!(name, "F");
                assert!(args.is_empty());
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn node_ids_are_dense_and_unique() {
        let f = parse_ok("A:MA(CLOSE,5)+1;B:2*A;");
        let mut ids = Vec::new();
        fn walk(e: &Expr, ids: &mut Vec<u32>) {
            ids.push(e.id.0);
            match &e.kind {
                ExprKind::Call { args, .. } => args.iter().for_each(|a| walk(a, ids)),
                ExprKind::Binary { lhs, rhs, .. } => {
                    walk(lhs, ids);
                    walk(rhs, ids);
                }
                _ => {}
            }
        }
        for s in &f.statements {
            walk(&s.expr, &mut ids);
        }
        ids.sort_unstable();
        assert_eq!(ids, (0..f.node_count as u32).collect::<Vec<_>>());
    }

    #[test]
    fn missing_semicolon_recovers_at_next_statement() {
        let out = collect("A:CLOSE+1\nB:CLOSE*2;");
        assert_eq!(out.error_count, 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Syntax);
        assert_eq!((out.diagnostics[0].line, out.diagnostics[0].column), (2, 1));
        let f = out.formula.unwrap();
        assert_eq!(f.statements.len(), 1);
        assert_eq!(f.statements[0].name, "B");
    }

    #[test]
    fn garbage_skips_to_semicolon() {
        let out = collect("A:(1+;B:2;C 3;D:4;");
        assert_eq!(out.error_count, 2);
        let names: Vec<_> = out
            .formula
            .unwrap()
            .statements
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["B", "D"]);
    }

    #[test]
    fn lex_errors_are_reported_and_skipped() {
        let out = collect("A:1 # + 2;");
        assert_eq!(out.error_count, 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Lex);
        assert_eq!(out.diagnostics[0].column, 5);
        let f = out.formula.unwrap();
        assert_eq!(f.statements[0].expr.to_string(), "(1+2)");
    }

    #[test]
    fn abort_discards_partial_formula() {
        let mut seen = 0;
        let out = parse_formula("A:1;B:;C:3;", &mut |_: &Diagnostic| {
            seen += 1;
            Flow::Abort
        });
        assert!(out.aborted);
        assert!(out.formula.is_none());
        assert_eq!(seen, 1);
        assert_eq!(out.error_count, 1);
    }

    #[test]
    fn max_errors_stops_parsing() {
        let out = parse_formula_with("A:;B:;C:;", &mut |_: &Diagnostic| Flow::Continue, 2);
        assert!(out.aborted);
        assert_eq!(out.error_count, 2);
    }

    #[test]
    fn redefinition_is_a_warning() {
        let out = collect("A:1;A:2;");
        assert_eq!(out.error_count, 0);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].severity, Severity::Warning);
        assert_eq!(out.formula.unwrap().statements.len(), 2);
    }

    #[test]
    fn integer_overflow_is_a_syntax_error() {
        let out = collect("A:99999999999999999999;B:1;");
        assert_eq!(out.error_count, 1);
        assert_eq!(out.formula.unwrap().statements.len(), 1);
    }

    fn nested(depth: usize) -> String {
        format!("A:{}1{};", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn deep_but_legal_nesting_parses() {
        let f = parse_ok(&nested(MAX_NESTING as usize - 1));
        assert_eq!(f.statements[0].expr.to_string(), "1");

        let calls = format!("B:{}CLOSE{};", "ABS(".repeat(100), ")".repeat(100));
        assert_eq!(parse_ok(&calls).node_count, 101);
    }

    #[test]
    fn nesting_limit_is_one_syntax_error() {
        let src = format!("{}\nB:1;", nested(1000));
        let out = collect(&src);
        assert_eq!(out.error_count, 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Syntax);
        assert!(out.diagnostics[0].message.contains("nested too deeply"));
        assert!(!out.aborted);
        let f = out.formula.unwrap();
        assert_eq!(f.statements.len(), 1);
        assert_eq!(f.statements[0].name, "B");

        let again = collect(&format!("{}\n{}", nested(1000), nested(10)));
        assert_eq!(again.error_count, 1);
        assert_eq!(again.formula.unwrap().statements.len(), 1);
    }

    #[test]
    fn step_api_lets_the_caller_decide() {
        let mut p = Parser::new("A:;B:1;");
        assert!(matches!(p.next_step(), Step::Diagnostic(_)));
        match p.next_step() {
            Step::Statement(s) => assert_eq!(s.name, "B"),
            other => panic!("expected statement, got {other:?}"),
        }
        assert_eq!(p.next_step(), Step::Done);
        assert_eq!(p.next_step(), Step::Done);
    }
}
