use core::fmt;

use pest::error::ErrorVariant;
use pest::Parser as PestParser;
use pest_derive::Parser;
use tracing::warn;

#[derive(Parser)]
#[grammar = "formula.pest"]
struct TokenGrammar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Int,
    Decimal,
    /// `:`
    Colon,
    /// `:=`
    ColonEq,
    Semicolon,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Eof,
    /// A character that starts no token.
    Error,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Int => "integer",
            TokenKind::Decimal => "decimal",
            TokenKind::Colon => "`:`",
            TokenKind::ColonEq => "`:=`",
            TokenKind::Semicolon => "`;`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::Comma => "`,`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Eof => "end of input",
            TokenKind::Error => "invalid character",
        };
        f.write_str(s)
    }
}

/// A token borrowing its text from the source. Line and column are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub line: u32,
    pub column: u32,
}

/// Cursor over formula source. Cloning it is cheap and gives an independent lookahead.
#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    src: &'src str,
    pos: usize,
    line: u32,
    column: u32,
    done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            done: false,
        }
    }

    pub fn source(&self) -> &'src str {
        self.src
    }

    /// Returns the next token; keeps returning `Eof` once the input is exhausted.
    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_whitespace();
        let rest = &self.src[self.pos..];
        let (line, column) = (self.line, self.column);
        if rest.is_empty() {
            return Token {
                kind: TokenKind::Eof,
                text: rest,
                line,
                column,
            };
        }

        let (kind, len) = match TokenGrammar::parse(Rule::token, rest) {
            Ok(mut pairs) => match pairs.next().and_then(|p| p.into_inner().next()) {
                Some(p) => (kind_of(p.as_rule()), p.as_str().len()),
                None => (TokenKind::Error, first_char_len(rest)),
            },
            Err(e) if matches!(e.variant, ErrorVariant::ParsingError { .. }) => {
                (TokenKind::Error, first_char_len(rest))
            }
            // pest refused to run (stack or call limit): nothing here can be trusted.
            Err(e) => {
                warn!(line, column, error = %e, "tokenizer stopped");
                (TokenKind::Error, rest.len())
            }
        };

        let text = &rest[..len];
        self.pos += len;
        self.column += text.chars().count() as u32;
        Token {
            kind,
            text,
            line,
            column,
        }
    }

    fn skip_whitespace(&mut self) {
        for ch in self.src[self.pos..].chars() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    /// Yields every token including a single trailing `Eof`.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let tok = self.next_token();
        if tok.kind == TokenKind::Eof {
            self.done = true;
        }
        Some(tok)
    }
}

fn kind_of(rule: Rule) -> TokenKind {
    match rule {
        Rule::ident => TokenKind::Ident,
        Rule::decimal => TokenKind::Decimal,
        Rule::integer => TokenKind::Int,
        Rule::colon_eq => TokenKind::ColonEq,
        Rule::colon => TokenKind::Colon,
        Rule::semicolon => TokenKind::Semicolon,
        Rule::lparen => TokenKind::LParen,
        Rule::rparen => TokenKind::RParen,
        Rule::comma => TokenKind::Comma,
        Rule::plus => TokenKind::Plus,
        Rule::minus => TokenKind::Minus,
        Rule::star => TokenKind::Star,
        Rule::slash => TokenKind::Slash,
        _ => TokenKind::Error,
    }
}

fn first_char_len(s: &str) -> usize {
    s.chars().next().map_or(1, char::len_utf8)
}
