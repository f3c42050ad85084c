//! Hand-written lexer: byte stream in, token sequence out.
//!
//! Whitespace and both comment forms are skipped inline rather than
//! emitted as tokens. Invalid characters are collected rather than
//! raised immediately, so a source file with several typos reports all
//! of them in one pass instead of stopping at the first.

use crate::token::{Token, TokenKind, keyword};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub errors: Vec<(char, usize)>,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lexical errors found:")?;
        for (ch, line) in &self.errors {
            writeln!(f, "  Line {line}: invalid token '{ch}'")?;
        }
        Ok(())
    }
}

impl std::error::Error for LexError {}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    errors: Vec<(char, usize)>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            errors: Vec::new(),
        }
    }

    /// Tokenize the whole source. Fails only at the end, and only if any
    /// invalid character was seen — every valid token is still produced
    /// up to that point (unless an unterminated block comment aborts
    /// early, which is a fatal error at the opening line).
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;
            if self.is_at_end() {
                break;
            }

            let line = self.line;
            let c = self.current();

            if c.is_alphabetic() || c == '_' {
                tokens.push(self.lex_identifier_or_keyword(line));
            } else if c.is_ascii_digit() || c == '.' {
                if let Some(tok) = self.lex_number(line) {
                    tokens.push(tok);
                } else {
                    self.errors.push((c, line));
                    self.advance();
                }
            } else if c == '\'' {
                if let Some(tok) = self.lex_char(line) {
                    tokens.push(tok);
                } else {
                    self.errors.push((c, line));
                    self.advance();
                }
            } else if let Some(kind) = two_char_op(self.current(), self.peek(1)) {
                self.advance();
                self.advance();
                tokens.push(Token::new(kind.0, kind.1, line));
            } else if let Some((kind, lexeme)) = one_char_op(c) {
                self.advance();
                tokens.push(Token::new(kind, lexeme, line));
            } else {
                self.errors.push((c, line));
                self.advance();
            }
        }

        tokens.push(Token::new(TokenKind::Eof, "", self.line));

        if self.errors.is_empty() {
            Ok(tokens)
        } else {
            Err(LexError {
                errors: self.errors,
            })
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            if self.is_at_end() {
                return Ok(());
            }
            let c = self.current();
            if c.is_whitespace() {
                if c == '\n' {
                    self.line += 1;
                }
                self.advance();
            } else if c == '/' && self.peek(1) == Some('*') {
                let start_line = self.line;
                self.advance();
                self.advance();
                let mut closed = false;
                while !self.is_at_end() {
                    if self.current() == '*' && self.peek(1) == Some('/') {
                        self.advance();
                        self.advance();
                        closed = true;
                        break;
                    }
                    if self.current() == '\n' {
                        self.line += 1;
                    }
                    self.advance();
                }
                if !closed {
                    return Err(LexError {
                        errors: vec![('*', start_line)],
                    });
                }
            } else if c == '/' && self.peek(1) == Some('/') {
                while !self.is_at_end() && self.current() != '\n' {
                    self.advance();
                }
            } else {
                return Ok(());
            }
        }
    }

    fn lex_identifier_or_keyword(&mut self, line: usize) -> Token {
        let start = self.pos;
        while !self.is_at_end() && (self.current().is_alphanumeric() || self.current() == '_') {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match keyword(&text) {
            Some(kind) => Token::new(kind, text, line),
            None => Token::new(TokenKind::Id, text, line),
        }
    }

    fn lex_number(&mut self, line: usize) -> Option<Token> {
        let start = self.pos;

        // Float: \d*\.(\d+)?([eE][-+]?\d+)?
        let mut p = self.pos;
        while p < self.chars.len() && self.chars[p].is_ascii_digit() {
            p += 1;
        }
        if p < self.chars.len() && self.chars[p] == '.' {
            let dot = p;
            p += 1;
            while p < self.chars.len() && self.chars[p].is_ascii_digit() {
                p += 1;
            }
            let mut exp_end = p;
            if p < self.chars.len() && (self.chars[p] == 'e' || self.chars[p] == 'E') {
                let mut q = p + 1;
                if q < self.chars.len() && (self.chars[q] == '+' || self.chars[q] == '-') {
                    q += 1;
                }
                let digits_start = q;
                while q < self.chars.len() && self.chars[q].is_ascii_digit() {
                    q += 1;
                }
                if q > digits_start {
                    exp_end = q;
                }
            }
            // Must have consumed at least the dot to count as a float match.
            if exp_end > dot {
                self.pos = exp_end;
                let text: String = self.chars[start..self.pos].iter().collect();
                return Some(Token::new(TokenKind::Float, text, line));
            }
        }

        // Fall back to INT: \d+
        let mut p = self.pos;
        while p < self.chars.len() && self.chars[p].is_ascii_digit() {
            p += 1;
        }
        if p > self.pos {
            self.pos = p;
            let text: String = self.chars[start..self.pos].iter().collect();
            return Some(Token::new(TokenKind::Int, text, line));
        }
        None
    }

    fn lex_char(&mut self, line: usize) -> Option<Token> {
        let start = self.pos;
        // Opening quote.
        if self.current() != '\'' {
            return None;
        }
        let quote_pos = self.pos;
        let mut p = quote_pos + 1;

        if p >= self.chars.len() {
            return None;
        }

        if self.chars[p] == '\\' {
            // \a-\z escape or \xHH hex escape or \'
            let next = *self.chars.get(p + 1)?;
            if next == 'x' {
                let h1 = *self.chars.get(p + 2)?;
                let h2 = *self.chars.get(p + 3)?;
                if !h1.is_ascii_hexdigit() || !h2.is_ascii_hexdigit() {
                    return None;
                }
                p += 4;
            } else if next == '\'' || next.is_ascii_lowercase() {
                p += 2;
            } else {
                return None;
            }
        } else if self.chars[p].is_ascii_alphabetic() {
            p += 1;
        } else {
            return None;
        }

        if self.chars.get(p) != Some(&'\'') {
            return None;
        }
        p += 1;

        self.pos = p;
        let text: String = self.chars[start..self.pos].iter().collect();
        Some(Token::new(TokenKind::Char, text, line))
    }

    fn current(&self) -> char {
        self.chars[self.pos]
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

fn two_char_op(a: char, b: Option<char>) -> Option<(TokenKind, &'static str)> {
    let b = b?;
    Some(match (a, b) {
        ('<', '=') => (TokenKind::Le, "<="),
        ('>', '=') => (TokenKind::Ge, ">="),
        ('=', '=') => (TokenKind::Eq, "=="),
        ('!', '=') => (TokenKind::Ne, "!="),
        ('&', '&') => (TokenKind::And, "&&"),
        ('|', '|') => (TokenKind::Or, "||"),
        _ => return None,
    })
}

fn one_char_op(c: char) -> Option<(TokenKind, &'static str)> {
    Some(match c {
        '+' => (TokenKind::Plus, "+"),
        '-' => (TokenKind::Minus, "-"),
        '*' => (TokenKind::Times, "*"),
        '/' => (TokenKind::Divide, "/"),
        '<' => (TokenKind::Lt, "<"),
        '>' => (TokenKind::Gt, ">"),
        '^' => (TokenKind::Grow, "^"),
        '!' => (TokenKind::Not, "!"),
        '=' => (TokenKind::Assign, "="),
        ';' => (TokenKind::Semi, ";"),
        '(' => (TokenKind::LParen, "("),
        ')' => (TokenKind::RParen, ")"),
        '{' => (TokenKind::LBrace, "{"),
        '}' => (TokenKind::RBrace, "}"),
        ',' => (TokenKind::Comma, ","),
        '`' => (TokenKind::Deref, "`"),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn two_char_operators_take_precedence() {
        assert_eq!(
            kinds("<= >= == != && ||"),
            vec![
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn float_literal_variants() {
        for lexeme in [".5", "42.", "42.e2", "3.14"] {
            let toks = Lexer::new(lexeme).tokenize().unwrap();
            assert_eq!(toks[0].kind, TokenKind::Float, "{lexeme}");
            assert_eq!(toks[0].lexeme, lexeme);
        }
    }

    #[test]
    fn int_literal() {
        let toks = Lexer::new("42").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Int);
        assert_eq!(toks[0].lexeme, "42");
    }

    #[test]
    fn char_literal_forms() {
        for lexeme in ["'a'", "'\\n'", "'\\x41'", "'\\''"] {
            let toks = Lexer::new(lexeme).tokenize().unwrap();
            assert_eq!(toks[0].kind, TokenKind::Char, "{lexeme}");
        }
    }

    #[test]
    fn keywords_and_identifiers() {
        let toks = Lexer::new("var x_1 const").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Var);
        assert_eq!(toks[1].kind, TokenKind::Id);
        assert_eq!(toks[2].kind, TokenKind::Const);
    }

    #[test]
    fn true_false_are_bool_tokens() {
        let toks = Lexer::new("true false").tokenize().unwrap();
        assert_eq!(toks[0].kind, TokenKind::Bool);
        assert_eq!(toks[1].kind, TokenKind::Bool);
    }

    #[test]
    fn line_counting_across_comments() {
        let src = "var x int = 1;\n/* a\nb\nc */\nvar y int = 2;";
        let toks = Lexer::new(src).tokenize().unwrap();
        let y_line = toks.iter().find(|t| t.lexeme == "y").unwrap().line;
        assert_eq!(y_line, 5);
    }

    #[test]
    fn unterminated_block_comment_is_fatal() {
        let err = Lexer::new("/* never closed").tokenize().unwrap_err();
        assert_eq!(err.errors, vec![('*', 1)]);
    }

    #[test]
    fn invalid_characters_are_collected_not_fatal_immediately() {
        let err = Lexer::new("var @ x # int").tokenize().unwrap_err();
        assert_eq!(err.errors.len(), 2);
    }

    #[test]
    fn line_comment_to_end_of_file_without_newline() {
        let toks = Lexer::new("var x int // trailing").tokenize().unwrap();
        assert_eq!(toks.last().unwrap().kind, TokenKind::Eof);
    }
}
