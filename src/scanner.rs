use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use tracing::trace;

use crate::error::ScanError;
use crate::expr::LiteralValue;

static KEYWORDS: Lazy<HashMap<&'static str, TokenType>> = Lazy::new(|| {
    HashMap::from([
        ("and", TokenType::And),
        ("class", TokenType::Class),
        ("else", TokenType::Else),
        ("false", TokenType::False),
        ("for", TokenType::For),
        ("fun", TokenType::Fun),
        ("if", TokenType::If),
        ("nil", TokenType::Nil),
        ("or", TokenType::Or),
        ("print", TokenType::Print),
        ("return", TokenType::Return),
        ("super", TokenType::Super),
        ("this", TokenType::This),
        ("true", TokenType::True),
        ("var", TokenType::Var),
        ("while", TokenType::While),
    ])
});

/// Scan the whole source into tokens, terminated by an `Eof` token.
///
/// Scanning never stops at the first problem: every error in the source is
/// collected and returned together.
pub fn scan_tokens(code: &str) -> Result<Vec<Token>, Vec<ScanError>> {
    let mut scanner = Scanner {
        chars: code.chars().collect(),
        cursor_begin: 0,
        cursor_end: 0,
        line: 1,
        tokens: Vec::new(),
        errors: Vec::new(),
    };

    while !scanner.at_end() {
        scanner.cursor_begin = scanner.cursor_end;
        scanner.scan_token();
    }

    scanner.tokens.push(Token {
        token_type: TokenType::Eof,
        lexeme: String::new(),
        literal: None,
        line: scanner.line,
    });

    trace!(tokens = scanner.tokens.len(), errors = scanner.errors.len(), "scanned source");

    if scanner.errors.is_empty() {
        Ok(scanner.tokens)
    } else {
        Err(scanner.errors)
    }
}

#[derive(Debug)]
struct Scanner {
    chars: Vec<char>,
    cursor_begin: usize,
    cursor_end: usize,
    line: u32,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
}

impl Scanner {
    fn scan_token(&mut self) {
        let current = self.advance();

        match current {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '!' => self.add_either('=', TokenType::BangEqual, TokenType::Bang),
            '=' => self.add_either('=', TokenType::EqualEqual, TokenType::Equal),
            '<' => self.add_either('=', TokenType::LessEqual, TokenType::Less),
            '>' => self.add_either('=', TokenType::GreaterEqual, TokenType::Greater),
            '/' => {
                if self.advance_if_match('/') {
                    // line comment, the newline itself is handled on the next pass
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            '"' | '\'' => self.string(current),
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            c if c.is_ascii_digit() => self.number(),
            c if is_alpha(c) => self.identifier(),
            character => self.errors.push(ScanError::UnexpectedCharacter {
                character,
                line: self.line,
            }),
        }
    }

    fn string(&mut self, quote: char) {
        while let Some(c) = self.peek() {
            if c == quote {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.at_end() {
            self.errors.push(ScanError::UnterminatedString { line: self.line });
            return;
        }

        // closing quote
        self.advance();

        let value: String = self.chars[self.cursor_begin + 1..self.cursor_end - 1].iter().collect();
        self.add_literal_token(TokenType::String, LiteralValue::String(value));
    }

    fn number(&mut self) {
        self.consume_digits();

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.consume_digits();
        }

        // a run of ascii digits with at most one interior '.' always parses
        let value = self.lexeme().parse::<f64>().unwrap_or_default();
        self.add_literal_token(TokenType::Number, LiteralValue::Number(value));
    }

    fn identifier(&mut self) {
        while self.peek().is_some_and(is_alphanumeric) {
            self.advance();
        }

        let token_type = KEYWORDS
            .get(self.lexeme().as_str())
            .copied()
            .unwrap_or(TokenType::Identifier);

        match token_type {
            TokenType::True => self.add_literal_token(token_type, LiteralValue::Boolean(true)),
            TokenType::False => self.add_literal_token(token_type, LiteralValue::Boolean(false)),
            TokenType::Nil => self.add_literal_token(token_type, LiteralValue::Nil),
            _ => self.add_token(token_type),
        }
    }

    fn consume_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn add_either(&mut self, expected: char, matched: TokenType, otherwise: TokenType) {
        let token_type = if self.advance_if_match(expected) { matched } else { otherwise };
        self.add_token(token_type);
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.push_token(token_type, None);
    }

    fn add_literal_token(&mut self, token_type: TokenType, literal: LiteralValue) {
        self.push_token(token_type, Some(literal));
    }

    fn push_token(&mut self, token_type: TokenType, literal: Option<LiteralValue>) {
        self.tokens.push(Token {
            token_type,
            lexeme: self.lexeme(),
            literal,
            line: self.line,
        });
    }

    fn lexeme(&self) -> String {
        self.chars[self.cursor_begin..self.cursor_end].iter().collect()
    }

    fn advance(&mut self) -> char {
        let current = self.chars[self.cursor_end];
        self.cursor_end += 1;
        current
    }

    fn advance_if_match(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.cursor_end += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.cursor_end).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.cursor_end + 1).copied()
    }

    fn at_end(&self) -> bool {
        self.cursor_end >= self.chars.len()
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_alphanumeric(c: char) -> bool {
    is_alpha(c) || c.is_ascii_digit()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub literal: Option<LiteralValue>,
    pub line: u32,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            Some(literal) => write!(f, "{:?} {} {}", self.token_type, self.lexeme, literal),
            None => write!(f, "{:?} {}", self.token_type, self.lexeme),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Eof,
}
