use std::iter::Peekable;
use std::str::CharIndices;
use crate::query::token::{Token, TokenKind};

/// Single-pass tokenizer over one line of query text.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            chars: input.char_indices().peekable(),
            done: false,
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(&(start, ch)) = self.chars.peek() else {
            return Token::new(TokenKind::Eof, "", self.input.len());
        };

        let single = match ch {
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            '=' => Some(TokenKind::Eq),
            '*' => Some(TokenKind::Asterisk),
            _ => None,
        };
        if let Some(kind) = single {
            self.chars.next();
            return Token::new(kind, ch.to_string(), start);
        }

        if ch == '"' {
            return self.read_string(start);
        }
        if is_ident_start(ch) {
            return self.read_identifier(start);
        }
        if ch.is_ascii_digit() || (ch == '-' && self.second_is_digit()) {
            return self.read_number(start);
        }

        self.chars.next();
        Token::new(TokenKind::Illegal, ch.to_string(), start)
    }

    /// Every token up to and including the final `Eof`.
    pub fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let end = token.kind == TokenKind::Eof;
            tokens.push(token);
            if end {
                return tokens;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if !matches!(ch, ' ' | '\t' | '\r' | '\n') {
                break;
            }
            self.chars.next();
        }
    }

    fn second_is_digit(&self) -> bool {
        let mut ahead = self.chars.clone();
        ahead.next();
        matches!(ahead.peek(), Some(&(_, c)) if c.is_ascii_digit())
    }

    fn end_of(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    fn read_identifier(&mut self, start: usize) -> Token {
        while let Some(&(_, ch)) = self.chars.peek() {
            if !is_ident_continue(ch) {
                break;
            }
            self.chars.next();
        }
        let end = self.end_of();
        Token::new(TokenKind::Ident, self.input[start..end].to_lowercase(), start)
    }

    // No escapes; an unterminated string runs to the end of the line.
    fn read_string(&mut self, start: usize) -> Token {
        self.chars.next();
        let body_start = start + 1;
        let mut body_end = self.input.len();
        for (i, ch) in self.chars.by_ref() {
            if ch == '"' {
                body_end = i;
                break;
            }
        }
        Token::new(TokenKind::Str, &self.input[body_start..body_end], start)
    }

    fn read_number(&mut self, start: usize) -> Token {
        if let Some(&(_, '-')) = self.chars.peek() {
            self.chars.next();
        }
        let mut seen_dot = false;
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_ascii_digit() {
                self.chars.next();
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.end_of();
        Token::new(TokenKind::Number, &self.input[start..end], start)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields tokens up to, not including, `Eof`.
    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.done = true;
            return None;
        }
        Some(token)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '/' | '-')
}
