use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Illegal,
    Eof,
    Ident,    // keywords and names, lowercased
    Str,      // "quoted text", verbatim
    Number,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Eq,
    Asterisk,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TokenKind::Illegal => "illegal character",
            TokenKind::Eof => "end of input",
            TokenKind::Ident => "identifier",
            TokenKind::Str => "string",
            TokenKind::Number => "number",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Eq => "'='",
            TokenKind::Asterisk => "'*'",
        };
        f.write_str(name)
    }
}

/// Token representation
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,      // Token text (lowercased for identifiers)
    pub offset: usize,     // Byte offset in the input line
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            offset,
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "{}", self.kind),
            TokenKind::Str => write!(f, "string \"{}\"", self.text),
            TokenKind::Illegal => write!(f, "illegal character '{}'", self.text),
            TokenKind::Ident | TokenKind::Number => write!(f, "{} '{}'", self.kind, self.text),
            _ => write!(f, "{}", self.kind),
        }
    }
}
