//! Lexer for stackscript.
//!
//! Converts a source buffer into an ordered token sequence. Whitespace is
//! discarded, `//` runs to end-of-line as a comment, and everything else is
//! read as ASCII — a non-ASCII byte anywhere in an identifier or operator
//! position is a lex error rather than being silently accepted.
mod token;

pub use token::*;

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt::Display;

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut m = HashMap::new();
        m.insert("var", TokenKind::Var);
        m.insert("if", TokenKind::If);
        m.insert("else", TokenKind::Else);
        m.insert("fn", TokenKind::Fn);
        m.insert("return", TokenKind::Return);
        m.insert("true", TokenKind::True);
        m.insert("false", TokenKind::False);
        m.insert("and", TokenKind::And);
        m.insert("or", TokenKind::Or);
        m.insert("while", TokenKind::While);
        m.insert("for", TokenKind::For);
        m
    };

    /// Multi-character operators, longest first so maximal munch falls out
    /// of a linear scan instead of needing a trie.
    static ref OPERATORS: Vec<(&'static str, TokenKind)> = vec![
        ("==", TokenKind::EqEq),
        ("!=", TokenKind::BangEq),
        ("<=", TokenKind::LessEq),
        (">=", TokenKind::GreaterEq),
        ("++", TokenKind::PlusPlus),
        ("--", TokenKind::MinusMinus),
        ("+=", TokenKind::PlusEq),
        ("-=", TokenKind::MinusEq),
        ("*=", TokenKind::StarEq),
        ("/=", TokenKind::SlashEq),
        (":=", TokenKind::ColonEq),
        ("->", TokenKind::Arrow),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        ("{", TokenKind::LBrace),
        ("}", TokenKind::RBrace),
        ("[", TokenKind::LBracket),
        ("]", TokenKind::RBracket),
        (",", TokenKind::Comma),
        (":", TokenKind::Colon),
        (";", TokenKind::Semicolon),
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("*", TokenKind::Star),
        ("/", TokenKind::Slash),
        ("%", TokenKind::Percent),
        ("=", TokenKind::Eq),
        ("<", TokenKind::Less),
        (">", TokenKind::Greater),
        ("!", TokenKind::Bang),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnexpectedCharacter,
    UnterminatedString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub message: String,
    pub start: usize,
    pub end: usize,
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for LexError {}

impl From<LexError> for crate::diagnostics::Diagnostic {
    fn from(err: LexError) -> Self {
        let kind = match err.kind {
            LexErrorKind::UnexpectedCharacter => crate::diagnostics::DiagnosticKind::UnexpectedCharacter,
            LexErrorKind::UnterminatedString => crate::diagnostics::DiagnosticKind::UnterminatedString,
        };
        crate::diagnostics::Diagnostic::new(
            kind,
            err.message.clone(),
            Some(crate::diagnostics::SourceSpan { start: err.start, end: err.end }),
        )
    }
}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            tokens: vec![],
            pos: 0,
        }
    }

    pub fn tokenize(source: &'a str) -> LexResult<Vec<Token>> {
        let mut lexer = Self::new(source);
        lexer.run()?;
        Ok(lexer.tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn run(&mut self) -> LexResult<()> {
        loop {
            self.skip_whitespace_and_comments();

            let Some(next) = self.peek() else {
                return Ok(());
            };

            match next {
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_identifier(),
                b'0'..=b'9' => self.lex_number()?,
                b'"' => self.lex_string()?,
                0..=127 => self.lex_operator()?,
                _ => {
                    let start = self.pos;
                    self.pos += 1;
                    return Err(LexError {
                        kind: LexErrorKind::UnexpectedCharacter,
                        message: format!("unexpected character at byte {start}"),
                        start,
                        end: self.pos,
                    });
                }
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_identifier(&mut self) {
        let start = self.pos;
        while matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')) {
            self.pos += 1;
        }
        let lexeme = &self.source[start..self.pos];
        let kind = KEYWORDS.get(lexeme).copied().unwrap_or(TokenKind::Id);
        self.tokens.push(Token::new(kind, start, self.pos));
    }

    fn lex_number(&mut self) -> LexResult<()> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.tokens.push(Token::new(TokenKind::Int, start, self.pos));
        Ok(())
    }

    fn lex_string(&mut self) -> LexResult<()> {
        let start = self.pos;
        self.advance(); // opening quote

        loop {
            match self.advance() {
                Some(b'"') => {
                    self.tokens.push(Token::new(TokenKind::Str, start, self.pos));
                    return Ok(());
                }
                Some(b'\n') | None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        message: format!("unterminated string starting at byte {start}"),
                        start,
                        end: self.pos,
                    });
                }
                Some(_) => {}
            }
        }
    }

    fn lex_operator(&mut self) -> LexResult<()> {
        let start = self.pos;
        let remaining = &self.source[self.pos..];

        for (text, kind) in OPERATORS.iter() {
            if remaining.starts_with(text) {
                self.pos += text.len();
                self.tokens.push(Token::new(*kind, start, self.pos));
                return Ok(());
            }
        }

        self.pos += 1;
        Err(LexError {
            kind: LexErrorKind::UnexpectedCharacter,
            message: format!("unexpected character at byte {start}"),
            start,
            end: self.pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_identifier() {
        assert_eq!(kinds("letter"), vec![TokenKind::Id]);
    }

    #[test]
    fn lexes_integer() {
        let tokens = Lexer::tokenize("1337").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[0].lexeme("1337"), "1337");
    }

    #[test]
    fn lexes_var_declaration() {
        assert_eq!(
            kinds("var foo = 42;"),
            vec![
                TokenKind::Var,
                TokenKind::Id,
                TokenKind::Eq,
                TokenKind::Int,
                TokenKind::Semicolon
            ]
        );
    }

    #[test]
    fn maximal_munch_prefers_longer_operator() {
        assert_eq!(kinds("a == b"), vec![TokenKind::Id, TokenKind::EqEq, TokenKind::Id]);
        assert_eq!(kinds("a = b"), vec![TokenKind::Id, TokenKind::Eq, TokenKind::Id]);
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(kinds("1 // comment\n2"), vec![TokenKind::Int, TokenKind::Int]);
    }

    #[test]
    fn string_literal_round_trips_raw_substring() {
        let source = r#""hello world""#;
        let tokens = Lexer::tokenize(source).unwrap();
        assert_eq!(tokens[0].lexeme(source), "\"hello world\"");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Lexer::tokenize("\"abc").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn unknown_byte_is_an_error() {
        let err = Lexer::tokenize("@").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnexpectedCharacter);
    }

    #[test]
    fn non_ascii_byte_is_rejected() {
        let err = Lexer::tokenize("café").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnexpectedCharacter);
    }
}
