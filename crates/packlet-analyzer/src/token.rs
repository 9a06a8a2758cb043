//! Token definitions for JavaScript source.
//!
//! The analyzer only needs enough of the grammar to find module syntax and
//! `require` calls, so most operators collapse into [`Token::Operator`].
//! Every token keeps its exact byte span, which is what the transform uses to
//! rewrite the source.

use std::fmt;

/// A token in JavaScript source.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword (keywords are not distinguished at this level)
    Ident(String),
    /// `#name` private class member
    PrivateName,
    /// String literal with its cooked value
    Str(String),
    Number,
    /// One literal chunk of a template (head, middle, tail or whole)
    Template,
    Regex,

    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,
    DotDotDot,
    QuestionDot,
    Equal,
    Arrow,
    Star,
    PlusPlus,
    MinusMinus,
    /// Any other punctuator
    Operator,

    Eof,
}

impl Token {
    /// Check whether this token is the identifier `word`.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Ident(name) if name == word)
    }

    /// Return the identifier text, if any.
    pub fn ident(&self) -> Option<&str> {
        match self {
            Token::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Whether a `/` following this token starts a regular expression
    /// literal rather than a division.
    pub(crate) fn allows_regex_after(&self) -> bool {
        match self {
            Token::Ident(word) => REGEX_PRECEDING_KEYWORDS.contains(&word.as_str()),
            Token::PrivateName
            | Token::Str(_)
            | Token::Number
            | Token::Template
            | Token::Regex
            | Token::RightParen
            | Token::RightBracket
            | Token::PlusPlus
            | Token::MinusMinus => false,
            _ => true,
        }
    }
}

/// Keywords after which an expression (and therefore a regex) may start.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await", "extends",
];

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::PrivateName => write!(f, "private name"),
            Token::Str(value) => write!(f, "string \"{}\"", value),
            Token::Number => write!(f, "number"),
            Token::Template => write!(f, "template literal"),
            Token::Regex => write!(f, "regular expression"),
            Token::LeftBrace => write!(f, "'{{'"),
            Token::RightBrace => write!(f, "'}}'"),
            Token::LeftParen => write!(f, "'('"),
            Token::RightParen => write!(f, "')'"),
            Token::LeftBracket => write!(f, "'['"),
            Token::RightBracket => write!(f, "']'"),
            Token::Semicolon => write!(f, "';'"),
            Token::Comma => write!(f, "','"),
            Token::Colon => write!(f, "':'"),
            Token::Dot => write!(f, "'.'"),
            Token::DotDotDot => write!(f, "'...'"),
            Token::QuestionDot => write!(f, "'?.'"),
            Token::Equal => write!(f, "'='"),
            Token::Arrow => write!(f, "'=>'"),
            Token::Star => write!(f, "'*'"),
            Token::PlusPlus => write!(f, "'++'"),
            Token::MinusMinus => write!(f, "'--'"),
            Token::Operator => write!(f, "operator"),
            Token::Eof => write!(f, "end of file"),
        }
    }
}

/// Source location of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    /// Span covering `self` through `other`, keeping `self`'s position.
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
            line: self.line,
            column: self.column,
        }
    }
}

/// A lexed token with its location and layout information.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub span: Span,
    /// Bracket nesting depth at which the token appears (0 = top level)
    pub depth: u32,
    /// Whether a line terminator separates this token from the previous one
    pub newline_before: bool,
}
