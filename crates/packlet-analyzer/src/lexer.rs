//! Lexer for JavaScript source.
//!
//! Regular tokens are produced by a logos automaton. Whitespace, comments,
//! template literals and regular-expression literals are context sensitive
//! and handled by the manual loop in [`Lexer::tokenize`] before logos ever
//! sees them.

use crate::token::{Lexeme, Span, Token};
use logos::Logos;

/// Logos-based token enum for lexing.
///
/// Converted to [`Token`] after lexing.
#[derive(Logos, Debug, Clone, PartialEq)]
enum LogosToken {
    // Any non-ASCII code point is accepted as an identifier character
    #[regex(r"[a-zA-Z_$\x{80}-\x{10FFFF}][a-zA-Z0-9_$\x{80}-\x{10FFFF}]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"#[a-zA-Z_$][a-zA-Z0-9_$]*")]
    PrivateName,

    // Values are never needed, only extents (covers hex, bigint, separators)
    #[regex(r"[0-9][0-9a-zA-Z_]*(\.[0-9a-zA-Z_]*)?")]
    #[regex(r"\.[0-9][0-9a-zA-Z_]*")]
    Number,

    #[regex(r#""([^"\\\r\n]|\\(.|\r?\n))*""#, parse_string)]
    #[regex(r"'([^'\\\r\n]|\\(.|\r?\n))*'", parse_string)]
    Str(String),

    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    #[token("...")]
    DotDotDot,

    #[token("?.")]
    QuestionDot,

    #[token("=")]
    Equal,

    #[token("=>")]
    Arrow,

    #[token("*")]
    Star,

    #[token("++")]
    PlusPlus,

    #[token("--")]
    MinusMinus,

    #[token("+")]
    #[token("-")]
    #[token("%")]
    #[token("/")]
    #[token("**")]
    #[token("<")]
    #[token(">")]
    #[token("<=")]
    #[token(">=")]
    #[token("==")]
    #[token("!=")]
    #[token("===")]
    #[token("!==")]
    #[token("<<")]
    #[token(">>")]
    #[token(">>>")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("!")]
    #[token("~")]
    #[token("&&")]
    #[token("||")]
    #[token("??")]
    #[token("?")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("**=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token(">>>=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("&&=")]
    #[token("||=")]
    #[token("??=")]
    #[token("@")]
    Operator,
}

fn parse_string(lex: &mut logos::Lexer<'_, LogosToken>) -> Option<String> {
    let s = lex.slice();
    let inner = &s[1..s.len() - 1]; // Remove quotes
    Some(unescape_string(inner))
}

/// Cook the contents of a string literal.
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('b') => result.push('\u{8}'),
            Some('f') => result.push('\u{c}'),
            Some('v') => result.push('\u{b}'),
            Some('0') => result.push('\0'),
            // Line continuation
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('\n') | Some('\u{2028}') | Some('\u{2029}') => {}
            Some('x') => {
                let hex: String = (0..2).filter_map(|_| chars.next_if(|c| c.is_ascii_hexdigit())).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) if hex.len() == 2 => result.push(ch),
                    _ => {
                        result.push_str("\\x");
                        result.push_str(&hex);
                    }
                }
            }
            Some('u') => {
                let hex: String = if chars.next_if_eq(&'{').is_some() {
                    let hex: String = std::iter::from_fn(|| chars.next_if(|c| c.is_ascii_hexdigit())).collect();
                    chars.next_if_eq(&'}');
                    hex
                } else {
                    (0..4).filter_map(|_| chars.next_if(|c| c.is_ascii_hexdigit())).collect()
                };
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => result.push(ch),
                    None => {
                        result.push_str("\\u");
                        result.push_str(&hex);
                    }
                }
            }
            Some(other) => result.push(other),
            None => break,
        }
    }

    result
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedCharacter { char: char, span: Span },
    UnterminatedString { span: Span },
    UnterminatedTemplate { span: Span },
    UnterminatedComment { span: Span },
    UnterminatedRegex { span: Span },
    UnexpectedCloser { found: char, expected: Option<char>, span: Span },
    UnclosedDelimiter { open: char, span: Span },
}

impl LexError {
    /// Get the span of this error
    pub fn span(&self) -> &Span {
        match self {
            LexError::UnexpectedCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedTemplate { span }
            | LexError::UnterminatedComment { span }
            | LexError::UnterminatedRegex { span }
            | LexError::UnexpectedCloser { span, .. }
            | LexError::UnclosedDelimiter { span, .. } => span,
        }
    }

    /// Get a description of this error
    pub fn description(&self) -> String {
        match self {
            LexError::UnexpectedCharacter { char, .. } => {
                format!("Unexpected character '{}'", char)
            }
            LexError::UnterminatedString { .. } => "Unterminated string literal".to_string(),
            LexError::UnterminatedTemplate { .. } => "Unterminated template literal".to_string(),
            LexError::UnterminatedComment { .. } => "Unterminated block comment".to_string(),
            LexError::UnterminatedRegex { .. } => {
                "Unterminated regular expression".to_string()
            }
            LexError::UnexpectedCloser {
                found,
                expected: Some(expected),
                ..
            } => format!("Unexpected '{}', expected '{}'", found, expected),
            LexError::UnexpectedCloser { found, .. } => format!("Unexpected '{}'", found),
            LexError::UnclosedDelimiter { open, .. } => format!("Unclosed '{}'", open),
        }
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.description(),
            self.span().line,
            self.span().column
        )
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Delimiter {
    Brace,
    Paren,
    Bracket,
    /// `${` inside a template literal
    Interpolation,
}

impl Delimiter {
    fn open_char(self) -> char {
        match self {
            Delimiter::Brace => '{',
            Delimiter::Paren => '(',
            Delimiter::Bracket => '[',
            Delimiter::Interpolation => '$',
        }
    }

    fn close_char(self) -> char {
        match self {
            Delimiter::Brace | Delimiter::Interpolation => '}',
            Delimiter::Paren => ')',
            Delimiter::Bracket => ']',
        }
    }
}

/// Main lexer structure.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    newline_before: bool,
    delimiters: Vec<(Delimiter, Span)>,
    tokens: Vec<Lexeme>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            newline_before: false,
            delimiters: Vec::new(),
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Lexeme>, Vec<LexError>> {
        // Byte order mark and hashbang are not part of the token stream
        if self.source.starts_with('\u{feff}') {
            self.pos = '\u{feff}'.len_utf8();
        }
        if self.source[self.pos..].starts_with("#!") {
            let end = self.source[self.pos..]
                .find('\n')
                .map_or(self.source.len(), |i| self.pos + i);
            self.advance_to(end);
        }

        loop {
            if !self.skip_trivia() {
                break;
            }
            if self.pos >= self.source.len() {
                break;
            }

            let bytes = self.source.as_bytes();
            match bytes[self.pos] {
                b'`' => self.lex_template(self.pos),
                b'}' if matches!(self.delimiters.last(), Some((Delimiter::Interpolation, _))) => {
                    self.delimiters.pop();
                    self.lex_template(self.pos);
                }
                b'/' if self.regex_allowed() => self.lex_regex(),
                _ => self.lex_regular(),
            }
        }

        for (delimiter, span) in std::mem::take(&mut self.delimiters) {
            let error = if delimiter == Delimiter::Interpolation {
                LexError::UnterminatedTemplate { span }
            } else {
                LexError::UnclosedDelimiter {
                    open: delimiter.open_char(),
                    span,
                }
            };
            self.errors.push(error);
        }

        let eof_span = Span::new(self.source.len(), self.source.len(), self.line, self.column);
        self.tokens.push(Lexeme {
            token: Token::Eof,
            span: eof_span,
            depth: 0,
            newline_before: self.newline_before,
        });

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    /// Skip whitespace and comments. Returns false if lexing cannot continue.
    fn skip_trivia(&mut self) -> bool {
        while let Some(ch) = self.source[self.pos..].chars().next() {
            match ch {
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.newline_before = true;
                    self.advance_to(self.pos + ch.len_utf8());
                }
                ' ' | '\t' | '\r' | '\u{b}' | '\u{c}' | '\u{a0}' | '\u{feff}' => {
                    self.advance_to(self.pos + ch.len_utf8());
                }
                '/' => {
                    let rest = &self.source[self.pos..];
                    if rest.starts_with("//") {
                        let end = rest.find('\n').map_or(self.source.len(), |i| self.pos + i);
                        self.advance_to(end);
                    } else if rest.starts_with("/*") {
                        let start = self.span_to(self.pos + 2);
                        match rest[2..].find("*/") {
                            Some(i) => {
                                let end = self.pos + 2 + i + 2;
                                if self.source[self.pos..end].contains('\n') {
                                    self.newline_before = true;
                                }
                                self.advance_to(end);
                            }
                            None => {
                                self.errors.push(LexError::UnterminatedComment { span: start });
                                self.advance_to(self.source.len());
                                return false;
                            }
                        }
                    } else {
                        return true;
                    }
                }
                _ => return true,
            }
        }
        true
    }

    fn regex_allowed(&self) -> bool {
        self.tokens
            .last()
            .map_or(true, |lexeme| lexeme.token.allows_regex_after())
    }

    /// Lex one template chunk. `start` is the opening backtick or the `}`
    /// closing an interpolation.
    fn lex_template(&mut self, start: usize) {
        let bytes = self.source.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'`' => {
                    self.push_token(Token::Template, i + 1);
                    return;
                }
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    let span = self.push_token(Token::Template, i + 2);
                    self.delimiters.push((Delimiter::Interpolation, span));
                    return;
                }
                _ => i += 1,
            }
        }

        let span = self.span_to(self.source.len());
        self.errors.push(LexError::UnterminatedTemplate { span });
        self.advance_to(self.source.len());
    }

    fn lex_regex(&mut self) {
        let bytes = self.source.as_bytes();
        let mut i = self.pos + 1;
        let mut in_class = false;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 1,
                b'\n' | b'\r' => break,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => {
                    let mut end = i + 1;
                    while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
                        end += 1;
                    }
                    self.push_token(Token::Regex, end);
                    return;
                }
                _ => {}
            }
            i += 1;
        }

        let end = i.min(bytes.len());
        let span = self.span_to(end);
        self.errors.push(LexError::UnterminatedRegex { span });
        self.advance_to(end);
    }

    fn lex_regular(&mut self) {
        let mut logos_lexer = LogosToken::lexer(&self.source[self.pos..]);
        let Some(result) = logos_lexer.next() else {
            self.advance_to(self.source.len());
            return;
        };
        let end = self.pos + logos_lexer.span().end;

        match result {
            Ok(logos_token) => {
                let token = convert_token(logos_token);
                match token {
                    Token::LeftBrace => self.open(Delimiter::Brace, end),
                    Token::LeftParen => self.open(Delimiter::Paren, end),
                    Token::LeftBracket => self.open(Delimiter::Bracket, end),
                    Token::RightBrace => self.close(Delimiter::Brace, token, end),
                    Token::RightParen => self.close(Delimiter::Paren, token, end),
                    Token::RightBracket => self.close(Delimiter::Bracket, token, end),
                    _ => {
                        self.push_token(token, end);
                    }
                }
            }
            Err(()) => {
                let char = self.source[self.pos..].chars().next().unwrap_or('\0');
                if char == '"' || char == '\'' {
                    // Recover at the end of the line
                    let line_end = self.source[self.pos..]
                        .find('\n')
                        .map_or(self.source.len(), |i| self.pos + i);
                    let span = self.span_to(line_end);
                    self.errors.push(LexError::UnterminatedString { span });
                    self.advance_to(line_end);
                } else {
                    let span = self.span_to(self.pos + char.len_utf8());
                    self.errors.push(LexError::UnexpectedCharacter { char, span });
                    self.advance_to(self.pos + char.len_utf8().max(1));
                }
            }
        }
    }

    fn open(&mut self, delimiter: Delimiter, end: usize) {
        let token = match delimiter {
            Delimiter::Paren => Token::LeftParen,
            Delimiter::Bracket => Token::LeftBracket,
            _ => Token::LeftBrace,
        };
        let span = self.push_token(token, end);
        self.delimiters.push((delimiter, span));
    }

    fn close(&mut self, delimiter: Delimiter, token: Token, end: usize) {
        match self.delimiters.last() {
            Some((open, _)) if *open == delimiter => {
                self.delimiters.pop();
            }
            top => {
                let expected = top.map(|(open, _)| open.close_char());
                let span = self.span_to(end);
                self.errors.push(LexError::UnexpectedCloser {
                    found: delimiter.close_char(),
                    expected,
                    span,
                });
            }
        }
        self.push_token(token, end);
    }

    /// Push a token spanning from the current position to `end`.
    fn push_token(&mut self, token: Token, end: usize) -> Span {
        let span = self.span_to(end);
        self.tokens.push(Lexeme {
            token,
            span,
            depth: self.delimiters.len() as u32,
            newline_before: self.newline_before,
        });
        self.newline_before = false;
        self.advance_to(end);
        span
    }

    fn span_to(&self, end: usize) -> Span {
        Span::new(self.pos, end, self.line, self.column)
    }

    /// Move to byte offset `end`, updating line and column.
    fn advance_to(&mut self, end: usize) {
        let end = end.min(self.source.len());
        for c in self.source[self.pos..end].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos = end;
    }
}

fn convert_token(logos_token: LogosToken) -> Token {
    match logos_token {
        LogosToken::Ident(name) => Token::Ident(name),
        LogosToken::PrivateName => Token::PrivateName,
        LogosToken::Number => Token::Number,
        LogosToken::Str(value) => Token::Str(value),
        LogosToken::LeftBrace => Token::LeftBrace,
        LogosToken::RightBrace => Token::RightBrace,
        LogosToken::LeftParen => Token::LeftParen,
        LogosToken::RightParen => Token::RightParen,
        LogosToken::LeftBracket => Token::LeftBracket,
        LogosToken::RightBracket => Token::RightBracket,
        LogosToken::Semicolon => Token::Semicolon,
        LogosToken::Comma => Token::Comma,
        LogosToken::Colon => Token::Colon,
        LogosToken::Dot => Token::Dot,
        LogosToken::DotDotDot => Token::DotDotDot,
        LogosToken::QuestionDot => Token::QuestionDot,
        LogosToken::Equal => Token::Equal,
        LogosToken::Arrow => Token::Arrow,
        LogosToken::Star => Token::Star,
        LogosToken::PlusPlus => Token::PlusPlus,
        LogosToken::MinusMinus => Token::MinusMinus,
        LogosToken::Operator => Token::Operator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .expect("should lex")
            .into_iter()
            .map(|lexeme| lexeme.token)
            .collect()
    }

    #[test]
    fn test_import_statement() {
        assert_eq!(
            tokens("import { a } from './a.js';"),
            vec![
                Token::Ident("import".into()),
                Token::LeftBrace,
                Token::Ident("a".into()),
                Token::RightBrace,
                Token::Ident("from".into()),
                Token::Str("./a.js".into()),
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_skipped() {
        let toks = tokens("// require('./x')\n/* import './y' */ a");
        assert_eq!(toks, vec![Token::Ident("a".into()), Token::Eof]);
    }

    #[test]
    fn test_string_escapes_cooked() {
        let toks = tokens(r#"'it\'s' "\x41B\u{43}""#);
        assert_eq!(toks[0], Token::Str("it's".into()));
        assert_eq!(toks[1], Token::Str("ABC".into()));
    }

    #[test]
    fn test_regex_vs_division() {
        let toks = tokens("x = a / b / c; y = /'[/]\"/g.test(s);");
        assert_eq!(toks.iter().filter(|t| **t == Token::Regex).count(), 1);
        // The quotes inside the regex must not open strings
        assert!(!toks.iter().any(|t| matches!(t, Token::Str(_))));
    }

    #[test]
    fn test_regex_after_return() {
        let toks = tokens("function f() { return /a/.source; }");
        assert!(toks.contains(&Token::Regex));
    }

    #[test]
    fn test_template_with_interpolation() {
        let source = "`a ${require('./b')} c ${ {x: 1}.x } d`";
        let lexemes = Lexer::new(source).tokenize().expect("should lex");
        let templates = lexemes.iter().filter(|l| l.token == Token::Template).count();
        assert_eq!(templates, 3);
        let string = lexemes
            .iter()
            .find(|l| l.token == Token::Str("./b".into()))
            .expect("string inside interpolation");
        assert_eq!(string.depth, 2); // interpolation + call parens
    }

    #[test]
    fn test_depth_tracking() {
        let lexemes = Lexer::new("a { b ( c ) } d").tokenize().unwrap();
        let depths: Vec<u32> = lexemes.iter().map(|l| l.depth).collect();
        // a  {  b  (  c  )  }  d  EOF
        assert_eq!(depths, vec![0, 0, 1, 1, 2, 1, 0, 0, 0]);
    }

    #[test]
    fn test_newline_before() {
        let lexemes = Lexer::new("a\nb c").tokenize().unwrap();
        assert!(!lexemes[0].newline_before);
        assert!(lexemes[1].newline_before);
        assert!(!lexemes[2].newline_before);
    }

    #[test]
    fn test_hashbang_skipped() {
        let toks = tokens("#!/usr/bin/env node\nfoo");
        assert_eq!(toks, vec![Token::Ident("foo".into()), Token::Eof]);
    }

    #[test]
    fn test_unicode_identifier() {
        let toks = tokens("const 名前 = 1;");
        assert_eq!(toks[1], Token::Ident("名前".into()));
    }

    #[test]
    fn test_unterminated_string() {
        let errors = Lexer::new("let s = 'oops;\nlet t = 1;").tokenize().unwrap_err();
        assert!(matches!(errors[0], LexError::UnterminatedString { .. }));
        assert_eq!(errors[0].span().line, 1);
    }

    #[test]
    fn test_unterminated_template() {
        let errors = Lexer::new("let s = `abc").tokenize().unwrap_err();
        assert!(matches!(errors[0], LexError::UnterminatedTemplate { .. }));
    }

    #[test]
    fn test_unterminated_comment() {
        let errors = Lexer::new("a /* b").tokenize().unwrap_err();
        assert!(matches!(errors[0], LexError::UnterminatedComment { .. }));
    }

    #[test]
    fn test_mismatched_closer() {
        let errors = Lexer::new("f(a]").tokenize().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            LexError::UnexpectedCloser { found: ']', expected: Some(')'), .. }
        )));
    }

    #[test]
    fn test_unclosed_delimiter() {
        let errors = Lexer::new("function f() {\n  return 1;\n").tokenize().unwrap_err();
        assert!(matches!(errors[0], LexError::UnclosedDelimiter { open: '{', .. }));
    }

    #[test]
    fn test_error_display_has_position() {
        let errors = Lexer::new("a\n  ]").tokenize().unwrap_err();
        assert_eq!(errors[0].to_string(), "Unexpected ']' at 2:3");
    }
}
