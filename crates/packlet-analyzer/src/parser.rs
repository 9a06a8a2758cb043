//! Module-level parser.
//!
//! Finds the parts of a program that matter for bundling: top-level import
//! and export declarations and `require("...")` calls anywhere in the file.
//! Everything else is kept as an opaque token stream.

use thiserror::Error;

use crate::lexer::{LexError, Lexer};
use crate::token::{Lexeme, Span, Token};

/// Errors produced while parsing module syntax.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{}", format_lex_errors(.0))]
    Lex(Vec<LexError>),

    #[error("{message} at {}:{}", .span.line, .span.column)]
    Syntax { message: String, span: Span },
}

fn format_lex_errors(errors: &[LexError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A module specifier string literal.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRequest {
    /// Cooked specifier text, e.g. `./utils`
    pub specifier: String,
    /// Span of the string literal, quotes included
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportBinding {
    Default(String),
    Namespace(String),
    Named { imported: String, local: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    /// From `import` through the specifier (and attributes, if any)
    pub span: Span,
    pub bindings: Vec<ImportBinding>,
    pub request: ModuleRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDecl {
    /// `export const|let|var|function|class ...`; `keyword` is the `export` token
    Declaration { keyword: Span, names: Vec<String> },
    /// `export default function name` / `export default class Name`
    DefaultDeclaration { prefix: Span, name: String },
    /// `export default <expression>` (including anonymous declarations)
    DefaultExpression { prefix: Span },
    /// `export { a, b as c }`
    Named { span: Span, specifiers: Vec<ExportSpecifier> },
    /// `export { a, b as c } from "..."`
    From {
        span: Span,
        specifiers: Vec<ExportSpecifier>,
        request: ModuleRequest,
    },
    /// `export * from "..."`
    All { span: Span, request: ModuleRequest },
    /// `export * as ns from "..."`
    Namespace {
        span: Span,
        name: String,
        request: ModuleRequest,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleItem {
    Import(ImportDecl),
    Export(ExportDecl),
    Require(ModuleRequest),
}

impl ModuleItem {
    /// The module this item loads, if any.
    pub fn request(&self) -> Option<&ModuleRequest> {
        match self {
            ModuleItem::Import(decl) => Some(&decl.request),
            ModuleItem::Export(ExportDecl::From { request, .. })
            | ModuleItem::Export(ExportDecl::All { request, .. })
            | ModuleItem::Export(ExportDecl::Namespace { request, .. }) => Some(request),
            ModuleItem::Export(_) => None,
            ModuleItem::Require(request) => Some(request),
        }
    }
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct Program {
    pub source: String,
    pub tokens: Vec<Lexeme>,
    /// Module items in source order
    pub items: Vec<ModuleItem>,
}

impl Program {
    /// Whether the file uses import/export syntax.
    pub fn has_module_syntax(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, ModuleItem::Import(_) | ModuleItem::Export(_)))
    }

    /// Every module request in source order.
    pub fn requests(&self) -> impl Iterator<Item = &ModuleRequest> {
        self.items.iter().filter_map(ModuleItem::request)
    }
}

/// Parse JavaScript source into a [`Program`].
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(source).tokenize().map_err(ParseError::Lex)?;
    let items = Parser::new(&tokens).parse_items()?;
    Ok(Program {
        source: source.to_string(),
        tokens,
        items,
    })
}

/// Keywords that start a new statement when they follow a line break.
pub(crate) const STATEMENT_KEYWORDS: &[&str] = &[
    "export", "import", "const", "let", "var", "function", "class", "if", "for", "while", "do",
    "return", "throw", "try", "switch",
];

/// Token-level parser over a lexed stream. Also used by the scope analysis
/// to read binding patterns.
pub(crate) struct Parser<'t> {
    tokens: &'t [Lexeme],
}

type ParseResult<T> = Result<T, ParseError>;

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Lexeme]) -> Self {
        Self { tokens }
    }

    fn parse_items(&self) -> ParseResult<Vec<ModuleItem>> {
        let mut items = Vec::new();
        let mut i = 0;

        while self.token(i) != &Token::Eof {
            let lexeme = &self.tokens[i];
            let after_member = i > 0
                && matches!(self.token(i - 1), Token::Dot | Token::QuestionDot);

            if lexeme.depth == 0 && !after_member && lexeme.token.is_word("import") {
                // import(...) and import.meta are expressions
                if matches!(self.token(i + 1), Token::LeftParen | Token::Dot) {
                    i += 1;
                    continue;
                }
                let (decl, next) = self.parse_import(i)?;
                items.push(ModuleItem::Import(decl));
                i = next;
                continue;
            }

            if lexeme.depth == 0 && !after_member && lexeme.token.is_word("export") {
                let (decl, next) = self.parse_export(i)?;
                items.push(ModuleItem::Export(decl));
                i = next;
                continue;
            }

            if lexeme.token.is_word("require")
                && !after_member
                && !(i > 0 && self.token(i - 1).is_word("function"))
                && self.token(i + 1) == &Token::LeftParen
                && self.token(i + 3) == &Token::RightParen
            {
                if let Token::Str(specifier) = self.token(i + 2) {
                    items.push(ModuleItem::Require(ModuleRequest {
                        specifier: specifier.clone(),
                        span: self.tokens[i + 2].span,
                    }));
                    i += 4;
                    continue;
                }
            }

            i += 1;
        }

        Ok(items)
    }

    /// `import ...` starting at token `i`.
    fn parse_import(&self, i: usize) -> ParseResult<(ImportDecl, usize)> {
        let mut j = i + 1;
        let mut bindings = Vec::new();

        if !matches!(self.token(j), Token::Str(_)) {
            if let Some(name) = self.token(j).ident() {
                bindings.push(ImportBinding::Default(name.to_string()));
                j += 1;
                if self.token(j) == &Token::Comma {
                    j += 1;
                } else {
                    return self.finish_import(i, j, bindings);
                }
            }

            match self.token(j) {
                Token::Star => {
                    self.expect_word(j + 1, "as")?;
                    let local = self.expect_ident(j + 2)?;
                    bindings.push(ImportBinding::Namespace(local));
                    j += 3;
                }
                Token::LeftBrace => {
                    let (specifiers, next) = self.parse_specifier_list(j)?;
                    for spec in specifiers {
                        bindings.push(ImportBinding::Named {
                            imported: spec.exported,
                            local: spec.local,
                        });
                    }
                    j = next;
                }
                _ => return Err(self.unexpected(j, "in import declaration")),
            }
        }

        self.finish_import(i, j, bindings)
    }

    fn finish_import(
        &self,
        i: usize,
        mut j: usize,
        bindings: Vec<ImportBinding>,
    ) -> ParseResult<(ImportDecl, usize)> {
        if !bindings.is_empty() {
            self.expect_word(j, "from")?;
            j += 1;
        }
        let request = self.expect_request(j)?;
        let end = self.skip_attributes(j + 1);
        let decl = ImportDecl {
            span: self.tokens[i].span.to(&self.tokens[end - 1].span),
            bindings,
            request,
        };
        Ok((decl, end))
    }

    /// `{ a, b as c, "d" as e }` for imports. `exported` holds the remote
    /// name and `local` the binding, matching [`ExportSpecifier`] for
    /// re-exports.
    fn parse_specifier_list(&self, open: usize) -> ParseResult<(Vec<ExportSpecifier>, usize)> {
        let mut specifiers = Vec::new();
        let mut j = open + 1;

        loop {
            if self.token(j) == &Token::RightBrace {
                return Ok((specifiers, j + 1));
            }
            let remote = self.expect_name(j)?;
            j += 1;
            let local = if self.token(j).is_word("as") {
                j += 1;
                let local = self.expect_ident(j)?;
                j += 1;
                local
            } else if matches!(self.token(j - 1), Token::Str(_)) {
                return Err(self.unexpected(j, "after string import name"));
            } else {
                remote.clone()
            };
            specifiers.push(ExportSpecifier {
                local,
                exported: remote,
            });

            match self.token(j) {
                Token::Comma => j += 1,
                Token::RightBrace => {}
                _ => return Err(self.unexpected(j, "in import specifier list")),
            }
        }
    }

    /// `export ...` starting at token `i`.
    fn parse_export(&self, i: usize) -> ParseResult<(ExportDecl, usize)> {
        let j = i + 1;
        let export_span = self.tokens[i].span;

        match self.token(j) {
            Token::Star => {
                if self.token(j + 1).is_word("as") {
                    let name = self.expect_name(j + 2)?;
                    self.expect_word(j + 3, "from")?;
                    let request = self.expect_request(j + 4)?;
                    let end = self.skip_attributes(j + 5);
                    let span = export_span.to(&self.tokens[end - 1].span);
                    Ok((ExportDecl::Namespace { span, name, request }, end))
                } else {
                    self.expect_word(j + 1, "from")?;
                    let request = self.expect_request(j + 2)?;
                    let end = self.skip_attributes(j + 3);
                    let span = export_span.to(&self.tokens[end - 1].span);
                    Ok((ExportDecl::All { span, request }, end))
                }
            }
            Token::LeftBrace => self.parse_export_list(i, j),
            Token::Ident(word) => match word.as_str() {
                "default" => Ok((self.parse_export_default(i, j), j + 1)),
                "const" | "let" | "var" => {
                    let names = self.parse_declarators(j + 1)?;
                    Ok((
                        ExportDecl::Declaration {
                            keyword: export_span,
                            names,
                        },
                        j,
                    ))
                }
                "function" | "async" | "class" => {
                    let name_at = self.declaration_name_index(j).ok_or_else(|| {
                        self.unexpected(j, "in exported declaration")
                    })?;
                    let name = self.expect_ident(name_at)?;
                    Ok((
                        ExportDecl::Declaration {
                            keyword: export_span,
                            names: vec![name],
                        },
                        j,
                    ))
                }
                _ => Err(self.unexpected(j, "after 'export'")),
            },
            _ => Err(self.unexpected(j, "after 'export'")),
        }
    }

    fn parse_export_list(&self, i: usize, open: usize) -> ParseResult<(ExportDecl, usize)> {
        let mut specifiers = Vec::new();
        let mut j = open + 1;

        while self.token(j) != &Token::RightBrace {
            let local = self.expect_name(j)?;
            j += 1;
            let exported = if self.token(j).is_word("as") {
                j += 1;
                let exported = self.expect_name(j)?;
                j += 1;
                exported
            } else {
                local.clone()
            };
            specifiers.push(ExportSpecifier { local, exported });

            match self.token(j) {
                Token::Comma => j += 1,
                Token::RightBrace => {}
                _ => return Err(self.unexpected(j, "in export specifier list")),
            }
        }
        j += 1;

        let export_span = self.tokens[i].span;
        if self.token(j).is_word("from") {
            let request = self.expect_request(j + 1)?;
            let end = self.skip_attributes(j + 2);
            let span = export_span.to(&self.tokens[end - 1].span);
            return Ok((
                ExportDecl::From {
                    span,
                    specifiers,
                    request,
                },
                end,
            ));
        }

        let span = export_span.to(&self.tokens[j - 1].span);
        Ok((ExportDecl::Named { span, specifiers }, j))
    }

    fn parse_export_default(&self, i: usize, j: usize) -> ExportDecl {
        let prefix = self.tokens[i].span.to(&self.tokens[j].span);
        let name = self
            .declaration_name_index(j + 1)
            .and_then(|at| self.token(at).ident())
            .filter(|name| *name != "extends");

        match name {
            Some(name) => ExportDecl::DefaultDeclaration {
                prefix,
                name: name.to_string(),
            },
            None => ExportDecl::DefaultExpression { prefix },
        }
    }

    /// For a `function`, `async function`, `function*` or `class` starting
    /// at `k`, the index where its name would be.
    fn declaration_name_index(&self, k: usize) -> Option<usize> {
        let mut k = k;
        if self.token(k).is_word("async") {
            if !self.token(k + 1).is_word("function") || self.tokens[k + 1].newline_before {
                return None;
            }
            k += 1;
        }
        if self.token(k).is_word("function") {
            k += 1;
            if self.token(k) == &Token::Star {
                k += 1;
            }
            return Some(k);
        }
        if self.token(k).is_word("class") {
            return Some(k + 1);
        }
        None
    }

    /// Binding names of `a = 1, { b, c: [d] } = obj` starting at `k`.
    pub(crate) fn parse_declarators(&self, k: usize) -> ParseResult<Vec<String>> {
        let base = self.tokens[k.min(self.tokens.len() - 1)].depth;
        let mut names = Vec::new();
        let mut k = k;

        loop {
            k = self.parse_binding(k, &mut names)?;
            if self.token(k) == &Token::Equal {
                k = self.skip_initializer(k + 1, base);
            }
            if self.token(k) == &Token::Comma && self.tokens[k].depth == base {
                k += 1;
            } else {
                return Ok(names);
            }
        }
    }

    fn skip_initializer(&self, start: usize, base: u32) -> usize {
        let mut k = start;
        loop {
            let lexeme = &self.tokens[k];
            match &lexeme.token {
                Token::Eof => return k,
                Token::Comma | Token::Semicolon if lexeme.depth == base => return k,
                Token::Ident(word)
                    if k > start
                        && lexeme.depth == base
                        && lexeme.newline_before
                        && STATEMENT_KEYWORDS.contains(&word.as_str()) =>
                {
                    return k
                }
                _ => k += 1,
            }
        }
    }

    /// Collect the names bound by the pattern at `k`; returns the index after it.
    fn parse_binding(&self, k: usize, names: &mut Vec<String>) -> ParseResult<usize> {
        match self.token(k) {
            Token::Ident(name) => {
                names.push(name.clone());
                Ok(k + 1)
            }
            Token::LeftBrace => self.parse_object_pattern(k, names),
            Token::LeftBracket => self.parse_array_pattern(k, names),
            _ => Err(self.unexpected(k, "in binding pattern")),
        }
    }

    fn parse_object_pattern(&self, open: usize, names: &mut Vec<String>) -> ParseResult<usize> {
        let inner = self.tokens[open].depth + 1;
        let mut k = open + 1;

        loop {
            match self.token(k) {
                Token::RightBrace => return Ok(k + 1),
                Token::DotDotDot => k = self.parse_binding(k + 1, names)?,
                Token::LeftBracket => {
                    // Computed key: [expr]: pattern
                    k = self.skip_to_closer(k);
                    if self.token(k) != &Token::Colon {
                        return Err(self.unexpected(k, "after computed key"));
                    }
                    k = self.parse_binding(k + 1, names)?;
                }
                Token::Ident(_) | Token::Str(_) | Token::Number => {
                    if self.token(k + 1) == &Token::Colon {
                        k = self.parse_binding(k + 2, names)?;
                    } else {
                        let name = self.expect_ident(k)?;
                        names.push(name);
                        k += 1;
                    }
                }
                _ => return Err(self.unexpected(k, "in object pattern")),
            }

            if self.token(k) == &Token::Equal {
                k = self.skip_default(k + 1, inner);
            }
            match self.token(k) {
                Token::Comma => k += 1,
                Token::RightBrace => {}
                _ => return Err(self.unexpected(k, "in object pattern")),
            }
        }
    }

    fn parse_array_pattern(&self, open: usize, names: &mut Vec<String>) -> ParseResult<usize> {
        let inner = self.tokens[open].depth + 1;
        let mut k = open + 1;

        loop {
            match self.token(k) {
                Token::RightBracket => return Ok(k + 1),
                Token::Comma => {
                    k += 1;
                    continue;
                }
                Token::DotDotDot => k = self.parse_binding(k + 1, names)?,
                _ => k = self.parse_binding(k, names)?,
            }

            if self.token(k) == &Token::Equal {
                k = self.skip_default(k + 1, inner);
            }
            match self.token(k) {
                Token::Comma => k += 1,
                Token::RightBracket => {}
                _ => return Err(self.unexpected(k, "in array pattern")),
            }
        }
    }

    /// Binding names of a parameter list `(a, { b } = {}, ...rest)` whose
    /// opening parenthesis is at `open`.
    pub(crate) fn parse_parameters(&self, open: usize) -> ParseResult<Vec<String>> {
        let inner = self.tokens[open].depth + 1;
        let mut names = Vec::new();
        let mut k = open + 1;

        loop {
            match self.token(k) {
                Token::RightParen => return Ok(names),
                Token::DotDotDot => k = self.parse_binding(k + 1, &mut names)?,
                _ => k = self.parse_binding(k, &mut names)?,
            }

            if self.token(k) == &Token::Equal {
                k = self.skip_default(k + 1, inner);
            }
            match self.token(k) {
                Token::Comma => k += 1,
                Token::RightParen => {}
                _ => return Err(self.unexpected(k, "in parameter list")),
            }
        }
    }

    /// Skip a default value inside a pattern whose elements sit at `inner` depth.
    fn skip_default(&self, start: usize, inner: u32) -> usize {
        let mut k = start;
        loop {
            let lexeme = &self.tokens[k];
            match lexeme.token {
                Token::Eof => return k,
                Token::Comma if lexeme.depth == inner => return k,
                Token::RightBrace | Token::RightBracket | Token::RightParen
                    if lexeme.depth == inner - 1 =>
                {
                    return k
                }
                _ => k += 1,
            }
        }
    }

    /// From an opening bracket at `open`, the index after its closer.
    fn skip_to_closer(&self, open: usize) -> usize {
        let depth = self.tokens[open].depth;
        let mut k = open + 1;
        while self.token(k) != &Token::Eof {
            let lexeme = &self.tokens[k];
            if lexeme.depth == depth
                && matches!(
                    lexeme.token,
                    Token::RightBrace | Token::RightBracket | Token::RightParen
                )
            {
                return k + 1;
            }
            k += 1;
        }
        k
    }

    /// Skip `with { type: "json" }` / `assert { ... }` import attributes.
    fn skip_attributes(&self, k: usize) -> usize {
        let is_keyword = self.token(k).is_word("with")
            || (self.token(k).is_word("assert") && !self.tokens[k].newline_before);
        if is_keyword && self.token(k + 1) == &Token::LeftBrace {
            self.skip_to_closer(k + 1)
        } else {
            k
        }
    }

    fn token(&self, i: usize) -> &Token {
        // The stream always ends with Eof
        self.tokens
            .get(i)
            .map_or(&Token::Eof, |lexeme| &lexeme.token)
    }

    fn span(&self, i: usize) -> Span {
        self.tokens
            .get(i)
            .or_else(|| self.tokens.last())
            .map(|lexeme| lexeme.span)
            .unwrap_or_default()
    }

    fn expect_word(&self, i: usize, word: &str) -> ParseResult<()> {
        if self.token(i).is_word(word) {
            Ok(())
        } else {
            Err(self.error(
                format!("Expected '{}', found {}", word, self.token(i)),
                i,
            ))
        }
    }

    fn expect_ident(&self, i: usize) -> ParseResult<String> {
        self.token(i)
            .ident()
            .map(str::to_string)
            .ok_or_else(|| self.error(format!("Expected identifier, found {}", self.token(i)), i))
    }

    /// Identifier or string module export name.
    fn expect_name(&self, i: usize) -> ParseResult<String> {
        match self.token(i) {
            Token::Ident(name) | Token::Str(name) => Ok(name.clone()),
            other => Err(self.error(format!("Expected name, found {}", other), i)),
        }
    }

    fn expect_request(&self, i: usize) -> ParseResult<ModuleRequest> {
        match self.token(i) {
            Token::Str(specifier) => Ok(ModuleRequest {
                specifier: specifier.clone(),
                span: self.span(i),
            }),
            other => Err(self.error(
                format!("Expected module specifier string, found {}", other),
                i,
            )),
        }
    }

    fn unexpected(&self, i: usize, context: &str) -> ParseError {
        self.error(format!("Unexpected {} {}", self.token(i), context), i)
    }

    fn error(&self, message: String, i: usize) -> ParseError {
        ParseError::Syntax {
            message,
            span: self.span(i),
        }
    }
}
