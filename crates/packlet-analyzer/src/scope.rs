//! Scope analysis for imported bindings.
//!
//! Imported names are never copied into locals. Every read becomes a
//! property access on the required module's exports, so the value seen is
//! always the exporter's current one (cycles and `let` exports included).
//! [`find_references`] locates those reads: identifier tokens naming an
//! import that are not property keys, member names or labels, and that no
//! nested declaration of the same name encloses.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::parser::{Parser, Program, STATEMENT_KEYWORDS};
use crate::token::{Lexeme, Token};

/// How a reference to an imported name is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReferenceKind {
    Read,
    /// Callee of a call or tagged template
    Call,
    /// Shorthand property `{ name }` in an object literal
    Shorthand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reference {
    /// Index into the program's token stream
    pub index: usize,
    pub kind: ReferenceKind,
}

/// What the tokens directly inside a bracket pair are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Statements, including the top level
    Block,
    /// Object literal or object pattern
    Object,
    Class,
    /// Parenthesized, bracketed or interpolated expression
    Expression,
}

/// Keywords after which `{` starts an object literal.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "void", "delete", "in", "of", "new", "throw", "yield",
    "await",
];

/// Keywords whose parenthesized head is not a binding list.
const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "with"];

/// Words that can precede a method or field name.
const MEMBER_MODIFIERS: &[&str] = &["static", "get", "set", "async", "accessor"];

/// Find every reference to one of `imported` in `program`, in token order.
pub(crate) fn find_references(program: &Program, imported: &FxHashSet<&str>) -> Vec<Reference> {
    if imported.is_empty() {
        return Vec::new();
    }
    let mut scopes = ScopeMap::new(program);
    scopes.collect_shadows(imported);
    (0..program.tokens.len())
        .filter_map(|i| scopes.reference(i, imported))
        .collect()
}

struct ScopeMap<'p> {
    source: &'p str,
    tokens: &'p [Lexeme],
    /// Matching closer of each opening bracket
    closers: Vec<Option<usize>>,
    /// Matching opener of each closing bracket
    openers: Vec<Option<usize>>,
    /// Innermost enclosing opener of each token
    parents: Vec<Option<usize>>,
    /// Region of each opener
    regions: Vec<Option<Region>>,
    /// Inclusive token ranges in which a nested declaration hides an import
    shadows: FxHashMap<String, Vec<(usize, usize)>>,
}

impl<'p> ScopeMap<'p> {
    fn new(program: &'p Program) -> Self {
        let len = program.tokens.len();
        let mut map = ScopeMap {
            source: &program.source,
            tokens: &program.tokens,
            closers: vec![None; len],
            openers: vec![None; len],
            parents: vec![None; len],
            regions: vec![None; len],
            shadows: FxHashMap::default(),
        };
        map.match_brackets();
        map
    }

    fn match_brackets(&mut self) {
        let mut stack: Vec<usize> = Vec::new();
        for i in 0..self.tokens.len() {
            let (closes, opens) = match self.tokens[i].token {
                Token::LeftBrace | Token::LeftParen | Token::LeftBracket => (false, true),
                Token::RightBrace | Token::RightParen | Token::RightBracket => (true, false),
                Token::Template => {
                    let text = self.text(i);
                    (text.starts_with('}'), text.ends_with("${"))
                }
                _ => (false, false),
            };
            if closes {
                if let Some(open) = stack.pop() {
                    self.closers[open] = Some(i);
                    self.openers[i] = Some(open);
                }
            }
            self.parents[i] = stack.last().copied();
            if opens {
                self.regions[i] = Some(self.classify(i));
                stack.push(i);
            }
        }
    }

    fn classify(&self, open: usize) -> Region {
        if self.tokens[open].token != Token::LeftBrace {
            return Region::Expression;
        }
        if self.is_class_body(open) {
            return Region::Class;
        }
        let Some(prev) = open.checked_sub(1) else {
            return Region::Block;
        };
        match &self.tokens[prev].token {
            Token::Equal
            | Token::Comma
            | Token::LeftParen
            | Token::LeftBracket
            | Token::DotDotDot
            | Token::Operator
            | Token::Star
            | Token::Template => Region::Object,
            Token::Colon => match self.region(prev) {
                Region::Block if !self.is_conditional_colon(prev) => Region::Block,
                _ => Region::Object,
            },
            Token::Ident(word) if EXPRESSION_KEYWORDS.contains(&word.as_str()) => Region::Object,
            _ => Region::Block,
        }
    }

    /// `class Name extends Base {`: only names, dots and bracketed groups
    /// sit between `class` and the body.
    fn is_class_body(&self, open: usize) -> bool {
        let parent = self.parents[open];
        let mut j = open;
        while j > 0 {
            j -= 1;
            if self.parents[j] != parent {
                return false;
            }
            match &self.tokens[j].token {
                Token::Ident(word) if word == "class" => return true,
                Token::Ident(_) | Token::Dot => {}
                Token::RightParen | Token::RightBracket => {
                    if let Some(opener) = self.openers[j] {
                        j = opener;
                    }
                }
                _ => return false,
            }
        }
        false
    }

    /// Whether a `:` in statement position belongs to `a ? b : c` rather
    /// than to a `case` clause or a label.
    fn is_conditional_colon(&self, colon: usize) -> bool {
        let parent = self.parents[colon];
        let mut j = colon;
        while j > 0 {
            j -= 1;
            if self.parents[j] != parent {
                return false;
            }
            match &self.tokens[j].token {
                Token::Semicolon | Token::RightBrace => return false,
                Token::Ident(word) if word == "case" || word == "default" => return false,
                Token::Operator if self.text(j) == "?" => return true,
                _ => {}
            }
            if let Some(opener) = self.openers[j] {
                j = opener;
            }
        }
        false
    }

    /// Region the token at `i` sits in.
    fn region(&self, i: usize) -> Region {
        self.parents[i]
            .and_then(|open| self.regions[open])
            .unwrap_or(Region::Block)
    }

    fn collect_shadows(&mut self, imported: &FxHashSet<&str>) {
        let tokens = self.tokens;
        let parser = Parser::new(tokens);

        for (i, lexeme) in tokens.iter().enumerate() {
            match &lexeme.token {
                Token::Arrow => self.arrow_shadows(&parser, i, imported),
                Token::LeftParen => self.parameter_shadows(&parser, i, imported),
                Token::Ident(word) if !self.after_member(i) => match word.as_str() {
                    "var" | "let" | "const" => self.declaration_shadows(&parser, i, imported),
                    "function" => self.function_shadows(i, imported),
                    "class" => self.class_shadows(i, imported),
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn declaration_shadows(&mut self, parser: &Parser<'_>, k: usize, imported: &FxHashSet<&str>) {
        if !matches!(
            self.token(k + 1),
            Token::Ident(_) | Token::LeftBrace | Token::LeftBracket
        ) {
            return;
        }
        let Ok(names) = parser.parse_declarators(k + 1) else {
            return;
        };
        let range = if self.token(k).is_word("var") {
            self.enclosing_function(k)
        } else {
            self.enclosing_block(k)
        };
        if let Some(range) = range {
            self.shadow(names, imported, range);
        }
    }

    /// `function name(...) {...}`: a declaration scopes `name` to its block,
    /// an expression only to itself. Parameters are handled with every other
    /// parameter list.
    fn function_shadows(&mut self, k: usize, imported: &FxHashSet<&str>) {
        let mut name_at = k + 1;
        if self.token(name_at) == &Token::Star {
            name_at += 1;
        }
        let Some(name) = self.token(name_at).ident() else {
            return;
        };
        let Some(body_end) = self
            .closers
            .get(name_at + 1)
            .copied()
            .flatten()
            .filter(|close| self.token(close + 1) == &Token::LeftBrace)
            .and_then(|close| self.closers[close + 1])
        else {
            return;
        };

        let range = if self.is_declaration_start(k) {
            self.enclosing_block(k)
        } else {
            Some((name_at, body_end))
        };
        if let Some(range) = range {
            self.shadow(vec![name.to_string()], imported, range);
        }
    }

    fn class_shadows(&mut self, k: usize, imported: &FxHashSet<&str>) {
        let Some(name) = self.token(k + 1).ident().filter(|name| *name != "extends") else {
            return;
        };
        let parent = self.parents[k];
        let mut j = k + 2;
        while j < self.tokens.len() && self.parents[j] == parent {
            if self.tokens[j].token == Token::LeftBrace {
                break;
            }
            j = self.closers[j].map_or(j + 1, |close| close + 1);
        }
        let Some(body_end) = self.closers.get(j).copied().flatten() else {
            return;
        };

        let range = if self.is_declaration_start(k) {
            self.enclosing_block(k)
        } else {
            Some((k + 1, body_end))
        };
        if let Some(range) = range {
            self.shadow(vec![name.to_string()], imported, range);
        }
    }

    /// `(params) {` of functions, methods and `catch` clauses.
    fn parameter_shadows(&mut self, parser: &Parser<'_>, open: usize, imported: &FxHashSet<&str>) {
        let Some(close) = self.closers[open] else {
            return;
        };
        if self.token(close + 1) != &Token::LeftBrace {
            return;
        }
        if self
            .head_word(open)
            .is_some_and(|word| CONTROL_KEYWORDS.contains(&word))
        {
            return;
        }
        let Some(body_end) = self.closers[close + 1] else {
            return;
        };
        if let Ok(names) = parser.parse_parameters(open) {
            self.shadow(names, imported, (open, body_end));
        }
    }

    fn arrow_shadows(&mut self, parser: &Parser<'_>, arrow: usize, imported: &FxHashSet<&str>) {
        let Some(prev) = arrow.checked_sub(1) else {
            return;
        };
        let (start, names) = match &self.tokens[prev].token {
            Token::Ident(name) => (prev, vec![name.clone()]),
            Token::RightParen => {
                let Some(open) = self.openers[prev] else {
                    return;
                };
                let Ok(names) = parser.parse_parameters(open) else {
                    return;
                };
                (open, names)
            }
            _ => return,
        };
        let end = self.extent(arrow + 1);
        self.shadow(names, imported, (start, end));
    }

    fn shadow(&mut self, declared: Vec<String>, imported: &FxHashSet<&str>, range: (usize, usize)) {
        for name in declared {
            if imported.contains(name.as_str()) {
                self.shadows.entry(name).or_default().push(range);
            }
        }
    }

    fn is_shadowed(&self, name: &str, i: usize) -> bool {
        self.shadows
            .get(name)
            .is_some_and(|ranges| ranges.iter().any(|&(start, end)| start <= i && i <= end))
    }

    /// Range of the block scoping a `let`, `const` or `class` at `k`.
    /// `None` at the top level, where redeclaring an import is an error anyway.
    fn enclosing_block(&self, k: usize) -> Option<(usize, usize)> {
        let open = self.parents[k]?;
        let close = self.closers[open]?;
        match self.tokens[open].token {
            Token::LeftBrace => Some((open, close)),
            Token::LeftParen if self.is_for_head(open) => Some((open, self.extent(close + 1))),
            _ => None,
        }
    }

    /// Range of the function body scoping a `var` at `k`.
    fn enclosing_function(&self, k: usize) -> Option<(usize, usize)> {
        let mut open = self.parents[k];
        while let Some(current) = open {
            if self.is_function_body(current) {
                return Some((current, self.closers[current]?));
            }
            open = self.parents[current];
        }
        None
    }

    fn is_function_body(&self, open: usize) -> bool {
        if self.tokens[open].token != Token::LeftBrace || open == 0 {
            return false;
        }
        match self.tokens[open - 1].token {
            Token::Arrow => true,
            Token::RightParen => self.openers[open - 1].is_some_and(|params| {
                !self
                    .head_word(params)
                    .is_some_and(|word| CONTROL_KEYWORDS.contains(&word) || word == "catch")
            }),
            _ => false,
        }
    }

    fn is_for_head(&self, open: usize) -> bool {
        match self.head_word(open) {
            Some("for") => true,
            Some("await") => open >= 2 && self.tokens[open - 2].token.is_word("for"),
            _ => false,
        }
    }

    /// Whether the `function` or `class` keyword at `k` starts a statement.
    fn is_declaration_start(&self, k: usize) -> bool {
        let mut start = k;
        if start > 0 && self.tokens[start - 1].token.is_word("async") {
            start -= 1;
        }
        let Some(prev) = start.checked_sub(1) else {
            return true;
        };
        match &self.tokens[prev].token {
            Token::Semicolon | Token::LeftBrace | Token::RightBrace => true,
            Token::Ident(word) if word == "export" || word == "default" => true,
            Token::Ident(word) if EXPRESSION_KEYWORDS.contains(&word.as_str()) => false,
            Token::RightParen | Token::RightBracket | Token::Ident(_) | Token::Number
            | Token::Str(_) | Token::Template | Token::Regex => self.tokens[start].newline_before,
            _ => false,
        }
    }

    /// Last token of the statement or expression starting at `start`.
    fn extent(&self, start: usize) -> usize {
        if self.token(start) == &Token::LeftBrace {
            return self.closers[start].unwrap_or(start);
        }
        let Some(parent) = self.parents.get(start).copied() else {
            return start;
        };
        let mut end = start;
        let mut j = start;
        while j < self.tokens.len() {
            let lexeme = &self.tokens[j];
            if lexeme.token == Token::Eof
                || self.parents[j] != parent
                || matches!(lexeme.token, Token::Comma | Token::Semicolon)
            {
                break;
            }
            if j > start
                && lexeme.newline_before
                && lexeme
                    .token
                    .ident()
                    .is_some_and(|word| STATEMENT_KEYWORDS.contains(&word))
            {
                break;
            }
            end = self.closers[j].unwrap_or(j);
            j = end + 1;
        }
        end
    }

    /// Classify the identifier at `i` as a reference to an import, if it is one.
    fn reference(&self, i: usize, imported: &FxHashSet<&str>) -> Option<Reference> {
        let name = self.tokens[i].token.ident()?;
        if !imported.contains(name) || self.after_member(i) || self.is_shadowed(name, i) {
            return None;
        }
        let prev = i.checked_sub(1).map(|p| &self.tokens[p].token);
        let next = self.token(i + 1);
        if prev.is_some_and(|token| token.is_word("break") || token.is_word("continue")) {
            return None;
        }
        let after_modifier = prev.is_some_and(|token| {
            token == &Token::Star
                || token
                    .ident()
                    .is_some_and(|word| MEMBER_MODIFIERS.contains(&word))
        });

        match self.region(i) {
            Region::Object if matches!(prev, Some(Token::LeftBrace | Token::Comma)) => match next {
                Token::Colon | Token::LeftParen | Token::Equal => return None,
                Token::Comma | Token::RightBrace => {
                    return Some(Reference {
                        index: i,
                        kind: ReferenceKind::Shorthand,
                    })
                }
                _ => {}
            },
            Region::Object if after_modifier && next == &Token::LeftParen => return None,
            Region::Class if after_modifier || self.is_member_key(i) => return None,
            Region::Block
                if next == &Token::Colon
                    && matches!(
                        prev,
                        None | Some(Token::Semicolon | Token::LeftBrace | Token::RightBrace)
                    ) =>
            {
                return None
            }
            _ => {}
        }

        let kind = if next == &Token::LeftParen || self.is_tagged_template(i + 1) {
            ReferenceKind::Call
        } else {
            ReferenceKind::Read
        };
        Some(Reference { index: i, kind })
    }

    /// Whether an identifier directly inside a class body names a member.
    fn is_member_key(&self, i: usize) -> bool {
        let Some(prev) = i.checked_sub(1) else {
            return true;
        };
        match &self.tokens[prev].token {
            Token::LeftBrace | Token::Semicolon | Token::RightBrace => true,
            Token::Equal
            | Token::Operator
            | Token::Comma
            | Token::Colon
            | Token::Arrow
            | Token::DotDotDot => false,
            Token::Ident(word) if EXPRESSION_KEYWORDS.contains(&word.as_str()) => false,
            _ => self.tokens[i].newline_before,
        }
    }

    fn is_tagged_template(&self, i: usize) -> bool {
        self.token(i) == &Token::Template && self.text(i).starts_with('`')
    }

    fn after_member(&self, i: usize) -> bool {
        i > 0 && matches!(self.tokens[i - 1].token, Token::Dot | Token::QuestionDot)
    }

    /// Identifier right before the opener at `open`, e.g. `if` in `if (`.
    fn head_word(&self, open: usize) -> Option<&'p str> {
        let tokens = self.tokens;
        open.checked_sub(1).and_then(|prev| tokens[prev].token.ident())
    }

    fn token(&self, i: usize) -> &'p Token {
        let tokens = self.tokens;
        tokens.get(i).map_or(&Token::Eof, |lexeme| &lexeme.token)
    }

    fn text(&self, i: usize) -> &'p str {
        self.tokens[i].span.slice(self.source)
    }
}
