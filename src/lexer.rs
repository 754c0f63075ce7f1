//! Lexer for Mica
//!
//! Converts source text into a stream of token nodes. The token
//! patterns live on [`LexKind`] and are compiled by `logos`; this
//! module supplies the stateful surface the parser consumes: a current
//! token, one token of lookahead, line/column tracking, and decoded
//! values for numeric and character literals.
//!
//! Spaces, tabs, newlines, and `#`-to-end-of-line comments are skipped
//! between tokens. At input exhaustion the lexer yields an EOF token
//! indefinitely.

use crate::ast::Node;
use crate::error::{CheckResult, CompileError};
use crate::span::{Position, Range, SourceLocation};
use crate::token::LexKind;
use logos::Logos;

/// The streaming lexer.
pub struct Lexer<'s> {
    file: String,
    source: &'s str,
    inner: logos::Lexer<'s, LexKind>,
    current: Option<Node<'s>>,
    peeked: Option<Node<'s>>,
    /// Byte offset up to which `pos` is accurate.
    cursor: usize,
    pos: Position,
}

impl<'s> Lexer<'s> {
    /// Create a lexer over the full contents of one file.
    pub fn new(file: impl Into<String>, source: &'s str) -> Self {
        Self {
            file: file.into(),
            source,
            inner: LexKind::lexer(source),
            current: None,
            peeked: None,
            cursor: 0,
            pos: Position::default(),
        }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    /// The current token, installed by the last call to [`Lexer::next`].
    pub fn current(&self) -> Option<&Node<'s>> {
        self.current.as_ref()
    }

    /// The source range of the current token window.
    pub fn range(&self) -> Range {
        self.current.as_ref().map(|n| n.range).unwrap_or_default()
    }

    /// File and range of the current token window.
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.file.clone(), self.range())
    }

    /// Advance, installing a new current token. Returns a previously
    /// peeked token first.
    pub fn next(&mut self) -> CheckResult<()> {
        if let Some(p) = self.peeked.take() {
            self.current = Some(p);
            return Ok(());
        }
        let node = self.scan()?;
        self.current = Some(node);
        Ok(())
    }

    /// Look one token ahead without consuming it. At most one token of
    /// lookahead is kept; repeated peeks return the same token.
    pub fn peek(&mut self) -> CheckResult<&Node<'s>> {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan()?);
        }
        match self.peeked {
            Some(ref node) => Ok(node),
            None => Err(CompileError::internal(
                self.location(),
                "lookahead vanished",
            )),
        }
    }

    /// Drain the input, returning every token before EOF.
    pub fn read_all(&mut self) -> CheckResult<Vec<Node<'s>>> {
        let mut output = Vec::new();
        loop {
            self.next()?;
            match self.current.as_ref() {
                Some(word) if word.kind == LexKind::Eof => return Ok(output),
                Some(word) => output.push(word.clone()),
                None => return Ok(output),
            }
        }
    }

    fn scan(&mut self) -> CheckResult<Node<'s>> {
        match self.inner.next() {
            Some(Ok(kind)) => {
                let span = self.inner.span();
                let begin = self.advance_to(span.start);
                let end = self.advance_to(span.end);
                let range = Range::new(begin, end);
                let text = &self.source[span];
                self.make_node(kind, text, range)
            }
            Some(Err(())) => {
                let span = self.inner.span();
                let begin = self.advance_to(span.start);
                let end = self.advance_to(span.end);
                let text = &self.source[span];
                let loc = SourceLocation::new(self.file.clone(), Range::new(begin, end));
                Err(CompileError::invalid_symbol(loc, text))
            }
            None => {
                let begin = self.advance_to(self.source.len());
                let range = Range::new(begin, begin);
                Ok(Node::token(LexKind::Eof, "", range))
            }
        }
    }

    fn make_node(&self, kind: LexKind, text: &'s str, range: Range) -> CheckResult<Node<'s>> {
        let loc = || SourceLocation::new(self.file.clone(), range);
        if kind.is_int_literal() {
            let value = parse_int(text).ok_or_else(|| CompileError::value_out_of_bounds(loc(), text))?;
            return Ok(Node::literal(kind, text, value, range));
        }
        if kind == LexKind::CharLit {
            let inner = &text[1..text.len() - 1];
            let value =
                decode_char(inner).ok_or_else(|| CompileError::invalid_symbol(loc(), text))?;
            return Ok(Node::literal(kind, text, value, range));
        }
        Ok(Node::token(kind, text, range))
    }

    /// Walk the character stream from the cursor to `target`, keeping
    /// line/column bookkeeping in step.
    fn advance_to(&mut self, target: usize) -> Position {
        for c in self.source[self.cursor..target].chars() {
            if c == '\n' {
                self.pos.line += 1;
                self.pos.column = 0;
            } else {
                self.pos.column += 1;
            }
        }
        self.cursor = target;
        self.pos
    }
}

/// Whether `s` lexes to exactly one identifier token.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut lexer = Lexer::new("", s);
    match lexer.read_all() {
        Ok(tokens) => tokens.len() == 1 && tokens[0].kind == LexKind::Identifier,
        Err(_) => false,
    }
}

/// Decode an integer literal: optional base prefix (`0x`, `0b`),
/// digit run, optional width suffix. Returns `None` when the value does
/// not fit in 64 bits.
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let digits = text.strip_suffix(['p', 'r', 't', 'g']).unwrap_or(text);
    let (base, digits) = if let Some(rest) = digits.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, digits)
    };
    if digits.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(digits, base).ok().map(|v| v as i64)
}

/// Decode the inside of a character literal: a single scalar, or a
/// two-character escape.
fn decode_char(inner: &str) -> Option<i64> {
    let mut chars = inner.chars();
    let first = chars.next()?;
    let second = chars.next();
    if chars.next().is_some() {
        return None;
    }
    match (first, second) {
        (c, None) => Some(c as i64),
        ('\\', Some('n')) => Some('\n' as i64),
        ('\\', Some('t')) => Some('\t' as i64),
        ('\\', Some('r')) => Some('\r' as i64),
        ('\\', Some('\'')) => Some('\'' as i64),
        ('\\', Some('"')) => Some('"' as i64),
        ('\\', Some('\\')) => Some('\\' as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<LexKind> {
        let mut lexer = Lexer::new("test.mi", source);
        lexer
            .read_all()
            .expect("lexes")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn single(source: &str) -> Node<'_> {
        let mut lexer = Lexer::new("test.mi", source);
        let tokens = lexer.read_all().expect("lexes");
        assert_eq!(tokens.len(), 1, "expected one token in {:?}", source);
        tokens.into_iter().next().expect("one token")
    }

    fn fails(source: &str) -> CompileError {
        let mut lexer = Lexer::new("test.mi", source);
        lexer.read_all().expect_err("should not lex")
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![]);
        assert_eq!(kinds("   \t\n  "), vec![]);
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut lexer = Lexer::new("test.mi", "x");
        lexer.next().expect("identifier");
        for _ in 0..3 {
            lexer.next().expect("eof");
            assert_eq!(lexer.current().expect("current").kind, LexKind::Eof);
        }
    }

    #[test]
    fn test_peek_then_next() {
        let mut lexer = Lexer::new("test.mi", "proc main");
        let peeked = lexer.peek().expect("peek").clone();
        assert_eq!(peeked.kind, LexKind::Proc);
        // Repeated peeks keep returning the same token.
        assert_eq!(lexer.peek().expect("peek").kind, LexKind::Proc);
        lexer.next().expect("next");
        assert_eq!(lexer.current(), Some(&peeked));
        lexer.next().expect("next");
        assert_eq!(lexer.current().expect("current").text, "main");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("var true false and or not if else elseif while return"),
            vec![
                LexKind::Var,
                LexKind::True,
                LexKind::False,
                LexKind::And,
                LexKind::Or,
                LexKind::Not,
                LexKind::If,
                LexKind::Else,
                LexKind::ElseIf,
                LexKind::While,
                LexKind::Return,
            ]
        );
        assert_eq!(
            kinds("proc memory begin end set exit import from export sizeof"),
            vec![
                LexKind::Proc,
                LexKind::Memory,
                LexKind::Begin,
                LexKind::End,
                LexKind::Set,
                LexKind::Exit,
                LexKind::Import,
                LexKind::From,
                LexKind::Export,
                LexKind::SizeOf,
            ]
        );
        assert_eq!(
            kinds("i8 i16 i32 i64 u8 u16 u32 u64 bool ptr"),
            vec![
                LexKind::I8,
                LexKind::I16,
                LexKind::I32,
                LexKind::I64,
                LexKind::U8,
                LexKind::U16,
                LexKind::U32,
                LexKind::U64,
                LexKind::Bool,
                LexKind::Ptr,
            ]
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            kinds("foo _bar buf2 iffy variant"),
            vec![LexKind::Identifier; 5]
        );
    }

    #[test]
    fn test_punctuators() {
        assert_eq!(
            kinds("+ += - -= * *= / /= % %="),
            vec![
                LexKind::Plus,
                LexKind::PlusAssign,
                LexKind::Minus,
                LexKind::MinusAssign,
                LexKind::Multiplication,
                LexKind::MultiplicationAssign,
                LexKind::Division,
                LexKind::DivisionAssign,
                LexKind::Remainder,
                LexKind::RemainderAssign,
            ]
        );
        assert_eq!(
            kinds("@ ~ ( ) { } [ ] , ; ."),
            vec![
                LexKind::At,
                LexKind::Neg,
                LexKind::LeftParen,
                LexKind::RightParen,
                LexKind::LeftBrace,
                LexKind::RightBrace,
                LexKind::LeftBracket,
                LexKind::RightBracket,
                LexKind::Comma,
                LexKind::Semicolon,
                LexKind::Dot,
            ]
        );
        assert_eq!(
            kinds(": :: > >= < <= != == = & | ^ << >>"),
            vec![
                LexKind::Colon,
                LexKind::DoubleColon,
                LexKind::More,
                LexKind::MoreEq,
                LexKind::Less,
                LexKind::LessEq,
                LexKind::Different,
                LexKind::Equals,
                LexKind::Assignment,
                LexKind::BitAnd,
                LexKind::BitOr,
                LexKind::BitXor,
                LexKind::ShiftLeft,
                LexKind::ShiftRight,
            ]
        );
    }

    #[test]
    fn test_bare_bang_is_an_error() {
        let err = fails("a ! b");
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidSymbol);
        assert_eq!(kinds("a != b").len(), 3);
    }

    #[test]
    fn test_decimal_literals() {
        let n = single("42");
        assert_eq!(n.kind, LexKind::I64Lit);
        assert_eq!(n.value, Some(42));
        assert_eq!(single("0").value, Some(0));
        // Largest value the round-trip property promises.
        assert_eq!(single("9223372036854775807").value, Some(i64::MAX));
    }

    #[test]
    fn test_literal_suffixes() {
        let n = single("65r");
        assert_eq!(n.kind, LexKind::I8Lit);
        assert_eq!(n.value, Some(65));

        let n = single("1024t");
        assert_eq!(n.kind, LexKind::I16Lit);
        assert_eq!(n.value, Some(1024));

        let n = single("7g");
        assert_eq!(n.kind, LexKind::I64Lit);
        assert_eq!(n.value, Some(7));

        let n = single("0p");
        assert_eq!(n.kind, LexKind::PtrLit);
        assert_eq!(n.value, Some(0));
    }

    #[test]
    fn test_hex_and_binary_literals() {
        // `0xFFg` is an i64 literal with value 255.
        let n = single("0xFFg");
        assert_eq!(n.kind, LexKind::I64Lit);
        assert_eq!(n.value, Some(255));

        assert_eq!(single("0x10").value, Some(16));
        assert_eq!(single("0b1010").value, Some(10));
        let n = single("0b11r");
        assert_eq!(n.kind, LexKind::I8Lit);
        assert_eq!(n.value, Some(3));
    }

    #[test]
    fn test_oversized_literal() {
        let err = fails("99999999999999999999999999");
        assert_eq!(err.kind, crate::error::ErrorKind::ValueOutOfBounds);
    }

    #[test]
    fn test_string_literals() {
        let n = single(r#""hello""#);
        assert_eq!(n.kind, LexKind::StringLit);
        assert_eq!(n.text, r#""hello""#);
        assert_eq!(n.value, None);

        let n = single(r#""say \"hi\"\n""#);
        assert_eq!(n.kind, LexKind::StringLit);
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(single("'a'").value, Some('a' as i64));
        assert_eq!(single(r"'\n'").value, Some('\n' as i64));
        assert_eq!(single(r"'\t'").value, Some('\t' as i64));
        assert_eq!(single(r"'\r'").value, Some('\r' as i64));
        assert_eq!(single(r"'\''").value, Some('\'' as i64));
        assert_eq!(single(r#"'\"'"#).value, Some('"' as i64));
        assert_eq!(single(r"'\\'").value, Some('\\' as i64));
    }

    #[test]
    fn test_malformed_char_literal() {
        let err = fails("'ab'");
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidSymbol);
        let err = fails(r"'\z'");
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidSymbol);
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("set x # trailing words = 1\nset"),
            vec![LexKind::Set, LexKind::Identifier, LexKind::Set]
        );
        assert_eq!(kinds("# only a comment"), vec![]);
    }

    #[test]
    fn test_position_tracking() {
        let mut lexer = Lexer::new("test.mi", "proc main\n  begin");
        lexer.next().expect("proc");
        let r = lexer.range();
        assert_eq!((r.begin.line, r.begin.column), (0, 0));
        assert_eq!((r.end.line, r.end.column), (0, 4));

        lexer.next().expect("main");
        let r = lexer.range();
        assert_eq!((r.begin.line, r.begin.column), (0, 5));

        lexer.next().expect("begin");
        let r = lexer.range();
        assert_eq!((r.begin.line, r.begin.column), (1, 2));
        assert_eq!((r.end.line, r.end.column), (1, 7));
    }

    #[test]
    fn test_token_slices_rebuild_source() {
        // Concatenating every token's slice gives back the source minus
        // whitespace and comments.
        let source = "proc main begin # c\n set x = 0xFFg + 'a' end";
        let mut lexer = Lexer::new("test.mi", source);
        let rebuilt: String = lexer
            .read_all()
            .expect("lexes")
            .iter()
            .map(|t| t.text)
            .collect();
        let stripped: String = source
            .lines()
            .map(|l| l.split('#').next().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("")
            .split_whitespace()
            .collect();
        assert_eq!(rebuilt, stripped);
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("foo"));
        assert!(is_valid_identifier("_f2"));
        assert!(!is_valid_identifier("proc"));
        assert!(!is_valid_identifier("two words"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_statement_stream() {
        let source = "set x, y = f(a, 1)";
        assert_eq!(
            kinds(source),
            vec![
                LexKind::Set,
                LexKind::Identifier,
                LexKind::Comma,
                LexKind::Identifier,
                LexKind::Assignment,
                LexKind::Identifier,
                LexKind::LeftParen,
                LexKind::Identifier,
                LexKind::Comma,
                LexKind::I64Lit,
                LexKind::RightParen,
            ]
        );
    }
}
