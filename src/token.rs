//! Lexical categories for Mica
//!
//! A single enumeration covers everything a tree node can be tagged
//! with: tokens produced by the lexer, and the grammatical kinds the
//! parser attaches to interior nodes (`Call`, `Block`, the list kinds).
//! The token patterns are declared with `logos`.

use logos::Logos;
use std::fmt;

/// All lexical kinds in Mica.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\n]+")] // Skip whitespace
#[logos(skip r"#[^\n]*")] // Skip line comments
pub enum LexKind {
    // ============ Literals ============
    /// Integer literal, default width: 42, 0xFF, 0b1010, 255g
    #[regex(r"(0x[0-9A-Fa-f]*|0b[01]*|[0-9][0-9]*)g?")]
    I64Lit,

    /// Integer literal with the `t` (short) suffix: 1024t
    #[regex(r"(0x[0-9A-Fa-f]*|0b[01]*|[0-9][0-9]*)t")]
    I16Lit,

    /// Integer literal with the `r` (char) suffix: 65r
    #[regex(r"(0x[0-9A-Fa-f]*|0b[01]*|[0-9][0-9]*)r")]
    I8Lit,

    /// Integer literal with the `p` (pointer) suffix: 0p
    #[regex(r"(0x[0-9A-Fa-f]*|0b[01]*|[0-9][0-9]*)p")]
    PtrLit,

    /// String literal: "hello\n"
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLit,

    /// Character literal: 'a', '\n'
    #[regex(r"'([^'\\]|\\.)*'")]
    CharLit,

    #[token("true")]
    True,
    #[token("false")]
    False,

    // ============ Keywords ============
    #[token("var")]
    Var,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("elseif")]
    ElseIf,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("proc")]
    Proc,
    #[token("memory")]
    Memory,
    #[token("begin")]
    Begin,
    #[token("end")]
    End,
    #[token("set")]
    Set,
    #[token("exit")]
    Exit,
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("export")]
    Export,
    #[token("sizeof")]
    SizeOf,

    // ============ Type keywords ============
    #[token("i8")]
    I8,
    #[token("i16")]
    I16,
    #[token("i32")]
    I32,
    #[token("i64")]
    I64,
    #[token("u8")]
    U8,
    #[token("u16")]
    U16,
    #[token("u32")]
    U32,
    #[token("u64")]
    U64,
    #[token("bool")]
    Bool,
    #[token("ptr")]
    Ptr,

    // ============ Operators ============
    #[token("+")]
    Plus,
    #[token("+=")]
    PlusAssign,
    #[token("-")]
    Minus,
    #[token("-=")]
    MinusAssign,
    #[token("*")]
    Multiplication,
    #[token("*=")]
    MultiplicationAssign,
    #[token("/")]
    Division,
    #[token("/=")]
    DivisionAssign,
    #[token("%")]
    Remainder,
    #[token("%=")]
    RemainderAssign,

    #[token("&")]
    BitAnd,
    #[token("|")]
    BitOr,
    #[token("^")]
    BitXor,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    /// Bitwise not, from `~`.
    #[token("~")]
    Neg,

    #[token(">")]
    More,
    #[token(">=")]
    MoreEq,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEq,
    #[token("!=")]
    Different,
    #[token("==")]
    Equals,
    #[token("=")]
    Assignment,

    // ============ Punctuation ============
    #[token("@")]
    At,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("::")]
    DoubleColon,

    // ============ Identifiers ============
    /// Identifier: foo, _bar, buf2
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    // ============ Special ============
    /// End of file
    Eof,

    // ============ Grammatical kinds ============
    // Produced by the parser for interior tree nodes, never by the lexer.
    /// Procedure call: children are the argument list and the callee.
    Call,
    /// Statement block.
    Block,
    /// Expression list (call arguments, assignees, right-hand sides).
    ExprList,
    /// Declaration list (procedure arguments or variables).
    DeclList,
    /// Type annotation list (procedure returns, procedure-type members).
    TypeList,
    /// Chain of `elseif` arms.
    ElseIfChain,
    /// Constant definition: children are the name and the literal.
    ConstDef,
}

impl LexKind {
    /// Check if this kind is a keyword.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            LexKind::Var
                | LexKind::True
                | LexKind::False
                | LexKind::And
                | LexKind::Or
                | LexKind::Not
                | LexKind::If
                | LexKind::Else
                | LexKind::ElseIf
                | LexKind::While
                | LexKind::Return
                | LexKind::Proc
                | LexKind::Memory
                | LexKind::Begin
                | LexKind::End
                | LexKind::Set
                | LexKind::Exit
                | LexKind::Import
                | LexKind::From
                | LexKind::Export
                | LexKind::SizeOf
                | LexKind::I8
                | LexKind::I16
                | LexKind::I32
                | LexKind::I64
                | LexKind::U8
                | LexKind::U16
                | LexKind::U32
                | LexKind::U64
                | LexKind::Bool
                | LexKind::Ptr
        )
    }

    /// Check if this kind is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            LexKind::I64Lit
                | LexKind::I16Lit
                | LexKind::I8Lit
                | LexKind::PtrLit
                | LexKind::StringLit
                | LexKind::CharLit
                | LexKind::True
                | LexKind::False
        )
    }

    /// Check if this kind is an integer literal (value populated at lex time).
    pub fn is_int_literal(&self) -> bool {
        matches!(
            self,
            LexKind::I64Lit | LexKind::I16Lit | LexKind::I8Lit | LexKind::PtrLit
        )
    }

    /// Check if this kind names a type in annotation position.
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            LexKind::I8
                | LexKind::I16
                | LexKind::I32
                | LexKind::I64
                | LexKind::U8
                | LexKind::U16
                | LexKind::U32
                | LexKind::U64
                | LexKind::Bool
                | LexKind::Ptr
        )
    }

    /// Check if this kind is a binary or unary operator.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            LexKind::Plus
                | LexKind::Minus
                | LexKind::Multiplication
                | LexKind::Division
                | LexKind::Remainder
                | LexKind::BitAnd
                | LexKind::BitOr
                | LexKind::BitXor
                | LexKind::ShiftLeft
                | LexKind::ShiftRight
                | LexKind::Neg
                | LexKind::Equals
                | LexKind::Different
                | LexKind::More
                | LexKind::MoreEq
                | LexKind::Less
                | LexKind::LessEq
                | LexKind::And
                | LexKind::Or
                | LexKind::Not
        )
    }

    /// Check if this kind is a compound assignment operator.
    pub fn is_compound_assign(&self) -> bool {
        matches!(
            self,
            LexKind::PlusAssign
                | LexKind::MinusAssign
                | LexKind::MultiplicationAssign
                | LexKind::DivisionAssign
                | LexKind::RemainderAssign
        )
    }
}

impl fmt::Display for LexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LexKind::I64Lit => "integer literal",
            LexKind::I16Lit => "i16 literal",
            LexKind::I8Lit => "i8 literal",
            LexKind::PtrLit => "pointer literal",
            LexKind::StringLit => "string literal",
            LexKind::CharLit => "character literal",
            LexKind::True => "true",
            LexKind::False => "false",
            LexKind::Var => "var",
            LexKind::And => "and",
            LexKind::Or => "or",
            LexKind::Not => "not",
            LexKind::If => "if",
            LexKind::Else => "else",
            LexKind::ElseIf => "elseif",
            LexKind::While => "while",
            LexKind::Return => "return",
            LexKind::Proc => "proc",
            LexKind::Memory => "memory",
            LexKind::Begin => "begin",
            LexKind::End => "end",
            LexKind::Set => "set",
            LexKind::Exit => "exit",
            LexKind::Import => "import",
            LexKind::From => "from",
            LexKind::Export => "export",
            LexKind::SizeOf => "sizeof",
            LexKind::I8 => "i8",
            LexKind::I16 => "i16",
            LexKind::I32 => "i32",
            LexKind::I64 => "i64",
            LexKind::U8 => "u8",
            LexKind::U16 => "u16",
            LexKind::U32 => "u32",
            LexKind::U64 => "u64",
            LexKind::Bool => "bool",
            LexKind::Ptr => "ptr",
            LexKind::Plus => "+",
            LexKind::PlusAssign => "+=",
            LexKind::Minus => "-",
            LexKind::MinusAssign => "-=",
            LexKind::Multiplication => "*",
            LexKind::MultiplicationAssign => "*=",
            LexKind::Division => "/",
            LexKind::DivisionAssign => "/=",
            LexKind::Remainder => "%",
            LexKind::RemainderAssign => "%=",
            LexKind::BitAnd => "&",
            LexKind::BitOr => "|",
            LexKind::BitXor => "^",
            LexKind::ShiftLeft => "<<",
            LexKind::ShiftRight => ">>",
            LexKind::Neg => "~",
            LexKind::More => ">",
            LexKind::MoreEq => ">=",
            LexKind::Less => "<",
            LexKind::LessEq => "<=",
            LexKind::Different => "!=",
            LexKind::Equals => "==",
            LexKind::Assignment => "=",
            LexKind::At => "@",
            LexKind::LeftParen => "(",
            LexKind::RightParen => ")",
            LexKind::LeftBrace => "{",
            LexKind::RightBrace => "}",
            LexKind::LeftBracket => "[",
            LexKind::RightBracket => "]",
            LexKind::Comma => ",",
            LexKind::Semicolon => ";",
            LexKind::Dot => ".",
            LexKind::Colon => ":",
            LexKind::DoubleColon => "::",
            LexKind::Identifier => "identifier",
            LexKind::Eof => "end of file",
            LexKind::Call => "call",
            LexKind::Block => "block",
            LexKind::ExprList => "expression list",
            LexKind::DeclList => "declaration list",
            LexKind::TypeList => "type list",
            LexKind::ElseIfChain => "elseif chain",
            LexKind::ConstDef => "constant definition",
        };
        write!(f, "{}", s)
    }
}
