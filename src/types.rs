//! Type model for Mica
//!
//! Types are small values compared structurally. There is no inference:
//! every type is either written in an annotation, derived from a literal
//! kind, or computed by an operator's deriver.

use std::fmt;

/// A procedure type: ordered argument types and ordered return types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcType {
    pub args: Vec<Type>,
    pub rets: Vec<Type>,
}

/// The type of an expression or symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Type {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    /// Pointer-width opaque address.
    Ptr,
    Bool,
    /// No value.
    Void,
    /// Marks an expression yielding several values; legal only as the
    /// sole right-hand side of a multi-assignment or as a statement.
    MultiRet,
    /// Sentinel before checking.
    #[default]
    Invalid,
    Proc(ProcType),
}

impl Type {
    /// A procedure type from its argument and return lists.
    pub fn proc(args: Vec<Type>, rets: Vec<Type>) -> Self {
        Type::Proc(ProcType { args, rets })
    }

    /// The designated entry-point type: `proc` with no arguments and no
    /// returns.
    pub fn main_proc() -> Self {
        Type::proc(vec![], vec![])
    }

    // ============ Type Predicates ============

    /// Fixed-width integers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::I8
                | Type::I16
                | Type::I32
                | Type::I64
                | Type::U8
                | Type::U16
                | Type::U32
                | Type::U64
        )
    }

    /// Operand class for arithmetic and bitwise operators.
    pub fn is_number(&self) -> bool {
        self.is_numeric() || matches!(self, Type::Ptr)
    }

    /// Operand class for comparison operators.
    pub fn is_basic(&self) -> bool {
        self.is_number() || matches!(self, Type::Bool)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Type::Ptr)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_multi_ret(&self) -> bool {
        matches!(self, Type::MultiRet)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    pub fn is_proc(&self) -> bool {
        matches!(self, Type::Proc(_))
    }

    /// Byte width of a value of this type, as reported by `sizeof`.
    /// Procedure values are pointer-width.
    pub fn size_of(&self) -> u64 {
        match self {
            Type::I8 | Type::U8 | Type::Bool => 1,
            Type::I16 | Type::U16 => 2,
            Type::I32 | Type::U32 => 4,
            Type::I64 | Type::U64 | Type::Ptr | Type::Proc(_) => 8,
            Type::Void | Type::MultiRet | Type::Invalid => 0,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::Ptr => write!(f, "ptr"),
            Type::Bool => write!(f, "bool"),
            Type::Void => write!(f, "void"),
            Type::MultiRet => write!(f, "{{multiple values}}"),
            Type::Invalid => write!(f, "{{invalid}}"),
            Type::Proc(p) => {
                write!(f, "proc[")?;
                for (i, a) in p.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, "]")?;
                if !p.rets.is_empty() {
                    write!(f, " ")?;
                    for (i, r) in p.rets.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", r)?;
                    }
                }
                Ok(())
            }
        }
    }
}
