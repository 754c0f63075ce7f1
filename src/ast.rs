//! Syntax tree nodes
//!
//! A single node type serves both raw tokens and tree interior nodes.
//! The lexer emits leaf nodes; the parser (an external collaborator)
//! assembles them into trees whose interior nodes reuse [`LexKind`] for
//! grammatical categories. The type checker writes a [`Type`] onto every
//! expression node in place.
//!
//! Children occupy fixed positions and may be vacant (`None`): a
//! procedure declaration, for example, always has five slots — name,
//! argument list, return list, variable list, body — with absent lists
//! left empty.

use crate::span::Range;
use crate::token::LexKind;
use crate::types::Type;
use std::fmt;

/// A token or tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<'s> {
    /// Lexical or grammatical category.
    pub kind: LexKind,
    /// The source slice this node was read from (empty for interior nodes).
    pub text: &'s str,
    /// Value of numeric and character literals, populated at lex time.
    pub value: Option<i64>,
    /// Source range covered by this node.
    pub range: Range,
    /// Ordered children; fixed-position slots may be vacant.
    pub children: Vec<Option<Node<'s>>>,
    /// The node's type, written by the checker. `Type::Invalid` before.
    pub ty: Type,
}

impl<'s> Node<'s> {
    /// A leaf node as produced by the lexer.
    pub fn token(kind: LexKind, text: &'s str, range: Range) -> Self {
        Self {
            kind,
            text,
            value: None,
            range,
            children: Vec::new(),
            ty: Type::Invalid,
        }
    }

    /// A literal leaf carrying its decoded value.
    pub fn literal(kind: LexKind, text: &'s str, value: i64, range: Range) -> Self {
        Self {
            value: Some(value),
            ..Self::token(kind, text, range)
        }
    }

    /// An interior node over the given child slots.
    pub fn tree(kind: LexKind, children: Vec<Option<Node<'s>>>) -> Self {
        let range = children
            .iter()
            .flatten()
            .map(|c| c.range)
            .reduce(Range::merge)
            .unwrap_or_default();
        Self {
            kind,
            text: "",
            value: None,
            range,
            children,
            ty: Type::Invalid,
        }
    }

    /// The child in slot `i`, if the slot exists and is occupied.
    pub fn child(&self, i: usize) -> Option<&Node<'s>> {
        self.children.get(i).and_then(|c| c.as_ref())
    }

    /// Mutable access to the child in slot `i`.
    pub fn child_mut(&mut self, i: usize) -> Option<&mut Node<'s>> {
        self.children.get_mut(i).and_then(|c| c.as_mut())
    }

    /// The child in slot `i`. Panics if the slot is vacant: a missing
    /// required child is an impossible tree shape, i.e. a parser bug.
    pub fn expect_child(&self, i: usize) -> &Node<'s> {
        match self.child(i) {
            Some(c) => c,
            None => panic!("malformed {} node: missing child {}", self.kind, i),
        }
    }

    /// Mutable variant of [`Node::expect_child`].
    pub fn expect_child_mut(&mut self, i: usize) -> &mut Node<'s> {
        let kind = self.kind;
        match self.child_mut(i) {
            Some(c) => c,
            None => panic!("malformed {} node: missing child {}", kind, i),
        }
    }

    /// Iterate over the occupied child slots.
    pub fn occupied(&self) -> impl Iterator<Item = &Node<'s>> {
        self.children.iter().flatten()
    }

    /// Number of occupied child slots.
    pub fn arity(&self) -> usize {
        self.children.iter().flatten().count()
    }
}

impl fmt::Display for Node<'_> {
    /// S-expression rendering, for debugging and test failure output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.children.is_empty() {
            if self.text.is_empty() {
                write!(f, "{}", self.kind)
            } else {
                write!(f, "{}", self.text)
            }
        } else {
            write!(f, "({}", self.kind)?;
            for child in &self.children {
                match child {
                    Some(c) => write!(f, " {}", c)?,
                    None => write!(f, " _")?,
                }
            }
            write!(f, ")")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_range_covers_children() {
        use crate::span::Position;
        let a = Node::token(
            LexKind::Identifier,
            "a",
            Range::new(Position::new(0, 0), Position::new(0, 1)),
        );
        let b = Node::token(
            LexKind::I64Lit,
            "1",
            Range::new(Position::new(0, 4), Position::new(0, 5)),
        );
        let n = Node::tree(LexKind::Plus, vec![Some(a), Some(b)]);
        assert_eq!(n.range.begin, Position::new(0, 0));
        assert_eq!(n.range.end, Position::new(0, 5));
    }

    #[test]
    fn test_display_marks_vacant_slots() {
        let name = Node::token(LexKind::Identifier, "p", Range::default());
        let body = Node::tree(LexKind::Block, vec![]);
        let n = Node::tree(
            LexKind::Proc,
            vec![Some(name), None, None, None, Some(body)],
        );
        assert_eq!(n.to_string(), "(proc p _ _ _ block)");
    }

    #[test]
    #[should_panic(expected = "missing child")]
    fn test_expect_child_panics_on_vacant_slot() {
        let n = Node::tree(LexKind::Proc, vec![None]);
        n.expect_child(0);
    }
}
