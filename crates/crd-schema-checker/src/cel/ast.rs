//! The parsed form of a CEL expression.

use std::fmt::Display;

/// An expression node with the byte offset of the token it starts at.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub offset: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// Returns the direct sub-expressions of this node.
    pub fn children(&self) -> Vec<&Self> {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) => Vec::new(),
            ExprKind::Select { operand, .. }
            | ExprKind::Has { operand, .. }
            | ExprKind::Unary { operand, .. } => vec![&**operand],
            ExprKind::Index { operand, index, .. } => vec![&**operand, &**index],
            ExprKind::Call { target, args, .. } => {
                target.as_deref().into_iter().chain(args).collect()
            }
            ExprKind::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => vec![&**condition, &**then, &**otherwise],
            ExprKind::List(items) => items.iter().collect(),
            ExprKind::Map(entries) => entries
                .iter()
                .flat_map(|(key, value)| [key, value])
                .collect(),
            ExprKind::Comprehension {
                range,
                step,
                transform,
                ..
            } => [range, step]
                .into_iter()
                .map(|expr| &**expr)
                .chain(transform.as_deref())
                .collect(),
        }
    }

    /// Returns the number of nodes on the longest path from this node to a
    /// leaf. Runs without recursion so arbitrarily deep trees can be measured.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut pending = vec![(self, 1)];

        while let Some((expr, depth)) = pending.pop() {
            max_depth = max_depth.max(depth);
            pending.extend(expr.children().into_iter().map(|child| (child, depth + 1)));
        }

        max_depth
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),

    /// `operand.field`, or `operand.?field` if `optional` is set.
    Select {
        operand: Box<Expr>,
        field: String,
        optional: bool,
    },

    /// `has(operand.field)`
    Has { operand: Box<Expr>, field: String },

    /// `operand[index]`, or `operand[?index]` if `optional` is set.
    Index {
        operand: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },

    /// A global (`size(x)`) or receiver-style (`x.size()`) call.
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },

    Unary { op: UnaryOp, operand: Box<Expr> },

    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),

    /// An expanded comprehension macro such as `range.all(variable, step)`.
    ///
    /// `step` is the predicate for every macro except [`Macro::Map`], where it
    /// is the transform. For [`Macro::MapFilter`] (`range.map(x, filter,
    /// transform)`), `step` is the filter and `transform` the transform.
    Comprehension {
        kind: Macro,
        range: Box<Expr>,
        variable: String,
        step: Box<Expr>,
        transform: Option<Box<Expr>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    In,
    And,
    Or,
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Add => "_+_",
            Self::Subtract => "_-_",
            Self::Multiply => "_*_",
            Self::Divide => "_/_",
            Self::Modulo => "_%_",
            Self::Equals => "_==_",
            Self::NotEquals => "_!=_",
            Self::Less => "_<_",
            Self::LessEquals => "_<=_",
            Self::Greater => "_>_",
            Self::GreaterEquals => "_>=_",
            Self::In => "@in",
            Self::And => "_&&_",
            Self::Or => "_||_",
        };
        f.write_str(name)
    }
}

/// The comprehension macros supported by CEL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Macro {
    All,
    Exists,
    ExistsOne,
    Map,
    MapFilter,
    Filter,
}

impl Macro {
    /// Returns the macro invoked as `range.<name>(...)` with `arg_count`
    /// arguments, if any.
    pub fn from_call(name: &str, arg_count: usize) -> Option<Self> {
        match (name, arg_count) {
            ("all", 2) => Some(Self::All),
            ("exists", 2) => Some(Self::Exists),
            ("exists_one", 2) => Some(Self::ExistsOne),
            ("map", 2) => Some(Self::Map),
            ("map", 3) => Some(Self::MapFilter),
            ("filter", 2) => Some(Self::Filter),
            _ => None,
        }
    }
}

impl Display for Macro {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Exists => "exists",
            Self::ExistsOne => "exists_one",
            Self::Map | Self::MapFilter => "map",
            Self::Filter => "filter",
        };
        f.write_str(name)
    }
}
