//! Reduced expression tree that the pattern matcher runs over.
//!
//! This is deliberately not a general-purpose C AST: it is a closed
//! tagged-variant view carrying only the node kinds and fields the checks
//! need (binary operators, calls, literals, casts, `sizeof`, conditionals,
//! synthesized boolean conversions). The host parser's full tree is lowered
//! into this view by [`crate::lower`]; anything the checks never inspect
//! becomes an [`ExprKind::Opaque`] node whose children are still traversed.
//!
//! Nodes are immutable once lowered and owned by the [`ExprArena`]. Checks
//! hold [`ExprId`] indices only for the duration of one analysis pass.

use num_bigint::BigInt;

use crate::source::{SourceFile, Span};

/// Index of an expression node inside its [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Binary operators the matcher and the constant evaluator understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

/// Unary operators the constant evaluator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    BitNot,
    /// Logical `!`; its operand is always wrapped in a boolean conversion.
    Not,
}

/// The operand of a `sizeof` expression: a spelled type name or a value
/// expression. The distinction drives the allocation check's replacement
/// text (`g_new(T, ...)` vs `g_new(typeof(expr), ...)`).
#[derive(Debug, Clone, PartialEq)]
pub enum SizeofArg {
    Type(String),
    Expr(ExprId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal with its evaluated value.
    IntLiteral { value: BigInt },
    /// Plain identifier reference. Kept as a leaf so callee names and
    /// operand text remain addressable.
    Identifier { name: String },
    Binary {
        op: BinaryOp,
        /// Span of the operator token itself (diagnostic anchor).
        op_span: Span,
        /// True when the operator token was produced by macro expansion.
        /// Such operators are never rewritten.
        op_from_macro: bool,
        lhs: ExprId,
        rhs: ExprId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    Sizeof {
        arg: SizeofArg,
    },
    /// Explicit C cast `(T)expr`.
    Cast {
        /// Spelled type, e.g. `GHashTable *`.
        type_name: String,
        /// Span of the parenthesized type, `(` through `)` inclusive, so a
        /// redundant cast can be deleted with a single edit.
        type_span: Span,
        operand: ExprId,
    },
    /// Implicit conversion to boolean, synthesized at boolean contexts
    /// (`if`/`while`/ternary conditions, operands of `&&`/`||`/`!`,
    /// initializers of bool-typed declarations).
    BoolConversion { operand: ExprId },
    Conditional {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
    /// Redundant grouping parentheses.
    Paren { inner: ExprId },
    /// Any construct the checks never inspect directly. Children are still
    /// visited during traversal so nested expressions are not lost.
    Opaque { children: Vec<ExprId> },
}

/// One node of the reduced tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Any part of this node's tokens originates from macro expansion.
    pub from_macro: bool,
    /// The node's tokens span more than one physical file.
    pub multi_file: bool,
    /// The node's value depends on template/generic instantiation
    /// parameters and is not yet concrete. Never set by the C front-end;
    /// other host adapters may set it.
    pub value_dependent: bool,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            from_macro: false,
            multi_file: false,
            value_dependent: false,
        }
    }
}

/// Arena owning every expression node of one translation unit, in the order
/// they were lowered (parents before children, i.e. preorder).
#[derive(Debug, Default)]
pub struct ExprArena {
    nodes: Vec<Expr>,
    roots: Vec<ExprId>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(expr);
        id
    }

    pub fn push_root(&mut self, id: ExprId) {
        self.roots.push(id);
    }

    pub fn roots(&self) -> &[ExprId] {
        &self.roots
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child node ids of `id`, in source order.
    pub fn children(&self, id: ExprId) -> Vec<ExprId> {
        match &self.get(id).kind {
            ExprKind::IntLiteral { .. } | ExprKind::Identifier { .. } => vec![],
            ExprKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            ExprKind::Unary { operand, .. } => vec![*operand],
            ExprKind::Call { callee, args } => {
                let mut out = vec![*callee];
                out.extend(args.iter().copied());
                out
            }
            ExprKind::Sizeof { arg } => match arg {
                SizeofArg::Type(_) => vec![],
                SizeofArg::Expr(e) => vec![*e],
            },
            ExprKind::Cast { operand, .. } => vec![*operand],
            ExprKind::BoolConversion { operand } => vec![*operand],
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => vec![*cond, *then_expr, *else_expr],
            ExprKind::Paren { inner } => vec![*inner],
            ExprKind::Opaque { children } => children.clone(),
        }
    }

    /// Skip redundant grouping and implicit-conversion wrappers, yielding
    /// the first structurally interesting node. This is the "ignoring
    /// parentheses and implicit casts" step every operand edge applies.
    pub fn skip_trivia(&self, mut id: ExprId) -> ExprId {
        loop {
            match &self.get(id).kind {
                ExprKind::Paren { inner } => id = *inner,
                ExprKind::BoolConversion { operand } => id = *operand,
                _ => return id,
            }
        }
    }

    /// Skip only grouping parentheses, keeping conversions.
    pub fn skip_parens(&self, mut id: ExprId) -> ExprId {
        while let ExprKind::Paren { inner } = &self.get(id).kind {
            id = *inner;
        }
        id
    }

    /// The callee name of a call node, when the callee (ignoring trivia) is
    /// a plain identifier.
    pub fn callee_name(&self, id: ExprId) -> Option<&str> {
        match &self.get(id).kind {
            ExprKind::Call { callee, .. } => match &self.get(self.skip_trivia(*callee)).kind {
                ExprKind::Identifier { name } => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A lowered translation unit: the file's text plus its reduced tree.
#[derive(Debug)]
pub struct TranslationUnit {
    pub file: SourceFile,
    pub arena: ExprArena,
}
