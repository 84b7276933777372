//! Structural pattern matching over the reduced expression tree.
//!
//! Patterns are small composable predicates: a primitive constrains the
//! node kind ("a `/` binary operator", "a call to one of these names"), and
//! combinator methods constrain operands with sub-patterns. Every operand
//! edge skips redundant parentheses and implicit conversions unless stated
//! otherwise, and `not_macro_op` excludes operators whose token came out of
//! a macro expansion.
//!
//! A successful match produces [`Bindings`]: named captures mapping to node
//! ids. The [`MatchFinder`] runs registered patterns over a whole tree in
//! one deterministic preorder traversal (source order), invoking each
//! pattern's callback per match -- patterns registered first are tried
//! first at every node, which is what lets broader patterns claim a span
//! before narrower ones see it.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::tree::{BinaryOp, ExprArena, ExprId, ExprKind};

/// Named captures produced by a successful match.
pub type Bindings = FxHashMap<&'static str, ExprId>;

type PatternFn = dyn Fn(&ExprArena, ExprId, &mut Bindings) -> bool;

/// A composable structural predicate over one tree node.
#[derive(Clone)]
pub struct Pattern {
    f: Rc<PatternFn>,
}

impl Pattern {
    fn from_fn(f: impl Fn(&ExprArena, ExprId, &mut Bindings) -> bool + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    /// Apply this pattern at `id`, recording captures into `bindings`.
    ///
    /// On failure `bindings` may contain partial captures; callers that
    /// need all-or-nothing semantics (alternation) snapshot first.
    pub fn matches(&self, arena: &ExprArena, id: ExprId, bindings: &mut Bindings) -> bool {
        (self.f)(arena, id, bindings)
    }

    /// Conjunction: both patterns must hold at the same node.
    pub fn and(self, other: Pattern) -> Pattern {
        Pattern::from_fn(move |arena, id, b| {
            self.matches(arena, id, b) && other.matches(arena, id, b)
        })
    }

    /// Alternation. Each alternative runs against a snapshot of the
    /// bindings so a failed branch leaves no partial captures behind.
    pub fn or(self, other: Pattern) -> Pattern {
        Pattern::from_fn(move |arena, id, b| {
            let snapshot = b.clone();
            if self.matches(arena, id, b) {
                return true;
            }
            *b = snapshot;
            other.matches(arena, id, b)
        })
    }

    /// Record the matched node under `name` on success.
    pub fn bind(self, name: &'static str) -> Pattern {
        Pattern::from_fn(move |arena, id, b| {
            if self.matches(arena, id, b) {
                b.insert(name, id);
                true
            } else {
                false
            }
        })
    }

    /// For binary operators: require the operator token itself to not come
    /// from a macro expansion. Macro-generated operators are presumed to be
    /// the intended abstraction already and are never rewritten.
    pub fn not_macro_op(self) -> Pattern {
        self.and(Pattern::from_fn(|arena, id, _| {
            !matches!(
                arena.get(id).kind,
                ExprKind::Binary {
                    op_from_macro: true,
                    ..
                }
            )
        }))
    }

    /// Constrain the left operand of a binary operator (parens and implicit
    /// conversions around the operand are skipped).
    pub fn lhs(self, sub: Pattern) -> Pattern {
        self.and(Pattern::from_fn(move |arena, id, b| {
            match arena.get(id).kind {
                ExprKind::Binary { lhs, .. } => sub.matches(arena, arena.skip_trivia(lhs), b),
                _ => false,
            }
        }))
    }

    /// Constrain the right operand of a binary operator.
    pub fn rhs(self, sub: Pattern) -> Pattern {
        self.and(Pattern::from_fn(move |arena, id, b| {
            match arena.get(id).kind {
                ExprKind::Binary { rhs, .. } => sub.matches(arena, arena.skip_trivia(rhs), b),
                _ => false,
            }
        }))
    }

    /// Constrain either operand of a binary operator; the left operand is
    /// tried first.
    pub fn either_operand(self, sub: Pattern) -> Pattern {
        let left = self.clone().lhs(sub.clone());
        let right = self.rhs(sub);
        left.or(right)
    }

    /// Constrain the single operand of a unary operator, cast, implicit
    /// conversion, or grouping node, skipping trivia on the edge.
    pub fn operand(self, sub: Pattern) -> Pattern {
        self.and(Pattern::from_fn(move |arena, id, b| {
            single_operand(arena, id)
                .map(|inner| sub.matches(arena, arena.skip_trivia(inner), b))
                .unwrap_or(false)
        }))
    }

    /// Like [`Pattern::operand`] but keeps implicit conversions visible,
    /// skipping only grouping parentheses. Needed when the sub-pattern
    /// itself matches a conversion node.
    pub fn operand_keeping_conversions(self, sub: Pattern) -> Pattern {
        self.and(Pattern::from_fn(move |arena, id, b| {
            single_operand(arena, id)
                .map(|inner| sub.matches(arena, arena.skip_parens(inner), b))
                .unwrap_or(false)
        }))
    }

    /// Constrain argument `index` of a call (trivia skipped on the edge).
    pub fn arg(self, index: usize, sub: Pattern) -> Pattern {
        self.and(Pattern::from_fn(move |arena, id, b| {
            match &arena.get(id).kind {
                ExprKind::Call { args, .. } => args
                    .get(index)
                    .map(|a| sub.matches(arena, arena.skip_trivia(*a), b))
                    .unwrap_or(false),
                _ => false,
            }
        }))
    }

    /// Constrain some argument of a call; arguments are tried in source
    /// order and the first match wins.
    pub fn any_arg(self, sub: Pattern) -> Pattern {
        self.and(Pattern::from_fn(move |arena, id, b| {
            let args = match &arena.get(id).kind {
                ExprKind::Call { args, .. } => args.clone(),
                _ => return false,
            };
            for a in args {
                let snapshot = b.clone();
                if sub.matches(arena, arena.skip_trivia(a), b) {
                    return true;
                }
                *b = snapshot;
            }
            false
        }))
    }
}

fn single_operand(arena: &ExprArena, id: ExprId) -> Option<ExprId> {
    match &arena.get(id).kind {
        ExprKind::Unary { operand, .. }
        | ExprKind::Cast { operand, .. }
        | ExprKind::BoolConversion { operand } => Some(*operand),
        ExprKind::Paren { inner } => Some(*inner),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// A binary operator of the given kind.
pub fn binary(op: BinaryOp) -> Pattern {
    Pattern::from_fn(move |arena, id, _| {
        matches!(arena.get(id).kind, ExprKind::Binary { op: o, .. } if o == op)
    })
}

/// An integer literal.
pub fn int_literal() -> Pattern {
    Pattern::from_fn(|arena, id, _| matches!(arena.get(id).kind, ExprKind::IntLiteral { .. }))
}

/// A `sizeof` expression (type or value operand).
pub fn sizeof_expr() -> Pattern {
    Pattern::from_fn(|arena, id, _| matches!(arena.get(id).kind, ExprKind::Sizeof { .. }))
}

/// A ternary conditional.
pub fn conditional() -> Pattern {
    Pattern::from_fn(|arena, id, _| matches!(arena.get(id).kind, ExprKind::Conditional { .. }))
}

/// An implicit conversion to boolean.
pub fn bool_conversion() -> Pattern {
    Pattern::from_fn(|arena, id, _| matches!(arena.get(id).kind, ExprKind::BoolConversion { .. }))
}

/// An explicit cast expression.
pub fn explicit_cast() -> Pattern {
    Pattern::from_fn(|arena, id, _| matches!(arena.get(id).kind, ExprKind::Cast { .. }))
}

/// A call whose callee is a plain identifier naming one of `names`.
pub fn call_named(names: &'static [&'static str]) -> Pattern {
    Pattern::from_fn(move |arena, id, _| {
        arena
            .callee_name(id)
            .map(|n| names.contains(&n))
            .unwrap_or(false)
    })
}

// ---------------------------------------------------------------------------
// Finder
// ---------------------------------------------------------------------------

type Callback<C> = Box<dyn Fn(&mut C, &ExprArena, &Bindings)>;

/// Runs a set of registered patterns over a tree in one deterministic
/// preorder traversal, calling back into the owning check's context `C` on
/// every match.
pub struct MatchFinder<C> {
    patterns: Vec<(Pattern, Callback<C>)>,
}

impl<C> Default for MatchFinder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MatchFinder<C> {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Register a pattern with its match callback. Registration order is
    /// trial order at every node.
    pub fn add_matcher(
        &mut self,
        pattern: Pattern,
        callback: impl Fn(&mut C, &ExprArena, &Bindings) + 'static,
    ) {
        self.patterns.push((pattern, Box::new(callback)));
    }

    /// Visit every node of every root, source order, trying each pattern.
    pub fn run(&self, arena: &ExprArena, ctx: &mut C) {
        for root in arena.roots() {
            self.visit(arena, *root, ctx);
        }
    }

    fn visit(&self, arena: &ExprArena, id: ExprId, ctx: &mut C) {
        for (pattern, callback) in &self.patterns {
            let mut bindings = Bindings::default();
            if pattern.matches(arena, id, &mut bindings) {
                callback(ctx, arena, &bindings);
            }
        }
        for child in arena.children(id) {
            self.visit(arena, child, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;
    use crate::tree::Expr;

    fn sp(a: usize, b: usize) -> Span {
        Span::new(a, b)
    }

    fn lit(arena: &mut ExprArena, v: i64, a: usize, b: usize) -> ExprId {
        arena.alloc(Expr::new(ExprKind::IntLiteral { value: v.into() }, sp(a, b)))
    }

    fn ident(arena: &mut ExprArena, name: &str, a: usize, b: usize) -> ExprId {
        arena.alloc(Expr::new(
            ExprKind::Identifier {
                name: name.to_string(),
            },
            sp(a, b),
        ))
    }

    fn bin(arena: &mut ExprArena, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        let span = sp(arena.get(lhs).span.start, arena.get(rhs).span.end);
        arena.alloc(Expr::new(
            ExprKind::Binary {
                op,
                op_span: span,
                op_from_macro: false,
                lhs,
                rhs,
            },
            span,
        ))
    }

    /// Build `a / b * b` and return (arena, mul).
    fn align_down_tree() -> (ExprArena, ExprId) {
        let mut arena = ExprArena::new();
        let a = ident(&mut arena, "a", 0, 1);
        let b1 = ident(&mut arena, "b", 4, 5);
        let div = bin(&mut arena, BinaryOp::Div, a, b1);
        let b2 = ident(&mut arena, "b", 8, 9);
        let mul = bin(&mut arena, BinaryOp::Mul, div, b2);
        arena.push_root(mul);
        (arena, mul)
    }

    #[test]
    fn nested_binary_pattern_binds_both_levels() {
        let (arena, mul) = align_down_tree();
        let pattern = binary(BinaryOp::Mul)
            .lhs(binary(BinaryOp::Div).bind("div"))
            .bind("mul");
        let mut b = Bindings::default();
        assert!(pattern.matches(&arena, mul, &mut b));
        assert_eq!(b["mul"], mul);
        assert!(matches!(
            arena.get(b["div"]).kind,
            ExprKind::Binary {
                op: BinaryOp::Div,
                ..
            }
        ));
    }

    #[test]
    fn operand_edges_skip_parens() {
        let mut arena = ExprArena::new();
        let a = ident(&mut arena, "a", 1, 2);
        let div_rhs = ident(&mut arena, "b", 6, 7);
        let div = bin(&mut arena, BinaryOp::Div, a, div_rhs);
        let paren = arena.alloc(Expr::new(ExprKind::Paren { inner: div }, sp(0, 8)));
        let b2 = ident(&mut arena, "b", 11, 12);
        let mul = bin(&mut arena, BinaryOp::Mul, paren, b2);
        arena.push_root(mul);

        let pattern = binary(BinaryOp::Mul).lhs(binary(BinaryOp::Div).bind("div"));
        let mut bindings = Bindings::default();
        assert!(pattern.matches(&arena, mul, &mut bindings));
        assert_eq!(bindings["div"], div);
    }

    #[test]
    fn macro_operators_are_excluded() {
        let mut arena = ExprArena::new();
        let a = ident(&mut arena, "a", 0, 1);
        let b = ident(&mut arena, "b", 4, 5);
        let span = sp(0, 5);
        let div = arena.alloc(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Div,
                op_span: span,
                op_from_macro: true,
                lhs: a,
                rhs: b,
            },
            span,
        ));
        let mut bindings = Bindings::default();
        assert!(binary(BinaryOp::Div).matches(&arena, div, &mut bindings));
        assert!(!binary(BinaryOp::Div)
            .not_macro_op()
            .matches(&arena, div, &mut bindings));
    }

    #[test]
    fn alternation_discards_partial_captures() {
        let (arena, mul) = align_down_tree();
        // First alternative binds "x" on the div but then fails on the
        // literal requirement; the binding must not leak through.
        let failing = binary(BinaryOp::Mul)
            .lhs(binary(BinaryOp::Div).bind("x"))
            .rhs(int_literal());
        let succeeding = binary(BinaryOp::Mul).bind("y");
        let mut bindings = Bindings::default();
        assert!(failing.or(succeeding).matches(&arena, mul, &mut bindings));
        assert!(!bindings.contains_key("x"));
        assert_eq!(bindings["y"], mul);
    }

    #[test]
    fn finder_visits_in_source_order_and_registration_order() {
        let (arena, _) = align_down_tree();
        let mut finder: MatchFinder<Vec<&'static str>> = MatchFinder::new();
        finder.add_matcher(binary(BinaryOp::Mul), |log, _, _| log.push("mul"));
        finder.add_matcher(binary(BinaryOp::Div), |log, _, _| log.push("div"));
        let mut log = Vec::new();
        finder.run(&arena, &mut log);
        // Preorder: the mul root is visited before its div child.
        assert_eq!(log, vec!["mul", "div"]);
    }

    #[test]
    fn call_patterns_match_names_and_args() {
        let mut arena = ExprArena::new();
        let callee = ident(&mut arena, "malloc", 0, 6);
        let ty = arena.alloc(Expr::new(
            ExprKind::Sizeof {
                arg: crate::tree::SizeofArg::Type("int".to_string()),
            },
            sp(7, 18),
        ));
        let call = arena.alloc(Expr::new(
            ExprKind::Call {
                callee,
                args: vec![ty],
            },
            sp(0, 19),
        ));
        arena.push_root(call);

        let pattern = call_named(&["malloc", "g_malloc"])
            .arg(0, sizeof_expr().bind("sizeof"))
            .bind("alloc");
        let mut b = Bindings::default();
        assert!(pattern.matches(&arena, call, &mut b));
        assert_eq!(b["alloc"], call);
        assert_eq!(b["sizeof"], ty);

        let other = call_named(&["free"]);
        let mut b2 = Bindings::default();
        assert!(!other.matches(&arena, call, &mut b2));
    }
}
