//! CTD001: manual alignment/rounding arithmetic.
//!
//! Three shapes, matched bottom-up over integer arithmetic:
//!
//! 1. `(A + (B-1)) / B * B` -- align `A` up to a multiple of `B`. Suggests
//!    `ROUND_UP(A, B)` when `B` is a power of two, `QEMU_ALIGN_UP(A, B)`
//!    otherwise.
//! 2. `(A + (B-1)) / B` on its own -- `DIV_ROUND_UP(A, B)`.
//! 3. `A / B * B` -- `QEMU_ALIGN_DOWN(A, B)`.
//!
//! The added constant must equal the divisor minus one, and the divisor
//! must equal the multiplier; all of it resolved through constant folding.
//! A match whose constants cannot be resolved is dropped silently.
//!
//! The three shapes overlap: the division inside shape 1 is itself a valid
//! shape 2, and the whole of shape 1 is a valid shape 3. Broader shapes are
//! registered first and each emitted diagnostic claims its span, so one
//! source expression produces exactly one suggestion.

use num_bigint::BigInt;

use crate::checks::{Check, CheckCode, CheckOptions};
use crate::diagnostics::{Diagnostic, Edit, Fix, Severity};
use crate::eval::{evaluate, is_power_of_two};
use crate::matcher::{binary, Bindings, MatchFinder};
use crate::source::Span;
use crate::tree::{BinaryOp, ExprArena, ExprId, ExprKind, TranslationUnit};

pub struct RoundCheck {
    only_align_up: bool,
}

impl RoundCheck {
    pub fn new(options: CheckOptions) -> Self {
        Self {
            only_align_up: options.only_align_up,
        }
    }
}

impl Check for RoundCheck {
    fn code(&self) -> CheckCode {
        CheckCode::CTD001
    }

    fn check(&self, unit: &TranslationUnit) -> Vec<Diagnostic> {
        // (A + B-1) / B * B
        let add = binary(BinaryOp::Add).not_macro_op().bind("add");
        let div = binary(BinaryOp::Div)
            .not_macro_op()
            .lhs(add.clone())
            .bind("div");
        let mul_align_up = binary(BinaryOp::Mul)
            .not_macro_op()
            .lhs(div)
            .bind("mul");

        let mut finder: MatchFinder<RoundContext<'_>> = MatchFinder::new();
        finder.add_matcher(mul_align_up, |ctx, arena, b| ctx.report_align_up(arena, b));

        if !self.only_align_up {
            // (A + B-1) / B
            let div_round_up = binary(BinaryOp::Div)
                .not_macro_op()
                .lhs(add)
                .bind("div");
            finder.add_matcher(div_round_up, |ctx, arena, b| ctx.report_round_up(arena, b));

            // A / B * B
            let mul_align_down = binary(BinaryOp::Mul)
                .not_macro_op()
                .lhs(binary(BinaryOp::Div).not_macro_op().bind("div"))
                .bind("mul");
            finder.add_matcher(mul_align_down, |ctx, arena, b| {
                ctx.report_align_down(arena, b)
            });
        }

        let mut ctx = RoundContext {
            unit,
            claimed: Vec::new(),
            diagnostics: Vec::new(),
        };
        finder.run(&unit.arena, &mut ctx);
        ctx.diagnostics
    }
}

struct RoundContext<'u> {
    unit: &'u TranslationUnit,
    /// Spans already rewritten by a broader shape; narrower shapes inside
    /// them stay quiet.
    claimed: Vec<Span>,
    diagnostics: Vec<Diagnostic>,
}

fn operands(arena: &ExprArena, id: ExprId) -> (ExprId, ExprId, Span) {
    match arena.get(id).kind {
        ExprKind::Binary {
            lhs, rhs, op_span, ..
        } => (lhs, rhs, op_span),
        _ => unreachable!("pattern guarantees a binary operator"),
    }
}

impl<'u> RoundContext<'u> {
    fn is_claimed(&self, span: Span) -> bool {
        self.claimed.iter().any(|c| c.contains(span))
    }

    fn fold(&self, arena: &ExprArena, id: ExprId) -> Option<BigInt> {
        evaluate(arena, id)
    }

    fn report_align_up(&mut self, arena: &ExprArena, bindings: &Bindings) {
        let unit = self.unit;
        let mul = bindings["mul"];
        let div = bindings["div"];
        let add = bindings["add"];
        let (add_lhs, add_rhs, _) = operands(arena, add);
        let (_, div_rhs, _) = operands(arena, div);
        let (_, mul_rhs, mul_op_span) = operands(arena, mul);

        let (add_value, div_value, mul_value) = match (
            self.fold(arena, add_rhs),
            self.fold(arena, div_rhs),
            self.fold(arena, mul_rhs),
        ) {
            (Some(a), Some(d), Some(m)) => (a, d, m),
            _ => return,
        };

        if mul_value != div_value || mul_value != add_value + 1 {
            return;
        }

        let name = if is_power_of_two(&mul_value) {
            "ROUND_UP"
        } else {
            "QEMU_ALIGN_UP"
        };

        let (aligned, boundary) = match (
            unit.file.snippet(arena.get(add_lhs)),
            unit.file.snippet(arena.get(mul_rhs)),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };

        let replacement = format!("{}({}, {})", name, aligned, boundary);
        let span = arena.get(mul).span;
        self.claimed.push(span);
        self.push(name, mul_op_span, span, replacement);
    }

    fn report_round_up(&mut self, arena: &ExprArena, bindings: &Bindings) {
        let unit = self.unit;
        let div = bindings["div"];
        let add = bindings["add"];
        if self.is_claimed(arena.get(div).span) {
            return;
        }
        let (add_lhs, add_rhs, _) = operands(arena, add);
        let (_, div_rhs, div_op_span) = operands(arena, div);

        let (add_value, div_value) = match (self.fold(arena, add_rhs), self.fold(arena, div_rhs)) {
            (Some(a), Some(d)) => (a, d),
            _ => return,
        };
        if div_value != add_value + 1 {
            return;
        }

        let (numerator, divisor) = match (
            unit.file.snippet(arena.get(add_lhs)),
            unit.file.snippet(arena.get(div_rhs)),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };

        let replacement = format!("DIV_ROUND_UP({}, {})", numerator, divisor);
        let span = arena.get(div).span;
        self.claimed.push(span);
        self.push("DIV_ROUND_UP", div_op_span, span, replacement);
    }

    fn report_align_down(&mut self, arena: &ExprArena, bindings: &Bindings) {
        let unit = self.unit;
        let mul = bindings["mul"];
        let div = bindings["div"];
        if self.is_claimed(arena.get(mul).span) {
            return;
        }
        let (div_lhs, div_rhs, _) = operands(arena, div);
        let (_, mul_rhs, mul_op_span) = operands(arena, mul);

        // Same spelled expression, or two spellings of the same constant.
        let div_text = unit.file.snippet(arena.get(div_rhs));
        let mul_text = unit.file.snippet(arena.get(mul_rhs));
        let textually_equal = matches!((div_text, mul_text), (Some(d), Some(m)) if d == m);
        if !textually_equal {
            match (self.fold(arena, div_rhs), self.fold(arena, mul_rhs)) {
                (Some(d), Some(m)) if d == m => {}
                _ => return,
            }
        }

        let (aligned, boundary) = match (unit.file.snippet(arena.get(div_lhs)), mul_text) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };

        let replacement = format!("QEMU_ALIGN_DOWN({}, {})", aligned, boundary);
        let span = arena.get(mul).span;
        self.claimed.push(span);
        self.push("QEMU_ALIGN_DOWN", mul_op_span, span, replacement);
    }

    fn push(&mut self, name: &str, anchor: Span, replaced: Span, replacement: String) {
        let file = &self.unit.file;
        let edit = Edit {
            file: file.path().to_path_buf(),
            span: replaced,
            range: file.range(replaced),
            new_text: replacement,
        };
        self.diagnostics.push(Diagnostic {
            check: CheckCode::CTD001,
            severity: Severity::Warning,
            file: file.path().to_path_buf(),
            range: file.range(anchor),
            span: anchor,
            message: format!("use {} instead", name),
            fix: Some(Fix::new(format!("rewrite with {}", name), vec![edit])),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_source;

    fn run(src: &str) -> Vec<Diagnostic> {
        let unit = lower_source("test.c", src.to_string()).unwrap();
        RoundCheck::new(CheckOptions::default()).check(&unit)
    }

    fn run_only_align_up(src: &str) -> Vec<Diagnostic> {
        let unit = lower_source("test.c", src.to_string()).unwrap();
        RoundCheck::new(CheckOptions {
            only_align_up: true,
            ..CheckOptions::default()
        })
        .check(&unit)
    }

    fn replacement(diag: &Diagnostic) -> &str {
        &diag.fix.as_ref().unwrap().edits[0].new_text
    }

    #[test]
    fn align_up_power_of_two_uses_round_up() {
        let diags = run("int f(int a) { return (a + 4095) / 4096 * 4096; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use ROUND_UP instead");
        assert_eq!(replacement(&diags[0]), "ROUND_UP(a, 4096)");
    }

    #[test]
    fn align_up_generic_boundary_uses_align_up() {
        let diags = run("int f(int a) { return (a + 11) / 12 * 12; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use QEMU_ALIGN_UP instead");
        assert_eq!(replacement(&diags[0]), "QEMU_ALIGN_UP(a, 12)");
    }

    #[test]
    fn standalone_division_is_round_up() {
        let diags = run("int f(int a) { return (a + 511) / 512; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use DIV_ROUND_UP instead");
        assert_eq!(replacement(&diags[0]), "DIV_ROUND_UP(a, 512)");
    }

    #[test]
    fn align_down_on_matching_text() {
        let diags = run("int f(int x, int y) { return x / y * y; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use QEMU_ALIGN_DOWN instead");
        assert_eq!(replacement(&diags[0]), "QEMU_ALIGN_DOWN(x, y)");
    }

    #[test]
    fn align_down_on_equal_constants_with_different_spelling() {
        let diags = run("int f(int x) { return x / 16 * 0x10; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(replacement(&diags[0]), "QEMU_ALIGN_DOWN(x, 0x10)");
    }

    #[test]
    fn align_down_rejects_different_divisor_and_multiplier() {
        let diags = run("int f(int x, int y, int z) { return x / y * z; }");
        assert!(diags.is_empty());
        let diags = run("int f(int x) { return x / 8 * 16; }");
        assert!(diags.is_empty());
    }

    #[test]
    fn mismatched_added_constant_is_dropped() {
        // 5 != 12 - 1: not a round-up, and the shape still align-downs only
        // when divisor == multiplier, which holds, so ALIGN_DOWN fires on
        // the whole expression.
        let diags = run("int f(int a) { return (a + 5) / 12 * 12; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use QEMU_ALIGN_DOWN instead");
        assert_eq!(replacement(&diags[0]), "QEMU_ALIGN_DOWN((a + 5), 12)");
    }

    #[test]
    fn unresolved_constants_are_dropped_silently() {
        let diags = run("int f(int a, int b) { return (a + b) / b; }");
        assert!(diags.is_empty());
    }

    #[test]
    fn variable_boundary_align_up_degrades_to_align_down() {
        // b - 1 does not fold, so the align-up validation drops the match;
        // the align-down shape still applies with identical divisor and
        // multiplier text.
        let diags = run("int f(int a, int b) { return (a + (b - 1)) / b * b; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use QEMU_ALIGN_DOWN instead");
        assert_eq!(replacement(&diags[0]), "QEMU_ALIGN_DOWN((a + (b - 1)), b)");
    }

    #[test]
    fn one_diagnostic_per_overlapping_expression() {
        // The inner division of the align-up shape is itself a round-up
        // shape, and the whole thing is an align-down shape; only the
        // broadest fires.
        let diags = run("int f(int a) { return (a + 63) / 64 * 64; }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use ROUND_UP instead");
    }

    #[test]
    fn only_align_up_skips_narrower_shapes() {
        let diags = run_only_align_up("int f(int a) { return (a + 511) / 512; }");
        assert!(diags.is_empty());
        let diags = run_only_align_up("int f(int x, int y) { return x / y * y; }");
        assert!(diags.is_empty());
        let diags = run_only_align_up("int f(int a) { return (a + 4095) / 4096 * 4096; }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn replacement_span_covers_exact_expression() {
        let src = "int f(int a) { return (a + 4095) / 4096 * 4096; }";
        let unit = lower_source("test.c", src.to_string()).unwrap();
        let diags = RoundCheck::new(CheckOptions::default()).check(&unit);
        let edit = &diags[0].fix.as_ref().unwrap().edits[0];
        assert_eq!(
            unit.file.slice(edit.span),
            Some("(a + 4095) / 4096 * 4096")
        );
    }

    #[test]
    fn rewritten_form_produces_no_further_matches() {
        let diags = run("int f(int a) { return ROUND_UP(a, 4096); }");
        assert!(diags.is_empty());
        let diags = run("int f(int a) { return DIV_ROUND_UP(a, 512); }");
        assert!(diags.is_empty());
    }

    #[test]
    fn macro_expanded_operators_never_match() {
        // The C front-end cannot produce macro-expanded operators, so build
        // the tree a host with real expansions would hand over: `a / b * b`
        // whose division operator token came out of a macro.
        use crate::source::{SourceFile, Span};
        use crate::tree::{Expr, ExprKind};

        let text = "a / b * b";
        let mut arena = crate::tree::ExprArena::new();
        let a = arena.alloc(Expr::new(
            ExprKind::Identifier {
                name: "a".to_string(),
            },
            Span::new(0, 1),
        ));
        let b1 = arena.alloc(Expr::new(
            ExprKind::Identifier {
                name: "b".to_string(),
            },
            Span::new(4, 5),
        ));
        let div = arena.alloc(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Div,
                op_span: Span::new(2, 3),
                op_from_macro: true,
                lhs: a,
                rhs: b1,
            },
            Span::new(0, 5),
        ));
        let b2 = arena.alloc(Expr::new(
            ExprKind::Identifier {
                name: "b".to_string(),
            },
            Span::new(8, 9),
        ));
        let mul = arena.alloc(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Mul,
                op_span: Span::new(6, 7),
                op_from_macro: false,
                lhs: div,
                rhs: b2,
            },
            Span::new(0, 9),
        ));
        arena.push_root(mul);
        let unit = TranslationUnit {
            file: SourceFile::new("test.c", text),
            arena,
        };

        let diags = RoundCheck::new(CheckOptions::default()).check(&unit);
        assert!(diags.is_empty());
    }

    #[test]
    fn replacement_preserves_value() {
        // Model check on the arithmetic itself: for a sample of (a, b) the
        // original expression equals the aligned form the macro expands to.
        for a in 0..200i64 {
            for b in [1i64, 2, 3, 8, 12, 4096] {
                let original = (a + (b - 1)) / b * b;
                let round_up = a.div_ceil(b) * b;
                assert_eq!(original, round_up, "a={} b={}", a, b);
            }
        }
    }
}
