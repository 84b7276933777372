//! CTD002: integer literal implicitly converted to bool.
//!
//! Flags `0` and nonzero integer literals used where the language converts
//! them to boolean: directly under an implicit bool conversion (optionally
//! wrapped in an explicit redundant cast, which then becomes the reported
//! expression) or as a branch of a ternary whose result is bool-converted.
//! The literal's own spelling is consulted so `true`/`false` spellings that
//! reach the tree as integers are left alone.

use num_bigint::Sign;

use crate::checks::{Check, CheckCode};
use crate::diagnostics::{Diagnostic, Edit, Fix, Severity};
use crate::matcher::{bool_conversion, conditional, explicit_cast, int_literal, MatchFinder};
use crate::source::Span;
use crate::tree::{ExprArena, ExprId, ExprKind, TranslationUnit};

pub struct UseBoolLiteralsCheck;

impl UseBoolLiteralsCheck {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UseBoolLiteralsCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Check for UseBoolLiteralsCheck {
    fn code(&self) -> CheckCode {
        CheckCode::CTD002
    }

    fn check(&self, unit: &TranslationUnit) -> Vec<Diagnostic> {
        let literal_conversion = bool_conversion().operand(int_literal().bind("literal"));

        // An explicit cast that performs the bool conversion itself; the
        // whole cast is then the reported expression. Registered first so
        // its claim quiets the bare-conversion pattern underneath it.
        let cast_wrapped = explicit_cast()
            .operand_keeping_conversions(literal_conversion.clone())
            .bind("cast");

        let ternary = bool_conversion().operand(conditional().bind("ternary"));

        let mut finder: MatchFinder<BoolLiteralContext<'_>> = MatchFinder::new();
        finder.add_matcher(cast_wrapped, |ctx, arena, b| {
            let cast = b["cast"];
            ctx.claimed.push(arena.get(cast).span);
            ctx.report(arena, b["literal"], cast);
        });
        finder.add_matcher(literal_conversion.bind("conv"), |ctx, arena, b| {
            let conv = b["conv"];
            if ctx.is_claimed(arena.get(conv).span) {
                return;
            }
            ctx.report(arena, b["literal"], b["literal"]);
        });
        finder.add_matcher(ternary, |ctx, arena, b| {
            let (then_expr, else_expr) = match arena.get(b["ternary"]).kind {
                ExprKind::Conditional {
                    then_expr,
                    else_expr,
                    ..
                } => (then_expr, else_expr),
                _ => return,
            };
            for branch in [then_expr, else_expr] {
                let candidate = arena.skip_trivia(branch);
                if matches!(arena.get(candidate).kind, ExprKind::IntLiteral { .. }) {
                    ctx.report(arena, candidate, candidate);
                }
            }
        });

        let mut ctx = BoolLiteralContext {
            unit,
            claimed: Vec::new(),
            diagnostics: Vec::new(),
        };
        finder.run(&unit.arena, &mut ctx);
        ctx.diagnostics
    }
}

struct BoolLiteralContext<'u> {
    unit: &'u TranslationUnit,
    claimed: Vec<Span>,
    diagnostics: Vec<Diagnostic>,
}

impl<'u> BoolLiteralContext<'u> {
    fn is_claimed(&self, span: Span) -> bool {
        self.claimed.iter().any(|c| c.contains(span))
    }

    /// Validate one literal and emit the diagnostic at `target` (the cast
    /// expression when present, the literal itself otherwise).
    fn report(&mut self, arena: &ExprArena, literal: ExprId, target: ExprId) {
        let unit = self.unit;
        let literal_expr = arena.get(literal);
        if literal_expr.value_dependent {
            return;
        }

        // Macro or multi-file spellings are not worth a fixit, and a
        // spelling that is already a bool keyword needs nothing at all.
        let spelling = match unit.file.snippet(literal_expr) {
            Some(text) => text,
            None => return,
        };
        if spelling.eq_ignore_ascii_case("true") || spelling.eq_ignore_ascii_case("false") {
            return;
        }

        let truthy = match &literal_expr.kind {
            ExprKind::IntLiteral { value } => value.sign() != Sign::NoSign,
            _ => return,
        };

        let target_expr = arena.get(target);
        let file = &unit.file;
        let fix = if target_expr.from_macro || target_expr.multi_file {
            None
        } else {
            let new_text = if truthy { "true" } else { "false" };
            Some(Fix::new(
                format!("replace with {}", new_text),
                vec![Edit {
                    file: file.path().to_path_buf(),
                    span: target_expr.span,
                    range: file.range(target_expr.span),
                    new_text: new_text.to_string(),
                }],
            ))
        };

        self.diagnostics.push(Diagnostic {
            check: CheckCode::CTD002,
            severity: Severity::Warning,
            file: file.path().to_path_buf(),
            range: file.range(target_expr.span),
            span: target_expr.span,
            message: "converting integer literal to bool, use bool literal instead".to_string(),
            fix,
        });
    }
}
