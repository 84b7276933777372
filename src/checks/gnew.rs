//! CTD003: raw allocation calls sized with `sizeof`.
//!
//! Rewrites `malloc`/`calloc`/`realloc`/`alloca` and their GLib wrappers to
//! the typed `g_new` family when the size argument is a `sizeof` expression
//! or a multiplication involving one:
//!
//! ```c
//! malloc(sizeof(int))            ->  g_new(int, 1)
//! g_malloc0(n * sizeof(Foo))     ->  g_new0(Foo, n)
//! realloc(p, sizeof(Bar) * n)    ->  g_renew(Bar, p, n)
//! ```
//!
//! When the `sizeof` operand is an expression rather than a type the
//! replacement wraps it in `typeof(...)`; the `only_type_sizeof` option
//! drops those matches instead. A redundant pointer cast around the call is
//! deleted by a second edit on the same diagnostic.

use crate::checks::{Check, CheckCode, CheckOptions};
use crate::diagnostics::{Diagnostic, Edit, Fix, Severity};
use crate::matcher::{binary, call_named, explicit_cast, sizeof_expr, Bindings, MatchFinder};
use crate::source::Span;
use crate::tree::{BinaryOp, ExprArena, ExprKind, SizeofArg, TranslationUnit};

/// Unsized allocators this check rewrites.
const ALLOC_FUNCTIONS: &[&str] = &[
    "malloc", "calloc", "realloc", "alloca", "g_alloca", "g_malloc", "g_malloc0", "g_realloc",
];

pub struct UseGnewCheck {
    only_type_sizeof: bool,
}

impl UseGnewCheck {
    pub fn new(options: CheckOptions) -> Self {
        Self {
            only_type_sizeof: options.only_type_sizeof,
        }
    }
}

impl Check for UseGnewCheck {
    fn code(&self) -> CheckCode {
        CheckCode::CTD003
    }

    fn check(&self, unit: &TranslationUnit) -> Vec<Diagnostic> {
        let sizeof_arg = sizeof_expr().bind("sizeof");

        // size argument is exactly a sizeof
        let alloc_direct = call_named(ALLOC_FUNCTIONS)
            .arg(0, sizeof_arg.clone())
            .bind("alloc");

        // size argument is `count * sizeof(...)` (either operand order)
        let alloc_multiplied = call_named(ALLOC_FUNCTIONS)
            .any_arg(
                binary(BinaryOp::Mul)
                    .either_operand(sizeof_arg)
                    .bind("binop"),
            )
            .bind("alloc");

        let any_alloc = alloc_direct.or(alloc_multiplied);

        // The call may sit inside a redundant explicit pointer cast; the
        // cast variant is registered first so it claims the call before the
        // bare patterns are tried on it.
        let cast_wrapped = explicit_cast().operand(any_alloc.clone()).bind("cast");

        let mut finder: MatchFinder<GnewContext<'_>> = MatchFinder::new();
        finder.add_matcher(cast_wrapped, |ctx, arena, b| ctx.report(arena, b));
        finder.add_matcher(any_alloc, |ctx, arena, b| ctx.report(arena, b));

        let mut ctx = GnewContext {
            unit,
            only_type_sizeof: self.only_type_sizeof,
            claimed: Vec::new(),
            diagnostics: Vec::new(),
        };
        finder.run(&unit.arena, &mut ctx);
        ctx.diagnostics
    }
}

struct GnewContext<'u> {
    unit: &'u TranslationUnit,
    only_type_sizeof: bool,
    claimed: Vec<Span>,
    diagnostics: Vec<Diagnostic>,
}

impl<'u> GnewContext<'u> {
    fn is_claimed(&self, span: Span) -> bool {
        self.claimed.iter().any(|c| c.contains(span))
    }

    fn report(&mut self, arena: &ExprArena, bindings: &Bindings) {
        let unit = self.unit;
        let alloc = bindings["alloc"];
        if self.is_claimed(arena.get(alloc).span) {
            return;
        }
        let sizeof_id = bindings["sizeof"];
        let binop = bindings.get("binop").copied();
        let cast = bindings.get("cast").copied();

        let callee = match arena.callee_name(alloc) {
            Some(name) => name,
            None => return,
        };
        let replacement_name = match callee {
            "calloc" | "g_malloc0" => "g_new0",
            "alloca" | "g_alloca" => "g_newa",
            "realloc" | "g_realloc" => "g_renew",
            _ => "g_new",
        };

        let mut replacement = format!("{}(", replacement_name);

        match &arena.get(sizeof_id).kind {
            ExprKind::Sizeof {
                arg: SizeofArg::Type(type_name),
            } => replacement.push_str(type_name),
            ExprKind::Sizeof {
                arg: SizeofArg::Expr(operand),
            } => {
                if self.only_type_sizeof {
                    // The typed rewrite cannot be expressed under this
                    // configuration; drop the match.
                    return;
                }
                let inner = arena.skip_parens(*operand);
                let text = match unit.file.snippet(arena.get(inner)) {
                    Some(text) => text,
                    None => return,
                };
                replacement.push_str("typeof(");
                replacement.push_str(text);
                replacement.push(')');
            }
            _ => return,
        }
        replacement.push_str(", ");

        if replacement_name == "g_renew" {
            let old_pointer = match &arena.get(alloc).kind {
                ExprKind::Call { args, .. } => args.first().copied(),
                _ => None,
            };
            let old_pointer = match old_pointer {
                Some(id) => id,
                None => return,
            };
            let text = match unit.file.snippet(arena.get(old_pointer)) {
                Some(text) => text,
                None => return,
            };
            replacement.push_str(text);
            replacement.push_str(", ");
        }

        match binop {
            Some(binop_id) => {
                let (lhs, rhs) = match arena.get(binop_id).kind {
                    ExprKind::Binary { lhs, rhs, .. } => (lhs, rhs),
                    _ => return,
                };
                let count = if arena.skip_trivia(lhs) == sizeof_id {
                    rhs
                } else {
                    lhs
                };
                let text = match unit.file.snippet(arena.get(count)) {
                    Some(text) => text,
                    None => return,
                };
                replacement.push_str(text);
            }
            None => replacement.push('1'),
        }
        replacement.push(')');

        let file = &unit.file;
        let alloc_span = arena.get(alloc).span;
        let mut edits = vec![Edit {
            file: file.path().to_path_buf(),
            span: alloc_span,
            range: file.range(alloc_span),
            new_text: replacement,
        }];
        if let Some(cast_id) = cast {
            if let ExprKind::Cast { type_span, .. } = arena.get(cast_id).kind {
                edits.push(Edit {
                    file: file.path().to_path_buf(),
                    span: type_span,
                    range: file.range(type_span),
                    new_text: String::new(),
                });
            }
        }

        let anchor = match arena.get(alloc).kind {
            ExprKind::Call { callee, .. } => arena.get(callee).span,
            _ => alloc_span,
        };

        self.claimed
            .push(cast.map(|c| arena.get(c).span).unwrap_or(alloc_span));
        self.diagnostics.push(Diagnostic {
            check: CheckCode::CTD003,
            severity: Severity::Warning,
            file: file.path().to_path_buf(),
            range: file.range(anchor),
            span: anchor,
            message: format!("use {}() instead", replacement_name),
            fix: Some(Fix::new(
                format!("rewrite with {}", replacement_name),
                edits,
            )),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_source;

    fn run(src: &str) -> Vec<Diagnostic> {
        let unit = lower_source("test.c", src.to_string()).unwrap();
        UseGnewCheck::new(CheckOptions::default()).check(&unit)
    }

    fn run_type_only(src: &str) -> Vec<Diagnostic> {
        let unit = lower_source("test.c", src.to_string()).unwrap();
        UseGnewCheck::new(CheckOptions {
            only_type_sizeof: true,
            ..CheckOptions::default()
        })
        .check(&unit)
    }

    fn replacement(diag: &Diagnostic) -> &str {
        &diag.fix.as_ref().unwrap().edits[0].new_text
    }

    #[test]
    fn malloc_of_one_element() {
        let diags = run("void f(void) { int *p = malloc(sizeof(int)); }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use g_new() instead");
        assert_eq!(replacement(&diags[0]), "g_new(int, 1)");
    }

    #[test]
    fn zeroing_allocators_map_to_g_new0() {
        let diags = run("void f(void) { void *p = g_malloc0(sizeof(struct dirent)); }");
        assert_eq!(diags.len(), 1);
        assert_eq!(replacement(&diags[0]), "g_new0(struct dirent, 1)");

        let diags = run("void f(int n) { void *p = calloc(sizeof(int) * n); }");
        assert_eq!(diags.len(), 1);
        assert_eq!(replacement(&diags[0]), "g_new0(int, n)");
    }

    #[test]
    fn stack_allocators_map_to_g_newa() {
        let diags = run("void f(int n) { void *p = alloca(n * sizeof(long)); }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use g_newa() instead");
        assert_eq!(replacement(&diags[0]), "g_newa(long, n)");
    }

    #[test]
    fn realloc_keeps_the_old_pointer() {
        let diags = run("void f(void *p, int n) { p = realloc(p, sizeof(struct dirent) * n); }");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "use g_renew() instead");
        assert_eq!(replacement(&diags[0]), "g_renew(struct dirent, p, n)");
    }

    #[test]
    fn multiplication_count_on_either_side() {
        let diags = run("void f(int n) { void *p = g_malloc(sizeof(int) * n); }");
        assert_eq!(replacement(&diags[0]), "g_new(int, n)");
        let diags = run("void f(int n) { void *p = g_malloc(n * sizeof(int)); }");
        assert_eq!(replacement(&diags[0]), "g_new(int, n)");
    }

    #[test]
    fn expression_sizeof_uses_typeof() {
        let diags = run("void f(int *p) { p = malloc(sizeof(*p)); }");
        assert_eq!(diags.len(), 1);
        assert_eq!(replacement(&diags[0]), "g_new(typeof(*p), 1)");
    }

    #[test]
    fn type_only_configuration_drops_expression_sizeof() {
        let diags = run_type_only("void f(int *p) { p = malloc(sizeof(*p)); }");
        assert!(diags.is_empty());
        // Type-operand matches still fire.
        let diags = run_type_only("void f(void) { void *p = malloc(sizeof(int)); }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn redundant_cast_is_removed_with_a_second_edit() {
        let src = "void f(void) { char *p = (char *)malloc(sizeof(char)); }";
        let unit = lower_source("test.c", src.to_string()).unwrap();
        let diags = UseGnewCheck::new(CheckOptions::default()).check(&unit);
        assert_eq!(diags.len(), 1);
        let edits = &diags[0].fix.as_ref().unwrap().edits;
        assert_eq!(edits.len(), 2);
        assert_eq!(unit.file.slice(edits[0].span), Some("malloc(sizeof(char))"));
        assert_eq!(edits[0].new_text, "g_new(char, 1)");
        assert_eq!(unit.file.slice(edits[1].span), Some("(char *)"));
        assert_eq!(edits[1].new_text, "");
    }

    #[test]
    fn allocation_without_sizeof_is_ignored() {
        let diags = run("void f(int n) { void *p = malloc(n); free(p); }");
        assert!(diags.is_empty());
    }

    #[test]
    fn unrelated_calls_are_ignored() {
        let diags = run("void f(void) { int x = strlen(\"a\") * sizeof(int); }");
        assert!(diags.is_empty());
    }

    #[test]
    fn rewritten_form_produces_no_further_matches() {
        let diags = run("void f(void) { int *p = g_new(int, 1); }");
        assert!(diags.is_empty());
        let diags = run("void f(void *q, int n) { q = g_renew(struct dirent, q, n); }");
        assert!(diags.is_empty());
    }
}
