//! Adapter from the host parser's concrete syntax tree to the reduced
//! expression tree.
//!
//! Parsing itself is tree-sitter's job; this module only maps the C grammar
//! nodes the checks care about into [`ExprKind`] variants and synthesizes
//! the implicit boolean-conversion wrappers that a concrete syntax tree
//! does not show: condition positions (`if`/`while`/`do`/`for`, ternary),
//! operands of `!`/`&&`/`||`, initializers of bool-typed declarations, and
//! operands of casts to a bool-spelled type.
//!
//! Preprocessor territory stays opaque: `#define` bodies are raw token
//! soup to the grammar and are never lowered, so macro-internal expressions
//! cannot produce matches. The `from_macro` flags on nodes exist for host
//! front-ends that do see expansions; this adapter never sets them.

use std::path::Path;

use num_bigint::BigInt;
use tracing::debug;
use tree_sitter::{Node, Parser};

use crate::error::{CtidyError, Result};
use crate::source::{SourceFile, Span};
use crate::tree::{
    BinaryOp, Expr, ExprArena, ExprId, ExprKind, SizeofArg, TranslationUnit, UnaryOp,
};

/// Type spellings treated as boolean for conversion synthesis.
const BOOL_TYPE_NAMES: &[&str] = &["bool", "_Bool", "gboolean"];

/// Parse `text` as C and lower it into a [`TranslationUnit`].
pub fn lower_source(path: impl AsRef<Path>, text: String) -> Result<TranslationUnit> {
    let path = path.as_ref();
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c::LANGUAGE.into())
        .map_err(|e| CtidyError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let tree = parser.parse(&text, None).ok_or_else(|| CtidyError::Parse {
        path: path.to_path_buf(),
        detail: "parser returned no tree".to_string(),
    })?;

    if tree.root_node().has_error() {
        // tree-sitter recovers around errors; analysis proceeds on the
        // parts that did parse.
        debug!(path = %path.display(), "syntax errors present, analyzing recovered tree");
    }

    let mut lowerer = Lowerer {
        text: &text,
        arena: ExprArena::new(),
    };
    lowerer.walk(tree.root_node());
    let arena = lowerer.arena;

    Ok(TranslationUnit {
        file: SourceFile::new(path, text),
        arena,
    })
}

/// Read a file and lower it.
pub fn lower_file(path: impl AsRef<Path>) -> Result<TranslationUnit> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CtidyError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| CtidyError::Encoding {
        path: path.to_path_buf(),
    })?;
    lower_source(path, text)
}

struct Lowerer<'t> {
    text: &'t str,
    arena: ExprArena,
}

impl<'t> Lowerer<'t> {
    fn node_text(&self, node: Node) -> &'t str {
        &self.text[node.byte_range()]
    }

    fn node_span(&self, node: Node) -> Span {
        let range = node.byte_range();
        Span::new(range.start, range.end)
    }

    fn named_children<'a>(&self, node: Node<'a>) -> Vec<Node<'a>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor).collect()
    }

    fn all_children<'a>(&self, node: Node<'a>) -> Vec<Node<'a>> {
        let mut cursor = node.walk();
        node.children(&mut cursor).collect()
    }

    /// Statement-level walk: find expression roots and the contexts that
    /// imply a boolean conversion.
    fn walk(&mut self, node: Node) {
        match node.kind() {
            // Macro definition bodies are unexpanded token soup; rewriting
            // inside them is meaningless at this level.
            "preproc_def" | "preproc_function_def" => {}

            // Conditional-compilation directives: the controlling
            // expression belongs to the preprocessor, the enclosed code is
            // ordinary C.
            "preproc_if" | "preproc_ifdef" | "preproc_elif" | "preproc_else"
            | "preproc_elifdef" => {
                let condition = node.child_by_field_name("condition").map(|c| c.id());
                for child in self.named_children(node) {
                    if Some(child.id()) != condition {
                        self.walk(child);
                    }
                }
            }

            "if_statement" | "while_statement" | "do_statement" => {
                let condition = node.child_by_field_name("condition");
                if let Some(cond) = condition {
                    let root = self.lower_bool_context(cond);
                    self.arena.push_root(root);
                }
                let condition_id = condition.map(|c| c.id());
                for child in self.named_children(node) {
                    if Some(child.id()) != condition_id {
                        self.walk(child);
                    }
                }
            }

            "for_statement" => {
                if let Some(init) = node.child_by_field_name("initializer") {
                    self.walk(init);
                }
                if let Some(cond) = node.child_by_field_name("condition") {
                    let root = self.lower_bool_context(cond);
                    self.arena.push_root(root);
                }
                if let Some(update) = node.child_by_field_name("update") {
                    let root = self.lower_expr(update);
                    self.arena.push_root(root);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk(body);
                }
            }

            // A switch condition undergoes integer promotion, not a bool
            // conversion.
            "switch_statement" => {
                if let Some(cond) = node.child_by_field_name("condition") {
                    let root = self.lower_expr(cond);
                    self.arena.push_root(root);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk(body);
                }
            }

            "expression_statement" | "return_statement" => {
                for child in self.named_children(node) {
                    if is_expression_kind(child.kind()) {
                        let root = self.lower_expr(child);
                        self.arena.push_root(root);
                    } else {
                        self.walk(child);
                    }
                }
            }

            "declaration" => self.lower_declaration(node),

            kind if is_expression_kind(kind) => {
                let root = self.lower_expr(node);
                self.arena.push_root(root);
            }

            _ => {
                for child in self.named_children(node) {
                    self.walk(child);
                }
            }
        }
    }

    /// Initializers of bool-typed declarations are implicitly converted.
    fn lower_declaration(&mut self, node: Node) {
        let is_bool = node
            .child_by_field_name("type")
            .map(|ty| BOOL_TYPE_NAMES.contains(&self.node_text(ty).trim()))
            .unwrap_or(false);

        for child in self.named_children(node) {
            if child.kind() == "init_declarator" {
                if let Some(value) = child.child_by_field_name("value") {
                    let root = if is_bool {
                        self.lower_bool_context(value)
                    } else {
                        self.lower_expr(value)
                    };
                    self.arena.push_root(root);
                }
            }
        }
    }

    /// Lower an expression appearing where the language converts it to
    /// boolean, wrapping it in a synthesized conversion node.
    fn lower_bool_context(&mut self, node: Node) -> ExprId {
        let operand = self.lower_expr(node);
        let span = self.arena.get(operand).span;
        self.arena
            .alloc(Expr::new(ExprKind::BoolConversion { operand }, span))
    }

    fn lower_expr(&mut self, node: Node) -> ExprId {
        let span = self.node_span(node);
        let kind = match node.kind() {
            "number_literal" => match parse_int_literal(self.node_text(node)) {
                Some(value) => ExprKind::IntLiteral { value },
                // Floating literals and exotic spellings stay opaque.
                None => ExprKind::Opaque { children: vec![] },
            },

            "identifier" => ExprKind::Identifier {
                name: self.node_text(node).to_string(),
            },

            "parenthesized_expression" => {
                let inner = self
                    .named_children(node)
                    .into_iter()
                    .find(|c| c.kind() != "comment");
                match inner {
                    Some(inner) => ExprKind::Paren {
                        inner: self.lower_expr(inner),
                    },
                    None => ExprKind::Opaque { children: vec![] },
                }
            }

            "binary_expression" => return self.lower_binary(node),

            "unary_expression" => return self.lower_unary(node),

            "call_expression" => {
                let callee = node
                    .child_by_field_name("function")
                    .map(|f| self.lower_expr(f));
                let args: Vec<ExprId> = node
                    .child_by_field_name("arguments")
                    .map(|list| {
                        self.named_children(list)
                            .into_iter()
                            .filter(|c| c.kind() != "comment")
                            .map(|c| self.lower_expr(c))
                            .collect()
                    })
                    .unwrap_or_default();
                match callee {
                    Some(callee) => ExprKind::Call { callee, args },
                    None => ExprKind::Opaque { children: args },
                }
            }

            "sizeof_expression" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    ExprKind::Sizeof {
                        arg: SizeofArg::Type(self.node_text(ty).to_string()),
                    }
                } else if let Some(value) = node.child_by_field_name("value") {
                    ExprKind::Sizeof {
                        arg: SizeofArg::Expr(self.lower_expr(value)),
                    }
                } else {
                    ExprKind::Opaque { children: vec![] }
                }
            }

            "cast_expression" => return self.lower_cast(node),

            "conditional_expression" => {
                let cond = node.child_by_field_name("condition");
                let then_expr = node.child_by_field_name("consequence");
                let else_expr = node.child_by_field_name("alternative");
                match (cond, then_expr, else_expr) {
                    (Some(c), Some(t), Some(e)) => {
                        let cond = self.lower_bool_context(c);
                        let then_expr = self.lower_expr(t);
                        let else_expr = self.lower_expr(e);
                        ExprKind::Conditional {
                            cond,
                            then_expr,
                            else_expr,
                        }
                    }
                    _ => self.lower_opaque_children(node),
                }
            }

            // Everything else keeps its sub-expressions reachable without
            // modeling the construct itself.
            _ => self.lower_opaque_children(node),
        };

        self.arena.alloc(Expr::new(kind, span))
    }

    fn lower_opaque_children(&mut self, node: Node) -> ExprKind {
        let children = self
            .named_children(node)
            .into_iter()
            .filter(|c| c.kind() != "comment")
            .map(|c| self.lower_expr(c))
            .collect();
        ExprKind::Opaque { children }
    }

    fn lower_binary(&mut self, node: Node) -> ExprId {
        let span = self.node_span(node);
        let (left, op_node, right) = match (
            node.child_by_field_name("left"),
            node.child_by_field_name("operator"),
            node.child_by_field_name("right"),
        ) {
            (Some(l), Some(o), Some(r)) => (l, o, r),
            _ => {
                let kind = self.lower_opaque_children(node);
                return self.arena.alloc(Expr::new(kind, span));
            }
        };

        let op = match binary_op_from_token(self.node_text(op_node)) {
            Some(op) => op,
            None => {
                let children = vec![self.lower_expr(left), self.lower_expr(right)];
                return self
                    .arena
                    .alloc(Expr::new(ExprKind::Opaque { children }, span));
            }
        };

        let logical = matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr);
        let lhs = if logical {
            self.lower_bool_context(left)
        } else {
            self.lower_expr(left)
        };
        let rhs = if logical {
            self.lower_bool_context(right)
        } else {
            self.lower_expr(right)
        };

        self.arena.alloc(Expr::new(
            ExprKind::Binary {
                op,
                op_span: self.node_span(op_node),
                op_from_macro: false,
                lhs,
                rhs,
            },
            span,
        ))
    }

    fn lower_unary(&mut self, node: Node) -> ExprId {
        let span = self.node_span(node);
        let argument = match node.child_by_field_name("argument") {
            Some(a) => a,
            None => {
                let kind = self.lower_opaque_children(node);
                return self.arena.alloc(Expr::new(kind, span));
            }
        };
        let op_text = node
            .child_by_field_name("operator")
            .map(|o| self.node_text(o))
            .unwrap_or("");

        let kind = match op_text {
            "!" => ExprKind::Unary {
                op: UnaryOp::Not,
                operand: self.lower_bool_context(argument),
            },
            "-" => ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: self.lower_expr(argument),
            },
            "+" => ExprKind::Unary {
                op: UnaryOp::Plus,
                operand: self.lower_expr(argument),
            },
            "~" => ExprKind::Unary {
                op: UnaryOp::BitNot,
                operand: self.lower_expr(argument),
            },
            _ => ExprKind::Opaque {
                children: vec![self.lower_expr(argument)],
            },
        };
        self.arena.alloc(Expr::new(kind, span))
    }

    fn lower_cast(&mut self, node: Node) -> ExprId {
        let span = self.node_span(node);
        let (ty, value) = match (
            node.child_by_field_name("type"),
            node.child_by_field_name("value"),
        ) {
            (Some(t), Some(v)) => (t, v),
            _ => {
                let kind = self.lower_opaque_children(node);
                return self.arena.alloc(Expr::new(kind, span));
            }
        };

        let type_name = self.node_text(ty).to_string();
        // The parenthesized type runs from the cast's opening `(` through
        // the matching `)`; a redundant cast is removed by deleting exactly
        // that range.
        let rparen_end = self
            .all_children(node)
            .into_iter()
            .find(|c| c.kind() == ")")
            .map(|c| c.end_byte())
            .unwrap_or(ty.end_byte());
        let type_span = Span::new(node.start_byte(), rparen_end);

        let operand = if BOOL_TYPE_NAMES.contains(&type_name.trim()) {
            self.lower_bool_context(value)
        } else {
            self.lower_expr(value)
        };

        self.arena.alloc(Expr::new(
            ExprKind::Cast {
                type_name,
                type_span,
                operand,
            },
            span,
        ))
    }
}

fn is_expression_kind(kind: &str) -> bool {
    matches!(
        kind,
        "number_literal"
            | "identifier"
            | "parenthesized_expression"
            | "binary_expression"
            | "unary_expression"
            | "call_expression"
            | "sizeof_expression"
            | "cast_expression"
            | "conditional_expression"
            | "assignment_expression"
            | "update_expression"
            | "pointer_expression"
            | "field_expression"
            | "subscript_expression"
            | "comma_expression"
            | "char_literal"
            | "string_literal"
            | "concatenated_string"
            | "compound_literal_expression"
    )
}

fn binary_op_from_token(token: &str) -> Option<BinaryOp> {
    Some(match token {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Rem,
        "<<" => BinaryOp::Shl,
        ">>" => BinaryOp::Shr,
        "&" => BinaryOp::BitAnd,
        "|" => BinaryOp::BitOr,
        "^" => BinaryOp::BitXor,
        "&&" => BinaryOp::LogicalAnd,
        "||" => BinaryOp::LogicalOr,
        "<" => BinaryOp::Lt,
        ">" => BinaryOp::Gt,
        "<=" => BinaryOp::Le,
        ">=" => BinaryOp::Ge,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        _ => return None,
    })
}

/// Parse a C integer literal (decimal, hex, octal, binary; size/signedness
/// suffixes and digit separators ignored). Returns `None` for floating
/// literals.
fn parse_int_literal(text: &str) -> Option<BigInt> {
    let cleaned: String = text.chars().filter(|c| *c != '\'').collect();
    let body = cleaned
        .trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .to_string();

    if body.is_empty() {
        return None;
    }

    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.contains('.') || hex.contains('p') || hex.contains('P') {
            return None;
        }
        return BigInt::parse_bytes(hex.as_bytes(), 16);
    }
    if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        return BigInt::parse_bytes(bin.as_bytes(), 2);
    }
    if body.contains('.') || body.contains('e') || body.contains('E') {
        return None;
    }
    if body.len() > 1 && body.starts_with('0') {
        return BigInt::parse_bytes(body[1..].as_bytes(), 8);
    }
    BigInt::parse_bytes(body.as_bytes(), 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ExprKind;

    fn lower(src: &str) -> TranslationUnit {
        lower_source("test.c", src.to_string()).expect("lowering failed")
    }

    /// Find the first node satisfying a predicate, preorder.
    fn find(unit: &TranslationUnit, pred: impl Fn(&ExprKind) -> bool) -> Option<ExprId> {
        fn visit(
            arena: &ExprArena,
            id: ExprId,
            pred: &impl Fn(&ExprKind) -> bool,
        ) -> Option<ExprId> {
            if pred(&arena.get(id).kind) {
                return Some(id);
            }
            for child in arena.children(id) {
                if let Some(found) = visit(arena, child, pred) {
                    return Some(found);
                }
            }
            None
        }
        for root in unit.arena.roots() {
            if let Some(found) = visit(&unit.arena, *root, &pred) {
                return Some(found);
            }
        }
        None
    }

    #[test]
    fn lowers_rounding_shape() {
        let unit = lower("int f(int a) { return (a + 4095) / 4096 * 4096; }");
        let mul = find(&unit, |k| {
            matches!(
                k,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )
        })
        .expect("mul lowered");
        assert_eq!(
            unit.file.snippet(unit.arena.get(mul)),
            Some("(a + 4095) / 4096 * 4096")
        );
    }

    #[test]
    fn condition_positions_get_bool_conversions() {
        let unit = lower("void f(int x) { if (x) {} while (1) {} }");
        let mut conversions = 0;
        for root in unit.arena.roots() {
            if matches!(
                unit.arena.get(*root).kind,
                ExprKind::BoolConversion { .. }
            ) {
                conversions += 1;
            }
        }
        assert_eq!(conversions, 2);
    }

    #[test]
    fn logical_operands_get_bool_conversions() {
        let unit = lower("void f(int x) { int y = x && 1; }");
        let conv = find(&unit, |k| matches!(k, ExprKind::BoolConversion { .. }));
        assert!(conv.is_some());
    }

    #[test]
    fn bool_declarations_wrap_initializers() {
        let unit = lower("void f(void) { bool ok = 1; }");
        let root = unit.arena.roots()[0];
        assert!(matches!(
            unit.arena.get(root).kind,
            ExprKind::BoolConversion { .. }
        ));
    }

    #[test]
    fn int_declarations_do_not_wrap_initializers() {
        let unit = lower("void f(void) { int n = 1; }");
        let root = unit.arena.roots()[0];
        assert!(matches!(
            unit.arena.get(root).kind,
            ExprKind::IntLiteral { .. }
        ));
    }

    #[test]
    fn sizeof_type_and_expr_forms() {
        let unit = lower("void f(int *p) { malloc(sizeof(int)); malloc(sizeof(*p)); }");
        let ty = find(&unit, |k| {
            matches!(k, ExprKind::Sizeof { arg: SizeofArg::Type(t) } if t == "int")
        });
        assert!(ty.is_some(), "type-operand sizeof lowered");
        let ex = find(&unit, |k| {
            matches!(k, ExprKind::Sizeof { arg: SizeofArg::Expr(_) })
        });
        assert!(ex.is_some(), "expression-operand sizeof lowered");
    }

    #[test]
    fn cast_type_span_covers_parenthesized_type() {
        let src = "void f(void) { char *p = (char *)malloc(sizeof(char)); }";
        let unit = lower(src);
        let cast = find(&unit, |k| matches!(k, ExprKind::Cast { .. })).expect("cast lowered");
        if let ExprKind::Cast { type_span, .. } = &unit.arena.get(cast).kind {
            assert_eq!(unit.file.slice(*type_span), Some("(char *)"));
        }
    }

    #[test]
    fn macro_definitions_are_not_lowered() {
        let unit = lower("#define ALIGN(x, a) (((x) + (a) - 1) / (a) * (a))\nint g;\n");
        let div = find(&unit, |k| {
            matches!(
                k,
                ExprKind::Binary {
                    op: BinaryOp::Div,
                    ..
                }
            )
        });
        assert!(div.is_none(), "macro body must stay opaque");
    }

    #[test]
    fn ternary_condition_is_bool_context() {
        let unit = lower("int f(int x) { return x ? 1 : 2; }");
        let cond = find(&unit, |k| matches!(k, ExprKind::Conditional { .. })).unwrap();
        if let ExprKind::Conditional { cond, .. } = unit.arena.get(cond).kind {
            assert!(matches!(
                unit.arena.get(cond).kind,
                ExprKind::BoolConversion { .. }
            ));
        }
    }

    #[test]
    fn integer_literal_spellings() {
        assert_eq!(parse_int_literal("42"), Some(42.into()));
        assert_eq!(parse_int_literal("0x10"), Some(16.into()));
        assert_eq!(parse_int_literal("010"), Some(8.into()));
        assert_eq!(parse_int_literal("0b101"), Some(5.into()));
        assert_eq!(parse_int_literal("4096UL"), Some(4096.into()));
        assert_eq!(parse_int_literal("1'000'000"), Some(1_000_000.into()));
        assert_eq!(parse_int_literal("1.5"), None);
        assert_eq!(parse_int_literal("1e3"), None);
    }

    #[test]
    fn preproc_if_bodies_are_lowered() {
        let unit = lower("#if FOO\nvoid f(int a) { int x = a / 8 * 8; }\n#endif\n");
        let mul = find(&unit, |k| {
            matches!(
                k,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )
        });
        assert!(mul.is_some(), "code under #if is ordinary C");
    }
}
