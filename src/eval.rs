//! Compile-time constant evaluation over the reduced expression tree.
//!
//! Folds a sub-expression to an arbitrary-precision signed integer, or
//! reports that the value is not known at analysis time. Failure here is a
//! normal, expected outcome -- most operands are variables -- so the result
//! is an `Option`, never an error.
//!
//! Width and signedness of the surrounding C type are intentionally not
//! modeled: the checks only need value equality and power-of-two tests, and
//! the host's own semantic analysis is authoritative for anything finer.

use num_bigint::BigInt;
use num_bigint::Sign;

use crate::tree::{BinaryOp, ExprArena, ExprId, ExprKind, UnaryOp};

/// Shift amounts beyond this are treated as unresolvable rather than
/// materializing absurdly large integers.
const MAX_SHIFT: u64 = 4096;

/// Attempt to fold `id` to an integer constant.
pub fn evaluate(arena: &ExprArena, id: ExprId) -> Option<BigInt> {
    let expr = arena.get(id);
    if expr.value_dependent {
        return None;
    }
    match &expr.kind {
        ExprKind::IntLiteral { value } => Some(value.clone()),
        ExprKind::Paren { inner } => evaluate(arena, *inner),
        ExprKind::BoolConversion { operand } => {
            let v = evaluate(arena, *operand)?;
            Some(BigInt::from(i32::from(v.sign() != Sign::NoSign)))
        }
        // The surrounding type's width is host territory; fold through.
        ExprKind::Cast { operand, .. } => evaluate(arena, *operand),
        ExprKind::Unary { op, operand } => {
            let v = evaluate(arena, *operand)?;
            Some(match op {
                UnaryOp::Neg => -v,
                UnaryOp::Plus => v,
                UnaryOp::BitNot => -v - 1,
                UnaryOp::Not => BigInt::from(i32::from(v.sign() == Sign::NoSign)),
            })
        }
        ExprKind::Binary { op, lhs, rhs, .. } => {
            let l = evaluate(arena, *lhs)?;
            let r = evaluate(arena, *rhs)?;
            eval_binary(*op, l, r)
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            let c = evaluate(arena, *cond)?;
            if c.sign() != Sign::NoSign {
                evaluate(arena, *then_expr)
            } else {
                evaluate(arena, *else_expr)
            }
        }
        // Identifiers would need the host's symbol table; sizeof would need
        // target layout. Both are opaque to this evaluator.
        ExprKind::Identifier { .. }
        | ExprKind::Call { .. }
        | ExprKind::Sizeof { .. }
        | ExprKind::Opaque { .. } => None,
    }
}

fn eval_binary(op: BinaryOp, l: BigInt, r: BigInt) -> Option<BigInt> {
    let truth = |b: bool| BigInt::from(i32::from(b));
    let is_true = |v: &BigInt| v.sign() != Sign::NoSign;
    Some(match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r.sign() == Sign::NoSign {
                return None;
            }
            l / r
        }
        BinaryOp::Rem => {
            if r.sign() == Sign::NoSign {
                return None;
            }
            l % r
        }
        BinaryOp::Shl => l << checked_shift(&r)?,
        BinaryOp::Shr => l >> checked_shift(&r)?,
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::LogicalAnd => truth(is_true(&l) && is_true(&r)),
        BinaryOp::LogicalOr => truth(is_true(&l) || is_true(&r)),
        BinaryOp::Lt => truth(l < r),
        BinaryOp::Gt => truth(l > r),
        BinaryOp::Le => truth(l <= r),
        BinaryOp::Ge => truth(l >= r),
        BinaryOp::Eq => truth(l == r),
        BinaryOp::Ne => truth(l != r),
    })
}

fn checked_shift(amount: &BigInt) -> Option<u64> {
    let (sign, digits) = amount.to_u64_digits();
    if sign == Sign::Minus || digits.len() > 1 {
        return None;
    }
    let value = digits.first().copied().unwrap_or(0);
    if value > MAX_SHIFT {
        return None;
    }
    Some(value)
}

/// Whether `value` is a positive, exact power of two.
pub fn is_power_of_two(value: &BigInt) -> bool {
    if value.sign() != Sign::Plus {
        return false;
    }
    (value & (value - 1u8)).sign() == Sign::NoSign
}
