//! Arithmetic and helper operations over [`Expr`]
//!
//! The `std::ops` impls and the free helpers here are the normal way to build
//! compound expressions. They apply light constant folding (integer immediate
//! arithmetic and the obvious identities) so the bounds and loop extents
//! synthesized during lowering stay readable. Passes that must rebuild a node
//! exactly as written use the raw `Expr` constructors instead.

use super::{Expr, ExprNode, Type};

fn fold2(a: &Expr, b: &Expr, f: impl Fn(i32, i32) -> i32) -> Option<Expr> {
    match (a.as_int_imm(), b.as_int_imm()) {
        (Some(va), Some(vb)) => Some(Expr::int(f(va, vb))),
        _ => None,
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        if let Some(folded) = fold2(&self, &rhs, i32::wrapping_add) {
            return folded;
        }
        if rhs.is_const_zero() {
            return self;
        }
        if self.is_const_zero() {
            return rhs;
        }
        Expr::add(self, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        if let Some(folded) = fold2(&self, &rhs, i32::wrapping_sub) {
            return folded;
        }
        if rhs.is_const_zero() {
            return self;
        }
        Expr::sub(self, rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        if let Some(folded) = fold2(&self, &rhs, i32::wrapping_mul) {
            return folded;
        }
        if rhs.is_const_one() {
            return self;
        }
        if self.is_const_one() {
            return rhs;
        }
        Expr::mul(self, rhs)
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        if let Some(vb) = rhs.as_int_imm() {
            if vb != 0 {
                if let Some(va) = self.as_int_imm() {
                    return Expr::int(va.wrapping_div(vb));
                }
            }
            if vb == 1 {
                return self;
            }
        }
        Expr::div(self, rhs)
    }
}

impl std::ops::Rem for Expr {
    type Output = Expr;

    fn rem(self, rhs: Expr) -> Expr {
        if let Some(vb) = rhs.as_int_imm() {
            if vb != 0 {
                if let Some(va) = self.as_int_imm() {
                    return Expr::int(va.wrapping_rem(vb));
                }
            }
        }
        Expr::modulo(self, rhs)
    }
}

macro_rules! scalar_rhs_op {
    ($trait_:ident, $method:ident) => {
        impl std::ops::$trait_<i32> for Expr {
            type Output = Expr;

            fn $method(self, rhs: i32) -> Expr {
                std::ops::$trait_::$method(self, Expr::int(rhs))
            }
        }
    };
}

scalar_rhs_op!(Add, add);
scalar_rhs_op!(Sub, sub);
scalar_rhs_op!(Mul, mul);
scalar_rhs_op!(Div, div);
scalar_rhs_op!(Rem, rem);

/// The smaller of two expressions, folding constant operands
pub fn min(a: Expr, b: Expr) -> Expr {
    if let Some(folded) = fold2(&a, &b, i32::min) {
        return folded;
    }
    Expr::min(a, b)
}

/// The larger of two expressions, folding constant operands
pub fn max(a: Expr, b: Expr) -> Expr {
    if let Some(folded) = fold2(&a, &b, i32::max) {
        return folded;
    }
    Expr::max(a, b)
}

/// Lane-wise `condition ? true_value : false_value`
pub fn select(condition: Expr, true_value: Expr, false_value: Expr) -> Expr {
    Expr::select(condition, true_value, false_value)
}

/// Convert an expression to another type, dropping a no-op cast
pub fn cast(ty: Type, value: Expr) -> Expr {
    if value.ty() == ty {
        return value;
    }
    Expr::cast(ty, value)
}

/// `(a + b - 1) / b`, the number of size-`b` chunks covering `a` of them
pub fn ceil_div(a: Expr, b: Expr) -> Expr {
    (a + b.clone() - 1) / b
}

impl Expr {
    /// Is this a constant immediate (of either numeric kind)?
    pub fn is_immediate(&self) -> bool {
        matches!(
            self.node(),
            ExprNode::IntImm { .. } | ExprNode::FloatImm { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_folding() {
        assert_eq!((Expr::int(2) + Expr::int(3)).as_int_imm(), Some(5));
        assert_eq!((Expr::int(7) - Expr::int(3)).as_int_imm(), Some(4));
        assert_eq!((Expr::int(6) * Expr::int(7)).as_int_imm(), Some(42));
        assert_eq!((Expr::int(9) / Expr::int(2)).as_int_imm(), Some(4));
        assert_eq!((Expr::int(9) % Expr::int(4)).as_int_imm(), Some(1));
        assert_eq!(min(Expr::int(3), Expr::int(5)).as_int_imm(), Some(3));
        assert_eq!(max(Expr::int(3), Expr::int(5)).as_int_imm(), Some(5));
    }

    #[test]
    fn test_identity_folding() {
        let x = Expr::var("x");
        assert!((x.clone() + 0).same_as(&x));
        assert!((x.clone() * 1).same_as(&x));
        assert!((x.clone() - 0).same_as(&x));
        assert!((x.clone() / 1).same_as(&x));
    }

    #[test]
    fn test_symbolic_stays_symbolic() {
        let x = Expr::var("x");
        let sum = x.clone() + 1;
        assert!(matches!(sum.node(), ExprNode::Add { .. }));
        let m = min(x, Expr::int(4));
        assert!(matches!(m.node(), ExprNode::Min { .. }));
    }

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(Expr::int(10), Expr::int(4)).as_int_imm(), Some(3));
        let e = ceil_div(Expr::var("n"), Expr::int(4));
        assert!(matches!(e.node(), ExprNode::Div { .. }));
    }
}
