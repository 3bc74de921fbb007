//! Variable substitution and name qualification

use crate::ir::visit::{mutate_expr_children, mutate_stmt_children, IRMutator};
use crate::ir::{Expr, ExprNode, Stmt, StmtNode};

struct Substitute<'a> {
    name: &'a str,
    replacement: &'a Expr,
}

impl IRMutator for Substitute<'_> {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        match e.node() {
            ExprNode::Variable { name, .. } if name == self.name => self.replacement.clone(),
            // A Let that rebinds the name shadows it for the body.
            ExprNode::Let { name, value, body } if name == self.name => {
                let nv = self.mutate_expr(value);
                if nv.same_as(value) {
                    e.clone()
                } else {
                    Expr::let_in(name.clone(), nv, body.clone())
                }
            }
            _ => mutate_expr_children(self, e),
        }
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        match s.node() {
            StmtNode::LetStmt { name, value, body } if name == self.name => {
                let nv = self.mutate_expr(value);
                if nv.same_as(value) {
                    s.clone()
                } else {
                    Stmt::let_stmt(name.clone(), nv, body.clone())
                }
            }
            StmtNode::For {
                name,
                min,
                extent,
                for_type,
                body,
            } if name == self.name => {
                let nmin = self.mutate_expr(min);
                let next = self.mutate_expr(extent);
                if nmin.same_as(min) && next.same_as(extent) {
                    s.clone()
                } else {
                    Stmt::for_loop(name.clone(), nmin, next, *for_type, body.clone())
                }
            }
            _ => mutate_stmt_children(self, s),
        }
    }
}

/// Replace every free occurrence of the variable `name` in `e`
pub fn substitute(name: &str, replacement: &Expr, e: &Expr) -> Expr {
    Substitute { name, replacement }.mutate_expr(e)
}

/// Replace every free occurrence of the variable `name` in `s`
pub fn substitute_in_stmt(name: &str, replacement: &Expr, s: &Stmt) -> Stmt {
    Substitute { name, replacement }.mutate_stmt(s)
}

struct QualifyExpr<'a> {
    prefix: &'a str,
}

impl IRMutator for QualifyExpr<'_> {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        match e.node() {
            ExprNode::Variable {
                ty,
                name,
                reduction_domain,
                param,
            } => {
                if param.is_some() {
                    e.clone()
                } else {
                    Expr::variable(
                        *ty,
                        format!("{}{}", self.prefix, name),
                        reduction_domain.clone(),
                        None,
                    )
                }
            }
            ExprNode::Let { name, value, body } => {
                let nv = self.mutate_expr(value);
                let nb = self.mutate_expr(body);
                Expr::let_in(format!("{}{}", self.prefix, name), nv, nb)
            }
            _ => mutate_expr_children(self, e),
        }
    }
}

/// Prefix every non-parameter variable and `Let` binding in `e` with `prefix`
///
/// This moves a function's body from its local variable namespace into the
/// dotted namespace used by the surrounding loop nest (`f.x`, `f.x.min`, …).
/// Parameter references are left untouched.
pub fn qualify_expr(prefix: &str, e: &Expr) -> Expr {
    QualifyExpr { prefix }.mutate_expr(e)
}
