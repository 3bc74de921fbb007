//! Visitor and mutator protocol over the IR
//!
//! A pass implements [`IRVisitor`] (read-only) or [`IRMutator`] (rewriting)
//! and overrides only the entry points it cares about; the `walk_*` /
//! `mutate_*_children` helpers supply default recursion over every variant in
//! syntactic order. The default mutator is the identity: it returns children
//! unchanged by pointer, and rebuilds a node only when at least one child
//! actually changed, so untouched subtrees stay shared.

use super::{Expr, ExprNode, Range, Stmt, StmtNode};

/// Read-only traversal over expressions and statements
pub trait IRVisitor {
    fn visit_expr(&mut self, e: &Expr) {
        walk_expr(self, e);
    }

    fn visit_stmt(&mut self, s: &Stmt) {
        walk_stmt(self, s);
    }
}

/// Default recursion for [`IRVisitor::visit_expr`]: visit each child in
/// syntactic order
pub fn walk_expr<V: IRVisitor + ?Sized>(v: &mut V, e: &Expr) {
    match e.node() {
        ExprNode::IntImm { .. } | ExprNode::FloatImm { .. } | ExprNode::Variable { .. } => {}
        ExprNode::Cast { value, .. } => v.visit_expr(value),
        ExprNode::Add { a, b }
        | ExprNode::Sub { a, b }
        | ExprNode::Mul { a, b }
        | ExprNode::Div { a, b }
        | ExprNode::Mod { a, b }
        | ExprNode::Min { a, b }
        | ExprNode::Max { a, b }
        | ExprNode::Eq { a, b }
        | ExprNode::Ne { a, b }
        | ExprNode::Lt { a, b }
        | ExprNode::Le { a, b }
        | ExprNode::Gt { a, b }
        | ExprNode::Ge { a, b }
        | ExprNode::And { a, b }
        | ExprNode::Or { a, b } => {
            v.visit_expr(a);
            v.visit_expr(b);
        }
        ExprNode::Not { a } => v.visit_expr(a),
        ExprNode::Select {
            condition,
            true_value,
            false_value,
        } => {
            v.visit_expr(condition);
            v.visit_expr(true_value);
            v.visit_expr(false_value);
        }
        ExprNode::Load { index, .. } => v.visit_expr(index),
        ExprNode::Ramp { base, stride, .. } => {
            v.visit_expr(base);
            v.visit_expr(stride);
        }
        ExprNode::Broadcast { value, .. } => v.visit_expr(value),
        ExprNode::Call { args, .. } => {
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprNode::Let { value, body, .. } => {
            v.visit_expr(value);
            v.visit_expr(body);
        }
    }
}

/// Default recursion for [`IRVisitor::visit_stmt`]
pub fn walk_stmt<V: IRVisitor + ?Sized>(v: &mut V, s: &Stmt) {
    match s.node() {
        StmtNode::LetStmt { value, body, .. } => {
            v.visit_expr(value);
            v.visit_stmt(body);
        }
        StmtNode::AssertStmt { condition, .. } => v.visit_expr(condition),
        StmtNode::Pipeline {
            produce,
            update,
            consume,
            ..
        } => {
            v.visit_stmt(produce);
            if let Some(update) = update {
                v.visit_stmt(update);
            }
            v.visit_stmt(consume);
        }
        StmtNode::For {
            min, extent, body, ..
        } => {
            v.visit_expr(min);
            v.visit_expr(extent);
            v.visit_stmt(body);
        }
        StmtNode::Store { value, index, .. } => {
            v.visit_expr(value);
            v.visit_expr(index);
        }
        StmtNode::Provide { value, site, .. } => {
            v.visit_expr(value);
            for coord in site {
                v.visit_expr(coord);
            }
        }
        StmtNode::Allocate { size, body, .. } => {
            v.visit_expr(size);
            v.visit_stmt(body);
        }
        StmtNode::Free { .. } => {}
        StmtNode::Realize { bounds, body, .. } => {
            for range in bounds {
                v.visit_expr(&range.min);
                v.visit_expr(&range.extent);
            }
            v.visit_stmt(body);
        }
        StmtNode::Block { first, rest } => {
            v.visit_stmt(first);
            v.visit_stmt(rest);
        }
    }
}

/// Rewriting traversal over expressions and statements
///
/// Implementations must preserve the IR invariants: in particular, a mutator
/// that rewrites `Variable` references must leave parameter variables alone.
pub trait IRMutator {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        mutate_expr_children(self, e)
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        mutate_stmt_children(self, s)
    }
}

macro_rules! binary_op {
    ($m:expr, $e:expr, $a:expr, $b:expr, $make:path) => {{
        let na = $m.mutate_expr($a);
        let nb = $m.mutate_expr($b);
        if na.same_as($a) && nb.same_as($b) {
            $e.clone()
        } else {
            $make(na, nb)
        }
    }};
}

/// Default recursion for [`IRMutator::mutate_expr`]: mutate each child and
/// rebuild the node only if something changed
pub fn mutate_expr_children<M: IRMutator + ?Sized>(m: &mut M, e: &Expr) -> Expr {
    match e.node() {
        ExprNode::IntImm { .. } | ExprNode::FloatImm { .. } | ExprNode::Variable { .. } => {
            e.clone()
        }
        ExprNode::Cast { ty, value } => {
            let nv = m.mutate_expr(value);
            if nv.same_as(value) {
                e.clone()
            } else {
                Expr::cast(*ty, nv)
            }
        }
        ExprNode::Add { a, b } => binary_op!(m, e, a, b, Expr::add),
        ExprNode::Sub { a, b } => binary_op!(m, e, a, b, Expr::sub),
        ExprNode::Mul { a, b } => binary_op!(m, e, a, b, Expr::mul),
        ExprNode::Div { a, b } => binary_op!(m, e, a, b, Expr::div),
        ExprNode::Mod { a, b } => binary_op!(m, e, a, b, Expr::modulo),
        ExprNode::Min { a, b } => binary_op!(m, e, a, b, Expr::min),
        ExprNode::Max { a, b } => binary_op!(m, e, a, b, Expr::max),
        ExprNode::Eq { a, b } => binary_op!(m, e, a, b, Expr::eq),
        ExprNode::Ne { a, b } => binary_op!(m, e, a, b, Expr::ne),
        ExprNode::Lt { a, b } => binary_op!(m, e, a, b, Expr::lt),
        ExprNode::Le { a, b } => binary_op!(m, e, a, b, Expr::le),
        ExprNode::Gt { a, b } => binary_op!(m, e, a, b, Expr::gt),
        ExprNode::Ge { a, b } => binary_op!(m, e, a, b, Expr::ge),
        ExprNode::And { a, b } => binary_op!(m, e, a, b, Expr::and),
        ExprNode::Or { a, b } => binary_op!(m, e, a, b, Expr::or),
        ExprNode::Not { a } => {
            let na = m.mutate_expr(a);
            if na.same_as(a) {
                e.clone()
            } else {
                Expr::not(na)
            }
        }
        ExprNode::Select {
            condition,
            true_value,
            false_value,
        } => {
            let nc = m.mutate_expr(condition);
            let nt = m.mutate_expr(true_value);
            let nf = m.mutate_expr(false_value);
            if nc.same_as(condition) && nt.same_as(true_value) && nf.same_as(false_value) {
                e.clone()
            } else {
                Expr::select(nc, nt, nf)
            }
        }
        ExprNode::Load { ty, name, index } => {
            let ni = m.mutate_expr(index);
            if ni.same_as(index) {
                e.clone()
            } else {
                Expr::load(*ty, name.clone(), ni)
            }
        }
        ExprNode::Ramp {
            base,
            stride,
            lanes,
        } => {
            let nb = m.mutate_expr(base);
            let ns = m.mutate_expr(stride);
            if nb.same_as(base) && ns.same_as(stride) {
                e.clone()
            } else {
                Expr::ramp(nb, ns, *lanes)
            }
        }
        ExprNode::Broadcast { value, lanes } => {
            let nv = m.mutate_expr(value);
            if nv.same_as(value) {
                e.clone()
            } else {
                Expr::broadcast(nv, *lanes)
            }
        }
        ExprNode::Call {
            ty,
            name,
            args,
            call_type,
            func,
        } => {
            let (new_args, changed) = mutate_exprs(m, args);
            if changed {
                Expr::call(*ty, name.clone(), new_args, *call_type, func.clone())
            } else {
                e.clone()
            }
        }
        ExprNode::Let { name, value, body } => {
            let nv = m.mutate_expr(value);
            let nb = m.mutate_expr(body);
            if nv.same_as(value) && nb.same_as(body) {
                e.clone()
            } else {
                Expr::let_in(name.clone(), nv, nb)
            }
        }
    }
}

/// Mutate a slice of expressions, reporting whether any changed
pub fn mutate_exprs<M: IRMutator + ?Sized>(m: &mut M, exprs: &[Expr]) -> (Vec<Expr>, bool) {
    let mut changed = false;
    let out = exprs
        .iter()
        .map(|e| {
            let ne = m.mutate_expr(e);
            changed |= !ne.same_as(e);
            ne
        })
        .collect();
    (out, changed)
}

/// Default recursion for [`IRMutator::mutate_stmt`]
pub fn mutate_stmt_children<M: IRMutator + ?Sized>(m: &mut M, s: &Stmt) -> Stmt {
    match s.node() {
        StmtNode::LetStmt { name, value, body } => {
            let nv = m.mutate_expr(value);
            let nb = m.mutate_stmt(body);
            if nv.same_as(value) && nb.same_as(body) {
                s.clone()
            } else {
                Stmt::let_stmt(name.clone(), nv, nb)
            }
        }
        StmtNode::AssertStmt { condition, message } => {
            let nc = m.mutate_expr(condition);
            if nc.same_as(condition) {
                s.clone()
            } else {
                Stmt::assert_stmt(nc, message.clone())
            }
        }
        StmtNode::Pipeline {
            name,
            produce,
            update,
            consume,
        } => {
            let np = m.mutate_stmt(produce);
            let nu = update.as_ref().map(|u| m.mutate_stmt(u));
            let nc = m.mutate_stmt(consume);
            let update_unchanged = match (&nu, update) {
                (Some(nu), Some(u)) => nu.same_as(u),
                (None, None) => true,
                _ => false,
            };
            if np.same_as(produce) && update_unchanged && nc.same_as(consume) {
                s.clone()
            } else {
                Stmt::pipeline(name.clone(), np, nu, nc)
            }
        }
        StmtNode::For {
            name,
            min,
            extent,
            for_type,
            body,
        } => {
            let nmin = m.mutate_expr(min);
            let next = m.mutate_expr(extent);
            let nb = m.mutate_stmt(body);
            if nmin.same_as(min) && next.same_as(extent) && nb.same_as(body) {
                s.clone()
            } else {
                Stmt::for_loop(name.clone(), nmin, next, *for_type, nb)
            }
        }
        StmtNode::Store { name, value, index } => {
            let nv = m.mutate_expr(value);
            let ni = m.mutate_expr(index);
            if nv.same_as(value) && ni.same_as(index) {
                s.clone()
            } else {
                Stmt::store(name.clone(), nv, ni)
            }
        }
        StmtNode::Provide { name, value, site } => {
            let nv = m.mutate_expr(value);
            let (nsite, site_changed) = mutate_exprs(m, site);
            if nv.same_as(value) && !site_changed {
                s.clone()
            } else {
                Stmt::provide(name.clone(), nv, nsite)
            }
        }
        StmtNode::Allocate {
            name,
            ty,
            size,
            body,
        } => {
            let nsize = m.mutate_expr(size);
            let nb = m.mutate_stmt(body);
            if nsize.same_as(size) && nb.same_as(body) {
                s.clone()
            } else {
                Stmt::allocate(name.clone(), *ty, nsize, nb)
            }
        }
        StmtNode::Free { .. } => s.clone(),
        StmtNode::Realize {
            name,
            ty,
            bounds,
            body,
        } => {
            let mut changed = false;
            let nbounds: Vec<Range> = bounds
                .iter()
                .map(|r| {
                    let nmin = m.mutate_expr(&r.min);
                    let next = m.mutate_expr(&r.extent);
                    changed |= !nmin.same_as(&r.min) || !next.same_as(&r.extent);
                    Range::new(nmin, next)
                })
                .collect();
            let nb = m.mutate_stmt(body);
            if !changed && nb.same_as(body) {
                s.clone()
            } else {
                Stmt::realize(name.clone(), *ty, nbounds, nb)
            }
        }
        StmtNode::Block { first, rest } => {
            let nf = m.mutate_stmt(first);
            let nr = m.mutate_stmt(rest);
            if nf.same_as(first) && nr.same_as(rest) {
                s.clone()
            } else {
                Stmt::block(nf, nr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ForType;

    struct Identity;
    impl IRMutator for Identity {}

    struct CountVars {
        count: usize,
    }
    impl IRVisitor for CountVars {
        fn visit_expr(&mut self, e: &Expr) {
            if matches!(e.node(), ExprNode::Variable { .. }) {
                self.count += 1;
            }
            walk_expr(self, e);
        }
    }

    fn sample_stmt() -> Stmt {
        let x = Expr::var("f.x");
        let y = Expr::var("f.y");
        let value = Expr::add(Expr::mul(x.clone(), y.clone()), Expr::int(1));
        let provide = Stmt::provide("f", value, vec![x, y]);
        let inner = Stmt::for_loop(
            "f.x",
            Expr::var("f.x.min"),
            Expr::var("f.x.extent"),
            ForType::Serial,
            provide,
        );
        Stmt::for_loop(
            "f.y",
            Expr::var("f.y.min"),
            Expr::var("f.y.extent"),
            ForType::Serial,
            inner,
        )
    }

    #[test]
    fn test_default_mutator_is_identity() {
        let s = sample_stmt();
        let out = Identity.mutate_stmt(&s);
        assert!(out.same_as(&s));
    }

    #[test]
    fn test_default_mutator_is_identity_on_storage_nodes() {
        use crate::ir::{Range, Type};

        let store = Stmt::store("buf", Expr::int(7), Expr::var("i"));
        let body = Stmt::block(store, Stmt::free("buf"));
        let alloc = Stmt::allocate("buf", Type::uint(8), Expr::int(64), body);
        let realized = Stmt::realize(
            "buf",
            Type::uint(8),
            vec![Range::new(Expr::int(0), Expr::int(64))],
            alloc,
        );
        let s = Stmt::pipeline(
            "buf",
            realized,
            None,
            Stmt::assert_stmt(Expr::lt(Expr::var("i"), Expr::int(64)), "in range"),
        );

        let out = Identity.mutate_stmt(&s);
        assert!(out.same_as(&s));
    }

    #[test]
    fn test_visitor_reaches_every_expr() {
        let mut v = CountVars { count: 0 };
        v.visit_stmt(&sample_stmt());
        // f.x, f.y in the value, the two site coordinates, and two loop
        // bounds vars per loop.
        assert_eq!(v.count, 8);
    }
}
