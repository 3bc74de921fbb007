//! Symbolic bounds analysis over the IR
//!
//! Lowering needs to know, for a statement it is about to wrap, which
//! rectangular region of each buffer the statement can touch. Free variables
//! stay symbolic: the analysis answers with `Expr`-valued intervals that may
//! reference loop variables still in scope, building `Min`/`Max` nodes where
//! a sign is unknown rather than giving up. An interval end it cannot bound
//! is reported as `None`, and converting such a region into concrete ranges
//! is the point where lowering fails with a diagnostic.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::ir::visit::{walk_expr, walk_stmt, IRVisitor};
use crate::ir::{ops, CallType, Expr, ExprNode, Range, Stmt, StmtNode, Type};
use crate::scope::Scope;

/// A symbolic inclusive interval `[min, max]`
///
/// `None` on either end means the analysis could not bound that end.
#[derive(Debug, Clone)]
pub struct Interval {
    pub min: Option<Expr>,
    pub max: Option<Expr>,
}

impl Interval {
    pub fn new(min: Option<Expr>, max: Option<Expr>) -> Interval {
        Interval { min, max }
    }

    /// The interval containing exactly one value
    pub fn single_point(e: Expr) -> Interval {
        Interval {
            min: Some(e.clone()),
            max: Some(e),
        }
    }

    /// The interval with no known bounds
    pub fn unbounded() -> Interval {
        Interval {
            min: None,
            max: None,
        }
    }

    /// Are both ends known?
    pub fn is_bounded(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    /// If min and max are the same expression, that expression
    pub fn as_single_point(&self) -> Option<&Expr> {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) if min.same_as(max) => Some(min),
            _ => None,
        }
    }

    /// The number of values covered: `max - min + 1`
    pub fn extent(&self) -> Option<Expr> {
        let min = self.min.clone()?;
        let max = self.max.clone()?;
        Some(max - min + 1)
    }
}

fn both(a: Option<Expr>, b: Option<Expr>, f: impl Fn(Expr, Expr) -> Expr) -> Option<Expr> {
    Some(f(a?, b?))
}

/// Multiply an interval by a single-point factor
fn scale(iv: Interval, factor: &Expr) -> Interval {
    if let Some(v) = factor.as_int_imm() {
        let mul = |end: Option<Expr>| both(end, Some(factor.clone()), |a, b| a * b);
        if v >= 0 {
            Interval::new(mul(iv.min), mul(iv.max))
        } else {
            Interval::new(mul(iv.max), mul(iv.min))
        }
    } else {
        // Sign unknown: both candidate endpoints, if we have both ends.
        match (iv.min, iv.max) {
            (Some(min), Some(max)) => {
                let a = min * factor.clone();
                let b = max * factor.clone();
                Interval::new(
                    Some(ops::min(a.clone(), b.clone())),
                    Some(ops::max(a, b)),
                )
            }
            _ => Interval::unbounded(),
        }
    }
}

/// Divide an interval by a single-point divisor
fn scale_div(iv: Interval, divisor: &Expr) -> Interval {
    match divisor.as_int_imm() {
        Some(0) => Interval::unbounded(),
        Some(v) => {
            let div = |end: Option<Expr>| both(end, Some(divisor.clone()), |a, b| a / b);
            if v > 0 {
                Interval::new(div(iv.min), div(iv.max))
            } else {
                Interval::new(div(iv.max), div(iv.min))
            }
        }
        None => match (iv.min, iv.max) {
            (Some(min), Some(max)) => {
                let a = min / divisor.clone();
                let b = max / divisor.clone();
                Interval::new(
                    Some(ops::min(a.clone(), b.clone())),
                    Some(ops::max(a, b)),
                )
            }
            _ => Interval::unbounded(),
        },
    }
}

/// The interval of values `e` can take, with symbolic values for free
/// variables
///
/// Variables bound in `scope` use their recorded intervals; all other
/// variables are treated as single points.
pub fn bounds_of_expr_in_scope(e: &Expr, scope: &mut Scope<Interval>) -> Interval {
    match e.node() {
        ExprNode::IntImm { .. } | ExprNode::FloatImm { .. } => Interval::single_point(e.clone()),
        ExprNode::Variable { name, .. } => match scope.get(name) {
            Some(iv) => iv.clone(),
            None => Interval::single_point(e.clone()),
        },
        ExprNode::Cast { ty, value } => {
            let iv = bounds_of_expr_in_scope(value, scope);
            Interval::new(
                iv.min.map(|m| ops::cast(*ty, m)),
                iv.max.map(|m| ops::cast(*ty, m)),
            )
        }
        ExprNode::Add { a, b } => {
            let ia = bounds_of_expr_in_scope(a, scope);
            let ib = bounds_of_expr_in_scope(b, scope);
            Interval::new(
                both(ia.min, ib.min, |a, b| a + b),
                both(ia.max, ib.max, |a, b| a + b),
            )
        }
        ExprNode::Sub { a, b } => {
            let ia = bounds_of_expr_in_scope(a, scope);
            let ib = bounds_of_expr_in_scope(b, scope);
            Interval::new(
                both(ia.min, ib.max, |a, b| a - b),
                both(ia.max, ib.min, |a, b| a - b),
            )
        }
        ExprNode::Mul { a, b } => {
            let ia = bounds_of_expr_in_scope(a, scope);
            let ib = bounds_of_expr_in_scope(b, scope);
            if let Some(p) = ib.as_single_point() {
                scale(ia, &p.clone())
            } else if let Some(p) = ia.as_single_point() {
                scale(ib, &p.clone())
            } else {
                Interval::unbounded()
            }
        }
        ExprNode::Div { a, b } => {
            let ia = bounds_of_expr_in_scope(a, scope);
            let ib = bounds_of_expr_in_scope(b, scope);
            match ib.as_single_point() {
                Some(p) => scale_div(ia, &p.clone()),
                None => Interval::unbounded(),
            }
        }
        ExprNode::Mod { a: _, b } => {
            // Only a known-positive constant divisor pins the result to
            // [0, b-1]; anything else (negative, zero, or symbolic) is not
            // bounded here.
            let ib = bounds_of_expr_in_scope(b, scope);
            match ib.as_single_point().and_then(|p| p.as_int_imm()) {
                Some(v) if v > 0 && e.ty() == Type::int(32) => {
                    Interval::new(Some(Expr::int(0)), Some(Expr::int(v - 1)))
                }
                _ => Interval::unbounded(),
            }
        }
        ExprNode::Min { a, b } => {
            let ia = bounds_of_expr_in_scope(a, scope);
            let ib = bounds_of_expr_in_scope(b, scope);
            Interval::new(
                both(ia.min, ib.min, ops::min),
                // An unknown max on one side still caps the minimum of the
                // two at the other side's max.
                match (ia.max, ib.max) {
                    (Some(x), Some(y)) => Some(ops::min(x, y)),
                    (Some(x), None) | (None, Some(x)) => Some(x),
                    (None, None) => None,
                },
            )
        }
        ExprNode::Max { a, b } => {
            let ia = bounds_of_expr_in_scope(a, scope);
            let ib = bounds_of_expr_in_scope(b, scope);
            Interval::new(
                match (ia.min, ib.min) {
                    (Some(x), Some(y)) => Some(ops::max(x, y)),
                    (Some(x), None) | (None, Some(x)) => Some(x),
                    (None, None) => None,
                },
                both(ia.max, ib.max, ops::max),
            )
        }
        ExprNode::Select {
            true_value,
            false_value,
            ..
        } => {
            let it = bounds_of_expr_in_scope(true_value, scope);
            let iff = bounds_of_expr_in_scope(false_value, scope);
            Interval::new(
                both(it.min, iff.min, ops::min),
                both(it.max, iff.max, ops::max),
            )
        }
        ExprNode::Ramp {
            base,
            stride,
            lanes,
        } => {
            // Lanes are affine in the lane index, so the two end lanes bound
            // the whole vector.
            let first = bounds_of_expr_in_scope(base, scope);
            let last_expr = base.clone() + stride.clone() * (i32::from(*lanes) - 1);
            let last = bounds_of_expr_in_scope(&last_expr, scope);
            Interval::new(
                both(first.min, last.min, ops::min),
                both(first.max, last.max, ops::max),
            )
        }
        ExprNode::Broadcast { value, .. } => bounds_of_expr_in_scope(value, scope),
        ExprNode::Let { name, value, body } => {
            let iv = bounds_of_expr_in_scope(value, scope);
            scope.push(name.clone(), iv);
            let result = bounds_of_expr_in_scope(body, scope);
            scope.pop(name);
            result
        }
        // Value ranges of loads, calls, and boolean operators are not
        // tracked.
        ExprNode::Load { .. }
        | ExprNode::Call { .. }
        | ExprNode::Eq { .. }
        | ExprNode::Ne { .. }
        | ExprNode::Lt { .. }
        | ExprNode::Le { .. }
        | ExprNode::Gt { .. }
        | ExprNode::Ge { .. }
        | ExprNode::And { .. }
        | ExprNode::Or { .. }
        | ExprNode::Not { .. } => Interval::unbounded(),
    }
}

/// Per-buffer rectangular regions, one [`Interval`] per dimension
pub type RegionMap = FxHashMap<String, Vec<Interval>>;

fn interval_union(a: &Interval, b: &Interval) -> Interval {
    Interval::new(
        both(a.min.clone(), b.min.clone(), ops::min),
        both(a.max.clone(), b.max.clone(), ops::max),
    )
}

struct RegionsCollector {
    scope: Scope<Interval>,
    include_writes: bool,
    regions: RegionMap,
}

impl RegionsCollector {
    fn record(&mut self, name: &str, site: &[Expr]) {
        let intervals: Vec<Interval> = site
            .iter()
            .map(|coord| bounds_of_expr_in_scope(coord, &mut self.scope))
            .collect();
        match self.regions.get_mut(name) {
            None => {
                self.regions.insert(name.to_string(), intervals);
            }
            Some(existing) => {
                debug_assert_eq!(existing.len(), intervals.len());
                for (old, new) in existing.iter_mut().zip(&intervals) {
                    *old = interval_union(old, new);
                }
            }
        }
    }
}

impl IRVisitor for RegionsCollector {
    fn visit_expr(&mut self, e: &Expr) {
        match e.node() {
            ExprNode::Call {
                name,
                args,
                call_type: CallType::Func | CallType::Image,
                ..
            } => {
                self.record(name, args);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            ExprNode::Load { name, index, .. } => {
                self.record(name, std::slice::from_ref(index));
                self.visit_expr(index);
            }
            ExprNode::Let { name, value, body } => {
                self.visit_expr(value);
                let iv = bounds_of_expr_in_scope(value, &mut self.scope);
                self.scope.push(name.clone(), iv);
                self.visit_expr(body);
                self.scope.pop(name);
            }
            _ => walk_expr(self, e),
        }
    }

    fn visit_stmt(&mut self, s: &Stmt) {
        match s.node() {
            StmtNode::LetStmt { name, value, body } => {
                self.visit_expr(value);
                let iv = bounds_of_expr_in_scope(value, &mut self.scope);
                self.scope.push(name.clone(), iv);
                self.visit_stmt(body);
                self.scope.pop(name);
            }
            StmtNode::For {
                name,
                min,
                extent,
                body,
                ..
            } => {
                self.visit_expr(min);
                self.visit_expr(extent);
                let first = bounds_of_expr_in_scope(min, &mut self.scope);
                let last_expr = min.clone() + extent.clone() - 1;
                let last = bounds_of_expr_in_scope(&last_expr, &mut self.scope);
                self.scope
                    .push(name.clone(), Interval::new(first.min, last.max));
                self.visit_stmt(body);
                self.scope.pop(name);
            }
            StmtNode::Provide { name, value, site } => {
                if self.include_writes {
                    self.record(name, site);
                }
                self.visit_expr(value);
                for coord in site {
                    self.visit_expr(coord);
                }
            }
            StmtNode::Store { name, value, index } => {
                if self.include_writes {
                    self.record(name, std::slice::from_ref(index));
                }
                self.visit_expr(value);
                self.visit_expr(index);
            }
            _ => walk_stmt(self, s),
        }
    }
}

fn collect_regions(s: &Stmt, scope: &Scope<Interval>, include_writes: bool) -> RegionMap {
    let mut collector = RegionsCollector {
        scope: scope.clone(),
        include_writes,
        regions: RegionMap::default(),
    };
    collector.visit_stmt(s);
    collector.regions
}

/// The region of each buffer read under `s`, assuming symbolic values for
/// free variables
pub fn regions_required(s: &Stmt, scope: &Scope<Interval>) -> RegionMap {
    collect_regions(s, scope, false)
}

/// The region of each buffer read or written under `s`
pub fn regions_touched(s: &Stmt, scope: &Scope<Interval>) -> RegionMap {
    collect_regions(s, scope, true)
}

/// Convert one buffer's region into `(min, extent)` ranges
///
/// Fails with [`Error::UnboundedAccess`] if any dimension has an unknown end.
pub fn region_to_ranges(buffer: &str, region: &[Interval]) -> Result<Vec<Range>> {
    region
        .iter()
        .enumerate()
        .map(|(dim, iv)| {
            let min = iv
                .min
                .clone()
                .ok_or_else(|| Error::unbounded_access(buffer, dim))?;
            let extent = iv
                .extent()
                .ok_or_else(|| Error::unbounded_access(buffer, dim))?;
            Ok(Range::new(min, extent))
        })
        .collect()
}
