//! Building realizations and injecting them into the loop nest

use tracing::trace;

use crate::bounds::{region_to_ranges, regions_required, regions_touched};
use crate::error::{Error, Result};
use crate::function::Function;
use crate::ir::visit::{mutate_stmt_children, IRMutator};
use crate::ir::{ops, Expr, Stmt, StmtNode};
use crate::schedule::Schedule;
use crate::scope::Scope;
use crate::substitute::qualify_expr;

/// Construct the loop nest that writes `value` to `buffer` at `site`
///
/// Built from the inside out: the `Provide`, then one `Let` per split
/// defining the old variable in terms of outer and inner, then one `For` per
/// schedule dim (innermost first), and finally, in reverse split order, the
/// bounds of each split's inner and outer variables in terms of the old
/// variable's extent. Loop bounds are left as symbolic `prefix.var.min` /
/// `prefix.var.extent` references for bounds inference to pin down.
pub fn build_provide_loop_nest(
    buffer: &str,
    prefix: &str,
    site: Vec<Expr>,
    value: Expr,
    schedule: &Schedule,
) -> Stmt {
    let mut stmt = Stmt::provide(buffer, value, site);

    // Define the function args in terms of the loop variables using the
    // splits.
    for split in &schedule.splits {
        let outer = Expr::var(format!("{}{}", prefix, split.outer));
        let inner = Expr::var(format!("{}{}", prefix, split.inner));
        let old_min = Expr::var(format!("{}{}.min", prefix, split.old_var));
        stmt = Stmt::let_stmt(
            format!("{}{}", prefix, split.old_var),
            outer * split.factor.clone() + inner + old_min,
            stmt,
        );
    }

    // Build the loop nest.
    for dim in &schedule.dims {
        let min = Expr::var(format!("{}{}.min", prefix, dim.var));
        let extent = Expr::var(format!("{}{}.extent", prefix, dim.var));
        stmt = Stmt::for_loop(
            format!("{}{}", prefix, dim.var),
            min,
            extent,
            dim.for_type,
            stmt,
        );
    }

    // Define the bounds on the split dimensions using the bounds on the
    // function args.
    for split in schedule.splits.iter().rev() {
        let old_extent = Expr::var(format!("{}{}.extent", prefix, split.old_var));
        let inner_extent = split.factor.clone();
        let outer_extent = ops::ceil_div(old_extent, split.factor.clone());
        stmt = Stmt::let_stmt(format!("{}{}.min", prefix, split.inner), Expr::int(0), stmt);
        stmt = Stmt::let_stmt(
            format!("{}{}.extent", prefix, split.inner),
            inner_extent,
            stmt,
        );
        stmt = Stmt::let_stmt(format!("{}{}.min", prefix, split.outer), Expr::int(0), stmt);
        stmt = Stmt::let_stmt(
            format!("{}{}.extent", prefix, split.outer),
            outer_extent,
            stmt,
        );
    }

    stmt
}

/// The loop nest computing `f`'s pure definition
///
/// The nest refers to external `f.arg.min` / `f.arg.extent` variables for the
/// bounds over which it should be realized, and does no allocation of its
/// own.
pub fn build_realization(f: &Function) -> Stmt {
    let prefix = format!("{}.", f.name());
    let value = qualify_expr(&prefix, &f.value());
    let site = f
        .args()
        .iter()
        .map(|arg| Expr::var(format!("{}{}", prefix, arg)))
        .collect();
    build_provide_loop_nest(f.name(), &prefix, site, value, &f.schedule())
}

/// The loop nest applying `f`'s reduction update, or `None` for a pure
/// function
///
/// The site is the qualified reduction-arg expressions; the reduction
/// domain's own bounds are bound around the nest.
pub fn build_reduction_update(f: &Function) -> Option<Stmt> {
    let reduction = f.reduction()?;

    let prefix = format!("{}.", f.name());
    let value = qualify_expr(&prefix, &reduction.value);
    let site: Vec<Expr> = reduction
        .args
        .iter()
        .map(|arg| qualify_expr(&prefix, arg))
        .collect();
    for (i, coord) in site.iter().enumerate() {
        trace!("reduction site {} = {}", i, coord);
    }

    let mut loop_ = build_provide_loop_nest(
        f.name(),
        &prefix,
        site,
        value,
        &f.reduction_schedule(),
    );

    // The reduction domain carries its own bounds.
    for rv in reduction.domain.domain() {
        let p = format!("{}{}", prefix, rv.var);
        loop_ = Stmt::let_stmt(format!("{}.min", p), rv.min.clone(), loop_);
        loop_ = Stmt::let_stmt(format!("{}.extent", p), rv.extent.clone(), loop_);
    }

    Some(loop_)
}

/// Bind any user-asserted bounds, with a check that they cover the inferred
/// region
pub fn inject_explicit_bounds(body: Stmt, f: &Function) -> Stmt {
    let mut body = body;
    for b in &f.schedule().bounds {
        let min_name = format!("{}.{}.min", f.name(), b.var);
        let extent_name = format!("{}.{}.extent", f.name(), b.var);
        let min_var = Expr::var(min_name.as_str());
        let extent_var = Expr::var(extent_name.as_str());
        let check = Expr::and(
            Expr::le(b.min.clone(), min_var.clone()),
            Expr::ge(b.min.clone() + b.extent.clone(), min_var + extent_var),
        );
        let message = format!(
            "bounds given for {} in {} don't cover required region",
            b.var,
            f.name()
        );
        body = Stmt::block(
            Stmt::assert_stmt(check, message),
            Stmt::let_stmt(min_name, b.min.clone(), Stmt::let_stmt(extent_name, b.extent.clone(), body)),
        );
    }
    body
}

/// Inject the storage and computation of one function into an existing loop
/// nest, at the loops its schedule names
///
/// At the compute level the loop body becomes a `Pipeline` whose produce (and
/// update, for reductions) nests are built fresh and whose consume is the old
/// body; the rebuilt loop is re-entered so the store level can still match
/// inside. At the store level the mutated body is wrapped in a `Realize`
/// covering everything it touches, plus any explicit user bounds. Both levels
/// must be found, and the store level must enclose the compute level.
struct InjectRealization {
    func: Function,
    found_store_level: bool,
    found_compute_level: bool,
    error: Option<Error>,
}

impl InjectRealization {
    fn fail(&mut self, e: Error) {
        if self.error.is_none() {
            self.error = Some(e);
        }
    }

    /// Re-bind the produce nest's bounds so the initialization covers both
    /// the region consumed downstream and the region the update reads.
    /// Later bounds inference does not look inside the update step, so the
    /// expansion happens here.
    fn expand_produce_bounds(&mut self, produce: Stmt, update: &Stmt) -> Stmt {
        let regions = regions_required(update, &Scope::new());
        let Some(region) = regions.get(self.func.name()) else {
            return produce;
        };
        if region.len() != self.func.args().len() {
            self.fail(Error::internal(format!(
                "update of {} reads it through {} dimensions, expected {}",
                self.func.name(),
                region.len(),
                self.func.args().len()
            )));
            return produce;
        }
        let ranges = match region_to_ranges(self.func.name(), region) {
            Ok(ranges) => ranges,
            Err(e) => {
                self.fail(e);
                return produce;
            }
        };

        let mut produce = produce;
        for arg in self.func.args() {
            let var = format!("{}.{}", self.func.name(), arg);
            let update_min = Expr::var(format!("{}.update_min", var));
            let update_extent = Expr::var(format!("{}.update_extent", var));
            let consume_min = Expr::var(format!("{}.min", var));
            let consume_extent = Expr::var(format!("{}.extent", var));
            let init_min = ops::min(update_min.clone(), consume_min.clone());
            let init_max_plus_one = ops::max(
                update_min + update_extent,
                consume_min + consume_extent,
            );
            let init_extent = init_max_plus_one - init_min.clone();
            produce = Stmt::let_stmt(format!("{}.min", var), init_min, produce);
            produce = Stmt::let_stmt(format!("{}.extent", var), init_extent, produce);
        }

        // Define the region read during the update step.
        for (arg, range) in self.func.args().iter().zip(ranges) {
            let var = format!("{}.{}", self.func.name(), arg);
            produce = Stmt::let_stmt(format!("{}.update_min", var), range.min, produce);
            produce = Stmt::let_stmt(format!("{}.update_extent", var), range.extent, produce);
        }
        produce
    }
}

impl IRMutator for InjectRealization {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if self.error.is_some() {
            return s.clone();
        }
        let StmtNode::For {
            name,
            min,
            extent,
            for_type,
            body,
        } = s.node()
        else {
            return mutate_stmt_children(self, s);
        };

        let schedule = self.func.schedule();

        if !self.found_compute_level && schedule.compute_level.matches(name) {
            if !(schedule.store_level.matches(name) || self.found_store_level) {
                self.fail(Error::malformed_schedule(format!(
                    "the compute level of {} is outside its store level",
                    self.func.name()
                )));
                return s.clone();
            }

            let mut produce = build_realization(&self.func);
            let update = build_reduction_update(&self.func);
            if let Some(update) = &update {
                produce = self.expand_produce_bounds(produce, update);
                if self.error.is_some() {
                    return s.clone();
                }
            }

            let pipeline = Stmt::pipeline(self.func.name(), produce, update, body.clone());
            let rebuilt = Stmt::for_loop(
                name.clone(),
                min.clone(),
                extent.clone(),
                *for_type,
                pipeline,
            );
            self.found_compute_level = true;
            // The rebuilt loop may itself hold the store level.
            self.mutate_stmt(&rebuilt)
        } else if schedule.store_level.matches(name) {
            // Inject the realization lower down, then cover everything the
            // body touches.
            self.found_store_level = true;
            let body = self.mutate_stmt(body);
            if self.error.is_some() {
                return s.clone();
            }

            let regions = regions_touched(&body, &Scope::new());
            let region = regions.get(self.func.name()).cloned().unwrap_or_default();
            let bounds = match region_to_ranges(self.func.name(), &region) {
                Ok(bounds) => bounds,
                Err(e) => {
                    self.fail(e);
                    return s.clone();
                }
            };

            let body = Stmt::realize(self.func.name(), self.func.value().ty(), bounds, body);
            let body = inject_explicit_bounds(body, &self.func);
            Stmt::for_loop(name.clone(), min.clone(), extent.clone(), *for_type, body)
        } else {
            mutate_stmt_children(self, s)
        }
    }
}

/// Inject `f`'s realization into `s` at its scheduled levels
pub fn inject_realization(f: &Function, s: &Stmt) -> Result<Stmt> {
    let mut injector = InjectRealization {
        func: f.clone(),
        found_store_level: false,
        found_compute_level: false,
        error: None,
    };
    let out = injector.mutate_stmt(s);
    if let Some(e) = injector.error {
        return Err(e);
    }
    if !injector.found_store_level {
        return Err(Error::malformed_schedule(format!(
            "no loop found matching the store level of {}",
            f.name()
        )));
    }
    if !injector.found_compute_level {
        return Err(Error::malformed_schedule(format!(
            "no loop found matching the compute level of {}",
            f.name()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ForType;
    use crate::schedule::{Dim, LoopLevel};

    #[test]
    fn test_provide_loop_nest_shape() {
        let schedule = Schedule {
            dims: vec![
                Dim {
                    var: "x".into(),
                    for_type: ForType::Serial,
                },
                Dim {
                    var: "y".into(),
                    for_type: ForType::Serial,
                },
            ],
            ..Schedule::default()
        };
        let value = Expr::var("f.x") + Expr::var("f.y");
        let site = vec![Expr::var("f.x"), Expr::var("f.y")];
        let nest = build_provide_loop_nest("f", "f.", site, value, &schedule);

        // Outermost loop is the last dim.
        let StmtNode::For { name, body, .. } = nest.node() else {
            panic!("expected outer For, got:\n{}", nest);
        };
        assert_eq!(name, "f.y");
        let StmtNode::For { name, body, .. } = body.node() else {
            panic!("expected inner For");
        };
        assert_eq!(name, "f.x");
        assert!(matches!(body.node(), StmtNode::Provide { .. }));
    }

    #[test]
    fn test_split_emits_bound_lets_and_substitution_let() {
        let f = Function::new("f", ["x"], Expr::var("x") + 1);
        f.split("x", "xo", "xi", 4).unwrap();
        let nest = build_realization(&f);
        let printed = nest.to_string();

        assert!(printed.contains("let f.xi.min = 0"), "{}", printed);
        assert!(printed.contains("let f.xi.extent = 4"), "{}", printed);
        assert!(printed.contains("let f.xo.min = 0"), "{}", printed);
        assert!(
            printed.contains("let f.xo.extent = (((f.x.extent + 4) - 1) / 4)"),
            "{}",
            printed
        );
        assert!(
            printed.contains("let f.x = (((f.xo * 4) + f.xi) + f.x.min)"),
            "{}",
            printed
        );
        assert!(printed.contains("for (f.xi, f.xi.min, f.xi.extent)"), "{}", printed);
        assert!(printed.contains("for (f.xo, f.xo.min, f.xo.extent)"), "{}", printed);
    }

    #[test]
    fn test_inject_realization_requires_matching_loops() {
        let g = Function::new("g", ["x"], Expr::var("x"));
        g.compute_at(&Function::new("f", ["x"], Expr::int(0)), "x");
        g.store_at(&Function::new("f", ["x"], Expr::int(0)), "x");

        // A tree with no loop named f.x.
        let s = Stmt::for_loop(
            LoopLevel::ROOT_LOOP,
            Expr::int(0),
            Expr::int(1),
            ForType::Serial,
            Stmt::provide("out", Expr::int(0), vec![Expr::int(0)]),
        );
        let err = inject_realization(&g, &s).unwrap_err();
        assert!(matches!(err, Error::MalformedSchedule(_)));
    }
}
