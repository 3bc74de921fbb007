//! The lowering driver
//!
//! `lower` turns the output `Function` of a pipeline into the statement IR a
//! backend consumes: discover the environment, pick a realization order,
//! build the output's initial loop nest, then walk the order backwards
//! inlining or injecting each producer, and finally run the external passes
//! over the result. Each pass boundary is announced at `debug` level and the
//! IR after it dumped at `trace` level.

pub mod checks;
pub mod inline;
pub mod order;
pub mod realize;

pub use checks::add_image_checks;
pub use inline::inline_function;
pub use order::{populate_environment, realization_order, Environment};
pub use realize::{
    build_provide_loop_nest, build_realization, build_reduction_update, inject_explicit_bounds,
    inject_realization,
};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::function::Function;
use crate::ir::{Expr, ForType, Stmt, StmtNode};
use crate::passes::{LowerContext, PassSuite, StmtPass};
use crate::schedule::LoopLevel;

/// The output function's own loop nest, before any producer is scheduled
pub fn create_initial_loop_nest(f: &Function) -> Stmt {
    let mut s = build_realization(f);
    if let Some(update) = build_reduction_update(f) {
        s = Stmt::block(s, update);
    }
    inject_explicit_bounds(s, f)
}

/// Inline or inject every non-output function, in reverse realization order
///
/// A synthetic serial loop named [`LoopLevel::ROOT_LOOP`] is wrapped around
/// the statement first, giving root-level schedules a loop to match, and
/// stripped again at the end. A reduction whose compute level is still inline
/// here is promoted to root/root; that is the one sanctioned late schedule
/// mutation.
pub fn schedule_functions(s: Stmt, order: &[String], env: &Environment) -> Result<Stmt> {
    let mut s = Stmt::for_loop(
        LoopLevel::ROOT_LOOP,
        Expr::int(0),
        Expr::int(1),
        ForType::Serial,
        s,
    );

    for name in order.iter().rev().skip(1) {
        let f = env
            .get(name)
            .ok_or_else(|| Error::internal(format!("function '{}' missing from environment", name)))?;

        if f.is_reduction() && f.schedule().compute_level.is_inline() {
            f.promote_reduction_to_root();
        }

        if f.schedule().compute_level.is_inline() {
            debug!("inlining {}", name);
            s = inline_function(f, &s);
        } else {
            debug!("injecting realization of {}", name);
            s = inject_realization(f, &s)?;
        }
        trace!("after scheduling {}:\n{}", name, s);
    }

    match s.node() {
        StmtNode::For { body, .. } => Ok(body.clone()),
        _ => Err(Error::internal("scheduling anchor loop disappeared")),
    }
}

/// Lower a pipeline with the default (identity) external passes
pub fn lower(f: &Function) -> Result<Stmt> {
    lower_with_passes(f, &PassSuite::default())
}

/// Lower the pipeline rooted at `f` into backend-ready statement IR
pub fn lower_with_passes(f: &Function, passes: &PassSuite) -> Result<Stmt> {
    let mut env = Environment::default();
    populate_environment(f, &mut env)?;

    let order = realization_order(f.name(), &env)?;
    debug!("realization order: {:?}", order);

    let mut s = create_initial_loop_nest(f);
    trace!("initial statement:\n{}", s);

    s = schedule_functions(s, &order, &env)?;
    trace!("all realizations injected:\n{}", s);

    let cx = LowerContext {
        order: &order,
        env: &env,
    };

    s = run_pass(passes.inject_tracing.as_ref(), s, &cx)?;

    debug!("adding checks for images");
    s = add_image_checks(&s, f)?;
    trace!("image checks injected:\n{}", s);

    s = run_pass(passes.bounds_inference.as_ref(), s, &cx)?;
    s = run_pass(passes.sliding_window.as_ref(), s, &cx)?;
    s = run_pass(passes.storage_flattening.as_ref(), s, &cx)?;
    s = run_pass(passes.simplify.as_ref(), s, &cx)?;
    s = run_pass(passes.vectorize_loops.as_ref(), s, &cx)?;
    s = run_pass(passes.unroll_loops.as_ref(), s, &cx)?;
    s = run_pass(passes.simplify.as_ref(), s, &cx)?;
    s = run_pass(passes.remove_dead_lets.as_ref(), s, &cx)?;

    debug!("lowered statement:\n{}", s);
    Ok(s)
}

fn run_pass(pass: &dyn StmtPass, s: Stmt, cx: &LowerContext<'_>) -> Result<Stmt> {
    debug!("running {}", pass.name());
    let s = pass.run(s, cx)?;
    trace!("after {}:\n{}", pass.name(), s);
    Ok(s)
}
