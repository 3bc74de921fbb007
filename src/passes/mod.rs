//! External pass collaborators
//!
//! Lowering proper ends once realizations are injected and the image checks
//! are in place; the remaining transformations (tracing, bounds inference,
//! sliding window, storage flattening, simplification, vectorization,
//! unrolling, dead-let removal) are separate passes behind the [`StmtPass`]
//! interface. A [`PassSuite`] bundles one implementation per slot; the
//! default suite is all identities, which keeps `lower` runnable and testable
//! without any collaborator installed.

use crate::error::Result;
use crate::ir::Stmt;
use crate::lower::Environment;

/// What a pass may consult besides the statement itself
pub struct LowerContext<'a> {
    /// The realization order, output last
    pub order: &'a [String],
    /// Every function in the pipeline, by name
    pub env: &'a Environment,
}

/// An IR-preserving statement transformation
pub trait StmtPass {
    fn name(&self) -> &'static str;

    fn run(&self, s: Stmt, cx: &LowerContext<'_>) -> Result<Stmt>;
}

struct IdentityPass {
    name: &'static str,
}

impl StmtPass for IdentityPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, s: Stmt, _cx: &LowerContext<'_>) -> Result<Stmt> {
        Ok(s)
    }
}

struct FnPass<F> {
    name: &'static str,
    run: F,
}

impl<F> StmtPass for FnPass<F>
where
    F: Fn(Stmt, &LowerContext<'_>) -> Result<Stmt>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, s: Stmt, cx: &LowerContext<'_>) -> Result<Stmt> {
        (self.run)(s, cx)
    }
}

/// Wrap a closure as a named pass
pub fn pass_fn<F>(name: &'static str, run: F) -> Box<dyn StmtPass>
where
    F: Fn(Stmt, &LowerContext<'_>) -> Result<Stmt> + 'static,
{
    Box::new(FnPass { name, run })
}

fn identity(name: &'static str) -> Box<dyn StmtPass> {
    Box::new(IdentityPass { name })
}

/// The external collaborators of the lowering driver, in pipeline order
pub struct PassSuite {
    pub inject_tracing: Box<dyn StmtPass>,
    pub bounds_inference: Box<dyn StmtPass>,
    pub sliding_window: Box<dyn StmtPass>,
    pub storage_flattening: Box<dyn StmtPass>,
    pub simplify: Box<dyn StmtPass>,
    pub vectorize_loops: Box<dyn StmtPass>,
    pub unroll_loops: Box<dyn StmtPass>,
    pub remove_dead_lets: Box<dyn StmtPass>,
}

impl Default for PassSuite {
    fn default() -> Self {
        PassSuite {
            inject_tracing: identity("inject_tracing"),
            bounds_inference: identity("bounds_inference"),
            sliding_window: identity("sliding_window"),
            storage_flattening: identity("storage_flattening"),
            simplify: identity("simplify"),
            vectorize_loops: identity("vectorize_loops"),
            unroll_loops: identity("unroll_loops"),
            remove_dead_lets: identity("remove_dead_lets"),
        }
    }
}
