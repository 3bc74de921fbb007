//! Schedules: how a function's loop nest is realized
//!
//! A [`Schedule`] orthogonally describes loop order, splits, parallelism and
//! vectorization, explicit bounds, and where a function is computed and
//! stored relative to a consumer's loops. The front-end fills these in via
//! the scheduling methods on [`crate::Function`]; lowering only reads them.

use crate::ir::{Expr, ForType};

/// Where a producer is computed or stored, relative to a consumer's loops
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoopLevel {
    /// Substitute the producer's body at each call site
    #[default]
    Inline,
    /// Outside every loop of the pipeline
    Root,
    /// Inside the loop `func.var` of the named consumer
    At { func: String, var: String },
}

impl LoopLevel {
    /// The name of the synthetic loop that anchors root-level realizations
    pub const ROOT_LOOP: &'static str = "<root>.<root>";

    /// A level naming a consumer's loop
    pub fn at(func: impl Into<String>, var: impl Into<String>) -> LoopLevel {
        LoopLevel::At {
            func: func.into(),
            var: var.into(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, LoopLevel::Inline)
    }

    pub fn is_root(&self) -> bool {
        matches!(self, LoopLevel::Root)
    }

    /// Does a loop with this (qualified) name sit at this level?
    pub fn matches(&self, loop_name: &str) -> bool {
        match self {
            LoopLevel::Inline => false,
            LoopLevel::Root => loop_name == Self::ROOT_LOOP,
            LoopLevel::At { func, var } => {
                loop_name.len() == func.len() + 1 + var.len()
                    && loop_name.starts_with(func.as_str())
                    && loop_name.as_bytes()[func.len()] == b'.'
                    && loop_name.ends_with(var.as_str())
            }
        }
    }
}

/// Replace `old_var` by `outer * factor + inner + old_var.min`
#[derive(Debug, Clone)]
pub struct Split {
    pub old_var: String,
    pub outer: String,
    pub inner: String,
    pub factor: Expr,
}

/// One loop of the nest; `dims[0]` is innermost
#[derive(Debug, Clone)]
pub struct Dim {
    pub var: String,
    pub for_type: ForType,
}

/// A user-asserted bound on one dimension
#[derive(Debug, Clone)]
pub struct Bound {
    pub var: String,
    pub min: Expr,
    pub extent: Expr,
}

/// The complete scheduling state of one definition
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// Splits, in declaration order
    pub splits: Vec<Split>,
    /// Loops, innermost first
    pub dims: Vec<Dim>,
    /// Explicit user bounds
    pub bounds: Vec<Bound>,
    /// Where the function is recomputed
    pub compute_level: LoopLevel,
    /// Where the function's buffer lives
    pub store_level: LoopLevel,
}
