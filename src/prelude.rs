//! Prelude module for convenient imports
//!
//! Import everything from this module for quick access to the front-end value
//! types and the lowering entry points:
//!
//! ```no_run
//! use prism::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let x = Expr::var("x");
//!     let f = Function::new("f", ["x"], x * 2);
//!     println!("{}", lower(&f)?);
//!     Ok(())
//! }
//! ```

// Front-end value types
pub use crate::function::{
    Function, FunctionRef, Parameter, ReductionDomain, ReductionVariable, WeakFunction,
};

// Schedules
pub use crate::schedule::{Bound, Dim, LoopLevel, Schedule, Split};

// IR
pub use crate::ir::{CallType, Expr, ExprNode, ForType, Range, Stmt, StmtNode, Type, TypeCode};

// Visitor/mutator protocol
pub use crate::ir::visit::{
    mutate_expr_children, mutate_stmt_children, walk_expr, walk_stmt, IRMutator, IRVisitor,
};

// Substitution and qualification
pub use crate::substitute::{qualify_expr, substitute, substitute_in_stmt};

// Bounds analysis
pub use crate::bounds::{
    bounds_of_expr_in_scope, regions_required, regions_touched, Interval, RegionMap,
};
pub use crate::scope::Scope;

// Lowering
pub use crate::lower::{lower, lower_with_passes, Environment};
pub use crate::passes::{pass_fn, LowerContext, PassSuite, StmtPass};

// Error handling
pub use crate::error::{Error, Result};

// Version constant
pub use crate::VERSION;
