//! Prism: the lowering pipeline of an image-processing DSL compiler
//!
//! Prism takes a declarative pipeline of image-valued functions, each defined
//! over integer coordinates and optionally augmented with a reduction, plus a
//! schedule that orthogonally describes *how* each function is computed
//! (inline, at root, under which consumer loop, with what splits and
//! vectorization), and synthesizes the imperative statement IR that realizes
//! that contract: concrete loop nests, allocations, bounds, and safety checks.
//!
//! # Example
//!
//! ```no_run
//! use prism::{Expr, Function};
//!
//! fn main() -> prism::Result<()> {
//!     let (x, y) = (Expr::var("x"), Expr::var("y"));
//!     let f = Function::new("f", ["x", "y"], x + y);
//!     let stmt = prism::lower(&f)?;
//!     println!("{}", stmt);
//!     Ok(())
//! }
//! ```

pub mod bounds;
pub mod function;
pub mod ir;
pub mod lower;
pub mod passes;
pub mod prelude;
pub mod schedule;
pub mod scope;
pub mod substitute;

mod error;

pub use error::{Error, Result};
pub use function::{Function, Parameter, ReductionDomain};
pub use ir::{Expr, ForType, Range, Stmt, Type};
pub use lower::{lower, lower_with_passes};
pub use schedule::{LoopLevel, Schedule};

/// Prism version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
