//! Intermediate representation for lowered image pipelines
//!
//! The IR is a pair of immutable tagged trees: expressions ([`Expr`]) and
//! statements ([`Stmt`]). Nodes are reference-counted and structurally shared,
//! so the trees form an acyclic DAG; every transform produces fresh nodes and
//! leaves its input untouched. Traversal and rewriting go through the
//! [`visit`] module's visitor/mutator protocol.

mod expr;
mod printer;
mod stmt;

pub mod ops;
pub mod visit;

pub use expr::{CallType, Expr, ExprNode};
pub use stmt::{ForType, Stmt, StmtNode};

use std::fmt;

/// The kind of a scalar type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// Signed two's-complement integer
    Int,
    /// Unsigned integer
    UInt,
    /// IEEE floating point
    Float,
}

/// A fixed-width scalar type, optionally carrying vector lanes
///
/// Booleans are `UInt` with one bit. Equality is structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    /// Scalar kind
    pub code: TypeCode,
    /// Bits per lane (1, 8, 16, 32, or 64)
    pub bits: u8,
    /// Number of vector lanes (1 for scalars)
    pub lanes: u16,
}

impl Type {
    /// A signed integer type with the given bit width
    pub fn int(bits: u8) -> Type {
        Type {
            code: TypeCode::Int,
            bits,
            lanes: 1,
        }
    }

    /// An unsigned integer type with the given bit width
    pub fn uint(bits: u8) -> Type {
        Type {
            code: TypeCode::UInt,
            bits,
            lanes: 1,
        }
    }

    /// A floating-point type with the given bit width
    pub fn float(bits: u8) -> Type {
        Type {
            code: TypeCode::Float,
            bits,
            lanes: 1,
        }
    }

    /// The boolean type, optionally vectorized
    pub fn bool_with_lanes(lanes: u16) -> Type {
        Type {
            code: TypeCode::UInt,
            bits: 1,
            lanes,
        }
    }

    /// The same type with a different lane count
    pub fn with_lanes(self, lanes: u16) -> Type {
        Type { lanes, ..self }
    }

    /// The scalar element type of this type
    pub fn element_of(self) -> Type {
        self.with_lanes(1)
    }

    /// Is this a single-lane type?
    pub fn is_scalar(self) -> bool {
        self.lanes == 1
    }

    /// Does this type have more than one lane?
    pub fn is_vector(self) -> bool {
        self.lanes > 1
    }

    /// Is this (per lane) a boolean?
    pub fn is_bool(self) -> bool {
        self.code == TypeCode::UInt && self.bits == 1
    }

    /// Is this a floating-point type?
    pub fn is_float(self) -> bool {
        self.code == TypeCode::Float
    }

    /// Is this a signed or unsigned integer type?
    pub fn is_int(self) -> bool {
        matches!(self.code, TypeCode::Int | TypeCode::UInt)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.code {
            TypeCode::Int => "i",
            TypeCode::UInt => "u",
            TypeCode::Float => "f",
        };
        write!(f, "{}{}", prefix, self.bits)?;
        if self.lanes > 1 {
            write!(f, "x{}", self.lanes)?;
        }
        Ok(())
    }
}

/// A one-dimensional `[min, min+extent)` range with symbolic endpoints
///
/// `Realize` carries one of these per buffer dimension.
#[derive(Debug, Clone)]
pub struct Range {
    /// First coordinate covered
    pub min: Expr,
    /// Number of coordinates covered
    pub extent: Expr,
}

impl Range {
    /// Create a range from its min and extent
    pub fn new(min: Expr, extent: Expr) -> Range {
        Range { min, extent }
    }
}
