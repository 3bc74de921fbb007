//! Statement IR node types

use std::rc::Rc;

use super::{Expr, Range, Type};

/// Execution order of a `For` loop's iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForType {
    /// Iterations run in order on one worker
    Serial,
    /// Iterations may run on independent workers; the only ordering is the
    /// data dependencies expressible in the IR
    Parallel,
    /// Lane-wise SIMD with a statically known extent
    Vectorized,
    /// Fully unrolled at code-generation time
    Unrolled,
}

/// An imperative statement
///
/// Like [`Expr`], a `Stmt` is a cheap-to-clone handle onto an immutable,
/// reference-counted node.
#[derive(Debug, Clone)]
pub struct Stmt {
    node: Rc<StmtNode>,
}

/// The variants of the statement IR
#[derive(Debug)]
pub enum StmtNode {
    /// Bind `name` to `value` within `body`
    LetStmt { name: String, value: Expr, body: Stmt },
    /// Abort the running pipeline with `message` if `condition` is false
    AssertStmt { condition: Expr, message: String },
    /// Produce-then-consume sequencing for one buffer
    ///
    /// All writes of `produce` and, if present, `update` happen before any
    /// read in `consume`.
    Pipeline {
        name: String,
        produce: Stmt,
        update: Option<Stmt>,
        consume: Stmt,
    },
    /// A loop over `[min, min+extent)`
    For {
        name: String,
        min: Expr,
        extent: Expr,
        for_type: ForType,
        body: Stmt,
    },
    /// Write `value` to a flat buffer at `index`
    Store { name: String, value: Expr, index: Expr },
    /// Write `value` to the named buffer at a multi-dimensional `site`
    Provide {
        name: String,
        value: Expr,
        site: Vec<Expr>,
    },
    /// A scoped flat allocation of `size` elements of `ty`
    ///
    /// Allocations pair LIFO with `Free`. The runtime contract is
    /// `prism_malloc(size) -> noalias ptr` / `prism_free(ptr)`; backends may
    /// lower small fixed allocations (up to 8 KiB) to 32-byte-aligned stack
    /// space under scoped save/restore, and any early exit must free the
    /// still-live heap allocations in reverse order.
    Allocate {
        name: String,
        ty: Type,
        size: Expr,
        body: Stmt,
    },
    /// Release the allocation named `name`
    Free { name: String },
    /// Allocate and bound the named buffer over a region
    ///
    /// Must dominate every `Provide` to and `Call` of `name` in `body`.
    /// Storage flattening rewrites this to `Allocate` plus strides.
    Realize {
        name: String,
        ty: Type,
        bounds: Vec<Range>,
        body: Stmt,
    },
    /// Run `first`, then `rest`
    Block { first: Stmt, rest: Stmt },
}

impl Stmt {
    fn new(node: StmtNode) -> Stmt {
        Stmt { node: Rc::new(node) }
    }

    /// The underlying node, for pattern matching
    pub fn node(&self) -> &StmtNode {
        &self.node
    }

    /// Pointer identity: do two handles share the same node?
    pub fn same_as(&self, other: &Stmt) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub fn let_stmt(name: impl Into<String>, value: Expr, body: Stmt) -> Stmt {
        Stmt::new(StmtNode::LetStmt {
            name: name.into(),
            value,
            body,
        })
    }

    pub fn assert_stmt(condition: Expr, message: impl Into<String>) -> Stmt {
        debug_assert!(condition.ty().is_bool());
        Stmt::new(StmtNode::AssertStmt {
            condition,
            message: message.into(),
        })
    }

    pub fn pipeline(
        name: impl Into<String>,
        produce: Stmt,
        update: Option<Stmt>,
        consume: Stmt,
    ) -> Stmt {
        Stmt::new(StmtNode::Pipeline {
            name: name.into(),
            produce,
            update,
            consume,
        })
    }

    pub fn for_loop(
        name: impl Into<String>,
        min: Expr,
        extent: Expr,
        for_type: ForType,
        body: Stmt,
    ) -> Stmt {
        Stmt::new(StmtNode::For {
            name: name.into(),
            min,
            extent,
            for_type,
            body,
        })
    }

    pub fn store(name: impl Into<String>, value: Expr, index: Expr) -> Stmt {
        Stmt::new(StmtNode::Store {
            name: name.into(),
            value,
            index,
        })
    }

    pub fn provide(name: impl Into<String>, value: Expr, site: Vec<Expr>) -> Stmt {
        Stmt::new(StmtNode::Provide {
            name: name.into(),
            value,
            site,
        })
    }

    pub fn allocate(name: impl Into<String>, ty: Type, size: Expr, body: Stmt) -> Stmt {
        Stmt::new(StmtNode::Allocate {
            name: name.into(),
            ty,
            size,
            body,
        })
    }

    pub fn free(name: impl Into<String>) -> Stmt {
        Stmt::new(StmtNode::Free { name: name.into() })
    }

    pub fn realize(name: impl Into<String>, ty: Type, bounds: Vec<Range>, body: Stmt) -> Stmt {
        Stmt::new(StmtNode::Realize {
            name: name.into(),
            ty,
            bounds,
            body,
        })
    }

    pub fn block(first: Stmt, rest: Stmt) -> Stmt {
        Stmt::new(StmtNode::Block { first, rest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stmt_construction() {
        let body = Stmt::provide("f", Expr::var("f.x"), vec![Expr::var("f.x")]);
        let loop_ = Stmt::for_loop(
            "f.x",
            Expr::int(0),
            Expr::int(10),
            ForType::Serial,
            body.clone(),
        );
        match loop_.node() {
            StmtNode::For {
                name,
                for_type,
                body: b,
                ..
            } => {
                assert_eq!(name, "f.x");
                assert_eq!(*for_type, ForType::Serial);
                assert!(b.same_as(&body));
            }
            _ => panic!("expected a For"),
        }
    }
}
