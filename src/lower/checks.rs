//! Safety checks around the pipeline root
//!
//! Every externally referenced image buffer, plus the output, gets a runtime
//! contract: the innermost stride is one (dense inner dimension), and the
//! buffer's declared min/extent cover the region the pipeline actually
//! touches. The checks are `AssertStmt`s evaluated before the pipeline body
//! runs; lowering itself only fails here if a touched region is unbounded.

use tracing::trace;

use crate::bounds::regions_touched;
use crate::error::{Error, Result};
use crate::function::Function;
use crate::ir::visit::{walk_expr, IRVisitor};
use crate::ir::{CallType, Expr, ExprNode, Stmt};
use crate::scope::Scope;

/// Collect externally referenced image buffers, in first-use order
struct FindBuffers {
    buffers: Vec<String>,
}

impl FindBuffers {
    fn include(&mut self, name: &str) {
        if !self.buffers.iter().any(|b| b == name) {
            self.buffers.push(name.to_string());
        }
    }
}

impl IRVisitor for FindBuffers {
    fn visit_expr(&mut self, e: &Expr) {
        walk_expr(self, e);
        if let ExprNode::Call {
            name,
            call_type: CallType::Image,
            ..
        } = e.node()
        {
            self.include(name);
        }
    }
}

/// Wrap `s` with stride and region checks for every input image and for the
/// output `f`
pub fn add_image_checks(s: &Stmt, f: &Function) -> Result<Stmt> {
    let mut finder = FindBuffers {
        buffers: Vec::new(),
    };
    finder.visit_stmt(s);
    let mut buffers = finder.buffers;
    buffers.push(f.name().to_string());

    let regions = regions_touched(s, &Scope::new());

    let mut s = s.clone();
    for buffer in &buffers {
        // The innermost dimension of every buffer is dense.
        let stride_name = format!("{}.stride.0", buffer);
        let stride = Expr::var(stride_name.as_str());
        s = Stmt::block(
            Stmt::assert_stmt(
                Expr::eq(stride, Expr::int(1)),
                format!("stride on innermost dimension of {} must be one", buffer),
            ),
            Stmt::let_stmt(stride_name, Expr::int(1), s),
        );

        let Some(region) = regions.get(buffer) else {
            continue;
        };
        trace!("region touched in image {}:", buffer);
        for (dim, interval) in region.iter().enumerate() {
            let min_used = interval
                .min
                .clone()
                .ok_or_else(|| Error::unbounded_access(buffer, dim))?;
            let extent_used = interval
                .extent()
                .ok_or_else(|| Error::unbounded_access(buffer, dim))?;
            trace!("  dim {}: {}, {}", dim, min_used, extent_used);

            let actual_min = Expr::var(format!("{}.min.{}", buffer, dim));
            let actual_extent = Expr::var(format!("{}.extent.{}", buffer, dim));
            let covered = Expr::and(
                Expr::le(actual_min.clone(), min_used.clone()),
                Expr::ge(actual_min + actual_extent, min_used + extent_used),
            );
            s = Stmt::block(
                Stmt::assert_stmt(covered, format!("{} is accessed out of bounds", buffer)),
                s,
            );
        }
    }

    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ForType, Type};

    #[test]
    fn test_checks_cover_inputs_and_output() {
        let x = Expr::var("f.x");
        let value = Expr::image(Type::int(32), "input", vec![x.clone()]);
        let provide = Stmt::provide("f", value, vec![x.clone()]);
        let s = Stmt::for_loop(
            "f.x",
            Expr::int(0),
            Expr::int(16),
            ForType::Serial,
            provide,
        );

        let f = Function::new("f", ["x"], Expr::int(0));
        let checked = add_image_checks(&s, &f).unwrap();
        let printed = checked.to_string();

        assert!(
            printed.contains("stride on innermost dimension of input must be one"),
            "{}",
            printed
        );
        assert!(
            printed.contains("stride on innermost dimension of f must be one"),
            "{}",
            printed
        );
        assert!(printed.contains("let input.stride.0 = 1"), "{}", printed);
        assert!(printed.contains("input is accessed out of bounds"), "{}", printed);
        assert!(printed.contains("f is accessed out of bounds"), "{}", printed);
    }
}
