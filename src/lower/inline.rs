//! Function inlining

use crate::function::Function;
use crate::ir::visit::{mutate_expr_children, IRMutator};
use crate::ir::{CallType, Expr, ExprNode, Stmt};
use crate::substitute::qualify_expr;

/// Replace every call to one function by its substituted body
struct InlineFunction {
    func: Function,
}

impl IRMutator for InlineFunction {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        if let ExprNode::Call {
            name,
            args,
            call_type: CallType::Func,
            ..
        } = e.node()
        {
            if name == self.func.name() {
                let args: Vec<Expr> = args.iter().map(|arg| self.mutate_expr(arg)).collect();
                debug_assert_eq!(args.len(), self.func.args().len());

                let prefix = format!("{}.", self.func.name());
                let mut body = qualify_expr(&prefix, &self.func.value());

                // Bind the arguments, first argument outermost.
                for (formal, actual) in self.func.args().iter().zip(args).rev() {
                    body = Expr::let_in(format!("{}{}", prefix, formal), actual, body);
                }
                return body;
            }
        }
        mutate_expr_children(self, e)
    }
}

/// Rewrite every call to `f` in `s` into `f`'s qualified body under one `Let`
/// per argument
pub fn inline_function(f: &Function, s: &Stmt) -> Stmt {
    InlineFunction { func: f.clone() }.mutate_stmt(s)
}
