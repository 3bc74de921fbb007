//! Environment discovery and realization ordering

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::function::Function;
use crate::ir::visit::{walk_expr, IRVisitor};
use crate::ir::{CallType, Expr, ExprNode};

/// Every function reachable from the output, by name
pub type Environment = FxHashMap<String, Function>;

/// Find all the pipeline-function calls in an expression
struct FindCalls {
    calls: FxHashMap<String, Function>,
    error: Option<Error>,
}

impl IRVisitor for FindCalls {
    fn visit_expr(&mut self, e: &Expr) {
        walk_expr(self, e);
        if let ExprNode::Call {
            name,
            call_type: CallType::Func,
            func,
            ..
        } = e.node()
        {
            match func.as_ref().and_then(|f| f.upgrade()) {
                Some(f) => {
                    self.calls.insert(name.clone(), f);
                }
                None => {
                    if self.error.is_none() {
                        self.error = Some(Error::internal(format!(
                            "callee '{}' was dropped before lowering",
                            name
                        )));
                    }
                }
            }
        }
    }
}

/// The functions called directly from `f`'s definitions
fn direct_calls(f: &Function) -> Result<FxHashMap<String, Function>> {
    let mut finder = FindCalls {
        calls: FxHashMap::default(),
        error: None,
    };
    finder.visit_expr(&f.value());
    if let Some(reduction) = f.reduction() {
        finder.visit_expr(&reduction.value);
        for arg in &reduction.args {
            finder.visit_expr(arg);
        }
    }
    match finder.error {
        Some(e) => Err(e),
        None => Ok(finder.calls),
    }
}

/// Add `f` and everything it transitively calls to `env`
pub fn populate_environment(f: &Function, env: &mut Environment) -> Result<()> {
    if env.contains_key(f.name()) {
        return Ok(());
    }
    env.insert(f.name().to_string(), f.clone());
    for callee in direct_calls(f)?.values() {
        populate_environment(callee, env)?;
    }
    Ok(())
}

/// A topological order of the call graph, ending at `output`
///
/// Repeatedly emits any function whose callees have all been emitted; a
/// reduction's self-call does not block readiness. Making no progress before
/// emitting `output` means the pipeline's call graph has a cycle.
pub fn realization_order(output: &str, env: &Environment) -> Result<Vec<String>> {
    let mut graph: FxHashMap<&str, FxHashSet<String>> = FxHashMap::default();
    for (name, f) in env {
        graph.insert(name.as_str(), direct_calls(f)?.into_keys().collect());
    }

    // Scan in sorted order so the result is deterministic.
    let mut names: Vec<&str> = env.keys().map(String::as_str).collect();
    names.sort_unstable();

    let mut result: Vec<String> = Vec::new();
    let mut done: FxHashSet<&str> = FxHashSet::default();
    loop {
        let mut scheduled_something = false;
        for &name in &names {
            if done.contains(name) {
                continue;
            }
            let inputs = &graph[name];
            let ready = inputs
                .iter()
                .all(|input| input == name || done.contains(input.as_str()));
            if ready {
                scheduled_something = true;
                done.insert(name);
                result.push(name.to_string());
                if name == output {
                    return Ok(result);
                }
            }
        }
        if !scheduled_something {
            return Err(Error::cyclic_pipeline(format!(
                "no realization order exists for output '{}'",
                output
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_environment_reaches_transitively() {
        let h = Function::new("h", ["x"], Expr::var("x"));
        let g = Function::new("g", ["x"], h.call(vec![Expr::var("x")]) + 1);
        let f = Function::new("f", ["x"], g.call(vec![Expr::var("x")]) * 2);

        let mut env = Environment::default();
        populate_environment(&f, &mut env).unwrap();
        assert_eq!(env.len(), 3);
        assert!(env.contains_key("f") && env.contains_key("g") && env.contains_key("h"));
    }

    #[test]
    fn test_realization_order_callees_first() {
        let h = Function::new("h", ["x"], Expr::var("x"));
        let g = Function::new("g", ["x"], h.call(vec![Expr::var("x")]) + 1);
        let f = Function::new(
            "f",
            ["x"],
            g.call(vec![Expr::var("x")]) + h.call(vec![Expr::var("x")]),
        );

        let mut env = Environment::default();
        populate_environment(&f, &mut env).unwrap();
        let order = realization_order("f", &env).unwrap();
        assert_eq!(order, ["h", "g", "f"]);
    }

    #[test]
    fn test_reduction_self_call_is_not_a_cycle() {
        use crate::function::ReductionDomain;

        let f = Function::new("f", ["x"], Expr::int(0));
        let dom = ReductionDomain::single("r", Expr::int(0), Expr::int(10));
        let r = dom.var(0);
        f.define_reduction(vec![r.clone()], f.call(vec![r]) + 1, dom);

        let mut env = Environment::default();
        populate_environment(&f, &mut env).unwrap();
        let order = realization_order("f", &env).unwrap();
        assert_eq!(order, ["f"]);
    }
}
