//! Integration tests for pipeline-level properties: realization ordering,
//! the external pass suite, and the invariants lowered IR must keep.

mod common;
use common::*;

use std::cell::Cell;
use std::rc::Rc;

use prism::prelude::*;

mod realization_order {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diamond_orders_callees_before_callers() {
        let x = Expr::var("x");
        let base = Function::new("base", ["x"], x.clone() + 1);
        let left = Function::new("left", ["x"], base.call(vec![x.clone()]) * 2);
        let right = Function::new("right", ["x"], base.call(vec![x.clone()]) * 3);
        let out = Function::new(
            "out",
            ["x"],
            left.call(vec![x.clone()]) + right.call(vec![x]),
        );

        let mut env = Environment::default();
        prism::lower::populate_environment(&out, &mut env).unwrap();
        let order = prism::lower::realization_order("out", &env).unwrap();

        assert_eq!(order.len(), 4);
        assert_eq!(order.last().unwrap(), "out");
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(position("base") < position("left"));
        assert!(position("base") < position("right"));
        assert!(position("left") < position("out"));
        assert!(position("right") < position("out"));
    }
}

mod pass_suite {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simplify_runs_twice_in_driver_order() {
        let f = Function::new("f", ["x"], Expr::var("x") + 1);

        let simplify_runs = Rc::new(Cell::new(0));
        let seen = simplify_runs.clone();
        let mut suite = PassSuite::default();
        suite.simplify = pass_fn("simplify", move |s, _cx| {
            seen.set(seen.get() + 1);
            Ok(s)
        });

        lower_with_passes(&f, &suite).unwrap();
        assert_eq!(simplify_runs.get(), 2);
    }

    #[test]
    fn test_passes_see_order_and_environment() {
        let x = Expr::var("x");
        let g = Function::new("g", ["x"], x.clone() * 2);
        let f = Function::new("f", ["x"], g.call(vec![x]));

        let mut suite = PassSuite::default();
        suite.bounds_inference = pass_fn("bounds_inference", |s, cx| {
            assert_eq!(cx.order, ["g", "f"]);
            assert!(cx.env.contains_key("g") && cx.env.contains_key("f"));
            Ok(s)
        });
        lower_with_passes(&f, &suite).unwrap();
    }

    #[test]
    fn test_failing_pass_aborts_lowering() {
        let f = Function::new("f", ["x"], Expr::var("x"));
        let mut suite = PassSuite::default();
        suite.storage_flattening = pass_fn("storage_flattening", |_s, _cx| {
            Err(Error::internal("backend refused"))
        });
        let err = lower_with_passes(&f, &suite).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}

mod invariants {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stencil() -> Function {
        let (x, y) = (Expr::var("x"), Expr::var("y"));
        let g = Function::new("g", ["x", "y"], x.clone() - y.clone());
        let f = Function::new(
            "f",
            ["x", "y"],
            g.call(vec![x.clone(), y.clone()]) + g.call(vec![x, y.clone() - 1]),
        );
        g.store_at(&f, "y").compute_at(&f, "x");
        f
    }

    #[test]
    fn test_default_mutator_is_identity_on_lowered_ir() {
        struct Identity;
        impl IRMutator for Identity {}

        let stmt = lower(&stencil()).unwrap();
        let out = Identity.mutate_stmt(&stmt);
        assert!(out.same_as(&stmt));
    }

    #[test]
    fn test_every_provide_site_matches_callee_arity() {
        let stmt = lower(&stencil()).unwrap();
        for provide in find_provides(&stmt, "g") {
            let StmtNode::Provide { site, .. } = provide.node() else {
                unreachable!()
            };
            assert_eq!(site.len(), 2);
        }
        for provide in find_provides(&stmt, "f") {
            let StmtNode::Provide { site, .. } = provide.node() else {
                unreachable!()
            };
            assert_eq!(site.len(), 2);
        }
    }

    #[test]
    fn test_realize_dominates_provides_of_its_buffer() {
        let stmt = lower(&stencil()).unwrap();
        // Every write to g is inside the one Realize of g.
        let realize = find_realize(&stmt, "g").unwrap();
        let StmtNode::Realize { body, .. } = realize.node() else {
            unreachable!()
        };
        assert_eq!(
            find_provides(body, "g").len(),
            find_provides(&stmt, "g").len()
        );
    }

    #[test]
    fn test_parameters_survive_lowering_unqualified() {
        let gain = Parameter::scalar("gain", Type::int(32));
        let f = Function::new("f", ["x"], Expr::var("x") * gain.variable());

        let stmt = lower(&f).unwrap();
        let provides = find_provides(&stmt, "f");
        let StmtNode::Provide { value, .. } = provides[0].node() else {
            unreachable!()
        };
        assert_eq!(value.to_string(), "(f.x * gain)");
    }

    #[test]
    fn test_dropped_intermediate_handles_keep_the_pipeline_alive() {
        // Build a three-stage chain inside a scope that drops every handle
        // but the output; the calls own their callees.
        let out = {
            let x = Expr::var("x");
            let a = Function::new("a", ["x"], x.clone() + 1);
            let b = Function::new("b", ["x"], a.call(vec![x.clone()]) * 2);
            Function::new("out", ["x"], b.call(vec![x]) - 3)
        };

        let stmt = lower(&out).unwrap();
        let printed = stmt.to_string();
        assert!(printed.contains("let b.x = out.x"), "{}", printed);
        assert!(printed.contains("let a.x = b.x"), "{}", printed);
    }

    #[test]
    fn test_lowered_loop_names_are_unique_in_parent_chain() {
        let stmt = lower(&stencil()).unwrap();
        let names = for_loop_names(&stmt);
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len(), "duplicate loop name in {:?}", names);
    }
}
