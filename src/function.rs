//! Pipeline functions and their shared handles
//!
//! A [`Function`] is a named pure definition `f(args) = value`, optionally
//! augmented with a reduction update over a [`ReductionDomain`]. Handles are
//! reference-counted and shared: the same `Function` appears in the
//! environment, in `Call` nodes of its consumers (through a [`FunctionRef`]
//! back-reference), and in scheduling calls from the front-end. Schedules are
//! the only mutable part, and only before lowering begins (plus the one
//! sanctioned rewrite: promoting a reduction's default inline levels to
//! root).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::ir::visit::{mutate_expr_children, walk_expr, IRMutator, IRVisitor};
use crate::ir::{CallType, Expr, ExprNode, ForType, Type};
use crate::schedule::{Bound, Dim, LoopLevel, Schedule, Split};

/// A scalar or buffer argument supplied to the pipeline from outside
///
/// Parameter references are resolved by the backend ABI, not by lowering, so
/// qualification leaves their variables untouched.
#[derive(Debug, Clone)]
pub struct Parameter {
    inner: Rc<ParameterInner>,
}

#[derive(Debug)]
struct ParameterInner {
    name: String,
    ty: Type,
    is_buffer: bool,
}

impl Parameter {
    /// A scalar parameter
    pub fn scalar(name: impl Into<String>, ty: Type) -> Parameter {
        Parameter {
            inner: Rc::new(ParameterInner {
                name: name.into(),
                ty,
                is_buffer: false,
            }),
        }
    }

    /// A buffer parameter
    pub fn buffer(name: impl Into<String>, ty: Type) -> Parameter {
        Parameter {
            inner: Rc::new(ParameterInner {
                name: name.into(),
                ty,
                is_buffer: true,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn ty(&self) -> Type {
        self.inner.ty
    }

    pub fn is_buffer(&self) -> bool {
        self.inner.is_buffer
    }

    /// A variable referencing this parameter
    pub fn variable(&self) -> Expr {
        Expr::variable(self.ty(), self.name().to_string(), None, Some(self.clone()))
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// One variable of a reduction domain, iterating `[min, min+extent)`
#[derive(Debug, Clone)]
pub struct ReductionVariable {
    pub var: String,
    pub min: Expr,
    pub extent: Expr,
}

/// An ordered set of reduction variables shared by the update definition
#[derive(Debug, Clone)]
pub struct ReductionDomain {
    vars: Rc<Vec<ReductionVariable>>,
}

impl ReductionDomain {
    pub fn new(vars: Vec<ReductionVariable>) -> ReductionDomain {
        ReductionDomain { vars: Rc::new(vars) }
    }

    /// Build a one-dimensional domain
    pub fn single(var: impl Into<String>, min: Expr, extent: Expr) -> ReductionDomain {
        ReductionDomain::new(vec![ReductionVariable {
            var: var.into(),
            min,
            extent,
        }])
    }

    pub fn domain(&self) -> &[ReductionVariable] {
        &self.vars
    }

    /// A variable referencing the `i`-th reduction variable
    pub fn var(&self, i: usize) -> Expr {
        Expr::variable(
            Type::int(32),
            self.vars[i].var.clone(),
            Some(self.clone()),
            None,
        )
    }
}

/// The reduction part of a function: `f(args) = value` over a domain
#[derive(Debug, Clone)]
pub struct ReductionDefinition {
    pub args: Vec<Expr>,
    pub value: Expr,
    pub domain: ReductionDomain,
}

/// A weak handle to a function
#[derive(Clone)]
pub struct WeakFunction {
    inner: Weak<FunctionInner>,
}

impl WeakFunction {
    /// Recover the strong handle, if the callee is still alive
    pub fn upgrade(&self) -> Option<Function> {
        self.inner.upgrade().map(|inner| Function { inner })
    }
}

impl fmt::Debug for WeakFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(func) => write!(f, "WeakFunction({})", func.name()),
            None => write!(f, "WeakFunction(<dropped>)"),
        }
    }
}

/// The back-reference from a `Call` to its callee
///
/// Calls normally own their callee, so a pipeline stays alive as long as any
/// consumer of it does. The one exception is a reduction's call to itself:
/// the update definition lives inside the function it references, so a strong
/// reference there would form a cycle and leak. `Function::define_reduction`
/// demotes self-calls to weak; upgrading one always succeeds during lowering
/// because the caller is the callee.
#[derive(Clone, Debug)]
pub enum FunctionRef {
    Strong(Function),
    Weak(WeakFunction),
}

impl FunctionRef {
    /// The referenced function, if still alive
    pub fn upgrade(&self) -> Option<Function> {
        match self {
            FunctionRef::Strong(f) => Some(f.clone()),
            FunctionRef::Weak(w) => w.upgrade(),
        }
    }
}

/// A named, pure, image-valued definition with its schedules
#[derive(Clone)]
pub struct Function {
    inner: Rc<FunctionInner>,
}

struct FunctionInner {
    name: String,
    args: Vec<String>,
    value: Expr,
    reduction: RefCell<Option<ReductionDefinition>>,
    schedule: RefCell<Schedule>,
    reduction_schedule: RefCell<Schedule>,
}

impl Function {
    /// Define a pure function `name(args) = value`
    ///
    /// The default schedule carries one serial loop per argument (first
    /// argument innermost) and inline compute/store levels.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        args: impl IntoIterator<Item = S>,
        value: Expr,
    ) -> Function {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let schedule = Schedule {
            dims: args
                .iter()
                .map(|a| Dim {
                    var: a.clone(),
                    for_type: ForType::Serial,
                })
                .collect(),
            ..Schedule::default()
        };
        Function {
            inner: Rc::new(FunctionInner {
                name: name.into(),
                args,
                value,
                reduction: RefCell::new(None),
                schedule: RefCell::new(schedule),
                reduction_schedule: RefCell::new(Schedule::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn args(&self) -> &[String] {
        &self.inner.args
    }

    pub fn value(&self) -> Expr {
        self.inner.value.clone()
    }

    pub fn is_reduction(&self) -> bool {
        self.inner.reduction.borrow().is_some()
    }

    /// The reduction part, if one was defined
    pub fn reduction(&self) -> Option<ReductionDefinition> {
        self.inner.reduction.borrow().clone()
    }

    /// Attach an update definition `name(args) = value` over `domain`
    ///
    /// The default reduction schedule iterates the free pure variables of the
    /// update site (innermost) and then the domain variables. Calls back to
    /// this function inside the update are demoted to weak references so the
    /// definition does not own itself.
    pub fn define_reduction(&self, args: Vec<Expr>, value: Expr, domain: ReductionDomain) {
        let mut demote = DemoteSelfCalls { func: self };
        let args: Vec<Expr> = args.iter().map(|a| demote.mutate_expr(a)).collect();
        let value = demote.mutate_expr(&value);
        let mut dims: Vec<Dim> = Vec::new();
        let mut seen = Vec::new();
        for arg in &args {
            for var in free_pure_vars(arg) {
                if !seen.contains(&var) {
                    seen.push(var.clone());
                    dims.push(Dim {
                        var,
                        for_type: ForType::Serial,
                    });
                }
            }
        }
        for rv in domain.domain() {
            dims.push(Dim {
                var: rv.var.clone(),
                for_type: ForType::Serial,
            });
        }
        *self.inner.reduction_schedule.borrow_mut() = Schedule {
            dims,
            ..Schedule::default()
        };
        *self.inner.reduction.borrow_mut() = Some(ReductionDefinition {
            args,
            value,
            domain,
        });
    }

    /// A snapshot of the pure schedule
    pub fn schedule(&self) -> Schedule {
        self.inner.schedule.borrow().clone()
    }

    /// A snapshot of the update schedule
    pub fn reduction_schedule(&self) -> Schedule {
        self.inner.reduction_schedule.borrow().clone()
    }

    /// A call to this function at the given site
    pub fn call(&self, args: Vec<Expr>) -> Expr {
        debug_assert_eq!(args.len(), self.args().len());
        Expr::call(
            self.value().ty(),
            self.name().to_string(),
            args,
            CallType::Func,
            Some(FunctionRef::Strong(self.clone())),
        )
    }

    /// A weak handle to this function
    pub fn downgrade(&self) -> WeakFunction {
        WeakFunction {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // -- scheduling ----------------------------------------------------------

    /// Split `old_var` into `outer * factor + inner`
    ///
    /// Fails if the schedule has no dimension named `old_var`.
    pub fn split(&self, old_var: &str, outer: &str, inner: &str, factor: i32) -> Result<&Function> {
        let mut schedule = self.inner.schedule.borrow_mut();
        let pos = schedule
            .dims
            .iter()
            .position(|d| d.var == old_var)
            .ok_or_else(|| {
                Error::malformed_schedule(format!(
                    "split: no dimension named {} in {}",
                    old_var,
                    self.name()
                ))
            })?;
        let for_type = schedule.dims[pos].for_type;
        schedule.dims[pos] = Dim {
            var: inner.to_string(),
            for_type,
        };
        schedule.dims.insert(
            pos + 1,
            Dim {
                var: outer.to_string(),
                for_type,
            },
        );
        schedule.splits.push(Split {
            old_var: old_var.to_string(),
            outer: outer.to_string(),
            inner: inner.to_string(),
            factor: Expr::int(factor),
        });
        Ok(self)
    }

    fn set_for_type(&self, var: &str, for_type: ForType) -> Result<&Function> {
        let mut schedule = self.inner.schedule.borrow_mut();
        let dim = schedule
            .dims
            .iter_mut()
            .find(|d| d.var == var)
            .ok_or_else(|| {
                Error::malformed_schedule(format!(
                    "no dimension named {} in {}",
                    var,
                    self.name()
                ))
            })?;
        dim.for_type = for_type;
        Ok(self)
    }

    /// Mark a loop parallel
    ///
    /// Fails if the schedule has no dimension named `var`.
    pub fn parallel(&self, var: &str) -> Result<&Function> {
        self.set_for_type(var, ForType::Parallel)
    }

    /// Mark a loop vectorized
    ///
    /// Fails if the schedule has no dimension named `var`.
    pub fn vectorize(&self, var: &str) -> Result<&Function> {
        self.set_for_type(var, ForType::Vectorized)
    }

    /// Mark a loop unrolled
    ///
    /// Fails if the schedule has no dimension named `var`.
    pub fn unroll(&self, var: &str) -> Result<&Function> {
        self.set_for_type(var, ForType::Unrolled)
    }

    /// Assert explicit bounds for one dimension
    pub fn bound(&self, var: &str, min: Expr, extent: Expr) -> &Function {
        self.inner.schedule.borrow_mut().bounds.push(Bound {
            var: var.to_string(),
            min,
            extent,
        });
        self
    }

    /// Compute this function inside the named loop of a consumer
    pub fn compute_at(&self, consumer: &Function, var: &str) -> &Function {
        self.inner.schedule.borrow_mut().compute_level =
            LoopLevel::at(consumer.name(), var);
        self
    }

    /// Compute this function at the pipeline root
    pub fn compute_root(&self) -> &Function {
        let mut schedule = self.inner.schedule.borrow_mut();
        schedule.compute_level = LoopLevel::Root;
        schedule.store_level = LoopLevel::Root;
        self
    }

    /// Store this function's buffer at the named loop of a consumer
    pub fn store_at(&self, consumer: &Function, var: &str) -> &Function {
        self.inner.schedule.borrow_mut().store_level = LoopLevel::at(consumer.name(), var);
        self
    }

    /// Store this function's buffer at the pipeline root
    pub fn store_root(&self) -> &Function {
        self.inner.schedule.borrow_mut().store_level = LoopLevel::Root;
        self
    }

    /// The one sanctioned late schedule rewrite: a reduction still inline when
    /// realizations are injected is computed and stored at root.
    pub(crate) fn promote_reduction_to_root(&self) {
        let mut schedule = self.inner.schedule.borrow_mut();
        schedule.compute_level = LoopLevel::Root;
        schedule.store_level = LoopLevel::Root;
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.inner.name)
            .field("args", &self.inner.args)
            .finish_non_exhaustive()
    }
}

/// Rewrite strong self-calls into weak ones inside a reduction definition
struct DemoteSelfCalls<'a> {
    func: &'a Function,
}

impl IRMutator for DemoteSelfCalls<'_> {
    fn mutate_expr(&mut self, e: &Expr) -> Expr {
        let e = mutate_expr_children(self, e);
        if let ExprNode::Call {
            ty,
            name,
            args,
            call_type: CallType::Func,
            func: Some(FunctionRef::Strong(callee)),
        } = e.node()
        {
            if callee == self.func {
                return Expr::call(
                    *ty,
                    name.clone(),
                    args.clone(),
                    CallType::Func,
                    Some(FunctionRef::Weak(callee.downgrade())),
                );
            }
        }
        e
    }
}

/// Collect the free non-parameter, non-reduction variables of an expression,
/// in first-appearance order.
fn free_pure_vars(e: &Expr) -> Vec<String> {
    struct Collect {
        vars: Vec<String>,
    }
    impl IRVisitor for Collect {
        fn visit_expr(&mut self, e: &Expr) {
            if let ExprNode::Variable {
                name,
                reduction_domain: None,
                param: None,
                ..
            } = e.node()
            {
                if !self.vars.contains(name) {
                    self.vars.push(name.clone());
                }
            }
            walk_expr(self, e);
        }
    }
    let mut c = Collect { vars: Vec::new() };
    c.visit_expr(e);
    c.vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let f = Function::new("f", ["x", "y"], Expr::add(Expr::var("x"), Expr::var("y")));
        let schedule = f.schedule();
        assert_eq!(schedule.dims.len(), 2);
        assert_eq!(schedule.dims[0].var, "x");
        assert_eq!(schedule.dims[1].var, "y");
        assert!(schedule.compute_level.is_inline());
        assert!(schedule.store_level.is_inline());
    }

    #[test]
    fn test_split_rewrites_dims() {
        let f = Function::new("f", ["x", "y"], Expr::add(Expr::var("x"), Expr::var("y")));
        f.split("x", "xo", "xi", 4).unwrap();
        let schedule = f.schedule();
        let dims: Vec<&str> = schedule.dims.iter().map(|d| d.var.as_str()).collect();
        assert_eq!(dims, ["xi", "xo", "y"]);
        assert_eq!(schedule.splits.len(), 1);
        assert_eq!(schedule.splits[0].old_var, "x");
    }

    #[test]
    fn test_scheduling_an_unknown_dimension_fails() {
        let f = Function::new("f", ["x"], Expr::var("x"));
        let err = f.split("z", "zo", "zi", 4).unwrap_err();
        assert!(matches!(err, Error::MalformedSchedule(_)), "{}", err);

        let err = f.vectorize("z").unwrap_err();
        assert!(matches!(err, Error::MalformedSchedule(_)), "{}", err);

        // A failed call leaves the schedule untouched.
        let schedule = f.schedule();
        assert_eq!(schedule.dims.len(), 1);
        assert!(schedule.splits.is_empty());
    }

    #[test]
    fn test_reduction_schedule_dims() {
        let f = Function::new("hist", ["x"], Expr::int(0));
        let dom = ReductionDomain::single("r", Expr::int(0), Expr::int(10));
        let r = dom.var(0);
        f.define_reduction(
            vec![r.clone()],
            Expr::add(f.call(vec![r]), Expr::int(1)),
            dom,
        );
        assert!(f.is_reduction());
        let dims: Vec<String> = f
            .reduction_schedule()
            .dims
            .iter()
            .map(|d| d.var.clone())
            .collect();
        // The site is the reduction variable itself: no free pure vars.
        assert_eq!(dims, ["r"]);
    }

    #[test]
    fn test_call_back_reference_upgrades() {
        let f = Function::new("f", ["x"], Expr::var("x"));
        let call = f.call(vec![Expr::int(0)]);
        match call.node() {
            ExprNode::Call { func: Some(w), .. } => {
                assert_eq!(w.upgrade().unwrap().name(), "f");
            }
            _ => panic!("expected a Call with a back-reference"),
        }
    }

    #[test]
    fn test_reduction_self_call_is_demoted_to_weak() {
        let f = Function::new("f", ["x"], Expr::int(0));
        let dom = ReductionDomain::single("r", Expr::int(0), Expr::int(4));
        let r = dom.var(0);
        f.define_reduction(vec![r.clone()], Expr::add(f.call(vec![r]), Expr::int(1)), dom);

        let reduction = f.reduction().unwrap();
        let ExprNode::Add { a, .. } = reduction.value.node() else {
            panic!("expected the update value to be an Add");
        };
        match a.node() {
            ExprNode::Call {
                func: Some(FunctionRef::Weak(w)),
                ..
            } => {
                assert_eq!(w.upgrade().unwrap().name(), "f");
            }
            other => panic!("self-call should hold a weak reference, got {:?}", other),
        }
    }
}
