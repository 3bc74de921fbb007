//! Shared helpers for integration tests: small queries over lowered IR

use prism::prelude::*;

struct FindStmt<F> {
    pred: F,
    found: Option<Stmt>,
}

impl<F: Fn(&Stmt) -> bool> IRVisitor for FindStmt<F> {
    fn visit_stmt(&mut self, s: &Stmt) {
        if self.found.is_some() {
            return;
        }
        if (self.pred)(s) {
            self.found = Some(s.clone());
            return;
        }
        walk_stmt(self, s);
    }
}

fn find_stmt(s: &Stmt, pred: impl Fn(&Stmt) -> bool) -> Option<Stmt> {
    let mut finder = FindStmt { pred, found: None };
    finder.visit_stmt(s);
    finder.found
}

/// The names of every `For` loop under `s`, in pre-order
#[allow(dead_code)]
pub fn for_loop_names(s: &Stmt) -> Vec<String> {
    struct Collect {
        names: Vec<String>,
    }
    impl IRVisitor for Collect {
        fn visit_stmt(&mut self, s: &Stmt) {
            if let StmtNode::For { name, .. } = s.node() {
                self.names.push(name.clone());
            }
            walk_stmt(self, s);
        }
    }
    let mut collector = Collect { names: Vec::new() };
    collector.visit_stmt(s);
    collector.names
}

/// The first `For` loop named `name`
#[allow(dead_code)]
pub fn find_for(s: &Stmt, name: &str) -> Option<Stmt> {
    find_stmt(s, |s| matches!(s.node(), StmtNode::For { name: n, .. } if n == name))
}

/// The first `Realize` of buffer `name`
#[allow(dead_code)]
pub fn find_realize(s: &Stmt, name: &str) -> Option<Stmt> {
    find_stmt(s, |s| matches!(s.node(), StmtNode::Realize { name: n, .. } if n == name))
}

/// The first `Pipeline` producing buffer `name`
#[allow(dead_code)]
pub fn find_pipeline(s: &Stmt, name: &str) -> Option<Stmt> {
    find_stmt(s, |s| matches!(s.node(), StmtNode::Pipeline { name: n, .. } if n == name))
}

/// Every `Provide` writing buffer `name`, in pre-order
#[allow(dead_code)]
pub fn find_provides(s: &Stmt, name: &str) -> Vec<Stmt> {
    struct Collect<'a> {
        name: &'a str,
        found: Vec<Stmt>,
    }
    impl IRVisitor for Collect<'_> {
        fn visit_stmt(&mut self, s: &Stmt) {
            if let StmtNode::Provide { name, .. } = s.node() {
                if name == self.name {
                    self.found.push(s.clone());
                }
            }
            walk_stmt(self, s);
        }
    }
    let mut collector = Collect {
        name,
        found: Vec::new(),
    };
    collector.visit_stmt(s);
    collector.found
}

/// How many `AssertStmt`s `s` contains
#[allow(dead_code)]
pub fn count_asserts(s: &Stmt) -> usize {
    struct Count {
        count: usize,
    }
    impl IRVisitor for Count {
        fn visit_stmt(&mut self, s: &Stmt) {
            if matches!(s.node(), StmtNode::AssertStmt { .. }) {
                self.count += 1;
            }
            walk_stmt(self, s);
        }
    }
    let mut counter = Count { count: 0 };
    counter.visit_stmt(s);
    counter.count
}
