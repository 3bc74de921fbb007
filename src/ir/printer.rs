//! Textual form of the IR
//!
//! Statements print as an indented block structure, expressions as infix with
//! minimal parentheses. The output is for pass-by-pass logging, the CLI, and
//! tests; it is stable but not parsed back.

use std::fmt;

use super::{Expr, ExprNode, ForType, Stmt, StmtNode};

impl fmt::Display for ForType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForType::Serial => write!(f, "for"),
            ForType::Parallel => write!(f, "parallel"),
            ForType::Vectorized => write!(f, "vectorized"),
            ForType::Unrolled => write!(f, "unrolled"),
        }
    }
}

fn infix(f: &mut fmt::Formatter<'_>, a: &Expr, op: &str, b: &Expr) -> fmt::Result {
    write!(f, "({} {} {})", a, op, b)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            ExprNode::IntImm { value } => write!(f, "{}", value),
            ExprNode::FloatImm { value } => write!(f, "{:?}", value),
            ExprNode::Cast { ty, value } => write!(f, "{}({})", ty, value),
            ExprNode::Variable { name, .. } => write!(f, "{}", name),
            ExprNode::Add { a, b } => infix(f, a, "+", b),
            ExprNode::Sub { a, b } => infix(f, a, "-", b),
            ExprNode::Mul { a, b } => infix(f, a, "*", b),
            ExprNode::Div { a, b } => infix(f, a, "/", b),
            ExprNode::Mod { a, b } => infix(f, a, "%", b),
            ExprNode::Min { a, b } => write!(f, "min({}, {})", a, b),
            ExprNode::Max { a, b } => write!(f, "max({}, {})", a, b),
            ExprNode::Eq { a, b } => infix(f, a, "==", b),
            ExprNode::Ne { a, b } => infix(f, a, "!=", b),
            ExprNode::Lt { a, b } => infix(f, a, "<", b),
            ExprNode::Le { a, b } => infix(f, a, "<=", b),
            ExprNode::Gt { a, b } => infix(f, a, ">", b),
            ExprNode::Ge { a, b } => infix(f, a, ">=", b),
            ExprNode::And { a, b } => infix(f, a, "&&", b),
            ExprNode::Or { a, b } => infix(f, a, "||", b),
            ExprNode::Not { a } => write!(f, "!({})", a),
            ExprNode::Select {
                condition,
                true_value,
                false_value,
            } => write!(f, "select({}, {}, {})", condition, true_value, false_value),
            ExprNode::Load { name, index, .. } => write!(f, "{}[{}]", name, index),
            ExprNode::Ramp {
                base,
                stride,
                lanes,
            } => write!(f, "ramp({}, {}, {})", base, stride, lanes),
            ExprNode::Broadcast { value, lanes } => write!(f, "x{}({})", lanes, value),
            ExprNode::Call { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            ExprNode::Let { name, value, body } => {
                write!(f, "(let {} = {} in {})", name, value, body)
            }
        }
    }
}

fn indent(f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
    write!(f, "{:width$}", "", width = level * 2)
}

fn print_stmt(s: &Stmt, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
    match s.node() {
        StmtNode::LetStmt { name, value, body } => {
            indent(f, level)?;
            writeln!(f, "let {} = {}", name, value)?;
            print_stmt(body, f, level)
        }
        StmtNode::AssertStmt { condition, message } => {
            indent(f, level)?;
            writeln!(f, "assert({}, \"{}\")", condition, message)
        }
        StmtNode::Pipeline {
            name,
            produce,
            update,
            consume,
        } => {
            indent(f, level)?;
            writeln!(f, "produce {} {{", name)?;
            print_stmt(produce, f, level + 1)?;
            if let Some(update) = update {
                indent(f, level)?;
                writeln!(f, "}} update {{")?;
                print_stmt(update, f, level + 1)?;
            }
            indent(f, level)?;
            writeln!(f, "}} consume {{")?;
            print_stmt(consume, f, level + 1)?;
            indent(f, level)?;
            writeln!(f, "}}")
        }
        StmtNode::For {
            name,
            min,
            extent,
            for_type,
            body,
        } => {
            indent(f, level)?;
            writeln!(f, "{} ({}, {}, {}) {{", for_type, name, min, extent)?;
            print_stmt(body, f, level + 1)?;
            indent(f, level)?;
            writeln!(f, "}}")
        }
        StmtNode::Store { name, value, index } => {
            indent(f, level)?;
            writeln!(f, "{}[{}] = {}", name, index, value)
        }
        StmtNode::Provide { name, value, site } => {
            indent(f, level)?;
            write!(f, "{}(", name)?;
            for (i, coord) in site.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", coord)?;
            }
            writeln!(f, ") = {}", value)
        }
        StmtNode::Allocate {
            name,
            ty,
            size,
            body,
        } => {
            indent(f, level)?;
            writeln!(f, "allocate {}[{} * {}] {{", name, ty, size)?;
            print_stmt(body, f, level + 1)?;
            indent(f, level)?;
            writeln!(f, "}}")
        }
        StmtNode::Free { name } => {
            indent(f, level)?;
            writeln!(f, "free {}", name)
        }
        StmtNode::Realize {
            name,
            ty,
            bounds,
            body,
        } => {
            indent(f, level)?;
            write!(f, "realize {}<{}>(", name, ty)?;
            for (i, range) in bounds.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "[{}, {}]", range.min, range.extent)?;
            }
            writeln!(f, ") {{")?;
            print_stmt(body, f, level + 1)?;
            indent(f, level)?;
            writeln!(f, "}}")
        }
        StmtNode::Block { first, rest } => {
            print_stmt(first, f, level)?;
            print_stmt(rest, f, level)
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        print_stmt(self, f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_display() {
        let x = Expr::var("f.x");
        let e = Expr::add(Expr::mul(x.clone(), Expr::int(2)), Expr::int(1));
        assert_eq!(e.to_string(), "((f.x * 2) + 1)");

        let sel = Expr::select(
            Expr::lt(x.clone(), Expr::int(0)),
            Expr::int(0),
            x.clone(),
        );
        assert_eq!(sel.to_string(), "select((f.x < 0), 0, f.x)");
    }

    #[test]
    fn test_stmt_display() {
        let provide = Stmt::provide("f", Expr::var("f.x"), vec![Expr::var("f.x")]);
        let loop_ = Stmt::for_loop(
            "f.x",
            Expr::int(0),
            Expr::int(4),
            ForType::Vectorized,
            provide,
        );
        let printed = loop_.to_string();
        assert_eq!(printed, "vectorized (f.x, 0, 4) {\n  f(f.x) = f.x\n}\n");
    }
}
