//! Renders syntax trees back into source text.
//!
//! The output parses back into the same tree: parenthesized sub-expressions
//! are kept as explicit `Grouping` nodes by the parser, so printing never needs
//! to add parentheses of its own.

use crate::expr::Expr;
use crate::expr::LiteralValue;
use crate::scanner::Token;
use crate::stmt::Stmt;

pub fn print_program(statements: &[Stmt]) -> String {
    let mut printed = String::new();
    for statement in statements {
        format_stmt(statement, &mut printed);
        printed.push('\n');
    }
    printed
}

pub fn print_stmt(statement: &Stmt) -> String {
    let mut printed = String::new();
    format_stmt(statement, &mut printed);
    printed
}

pub fn print_expr(root: &Expr) -> String {
    let mut printed = String::new();
    format_expr(root, &mut printed);
    printed
}

fn format_stmt(statement: &Stmt, output: &mut String) {
    match statement {
        Stmt::Block { statements } => format_block(statements, output),
        Stmt::Expression { expression } => {
            format_expr(expression, output);
            output.push(';');
        }
        Stmt::Function { declaration } => {
            output.push_str("fun ");
            output.push_str(&declaration.name.lexeme);
            output.push('(');
            format_separated(&declaration.params, output, |param, output| {
                output.push_str(&param.lexeme);
            });
            output.push_str(") ");
            format_block(&declaration.body, output);
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            output.push_str("if (");
            format_expr(condition, output);
            output.push_str(") ");
            format_stmt(then_branch, output);
            if let Some(else_branch) = else_branch {
                output.push_str(" else ");
                format_stmt(else_branch, output);
            }
        }
        Stmt::Print { expression } => {
            output.push_str("print ");
            format_expr(expression, output);
            output.push(';');
        }
        Stmt::Return { value, .. } => {
            output.push_str("return");
            if let Some(value) = value {
                output.push(' ');
                format_expr(value, output);
            }
            output.push(';');
        }
        Stmt::Var { name, initializer } => {
            output.push_str("var ");
            output.push_str(&name.lexeme);
            output.push_str(" = ");
            format_expr(initializer, output);
            output.push(';');
        }
        Stmt::While { condition, body } => {
            output.push_str("while (");
            format_expr(condition, output);
            output.push_str(") ");
            format_stmt(body, output);
        }
    }
}

fn format_block(statements: &[Stmt], output: &mut String) {
    output.push('{');
    for statement in statements {
        output.push(' ');
        format_stmt(statement, output);
    }
    output.push_str(" }");
}

fn format_expr(expr: &Expr, output: &mut String) {
    match expr {
        Expr::Assign { name, value } => {
            output.push_str(&name.lexeme);
            output.push_str(" = ");
            format_expr(value, output);
        }
        Expr::Binary { left, operator, right } | Expr::Logical { left, operator, right } => {
            format_infix(left, operator, right, output);
        }
        Expr::Call { callee, arguments, .. } => {
            format_expr(callee, output);
            output.push('(');
            format_separated(arguments, output, format_expr);
            output.push(')');
        }
        Expr::Grouping { expression } => {
            output.push('(');
            format_expr(expression, output);
            output.push(')');
        }
        Expr::Literal { value } => format_literal(value, output),
        Expr::Unary { operator, right } => {
            output.push_str(&operator.lexeme);
            // keep `- -x` from reading as one token pair like `!=`
            if matches!(**right, Expr::Unary { .. }) {
                output.push(' ');
            }
            format_expr(right, output);
        }
        Expr::Variable { name } => output.push_str(&name.lexeme),
    }
}

fn format_infix(left: &Expr, operator: &Token, right: &Expr, output: &mut String) {
    format_expr(left, output);
    output.push(' ');
    output.push_str(&operator.lexeme);
    output.push(' ');
    format_expr(right, output);
}

fn format_literal(value: &LiteralValue, output: &mut String) {
    match value {
        LiteralValue::String(text) => {
            let quote = if text.contains('"') { '\'' } else { '"' };
            output.push(quote);
            output.push_str(text);
            output.push(quote);
        }
        other => output.push_str(&other.to_string()),
    }
}

fn format_separated<T>(items: &[T], output: &mut String, format_item: impl Fn(&T, &mut String)) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            output.push_str(", ");
        }
        format_item(item, output);
    }
}
