use std::io::Write;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::expr::{Expr, LiteralValue};
use crate::scanner::{Token, TokenType};
use crate::stack::ensure_sufficient_stack;
use crate::stdlib::standard_library;
use crate::stmt::{FunctionDeclaration, Stmt};
use crate::value::{Function, NativeFunction, Value};

// Deepest chain of active calls before giving up with a stack overflow error.
const FRAMES_MAX: usize = 256;

type ValueResult = Result<Value, RuntimeError>;
type StatementResult = Result<Flow, RuntimeError>;

/// How a statement finished.
///
/// `Return` carries a function's result up through any enclosing blocks and
/// loops until it reaches the call that is being returned from.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<'a> {
    globals: EnvRef,
    call_depth: usize,
    output_writer: &'a mut dyn Write,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter whose `print` output goes to `output_writer`.
    /// The global scope starts out holding the standard library.
    pub fn new(output_writer: &'a mut dyn Write) -> Interpreter<'a> {
        let globals = Environment::new().into_ref();
        for native in standard_library() {
            globals.borrow_mut().define(native.name, Value::Native(native));
        }

        Interpreter {
            globals,
            call_depth: 0,
            output_writer,
        }
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Run one top-level statement in the global scope.
    ///
    /// Expression statements produce their value, everything else produces
    /// `nil`. A failed statement leaves bindings made by earlier statements
    /// intact, so the caller may report the error and carry on.
    pub fn interpret(&mut self, statement: &Stmt) -> ValueResult {
        let globals = Rc::clone(&self.globals);
        self.interpret_in(statement, &globals)
    }

    pub fn interpret_in(&mut self, statement: &Stmt, env: &EnvRef) -> ValueResult {
        trace!(?statement, "interpreting statement");
        match statement {
            Stmt::Expression { expression } => self.evaluate(expression, env),
            _ => match self.execute_statement(statement, env)? {
                Flow::Normal => Ok(Value::Nil),
                Flow::Return(value) => Ok(value),
            },
        }
    }

    /// Run statements in order, stopping at the first runtime error.
    pub fn interpret_all(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            self.interpret(statement)?;
        }
        Ok(())
    }

    fn execute_statement(&mut self, statement: &Stmt, env: &EnvRef) -> StatementResult {
        ensure_sufficient_stack(|| self.execute_statement_inner(statement, env))
    }

    fn execute_statement_inner(&mut self, statement: &Stmt, env: &EnvRef) -> StatementResult {
        match statement {
            Stmt::Block { statements } => self.block_statement(statements, env),
            Stmt::Expression { expression } => self.expression_statement(expression, env),
            Stmt::Function { declaration } => self.function_statement(declaration, env),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_statement(condition, then_branch, else_branch.as_deref(), env),
            Stmt::Print { expression } => self.print_statement(expression, env),
            Stmt::Return { value, .. } => self.return_statement(value.as_ref(), env),
            Stmt::Var { name, initializer } => self.var_statement(name, initializer, env),
            Stmt::While { condition, body } => self.while_statement(condition, body, env),
        }
    }

    fn block_statement(&mut self, statements: &[Stmt], env: &EnvRef) -> StatementResult {
        // the scope is dropped on every exit path, including errors and returns
        let scope = Environment::with_enclosing(Rc::clone(env)).into_ref();
        self.execute_block(statements, &scope)
    }

    fn execute_block(&mut self, statements: &[Stmt], scope: &EnvRef) -> StatementResult {
        for statement in statements {
            if let Flow::Return(value) = self.execute_statement(statement, scope)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn expression_statement(&mut self, expression: &Expr, env: &EnvRef) -> StatementResult {
        self.evaluate(expression, env)?;
        Ok(Flow::Normal)
    }

    fn function_statement(&mut self, declaration: &Rc<FunctionDeclaration>, env: &EnvRef) -> StatementResult {
        debug!(name = %declaration.name.lexeme, arity = declaration.params.len(), "defining function");
        let function = Function {
            declaration: Rc::clone(declaration),
            closure: Rc::clone(env),
        };
        env.borrow_mut()
            .define(declaration.name.lexeme.clone(), Value::Function(Rc::new(function)));
        Ok(Flow::Normal)
    }

    fn if_statement(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
        env: &EnvRef,
    ) -> StatementResult {
        if self.evaluate(condition, env)?.is_truthy() {
            self.execute_statement(then_branch, env)
        } else if let Some(else_statement) = else_branch {
            self.execute_statement(else_statement, env)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn print_statement(&mut self, expression: &Expr, env: &EnvRef) -> StatementResult {
        let result = self.evaluate(expression, env)?;
        writeln!(self.output_writer, "{result}").map_err(|error| RuntimeError::Output {
            message: error.to_string(),
        })?;
        Ok(Flow::Normal)
    }

    fn return_statement(&mut self, value: Option<&Expr>, env: &EnvRef) -> StatementResult {
        let return_value = match value {
            Some(expression) => self.evaluate(expression, env)?,
            None => Value::Nil,
        };
        Ok(Flow::Return(return_value))
    }

    fn var_statement(&mut self, name: &Token, initializer: &Expr, env: &EnvRef) -> StatementResult {
        let value = self.evaluate(initializer, env)?;
        env.borrow_mut().define(name.lexeme.clone(), value);
        Ok(Flow::Normal)
    }

    fn while_statement(&mut self, condition: &Expr, body: &Stmt, env: &EnvRef) -> StatementResult {
        while self.evaluate(condition, env)?.is_truthy() {
            if let Flow::Return(value) = self.execute_statement(body, env)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expression: &Expr, env: &EnvRef) -> ValueResult {
        ensure_sufficient_stack(|| self.evaluate_inner(expression, env))
    }

    fn evaluate_inner(&mut self, expression: &Expr, env: &EnvRef) -> ValueResult {
        match expression {
            Expr::Assign { name, value } => self.evaluate_assign(name, value, env),
            Expr::Binary { left, operator, right } => self.evaluate_binary(left, operator, right, env),
            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments, env),
            Expr::Grouping { expression } => self.evaluate(expression, env),
            Expr::Literal { value } => Ok(evaluate_literal(value)),
            Expr::Logical { left, operator, right } => self.evaluate_logical(left, operator, right, env),
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right, env),
            Expr::Variable { name } => evaluate_variable(name, env),
        }
    }

    fn evaluate_assign(&mut self, name: &Token, value: &Expr, env: &EnvRef) -> ValueResult {
        let result = self.evaluate(value, env)?;
        env.borrow_mut()
            .assign(&name.lexeme, result.clone())
            .map_err(|error| error.at_line(name.line))?;
        Ok(result)
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr, env: &EnvRef) -> ValueResult {
        let left_evaluated = self.evaluate(left, env)?;
        let right_evaluated = self.evaluate(right, env)?;
        let line = operator.line;

        let evaluated = match operator.token_type {
            TokenType::Plus => match (&left_evaluated, &right_evaluated) {
                (Value::Number(left_number), Value::Number(right_number)) => {
                    Value::Number(left_number + right_number)
                }
                (Value::String(left_string), Value::String(right_string)) => {
                    Value::from(format!("{left_string}{right_string}"))
                }
                _ => {
                    return Err(invalid_operand(
                        "Operands must be two numbers or two strings.",
                        line,
                    ))
                }
            },
            TokenType::Minus => {
                let (left_number, right_number) = number_operands(&left_evaluated, &right_evaluated, line)?;
                Value::Number(left_number - right_number)
            }
            TokenType::Star => {
                let (left_number, right_number) = number_operands(&left_evaluated, &right_evaluated, line)?;
                Value::Number(left_number * right_number)
            }
            TokenType::Slash => {
                let (left_number, right_number) = number_operands(&left_evaluated, &right_evaluated, line)?;
                if right_number == 0.0 {
                    return Err(RuntimeError::DivisionByZero { line });
                }
                Value::Number(left_number / right_number)
            }
            TokenType::Greater => {
                let (left_number, right_number) = number_operands(&left_evaluated, &right_evaluated, line)?;
                Value::Boolean(left_number > right_number)
            }
            TokenType::GreaterEqual => {
                let (left_number, right_number) = number_operands(&left_evaluated, &right_evaluated, line)?;
                Value::Boolean(left_number >= right_number)
            }
            TokenType::Less => {
                let (left_number, right_number) = number_operands(&left_evaluated, &right_evaluated, line)?;
                Value::Boolean(left_number < right_number)
            }
            TokenType::LessEqual => {
                let (left_number, right_number) = number_operands(&left_evaluated, &right_evaluated, line)?;
                Value::Boolean(left_number <= right_number)
            }
            TokenType::EqualEqual => Value::Boolean(left_evaluated == right_evaluated),
            TokenType::BangEqual => Value::Boolean(left_evaluated != right_evaluated),
            _ => {
                return Err(invalid_operand(
                    &format!("Unsupported binary operator '{}'.", operator.lexeme),
                    line,
                ))
            }
        };
        Ok(evaluated)
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr], env: &EnvRef) -> ValueResult {
        let callee = self.evaluate(callee, env)?;
        let arguments = arguments
            .iter()
            .map(|argument| self.evaluate(argument, env))
            .collect::<Result<Vec<_>, _>>()?;

        match callee {
            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren.line)?;
                self.call_function(&function, arguments, paren.line)
            }
            Value::Native(native) => {
                check_arity(native.arity, arguments.len(), paren.line)?;
                call_native(&native, &arguments, paren.line)
            }
            _ => Err(RuntimeError::NotCallable { line: paren.line }),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(function = function.name()))]
    fn call_function(&mut self, function: &Function, arguments: Vec<Value>, line: u32) -> ValueResult {
        if self.call_depth >= FRAMES_MAX {
            return Err(RuntimeError::StackOverflow { line });
        }

        // parameters live in a fresh scope under the one the function was declared in
        let mut scope = Environment::with_enclosing(Rc::clone(&function.closure));
        for (param, argument) in function.declaration.params.iter().zip(arguments) {
            scope.define(param.lexeme.clone(), argument);
        }
        let scope = scope.into_ref();

        self.call_depth += 1;
        let result = self.execute_block(&function.declaration.body, &scope);
        self.call_depth -= 1;

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }

    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr, env: &EnvRef) -> ValueResult {
        let left_evaluated = self.evaluate(left, env)?;

        // short circuit if possible
        match operator.token_type {
            TokenType::Or if left_evaluated.is_truthy() => return Ok(left_evaluated),
            TokenType::And if !left_evaluated.is_truthy() => return Ok(left_evaluated),
            TokenType::Or | TokenType::And => {}
            _ => {
                return Err(invalid_operand(
                    &format!("Unsupported logical operator '{}'.", operator.lexeme),
                    operator.line,
                ))
            }
        }

        self.evaluate(right, env)
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr, env: &EnvRef) -> ValueResult {
        let operand = self.evaluate(right, env)?;
        match operator.token_type {
            TokenType::Bang => Ok(Value::Boolean(!operand.is_truthy())),
            TokenType::Minus => match operand {
                Value::Number(original) => Ok(Value::Number(-original)),
                _ => Err(invalid_operand("Operand must be a number.", operator.line)),
            },
            _ => Err(invalid_operand(
                &format!("Unsupported unary operator '{}'.", operator.lexeme),
                operator.line,
            )),
        }
    }
}

fn evaluate_literal(value: &LiteralValue) -> Value {
    Value::from(value)
}

fn evaluate_variable(name: &Token, env: &EnvRef) -> ValueResult {
    env.borrow()
        .get(&name.lexeme)
        .map_err(|error| error.at_line(name.line))
}

fn call_native(native: &NativeFunction, arguments: &[Value], line: u32) -> ValueResult {
    debug!(name = native.name, "calling native function");
    (native.func)(arguments).map_err(|message| RuntimeError::Native {
        name: native.name.to_string(),
        message,
        line,
    })
}

fn check_arity(expected: usize, found: usize, line: u32) -> Result<(), RuntimeError> {
    if expected == found {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch { expected, found, line })
    }
}

fn number_operands(left: &Value, right: &Value, line: u32) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(left_number), Value::Number(right_number)) => Ok((*left_number, *right_number)),
        _ => Err(invalid_operand("Operands must be numbers.", line)),
    }
}

fn invalid_operand(message: &str, line: u32) -> RuntimeError {
    RuntimeError::InvalidOperand {
        message: message.to_string(),
        line,
    }
}
