use std::rc::Rc;

use tracing::debug;

use crate::error::ParseError;
use crate::expr::Expr;
use crate::expr::LiteralValue;
use crate::scanner::Token;
use crate::scanner::TokenType;
use crate::stack::ensure_sufficient_stack;
use crate::stmt::FunctionDeclaration;
use crate::stmt::Stmt;

type StmtResult = Result<Stmt, ParseError>;
type ExprResult = Result<Expr, ParseError>;

const MAX_ARGUMENTS: usize = 255;

// Statements, expressions and prefix operators nested inside each other.
const MAX_NESTING: usize = 256;

/// Parse a token sequence (normally produced by the scanner) into statements.
///
/// After an error the parser skips ahead to the next statement boundary and
/// keeps going, so every syntax error in the input is reported at once.
pub fn parse(tokens: &[Token]) -> Result<Vec<Stmt>, Vec<ParseError>> {
    let mut cursor = TokenCursor::new(tokens);
    let mut statements = Vec::new();

    while !cursor.at_end() {
        if let Some(statement) = declaration_or_recover(&mut cursor) {
            statements.push(statement);
        }
    }

    debug!(statements = statements.len(), errors = cursor.errors.len(), "parsed program");

    if cursor.errors.is_empty() {
        Ok(statements)
    } else {
        Err(cursor.errors)
    }
}

fn declaration_or_recover(cursor: &mut TokenCursor) -> Option<Stmt> {
    match declaration(cursor) {
        Ok(statement) => Some(statement),
        Err(error) => {
            cursor.errors.push(error);
            cursor.synchronize();
            None
        }
    }
}

fn declaration(cursor: &mut TokenCursor) -> StmtResult {
    if cursor.advance_if_match(TokenType::Var).is_some() {
        var_declaration(cursor)
    } else {
        statement(cursor)
    }
}

fn var_declaration(cursor: &mut TokenCursor) -> StmtResult {
    let name = cursor
        .advance_if_match(TokenType::Identifier)
        .ok_or_else(|| build_error("Expect variable name.", cursor.peek()))?;

    let initializer = if cursor.advance_if_match(TokenType::Equal).is_some() {
        expression(cursor)?
    } else {
        // uninitialized variables default to nil
        Expr::Literal {
            value: LiteralValue::Nil,
        }
    };

    cursor
        .advance_if_match(TokenType::Semicolon)
        .ok_or_else(|| build_error("Expect ';' after variable declaration.", cursor.peek()))?;

    Ok(Stmt::Var { name, initializer })
}

fn statement(cursor: &mut TokenCursor) -> StmtResult {
    nested(cursor, "Statement nesting too deep.", statement_inner)
}

fn statement_inner(cursor: &mut TokenCursor) -> StmtResult {
    let leading = [
        TokenType::Print,
        TokenType::LeftBrace,
        TokenType::If,
        TokenType::While,
        TokenType::For,
        TokenType::Fun,
        TokenType::Return,
    ];

    match cursor.advance_if_any_match(&leading) {
        Some(token) => match token.token_type {
            TokenType::Print => print_statement(cursor),
            TokenType::LeftBrace => Ok(Stmt::Block {
                statements: block(cursor)?,
            }),
            TokenType::If => if_statement(cursor),
            TokenType::While => while_statement(cursor),
            TokenType::For => for_statement(cursor),
            TokenType::Fun => function_declaration(cursor),
            TokenType::Return => return_statement(cursor, token),
            _ => Err(build_error("Unexpected token type when parsing statement.", &token)),
        },
        None => expression_statement(cursor),
    }
}

fn print_statement(cursor: &mut TokenCursor) -> StmtResult {
    let expression = expression(cursor)?;
    cursor
        .advance_if_match(TokenType::Semicolon)
        .ok_or_else(|| build_error("Expect ';' after value.", cursor.peek()))?;
    Ok(Stmt::Print { expression })
}

fn expression_statement(cursor: &mut TokenCursor) -> StmtResult {
    let expression = expression(cursor)?;
    cursor
        .advance_if_match(TokenType::Semicolon)
        .ok_or_else(|| build_error("Expect ';' after expression.", cursor.peek()))?;
    Ok(Stmt::Expression { expression })
}

// Called after the opening brace has been consumed.
fn block(cursor: &mut TokenCursor) -> Result<Vec<Stmt>, ParseError> {
    let mut statements = Vec::new();
    while !cursor.check(TokenType::RightBrace) && !cursor.at_end() {
        if let Some(statement) = declaration_or_recover(cursor) {
            statements.push(statement);
        }
    }
    cursor
        .advance_if_match(TokenType::RightBrace)
        .ok_or_else(|| build_error("Expect '}' after block.", cursor.peek()))?;
    Ok(statements)
}

fn if_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor
        .advance_if_match(TokenType::LeftParen)
        .ok_or_else(|| build_error("Expect '(' after 'if'.", cursor.peek()))?;
    let condition = expression(cursor)?;
    cursor
        .advance_if_match(TokenType::RightParen)
        .ok_or_else(|| build_error("Expect ')' after if condition.", cursor.peek()))?;

    let then_branch = Box::new(statement(cursor)?);
    // greedy: an else always belongs to the innermost if
    let else_branch = if cursor.advance_if_match(TokenType::Else).is_some() {
        Some(Box::new(statement(cursor)?))
    } else {
        None
    };

    Ok(Stmt::If {
        condition,
        then_branch,
        else_branch,
    })
}

fn while_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor
        .advance_if_match(TokenType::LeftParen)
        .ok_or_else(|| build_error("Expect '(' after 'while'.", cursor.peek()))?;
    let condition = expression(cursor)?;
    cursor
        .advance_if_match(TokenType::RightParen)
        .ok_or_else(|| build_error("Expect ')' after condition.", cursor.peek()))?;
    let body = Box::new(statement(cursor)?);

    Ok(Stmt::While { condition, body })
}

// Desugars `for (init; cond; incr) body` into `{ init; while (cond) { body; incr; } }`.
fn for_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor
        .advance_if_match(TokenType::LeftParen)
        .ok_or_else(|| build_error("Expect '(' after 'for'.", cursor.peek()))?;

    let initializer = if cursor.advance_if_match(TokenType::Semicolon).is_some() {
        None
    } else if cursor.advance_if_match(TokenType::Var).is_some() {
        Some(var_declaration(cursor)?)
    } else {
        Some(expression_statement(cursor)?)
    };

    let condition = if cursor.check(TokenType::Semicolon) {
        Expr::Literal {
            value: LiteralValue::Boolean(true),
        }
    } else {
        expression(cursor)?
    };
    cursor
        .advance_if_match(TokenType::Semicolon)
        .ok_or_else(|| build_error("Expect ';' after loop condition.", cursor.peek()))?;

    let increment = if cursor.check(TokenType::RightParen) {
        None
    } else {
        Some(expression(cursor)?)
    };
    cursor
        .advance_if_match(TokenType::RightParen)
        .ok_or_else(|| build_error("Expect ')' after for clauses.", cursor.peek()))?;

    let mut body = statement(cursor)?;

    if let Some(increment) = increment {
        body = Stmt::Block {
            statements: vec![body, Stmt::Expression { expression: increment }],
        };
    }

    body = Stmt::While {
        condition,
        body: Box::new(body),
    };

    if let Some(initializer) = initializer {
        body = Stmt::Block {
            statements: vec![initializer, body],
        };
    }

    Ok(body)
}

fn function_declaration(cursor: &mut TokenCursor) -> StmtResult {
    let name = cursor
        .advance_if_match(TokenType::Identifier)
        .ok_or_else(|| build_error("Expect function name.", cursor.peek()))?;
    cursor
        .advance_if_match(TokenType::LeftParen)
        .ok_or_else(|| build_error("Expect '(' after function name.", cursor.peek()))?;

    let mut params = Vec::new();
    if !cursor.check(TokenType::RightParen) {
        loop {
            if params.len() >= MAX_ARGUMENTS {
                let error = build_error("Can't have more than 255 parameters.", cursor.peek());
                cursor.errors.push(error);
            }
            let param = cursor
                .advance_if_match(TokenType::Identifier)
                .ok_or_else(|| build_error("Expect parameter name.", cursor.peek()))?;
            params.push(param);

            if cursor.advance_if_match(TokenType::Comma).is_none() {
                break;
            }
        }
    }
    cursor
        .advance_if_match(TokenType::RightParen)
        .ok_or_else(|| build_error("Expect ')' after parameters.", cursor.peek()))?;
    cursor
        .advance_if_match(TokenType::LeftBrace)
        .ok_or_else(|| build_error("Expect '{' before function body.", cursor.peek()))?;

    cursor.function_depth += 1;
    let body = block(cursor);
    cursor.function_depth -= 1;

    Ok(Stmt::Function {
        declaration: Rc::new(FunctionDeclaration {
            name,
            params,
            body: body?,
        }),
    })
}

fn return_statement(cursor: &mut TokenCursor, keyword: Token) -> StmtResult {
    if cursor.function_depth == 0 {
        cursor
            .errors
            .push(build_error("Can't return from top-level code.", &keyword));
    }

    let value = if cursor.check(TokenType::Semicolon) {
        None
    } else {
        Some(expression(cursor)?)
    };
    cursor
        .advance_if_match(TokenType::Semicolon)
        .ok_or_else(|| build_error("Expect ';' after return value.", cursor.peek()))?;

    Ok(Stmt::Return { keyword, value })
}

fn expression(cursor: &mut TokenCursor) -> ExprResult {
    nested(cursor, "Expression nesting too deep.", assignment)
}

// Run a recursive grammar rule one nesting level deeper, failing once the
// input nests further than MAX_NESTING.
fn nested<T>(
    cursor: &mut TokenCursor,
    too_deep: &str,
    rule: fn(&mut TokenCursor) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
    if cursor.nesting >= MAX_NESTING {
        return Err(build_error(too_deep, cursor.peek()));
    }

    cursor.nesting += 1;
    let result = ensure_sufficient_stack(|| rule(cursor));
    cursor.nesting -= 1;
    result
}

fn assignment(cursor: &mut TokenCursor) -> ExprResult {
    let expr = logic_or(cursor)?;

    if let Some(equal) = cursor.advance_if_match(TokenType::Equal) {
        let value = assignment(cursor)?;

        return match expr {
            Expr::Variable { name } => Ok(Expr::Assign {
                name,
                value: Box::new(value),
            }),
            // the parser is not confused about where it is, so report and carry on
            other => {
                cursor.errors.push(build_error("Invalid assignment target.", &equal));
                Ok(other)
            }
        };
    }

    Ok(expr)
}

fn logic_or(cursor: &mut TokenCursor) -> ExprResult {
    left_associative(cursor, logic_and, &[TokenType::Or], logical_node)
}

fn logic_and(cursor: &mut TokenCursor) -> ExprResult {
    left_associative(cursor, equality, &[TokenType::And], logical_node)
}

fn equality(cursor: &mut TokenCursor) -> ExprResult {
    left_associative(
        cursor,
        comparison,
        &[TokenType::BangEqual, TokenType::EqualEqual],
        binary_node,
    )
}

fn comparison(cursor: &mut TokenCursor) -> ExprResult {
    left_associative(
        cursor,
        addition,
        &[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ],
        binary_node,
    )
}

fn addition(cursor: &mut TokenCursor) -> ExprResult {
    left_associative(cursor, multiplication, &[TokenType::Minus, TokenType::Plus], binary_node)
}

fn multiplication(cursor: &mut TokenCursor) -> ExprResult {
    left_associative(cursor, unary, &[TokenType::Slash, TokenType::Star], binary_node)
}

// Parse a left associative expression as long as the current token matches one of the given types
fn left_associative(
    cursor: &mut TokenCursor,
    higher_precedence: fn(&mut TokenCursor) -> ExprResult,
    types: &[TokenType],
    build: fn(Expr, Token, Expr) -> Expr,
) -> ExprResult {
    let mut expr = higher_precedence(cursor)?;

    while let Some(operator) = cursor.advance_if_any_match(types) {
        let right = higher_precedence(cursor)?;
        expr = build(expr, operator, right);
    }

    Ok(expr)
}

fn binary_node(left: Expr, operator: Token, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        operator,
        right: Box::new(right),
    }
}

fn logical_node(left: Expr, operator: Token, right: Expr) -> Expr {
    Expr::Logical {
        left: Box::new(left),
        operator,
        right: Box::new(right),
    }
}

fn unary(cursor: &mut TokenCursor) -> ExprResult {
    if let Some(operator) = cursor.advance_if_any_match(&[TokenType::Bang, TokenType::Minus]) {
        let right = nested(cursor, "Expression nesting too deep.", unary)?;
        return Ok(Expr::Unary {
            operator,
            right: Box::new(right),
        });
    }

    call(cursor)
}

fn call(cursor: &mut TokenCursor) -> ExprResult {
    let mut expr = primary(cursor)?;

    while cursor.advance_if_match(TokenType::LeftParen).is_some() {
        expr = finish_call(cursor, expr)?;
    }

    Ok(expr)
}

fn finish_call(cursor: &mut TokenCursor, callee: Expr) -> ExprResult {
    let mut arguments = Vec::new();
    if !cursor.check(TokenType::RightParen) {
        loop {
            if arguments.len() >= MAX_ARGUMENTS {
                let error = build_error("Can't have more than 255 arguments.", cursor.peek());
                cursor.errors.push(error);
            }
            arguments.push(expression(cursor)?);

            if cursor.advance_if_match(TokenType::Comma).is_none() {
                break;
            }
        }
    }

    let paren = cursor
        .advance_if_match(TokenType::RightParen)
        .ok_or_else(|| build_error("Expect ')' after arguments.", cursor.peek()))?;

    Ok(Expr::Call {
        callee: Box::new(callee),
        paren,
        arguments,
    })
}

fn primary(cursor: &mut TokenCursor) -> ExprResult {
    let current = cursor.peek();

    match current.token_type {
        TokenType::False | TokenType::True | TokenType::Nil | TokenType::Number | TokenType::String => {
            let value = current
                .literal
                .clone()
                .ok_or_else(|| build_error("Expect literal value.", current))?;
            cursor.advance();
            Ok(Expr::Literal { value })
        }
        TokenType::Identifier => {
            let name = current.clone();
            cursor.advance();
            Ok(Expr::Variable { name })
        }
        TokenType::LeftParen => {
            cursor.advance();
            let expr = expression(cursor)?;
            cursor
                .advance_if_match(TokenType::RightParen)
                .ok_or_else(|| build_error("Expect ')' after expression.", cursor.peek()))?;
            Ok(Expr::Grouping {
                expression: Box::new(expr),
            })
        }
        _ => Err(build_error("Expect expression.", current)),
    }
}

fn build_error(message: &str, token: &Token) -> ParseError {
    let location = match token.token_type {
        TokenType::Eof => "at end".to_string(),
        _ => format!("at '{}'", token.lexeme),
    };
    ParseError {
        line: token.line,
        location,
        message: message.to_string(),
    }
}

struct TokenCursor<'a> {
    tokens: &'a [Token],
    index: usize,
    // stands in for a missing trailing Eof token
    eof: Token,
    function_depth: usize,
    nesting: usize,
    errors: Vec<ParseError>,
}

impl<'a> TokenCursor<'a> {
    fn new(tokens: &'a [Token]) -> TokenCursor<'a> {
        let eof = Token {
            token_type: TokenType::Eof,
            lexeme: String::new(),
            literal: None,
            line: tokens.last().map_or(1, |token| token.line),
        };
        TokenCursor {
            tokens,
            index: 0,
            eof,
            function_depth: 0,
            nesting: 0,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.index).unwrap_or(&self.eof)
    }

    fn previous(&self) -> Option<&Token> {
        self.index.checked_sub(1).and_then(|index| self.tokens.get(index))
    }

    fn advance(&mut self) {
        if !self.at_end() {
            self.index += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.peek().token_type == token_type
    }

    fn advance_if_match(&mut self, token_type: TokenType) -> Option<Token> {
        self.advance_if_any_match(&[token_type])
    }

    fn advance_if_any_match(&mut self, types: &[TokenType]) -> Option<Token> {
        let token = self.peek();
        if types.contains(&token.token_type) {
            let cloned = token.clone();
            self.advance();
            Some(cloned)
        } else {
            None
        }
    }

    // Discard tokens until the start of the next statement is likely.
    fn synchronize(&mut self) {
        self.advance();

        while !self.at_end() {
            if self
                .previous()
                .is_some_and(|token| token.token_type == TokenType::Semicolon)
            {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => self.advance(),
            }
        }
    }
}
