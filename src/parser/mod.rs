use crate::ast::*;
use crate::lexer::tokens::{Token, TokenType};
use std::fmt;

#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub file: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

const MAX_PARSER_DEPTH: usize = 256;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, filename: &str) -> Self {
        let mut tokens = tokens;
        if tokens.last().map(|t| t.token_type) != Some(TokenType::Eof) {
            let (line, column) = tokens.last().map(|t| (t.line, t.column)).unwrap_or((1, 1));
            tokens.push(Token {
                token_type: TokenType::Eof,
                value: String::new(),
                line,
                column,
                file: filename.to_string(),
            });
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn enter_depth(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSER_DEPTH {
            Err(self.error_here(format!(
                "Maximum nesting depth ({}) exceeded, program is too deeply nested",
                MAX_PARSER_DEPTH
            )))
        } else {
            Ok(())
        }
    }

    fn exit_depth(&mut self) {
        self.depth -= 1;
    }

    // ── Public API ──────────────────────────────────────────────────────

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let loc = self.loc();
        let mut imports = Vec::new();
        let mut globals = Vec::new();
        let mut functions = Vec::new();

        while !self.at_end() {
            if self.check(TokenType::Extern) {
                imports.push(self.parse_import()?);
                continue;
            }
            let decl_loc = self.loc();
            let exported = if self.check(TokenType::Export) {
                self.advance();
                true
            } else {
                false
            };

            if !self.current().token_type.is_type() {
                let cur = self.current();
                return Err(self.error_at(
                    cur,
                    format!(
                        "Expected a function or global declaration, got {:?} ({:?})",
                        cur.token_type, cur.value
                    ),
                ));
            }
            let ty = self.parse_type()?;
            let name = self.expect(TokenType::Identifier)?.value.clone();

            if self.check(TokenType::LParen) {
                functions.push(self.parse_function_rest(decl_loc, name, ty, exported)?);
            } else {
                globals.push(self.parse_global_rest(decl_loc, name, ty, exported)?);
            }
        }

        Ok(Program {
            loc,
            imports,
            globals,
            functions,
        })
    }

    // ── Declarations ────────────────────────────────────────────────────

    /// `double` | `double*` | `int` | `void`
    fn parse_type(&mut self) -> Result<Type, ParseError> {
        let tok = self.current().clone();
        let ty = match tok.token_type {
            TokenType::Double => Type::Double,
            TokenType::Int => Type::Int,
            TokenType::Void => Type::Void,
            _ => {
                return Err(self.error_at(
                    &tok,
                    format!("Expected type, got {:?} ({:?})", tok.token_type, tok.value),
                ))
            }
        };
        self.advance();
        if self.check(TokenType::Star) {
            if ty != Type::Double {
                return Err(self.error_here(format!("Pointers to {} are not supported", ty)));
            }
            self.advance();
            return Ok(Type::Pointer);
        }
        Ok(ty)
    }

    /// `extern type name(type [name], ...);`
    fn parse_import(&mut self) -> Result<ImportDecl, ParseError> {
        let loc = self.loc();
        self.expect(TokenType::Extern)?;
        let return_type = self.parse_type()?;
        let name = self.expect(TokenType::Identifier)?.value.clone();
        self.expect(TokenType::LParen)?;

        let mut params = Vec::new();
        if self.check(TokenType::Void) && self.peek_type(1) == Some(TokenType::RParen) {
            self.advance();
        } else if !self.check(TokenType::RParen) {
            loop {
                let ty = self.parse_type()?;
                if ty == Type::Void {
                    return Err(self.error_here("Parameters cannot have type void".to_string()));
                }
                // Parameter names are optional in a declaration
                if self.check(TokenType::Identifier) {
                    self.advance();
                }
                params.push(ty);
                if !self.check(TokenType::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(TokenType::RParen)?;
        self.expect(TokenType::Semicolon)?;

        Ok(ImportDecl {
            loc,
            name,
            params,
            return_type,
        })
    }

    fn parse_global_rest(
        &mut self,
        loc: SourceLocation,
        name: String,
        ty: Type,
        exported: bool,
    ) -> Result<GlobalDecl, ParseError> {
        if ty == Type::Void {
            return Err(self.error_here(format!("Global '{}' cannot have type void", name)));
        }
        let init = if self.check(TokenType::Assign) {
            self.advance();
            self.parse_expression()?
        } else {
            Expr::IntLiteral {
                loc: self.loc(),
                value: 0,
            }
        };
        self.expect(TokenType::Semicolon)?;
        Ok(GlobalDecl {
            loc,
            name,
            ty,
            init,
            exported,
        })
    }

    fn parse_function_rest(
        &mut self,
        loc: SourceLocation,
        name: String,
        return_type: Type,
        exported: bool,
    ) -> Result<FunctionDef, ParseError> {
        self.expect(TokenType::LParen)?;
        let mut params = Vec::new();

        // `f(void)` declares no parameters
        if self.check(TokenType::Void) && self.peek_type(1) == Some(TokenType::RParen) {
            self.advance();
        } else if !self.check(TokenType::RParen) {
            loop {
                let ploc = self.loc();
                let ty = self.parse_type()?;
                if ty == Type::Void {
                    return Err(self.error_here("Parameters cannot have type void".to_string()));
                }
                let pname = self.expect(TokenType::Identifier)?.value.clone();
                params.push(Param {
                    loc: ploc,
                    name: pname,
                    ty,
                });
                if !self.check(TokenType::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(TokenType::RParen)?;

        let body = self.parse_block()?;

        Ok(FunctionDef {
            loc,
            name,
            params,
            return_type,
            body,
            exported,
        })
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.expect(TokenType::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenType::RBrace) {
            if self.at_end() {
                return Err(self.error_here("Unterminated block, expected '}'".to_string()));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenType::RBrace)?;
        Ok(statements)
    }

    /// Body of if/for/while: a block or a single statement
    fn parse_body(&mut self) -> Result<Vec<Statement>, ParseError> {
        if self.check(TokenType::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        self.enter_depth()?;
        let result = self.parse_statement_inner();
        self.exit_depth();
        result
    }

    fn parse_statement_inner(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        match self.current().token_type {
            TokenType::LBrace => {
                let body = self.parse_block()?;
                Ok(Statement::Block { loc, body })
            }
            TokenType::If => {
                self.advance();
                self.expect(TokenType::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(TokenType::RParen)?;
                let then_body = self.parse_body()?;
                let else_body = if self.check(TokenType::Else) {
                    self.advance();
                    Some(self.parse_body()?)
                } else {
                    None
                };
                Ok(Statement::If {
                    loc,
                    condition,
                    then_body,
                    else_body,
                })
            }
            TokenType::For => {
                self.advance();
                self.expect(TokenType::LParen)?;
                let init = if self.check(TokenType::Semicolon) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_statement()?))
                };
                self.expect(TokenType::Semicolon)?;
                let condition = if self.check(TokenType::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(TokenType::Semicolon)?;
                let step = if self.check(TokenType::RParen) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_statement()?))
                };
                self.expect(TokenType::RParen)?;
                let body = self.parse_body()?;
                Ok(Statement::For {
                    loc,
                    init,
                    condition,
                    step,
                    body,
                })
            }
            TokenType::While => {
                self.advance();
                self.expect(TokenType::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(TokenType::RParen)?;
                let body = self.parse_body()?;
                Ok(Statement::While {
                    loc,
                    condition,
                    body,
                })
            }
            TokenType::Return => {
                self.advance();
                let value = if self.check(TokenType::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(TokenType::Semicolon)?;
                Ok(Statement::Return { loc, value })
            }
            _ => {
                let stmt = self.parse_simple_statement()?;
                self.expect(TokenType::Semicolon)?;
                Ok(stmt)
            }
        }
    }

    /// Declarations, assignments, stores, increments and expression
    /// statements: everything that may appear in a `for` header
    fn parse_simple_statement(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();

        if self.current().token_type.is_type() {
            let ty = self.parse_type()?;
            if ty == Type::Void {
                return Err(self.error_here("Variables cannot have type void".to_string()));
            }
            let name = self.expect(TokenType::Identifier)?.value.clone();
            let init = if self.check(TokenType::Assign) {
                self.advance();
                Some(self.parse_expression()?)
            } else {
                None
            };
            return Ok(Statement::VarDecl { loc, name, ty, init });
        }

        // `*p = value`
        if self.check(TokenType::Star) {
            self.advance();
            let pointer = self.parse_unary()?;
            self.expect(TokenType::Assign)?;
            let value = self.parse_expression()?;
            return Ok(Statement::Store { loc, pointer, value });
        }

        // `++i` / `--i`
        if self.check(TokenType::PlusPlus) || self.check(TokenType::MinusMinus) {
            let delta = if self.check(TokenType::PlusPlus) { 1 } else { -1 };
            self.advance();
            let target = self.expect(TokenType::Identifier)?.value.clone();
            return Ok(Statement::Increment { loc, target, delta });
        }

        if self.check(TokenType::Identifier) {
            let op = match self.peek_type(1) {
                Some(TokenType::Assign) => Some(AssignOp::Set),
                Some(TokenType::PlusAssign) => Some(AssignOp::Add),
                Some(TokenType::MinusAssign) => Some(AssignOp::Sub),
                Some(TokenType::StarAssign) => Some(AssignOp::Mul),
                Some(TokenType::SlashAssign) => Some(AssignOp::Div),
                _ => None,
            };
            if let Some(op) = op {
                let target = self.advance().value.clone();
                self.advance();
                let value = self.parse_expression()?;
                return Ok(Statement::Assign { loc, target, op, value });
            }
            match self.peek_type(1) {
                Some(TokenType::PlusPlus) | Some(TokenType::MinusMinus) => {
                    let target = self.advance().value.clone();
                    let delta = if self.check(TokenType::PlusPlus) { 1 } else { -1 };
                    self.advance();
                    return Ok(Statement::Increment { loc, target, delta });
                }
                _ => {}
            }
        }

        let expr = self.parse_expression()?;
        Ok(Statement::Expression { loc, expr })
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.enter_depth()?;
        let result = self.parse_comparison();
        self.exit_depth();
        result
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_chain(Self::parse_additive, |t| match t {
            TokenType::Equals => Some(BinaryOp::Eq),
            TokenType::NotEquals => Some(BinaryOp::Ne),
            TokenType::LessThan => Some(BinaryOp::Lt),
            TokenType::LessEqual => Some(BinaryOp::Le),
            TokenType::GreaterThan => Some(BinaryOp::Gt),
            TokenType::GreaterEqual => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_chain(Self::parse_multiplicative, |t| match t {
            TokenType::Plus => Some(BinaryOp::Add),
            TokenType::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_chain(Self::parse_unary, |t| match t {
            TokenType::Star => Some(BinaryOp::Mul),
            TokenType::Slash => Some(BinaryOp::Div),
            _ => None,
        })
    }

    /// Left-associative chain of `operand (op operand)*`.
    ///
    /// Each operator nests the tree one level deeper, so every one counts
    /// against the nesting limit until the chain is finished.
    fn parse_binary_chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
        operator: fn(TokenType) -> Option<BinaryOp>,
    ) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let result = self.parse_binary_chain_inner(operand, operator);
        self.depth = depth;
        result
    }

    fn parse_binary_chain_inner(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
        operator: fn(TokenType) -> Option<BinaryOp>,
    ) -> Result<Expr, ParseError> {
        let mut left = operand(self)?;
        while let Some(op) = operator(self.current().token_type) {
            self.enter_depth()?;
            self.advance();
            let right = operand(self)?;
            let loc = left.loc().clone();
            left = Expr::Binary {
                loc,
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.enter_depth()?;
        let result = self.parse_unary_inner();
        self.exit_depth();
        result
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ParseError> {
        let loc = self.loc();
        if self.check(TokenType::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Negate {
                loc,
                operand: Box::new(operand),
            });
        }
        if self.check(TokenType::Plus) {
            self.advance();
            return self.parse_unary();
        }
        if self.check(TokenType::Star) {
            self.advance();
            let pointer = self.parse_unary()?;
            return Ok(Expr::Deref {
                loc,
                pointer: Box::new(pointer),
            });
        }
        // `(type) operand`
        let is_cast = self.check(TokenType::LParen)
            && self.peek_type(1).map_or(false, |t| t.is_type());
        if is_cast {
            self.advance();
            let ty = self.parse_type()?;
            self.expect(TokenType::RParen)?;
            if ty == Type::Void {
                return Err(self.error_here("Cannot cast to void".to_string()));
            }
            let operand = self.parse_unary()?;
            return Ok(Expr::Cast {
                loc,
                ty,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let loc = self.loc();
        let tok = self.current().clone();

        match tok.token_type {
            TokenType::Integer => {
                self.advance();
                let value: i64 = tok.value.parse().map_err(|_| {
                    self.error_at(&tok, format!("Invalid integer literal: {}", tok.value))
                })?;
                Ok(Expr::IntLiteral { loc, value })
            }
            TokenType::Float => {
                self.advance();
                let value: f64 = tok.value.parse().map_err(|_| {
                    self.error_at(&tok, format!("Invalid float literal: {}", tok.value))
                })?;
                Ok(Expr::FloatLiteral { loc, value })
            }
            TokenType::Identifier => {
                self.advance();
                if self.check(TokenType::LParen) {
                    self.advance();
                    let arguments = self.parse_argument_list()?;
                    self.expect(TokenType::RParen)?;
                    Ok(Expr::Call {
                        loc,
                        callee: tok.value.clone(),
                        arguments,
                    })
                } else {
                    Ok(Expr::Identifier {
                        loc,
                        name: tok.value.clone(),
                    })
                }
            }
            TokenType::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::RParen)?;
                Ok(inner)
            }
            _ => Err(self.error_at(
                &tok,
                format!("Expected expression, got {:?} ({:?})", tok.token_type, tok.value),
            )),
        }
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.check(TokenType::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.check(TokenType::Comma) {
                break;
            }
            self.advance();
        }
        Ok(args)
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn current(&self) -> &Token {
        if self.pos >= self.tokens.len() {
            &self.tokens[self.tokens.len() - 1] // EOF
        } else {
            &self.tokens[self.pos]
        }
    }

    fn advance(&mut self) -> &Token {
        let pos = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[pos]
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current().token_type == token_type
    }

    fn expect(&mut self, token_type: TokenType) -> Result<&Token, ParseError> {
        let tok = self.current();
        if tok.token_type != token_type {
            return Err(self.error_at(
                tok,
                format!(
                    "Expected {:?}, got {:?} ({:?})",
                    token_type, tok.token_type, tok.value
                ),
            ));
        }
        Ok(self.advance())
    }

    fn peek_type(&self, offset: usize) -> Option<TokenType> {
        self.tokens.get(self.pos + offset).map(|t| t.token_type)
    }

    fn at_end(&self) -> bool {
        self.current().token_type == TokenType::Eof
    }

    fn loc(&self) -> SourceLocation {
        let tok = self.current();
        SourceLocation::new(&tok.file, tok.line, tok.column)
    }

    fn error_at(&self, tok: &Token, message: String) -> ParseError {
        ParseError {
            message,
            line: tok.line,
            column: tok.column,
            file: tok.file.clone(),
        }
    }

    fn error_here(&self, message: String) -> ParseError {
        self.error_at(self.current(), message)
    }
}
