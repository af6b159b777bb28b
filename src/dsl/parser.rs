//! Parser for the filter expression language.
//!
//! Grammar (in rough EBNF, keywords case-insensitive):
//!
//! expression = and_expr (("||" | "OR") and_expr)*
//! and_expr   = unary (("&&" | "AND") unary)*
//! unary      = ("!" | "NOT") unary | primary
//! primary    = "(" expression ")" | regexp | predicate
//! regexp     = ("REGEXP_LIKE" | "REGEXP_ILIKE") "(" operand "," operand ")"
//! predicate  = operand (compare_op operand | "IS" ["NOT"] "NULL")
//! compare_op = "<=" | ">=" | "<" | ">" | "=" | "==" | "<>" | "!="
//! operand    = NULL | TRUE | FALSE | NUMBER | STRING | IDENT ["COLLATE" IDENT]

use super::ast::{BinaryOp, Expression, Operand, UnaryOp};
use super::lexer::{Lexeme, Token, char_offset, tokenize};
use crate::error::ParseError;
use crate::value::Value;

/// Parser state.
struct Parser<'t> {
    text: &'t str,
    tokens: Vec<Lexeme>,
    pos: usize,
}

fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Ident(name) if name.eq_ignore_ascii_case(keyword))
}

fn compare_op(token: &Token) -> Option<BinaryOp> {
    match token {
        Token::Eq => Some(BinaryOp::Eq),
        Token::Ne => Some(BinaryOp::Ne),
        Token::Lt => Some(BinaryOp::Lt),
        Token::Le => Some(BinaryOp::Le),
        Token::Gt => Some(BinaryOp::Gt),
        Token::Ge => Some(BinaryOp::Ge),
        _ => None,
    }
}

impl<'t> Parser<'t> {
    fn new(text: &'t str, tokens: Vec<Lexeme>) -> Self {
        Parser {
            text,
            tokens,
            pos: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .map(|lexeme| &lexeme.token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    /// Error positioned at the current token.
    fn error(&self, message: impl Into<String>) -> ParseError {
        let byte_offset = self
            .tokens
            .get(self.pos)
            .map(|lexeme| lexeme.offset)
            .unwrap_or(self.text.len());
        ParseError::at(message, self.text, char_offset(self.text, byte_offset))
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("Expected {:?}, got {:?}", expected, self.peek())))
        }
    }

    fn at_or(&self) -> bool {
        matches!(self.peek(), Token::OrOr) || is_keyword(self.peek(), "or")
    }

    fn at_and(&self) -> bool {
        matches!(self.peek(), Token::AndAnd) || is_keyword(self.peek(), "and")
    }

    fn at_not(&self) -> bool {
        match self.peek() {
            Token::Bang => true,
            // `not = 1` compares a variable called `not`
            token => is_keyword(token, "not") && compare_op(self.peek_at(1)).is_none(),
        }
    }

    /// Parse OR expression: and_expr (("||" | "OR") and_expr)*
    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and_expr()?;

        while self.at_or() {
            self.advance(); // consume OR
            let right = self.parse_and_expr()?;
            left = Expression::or(left, right);
        }

        Ok(left)
    }

    /// Parse AND expression: unary (("&&" | "AND") unary)*
    fn parse_and_expr(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;

        while self.at_and() {
            self.advance(); // consume AND
            let right = self.parse_unary()?;
            left = Expression::and(left, right);
        }

        Ok(left)
    }

    /// Parse unary expression: ("!" | "NOT") unary | primary
    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        if self.at_not() {
            self.advance(); // consume NOT
            let inner = self.parse_unary()?;
            return Ok(Expression::not(inner));
        }
        self.parse_primary()
    }

    /// Parse primary expression: "(" expression ")" | regexp | predicate
    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        if matches!(self.peek(), Token::LParen) {
            self.advance(); // consume (
            let inner = self.parse_expression()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        if matches!(self.peek_at(1), Token::LParen) {
            let op = if is_keyword(self.peek(), "regexp_like") {
                Some(BinaryOp::RegexpLike)
            } else if is_keyword(self.peek(), "regexp_ilike") {
                Some(BinaryOp::RegexpIlike)
            } else {
                None
            };
            if let Some(op) = op {
                self.advance(); // consume function name
                self.advance(); // consume (
                let value = self.parse_operand()?;
                self.expect(Token::Comma)?;
                let pattern = self.parse_operand()?;
                self.expect(Token::RParen)?;
                return Ok(Expression::binary(op, value, pattern));
            }
        }

        self.parse_predicate()
    }

    /// Parse predicate: operand (compare_op operand | "IS" ["NOT"] "NULL")
    fn parse_predicate(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_operand()?;

        if let Some(op) = compare_op(self.peek()) {
            self.advance(); // consume operator
            let right = self.parse_operand()?;
            return Ok(Expression::binary(op, left, right));
        }

        if is_keyword(self.peek(), "is") {
            self.advance(); // consume IS
            let op = if is_keyword(self.peek(), "not") {
                self.advance(); // consume NOT
                UnaryOp::IsNotNull
            } else {
                UnaryOp::IsNull
            };
            if !is_keyword(self.peek(), "null") {
                return Err(self.error(format!("Expected NULL, got {:?}", self.peek())));
            }
            self.advance(); // consume NULL
            return Ok(Expression::unary(op, left));
        }

        Err(self.error(format!(
            "Expected comparison operator or IS, got {:?}",
            self.peek()
        )))
    }

    /// Parse operand: literal | IDENT ["COLLATE" IDENT]
    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        let operand = match self.peek().clone() {
            Token::Int(i) => Operand::Const(Value::Int(i)),
            Token::Double(d) => Operand::Const(Value::Double(d)),
            Token::Str(s) => Operand::Const(Value::String(s)),
            Token::Ident(name) if name.eq_ignore_ascii_case("null") => Operand::Const(Value::Null),
            Token::Ident(name) if name.eq_ignore_ascii_case("true") => {
                Operand::Const(Value::Bool(true))
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("false") => {
                Operand::Const(Value::Bool(false))
            }
            Token::Ident(name) => {
                self.advance(); // consume identifier
                if !is_keyword(self.peek(), "collate") {
                    return Ok(Operand::variable(name));
                }
                self.advance(); // consume COLLATE
                let collation = match self.peek() {
                    Token::Ident(collation) => collation.clone(),
                    other => {
                        return Err(self.error(format!("Expected collation name, got {:?}", other)));
                    }
                };
                self.advance(); // consume collation name
                return Ok(Operand::Variable {
                    name,
                    case_insensitive: collation.eq_ignore_ascii_case("nocase"),
                });
            }
            other => return Err(self.error(format!("Expected operand, got {:?}", other))),
        };
        self.advance(); // consume literal
        Ok(operand)
    }
}

/// Parse a filter expression string into an AST.
///
/// The whole input must be consumed; trailing text is an error.
pub fn parse_expression(text: &str) -> Result<Expression, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::at("Empty expression", text, 0));
    }

    let tokens = tokenize(text)?;
    let mut parser = Parser::new(text, tokens);
    let expr = parser.parse_expression()?;

    // Ensure we consumed all tokens
    if !matches!(parser.peek(), Token::Eof) {
        return Err(parser.error(format!(
            "Could not parse to the end of expression, unexpected {:?}",
            parser.peek()
        )));
    }

    Ok(expr)
}
