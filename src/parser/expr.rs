//! Expression grammar, lowest to highest binding:
//! comparison, additive, multiplicative, unary sign, power, postfix, primary.

use crate::error::{Error, Result};
use crate::lexer::TokenKind;

use super::Parser;
use super::UNSUPPORTED_KEYWORDS;
use super::ast::{BinaryOperator, Expression, Literal, UnaryOperator};

const STRING_PREFIXES: &[&str] = &["f", "b", "r", "u", "rb", "br", "fr", "rf"];

impl<'a> Parser<'a> {
    pub(super) fn parse_expression(&mut self) -> Result<Expression> {
        let expression = self.parse_comparison()?;
        let line = self.current().line();
        match self.current().kind {
            TokenKind::And | TokenKind::Or => Err(Error::unsupported(
                line,
                "boolean operators `and` and `or`",
            )),
            TokenKind::Is | TokenKind::In | TokenKind::Not => Err(Error::unsupported(
                line,
                "identity and membership tests (`is`, `in`)",
            )),
            TokenKind::If => Err(Error::unsupported(line, "conditional expressions")),
            _ => Ok(expression),
        }
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let left = self.parse_additive()?;
        let Some(op) = comparison_operator(self.current().kind) else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;
        if comparison_operator(self.current().kind).is_some() {
            return Err(Error::unsupported(
                self.current().line(),
                "chained comparisons (split them into separate conditions)",
            ));
        }
        Ok(Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::DoubleSlash => BinaryOperator::FloorDiv,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOperator::Neg,
            TokenKind::Plus => UnaryOperator::Pos,
            TokenKind::Not => {
                return Err(Error::unsupported(
                    self.current().line(),
                    "boolean operator `not`",
                ));
            }
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expression::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expression> {
        let base = self.parse_postfix()?;
        if !matches!(self.current().kind, TokenKind::DoubleStar) {
            return Ok(base);
        }
        self.advance();
        // Right-associative, and the exponent may carry its own sign.
        let exponent = self.parse_unary()?;
        Ok(Expression::BinaryOp {
            left: Box::new(base),
            op: BinaryOperator::Pow,
            right: Box::new(exponent),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let token = self.current().clone();
        let TokenKind::Identifier(name) = token.kind else {
            return self.parse_primary();
        };
        let line = token.line();
        if UNSUPPORTED_KEYWORDS.contains(&name) {
            return Err(Error::unsupported(line, format!("`{name}` expressions")));
        }
        if STRING_PREFIXES.contains(&name.to_ascii_lowercase().as_str())
            && let Some(next) = self.tokens.get(self.position + 1)
            && matches!(next.kind, TokenKind::String(_))
            && next.span.start == token.span.end
        {
            return Err(Error::unsupported(
                line,
                format!("string prefix `{name}` (f-strings, bytes and raw strings)"),
            ));
        }
        self.advance();

        let mut path = name.to_string();
        while matches!(self.current().kind, TokenKind::Dot) {
            self.advance();
            path.push('.');
            path.push_str(self.expect_identifier()?);
        }

        let expression = match self.current().kind {
            TokenKind::LParen => {
                let args = self.parse_call_args()?;
                Expression::Call { callee: path, args }
            }
            _ if path.contains('.') => {
                return Err(Error::unsupported(
                    line,
                    format!("attribute access `{path}` outside a call"),
                ));
            }
            TokenKind::LBracket => {
                self.advance();
                let index = self.parse_expression()?;
                if matches!(self.current().kind, TokenKind::Colon) {
                    return Err(Error::unsupported(line, "slices"));
                }
                self.expect(TokenKind::RBracket, "]")?;
                Expression::Index {
                    name: path,
                    index: Box::new(index),
                }
            }
            _ => Expression::Identifier(path),
        };

        if matches!(
            self.current().kind,
            TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot
        ) {
            return Err(Error::unsupported(
                line,
                "calls, subscripts or attributes on a computed value",
            ));
        }
        Ok(expression)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expression>> {
        self.expect(TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        while !matches!(self.current().kind, TokenKind::RParen) {
            let line = self.current().line();
            match (self.current().kind, self.peek_kind(1)) {
                (TokenKind::Identifier(_), TokenKind::Equal) => {
                    return Err(Error::unsupported(line, "keyword arguments"));
                }
                (TokenKind::Star | TokenKind::DoubleStar, _) => {
                    return Err(Error::unsupported(line, "argument unpacking"));
                }
                _ => {}
            }
            args.push(self.parse_expression()?);
            if matches!(self.current().kind, TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let token = self.current().clone();
        let line = token.line();
        let expression = match token.kind {
            TokenKind::Integer(value) => Expression::Literal(Literal::Int(value)),
            TokenKind::Float(text) => Expression::Literal(Literal::Float(text.to_string())),
            TokenKind::String(text) => Expression::Literal(Literal::Str(text.to_string())),
            TokenKind::True => Expression::Literal(Literal::Bool(true)),
            TokenKind::False => Expression::Literal(Literal::Bool(false)),
            TokenKind::None => return Err(Error::unsupported(line, "`None` values")),
            TokenKind::LParen => {
                self.advance();
                if matches!(self.current().kind, TokenKind::RParen) {
                    return Err(Error::unsupported(line, "tuples"));
                }
                let inner = self.parse_expression()?;
                if matches!(self.current().kind, TokenKind::Comma) {
                    return Err(Error::unsupported(line, "tuples"));
                }
                self.expect(TokenKind::RParen, ")")?;
                return Ok(inner);
            }
            TokenKind::LBracket => return self.parse_list(),
            TokenKind::LBrace => {
                return Err(Error::unsupported(line, "dictionary and set literals"));
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(expression)
    }

    fn parse_list(&mut self) -> Result<Expression> {
        let line = self.current().line();
        self.expect(TokenKind::LBracket, "[")?;
        let mut elements = Vec::new();
        while !matches!(self.current().kind, TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            match self.current().kind {
                TokenKind::Comma => self.advance(),
                TokenKind::For => {
                    return Err(Error::unsupported(line, "list comprehensions"));
                }
                _ => break,
            }
        }
        self.expect(TokenKind::RBracket, "]")?;
        Ok(Expression::List(elements))
    }
}

fn comparison_operator(kind: TokenKind<'_>) -> Option<BinaryOperator> {
    match kind {
        TokenKind::EqualEqual => Some(BinaryOperator::Eq),
        TokenKind::NotEqual => Some(BinaryOperator::NotEq),
        TokenKind::Less => Some(BinaryOperator::Less),
        TokenKind::LessEqual => Some(BinaryOperator::LessEq),
        TokenKind::Greater => Some(BinaryOperator::Greater),
        TokenKind::GreaterEqual => Some(BinaryOperator::GreaterEq),
        _ => None,
    }
}
