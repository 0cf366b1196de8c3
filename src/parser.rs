use tracing::debug;

use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::lexer::{self, Token, TokenKind};

use self::ast::{
    AssignTarget, Binding, CommentStyle, Expression, FunctionDef, Literal, Param, Program,
    RangeBounds, Statement, StatementKind, UnaryOperator,
};

pub mod ast;
mod expr;

/// Python keywords the lexer leaves as identifiers but the translator
/// refuses outright.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "class", "try", "except", "finally", "raise", "import", "from", "lambda", "with", "yield",
    "del", "assert", "async", "await", "nonlocal",
];

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    in_function: bool,
    in_loop: bool,
}

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
    lines: Vec<&'a str>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token<'a>>, source: &'a str) -> Self {
        Self {
            tokens,
            position: 0,
            lines: source.lines().collect(),
        }
    }

    pub fn parse_program(mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while !matches!(self.current().kind, TokenKind::EOF) {
            if matches!(self.current().kind, TokenKind::Newline) {
                self.advance();
                continue;
            }
            self.parse_statement(Context::default(), &mut statements)?;
        }

        for statement in &statements {
            check_module_level(statement)?;
        }
        while matches!(
            statements.last().map(|statement| &statement.kind),
            Some(StatementKind::Blank)
        ) {
            statements.pop();
        }

        let header_len = statements
            .iter()
            .take_while(|statement| {
                matches!(
                    statement.kind,
                    StatementKind::Comment { .. } | StatementKind::Blank
                )
            })
            .count();
        let rest = statements.split_off(header_len);
        Ok(Program {
            header: statements,
            statements: rest,
        })
    }

    fn parse_statement(&mut self, ctx: Context, out: &mut Vec<Statement>) -> Result<()> {
        let token = self.current().clone();
        let line = token.line();
        match token.kind {
            TokenKind::Comment(text) => {
                self.advance();
                out.push(Statement::new(
                    line,
                    StatementKind::Comment {
                        text: text.to_string(),
                        style: CommentStyle::Line,
                    },
                ));
                Ok(())
            }
            TokenKind::BlankLine => {
                self.advance();
                out.push(Statement::new(line, StatementKind::Blank));
                Ok(())
            }
            TokenKind::Def => {
                if ctx.in_function {
                    return Err(Error::unsupported(line, "nested function definitions"));
                }
                let function = self.parse_function_def()?;
                out.push(function);
                Ok(())
            }
            TokenKind::If => {
                let conditional = self.parse_conditional(ctx)?;
                out.push(conditional);
                Ok(())
            }
            TokenKind::For => {
                let counted_loop = self.parse_counted_loop(ctx)?;
                out.push(counted_loop);
                Ok(())
            }
            TokenKind::While => Err(Error::unsupported(
                line,
                "`while` loops (only `for ... in range(...)` is translated)",
            )),
            TokenKind::Elif | TokenKind::Else => {
                Err(self.error_at(line, "`else` without a matching `if`"))
            }
            TokenKind::Indent => Err(self.error_at(line, "unexpected indent")),
            TokenKind::Dedent => Err(self.error_at(line, "unexpected end of block")),
            _ => self.parse_simple_statement(ctx, out),
        }
    }

    fn parse_simple_statement(&mut self, ctx: Context, out: &mut Vec<Statement>) -> Result<()> {
        let token = self.current().clone();
        let line = token.line();
        let kind = match token.kind {
            TokenKind::Return => {
                if !ctx.in_function {
                    return Err(Error::unsupported(line, "`return` outside a function"));
                }
                self.advance();
                let value = if self.at_line_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                StatementKind::Return(value)
            }
            TokenKind::Pass => {
                self.advance();
                StatementKind::Pass
            }
            TokenKind::Break | TokenKind::Continue => {
                let keyword = if matches!(token.kind, TokenKind::Break) {
                    "break"
                } else {
                    "continue"
                };
                if !ctx.in_loop {
                    return Err(Error::unsupported(
                        line,
                        format!("`{keyword}` outside a loop"),
                    ));
                }
                self.advance();
                if keyword == "break" {
                    StatementKind::Break
                } else {
                    StatementKind::Continue
                }
            }
            TokenKind::Global => {
                if !ctx.in_function {
                    return Err(Error::unsupported(line, "`global` outside a function"));
                }
                self.advance();
                let mut names = vec![self.expect_identifier()?.to_string()];
                while matches!(self.current().kind, TokenKind::Comma) {
                    self.advance();
                    names.push(self.expect_identifier()?.to_string());
                }
                StatementKind::Global(names)
            }
            TokenKind::Identifier(name) if UNSUPPORTED_KEYWORDS.contains(&name) => {
                return Err(Error::unsupported(line, format!("`{name}` statements")));
            }
            TokenKind::String(text)
                if matches!(
                    self.peek_kind(1),
                    TokenKind::Newline | TokenKind::Comment(_) | TokenKind::EOF
                ) =>
            {
                self.advance();
                StatementKind::Comment {
                    text: text.to_string(),
                    style: CommentStyle::Block,
                }
            }
            _ => self.parse_assignment_or_expression(line)?,
        };
        out.push(Statement::new(line, kind));
        self.finish_line(out)
    }

    fn parse_assignment_or_expression(&mut self, line: usize) -> Result<StatementKind> {
        if matches!(self.current().kind, TokenKind::Identifier(_))
            && matches!(
                (self.peek_kind(1), self.peek_kind(2)),
                (TokenKind::Plus, TokenKind::Plus) | (TokenKind::Minus, TokenKind::Minus)
            )
            && matches!(
                self.peek_kind(3),
                TokenKind::Newline | TokenKind::Comment(_) | TokenKind::EOF
            )
        {
            return Err(Error::unsupported(
                line,
                "increment and decrement operators (`x++`, `x--`)",
            ));
        }

        let target = self.parse_expression()?;
        match self.current().kind {
            TokenKind::Equal => {
                self.advance();
                let target = self.assign_target(target, line)?;
                let value = self.parse_expression()?;
                if matches!(self.current().kind, TokenKind::Equal) {
                    return Err(Error::unsupported(line, "chained assignment"));
                }
                Ok(StatementKind::Assignment {
                    target,
                    value,
                    annotation: None,
                    binding: Binding::Unresolved,
                })
            }
            TokenKind::Colon => {
                let Expression::Identifier(name) = target else {
                    return Err(self.error_at(line, "only plain names can be annotated"));
                };
                self.advance();
                let annotation = self.parse_type_annotation()?;
                if !matches!(self.current().kind, TokenKind::Equal) {
                    return Err(Error::unsupported(line, "annotations without a value"));
                }
                self.advance();
                let value = self.parse_expression()?;
                Ok(StatementKind::Assignment {
                    target: AssignTarget::Name(name),
                    value,
                    annotation: Some(annotation),
                    binding: Binding::Unresolved,
                })
            }
            TokenKind::CompoundAssign(op) => Err(Error::unsupported(
                line,
                format!("compound assignment `{op}` (write `x = x + ...`)"),
            )),
            TokenKind::Comma => Err(Error::unsupported(line, "tuple assignment and tuples")),
            _ => Ok(StatementKind::Expr(target)),
        }
    }

    fn assign_target(&self, target: Expression, line: usize) -> Result<AssignTarget> {
        match target {
            Expression::Identifier(name) => Ok(AssignTarget::Name(name)),
            Expression::Index { name, index } => Ok(AssignTarget::Index {
                name,
                index: *index,
            }),
            _ => Err(self.error_at(line, "cannot assign to this expression")),
        }
    }

    fn parse_type_annotation(&mut self) -> Result<Kind> {
        let line = self.current().line();
        let name = self.expect_identifier()?;
        Kind::from_annotation(name)
            .ok_or_else(|| Error::unsupported(line, format!("type annotation `{name}`")))
    }

    fn parse_function_def(&mut self) -> Result<Statement> {
        let line = self.current().line();
        self.expect(TokenKind::Def, "def")?;
        let name = self.expect_identifier()?.to_string();
        self.expect(TokenKind::LParen, "(")?;

        let mut params: Vec<Param> = Vec::new();
        while !matches!(self.current().kind, TokenKind::RParen) {
            if matches!(
                self.current().kind,
                TokenKind::Star | TokenKind::DoubleStar
            ) {
                return Err(Error::unsupported(line, "variadic parameters"));
            }
            let param = self.expect_identifier()?.to_string();
            if params.iter().any(|existing| existing.name == param) {
                return Err(self.error_at(line, format!("duplicate parameter '{param}'")));
            }
            let annotation = if matches!(self.current().kind, TokenKind::Colon) {
                self.advance();
                Some(self.parse_type_annotation()?)
            } else {
                None
            };
            if matches!(self.current().kind, TokenKind::Equal) {
                return Err(Error::unsupported(line, "default parameter values"));
            }
            params.push(Param {
                name: param,
                annotation,
            });
            if matches!(self.current().kind, TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, ")")?;

        let returns = if matches!(self.current().kind, TokenKind::Arrow) {
            self.advance();
            if matches!(self.current().kind, TokenKind::None) {
                self.advance();
                Some(Kind::Void)
            } else {
                Some(self.parse_type_annotation()?)
            }
        } else {
            None
        };

        let is_entry_point = name == "setup" || name == "loop";
        if is_entry_point && !params.is_empty() {
            return Err(Error::unsupported(
                line,
                format!("parameters on entry point `{name}` (the Arduino runtime calls it without arguments)"),
            ));
        }
        if is_entry_point && returns.as_ref().is_some_and(|kind| *kind != Kind::Void) {
            return Err(Error::unsupported(
                line,
                format!("a return type on entry point `{name}`"),
            ));
        }

        self.expect(TokenKind::Colon, ":")?;
        let body = self.parse_block(Context {
            in_function: true,
            in_loop: false,
        })?;

        Ok(Statement::new(
            line,
            StatementKind::FunctionDef(FunctionDef {
                name,
                params,
                returns,
                body,
                is_entry_point,
                signature: None,
                hoisted: Vec::new(),
            }),
        ))
    }

    fn parse_conditional(&mut self, ctx: Context) -> Result<Statement> {
        let line = self.current().line();
        self.advance(); // `if` or `elif`
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Colon, ":")?;
        let mut then_body = self.parse_block(ctx)?;

        // Comments between the branch and a following `else` stay with the
        // branch they follow.
        let next = self.skip_trivia_lookahead();
        let else_body = match self.tokens[next].kind {
            TokenKind::Elif | TokenKind::Else => {
                while self.position < next {
                    self.parse_statement(ctx, &mut then_body)?;
                }
                if matches!(self.current().kind, TokenKind::Elif) {
                    vec![self.parse_conditional(ctx)?]
                } else {
                    self.advance();
                    self.expect(TokenKind::Colon, ":")?;
                    self.parse_block(ctx)?
                }
            }
            _ => Vec::new(),
        };

        Ok(Statement::new(
            line,
            StatementKind::Conditional {
                condition,
                then_body,
                else_body,
            },
        ))
    }

    fn parse_counted_loop(&mut self, ctx: Context) -> Result<Statement> {
        let line = self.current().line();
        self.expect(TokenKind::For, "for")?;
        let var = self.expect_identifier()?.to_string();
        if matches!(self.current().kind, TokenKind::Comma) {
            return Err(Error::unsupported(line, "tuple loop targets"));
        }
        self.expect(TokenKind::In, "in")?;
        let iterable = self.parse_expression()?;
        let range = match iterable {
            Expression::Call { callee, args } if callee == "range" => {
                self.range_bounds(args, line)?
            }
            _ => {
                return Err(Error::unsupported(
                    line,
                    "`for` loops over anything other than `range(...)`",
                ));
            }
        };
        self.expect(TokenKind::Colon, ":")?;
        let body = self.parse_block(Context {
            in_loop: true,
            ..ctx
        })?;

        let next = self.skip_trivia_lookahead();
        if matches!(self.tokens[next].kind, TokenKind::Else) {
            return Err(Error::unsupported(
                self.tokens[next].line(),
                "`for ... else` blocks",
            ));
        }

        Ok(Statement::new(
            line,
            StatementKind::CountedLoop {
                var,
                range,
                body,
                binding: Binding::Unresolved,
            },
        ))
    }

    fn range_bounds(&self, args: Vec<Expression>, line: usize) -> Result<RangeBounds> {
        let count = args.len();
        let mut args = args.into_iter();
        match (count, args.next(), args.next(), args.next()) {
            (1, Some(stop), None, None) => Ok(RangeBounds {
                start: None,
                stop,
                step: 1,
            }),
            (2, Some(start), Some(stop), None) => Ok(RangeBounds {
                start: Some(start),
                stop,
                step: 1,
            }),
            (3, Some(start), Some(stop), Some(step)) => Ok(RangeBounds {
                start: Some(start),
                stop,
                step: literal_step(&step, line)?,
            }),
            _ => Err(self.error_at(
                line,
                format!("range() takes 1 to 3 arguments, got {count}"),
            )),
        }
    }

    /// Parses the body after a block header's colon: either a simple
    /// statement on the same line or an indented block.
    fn parse_block(&mut self, ctx: Context) -> Result<Vec<Statement>> {
        let mut body = Vec::new();
        if !self.at_line_end() {
            self.parse_simple_statement(ctx, &mut body)?;
            return Ok(body);
        }
        self.finish_line(&mut body)?;

        if !matches!(self.current().kind, TokenKind::Indent) {
            let line = self.current().line();
            return Err(self.error_at(line, "expected an indented block"));
        }
        self.advance();

        while !matches!(self.current().kind, TokenKind::Dedent | TokenKind::EOF) {
            if matches!(self.current().kind, TokenKind::Newline) {
                self.advance();
                continue;
            }
            self.parse_statement(ctx, &mut body)?;
        }
        if matches!(self.current().kind, TokenKind::Dedent) {
            self.advance();
        }
        Ok(body)
    }

    /// Consumes an optional end-of-line comment and the newline.
    fn finish_line(&mut self, out: &mut Vec<Statement>) -> Result<()> {
        let token = self.current().clone();
        if let TokenKind::Comment(text) = token.kind {
            self.advance();
            out.push(Statement::new(
                token.line(),
                StatementKind::Comment {
                    text: text.to_string(),
                    style: CommentStyle::Trailing,
                },
            ));
        }
        match self.current().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::EOF => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Comment(_) | TokenKind::EOF
        )
    }

    fn skip_trivia_lookahead(&self) -> usize {
        let mut index = self.position;
        while matches!(
            self.tokens[index].kind,
            TokenKind::Comment(_) | TokenKind::BlankLine
        ) {
            index += 1;
        }
        index
    }

    fn expect_identifier(&mut self) -> Result<&'a str> {
        if let TokenKind::Identifier(name) = self.current().kind {
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn expect(&mut self, kind: TokenKind<'a>, expected: &str) -> Result<()> {
        if self.current().kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn current(&self) -> &Token<'a> {
        &self.tokens[self.position]
    }

    fn peek_kind(&self, offset: usize) -> TokenKind<'a> {
        self.tokens
            .get(self.position + offset)
            .map(|token| token.kind)
            .unwrap_or(TokenKind::EOF)
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn error_at(&self, line: usize, message: impl Into<String>) -> Error {
        let text = self
            .lines
            .get(line.saturating_sub(1))
            .map(|text| text.trim())
            .unwrap_or_default();
        Error::parse(line, text, message)
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.current();
        self.error_at(
            token.line(),
            format!("expected {expected}, found {}", describe(&token.kind)),
        )
    }
}

fn literal_step(step: &Expression, line: usize) -> Result<i64> {
    let value = match step {
        Expression::Literal(Literal::Int(value)) => *value,
        Expression::Unary {
            op: UnaryOperator::Neg,
            operand,
        } => match operand.as_ref() {
            Expression::Literal(Literal::Int(value)) => -value,
            _ => return Err(Error::unsupported(line, "a non-literal `range()` step")),
        },
        _ => return Err(Error::unsupported(line, "a non-literal `range()` step")),
    };
    if value == 0 {
        return Err(Error::unsupported(line, "a `range()` step of zero"));
    }
    Ok(value)
}

fn check_module_level(statement: &Statement) -> Result<()> {
    match statement.kind {
        StatementKind::FunctionDef(_)
        | StatementKind::Assignment { .. }
        | StatementKind::Comment { .. }
        | StatementKind::Blank
        | StatementKind::Pass => Ok(()),
        _ => Err(Error::unsupported(
            statement.line,
            "executable statements at module level (move them into setup() or loop())",
        )),
    }
}

fn describe(kind: &TokenKind<'_>) -> String {
    let text = match kind {
        TokenKind::Identifier(name) => return format!("'{name}'"),
        TokenKind::Integer(value) => return format!("'{value}'"),
        TokenKind::Float(text) | TokenKind::Unknown(text) | TokenKind::CompoundAssign(text) => {
            return format!("'{text}'");
        }
        TokenKind::String(_) => "string literal",
        TokenKind::Comment(_) => "comment",
        TokenKind::BlankLine => "blank line",
        TokenKind::True => "'True'",
        TokenKind::False => "'False'",
        TokenKind::None => "'None'",
        TokenKind::Def => "'def'",
        TokenKind::If => "'if'",
        TokenKind::Elif => "'elif'",
        TokenKind::Else => "'else'",
        TokenKind::For => "'for'",
        TokenKind::In => "'in'",
        TokenKind::While => "'while'",
        TokenKind::Return => "'return'",
        TokenKind::Pass => "'pass'",
        TokenKind::Global => "'global'",
        TokenKind::Break => "'break'",
        TokenKind::Continue => "'continue'",
        TokenKind::And => "'and'",
        TokenKind::Or => "'or'",
        TokenKind::Not => "'not'",
        TokenKind::Is => "'is'",
        TokenKind::Equal => "'='",
        TokenKind::EqualEqual => "'=='",
        TokenKind::NotEqual => "'!='",
        TokenKind::Less => "'<'",
        TokenKind::LessEqual => "'<='",
        TokenKind::Greater => "'>'",
        TokenKind::GreaterEqual => "'>='",
        TokenKind::Plus => "'+'",
        TokenKind::Minus => "'-'",
        TokenKind::Star => "'*'",
        TokenKind::DoubleStar => "'**'",
        TokenKind::Slash => "'/'",
        TokenKind::DoubleSlash => "'//'",
        TokenKind::Percent => "'%'",
        TokenKind::Arrow => "'->'",
        TokenKind::Colon => "':'",
        TokenKind::Comma => "','",
        TokenKind::Dot => "'.'",
        TokenKind::LParen => "'('",
        TokenKind::RParen => "')'",
        TokenKind::LBracket => "'['",
        TokenKind::RBracket => "']'",
        TokenKind::LBrace => "'{'",
        TokenKind::RBrace => "'}'",
        TokenKind::Newline => "end of line",
        TokenKind::Indent => "indented block",
        TokenKind::Dedent => "end of block",
        TokenKind::EOF => "end of input",
    };
    text.to_string()
}

pub fn parse_tokens<'a>(tokens: Vec<Token<'a>>, source: &'a str) -> Result<Program> {
    let program = Parser::new(tokens, source).parse_program()?;
    debug!(
        header = program.header.len(),
        statements = program.statements.len(),
        "parsed program"
    );
    Ok(program)
}

pub fn parse(source: &str) -> Result<Program> {
    let tokens = lexer::tokenize(source)?;
    parse_tokens(tokens, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::ast::BinaryOperator;
    use indoc::indoc;

    fn unsupported(source: &str) -> String {
        let error = parse(source).expect_err("expected rejection");
        assert_eq!(error.kind(), ErrorKind::UnsupportedConstruct, "{error}");
        error.to_string()
    }

    #[test]
    fn parses_simple_program() {
        let input = indoc! {"
            def loop():
                n = 4 + 4
                print(n)
        "};
        let program = parse(input).expect("parse failed");

        let expected = Program {
            header: vec![],
            statements: vec![Statement::new(
                1,
                StatementKind::FunctionDef(FunctionDef {
                    name: "loop".to_string(),
                    params: vec![],
                    returns: None,
                    body: vec![
                        Statement::new(
                            2,
                            StatementKind::Assignment {
                                target: AssignTarget::Name("n".to_string()),
                                value: Expression::BinaryOp {
                                    left: Box::new(Expression::Literal(Literal::Int(4))),
                                    op: BinaryOperator::Add,
                                    right: Box::new(Expression::Literal(Literal::Int(4))),
                                },
                                annotation: None,
                                binding: Binding::Unresolved,
                            },
                        ),
                        Statement::new(
                            3,
                            StatementKind::Expr(Expression::Call {
                                callee: "print".to_string(),
                                args: vec![Expression::Identifier("n".to_string())],
                            }),
                        ),
                    ],
                    is_entry_point: true,
                    signature: None,
                    hoisted: vec![],
                }),
            )],
        };

        assert_eq!(program, expected);
    }

    #[test]
    fn leading_docstring_and_comments_form_the_header() {
        let input = indoc! {r#"
            """Blink"""
            # wiring: LED on pin 13

            led = 13
        "#};
        let program = parse(input).expect("parse failed");
        assert_eq!(program.header.len(), 3);
        assert_eq!(
            program.header[0].kind,
            StatementKind::Comment {
                text: "Blink".to_string(),
                style: CommentStyle::Block,
            }
        );
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn elif_nests_a_conditional_in_the_else_branch() {
        let input = indoc! {"
            def loop():
                if x < 1:
                    pass
                # still the first branch
                elif x < 2:
                    pass
                else:
                    pass
        "};
        let program = parse(input).expect("parse failed");
        let function = program.functions().next().expect("function");
        let StatementKind::Conditional {
            then_body,
            else_body,
            ..
        } = &function.body[0].kind
        else {
            panic!("expected conditional");
        };
        assert_eq!(then_body.len(), 2);
        assert!(matches!(
            else_body.as_slice(),
            [Statement {
                kind: StatementKind::Conditional { .. },
                ..
            }]
        ));
    }

    #[test]
    fn parses_range_bounds() {
        let program = parse("def loop():\n    for i in range(10, 0, -2):\n        pass\n")
            .expect("parse failed");
        let function = program.functions().next().expect("function");
        let StatementKind::CountedLoop { var, range, .. } = &function.body[0].kind else {
            panic!("expected loop");
        };
        assert_eq!(var, "i");
        assert_eq!(range.start, Some(Expression::Literal(Literal::Int(10))));
        assert_eq!(range.step, -2);
    }

    #[test]
    fn trailing_comments_follow_their_statement() {
        let program = parse("def setup():  # runs once\n    x = 1  # one\n").expect("parse");
        let function = program.functions().next().expect("function");
        let styles = function
            .body
            .iter()
            .filter_map(|statement| match &statement.kind {
                StatementKind::Comment { style, .. } => Some(*style),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(styles, vec![CommentStyle::Trailing, CommentStyle::Trailing]);
        assert!(matches!(
            function.body[1].kind,
            StatementKind::Assignment { .. }
        ));
    }

    #[test]
    fn one_line_bodies_are_accepted() {
        let program = parse("def loop():\n    if ready: blink()\n").expect("parse");
        let function = program.functions().next().expect("function");
        let StatementKind::Conditional { then_body, .. } = &function.body[0].kind else {
            panic!("expected conditional");
        };
        assert_eq!(then_body.len(), 1);
    }

    #[test]
    fn annotated_signature() {
        let program = parse("def scale(x: int, k: float) -> float:\n    return x * k\n")
            .expect("parse");
        let function = program.functions().next().expect("function");
        assert_eq!(function.params[1].annotation, Some(Kind::Float));
        assert_eq!(function.returns, Some(Kind::Float));
        assert!(!function.is_entry_point);
    }

    #[test]
    fn rejects_unsupported_statements() {
        assert!(unsupported("def loop():\n    while True:\n        pass\n").contains("while"));
        assert!(unsupported("def loop():\n    x += 1\n").contains("+="));
        assert!(unsupported("def loop():\n    x++\n").contains("increment"));
        assert!(unsupported("def loop():\n    for c in name:\n        pass\n").contains("range"));
        assert!(unsupported("def setup(baud):\n    pass\n").contains("setup"));
        assert!(unsupported("import time\n").contains("import"));
        assert!(unsupported("delay(10)\n").contains("module level"));
        assert!(unsupported("def f():\n    def g():\n        pass\n").contains("nested"));
    }

    #[test]
    fn reports_unknown_shapes_with_line_text() {
        let error = parse("def loop():\n    x = 1 @ 2\n").expect_err("expected failure");
        assert_eq!(error.kind(), ErrorKind::Parse);
        assert_eq!(error.line(), 2);
        assert!(error.to_string().contains("`x = 1 @ 2`"), "{error}");
    }

    #[test]
    fn rejects_unexpected_indent() {
        let error = parse("x = 1\n    y = 2\n").expect_err("expected failure");
        assert_eq!(error.kind(), ErrorKind::Parse);
        assert!(error.to_string().contains("unexpected indent"));
    }
}
