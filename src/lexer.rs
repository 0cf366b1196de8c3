use std::collections::VecDeque;
use std::{iter::Peekable, str::CharIndices};

use tracing::{debug, warn};

pub use self::error::{LexError, LexResult};
pub use self::token::{Span, Token, TokenKind};

mod error;
mod token;

/// Leading whitespace of one physical line. Tabs and spaces both count as one
/// column each; a file is expected to stick to one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndentLevel {
    pub width: usize,
    pub mixed: bool,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    indent_stack: Vec<usize>,
    pending_tokens: VecDeque<Token<'a>>,
    // Blank and comment-only lines wait here until the next code line has
    // produced its Indent/Dedent tokens.
    held_trivia: Vec<Token<'a>>,
    at_line_start: bool,
    eof_reached: bool,
    nesting: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            indent_stack: vec![0],
            pending_tokens: VecDeque::new(),
            held_trivia: Vec::new(),
            at_line_start: true,
            eof_reached: false,
            nesting: 0,
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        if let Some(token) = self.pending_tokens.pop_front() {
            return Ok(token);
        }

        if self.eof_reached {
            return Ok(Token::new(TokenKind::EOF, self.here()));
        }

        if self.at_line_start {
            self.at_line_start = false;
            self.start_line();
            if let Some(token) = self.pending_tokens.pop_front() {
                return Ok(token);
            }
            if self.eof_reached {
                return Ok(Token::new(TokenKind::EOF, self.here()));
            }
        }

        self.skip_whitespace();

        let Some(&(start_idx, ch)) = self.chars.peek() else {
            self.finish_input(true);
            return self.next_token();
        };

        let line = self.line;
        let column = self.column;
        let span = |end: usize| Span {
            start: start_idx,
            end,
            line,
            column,
        };
        let second = self.peek_second();
        let third = self.peek_third();

        match ch {
            '\n' => {
                self.advance_char();
                self.at_line_start = true;
                Ok(Token::new(TokenKind::Newline, span(start_idx + 1)))
            }
            '#' => {
                let end = self.skip_to_line_end();
                let text = self.input[start_idx + 1..end].trim_end();
                Ok(Token::new(TokenKind::Comment(text), span(end)))
            }
            '(' | '[' | '{' => {
                self.nesting += 1;
                let kind = match ch {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                };
                Ok(self.single(kind, span(start_idx + 1)))
            }
            ')' | ']' | '}' => {
                self.nesting = self.nesting.saturating_sub(1);
                let kind = match ch {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                };
                Ok(self.single(kind, span(start_idx + 1)))
            }
            ':' if second == Some('=') => Ok(self.double(
                TokenKind::Unknown(&self.input[start_idx..start_idx + 2]),
                span(start_idx + 2),
            )),
            ':' => Ok(self.single(TokenKind::Colon, span(start_idx + 1))),
            ',' => Ok(self.single(TokenKind::Comma, span(start_idx + 1))),
            '.' if second.is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number(start_idx, line, column)
            }
            '.' => Ok(self.single(TokenKind::Dot, span(start_idx + 1))),
            '=' if second == Some('=') => {
                Ok(self.double(TokenKind::EqualEqual, span(start_idx + 2)))
            }
            '=' => Ok(self.single(TokenKind::Equal, span(start_idx + 1))),
            '!' if second == Some('=') => Ok(self.double(TokenKind::NotEqual, span(start_idx + 2))),
            '<' | '>' if second == Some(ch) => Ok(self.double(
                TokenKind::Unknown(&self.input[start_idx..start_idx + 2]),
                span(start_idx + 2),
            )),
            '<' if second == Some('=') => {
                Ok(self.double(TokenKind::LessEqual, span(start_idx + 2)))
            }
            '<' => Ok(self.single(TokenKind::Less, span(start_idx + 1))),
            '>' if second == Some('=') => {
                Ok(self.double(TokenKind::GreaterEqual, span(start_idx + 2)))
            }
            '>' => Ok(self.single(TokenKind::Greater, span(start_idx + 1))),
            '-' if second == Some('>') => Ok(self.double(TokenKind::Arrow, span(start_idx + 2))),
            '*' | '/' if second == Some(ch) && third == Some('=') => {
                self.advance_char();
                Ok(self.double(
                    TokenKind::CompoundAssign(&self.input[start_idx..start_idx + 3]),
                    span(start_idx + 3),
                ))
            }
            '*' if second == Some('*') => {
                Ok(self.double(TokenKind::DoubleStar, span(start_idx + 2)))
            }
            '/' if second == Some('/') => {
                Ok(self.double(TokenKind::DoubleSlash, span(start_idx + 2)))
            }
            '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '@' if second == Some('=') => {
                Ok(self.double(
                    TokenKind::CompoundAssign(&self.input[start_idx..start_idx + 2]),
                    span(start_idx + 2),
                ))
            }
            '+' => Ok(self.single(TokenKind::Plus, span(start_idx + 1))),
            '-' => Ok(self.single(TokenKind::Minus, span(start_idx + 1))),
            '*' => Ok(self.single(TokenKind::Star, span(start_idx + 1))),
            '/' => Ok(self.single(TokenKind::Slash, span(start_idx + 1))),
            '%' => Ok(self.single(TokenKind::Percent, span(start_idx + 1))),
            '"' | '\'' => self.read_string(ch, start_idx, line, column),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier(start_idx, line, column)),
            c if c.is_ascii_digit() => self.read_number(start_idx, line, column),
            _ => {
                let end = start_idx + ch.len_utf8();
                Ok(self.single(TokenKind::Unknown(&self.input[start_idx..end]), span(end)))
            }
        }
    }

    /// Consumes blank and comment-only lines, then the indentation of the
    /// next code line, queueing the structural tokens it implies.
    fn start_line(&mut self) {
        loop {
            let (indent, first) = self.scan_line_start();
            let span = self.here();
            match first {
                None => {
                    self.consume_indentation();
                    self.finish_input(false);
                    return;
                }
                Some('\n') => {
                    self.consume_indentation();
                    self.advance_char();
                    self.held_trivia
                        .push(Token::new(TokenKind::BlankLine, span));
                }
                Some('#') => {
                    self.consume_indentation();
                    let hash = self.current_index();
                    let column = self.column;
                    let end = self.skip_to_line_end();
                    let text = self.input[hash + 1..end].trim_end();
                    self.held_trivia.push(Token::new(
                        TokenKind::Comment(text),
                        Span {
                            start: hash,
                            end,
                            line: span.line,
                            column,
                        },
                    ));
                    if self.chars.peek().is_some() {
                        self.advance_char();
                    }
                }
                Some(_) => {
                    self.consume_indentation();
                    if indent.mixed {
                        warn!(
                            line = self.line,
                            "mixed tabs and spaces in indentation; block nesting may be misread"
                        );
                    }
                    let span = self.here();
                    self.apply_indent(indent.width, span);
                    self.pending_tokens.extend(self.held_trivia.drain(..));
                    return;
                }
            }
        }
    }

    fn apply_indent(&mut self, width: usize, span: Span) {
        let current = self.indent_stack.last().copied().unwrap_or(0);
        if width > current {
            self.indent_stack.push(width);
            self.pending_tokens
                .push_back(Token::new(TokenKind::Indent, span));
            return;
        }
        while self.indent_stack.last().is_some_and(|&top| top > width) {
            self.indent_stack.pop();
            self.pending_tokens
                .push_back(Token::new(TokenKind::Dedent, span));
        }
        // A dedent between two open levels re-opens at the new width; the
        // parser rejects the stray Indent with the offending line.
        if self.indent_stack.last().copied().unwrap_or(0) < width {
            self.indent_stack.push(width);
            self.pending_tokens
                .push_back(Token::new(TokenKind::Indent, span));
        }
    }

    fn finish_input(&mut self, mid_line: bool) {
        let span = self.here();
        if mid_line {
            self.pending_tokens
                .push_back(Token::new(TokenKind::Newline, span));
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.pending_tokens
                .push_back(Token::new(TokenKind::Dedent, span));
        }
        self.pending_tokens.extend(self.held_trivia.drain(..));
        self.eof_reached = true;
    }

    fn scan_line_start(&self) -> (IndentLevel, Option<char>) {
        let mut level = IndentLevel::default();
        let mut saw_space = false;
        let mut saw_tab = false;
        for (_, c) in self.chars.clone() {
            match c {
                ' ' => {
                    saw_space = true;
                    level.width += 1;
                }
                '\t' => {
                    saw_tab = true;
                    level.width += 1;
                }
                '\r' | '\x0c' => {}
                _ => {
                    level.mixed = saw_space && saw_tab;
                    return (level, Some(c));
                }
            }
        }
        (level, None)
    }

    fn consume_indentation(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if matches!(c, ' ' | '\t' | '\r' | '\x0c') {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.advance_char();
                }
                '\\' if self.peek_second() == Some('\n') => {
                    self.advance_char();
                    self.advance_char();
                }
                '\n' if self.nesting > 0 => {
                    self.advance_char();
                }
                // Comments inside an open bracket cannot be placed in the
                // output and are dropped.
                '#' if self.nesting > 0 => {
                    self.skip_to_line_end();
                }
                _ => break,
            }
        }
    }

    /// Advances up to (not over) the next newline and returns its index.
    fn skip_to_line_end(&mut self) -> usize {
        while let Some(&(idx, c)) = self.chars.peek() {
            if c == '\n' {
                return idx;
            }
            self.advance_char();
        }
        self.input.len()
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char(); // Consume first char
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        let kind = match ident {
            "def" => TokenKind::Def,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "while" => TokenKind::While,
            "return" => TokenKind::Return,
            "pass" => TokenKind::Pass,
            "global" => TokenKind::Global,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "is" => TokenKind::Is,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            _ => TokenKind::Identifier(ident),
        };
        Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        let radix = match (self.chars.peek().map(|&(_, c)| c), self.peek_second()) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            (Some('0'), Some('b' | 'B')) => Some(2),
            _ => None,
        };

        let mut is_float = false;
        if radix.is_some() {
            self.advance_char();
            self.advance_char();
            self.skip_while(|c| c.is_ascii_alphanumeric() || c == '_');
        } else {
            self.skip_while(|c| c.is_ascii_digit() || c == '_');
            // `1.5` and `1.` are floats, `1.bit_length` is not.
            if self.chars.peek().is_some_and(|&(_, c)| c == '.')
                && !self
                    .peek_second()
                    .is_some_and(|c| c.is_alphabetic() || c == '_')
            {
                is_float = true;
                self.advance_char();
                self.skip_while(|c| c.is_ascii_digit() || c == '_');
            }
            if self.chars.peek().is_some_and(|&(_, c)| c == 'e' || c == 'E') {
                let exponent_follows = match (self.peek_second(), self.peek_third()) {
                    (Some(c), _) if c.is_ascii_digit() => true,
                    (Some('+' | '-'), Some(c)) => c.is_ascii_digit(),
                    _ => false,
                };
                if exponent_follows {
                    is_float = true;
                    self.advance_char();
                    if self.chars.peek().is_some_and(|&(_, c)| c == '+' || c == '-') {
                        self.advance_char();
                    }
                    self.skip_while(|c| c.is_ascii_digit());
                }
            }
        }

        // Trailing identifier characters make the whole word malformed.
        let trailing = self
            .chars
            .peek()
            .is_some_and(|&(_, c)| c.is_alphanumeric() || c == '_');
        if trailing {
            self.skip_while(|c| c.is_alphanumeric() || c == '_');
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let invalid = || LexError::InvalidNumber {
            literal: literal.to_string(),
            line,
            column,
        };
        if trailing {
            return Err(invalid());
        }

        let cleaned = literal.replace('_', "");
        let kind = if is_float {
            cleaned.parse::<f64>().map_err(|_| invalid())?;
            TokenKind::Float(literal)
        } else if let Some(radix) = radix {
            TokenKind::Integer(i64::from_str_radix(&cleaned[2..], radix).map_err(|_| invalid())?)
        } else {
            TokenKind::Integer(cleaned.parse::<i64>().map_err(|_| invalid())?)
        };
        Ok(Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    fn read_string(
        &mut self,
        quote: char,
        start: usize,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        let triple = self.peek_second() == Some(quote) && self.peek_third() == Some(quote);
        let delimiter = if triple { 3 } else { 1 };
        for _ in 0..delimiter {
            self.advance_char();
        }
        let content_start = start + delimiter;
        let unterminated = LexError::UnterminatedString { line, column };

        while let Some(&(idx, c)) = self.chars.peek() {
            if c == '\\' {
                self.advance_char();
                self.advance_char();
                continue;
            }
            if c == '\n' && !triple {
                return Err(unterminated);
            }
            if c == quote
                && (!triple
                    || (self.peek_second() == Some(quote) && self.peek_third() == Some(quote)))
            {
                for _ in 0..delimiter {
                    self.advance_char();
                }
                return Ok(Token::new(
                    TokenKind::String(&self.input[content_start..idx]),
                    Span {
                        start,
                        end: idx + delimiter,
                        line,
                        column,
                    },
                ));
            }
            self.advance_char();
        }
        Err(unterminated)
    }

    fn single(&mut self, kind: TokenKind<'a>, span: Span) -> Token<'a> {
        self.advance_char();
        Token::new(kind, span)
    }

    fn double(&mut self, kind: TokenKind<'a>, span: Span) -> Token<'a> {
        self.advance_char();
        self.advance_char();
        Token::new(kind, span)
    }
}

impl<'a> Lexer<'a> {
    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn skip_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.chars.peek().is_some_and(|&(_, c)| predicate(c)) {
            self.advance_char();
        }
    }

    fn peek_second(&self) -> Option<char> {
        self.chars.clone().nth(1).map(|(_, c)| c)
    }

    fn peek_third(&self) -> Option<char> {
        self.chars.clone().nth(2).map(|(_, c)| c)
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn here(&mut self) -> Span {
        let index = self.current_index();
        Span {
            start: index,
            end: index,
            line: self.line,
            column: self.column,
        }
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    debug!(tokens = tokens.len(), lines = lexer.line, "tokenized source");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            def loop():
                n = 4 + 4
                print(n)
        "};
        let expected_tokens = vec![
            TokenKind::Def,
            TokenKind::Identifier("loop"),
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Identifier("n"),
            TokenKind::Equal,
            TokenKind::Integer(4),
            TokenKind::Plus,
            TokenKind::Integer(4),
            TokenKind::Newline,
            TokenKind::Identifier("print"),
            TokenKind::LParen,
            TokenKind::Identifier("n"),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::EOF,
        ];
        assert_eq!(kinds(input), expected_tokens);
    }

    #[test]
    fn comment_lines_follow_the_indentation_of_the_next_statement() {
        let input = indoc! {"
            def setup():
                x = 1

            # between functions
            def loop():
                # first
                pass
        "};
        let kinds = kinds(input);
        let dedent = kinds
            .iter()
            .position(|kind| *kind == TokenKind::Dedent)
            .expect("dedent");
        assert_eq!(kinds[dedent + 1], TokenKind::BlankLine);
        assert_eq!(kinds[dedent + 2], TokenKind::Comment(" between functions"));
        assert_eq!(kinds[dedent + 3], TokenKind::Def);

        let indent = kinds
            .iter()
            .rposition(|kind| *kind == TokenKind::Indent)
            .expect("indent");
        assert_eq!(kinds[indent + 1], TokenKind::Comment(" first"));
        assert_eq!(kinds[indent + 2], TokenKind::Pass);
    }

    #[test]
    fn comment_closing_a_block_attaches_to_the_next_line() {
        let input = indoc! {"
            def loop():
                pass
                # last
            x = 1
        "};
        let kinds = kinds(input);
        let dedent = kinds
            .iter()
            .position(|kind| *kind == TokenKind::Dedent)
            .expect("dedent");
        assert_eq!(kinds[dedent + 1], TokenKind::Comment(" last"));
        assert_eq!(kinds[dedent + 2], TokenKind::Identifier("x"));
    }

    #[test]
    fn trailing_comment_stays_on_its_line() {
        assert_eq!(
            kinds("x = 1  # one\n"),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Equal,
                TokenKind::Integer(1),
                TokenKind::Comment(" one"),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn tabs_count_as_indentation() {
        let kinds = kinds("if x:\n\ty = 1\n");
        assert!(kinds.contains(&TokenKind::Indent));
        assert!(kinds.contains(&TokenKind::Dedent));
    }

    #[test]
    fn misaligned_dedent_reopens_a_block() {
        let input = "def f():\n        x = 1\n    y = 2\n";
        let kinds = kinds(input);
        let y = kinds
            .iter()
            .position(|kind| *kind == TokenKind::Identifier("y"))
            .expect("y");
        assert_eq!(&kinds[y - 2..y], &[TokenKind::Dedent, TokenKind::Indent]);
    }

    #[test]
    fn missing_final_newline_still_ends_the_line() {
        assert_eq!(
            kinds("x = 1"),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::Equal,
                TokenKind::Integer(1),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn joins_lines_inside_brackets() {
        let kinds = kinds("xs = [1,\n      2]\n");
        assert_eq!(
            kinds
                .iter()
                .filter(|kind| **kind == TokenKind::Newline)
                .count(),
            1
        );
        assert!(!kinds.contains(&TokenKind::Indent));
    }

    #[test]
    fn lexes_numbers_by_shape() {
        assert_eq!(
            kinds("a = 0x1F + 1_000 + 2.5 + 1e3\n")[2..9],
            [
                TokenKind::Integer(31),
                TokenKind::Plus,
                TokenKind::Integer(1000),
                TokenKind::Plus,
                TokenKind::Float("2.5"),
                TokenKind::Plus,
                TokenKind::Float("1e3"),
            ]
        );
    }

    #[test]
    fn lexes_compound_assignment_and_unknown_symbols() {
        let kinds = kinds("x += 1 @ 2\n");
        assert_eq!(kinds[1], TokenKind::CompoundAssign("+="));
        assert_eq!(kinds[3], TokenKind::Unknown("@"));
    }

    #[test]
    fn triple_quoted_strings_span_lines() {
        let tokens = tokenize("\"\"\"\n  Blink\n\"\"\"\nx = 1\n").expect("tokenize");
        assert_eq!(tokens[0].kind, TokenKind::String("\n  Blink\n"));
        let x = tokens
            .iter()
            .find(|token| token.kind == TokenKind::Identifier("x"))
            .expect("x");
        assert_eq!(x.line(), 4);
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize("print(\"hello)\n").expect_err("expected lexing failure");
        assert_eq!(err, LexError::UnterminatedString { line: 1, column: 6 });
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("n = 99999999999999999999999999\n").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid number literal"));
    }
}
