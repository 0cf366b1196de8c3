#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Integer(i64),
    /// Raw text of a decimal literal, echoed as written.
    Float(&'a str),
    /// Raw contents between the quotes, escapes left untouched.
    String(&'a str),
    True,
    False,
    None,

    // Keywords
    Def,
    If,
    Elif,
    Else,
    For,
    In,
    While,
    Return,
    Pass,
    Global,
    Break,
    Continue,
    And,
    Or,
    Not,
    Is,

    // Operators
    Equal,        // =
    EqualEqual,   // ==
    NotEqual,     // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Plus,         // +
    Minus,        // -
    Star,         // *
    DoubleStar,   // **
    Slash,        // /
    DoubleSlash,  // //
    Percent,      // %
    Arrow,        // ->
    /// `+=`, `-=`, `//=` and the other augmented assignments.
    CompoundAssign(&'a str),
    /// Symbols with no meaning in the input language (`@`, `&`, `;`, ...).
    Unknown(&'a str),

    // Delimiters
    Colon,    // :
    Comma,    // ,
    Dot,      // .
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }

    // Trivia kept for the output
    /// Text after `#`, either on its own line or after a statement.
    Comment(&'a str),
    BlankLine,

    // Structural
    Newline,
    Indent,
    Dedent,
    EOF,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }
}
