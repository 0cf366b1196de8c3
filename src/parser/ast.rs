//! Syntax tree shared by the inferencer and the code generator.
//!
//! The parser builds these nodes once. The inferencer then fills in the
//! slots the parser leaves open (`Binding`, `Signature`, hoisted names) and
//! the generator reads the finished tree.

use crate::kind::Kind;

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Int(i64),
    /// Raw decimal text as written in the source.
    Float(String),
    /// Raw string contents; escapes are passed through.
    Str(String),
    Bool(bool),
}

impl Literal {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Int(_) => Kind::Int,
            Self::Float(_) => Kind::Float,
            Self::Str(_) => Kind::Str,
            Self::Bool(_) => Kind::Bool,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// `callee` is a plain or dotted name such as `delay` or `Serial.begin`.
    Call {
        callee: String,
        args: Vec<Expression>,
    },
    Index {
        name: String,
        index: Box<Expression>,
    },
    List(Vec<Expression>),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Neg,
    Pos,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 1
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Eq | Self::NotEq | Self::Less | Self::LessEq | Self::Greater | Self::GreaterEq => 1,
            Self::Add | Self::Sub => 2,
            Self::Mul | Self::Div | Self::FloorDiv | Self::Mod => 3,
            Self::Pow => 5,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(line: usize, kind: StatementKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum StatementKind {
    FunctionDef(FunctionDef),
    Assignment {
        target: AssignTarget,
        value: Expression,
        annotation: Option<Kind>,
        binding: Binding,
    },
    Conditional {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    CountedLoop {
        var: String,
        range: RangeBounds,
        body: Vec<Statement>,
        binding: Binding,
    },
    Expr(Expression),
    Return(Option<Expression>),
    Global(Vec<String>),
    Comment {
        text: String,
        style: CommentStyle,
    },
    Blank,
    Pass,
    Break,
    Continue,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<Kind>,
    pub body: Vec<Statement>,
    /// `setup` and `loop`, called by the Arduino runtime.
    pub is_entry_point: bool,
    /// Filled in by the inferencer.
    pub signature: Option<Signature>,
    /// Names first assigned inside a nested block, declared at the top of
    /// the function body.
    pub hoisted: Vec<(String, Kind)>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Kind>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Signature {
    pub params: Vec<Kind>,
    pub returns: Kind,
}

/// Assignment target forms accepted by the parser.
#[derive(Debug, PartialEq, Clone)]
pub enum AssignTarget {
    Name(String),
    Index { name: String, index: Expression },
}

/// How an assignment (or a loop variable) relates to earlier bindings.
#[derive(Debug, PartialEq, Clone, Default)]
pub enum Binding {
    #[default]
    Unresolved,
    /// First binding of the name; emitted with its type.
    Declare(Kind),
    /// The name is already declared; emitted as a plain assignment.
    Reassign,
}

/// Arguments of a `range(...)` loop header. The step is always an integer
/// literal so the generator can pick the comparison direction.
#[derive(Debug, PartialEq, Clone)]
pub struct RangeBounds {
    pub start: Option<Expression>,
    pub stop: Expression,
    pub step: i64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommentStyle {
    /// `# text` on its own line.
    Line,
    /// A standalone string literal (docstring).
    Block,
    /// `# text` after a statement or block header on the same line.
    Trailing,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    /// Comments, docstrings and blank lines before the first statement.
    pub header: Vec<Statement>,
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.statements.iter().filter_map(|statement| match &statement.kind {
            StatementKind::FunctionDef(function) => Some(function),
            _ => None,
        })
    }
}
