use crate::frontend::lexer::Span;

/// A name together with the place it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

impl Identifier {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Identifier {
            name: name.into(),
            span,
        }
    }
}

/// A `{ ... }` statement list.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl Block {
    pub fn new(statements: Vec<Statement>, span: Span) -> Self {
        Block { statements, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Statement { kind, span }
    }

    pub fn expression(expr: Expression) -> Self {
        let span = expr.span;
        Statement::new(StatementKind::Expression(expr), span)
    }

    pub fn var(name: &str, value: Expression, immutable: bool) -> Self {
        let span = value.span;
        Statement::new(
            StatementKind::Var {
                name: Identifier::new(name, span),
                value,
                immutable,
            },
            span,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `var x = e` or `val x = e`. `fun name(..) { }` is parsed into an
    /// immutable `Var` bound to a named function literal.
    Var {
        name: Identifier,
        value: Expression,
        immutable: bool,
    },

    Return(Option<Expression>),

    /// An expression evaluated for effect; its value is popped.
    Expression(Expression),

    For(ForStatement),

    Break,

    Continue,

    Import(ImportStatement),

    /// `try { } catch (e) { }`
    Try {
        body: Block,
        binding: Option<Identifier>,
        handler: Block,
    },

    /// `defer f(x)`; the operand must be a call.
    Defer(Expression),
}

/// The normalised loop form every `for` spelling parses into.
///
/// `for x in xs { }` arrives here with `condition = (x in xs)`; whether that
/// is iteration sugar or a plain membership test is decided at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub init: Option<Box<Statement>>,
    pub condition: Expression,
    pub post: Option<Expression>,
    /// Per-iteration updates run after the body and before `post`.
    pub iterable_setters: Vec<Statement>,
    pub body: Block,
}

/// `import m`, `import m.*` or `import m.{a, b}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    pub module: Identifier,
    pub items: Vec<Identifier>,
    pub all: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Identifier(String),

    // Scalar literals
    Integer(i64),
    UInteger(u64),
    Float(f64),
    BigInteger(String),
    BigFloat(String),
    Boolean(bool),
    Null,
    String(String),
    Regex(String),
    ExecString(String),

    // Composite literals
    List(Vec<Expression>),
    /// Key/value pairs in source order.
    Map(Vec<(Expression, Expression)>),
    Set(Vec<Expression>),

    Prefix {
        operator: PrefixOperator,
        right: Box<Expression>,
    },
    Postfix {
        operator: PostfixOperator,
        target: Box<Expression>,
    },
    Infix {
        operator: InfixOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Assign {
        operator: AssignOperator,
        target: Box<Expression>,
        value: Box<Expression>,
    },

    /// `if c1 { } else if c2 { } else { }`
    If {
        arms: Vec<(Expression, Block)>,
        alternative: Option<Block>,
    },

    Function(FunctionLiteral),

    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
    /// `object.property`
    Member {
        object: Box<Expression>,
        property: Identifier,
    },

    Match {
        subject: Box<Expression>,
        arms: Vec<MatchArm>,
    },
    /// `spawn f(x)`; the operand must be a call.
    Spawn(Box<Expression>),
    /// `eval(e)`
    Eval(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    /// Set for `fun name()` and `var name = fun()` so the body can refer to itself.
    pub name: Option<String>,
    pub parameters: Vec<Identifier>,
    /// The last parameter collects remaining arguments (`fun f(xs...)`).
    pub variadic: bool,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    /// `None` for the `_` arm.
    pub pattern: Option<Expression>,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOperator {
    Minus,
    /// `!` and `not`
    Bang,
    Tilde,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOperator {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Pow,
    Rem,
    BitXor,
    BitAnd,
    BitOr,
    Shl,
    Shr,
    Range,
    NonIncRange,
    In,
    NotIn,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `and` and `&&`
    And,
    /// `or` and `||`
    Or,
}

impl InfixOperator {
    /// Maps an operator literal to its infix form. Returns `None` for text
    /// that has no binary meaning (e.g. `~`).
    pub fn from_literal(literal: &str) -> Option<InfixOperator> {
        let op = match literal {
            "+" => InfixOperator::Add,
            "-" => InfixOperator::Sub,
            "*" => InfixOperator::Mul,
            "/" => InfixOperator::Div,
            "//" => InfixOperator::FloorDiv,
            "**" => InfixOperator::Pow,
            "%" => InfixOperator::Rem,
            "^" => InfixOperator::BitXor,
            "&" => InfixOperator::BitAnd,
            "|" => InfixOperator::BitOr,
            "<<" => InfixOperator::Shl,
            ">>" => InfixOperator::Shr,
            ".." => InfixOperator::Range,
            "..<" => InfixOperator::NonIncRange,
            "in" => InfixOperator::In,
            "notin" => InfixOperator::NotIn,
            "==" => InfixOperator::Eq,
            "!=" => InfixOperator::NotEq,
            "<" => InfixOperator::Lt,
            "<=" => InfixOperator::LtEq,
            ">" => InfixOperator::Gt,
            ">=" => InfixOperator::GtEq,
            "&&" | "and" => InfixOperator::And,
            "||" | "or" => InfixOperator::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn literal(&self) -> &'static str {
        match self {
            InfixOperator::Add => "+",
            InfixOperator::Sub => "-",
            InfixOperator::Mul => "*",
            InfixOperator::Div => "/",
            InfixOperator::FloorDiv => "//",
            InfixOperator::Pow => "**",
            InfixOperator::Rem => "%",
            InfixOperator::BitXor => "^",
            InfixOperator::BitAnd => "&",
            InfixOperator::BitOr => "|",
            InfixOperator::Shl => "<<",
            InfixOperator::Shr => ">>",
            InfixOperator::Range => "..",
            InfixOperator::NonIncRange => "..<",
            InfixOperator::In => "in",
            InfixOperator::NotIn => "notin",
            InfixOperator::Eq => "==",
            InfixOperator::NotEq => "!=",
            InfixOperator::Lt => "<",
            InfixOperator::LtEq => "<=",
            InfixOperator::Gt => ">",
            InfixOperator::GtEq => ">=",
            InfixOperator::And => "&&",
            InfixOperator::Or => "||",
        }
    }
}

/// An assignment operator, kept as its literal (`=`, `+=`, `<<=`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignOperator(pub &'static str);

impl AssignOperator {
    pub const PLAIN: AssignOperator = AssignOperator("=");

    pub fn is_plain(&self) -> bool {
        self.0 == "="
    }

    /// The operator with its trailing `=` removed: `<<=` becomes `<<`.
    pub fn stripped(&self) -> &'static str {
        self.0.strip_suffix('=').unwrap_or(self.0)
    }
}

impl Expression {
    pub fn new(kind: ExpressionKind, span: Span) -> Self {
        Expression { kind, span }
    }

    pub fn identifier(name: impl Into<String>, span: Span) -> Self {
        Expression::new(ExpressionKind::Identifier(name.into()), span)
    }

    pub fn integer(value: i64, span: Span) -> Self {
        Expression::new(ExpressionKind::Integer(value), span)
    }

    pub fn boolean(value: bool, span: Span) -> Self {
        Expression::new(ExpressionKind::Boolean(value), span)
    }

    pub fn infix(operator: InfixOperator, left: Expression, right: Expression) -> Self {
        let span = left.span;
        Expression::new(
            ExpressionKind::Infix {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }

    pub fn assign(operator: AssignOperator, target: Expression, value: Expression) -> Self {
        let span = target.span;
        Expression::new(
            ExpressionKind::Assign {
                operator,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        )
    }

    pub fn call(callee: Expression, arguments: Vec<Expression>) -> Self {
        let span = callee.span;
        Expression::new(
            ExpressionKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        )
    }

    pub fn index(left: Expression, index: Expression) -> Self {
        let span = left.span;
        Expression::new(
            ExpressionKind::Index {
                left: Box::new(left),
                index: Box::new(index),
            },
            span,
        )
    }

    /// The identifier name if this expression is a bare identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}
