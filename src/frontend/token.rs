#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    UInteger(u64),
    Float(f64),
    /// Decimal digits of a `123n` literal.
    BigInteger(std::string::String),
    /// Decimal text of a `1.5n` literal.
    BigFloat(std::string::String),
    String(std::string::String),
    /// Backtick command string: `` `ls -l` ``.
    ExecString(std::string::String),
    /// Regex literal: `r/[a-z]+/`.
    Regex(std::string::String),
    Bool(bool),
    Null,

    // Declarations & statements
    Var,
    Val,
    Fun,
    Return,
    If,
    Else,
    For,
    Break,
    Continue,
    Import,
    Match,
    Try,
    Catch,
    Spawn,
    Defer,
    Eval,

    // Membership
    In,
    NotIn,

    // Arithmetic
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,

    // Bitwise
    Caret,
    Ampersand,
    Pipe,
    Tilde,
    Shl,
    Shr,

    // Logic
    Bang,
    AmpAmp,
    PipePipe,
    And,
    Or,
    Not,

    // Comparison
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Assignment: `=` and every compound form, carried as its literal.
    Assign(&'static str),

    // Postfix
    PlusPlus,
    MinusMinus,

    // Ranges and access
    DotDot,
    DotDotLt,
    Dot,
    Ellipsis,
    FatArrow,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,

    Ident(std::string::String),

    // Special
    Comment(std::string::String),
    Newline,
    Eof,
}

impl Token {
    /// Returns true if this token can only begin a statement.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            Token::Var
                | Token::Val
                | Token::Fun
                | Token::Return
                | Token::For
                | Token::Break
                | Token::Continue
                | Token::Import
                | Token::Try
                | Token::Defer
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::UInteger(n) => write!(f, "0x{:x}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::BigInteger(s) => write!(f, "{}n", s),
            Token::BigFloat(s) => write!(f, "{}n", s),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::ExecString(s) => write!(f, "`{}`", s),
            Token::Regex(s) => write!(f, "r/{}/", s),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Null => write!(f, "null"),
            Token::Var => write!(f, "var"),
            Token::Val => write!(f, "val"),
            Token::Fun => write!(f, "fun"),
            Token::Return => write!(f, "return"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::For => write!(f, "for"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Import => write!(f, "import"),
            Token::Match => write!(f, "match"),
            Token::Try => write!(f, "try"),
            Token::Catch => write!(f, "catch"),
            Token::Spawn => write!(f, "spawn"),
            Token::Defer => write!(f, "defer"),
            Token::Eval => write!(f, "eval"),
            Token::In => write!(f, "in"),
            Token::NotIn => write!(f, "notin"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::StarStar => write!(f, "**"),
            Token::Slash => write!(f, "/"),
            Token::SlashSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::Caret => write!(f, "^"),
            Token::Ampersand => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Tilde => write!(f, "~"),
            Token::Shl => write!(f, "<<"),
            Token::Shr => write!(f, ">>"),
            Token::Bang => write!(f, "!"),
            Token::AmpAmp => write!(f, "&&"),
            Token::PipePipe => write!(f, "||"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::Eq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::Assign(op) => write!(f, "{}", op),
            Token::PlusPlus => write!(f, "++"),
            Token::MinusMinus => write!(f, "--"),
            Token::DotDot => write!(f, ".."),
            Token::DotDotLt => write!(f, "..<"),
            Token::Dot => write!(f, "."),
            Token::Ellipsis => write!(f, "..."),
            Token::FatArrow => write!(f, "=>"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Comment(s) => write!(f, "# {}", s),
            Token::Newline => write!(f, "\\n"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}
