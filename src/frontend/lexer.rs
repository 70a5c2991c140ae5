use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frontend::token::Token;

/// 1-based source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Span { line, col }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Clone, Error)]
#[error("{line}:{col}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

/// Operators ordered longest first so that a greedy scan picks `<<=` over `<<`
/// and `..<` over `..`.
const OPERATORS: &[(&str, Token)] = &[
    ("...", Token::Ellipsis),
    ("..<", Token::DotDotLt),
    ("**=", Token::Assign("**=")),
    ("//=", Token::Assign("//=")),
    ("<<=", Token::Assign("<<=")),
    (">>=", Token::Assign(">>=")),
    ("&&=", Token::Assign("&&=")),
    ("||=", Token::Assign("||=")),
    ("..", Token::DotDot),
    ("=>", Token::FatArrow),
    ("==", Token::Eq),
    ("!=", Token::NotEq),
    ("<=", Token::LtEq),
    (">=", Token::GtEq),
    ("<<", Token::Shl),
    (">>", Token::Shr),
    ("&&", Token::AmpAmp),
    ("||", Token::PipePipe),
    ("++", Token::PlusPlus),
    ("--", Token::MinusMinus),
    ("**", Token::StarStar),
    ("//", Token::SlashSlash),
    ("+=", Token::Assign("+=")),
    ("-=", Token::Assign("-=")),
    ("*=", Token::Assign("*=")),
    ("/=", Token::Assign("/=")),
    ("&=", Token::Assign("&=")),
    ("|=", Token::Assign("|=")),
    ("~=", Token::Assign("~=")),
    ("%=", Token::Assign("%=")),
    ("^=", Token::Assign("^=")),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Star),
    ("/", Token::Slash),
    ("%", Token::Percent),
    ("^", Token::Caret),
    ("&", Token::Ampersand),
    ("|", Token::Pipe),
    ("~", Token::Tilde),
    ("!", Token::Bang),
    ("<", Token::Lt),
    (">", Token::Gt),
    ("=", Token::Assign("=")),
    (".", Token::Dot),
    ("(", Token::LParen),
    (")", Token::RParen),
    ("[", Token::LBracket),
    ("]", Token::RBracket),
    ("{", Token::LBrace),
    ("}", Token::RBrace),
    (",", Token::Comma),
    (":", Token::Colon),
    (";", Token::Semicolon),
];

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error_at(&self, message: impl Into<String>, span: Span) -> LexerError {
        LexerError {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, ch)| self.source.get(self.pos + i) == Some(&ch))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_comment(&mut self) -> Token {
        self.advance();
        let mut comment = String::new();
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            comment.push(ch);
            self.advance();
        }
        Token::Comment(comment.trim().to_string())
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        self.advance();

        let mut string = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(string));
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => string.push('\n'),
                        Some('t') => string.push('\t'),
                        Some('r') => string.push('\r'),
                        Some('\\') => string.push('\\'),
                        Some('"') => string.push('"'),
                        Some('0') => string.push('\0'),
                        Some(ch) => {
                            return Err(self.error_at(
                                format!("unknown escape sequence: \\{}", ch),
                                self.span(),
                            ));
                        }
                        None => {
                            return Err(
                                self.error_at("unexpected EOF in escape sequence", self.span())
                            );
                        }
                    }
                    self.advance();
                }
                Some('\n') => {
                    return Err(self.error_at(
                        "unterminated string (newline before closing quote)",
                        start,
                    ));
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
                None => return Err(self.error_at("unterminated string literal", start)),
            }
        }
    }

    /// Reads raw text up to `close`, used by exec strings and regex literals.
    fn read_raw_until(&mut self, close: char, what: &str) -> Result<String, LexerError> {
        let start = self.span();
        let mut text = String::new();
        loop {
            match self.current() {
                Some(ch) if ch == close => {
                    self.advance();
                    return Ok(text);
                }
                Some('\\') if self.peek() == Some(close) => {
                    self.advance();
                    self.advance();
                    text.push(close);
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
                None => return Err(self.error_at(format!("unterminated {}", what), start)),
            }
        }
    }

    fn read_digits(&mut self, radix: u32) -> String {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_digit(radix) {
                digits.push(ch);
                self.advance();
            } else if ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        digits
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start = self.span();

        // 0x.. / 0o.. / 0b.. are unsigned
        if self.current() == Some('0') {
            let radix = match self.peek() {
                Some('x') | Some('X') => Some((16, "hex")),
                Some('o') | Some('O') => Some((8, "octal")),
                Some('b') | Some('B') => Some((2, "binary")),
                _ => None,
            };
            if let Some((radix, name)) = radix {
                self.advance();
                self.advance();
                let digits = self.read_digits(radix);
                if digits.is_empty() {
                    return Err(self.error_at(format!("expected {} digits", name), start));
                }
                let value = u64::from_str_radix(&digits, radix).map_err(|_| {
                    self.error_at(format!("invalid {} number: {}", name, digits), start)
                })?;
                return Ok(Token::UInteger(value));
            }
        }

        let mut digits = self.read_digits(10);
        let mut is_float = false;

        // Only treat '.' as a decimal point if followed by a digit, so `1..10` stays a range
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            digits.push('.');
            digits.push_str(&self.read_digits(10));
        }

        if matches!(self.current(), Some('e') | Some('E')) {
            let next = self.peek();
            let signed = matches!(next, Some('+') | Some('-'))
                && self
                    .source
                    .get(self.pos + 2)
                    .is_some_and(|c| c.is_ascii_digit());
            if signed || next.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                digits.push('e');
                self.advance();
                if signed {
                    if let Some(sign) = self.advance() {
                        digits.push(sign);
                    }
                }
                digits.push_str(&self.read_digits(10));
            }
        }

        if self.current() == Some('n') {
            self.advance();
            return Ok(if is_float {
                Token::BigFloat(digits)
            } else {
                Token::BigInteger(digits)
            });
        }

        if is_float {
            let value: f64 = digits
                .parse()
                .map_err(|_| self.error_at(format!("invalid float: {}", digits), start))?;
            Ok(Token::Float(value))
        } else {
            let value: i64 = digits.parse().map_err(|_| {
                self.error_at(format!("integer literal out of range: {}", digits), start)
            })?;
            Ok(Token::Integer(value))
        }
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "null" => Token::Null,
            "var" => Token::Var,
            "val" => Token::Val,
            "fun" => Token::Fun,
            "return" => Token::Return,
            "if" => Token::If,
            "else" => Token::Else,
            "for" => Token::For,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "import" => Token::Import,
            "match" => Token::Match,
            "try" => Token::Try,
            "catch" => Token::Catch,
            "spawn" => Token::Spawn,
            "defer" => Token::Defer,
            "eval" => Token::Eval,
            "in" => Token::In,
            "notin" => Token::NotIn,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Ident(ident),
        }
    }

    fn read_operator(&mut self) -> Option<Token> {
        let (text, token) = OPERATORS.iter().find(|(text, _)| self.starts_with(text))?;
        for _ in 0..text.chars().count() {
            self.advance();
        }
        Some(token.clone())
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let span = self.span();

            let token = match self.current() {
                None => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        span,
                    });
                    break;
                }
                Some('\n') => {
                    self.advance();
                    Token::Newline
                }
                Some('#') => self.read_comment(),
                Some('"') => self.read_string()?,
                Some('`') => {
                    self.advance();
                    Token::ExecString(self.read_raw_until('`', "execution string")?)
                }
                // `r/` always opens a regex literal; write `r / x` for division
                Some('r') if self.peek() == Some('/') => {
                    self.advance();
                    self.advance();
                    Token::Regex(self.read_raw_until('/', "regex literal")?)
                }
                Some(ch) if ch.is_ascii_digit() => self.read_number()?,
                Some(ch) if ch.is_alphabetic() || ch == '_' => self.read_identifier(),
                Some(ch) => match self.read_operator() {
                    Some(token) => token,
                    None => {
                        return Err(
                            self.error_at(format!("unexpected character: '{}'", ch), span)
                        );
                    }
                },
            };

            tokens.push(Spanned { token, span });
        }

        Ok(tokens)
    }

    pub fn tokenize_clean(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let tokens = self.tokenize()?;
        Ok(tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_) | Token::Newline))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        lexer
            .tokenize_clean()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("1 1.0 0x05 0o17 0b101 1_000"),
            vec![
                Token::Integer(1),
                Token::Float(1.0),
                Token::UInteger(5),
                Token::UInteger(15),
                Token::UInteger(5),
                Token::Integer(1000),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_big_numbers() {
        assert_eq!(
            tokens("123456789012345678901234567890n 1.5n"),
            vec![
                Token::BigInteger("123456789012345678901234567890".to_string()),
                Token::BigFloat("1.5".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_range_is_not_a_float() {
        assert_eq!(
            tokens("1..10 1..<3"),
            vec![
                Token::Integer(1),
                Token::DotDot,
                Token::Integer(10),
                Token::Integer(1),
                Token::DotDotLt,
                Token::Integer(3),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_compound_assignment_operators_are_greedy() {
        assert_eq!(
            tokens("x <<= 1 y //= 2 z ~= 3 w ||= q"),
            vec![
                Token::Ident("x".into()),
                Token::Assign("<<="),
                Token::Integer(1),
                Token::Ident("y".into()),
                Token::Assign("//="),
                Token::Integer(2),
                Token::Ident("z".into()),
                Token::Assign("~="),
                Token::Integer(3),
                Token::Ident("w".into()),
                Token::Assign("||="),
                Token::Ident("q".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("var val fun __index_x notin null"),
            vec![
                Token::Var,
                Token::Val,
                Token::Fun,
                Token::Ident("__index_x".into()),
                Token::NotIn,
                Token::Null,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_exec_string_and_regex() {
        assert_eq!(
            tokens("`ls -l` r/[a-z]+\\/x/"),
            vec![
                Token::ExecString("ls -l".into()),
                Token::Regex("[a-z]+/x".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_comments_are_filtered() {
        assert_eq!(
            tokens("1 # one\n2"),
            vec![Token::Integer(1), Token::Integer(2), Token::Eof]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\tb\n""#),
            vec![Token::String("a\tb\n".into()), Token::Eof]
        );
    }

    #[test]
    fn test_unterminated_string_reports_start() {
        let err = Lexer::new("x = \"abc").tokenize().unwrap_err();
        assert_eq!((err.line, err.col), (1, 5));
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("1 @ 2").tokenize().unwrap_err();
        assert_eq!(err.to_string(), "1:3: unexpected character: '@'");
    }

    #[test]
    fn test_spans_track_lines() {
        let spanned = Lexer::new("a\n  b").tokenize_clean().unwrap();
        assert_eq!(spanned[0].span, Span::new(1, 1));
        assert_eq!(spanned[1].span, Span::new(2, 3));
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let err = Lexer::new("99999999999999999999").tokenize().unwrap_err();
        assert!(err.message.contains("out of range"));
    }
}
