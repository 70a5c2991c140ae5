use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

/// Prints a token stream for `bluec --tokens`.
pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints source-like text instead of Debug
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const BLU: &'static str = "\x1b[34m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for s in tokens {
            println!("{}", self.render(s));
        }
    }

    /// One output line for `s`, without the trailing newline.
    pub fn render(&self, s: &Spanned) -> String {
        let line = s.span.line;
        let col = s.span.col;

        let kind = self.kind(&s.token);
        let colr = if self.color { self.color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        if self.show_debug_repr {
            format!(
                "[{:02}:{:02}] {}{:<8} {:?}{}",
                line, col, colr, kind, s.token, reset
            )
        } else {
            match &s.token {
                Token::Comment(c) => format!(
                    "[{:02}:{:02}] {}{:<8} {}{}",
                    line, col, colr, kind, c, reset
                ),
                Token::Newline | Token::Eof => {
                    format!("[{:02}:{:02}] {}{}{}", line, col, colr, kind, reset)
                }
                other => format!(
                    "[{:02}:{:02}] {}{:<8} {}{}",
                    line, col, colr, kind, other, reset
                ),
            }
        }
    }

    fn kind(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline => "NEWLINE",
            Comment(_) => "COMMENT",
            Eof => "EOF",

            // literals
            Integer(_) | UInteger(_) | BigInteger(_) => "INT",
            Float(_) | BigFloat(_) => "FLOAT",
            String(_) => "STRING",
            ExecString(_) => "EXEC",
            Regex(_) => "REGEX",
            Bool(_) | Null => "LITERAL",

            Ident(_) => "IDENT",

            // structure
            LParen | RParen => "PAREN",
            LBracket | RBracket => "BRACKET",
            LBrace | RBrace => "BRACE",
            Comma | Colon | Semicolon => "PUNCT",

            Assign(_) => "ASSIGN",
            Eq | NotEq | Lt | LtEq | Gt | GtEq => "CMP",
            Plus | Minus | Star | StarStar | Slash | SlashSlash | Percent | Caret | Ampersand
            | Pipe | Tilde | Shl | Shr | Bang | AmpAmp | PipePipe | PlusPlus | MinusMinus
            | DotDot | DotDotLt | Dot | Ellipsis | FatArrow => "OP",

            _ => "KEYWORD",
        }
    }

    fn color(&self, t: &Token) -> &'static str {
        match self.kind(t) {
            "NEWLINE" | "COMMENT" | "EOF" => Self::DIM,
            "STRING" | "EXEC" | "REGEX" => Self::GRN,
            "INT" | "FLOAT" | "LITERAL" => Self::CYN,
            "IDENT" => Self::YEL,
            "OP" | "CMP" | "ASSIGN" => Self::MAG,
            "KEYWORD" => Self::BLU,
            _ => Self::RESET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    #[test]
    fn test_render_pretty_without_color() {
        let tokens = Lexer::new("val x <<= 0x1f").tokenize().unwrap();
        let dumper = TokenDumper::new().no_color().pretty();
        let lines: Vec<String> = tokens.iter().map(|t| dumper.render(t)).collect();
        assert_eq!(lines[0], "[01:01] KEYWORD  val");
        assert_eq!(lines[1], "[01:05] IDENT    x");
        assert_eq!(lines[2], "[01:07] ASSIGN   <<=");
        assert_eq!(lines[3], "[01:11] INT      0x1f");
        assert_eq!(lines[4], "[01:15] EOF");
    }

    #[test]
    fn test_render_debug_repr() {
        let tokens = Lexer::new("1.5").tokenize().unwrap();
        let dumper = TokenDumper::new().no_color();
        assert_eq!(dumper.render(&tokens[0]), "[01:01] FLOAT    Float(1.5)");
    }
}
