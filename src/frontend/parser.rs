use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::{ParseErrors, ParserError};
use crate::frontend::token::Token;
use crate::lang::{
    AssignOperator, Block, Expression, ExpressionKind, ForStatement, FunctionLiteral, Identifier,
    ImportStatement, InfixOperator, MatchArm, PostfixOperator, PrefixOperator, Program, Statement,
    StatementKind,
};

static EOF_TOKEN: Token = Token::Eof;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Assign,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equals,
    Compare,
    Range,
    Shift,
    Sum,
    Product,
    Power,
    Prefix,
    Postfix,
    Call,
}

fn infix_precedence(token: &Token) -> Precedence {
    match token {
        Token::Assign(_) => Precedence::Assign,
        Token::PipePipe | Token::Or => Precedence::Or,
        Token::AmpAmp | Token::And => Precedence::And,
        Token::Pipe => Precedence::BitOr,
        Token::Caret => Precedence::BitXor,
        Token::Ampersand => Precedence::BitAnd,
        Token::Eq | Token::NotEq => Precedence::Equals,
        Token::Lt | Token::Gt | Token::LtEq | Token::GtEq | Token::In | Token::NotIn => {
            Precedence::Compare
        }
        Token::DotDot | Token::DotDotLt => Precedence::Range,
        Token::Shl | Token::Shr => Precedence::Shift,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Star | Token::Slash | Token::SlashSlash | Token::Percent => Precedence::Product,
        Token::StarStar => Precedence::Power,
        Token::PlusPlus | Token::MinusMinus => Precedence::Postfix,
        Token::LParen | Token::LBracket | Token::Dot => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

fn binary_operator(token: &Token) -> Option<InfixOperator> {
    let op = match token {
        Token::Plus => InfixOperator::Add,
        Token::Minus => InfixOperator::Sub,
        Token::Star => InfixOperator::Mul,
        Token::Slash => InfixOperator::Div,
        Token::SlashSlash => InfixOperator::FloorDiv,
        Token::StarStar => InfixOperator::Pow,
        Token::Percent => InfixOperator::Rem,
        Token::Caret => InfixOperator::BitXor,
        Token::Ampersand => InfixOperator::BitAnd,
        Token::Pipe => InfixOperator::BitOr,
        Token::Shl => InfixOperator::Shl,
        Token::Shr => InfixOperator::Shr,
        Token::DotDot => InfixOperator::Range,
        Token::DotDotLt => InfixOperator::NonIncRange,
        Token::In => InfixOperator::In,
        Token::NotIn => InfixOperator::NotIn,
        Token::Eq => InfixOperator::Eq,
        Token::NotEq => InfixOperator::NotEq,
        Token::Lt => InfixOperator::Lt,
        Token::LtEq => InfixOperator::LtEq,
        Token::Gt => InfixOperator::Gt,
        Token::GtEq => InfixOperator::GtEq,
        Token::AmpAmp | Token::And => InfixOperator::And,
        Token::PipePipe | Token::Or => InfixOperator::Or,
        _ => return None,
    };
    Some(op)
}

/// Recursive-descent (Pratt) parser for Blue.
///
/// Notes:
/// - Comments and newlines are filtered out in `Parser::new`; statements may
///   be separated by an optional `;`.
/// - Call parentheses, index brackets and postfix `++`/`--` only bind to the
///   preceding expression when they start on the same line, so a new line that
///   opens with `(` or `[` begins a new statement.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token.
    ///
    /// Used to provide stable source locations for errors that occur after
    /// advancing past the last token or at end-of-file.
    last_span: Option<Span>,
}

impl Parser {
    /// Creates a new parser from lexer output.
    pub fn new(tokens: Vec<Spanned>) -> Self {
        let tokens: Vec<Spanned> = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_) | Token::Newline))
            .collect();
        Parser {
            tokens,
            pos: 0,
            last_span: None,
        }
    }

    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if let Some(s) = &token {
            self.last_span = Some(s.span);
        }
        self.pos += 1;
        token
    }

    /// Peeks the current token kind without consuming it.
    fn peek(&self) -> &Token {
        self.current().map(|s| &s.token).unwrap_or(&EOF_TOKEN)
    }

    /// Peeks the next token kind without consuming anything.
    fn peek_next(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|s| &s.token)
            .unwrap_or(&EOF_TOKEN)
    }

    /// Span of the current token, falling back to the last consumed one.
    fn span(&self) -> Span {
        self.current()
            .map(|s| s.span)
            .or(self.last_span)
            .unwrap_or(Span::new(1, 1))
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// True when the current token sits on the line the previous token ended on.
    fn on_same_line(&self) -> bool {
        match (self.current(), self.last_span) {
            (Some(cur), Some(last)) => cur.span.line == last.line,
            _ => false,
        }
    }

    /// Constructs a `ParserError` at the most relevant location.
    ///
    /// Priority:
    /// 1. If `current()` exists, use its span.
    /// 2. Else, use `last_span` (e.g. after falling off the end).
    /// 3. Else, default to (1,1) for truly empty input.
    fn error(&self, message: &str) -> ParserError {
        let span = self.span();
        ParserError {
            message: message.to_string(),
            line: span.line,
            col: span.col,
        }
    }

    fn expect(&mut self, token: Token, context: &str) -> Result<Span, ParserError> {
        if self.at(&token) {
            let span = self.span();
            self.advance();
            Ok(span)
        } else {
            Err(self.error(&format!(
                "expected '{}' {}, found '{}'",
                token,
                context,
                self.peek()
            )))
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<Identifier, ParserError> {
        let span = self.span();
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(Identifier::new(name, span))
            }
            other => Err(self.error(&format!(
                "expected identifier {}, found '{}'",
                context, other
            ))),
        }
    }

    /// Parses a complete Blue program.
    ///
    /// Errors do not stop the parse: the parser records them, skips to the
    /// next statement boundary and continues, so every mistake is reported.
    pub fn parse(&mut self) -> Result<Program, ParseErrors> {
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        while !self.at(&Token::Eof) {
            if self.eat(&Token::Semicolon) {
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    errors.push(err);
                    self.synchronize();
                }
            }
        }

        if errors.is_empty() {
            Ok(Program::new(statements))
        } else {
            Err(ParseErrors(errors))
        }
    }

    /// Skips tokens until something that can begin a fresh statement.
    fn synchronize(&mut self) {
        let start = self.pos;
        while !self.at(&Token::Eof) {
            if self.eat(&Token::Semicolon) {
                return;
            }
            if self.pos > start && self.peek().starts_statement() {
                return;
            }
            self.advance();
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParserError> {
        let span = self.span();
        let kind = match self.peek() {
            Token::Var | Token::Val => self.parse_var()?,
            Token::Fun if matches!(self.peek_next(), Token::Ident(_)) => {
                self.parse_function_statement()?
            }
            Token::Return => self.parse_return()?,
            Token::For => StatementKind::For(self.parse_for()?),
            Token::Break => {
                self.advance();
                StatementKind::Break
            }
            Token::Continue => {
                self.advance();
                StatementKind::Continue
            }
            Token::Import => self.parse_import()?,
            Token::Try => self.parse_try()?,
            Token::Defer => {
                self.advance();
                StatementKind::Defer(self.parse_expression(Precedence::Lowest)?)
            }
            _ => StatementKind::Expression(self.parse_expression(Precedence::Lowest)?),
        };
        self.eat(&Token::Semicolon);
        Ok(Statement::new(kind, span))
    }

    /// ```text
    /// var <name> = <expr>
    /// val <name> = <expr>
    /// ```
    fn parse_var(&mut self) -> Result<StatementKind, ParserError> {
        let immutable = matches!(self.advance().map(|s| s.token), Some(Token::Val));
        let name = self.expect_ident("after 'var'/'val'")?;
        self.expect(Token::Assign("="), "after variable name")?;
        let mut value = self.parse_expression(Precedence::Lowest)?;
        if let ExpressionKind::Function(literal) = &mut value.kind {
            if literal.name.is_none() {
                literal.name = Some(name.name.clone());
            }
        }
        Ok(StatementKind::Var {
            name,
            value,
            immutable,
        })
    }

    /// `fun name(params) { body }` binds an immutable name to a named literal.
    fn parse_function_statement(&mut self) -> Result<StatementKind, ParserError> {
        let span = self.span();
        self.advance(); // consume 'fun'
        let name = self.expect_ident("after 'fun'")?;
        let mut literal = self.parse_function_rest()?;
        literal.name = Some(name.name.clone());
        Ok(StatementKind::Var {
            name,
            value: Expression::new(ExpressionKind::Function(literal), span),
            immutable: true,
        })
    }

    fn parse_return(&mut self) -> Result<StatementKind, ParserError> {
        self.advance(); // consume 'return'
        let ends = matches!(
            self.peek(),
            Token::Semicolon | Token::RBrace | Token::Eof
        ) || !self.on_same_line();
        if ends {
            Ok(StatementKind::Return(None))
        } else {
            Ok(StatementKind::Return(Some(
                self.parse_expression(Precedence::Lowest)?,
            )))
        }
    }

    /// Parses every `for` spelling into a `ForStatement`:
    ///
    /// ```text
    /// for { }                          # forever
    /// for cond { }
    /// for x in xs { }                  # condition is `x in xs`
    /// for [a, b] in xs { }
    /// for (init; cond; post, more) { }
    /// ```
    ///
    /// Parentheses around the header are optional.
    fn parse_for(&mut self) -> Result<ForStatement, ParserError> {
        let span = self.span();
        self.advance(); // consume 'for'

        if self.at(&Token::LBrace) {
            let body = self.parse_block()?;
            return Ok(ForStatement {
                init: None,
                condition: Expression::boolean(true, span),
                post: None,
                iterable_setters: Vec::new(),
                body,
            });
        }

        let parenthesized = self.eat(&Token::LParen);
        let header = self.parse_for_header(span)?;
        if parenthesized {
            self.expect(Token::RParen, "to close the for header")?;
        }
        let body = self.parse_block()?;

        let (init, condition, mut posts) = header;
        let post = if posts.is_empty() {
            None
        } else {
            Some(posts.remove(0))
        };
        Ok(ForStatement {
            init,
            condition,
            post,
            iterable_setters: posts.into_iter().map(Statement::expression).collect(),
            body,
        })
    }

    #[allow(clippy::type_complexity)]
    fn parse_for_header(
        &mut self,
        span: Span,
    ) -> Result<(Option<Box<Statement>>, Expression, Vec<Expression>), ParserError> {
        let init = if self.at(&Token::Semicolon) {
            None
        } else if matches!(self.peek(), Token::Var | Token::Val) {
            let init_span = self.span();
            Some(Statement::new(self.parse_var()?, init_span))
        } else {
            let expr = self.parse_expression(Precedence::Lowest)?;
            if !self.at(&Token::Semicolon) {
                // while-style: the expression is the condition
                return Ok((None, expr, Vec::new()));
            }
            Some(Statement::expression(expr))
        };

        self.expect(Token::Semicolon, "after for initializer")?;
        let condition = if self.at(&Token::Semicolon) {
            Expression::boolean(true, span)
        } else {
            self.parse_expression(Precedence::Lowest)?
        };
        self.expect(Token::Semicolon, "after for condition")?;

        let mut posts = Vec::new();
        while !matches!(self.peek(), Token::RParen | Token::LBrace | Token::Eof) {
            posts.push(self.parse_expression(Precedence::Lowest)?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok((init.map(Box::new), condition, posts))
    }

    /// ```text
    /// import math
    /// import math.*
    /// import math.{sqrt, floor}
    /// ```
    fn parse_import(&mut self) -> Result<StatementKind, ParserError> {
        self.advance(); // consume 'import'
        let module = self.expect_ident("after 'import'")?;
        let mut items = Vec::new();
        let mut all = false;

        if self.eat(&Token::Dot) {
            if self.eat(&Token::Star) {
                all = true;
            } else if self.eat(&Token::LBrace) {
                while !self.at(&Token::RBrace) {
                    items.push(self.expect_ident("in import list")?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBrace, "to close the import list")?;
            } else {
                return Err(self.error("expected '*' or '{' after 'import <module>.'"));
            }
        }

        Ok(StatementKind::Import(ImportStatement { module, items, all }))
    }

    /// `try { } catch (e) { }`, the binding and its parentheses are optional.
    fn parse_try(&mut self) -> Result<StatementKind, ParserError> {
        self.advance(); // consume 'try'
        let body = self.parse_block()?;
        self.expect(Token::Catch, "after try block")?;

        let binding = if self.eat(&Token::LParen) {
            let ident = self.expect_ident("in catch clause")?;
            self.expect(Token::RParen, "after catch binding")?;
            Some(ident)
        } else if matches!(self.peek(), Token::Ident(_)) {
            Some(self.expect_ident("in catch clause")?)
        } else {
            None
        };

        let handler = self.parse_block()?;
        Ok(StatementKind::Try {
            body,
            binding,
            handler,
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParserError> {
        let span = self.expect(Token::LBrace, "to open a block")?;
        let mut statements = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at(&Token::Eof) {
                return Err(self.error("unexpected EOF, expected '}'"));
            }
            if self.eat(&Token::Semicolon) {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        self.advance(); // consume '}'
        Ok(Block::new(statements, span))
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression, ParserError> {
        let mut left = self.parse_prefix()?;

        loop {
            let next = infix_precedence(self.peek());
            if next <= precedence {
                break;
            }
            let postfix_like = matches!(
                self.peek(),
                Token::LParen | Token::LBracket | Token::PlusPlus | Token::MinusMinus
            );
            if postfix_like && !self.on_same_line() {
                break;
            }
            left = self.parse_infix(left)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expression, ParserError> {
        let span = self.span();
        let token = self.peek().clone();

        let kind = match token {
            Token::Ident(name) => {
                self.advance();
                ExpressionKind::Identifier(name)
            }
            Token::Integer(n) => {
                self.advance();
                ExpressionKind::Integer(n)
            }
            Token::UInteger(n) => {
                self.advance();
                ExpressionKind::UInteger(n)
            }
            Token::Float(n) => {
                self.advance();
                ExpressionKind::Float(n)
            }
            Token::BigInteger(digits) => {
                self.advance();
                ExpressionKind::BigInteger(digits)
            }
            Token::BigFloat(text) => {
                self.advance();
                ExpressionKind::BigFloat(text)
            }
            Token::String(s) => {
                self.advance();
                ExpressionKind::String(s)
            }
            Token::Regex(s) => {
                self.advance();
                ExpressionKind::Regex(s)
            }
            Token::ExecString(s) => {
                self.advance();
                ExpressionKind::ExecString(s)
            }
            Token::Bool(b) => {
                self.advance();
                ExpressionKind::Boolean(b)
            }
            Token::Null => {
                self.advance();
                ExpressionKind::Null
            }
            Token::LBracket => {
                self.advance();
                ExpressionKind::List(self.parse_expression_list(Token::RBracket)?)
            }
            Token::LBrace => self.parse_brace_literal()?,
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression(Precedence::Lowest)?;
                self.expect(Token::RParen, "to close group")?;
                return Ok(inner);
            }
            Token::Minus | Token::Bang | Token::Not | Token::Tilde => {
                self.advance();
                let operator = match token {
                    Token::Minus => PrefixOperator::Minus,
                    Token::Tilde => PrefixOperator::Tilde,
                    _ => PrefixOperator::Bang,
                };
                let right = self.parse_expression(Precedence::Prefix)?;
                ExpressionKind::Prefix {
                    operator,
                    right: Box::new(right),
                }
            }
            Token::If => self.parse_if()?,
            Token::Fun => {
                self.advance();
                let name = if let Token::Ident(name) = self.peek().clone() {
                    self.advance();
                    Some(name)
                } else {
                    None
                };
                let mut literal = self.parse_function_rest()?;
                literal.name = name;
                ExpressionKind::Function(literal)
            }
            Token::Match => self.parse_match()?,
            Token::Spawn => {
                self.advance();
                ExpressionKind::Spawn(Box::new(self.parse_expression(Precedence::Prefix)?))
            }
            Token::Eval => {
                self.advance();
                ExpressionKind::Eval(Box::new(self.parse_expression(Precedence::Prefix)?))
            }
            other => return Err(self.error(&format!("unexpected token: '{}'", other))),
        };

        Ok(Expression::new(kind, span))
    }

    fn parse_infix(&mut self, left: Expression) -> Result<Expression, ParserError> {
        let span = left.span;
        let token = self.peek().clone();
        let precedence = infix_precedence(&token);

        let kind = match token {
            Token::Assign(literal) => {
                self.advance();
                // right-associative: `a = b = c`
                let value = self.parse_expression(Precedence::Lowest)?;
                ExpressionKind::Assign {
                    operator: AssignOperator(literal),
                    target: Box::new(left),
                    value: Box::new(value),
                }
            }
            Token::PlusPlus | Token::MinusMinus => {
                self.advance();
                ExpressionKind::Postfix {
                    operator: if token == Token::PlusPlus {
                        PostfixOperator::Increment
                    } else {
                        PostfixOperator::Decrement
                    },
                    target: Box::new(left),
                }
            }
            Token::LParen => {
                self.advance();
                ExpressionKind::Call {
                    callee: Box::new(left),
                    arguments: self.parse_expression_list(Token::RParen)?,
                }
            }
            Token::LBracket => {
                self.advance();
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect(Token::RBracket, "to close index")?;
                ExpressionKind::Index {
                    left: Box::new(left),
                    index: Box::new(index),
                }
            }
            Token::Dot => {
                self.advance();
                let property = self.expect_ident("after '.'")?;
                ExpressionKind::Member {
                    object: Box::new(left),
                    property,
                }
            }
            other => {
                let operator = binary_operator(&other)
                    .ok_or_else(|| self.error(&format!("unexpected operator: '{}'", other)))?;
                self.advance();
                // `**` is right-associative
                let right_precedence = if operator == InfixOperator::Pow {
                    Precedence::Product
                } else {
                    precedence
                };
                let right = self.parse_expression(right_precedence)?;
                ExpressionKind::Infix {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        };

        Ok(Expression::new(kind, span))
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_expression_list(&mut self, close: Token) -> Result<Vec<Expression>, ParserError> {
        let mut items = Vec::new();
        while !self.at(&close) {
            if self.at(&Token::Eof) {
                return Err(self.error(&format!("unexpected EOF, expected '{}'", close)));
            }
            items.push(self.parse_expression(Precedence::Lowest)?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close, "to close list")?;
        Ok(items)
    }

    /// `{}` is an empty map, `{k: v, ...}` a map and `{a, b}` a set.
    fn parse_brace_literal(&mut self) -> Result<ExpressionKind, ParserError> {
        self.advance(); // consume '{'
        if self.eat(&Token::RBrace) {
            return Ok(ExpressionKind::Map(Vec::new()));
        }

        let first = self.parse_expression(Precedence::Lowest)?;
        if self.eat(&Token::Colon) {
            let value = self.parse_expression(Precedence::Lowest)?;
            let mut pairs = vec![(first, value)];
            while self.eat(&Token::Comma) {
                if self.at(&Token::RBrace) {
                    break;
                }
                let key = self.parse_expression(Precedence::Lowest)?;
                self.expect(Token::Colon, "between map key and value")?;
                let value = self.parse_expression(Precedence::Lowest)?;
                pairs.push((key, value));
            }
            self.expect(Token::RBrace, "to close map")?;
            Ok(ExpressionKind::Map(pairs))
        } else {
            let mut items = vec![first];
            while self.eat(&Token::Comma) {
                if self.at(&Token::RBrace) {
                    break;
                }
                items.push(self.parse_expression(Precedence::Lowest)?);
            }
            self.expect(Token::RBrace, "to close set")?;
            Ok(ExpressionKind::Set(items))
        }
    }

    fn parse_if(&mut self) -> Result<ExpressionKind, ParserError> {
        self.advance(); // consume 'if'
        let mut arms = Vec::new();
        let condition = self.parse_expression(Precedence::Lowest)?;
        arms.push((condition, self.parse_block()?));

        let mut alternative = None;
        while self.eat(&Token::Else) {
            if self.eat(&Token::If) {
                let condition = self.parse_expression(Precedence::Lowest)?;
                arms.push((condition, self.parse_block()?));
            } else {
                alternative = Some(self.parse_block()?);
                break;
            }
        }

        Ok(ExpressionKind::If { arms, alternative })
    }

    /// Parameters and body of a function literal, after `fun [name]`.
    fn parse_function_rest(&mut self) -> Result<FunctionLiteral, ParserError> {
        self.expect(Token::LParen, "to open parameter list")?;
        let mut parameters = Vec::new();
        let mut variadic = false;
        while !self.at(&Token::RParen) {
            parameters.push(self.expect_ident("in parameter list")?);
            if self.eat(&Token::Ellipsis) {
                variadic = true;
                break;
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, "to close parameter list")?;
        let body = self.parse_block()?;
        Ok(FunctionLiteral {
            name: None,
            parameters,
            variadic,
            body,
        })
    }

    /// ```text
    /// match subject {
    ///     1 => "one",
    ///     "two" => { 2 }
    ///     _ => null
    /// }
    /// ```
    fn parse_match(&mut self) -> Result<ExpressionKind, ParserError> {
        self.advance(); // consume 'match'
        let subject = self.parse_expression(Precedence::Lowest)?;
        self.expect(Token::LBrace, "to open match arms")?;

        let mut arms = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at(&Token::Eof) {
                return Err(self.error("unexpected EOF, expected '}'"));
            }
            let pattern = match self.peek() {
                Token::Ident(name) if name == "_" => {
                    self.advance();
                    None
                }
                _ => Some(self.parse_expression(Precedence::Lowest)?),
            };
            self.expect(Token::FatArrow, "after match pattern")?;
            let body = if self.at(&Token::LBrace) {
                self.parse_block()?
            } else {
                let expr = self.parse_expression(Precedence::Lowest)?;
                let span = expr.span;
                Block::new(vec![Statement::expression(expr)], span)
            };
            arms.push(MatchArm { pattern, body });
            self.eat(&Token::Comma);
        }
        self.advance(); // consume '}'

        Ok(ExpressionKind::Match {
            subject: Box::new(subject),
            arms,
        })
    }
}

/// Lexes and parses `source` in one step.
pub fn parse_source(source: &str) -> Result<Program, ParseErrors> {
    let tokens = crate::frontend::lexer::Lexer::new(source)
        .tokenize()
        .map_err(|e| {
            ParseErrors(vec![ParserError {
                message: e.message,
                line: e.line,
                col: e.col,
            }])
        })?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        parse_source(source).unwrap()
    }

    fn parse_err(source: &str) -> ParseErrors {
        parse_source(source).unwrap_err()
    }

    fn only_expression(program: &Program) -> &Expression {
        match &program.statements[..] {
            [Statement {
                kind: StatementKind::Expression(expr),
                ..
            }] => expr,
            other => panic!("expected a single expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_literal() {
        let program = parse("1");
        assert!(matches!(
            only_expression(&program).kind,
            ExpressionKind::Integer(1)
        ));
    }

    #[test]
    fn test_precedence_product_over_sum() {
        let program = parse("1 + 2 * 3");
        match &only_expression(&program).kind {
            ExpressionKind::Infix {
                operator: InfixOperator::Add,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                ExpressionKind::Infix {
                    operator: InfixOperator::Mul,
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_power_is_right_associative() {
        let program = parse("2 ** 3 ** 2");
        match &only_expression(&program).kind {
            ExpressionKind::Infix { left, right, .. } => {
                assert!(matches!(left.kind, ExpressionKind::Integer(2)));
                assert!(matches!(
                    right.kind,
                    ExpressionKind::Infix {
                        operator: InfixOperator::Pow,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_var_and_val() {
        let program = parse("var x = 1; val y = 2");
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(
            &program.statements[0].kind,
            StatementKind::Var { name, immutable: false, .. } if name.name == "x"
        ));
        assert!(matches!(
            &program.statements[1].kind,
            StatementKind::Var { name, immutable: true, .. } if name.name == "y"
        ));
    }

    #[test]
    fn test_fun_statement_names_its_literal() {
        let program = parse("fun add(a, b) { return a + b }");
        match &program.statements[0].kind {
            StatementKind::Var {
                name,
                value,
                immutable: true,
            } => {
                assert_eq!(name.name, "add");
                match &value.kind {
                    ExpressionKind::Function(literal) => {
                        assert_eq!(literal.name.as_deref(), Some("add"));
                        assert_eq!(literal.parameters.len(), 2);
                        assert!(!literal.variadic);
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_variadic_parameter() {
        let program = parse("var f = fun(first, rest...) { rest }");
        match &program.statements[0].kind {
            StatementKind::Var { value, .. } => match &value.kind {
                ExpressionKind::Function(literal) => {
                    assert!(literal.variadic);
                    assert_eq!(literal.name.as_deref(), Some("f"));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_if_else_if_else() {
        let program = parse("if a { 1 } else if b { 2 } else { 3 }");
        match &only_expression(&program).kind {
            ExpressionKind::If { arms, alternative } => {
                assert_eq!(arms.len(), 2);
                assert!(alternative.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_for_in_parses_as_membership_condition() {
        let program = parse("for x in xs { x }");
        match &program.statements[0].kind {
            StatementKind::For(stmt) => {
                assert!(stmt.init.is_none());
                assert!(matches!(
                    stmt.condition.kind,
                    ExpressionKind::Infix {
                        operator: InfixOperator::In,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_c_style_for_with_setters() {
        let program = parse("for (var i = 0; i < 10; i += 1, j -= 1) { }");
        match &program.statements[0].kind {
            StatementKind::For(stmt) => {
                assert!(stmt.init.is_some());
                assert!(stmt.post.is_some());
                assert_eq!(stmt.iterable_setters.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_forever_loop() {
        let program = parse("for { break }");
        match &program.statements[0].kind {
            StatementKind::For(stmt) => {
                assert!(matches!(stmt.condition.kind, ExpressionKind::Boolean(true)));
                assert!(matches!(stmt.body.statements[0].kind, StatementKind::Break));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_import_forms() {
        let program = parse("import math\nimport time.*\nimport csv.{parse, write}");
        let imports: Vec<&ImportStatement> = program
            .statements
            .iter()
            .map(|s| match &s.kind {
                StatementKind::Import(import) => import,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(imports[0].module.name, "math");
        assert!(!imports[0].all && imports[0].items.is_empty());
        assert!(imports[1].all);
        assert_eq!(imports[2].items.len(), 2);
    }

    #[test]
    fn test_map_set_and_empty_braces() {
        let program = parse("{1: 2, 3: 4}; {1, 2}; {}");
        let kinds: Vec<&ExpressionKind> = program
            .statements
            .iter()
            .map(|s| match &s.kind {
                StatementKind::Expression(e) => &e.kind,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert!(matches!(kinds[0], ExpressionKind::Map(pairs) if pairs.len() == 2));
        assert!(matches!(kinds[1], ExpressionKind::Set(items) if items.len() == 2));
        assert!(matches!(kinds[2], ExpressionKind::Map(pairs) if pairs.is_empty()));
    }

    #[test]
    fn test_compound_assignment_keeps_literal() {
        let program = parse("x <<= 2");
        assert!(matches!(
            only_expression(&program).kind,
            ExpressionKind::Assign {
                operator: AssignOperator("<<="),
                ..
            }
        ));
    }

    #[test]
    fn test_call_does_not_continue_across_lines() {
        let program = parse("f\n(1)");
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn test_member_call() {
        let program = parse("math.sqrt(4)");
        match &only_expression(&program).kind {
            ExpressionKind::Call { callee, arguments } => {
                assert_eq!(arguments.len(), 1);
                assert!(matches!(
                    &callee.kind,
                    ExpressionKind::Member { property, .. } if property.name == "sqrt"
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_match_arms() {
        let program = parse("match x { 1 => \"one\", _ => { \"other\" } }");
        match &only_expression(&program).kind {
            ExpressionKind::Match { arms, .. } => {
                assert_eq!(arms.len(), 2);
                assert!(arms[0].pattern.is_some());
                assert!(arms[1].pattern.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_try_catch() {
        let program = parse("try { risky() } catch (e) { print(e) }");
        assert!(matches!(
            &program.statements[0].kind,
            StatementKind::Try { binding: Some(b), .. } if b.name == "e"
        ));
    }

    #[test]
    fn test_collects_multiple_errors() {
        let errors = parse_err("var = 1\nvar y = )\nvar z = 3");
        assert_eq!(errors.errors().len(), 2);
        assert_eq!(errors.errors()[0].line, 1);
        assert_eq!(errors.errors()[1].line, 2);
    }

    #[test]
    fn test_error_at_eof_has_location() {
        let errors = parse_err("fun f() {\n  1");
        let err = &errors.errors()[0];
        assert!(err.message.contains("EOF"));
        assert!(err.line > 0 && err.col > 0);
    }

    #[test]
    fn test_unexpected_token_message() {
        let errors = parse_err(")");
        assert_eq!(errors.to_string(), "1:1: unexpected token: ')'");
    }
}
