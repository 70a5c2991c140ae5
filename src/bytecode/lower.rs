//! AST-to-AST rewrites that keep sugar out of the code generator.
//!
//! - `lower_program` runs once over a whole program: compound assignments
//!   (`t op= v`) become `t = t op v` and `x++`/`x--` become `x = x + 1` /
//!   `x = x - 1`.
//! - `lower_for_in` and `lower_match` need compile-time context (what names
//!   resolve, a fresh temporary) and are applied by the compiler on demand.

use crate::frontend::lexer::Span;
use crate::lang::{
    AssignOperator, Block, Expression, ExpressionKind, ForStatement, InfixOperator, MatchArm,
    PostfixOperator, Program, Statement, StatementKind,
};

/// Core builtin used to fetch the element at an index while iterating.
pub const GET_BUILTIN: &str = "_get_";
/// Core builtin used for the loop bound.
pub const LEN_BUILTIN: &str = "len";

pub fn lower_program(program: Program) -> Program {
    Program::new(program.statements.into_iter().map(lower_statement).collect())
}

fn lower_block(block: Block) -> Block {
    Block::new(
        block.statements.into_iter().map(lower_statement).collect(),
        block.span,
    )
}

fn lower_statement(stmt: Statement) -> Statement {
    let kind = match stmt.kind {
        StatementKind::Var {
            name,
            value,
            immutable,
        } => StatementKind::Var {
            name,
            value: lower_expression(value),
            immutable,
        },
        StatementKind::Return(value) => StatementKind::Return(value.map(lower_expression)),
        StatementKind::Expression(expr) => StatementKind::Expression(lower_expression(expr)),
        StatementKind::For(stmt) => StatementKind::For(ForStatement {
            init: stmt.init.map(|init| Box::new(lower_statement(*init))),
            condition: lower_expression(stmt.condition),
            post: stmt.post.map(lower_expression),
            iterable_setters: stmt
                .iterable_setters
                .into_iter()
                .map(lower_statement)
                .collect(),
            body: lower_block(stmt.body),
        }),
        StatementKind::Try {
            body,
            binding,
            handler,
        } => StatementKind::Try {
            body: lower_block(body),
            binding,
            handler: lower_block(handler),
        },
        StatementKind::Defer(expr) => StatementKind::Defer(lower_expression(expr)),
        kind @ (StatementKind::Break | StatementKind::Continue | StatementKind::Import(_)) => kind,
    };
    Statement::new(kind, stmt.span)
}

fn lower_boxed(expr: Box<Expression>) -> Box<Expression> {
    Box::new(lower_expression(*expr))
}

fn lower_expression(expr: Expression) -> Expression {
    let span = expr.span;
    let kind = match expr.kind {
        ExpressionKind::Assign {
            operator,
            target,
            value,
        } => {
            let target = lower_expression(*target);
            let value = lower_expression(*value);
            return desugar_compound(operator, target, value);
        }
        ExpressionKind::Postfix { operator, target } => {
            return postfix_to_assign(operator, lower_expression(*target));
        }
        ExpressionKind::List(items) => {
            ExpressionKind::List(items.into_iter().map(lower_expression).collect())
        }
        ExpressionKind::Set(items) => {
            ExpressionKind::Set(items.into_iter().map(lower_expression).collect())
        }
        ExpressionKind::Map(pairs) => ExpressionKind::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (lower_expression(k), lower_expression(v)))
                .collect(),
        ),
        ExpressionKind::Prefix { operator, right } => ExpressionKind::Prefix {
            operator,
            right: lower_boxed(right),
        },
        ExpressionKind::Infix {
            operator,
            left,
            right,
        } => ExpressionKind::Infix {
            operator,
            left: lower_boxed(left),
            right: lower_boxed(right),
        },
        ExpressionKind::If { arms, alternative } => ExpressionKind::If {
            arms: arms
                .into_iter()
                .map(|(cond, block)| (lower_expression(cond), lower_block(block)))
                .collect(),
            alternative: alternative.map(lower_block),
        },
        ExpressionKind::Function(mut literal) => {
            literal.body = lower_block(literal.body);
            ExpressionKind::Function(literal)
        }
        ExpressionKind::Call { callee, arguments } => ExpressionKind::Call {
            callee: lower_boxed(callee),
            arguments: arguments.into_iter().map(lower_expression).collect(),
        },
        ExpressionKind::Index { left, index } => ExpressionKind::Index {
            left: lower_boxed(left),
            index: lower_boxed(index),
        },
        ExpressionKind::Member { object, property } => ExpressionKind::Member {
            object: lower_boxed(object),
            property,
        },
        ExpressionKind::Match { subject, arms } => ExpressionKind::Match {
            subject: lower_boxed(subject),
            arms: arms
                .into_iter()
                .map(|arm| MatchArm {
                    pattern: arm.pattern.map(lower_expression),
                    body: lower_block(arm.body),
                })
                .collect(),
        },
        ExpressionKind::Spawn(inner) => ExpressionKind::Spawn(lower_boxed(inner)),
        ExpressionKind::Eval(inner) => ExpressionKind::Eval(lower_boxed(inner)),
        leaf => leaf,
    };
    Expression::new(kind, span)
}

/// `t op= v` to `t = t op v`.
///
/// An operator with no infix counterpart (`~=`) is left as written so the
/// compiler can report it.
fn desugar_compound(
    operator: AssignOperator,
    target: Expression,
    value: Expression,
) -> Expression {
    if operator.is_plain() {
        return Expression::assign(operator, target, value);
    }
    match InfixOperator::from_literal(operator.stripped()) {
        Some(infix) => {
            let combined = Expression::infix(infix, target.clone(), value);
            Expression::assign(AssignOperator::PLAIN, target, combined)
        }
        None => Expression::assign(operator, target, value),
    }
}

/// `x++` to `x = x + 1`, `x--` to `x = x - 1`.
fn postfix_to_assign(operator: PostfixOperator, target: Expression) -> Expression {
    let infix = match operator {
        PostfixOperator::Increment => InfixOperator::Add,
        PostfixOperator::Decrement => InfixOperator::Sub,
    };
    let one = Expression::integer(1, target.span);
    let combined = Expression::infix(infix, target.clone(), one);
    Expression::assign(AssignOperator::PLAIN, target, combined)
}

// =============================================================================
// for-in
// =============================================================================

/// Rewrites `for x in e` and `for [a, b] in e` into an index-driven loop.
///
/// Applies only when the loop has no initializer or post expression and
/// every loop variable is unresolvable; otherwise `x in e` is an ordinary
/// membership condition and `None` is returned.
///
/// ```text
/// for x in e { body }
///   =>
/// for (var __index_x = 0; __index_x < len(e); __index_x = __index_x + 1) {
///     var x = _get_(e, __index_x)
///     body
/// }
/// ```
///
/// The pair form binds `__indexed_ab = _get_(e, __index_ab, true)` and
/// projects `a = __indexed_ab[0]`, `b = __indexed_ab[1]`.
pub fn lower_for_in(stmt: &ForStatement, resolves: impl Fn(&str) -> bool) -> Option<ForStatement> {
    if stmt.init.is_some() || stmt.post.is_some() {
        return None;
    }
    let ExpressionKind::Infix {
        operator: InfixOperator::In,
        left,
        right,
    } = &stmt.condition.kind
    else {
        return None;
    };
    let span = stmt.condition.span;
    let iterable = right.as_ref();

    match &left.kind {
        ExpressionKind::Identifier(name) if !resolves(name) => {
            let index = format!("__index_{}", name);
            let element = Statement::var(
                name,
                get_element(iterable, &index, false, span),
                false,
            );
            Some(indexed_loop(stmt, &index, iterable, vec![element], span))
        }
        ExpressionKind::List(items) if items.len() == 2 => {
            let a = items[0].as_identifier()?;
            let b = items[1].as_identifier()?;
            if resolves(a) || resolves(b) {
                return None;
            }
            let suffix = format!("{}{}", a, b);
            let index = format!("__index_{}", suffix);
            let indexed = format!("__indexed_{}", suffix);
            let pair = Expression::identifier(&indexed, span);
            let prologue = vec![
                Statement::var(&indexed, get_element(iterable, &index, true, span), false),
                Statement::var(
                    a,
                    Expression::index(pair.clone(), Expression::integer(0, span)),
                    false,
                ),
                Statement::var(
                    b,
                    Expression::index(pair, Expression::integer(1, span)),
                    false,
                ),
            ];
            Some(indexed_loop(stmt, &index, iterable, prologue, span))
        }
        _ => None,
    }
}

/// `_get_(iterable, index)` or, for pairs, `_get_(iterable, index, true)`.
fn get_element(iterable: &Expression, index: &str, pair: bool, span: Span) -> Expression {
    let mut arguments = vec![iterable.clone(), Expression::identifier(index, span)];
    if pair {
        arguments.push(Expression::boolean(true, span));
    }
    Expression::call(Expression::identifier(GET_BUILTIN, span), arguments)
}

fn indexed_loop(
    stmt: &ForStatement,
    index: &str,
    iterable: &Expression,
    prologue: Vec<Statement>,
    span: Span,
) -> ForStatement {
    let counter = Expression::identifier(index, span);
    let length = Expression::call(
        Expression::identifier(LEN_BUILTIN, span),
        vec![iterable.clone()],
    );
    let step = Expression::assign(
        AssignOperator::PLAIN,
        counter.clone(),
        Expression::infix(
            InfixOperator::Add,
            counter.clone(),
            Expression::integer(1, span),
        ),
    );

    let mut statements = prologue;
    statements.extend(stmt.body.statements.iter().cloned());

    ForStatement {
        init: Some(Box::new(Statement::var(
            index,
            Expression::integer(0, span),
            false,
        ))),
        condition: Expression::infix(InfixOperator::Lt, counter, length),
        post: Some(step),
        iterable_setters: stmt.iterable_setters.clone(),
        body: Block::new(statements, stmt.body.span),
    }
}

// =============================================================================
// match
// =============================================================================

/// Splits `match` into a binding of the subject to `temp` and an `if` chain
/// comparing `temp == pattern` per arm; the `_` arm becomes the `else`.
///
/// Returns `Err(span)` of the first arm that follows a `_` arm.
pub fn lower_match(
    subject: &Expression,
    arms: &[MatchArm],
    temp: &str,
    span: Span,
) -> Result<(Statement, Expression), Span> {
    let binding = Statement::var(temp, subject.clone(), true);
    let mut if_arms = Vec::new();
    let mut alternative = None;

    for arm in arms {
        if alternative.is_some() {
            return Err(arm.body.span);
        }
        match &arm.pattern {
            Some(pattern) => {
                let condition = Expression::infix(
                    InfixOperator::Eq,
                    Expression::identifier(temp, pattern.span),
                    pattern.clone(),
                );
                if_arms.push((condition, arm.body.clone()));
            }
            None => alternative = Some(arm.body.clone()),
        }
    }

    let expr = if if_arms.is_empty() {
        // only a wildcard (or nothing): `if true { body }`
        let body = alternative.take().unwrap_or_else(|| Block::new(Vec::new(), span));
        Expression::new(
            ExpressionKind::If {
                arms: vec![(Expression::boolean(true, span), body)],
                alternative: None,
            },
            span,
        )
    } else {
        Expression::new(
            ExpressionKind::If {
                arms: if_arms,
                alternative,
            },
            span,
        )
    };
    Ok((binding, expr))
}
