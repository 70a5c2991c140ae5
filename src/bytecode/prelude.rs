use tracing::debug;

use crate::bytecode::compile::Compiler;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::lower::lower_program;
use crate::frontend::parser::parse_source;

/// Blue source compiled ahead of every program unless disabled.
///
/// Its top-level definitions become globals of the user program.
pub const PRELUDE_SOURCE: &str = r#"
fun map(xs, f) {
    var out = []
    for x in xs {
        out = append(out, f(x))
    }
    return out
}

fun filter(xs, pred) {
    var out = []
    for x in xs {
        if pred(x) {
            out = append(out, x)
        }
    }
    return out
}

fun reduce(xs, f, init) {
    var acc = init
    for x in xs {
        acc = f(acc, x)
    }
    return acc
}

fun sum(xs) {
    return reduce(xs, fun(a, b) { a + b }, 0)
}

fun contains(xs, item) {
    for x in xs {
        if x == item {
            return true
        }
    }
    return false
}

fun any(xs, pred) {
    for x in xs {
        if pred(x) {
            return true
        }
    }
    return false
}

fun all(xs, pred) {
    for x in xs {
        if !pred(x) {
            return false
        }
    }
    return true
}
"#;

impl Compiler {
    /// Compiles the prelude into the current (root) scope, once.
    pub(crate) fn compile_core(&mut self) -> Result<(), CompileError> {
        if self.core_compiled {
            return Ok(());
        }
        debug!("compiling core prelude");

        let program = parse_source(PRELUDE_SOURCE).map_err(CompileError::PreludeParse)?;
        let program = lower_program(program);
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }

        self.core_compiled = true;
        Ok(())
    }
}
