use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigInt;
use tracing::debug;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::{Bytecode, Instructions};
use crate::bytecode::lower::{self, lower_program};
use crate::bytecode::op::{Opcode, PLACEHOLDER};
use crate::bytecode::scope::CompilationScope;
use crate::bytecode::stdlib;
use crate::bytecode::symbol_table::{Symbol, SymbolScope, SymbolTable};
use crate::frontend::lexer::Span;
use crate::lang::{
    AssignOperator, Block, CompiledFunction, Constant, Expression, ExpressionKind, ForStatement,
    FunctionLiteral, Identifier, InfixOperator, MatchArm, PrefixOperator, Program, Statement,
    StatementKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Compile the core prelude before the first program.
    pub compile_core: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { compile_core: true }
    }
}

/// Everything a later compilation needs to continue where this one stopped
/// (a REPL compiles one line at a time against the same globals).
#[derive(Debug, Clone, Default)]
pub struct CompilerState {
    pub symbol_table: SymbolTable,
    pub constants: Vec<Constant>,
    pub core_compiled: bool,
}

pub struct Compiler {
    pub(crate) constants: Vec<Constant>,

    /// Frame of the function being compiled; `enclosing_scopes` holds the
    /// frames of the functions around it, innermost last.
    pub(crate) scope: CompilationScope,
    pub(crate) enclosing_scopes: Vec<CompilationScope>,

    pub(crate) symbol_table: SymbolTable,

    /// Always equal to `module_name_stack.len()` between statements.
    pub(crate) import_depth: usize,
    pub(crate) module_name_stack: Vec<String>,
    pub(crate) core_compiled: bool,

    /// Blocks open in the current function.
    pub(crate) block_nest_level: usize,
    saved_block_levels: Vec<usize>,

    /// Parsed and lowered module sources, by module name.
    pub(crate) module_cache: HashMap<&'static str, Rc<Program>>,

    options: CompilerOptions,
    temp_counter: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        let mut symbol_table = SymbolTable::new();
        let core = stdlib::core();
        for (index, name) in core.builtins.iter().enumerate() {
            symbol_table.define_builtin(index, name, core.index);
        }
        Self::from_state(
            CompilerState {
                symbol_table,
                ..CompilerState::default()
            },
            options,
        )
    }

    /// Continues from the state of a previous compilation.
    pub fn new_with_state(state: CompilerState, options: CompilerOptions) -> Self {
        Self::from_state(state, options)
    }

    fn from_state(state: CompilerState, options: CompilerOptions) -> Self {
        Compiler {
            constants: state.constants,
            scope: CompilationScope::new(),
            enclosing_scopes: Vec::new(),
            symbol_table: state.symbol_table,
            import_depth: 0,
            module_name_stack: Vec::new(),
            core_compiled: state.core_compiled,
            block_nest_level: 0,
            saved_block_levels: Vec::new(),
            module_cache: HashMap::new(),
            options,
            temp_counter: 0,
        }
    }

    /// Compiles `program` into the main instruction stream.
    ///
    /// The prelude is compiled first unless disabled or already present.
    /// On error the compiler should be discarded: partially emitted code
    /// stays in the buffer.
    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        if self.options.compile_core && !self.core_compiled {
            self.compile_core()?;
        }

        let program = lower_program(program.clone());
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }

        debug_assert!(
            self.scope.instructions.unpatched_jumps().is_empty(),
            "jump left at placeholder"
        );
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scope.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn into_state(self) -> CompilerState {
        CompilerState {
            symbol_table: self.symbol_table,
            constants: self.constants,
            core_compiled: self.core_compiled,
        }
    }

    // =========================================================================
    // Emission helpers
    // =========================================================================

    pub(crate) fn emit(&mut self, opcode: Opcode, operands: &[usize]) -> usize {
        self.scope.emit(opcode, operands)
    }

    pub(crate) fn add_constant(
        &mut self,
        constant: Constant,
        span: Span,
    ) -> Result<usize, CompileError> {
        let index = self.constants.len();
        check_limit(index + 1, u16::MAX as usize + 1, "constants", span)?;
        self.constants.push(constant);
        Ok(index)
    }

    pub(crate) fn emit_constant(
        &mut self,
        constant: Constant,
        span: Span,
    ) -> Result<usize, CompileError> {
        let index = self.add_constant(constant, span)?;
        Ok(self.emit(Opcode::Constant, &[index]))
    }

    pub(crate) fn define(
        &mut self,
        name: &str,
        immutable: bool,
        span: Span,
    ) -> Result<Symbol, CompileError> {
        let symbol = self.symbol_table.define(name, immutable);
        check_limit(symbol.index + 1, u16::MAX as usize + 1, "definitions", span)?;
        Ok(symbol)
    }

    pub(crate) fn define_member(
        &mut self,
        module: &str,
        name: &str,
        immutable: bool,
        span: Span,
    ) -> Result<Symbol, CompileError> {
        let symbol = self.symbol_table.define_member(module, name, immutable);
        check_limit(symbol.index + 1, u16::MAX as usize + 1, "definitions", span)?;
        Ok(symbol)
    }

    /// Current position as the target of a jump. Targets are 16-bit and
    /// `PLACEHOLDER` marks an unpatched jump, so the last usable one is
    /// `PLACEHOLDER - 1`.
    fn jump_target(&self, span: Span) -> Result<usize, CompileError> {
        check_limit(
            self.scope.position(),
            PLACEHOLDER - 1,
            "bytecode bytes",
            span,
        )
    }

    /// Resolves `name`, preferring the definition of the module being imported.
    pub(crate) fn resolve_name(&mut self, name: &str) -> Option<Symbol> {
        if let Some(module) = self.module_name_stack.last() {
            let qualified = format!("{}.{}", module, name);
            if let Some(symbol) = self.symbol_table.resolve(&qualified) {
                return Some(symbol);
            }
        }
        self.symbol_table.resolve(name)
    }

    fn is_resolvable(&self, name: &str) -> bool {
        let qualified_hit = self
            .module_name_stack
            .last()
            .is_some_and(|m| self.symbol_table.is_resolvable(&format!("{}.{}", m, name)));
        qualified_hit || self.symbol_table.is_resolvable(name)
    }

    pub(crate) fn load_symbol(&mut self, symbol: &Symbol) {
        let index = symbol.index;
        match (symbol.scope, symbol.immutable) {
            (SymbolScope::Global, false) => self.emit(Opcode::GetGlobal, &[index]),
            (SymbolScope::Global, true) => self.emit(Opcode::GetGlobalImm, &[index]),
            (SymbolScope::Local, false) => self.emit(Opcode::GetLocal, &[index]),
            (SymbolScope::Local, true) => self.emit(Opcode::GetLocalImm, &[index]),
            (SymbolScope::Free, false) => self.emit(Opcode::GetFree, &[index]),
            (SymbolScope::Free, true) => self.emit(Opcode::GetFreeImm, &[index]),
            (SymbolScope::Builtin, _) => {
                self.emit(Opcode::GetBuiltin, &[symbol.module_index as usize, index])
            }
            (SymbolScope::Function, _) => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    /// Emits the store for `symbol`. Only the definition of an immutable
    /// binding (`initializing`) uses a `Set*Imm` opcode.
    pub(crate) fn store_symbol(
        &mut self,
        symbol: &Symbol,
        initializing: bool,
        span: Span,
    ) -> Result<(), CompileError> {
        let imm = initializing && symbol.immutable;
        let opcode = match (symbol.scope, imm) {
            (SymbolScope::Global, false) => Opcode::SetGlobal,
            (SymbolScope::Global, true) => Opcode::SetGlobalImm,
            (SymbolScope::Local, false) => Opcode::SetLocal,
            (SymbolScope::Local, true) => Opcode::SetLocalImm,
            (SymbolScope::Free, false) => Opcode::SetFree,
            (SymbolScope::Free, true) => Opcode::SetFreeImm,
            (SymbolScope::Builtin | SymbolScope::Function, _) => {
                return Err(CompileError::UnsupportedAssignmentTarget {
                    target: format!("'{}'", symbol.name),
                    span,
                });
            }
        };
        self.emit(opcode, &[symbol.index]);
        Ok(())
    }

    fn enter_scope(&mut self) {
        let enclosing = std::mem::take(&mut self.scope);
        self.enclosing_scopes.push(enclosing);
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer);
        self.saved_block_levels.push(self.block_nest_level);
        self.block_nest_level = 0;
        debug!(depth = self.enclosing_scopes.len(), "enter scope");
    }

    fn leave_scope(&mut self) -> Instructions {
        let enclosing = self.enclosing_scopes.pop().unwrap_or_default();
        let scope = std::mem::replace(&mut self.scope, enclosing);
        if let Some(outer) = self.symbol_table.outer.take() {
            self.symbol_table = *outer;
        }
        self.block_nest_level = self.saved_block_levels.pop().unwrap_or(0);
        debug!(
            depth = self.enclosing_scopes.len(),
            bytes = scope.instructions.len(),
            "leave scope"
        );
        scope.instructions
    }

    fn enter_block(&mut self) {
        self.block_nest_level += 1;
        self.symbol_table.enter_block();
    }

    fn leave_block(&mut self) {
        self.symbol_table.leave_block();
        self.block_nest_level -= 1;
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub(crate) fn compile_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match &stmt.kind {
            StatementKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop, &[]);
            }
            StatementKind::Var {
                name,
                value,
                immutable,
            } => self.compile_var(&name.name, value, *immutable, name.span)?,
            StatementKind::Return(value) => {
                match value {
                    Some(value) => self.compile_expression(value)?,
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                }
                self.emit(Opcode::ReturnValue, &[]);
            }
            StatementKind::For(for_stmt) => self.compile_for(for_stmt, stmt.span)?,
            StatementKind::Break => {
                if !self.scope.emit_break() {
                    return Err(CompileError::OutsideLoop {
                        keyword: "break",
                        span: stmt.span,
                    });
                }
            }
            StatementKind::Continue => {
                if !self.scope.emit_continue() {
                    return Err(CompileError::OutsideLoop {
                        keyword: "continue",
                        span: stmt.span,
                    });
                }
            }
            StatementKind::Import(import) => self.compile_import(import, stmt.span)?,
            StatementKind::Try {
                body,
                binding,
                handler,
            } => self.compile_try(body, binding.as_ref(), handler, stmt.span)?,
            StatementKind::Defer(expr) => {
                let argc = self.compile_call_parts(expr, "defer")?;
                self.emit(Opcode::Defer, &[argc]);
            }
        }
        Ok(())
    }

    /// Value first, then the binding, so `var x = x + 1` reads the outer `x`.
    fn compile_var(
        &mut self,
        name: &str,
        value: &Expression,
        immutable: bool,
        span: Span,
    ) -> Result<(), CompileError> {
        self.compile_expression(value)?;
        let symbol = self.define(name, immutable, span)?;
        self.store_symbol(&symbol, true, span)
    }

    fn compile_block(&mut self, block: &Block) -> Result<(), CompileError> {
        self.enter_block();
        let result = block
            .statements
            .iter()
            .try_for_each(|stmt| self.compile_statement(stmt));
        self.leave_block();
        result
    }

    /// Leaves the value of an `if` arm on the stack: a trailing expression
    /// statement keeps its value, anything else yields null.
    fn finish_arm(&mut self, block: &Block) {
        if ends_with_expression(block) && self.scope.last_is(Opcode::Pop) {
            self.scope.remove_last_pop();
        } else {
            self.emit(Opcode::Null, &[]);
        }
    }

    fn compile_for(&mut self, stmt: &ForStatement, span: Span) -> Result<(), CompileError> {
        let lowered = lower::lower_for_in(stmt, |name| self.is_resolvable(name));
        let stmt = lowered.as_ref().unwrap_or(stmt);

        self.enter_block();
        let result = self.compile_loop(stmt, span);
        self.leave_block();
        result
    }

    /// ```text
    /// init
    /// start:    condition
    ///           OpJumpNotTruthy end
    ///           body
    /// next:     iterable setters      <- continue
    ///           post; OpPop
    ///           OpJump start
    /// end:                            <- break
    /// ```
    fn compile_loop(&mut self, stmt: &ForStatement, span: Span) -> Result<(), CompileError> {
        if let Some(init) = &stmt.init {
            self.compile_statement(init)?;
        }

        let start = self.jump_target(span)?;
        self.scope.enter_loop(start);

        self.compile_expression(&stmt.condition)?;
        let exit = self.emit(Opcode::JumpNotTruthy, &[PLACEHOLDER]);

        self.compile_block(&stmt.body)?;

        let next = self.jump_target(span)?;
        self.scope.patch_continues(next);
        for setter in &stmt.iterable_setters {
            self.compile_statement(setter)?;
        }
        if let Some(post) = &stmt.post {
            self.compile_expression(post)?;
            self.emit(Opcode::Pop, &[]);
        }
        self.emit(Opcode::Jump, &[start]);

        let end = self.jump_target(span)?;
        self.scope.change_operand(exit, end);
        self.scope.leave_loop(end);
        Ok(())
    }

    /// ```text
    ///           OpTry catch
    ///           body
    ///           OpEndTry
    ///           OpJump end
    /// catch:    Set e (or OpPop)
    ///           handler
    /// end:
    /// ```
    fn compile_try(
        &mut self,
        body: &Block,
        binding: Option<&Identifier>,
        handler: &Block,
        span: Span,
    ) -> Result<(), CompileError> {
        let try_position = self.emit(Opcode::Try, &[PLACEHOLDER]);
        self.compile_block(body)?;
        self.emit(Opcode::EndTry, &[]);
        let skip = self.emit(Opcode::Jump, &[PLACEHOLDER]);

        let catch = self.jump_target(span)?;
        self.scope.change_operand(try_position, catch);

        self.enter_block();
        let result = self.compile_catch(binding, handler);
        self.leave_block();
        result?;

        let end = self.jump_target(span)?;
        self.scope.change_operand(skip, end);
        Ok(())
    }

    fn compile_catch(
        &mut self,
        binding: Option<&Identifier>,
        handler: &Block,
    ) -> Result<(), CompileError> {
        // the VM pushes the caught error before jumping here
        match binding {
            Some(ident) => {
                let symbol = self.define(&ident.name, false, ident.span)?;
                self.store_symbol(&symbol, true, ident.span)?;
            }
            None => {
                self.emit(Opcode::Pop, &[]);
            }
        }
        handler
            .statements
            .iter()
            .try_for_each(|stmt| self.compile_statement(stmt))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub(crate) fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompileError> {
        let span = expr.span;
        match &expr.kind {
            ExpressionKind::Identifier(name) => {
                let symbol = self
                    .resolve_name(name)
                    .ok_or_else(|| CompileError::unresolved(name, span))?;
                self.load_symbol(&symbol);
            }

            ExpressionKind::Integer(n) => {
                self.emit_constant(Constant::Integer(*n), span)?;
            }
            ExpressionKind::UInteger(n) => {
                self.emit_constant(Constant::UInteger(*n), span)?;
            }
            ExpressionKind::Float(n) => {
                self.emit_constant(Constant::Float(*n), span)?;
            }
            ExpressionKind::BigInteger(digits) => {
                let value: BigInt =
                    digits
                        .parse()
                        .map_err(|_| CompileError::InvalidBigInteger {
                            text: digits.clone(),
                            span,
                        })?;
                self.emit_constant(Constant::BigInteger(value), span)?;
            }
            ExpressionKind::BigFloat(text) => {
                self.emit_constant(Constant::BigFloat(text.clone()), span)?;
            }
            ExpressionKind::Boolean(true) => {
                self.emit(Opcode::True, &[]);
            }
            ExpressionKind::Boolean(false) => {
                self.emit(Opcode::False, &[]);
            }
            ExpressionKind::Null => {
                self.emit(Opcode::Null, &[]);
            }
            ExpressionKind::String(s) => {
                self.emit_constant(Constant::String(s.clone()), span)?;
            }
            ExpressionKind::Regex(s) => {
                self.emit_constant(Constant::Regex(s.clone()), span)?;
            }
            ExpressionKind::ExecString(s) => {
                self.emit_constant(Constant::String(s.clone()), span)?;
                self.emit(Opcode::ExecString, &[]);
            }

            ExpressionKind::List(items) => {
                let count = check_limit(items.len(), u16::MAX as usize, "list elements", span)?;
                for item in items {
                    self.compile_expression(item)?;
                }
                self.emit(Opcode::List, &[count]);
            }
            ExpressionKind::Map(pairs) => {
                let count = check_limit(pairs.len() * 2, u16::MAX as usize, "map entries", span)?;
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Map, &[count]);
            }
            ExpressionKind::Set(items) => {
                let count = check_limit(items.len(), u16::MAX as usize, "set elements", span)?;
                for item in items {
                    self.compile_expression(item)?;
                }
                self.emit(Opcode::Set, &[count]);
            }

            ExpressionKind::Prefix { operator, right } => {
                self.compile_expression(right)?;
                let opcode = match operator {
                    PrefixOperator::Minus => Opcode::Neg,
                    PrefixOperator::Bang => Opcode::Bang,
                    PrefixOperator::Tilde => Opcode::Tilde,
                };
                self.emit(opcode, &[]);
            }
            ExpressionKind::Postfix { .. } => {
                unreachable!("postfix operators are rewritten by lower_program")
            }
            ExpressionKind::Infix {
                operator,
                left,
                right,
            } => self.compile_infix(*operator, left, right)?,
            ExpressionKind::Assign {
                operator,
                target,
                value,
            } => self.compile_assign(*operator, target, value, span)?,

            ExpressionKind::If { arms, alternative } => {
                self.compile_if(arms, alternative.as_ref(), span)?
            }
            ExpressionKind::Function(literal) => self.compile_function(literal, span)?,

            ExpressionKind::Call { .. } => {
                let argc = self.compile_call_parts(expr, "call")?;
                self.emit(Opcode::Call, &[argc]);
            }
            ExpressionKind::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }
            ExpressionKind::Member { object, property } => {
                self.compile_member(object, property)?
            }

            ExpressionKind::Match { subject, arms } => self.compile_match(subject, arms, span)?,
            ExpressionKind::Spawn(inner) => {
                let argc = self.compile_call_parts(inner, "spawn")?;
                self.emit(Opcode::Spawn, &[argc]);
            }
            ExpressionKind::Eval(inner) => {
                self.compile_expression(inner)?;
                self.emit(Opcode::Eval, &[]);
            }
        }
        Ok(())
    }

    /// Pushes callee and arguments of a call expression; returns the argc.
    fn compile_call_parts(
        &mut self,
        expr: &Expression,
        keyword: &'static str,
    ) -> Result<usize, CompileError> {
        let ExpressionKind::Call { callee, arguments } = &expr.kind else {
            return Err(CompileError::ExpectedCall {
                keyword,
                span: expr.span,
            });
        };
        let argc = check_limit(arguments.len(), u8::MAX as usize, "arguments", expr.span)?;
        self.compile_expression(callee)?;
        for argument in arguments {
            self.compile_expression(argument)?;
        }
        Ok(argc)
    }

    fn compile_infix(
        &mut self,
        operator: InfixOperator,
        left: &Expression,
        right: &Expression,
    ) -> Result<(), CompileError> {
        // `a < b` is `b > a`: operands swap, opcode stays greater-than
        if matches!(operator, InfixOperator::Lt | InfixOperator::LtEq) {
            self.compile_expression(right)?;
            self.compile_expression(left)?;
        } else {
            self.compile_expression(left)?;
            self.compile_expression(right)?;
        }
        self.emit(infix_opcode(operator), &[]);
        Ok(())
    }

    fn compile_assign(
        &mut self,
        operator: AssignOperator,
        target: &Expression,
        value: &Expression,
        span: Span,
    ) -> Result<(), CompileError> {
        // compound forms with an infix counterpart were rewritten by lower_program
        if !operator.is_plain() {
            return Err(CompileError::unknown_operator(operator.stripped(), span));
        }

        match &target.kind {
            ExpressionKind::Identifier(name) => {
                let symbol = self
                    .resolve_name(name)
                    .ok_or_else(|| CompileError::unresolved(name, target.span))?;
                if symbol.immutable {
                    return Err(CompileError::immutable(name, target.span));
                }
                self.compile_expression(value)?;
                self.store_symbol(&symbol, false, target.span)?;
            }
            ExpressionKind::Index { .. } => {
                let root = self
                    .index_root(target)
                    .ok_or(CompileError::IndexRootNotIdentifier { span: target.span })?;
                let symbol = self
                    .resolve_name(&root.name)
                    .ok_or_else(|| CompileError::unresolved(&root.name, root.span))?;
                if symbol.immutable {
                    return Err(CompileError::immutable(&root.name, root.span));
                }
                self.compile_expression(value)?;
                self.compile_expression(target)?;
                if self.scope.last_is(Opcode::Index) {
                    self.scope.remove_last_instruction();
                }
                self.emit(Opcode::IndexSet, &[]);
            }
            ExpressionKind::Member { object, property } if !self.is_module(object) => {
                let as_index = member_as_index(object, property);
                return self.compile_assign(operator, &as_index, value, span);
            }
            other => {
                return Err(CompileError::UnsupportedAssignmentTarget {
                    target: describe(other).to_string(),
                    span: target.span,
                });
            }
        }
        // an assignment evaluates to null
        self.emit(Opcode::Null, &[]);
        Ok(())
    }

    /// The identifier at the bottom of `a[i][j]` / `a.b[i]`.
    fn index_root(&self, mut expr: &Expression) -> Option<Identifier> {
        loop {
            match &expr.kind {
                ExpressionKind::Index { left, .. } => expr = left.as_ref(),
                ExpressionKind::Member { object, .. } if !self.is_module(object) => {
                    expr = object.as_ref()
                }
                ExpressionKind::Identifier(name) => {
                    return Some(Identifier::new(name.clone(), expr.span));
                }
                _ => return None,
            }
        }
    }

    /// Whether `expr` names the handle bound by an `import`, as opposed to a
    /// parameter or variable that happens to share the module's name.
    pub(crate) fn is_module(&self, expr: &Expression) -> bool {
        expr.as_identifier()
            .is_some_and(|name| self.symbol_table.is_module(name))
    }

    fn compile_if(
        &mut self,
        arms: &[(Expression, Block)],
        alternative: Option<&Block>,
        span: Span,
    ) -> Result<(), CompileError> {
        let mut end_jumps = Vec::with_capacity(arms.len());

        for (condition, consequence) in arms {
            self.compile_expression(condition)?;
            let skip = self.emit(Opcode::JumpNotTruthy, &[PLACEHOLDER]);

            self.compile_block(consequence)?;
            self.finish_arm(consequence);
            end_jumps.push(self.emit(Opcode::Jump, &[PLACEHOLDER]));

            let after_arm = self.jump_target(span)?;
            self.scope.change_operand(skip, after_arm);
        }

        match alternative {
            Some(block) => {
                self.compile_block(block)?;
                self.finish_arm(block);
            }
            None => {
                self.emit(Opcode::Null, &[]);
            }
        }

        let end = self.jump_target(span)?;
        for jump in end_jumps {
            self.scope.change_operand(jump, end);
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        literal: &FunctionLiteral,
        span: Span,
    ) -> Result<(), CompileError> {
        self.enter_scope();
        let result = self.compile_function_body(literal);
        let free_symbols = self.symbol_table.free_symbols().to_vec();
        let num_locals = self.symbol_table.num_definitions();
        let instructions = self.leave_scope();
        result?;

        debug_assert!(instructions.unpatched_jumps().is_empty());
        let free_count = check_limit(free_symbols.len(), u8::MAX as usize, "captured variables", span)?;

        // captured values are pushed in capture order, read in the enclosing scope
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let function = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: literal.parameters.len(),
            variadic: literal.variadic,
        };
        let index = self.add_constant(Constant::Function(function), span)?;
        self.emit(Opcode::Closure, &[index, free_count]);
        Ok(())
    }

    fn compile_function_body(&mut self, literal: &FunctionLiteral) -> Result<(), CompileError> {
        if let Some(name) = &literal.name {
            self.symbol_table.define_function_name(name);
        }
        for parameter in &literal.parameters {
            self.define(&parameter.name, false, parameter.span)?;
        }

        for stmt in &literal.body.statements {
            self.compile_statement(stmt)?;
        }

        if ends_with_expression(&literal.body) {
            self.scope.replace_last_pop_with_return();
        }
        if !self.scope.last_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }
        Ok(())
    }

    fn compile_match(
        &mut self,
        subject: &Expression,
        arms: &[MatchArm],
        span: Span,
    ) -> Result<(), CompileError> {
        let temp = format!("__match_{}", self.temp_counter);
        self.temp_counter += 1;

        let (binding, chain) = lower::lower_match(subject, arms, &temp, span)
            .map_err(|span| CompileError::MisplacedWildcard { span })?;

        self.enter_block();
        let result = self
            .compile_statement(&binding)
            .and_then(|_| self.compile_expression(&chain));
        self.leave_block();
        result
    }
}

fn infix_opcode(operator: InfixOperator) -> Opcode {
    match operator {
        InfixOperator::Add => Opcode::Add,
        InfixOperator::Sub => Opcode::Minus,
        InfixOperator::Mul => Opcode::Star,
        InfixOperator::Div => Opcode::Div,
        InfixOperator::FloorDiv => Opcode::FlDiv,
        InfixOperator::Pow => Opcode::Pow,
        InfixOperator::Rem => Opcode::Percent,
        InfixOperator::BitXor => Opcode::Carat,
        InfixOperator::BitAnd => Opcode::Ampersand,
        InfixOperator::BitOr => Opcode::Pipe,
        InfixOperator::Shl => Opcode::Lshift,
        InfixOperator::Shr => Opcode::Rshift,
        InfixOperator::Range => Opcode::Range,
        InfixOperator::NonIncRange => Opcode::NonIncRange,
        InfixOperator::In => Opcode::In,
        InfixOperator::NotIn => Opcode::Notin,
        InfixOperator::Eq => Opcode::Equal,
        InfixOperator::NotEq => Opcode::NotEqual,
        InfixOperator::Gt | InfixOperator::Lt => Opcode::GreaterThan,
        InfixOperator::GtEq | InfixOperator::LtEq => Opcode::GreaterThanOrEqual,
        InfixOperator::And => Opcode::And,
        InfixOperator::Or => Opcode::Or,
    }
}

fn ends_with_expression(block: &Block) -> bool {
    matches!(
        block.statements.last(),
        Some(Statement {
            kind: StatementKind::Expression(_),
            ..
        })
    )
}

/// `obj.key` as `obj["key"]`.
pub(crate) fn member_as_index(object: &Expression, property: &Identifier) -> Expression {
    Expression::index(
        object.clone(),
        Expression::new(ExpressionKind::String(property.name.clone()), property.span),
    )
}

fn check_limit(
    count: usize,
    limit: usize,
    what: &'static str,
    span: Span,
) -> Result<usize, CompileError> {
    if count > limit {
        return Err(CompileError::TooMany {
            what,
            count,
            limit,
            span,
        });
    }
    Ok(count)
}

fn describe(kind: &ExpressionKind) -> &'static str {
    match kind {
        ExpressionKind::Call { .. } => "a call expression",
        ExpressionKind::Member { .. } => "a module member",
        ExpressionKind::Function(_) => "a function literal",
        ExpressionKind::If { .. } | ExpressionKind::Match { .. } => "a conditional expression",
        ExpressionKind::Infix { .. } | ExpressionKind::Prefix { .. } => "an operator expression",
        ExpressionKind::Assign { .. } | ExpressionKind::Postfix { .. } => "an assignment",
        _ => "a literal",
    }
}
