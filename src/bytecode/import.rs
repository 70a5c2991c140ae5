//! `import` statements and `module.member` access.
//!
//! An import compiles the module's Blue source into the importing program.
//! While it runs, the module's builtins are visible by their bare names; they
//! are withdrawn again afterwards, whether or not compilation succeeded. A
//! plain `import m` binds `m` to a module handle and keeps the module's own
//! definitions under `m.name`; `import m.*` defines them unqualified.

use std::rc::Rc;

use tracing::debug;

use crate::bytecode::compile::{Compiler, member_as_index};
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::lower::lower_program;
use crate::bytecode::op::Opcode;
use crate::bytecode::stdlib::{self, StdModule};
use crate::frontend::lexer::Span;
use crate::frontend::parser::parse_source;
use crate::lang::{
    Constant, Expression, Identifier, ImportStatement, ModuleHandle, Program, StatementKind,
};

impl Compiler {
    pub(crate) fn compile_import(
        &mut self,
        import: &ImportStatement,
        span: Span,
    ) -> Result<(), CompileError> {
        if self.block_nest_level > 0 {
            return Err(CompileError::NestedImport { span });
        }
        let name = import.module.name.as_str();
        let module = stdlib::lookup(name).ok_or_else(|| CompileError::UnknownModule {
            name: name.to_string(),
            span: import.module.span,
        })?;
        let program = self.parsed_module(module)?;

        for item in &import.items {
            check_member(module, &program, item)?;
        }

        debug!(module = module.name, all = import.all, "import");

        for (index, builtin) in module.builtins.iter().enumerate() {
            self.symbol_table.define_builtin(index, builtin, module.index);
        }
        let result = if import.all {
            self.compile_module_body(&program, None)
        } else {
            self.compile_qualified_module(module, &program, span)
        };
        for builtin in module.builtins.iter().rev() {
            self.symbol_table.remove_builtin(builtin);
        }
        result
    }

    /// Parses and lowers a module source on first use.
    fn parsed_module(&mut self, module: &'static StdModule) -> Result<Rc<Program>, CompileError> {
        if let Some(program) = self.module_cache.get(module.name) {
            return Ok(Rc::clone(program));
        }
        let program = parse_source(module.source).map_err(|errors| CompileError::ModuleParse {
            module: module.name.to_string(),
            errors,
        })?;
        let program = Rc::new(lower_program(program));
        self.module_cache.insert(module.name, Rc::clone(&program));
        Ok(program)
    }

    fn compile_qualified_module(
        &mut self,
        module: &'static StdModule,
        program: &Program,
        span: Span,
    ) -> Result<(), CompileError> {
        self.module_name_stack.push(module.name.to_string());
        self.import_depth += 1;
        let result = self.compile_module_body(program, Some(module.name));
        self.module_name_stack.pop();
        self.import_depth -= 1;
        debug_assert_eq!(self.import_depth, self.module_name_stack.len());
        result?;

        let handle = Constant::Module(ModuleHandle {
            name: module.name.to_string(),
            index: module.index,
        });
        self.emit_constant(handle, span)?;
        let symbol = self.define(module.name, true, span)?;
        self.store_symbol(&symbol, true, span)?;
        self.symbol_table.mark_module(&symbol);
        Ok(())
    }

    /// Top-level definitions become members `qualifier.name` when a
    /// qualifier is given; everything else compiles as ordinary statements.
    fn compile_module_body(
        &mut self,
        program: &Program,
        qualifier: Option<&str>,
    ) -> Result<(), CompileError> {
        for stmt in &program.statements {
            match (&stmt.kind, qualifier) {
                (
                    StatementKind::Var {
                        name,
                        value,
                        immutable,
                    },
                    Some(module),
                ) => {
                    self.compile_expression(value)?;
                    let symbol = self.define_member(module, &name.name, *immutable, name.span)?;
                    self.store_symbol(&symbol, true, name.span)?;
                }
                _ => self.compile_statement(stmt)?,
            }
        }
        Ok(())
    }

    /// `m.x` on an imported module reads a builtin or a qualified definition;
    /// on anything else it reads `object["x"]`.
    pub(crate) fn compile_member(
        &mut self,
        object: &Expression,
        property: &Identifier,
    ) -> Result<(), CompileError> {
        if !self.is_module(object) {
            return self.compile_expression(&member_as_index(object, property));
        }
        let module_name = object.as_identifier().unwrap_or_default();
        let module = stdlib::lookup(module_name).ok_or_else(|| CompileError::UnknownModule {
            name: module_name.to_string(),
            span: object.span,
        })?;

        if property.name.starts_with('_') {
            return Err(CompileError::PrivateMember {
                module: module.name.to_string(),
                name: property.name.clone(),
                span: property.span,
            });
        }

        if let Some(index) = module.builtin_index(&property.name) {
            self.compile_expression(object)?;
            self.emit(Opcode::GetBuiltin, &[module.index as usize, index]);
            return Ok(());
        }

        let qualified = format!("{}.{}", module.name, property.name);
        let symbol = self
            .symbol_table
            .resolve(&qualified)
            .ok_or_else(|| CompileError::UnknownMember {
                module: module.name.to_string(),
                name: property.name.clone(),
                span: property.span,
            })?;
        self.load_symbol(&symbol);
        Ok(())
    }
}

/// Validates one name of `import m.{a, b}`.
fn check_member(
    module: &StdModule,
    program: &Program,
    item: &Identifier,
) -> Result<(), CompileError> {
    if item.name.starts_with('_') {
        return Err(CompileError::PrivateMember {
            module: module.name.to_string(),
            name: item.name.clone(),
            span: item.span,
        });
    }
    let defined = program.statements.iter().any(|stmt| {
        matches!(&stmt.kind, StatementKind::Var { name, .. } if name.name == item.name)
    });
    if defined || module.builtin_index(&item.name).is_some() {
        return Ok(());
    }
    Err(CompileError::UnknownMember {
        module: module.name.to_string(),
        name: item.name.clone(),
        span: item.span,
    })
}
