use std::collections::{BTreeSet, HashMap, HashSet};

use bluec::bytecode::op::{Opcode, make};
use bluec::bytecode::stdlib;
use bluec::bytecode::symbol_table::{SymbolScope, SymbolTable};
use bluec::bytecode::{Bytecode, Compiler, CompilerOptions, Instructions};
use bluec::frontend::parse_source;
use bluec::lang::{Constant, ModuleHandle};
use bluec::{Error, compile_source};
use pretty_assertions::assert_eq;

const NO_CORE: CompilerOptions = CompilerOptions {
    compile_core: false,
};

fn compile(source: &str) -> (Bytecode, SymbolTable) {
    compile_source(source, NO_CORE).unwrap()
}

fn stream(parts: Vec<Vec<u8>>) -> Instructions {
    parts.into_iter().collect()
}

const PROGRAM: &str = r#"
import math
import color.*

val limit = 10
var total = 0

fun counter(start) {
    var n = start
    fun() {
        n += 1
        n
    }
}

var next = counter(0)
for i in 0..limit {
    if i % 2 == 0 { continue }
    total = total + next() * math.clamp(i, 0, 5)
    if total > 100 { break }
}

for [k, v] in [[1, 2], [3, 4]] {
    total -= k * v
}

val label = match total {
    0 => "zero",
    1 => "one",
    _ => red("many"),
}

try {
    error("boom")
} catch (e) {
    println(e)
}

var grid = [[0, 0], [0, 0]]
grid[1][0] += math.sqrt(16)
spawn println(filter([1, 2, 3], fun(x) { x > 1 }))
"#;

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_integer_literal() {
    let (bytecode, _) = compile("1");
    assert_eq!(
        bytecode.instructions,
        stream(vec![make(Opcode::Constant, &[0]), make(Opcode::Pop, &[])])
    );
    assert_eq!(bytecode.constants, vec![Constant::Integer(1)]);
}

#[test]
fn test_float_literal() {
    let (bytecode, _) = compile("1.0");
    assert_eq!(
        bytecode.instructions,
        stream(vec![make(Opcode::Constant, &[0]), make(Opcode::Pop, &[])])
    );
    assert_eq!(bytecode.constants, vec![Constant::Float(1.0)]);
}

#[test]
fn test_hex_literal_is_unsigned() {
    let (bytecode, _) = compile("0x05");
    assert_eq!(
        bytecode.instructions,
        stream(vec![make(Opcode::Constant, &[0]), make(Opcode::Pop, &[])])
    );
    assert_eq!(bytecode.constants, vec![Constant::UInteger(5)]);
}

#[test]
fn test_if_else_patches_both_jumps() {
    let (bytecode, _) = compile("if true { 1 } else { 2 }");
    assert_eq!(
        bytecode.instructions,
        stream(vec![
            make(Opcode::True, &[]),
            make(Opcode::JumpNotTruthy, &[10]),
            make(Opcode::Constant, &[0]),
            make(Opcode::Jump, &[13]),
            make(Opcode::Constant, &[1]),
            make(Opcode::Pop, &[]),
        ])
    );
}

#[test]
fn test_for_in_is_lowered_to_indexed_loop() {
    let (bytecode, table) = compile("var x = 0; for i in [10,20,30] { x = x + i }");
    let jumps: Vec<(usize, Opcode, usize)> = bytecode
        .instructions
        .iter()
        .filter(|(_, op, _)| op.is_jump())
        .map(|(pos, op, operands)| (pos, op, operands[0]))
        .collect();

    assert_eq!(jumps.len(), 2);
    let (_, first, end) = jumps[0];
    let (_, second, start) = jumps[1];
    assert_eq!(first, Opcode::JumpNotTruthy);
    assert_eq!(end, bytecode.instructions.len());
    assert_eq!(second, Opcode::Jump);

    // loop start is the condition: `len([..])` is evaluated first
    let (_, op_at_start, operands) = bytecode
        .instructions
        .iter()
        .find(|(pos, _, _)| *pos == start)
        .unwrap();
    let core = stdlib::core();
    assert_eq!(op_at_start, Opcode::GetBuiltin);
    assert_eq!(operands, vec![0, core.builtin_index("len").unwrap()]);

    let builtins: Vec<usize> = bytecode
        .instructions
        .iter()
        .filter(|(_, op, _)| *op == Opcode::GetBuiltin)
        .map(|(_, _, operands)| operands[1])
        .collect();
    assert_eq!(
        builtins,
        vec![
            core.builtin_index("len").unwrap(),
            core.builtin_index("_get_").unwrap(),
        ]
    );

    // the loop variable and its counter are scoped to the loop
    assert!(table.get("i").is_none());
    assert!(table.get("__index_i").is_none());
    assert!(table.get("x").is_some());
}

#[test]
fn test_module_builtin_call() {
    let (bytecode, table) = compile("import math; math.sqrt(4)");
    let math = stdlib::lookup("math").unwrap();

    let symbol = table.get("math").unwrap();
    assert_eq!(symbol.scope, SymbolScope::Global);
    assert!(symbol.immutable);

    let handle = Constant::Module(ModuleHandle {
        name: "math".into(),
        index: math.index,
    });
    let handle_index = bytecode.constants.iter().position(|c| *c == handle).unwrap();
    let four_index = bytecode
        .constants
        .iter()
        .position(|c| *c == Constant::Integer(4))
        .unwrap();

    let expected = stream(vec![
        make(Opcode::Constant, &[handle_index]),
        make(Opcode::SetGlobalImm, &[symbol.index]),
        make(Opcode::GetGlobalImm, &[symbol.index]),
        make(Opcode::GetBuiltin, &[math.index as usize, 0]),
        make(Opcode::Constant, &[four_index]),
        make(Opcode::Call, &[1]),
        make(Opcode::Pop, &[]),
    ]);
    let tail = &bytecode.instructions.as_bytes()[bytecode.instructions.len() - expected.len()..];
    assert_eq!(tail, expected.as_bytes());
}

// =============================================================================
// Invariants
// =============================================================================

fn function_streams(bytecode: &Bytecode) -> Vec<(usize, &bluec::lang::CompiledFunction)> {
    bytecode
        .constants
        .iter()
        .enumerate()
        .filter_map(|(i, c)| match c {
            Constant::Function(f) => Some((i, f)),
            _ => None,
        })
        .collect()
}

/// Free-variable count per function constant, read from the closure sites.
fn free_counts(bytecode: &Bytecode) -> HashMap<usize, usize> {
    let mut counts = HashMap::new();
    let streams = std::iter::once(&bytecode.instructions)
        .chain(function_streams(bytecode).into_iter().map(|(_, f)| &f.instructions));
    for instructions in streams {
        for (_, op, operands) in instructions.iter() {
            if op == Opcode::Closure {
                counts.insert(operands[0], operands[1]);
            }
        }
    }
    counts
}

#[test]
fn test_variable_indices_stay_in_range() {
    let (bytecode, table) = compile_source(PROGRAM, CompilerOptions::default()).unwrap();
    let globals = table.num_definitions();
    let frees = free_counts(&bytecode);

    let check = |instructions: &Instructions, locals: usize, free: usize| {
        for (pos, op, operands) in instructions.iter() {
            let limit = match op {
                Opcode::GetGlobal
                | Opcode::SetGlobal
                | Opcode::GetGlobalImm
                | Opcode::SetGlobalImm => globals,
                Opcode::GetLocal | Opcode::SetLocal | Opcode::GetLocalImm | Opcode::SetLocalImm => {
                    locals
                }
                Opcode::GetFree | Opcode::SetFree | Opcode::GetFreeImm | Opcode::SetFreeImm => free,
                _ => continue,
            };
            assert!(operands[0] < limit, "{} at {} out of range", op, pos);
        }
    };

    check(&bytecode.instructions, 0, 0);
    for (index, function) in function_streams(&bytecode) {
        check(
            &function.instructions,
            function.num_locals,
            frees.get(&index).copied().unwrap_or(0),
        );
    }
}

#[test]
fn test_jumps_land_on_instruction_boundaries() {
    let (bytecode, _) = compile_source(PROGRAM, CompilerOptions::default()).unwrap();
    let streams = std::iter::once(&bytecode.instructions).chain(
        function_streams(&bytecode)
            .into_iter()
            .map(|(_, f)| &f.instructions),
    );

    for instructions in streams {
        assert!(instructions.unpatched_jumps().is_empty());
        let mut boundaries: BTreeSet<usize> = instructions.iter().map(|(pos, _, _)| pos).collect();
        boundaries.insert(instructions.len());
        for (pos, op, operands) in instructions.iter() {
            if op.is_jump() {
                assert!(
                    boundaries.contains(&operands[0]),
                    "{} at {} targets {}",
                    op,
                    pos,
                    operands[0]
                );
            }
        }
    }
}

#[test]
fn test_immutable_slots_are_never_reassigned() {
    let (bytecode, _) = compile_source(PROGRAM, CompilerOptions::default()).unwrap();
    let streams = std::iter::once(&bytecode.instructions).chain(
        function_streams(&bytecode)
            .into_iter()
            .map(|(_, f)| &f.instructions),
    );

    for instructions in streams {
        let mut immutable: HashSet<(bool, usize)> = HashSet::new();
        for (_, op, operands) in instructions.iter() {
            match op {
                Opcode::SetGlobalImm => {
                    immutable.insert((true, operands[0]));
                }
                Opcode::SetLocalImm => {
                    immutable.insert((false, operands[0]));
                }
                _ => {}
            }
        }
        for (pos, op, operands) in instructions.iter() {
            let slot = match op {
                Opcode::SetGlobal => (true, operands[0]),
                Opcode::SetLocal => (false, operands[0]),
                _ => continue,
            };
            assert!(!immutable.contains(&slot), "{} at {} writes an immutable slot", op, pos);
        }
    }
}

#[test]
fn test_free_symbols_follow_first_reference() {
    let (bytecode, _) = compile("fun(x, y, z) { fun() { x; y; x; z } }");
    let (_, outer) = function_streams(&bytecode)[1];
    assert_eq!(
        outer.instructions,
        stream(vec![
            make(Opcode::GetLocal, &[0]),
            make(Opcode::GetLocal, &[1]),
            make(Opcode::GetLocal, &[2]),
            make(Opcode::Closure, &[0, 3]),
            make(Opcode::ReturnValue, &[]),
        ])
    );
}

#[test]
fn test_import_adds_only_the_module_binding() {
    // time has no source; math and color define functions of their own
    for module in ["time", "math", "color"] {
        let mut compiler = Compiler::with_options(NO_CORE);
        let before: HashSet<String> = compiler
            .symbol_table()
            .symbols()
            .map(|s| s.name.clone())
            .collect();

        let source = format!("import {}", module);
        compiler.compile(&parse_source(&source).unwrap()).unwrap();

        let after: Vec<_> = compiler
            .symbol_table()
            .symbols()
            .filter(|s| !before.contains(&s.name))
            .collect();
        assert_eq!(after.len(), 1, "import {}", module);
        assert_eq!(after[0].name, module);
        assert!(after[0].immutable);
        assert_eq!(compiler.symbol_table().symbols().count(), before.len() + 1);

        let builtins_after = compiler
            .symbol_table()
            .symbols()
            .filter(|s| s.scope == SymbolScope::Builtin)
            .count();
        assert_eq!(builtins_after, before.len());
    }
}

#[test]
fn test_qualified_module_definitions_stay_qualified() {
    let (_, table) = compile("import math");
    assert!(table.symbols().all(|s| !s.name.starts_with("math.")));
    let mut members: Vec<&str> = table.members().map(|s| s.name.as_str()).collect();
    members.sort();
    assert_eq!(
        members,
        vec!["math.E", "math.PI", "math._check", "math.clamp", "math.hypot"]
    );
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_errors_carry_phase_prefix() {
    let err = compile_source("var = 1", NO_CORE).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(err.to_string().starts_with("ParserError: 1:"));

    let err = compile_source("nope", NO_CORE).unwrap_err();
    assert_eq!(err.to_string(), "CompileError: 1:1: identifier not found: nope");
}

#[test]
fn test_prelude_is_available_to_programs() {
    let (bytecode, table) =
        compile_source("sum(map([1, 2], fun(x) { x * 2 }))", CompilerOptions::default()).unwrap();
    assert!(table.get("sum").unwrap().immutable);
    assert!(bytecode.instructions.opcodes().ends_with(&[Opcode::Call, Opcode::Pop]));
}

#[test]
fn test_bytecode_serializes() {
    let (bytecode, _) = compile_source(PROGRAM, CompilerOptions::default()).unwrap();
    let bytes = bytecode.to_bytes().unwrap();
    assert_eq!(Bytecode::from_bytes(&bytes).unwrap(), bytecode);
}
