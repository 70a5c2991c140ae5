use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

use crate::bytecode::ir::{Bytecode, Instructions};
use crate::bytecode::op::Opcode;
use crate::lang::value::Constant;

/// Print disassembly of a compiled program
pub fn print_bc(bc: &Bytecode) {
    println!("=== BYTECODE PROGRAM ===\n");
    print!("{}", disassemble_program(bc));
}

/// Main stream first, then every function constant in pool order.
pub fn disassemble_program(bc: &Bytecode) -> String {
    let mut output = String::new();
    write_code_object(&mut output, "main", &bc.instructions);

    for (index, constant) in bc.constants.iter().enumerate() {
        if let Constant::Function(function) = constant {
            let label = format!(
                "fn[{}] params={} locals={}{}",
                index,
                function.num_parameters,
                function.num_locals,
                if function.variadic { " variadic" } else { "" }
            );
            write_code_object(&mut output, &label, &function.instructions);
        }
    }

    if !bc.constants.is_empty() {
        output.push_str("constants:\n");
        for (index, constant) in bc.constants.iter().enumerate() {
            let _ = writeln!(output, "  [{:>4}] {}", index, constant);
        }
    }
    output
}

fn write_code_object(output: &mut String, name: &str, instructions: &Instructions) {
    let count = instructions.iter().count();
    output.push_str("════════════════════════════════════════\n");
    let _ = writeln!(output, " {}", name);
    let _ = writeln!(output, " {} instructions, {} bytes", count, instructions.len());
    output.push_str("════════════════════════════════════════\n");
    output.push_str(&disassemble_to_string(instructions));
    output.push('\n');
}

/// Return disassembly as a String, marking jump targets
pub fn disassemble_to_string(instructions: &Instructions) -> String {
    let mut output = String::new();
    let jump_targets = collect_jump_targets(instructions);

    for (ip, op, operands) in instructions.iter() {
        let target = jump_targets.contains(&ip);
        if target {
            output.push_str("      ┌──────────────────────────────────\n");
        }
        let _ = write!(output, "{:04} {}", ip, if target { "► " } else { "  " });
        output.push_str(&format_instruction(ip, op, &operands));
        output.push('\n');
    }

    output
}

fn collect_jump_targets(instructions: &Instructions) -> BTreeSet<usize> {
    instructions
        .iter()
        .filter(|(_, op, _)| op.is_jump())
        .map(|(_, _, operands)| operands[0])
        .collect()
}

fn format_instruction(ip: usize, op: Opcode, operands: &[usize]) -> String {
    let name = op.definition().name;
    match op {
        Opcode::Jump | Opcode::JumpNotTruthy | Opcode::Try => {
            let target = operands[0];
            let direction = if target <= ip { "↑" } else { "↓" };
            format!("{:<20} {} (→ {:04})", name, direction, target)
        }
        Opcode::GetBuiltin => {
            format!("{:<20} module={} builtin={}", name, operands[0], operands[1])
        }
        Opcode::Closure => format!("{:<20} fn[{}] free={}", name, operands[0], operands[1]),
        _ if operands.is_empty() => name.to_string(),
        _ => {
            let rendered: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
            format!("{:<20} {}", name, rendered.join(" "))
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Print bytecode statistics
pub fn print_bc_stats(bc: &Bytecode) {
    println!("=== BYTECODE STATISTICS ===\n");

    let functions: Vec<&Instructions> = bc
        .constants
        .iter()
        .filter_map(|c| match c {
            Constant::Function(f) => Some(&f.instructions),
            _ => None,
        })
        .collect();

    let main_bytes = bc.instructions.len();
    let function_bytes: usize = functions.iter().map(|i| i.len()).sum();

    println!("Constants:        {}", bc.constants.len());
    println!("Functions:        {}", functions.len());
    println!();
    println!("Bytes:");
    println!("  main:           {}", main_bytes);
    println!("  functions:      {}", function_bytes);
    println!("  total:          {}", main_bytes + function_bytes);
    println!();

    let mut op_counts: HashMap<&str, usize> = HashMap::new();
    for stream in std::iter::once(&bc.instructions).chain(functions) {
        for (_, op, _) in stream.iter() {
            *op_counts.entry(op.definition().name).or_insert(0) += 1;
        }
    }

    let mut counts: Vec<_> = op_counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    println!("Opcode frequency:");
    for (name, count) in counts {
        println!("  {:<20} {}", name, count);
    }
}
