use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::bytecode::ir::Instructions;

/// Runtime object materialised at compile time and stored in the constant pool.
///
/// Identity of a constant is its index in the pool; equal values compiled
/// twice occupy two slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// 64-bit signed integer.
    Integer(i64),

    /// 64-bit unsigned integer, produced by `0x`, `0o` and `0b` literals.
    UInteger(u64),

    /// 64-bit floating-point number.
    Float(f64),

    /// Arbitrary-precision integer: `123n`.
    BigInteger(BigInt),

    /// Arbitrary-precision decimal kept as its normalised source text: `1.5n`.
    BigFloat(String),

    /// UTF-8 string value.
    String(String),

    /// Regex source, compiled by the VM on first use.
    Regex(String),

    /// A function body; wrapped into a closure by `OpClosure`.
    Function(CompiledFunction),

    /// Handle to an imported standard module.
    Module(ModuleHandle),
}

/// Bytecode and frame layout of one function literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
    pub variadic: bool,
}

/// The VM resolves member access through the module index; the module's
/// environment itself is never materialised at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleHandle {
    pub name: String,
    pub index: u8,
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Integer(n) => write!(f, "Integer({})", n),
            Constant::UInteger(n) => write!(f, "UInteger({})", n),
            Constant::Float(n) => write!(f, "Float({:?})", n),
            Constant::BigInteger(n) => write!(f, "BigInteger({})", n),
            Constant::BigFloat(s) => write!(f, "BigFloat({})", s),
            Constant::String(s) => write!(f, "String({:?})", s),
            Constant::Regex(s) => write!(f, "Regex(r/{}/)", s),
            Constant::Function(func) => write!(
                f,
                "Function(params={}, locals={}{}, {} bytes)",
                func.num_parameters,
                func.num_locals,
                if func.variadic { ", variadic" } else { "" },
                func.instructions.len()
            ),
            Constant::Module(module) => write!(f, "Module({}#{})", module.name, module.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scalars() {
        assert_eq!(Constant::Integer(1).to_string(), "Integer(1)");
        assert_eq!(Constant::Float(1.0).to_string(), "Float(1.0)");
        assert_eq!(Constant::UInteger(5).to_string(), "UInteger(5)");
        assert_eq!(
            Constant::String("hi".into()).to_string(),
            "String(\"hi\")"
        );
    }

    #[test]
    fn test_display_module() {
        let module = Constant::Module(ModuleHandle {
            name: "math".into(),
            index: 5,
        });
        assert_eq!(module.to_string(), "Module(math#5)");
    }
}
