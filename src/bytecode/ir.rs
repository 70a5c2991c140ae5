use serde::{Deserialize, Serialize};

use crate::bytecode::op::{Opcode, PLACEHOLDER, read_operands};
use crate::lang::value::Constant;

/// A packed instruction stream: opcode bytes followed by big-endian operands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions(pub Vec<u8>);

impl Instructions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Overwrites the bytes starting at `pos`.
    pub fn overwrite(&mut self, pos: usize, bytes: &[u8]) {
        self.0[pos..pos + bytes.len()].copy_from_slice(bytes);
    }

    pub fn opcode_at(&self, pos: usize) -> Option<Opcode> {
        self.0.get(pos).copied().and_then(Opcode::from_u8)
    }

    /// Walks the stream instruction by instruction.
    ///
    /// Yields `(position, opcode, operands)`; stops at the first byte that
    /// is not a known opcode.
    pub fn iter(&self) -> InstructionIter<'_> {
        InstructionIter {
            bytes: &self.0,
            pos: 0,
        }
    }

    /// Opcodes in order, without operands.
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.iter().map(|(_, op, _)| op).collect()
    }

    /// Positions of jumps whose target is still `PLACEHOLDER`.
    pub fn unpatched_jumps(&self) -> Vec<usize> {
        self.iter()
            .filter(|(_, op, operands)| op.is_jump() && operands[0] == PLACEHOLDER)
            .map(|(pos, _, _)| pos)
            .collect()
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Concatenates encoded instructions; handy for building expected streams.
impl FromIterator<Vec<u8>> for Instructions {
    fn from_iter<I: IntoIterator<Item = Vec<u8>>>(iter: I) -> Self {
        Self(iter.into_iter().flatten().collect())
    }
}

pub struct InstructionIter<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Iterator for InstructionIter<'_> {
    type Item = (usize, Opcode, Vec<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let op = Opcode::from_u8(*self.bytes.get(self.pos)?)?;
        let def = op.definition();
        let start = self.pos;
        if start + op.width() > self.bytes.len() {
            return None;
        }
        let (operands, read) = read_operands(&def, &self.bytes[start + 1..]);
        self.pos = start + 1 + read;
        Some((start, op, operands))
    }
}

/// One line per instruction: `0000 OpConstant 0`.
impl std::fmt::Display for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (pos, op, operands) in self.iter() {
            write!(f, "{:04} {}", pos, op)?;
            for operand in operands {
                write!(f, " {}", operand)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Output of a compilation: the main instruction stream and its constant pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Constant>,
}

impl Bytecode {
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
