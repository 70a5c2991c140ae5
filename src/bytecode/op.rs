// =============================================================================
// OPCODES - one byte each, followed by fixed-width big-endian operands
// =============================================================================

/// Operand written into a forward jump before its target is known.
pub const PLACEHOLDER: usize = 0xFFFF;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // constants & literals
    Constant, // u16 const_index
    True,
    False,
    Null,

    // arithmetic & bitwise infix
    Add,
    Minus,
    Star,
    Div,
    FlDiv,
    Pow,
    Percent,
    Carat,
    Ampersand,
    Pipe,

    // ranges, shifts, membership
    Range,
    NonIncRange,
    Lshift,
    Rshift,
    In,
    Notin,

    // comparison (`<` and `<=` are emitted as swapped greater-than)
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // logic
    And,
    Or,

    // prefix
    Neg,
    Bang,
    Tilde,

    // control
    Jump,          // u16 absolute target
    JumpNotTruthy, // u16 absolute target

    // variables
    GetGlobal,    // u16 index
    SetGlobal,    // u16 index
    GetGlobalImm, // u16 index
    SetGlobalImm, // u16 index
    GetLocal,     // u16 index
    SetLocal,     // u16 index
    GetLocalImm,  // u16 index
    SetLocalImm,  // u16 index
    GetFree,      // u16 index
    SetFree,      // u16 index
    GetFreeImm,   // u16 index
    SetFreeImm,   // u16 index
    GetBuiltin,   // u8 module_index, u8 builtin_index
    CurrentClosure,

    // aggregates
    Index,
    IndexSet,
    List, // u16 element count
    Map,  // u16 element count (keys + values)
    Set,  // u16 element count

    // functions
    Call, // u8 argc
    ReturnValue,
    Return,
    Closure, // u16 const_index, u8 free count

    // error handling & concurrency
    Try, // u16 absolute catch target
    EndTry,
    Spawn, // u8 argc
    Defer, // u8 argc
    Eval,
    ExecString,

    // stack
    Pop,
}

/// Printable name and operand layout of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

const NONE: &[usize] = &[];
const U8: &[usize] = &[1];
const U16: &[usize] = &[2];
const U8_U8: &[usize] = &[1, 1];
const U16_U8: &[usize] = &[2, 1];

/// Every opcode, in discriminant order.
pub const ALL: &[Opcode] = &[
    Opcode::Constant,
    Opcode::True,
    Opcode::False,
    Opcode::Null,
    Opcode::Add,
    Opcode::Minus,
    Opcode::Star,
    Opcode::Div,
    Opcode::FlDiv,
    Opcode::Pow,
    Opcode::Percent,
    Opcode::Carat,
    Opcode::Ampersand,
    Opcode::Pipe,
    Opcode::Range,
    Opcode::NonIncRange,
    Opcode::Lshift,
    Opcode::Rshift,
    Opcode::In,
    Opcode::Notin,
    Opcode::Equal,
    Opcode::NotEqual,
    Opcode::GreaterThan,
    Opcode::GreaterThanOrEqual,
    Opcode::And,
    Opcode::Or,
    Opcode::Neg,
    Opcode::Bang,
    Opcode::Tilde,
    Opcode::Jump,
    Opcode::JumpNotTruthy,
    Opcode::GetGlobal,
    Opcode::SetGlobal,
    Opcode::GetGlobalImm,
    Opcode::SetGlobalImm,
    Opcode::GetLocal,
    Opcode::SetLocal,
    Opcode::GetLocalImm,
    Opcode::SetLocalImm,
    Opcode::GetFree,
    Opcode::SetFree,
    Opcode::GetFreeImm,
    Opcode::SetFreeImm,
    Opcode::GetBuiltin,
    Opcode::CurrentClosure,
    Opcode::Index,
    Opcode::IndexSet,
    Opcode::List,
    Opcode::Map,
    Opcode::Set,
    Opcode::Call,
    Opcode::ReturnValue,
    Opcode::Return,
    Opcode::Closure,
    Opcode::Try,
    Opcode::EndTry,
    Opcode::Spawn,
    Opcode::Defer,
    Opcode::Eval,
    Opcode::ExecString,
    Opcode::Pop,
];

// `ALL[i] as u8 == i` for every entry, so `from_u8` can index the table.
const _: () = {
    let mut i = 0;
    while i < ALL.len() {
        assert!(ALL[i] as usize == i);
        i += 1;
    }
    assert!(ALL.len() == Opcode::Pop as usize + 1);
};

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        ALL.get(byte as usize).copied()
    }

    pub fn definition(self) -> Definition {
        use Opcode::*;
        let (name, operand_widths) = match self {
            Constant => ("OpConstant", U16),
            True => ("OpTrue", NONE),
            False => ("OpFalse", NONE),
            Null => ("OpNull", NONE),
            Add => ("OpAdd", NONE),
            Minus => ("OpMinus", NONE),
            Star => ("OpStar", NONE),
            Div => ("OpDiv", NONE),
            FlDiv => ("OpFlDiv", NONE),
            Pow => ("OpPow", NONE),
            Percent => ("OpPercent", NONE),
            Carat => ("OpCarat", NONE),
            Ampersand => ("OpAmpersand", NONE),
            Pipe => ("OpPipe", NONE),
            Range => ("OpRange", NONE),
            NonIncRange => ("OpNonIncRange", NONE),
            Lshift => ("OpLshift", NONE),
            Rshift => ("OpRshift", NONE),
            In => ("OpIn", NONE),
            Notin => ("OpNotin", NONE),
            Equal => ("OpEqual", NONE),
            NotEqual => ("OpNotEqual", NONE),
            GreaterThan => ("OpGreaterThan", NONE),
            GreaterThanOrEqual => ("OpGreaterThanOrEqual", NONE),
            And => ("OpAnd", NONE),
            Or => ("OpOr", NONE),
            Neg => ("OpNeg", NONE),
            Bang => ("OpBang", NONE),
            Tilde => ("OpTilde", NONE),
            Jump => ("OpJump", U16),
            JumpNotTruthy => ("OpJumpNotTruthy", U16),
            GetGlobal => ("OpGetGlobal", U16),
            SetGlobal => ("OpSetGlobal", U16),
            GetGlobalImm => ("OpGetGlobalImm", U16),
            SetGlobalImm => ("OpSetGlobalImm", U16),
            GetLocal => ("OpGetLocal", U16),
            SetLocal => ("OpSetLocal", U16),
            GetLocalImm => ("OpGetLocalImm", U16),
            SetLocalImm => ("OpSetLocalImm", U16),
            GetFree => ("OpGetFree", U16),
            SetFree => ("OpSetFree", U16),
            GetFreeImm => ("OpGetFreeImm", U16),
            SetFreeImm => ("OpSetFreeImm", U16),
            GetBuiltin => ("OpGetBuiltin", U8_U8),
            CurrentClosure => ("OpCurrentClosure", NONE),
            Index => ("OpIndex", NONE),
            IndexSet => ("OpIndexSet", NONE),
            List => ("OpList", U16),
            Map => ("OpMap", U16),
            Set => ("OpSet", U16),
            Call => ("OpCall", U8),
            ReturnValue => ("OpReturnValue", NONE),
            Return => ("OpReturn", NONE),
            Closure => ("OpClosure", U16_U8),
            Try => ("OpTry", U16),
            EndTry => ("OpEndTry", NONE),
            Spawn => ("OpSpawn", U8),
            Defer => ("OpDefer", U8),
            Eval => ("OpEval", NONE),
            ExecString => ("OpExecString", NONE),
            Pop => ("OpPop", NONE),
        };
        Definition {
            name,
            operand_widths,
        }
    }

    /// Encoded size of this instruction, opcode byte included.
    pub fn width(self) -> usize {
        1 + self.definition().operand_widths.iter().sum::<usize>()
    }

    /// Opcodes whose first operand is an absolute position to back-patch.
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpNotTruthy | Opcode::Try)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.definition().name)
    }
}

/// Encodes one instruction.
///
/// Panics if the operand count does not match the definition or an operand
/// does not fit its width; both are compiler bugs, not user errors.
pub fn make(op: Opcode, operands: &[usize]) -> Vec<u8> {
    let def = op.definition();
    assert_eq!(
        operands.len(),
        def.operand_widths.len(),
        "{} takes {} operand(s)",
        def.name,
        def.operand_widths.len()
    );

    let mut instruction = Vec::with_capacity(op.width());
    instruction.push(op as u8);
    for (&operand, &width) in operands.iter().zip(def.operand_widths) {
        match width {
            2 => {
                let value = u16::try_from(operand)
                    .unwrap_or_else(|_| panic!("{} operand {} exceeds u16", def.name, operand));
                instruction.extend_from_slice(&value.to_be_bytes());
            }
            1 => {
                let value = u8::try_from(operand)
                    .unwrap_or_else(|_| panic!("{} operand {} exceeds u8", def.name, operand));
                instruction.push(value);
            }
            _ => unreachable!("unsupported operand width {}", width),
        }
    }
    instruction
}

/// Decodes the operands that follow an opcode byte.
///
/// Returns the operands and the number of bytes they occupied.
pub fn read_operands(def: &Definition, ins: &[u8]) -> (Vec<usize>, usize) {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;
    for &width in def.operand_widths {
        match width {
            2 => operands.push(read_u16(&ins[offset..]) as usize),
            1 => operands.push(ins[offset] as usize),
            _ => unreachable!("unsupported operand width {}", width),
        }
        offset += width;
    }
    (operands, offset)
}

pub fn read_u16(ins: &[u8]) -> u16 {
    u16::from_be_bytes([ins[0], ins[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_big_endian() {
        assert_eq!(make(Opcode::Constant, &[65534]), vec![Opcode::Constant as u8, 255, 254]);
        assert_eq!(make(Opcode::Pop, &[]), vec![Opcode::Pop as u8]);
        assert_eq!(
            make(Opcode::GetBuiltin, &[5, 2]),
            vec![Opcode::GetBuiltin as u8, 5, 2]
        );
        assert_eq!(
            make(Opcode::Closure, &[65534, 255]),
            vec![Opcode::Closure as u8, 255, 254, 255]
        );
    }

    #[test]
    fn test_read_operands() {
        let cases: &[(Opcode, &[usize], usize)] = &[
            (Opcode::Constant, &[65535], 2),
            (Opcode::GetBuiltin, &[3, 7], 2),
            (Opcode::Closure, &[300, 3], 3),
            (Opcode::Call, &[255], 1),
        ];
        for (op, operands, bytes) in cases {
            let instruction = make(*op, operands);
            let (read, n) = read_operands(&op.definition(), &instruction[1..]);
            assert_eq!(n, *bytes);
            assert_eq!(&read[..], *operands);
        }
    }

    #[test]
    fn test_from_u8_covers_every_opcode() {
        for &op in ALL {
            assert_eq!(Opcode::from_u8(op as u8), Some(op));
        }
        assert_eq!(Opcode::from_u8(ALL.len() as u8), None);
    }

    #[test]
    fn test_width() {
        assert_eq!(Opcode::Pop.width(), 1);
        assert_eq!(Opcode::Jump.width(), 3);
        assert_eq!(Opcode::Closure.width(), 4);
    }

    #[test]
    #[should_panic(expected = "exceeds u8")]
    fn test_make_rejects_oversized_operand() {
        make(Opcode::Call, &[256]);
    }
}
