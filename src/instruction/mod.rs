//! Decoded [instructions](https://inform-fiction.org/zmachine/standards/z1point1/sect04.html)
use std::fmt;

pub mod decoder;
pub mod processor;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
/// [Opcode forms](https://inform-fiction.org/zmachine/standards/z1point1/sect04.html#three)
pub enum OpcodeForm {
    Short,
    Long,
    Var,
    Ext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// [Operand types](https://inform-fiction.org/zmachine/standards/z1point1/sect04.html#two)
pub enum OperandType {
    LargeConstant,
    SmallConstant,
    Variable,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
/// [Operands](https://inform-fiction.org/zmachine/standards/z1point1/sect04.html#five)
pub struct Operand {
    /// The [OperandType]
    operand_type: OperandType,
    /// Operand value
    value: u16,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.operand_type {
            OperandType::LargeConstant => write!(f, "#{:04x}", self.value),
            OperandType::SmallConstant => write!(f, "#{:02x}", self.value as u8),
            OperandType::Variable => {
                if self.value == 0 {
                    write!(f, "(SP)+")
                } else if self.value < 16 {
                    write!(f, "L{:02x}", self.value - 1)
                } else {
                    write!(f, "G{:02x}", self.value - 16)
                }
            }
        }
    }
}

impl Operand {
    pub fn new(operand_type: OperandType, value: u16) -> Operand {
        Operand {
            operand_type,
            value,
        }
    }

    pub fn operand_type(&self) -> OperandType {
        self.operand_type
    }

    pub fn value(&self) -> u16 {
        self.value
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
/// Branching information
pub struct Branch {
    /// Address of the (first) branch descriptor byte
    address: usize,
    /// Branch-on condition
    condition: bool,
    /// Address of the branch destination, 0 to return false, 1 to return true
    branch_address: usize,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] ", self.condition)?;
        match self.branch_address {
            0 => write!(f, "RFALSE"),
            1 => write!(f, "RTRUE"),
            _ => write!(f, "${:05x}", self.branch_address),
        }
    }
}

impl Branch {
    pub fn new(address: usize, condition: bool, branch_address: usize) -> Branch {
        Branch {
            address,
            condition,
            branch_address,
        }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn condition(&self) -> bool {
        self.condition
    }

    pub fn branch_address(&self) -> usize {
        self.branch_address
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
/// Where the result of an instruction will be stored
pub struct StoreResult {
    /// Address of the store result descriptor byte
    address: usize,
    /// Variable to store to
    variable: u8,
}

impl fmt::Display for StoreResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.variable == 0 {
            write!(f, "-(SP)")
        } else if self.variable < 16 {
            write!(f, "L{:02x}", self.variable - 1)
        } else {
            write!(f, "G{:02x}", self.variable - 16)
        }
    }
}

impl StoreResult {
    pub fn new(address: usize, variable: u8) -> StoreResult {
        StoreResult { address, variable }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn variable(&self) -> u8 {
        self.variable
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
/// [Operand count](https://inform-fiction.org/zmachine/standards/z1point1/sect04.html#five)
pub enum OperandCount {
    _0OP,
    _1OP,
    _2OP,
    _VAR,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Opcode {
    version: u8,
    opcode: u8,
    instruction: u8,
    form: OpcodeForm,
    operand_count: OperandCount,
}

const NAMES_0OP: [&str; 16] = [
    "RTRUE",
    "RFALSE",
    "PRINT",
    "PRINT_RET",
    "NOP",
    "SAVE",
    "RESTORE",
    "RESTART",
    "RET_POPPED",
    "POP",
    "QUIT",
    "NEW_LINE",
    "SHOW_STATUS",
    "VERIFY",
    "",
    "PIRACY",
];

const NAMES_1OP: [&str; 16] = [
    "JZ",
    "GET_SIBLING",
    "GET_CHILD",
    "GET_PARENT",
    "GET_PROP_LEN",
    "INC",
    "DEC",
    "PRINT_ADDR",
    "CALL_1S",
    "REMOVE_OBJ",
    "PRINT_OBJ",
    "RET",
    "JUMP",
    "PRINT_PADDR",
    "LOAD",
    "NOT",
];

const NAMES_2OP: [&str; 32] = [
    "", "JE", "JL", "JG", "DEC_CHK", "INC_CHK", "JIN", "TEST",
    "OR", "AND", "TEST_ATTR", "SET_ATTR", "CLEAR_ATTR", "STORE", "INSERT_OBJ", "LOADW",
    "LOADB", "GET_PROP", "GET_PROP_ADDR", "GET_NEXT_PROP", "ADD", "SUB", "MUL", "DIV",
    "MOD", "CALL_2S", "CALL_2N", "SET_COLOUR", "THROW", "", "", "",
];

const NAMES_VAR: [&str; 32] = [
    "CALL_VS", "STOREW", "STOREB", "PUT_PROP", "AREAD", "PRINT_CHAR", "PRINT_NUM", "RANDOM",
    "PUSH", "PULL", "SPLIT_WINDOW", "SET_WINDOW", "CALL_VS2", "ERASE_WINDOW", "ERASE_LINE", "SET_CURSOR",
    "GET_CURSOR", "SET_TEXT_STYLE", "BUFFER_MODE", "OUTPUT_STREAM", "INPUT_STREAM", "SOUND_EFFECT", "READ_CHAR", "SCAN_TABLE",
    "NOT", "CALL_VN", "CALL_VN2", "TOKENISE", "ENCODE_TEXT", "COPY_TABLE", "PRINT_TABLE", "CHECK_ARG_COUNT",
];

// Extended opcodes 0x05 through 0x08 are V6 only
const NAMES_EXT: [&str; 14] = [
    "SAVE",
    "RESTORE",
    "LOG_SHIFT",
    "ART_SHIFT",
    "SET_FONT",
    "",
    "",
    "",
    "",
    "SAVE_UNDO",
    "RESTORE_UNDO",
    "PRINT_UNICODE",
    "CHECK_UNICODE",
    "SET_TRUE_COLOUR",
];

impl Opcode {
    /// Mnemonic, accounting for opcodes that were renamed or reassigned between versions
    pub fn name(&self) -> &'static str {
        let i = self.instruction as usize;
        let name = match (self.form, self.operand_count) {
            (OpcodeForm::Ext, _) => NAMES_EXT.get(i).copied(),
            (_, OperandCount::_0OP) if i == 0x9 && self.version >= 5 => Some("CATCH"),
            (_, OperandCount::_0OP) => NAMES_0OP.get(i).copied(),
            (_, OperandCount::_1OP) if i == 0xF && self.version >= 5 => Some("CALL_1N"),
            (_, OperandCount::_1OP) => NAMES_1OP.get(i).copied(),
            (_, OperandCount::_2OP) => NAMES_2OP.get(i).copied(),
            (_, OperandCount::_VAR) if i == 0x0 && self.version < 4 => Some("CALL"),
            (_, OperandCount::_VAR) if i == 0x4 && self.version < 5 => Some("SREAD"),
            (_, OperandCount::_VAR) => NAMES_VAR.get(i).copied(),
        };
        match name {
            Some(n) if !n.is_empty() => n,
            _ => "UNKNOWN!",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Opcode {
    pub fn new(
        version: u8,
        opcode: u8,
        instruction: u8,
        form: OpcodeForm,
        operand_count: OperandCount,
    ) -> Opcode {
        Opcode {
            version,
            opcode,
            instruction,
            form,
            operand_count,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// The raw opcode byte (the second byte for extended opcodes)
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Instruction number within the operand count group
    pub fn instruction(&self) -> u8 {
        self.instruction
    }

    pub fn form(&self) -> OpcodeForm {
        self.form
    }

    pub fn operand_count(&self) -> OperandCount {
        self.operand_count
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
/// [Instruction](https://inform-fiction.org/zmachine/standards/z1point1/sect04.html#one)
pub struct Instruction {
    /// Address of the instruction in memory
    address: usize,
    /// Instruction [Opcode]
    opcode: Opcode,
    /// Vector of [Operand] values
    operands: Vec<Operand>,
    /// [Option] containing the [StoreResult] if the instruction stores a result
    store: Option<StoreResult>,
    /// [Option] containing the [Branch] information if the instruction branches
    branch: Option<Branch>,
    /// Address of the instruction immediately following this one in memory
    next_address: usize,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "${:05x}: {}", self.address, self.opcode)?;

        for o in &self.operands {
            write!(f, " {}", o)?;
        }

        if let Some(s) = self.store {
            write!(f, " -> {}", s)?
        }

        if let Some(b) = &self.branch {
            write!(f, " {}", b)?
        }

        Ok(())
    }
}

impl Instruction {
    pub fn new(
        address: usize,
        opcode: Opcode,
        operands: Vec<Operand>,
        store: Option<StoreResult>,
        branch: Option<Branch>,
        next_address: usize,
    ) -> Instruction {
        Instruction {
            address,
            opcode,
            operands,
            store,
            branch,
            next_address,
        }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn opcode(&self) -> &Opcode {
        &self.opcode
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn store(&self) -> Option<&StoreResult> {
        self.store.as_ref()
    }

    pub fn branch(&self) -> Option<&Branch> {
        self.branch.as_ref()
    }

    /// Replace the next address, used when a literal string follows the opcode
    pub fn set_next_address(&mut self, next_address: usize) {
        self.next_address = next_address;
    }

    pub fn next_address(&self) -> usize {
        self.next_address
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
/// What to execute after an instruction
pub enum NextAddress {
    /// Continue at an address
    Address(usize),
    /// Wait for a line of input; the read instruction runs again once input arrives
    Input,
    /// QUITting
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_display() {
        assert_eq!(
            format!("{}", Operand::new(OperandType::LargeConstant, 0x1234)),
            "#1234"
        );
        assert_eq!(
            format!("{}", Operand::new(OperandType::SmallConstant, 0x12)),
            "#12"
        );
        assert_eq!(format!("{}", Operand::new(OperandType::Variable, 0)), "(SP)+");
        assert_eq!(format!("{}", Operand::new(OperandType::Variable, 3)), "L02");
        assert_eq!(format!("{}", Operand::new(OperandType::Variable, 0x12)), "G02");
    }

    #[test]
    fn test_store_display() {
        assert_eq!(format!("{}", StoreResult::new(0, 0)), "-(SP)");
        assert_eq!(format!("{}", StoreResult::new(0, 1)), "L00");
        assert_eq!(format!("{}", StoreResult::new(0, 0x10)), "G00");
    }

    #[test]
    fn test_opcode_names() {
        let o = Opcode::new(3, 0xB9, 0x9, OpcodeForm::Short, OperandCount::_0OP);
        assert_eq!(format!("{}", o), "POP");
        let o = Opcode::new(5, 0xB9, 0x9, OpcodeForm::Short, OperandCount::_0OP);
        assert_eq!(format!("{}", o), "CATCH");
        let o = Opcode::new(5, 0x09, 0x09, OpcodeForm::Ext, OperandCount::_VAR);
        assert_eq!(format!("{}", o), "SAVE_UNDO");
        let o = Opcode::new(3, 0xE4, 0x04, OpcodeForm::Var, OperandCount::_VAR);
        assert_eq!(format!("{}", o), "SREAD");
        let o = Opcode::new(5, 0xBE, 0x0E, OpcodeForm::Short, OperandCount::_0OP);
        assert_eq!(o.name(), "UNKNOWN!");
        let o = Opcode::new(5, 0x1D, 0x1D, OpcodeForm::Ext, OperandCount::_VAR);
        assert_eq!(o.name(), "UNKNOWN!");
    }

    #[test]
    fn test_instruction_display() {
        let i = Instruction::new(
            0x1234,
            Opcode::new(3, 0x41, 0x01, OpcodeForm::Long, OperandCount::_2OP),
            vec![
                Operand::new(OperandType::Variable, 0x10),
                Operand::new(OperandType::SmallConstant, 0x05),
            ],
            None,
            Some(Branch::new(0x1237, true, 0x1240)),
            0x1238,
        );
        assert_eq!(format!("{}", i), "$01234: JE G00 #05 [true] $01240");
    }
}
