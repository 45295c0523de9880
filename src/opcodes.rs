//! The 6809 opcode table.
//!
//! One entry per mnemonic, recording the opcode value for every addressing
//! form the instruction supports. Page-2/page-3 opcodes are stored with
//! their prefix byte, e.g. `0x108E` for `LDY #`.

use crate::registers::StackRegister;

/// Width of a relative branch displacement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RelSize {
    Short,
    Long,
}

/// Addressing forms a mnemonic admits, with the opcode for each.
#[derive(Clone, Copy, Debug)]
pub enum AddrForms {
    /// No operand at all.
    Inherent { op: u16 },
    /// Memory-class instruction: any of immediate, direct, indexed and
    /// extended. `wide` selects a 16-bit immediate operand.
    Memory {
        imm: Option<u16>,
        wide: bool,
        direct: Option<u16>,
        indexed: Option<u16>,
        extended: Option<u16>,
    },
    /// PC-relative branch.
    Relative { op: u16, size: RelSize },
    /// Register-set push/pull with a stack post-byte.
    Stack { op: u16, ptr: StackRegister },
    /// Two-register post-byte (TFR/EXG).
    Pair { op: u16 },
}

#[derive(Clone, Copy, Debug)]
pub struct OpcodeEntry {
    pub mnemonic: &'static str,
    pub forms: AddrForms,
}

macro_rules! inh {
    ($m:expr, $op:expr) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Inherent { op: $op },
        }
    };
}

macro_rules! acc8 {
    ($m:expr, $imm:expr, $dir:expr, $idx:expr, $ext:expr) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Memory {
                imm: Some($imm),
                wide: false,
                direct: Some($dir),
                indexed: Some($idx),
                extended: Some($ext),
            },
        }
    };
}

macro_rules! acc16 {
    ($m:expr, $imm:expr, $dir:expr, $idx:expr, $ext:expr) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Memory {
                imm: Some($imm),
                wide: true,
                direct: Some($dir),
                indexed: Some($idx),
                extended: Some($ext),
            },
        }
    };
}

macro_rules! mem {
    ($m:expr, $dir:expr, $idx:expr, $ext:expr) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Memory {
                imm: None,
                wide: false,
                direct: Some($dir),
                indexed: Some($idx),
                extended: Some($ext),
            },
        }
    };
}

macro_rules! immo {
    ($m:expr, $op:expr) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Memory {
                imm: Some($op),
                wide: false,
                direct: None,
                indexed: None,
                extended: None,
            },
        }
    };
}

macro_rules! lea {
    ($m:expr, $op:expr) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Memory {
                imm: None,
                wide: false,
                direct: None,
                indexed: Some($op),
                extended: None,
            },
        }
    };
}

macro_rules! rel {
    ($m:expr, $op:expr, $size:ident) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Relative {
                op: $op,
                size: RelSize::$size,
            },
        }
    };
}

macro_rules! stack {
    ($m:expr, $op:expr, $ptr:ident) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Stack {
                op: $op,
                ptr: StackRegister::$ptr,
            },
        }
    };
}

macro_rules! pair {
    ($m:expr, $op:expr) => {
        OpcodeEntry {
            mnemonic: $m,
            forms: AddrForms::Pair { op: $op },
        }
    };
}

#[rustfmt::skip]
static TABLE: &[OpcodeEntry] = &[
    // Read-modify-write memory group.
    mem!("NEG", 0x00, 0x60, 0x70),
    mem!("COM", 0x03, 0x63, 0x73),
    mem!("LSR", 0x04, 0x64, 0x74),
    mem!("ROR", 0x06, 0x66, 0x76),
    mem!("ASR", 0x07, 0x67, 0x77),
    mem!("ASL", 0x08, 0x68, 0x78),
    mem!("LSL", 0x08, 0x68, 0x78),
    mem!("ROL", 0x09, 0x69, 0x79),
    mem!("DEC", 0x0A, 0x6A, 0x7A),
    mem!("INC", 0x0C, 0x6C, 0x7C),
    mem!("TST", 0x0D, 0x6D, 0x7D),
    mem!("JMP", 0x0E, 0x6E, 0x7E),
    mem!("CLR", 0x0F, 0x6F, 0x7F),
    mem!("JSR", 0x9D, 0xAD, 0xBD),

    // Inherent.
    inh!("NOP",  0x12),
    inh!("SYNC", 0x13),
    inh!("DAA",  0x19),
    inh!("SEX",  0x1D),
    inh!("RTS",  0x39),
    inh!("ABX",  0x3A),
    inh!("RTI",  0x3B),
    inh!("MUL",  0x3D),
    inh!("SWI",  0x3F),
    inh!("SWI2", 0x103F),
    inh!("SWI3", 0x113F),
    inh!("NEGA", 0x40),
    inh!("COMA", 0x43),
    inh!("LSRA", 0x44),
    inh!("RORA", 0x46),
    inh!("ASRA", 0x47),
    inh!("ASLA", 0x48),
    inh!("LSLA", 0x48),
    inh!("ROLA", 0x49),
    inh!("DECA", 0x4A),
    inh!("INCA", 0x4C),
    inh!("TSTA", 0x4D),
    inh!("CLRA", 0x4F),
    inh!("NEGB", 0x50),
    inh!("COMB", 0x53),
    inh!("LSRB", 0x54),
    inh!("RORB", 0x56),
    inh!("ASRB", 0x57),
    inh!("ASLB", 0x58),
    inh!("LSLB", 0x58),
    inh!("ROLB", 0x59),
    inh!("DECB", 0x5A),
    inh!("INCB", 0x5C),
    inh!("TSTB", 0x5D),
    inh!("CLRB", 0x5F),

    // Condition-code immediates and CWAI.
    immo!("ORCC",  0x1A),
    immo!("ANDCC", 0x1C),
    immo!("CWAI",  0x3C),

    // Transfer/exchange and stack.
    pair!("EXG", 0x1E),
    pair!("TFR", 0x1F),
    stack!("PSHS", 0x34, System),
    stack!("PULS", 0x35, System),
    stack!("PSHU", 0x36, User),
    stack!("PULU", 0x37, User),

    // Load effective address.
    lea!("LEAX", 0x30),
    lea!("LEAY", 0x31),
    lea!("LEAS", 0x32),
    lea!("LEAU", 0x33),

    // Accumulator A group.
    acc8!("SUBA", 0x80, 0x90, 0xA0, 0xB0),
    acc8!("CMPA", 0x81, 0x91, 0xA1, 0xB1),
    acc8!("SBCA", 0x82, 0x92, 0xA2, 0xB2),
    acc8!("ANDA", 0x84, 0x94, 0xA4, 0xB4),
    acc8!("BITA", 0x85, 0x95, 0xA5, 0xB5),
    acc8!("LDA",  0x86, 0x96, 0xA6, 0xB6),
    acc8!("EORA", 0x88, 0x98, 0xA8, 0xB8),
    acc8!("ADCA", 0x89, 0x99, 0xA9, 0xB9),
    acc8!("ORA",  0x8A, 0x9A, 0xAA, 0xBA),
    acc8!("ADDA", 0x8B, 0x9B, 0xAB, 0xBB),
    mem!("STA", 0x97, 0xA7, 0xB7),

    // Accumulator B group.
    acc8!("SUBB", 0xC0, 0xD0, 0xE0, 0xF0),
    acc8!("CMPB", 0xC1, 0xD1, 0xE1, 0xF1),
    acc8!("SBCB", 0xC2, 0xD2, 0xE2, 0xF2),
    acc8!("ANDB", 0xC4, 0xD4, 0xE4, 0xF4),
    acc8!("BITB", 0xC5, 0xD5, 0xE5, 0xF5),
    acc8!("LDB",  0xC6, 0xD6, 0xE6, 0xF6),
    acc8!("EORB", 0xC8, 0xD8, 0xE8, 0xF8),
    acc8!("ADCB", 0xC9, 0xD9, 0xE9, 0xF9),
    acc8!("ORB",  0xCA, 0xDA, 0xEA, 0xFA),
    acc8!("ADDB", 0xCB, 0xDB, 0xEB, 0xFB),
    mem!("STB", 0xD7, 0xE7, 0xF7),

    // 16-bit group.
    acc16!("SUBD", 0x83, 0x93, 0xA3, 0xB3),
    acc16!("ADDD", 0xC3, 0xD3, 0xE3, 0xF3),
    acc16!("CMPX", 0x8C, 0x9C, 0xAC, 0xBC),
    acc16!("LDX",  0x8E, 0x9E, 0xAE, 0xBE),
    acc16!("LDD",  0xCC, 0xDC, 0xEC, 0xFC),
    acc16!("LDU",  0xCE, 0xDE, 0xEE, 0xFE),
    mem!("STX", 0x9F, 0xAF, 0xBF),
    mem!("STD", 0xDD, 0xED, 0xFD),
    mem!("STU", 0xDF, 0xEF, 0xFF),
    acc16!("CMPD", 0x1083, 0x1093, 0x10A3, 0x10B3),
    acc16!("CMPY", 0x108C, 0x109C, 0x10AC, 0x10BC),
    acc16!("LDY",  0x108E, 0x109E, 0x10AE, 0x10BE),
    acc16!("LDS",  0x10CE, 0x10DE, 0x10EE, 0x10FE),
    mem!("STY", 0x109F, 0x10AF, 0x10BF),
    mem!("STS", 0x10DF, 0x10EF, 0x10FF),
    acc16!("CMPU", 0x1183, 0x1193, 0x11A3, 0x11B3),
    acc16!("CMPS", 0x118C, 0x119C, 0x11AC, 0x11BC),

    // Short branches.
    rel!("BRA", 0x20, Short),
    rel!("BRN", 0x21, Short),
    rel!("BHI", 0x22, Short),
    rel!("BLS", 0x23, Short),
    rel!("BHS", 0x24, Short),
    rel!("BCC", 0x24, Short),
    rel!("BLO", 0x25, Short),
    rel!("BCS", 0x25, Short),
    rel!("BNE", 0x26, Short),
    rel!("BEQ", 0x27, Short),
    rel!("BVC", 0x28, Short),
    rel!("BVS", 0x29, Short),
    rel!("BPL", 0x2A, Short),
    rel!("BMI", 0x2B, Short),
    rel!("BGE", 0x2C, Short),
    rel!("BLT", 0x2D, Short),
    rel!("BGT", 0x2E, Short),
    rel!("BLE", 0x2F, Short),
    rel!("BSR", 0x8D, Short),

    // Long branches.
    rel!("LBRA", 0x16, Long),
    rel!("LBSR", 0x17, Long),
    rel!("LBRN", 0x1021, Long),
    rel!("LBHI", 0x1022, Long),
    rel!("LBLS", 0x1023, Long),
    rel!("LBHS", 0x1024, Long),
    rel!("LBCC", 0x1024, Long),
    rel!("LBLO", 0x1025, Long),
    rel!("LBCS", 0x1025, Long),
    rel!("LBNE", 0x1026, Long),
    rel!("LBEQ", 0x1027, Long),
    rel!("LBVC", 0x1028, Long),
    rel!("LBVS", 0x1029, Long),
    rel!("LBPL", 0x102A, Long),
    rel!("LBMI", 0x102B, Long),
    rel!("LBGE", 0x102C, Long),
    rel!("LBLT", 0x102D, Long),
    rel!("LBGT", 0x102E, Long),
    rel!("LBLE", 0x102F, Long),
];

/// Looks up a mnemonic. The caller supplies it upper-cased.
pub fn lookup(mnemonic: &str) -> Option<&'static OpcodeEntry> {
    TABLE.iter().find(|e| e.mnemonic == mnemonic)
}

/// Pointer the stack instructions of an entry operate on; see
/// [`StackRegister`].
pub use crate::registers::StackRegister as StackPtr;
