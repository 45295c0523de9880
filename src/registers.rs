//! 6809 register identifiers and their encodings.

use crate::constants;
use num::traits::ToPrimitive;
use num_derive::{FromPrimitive, ToPrimitive};
use util::enum_from_str;

/// Registers visible to the assembler. Discriminants of the encodable
/// registers equal their TFR/EXG post-byte nibble; `PCR` is a pure
/// assembler notion selecting program-counter-relative indexing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
pub enum RegisterId {
    D = 0,
    X = 1,
    Y = 2,
    U = 3,
    S = 4,
    PC = 5,
    A = 8,
    B = 9,
    CC = 10,
    DP = 11,
    PCR = 12,
}

enum_from_str! { RegisterId { D, X, Y, U, S, PC, A, B, CC, DP, PCR } }

impl std::fmt::Display for RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[inline]
pub fn enum_to_u8<T: ToPrimitive + Copy>(val: T) -> u8 {
    val.to_u8().unwrap()
}

impl RegisterId {
    /// Nibble used in the TFR/EXG post-byte, if the register is encodable
    /// there.
    pub fn pair_nibble(self) -> Option<u8> {
        match self {
            RegisterId::PCR => None,
            r => Some(enum_to_u8(r)),
        }
    }

    /// Bit in the PSHS/PULS/PSHU/PULU post-byte. `stack` is the pointer
    /// the instruction operates on; the opposite pointer maps to bit 6 and
    /// the pointer itself cannot be stacked.
    pub fn stack_bit(self, stack: StackRegister) -> Option<u8> {
        match self {
            RegisterId::CC => Some(constants::STACK_CC),
            RegisterId::A => Some(constants::STACK_A),
            RegisterId::B => Some(constants::STACK_B),
            RegisterId::D => Some(constants::STACK_A | constants::STACK_B),
            RegisterId::DP => Some(constants::STACK_DP),
            RegisterId::X => Some(constants::STACK_X),
            RegisterId::Y => Some(constants::STACK_Y),
            RegisterId::PC => Some(constants::STACK_PC),
            RegisterId::U if stack == StackRegister::System => Some(constants::STACK_OTHER),
            RegisterId::S if stack == StackRegister::User => Some(constants::STACK_OTHER),
            _ => None,
        }
    }

    /// Bits 6..5 of the indexed post-byte, for the four index registers.
    pub fn index_bits(self) -> Option<u8> {
        match self {
            RegisterId::X => Some(0x00),
            RegisterId::Y => Some(0x20),
            RegisterId::U => Some(0x40),
            RegisterId::S => Some(0x60),
            _ => None,
        }
    }
}

/// Which hardware stack pointer a stack instruction uses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StackRegister {
    System,
    User,
}
