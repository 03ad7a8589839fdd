use crate::Error;
use std::convert::TryFrom;

/// The CHIP-8 op codes this interpreter executes. Register operands are guaranteed to be between
/// 0x0 and 0xF, and addresses to fit in 12 bits.
///
/// Machine code calls (0NNN) are not supported and decode to `Error::UnknownOpcode`.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Op {
    // 00E0     clear the screen
    DispClear,
    // 00EE     return from a subroutine
    Return,

    // 1NNN     jump to NNN
    Goto(u16),
    // 2NNN     call subroutine at NNN
    GotoSubRtn(u16),

    // 3XNN     skip next instruction if VX == NN
    CondVxEq(u8, u8),
    // 4XNN     skip next instruction if VX != NN
    CondVxNe(u8, u8),
    // 5XY_     skip next instruction if VX == VY
    CondVxVyEq(u8, u8),

    // 6XNN     VX = NN
    ConstSetVx(u8, u8),
    // 7XNN     VX += NN, carry is dropped
    ConstAddVx(u8, u8),

    // 8XY0..8XYE
    AssignVyToVx(u8, u8),
    BitOpOr(u8, u8),
    BitOpAnd(u8, u8),
    BitOpXor(u8, u8),
    MathVxAddVy(u8, u8),
    MathVxMinusVy(u8, u8),
    BitOpRtShift(u8),
    MathVyMinusVx(u8, u8),
    BitOpLftShift(u8),

    // 9XY_     skip next instruction if VX != VY
    CondVxVyNe(u8, u8),

    // ANNN     I = NNN
    MemSetI(u16),
    // BNNN     jump to NNN + V0
    GotoPlusV0(u16),
    // CXNN     VX = rand() & NN
    Rand(u8, u8),
    // DXYN     draw an N byte sprite from I at (VX, VY)
    DispDraw(u8, u8, u8),

    // EX9E / EXA1
    KeyOpEqVx(u8),
    KeyOpNeVx(u8),

    // FX__
    DelayGet(u8),
    KeyOpGet(u8),
    DelaySet(u8),
    SoundSet(u8),
    MemIPlusEqVx(u8),
    MemISetSprite(u8),
    Bcd(u8),
    RegDump(u8),
    RegLoad(u8),
}

impl Op {
    /// True for the ops that change what's on screen, so a host knows when to redraw
    pub fn is_display_op(&self) -> bool {
        match self {
            Op::DispClear | Op::DispDraw(..) => true,
            _ => false,
        }
    }
}

/// The fields an instruction word can carry. Which of them mean anything depends on the op.
struct Fields {
    class: u8,
    x: u8,
    y: u8,
    n: u8,
    kk: u8,
    nnn: u16,
}

impl From<u16> for Fields {
    fn from(word: u16) -> Self {
        Fields {
            class: ((word >> 12) & 0xF) as u8,
            x: ((word >> 8) & 0xF) as u8,
            y: ((word >> 4) & 0xF) as u8,
            n: (word & 0xF) as u8,
            kk: (word & 0xFF) as u8,
            nnn: word & 0x0FFF,
        }
    }
}

impl TryFrom<u16> for Op {
    type Error = Error;

    fn try_from(word: u16) -> Result<Self, Self::Error> {
        let Fields {
            class,
            x,
            y,
            n,
            kk,
            nnn,
        } = Fields::from(word);

        let op = match class {
            0x0 => match nnn {
                0x0E0 => Op::DispClear,
                0x0EE => Op::Return,
                _ => return Err(Error::UnknownOpcode(word)),
            },
            0x1 => Op::Goto(nnn),
            0x2 => Op::GotoSubRtn(nnn),
            0x3 => Op::CondVxEq(x, kk),
            0x4 => Op::CondVxNe(x, kk),
            0x5 => Op::CondVxVyEq(x, y),
            0x6 => Op::ConstSetVx(x, kk),
            0x7 => Op::ConstAddVx(x, kk),
            0x8 => match n {
                0x0 => Op::AssignVyToVx(x, y),
                0x1 => Op::BitOpOr(x, y),
                0x2 => Op::BitOpAnd(x, y),
                0x3 => Op::BitOpXor(x, y),
                0x4 => Op::MathVxAddVy(x, y),
                0x5 => Op::MathVxMinusVy(x, y),
                0x6 => Op::BitOpRtShift(x),
                0x7 => Op::MathVyMinusVx(x, y),
                0xE => Op::BitOpLftShift(x),
                _ => return Err(Error::UnknownOpcode(word)),
            },
            0x9 => Op::CondVxVyNe(x, y),
            0xA => Op::MemSetI(nnn),
            0xB => Op::GotoPlusV0(nnn),
            0xC => Op::Rand(x, kk),
            0xD => Op::DispDraw(x, y, n),
            0xE => match kk {
                0x9E => Op::KeyOpEqVx(x),
                0xA1 => Op::KeyOpNeVx(x),
                _ => return Err(Error::UnknownOpcode(word)),
            },
            0xF => match kk {
                0x07 => Op::DelayGet(x),
                0x0A => Op::KeyOpGet(x),
                0x15 => Op::DelaySet(x),
                0x18 => Op::SoundSet(x),
                0x1E => Op::MemIPlusEqVx(x),
                0x29 => Op::MemISetSprite(x),
                0x33 => Op::Bcd(x),
                0x55 => Op::RegDump(x),
                0x65 => Op::RegLoad(x),
                _ => return Err(Error::UnknownOpcode(word)),
            },
            _ => unreachable!("class is a 4 bit value"),
        };

        Ok(op)
    }
}
