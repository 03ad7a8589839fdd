//! An implementation of the CHIP-8 interpreter in Rust. The crate is the interpreter core only:
//! a host drives it by calling [`Emulator::cycle`] at its chosen rate, [`Emulator::tick_timers`]
//! at 60 Hz, feeds it key state, and renders whatever the [`Display`] holds.
//!
//! # Interpreter
//! * 4096 (0x1000) bytes of memory
//! * the built-in hex font lives in the first 80 bytes, programs are loaded at 0x200
//! * 16 8-bit registers: V0 - VF
//! * VF is the carry flag in addition, the "no borrow" flag in subtraction, the shifted out bit
//!   in shifts, and the collision flag when drawing
//! * the address register I is 16 bits wide
//! * the stack holds up to 16 return addresses and is only used by calls and returns
//!
//! # Timers
//! * two timers counting down at 60 hertz
//!  - delay timer is used for events, it can be set and read
//!  - sound timer beeps while its value is nonzero
//!
//! # Input
//! a 16 key hex keyboard with values 0 - F. Three op codes deal with input
//!  - one skips an instruction if a specific key is pressed
//!  - one skips an instruction if a specific key is NOT pressed
//!  - one waits for a key press and stores it in a register
//!
//! # Graphics
//! 64x32 monochrome pixels, sprites are XORed on and wrap around the edges
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use slog::{debug, error, info, o, trace, Discard, Logger};
use std::convert::TryFrom;
use std::ops::Range;
use std::path::Path;

mod graphics;
mod keyboard;
mod op;

pub use graphics::{xor_row, Display, Graphics, HEIGHT, PIXEL_ON, WIDTH};
pub use keyboard::{AsKeyboard, Key, Keyboard};
pub use op::Op;

pub const MEMORY_SIZE: usize = 4096;

/// Where programs get loaded, and where execution begins
pub const STARTING_MEMORY_BYTE: usize = 0x200;

pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - STARTING_MEMORY_BYTE;

/// Number of return addresses the call stack can hold
pub const STACK_SIZE: usize = 16;

pub const NUM_REGISTERS: usize = 16;

/// Address of the glyph for hex digit 0, the remaining glyphs follow it
pub const FONT_BASE: u16 = 0x000;

pub const NUM_BYTES_IN_FONT_CHAR: u8 = 5;

// the flag register
const VF: usize = 0xF;

const FONT_SET: [u8; 16 * NUM_BYTES_IN_FONT_CHAR as usize] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Everything that stops the interpreter. None of these are recoverable from inside the
/// interpreter; the host decides whether to halt or `reset`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown opcode {0:#06X}")]
    UnknownOpcode(u16),

    #[error("call stack overflow")]
    StackOverflow,

    #[error("return with an empty call stack")]
    StackUnderflow,

    #[error("memory access out of bounds at {0:#06X}")]
    MemoryOutOfBounds(usize),

    #[error("ROM is {size} bytes, at most {max} fit in memory")]
    RomTooLarge { size: usize, max: usize },

    #[error("unable to read ROM: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Tunables for an `Emulator`. Every field has a default, so a partial config deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many instructions `Emulator::run_frame` executes before ticking the timers once
    pub cycles_per_frame: usize,
    /// Seed for the CXNN random number generator. Unseeded runs draw from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cycles_per_frame: 10,
            rng_seed: None,
        }
    }
}

/// The address and word of the most recently fetched instruction, for tracing and
/// disassembly tooling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Snapshot {
    pub pc: u16,
    pub opcode: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// An FX0A is waiting on a key press. Nothing gets fetched until one arrives, at which point
    /// the key's value is stored in `register`.
    WaitingForKey { register: usize },
}

pub struct Emulator<D: Display = Graphics> {
    memory: [u8; MEMORY_SIZE],

    stack: [u16; STACK_SIZE], // return addresses
    sp: usize,                // number of return addresses on the stack

    addr: u16, // the I register
    pc: u16,

    // 16 8-bit registers. VF is used as a flag by several of the opcodes (see `Op`)
    v: [u8; NUM_REGISTERS],

    delay_timer: u8, // 60 Hz timer that can be set and read
    sound_timer: u8, // 60 Hz timer that beeps whenever it is nonzero

    graphics: D,
    keyboard: Keyboard,
    state: RunState,
    last_fetch: Snapshot,

    rom: Vec<u8>, // kept around so `reset` can reload it
    rng: StdRng,
    config: Config,
    logger: Logger,
}

impl Emulator<Graphics> {
    /// Create an emulator with the default config, drawing into an in-memory `Graphics`.
    /// Pass `None` to discard all logging.
    pub fn new(logger: Option<Logger>) -> Self {
        Self::with_config(Config::default(), logger)
    }

    pub fn with_config(config: Config, logger: Option<Logger>) -> Self {
        Self::with_display(Graphics::new(), config, logger)
    }

    /// Create an emulator and load the ROM at `path` into it
    pub fn with_game_file<P: AsRef<Path>>(path: P, logger: Option<Logger>) -> Result<Self> {
        let rom = std::fs::read(path.as_ref())?;
        let mut emulator = Self::new(logger);
        emulator.load_rom(&rom)?;
        Ok(emulator)
    }

    /// The framebuffer as one `u32` per pixel, `PIXEL_ON` or 0, row-major
    pub fn get_pixels(&self) -> &[u32] {
        self.graphics.get_pixels()
    }
}

impl<D: Display> Emulator<D> {
    pub fn with_display(display: D, config: Config, logger: Option<Logger>) -> Self {
        let logger = logger
            .unwrap_or_else(|| Logger::root(Discard, o!()))
            .new(o!("component" => "interpreter"));
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut emulator = Emulator {
            memory: [0; MEMORY_SIZE],
            stack: [0; STACK_SIZE],
            sp: 0,
            addr: 0,
            pc: STARTING_MEMORY_BYTE as u16,
            v: [0; NUM_REGISTERS],
            delay_timer: 0,
            sound_timer: 0,
            graphics: display,
            keyboard: Keyboard::new(),
            state: RunState::Running,
            last_fetch: Snapshot::default(),
            rom: Vec::new(),
            rng,
            config,
            logger,
        };
        emulator.power_on();
        emulator
    }

    /// Copy `rom` into memory at `STARTING_MEMORY_BYTE`
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(self.fatal(Error::RomTooLarge {
                size: rom.len(),
                max: MAX_ROM_SIZE,
            }));
        }

        self.memory[STARTING_MEMORY_BYTE..].iter_mut().for_each(|b| *b = 0);
        self.memory[STARTING_MEMORY_BYTE..STARTING_MEMORY_BYTE + rom.len()].copy_from_slice(rom);
        self.rom = rom.to_vec();
        info!(self.logger, "loaded ROM"; "bytes" => rom.len());

        Ok(())
    }

    /// Put the machine back in its power-on state with the last loaded ROM in memory. Key state
    /// is left alone since it mirrors the host keyboard.
    pub fn reset(&mut self) {
        self.power_on();
        let end = STARTING_MEMORY_BYTE + self.rom.len();
        self.memory[STARTING_MEMORY_BYTE..end].copy_from_slice(&self.rom);
        debug!(self.logger, "reset");
    }

    fn power_on(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        let font = FONT_BASE as usize;
        self.memory[font..font + FONT_SET.len()].copy_from_slice(&FONT_SET);

        self.stack = [0; STACK_SIZE];
        self.sp = 0;
        self.addr = 0;
        self.pc = STARTING_MEMORY_BYTE as u16;
        self.v = [0; NUM_REGISTERS];
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.state = RunState::Running;
        self.last_fetch = Snapshot::default();
        self.graphics.clear();
    }

    /// Step forward one instruction: fetch the word at the program counter, advance the program
    /// counter, decode it and execute it. Returns the executed op, or `None` if the interpreter
    /// is waiting on a key press (see `RunState::WaitingForKey`).
    pub fn cycle(&mut self) -> Result<Option<Op>> {
        if let RunState::WaitingForKey { register } = self.state {
            if let Some(k) = self.keyboard.poll_any_pressed() {
                self.v[register] = k.value();
                self.state = RunState::Running;
                debug!(self.logger, "key wait done"; "key" => k.value(), "register" => register);
            }
            return Ok(None);
        }

        let word = self.fetch()?;
        let op = Op::try_from(word).map_err(|e| self.fatal(e))?;
        trace!(self.logger, "execute"; "pc" => self.last_fetch.pc, "op" => ?op);

        self.execute(op).map_err(|e| self.fatal(e))?;
        Ok(Some(op))
    }

    /// Run `Config::cycles_per_frame` cycles, then tick the timers once. Returns true if any of
    /// the executed ops changed the display.
    pub fn run_frame(&mut self) -> Result<bool> {
        let mut redraw = false;
        for _ in 0..self.config.cycles_per_frame {
            if let Some(op) = self.cycle()? {
                redraw |= op.is_display_op();
            }
        }
        self.tick_timers();
        Ok(redraw)
    }

    /// Count both timers down by one. Hosts call this at 60 Hz, independent of how fast
    /// instructions are executed.
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Whether a host should be beeping right now
    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn snapshot(&self) -> Snapshot {
        self.last_fetch
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.addr
    }

    pub fn registers(&self) -> &[u8; NUM_REGISTERS] {
        &self.v
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn display(&self) -> &D {
        &self.graphics
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.graphics
    }

    pub fn key_down(&mut self, k: Key) {
        self.keyboard.handle_key_down(k);
    }

    pub fn key_up(&mut self, k: Key) {
        self.keyboard.handle_key_up(k);
    }

    /// Replace the key state with whatever `keyboard` reports as held down
    pub fn handle_key_input(&mut self, keyboard: &impl AsKeyboard) {
        self.keyboard.update_keyboard_with_keys(&keyboard.keys_down());
    }

    fn fetch(&mut self) -> Result<u16> {
        let pc = self.pc;
        let range = checked_range(pc as usize, 2).map_err(|e| self.fatal(e))?;
        let bytes = &self.memory[range];
        let word = u16::from(bytes[0]) << 8 | u16::from(bytes[1]);

        self.last_fetch = Snapshot { pc, opcode: word };
        self.pc += 2;
        Ok(word)
    }

    fn fatal(&self, err: Error) -> Error {
        error!(self.logger, "interpreter halted";
            "error" => %err, "pc" => self.last_fetch.pc, "opcode" => self.last_fetch.opcode);
        err
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc += 2;
        }
    }

    /// Execute a decoded op against the machine state. The program counter has already been
    /// moved past the op's own word.
    fn execute(&mut self, op: Op) -> Result<()> {
        match op {
            Op::DispClear => {
                self.graphics.clear();
                self.graphics.present();
            }
            Op::Return => {
                if self.sp == 0 {
                    return Err(Error::StackUnderflow);
                }
                self.sp -= 1;
                self.pc = self.stack[self.sp];
            }
            Op::Goto(nnn) => self.pc = nnn,
            Op::GotoSubRtn(nnn) => {
                if self.sp == STACK_SIZE {
                    return Err(Error::StackOverflow);
                }
                self.stack[self.sp] = self.pc;
                self.sp += 1;
                self.pc = nnn;
            }
            Op::CondVxEq(x, kk) => self.skip_if(self.v[x as usize] == kk),
            Op::CondVxNe(x, kk) => self.skip_if(self.v[x as usize] != kk),
            Op::CondVxVyEq(x, y) => self.skip_if(self.v[x as usize] == self.v[y as usize]),
            Op::ConstSetVx(x, kk) => self.v[x as usize] = kk,
            Op::ConstAddVx(x, kk) => {
                let x = x as usize;
                self.v[x] = self.v[x].wrapping_add(kk);
            }
            Op::AssignVyToVx(x, y) => self.v[x as usize] = self.v[y as usize],
            Op::BitOpOr(x, y) => self.v[x as usize] |= self.v[y as usize],
            Op::BitOpAnd(x, y) => self.v[x as usize] &= self.v[y as usize],
            Op::BitOpXor(x, y) => self.v[x as usize] ^= self.v[y as usize],
            Op::MathVxAddVy(x, y) => {
                let (sum, carry) = self.v[x as usize].overflowing_add(self.v[y as usize]);
                self.set_with_flag(x, sum, carry);
            }
            Op::MathVxMinusVy(x, y) => {
                let (vx, vy) = (self.v[x as usize], self.v[y as usize]);
                self.set_with_flag(x, vx.wrapping_sub(vy), vx > vy);
            }
            Op::BitOpRtShift(x) => {
                let vx = self.v[x as usize];
                self.set_with_flag(x, vx >> 1, vx & 1 == 1);
            }
            Op::MathVyMinusVx(x, y) => {
                let (vx, vy) = (self.v[x as usize], self.v[y as usize]);
                self.set_with_flag(x, vy.wrapping_sub(vx), vy > vx);
            }
            Op::BitOpLftShift(x) => {
                let vx = self.v[x as usize];
                self.set_with_flag(x, vx << 1, vx & 0x80 != 0);
            }
            Op::CondVxVyNe(x, y) => self.skip_if(self.v[x as usize] != self.v[y as usize]),
            Op::MemSetI(nnn) => self.addr = nnn,
            Op::GotoPlusV0(nnn) => self.pc = nnn + u16::from(self.v[0]),
            Op::Rand(x, kk) => self.v[x as usize] = self.rng.gen::<u8>() & kk,
            Op::DispDraw(x, y, height) => self.draw(x, y, height)?,
            Op::KeyOpEqVx(x) => {
                let k = Key::from_value(self.v[x as usize]);
                self.skip_if(self.keyboard.is_pressed(k));
            }
            Op::KeyOpNeVx(x) => {
                let k = Key::from_value(self.v[x as usize]);
                self.skip_if(!self.keyboard.is_pressed(k));
            }
            Op::DelayGet(x) => self.v[x as usize] = self.delay_timer,
            Op::KeyOpGet(x) => match self.keyboard.poll_any_pressed() {
                Some(k) => self.v[x as usize] = k.value(),
                None => {
                    debug!(self.logger, "waiting for key"; "register" => x);
                    self.state = RunState::WaitingForKey {
                        register: x as usize,
                    };
                }
            },
            Op::DelaySet(x) => self.delay_timer = self.v[x as usize],
            Op::SoundSet(x) => self.sound_timer = self.v[x as usize],
            Op::MemIPlusEqVx(x) => {
                self.addr = self.addr.wrapping_add(u16::from(self.v[x as usize]));
            }
            Op::MemISetSprite(x) => {
                let digit = u16::from(self.v[x as usize] & 0xF);
                self.addr = FONT_BASE + digit * u16::from(NUM_BYTES_IN_FONT_CHAR);
            }
            Op::Bcd(x) => {
                let vx = self.v[x as usize];
                let range = checked_range(self.addr as usize, 3)?;
                self.memory[range].copy_from_slice(&[vx / 100, vx / 10 % 10, vx % 10]);
            }
            Op::RegDump(x) => {
                let count = x as usize + 1;
                let range = checked_range(self.addr as usize, count)?;
                self.memory[range].copy_from_slice(&self.v[..count]);
            }
            Op::RegLoad(x) => {
                let count = x as usize + 1;
                let range = checked_range(self.addr as usize, count)?;
                self.v[..count].copy_from_slice(&self.memory[range]);
            }
        }

        Ok(())
    }

    /// Write `value` to VX, then the flag to VF. Writing the flag last means VF holds the flag
    /// even when X is F.
    fn set_with_flag(&mut self, x: u8, value: u8, flag: bool) {
        self.v[x as usize] = value;
        self.v[VF] = flag as u8;
    }

    /// DXYN: XOR the `height` byte sprite at I onto the display at (VX, VY), setting VF if any
    /// lit pixel got turned off
    fn draw(&mut self, x: u8, y: u8, height: u8) -> Result<()> {
        let origin_x = self.v[x as usize] as usize;
        let origin_y = self.v[y as usize] as usize;
        let range = checked_range(self.addr as usize, height as usize)?;

        self.v[VF] = 0;
        let mut collision = false;
        for (row, byte) in self.memory[range].iter().enumerate() {
            collision |= xor_row(&mut self.graphics, origin_x, origin_y + row, *byte);
        }
        self.v[VF] = collision as u8;

        self.graphics.present();
        Ok(())
    }
}

/// The range `start..start + len` if it lies entirely inside memory. Otherwise the error names
/// the first address that doesn't.
fn checked_range(start: usize, len: usize) -> Result<Range<usize>> {
    let end = start + len;
    if end > MEMORY_SIZE {
        return Err(Error::MemoryOutOfBounds(start.max(MEMORY_SIZE)));
    }
    Ok(start..end)
}
