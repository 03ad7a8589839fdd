//! The 64x32 monochrome display surface and the trait the interpreter draws through
use fixedbitset::FixedBitSet;
use std::ops::Index;

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// Color written to the pixel buffer for a lit pixel. Unlit pixels are 0.
pub const PIXEL_ON: u32 = 0xFFFFFF;

/// The display collaborator the interpreter draws onto. The interpreter owns the logical pixel
/// state through this trait, but how (and whether) a frame reaches a screen is up to the
/// implementor.
///
/// Coordinates passed to `get_pixel` and `set_pixel` are always already wrapped into
/// `0..WIDTH` and `0..HEIGHT`.
pub trait Display {
    /// Turn every pixel off
    fn clear(&mut self);

    fn get_pixel(&self, x: usize, y: usize) -> bool;

    fn set_pixel(&mut self, x: usize, y: usize, on: bool);

    /// Called once a CLS or DRW instruction has finished changing pixels and the frame is
    /// ready for output
    fn present(&mut self);
}

/// XOR one 8 pixel wide sprite row onto `display`, most significant bit first, starting at
/// (`x`, `y`). Both axes wrap around the edges of the display. Returns true if any pixel that
/// was on got turned off.
pub fn xor_row<D: Display + ?Sized>(display: &mut D, x: usize, y: usize, row: u8) -> bool {
    let y = y % HEIGHT;
    let mut collision = false;

    for bit in 0..8 {
        if (row >> (7 - bit)) & 1 == 0 {
            continue;
        }

        let x = (x + bit) % WIDTH;
        let was_on = display.get_pixel(x, y);
        collision |= was_on;
        display.set_pixel(x, y, !was_on);
    }

    collision
}

/// In-memory framebuffer. Keeps 1 bit per pixel for collision checks alongside a `u32` per
/// pixel buffer that hosts can blit directly (e.g. minifb's `update_with_buffer`).
pub struct Graphics {
    buffer: FixedBitSet,
    pixels: [u32; WIDTH * HEIGHT],
    frame_ready: bool,
}

impl Graphics {
    pub fn new() -> Self {
        Graphics {
            buffer: FixedBitSet::with_capacity(WIDTH * HEIGHT),
            pixels: [0; WIDTH * HEIGHT],
            frame_ready: false,
        }
    }

    pub fn len(&self) -> usize {
        WIDTH * HEIGHT
    }

    /// Given x and y coordinate for a pixel, return the corresponding index of that pixel in the
    /// row-major buffer. Coordinates past the edges wrap.
    pub fn get_graphics_idx(x: usize, y: usize) -> usize {
        let column = x % WIDTH;
        let row = (y % HEIGHT) * WIDTH;

        column + row
    }

    /// The pixel buffer, one `u32` per pixel, row-major
    pub fn get_pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Returns true if a frame has been presented since the last call
    pub fn take_frame(&mut self) -> bool {
        std::mem::replace(&mut self.frame_ready, false)
    }
}

impl Default for Graphics {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Graphics {
    fn clear(&mut self) {
        self.buffer.clear();
        self.pixels = [0; WIDTH * HEIGHT];
    }

    fn get_pixel(&self, x: usize, y: usize) -> bool {
        self.buffer[Self::get_graphics_idx(x, y)]
    }

    fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        let idx = Self::get_graphics_idx(x, y);
        self.buffer.set(idx, on);
        self.pixels[idx] = if on { PIXEL_ON } else { 0 };
    }

    fn present(&mut self) {
        self.frame_ready = true;
    }
}

impl Index<usize> for Graphics {
    type Output = u32;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.pixels[idx]
    }
}
