use crate::mmu::{IF_STAT, IF_VBLANK};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

pub const MODE_HBLANK: u8 = 0;
pub const MODE_VBLANK: u8 = 1;
pub const MODE_OAM_SCAN: u8 = 2;
pub const MODE_TRANSFER: u8 = 3;

// Per-phase budgets in machine cycles. One scanline is 20 + 43 + 51 = 114
// cycles; a frame is 154 lines = 17556 cycles.
const OAM_SCAN_CYCLES: u32 = 20;
const TRANSFER_CYCLES: u32 = 43;
const HBLANK_CYCLES: u32 = 51;
const VBLANK_LINE_CYCLES: u32 = 144;

// LCDC bits
const LCDC_BG_ON: u8 = 0x01;
const LCDC_OBJ_ON: u8 = 0x02;
const LCDC_OBJ_TALL: u8 = 0x04;
const LCDC_BG_MAP: u8 = 0x08;
const LCDC_TILE_SEL: u8 = 0x10;
const LCDC_WIN_ON: u8 = 0x20;
const LCDC_WIN_MAP: u8 = 0x40;
const LCDC_LCD_ON: u8 = 0x80;

// STAT interrupt-source enable bits
const STAT_HBLANK_IRQ: u8 = 0x08;
const STAT_VBLANK_IRQ: u8 = 0x10;
const STAT_OAM_IRQ: u8 = 0x20;
const STAT_LYC_IRQ: u8 = 0x40;

// OAM attribute bits
const ATTR_PALETTE: u8 = 0x10;
const ATTR_XFLIP: u8 = 0x20;
const ATTR_YFLIP: u8 = 0x40;
const ATTR_BG_PRIORITY: u8 = 0x80;

/// One 8x8 tile: 16 bytes, two bitplanes per row.
type Tile = [u8; 16];

#[derive(Clone, Copy)]
struct Sprite {
    x: u8,
    y: u8,
    tile: u8,
    flags: u8,
    index: u8,
}

/// Display controller. Tile pattern memory is split the way the hardware
/// decodes it: an object-only bank (0x8000..), a bank shared between
/// objects and the background (0x8800..), and a background-only bank
/// (0x9000..), 128 tiles each.
pub struct Ppu {
    obj_tiles: [Tile; 128],
    shared_tiles: [Tile; 128],
    bg_tiles: [Tile; 128],
    bg_map0: [[u8; 32]; 32],
    bg_map1: [[u8; 32]; 32],
    oam: [[u8; 4]; 40],

    pub lcdc: u8,
    stat_irq_enable: u8,
    pub scy: u8,
    pub scx: u8,
    ly: u8,
    pub lyc: u8,
    pub bgp: u8,
    pub obp0: u8,
    pub obp1: u8,
    pub wy: u8,
    pub wx: u8,
    lyc_match: bool,

    mode: u8,
    clock: u32,
    line_sprites: Vec<Sprite>,
    /// Background/window color index for the line in progress, pre-palette.
    /// Consulted by the sprite mixer for the BG-priority rule.
    line_raw: [u8; SCREEN_WIDTH],
    line_shades: [u8; SCREEN_WIDTH],

    /// Two full frames of shade indices; `front` is the displayed one and
    /// the other is being assembled.
    frames: [Vec<u8>; 2],
    front: usize,
    frame_ready: bool,
    pub frame_counter: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            obj_tiles: [[0; 16]; 128],
            shared_tiles: [[0; 16]; 128],
            bg_tiles: [[0; 16]; 128],
            bg_map0: [[0; 32]; 32],
            bg_map1: [[0; 32]; 32],
            oam: [[0; 4]; 40],
            lcdc: 0,
            stat_irq_enable: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            lyc_match: false,
            mode: MODE_OAM_SCAN,
            clock: 0,
            line_sprites: Vec::with_capacity(10),
            line_raw: [0; SCREEN_WIDTH],
            line_shades: [0; SCREEN_WIDTH],
            frames: [
                vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
                vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            ],
            front: 0,
            frame_ready: false,
            frame_counter: 0,
        }
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    fn enabled(&self) -> bool {
        self.lcdc & LCDC_LCD_ON != 0
    }

    /// The completed frame currently on display, one shade index (0..=3)
    /// per pixel in row-major order.
    pub fn frame(&self) -> &[u8] {
        &self.frames[self.front]
    }

    /// True once per completed frame; reading clears the flag.
    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    pub fn vram_accessible(&self) -> bool {
        !self.enabled() || self.mode != MODE_TRANSFER
    }

    pub fn oam_accessible(&self) -> bool {
        !self.enabled() || (self.mode != MODE_OAM_SCAN && self.mode != MODE_TRANSFER)
    }

    pub fn read_vram(&self, addr: u16) -> u8 {
        if !self.vram_accessible() {
            return 0;
        }
        let offset = usize::from(addr) & 0x1FFF;
        if offset < 0x1800 {
            self.tile_bank(offset)[(offset >> 4) & 0x7F][offset & 0x0F]
        } else if offset < 0x1C00 {
            self.bg_map0[(offset >> 5) & 0x1F][offset & 0x1F]
        } else {
            self.bg_map1[(offset >> 5) & 0x1F][offset & 0x1F]
        }
    }

    pub fn write_vram(&mut self, addr: u16, val: u8) {
        if !self.vram_accessible() {
            return;
        }
        let offset = usize::from(addr) & 0x1FFF;
        if offset < 0x1800 {
            self.tile_bank_mut(offset)[(offset >> 4) & 0x7F][offset & 0x0F] = val;
        } else if offset < 0x1C00 {
            self.bg_map0[(offset >> 5) & 0x1F][offset & 0x1F] = val;
        } else {
            self.bg_map1[(offset >> 5) & 0x1F][offset & 0x1F] = val;
        }
    }

    fn tile_bank(&self, offset: usize) -> &[Tile; 128] {
        match offset >> 11 {
            0 => &self.obj_tiles,
            1 => &self.shared_tiles,
            _ => &self.bg_tiles,
        }
    }

    fn tile_bank_mut(&mut self, offset: usize) -> &mut [Tile; 128] {
        match offset >> 11 {
            0 => &mut self.obj_tiles,
            1 => &mut self.shared_tiles,
            _ => &mut self.bg_tiles,
        }
    }

    pub fn read_oam(&self, addr: u16) -> u8 {
        if !self.oam_accessible() {
            return 0;
        }
        let offset = usize::from(addr) & 0xFF;
        if offset < 0xA0 {
            self.oam[offset / 4][offset % 4]
        } else {
            0
        }
    }

    pub fn write_oam(&mut self, addr: u16, val: u8) {
        if !self.oam_accessible() {
            return;
        }
        self.write_oam_raw(addr, val);
    }

    /// OAM write that bypasses mode gating; used by the DMA sequencer.
    pub(crate) fn write_oam_raw(&mut self, addr: u16, val: u8) {
        let offset = usize::from(addr) & 0xFF;
        if offset < 0xA0 {
            self.oam[offset / 4][offset % 4] = val;
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                let mode = if self.enabled() { self.mode } else { 0 };
                self.stat_irq_enable | (self.lyc_match as u8) << 2 | mode
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.enabled();
                self.lcdc = val;
                if was_on && !self.enabled() {
                    // Turning the LCD off resets the line counter and the
                    // phase clock; the next enable starts in OAM scan.
                    self.ly = 0;
                    self.clock = 0;
                    self.mode = MODE_OAM_SCAN;
                    self.lyc_match = self.ly == self.lyc;
                }
            }
            0xFF41 => {
                self.stat_irq_enable = val & (STAT_HBLANK_IRQ | STAT_VBLANK_IRQ | STAT_OAM_IRQ | STAT_LYC_IRQ)
            }
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {} // LY is read-only
            0xFF45 => {
                self.lyc = val;
                self.lyc_match = self.ly == self.lyc;
            }
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    fn set_ly(&mut self, line: u8, if_reg: &mut u8) {
        self.ly = line;
        self.lyc_match = self.ly == self.lyc;
        if self.lyc_match && self.stat_irq_enable & STAT_LYC_IRQ != 0 {
            *if_reg |= IF_STAT;
        }
    }

    /// Advance the state machine by `cycles` machine cycles.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        if !self.enabled() {
            return;
        }
        self.clock += cycles;
        loop {
            match self.mode {
                MODE_OAM_SCAN => {
                    if self.clock < OAM_SCAN_CYCLES {
                        break;
                    }
                    self.clock -= OAM_SCAN_CYCLES;
                    self.render_line();
                    self.mode = MODE_TRANSFER;
                }
                MODE_TRANSFER => {
                    if self.clock < TRANSFER_CYCLES {
                        break;
                    }
                    self.clock -= TRANSFER_CYCLES;
                    self.mode = MODE_HBLANK;
                    if self.stat_irq_enable & STAT_HBLANK_IRQ != 0 {
                        *if_reg |= IF_STAT;
                    }
                }
                MODE_HBLANK => {
                    if self.clock < HBLANK_CYCLES {
                        break;
                    }
                    self.clock -= HBLANK_CYCLES;
                    let line = self.ly + 1;
                    self.set_ly(line, if_reg);
                    if line == SCREEN_HEIGHT as u8 {
                        self.mode = MODE_VBLANK;
                        self.finish_frame();
                        *if_reg |= IF_VBLANK;
                        if self.stat_irq_enable & STAT_VBLANK_IRQ != 0 {
                            *if_reg |= IF_STAT;
                        }
                    } else {
                        self.mode = MODE_OAM_SCAN;
                        if self.stat_irq_enable & STAT_OAM_IRQ != 0 {
                            *if_reg |= IF_STAT;
                        }
                    }
                }
                _ => {
                    if self.clock < VBLANK_LINE_CYCLES {
                        break;
                    }
                    self.clock -= VBLANK_LINE_CYCLES;
                    let line = self.ly + 1;
                    if line == 154 {
                        self.set_ly(0, if_reg);
                        self.mode = MODE_OAM_SCAN;
                        if self.stat_irq_enable & STAT_OAM_IRQ != 0 {
                            *if_reg |= IF_STAT;
                        }
                    } else {
                        self.set_ly(line, if_reg);
                    }
                }
            }
        }
    }

    fn finish_frame(&mut self) {
        self.front = 1 - self.front;
        self.frame_ready = true;
        self.frame_counter = self.frame_counter.wrapping_add(1);
        #[cfg(feature = "ppu-trace")]
        log::trace!("frame {} complete", self.frame_counter);
    }

    fn shade(palette: u8, color: u8) -> u8 {
        (palette >> (color * 2)) & 0x03
    }

    fn tile_pixel(tile: &Tile, row: usize, col: usize) -> u8 {
        let lo = tile[row * 2];
        let hi = tile[row * 2 + 1];
        let bit = 7 - col;
        ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1)
    }

    /// Background/window tile lookup honoring the pattern-bank select bit.
    fn bg_tile(&self, index: u8) -> &Tile {
        if self.lcdc & LCDC_TILE_SEL != 0 {
            if index < 128 {
                &self.obj_tiles[usize::from(index)]
            } else {
                &self.shared_tiles[usize::from(index) - 128]
            }
        } else if index < 128 {
            &self.bg_tiles[usize::from(index)]
        } else {
            &self.shared_tiles[usize::from(index) - 128]
        }
    }

    fn obj_tile(&self, index: u8) -> &Tile {
        if index < 128 {
            &self.obj_tiles[usize::from(index)]
        } else {
            &self.shared_tiles[usize::from(index) - 128]
        }
    }

    fn sprite_height(&self) -> u8 {
        if self.lcdc & LCDC_OBJ_TALL != 0 { 16 } else { 8 }
    }

    /// Select up to 10 sprites intersecting the current line, ordered by
    /// ascending x with the OAM index as the tie-break. That order is the
    /// draw priority: the first sprite wins overlaps.
    fn scan_sprites(&mut self) {
        self.line_sprites.clear();
        let height = u16::from(self.sprite_height());
        let line = u16::from(self.ly) + 16;
        for (index, entry) in self.oam.iter().enumerate() {
            let y = u16::from(entry[0]);
            if line >= y && line < y + height {
                self.line_sprites.push(Sprite {
                    y: entry[0],
                    x: entry[1],
                    tile: entry[2],
                    flags: entry[3],
                    index: index as u8,
                });
                if self.line_sprites.len() == 10 {
                    break;
                }
            }
        }
        self.line_sprites.sort_by_key(|s| (s.x, s.index));
    }

    fn render_line(&mut self) {
        self.scan_sprites();

        // Background layer
        if self.lcdc & LCDC_BG_ON != 0 {
            let y = self.ly.wrapping_add(self.scy);
            let row = usize::from(y) / 8;
            let py = usize::from(y) % 8;
            for x in 0..SCREEN_WIDTH {
                let xx = (x as u8).wrapping_add(self.scx);
                let map = if self.lcdc & LCDC_BG_MAP != 0 {
                    &self.bg_map1
                } else {
                    &self.bg_map0
                };
                let tile_index = map[row][usize::from(xx) / 8];
                self.line_raw[x] = Self::tile_pixel(self.bg_tile(tile_index), py, usize::from(xx) % 8);
            }
        } else {
            self.line_raw = [0; SCREEN_WIDTH];
        }

        // Window layer, drawn over the background once the line has
        // reached WY and only from WX-7 onward.
        if self.lcdc & LCDC_WIN_ON != 0 && self.ly >= self.wy {
            let start = usize::from(self.wx).saturating_sub(7);
            let wy = usize::from(self.ly - self.wy);
            for x in start..SCREEN_WIDTH {
                let wx = x - start;
                let map = if self.lcdc & LCDC_WIN_MAP != 0 {
                    &self.bg_map1
                } else {
                    &self.bg_map0
                };
                let tile_index = map[wy / 8][wx / 8];
                self.line_raw[x] = Self::tile_pixel(self.bg_tile(tile_index), wy % 8, wx % 8);
            }
        }

        for x in 0..SCREEN_WIDTH {
            self.line_shades[x] = Self::shade(self.bgp, self.line_raw[x]);
        }

        // Sprite layer, composited back to front so the highest-priority
        // sprite (lowest x) lands on top.
        if self.lcdc & LCDC_OBJ_ON != 0 {
            let height = self.sprite_height();
            for i in (0..self.line_sprites.len()).rev() {
                let sprite = self.line_sprites[i];
                let mut row = u16::from(self.ly) + 16 - u16::from(sprite.y);
                if sprite.flags & ATTR_YFLIP != 0 {
                    row = u16::from(height) - 1 - row;
                }
                let tile_index = if height == 16 {
                    (sprite.tile & 0xFE) | (row >= 8) as u8
                } else {
                    sprite.tile
                };
                let tile = *self.obj_tile(tile_index);
                let palette = if sprite.flags & ATTR_PALETTE != 0 {
                    self.obp1
                } else {
                    self.obp0
                };
                for px in 0..8usize {
                    let sx = i32::from(sprite.x) - 8 + px as i32;
                    if !(0..SCREEN_WIDTH as i32).contains(&sx) {
                        continue;
                    }
                    let col = if sprite.flags & ATTR_XFLIP != 0 { 7 - px } else { px };
                    let color = Self::tile_pixel(&tile, usize::from(row) % 8, col);
                    if color == 0 {
                        // Color 0 is transparent for sprites.
                        continue;
                    }
                    if sprite.flags & ATTR_BG_PRIORITY != 0 && self.line_raw[sx as usize] != 0 {
                        continue;
                    }
                    self.line_shades[sx as usize] = Self::shade(palette, color);
                }
            }
        }

        let back = 1 - self.front;
        let row = usize::from(self.ly) * SCREEN_WIDTH;
        self.frames[back][row..row + SCREEN_WIDTH].copy_from_slice(&self.line_shades);
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
