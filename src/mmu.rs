use log::warn;

use crate::cartridge::Cartridge;
use crate::joypad::{Joypad, Key};
use crate::ppu::Ppu;
use crate::timer::Timer;

// Interrupt-pending bits, shared between IF (0xFF0F) and IE (0xFFFF).
pub const IF_VBLANK: u8 = 0x01;
pub const IF_STAT: u8 = 0x02;
pub const IF_TIMER: u8 = 0x04;
pub const IF_SERIAL: u8 = 0x08;
pub const IF_JOYPAD: u8 = 0x10;

/// OAM DMA copies two bytes per machine cycle, 160 bytes in 80 cycles.
const DMA_BYTES_PER_CYCLE: usize = 2;
const DMA_LENGTH: usize = 0xA0;

/// Memory dispatcher: routes every 16-bit address to exactly one region
/// and owns working RAM, high RAM, the interrupt registers, and the OAM
/// DMA sequencer.
pub struct Mmu {
    pub cart: Option<Cartridge>,
    pub ppu: Ppu,
    pub timer: Timer,
    pub joypad: Joypad,
    wram: Box<[u8; 0x2000]>,
    hram: [u8; 0x7F],
    pub if_reg: u8,
    pub ie_reg: u8,

    pub boot_rom: Option<Box<[u8; 0x100]>>,
    boot_mapped: bool,

    // Serial register surface; no transfer engine behind it.
    sb: u8,
    sc: u8,

    dma_source: u8,
    dma_active: bool,
    dma_copied: usize,
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            cart: None,
            ppu: Ppu::new(),
            timer: Timer::new(),
            joypad: Joypad::new(),
            wram: Box::new([0; 0x2000]),
            hram: [0; 0x7F],
            if_reg: 0,
            ie_reg: 0,
            boot_rom: None,
            boot_mapped: false,
            sb: 0,
            sc: 0,
            dma_source: 0,
            dma_active: false,
            dma_copied: 0,
        }
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn load_boot_rom(&mut self, boot: Box<[u8; 0x100]>) {
        self.boot_rom = Some(boot);
        self.boot_mapped = true;
    }

    pub fn boot_mapped(&self) -> bool {
        self.boot_mapped
    }

    pub fn dma_active(&self) -> bool {
        self.dma_active
    }

    /// Forward a fresh key press to the joypad and raise the input
    /// interrupt on the press edge.
    pub fn press_key(&mut self, key: Key) {
        if self.joypad.press(key) {
            self.if_reg |= IF_JOYPAD;
        }
    }

    pub fn release_key(&mut self, key: Key) {
        self.joypad.release(key);
    }

    pub fn read(&self, addr: u16) -> u8 {
        // While a DMA transfer runs the CPU can only see high RAM.
        if self.dma_active && !(0xFF80..0xFFFF).contains(&addr) {
            return 0;
        }
        match addr {
            0x0000..=0x00FF if self.boot_mapped => {
                self.boot_rom.as_ref().map_or(0, |b| b[usize::from(addr)])
            }
            0x0000..=0x7FFF => self.cart.as_ref().map_or(0, |c| c.read_rom(addr)),
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xA000..=0xBFFF => self.cart.as_ref().map_or(0, |c| c.read_ram(addr)),
            0xC000..=0xFDFF => self.wram[usize::from(addr) & 0x1FFF],
            0xFE00..=0xFE9F => self.ppu.read_oam(addr),
            0xFEA0..=0xFEFF => 0,
            0xFF00..=0xFF7F => self.read_io(addr),
            0xFF80..=0xFFFE => self.hram[usize::from(addr) - 0xFF80],
            0xFFFF => self.ie_reg,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        if self.dma_active && !(0xFF80..0xFFFF).contains(&addr) && addr != 0xFF46 {
            return;
        }
        match addr {
            0x0000..=0x00FF if self.boot_mapped => {}
            0x0000..=0x7FFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_register(addr, val);
                }
            }
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_ram(addr, val);
                }
            }
            0xC000..=0xFDFF => self.wram[usize::from(addr) & 0x1FFF] = val,
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, val),
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[usize::from(addr) - 0xFF80] = val,
            0xFFFF => self.ie_reg = val,
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            0xFF00 => self.joypad.read(),
            0xFF01 => self.sb,
            0xFF02 => self.sc,
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg,
            // Sound register surface: writes accepted, reads are zero.
            0xFF10..=0xFF3F => 0,
            0xFF46 => self.dma_source,
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            0xFF50 => 0xFF,
            _ => 0,
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF00 => self.joypad.write(val),
            0xFF01 => self.sb = val,
            0xFF02 => self.sc = val,
            0xFF04..=0xFF07 => self.timer.write(addr, val),
            0xFF0F => self.if_reg = val & 0x1F,
            0xFF10..=0xFF3F => {}
            0xFF46 => self.start_dma(val),
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF50 => {
                // Write-once: unmaps the boot ROM for the rest of the run.
                if self.boot_mapped {
                    self.boot_mapped = false;
                }
            }
            _ => {
                if val != 0 {
                    warn!("write {val:#04x} to unimplemented I/O register {addr:#06x}");
                }
            }
        }
    }

    fn start_dma(&mut self, source_page: u8) {
        self.dma_source = source_page;
        self.dma_active = true;
        self.dma_copied = 0;
    }

    /// Source read for the DMA engine; not subject to CPU-side blocking.
    fn dma_read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.cart.as_ref().map_or(0, |c| c.read_rom(addr)),
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xA000..=0xBFFF => self.cart.as_ref().map_or(0, |c| c.read_ram(addr)),
            0xC000..=0xFDFF => self.wram[usize::from(addr) & 0x1FFF],
            _ => 0,
        }
    }

    fn dma_step(&mut self, cycles: u32) {
        if !self.dma_active {
            return;
        }
        let budget = self.dma_copied + cycles as usize * DMA_BYTES_PER_CYCLE;
        while self.dma_copied < budget.min(DMA_LENGTH) {
            let offset = self.dma_copied as u16;
            let byte = self.dma_read((u16::from(self.dma_source) << 8) + offset);
            self.ppu.write_oam_raw(0xFE00 + offset, byte);
            self.dma_copied += 1;
        }
        if self.dma_copied >= DMA_LENGTH {
            self.dma_active = false;
        }
    }

    /// Advance all cycle-counted peripherals by one instruction's elapsed
    /// machine cycles: display, then timer, then DMA.
    pub fn tick(&mut self, cycles: u32) {
        let mut if_reg = self.if_reg;
        self.ppu.step(cycles, &mut if_reg);
        self.timer.step(cycles, &mut if_reg);
        self.if_reg = if_reg;
        self.dma_step(cycles);
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
