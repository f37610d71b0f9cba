use std::path::Path;

use log::info;

use crate::cartridge::{Cartridge, CartridgeError};
use crate::cpu::Cpu;
use crate::joypad::Key;
use crate::mmu::Mmu;

/// Machine cycles in one complete frame (154 lines of 114 cycles).
pub const FRAME_CYCLES: u32 = 17556;

/// The assembled machine: CPU plus the memory dispatcher that owns every
/// peripheral. This is the intended embedding surface; a frontend calls
/// [`GameBoy::run_frame`], presents [`GameBoy::frame`], and forwards input
/// through [`GameBoy::press`] and [`GameBoy::release`].
pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    /// Build a machine around a cartridge image. With `boot` the machine
    /// starts at address zero inside the boot ROM; without it the CPU and
    /// I/O registers are given the values the boot ROM would leave behind.
    pub fn new(rom: Vec<u8>, boot: Option<Box<[u8; 0x100]>>) -> Result<Self, CartridgeError> {
        let cart = Cartridge::new(rom)?;
        info!("inserted \"{}\"", cart.title());

        let mut mmu = Mmu::new();
        mmu.load_cart(cart);
        let cpu = match boot {
            Some(image) => {
                mmu.load_boot_rom(image);
                Cpu::new()
            }
            None => {
                Self::apply_post_boot_io(&mut mmu);
                Cpu::new_post_boot()
            }
        };
        Ok(Self { cpu, mmu })
    }

    fn apply_post_boot_io(mmu: &mut Mmu) {
        mmu.write(0xFF40, 0x91); // LCDC: LCD and background on
        mmu.write(0xFF47, 0xFC); // BGP
    }

    /// Execute one instruction and advance every peripheral by its cost.
    /// Returns the elapsed machine cycles.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.mmu);
        self.mmu.tick(cycles);
        cycles
    }

    /// Run until the display completes a frame. With the LCD disabled no
    /// frame ever completes, so the machine still stops after one frame's
    /// worth of cycles to keep the caller's pacing intact.
    pub fn run_frame(&mut self) {
        let mut elapsed = 0;
        loop {
            elapsed += self.step();
            if self.mmu.ppu.take_frame_ready() || elapsed >= FRAME_CYCLES {
                break;
            }
        }
    }

    /// The most recently completed frame: one shade index (0..=3) per
    /// pixel, `SCREEN_WIDTH * SCREEN_HEIGHT` entries in row-major order.
    pub fn frame(&self) -> &[u8] {
        self.mmu.ppu.frame()
    }

    pub fn press(&mut self, key: Key) {
        self.mmu.press_key(key);
    }

    pub fn release(&mut self, key: Key) {
        self.mmu.release_key(key);
    }

    /// Persist battery-backed cartridge RAM (and RTC state when present).
    /// A no-op for cartridges without a battery.
    pub fn save_battery(&self, path: &Path) -> Result<(), CartridgeError> {
        match &self.mmu.cart {
            Some(cart) => cart.save_battery(path),
            None => Ok(()),
        }
    }

    /// Restore battery-backed RAM from an earlier save. Returns true when
    /// the file was present and well formed; failures leave the cartridge
    /// untouched.
    pub fn load_battery(&mut self, path: &Path) -> bool {
        match self.mmu.cart.as_mut() {
            Some(cart) => cart.load_battery(path),
            None => false,
        }
    }

    /// Return the machine to its power-on state. The cartridge stays in
    /// place, so battery-backed RAM survives the way it does on hardware.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        let boot = self.mmu.boot_rom.take();
        self.mmu = Mmu::new();
        if let Some(cart) = cart {
            self.mmu.load_cart(cart);
        }
        self.cpu = match boot {
            Some(image) => {
                self.mmu.load_boot_rom(image);
                Cpu::new()
            }
            None => {
                Self::apply_post_boot_io(&mut self.mmu);
                Cpu::new_post_boot()
            }
        };
    }
}
