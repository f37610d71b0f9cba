//! Shared cartridge-image builders for the integration tests.
#![allow(dead_code)]

use dmg_core::cartridge::LOGO;
use once_cell::sync::Lazy;

pub const ROM_BANK_SIZE: usize = 0x4000;

/// A minimal valid 32 KiB image with an empty program.
pub static BLANK_ROM: Lazy<Vec<u8>> = Lazy::new(|| rom_image(0x00, 0x00, 0x00));

/// Build a cartridge image with a valid logo and the given header bytes.
pub fn rom_image(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
    let banks = match rom_code {
        0x52 => 72,
        0x53 => 80,
        0x54 => 92,
        n => 2usize << (n & 0x0F),
    };
    let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
    rom[0x0104..0x0104 + LOGO.len()].copy_from_slice(&LOGO);
    rom[0x0147] = cart_type;
    rom[0x0148] = rom_code;
    rom[0x0149] = ram_code;
    rom
}

/// A 32 KiB ROM-only image with `program` placed at the 0x0100 entry point.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = rom_image(0x00, 0x00, 0x00);
    rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
    rom
}

/// Like [`rom_with_program`], with `handler` installed at an interrupt
/// vector (0x40, 0x48, ...).
pub fn rom_with_handler(program: &[u8], vector: usize, handler: &[u8]) -> Vec<u8> {
    let mut rom = rom_with_program(program);
    rom[vector..vector + handler.len()].copy_from_slice(handler);
    rom
}
