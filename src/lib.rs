//! Game Boy (DMG) emulation core.
//!
//! This crate contains the platform-agnostic emulator logic: CPU, memory
//! dispatcher, PPU, cartridge mappers, and the timer/joypad peripherals.
//! Frontends own the screen, pacing, and input bindings, and drive the core
//! via the [`gameboy`] facade. Sound is a register surface only: writes are
//! accepted and reads return zero.

/// Cartridge mappers (MBC), header parsing, and battery persistence.
pub mod cartridge;

/// LR35902 CPU core.
pub mod cpu;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// Joypad input register and edge-triggered interrupt behavior.
pub mod joypad;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Instruction descriptor tables for the CPU.
pub mod opcodes;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Battery-backed real-time clock for MBC3 cartridges.
pub mod rtc;

/// Divider/timer unit.
pub mod timer;

pub use cartridge::{Cartridge, CartridgeError};
pub use gameboy::GameBoy;
pub use joypad::Key;
