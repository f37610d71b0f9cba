use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;
use thiserror::Error;

use crate::rtc::{Rtc, RtcCounters};

/// First 18 bytes of the boot logo, checked at 0x0104. The boot ROM verifies
/// the full bitmap but the hardware family only depends on this prefix.
pub const LOGO: [u8; 18] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D,
    0x00, 0x08,
];

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

const SAVE_MAGIC: &[u8; 8] = b"DMGSAVE\0";
const SAVE_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("ROM image does not carry the logo signature")]
    InvalidLogo,
    #[error("unsupported cartridge type {0:#04x}")]
    UnsupportedType(u8),
    #[error("ROM image is {actual} bytes but the header declares {declared}")]
    TruncatedImage { declared: usize, actual: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Borrowed view of the cartridge header at its fixed offsets.
pub struct Header<'a> {
    rom: &'a [u8],
}

impl<'a> Header<'a> {
    pub fn new(rom: &'a [u8]) -> Result<Self, CartridgeError> {
        if rom.len() < 0x150 {
            return Err(CartridgeError::InvalidLogo);
        }
        Ok(Self { rom })
    }

    pub fn logo_matches(&self) -> bool {
        self.rom[0x0104..0x0104 + LOGO.len()] == LOGO
    }

    pub fn title(&self) -> String {
        self.rom[0x0134..0x0144]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    }

    pub fn cart_type(&self) -> u8 {
        self.rom[0x0147]
    }

    /// Total ROM size in bytes. Three high codes fall outside the
    /// power-of-two rule.
    pub fn rom_size(&self) -> usize {
        match self.rom[0x0148] {
            0x52 => ROM_BANK_SIZE * 72,
            0x53 => ROM_BANK_SIZE * 80,
            0x54 => ROM_BANK_SIZE * 92,
            n => 0x8000 << (n & 0x0F),
        }
    }

    /// Total external RAM size in bytes, from a fixed lookup table.
    pub fn ram_size(&self) -> usize {
        match self.rom[0x0149] {
            1 => 0x800,
            2 => RAM_BANK_SIZE,
            3 => RAM_BANK_SIZE * 4,
            4 => RAM_BANK_SIZE * 16,
            5 => RAM_BANK_SIZE * 8,
            _ => 0,
        }
    }
}

/// The closed set of bank controllers. The variant is fixed by the
/// cartridge-type header byte and never changes after construction.
enum Mbc {
    /// Direct-mapped 32 KiB ROM, no switching registers.
    RomOnly,
    /// 5-bit ROM bank plus a 2-bit register that feeds either the RAM bank
    /// or the high ROM bank bits depending on the mode flag.
    Mbc1 {
        rom_lo: u8,
        hi: u8,
        ram_mode: bool,
        ram_enabled: bool,
    },
    /// 4-bit ROM bank, 512 four-bit RAM cells, register writes gated on
    /// address bit 8 being clear.
    Mbc2 { rom_bank: u8, ram_enabled: bool },
    /// 7-bit ROM bank, 4-bit RAM-bank/RTC-register select, optional clock.
    Mbc3 {
        rom_bank: u8,
        ram_bank: u8,
        ram_enabled: bool,
        rtc: Option<Rtc>,
    },
}

pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    mbc: Mbc,
    rom_banks: usize,
    has_battery: bool,
    title: String,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        let header = Header::new(&rom)?;
        if !header.logo_matches() {
            return Err(CartridgeError::InvalidLogo);
        }
        let declared = header.rom_size();
        if rom.len() < declared {
            return Err(CartridgeError::TruncatedImage {
                declared,
                actual: rom.len(),
            });
        }

        let cart_type = header.cart_type();
        let (mbc, has_battery) = match cart_type {
            0x00 | 0x08 => (Mbc::RomOnly, false),
            0x09 => (Mbc::RomOnly, true),
            0x01 | 0x02 => (Mbc::new_mbc1(), false),
            0x03 => (Mbc::new_mbc1(), true),
            0x05 => (Mbc::new_mbc2(), false),
            0x06 => (Mbc::new_mbc2(), true),
            0x0F | 0x10 => (Mbc::new_mbc3(true), true),
            0x11 | 0x12 => (Mbc::new_mbc3(false), false),
            0x13 => (Mbc::new_mbc3(false), true),
            other => return Err(CartridgeError::UnsupportedType(other)),
        };

        let ram_size = match mbc {
            // MBC2 RAM is built in and not declared by the header.
            Mbc::Mbc2 { .. } => 512,
            _ => header.ram_size(),
        };
        let title = header.title();
        let rom_banks = declared / ROM_BANK_SIZE;

        Ok(Self {
            rom,
            ram: vec![0; ram_size],
            mbc,
            rom_banks,
            has_battery,
            title,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn has_battery(&self) -> bool {
        self.has_battery
    }

    /// The ROM bank currently mapped at the switchable window.
    pub fn rom_bank(&self) -> usize {
        let bank = match self.mbc {
            Mbc::RomOnly => 1,
            Mbc::Mbc1 {
                rom_lo,
                hi,
                ram_mode,
                ..
            } => {
                if ram_mode {
                    usize::from(rom_lo)
                } else {
                    usize::from(rom_lo) | usize::from(hi) << 5
                }
            }
            Mbc::Mbc2 { rom_bank, .. } => usize::from(rom_bank),
            Mbc::Mbc3 { rom_bank, .. } => usize::from(rom_bank),
        };
        bank % self.rom_banks.max(1)
    }

    fn ram_bank(&self) -> usize {
        match self.mbc {
            Mbc::Mbc1 {
                hi, ram_mode: true, ..
            } => usize::from(hi),
            Mbc::Mbc3 { ram_bank, .. } => usize::from(ram_bank),
            _ => 0,
        }
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        let addr = usize::from(addr);
        if addr < ROM_BANK_SIZE {
            return self.rom[addr];
        }
        let offset = self.rom_bank() * ROM_BANK_SIZE + (addr & 0x3FFF);
        self.rom.get(offset).copied().unwrap_or(0)
    }

    /// Handle a write into the 0x0000..=0x7FFF register window.
    pub fn write_register(&mut self, addr: u16, val: u8) {
        let window = addr >> 13; // 0: enable, 1: bank low, 2: bank high, 3: mode/latch
        match &mut self.mbc {
            Mbc::RomOnly => {}
            Mbc::Mbc1 {
                rom_lo,
                hi,
                ram_mode,
                ram_enabled,
            } => match window {
                0 => *ram_enabled = val & 0x0F == 0x0A,
                1 => {
                    // Bank 0 cannot appear in the switchable window, which
                    // also makes banks 0x20/0x40/0x60 unreachable.
                    let bank = val & 0x1F;
                    *rom_lo = if bank == 0 { 1 } else { bank };
                }
                2 => *hi = val & 0x03,
                _ => *ram_mode = val & 1 != 0,
            },
            Mbc::Mbc2 {
                rom_bank,
                ram_enabled,
            } => {
                if addr & 0x0100 != 0 {
                    return;
                }
                match window {
                    0 => *ram_enabled = val & 0x0F == 0x0A,
                    1 => {
                        let bank = val & 0x0F;
                        *rom_bank = if bank == 0 { 1 } else { bank };
                    }
                    _ => {}
                }
            }
            Mbc::Mbc3 {
                rom_bank,
                ram_bank,
                ram_enabled,
                rtc,
            } => match window {
                0 => *ram_enabled = val & 0x0F == 0x0A,
                1 => {
                    let bank = val & 0x7F;
                    *rom_bank = if bank == 0 { 1 } else { bank };
                }
                2 => *ram_bank = val & 0x0F,
                _ => {
                    if let Some(rtc) = rtc {
                        if val & 1 == 0 {
                            rtc.unlatch();
                        } else {
                            rtc.latch();
                        }
                    }
                }
            },
        }
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        match &self.mbc {
            Mbc::RomOnly => {
                let idx = usize::from(addr) & 0x1FFF;
                self.ram.get(idx).copied().unwrap_or(0)
            }
            Mbc::Mbc1 {
                ram_enabled: false, ..
            }
            | Mbc::Mbc2 {
                ram_enabled: false, ..
            }
            | Mbc::Mbc3 {
                ram_enabled: false, ..
            } => 0,
            Mbc::Mbc1 { .. } => {
                let idx = self.ram_bank() * RAM_BANK_SIZE + (usize::from(addr) & 0x1FFF);
                self.ram.get(idx).copied().unwrap_or(0)
            }
            Mbc::Mbc2 { .. } => {
                let idx = usize::from(addr) & 0x1FF;
                self.ram.get(idx).copied().unwrap_or(0)
            }
            Mbc::Mbc3 { ram_bank, rtc, .. } => {
                if *ram_bank < 4 {
                    let idx = self.ram_bank() * RAM_BANK_SIZE + (usize::from(addr) & 0x1FFF);
                    self.ram.get(idx).copied().unwrap_or(0)
                } else if let Some(rtc) = rtc {
                    rtc.read_reg(*ram_bank)
                } else {
                    0
                }
            }
        }
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        let bank = self.ram_bank();
        match &mut self.mbc {
            Mbc::RomOnly => {
                let idx = usize::from(addr) & 0x1FFF;
                if let Some(cell) = self.ram.get_mut(idx) {
                    *cell = val;
                }
            }
            Mbc::Mbc1 {
                ram_enabled: false, ..
            }
            | Mbc::Mbc2 {
                ram_enabled: false, ..
            }
            | Mbc::Mbc3 {
                ram_enabled: false, ..
            } => {}
            Mbc::Mbc1 { .. } => {
                let idx = bank * RAM_BANK_SIZE + (usize::from(addr) & 0x1FFF);
                if let Some(cell) = self.ram.get_mut(idx) {
                    *cell = val;
                }
            }
            Mbc::Mbc2 { .. } => {
                // Only the low nibble of each cell is backed by hardware.
                let idx = usize::from(addr) & 0x1FF;
                if let Some(cell) = self.ram.get_mut(idx) {
                    *cell = val & 0x0F;
                }
            }
            Mbc::Mbc3 { ram_bank, rtc, .. } => {
                if *ram_bank < 4 {
                    let idx = bank * RAM_BANK_SIZE + (usize::from(addr) & 0x1FFF);
                    if let Some(cell) = self.ram.get_mut(idx) {
                        *cell = val;
                    }
                } else if let Some(rtc) = rtc {
                    rtc.write_reg(*ram_bank, val);
                }
            }
        }
    }

    fn rtc(&self) -> Option<&Rtc> {
        match &self.mbc {
            Mbc::Mbc3 { rtc, .. } => rtc.as_ref(),
            _ => None,
        }
    }

    fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        match &mut self.mbc {
            Mbc::Mbc3 { rtc, .. } => rtc.as_mut(),
            _ => None,
        }
    }

    /// Serialize battery state: one record per RAM bank plus the clock
    /// counters and a save timestamp when a clock is present.
    pub fn serialize_battery(&self) -> Vec<u8> {
        let banks: Vec<&[u8]> = self.ram.chunks(RAM_BANK_SIZE).collect();
        let mut out = Vec::new();
        out.extend_from_slice(SAVE_MAGIC);
        out.extend_from_slice(&SAVE_VERSION.to_le_bytes());
        out.extend_from_slice(&(banks.len() as u16).to_le_bytes());
        for (index, bank) in banks.iter().enumerate() {
            out.extend_from_slice(&(index as u16).to_le_bytes());
            out.extend_from_slice(&(bank.len() as u32).to_le_bytes());
            out.extend_from_slice(bank);
        }
        if let Some(rtc) = self.rtc() {
            let c = rtc.counters();
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            out.push(1);
            out.push(c.seconds);
            out.push(c.minutes);
            out.push(c.hours);
            out.extend_from_slice(&c.days.to_le_bytes());
            out.push(c.carry as u8);
            out.push(c.halted as u8);
            out.extend_from_slice(&now.to_le_bytes());
        } else {
            out.push(0);
        }
        out
    }

    /// Apply previously serialized battery state. Returns false (leaving
    /// RAM untouched beyond banks already copied) if the data is not a
    /// valid save.
    pub fn load_battery_bytes(&mut self, bytes: &[u8]) -> bool {
        let mut r = Reader { bytes, pos: 0 };
        let Some(ok) = self.parse_battery(&mut r) else {
            warn!("battery data is corrupt; treating as no prior save");
            return false;
        };
        ok
    }

    fn parse_battery(&mut self, r: &mut Reader) -> Option<bool> {
        if r.take(8)? != SAVE_MAGIC {
            return Some(false);
        }
        if r.u16()? != SAVE_VERSION {
            return Some(false);
        }
        let banks = r.u16()?;
        for _ in 0..banks {
            let index = usize::from(r.u16()?);
            let len = r.u32()? as usize;
            let data = r.take(len)?;
            let start = index * RAM_BANK_SIZE;
            if start + len <= self.ram.len() {
                self.ram[start..start + len].copy_from_slice(data);
            }
        }
        if r.u8()? != 0 {
            let counters = RtcCounters {
                seconds: r.u8()?,
                minutes: r.u8()?,
                hours: r.u8()?,
                days: r.u16()?,
                carry: r.u8()? != 0,
                halted: r.u8()? != 0,
            };
            let saved = r.u64()?;
            if let Some(rtc) = self.rtc_mut() {
                rtc.restore(counters, saved);
            }
        }
        Some(true)
    }

    /// Write battery-backed RAM (and RTC state) to `path`. A no-op for
    /// cartridges without a battery.
    pub fn save_battery(&self, path: &Path) -> Result<(), CartridgeError> {
        if !self.has_battery {
            return Ok(());
        }
        std::fs::write(path, self.serialize_battery())?;
        Ok(())
    }

    /// Load battery-backed RAM from `path`. Missing or corrupt files are
    /// treated as no prior save and are never fatal.
    pub fn load_battery(&mut self, path: &Path) -> bool {
        if !self.has_battery {
            return false;
        }
        match std::fs::read(path) {
            Ok(bytes) => self.load_battery_bytes(&bytes),
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!("could not read battery file {}: {err}", path.display());
                }
                false
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.bytes.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        Some(self.take(1)?[0])
    }

    fn u16(&mut self) -> Option<u16> {
        Some(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
}

impl Mbc {
    fn new_mbc1() -> Self {
        Mbc::Mbc1 {
            rom_lo: 1,
            hi: 0,
            ram_mode: false,
            ram_enabled: false,
        }
    }

    fn new_mbc2() -> Self {
        Mbc::Mbc2 {
            rom_bank: 1,
            ram_enabled: false,
        }
    }

    fn new_mbc3(with_rtc: bool) -> Self {
        Mbc::Mbc3 {
            rom_bank: 1,
            ram_bank: 0,
            ram_enabled: false,
            rtc: with_rtc.then(Rtc::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rom(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
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
        // Tag each bank so switches are observable.
        for bank in 0..banks {
            rom[bank * ROM_BANK_SIZE] = bank as u8;
        }
        rom
    }

    #[test]
    fn header_decodes_sizes() {
        let rom = test_rom(0x01, 0x02, 0x03);
        let header = Header::new(&rom).unwrap();
        assert_eq!(header.rom_size(), 0x8000 << 2);
        assert_eq!(header.ram_size(), RAM_BANK_SIZE * 4);
    }

    #[test]
    fn irregular_rom_size_codes() {
        let rom = test_rom(0x01, 0x52, 0x00);
        let header = Header::new(&rom).unwrap();
        assert_eq!(header.rom_size(), ROM_BANK_SIZE * 72);
    }

    #[test]
    fn flipping_any_logo_byte_is_rejected() {
        let rom = test_rom(0x00, 0x00, 0x00);
        assert!(Cartridge::new(rom.clone()).is_ok());
        for i in 0..LOGO.len() {
            let mut bad = rom.clone();
            bad[0x0104 + i] ^= 0x01;
            assert!(
                matches!(Cartridge::new(bad), Err(CartridgeError::InvalidLogo)),
                "byte {i} accepted"
            );
        }
    }

    #[test]
    fn unknown_cart_type_is_rejected() {
        let rom = test_rom(0x42, 0x00, 0x00);
        assert!(matches!(
            Cartridge::new(rom),
            Err(CartridgeError::UnsupportedType(0x42))
        ));
    }

    #[test]
    fn truncated_image_is_rejected() {
        let mut rom = test_rom(0x00, 0x00, 0x00);
        rom[0x0148] = 0x02; // claims 8 banks, file has 2
        assert!(matches!(
            Cartridge::new(rom),
            Err(CartridgeError::TruncatedImage { .. })
        ));
    }

    #[test]
    fn bank_zero_write_selects_bank_one() {
        for cart_type in [0x01u8, 0x05, 0x11] {
            let mut cart = Cartridge::new(test_rom(cart_type, 0x02, 0x00)).unwrap();
            cart.write_register(0x2000, 0);
            assert_eq!(cart.rom_bank(), 1, "type {cart_type:#04x}");
        }
    }

    #[test]
    fn mbc1_mode_routes_high_bits() {
        let mut cart = Cartridge::new(test_rom(0x02, 0x06, 0x03)).unwrap();
        cart.write_register(0x2000, 0x04);
        cart.write_register(0x4000, 0x01);
        // ROM mode: the 2-bit register extends the ROM bank.
        assert_eq!(cart.rom_bank(), 0x24);

        // RAM mode: the same bits select the RAM bank instead.
        cart.write_register(0x6000, 0x01);
        assert_eq!(cart.rom_bank(), 0x04);
        cart.write_register(0x0000, 0x0A);
        cart.write_ram(0xA000, 0x55);
        cart.write_register(0x4000, 0x00);
        assert_eq!(cart.read_ram(0xA000), 0);
        cart.write_register(0x4000, 0x01);
        assert_eq!(cart.read_ram(0xA000), 0x55);
    }

    #[test]
    fn mbc1_ram_requires_enable_sentinel() {
        let mut cart = Cartridge::new(test_rom(0x02, 0x02, 0x02)).unwrap();
        cart.write_ram(0xA000, 0x12);
        assert_eq!(cart.read_ram(0xA000), 0);

        cart.write_register(0x0000, 0x0A);
        cart.write_ram(0xA000, 0x12);
        assert_eq!(cart.read_ram(0xA000), 0x12);

        // Any other low nibble disables again.
        cart.write_register(0x0000, 0x0B);
        assert_eq!(cart.read_ram(0xA000), 0);
    }

    #[test]
    fn mbc2_register_writes_gated_on_address_bit_8() {
        let mut cart = Cartridge::new(test_rom(0x05, 0x02, 0x00)).unwrap();
        cart.write_register(0x2100, 0x03);
        assert_eq!(cart.rom_bank(), 1);
        cart.write_register(0x2000, 0x03);
        assert_eq!(cart.rom_bank(), 3);
    }

    #[test]
    fn mbc2_ram_stores_nibbles() {
        let mut cart = Cartridge::new(test_rom(0x06, 0x02, 0x00)).unwrap();
        cart.write_register(0x0000, 0x0A);
        cart.write_ram(0xA000, 0xFF);
        assert_eq!(cart.read_ram(0xA000), 0x0F);
        // Only the low 9 address bits select a cell.
        assert_eq!(cart.read_ram(0xA200), 0x0F);
    }

    #[test]
    fn mbc3_bank_select_redirects_to_rtc() {
        let mut cart = Cartridge::new(test_rom(0x10, 0x02, 0x03)).unwrap();
        cart.write_register(0x0000, 0x0A);
        cart.write_register(0x4000, 0x08);
        cart.write_ram(0xA000, 30);
        cart.write_register(0x6000, 0x00);
        cart.write_register(0x6000, 0x01);
        assert_eq!(cart.read_ram(0xA000), 30);

        // Bank 0 is still plain RAM.
        cart.write_register(0x4000, 0x00);
        cart.write_ram(0xA000, 0x77);
        assert_eq!(cart.read_ram(0xA000), 0x77);
    }

    #[test]
    fn rom_only_ignores_register_writes() {
        let mut cart = Cartridge::new(test_rom(0x00, 0x00, 0x00)).unwrap();
        cart.write_register(0x2000, 0x05);
        assert_eq!(cart.read_rom(0x4000), 1);
    }

    #[test]
    fn battery_serialization_round_trips() {
        let mut cart = Cartridge::new(test_rom(0x03, 0x02, 0x03)).unwrap();
        cart.write_register(0x0000, 0x0A);
        for bank in 0..4u8 {
            cart.write_register(0x6000, 0x01);
            cart.write_register(0x4000, bank);
            cart.write_ram(0xA000, 0xA0 | bank);
        }
        let bytes = cart.serialize_battery();

        let mut fresh = Cartridge::new(test_rom(0x03, 0x02, 0x03)).unwrap();
        assert!(fresh.load_battery_bytes(&bytes));
        fresh.write_register(0x0000, 0x0A);
        fresh.write_register(0x6000, 0x01);
        for bank in 0..4u8 {
            fresh.write_register(0x4000, bank);
            assert_eq!(fresh.read_ram(0xA000), 0xA0 | bank);
        }
    }

    #[test]
    fn corrupt_battery_data_is_not_fatal() {
        let mut cart = Cartridge::new(test_rom(0x03, 0x02, 0x03)).unwrap();
        assert!(!cart.load_battery_bytes(b"not a save file"));
        assert!(!cart.load_battery_bytes(&[]));
    }
}
