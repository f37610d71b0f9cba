use crate::mmu::{IF_JOYPAD, IF_SERIAL, IF_STAT, IF_TIMER, IF_VBLANK, Mmu};
use crate::opcodes::{CB_OPCODES, OPCODES};

pub const FLAG_Z: u8 = 0x80;
pub const FLAG_N: u8 = 0x40;
pub const FLAG_H: u8 = 0x20;
pub const FLAG_C: u8 = 0x10;

/// Service order is fixed by hardware: V-blank first, input last.
const INTERRUPTS: [(u8, u16); 5] = [
    (IF_VBLANK, 0x0040),
    (IF_STAT, 0x0048),
    (IF_TIMER, 0x0050),
    (IF_SERIAL, 0x0058),
    (IF_JOYPAD, 0x0060),
];

/// LR35902 register file and interpreter state.
pub struct Cpu {
    pub a: u8,
    /// Flags. Only the high nibble carries meaning; the low nibble always
    /// reads zero.
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub ime: bool,
    pub halted: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
            ime: false,
            halted: false,
        }
    }

    /// Register values after the boot ROM has run, for machines started
    /// without one.
    pub fn new_post_boot() -> Self {
        let mut cpu = Self::new();
        cpu.set_af(0x01B0);
        cpu.set_bc(0x0013);
        cpu.set_de(0x00D8);
        cpu.set_hl(0x014D);
        cpu.sp = 0xFFFE;
        cpu.pc = 0x0100;
        cpu
    }

    // Register pair accessors

    pub fn af(&self) -> u16 {
        u16::from(self.a) << 8 | u16::from(self.f)
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = val as u8 & 0xF0;
    }

    pub fn bc(&self) -> u16 {
        u16::from(self.b) << 8 | u16::from(self.c)
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        u16::from(self.d) << 8 | u16::from(self.e)
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        u16::from(self.h) << 8 | u16::from(self.l)
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    fn fetch_byte(&mut self, mmu: &Mmu) -> u8 {
        let byte = mmu.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(&mut self, mmu: &Mmu) -> u16 {
        let lo = u16::from(self.fetch_byte(mmu));
        let hi = u16::from(self.fetch_byte(mmu));
        hi << 8 | lo
    }

    /// Execute one instruction (or one halted cycle), service at most one
    /// interrupt, and return the elapsed machine cycles.
    pub fn step(&mut self, mmu: &mut Mmu) -> u32 {
        let mut cycles = if self.halted {
            1
        } else {
            let opcode = self.fetch_byte(mmu);
            if opcode == 0xCB {
                let sub = self.fetch_byte(mmu);
                let entry = &CB_OPCODES[usize::from(sub >> 3)][usize::from(sub & 7)];
                (entry.exec)(self, mmu, 0);
                entry.cycles
            } else {
                let entry = &OPCODES[usize::from(opcode)];
                let operand = match entry.operands {
                    0 => 0,
                    1 => u16::from(self.fetch_byte(mmu)),
                    _ => self.fetch_word(mmu),
                };
                #[cfg(feature = "cpu-trace")]
                log::trace!(
                    "pc={:04X} op={opcode:02X} n={operand:04X} af={:04X} bc={:04X} de={:04X} hl={:04X} sp={:04X}",
                    self.pc,
                    self.af(),
                    self.bc(),
                    self.de(),
                    self.hl(),
                    self.sp
                );
                (entry.exec)(self, mmu, operand);
                entry.cycles
            }
        };

        if mmu.if_reg & mmu.ie_reg & 0x1F != 0 {
            // Any pending-and-enabled interrupt wakes a halted CPU even
            // when IME is clear.
            self.halted = false;
            if self.ime {
                self.ime = false;
                let pending = mmu.if_reg & mmu.ie_reg;
                for (bit, vector) in INTERRUPTS {
                    if pending & bit != 0 {
                        mmu.if_reg &= !bit;
                        self.push_word(mmu, self.pc);
                        self.pc = vector;
                        break;
                    }
                }
                cycles += 4;
            }
        }

        cycles
    }

    pub(crate) fn illegal(&self, opcode: u8) -> ! {
        panic!(
            "illegal opcode {opcode:#04x} at {:#06x}",
            self.pc.wrapping_sub(1)
        );
    }

    // Stack helpers

    pub(crate) fn push_word(&mut self, mmu: &mut Mmu, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        mmu.write(self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        mmu.write(self.sp, val as u8);
    }

    pub(crate) fn pop_word(&mut self, mmu: &Mmu) -> u16 {
        let lo = u16::from(mmu.read(self.sp));
        self.sp = self.sp.wrapping_add(1);
        let hi = u16::from(mmu.read(self.sp));
        self.sp = self.sp.wrapping_add(1);
        hi << 8 | lo
    }

    // Control flow

    pub(crate) fn jr(&mut self, offset: u8, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(i16::from(offset as i8) as u16);
        }
    }

    pub(crate) fn jp(&mut self, addr: u16, condition: bool) {
        if condition {
            self.pc = addr;
        }
    }

    pub(crate) fn call(&mut self, mmu: &mut Mmu, addr: u16, condition: bool) {
        if condition {
            self.push_word(mmu, self.pc);
            self.pc = addr;
        }
    }

    pub(crate) fn ret(&mut self, mmu: &Mmu, condition: bool) {
        if condition {
            self.pc = self.pop_word(mmu);
        }
    }

    // 8-bit ALU

    fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        self.f = (z as u8) << 7 | (n as u8) << 6 | (h as u8) << 5 | (c as u8) << 4;
    }

    pub(crate) fn add_a(&mut self, val: u8, with_carry: bool) {
        let carry = u16::from(with_carry && self.f & FLAG_C != 0);
        let sum = u16::from(self.a) + u16::from(val) + carry;
        let half = (self.a & 0x0F) as u16 + (val & 0x0F) as u16 + carry > 0x0F;
        self.set_flags(sum & 0xFF == 0, false, half, sum > 0xFF);
        self.a = sum as u8;
    }

    pub(crate) fn sub_a(&mut self, val: u8, with_carry: bool) {
        let carry = i16::from(with_carry && self.f & FLAG_C != 0);
        let diff = i16::from(self.a) - i16::from(val) - carry;
        let half = (self.a & 0x0F) as i16 - (val & 0x0F) as i16 - carry < 0;
        self.set_flags(diff & 0xFF == 0, true, half, diff < 0);
        self.a = diff as u8;
    }

    pub(crate) fn and_a(&mut self, val: u8) {
        self.a &= val;
        self.set_flags(self.a == 0, false, true, false);
    }

    pub(crate) fn or_a(&mut self, val: u8) {
        self.a |= val;
        self.set_flags(self.a == 0, false, false, false);
    }

    pub(crate) fn xor_a(&mut self, val: u8) {
        self.a ^= val;
        self.set_flags(self.a == 0, false, false, false);
    }

    pub(crate) fn cp_a(&mut self, val: u8) {
        let a = self.a;
        self.sub_a(val, false);
        self.a = a;
    }

    /// INC r: carry flag is preserved.
    pub(crate) fn inc(&mut self, val: u8) -> u8 {
        let result = val.wrapping_add(1);
        self.f = (self.f & FLAG_C)
            | if result == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0x0F { FLAG_H } else { 0 };
        result
    }

    /// DEC r: carry flag is preserved.
    pub(crate) fn dec(&mut self, val: u8) -> u8 {
        let result = val.wrapping_sub(1);
        self.f = (self.f & FLAG_C)
            | FLAG_N
            | if result == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0 { FLAG_H } else { 0 };
        result
    }

    /// ADD HL,rr: zero flag is preserved; half-carry is taken at bit 11.
    pub(crate) fn add_hl(&mut self, val: u16) {
        let hl = self.hl();
        let sum = u32::from(hl) + u32::from(val);
        self.f = (self.f & FLAG_Z)
            | if (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF { FLAG_H } else { 0 }
            | if sum > 0xFFFF { FLAG_C } else { 0 };
        self.set_hl(sum as u16);
    }

    /// Signed offset add to SP for ADD SP,n and LD HL,SP+n. Flags come
    /// from the unsigned low-byte addition.
    pub(crate) fn add_sp(&mut self, offset: u8) -> u16 {
        let half = (self.sp & 0x0F) + u16::from(offset & 0x0F) > 0x0F;
        let carry = (self.sp & 0xFF) + u16::from(offset) > 0xFF;
        self.set_flags(false, false, half, carry);
        self.sp.wrapping_add(i16::from(offset as i8) as u16)
    }

    pub(crate) fn daa(&mut self) {
        let mut a = self.a;
        let mut carry = self.f & FLAG_C != 0;
        if self.f & FLAG_N == 0 {
            let mut adjust = 0;
            if self.f & FLAG_H != 0 || a & 0x0F > 0x09 {
                adjust |= 0x06;
            }
            if carry || a > 0x99 {
                adjust |= 0x60;
                carry = true;
            }
            a = a.wrapping_add(adjust);
        } else {
            let mut adjust = 0;
            if self.f & FLAG_H != 0 {
                adjust |= 0x06;
            }
            if carry {
                adjust |= 0x60;
            }
            a = a.wrapping_sub(adjust);
        }
        self.f = (self.f & FLAG_N)
            | if a == 0 { FLAG_Z } else { 0 }
            | if carry { FLAG_C } else { 0 };
        self.a = a;
    }

    pub(crate) fn cpl(&mut self) {
        self.a = !self.a;
        self.f |= FLAG_N | FLAG_H;
    }

    pub(crate) fn scf(&mut self) {
        self.f = (self.f & FLAG_Z) | FLAG_C;
    }

    pub(crate) fn ccf(&mut self) {
        self.f = (self.f & FLAG_Z) | (self.f & FLAG_C) ^ FLAG_C;
    }

    // Rotates and shifts, shared by the primary and CB tables.

    pub(crate) fn rlc(&mut self, val: u8) -> u8 {
        let result = val.rotate_left(1);
        self.set_flags(result == 0, false, false, val & 0x80 != 0);
        result
    }

    pub(crate) fn rrc(&mut self, val: u8) -> u8 {
        let result = val.rotate_right(1);
        self.set_flags(result == 0, false, false, val & 0x01 != 0);
        result
    }

    pub(crate) fn rl(&mut self, val: u8) -> u8 {
        let carry_in = u8::from(self.f & FLAG_C != 0);
        let result = val << 1 | carry_in;
        self.set_flags(result == 0, false, false, val & 0x80 != 0);
        result
    }

    pub(crate) fn rr(&mut self, val: u8) -> u8 {
        let carry_in = u8::from(self.f & FLAG_C != 0);
        let result = val >> 1 | carry_in << 7;
        self.set_flags(result == 0, false, false, val & 0x01 != 0);
        result
    }

    pub(crate) fn sla(&mut self, val: u8) -> u8 {
        let result = val << 1;
        self.set_flags(result == 0, false, false, val & 0x80 != 0);
        result
    }

    pub(crate) fn sra(&mut self, val: u8) -> u8 {
        let result = (val >> 1) | (val & 0x80);
        self.set_flags(result == 0, false, false, val & 0x01 != 0);
        result
    }

    pub(crate) fn srl(&mut self, val: u8) -> u8 {
        let result = val >> 1;
        self.set_flags(result == 0, false, false, val & 0x01 != 0);
        result
    }

    pub(crate) fn swap(&mut self, val: u8) -> u8 {
        let result = val.rotate_left(4);
        self.set_flags(result == 0, false, false, false);
        result
    }

    /// BIT b,r: carry flag is preserved.
    pub(crate) fn bit(&mut self, bit: u8, val: u8) {
        self.f = (self.f & FLAG_C)
            | FLAG_H
            | if val & (1 << bit) == 0 { FLAG_Z } else { 0 };
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run `program` from working RAM and step until `steps` instructions
    /// have executed, returning total elapsed cycles.
    fn run(cpu: &mut Cpu, mmu: &mut Mmu, program: &[u8], steps: usize) -> u32 {
        for (i, &byte) in program.iter().enumerate() {
            mmu.write(0xC000 + i as u16, byte);
        }
        cpu.pc = 0xC000;
        (0..steps).map(|_| cpu.step(mmu)).sum()
    }

    #[test]
    fn inc_sets_half_carry_at_nibble_boundary() {
        let mut cpu = Cpu::new();
        cpu.a = 0x0F;
        cpu.a = cpu.inc(cpu.a);
        assert_eq!(cpu.a, 0x10);
        assert_eq!(cpu.f & FLAG_H, FLAG_H);
        assert_eq!(cpu.f & FLAG_Z, 0);
        assert_eq!(cpu.f & FLAG_N, 0);
    }

    #[test]
    fn dec_zero_borrows_from_bit_4() {
        let mut cpu = Cpu::new();
        cpu.a = 0x00;
        cpu.a = cpu.dec(cpu.a);
        assert_eq!(cpu.a, 0xFF);
        assert_eq!(cpu.f & FLAG_H, FLAG_H);
        assert_eq!(cpu.f & FLAG_N, FLAG_N);
        assert_eq!(cpu.f & FLAG_Z, 0);
    }

    #[test]
    fn add_sets_carry_and_zero() {
        let mut cpu = Cpu::new();
        cpu.a = 0xFF;
        cpu.add_a(0x01, false);
        assert_eq!(cpu.a, 0);
        assert_eq!(cpu.f, FLAG_Z | FLAG_H | FLAG_C);
    }

    #[test]
    fn adc_includes_carry_in_half_carry() {
        let mut cpu = Cpu::new();
        cpu.a = 0x0F;
        cpu.f = FLAG_C;
        cpu.add_a(0x00, true);
        assert_eq!(cpu.a, 0x10);
        assert_eq!(cpu.f & FLAG_H, FLAG_H);
    }

    #[test]
    fn flag_low_nibble_is_always_zero() {
        let mut cpu = Cpu::new();
        cpu.set_af(0xABCD);
        assert_eq!(cpu.f & 0x0F, 0);
        assert_eq!(cpu.af(), 0xABC0);
    }

    #[test]
    fn daa_adjusts_bcd_addition() {
        let mut cpu = Cpu::new();
        cpu.a = 0x15;
        cpu.add_a(0x27, false); // 0x3C
        cpu.daa();
        assert_eq!(cpu.a, 0x42);
        assert_eq!(cpu.f & FLAG_C, 0);
    }

    #[test]
    fn table_dispatch_and_cycle_costs() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        // LD A,0x34; LD B,A; INC B; NOP
        let cycles = run(&mut cpu, &mut mmu, &[0x3E, 0x34, 0x47, 0x04, 0x00], 4);
        assert_eq!(cpu.a, 0x34);
        assert_eq!(cpu.b, 0x35);
        assert_eq!(cycles, 2 + 1 + 1 + 1);
    }

    #[test]
    fn jr_backwards_uses_signed_offset() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        // NOP; JR -3 (back to the NOP)
        run(&mut cpu, &mut mmu, &[0x00, 0x18, 0xFD], 2);
        assert_eq!(cpu.pc, 0xC000);
    }

    #[test]
    fn call_and_ret_round_trip_through_stack() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        cpu.sp = 0xD000;
        // CALL 0xC005; NOP; NOP; RET
        let program = &[0xCD, 0x05, 0xC0, 0x00, 0x00, 0xC9];
        let cycles = run(&mut cpu, &mut mmu, program, 2);
        assert_eq!(cpu.pc, 0xC003);
        assert_eq!(cpu.sp, 0xD000);
        assert_eq!(cycles, 3 + 2);
    }

    #[test]
    fn push_pop_af_masks_flag_bits() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        cpu.sp = 0xD000;
        cpu.a = 0x12;
        cpu.f = 0xF0;
        // PUSH AF; POP BC ; push the raw word, then pop into BC to read it
        run(&mut cpu, &mut mmu, &[0xF5, 0xC1], 2);
        assert_eq!(cpu.bc(), 0x12F0);
    }

    #[test]
    fn interrupt_dispatch_costs_four_extra_cycles() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        cpu.sp = 0xD000;
        cpu.ime = true;
        mmu.ie_reg = IF_VBLANK;
        mmu.if_reg = IF_VBLANK;
        let cycles = run(&mut cpu, &mut mmu, &[0x00], 1);
        assert_eq!(cycles, 1 + 4);
        assert_eq!(cpu.pc, 0x0040);
        assert!(!cpu.ime);
        assert_eq!(mmu.if_reg, 0);
        // The interrupted PC is on the stack.
        assert_eq!(mmu.read(0xCFFE), 0x01);
        assert_eq!(mmu.read(0xCFFF), 0xC0);
    }

    #[test]
    fn interrupt_priority_prefers_vblank() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        cpu.sp = 0xD000;
        cpu.ime = true;
        mmu.ie_reg = 0x1F;
        mmu.if_reg = IF_VBLANK | IF_TIMER | IF_JOYPAD;
        run(&mut cpu, &mut mmu, &[0x00], 1);
        assert_eq!(cpu.pc, 0x0040);
        assert_eq!(mmu.if_reg, IF_TIMER | IF_JOYPAD);
    }

    #[test]
    fn halt_wakes_without_ime_and_does_not_dispatch() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        mmu.ie_reg = IF_TIMER;
        // HALT
        run(&mut cpu, &mut mmu, &[0x76], 1);
        assert!(cpu.halted);
        assert_eq!(cpu.step(&mut mmu), 1); // halted cycle

        mmu.if_reg = IF_TIMER;
        let cycles = cpu.step(&mut mmu);
        assert!(!cpu.halted);
        assert_eq!(cycles, 1);
        assert_ne!(cpu.pc, 0x0050); // IME clear, no dispatch
        assert_eq!(mmu.if_reg, IF_TIMER); // flag stays pending
    }

    #[test]
    fn illegal_opcode_panics() {
        let result = std::panic::catch_unwind(|| {
            let mut cpu = Cpu::new();
            let mut mmu = Mmu::new();
            run(&mut cpu, &mut mmu, &[0xD3], 1);
        });
        assert!(result.is_err());
    }

    #[test]
    fn cb_table_covers_rotates_and_bit_ops() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        cpu.b = 0x80;
        // RLC B; BIT 0,B; SET 7,B; RES 0,B
        let program = &[0xCB, 0x00, 0xCB, 0x40, 0xCB, 0xF8, 0xCB, 0x80];
        let cycles = run(&mut cpu, &mut mmu, program, 4);
        assert_eq!(cpu.b, 0x80);
        assert_eq!(cycles, 2 * 4);
    }

    #[test]
    fn cb_hl_operand_takes_four_cycles() {
        let mut cpu = Cpu::new();
        let mut mmu = Mmu::new();
        cpu.set_hl(0xD000);
        mmu.write(0xD000, 0x01);
        // SWAP (HL)
        let cycles = run(&mut cpu, &mut mmu, &[0xCB, 0x36], 1);
        assert_eq!(mmu.read(0xD000), 0x10);
        assert_eq!(cycles, 4);
    }
}
