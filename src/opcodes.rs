//! Descriptor tables for the primary and CB-prefixed opcode spaces.
//!
//! Each entry records how many operand bytes follow the opcode, the cost
//! in machine cycles, and a handler taking the fetched operand (low byte
//! meaningful for one-byte operands, full word for two-byte ones).

use crate::cpu::{Cpu, FLAG_C, FLAG_Z};
use crate::mmu::Mmu;

pub struct Opcode {
    pub operands: u8,
    pub cycles: u32,
    pub exec: fn(&mut Cpu, &mut Mmu, u16),
}

macro_rules! op {
    ($operands:expr, $cycles:expr, $exec:expr) => {
        Opcode {
            operands: $operands,
            cycles: $cycles,
            exec: $exec,
        }
    };
}

macro_rules! ill {
    ($opcode:literal) => {
        op!(0, 1, |c, _, _| c.illegal($opcode))
    };
}

#[rustfmt::skip]
pub static OPCODES: [Opcode; 256] = [
    // 0x00
    op!(0, 1, |_, _, _| ()),                                          // NOP
    op!(2, 3, |c, _, n| c.set_bc(n)),                                 // LD BC,nn
    op!(0, 2, |c, m, _| m.write(c.bc(), c.a)),                        // LD (BC),A
    op!(0, 2, |c, _, _| c.set_bc(c.bc().wrapping_add(1))),            // INC BC
    op!(0, 1, |c, _, _| c.b = c.inc(c.b)),                            // INC B
    op!(0, 1, |c, _, _| c.b = c.dec(c.b)),                            // DEC B
    op!(1, 2, |c, _, n| c.b = n as u8),                               // LD B,n
    op!(0, 1, |c, _, _| { c.a = c.rlc(c.a); c.f &= !FLAG_Z; }),       // RLCA
    op!(2, 4, |c, m, n| {                                             // LD (nn),SP
        m.write(n, c.sp as u8);
        m.write(n.wrapping_add(1), (c.sp >> 8) as u8);
    }),
    op!(0, 2, |c, _, _| c.add_hl(c.bc())),                            // ADD HL,BC
    op!(0, 2, |c, m, _| c.a = m.read(c.bc())),                        // LD A,(BC)
    op!(0, 2, |c, _, _| c.set_bc(c.bc().wrapping_sub(1))),            // DEC BC
    op!(0, 1, |c, _, _| c.c = c.inc(c.c)),                            // INC C
    op!(0, 1, |c, _, _| c.c = c.dec(c.c)),                            // DEC C
    op!(1, 2, |c, _, n| c.c = n as u8),                               // LD C,n
    op!(0, 1, |c, _, _| { c.a = c.rrc(c.a); c.f &= !FLAG_Z; }),       // RRCA
    // 0x10
    op!(1, 1, |c, _, _| c.halted = true),                             // STOP
    op!(2, 3, |c, _, n| c.set_de(n)),                                 // LD DE,nn
    op!(0, 2, |c, m, _| m.write(c.de(), c.a)),                        // LD (DE),A
    op!(0, 2, |c, _, _| c.set_de(c.de().wrapping_add(1))),            // INC DE
    op!(0, 1, |c, _, _| c.d = c.inc(c.d)),                            // INC D
    op!(0, 1, |c, _, _| c.d = c.dec(c.d)),                            // DEC D
    op!(1, 2, |c, _, n| c.d = n as u8),                               // LD D,n
    op!(0, 1, |c, _, _| { c.a = c.rl(c.a); c.f &= !FLAG_Z; }),        // RLA
    op!(1, 2, |c, _, n| c.jr(n as u8, true)),                         // JR n
    op!(0, 2, |c, _, _| c.add_hl(c.de())),                            // ADD HL,DE
    op!(0, 2, |c, m, _| c.a = m.read(c.de())),                        // LD A,(DE)
    op!(0, 2, |c, _, _| c.set_de(c.de().wrapping_sub(1))),            // DEC DE
    op!(0, 1, |c, _, _| c.e = c.inc(c.e)),                            // INC E
    op!(0, 1, |c, _, _| c.e = c.dec(c.e)),                            // DEC E
    op!(1, 2, |c, _, n| c.e = n as u8),                               // LD E,n
    op!(0, 1, |c, _, _| { c.a = c.rr(c.a); c.f &= !FLAG_Z; }),        // RRA
    // 0x20
    op!(1, 2, |c, _, n| c.jr(n as u8, c.f & FLAG_Z == 0)),            // JR NZ,n
    op!(2, 3, |c, _, n| c.set_hl(n)),                                 // LD HL,nn
    op!(0, 2, |c, m, _| {                                             // LDI (HL),A
        m.write(c.hl(), c.a);
        c.set_hl(c.hl().wrapping_add(1));
    }),
    op!(0, 2, |c, _, _| c.set_hl(c.hl().wrapping_add(1))),            // INC HL
    op!(0, 1, |c, _, _| c.h = c.inc(c.h)),                            // INC H
    op!(0, 1, |c, _, _| c.h = c.dec(c.h)),                            // DEC H
    op!(1, 2, |c, _, n| c.h = n as u8),                               // LD H,n
    op!(0, 1, |c, _, _| c.daa()),                                     // DAA
    op!(1, 2, |c, _, n| c.jr(n as u8, c.f & FLAG_Z != 0)),            // JR Z,n
    op!(0, 2, |c, _, _| c.add_hl(c.hl())),                            // ADD HL,HL
    op!(0, 2, |c, m, _| {                                             // LDI A,(HL)
        c.a = m.read(c.hl());
        c.set_hl(c.hl().wrapping_add(1));
    }),
    op!(0, 2, |c, _, _| c.set_hl(c.hl().wrapping_sub(1))),            // DEC HL
    op!(0, 1, |c, _, _| c.l = c.inc(c.l)),                            // INC L
    op!(0, 1, |c, _, _| c.l = c.dec(c.l)),                            // DEC L
    op!(1, 2, |c, _, n| c.l = n as u8),                               // LD L,n
    op!(0, 1, |c, _, _| c.cpl()),                                     // CPL
    // 0x30
    op!(1, 2, |c, _, n| c.jr(n as u8, c.f & FLAG_C == 0)),            // JR NC,n
    op!(2, 3, |c, _, n| c.sp = n),                                    // LD SP,nn
    op!(0, 2, |c, m, _| {                                             // LDD (HL),A
        m.write(c.hl(), c.a);
        c.set_hl(c.hl().wrapping_sub(1));
    }),
    op!(0, 2, |c, _, _| c.sp = c.sp.wrapping_add(1)),                 // INC SP
    op!(0, 3, |c, m, _| {                                             // INC (HL)
        let v = c.inc(m.read(c.hl()));
        m.write(c.hl(), v);
    }),
    op!(0, 3, |c, m, _| {                                             // DEC (HL)
        let v = c.dec(m.read(c.hl()));
        m.write(c.hl(), v);
    }),
    op!(1, 3, |c, m, n| m.write(c.hl(), n as u8)),                    // LD (HL),n
    op!(0, 1, |c, _, _| c.scf()),                                     // SCF
    op!(1, 2, |c, _, n| c.jr(n as u8, c.f & FLAG_C != 0)),            // JR C,n
    op!(0, 2, |c, _, _| c.add_hl(c.sp)),                              // ADD HL,SP
    op!(0, 2, |c, m, _| {                                             // LDD A,(HL)
        c.a = m.read(c.hl());
        c.set_hl(c.hl().wrapping_sub(1));
    }),
    op!(0, 2, |c, _, _| c.sp = c.sp.wrapping_sub(1)),                 // DEC SP
    op!(0, 1, |c, _, _| c.a = c.inc(c.a)),                            // INC A
    op!(0, 1, |c, _, _| c.a = c.dec(c.a)),                            // DEC A
    op!(1, 2, |c, _, n| c.a = n as u8),                               // LD A,n
    op!(0, 1, |c, _, _| c.ccf()),                                     // CCF
    // 0x40: LD B,r
    op!(0, 1, |_, _, _| ()),                                          // LD B,B
    op!(0, 1, |c, _, _| c.b = c.c),
    op!(0, 1, |c, _, _| c.b = c.d),
    op!(0, 1, |c, _, _| c.b = c.e),
    op!(0, 1, |c, _, _| c.b = c.h),
    op!(0, 1, |c, _, _| c.b = c.l),
    op!(0, 2, |c, m, _| c.b = m.read(c.hl())),
    op!(0, 1, |c, _, _| c.b = c.a),
    // 0x48: LD C,r
    op!(0, 1, |c, _, _| c.c = c.b),
    op!(0, 1, |_, _, _| ()),                                          // LD C,C
    op!(0, 1, |c, _, _| c.c = c.d),
    op!(0, 1, |c, _, _| c.c = c.e),
    op!(0, 1, |c, _, _| c.c = c.h),
    op!(0, 1, |c, _, _| c.c = c.l),
    op!(0, 2, |c, m, _| c.c = m.read(c.hl())),
    op!(0, 1, |c, _, _| c.c = c.a),
    // 0x50: LD D,r
    op!(0, 1, |c, _, _| c.d = c.b),
    op!(0, 1, |c, _, _| c.d = c.c),
    op!(0, 1, |_, _, _| ()),                                          // LD D,D
    op!(0, 1, |c, _, _| c.d = c.e),
    op!(0, 1, |c, _, _| c.d = c.h),
    op!(0, 1, |c, _, _| c.d = c.l),
    op!(0, 2, |c, m, _| c.d = m.read(c.hl())),
    op!(0, 1, |c, _, _| c.d = c.a),
    // 0x58: LD E,r
    op!(0, 1, |c, _, _| c.e = c.b),
    op!(0, 1, |c, _, _| c.e = c.c),
    op!(0, 1, |c, _, _| c.e = c.d),
    op!(0, 1, |_, _, _| ()),                                          // LD E,E
    op!(0, 1, |c, _, _| c.e = c.h),
    op!(0, 1, |c, _, _| c.e = c.l),
    op!(0, 2, |c, m, _| c.e = m.read(c.hl())),
    op!(0, 1, |c, _, _| c.e = c.a),
    // 0x60: LD H,r
    op!(0, 1, |c, _, _| c.h = c.b),
    op!(0, 1, |c, _, _| c.h = c.c),
    op!(0, 1, |c, _, _| c.h = c.d),
    op!(0, 1, |c, _, _| c.h = c.e),
    op!(0, 1, |_, _, _| ()),                                          // LD H,H
    op!(0, 1, |c, _, _| c.h = c.l),
    op!(0, 2, |c, m, _| c.h = m.read(c.hl())),
    op!(0, 1, |c, _, _| c.h = c.a),
    // 0x68: LD L,r
    op!(0, 1, |c, _, _| c.l = c.b),
    op!(0, 1, |c, _, _| c.l = c.c),
    op!(0, 1, |c, _, _| c.l = c.d),
    op!(0, 1, |c, _, _| c.l = c.e),
    op!(0, 1, |c, _, _| c.l = c.h),
    op!(0, 1, |_, _, _| ()),                                          // LD L,L
    op!(0, 2, |c, m, _| c.l = m.read(c.hl())),
    op!(0, 1, |c, _, _| c.l = c.a),
    // 0x70: LD (HL),r
    op!(0, 2, |c, m, _| m.write(c.hl(), c.b)),
    op!(0, 2, |c, m, _| m.write(c.hl(), c.c)),
    op!(0, 2, |c, m, _| m.write(c.hl(), c.d)),
    op!(0, 2, |c, m, _| m.write(c.hl(), c.e)),
    op!(0, 2, |c, m, _| m.write(c.hl(), c.h)),
    op!(0, 2, |c, m, _| m.write(c.hl(), c.l)),
    op!(0, 2, |c, _, _| c.halted = true),                             // HALT
    op!(0, 2, |c, m, _| m.write(c.hl(), c.a)),
    // 0x78: LD A,r
    op!(0, 1, |c, _, _| c.a = c.b),
    op!(0, 1, |c, _, _| c.a = c.c),
    op!(0, 1, |c, _, _| c.a = c.d),
    op!(0, 1, |c, _, _| c.a = c.e),
    op!(0, 1, |c, _, _| c.a = c.h),
    op!(0, 1, |c, _, _| c.a = c.l),
    op!(0, 2, |c, m, _| c.a = m.read(c.hl())),
    op!(0, 1, |_, _, _| ()),                                          // LD A,A
    // 0x80: ADD A,r
    op!(0, 1, |c, _, _| c.add_a(c.b, false)),
    op!(0, 1, |c, _, _| c.add_a(c.c, false)),
    op!(0, 1, |c, _, _| c.add_a(c.d, false)),
    op!(0, 1, |c, _, _| c.add_a(c.e, false)),
    op!(0, 1, |c, _, _| c.add_a(c.h, false)),
    op!(0, 1, |c, _, _| c.add_a(c.l, false)),
    op!(0, 2, |c, m, _| c.add_a(m.read(c.hl()), false)),
    op!(0, 1, |c, _, _| c.add_a(c.a, false)),
    // 0x88: ADC A,r
    op!(0, 1, |c, _, _| c.add_a(c.b, true)),
    op!(0, 1, |c, _, _| c.add_a(c.c, true)),
    op!(0, 1, |c, _, _| c.add_a(c.d, true)),
    op!(0, 1, |c, _, _| c.add_a(c.e, true)),
    op!(0, 1, |c, _, _| c.add_a(c.h, true)),
    op!(0, 1, |c, _, _| c.add_a(c.l, true)),
    op!(0, 2, |c, m, _| c.add_a(m.read(c.hl()), true)),
    op!(0, 1, |c, _, _| c.add_a(c.a, true)),
    // 0x90: SUB r
    op!(0, 1, |c, _, _| c.sub_a(c.b, false)),
    op!(0, 1, |c, _, _| c.sub_a(c.c, false)),
    op!(0, 1, |c, _, _| c.sub_a(c.d, false)),
    op!(0, 1, |c, _, _| c.sub_a(c.e, false)),
    op!(0, 1, |c, _, _| c.sub_a(c.h, false)),
    op!(0, 1, |c, _, _| c.sub_a(c.l, false)),
    op!(0, 2, |c, m, _| c.sub_a(m.read(c.hl()), false)),
    op!(0, 1, |c, _, _| c.sub_a(c.a, false)),
    // 0x98: SBC A,r
    op!(0, 1, |c, _, _| c.sub_a(c.b, true)),
    op!(0, 1, |c, _, _| c.sub_a(c.c, true)),
    op!(0, 1, |c, _, _| c.sub_a(c.d, true)),
    op!(0, 1, |c, _, _| c.sub_a(c.e, true)),
    op!(0, 1, |c, _, _| c.sub_a(c.h, true)),
    op!(0, 1, |c, _, _| c.sub_a(c.l, true)),
    op!(0, 2, |c, m, _| c.sub_a(m.read(c.hl()), true)),
    op!(0, 1, |c, _, _| c.sub_a(c.a, true)),
    // 0xA0: AND r
    op!(0, 1, |c, _, _| c.and_a(c.b)),
    op!(0, 1, |c, _, _| c.and_a(c.c)),
    op!(0, 1, |c, _, _| c.and_a(c.d)),
    op!(0, 1, |c, _, _| c.and_a(c.e)),
    op!(0, 1, |c, _, _| c.and_a(c.h)),
    op!(0, 1, |c, _, _| c.and_a(c.l)),
    op!(0, 2, |c, m, _| c.and_a(m.read(c.hl()))),
    op!(0, 1, |c, _, _| c.and_a(c.a)),
    // 0xA8: XOR r
    op!(0, 1, |c, _, _| c.xor_a(c.b)),
    op!(0, 1, |c, _, _| c.xor_a(c.c)),
    op!(0, 1, |c, _, _| c.xor_a(c.d)),
    op!(0, 1, |c, _, _| c.xor_a(c.e)),
    op!(0, 1, |c, _, _| c.xor_a(c.h)),
    op!(0, 1, |c, _, _| c.xor_a(c.l)),
    op!(0, 2, |c, m, _| c.xor_a(m.read(c.hl()))),
    op!(0, 1, |c, _, _| c.xor_a(c.a)),
    // 0xB0: OR r
    op!(0, 1, |c, _, _| c.or_a(c.b)),
    op!(0, 1, |c, _, _| c.or_a(c.c)),
    op!(0, 1, |c, _, _| c.or_a(c.d)),
    op!(0, 1, |c, _, _| c.or_a(c.e)),
    op!(0, 1, |c, _, _| c.or_a(c.h)),
    op!(0, 1, |c, _, _| c.or_a(c.l)),
    op!(0, 2, |c, m, _| c.or_a(m.read(c.hl()))),
    op!(0, 1, |c, _, _| c.or_a(c.a)),
    // 0xB8: CP r
    op!(0, 1, |c, _, _| c.cp_a(c.b)),
    op!(0, 1, |c, _, _| c.cp_a(c.c)),
    op!(0, 1, |c, _, _| c.cp_a(c.d)),
    op!(0, 1, |c, _, _| c.cp_a(c.e)),
    op!(0, 1, |c, _, _| c.cp_a(c.h)),
    op!(0, 1, |c, _, _| c.cp_a(c.l)),
    op!(0, 2, |c, m, _| c.cp_a(m.read(c.hl()))),
    op!(0, 1, |c, _, _| c.cp_a(c.a)),
    // 0xC0
    op!(0, 2, |c, m, _| c.ret(m, c.f & FLAG_Z == 0)),                 // RET NZ
    op!(0, 3, |c, m, _| {                                             // POP BC
        let v = c.pop_word(m);
        c.set_bc(v);
    }),
    op!(2, 3, |c, _, n| c.jp(n, c.f & FLAG_Z == 0)),                  // JP NZ,nn
    op!(2, 4, |c, _, n| c.jp(n, true)),                               // JP nn
    op!(2, 3, |c, m, n| c.call(m, n, c.f & FLAG_Z == 0)),             // CALL NZ,nn
    op!(0, 4, |c, m, _| c.push_word(m, c.bc())),                      // PUSH BC
    op!(1, 2, |c, _, n| c.add_a(n as u8, false)),                     // ADD A,n
    op!(0, 4, |c, m, _| c.call(m, 0x0000, true)),                     // RST 0x00
    op!(0, 2, |c, m, _| c.ret(m, c.f & FLAG_Z != 0)),                 // RET Z
    op!(0, 2, |c, m, _| c.ret(m, true)),                              // RET
    op!(2, 3, |c, _, n| c.jp(n, c.f & FLAG_Z != 0)),                  // JP Z,nn
    op!(0, 0, |_, _, _| ()),                                          // CB prefix, dispatched in Cpu::step
    op!(2, 3, |c, m, n| c.call(m, n, c.f & FLAG_Z != 0)),             // CALL Z,nn
    op!(2, 3, |c, m, n| c.call(m, n, true)),                          // CALL nn
    op!(1, 2, |c, _, n| c.add_a(n as u8, true)),                      // ADC A,n
    op!(0, 4, |c, m, _| c.call(m, 0x0008, true)),                     // RST 0x08
    // 0xD0
    op!(0, 2, |c, m, _| c.ret(m, c.f & FLAG_C == 0)),                 // RET NC
    op!(0, 3, |c, m, _| {                                             // POP DE
        let v = c.pop_word(m);
        c.set_de(v);
    }),
    op!(2, 3, |c, _, n| c.jp(n, c.f & FLAG_C == 0)),                  // JP NC,nn
    ill!(0xD3),
    op!(2, 3, |c, m, n| c.call(m, n, c.f & FLAG_C == 0)),             // CALL NC,nn
    op!(0, 4, |c, m, _| c.push_word(m, c.de())),                      // PUSH DE
    op!(1, 2, |c, _, n| c.sub_a(n as u8, false)),                     // SUB n
    op!(0, 4, |c, m, _| c.call(m, 0x0010, true)),                     // RST 0x10
    op!(0, 2, |c, m, _| c.ret(m, c.f & FLAG_C != 0)),                 // RET C
    op!(0, 2, |c, m, _| {                                             // RETI
        c.ret(m, true);
        c.ime = true;
    }),
    op!(2, 3, |c, _, n| c.jp(n, c.f & FLAG_C != 0)),                  // JP C,nn
    ill!(0xDB),
    op!(2, 3, |c, m, n| c.call(m, n, c.f & FLAG_C != 0)),             // CALL C,nn
    ill!(0xDD),
    op!(1, 2, |c, _, n| c.sub_a(n as u8, true)),                      // SBC A,n
    op!(0, 4, |c, m, _| c.call(m, 0x0018, true)),                     // RST 0x18
    // 0xE0
    op!(1, 3, |c, m, n| m.write(0xFF00 | n, c.a)),                    // LDH (n),A
    op!(0, 3, |c, m, _| {                                             // POP HL
        let v = c.pop_word(m);
        c.set_hl(v);
    }),
    op!(0, 2, |c, m, _| m.write(0xFF00 | u16::from(c.c), c.a)),       // LD (0xFF00+C),A
    ill!(0xE3),
    ill!(0xE4),
    op!(0, 4, |c, m, _| c.push_word(m, c.hl())),                      // PUSH HL
    op!(1, 2, |c, _, n| c.and_a(n as u8)),                            // AND n
    op!(0, 4, |c, m, _| c.call(m, 0x0020, true)),                     // RST 0x20
    op!(1, 4, |c, _, n| c.sp = c.add_sp(n as u8)),                    // ADD SP,n
    op!(0, 1, |c, _, _| c.pc = c.hl()),                               // JP (HL)
    op!(2, 4, |c, m, n| m.write(n, c.a)),                             // LD (nn),A
    ill!(0xEB),
    ill!(0xEC),
    ill!(0xED),
    op!(1, 2, |c, _, n| c.xor_a(n as u8)),                            // XOR n
    op!(0, 4, |c, m, _| c.call(m, 0x0028, true)),                     // RST 0x28
    // 0xF0
    op!(1, 3, |c, m, n| c.a = m.read(0xFF00 | n)),                    // LDH A,(n)
    op!(0, 3, |c, m, _| {                                             // POP AF
        let v = c.pop_word(m);
        c.set_af(v);
    }),
    op!(0, 2, |c, m, _| c.a = m.read(0xFF00 | u16::from(c.c))),       // LD A,(0xFF00+C)
    op!(0, 1, |c, _, _| c.ime = false),                               // DI
    ill!(0xF4),
    op!(0, 4, |c, m, _| c.push_word(m, c.af())),                      // PUSH AF
    op!(1, 2, |c, _, n| c.or_a(n as u8)),                             // OR n
    op!(0, 4, |c, m, _| c.call(m, 0x0030, true)),                     // RST 0x30
    op!(1, 4, |c, _, n| {                                             // LD HL,SP+n
        let v = c.add_sp(n as u8);
        c.set_hl(v);
    }),
    op!(0, 1, |c, _, _| c.sp = c.hl()),                               // LD SP,HL
    op!(2, 4, |c, m, n| c.a = m.read(n)),                             // LD A,(nn)
    op!(0, 1, |c, _, _| c.ime = true),                                // EI
    ill!(0xFC),
    ill!(0xFD),
    op!(1, 2, |c, _, n| c.cp_a(n as u8)),                             // CP n
    op!(0, 4, |c, m, _| c.call(m, 0x0038, true)),                     // RST 0x38
];

// CB-prefixed opcodes, indexed [opcode >> 3][opcode & 7]. The column
// order is B, C, D, E, H, L, (HL), A; (HL) forms cost 4 cycles instead
// of 2.

macro_rules! cb_alu {
    ($f:ident) => {
        [
            op!(0, 2, |c, _, _| c.b = c.$f(c.b)),
            op!(0, 2, |c, _, _| c.c = c.$f(c.c)),
            op!(0, 2, |c, _, _| c.d = c.$f(c.d)),
            op!(0, 2, |c, _, _| c.e = c.$f(c.e)),
            op!(0, 2, |c, _, _| c.h = c.$f(c.h)),
            op!(0, 2, |c, _, _| c.l = c.$f(c.l)),
            op!(0, 4, |c, m, _| {
                let v = c.$f(m.read(c.hl()));
                m.write(c.hl(), v);
            }),
            op!(0, 2, |c, _, _| c.a = c.$f(c.a)),
        ]
    };
}

macro_rules! cb_bit {
    ($bit:literal) => {
        [
            op!(0, 2, |c, _, _| c.bit($bit, c.b)),
            op!(0, 2, |c, _, _| c.bit($bit, c.c)),
            op!(0, 2, |c, _, _| c.bit($bit, c.d)),
            op!(0, 2, |c, _, _| c.bit($bit, c.e)),
            op!(0, 2, |c, _, _| c.bit($bit, c.h)),
            op!(0, 2, |c, _, _| c.bit($bit, c.l)),
            op!(0, 4, |c, m, _| {
                let v = m.read(c.hl());
                c.bit($bit, v);
            }),
            op!(0, 2, |c, _, _| c.bit($bit, c.a)),
        ]
    };
}

macro_rules! cb_res {
    ($bit:literal) => {
        [
            op!(0, 2, |c, _, _| c.b &= !(1 << $bit)),
            op!(0, 2, |c, _, _| c.c &= !(1 << $bit)),
            op!(0, 2, |c, _, _| c.d &= !(1 << $bit)),
            op!(0, 2, |c, _, _| c.e &= !(1 << $bit)),
            op!(0, 2, |c, _, _| c.h &= !(1 << $bit)),
            op!(0, 2, |c, _, _| c.l &= !(1 << $bit)),
            op!(0, 4, |c, m, _| {
                let v = m.read(c.hl()) & !(1 << $bit);
                m.write(c.hl(), v);
            }),
            op!(0, 2, |c, _, _| c.a &= !(1 << $bit)),
        ]
    };
}

macro_rules! cb_set {
    ($bit:literal) => {
        [
            op!(0, 2, |c, _, _| c.b |= 1 << $bit),
            op!(0, 2, |c, _, _| c.c |= 1 << $bit),
            op!(0, 2, |c, _, _| c.d |= 1 << $bit),
            op!(0, 2, |c, _, _| c.e |= 1 << $bit),
            op!(0, 2, |c, _, _| c.h |= 1 << $bit),
            op!(0, 2, |c, _, _| c.l |= 1 << $bit),
            op!(0, 4, |c, m, _| {
                let v = m.read(c.hl()) | 1 << $bit;
                m.write(c.hl(), v);
            }),
            op!(0, 2, |c, _, _| c.a |= 1 << $bit),
        ]
    };
}

pub static CB_OPCODES: [[Opcode; 8]; 32] = [
    cb_alu!(rlc),
    cb_alu!(rrc),
    cb_alu!(rl),
    cb_alu!(rr),
    cb_alu!(sla),
    cb_alu!(sra),
    cb_alu!(swap),
    cb_alu!(srl),
    cb_bit!(0),
    cb_bit!(1),
    cb_bit!(2),
    cb_bit!(3),
    cb_bit!(4),
    cb_bit!(5),
    cb_bit!(6),
    cb_bit!(7),
    cb_res!(0),
    cb_res!(1),
    cb_res!(2),
    cb_res!(3),
    cb_res!(4),
    cb_res!(5),
    cb_res!(6),
    cb_res!(7),
    cb_set!(0),
    cb_set!(1),
    cb_set!(2),
    cb_set!(3),
    cb_set!(4),
    cb_set!(5),
    cb_set!(6),
    cb_set!(7),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_lengths_cover_the_table() {
        // Every two-operand entry is a 16-bit load, jump, call, or store.
        let two_byte: Vec<usize> = OPCODES
            .iter()
            .enumerate()
            .filter(|(_, op)| op.operands == 2)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(
            two_byte,
            vec![
                0x01, 0x08, 0x11, 0x21, 0x31, 0xC2, 0xC3, 0xC4, 0xCA, 0xCC, 0xCD, 0xD2, 0xD4,
                0xDA, 0xDC, 0xEA, 0xFA
            ]
        );
    }

    #[test]
    fn hl_column_costs_double_in_cb_space() {
        for row in &CB_OPCODES {
            assert_eq!(row[6].cycles, 4);
            for op in &row[..6] {
                assert_eq!(op.cycles, 2);
            }
            assert_eq!(row[7].cycles, 2);
        }
    }
}
