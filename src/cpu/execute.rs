//! SH-2 instruction execution
//!
//! One executor per decoded operation. By the time an executor runs, PC has
//! already been advanced past the instruction (or replaced by a consumed
//! delay-slot target), so the executor-visible PC is `fetch address + 2`.
//! That makes the manual's PC-relative arithmetic fall out directly:
//! word-sized PC-relative bases are `PC + 2`, long-sized bases are
//! `(PC + 2) & !3`, and branch displacement targets are `PC + 2 + disp*2`.
//!
//! Delayed branches never suspend anything; they record the target in
//! `delay_target` and the sequencer consumes it on the next fetch. BT and
//! BF are the only immediate branches and assign PC directly.
//!
//! # References
//! - SH-1/SH-2 Programming Manual (Hitachi ADE-602-063)

use super::decode::{decode, Op};
use super::helpers::{disp4, imm8, reg_m, reg_n, sign_ext8, sign_ext16, simm12, simm8};
use super::registers::{GBR, MACH, MACL, PC, PR, SR, VBR};
use super::{vectors, Cpu, CpuState};
use crate::bus::Bus;

impl<B: Bus> Cpu<B> {
    /// Decode and execute one opcode.
    pub(super) fn execute(&mut self, op: u16) {
        let decoded = decode(op);

        // Branches are illegal in a delay slot; the check reads the scratch
        // target captured at the top of this cycle.
        if decoded.is_branch() && self.current_delay != 0 {
            self.illegal_slot();
            return;
        }

        match decoded {
            // ========== Data Transfer ==========
            Op::MovImm => {
                self.regs[reg_n(op)] = simm8(op);
            }
            Op::MovReg => {
                self.regs[reg_n(op)] = self.regs[reg_m(op)];
            }
            Op::MovWLoadPc => {
                let addr = self.regs[PC].wrapping_add(2).wrapping_add(imm8(op) * 2);
                let value = self.bus.read16(addr);
                self.regs[reg_n(op)] = sign_ext16(value);
            }
            Op::MovLLoadPc => {
                let base = self.regs[PC].wrapping_add(2) & !3;
                let addr = base.wrapping_add(imm8(op) * 4);
                self.regs[reg_n(op)] = self.bus.read32(addr);
            }
            Op::Mova => {
                let base = self.regs[PC].wrapping_add(2) & !3;
                self.regs[0] = base.wrapping_add(imm8(op) * 4);
            }
            Op::MovBStore => {
                let addr = self.regs[reg_n(op)];
                self.bus.write8(addr, self.regs[reg_m(op)] as u8);
            }
            Op::MovWStore => {
                let addr = self.regs[reg_n(op)];
                self.bus.write16(addr, self.regs[reg_m(op)] as u16);
            }
            Op::MovLStore => {
                let addr = self.regs[reg_n(op)];
                self.bus.write32(addr, self.regs[reg_m(op)]);
            }
            Op::MovBLoad => {
                let value = self.bus.read8(self.regs[reg_m(op)]);
                self.regs[reg_n(op)] = sign_ext8(value);
            }
            Op::MovWLoad => {
                let value = self.bus.read16(self.regs[reg_m(op)]);
                self.regs[reg_n(op)] = sign_ext16(value);
            }
            Op::MovLLoad => {
                self.regs[reg_n(op)] = self.bus.read32(self.regs[reg_m(op)]);
            }
            Op::MovBStorePredec => self.store_predec(op, 1),
            Op::MovWStorePredec => self.store_predec(op, 2),
            Op::MovLStorePredec => self.store_predec(op, 4),
            Op::MovBLoadPostinc => {
                let m = reg_m(op);
                let value = self.bus.read8(self.regs[m]);
                self.regs[m] = self.regs[m].wrapping_add(1);
                // Written after the increment, so the load wins when n = m
                self.regs[reg_n(op)] = sign_ext8(value);
            }
            Op::MovWLoadPostinc => {
                let m = reg_m(op);
                let value = self.bus.read16(self.regs[m]);
                self.regs[m] = self.regs[m].wrapping_add(2);
                self.regs[reg_n(op)] = sign_ext16(value);
            }
            Op::MovLLoadPostinc => {
                let m = reg_m(op);
                let value = self.bus.read32(self.regs[m]);
                self.regs[m] = self.regs[m].wrapping_add(4);
                self.regs[reg_n(op)] = value;
            }
            Op::MovBStoreDisp => {
                // MOV.B R0,@(disp,Rn) keeps the base register in the m slot
                let addr = self.regs[reg_m(op)].wrapping_add(disp4(op));
                self.bus.write8(addr, self.regs[0] as u8);
            }
            Op::MovWStoreDisp => {
                let addr = self.regs[reg_m(op)].wrapping_add(disp4(op) * 2);
                self.bus.write16(addr, self.regs[0] as u16);
            }
            Op::MovLStoreDisp => {
                let addr = self.regs[reg_n(op)].wrapping_add(disp4(op) * 4);
                self.bus.write32(addr, self.regs[reg_m(op)]);
            }
            Op::MovBLoadDisp => {
                let addr = self.regs[reg_m(op)].wrapping_add(disp4(op));
                self.regs[0] = sign_ext8(self.bus.read8(addr));
            }
            Op::MovWLoadDisp => {
                let addr = self.regs[reg_m(op)].wrapping_add(disp4(op) * 2);
                self.regs[0] = sign_ext16(self.bus.read16(addr));
            }
            Op::MovLLoadDisp => {
                let addr = self.regs[reg_m(op)].wrapping_add(disp4(op) * 4);
                self.regs[reg_n(op)] = self.bus.read32(addr);
            }
            Op::MovBStoreR0 => {
                let addr = self.regs[0].wrapping_add(self.regs[reg_n(op)]);
                self.bus.write8(addr, self.regs[reg_m(op)] as u8);
            }
            Op::MovWStoreR0 => {
                let addr = self.regs[0].wrapping_add(self.regs[reg_n(op)]);
                self.bus.write16(addr, self.regs[reg_m(op)] as u16);
            }
            Op::MovLStoreR0 => {
                let addr = self.regs[0].wrapping_add(self.regs[reg_n(op)]);
                self.bus.write32(addr, self.regs[reg_m(op)]);
            }
            Op::MovBLoadR0 => {
                let addr = self.regs[0].wrapping_add(self.regs[reg_m(op)]);
                self.regs[reg_n(op)] = sign_ext8(self.bus.read8(addr));
            }
            Op::MovWLoadR0 => {
                let addr = self.regs[0].wrapping_add(self.regs[reg_m(op)]);
                self.regs[reg_n(op)] = sign_ext16(self.bus.read16(addr));
            }
            Op::MovLLoadR0 => {
                let addr = self.regs[0].wrapping_add(self.regs[reg_m(op)]);
                self.regs[reg_n(op)] = self.bus.read32(addr);
            }
            Op::MovBStoreGbr => {
                let addr = self.regs[GBR].wrapping_add(imm8(op));
                self.bus.write8(addr, self.regs[0] as u8);
            }
            Op::MovWStoreGbr => {
                let addr = self.regs[GBR].wrapping_add(imm8(op) * 2);
                self.bus.write16(addr, self.regs[0] as u16);
            }
            Op::MovLStoreGbr => {
                let addr = self.regs[GBR].wrapping_add(imm8(op) * 4);
                self.bus.write32(addr, self.regs[0]);
            }
            Op::MovBLoadGbr => {
                let addr = self.regs[GBR].wrapping_add(imm8(op));
                self.regs[0] = sign_ext8(self.bus.read8(addr));
            }
            Op::MovWLoadGbr => {
                let addr = self.regs[GBR].wrapping_add(imm8(op) * 2);
                self.regs[0] = sign_ext16(self.bus.read16(addr));
            }
            Op::MovLLoadGbr => {
                let addr = self.regs[GBR].wrapping_add(imm8(op) * 4);
                self.regs[0] = self.bus.read32(addr);
            }
            Op::Movt => {
                self.regs[reg_n(op)] = self.flag_t() as u32;
            }

            // ========== Arithmetic ==========
            Op::Add => {
                let n = reg_n(op);
                self.regs[n] = self.regs[n].wrapping_add(self.regs[reg_m(op)]);
            }
            Op::AddImm => {
                let n = reg_n(op);
                self.regs[n] = self.regs[n].wrapping_add(simm8(op));
            }
            Op::Addc => self.alu_addc(op),
            Op::Addv => {
                let n = reg_n(op);
                let (result, overflow) =
                    (self.regs[n] as i32).overflowing_add(self.regs[reg_m(op)] as i32);
                self.regs[n] = result as u32;
                self.set_flag_t(overflow);
            }
            Op::Sub => {
                let n = reg_n(op);
                self.regs[n] = self.regs[n].wrapping_sub(self.regs[reg_m(op)]);
            }
            Op::Subc => self.alu_subc(op),
            Op::Subv => {
                let n = reg_n(op);
                let (result, underflow) =
                    (self.regs[n] as i32).overflowing_sub(self.regs[reg_m(op)] as i32);
                self.regs[n] = result as u32;
                self.set_flag_t(underflow);
            }
            Op::Neg => {
                self.regs[reg_n(op)] = 0u32.wrapping_sub(self.regs[reg_m(op)]);
            }
            Op::Negc => self.alu_negc(op),
            Op::MulL => {
                self.regs[MACL] = self.regs[reg_n(op)].wrapping_mul(self.regs[reg_m(op)]);
            }
            Op::MulsW => {
                let a = self.regs[reg_n(op)] as i16 as i32;
                let b = self.regs[reg_m(op)] as i16 as i32;
                self.regs[MACL] = a.wrapping_mul(b) as u32;
            }
            Op::MuluW => {
                let a = self.regs[reg_n(op)] as u16 as u32;
                let b = self.regs[reg_m(op)] as u16 as u32;
                self.regs[MACL] = a * b;
            }
            Op::DmulsL => {
                let a = self.regs[reg_n(op)] as i32 as i64;
                let b = self.regs[reg_m(op)] as i32 as i64;
                let product = a.wrapping_mul(b) as u64;
                self.regs[MACH] = (product >> 32) as u32;
                self.regs[MACL] = product as u32;
            }
            Op::DmuluL => {
                let product = (self.regs[reg_n(op)] as u64) * (self.regs[reg_m(op)] as u64);
                self.regs[MACH] = (product >> 32) as u32;
                self.regs[MACL] = product as u32;
            }
            Op::MacL => self.alu_mac_l(op),
            Op::MacW => self.alu_mac_w(op),
            Op::Dt => {
                let n = reg_n(op);
                self.regs[n] = self.regs[n].wrapping_sub(1);
                let zero = self.regs[n] == 0;
                self.set_flag_t(zero);
            }

            // ========== Compare ==========
            Op::CmpEq => {
                let t = self.regs[reg_n(op)] == self.regs[reg_m(op)];
                self.set_flag_t(t);
            }
            Op::CmpEqImm => {
                let t = self.regs[0] == simm8(op);
                self.set_flag_t(t);
            }
            Op::CmpHs => {
                let t = self.regs[reg_n(op)] >= self.regs[reg_m(op)];
                self.set_flag_t(t);
            }
            Op::CmpGe => {
                let t = (self.regs[reg_n(op)] as i32) >= (self.regs[reg_m(op)] as i32);
                self.set_flag_t(t);
            }
            Op::CmpHi => {
                let t = self.regs[reg_n(op)] > self.regs[reg_m(op)];
                self.set_flag_t(t);
            }
            Op::CmpGt => {
                let t = (self.regs[reg_n(op)] as i32) > (self.regs[reg_m(op)] as i32);
                self.set_flag_t(t);
            }
            Op::CmpPl => {
                let t = (self.regs[reg_n(op)] as i32) > 0;
                self.set_flag_t(t);
            }
            Op::CmpPz => {
                let t = (self.regs[reg_n(op)] as i32) >= 0;
                self.set_flag_t(t);
            }
            Op::CmpStr => {
                // T set if any of the four byte lanes are equal
                let diff = self.regs[reg_n(op)] ^ self.regs[reg_m(op)];
                let t = diff & 0x0000_00FF == 0
                    || diff & 0x0000_FF00 == 0
                    || diff & 0x00FF_0000 == 0
                    || diff & 0xFF00_0000 == 0;
                self.set_flag_t(t);
            }

            // ========== Division Steps ==========
            Op::Div0u => {
                self.set_flag_m(false);
                self.set_flag_q(false);
                self.set_flag_t(false);
            }
            Op::Div0s => {
                let q = self.regs[reg_n(op)] & 0x8000_0000 != 0;
                let m = self.regs[reg_m(op)] & 0x8000_0000 != 0;
                self.set_flag_q(q);
                self.set_flag_m(m);
                self.set_flag_t(q != m);
            }
            Op::Div1 => self.alu_div1(op),

            // ========== Logical ==========
            Op::And => {
                let n = reg_n(op);
                self.regs[n] &= self.regs[reg_m(op)];
            }
            Op::AndImm => {
                self.regs[0] &= imm8(op);
            }
            Op::AndB => self.gbr_rmw(op, |v, imm| v & imm),
            Op::Or => {
                let n = reg_n(op);
                self.regs[n] |= self.regs[reg_m(op)];
            }
            Op::OrImm => {
                self.regs[0] |= imm8(op);
            }
            Op::OrB => self.gbr_rmw(op, |v, imm| v | imm),
            Op::Xor => {
                let n = reg_n(op);
                self.regs[n] ^= self.regs[reg_m(op)];
            }
            Op::XorImm => {
                self.regs[0] ^= imm8(op);
            }
            Op::XorB => self.gbr_rmw(op, |v, imm| v ^ imm),
            Op::Not => {
                self.regs[reg_n(op)] = !self.regs[reg_m(op)];
            }
            Op::Tst => {
                let t = self.regs[reg_n(op)] & self.regs[reg_m(op)] == 0;
                self.set_flag_t(t);
            }
            Op::TstImm => {
                let t = self.regs[0] & imm8(op) == 0;
                self.set_flag_t(t);
            }
            Op::TstB => {
                let addr = self.regs[0].wrapping_add(self.regs[GBR]);
                let t = (self.bus.read8(addr) as u32) & imm8(op) == 0;
                self.set_flag_t(t);
            }
            Op::Tas => {
                // Read-modify-write; not atomic against external bus masters
                let addr = self.regs[reg_n(op)];
                let value = self.bus.read8(addr);
                self.set_flag_t(value == 0);
                self.bus.write8(addr, value | 0x80);
            }

            // ========== Shift / Rotate ==========
            Op::Shll | Op::Shal => {
                let n = reg_n(op);
                self.set_flag_t(self.regs[n] & 0x8000_0000 != 0);
                self.regs[n] <<= 1;
            }
            Op::Shlr => {
                let n = reg_n(op);
                self.set_flag_t(self.regs[n] & 1 != 0);
                self.regs[n] >>= 1;
            }
            Op::Shar => {
                let n = reg_n(op);
                self.set_flag_t(self.regs[n] & 1 != 0);
                self.regs[n] = ((self.regs[n] as i32) >> 1) as u32;
            }
            Op::Shll2 => self.regs[reg_n(op)] <<= 2,
            Op::Shll8 => self.regs[reg_n(op)] <<= 8,
            Op::Shll16 => self.regs[reg_n(op)] <<= 16,
            Op::Shlr2 => self.regs[reg_n(op)] >>= 2,
            Op::Shlr8 => self.regs[reg_n(op)] >>= 8,
            Op::Shlr16 => self.regs[reg_n(op)] >>= 16,
            Op::Rotl => {
                let n = reg_n(op);
                self.set_flag_t(self.regs[n] & 0x8000_0000 != 0);
                self.regs[n] = self.regs[n].rotate_left(1);
            }
            Op::Rotr => {
                let n = reg_n(op);
                self.set_flag_t(self.regs[n] & 1 != 0);
                self.regs[n] = self.regs[n].rotate_right(1);
            }
            Op::Rotcl => {
                let n = reg_n(op);
                let carry_in = self.flag_t() as u32;
                self.set_flag_t(self.regs[n] & 0x8000_0000 != 0);
                self.regs[n] = (self.regs[n] << 1) | carry_in;
            }
            Op::Rotcr => {
                let n = reg_n(op);
                let carry_in = (self.flag_t() as u32) << 31;
                self.set_flag_t(self.regs[n] & 1 != 0);
                self.regs[n] = (self.regs[n] >> 1) | carry_in;
            }

            // ========== Bit Scan / Pack ==========
            Op::SwapB => {
                let rm = self.regs[reg_m(op)];
                self.regs[reg_n(op)] =
                    (rm & 0xFFFF_0000) | ((rm & 0xFF) << 8) | ((rm >> 8) & 0xFF);
            }
            Op::SwapW => {
                self.regs[reg_n(op)] = self.regs[reg_m(op)].rotate_left(16);
            }
            Op::ExtsB => {
                self.regs[reg_n(op)] = sign_ext8(self.regs[reg_m(op)] as u8);
            }
            Op::ExtsW => {
                self.regs[reg_n(op)] = sign_ext16(self.regs[reg_m(op)] as u16);
            }
            Op::ExtuB => {
                self.regs[reg_n(op)] = self.regs[reg_m(op)] & 0xFF;
            }
            Op::ExtuW => {
                self.regs[reg_n(op)] = self.regs[reg_m(op)] & 0xFFFF;
            }
            Op::Xtrct => {
                let n = reg_n(op);
                self.regs[n] = (self.regs[reg_m(op)] << 16) | (self.regs[n] >> 16);
            }

            // ========== Branches ==========
            // Delayed unless noted; targets are word displacements off PC+2.
            Op::Bra => {
                self.delay_target = self.disp12_target(op);
            }
            Op::Bsr => {
                self.regs[PR] = self.regs[PC].wrapping_add(2);
                self.delay_target = self.disp12_target(op);
            }
            Op::Bt => {
                // Immediate (non-delayed) conditional branch
                if self.flag_t() {
                    self.regs[PC] = self.disp8_target(op);
                }
            }
            Op::Bf => {
                if !self.flag_t() {
                    self.regs[PC] = self.disp8_target(op);
                }
            }
            Op::Bts => {
                if self.flag_t() {
                    self.delay_target = self.disp8_target(op);
                }
            }
            Op::Bfs => {
                if !self.flag_t() {
                    self.delay_target = self.disp8_target(op);
                }
            }
            Op::Braf => {
                self.delay_target = self.regs[PC].wrapping_add(2).wrapping_add(self.regs[reg_n(op)]);
            }
            Op::Bsrf => {
                let return_pc = self.regs[PC].wrapping_add(2);
                self.regs[PR] = return_pc;
                self.delay_target = return_pc.wrapping_add(self.regs[reg_n(op)]);
            }
            Op::Jmp => {
                self.delay_target = self.regs[reg_n(op)];
            }
            Op::Jsr => {
                self.regs[PR] = self.regs[PC].wrapping_add(2);
                self.delay_target = self.regs[reg_n(op)];
            }
            Op::Rts => {
                self.delay_target = self.regs[PR];
            }

            // ========== System ==========
            Op::Nop => {}
            Op::Sleep => self.enter_sleep(),
            Op::Rte => self.return_from_exception(),
            Op::Trapa => {
                let vector = self.regs[VBR].wrapping_add(vectors::TRAPA_BASE + imm8(op) * 4);
                let return_pc = self.regs[PC];
                self.push32(self.regs[SR]);
                self.push32(return_pc);
                self.state = CpuState::ExceptionProcessing;
                self.regs[PC] = self.bus.read32(vector);
            }
            Op::Clrt => self.set_flag_t(false),
            Op::Sett => self.set_flag_t(true),
            Op::Clrmac => {
                self.regs[MACH] = 0;
                self.regs[MACL] = 0;
            }
            Op::LdcSr => {
                let value = self.regs[reg_n(op)];
                self.set_sr(value);
            }
            Op::LdcGbr => self.regs[GBR] = self.regs[reg_n(op)],
            Op::LdcVbr => self.regs[VBR] = self.regs[reg_n(op)],
            Op::LdcLSr => {
                let value = self.load_postinc(op);
                self.set_sr(value);
            }
            Op::LdcLGbr => {
                self.regs[GBR] = self.load_postinc(op);
            }
            Op::LdcLVbr => {
                self.regs[VBR] = self.load_postinc(op);
            }
            Op::StcSr => self.regs[reg_n(op)] = self.regs[SR],
            Op::StcGbr => self.regs[reg_n(op)] = self.regs[GBR],
            Op::StcVbr => self.regs[reg_n(op)] = self.regs[VBR],
            Op::StcLSr => self.store_predec_from(op, SR),
            Op::StcLGbr => self.store_predec_from(op, GBR),
            Op::StcLVbr => self.store_predec_from(op, VBR),
            Op::LdsMach => self.regs[MACH] = self.regs[reg_n(op)],
            Op::LdsMacl => self.regs[MACL] = self.regs[reg_n(op)],
            Op::LdsPr => self.regs[PR] = self.regs[reg_n(op)],
            Op::LdsLMach => {
                self.regs[MACH] = self.load_postinc(op);
            }
            Op::LdsLMacl => {
                self.regs[MACL] = self.load_postinc(op);
            }
            Op::LdsLPr => {
                self.regs[PR] = self.load_postinc(op);
            }
            Op::StsMach => self.regs[reg_n(op)] = self.regs[MACH],
            Op::StsMacl => self.regs[reg_n(op)] = self.regs[MACL],
            Op::StsPr => self.regs[reg_n(op)] = self.regs[PR],
            Op::StsLMach => self.store_predec_from(op, MACH),
            Op::StsLMacl => self.store_predec_from(op, MACL),
            Op::StsLPr => self.store_predec_from(op, PR),

            Op::Illegal => self.illegal_instruction(op),
        }
    }

    // ========== Addressing Helpers ==========

    /// Target of an 8-bit-displacement branch: PC + 2 + disp*2
    #[inline]
    fn disp8_target(&self, op: u16) -> u32 {
        self.regs[PC].wrapping_add(2).wrapping_add(simm8(op) << 1)
    }

    /// Target of a 12-bit-displacement branch: PC + 2 + disp*2
    #[inline]
    fn disp12_target(&self, op: u16) -> u32 {
        self.regs[PC].wrapping_add(2).wrapping_add(simm12(op) << 1)
    }

    /// MOV.{B,W,L} Rm,@-Rn: decrement Rn, then store. When n = m the
    /// decremented value is what lands in memory.
    fn store_predec(&mut self, op: u16, size: u32) {
        let n = reg_n(op);
        self.regs[n] = self.regs[n].wrapping_sub(size);
        let addr = self.regs[n];
        let value = self.regs[reg_m(op)];
        match size {
            1 => self.bus.write8(addr, value as u8),
            2 => self.bus.write16(addr, value as u16),
            _ => self.bus.write32(addr, value),
        }
    }

    /// `.L ...,@-Rn` control/system stores: decrement Rn by 4, write source
    fn store_predec_from(&mut self, op: u16, source: usize) {
        let n = reg_n(op);
        self.regs[n] = self.regs[n].wrapping_sub(4);
        let addr = self.regs[n];
        let value = self.regs[source];
        self.bus.write32(addr, value);
    }

    /// `.L @Rm+,...` control/system loads: read a long, increment Rm by 4
    fn load_postinc(&mut self, op: u16) -> u32 {
        let m = reg_n(op);
        let value = self.bus.read32(self.regs[m]);
        self.regs[m] = self.regs[m].wrapping_add(4);
        value
    }

    /// Read-modify-write byte at R0 + GBR for the `.B #imm,@(R0,GBR)` forms
    fn gbr_rmw(&mut self, op: u16, f: fn(u32, u32) -> u32) {
        let addr = self.regs[0].wrapping_add(self.regs[GBR]);
        let value = self.bus.read8(addr) as u32;
        self.bus.write8(addr, f(value, imm8(op)) as u8);
    }

    // ========== ALU Helpers ==========

    /// ADDC: Rn + Rm + T, T becomes the ripple carry. The carry is set when
    /// either partial sum wraps.
    fn alu_addc(&mut self, op: u16) {
        let n = reg_n(op);
        let rn = self.regs[n];
        let partial = rn.wrapping_add(self.regs[reg_m(op)]);
        let result = partial.wrapping_add(self.flag_t() as u32);
        self.regs[n] = result;
        self.set_flag_t(partial < rn || result < partial);
    }

    /// SUBC: Rn - Rm - T, T becomes the borrow.
    fn alu_subc(&mut self, op: u16) {
        let n = reg_n(op);
        let rn = self.regs[n];
        let partial = rn.wrapping_sub(self.regs[reg_m(op)]);
        let result = partial.wrapping_sub(self.flag_t() as u32);
        self.regs[n] = result;
        self.set_flag_t(partial > rn || result > partial);
    }

    /// NEGC: 0 - Rm - T with borrow into T.
    fn alu_negc(&mut self, op: u16) {
        let temp = 0u32.wrapping_sub(self.regs[reg_m(op)]);
        let result = temp.wrapping_sub(self.flag_t() as u32);
        self.regs[reg_n(op)] = result;
        self.set_flag_t(temp != 0 || result > temp);
    }

    /// MAC.L: two post-incremented long loads, signed 64-bit multiply,
    /// accumulate into {MACH:MACL}. Wrap-around; SR.S saturation is not
    /// implemented.
    fn alu_mac_l(&mut self, op: u16) {
        let m = reg_m(op);
        let a = self.bus.read32(self.regs[m]);
        self.regs[m] = self.regs[m].wrapping_add(4);
        let n = reg_n(op);
        let b = self.bus.read32(self.regs[n]);
        self.regs[n] = self.regs[n].wrapping_add(4);

        let product = (a as i32 as i64).wrapping_mul(b as i32 as i64);
        let mac = (((self.regs[MACH] as u64) << 32) | self.regs[MACL] as u64) as i64;
        let sum = mac.wrapping_add(product) as u64;
        self.regs[MACH] = (sum >> 32) as u32;
        self.regs[MACL] = sum as u32;
    }

    /// MAC.W: two post-incremented word loads, signed multiply, accumulate
    /// into MACL only. MACH is untouched.
    fn alu_mac_w(&mut self, op: u16) {
        let m = reg_m(op);
        let a = self.bus.read16(self.regs[m]);
        self.regs[m] = self.regs[m].wrapping_add(2);
        let n = reg_n(op);
        let b = self.bus.read16(self.regs[n]);
        self.regs[n] = self.regs[n].wrapping_add(2);

        let product = (a as i16 as i32).wrapping_mul(b as i16 as i32);
        self.regs[MACL] = self.regs[MACL].wrapping_add(product as u32);
    }

    /// DIV1: one restoring-division step. The conditional cascade follows
    /// the SH-2 manual table; reordering any branch changes Q.
    fn alu_div1(&mut self, op: u16) {
        let n = reg_n(op);
        let rm = self.regs[reg_m(op)];
        let old_q = self.flag_q();
        let m = self.flag_m();

        let mut q = self.regs[n] & 0x8000_0000 != 0;
        self.regs[n] = (self.regs[n] << 1) | self.flag_t() as u32;

        // Subtract when the previous step's Q agrees with M, add otherwise;
        // fold the carry/borrow back into Q per the manual's table.
        let tmp0 = self.regs[n];
        let tmp1 = if old_q == m {
            self.regs[n] = self.regs[n].wrapping_sub(rm);
            self.regs[n] > tmp0
        } else {
            self.regs[n] = self.regs[n].wrapping_add(rm);
            self.regs[n] < tmp0
        };
        q = if m { q == tmp1 } else { q != tmp1 };

        self.set_flag_q(q);
        self.set_flag_t(q == m);
    }
}
