//! SH-2 CPU tests
//!
//! Test suite for the CPU core, organized into:
//! - instructions.rs: per-opcode semantics (data transfer, ALU, shifts,
//!   division steps, multiply-accumulate, control register moves)
//! - pipeline.rs: sequencer behavior (delayed branches, illegal slots,
//!   interrupts, exceptions, lifecycle and power states)
//!
//! # References
//! - SH-1/SH-2 Programming Manual (Hitachi ADE-602-063)

use super::registers::{GBR, MACH, MACL, PC, PR, SP, SR, VBR};
use super::*;
use crate::bus::Bus;


// ========== Test Memory ==========

/// Address where `setup` places the program
pub const ORG: u32 = 0x1000;
/// Initial stack top installed by the power-on vector
pub const STACK_TOP: u32 = 0x8000;
/// Illegal-instruction handler installed at vector 0x10
pub const ILLEGAL_HANDLER: u32 = 0x5000;
/// Illegal-slot handler installed at vector 0x18
pub const SLOT_HANDLER: u32 = 0x5800;
/// NMI handler installed at vector 0x2C
pub const NMI_HANDLER: u32 = 0x6000;

/// Flat 64 KiB test RAM. Addresses wrap at the buffer size so stray
/// accesses stay observable instead of panicking.
pub struct Ram(pub Vec<u8>);

impl Ram {
    pub fn new() -> Self {
        Self(vec![0; 0x10000])
    }
}

impl Bus for Ram {
    fn read8(&mut self, addr: u32) -> u8 {
        self.0[(addr as usize) & 0xFFFF]
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.0[(addr as usize) & 0xFFFF] = value;
    }
}

// ========== Harness ==========

/// Handler address installed for a TRAPA immediate
pub fn trapa_handler(imm: u32) -> u32 {
    0x4000 + imm * 0x10
}

/// Handler address installed for an IRQ line
pub fn irq_handler(line: u32) -> u32 {
    0x7000 + line * 0x20
}

/// Build a powered-on CPU with `program` at [`ORG`], a full vector table,
/// and the stack at [`STACK_TOP`].
pub fn setup(program: &[u16]) -> Cpu<Ram> {
    let mut ram = Ram::new();

    ram.write32(vectors::POWER_ON_PC, ORG);
    ram.write32(vectors::POWER_ON_SP, STACK_TOP);
    ram.write32(vectors::ILLEGAL_INSTRUCTION, ILLEGAL_HANDLER);
    ram.write32(vectors::ILLEGAL_SLOT, SLOT_HANDLER);
    ram.write32(vectors::NMI, NMI_HANDLER);
    for imm in 0..16 {
        ram.write32(vectors::TRAPA_BASE + imm * 4, trapa_handler(imm));
    }
    for line in 0..8 {
        ram.write32(vectors::IRQ_BASE + line * 4, irq_handler(line));
    }

    for (i, &op) in program.iter().enumerate() {
        ram.write16(ORG + (i as u32) * 2, op);
    }

    let mut cpu = Cpu::new(ram);
    cpu.power_on();
    cpu
}

/// Run `count` cycles
pub fn run(cpu: &mut Cpu<Ram>, count: usize) {
    for _ in 0..count {
        cpu.cycle();
    }
}

// ========== Opcode Encoders ==========
// Only the encodings that tests build in loops; one-off instructions are
// written as hex literals with a mnemonic comment.

/// MOV #imm,Rn
pub fn op_mov_imm(n: usize, imm: i8) -> u16 {
    0xE000 | ((n as u16) << 8) | (imm as u8 as u16)
}

/// DIV1 Rm,Rn
pub fn op_div1(m: usize, n: usize) -> u16 {
    0x3004 | ((n as u16) << 8) | ((m as u16) << 4)
}

/// ROTCL Rn
pub fn op_rotcl(n: usize) -> u16 {
    0x4024 | ((n as u16) << 8)
}

#[test]
fn test_harness_vectors() {
    let cpu = setup(&[0x0009]);
    assert_eq!(cpu.regs[PC], ORG);
    assert_eq!(cpu.regs[SP], STACK_TOP);
    assert_eq!(cpu.state(), CpuState::ProgramExecution);
}
