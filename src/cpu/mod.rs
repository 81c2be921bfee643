//! SH-2 CPU implementation
//!
//! The SH-2 is a 32-bit RISC CPU with fixed 16-bit instructions, a 23-word
//! register file, and delayed branches. This module owns the execution
//! pipeline: fetch, PC advance, delay-slot tracking, exception entry and
//! interrupt arbitration.
//!
//! # Module Organization
//!
//! - `registers`: the flat register file and slot index constants
//! - `flags`: SR bit constants
//! - `decode`: 16-bit opcode to executor mapping
//! - `execute`: instruction execution functions
//! - `helpers`: operand fields, SR accessors, stack push/pop
//!
//! # Pipeline
//!
//! Delayed branches are not modeled by suspending the branch. A branch
//! executor records its target in `delay_target`; the next `cycle()`
//! fetches the delay-slot instruction from the pre-branch PC, moves the
//! target into a per-cycle scratch (`current_delay`), and installs it as
//! the new PC before executing the slot. Illegal-slot detection reads the
//! scratch: a branch executing while it is non-zero traps instead.
//!
//! # References
//! - SH-1/SH-2 Programming Manual (Hitachi ADE-602-063)

use log::{debug, trace};
use thiserror::Error;

use crate::bus::Bus;

mod decode;
mod execute;
pub mod flags;
mod helpers;
pub mod registers;

#[cfg(test)]
mod tests;

pub use decode::{decode, Op};
pub use registers::RegisterFile;

use registers::{PC, SP, SR, VBR};

/// Exception vector table offsets (bus addresses relative to VBR, except
/// the power-on pair which is always read from address zero).
pub mod vectors {
    /// Power-on reset PC (absolute address 0)
    pub const POWER_ON_PC: u32 = 0x00;
    /// Power-on reset SP (absolute address 4)
    pub const POWER_ON_SP: u32 = 0x04;
    /// Soft reset PC
    pub const SOFT_RESET_PC: u32 = 0x08;
    /// Soft reset SP
    pub const SOFT_RESET_SP: u32 = 0x0C;
    /// Illegal instruction handler
    pub const ILLEGAL_INSTRUCTION: u32 = 0x10;
    /// Illegal slot instruction handler
    pub const ILLEGAL_SLOT: u32 = 0x18;
    /// NMI handler
    pub const NMI: u32 = 0x2C;
    /// TRAPA handler base; `imm * 4` is added
    pub const TRAPA_BASE: u32 = 0x80;
    /// IRQ handler base; `line * 4` is added
    pub const IRQ_BASE: u32 = 0x100;
}

/// Host-facing API misuse errors. Guest-visible CPU exceptions (illegal
/// instruction, TRAPA, interrupts) are handled in-band and never surface
/// through this type.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// IRQ line outside 0..=7
    #[error("invalid IRQ line {0} (valid lines are 0-7)")]
    InvalidIrqLine(u8),
}

/// CPU power/execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuState {
    /// Held in reset; `cycle()` does nothing until `power_on()`
    #[default]
    PowerOff,
    /// Normal instruction execution
    ProgramExecution,
    /// Executing an exception or interrupt handler; left via RTE
    ExceptionProcessing,
    /// Parked by SLEEP until an interrupt is accepted
    Sleep,
    /// Deep standby; treated like Sleep (full standby wake-up semantics
    /// are out of scope)
    Standby,
}

/// SH-2 CPU core driving a host-provided bus
pub struct Cpu<B: Bus> {
    /// Architectural register file (R0-R15, SR, GBR, VBR, MACH, MACL,
    /// PR, PC)
    pub regs: RegisterFile,
    /// Power/execution state
    state: CpuState,
    /// Pending delayed-branch target; 0 means none
    delay_target: u32,
    /// Delay target captured at the top of the current cycle. Non-zero
    /// exactly while the delay-slot instruction executes.
    current_delay: u32,
    /// Asserted IRQ lines, one bit per line 0-7
    irq_pending: u8,
    /// Memory bus
    bus: B,
}

impl<B: Bus> Cpu<B> {
    /// Create a CPU wired to `bus`. All registers and pipeline state start
    /// at zero and the CPU is powered off; call [`power_on`](Self::power_on)
    /// to start it.
    pub fn new(bus: B) -> Self {
        Self {
            regs: RegisterFile::new(),
            state: CpuState::PowerOff,
            delay_target: 0,
            current_delay: 0,
            irq_pending: 0,
            bus,
        }
    }

    /// Current power/execution state
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Whether the instruction executed by the current/most recent cycle
    /// sits in a delay slot
    pub fn in_delay_slot(&self) -> bool {
        self.current_delay != 0
    }

    /// Shared access to the bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Exclusive access to the bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Consume the CPU and hand the bus back to the host
    pub fn into_bus(self) -> B {
        self.bus
    }

    // ========== Lifecycle ==========

    /// Hard reset: load PC and SP from the vector table at addresses 0 and
    /// 4, clear VBR, mask all interrupt levels, start executing.
    pub fn power_on(&mut self) {
        self.regs[PC] = self.bus.read32(vectors::POWER_ON_PC);
        self.regs[SP] = self.bus.read32(vectors::POWER_ON_SP);
        self.regs[VBR] = 0;
        self.set_imask(0xF);
        self.delay_target = 0;
        self.current_delay = 0;
        self.irq_pending = 0;
        self.state = CpuState::ProgramExecution;
        debug!(
            "power on: PC={:08X} SP={:08X}",
            self.regs[PC],
            self.regs[SP]
        );
    }

    /// Soft reset: load PC and SP from `VBR + 0x08` / `VBR + 0x0C`, then
    /// clear VBR.
    pub fn soft_reset(&mut self) {
        let vbr = self.regs[VBR];
        self.regs[PC] = self.bus.read32(vbr.wrapping_add(vectors::SOFT_RESET_PC));
        self.regs[SP] = self.bus.read32(vbr.wrapping_add(vectors::SOFT_RESET_SP));
        self.regs[VBR] = 0;
        self.set_imask(0xF);
        self.delay_target = 0;
        self.current_delay = 0;
        self.irq_pending = 0;
        self.state = CpuState::ProgramExecution;
        debug!(
            "soft reset: PC={:08X} SP={:08X}",
            self.regs[PC],
            self.regs[SP]
        );
    }

    // ========== Interrupt Requests ==========

    /// Assert external IRQ line `line` (0-7). The interrupt is taken by a
    /// later `cycle()` once the SR mask allows it.
    pub fn irq(&mut self, line: u8) -> Result<(), CpuError> {
        if line > 7 {
            return Err(CpuError::InvalidIrqLine(line));
        }
        self.irq_pending |= 1 << line;
        Ok(())
    }

    /// Non-maskable interrupt. Takes effect immediately: pushes SR and PC,
    /// raises the interrupt mask to 15 and jumps through the NMI vector.
    pub fn nmi(&mut self) {
        trace!("NMI: PC={:08X}", self.regs[PC]);
        self.push32(self.regs[SR]);
        self.push32(self.regs[PC]);
        self.set_imask(0xF);
        self.state = CpuState::ExceptionProcessing;
        let vector = self.regs[VBR].wrapping_add(vectors::NMI);
        self.regs[PC] = self.bus.read32(vector);
    }

    // ========== Pipeline ==========

    /// Advance the CPU by one instruction, or accept one pending interrupt.
    pub fn cycle(&mut self) {
        match self.state {
            CpuState::PowerOff => {}
            CpuState::Sleep | CpuState::Standby => {
                // Only an interrupt can leave these states
                self.arbitrate_irq();
            }
            CpuState::ProgramExecution | CpuState::ExceptionProcessing => {
                if self.arbitrate_irq() {
                    return;
                }

                let op = self.bus.read16(self.regs[PC]);

                // The delay-slot instruction has been fetched from the
                // pre-branch PC; now the branch takes effect. The scratch
                // copy is what illegal-slot detection looks at.
                if self.delay_target != 0 {
                    self.current_delay = self.delay_target;
                    self.regs[PC] = self.delay_target;
                    self.delay_target = 0;
                } else {
                    self.current_delay = 0;
                    self.regs[PC] = self.regs[PC].wrapping_add(2);
                }

                self.execute(op);
            }
        }
    }

    /// Scan asserted IRQ lines from 7 down to 0 and accept the first whose
    /// level exceeds the SR mask. Returns true if an interrupt was taken.
    fn arbitrate_irq(&mut self) -> bool {
        if self.irq_pending == 0 {
            return false;
        }
        // Interrupts are not accepted between a delayed branch and its
        // slot; the pushed PC could not name both resume points.
        if self.delay_target != 0 {
            return false;
        }

        let mask = self.imask();
        for line in (0u8..8).rev() {
            if self.irq_pending & (1 << line) == 0 || (line as u32) <= mask {
                continue;
            }

            trace!("IRQ {}: PC={:08X} mask={}", line, self.regs[PC], mask);
            self.irq_pending &= !(1 << line);
            self.push32(self.regs[SR]);
            self.push32(self.regs[PC]);
            self.set_imask(line as u32);
            self.state = CpuState::ExceptionProcessing;
            let vector = self.regs[VBR].wrapping_add(vectors::IRQ_BASE + line as u32 * 4);
            self.regs[PC] = self.bus.read32(vector);
            return true;
        }
        false
    }

    // ========== Exceptions ==========

    /// Undefined opcode: push SR and the address of the faulting
    /// instruction, vector through VBR + 0x10.
    fn illegal_instruction(&mut self, op: u16) {
        let fault_pc = self.regs[PC].wrapping_sub(2);
        debug!("illegal instruction {:04X} at {:08X}", op, fault_pc);
        self.push32(self.regs[SR]);
        self.push32(fault_pc);
        self.state = CpuState::ExceptionProcessing;
        let vector = self.regs[VBR].wrapping_add(vectors::ILLEGAL_INSTRUCTION);
        self.regs[PC] = self.bus.read32(vector);
    }

    /// Branch inside a delay slot: push SR and the in-flight delay target
    /// (the address that would have become the next PC), vector through
    /// VBR + 0x18.
    fn illegal_slot(&mut self) {
        debug!("illegal slot instruction, target={:08X}", self.current_delay);
        self.push32(self.regs[SR]);
        self.push32(self.current_delay);
        self.state = CpuState::ExceptionProcessing;
        let vector = self.regs[VBR].wrapping_add(vectors::ILLEGAL_SLOT);
        self.regs[PC] = self.bus.read32(vector);
    }

    /// SLEEP: park until an interrupt is accepted
    fn enter_sleep(&mut self) {
        debug!("sleep at PC={:08X}", self.regs[PC]);
        self.state = CpuState::Sleep;
    }

    /// RTE: pop the return PC into the delay pipeline (the return itself is
    /// a delayed branch), pop SR masked to its defined bits.
    fn return_from_exception(&mut self) {
        self.delay_target = self.pop32();
        let sr = self.pop32();
        self.set_sr(sr);
        self.state = CpuState::ProgramExecution;
    }
}
