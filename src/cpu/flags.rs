//! SH-2 status register bit definitions
//!
//! Bit positions within SR. Only the bits below are architecturally
//! defined; all other SR bits read as zero.
//!
//! # References
//! - SH-1/SH-2 Programming Manual (Hitachi ADE-602-063)

/// T bit (bit 0) - condition flag, carry/borrow/test result
pub const T: u32 = 1 << 0;
/// S bit (bit 1) - multiply-accumulate saturation control
pub const S: u32 = 1 << 1;
/// Interrupt mask field I3-I0 (bits 7-4)
pub const I_MASK: u32 = 0b1111 << 4;
/// Shift of the interrupt mask field within SR
pub const I_SHIFT: u32 = 4;
/// Q bit (bit 8) - division step state
pub const Q: u32 = 1 << 8;
/// M bit (bit 9) - division step state
pub const M: u32 = 1 << 9;

/// Mask of all architecturally defined SR bits.
/// Writes to SR from instructions (LDC, RTE pop) are masked to these.
pub const DEFINED: u32 = T | S | I_MASK | Q | M;
