//! Free-running clock counter
//!
//! The clock counter is read-only and cannot be reset or frozen. It counts
//! FPGA interface clock cycles over the full 64-bit register.

/// Clock counter register
pub const CLK_CNTR: u64 = 0x30;

/// Bit width of the clock counter
pub const COUNTER_WIDTH_BITS: u32 = 64;

/// Clock event codes
pub mod events {
    pub const CLOCK: u8 = 0x0;
}
