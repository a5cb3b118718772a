//! Generic register abstractions for type-safe MMIO programming

/// A contiguous bit range `[low, high]` inside a 64-bit register
///
/// # Example
///
/// ```
/// use fmeperf_raw::BitField;
///
/// const EVENT: BitField = BitField::new(16, 19);
///
/// let v = EVENT.set(0xFFFF_0000_0000_0000, 0xA);
/// assert_eq!(EVENT.get(v), 0xA);
/// assert_eq!(v >> 48, 0xFFFF);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub low: u32,
    pub high: u32,
}

impl BitField {
    pub const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    pub const fn bit(pos: u32) -> Self {
        Self {
            low: pos,
            high: pos,
        }
    }

    pub const fn width(&self) -> u32 {
        self.high - self.low + 1
    }

    /// Mask of the field in register position
    pub const fn mask(&self) -> u64 {
        if self.width() == 64 {
            u64::MAX
        } else {
            ((1u64 << self.width()) - 1) << self.low
        }
    }

    /// Extract the field from a raw register value
    pub const fn get(&self, value: u64) -> u64 {
        (value & self.mask()) >> self.low
    }

    /// Replace the field in `value`, leaving every other bit untouched
    pub const fn set(&self, value: u64, field: u64) -> u64 {
        (value & !self.mask()) | ((field << self.low) & self.mask())
    }

    pub const fn is_set(&self, value: u64) -> bool {
        value & self.mask() != 0
    }
}

/// Trait for register layouts that can be converted to/from raw values
///
/// Layouts only own the bits listed in [`RegisterLayout::FIELDS`]. Writing a
/// layout back with [`RegisterLayout::update`] preserves every other bit of
/// the current register value, which is what the hardware expects for
/// read-modify-write sequences.
///
/// # Example
///
/// ```ignore
/// use fmeperf_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct MyControl {
///     enable: bool,
///     threshold: u8,
/// }
///
/// impl RegisterLayout for MyControl {
///     const FIELDS: u64 = 0xFF01;
///
///     fn to_reg_value(&self) -> u64 {
///         (if self.enable { 1 } else { 0 })
///             | ((self.threshold as u64) << 8)
///     }
///
///     fn from_reg_value(value: u64) -> Self {
///         Self {
///             enable: (value & 1) != 0,
///             threshold: ((value >> 8) & 0xFF) as u8,
///         }
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// Bits of the register described by this layout
    const FIELDS: u64;

    /// Convert this register layout to a raw register value
    fn to_reg_value(&self) -> u64;

    /// Parse a raw register value into this register layout
    fn from_reg_value(value: u64) -> Self;

    /// Merge this layout into `current`, preserving bits it does not own
    fn update(&self, current: u64) -> u64 {
        (current & !Self::FIELDS) | (self.to_reg_value() & Self::FIELDS)
    }

    /// Validate that the register values are within acceptable ranges
    ///
    /// Returns `Ok(())` if valid, or an error message if invalid.
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}
