//! Generic register abstractions for type-safe 32-bit register programming

use crate::window::{GasWindow, Result};

/// Trait for register layouts that can be converted to/from raw register values
///
/// This trait provides type-safe conversion between structured register
/// layouts and the raw 32-bit values read from or written to the GAS.
///
/// # Example
///
/// ```
/// use switchtec_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct MyControl {
///     enable: bool,
///     threshold: u8,
/// }
///
/// impl RegisterLayout for MyControl {
///     fn to_reg_value(&self) -> u32 {
///         (if self.enable { 1 } else { 0 }) | ((self.threshold as u32) << 8)
///     }
///
///     fn from_reg_value(value: u32) -> Self {
///         Self {
///             enable: (value & 1) != 0,
///             threshold: ((value >> 8) & 0xFF) as u8,
///         }
///     }
/// }
///
/// assert_eq!(MyControl { enable: true, threshold: 2 }.to_reg_value(), 0x201);
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw register value
    fn to_reg_value(&self) -> u32;

    /// Parse a raw register value into this register layout
    fn from_reg_value(value: u32) -> Self;
}

/// A 32-bit register at a fixed GAS offset with a typed layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register<T: RegisterLayout> {
    /// Absolute GAS offset
    pub offset: usize,
    _layout: std::marker::PhantomData<T>,
}

impl<T: RegisterLayout> Register<T> {
    pub const fn at(offset: usize) -> Self {
        Self {
            offset,
            _layout: std::marker::PhantomData,
        }
    }

    /// Read and decode the register
    pub fn read(&self, window: &dyn GasWindow) -> Result<T> {
        window.read32(self.offset).map(T::from_reg_value)
    }
}
