use core::fmt::{Display, Formatter};

// https://www.azoteq.com/images/stories/pdf/iqs5xx-b000_trackpad_datasheet.pdf
use bitflags::bitflags;
use embedded_hal::i2c::{Error, ErrorKind};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Default I2C address of the IQS5xx-B000 trackpad controller
pub const IQS5XX_DEFAULT_ADDRESS: u8 = 0x74;

/// Delay between the two wake-up probes. The device needs at least 150 µs.
pub(crate) const WAKE_DELAY_US: u32 = 200;
/// Stabilisation delay after a successful legacy presence probe
pub(crate) const LEGACY_STABILIZE_MS: u32 = 10;
/// Time the device needs to come back after a soft reset
pub(crate) const RESET_SETTLE_MS: u32 = 100;

/// Ready line assertion timeout written by `increase_speed`, in ms (default 100)
pub(crate) const FAST_I2C_TIMEOUT_MS: u8 = 5;
/// Active report interval written by `increase_speed`, in ms (default 100)
pub(crate) const FAST_REPORT_RATE_MS: u16 = 5;

/// Register map of the current firmware, addressed with two bytes.
pub mod wide {
    pub const PRODUCT_NUMBER: u16 = 0x0000;
    pub const VERSION: u16 = 0x0002;
    pub const GESTURE_EVENTS_0: u16 = 0x000D;
    pub const GESTURE_EVENTS_1: u16 = 0x000E;
    pub const SYSTEM_FLAGS: u16 = 0x0010;
    pub const NUM_FINGERS: u16 = 0x0011;
    pub const TOUCH_X: u16 = 0x0016;
    pub const TOUCH_Y: u16 = 0x0018;
    pub const TOUCH_STRENGTH: u16 = 0x001A;
    pub const TOUCH_AREA: u16 = 0x001B;
    pub const SYSTEM_CONTROL_1: u16 = 0x0432;
    pub const ACTIVE_REPORT_RATE: u16 = 0x057A;
    pub const I2C_TIMEOUT: u16 = 0x058A;
    pub const SYSTEM_CONFIG_0: u16 = 0x058E;
}

/// Register map used without the ready line, addressed with one byte.
pub mod legacy {
    pub const PRODUCT_NUMBER: u8 = 0x00;
    pub const VERSION_INFO: u8 = 0x01;
    pub const SYSTEM_FLAGS: u8 = 0x10;
    /// Start of the 8 byte block: x (2), y (2), strength, -, area, -
    pub const COORDINATES: u8 = 0x11;
    pub const COORDINATES_LEN: usize = 8;
}

/// Recognised products, keyed by the low byte of the product number
#[derive(Debug, Clone, Copy, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProductVariant {
    IQS550 = 40,
    IQS525 = 52,
    IQS572 = 58,
}

impl Display for ProductVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ProductVariant::IQS550 => write!(f, "IQS550"),
            ProductVariant::IQS525 => write!(f, "IQS525"),
            ProductVariant::IQS572 => write!(f, "IQS572"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchState {
    #[default]
    NoTouch = 0,
    SingleTouch = 1,
    /// Never produced by decoding. See [`TouchFrame::is_multi_finger`].
    MultiTouch = 2,
}

impl TouchState {
    /// A zero strength, or zero on both axes, is the sensor's idle encoding.
    pub fn classify(x: u16, y: u16, touch_strength: u8) -> Self {
        if touch_strength == 0 || (x == 0 && y == 0) {
            TouchState::NoTouch
        } else {
            TouchState::SingleTouch
        }
    }
}

impl Display for TouchState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            TouchState::NoTouch => write!(f, "No touch"),
            TouchState::SingleTouch => write!(f, "Single touch"),
            TouchState::MultiTouch => write!(f, "Multi touch"),
        }
    }
}

bitflags! {
    /// Gesture Events 0 register (0x000D)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GestureEvents0: u8 {
        const SINGLE_TAP     = 1 << 0;
        const PRESS_AND_HOLD = 1 << 1;
        const SWIPE_X_MINUS  = 1 << 2;
        const SWIPE_X_PLUS   = 1 << 3;
        const SWIPE_Y_PLUS   = 1 << 4;
        const SWIPE_Y_MINUS  = 1 << 5;
    }
}

impl Default for GestureEvents0 {
    fn default() -> Self {
        GestureEvents0::empty()
    }
}

bitflags! {
    /// Gesture Events 1 register (0x000E)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GestureEvents1: u8 {
        const TWO_FINGER_TAP = 1 << 0;
        const SCROLL         = 1 << 1;
        const ZOOM           = 1 << 2;
    }
}

impl Default for GestureEvents1 {
    fn default() -> Self {
        GestureEvents1::empty()
    }
}

bitflags! {
    /// System flags, same layout in both register maps
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SystemFlags: u8 {
        /// Device has reset and the event has not been acknowledged
        const SHOW_RESET = 1 << 7;
        const ATE_ERROR  = 1 << 6;
        const REATI      = 1 << 5;
        const ALP_ATI    = 1 << 4;
        const LP_ATI     = 1 << 3;
        const SNAP       = 1 << 1;
        const SETUP      = 1 << 0;
    }
}

bitflags! {
    /// System Config 0 register (0x058E)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SystemConfig0: u8 {
        /// Host drives the communication windows instead of the autonomous cadence
        const MANUAL_CONTROL = 1 << 7;
        const SETUP_COMPLETE = 1 << 6;
        const WDT            = 1 << 5;
        const SW_INPUT_EVENT = 1 << 2;
        const ALP_RESEED     = 1 << 1;
        const RESEED         = 1 << 0;
    }
}

bitflags! {
    /// System Control 1 register (0x0432)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SystemControl1: u8 {
        const RESET   = 1 << 1;
        const SUSPEND = 1 << 0;
    }
}

#[cfg(feature = "defmt")]
macro_rules! impl_flags_format {
    ($($flags:ty),*) => {
        $(
            impl defmt::Format for $flags {
                fn format(&self, f: defmt::Formatter) {
                    self.iter_names().for_each(|(name, _)| {
                        defmt::write!(f, "{} ", name);
                    });
                }
            }
        )*
    };
}

#[cfg(feature = "defmt")]
impl_flags_format!(
    GestureEvents0,
    GestureEvents1,
    SystemFlags,
    SystemConfig0,
    SystemControl1
);

/// One decoded touch report
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchFrame {
    pub x: u16,
    pub y: u16,
    /// Zero means no touch, whatever the coordinates say
    pub touch_strength: u8,
    pub area: u8,
    pub num_fingers: u8,
    pub gestures0: GestureEvents0,
    pub gestures1: GestureEvents1,
    pub state: TouchState,
}

impl TouchFrame {
    /// Decodes the legacy coordinate block. Values are little-endian.
    pub fn from_legacy_block(buffer: &[u8; legacy::COORDINATES_LEN]) -> Self {
        let x = u16::from_le_bytes([buffer[0], buffer[1]]);
        let y = u16::from_le_bytes([buffer[2], buffer[3]]);
        let touch_strength = buffer[4];
        let area = buffer[6];

        TouchFrame {
            x,
            y,
            touch_strength,
            area,
            state: TouchState::classify(x, y, touch_strength),
            ..TouchFrame::default()
        }
    }

    pub fn is_touched(&self) -> bool {
        self.state != TouchState::NoTouch
    }

    /// More than one contact reported. The frame still only carries one
    /// coordinate set.
    pub fn is_multi_finger(&self) -> bool {
        self.num_fingers > 1
    }

    pub fn single_tap(&self) -> bool {
        self.gestures0.contains(GestureEvents0::SINGLE_TAP)
    }

    pub fn press_and_hold(&self) -> bool {
        self.gestures0.contains(GestureEvents0::PRESS_AND_HOLD)
    }

    pub fn swipe_x_minus(&self) -> bool {
        self.gestures0.contains(GestureEvents0::SWIPE_X_MINUS)
    }

    pub fn swipe_x_plus(&self) -> bool {
        self.gestures0.contains(GestureEvents0::SWIPE_X_PLUS)
    }

    pub fn swipe_y_plus(&self) -> bool {
        self.gestures0.contains(GestureEvents0::SWIPE_Y_PLUS)
    }

    pub fn swipe_y_minus(&self) -> bool {
        self.gestures0.contains(GestureEvents0::SWIPE_Y_MINUS)
    }

    pub fn two_finger_tap(&self) -> bool {
        self.gestures1.contains(GestureEvents1::TWO_FINGER_TAP)
    }

    pub fn scroll(&self) -> bool {
        self.gestures1.contains(GestureEvents1::SCROLL)
    }

    pub fn zoom(&self) -> bool {
        self.gestures1.contains(GestureEvents1::ZOOM)
    }
}

/// Which register map and start-up sequence the driver uses.
///
/// Picked at construction: a driver given a ready pin runs [`Profile::ReadyLine`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Profile {
    /// One-byte addresses, no ready line, no wake-up or identity check
    Legacy,
    /// Two-byte addresses, reads gated by the ready line
    ReadyLine,
}

/// How long to wait for the ready line before giving up
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadyWait {
    /// Poll forever. A device that never asserts ready hangs the caller.
    Unbounded,
    Bounded { timeout_us: u32 },
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackpadConfig {
    /// Bus address, only read when the driver is constructed
    pub address: u8,
    pub ready_wait: ReadyWait,
    /// Delay between two samples of the ready line
    pub poll_interval_us: u32,
    /// Delay at the end of a successful initialization
    pub settle_ms: u32,
}

impl Default for TrackpadConfig {
    fn default() -> Self {
        Self {
            address: IQS5XX_DEFAULT_ADDRESS,
            ready_wait: ReadyWait::Bounded {
                timeout_us: 200_000,
            },
            poll_interval_us: 100,
            settle_ms: 10,
        }
    }
}

/// Errors that can occur when interacting with the IQS5xx
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackpadError {
    /// Bus transaction failed, including short reads
    I2CError(ErrorKind),
    PinError,
    /// Presence probe failed with something other than a data NACK
    DeviceAbsent,
    /// Second wake-up probe was not acknowledged
    WakeFailed,
    /// Product number low byte is not a known variant
    UnrecognizedDevice(u16),
    /// Ready line stayed low for the whole bounded wait
    ReadyTimeout,
}

impl Display for TrackpadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            TrackpadError::I2CError(kind) => write!(f, "I2C error: {kind}"),
            TrackpadError::PinError => write!(f, "Ready pin error"),
            TrackpadError::DeviceAbsent => write!(f, "Device not found"),
            TrackpadError::WakeFailed => write!(f, "Device did not wake up"),
            TrackpadError::UnrecognizedDevice(product) => {
                write!(f, "Unrecognized product number 0x{product:04X}")
            }
            TrackpadError::ReadyTimeout => write!(f, "Timed out waiting for ready"),
        }
    }
}

impl<E> From<E> for TrackpadError
where
    E: Error,
{
    fn from(error: E) -> Self {
        TrackpadError::I2CError(error.kind())
    }
}

pub mod blocking;
