#![no_std]
//! IQS5xx-B000 Trackpad Library
//!
//! This library provides an interface to the Azoteq IQS5xx-B000 capacitive
//! trackpad controller over I2C. It covers device detection and wake-up,
//! register access for both register maps of the family, and decoding of
//! touch reports into coordinates, finger count and gesture events.

/// IQS5xx trackpad controller driver.
pub mod iqs5xx;

/// Register access shared by both addressing schemes.
pub mod register;

extern crate alloc;

pub(crate) use register::BlockingRegisterDevice;

pub use iqs5xx::blocking::IQS5xx;
pub use iqs5xx::{
    Profile, ProductVariant, ReadyWait, TouchFrame, TouchState, TrackpadConfig, TrackpadError,
    IQS5XX_DEFAULT_ADDRESS,
};
