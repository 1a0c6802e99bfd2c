use super::{
    legacy, wide, GestureEvents0, GestureEvents1, Profile, ProductVariant, ReadyWait,
    SystemConfig0, SystemControl1, SystemFlags, TouchFrame, TouchState, TrackpadConfig,
    TrackpadError, FAST_I2C_TIMEOUT_MS, FAST_REPORT_RATE_MS, LEGACY_STABILIZE_MS,
    RESET_SETTLE_MS, WAKE_DELAY_US,
};
use crate::register::{Legacy8, Wide16};
use crate::BlockingRegisterDevice;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use embedded_hal::i2c::{Error, ErrorKind, I2c, NoAcknowledgeSource};

/// Outcome of the zero-length presence probe
enum Presence {
    Awake,
    /// Address acknowledged, data phase refused
    Asleep,
    Absent,
}

/// IQS5xx-B000 trackpad driver.
///
/// Without a ready pin the driver runs the [`Profile::Legacy`] register map;
/// with one it runs [`Profile::ReadyLine`], which wakes the device, checks the
/// product number and switches it to manual control during [`begin`](Self::begin).
#[derive(Debug)]
pub struct IQS5xx<I2C, RDY, DELAY> {
    dev: BlockingRegisterDevice<I2C>,
    rdy_pin: Option<RDY>,
    delay: DELAY,
    config: TrackpadConfig,
    last_frame: TouchFrame,
}

impl<I2C, RDY, DELAY> IQS5xx<I2C, RDY, DELAY>
where
    I2C: I2c,
    RDY: InputPin,
    DELAY: DelayNs,
{
    /// Create a new IQS5xx instance at the default address
    pub fn new(i2c: I2C, rdy_pin: Option<RDY>, delay: DELAY) -> Self {
        Self::new_with_config(i2c, rdy_pin, delay, TrackpadConfig::default())
    }

    pub fn new_with_config(
        i2c: I2C,
        rdy_pin: Option<RDY>,
        delay: DELAY,
        config: TrackpadConfig,
    ) -> Self {
        Self {
            dev: BlockingRegisterDevice::new(i2c, config.address),
            rdy_pin,
            delay,
            config,
            last_frame: TouchFrame::default(),
        }
    }

    /// Replace the runtime configuration.
    ///
    /// The bus address is fixed at construction; `config.address` is ignored.
    pub fn set_config(&mut self, config: TrackpadConfig) {
        self.config = TrackpadConfig {
            address: self.dev.adr,
            ..config
        };
    }

    pub fn config(&self) -> &TrackpadConfig {
        &self.config
    }

    pub fn profile(&self) -> Profile {
        if self.rdy_pin.is_some() {
            Profile::ReadyLine
        } else {
            Profile::Legacy
        }
    }

    /// Most recent fully decoded frame, all zero until the first one
    pub fn last_frame(&self) -> &TouchFrame {
        &self.last_frame
    }

    /// Give back the bus, the ready pin and the delay
    pub fn release(self) -> (I2C, Option<RDY>, DELAY) {
        (self.dev.release(), self.rdy_pin, self.delay)
    }

    /// Initialize the trackpad
    pub fn begin(&mut self) -> Result<(), TrackpadError> {
        match self.profile() {
            Profile::Legacy => self.begin_legacy(),
            Profile::ReadyLine => self.begin_ready_line(),
        }
    }

    fn begin_legacy(&mut self) -> Result<(), TrackpadError> {
        if !self.is_connected() {
            return Err(TrackpadError::DeviceAbsent);
        }
        self.delay.delay_ms(LEGACY_STABILIZE_MS);

        if self.needs_reset()? {
            self.soft_reset()?;
        }
        Ok(())
    }

    fn begin_ready_line(&mut self) -> Result<(), TrackpadError> {
        match self.probe() {
            Presence::Awake => {}
            Presence::Asleep => self.wake()?,
            Presence::Absent => {
                #[cfg(feature = "defmt")]
                defmt::warn!("IQS5xx not found at 0x{:02x}", self.dev.adr);
                return Err(TrackpadError::DeviceAbsent);
            }
        }

        let _variant = self.product_variant()?;
        #[cfg(feature = "defmt")]
        defmt::info!("IQS5xx product: {}", _variant);

        self.enable_manual_control()?;
        self.delay.delay_ms(self.config.settle_ms);
        Ok(())
    }

    fn probe(&mut self) -> Presence {
        match self.dev.probe() {
            Ok(()) => Presence::Awake,
            Err(e) if e.kind() == ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => {
                Presence::Asleep
            }
            Err(_) => Presence::Absent,
        }
    }

    /// The first probe is expected to fail; it only starts the wake-up.
    fn wake(&mut self) -> Result<(), TrackpadError> {
        #[cfg(feature = "defmt")]
        defmt::debug!("IQS5xx asleep, waking");

        let _ = self.dev.probe();
        self.delay.delay_us(WAKE_DELAY_US);
        self.dev.probe().map_err(|_| TrackpadError::WakeFailed)
    }

    fn enable_manual_control(&mut self) -> Result<(), TrackpadError> {
        self.dev.set_register_bits::<Wide16>(
            wide::SYSTEM_CONFIG_0,
            SystemConfig0::MANUAL_CONTROL.bits(),
        )?;
        Ok(())
    }

    /// Check if the device acknowledges its address
    pub fn is_connected(&mut self) -> bool {
        self.dev.probe().is_ok()
    }

    pub fn product_number(&mut self) -> Result<u16, TrackpadError> {
        let result = match self.profile() {
            Profile::Legacy => self
                .dev
                .read_register_u16::<Legacy8>(legacy::PRODUCT_NUMBER)?,
            Profile::ReadyLine => self
                .dev
                .read_register_u16::<Wide16>(wide::PRODUCT_NUMBER)?,
        };
        Ok(result)
    }

    /// Product number checked against the known variants
    pub fn product_variant(&mut self) -> Result<ProductVariant, TrackpadError> {
        let product = self.product_number()?;
        if product == 0 {
            return Err(TrackpadError::UnrecognizedDevice(product));
        }
        ProductVariant::try_from((product & 0xFF) as u8)
            .map_err(|_| TrackpadError::UnrecognizedDevice(product))
    }

    pub fn version_info(&mut self) -> Result<u16, TrackpadError> {
        let result = match self.profile() {
            Profile::Legacy => self
                .dev
                .read_register_u16::<Legacy8>(legacy::VERSION_INFO)?,
            Profile::ReadyLine => self.dev.read_register_u16::<Wide16>(wide::VERSION)?,
        };
        Ok(result)
    }

    pub fn system_flags(&mut self) -> Result<SystemFlags, TrackpadError> {
        let result = match self.profile() {
            Profile::Legacy => self.dev.read_register::<Legacy8>(legacy::SYSTEM_FLAGS)?,
            Profile::ReadyLine => self.dev.read_register::<Wide16>(wide::SYSTEM_FLAGS)?,
        };
        Ok(SystemFlags::from_bits_retain(result))
    }

    pub fn needs_reset(&mut self) -> Result<bool, TrackpadError> {
        Ok(self.system_flags()?.contains(SystemFlags::SHOW_RESET))
    }

    /// Request a soft reset and wait for the device to come back
    pub fn soft_reset(&mut self) -> Result<(), TrackpadError> {
        #[cfg(feature = "defmt")]
        defmt::debug!("IQS5xx soft reset");

        match self.profile() {
            Profile::Legacy => self.dev.write_register::<Legacy8>(
                legacy::SYSTEM_FLAGS,
                SystemFlags::SHOW_RESET.bits(),
            )?,
            Profile::ReadyLine => self.dev.write_register::<Wide16>(
                wide::SYSTEM_CONTROL_1,
                SystemControl1::RESET.bits(),
            )?,
        }
        self.delay.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }

    /// Shorten the ready line timeout and the active report interval to 5 ms
    pub fn increase_speed(&mut self) -> Result<(), TrackpadError> {
        self.dev
            .write_register::<Wide16>(wide::I2C_TIMEOUT, FAST_I2C_TIMEOUT_MS)?;
        self.dev
            .write_register_u16::<Wide16>(wide::ACTIVE_REPORT_RATE, FAST_REPORT_RATE_MS)?;
        Ok(())
    }

    /// Single sample of the ready line. Always true without one.
    pub fn is_touch_available(&mut self) -> Result<bool, TrackpadError> {
        match self.rdy_pin.as_mut() {
            Some(pin) => pin.is_high().map_err(|_| TrackpadError::PinError),
            None => Ok(true),
        }
    }

    fn wait_for_ready(&mut self) -> Result<(), TrackpadError> {
        let Some(pin) = self.rdy_pin.as_mut() else {
            return Ok(());
        };

        // A zero interval still has to advance the timeout
        let step_us = self.config.poll_interval_us.max(1);
        let mut waited_us: u32 = 0;
        loop {
            if pin.is_high().map_err(|_| TrackpadError::PinError)? {
                return Ok(());
            }
            if let ReadyWait::Bounded { timeout_us } = self.config.ready_wait {
                if waited_us >= timeout_us {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("IQS5xx ready timeout after {} us", waited_us);
                    return Err(TrackpadError::ReadyTimeout);
                }
            }
            self.delay.delay_us(self.config.poll_interval_us);
            waited_us = waited_us.saturating_add(step_us);
        }
    }

    /// Read one touch report.
    ///
    /// Returns `Ok(None)` when the ready-line profile reads a zero coordinate;
    /// the remaining registers are then not read and the cached frame is kept.
    pub fn read_touch(&mut self) -> Result<Option<TouchFrame>, TrackpadError> {
        let frame = match self.profile() {
            Profile::Legacy => Some(self.read_legacy_frame()?),
            Profile::ReadyLine => self.read_frame()?,
        };
        if let Some(frame) = frame {
            self.last_frame = frame;
        }
        Ok(frame)
    }

    fn read_frame(&mut self) -> Result<Option<TouchFrame>, TrackpadError> {
        self.wait_for_ready()?;

        let x = self.dev.read_register_u16::<Wide16>(wide::TOUCH_X)?;
        if x == 0 {
            return Ok(None);
        }
        let y = self.dev.read_register_u16::<Wide16>(wide::TOUCH_Y)?;
        if y == 0 {
            return Ok(None);
        }

        let gestures0 = self.dev.read_register::<Wide16>(wide::GESTURE_EVENTS_0)?;
        let gestures1 = self.dev.read_register::<Wide16>(wide::GESTURE_EVENTS_1)?;

        let touch_strength = self.dev.read_register::<Wide16>(wide::TOUCH_STRENGTH)?;
        let area = self.dev.read_register::<Wide16>(wide::TOUCH_AREA)?;
        let state = TouchState::classify(x, y, touch_strength);

        let num_fingers = self.dev.read_register::<Wide16>(wide::NUM_FINGERS)?;

        Ok(Some(TouchFrame {
            x,
            y,
            touch_strength,
            area,
            num_fingers,
            gestures0: GestureEvents0::from_bits_truncate(gestures0),
            gestures1: GestureEvents1::from_bits_truncate(gestures1),
            state,
        }))
    }

    fn read_legacy_frame(&mut self) -> Result<TouchFrame, TrackpadError> {
        let mut buffer = [0u8; legacy::COORDINATES_LEN];
        self.dev
            .read_register_buffer::<Legacy8>(legacy::COORDINATES, &mut buffer)?;
        Ok(TouchFrame::from_legacy_block(&buffer))
    }

    /// Fresh touch state, `NoTouch` when the report was aborted
    pub fn touch_state(&mut self) -> Result<TouchState, TrackpadError> {
        let state = self
            .read_touch()?
            .map_or(TouchState::NoTouch, |frame| frame.state);
        Ok(state)
    }

    /// Fresh X coordinate, 0 without a touch
    pub fn touch_x(&mut self) -> Result<u16, TrackpadError> {
        Ok(self.read_touched()?.map_or(0, |frame| frame.x))
    }

    /// Fresh Y coordinate, 0 without a touch
    pub fn touch_y(&mut self) -> Result<u16, TrackpadError> {
        Ok(self.read_touched()?.map_or(0, |frame| frame.y))
    }

    pub fn touch_strength(&mut self) -> Result<u8, TrackpadError> {
        Ok(self.read_touched()?.map_or(0, |frame| frame.touch_strength))
    }

    pub fn touch_area(&mut self) -> Result<u8, TrackpadError> {
        Ok(self.read_touched()?.map_or(0, |frame| frame.area))
    }

    fn read_touched(&mut self) -> Result<Option<TouchFrame>, TrackpadError> {
        Ok(self.read_touch()?.filter(TouchFrame::is_touched))
    }
}
