//! Register access over a blocking I2C bus.
//!
//! The IQS5xx family exposes two register maps: an older one addressed with a
//! single byte, and the current one addressed with two bytes. Both are reached
//! through [`BlockingRegisterDevice`], parameterised by an [`AddressScheme`].

use embedded_hal::i2c::I2c;

/// Encoding rules for one register-addressing scheme.
pub trait AddressScheme {
    /// Register address type.
    type Register: Copy;

    /// Number of address bytes sent ahead of any payload.
    const ADDRESS_LEN: usize;

    /// Address bytes in transmission order. Only the first
    /// [`ADDRESS_LEN`](Self::ADDRESS_LEN) bytes are sent.
    fn encode_address(reg: Self::Register) -> [u8; 2];

    /// Assemble a 16-bit register value from the bytes in the order they were read.
    fn assemble_u16(bytes: [u8; 2]) -> u16;
}

/// Single-byte register addresses. Multi-byte values are little-endian.
#[derive(Debug, Clone, Copy)]
pub struct Legacy8;

impl AddressScheme for Legacy8 {
    type Register = u8;
    const ADDRESS_LEN: usize = 1;

    fn encode_address(reg: u8) -> [u8; 2] {
        [reg, 0]
    }

    fn assemble_u16(bytes: [u8; 2]) -> u16 {
        u16::from_le_bytes(bytes)
    }
}

/// Two-byte big-endian register addresses. Multi-byte values are big-endian.
#[derive(Debug, Clone, Copy)]
pub struct Wide16;

impl AddressScheme for Wide16 {
    type Register = u16;
    const ADDRESS_LEN: usize = 2;

    fn encode_address(reg: u16) -> [u8; 2] {
        reg.to_be_bytes()
    }

    fn assemble_u16(bytes: [u8; 2]) -> u16 {
        u16::from_be_bytes(bytes)
    }
}

#[derive(Debug)]
pub struct BlockingRegisterDevice<I2C> {
    i2c: I2C,
    pub(crate) adr: u8,
}

impl<I2C> BlockingRegisterDevice<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, adr: u8) -> Self {
        Self { i2c, adr }
    }

    /// Zero-length write used to check whether the device acknowledges its address.
    pub fn probe(&mut self) -> Result<(), I2C::Error> {
        self.i2c.write(self.adr, &[])
    }

    /// Reads `buffer.len()` bytes starting at `reg`.
    ///
    /// The register pointer is set in its own transaction, closed with a stop,
    /// before the data is requested.
    pub fn read_register_buffer<S: AddressScheme>(
        &mut self,
        reg: S::Register,
        buffer: &mut [u8],
    ) -> Result<(), I2C::Error> {
        let address = S::encode_address(reg);
        self.i2c.write(self.adr, &address[..S::ADDRESS_LEN])?;
        self.i2c.read(self.adr, buffer)
    }

    pub fn read_register<S: AddressScheme>(&mut self, reg: S::Register) -> Result<u8, I2C::Error> {
        let mut buffer = [0u8; 1];
        self.read_register_buffer::<S>(reg, &mut buffer)?;
        Ok(buffer[0])
    }

    pub fn read_register_u16<S: AddressScheme>(
        &mut self,
        reg: S::Register,
    ) -> Result<u16, I2C::Error> {
        let mut buffer = [0u8; 2];
        self.read_register_buffer::<S>(reg, &mut buffer)?;
        Ok(S::assemble_u16(buffer))
    }

    pub fn write_register<S: AddressScheme>(
        &mut self,
        reg: S::Register,
        value: u8,
    ) -> Result<(), I2C::Error> {
        let address = S::encode_address(reg);
        let mut buffer = [0u8; 3];
        buffer[..S::ADDRESS_LEN].copy_from_slice(&address[..S::ADDRESS_LEN]);
        buffer[S::ADDRESS_LEN] = value;
        self.i2c.write(self.adr, &buffer[..S::ADDRESS_LEN + 1])
    }

    /// Writes a 16-bit value, high byte first.
    pub fn write_register_u16<S: AddressScheme>(
        &mut self,
        reg: S::Register,
        value: u16,
    ) -> Result<(), I2C::Error> {
        let address = S::encode_address(reg);
        let mut buffer = [0u8; 4];
        buffer[..S::ADDRESS_LEN].copy_from_slice(&address[..S::ADDRESS_LEN]);
        buffer[S::ADDRESS_LEN..S::ADDRESS_LEN + 2].copy_from_slice(&value.to_be_bytes());
        self.i2c.write(self.adr, &buffer[..S::ADDRESS_LEN + 2])
    }

    /// Read-modify-write that ORs `mask` into the register.
    pub fn set_register_bits<S: AddressScheme>(
        &mut self,
        reg: S::Register,
        mask: u8,
    ) -> Result<(), I2C::Error> {
        let value = self.read_register::<S>(reg)?;
        self.write_register::<S>(reg, value | mask)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
