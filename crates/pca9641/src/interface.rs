//! Register transport to the arbiter.
//!
//! Transactions here are raw: the caller already owns the upstream bus for
//! their duration, so nothing in this module takes a lock of its own.
use bitflags::bitflags;

bitflags! {
    /// Transaction shapes a transport can issue.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        /// Single-byte register reads and writes
        const BYTE_DATA   = 0b01;
        /// Two-byte register writes in one transaction
        const BLOCK_WRITE = 0b10;
    }
}

/// Blocking register access.
pub trait RegisterInterface {
    type Error;

    fn read_byte(&mut self, command: u8) -> Result<u8, Self::Error>;

    fn write_byte(&mut self, command: u8, value: u8) -> Result<(), Self::Error>;

    /// Write `v1` and `v2` to consecutive registers in one transaction.
    fn write_block(
        &mut self,
        command: u8,
        v1: u8,
        v2: u8,
    ) -> Result<(), Self::Error>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }
}

/// Async register access.
#[allow(async_fn_in_trait)]
pub trait AsyncRegisterInterface {
    type Error;

    async fn read_byte(&mut self, command: u8) -> Result<u8, Self::Error>;

    async fn write_byte(
        &mut self,
        command: u8,
        value: u8,
    ) -> Result<(), Self::Error>;

    /// Write `v1` and `v2` to consecutive registers in one transaction.
    async fn write_block(
        &mut self,
        command: u8,
        v1: u8,
        v2: u8,
    ) -> Result<(), Self::Error>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }
}

/// Register transport over an `embedded-hal` I2C bus.
#[derive(Debug)]
pub struct I2cInterface<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cInterface<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// The upstream bus, for traffic routed past the arbiter.
    pub fn i2c_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: embedded_hal::i2c::I2c> RegisterInterface for I2cInterface<I2C> {
    type Error = I2C::Error;

    fn read_byte(&mut self, command: u8) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        self.i2c.write_read(self.address, &[command], &mut buf)?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, command: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[command, value])
    }

    fn write_block(
        &mut self,
        command: u8,
        v1: u8,
        v2: u8,
    ) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[command, v1, v2])
    }
}

impl<I2C: embedded_hal_async::i2c::I2c> AsyncRegisterInterface
    for I2cInterface<I2C>
{
    type Error = I2C::Error;

    async fn read_byte(&mut self, command: u8) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.address, &[command], &mut buf)
            .await?;
        Ok(buf[0])
    }

    async fn write_byte(
        &mut self,
        command: u8,
        value: u8,
    ) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[command, value]).await
    }

    async fn write_block(
        &mut self,
        command: u8,
        v1: u8,
        v2: u8,
    ) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[command, v1, v2]).await
    }
}
