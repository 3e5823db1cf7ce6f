//! Async PCA9641 driver over `embedded-hal-async`.
//!
//! Same protocol as the blocking [`crate::Pca9641`]; the poll loop yields to
//! the executor while it backs off.
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

use crate::clock::Deadline;
use crate::mux::{check_channel, timed_out, transferred};
use crate::registers::Step;
use crate::{
    check_capabilities, AsyncRegisterInterface, Clock, Config, Control, Error,
    I2cInterface, Outcome, Register, RetryDelay, Status,
};

/// Channel selection callbacks of an async bus multiplexer.
#[allow(async_fn_in_trait)]
pub trait Mux {
    type Error;

    /// Number of downstream channels.
    const CHANNELS: u32;

    async fn select(&mut self, channel: u32) -> Result<(), Self::Error>;

    async fn release(&mut self, channel: u32) -> Result<(), Self::Error>;
}

pub struct Pca9641<IF, D, C> {
    interface: IF,
    delay: D,
    clock: C,
    config: Config,
    retry_delay: RetryDelay,
}

impl<IF, D, C> Pca9641<IF, D, C>
where
    IF: AsyncRegisterInterface,
    D: DelayNs,
    C: Clock,
{
    /// Attach to the arbiter and force it into the released state.
    pub async fn attach(
        interface: IF,
        delay: D,
        clock: C,
        config: Config,
    ) -> Result<Self, Error<IF::Error>> {
        check_capabilities::<IF::Error>(interface.capabilities())?;

        let mut arbiter = Self {
            interface,
            delay,
            clock,
            config,
            retry_delay: RetryDelay::default(),
        };
        arbiter.release_bus().await?;

        info!("registered PCA9641 master selector");
        Ok(arbiter)
    }

    pub fn detach(self) -> (IF, D, C) {
        (self.interface, self.delay, self.clock)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn retry_delay(&self) -> RetryDelay {
        self.retry_delay
    }

    pub async fn arbitrate(&mut self) -> Result<Outcome, IF::Error> {
        let control = self.read_control().await?;
        trace!("arbitrate: control = {}", control.bits());

        let step = Step::from(control);
        if step == Step::Request {
            self.interface
                .write_block(
                    Register::Control.auto_inc(),
                    Control::REQUEST.bits(),
                    self.config.reserve_time_ms,
                )
                .await?;
        }

        match step.retry_delay() {
            None => Ok(Outcome::Acquired),
            Some(delay) => {
                self.retry_delay = delay;
                Ok(Outcome::NotAcquired)
            }
        }
    }

    pub async fn select_bus(&mut self) -> Result<(), Error<IF::Error>> {
        self.retry_delay = RetryDelay::default();
        let deadline =
            Deadline::after(&self.clock, self.config.arbitration_timeout);

        loop {
            if self.arbitrate().await? == Outcome::Acquired {
                debug!("downstream bus acquired");
                return Ok(());
            }

            match self.retry_delay.as_micros() {
                0 => {}
                us => self.delay.delay_us(us).await,
            }

            if deadline.expired(&self.clock) {
                break;
            }
        }

        warn!("bus arbitration timed out");
        Err(Error::Timeout)
    }

    pub async fn release_bus(&mut self) -> Result<(), IF::Error> {
        self.write_control(Control::empty()).await
    }

    pub async fn read_control(&mut self) -> Result<Control, IF::Error> {
        let reg = self.interface.read_byte(Register::Control.addr()).await?;
        Ok(Control::from_bits_retain(reg))
    }

    pub async fn write_control(
        &mut self,
        control: Control,
    ) -> Result<(), IF::Error> {
        self.interface
            .write_byte(Register::Control.addr(), control.bits())
            .await
    }

    pub async fn read_status(&mut self) -> Result<Status, IF::Error> {
        let reg = self.interface.read_byte(Register::Status.addr()).await?;
        Ok(Status::from_bits_retain(reg))
    }

    pub async fn read_reserve_time(&mut self) -> Result<u8, IF::Error> {
        self.interface
            .read_byte(Register::ReserveTime.addr())
            .await
    }
}

impl<IF, D, C> Mux for Pca9641<IF, D, C>
where
    IF: AsyncRegisterInterface,
    D: DelayNs,
    C: Clock,
{
    type Error = Error<IF::Error>;

    const CHANNELS: u32 = 1;

    async fn select(&mut self, channel: u32) -> Result<(), Self::Error> {
        check_channel::<IF::Error>(channel)?;
        self.select_bus().await
    }

    async fn release(&mut self, channel: u32) -> Result<(), Self::Error> {
        check_channel::<IF::Error>(channel)?;
        Ok(self.release_bus().await?)
    }
}

/// The downstream bus behind the arbiter, acquired around every transaction.
pub struct ArbitratedBus<'a, I2C, D, C> {
    arbiter: &'a mut Pca9641<I2cInterface<I2C>, D, C>,
}

impl<I2C, D, C> Pca9641<I2cInterface<I2C>, D, C>
where
    I2C: I2c,
    D: DelayNs,
    C: Clock,
{
    pub fn downstream(&mut self) -> ArbitratedBus<'_, I2C, D, C> {
        ArbitratedBus { arbiter: self }
    }
}

impl<I2C, D, C> ErrorType for ArbitratedBus<'_, I2C, D, C>
where
    I2C: I2c,
{
    type Error = Error<I2C::Error>;
}

impl<I2C, D, C> I2c for ArbitratedBus<'_, I2C, D, C>
where
    I2C: I2c,
    D: DelayNs,
    C: Clock,
{
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match self.arbiter.select(0).await {
            Ok(()) => {}
            Err(Error::Timeout) => {
                return Err(timed_out(self.arbiter.release_bus().await));
            }
            Err(e) => return Err(e),
        }

        let result = self
            .arbiter
            .interface
            .i2c_mut()
            .transaction(address, operations)
            .await;
        transferred(result, self.arbiter.release(0).await)
    }
}
