use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorType, I2c, Operation};

use crate::{Clock, Error, I2cInterface, Pca9641, RegisterInterface};

/// Channel selection callbacks of a bus multiplexer.
pub trait Mux {
    type Error;

    /// Number of downstream channels.
    const CHANNELS: u32;

    /// Route traffic to `channel`. On error nothing may be sent downstream.
    fn select(&mut self, channel: u32) -> Result<(), Self::Error>;

    /// Stop routing traffic to `channel`.
    fn release(&mut self, channel: u32) -> Result<(), Self::Error>;
}

pub(crate) fn check_channel<E>(channel: u32) -> Result<(), Error<E>> {
    if channel == 0 {
        Ok(())
    } else {
        Err(Error::InvalidChannel(channel))
    }
}

impl<IF, D, C> Mux for Pca9641<IF, D, C>
where
    IF: RegisterInterface,
    D: DelayNs,
    C: Clock,
{
    type Error = Error<IF::Error>;

    const CHANNELS: u32 = 1;

    fn select(&mut self, channel: u32) -> Result<(), Self::Error> {
        check_channel::<IF::Error>(channel)?;
        self.select_bus()
    }

    fn release(&mut self, channel: u32) -> Result<(), Self::Error> {
        check_channel::<IF::Error>(channel)?;
        Ok(self.release_bus()?)
    }
}

/// Withdraw a pending request after a timed out select.
///
/// The caller always sees `Timeout`; a failed withdrawal is only logged.
pub(crate) fn timed_out<E>(released: Result<(), E>) -> Error<E> {
    if released.is_err() {
        warn!("release after arbitration timeout failed");
    }
    Error::Timeout
}

/// Combine a downstream transaction with the release that follows it.
/// The transaction's error wins.
pub(crate) fn transferred<E>(
    result: Result<(), E>,
    released: Result<(), Error<E>>,
) -> Result<(), Error<E>> {
    match (result, released) {
        (Ok(()), released) => released,
        (Err(err), Ok(())) => Err(Error::Transport(err)),
        (Err(err), Err(_)) => {
            warn!("release after failed downstream transaction failed");
            Err(Error::Transport(err))
        }
    }
}

/// The downstream bus behind the arbiter.
///
/// Every transaction acquires the bus first and releases it afterwards, so
/// the lock is never held between transactions.
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
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match self.arbiter.select(0) {
            Ok(()) => {}
            Err(Error::Timeout) => {
                return Err(timed_out(self.arbiter.release_bus()));
            }
            Err(e) => return Err(e),
        }

        let result = self
            .arbiter
            .interface
            .i2c_mut()
            .transaction(address, operations);
        transferred(result, self.arbiter.release(0))
    }
}
