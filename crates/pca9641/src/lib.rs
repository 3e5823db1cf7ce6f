#![no_std]
//! Driver for the NXP PCA9641 two-master I2C bus arbiter.
//!
//! The PCA9641 connects two I2C masters to a single downstream bus. Before
//! each downstream transaction a master has to acquire ownership through the
//! chip, and release it once the transaction is done. That maps onto a
//! single-channel multiplexer: [`Mux::select`] acquires, [`Mux::release`]
//! gives the bus back, and [`ArbitratedBus`] wraps both around every
//! transaction so downstream drivers can use it as a plain
//! `embedded_hal::i2c::I2c`.
//!
//! The two masters are expected to sit on two different hosts. If one host
//! drives both, only one of them may be attached at any given time.

mod fmt;

pub mod asynch;
mod clock;
mod config;
mod error;
mod interface;
mod mux;
pub mod registers;

pub use clock::Clock;
#[cfg(feature = "time")]
pub use clock::SystemClock;
pub use config::{Config, RetryDelay, ARBITRATION_TIMEOUT, RESERVE_TIME_MS};
pub use error::Error;
pub use interface::{
    AsyncRegisterInterface, Capabilities, I2cInterface, RegisterInterface,
};
pub use mux::{ArbitratedBus, Mux};
pub use registers::{Control, Register, Status};

use clock::Deadline;
use embedded_hal::delay::DelayNs;
use registers::Step;

/// Transaction shapes the arbitration protocol relies on.
const REQUIRED_CAPABILITIES: Capabilities =
    Capabilities::BYTE_DATA.union(Capabilities::BLOCK_WRITE);

pub(crate) fn check_capabilities<E>(
    capabilities: Capabilities,
) -> Result<(), Error<E>> {
    if capabilities.contains(REQUIRED_CAPABILITIES) {
        Ok(())
    } else {
        error!("transport cannot issue byte and block register writes");
        Err(Error::Unsupported)
    }
}

/// Result of a single arbitration poll.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Acquired,
    NotAcquired,
}

/// Blocking PCA9641 driver.
pub struct Pca9641<IF, D, C> {
    interface: IF,
    delay: D,
    clock: C,
    config: Config,
    retry_delay: RetryDelay,
}

impl<IF, D, C> Pca9641<IF, D, C>
where
    IF: RegisterInterface,
    D: DelayNs,
    C: Clock,
{
    /// Attach to the arbiter and force it into the released state.
    ///
    /// The transport is owned from here on, so the reset cannot race another
    /// transaction on the upstream bus.
    pub fn attach(
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
        arbiter.release_bus()?;

        info!("registered PCA9641 master selector");
        Ok(arbiter)
    }

    /// Give back the transport, delay and clock.
    pub fn detach(self) -> (IF, D, C) {
        (self.interface, self.delay, self.clock)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Delay chosen by the most recent poll.
    pub fn retry_delay(&self) -> RetryDelay {
        self.retry_delay
    }

    /// Poll the arbiter once, requesting the bus if no request is pending.
    ///
    /// Never sleeps. Calling it again once the bus is acquired only reads
    /// the control register.
    pub fn arbitrate(&mut self) -> Result<Outcome, IF::Error> {
        let control = self.read_control()?;
        trace!("arbitrate: control = {}", control.bits());

        let step = Step::from(control);
        if step == Step::Request {
            self.interface.write_block(
                Register::Control.auto_inc(),
                Control::REQUEST.bits(),
                self.config.reserve_time_ms,
            )?;
        }

        match step.retry_delay() {
            None => Ok(Outcome::Acquired),
            Some(delay) => {
                self.retry_delay = delay;
                Ok(Outcome::NotAcquired)
            }
        }
    }

    /// Acquire the downstream bus, polling until it is granted or the
    /// arbitration timeout elapses.
    ///
    /// A transport error aborts immediately. After [`Error::Timeout`] no
    /// lock is held.
    pub fn select_bus(&mut self) -> Result<(), Error<IF::Error>> {
        self.retry_delay = RetryDelay::default();
        let deadline =
            Deadline::after(&self.clock, self.config.arbitration_timeout);

        loop {
            if self.arbitrate()? == Outcome::Acquired {
                debug!("downstream bus acquired");
                return Ok(());
            }

            match self.retry_delay.as_micros() {
                0 => {}
                us => self.delay.delay_us(us),
            }

            if deadline.expired(&self.clock) {
                break;
            }
        }

        warn!("bus arbitration timed out");
        Err(Error::Timeout)
    }

    /// Release the downstream bus.
    ///
    /// Clears the whole control register, including any bus init or test
    /// bits, whatever its current state. Safe to call when the bus was never
    /// acquired.
    pub fn release_bus(&mut self) -> Result<(), IF::Error> {
        self.write_control(Control::empty())
    }

    pub fn read_control(&mut self) -> Result<Control, IF::Error> {
        let reg = self.interface.read_byte(Register::Control.addr())?;
        Ok(Control::from_bits_retain(reg))
    }

    pub fn write_control(&mut self, control: Control) -> Result<(), IF::Error> {
        self.interface
            .write_byte(Register::Control.addr(), control.bits())
    }

    pub fn read_status(&mut self) -> Result<Status, IF::Error> {
        let reg = self.interface.read_byte(Register::Status.addr())?;
        Ok(Status::from_bits_retain(reg))
    }

    /// Reserve time currently programmed in the chip, in ms.
    pub fn read_reserve_time(&mut self) -> Result<u8, IF::Error> {
        self.interface.read_byte(Register::ReserveTime.addr())
    }
}
