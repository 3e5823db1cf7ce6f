//! Register map of the PCA9641.
use bitflags::bitflags;

use crate::RetryDelay;

/// Set in the command byte to auto-increment the register pointer, so that a
/// block write starting at [`Register::Control`] continues into
/// [`Register::ReserveTime`].
pub const AUTO_INC: u8 = 0x80;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Control = 0x01,
    Status = 0x02,
    ReserveTime = 0x03,
}

impl Register {
    /// Command byte addressing this register.
    pub const fn addr(self) -> u8 {
        self as u8
    }

    /// Command byte addressing this register with auto-increment enabled.
    pub const fn auto_inc(self) -> u8 {
        self as u8 | AUTO_INC
    }
}

bitflags! {
    /// Control register (0x01)
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Control: u8 {
        /// 1: This master requests a lock on the downstream bus
        const LOCK_REQ       = 0b0000_0001;
        /// 1: This master has been granted the lock (read only)
        const LOCK_GRANT     = 0b0000_0010;
        /// 1: Connect this master to the downstream bus
        const BUS_CONNECT    = 0b0000_0100;
        /// 1: Start a downstream bus initialization sequence
        const BUS_INIT       = 0b0000_1000;
        /// 1: Issue an SMBus software reset on the downstream bus
        const SMBUS_SWRST    = 0b0001_0000;
        /// 1: Disable the idle timer that drops an unused lock
        const IDLE_TIMER_DIS = 0b0010_0000;
        /// 1: Disable the SMBus time-out function
        const SMBUS_DIS      = 0b0100_0000;
        /// 1: This master wins simultaneous requests
        const PRIORITY       = 0b1000_0000;
    }
}

impl Control {
    /// Bits that together report a granted and connected bus.
    pub const CONNECT: Self = Self::LOCK_REQ
        .union(Self::LOCK_GRANT)
        .union(Self::BUS_CONNECT);

    /// Value written to request ownership.
    pub const REQUEST: Self = Self::LOCK_REQ
        .union(Self::BUS_CONNECT)
        .union(Self::IDLE_TIMER_DIS);

    /// This master holds the lock and is connected downstream.
    pub const fn connected(&self) -> bool {
        self.bits() & Self::CONNECT.bits() == Self::CONNECT.bits()
    }

    /// A lock request from this master is pending without a grant.
    pub const fn requested(&self) -> bool {
        self.bits() & Self::CONNECT.bits() == Self::LOCK_REQ.bits()
    }
}

bitflags! {
    /// Status register (0x02), read only
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Status: u8 {
        /// 1: The other master holds the lock
        const OTHER_LOCK    = 0b0000_0001;
        /// 1: Downstream bus initialization failed
        const BUS_INIT_FAIL = 0b0000_0010;
        /// 1: Downstream bus is hung
        const BUS_HUNG      = 0b0000_0100;
        /// 1: Mailbox is empty
        const MBOX_EMPTY    = 0b0000_1000;
        /// 1: Mailbox is full
        const MBOX_FULL     = 0b0001_0000;
        /// 1: Test interrupt is pending
        const TEST_INT      = 0b0010_0000;
        /// Level of the downstream SCL line
        const SCL_IO        = 0b0100_0000;
        /// Level of the downstream SDA line
        const SDA_IO        = 0b1000_0000;
    }
}

impl Status {
    pub const fn other_lock(&self) -> bool {
        self.contains(Self::OTHER_LOCK)
    }

    pub const fn bus_init_fail(&self) -> bool {
        self.contains(Self::BUS_INIT_FAIL)
    }

    pub const fn bus_hung(&self) -> bool {
        self.contains(Self::BUS_HUNG)
    }

    pub const fn mailbox_empty(&self) -> bool {
        self.contains(Self::MBOX_EMPTY)
    }

    pub const fn mailbox_full(&self) -> bool {
        self.contains(Self::MBOX_FULL)
    }

    pub const fn test_int(&self) -> bool {
        self.contains(Self::TEST_INT)
    }

    pub const fn scl_high(&self) -> bool {
        self.contains(Self::SCL_IO)
    }

    pub const fn sda_high(&self) -> bool {
        self.contains(Self::SDA_IO)
    }
}

/// What a poll has to do next, decided from the control register alone.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Bus is ours.
    Acquired,
    /// Our request is pending; the other master holds or contends the bus.
    Pending,
    /// No request outstanding; issue one.
    Request,
}

impl Step {
    /// Delay before the next poll, or `None` once the bus is ours.
    pub(crate) const fn retry_delay(self) -> Option<RetryDelay> {
        match self {
            Step::Acquired => None,
            Step::Pending => Some(RetryDelay::Long),
            Step::Request => Some(RetryDelay::Short),
        }
    }
}

impl From<Control> for Step {
    fn from(control: Control) -> Self {
        if control.connected() {
            Step::Acquired
        } else if control.requested() {
            Step::Pending
        } else {
            Step::Request
        }
    }
}
