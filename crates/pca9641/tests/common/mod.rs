#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embassy_time::Instant;
use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
use pca9641::registers::AUTO_INC;
use pca9641::{
    Capabilities, Clock, Config, Control, I2cInterface, Pca9641,
    RegisterInterface,
};

pub const ARBITER_ADDR: u8 = 0x70;
pub const DEVICE_ADDR: u8 = 0x48;

/// Arbiter transactions a `select` makes with the default timeout while the
/// other master holds the bus: one read and one request, then 250 pending
/// polls 1 ms apart.
pub const CONTENDED_SELECT_TXNS: usize = 2 + 250;

// ---------------------------------------------------------------------------
// Simulated arbiter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError(pub ErrorKind);

impl embedded_hal::i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// One transaction as seen by the simulated chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Txn {
    Read(u8),
    Write(u8, u8),
    Block(u8, u8, u8),
    /// Traffic to a downstream device, with whether we were connected.
    Downstream { address: u8, connected: bool },
}

#[derive(Default)]
pub struct SimState {
    /// Control bits written by this master.
    pub control: u8,
    pub reserve_time: u8,
    pub status: u8,
    /// The other master holds the lock, so requests stay pending.
    pub other_holds: bool,
    /// Raw control values returned by upcoming reads, ahead of the model.
    pub scripted: VecDeque<u8>,
    /// Arbiter transactions from this index on fail.
    pub fail_from: Option<usize>,
    /// Downstream transactions fail with a bus error.
    pub downstream_fails: bool,
    pub arbiter_txns: usize,
    pub log: Vec<Txn>,
}

impl SimState {
    fn read_control(&mut self) -> u8 {
        if let Some(raw) = self.scripted.pop_front() {
            return raw;
        }
        let ours = self.control;
        let pending = Control::LOCK_GRANT.bits() | Control::BUS_CONNECT.bits();
        if ours & Control::LOCK_REQ.bits() == 0 {
            ours
        } else if self.other_holds {
            ours & !pending
        } else {
            ours | pending
        }
    }

    pub fn connected(&self) -> bool {
        !self.other_holds
            && Control::from_bits_retain(self.control)
                .contains(Control::LOCK_REQ | Control::BUS_CONNECT)
    }

    fn write_reg(&mut self, reg: u8, value: u8) {
        match reg & !AUTO_INC {
            0x01 => self.control = value,
            0x03 => self.reserve_time = value,
            _ => {}
        }
    }

    pub fn writes(&self) -> Vec<Txn> {
        self.log
            .iter()
            .filter(|t| matches!(t, Txn::Write(..) | Txn::Block(..)))
            .cloned()
            .collect()
    }

    pub fn control_reads(&self) -> usize {
        self.log.iter().filter(|t| **t == Txn::Read(0x01)).count()
    }
}

#[derive(Clone, Default)]
pub struct SimArbiter {
    pub state: Rc<RefCell<SimState>>,
}

impl SimArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    fn arbiter_txn(
        &mut self,
        operations: &mut [Operation<'_>],
    ) -> Result<(), SimError> {
        let mut state = self.state.borrow_mut();
        let index = state.arbiter_txns;
        state.arbiter_txns += 1;
        if state.fail_from.is_some_and(|n| index >= n) {
            return Err(SimError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        }

        match operations {
            [Operation::Write(&[cmd]), Operation::Read(buf)] => {
                let reg = cmd & !AUTO_INC;
                buf[0] = match reg {
                    0x01 => state.read_control(),
                    0x02 => state.status,
                    0x03 => state.reserve_time,
                    _ => 0,
                };
                state.log.push(Txn::Read(reg));
            }
            [Operation::Write(&[cmd, value])] => {
                state.write_reg(cmd, value);
                state.log.push(Txn::Write(cmd, value));
            }
            [Operation::Write(&[cmd, v1, v2])] => {
                state.write_reg(cmd, v1);
                // Auto-increment from control lands on the reserve time;
                // the read-only status register is skipped.
                if cmd == 0x01 | AUTO_INC {
                    state.write_reg(0x03, v2);
                }
                state.log.push(Txn::Block(cmd, v1, v2));
            }
            _ => panic!("unexpected arbiter transaction"),
        }
        Ok(())
    }

    fn downstream_txn(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), SimError> {
        let mut state = self.state.borrow_mut();
        let connected = state.connected();
        state.log.push(Txn::Downstream { address, connected });
        if state.downstream_fails {
            return Err(SimError(ErrorKind::Bus));
        }
        if !connected {
            return Err(SimError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        }
        for op in operations.iter_mut() {
            if let Operation::Read(buf) = op {
                buf.fill(0xA5);
            }
        }
        Ok(())
    }
}

impl ErrorType for SimArbiter {
    type Error = SimError;
}

impl embedded_hal::i2c::I2c for SimArbiter {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address == ARBITER_ADDR {
            self.arbiter_txn(operations)
        } else {
            self.downstream_txn(address, operations)
        }
    }
}

impl embedded_hal_async::i2c::I2c for SimArbiter {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        embedded_hal::i2c::I2c::transaction(self, address, operations)
    }
}

/// Register transport that only supports single-byte access.
pub struct ByteOnly(pub I2cInterface<SimArbiter>);

impl RegisterInterface for ByteOnly {
    type Error = SimError;

    fn read_byte(&mut self, command: u8) -> Result<u8, Self::Error> {
        self.0.read_byte(command)
    }

    fn write_byte(&mut self, command: u8, value: u8) -> Result<(), Self::Error> {
        self.0.write_byte(command, value)
    }

    fn write_block(
        &mut self,
        command: u8,
        v1: u8,
        v2: u8,
    ) -> Result<(), Self::Error> {
        self.0.write_block(command, v1, v2)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BYTE_DATA
    }
}

// ---------------------------------------------------------------------------
// Simulated time
// ---------------------------------------------------------------------------

/// Shared simulated time in nanoseconds, advanced only by `SimDelay`.
#[derive(Clone, Default)]
pub struct SimTime {
    nanos: Rc<Cell<u64>>,
    delays_us: Rc<RefCell<Vec<u32>>>,
}

impl SimTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> SimClock {
        SimClock(self.clone())
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay(self.clone())
    }

    pub fn elapsed_us(&self) -> u64 {
        self.nanos.get() / 1000
    }

    pub fn delays_us(&self) -> Vec<u32> {
        self.delays_us.borrow().clone()
    }

    fn advance_ns(&self, ns: u64) {
        self.nanos.set(self.nanos.get() + ns);
    }
}

pub struct SimClock(SimTime);

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.0.elapsed_us())
    }
}

pub struct SimDelay(SimTime);

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance_ns(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.0.delays_us.borrow_mut().push(us);
        self.0.advance_ns(us as u64 * 1000);
    }
}

impl embedded_hal_async::delay::DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.advance_ns(ns as u64);
    }

    async fn delay_us(&mut self, us: u32) {
        self.0.delays_us.borrow_mut().push(us);
        self.0.advance_ns(us as u64 * 1000);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub type SimPca9641 = Pca9641<I2cInterface<SimArbiter>, SimDelay, SimClock>;

/// Attach a blocking driver and clear the attach-time reset from the log.
pub fn attach(sim: &SimArbiter, time: &SimTime) -> SimPca9641 {
    let interface = I2cInterface::new(sim.clone(), ARBITER_ADDR);
    let pca = Pca9641::attach(interface, time.delay(), time.clock(), Config::default())
        .unwrap();
    sim.with(|s| s.log.clear());
    pca
}
