//! Scripted stand-ins for the bus, the ready line and the delay.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin};
use embedded_hal::i2c::{self, ErrorKind, I2c, Operation};

pub const ADDRESS: u8 = 0x74;

#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    Write(Vec<u8>),
    Read(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FakeError(pub ErrorKind);

impl i2c::Error for FakeError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug, Default)]
struct BusState {
    address_len: usize,
    memory: HashMap<u16, u8>,
    pointer: u16,
    log: Vec<Transaction>,
    probe_results: VecDeque<Result<(), ErrorKind>>,
    short_reads: bool,
    failing_writes: Vec<u16>,
}

/// Emulates the register memory of a device behind one address.
#[derive(Debug, Clone)]
pub struct FakeBus {
    state: Rc<RefCell<BusState>>,
}

impl FakeBus {
    /// Device using two-byte register addresses
    pub fn wide() -> Self {
        Self::with_address_len(2)
    }

    /// Device using one-byte register addresses
    pub fn legacy() -> Self {
        Self::with_address_len(1)
    }

    fn with_address_len(address_len: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                address_len,
                ..BusState::default()
            })),
        }
    }

    pub fn set(&self, reg: u16, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        for (offset, byte) in bytes.iter().enumerate() {
            state.memory.insert(reg + offset as u16, *byte);
        }
    }

    pub fn get(&self, reg: u16) -> u8 {
        self.state.borrow().memory.get(&reg).copied().unwrap_or(0)
    }

    /// Queue the outcome of the next zero-length writes. Unqueued probes succeed.
    pub fn push_probe(&self, result: Result<(), ErrorKind>) {
        self.state.borrow_mut().probe_results.push_back(result);
    }

    /// Every read hands back one byte less than requested
    pub fn short_reads(&self) {
        self.state.borrow_mut().short_reads = true;
    }

    /// Writes carrying data to `reg` are refused
    pub fn fail_writes_to(&self, reg: u16) {
        self.state.borrow_mut().failing_writes.push(reg);
    }

    pub fn log(&self) -> Vec<Transaction> {
        self.state.borrow().log.clone()
    }

    /// Data-carrying writes only, i.e. everything but probes and pointer writes
    pub fn register_writes(&self) -> Vec<Vec<u8>> {
        let address_len = self.state.borrow().address_len;
        self.log()
            .into_iter()
            .filter_map(|t| match t {
                Transaction::Write(bytes) if bytes.len() > address_len => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    fn handle_write(&self, bytes: &[u8]) -> Result<(), FakeError> {
        let mut state = self.state.borrow_mut();
        state.log.push(Transaction::Write(bytes.to_vec()));

        if bytes.is_empty() {
            return state
                .probe_results
                .pop_front()
                .unwrap_or(Ok(()))
                .map_err(FakeError);
        }

        let address_len = state.address_len;
        let reg = bytes[..address_len]
            .iter()
            .fold(0u16, |acc, b| (acc << 8) | u16::from(*b));
        if bytes.len() > address_len && state.failing_writes.contains(&reg) {
            return Err(FakeError(ErrorKind::Other));
        }

        state.pointer = reg;
        for (offset, byte) in bytes[address_len..].iter().enumerate() {
            state.memory.insert(reg + offset as u16, *byte);
        }
        Ok(())
    }

    fn handle_read(&self, buffer: &mut [u8]) -> Result<(), FakeError> {
        let mut state = self.state.borrow_mut();
        state.log.push(Transaction::Read(buffer.len()));
        if state.short_reads {
            return Err(FakeError(ErrorKind::Other));
        }
        let pointer = state.pointer;
        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = state
                .memory
                .get(&(pointer + offset as u16))
                .copied()
                .unwrap_or(0);
        }
        Ok(())
    }
}

impl i2c::ErrorType for FakeBus {
    type Error = FakeError;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != ADDRESS {
            return Err(FakeError(ErrorKind::NoAcknowledge(
                i2c::NoAcknowledgeSource::Address,
            )));
        }
        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.handle_write(bytes)?,
                Operation::Read(buffer) => self.handle_read(buffer)?,
            }
        }
        Ok(())
    }
}

/// Ready line replaying a fixed sequence of levels, then holding the last one.
#[derive(Debug, Clone)]
pub struct FakePin {
    levels: Rc<RefCell<VecDeque<bool>>>,
    samples: Rc<RefCell<usize>>,
}

impl FakePin {
    pub fn new(levels: &[bool]) -> Self {
        Self {
            levels: Rc::new(RefCell::new(levels.iter().copied().collect())),
            samples: Rc::new(RefCell::new(0)),
        }
    }

    pub fn high() -> Self {
        Self::new(&[true])
    }

    pub fn low() -> Self {
        Self::new(&[false])
    }

    pub fn samples(&self) -> usize {
        *self.samples.borrow()
    }
}

impl digital::ErrorType for FakePin {
    type Error = Infallible;
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        *self.samples.borrow_mut() += 1;
        let mut levels = self.levels.borrow_mut();
        let level = levels.front().copied().unwrap_or(false);
        if levels.len() > 1 {
            levels.pop_front();
        }
        Ok(level)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Records requested delays instead of sleeping
#[derive(Debug, Clone, Default)]
pub struct FakeDelay {
    delays_ns: Rc<RefCell<Vec<u32>>>,
}

impl FakeDelay {
    pub fn total_us(&self) -> u64 {
        self.delays_ns
            .borrow()
            .iter()
            .map(|ns| u64::from(*ns) / 1_000)
            .sum()
    }

    pub fn delays_ns(&self) -> Vec<u32> {
        self.delays_ns.borrow().clone()
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delays_ns.borrow_mut().push(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.delays_ns.borrow_mut().push(us * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ns.borrow_mut().push(ms * 1_000_000);
    }
}

/// Registers of an awake IQS550 with no touch pending
pub fn wide_device() -> FakeBus {
    let bus = FakeBus::wide();
    bus.set(0x0000, &[0x00, 40]);
    bus
}

pub fn pointer(reg: u16) -> Transaction {
    Transaction::Write(reg.to_be_bytes().to_vec())
}
