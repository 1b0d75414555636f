// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

//! Simulated hardware shared by the unit tests.

use crate::clock::Clock;
use crate::config::{AdcConfig, PlateConfig, SyncConfig};
use crate::loadcell::calibration::CalibrationRecord;
use crate::loadcell::channel::ChannelId;
use crate::loadcell::force_plate::ForcePlate;
use crate::loadcell::interface::ads1261::Ads1261;
use crate::loadcell::interface::data_ready::DelayDataReady;
use crate::loadcell::interface::registers::Register;
use crate::loadcell::scanner::ChannelScanner;
use crate::loadcell::storage::CalibrationStore;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use embedded_hal::spi::{ErrorKind, ErrorType, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use strum::EnumCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FakeSpiError;

impl embedded_hal::spi::Error for FakeSpiError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

struct FakeState {
    registers: [u8; Register::COUNT],
    codes: [VecDeque<i32>; 4],
    default_codes: [i32; 4],
    sent: Vec<Vec<u8>>,
    conversions_started: usize,
    resets: usize,
    data_reads: usize,
    fail_next: bool,
    fail_data_reads_after: Option<usize>,
    data_ready: Option<&'static Signal<CriticalSectionRawMutex, ()>>,
}

impl FakeState {
    fn reset_registers(&mut self) {
        let id = self.registers[Register::Id as usize];
        self.registers = [0; Register::COUNT];
        self.registers[Register::Id as usize] = id;
        self.registers[Register::Status as usize] = 0x01;
        self.registers[Register::Mode0 as usize] = 0x24;
        self.registers[Register::Mode1 as usize] = 0x01;
        self.registers[Register::Ref as usize] = 0x05;
        self.registers[Register::FullScaleCal2 as usize] = 0x40;
        self.registers[Register::Imux as usize] = 0xFF;
        self.registers[Register::InputMux as usize] = 0xFF;
    }

    fn selected_channel(&self) -> usize {
        let positive = self.registers[Register::InputMux as usize] >> 4;
        (positive.saturating_sub(1) / 2).min(3) as usize
    }

    fn continuous(&self) -> bool {
        self.registers[Register::Mode1 as usize] & 0x10 == 0
    }

    fn notify_ready(&self) {
        if let Some(signal) = self.data_ready {
            signal.signal(());
        }
    }

    fn exchange(&mut self, buf: &mut [u8]) -> Result<(), FakeSpiError> {
        self.sent.push(buf.to_vec());
        if self.fail_next {
            self.fail_next = false;
            return Err(FakeSpiError);
        }

        let opcode = buf[0];
        match (opcode, buf.len()) {
            (0x20..=0x32, 3) => {
                buf[2] = self.registers[(opcode & 0x1F) as usize];
            }
            (0x40..=0x52, 2) => {
                let address = (opcode & 0x1F) as usize;
                self.registers[address] = buf[1];
                if address == Register::InputMux as usize && self.continuous() {
                    self.notify_ready();
                }
            }
            (0x12, 5) => {
                if let Some(limit) = self.fail_data_reads_after {
                    if self.data_reads >= limit {
                        return Err(FakeSpiError);
                    }
                }
                self.data_reads += 1;
                let channel = self.selected_channel();
                let code = self.codes[channel]
                    .pop_front()
                    .unwrap_or(self.default_codes[channel]);
                let bytes = code.to_be_bytes();
                buf[2..5].copy_from_slice(&bytes[1..4]);
            }
            (0x06, 2) => {
                self.resets += 1;
                self.reset_registers();
            }
            (0x08, 2) => {
                self.conversions_started += 1;
                self.notify_ready();
            }
            (_, 2) => {}
            _ => panic!("unexpected frame {:x?}", buf),
        }
        buf[1] = opcode;
        buf[0] = 0xFF;
        Ok(())
    }
}

/// ADS1261 stand in answering SPI frames from a register file and per channel code queues.
#[derive(Clone)]
pub(crate) struct FakeAds1261 {
    state: Rc<RefCell<FakeState>>,
}

impl FakeAds1261 {
    pub(crate) fn new() -> Self {
        let mut state = FakeState {
            registers: [0; Register::COUNT],
            codes: Default::default(),
            default_codes: [0; 4],
            sent: Vec::new(),
            conversions_started: 0,
            resets: 0,
            data_reads: 0,
            fail_next: false,
            fail_data_reads_after: None,
            data_ready: None,
        };
        state.registers[Register::Id as usize] = 0x80;
        state.reset_registers();
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub(crate) fn with_data_ready(self, signal: &'static Signal<CriticalSectionRawMutex, ()>) -> Self {
        self.state.borrow_mut().data_ready = Some(signal);
        self
    }

    pub(crate) fn set_register(&self, register: Register, value: u8) {
        self.state.borrow_mut().registers[register as usize] = value;
    }

    pub(crate) fn register(&self, register: Register) -> u8 {
        self.state.borrow().registers[register as usize]
    }

    pub(crate) fn push_codes(&self, channel: usize, codes: &[i32]) {
        self.state.borrow_mut().codes[channel].extend(codes.iter().copied());
    }

    pub(crate) fn set_default_codes(&self, codes: [i32; 4]) {
        self.state.borrow_mut().default_codes = codes;
    }

    pub(crate) fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().sent.clone()
    }

    pub(crate) fn conversions_started(&self) -> usize {
        self.state.borrow().conversions_started
    }

    pub(crate) fn resets(&self) -> usize {
        self.state.borrow().resets
    }

    pub(crate) fn data_reads(&self) -> usize {
        self.state.borrow().data_reads
    }

    pub(crate) fn fail_next_transfer(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    /// Let `count` more conversion reads succeed, then fail every one after.
    pub(crate) fn fail_data_reads_after(&self, count: usize) {
        let mut state = self.state.borrow_mut();
        state.fail_data_reads_after = Some(state.data_reads + count);
    }

    pub(crate) fn heal(&self) {
        self.state.borrow_mut().fail_data_reads_after = None;
    }
}

impl ErrorType for FakeAds1261 {
    type Error = FakeSpiError;
}

impl SpiDevice for FakeAds1261 {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), FakeSpiError> {
        for operation in operations.iter_mut() {
            match operation {
                Operation::TransferInPlace(buf) => self.state.borrow_mut().exchange(buf)?,
                _ => panic!("only in place transfers are simulated"),
            }
        }
        Ok(())
    }
}

/// Delay that returns immediately and remembers how long it was asked to wait.
#[derive(Clone, Default)]
pub(crate) struct RecordingDelay {
    total_ns: Rc<Cell<u64>>,
}

impl RecordingDelay {
    pub(crate) fn total_ns(&self) -> u64 {
        self.total_ns.get()
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + ns as u64);
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeClock {
    now_us: Rc<Cell<u64>>,
}

impl FakeClock {
    pub(crate) fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.now_us.get())
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) records: [Option<CalibrationRecord>; 4],
    pub(crate) reject_writes: bool,
}

impl CalibrationStore for MemoryStore {
    type Error = ();

    async fn load(&mut self, channel: ChannelId) -> Option<CalibrationRecord> {
        self.records[channel.index()]
    }

    async fn store(&mut self, channel: ChannelId, record: CalibrationRecord) -> Result<(), ()> {
        if self.reject_writes {
            return Err(());
        }
        self.records[channel.index()] = Some(record);
        Ok(())
    }
}

pub(crate) type TestAdc = Ads1261<FakeAds1261, RecordingDelay>;
pub(crate) type TestPlate =
    ForcePlate<TestAdc, DelayDataReady<RecordingDelay>, RecordingDelay, FakeClock>;

pub(crate) fn test_scanner(
    fake: &FakeAds1261,
    delay: &RecordingDelay,
) -> ChannelScanner<TestAdc, DelayDataReady<RecordingDelay>, RecordingDelay> {
    let timing = SyncConfig::default();
    ChannelScanner::new(
        Ads1261::new(fake.clone(), delay.clone(), timing.bus_timeout),
        DelayDataReady::new(delay.clone(), timing.conversion_settle),
        delay.clone(),
        timing,
    )
}

pub(crate) fn test_plate(fake: &FakeAds1261, clock: &FakeClock) -> TestPlate {
    let delay = RecordingDelay::default();
    block_on(ForcePlate::new(
        test_scanner(fake, &delay),
        clock.clone(),
        &AdcConfig::default(),
        PlateConfig::default(),
    ))
    .unwrap()
}
