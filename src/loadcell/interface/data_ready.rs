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

//! Conversion synchronisation. A read is only allowed once the converter has signalled that a
//! conversion completed, either through the DRDY line or, when it is not wired, after a fixed
//! settling delay.

use core::convert::Infallible;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

/// Data ready was not seen within the allowed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConversionTimeout;

pub trait DataReady {
    /// Discard any ready indication left over from an earlier conversion. Called before a new
    /// conversion is started.
    fn arm(&mut self) {}

    /// Wait until the conversion in progress has completed. Consumes the ready indication.
    async fn wait_for_data(&mut self, timeout: Duration) -> Result<(), ConversionTimeout>;
}

/// Interrupt driven synchronisation. The DRDY interrupt handler (or a task forwarding pin edges)
/// calls [`Signal::signal`] and the scanner waits on it. Taking the signal clears it, so a flag
/// can never be consumed twice.
pub struct SignalDataReady<'a, M: RawMutex> {
    signal: &'a Signal<M, ()>,
}

impl<'a, M: RawMutex> SignalDataReady<'a, M> {
    pub fn new(signal: &'a Signal<M, ()>) -> Self {
        Self { signal }
    }
}

impl<M: RawMutex> DataReady for SignalDataReady<'_, M> {
    fn arm(&mut self) {
        self.signal.reset();
    }

    async fn wait_for_data(&mut self, timeout: Duration) -> Result<(), ConversionTimeout> {
        with_timeout(timeout, self.signal.wait())
            .await
            .map_err(|_| ConversionTimeout)
    }
}

/// Waits directly on the falling edge of the DRDY pin.
pub struct PinDataReady<P> {
    pin: P,
}

impl<P> PinDataReady<P>
where
    P: Wait<Error = Infallible>,
{
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P> DataReady for PinDataReady<P>
where
    P: Wait<Error = Infallible>,
{
    async fn wait_for_data(&mut self, timeout: Duration) -> Result<(), ConversionTimeout> {
        match with_timeout(timeout, self.pin.wait_for_falling_edge()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(never)) => match never {},
            Err(_) => Err(ConversionTimeout),
        }
    }
}

/// No ready line available: assume the conversion is done after a fixed settling time.
pub struct DelayDataReady<D> {
    delay: D,
    settle: Duration,
}

impl<D: DelayNs> DelayDataReady<D> {
    pub fn new(delay: D, settle: Duration) -> Self {
        Self { delay, settle }
    }
}

impl<D: DelayNs> DataReady for DelayDataReady<D> {
    async fn wait_for_data(&mut self, _timeout: Duration) -> Result<(), ConversionTimeout> {
        self.delay.delay_us(self.settle.as_micros() as u32).await;
        Ok(())
    }
}

/// Forwards DRDY falling edges into `signal`. Meant to run as its own task so the waiting side
/// never occupies the executor while the line is idle.
pub async fn forward_data_ready<P, M>(mut pin: P, signal: &Signal<M, ()>) -> !
where
    P: Wait<Error = Infallible>,
    M: RawMutex,
{
    loop {
        if let Err(never) = pin.wait_for_falling_edge().await {
            match never {}
        }
        signal.signal(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingDelay;
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_futures::yield_now;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_time::MockDriver;

    #[test]
    fn signalled_conversion_is_consumed_once() {
        static DRDY: Signal<CriticalSectionRawMutex, ()> = Signal::new();
        let mut ready = SignalDataReady::new(&DRDY);

        DRDY.signal(());
        let result = block_on(ready.wait_for_data(Duration::from_micros(2_000)));
        assert_eq!(result, Ok(()));
        assert!(!DRDY.signaled());
    }

    #[test]
    fn arm_discards_stale_flag() {
        static DRDY: Signal<CriticalSectionRawMutex, ()> = Signal::new();
        let mut ready = SignalDataReady::new(&DRDY);

        DRDY.signal(());
        ready.arm();
        assert!(!DRDY.signaled());
    }

    #[test]
    fn missing_edge_times_out() {
        static DRDY: Signal<CriticalSectionRawMutex, ()> = Signal::new();
        let mut ready = SignalDataReady::new(&DRDY);
        let timeout = Duration::from_micros(2_000);

        let (result, _) = block_on(join(ready.wait_for_data(timeout), async {
            yield_now().await;
            MockDriver::get().advance(timeout + Duration::from_micros(1));
        }));
        assert_eq!(result, Err(ConversionTimeout));
    }

    #[test]
    fn settle_delay_waits_fixed_time() {
        let delay = RecordingDelay::default();
        let mut ready = DelayDataReady::new(delay.clone(), Duration::from_micros(1_000));

        block_on(ready.wait_for_data(Duration::from_micros(2_000))).unwrap();
        assert_eq!(delay.total_ns(), 1_000_000);
    }
}
