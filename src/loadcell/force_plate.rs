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

//! The force plate: four calibrated load cells behind one ADC, with a rate gated acquisition
//! path and the derived whole plate quantities.

use crate::clock::Clock;
use crate::config::{AdcConfig, PlateConfig};
use crate::error::Error;
use crate::loadcell::calibration::{CalibrationRecord, CalibrationState, SampleAccumulator};
use crate::loadcell::channel::{Channel, ChannelId, ChannelSelect, CHANNEL_COUNT};
use crate::loadcell::interface::data_ready::DataReady;
use crate::loadcell::interface::{AsyncMultiplexedAdc, Diagnostic};
use crate::loadcell::processing::{quartered_sum, Frame, MedianFilter, Measurement, Statistics};
use crate::loadcell::scanner::ChannelScanner;
use crate::loadcell::storage::CalibrationStore;
use crate::loadcell::ForcePlateSystem;
use core::cmp::max;
use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use strum::IntoEnumIterator;

/// Scans combined into the whole plate baseline and the stable reading filter.
pub const BASELINE_WINDOW: usize = 16;

pub struct ForcePlate<A, R, D, C> {
    scanner: ChannelScanner<A, R, D>,
    clock: C,
    config: PlateConfig,
    channels: [Channel; CHANNEL_COUNT],
    running: bool,
    started_at: Instant,
    last_read_at: Instant,
    sample_count: u32,
    frame_count: u32,
    last_frame: Option<Frame>,
    baseline: f32,
    stable_filter: MedianFilter<BASELINE_WINDOW>,
}

impl<A, R, D, C, AdcE> ForcePlate<A, R, D, C>
where
    A: AsyncMultiplexedAdc<Error = AdcE>,
    R: DataReady,
    D: DelayNs,
    C: Clock,
{
    pub async fn new(
        mut scanner: ChannelScanner<A, R, D>,
        clock: C,
        adc_config: &AdcConfig,
        config: PlateConfig,
    ) -> Result<Self, Error<AdcE>> {
        scanner.initialize(adc_config).await?;
        let now = clock.now();
        info!("Force plate ready, {} channels", CHANNEL_COUNT);
        Ok(Self {
            scanner,
            clock,
            config,
            channels: [
                Channel::new(ChannelId::Ch0),
                Channel::new(ChannelId::Ch1),
                Channel::new(ChannelId::Ch2),
                Channel::new(ChannelId::Ch3),
            ],
            running: false,
            started_at: now,
            last_read_at: now,
            sample_count: 0,
            frame_count: 0,
            last_frame: None,
            baseline: 0.0,
            stable_filter: MedianFilter::new(),
        })
    }

    pub fn start(&mut self) {
        let now = self.clock.now();
        self.running = true;
        self.sample_count = 0;
        self.started_at = now;
        self.last_read_at = now;
        info!("Acquisition started");
    }

    pub fn stop(&mut self) {
        self.running = false;
        info!("Acquisition stopped after {} samples", self.sample_count);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Scans the plate only while running and once the minimum sample interval has passed since
    /// the previous gated read. Returns `None` without touching the bus otherwise.
    pub async fn read_if_ready(&mut self) -> Result<Option<Frame>, Error<AdcE>> {
        if !self.running {
            return Ok(None);
        }
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_read_at) < self.config.min_sample_interval {
            return Ok(None);
        }

        let frame = self.read().await?;
        self.last_read_at = now;
        self.sample_count = self.sample_count.saturating_add(1);
        Ok(Some(frame))
    }

    /// Unconditional four channel scan. Nothing is updated unless every channel reads.
    pub async fn read(&mut self) -> Result<Frame, Error<AdcE>> {
        let raw = self.scanner.scan_all().await?;
        let timestamp = self.clock.now();

        let measurements = self.channels.each_mut().map(|channel| {
            let code = raw[channel.id.index()];
            Self::process(channel, code, timestamp)
        });
        self.frame_count = self.frame_count.wrapping_add(1);

        let frame = Frame {
            number: self.frame_count,
            timestamp,
            measurements,
        };
        self.last_frame = Some(frame);
        Ok(frame)
    }

    pub async fn read_channel(&mut self, channel: ChannelId) -> Result<Measurement, Error<AdcE>> {
        let raw = self.scanner.read_channel(channel).await?;
        let timestamp = self.clock.now();
        Ok(Self::process(&mut self.channels[channel.index()], raw, timestamp))
    }

    fn process(channel: &mut Channel, raw: i32, timestamp: Instant) -> Measurement {
        let measurement = Measurement {
            raw,
            normalized: channel.calibration.normalized(raw),
            force: channel.calibration.force(raw),
            timestamp,
        };
        channel.statistics.update(measurement.force);
        channel.last_measurement = Some(measurement);
        measurement
    }

    /// Takes `samples` raw readings of one channel, spaced by the calibration sample interval.
    /// Only raw codes are collected; statistics and measurements are left alone.
    async fn average_raw(
        &mut self,
        channel: ChannelId,
        samples: u32,
    ) -> Result<SampleAccumulator, Error<AdcE>> {
        let progress_step = max(samples / 10, 1);
        let mut accumulator = SampleAccumulator::default();
        for taken in 0..samples {
            if taken > 0 {
                self.scanner
                    .pause(self.config.calibration_sample_interval)
                    .await;
            }
            let raw = self.scanner.read_channel(channel).await.map_err(|e| {
                warn!("{} calibration aborted at sample {}: {}", channel.name(), taken, e.kind());
                e
            })?;
            accumulator.push(raw);
            if (taken + 1) % progress_step == 0 {
                debug!("{} sampling {}/{}", channel.name(), taken + 1, samples);
            }
        }
        Ok(accumulator)
    }

    /// Zero load calibration. The plate must be unloaded; this is not checked.
    pub async fn tare(&mut self, channel: ChannelId, samples: u32) -> Result<(), Error<AdcE>> {
        if samples == 0 {
            return Err(Error::InvalidArgument);
        }
        info!("Tare {} over {} samples", channel.name(), samples);

        let accumulator = self.average_raw(channel, samples).await?;
        let offset = accumulator.mean().ok_or(Error::<AdcE>::InvalidArgument)?;
        self.channels[channel.index()].calibration.apply_tare(offset);

        info!(
            "Tare {} offset {} noise {}",
            channel.name(),
            offset,
            accumulator.std_dev().unwrap_or(0.0)
        );
        Ok(())
    }

    /// Span calibration with `reference_force` newtons applied to the tared channel.
    pub async fn calibrate(
        &mut self,
        channel: ChannelId,
        reference_force: f32,
        samples: u32,
    ) -> Result<(), Error<AdcE>> {
        self.channels[channel.index()]
            .calibration
            .check_span_preconditions(reference_force, self.config.reference_force_floor)
            .map_err(|e| {
                warn!("{} span refused: {:?}", channel.name(), e);
                Error::<AdcE>::from(e)
            })?;
        if samples == 0 {
            return Err(Error::InvalidArgument);
        }
        info!(
            "Span {} with {} N over {} samples",
            channel.name(),
            reference_force,
            samples
        );

        let accumulator = self.average_raw(channel, samples).await?;
        let mean = accumulator.mean().ok_or(Error::<AdcE>::InvalidArgument)?;
        let scale = self.channels[channel.index()]
            .calibration
            .apply_span(reference_force, mean)
            .map_err(|e| {
                warn!("{} span failed: {:?}", channel.name(), e);
                Error::<AdcE>::from(e)
            })?;

        info!("Span {} scale {} N/code", channel.name(), scale);
        Ok(())
    }

    pub fn calibration_state(&self, channel: ChannelId) -> CalibrationState {
        self.channels[channel.index()].calibration.state
    }

    pub fn reset_calibration(&mut self, select: ChannelSelect) {
        for channel in self.selected(select) {
            channel.calibration.reset();
            info!("{} calibration reset", channel.id.name());
        }
    }

    pub fn statistics(&self, channel: ChannelId) -> Statistics {
        self.channels[channel.index()].statistics
    }

    pub fn reset_statistics(&mut self, select: ChannelSelect) {
        for channel in self.selected(select) {
            channel.statistics.reset();
            debug!("{} statistics reset", channel.id.name());
        }
    }

    fn selected(&mut self, select: ChannelSelect) -> impl Iterator<Item = &mut Channel> {
        self.channels
            .iter_mut()
            .filter(move |channel| select.includes(channel.id))
    }

    pub fn channel(&self, channel: ChannelId) -> &Channel {
        &self.channels[channel.index()]
    }

    pub fn calibration(&self, channel: ChannelId) -> CalibrationRecord {
        self.channels[channel.index()].calibration
    }

    /// Restores a previously saved record, state included.
    pub fn set_calibration(&mut self, channel: ChannelId, record: CalibrationRecord) {
        self.channels[channel.index()].calibration = record;
    }

    pub fn offset(&self, channel: ChannelId) -> f32 {
        self.channels[channel.index()].calibration.offset
    }

    pub fn scale(&self, channel: ChannelId) -> f32 {
        self.channels[channel.index()].calibration.scale
    }

    pub fn set_offset(&mut self, channel: ChannelId, offset: f32) {
        self.channels[channel.index()].calibration.offset = offset;
    }

    pub fn set_scale(&mut self, channel: ChannelId, scale: f32) {
        self.channels[channel.index()].calibration.scale = scale;
    }

    pub async fn save_calibration<S: CalibrationStore>(&self, store: &mut S) -> Result<(), S::Error> {
        for channel in self.channels.iter() {
            store.store(channel.id, channel.calibration).await?;
        }
        debug!("Calibration saved");
        Ok(())
    }

    /// Loads every stored record. Channels without one keep their current calibration.
    /// Returns the number of channels restored.
    pub async fn restore_calibration<S: CalibrationStore>(&mut self, store: &mut S) -> usize {
        let mut restored = 0;
        for id in ChannelId::iter() {
            if let Some(record) = store.load(id).await {
                self.channels[id.index()].calibration = record;
                restored += 1;
            }
        }
        info!("Restored calibration for {} channels", restored);
        restored
    }

    /// Whole plate zero: median of the channel mean over [`BASELINE_WINDOW`] scans, in raw
    /// codes. Clears the stable reading filter.
    ///
    /// This is a calibration pass like [`tare`](Self::tare): its scans are not frames and leave
    /// the frame counter untouched.
    pub async fn tare_baseline(&mut self) -> Result<f32, Error<AdcE>> {
        let mut window = MedianFilter::<BASELINE_WINDOW>::new();
        for taken in 0..BASELINE_WINDOW {
            if taken > 0 {
                self.scanner
                    .pause(self.config.calibration_sample_interval)
                    .await;
            }
            let raw = self.scanner.scan_all().await?;
            window.push(quartered_sum(&raw.map(|code| code as f32)));
        }

        self.baseline = window.median().unwrap_or(0.0);
        self.stable_filter.clear();
        info!("Plate baseline {}", self.baseline);
        Ok(self.baseline)
    }

    /// Full read whose channel mean, less the baseline, is run through the median filter.
    pub async fn stable_reading(&mut self) -> Result<f32, Error<AdcE>> {
        let frame = self.read().await?;
        let combined = quartered_sum(&frame.raw().map(|code| code as f32));
        self.stable_filter.push(combined - self.baseline);
        Ok(self.stable_filter.median().unwrap_or(0.0))
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    pub fn last_measurement(&self, channel: ChannelId) -> Option<Measurement> {
        self.channels[channel.index()].last_measurement
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.last_frame
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Gated reads since the last [`start`](Self::start).
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Gated reads per second since the last start, 0 before the first sample.
    pub fn actual_sample_rate(&self) -> f32 {
        let elapsed_us = self
            .clock
            .now()
            .saturating_duration_since(self.started_at)
            .as_micros();
        if self.sample_count == 0 || elapsed_us == 0 {
            return 0.0;
        }
        self.sample_count as f32 * 1_000_000.0 / elapsed_us as f32
    }

    pub async fn diagnostic(&mut self) -> Result<Diagnostic, Error<AdcE>> {
        self.scanner.diagnostic().await
    }

    pub fn adc(&mut self) -> &mut A {
        self.scanner.adc()
    }
}

impl<A, R, D, C, AdcE> ForcePlateSystem for ForcePlate<A, R, D, C>
where
    A: AsyncMultiplexedAdc<Error = AdcE>,
    R: DataReady,
    D: DelayNs,
    C: Clock,
{
    type Error = Error<AdcE>;

    async fn start(&mut self) -> Result<(), Self::Error> {
        ForcePlate::start(self);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Self::Error> {
        ForcePlate::stop(self);
        Ok(())
    }

    async fn tare(&mut self, channel: ChannelId, samples: u32) -> Result<(), Self::Error> {
        ForcePlate::tare(self, channel, samples).await
    }

    async fn calibrate(
        &mut self,
        channel: ChannelId,
        reference_force: f32,
        samples: u32,
    ) -> Result<(), Self::Error> {
        ForcePlate::calibrate(self, channel, reference_force, samples).await
    }

    async fn read(&mut self) -> Result<Frame, Self::Error> {
        ForcePlate::read(self).await
    }

    async fn read_if_ready(&mut self) -> Result<Option<Frame>, Self::Error> {
        ForcePlate::read_if_ready(self).await
    }

    async fn read_channel(&mut self, channel: ChannelId) -> Result<Measurement, Self::Error> {
        ForcePlate::read_channel(self, channel).await
    }

    async fn get_stats(&mut self, channel: ChannelId) -> Result<Statistics, Self::Error> {
        Ok(self.statistics(channel))
    }

    async fn reset_stats(&mut self, select: ChannelSelect) -> Result<(), Self::Error> {
        self.reset_statistics(select);
        Ok(())
    }

    async fn reset_calibration(&mut self, select: ChannelSelect) -> Result<(), Self::Error> {
        ForcePlate::reset_calibration(self, select);
        Ok(())
    }

    async fn get_calibration_state(
        &mut self,
        channel: ChannelId,
    ) -> Result<CalibrationState, Self::Error> {
        Ok(self.calibration_state(channel))
    }

    async fn diagnostic(&mut self) -> Result<Diagnostic, Self::Error> {
        ForcePlate::diagnostic(self).await
    }
}
