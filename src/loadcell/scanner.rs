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

//! Steps the ADC multiplexer across the four load cells, one synchronised conversion per
//! channel.

use crate::config::{AdcConfig, SyncConfig};
use crate::error::Error;
use crate::loadcell::channel::{ChannelId, CHANNEL_COUNT};
use crate::loadcell::interface::data_ready::DataReady;
use crate::loadcell::interface::registers::ConversionMode;
use crate::loadcell::interface::{AsyncMultiplexedAdc, Diagnostic};
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use strum::IntoEnumIterator;

pub struct ChannelScanner<A, R, D> {
    adc: A,
    data_ready: R,
    delay: D,
    timing: SyncConfig,
    mode: ConversionMode,
}

impl<A, R, D, AdcE> ChannelScanner<A, R, D>
where
    A: AsyncMultiplexedAdc<Error = AdcE>,
    R: DataReady,
    D: DelayNs,
{
    pub fn new(adc: A, data_ready: R, delay: D, timing: SyncConfig) -> Self {
        Self {
            adc,
            data_ready,
            delay,
            timing,
            mode: ConversionMode::Pulse,
        }
    }

    pub async fn initialize(&mut self, config: &AdcConfig) -> Result<(), Error<AdcE>> {
        self.adc
            .initialize(config)
            .await
            .map_err(Error::Communication)?;
        self.mode = config.conversion_mode;
        Ok(())
    }

    /// Routes `channel` to the modulator and waits for the front end to settle.
    pub async fn select_channel(&mut self, channel: ChannelId) -> Result<(), Error<AdcE>> {
        let (positive, negative) = channel.inputs();
        self.adc
            .select_input(positive, negative)
            .await
            .map_err(Error::Communication)?;
        self.pause(self.timing.mux_settle).await;
        Ok(())
    }

    pub async fn read_channel(&mut self, channel: ChannelId) -> Result<i32, Error<AdcE>> {
        // in continuous mode the multiplexer write restarts the conversion, so arm first
        self.data_ready.arm();
        self.select_channel(channel).await?;

        if self.mode == ConversionMode::Pulse {
            self.adc
                .start_conversion()
                .await
                .map_err(Error::Communication)?;
        }

        self.data_ready
            .wait_for_data(self.timing.data_ready_timeout)
            .await
            .map_err(|_| Error::<AdcE>::ConversionTimeout)?;

        let raw = self
            .adc
            .read_conversion()
            .await
            .map_err(Error::Communication)?;
        trace!("{:?} raw {}", channel, raw);
        Ok(raw)
    }

    /// Reads every channel in order. The first failure aborts the scan.
    pub async fn scan_all(&mut self) -> Result<[i32; CHANNEL_COUNT], Error<AdcE>> {
        let mut raw = [0; CHANNEL_COUNT];
        for channel in ChannelId::iter() {
            raw[channel.index()] = match self.read_channel(channel).await {
                Ok(value) => value,
                Err(e) => {
                    warn!("Scan aborted on {:?}: {}", channel, e.kind());
                    return Err(e);
                }
            };
        }
        Ok(raw)
    }

    pub async fn pause(&mut self, duration: Duration) {
        self.delay.delay_us(duration.as_micros() as u32).await;
    }

    pub async fn diagnostic(&mut self) -> Result<Diagnostic, Error<AdcE>> {
        self.adc.diagnostic().await.map_err(Error::Communication)
    }

    pub fn adc(&mut self) -> &mut A {
        &mut self.adc
    }
}
