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

pub mod calibration;
pub mod channel;
pub mod force_plate;
pub mod interface;
pub mod manager;
pub mod messaging;
pub mod processing;
pub mod scanner;
pub mod storage;

use calibration::CalibrationState;
use channel::{ChannelId, ChannelSelect};
use interface::Diagnostic;
use processing::{Frame, Measurement, Statistics};

/// Operations offered to a command dispatcher, either directly on the plate or over channels.
pub trait ForcePlateSystem {
    type Error;

    async fn start(&mut self) -> Result<(), Self::Error>;

    async fn stop(&mut self) -> Result<(), Self::Error>;

    async fn tare(&mut self, channel: ChannelId, samples: u32) -> Result<(), Self::Error>;

    async fn calibrate(
        &mut self,
        channel: ChannelId,
        reference_force: f32,
        samples: u32,
    ) -> Result<(), Self::Error>;

    async fn read(&mut self) -> Result<Frame, Self::Error>;

    async fn read_if_ready(&mut self) -> Result<Option<Frame>, Self::Error>;

    async fn read_channel(&mut self, channel: ChannelId) -> Result<Measurement, Self::Error>;

    async fn get_stats(&mut self, channel: ChannelId) -> Result<Statistics, Self::Error>;

    async fn reset_stats(&mut self, select: ChannelSelect) -> Result<(), Self::Error>;

    async fn reset_calibration(&mut self, select: ChannelSelect) -> Result<(), Self::Error>;

    async fn get_calibration_state(
        &mut self,
        channel: ChannelId,
    ) -> Result<CalibrationState, Self::Error>;

    async fn diagnostic(&mut self) -> Result<Diagnostic, Self::Error>;
}
