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

use crate::loadcell::calibration::CalibrationRecord;
use crate::loadcell::channel::ChannelId;
use core::fmt::Debug;

/// Backing store for per channel calibration. The plate decides when to load and save; the
/// store decides where records live.
pub trait CalibrationStore {
    type Error: Debug;

    /// Returns `None` when nothing has been stored for `channel`.
    async fn load(&mut self, channel: ChannelId) -> Option<CalibrationRecord>;

    async fn store(&mut self, channel: ChannelId, record: CalibrationRecord) -> Result<(), Self::Error>;
}
