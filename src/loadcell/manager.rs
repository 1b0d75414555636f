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

use crate::error::ErrorKind;
use crate::loadcell::channel::{ChannelId, ChannelSelect};
use crate::loadcell::messaging::{
    PlateEvent, PlateEventPublisher, PlateRequest, PlateRequestSubscriber,
};
use crate::loadcell::ForcePlateSystem;
use embassy_futures::select::{select, Either};
use embassy_sync::pubsub::WaitResult;
use embassy_time::{Duration, Ticker};

/// Sole owner of the plate. Requests and periodic acquisition are served one at a time from
/// this task, which is what serialises access to the ADC bus.
pub struct ForcePlateManager<'a, P> {
    requests: PlateRequestSubscriber<'a>,
    events: PlateEventPublisher<'a>,
    plate: P,
    sample_interval: Duration,
}

impl<'a, P> ForcePlateManager<'a, P>
where
    P: ForcePlateSystem,
    ErrorKind: From<P::Error>,
{
    pub fn new(
        requests: PlateRequestSubscriber<'a>,
        events: PlateEventPublisher<'a>,
        plate: P,
        sample_interval: Duration,
    ) -> Self {
        Self {
            requests,
            events,
            plate,
            sample_interval,
        }
    }

    pub async fn run(&mut self) -> ! {
        let mut acquisition_timer = Ticker::every(self.sample_interval);
        loop {
            match select(self.requests.next_message(), acquisition_timer.next()).await {
                Either::First(WaitResult::Message(request)) => {
                    self.handle_request(request).await;
                }
                Either::First(WaitResult::Lagged(missed)) => {
                    warn!("Missed {} plate requests", missed);
                }
                Either::Second(_) => {
                    self.poll_acquisition().await;
                }
            }
        }
    }

    /// Waits for the next request and serves it, without acquisition in between.
    pub async fn serve_one(&mut self) {
        let request = self.requests.next_message_pure().await;
        self.handle_request(request).await;
    }

    pub async fn handle_request(&mut self, request: PlateRequest) {
        match self.execute(request).await {
            Ok(Some(event)) => self.events.publish_immediate(event),
            Ok(None) => self.events.publish_immediate(PlateEvent::Completed(request)),
            Err(e) => {
                warn!("Request {:?} failed: {}", request, e);
                self.events.publish_immediate(PlateEvent::Failed(request, e));
            }
        }
    }

    async fn execute(&mut self, request: PlateRequest) -> Result<Option<PlateEvent>, ErrorKind> {
        let event = match request {
            PlateRequest::Start => {
                self.plate.start().await?;
                None
            }
            PlateRequest::Stop => {
                self.plate.stop().await?;
                None
            }
            PlateRequest::Tare { channel, samples } => {
                self.plate.tare(ChannelId::try_from(channel)?, samples).await?;
                None
            }
            PlateRequest::Calibrate {
                channel,
                reference_force,
                samples,
            } => {
                self.plate
                    .calibrate(ChannelId::try_from(channel)?, reference_force, samples)
                    .await?;
                None
            }
            PlateRequest::Read => Some(PlateEvent::ReadReply(self.plate.read().await?)),
            PlateRequest::ReadIfReady => Some(match self.plate.read_if_ready().await? {
                Some(frame) => PlateEvent::ReadReply(frame),
                None => PlateEvent::NotReady,
            }),
            PlateRequest::ReadChannel(channel) => {
                let id = ChannelId::try_from(channel)?;
                let measurement = self.plate.read_channel(id).await?;
                Some(PlateEvent::ChannelMeasurement(id, measurement))
            }
            PlateRequest::GetStats(channel) => {
                let id = ChannelId::try_from(channel)?;
                Some(PlateEvent::Stats(id, self.plate.get_stats(id).await?))
            }
            PlateRequest::ResetStats(select) => {
                self.plate.reset_stats(ChannelSelect::try_from(select)?).await?;
                None
            }
            PlateRequest::ResetCalibration(select) => {
                self.plate
                    .reset_calibration(ChannelSelect::try_from(select)?)
                    .await?;
                None
            }
            PlateRequest::GetCalibrationState(channel) => {
                let id = ChannelId::try_from(channel)?;
                let state = self.plate.get_calibration_state(id).await?;
                Some(PlateEvent::CalibrationState(id, state))
            }
            PlateRequest::Diagnostic => Some(PlateEvent::Diagnostic(self.plate.diagnostic().await?)),
        };
        Ok(event)
    }

    /// One acquisition tick: publishes a frame when the plate is running and due for a sample.
    pub async fn poll_acquisition(&mut self) {
        match self.plate.read_if_ready().await {
            Ok(Some(frame)) => self.events.publish_immediate(PlateEvent::Frame(frame)),
            Ok(None) => {}
            Err(e) => {
                let kind = ErrorKind::from(e);
                warn!("Acquisition scan failed: {}", kind);
                self.events
                    .publish_immediate(PlateEvent::AcquisitionFailed(kind));
            }
        }
    }

    pub fn plate(&mut self) -> &mut P {
        &mut self.plate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loadcell::calibration::CalibrationState;
    use crate::loadcell::channel::ALL_CHANNELS;
    use crate::loadcell::messaging::{ForcePlateOverChannel, PlateEventChannel, PlateRequestChannel};
    use crate::testing::{test_plate, FakeAds1261, FakeClock, TestPlate};
    use embassy_futures::block_on;
    use embassy_futures::join::join;

    fn manager<'a>(
        requests: &'a PlateRequestChannel,
        events: &'a PlateEventChannel,
        fake: &FakeAds1261,
        clock: &FakeClock,
    ) -> ForcePlateManager<'a, TestPlate> {
        ForcePlateManager::new(
            requests.subscriber().unwrap(),
            events.publisher().unwrap(),
            test_plate(fake, clock),
            Duration::from_micros(1_000),
        )
    }

    #[test]
    fn client_calibrates_through_manager() {
        let requests = PlateRequestChannel::new();
        let events = PlateEventChannel::new();
        let fake = FakeAds1261::new();
        let clock = FakeClock::default();
        let mut manager = manager(&requests, &events, &fake, &clock);
        let mut client =
            ForcePlateOverChannel::new(requests.publisher().unwrap(), events.subscriber().unwrap());

        fake.set_default_codes([2000, 0, 0, 0]);
        let (result, _) = block_on(join(client.tare(ChannelId::Ch0, 5), manager.serve_one()));
        assert_eq!(result, Ok(()));

        fake.set_default_codes([2400, 0, 0, 0]);
        let (result, _) = block_on(join(
            client.calibrate(ChannelId::Ch0, 80.0, 5),
            manager.serve_one(),
        ));
        assert_eq!(result, Ok(()));

        let (state, _) = block_on(join(
            client.get_calibration_state(ChannelId::Ch0),
            manager.serve_one(),
        ));
        assert_eq!(state, Ok(CalibrationState::Calibrated));
        assert_eq!(manager.plate().scale(ChannelId::Ch0), 0.2);
    }

    #[test]
    fn client_sees_calibration_errors() {
        let requests = PlateRequestChannel::new();
        let events = PlateEventChannel::new();
        let fake = FakeAds1261::new();
        let clock = FakeClock::default();
        let mut manager = manager(&requests, &events, &fake, &clock);
        let mut client =
            ForcePlateOverChannel::new(requests.publisher().unwrap(), events.subscriber().unwrap());

        let (result, _) = block_on(join(
            client.calibrate(ChannelId::Ch1, 10.0, 5),
            manager.serve_one(),
        ));
        assert_eq!(result, Err(ErrorKind::InvalidCalibrationState));
    }

    #[test]
    fn client_reads_frames_and_statistics() {
        let requests = PlateRequestChannel::new();
        let events = PlateEventChannel::new();
        let fake = FakeAds1261::new();
        let clock = FakeClock::default();
        let mut manager = manager(&requests, &events, &fake, &clock);
        let mut client =
            ForcePlateOverChannel::new(requests.publisher().unwrap(), events.subscriber().unwrap());
        fake.set_default_codes([100, 200, 300, 400]);

        let (frame, _) = block_on(join(client.read(), manager.serve_one()));
        let data = frame.unwrap().force_data();
        assert_eq!(data.total(), 1000.0);

        let (stats, _) = block_on(join(client.get_stats(ChannelId::Ch3), manager.serve_one()));
        assert_eq!(stats.map(|s| (s.count, s.max)), Ok((1, 400.0)));

        let (result, _) = block_on(join(client.reset_stats(ChannelSelect::All), manager.serve_one()));
        assert_eq!(result, Ok(()));
        assert_eq!(manager.plate().statistics(ChannelId::Ch3).count, 0);

        let (ready, _) = block_on(join(client.read_if_ready(), manager.serve_one()));
        assert_eq!(ready, Ok(None));
    }

    #[test]
    fn client_read_skips_queued_acquisition_frame() {
        let requests = PlateRequestChannel::new();
        let events = PlateEventChannel::new();
        let fake = FakeAds1261::new();
        let clock = FakeClock::default();
        let mut manager = manager(&requests, &events, &fake, &clock);
        let mut client =
            ForcePlateOverChannel::new(requests.publisher().unwrap(), events.subscriber().unwrap());

        block_on(manager.handle_request(PlateRequest::Start));
        fake.set_default_codes([1, 1, 1, 1]);
        clock.advance_us(1_000);
        block_on(manager.poll_acquisition());

        fake.set_default_codes([100, 200, 300, 400]);
        let (frame, _) = block_on(join(client.read(), manager.serve_one()));
        let frame = frame.unwrap();
        assert_eq!(frame.number, 2);
        assert_eq!(frame.measurements.map(|m| m.raw), [100, 200, 300, 400]);
    }

    #[test]
    fn out_of_range_channel_is_rejected_without_change() {
        let requests = PlateRequestChannel::new();
        let events = PlateEventChannel::new();
        let fake = FakeAds1261::new();
        let clock = FakeClock::default();
        let mut manager = manager(&requests, &events, &fake, &clock);
        let mut event_rx = events.subscriber().unwrap();

        let bad_tare = PlateRequest::Tare {
            channel: 4,
            samples: 10,
        };
        block_on(manager.handle_request(bad_tare));
        assert_eq!(
            event_rx.try_next_message_pure(),
            Some(PlateEvent::Failed(bad_tare, ErrorKind::InvalidArgument))
        );
        assert_eq!(fake.data_reads(), 0);

        block_on(manager.handle_request(PlateRequest::ResetCalibration(9)));
        assert_eq!(
            event_rx.try_next_message_pure(),
            Some(PlateEvent::Failed(
                PlateRequest::ResetCalibration(9),
                ErrorKind::InvalidArgument
            ))
        );

        block_on(manager.handle_request(PlateRequest::ResetCalibration(ALL_CHANNELS)));
        assert_eq!(
            event_rx.try_next_message_pure(),
            Some(PlateEvent::Completed(PlateRequest::ResetCalibration(ALL_CHANNELS)))
        );
    }

    #[test]
    fn acquisition_publishes_due_frames() {
        let requests = PlateRequestChannel::new();
        let events = PlateEventChannel::new();
        let fake = FakeAds1261::new();
        let clock = FakeClock::default();
        let mut manager = manager(&requests, &events, &fake, &clock);
        let mut event_rx = events.subscriber().unwrap();

        block_on(manager.poll_acquisition());
        assert_eq!(event_rx.try_next_message_pure(), None);

        block_on(manager.handle_request(PlateRequest::Start));
        assert_eq!(
            event_rx.try_next_message_pure(),
            Some(PlateEvent::Completed(PlateRequest::Start))
        );
        clock.advance_us(1_000);
        block_on(manager.poll_acquisition());
        assert!(matches!(
            event_rx.try_next_message_pure(),
            Some(PlateEvent::Frame(frame)) if frame.number == 1
        ));

        clock.advance_us(1_000);
        fake.fail_data_reads_after(0);
        block_on(manager.poll_acquisition());
        assert_eq!(
            event_rx.try_next_message_pure(),
            Some(PlateEvent::AcquisitionFailed(ErrorKind::Communication))
        );
    }
}
