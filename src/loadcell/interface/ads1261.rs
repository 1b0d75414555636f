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

//! Register protocol for the ADS1261. Every operation is one fixed length SPI transaction; the
//! driver gives register contents no meaning beyond what configuration needs, and never retries.

use crate::config::AdcConfig;
use crate::error::BusError;
use crate::loadcell::interface::registers::{
    self, AnalogInput, Command, ConversionMode, Register, RegisterMap, ADS1261_DEVICE_ID,
    READ_REGISTER_OPCODE, WRITE_REGISTER_OPCODE,
};
use crate::loadcell::interface::{AsyncMultiplexedAdc, Diagnostic};
use embassy_time::{with_timeout, Duration};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiDevice;
use strum::IntoEnumIterator;

const RESET_RECOVERY_US: u32 = 100;
const VALID_DATA_BITS: usize = 24;

pub struct Ads1261<SPI, D> {
    spi: SPI,
    delay: D,
    bus_timeout: Duration,
    config: AdcConfig,
}

impl<SPI, D, SpiE> Ads1261<SPI, D>
where
    SPI: SpiDevice<Error = SpiE>,
    D: DelayNs,
{
    pub fn new(spi: SPI, delay: D, bus_timeout: Duration) -> Self {
        Self {
            spi,
            delay,
            bus_timeout,
            config: AdcConfig::default(),
        }
    }

    async fn transfer<const N: usize>(&mut self, mut frame: [u8; N]) -> Result<[u8; N], BusError<SpiE>> {
        let timeout = self.bus_timeout;
        match with_timeout(timeout, self.spi.transfer_in_place(&mut frame)).await {
            Ok(Ok(())) => Ok(frame),
            Ok(Err(e)) => Err(BusError::Spi(e)),
            Err(_) => Err(BusError::Timeout),
        }
    }

    pub async fn read_register(&mut self, register: Register) -> Result<u8, BusError<SpiE>> {
        let rx = self
            .transfer([READ_REGISTER_OPCODE | register.address(), 0x00, 0x00])
            .await?;
        trace!("RREG {:?} = {:#x}", register, rx[2]);
        Ok(rx[2])
    }

    /// Writes `value` and returns the echo byte clocked out while the value was sent.
    pub async fn write_register(&mut self, register: Register, value: u8) -> Result<u8, BusError<SpiE>> {
        trace!("WREG {:?} <- {:#x}", register, value);
        let rx = self
            .transfer([WRITE_REGISTER_OPCODE | register.address(), value])
            .await?;
        Ok(rx[1])
    }

    pub async fn send_command(&mut self, command: Command) -> Result<u8, BusError<SpiE>> {
        trace!("Command {:?}", command);
        let rx = self.transfer([command as u8, 0x00]).await?;
        Ok(rx[1])
    }

    pub async fn read_all_registers(&mut self) -> Result<RegisterMap, BusError<SpiE>> {
        let mut map = RegisterMap::default();
        for register in Register::iter() {
            let value = self.read_register(register).await?;
            map.set(register, value);
        }
        Ok(map)
    }

    async fn write_checked(&mut self, register: Register, value: u8) -> Result<(), BusError<SpiE>> {
        self.write_register(register, value).await?;
        let read_back = self.read_register(register).await?;
        if read_back != value {
            warn!(
                "Register {:?} read back {:#x}, expected {:#x}",
                register, read_back, value
            );
        }
        Ok(())
    }

    pub fn config(&self) -> &AdcConfig {
        &self.config
    }
}

impl<SPI, D, SpiE> AsyncMultiplexedAdc for Ads1261<SPI, D>
where
    SPI: SpiDevice<Error = SpiE>,
    D: DelayNs,
{
    type Error = BusError<SpiE>;

    async fn initialize(&mut self, config: &AdcConfig) -> Result<(), Self::Error> {
        self.send_command(Command::Reset).await?;
        self.delay.delay_us(RESET_RECOVERY_US).await;

        self.write_checked(Register::Mode0, registers::mode0(config.data_rate, config.filter))
            .await?;
        self.write_checked(
            Register::Mode1,
            registers::mode1(config.conversion_mode, config.conversion_delay),
        )
        .await?;
        self.write_checked(Register::Mode3, registers::mode3(config.spi_auto_timeout))
            .await?;
        self.write_checked(Register::Pga, registers::pga(config.gain))
            .await?;
        self.write_checked(Register::Ref, registers::reference(config.reference))
            .await?;

        if config.conversion_mode == ConversionMode::Continuous {
            self.send_command(Command::Start).await?;
        }

        self.config = *config;
        debug!(
            "ADS1261 configured: gain {:?}, rate {:?}, filter {:?}, mode {:?}",
            config.gain, config.data_rate, config.filter, config.conversion_mode
        );
        Ok(())
    }

    async fn select_input(
        &mut self,
        positive: AnalogInput,
        negative: AnalogInput,
    ) -> Result<(), Self::Error> {
        self.write_register(Register::InputMux, registers::input_mux(positive, negative))
            .await?;
        Ok(())
    }

    async fn start_conversion(&mut self) -> Result<(), Self::Error> {
        self.send_command(Command::Start).await?;
        Ok(())
    }

    async fn read_conversion(&mut self) -> Result<i32, Self::Error> {
        let rx = self
            .transfer([Command::ReadData as u8, 0x00, 0x00, 0x00, 0x00])
            .await?;
        // 24 bit two's complement, MSB first; the arithmetic shift extends the sign
        let code = i32::from_be_bytes([rx[2], rx[3], rx[4], 0]) >> 8;
        trace!("RDATA = {}", code);
        Ok(code)
    }

    async fn diagnostic(&mut self) -> Result<Diagnostic, Self::Error> {
        let id = self.read_register(Register::Id).await?;
        let status = self.read_register(Register::Status).await?;

        let configured = registers::pga(self.config.gain);
        let pattern = configured ^ 0x01;
        self.write_register(Register::Pga, pattern).await?;
        let echoed = self.read_register(Register::Pga).await?;
        self.write_register(Register::Pga, configured).await?;
        let restored = self.read_register(Register::Pga).await?;

        let diagnostic = Diagnostic {
            device_id: registers::device_id(id),
            revision: registers::revision(id),
            status,
            id_recognised: registers::device_id(id) == ADS1261_DEVICE_ID,
            register_echo_ok: echoed == pattern && restored == configured,
        };
        info!(
            "ADS1261 diagnostic: id {:#x} rev {} status {:#x} echo ok {}",
            diagnostic.device_id, diagnostic.revision, diagnostic.status, diagnostic.register_echo_ok
        );
        Ok(diagnostic)
    }

    fn get_adc_bit_count(&self) -> usize {
        VALID_DATA_BITS
    }
}
