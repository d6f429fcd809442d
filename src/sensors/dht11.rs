//! DHT11 single-wire temperature/humidity driver
//!
//! The line is open-drain with a pull-up. The host pulls it low for at least
//! 18 ms, the sensor answers with 80 us low / 80 us high, then sends 40 bits.
//! Each bit is a ~50 us low followed by a high whose length gives the value
//! (~27 us for 0, ~70 us for 1). Byte 4 is the 8-bit sum of bytes 0..3.

use super::traits::{ClimateReading, ClimateSensor, SensorError};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

const START_LOW_MS: u32 = 20;
const START_RELEASE_US: u32 = 30;

/// Poll limit for each level change, in 1 us polls
const EDGE_TIMEOUT_POLLS: u32 = 200;

const FRAME_LEN: usize = 5;

/// Decode a raw 5-byte frame
pub fn decode_frame(data: [u8; FRAME_LEN]) -> Result<ClimateReading, SensorError> {
    let sum = data[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != data[4] {
        return Err(SensorError::Checksum);
    }

    let humidity_pct = data[0] as f32 + data[1] as f32 * 0.1;

    // Sign bit set: the integer byte counts down from -1 and the tenths
    // digit is still added, so 3 / 0x82 reads as -3.8
    let mut temperature_c = data[2] as f32;
    if data[3] & 0x80 != 0 {
        temperature_c = -1.0 - temperature_c;
    }
    temperature_c += (data[3] & 0x0F) as f32 * 0.1;

    Ok(ClimateReading {
        temperature_c,
        humidity_pct,
    })
}

/// DHT11 on one open-drain GPIO
pub struct Dht11<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> Dht11<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// The pin must already be open-drain with the line released
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    /// Wait while the line stays at `high`, returning the polls spent
    fn wait_while(&mut self, high: bool) -> Result<u32, SensorError> {
        let mut polls = 0;
        while self.pin.is_high().map_err(|_| SensorError::Gpio)? == high {
            if polls >= EDGE_TIMEOUT_POLLS {
                return Err(SensorError::Timeout);
            }
            polls += 1;
            self.delay.delay_us(1);
        }
        Ok(polls)
    }

    fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], SensorError> {
        // Start signal
        self.pin.set_low().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_ms(START_LOW_MS);
        self.pin.set_high().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(START_RELEASE_US);

        // Response: line pulled low, then high, then the first bit starts
        self.wait_while(true)?;
        self.wait_while(false)?;
        self.wait_while(true)?;

        let mut data = [0u8; FRAME_LEN];
        for bit in 0..FRAME_LEN * 8 {
            let low = self.wait_while(false)?;
            let high = self.wait_while(true)?;

            // Compared against the 50 us low so poll overhead cancels out
            data[bit / 8] <<= 1;
            if high > low {
                data[bit / 8] |= 1;
            }
        }

        Ok(data)
    }
}

impl<P, D> ClimateSensor for Dht11<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let result = self.read_frame();
        // Always leave the line released
        let _ = self.pin.set_high();
        decode_frame(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    #[test]
    fn test_decode_frame() {
        let reading = decode_frame([60, 0, 24, 5, 89]).expect("Should decode");
        assert!((reading.humidity_pct - 60.0).abs() < 0.01);
        assert!((reading.temperature_c - 24.5).abs() < 0.01);
    }

    #[test]
    fn test_decode_negative_temperature() {
        let reading = decode_frame([40, 0, 3, 0x82, 0xAD]).expect("Should decode");
        assert!((reading.temperature_c + 3.8).abs() < 0.01);
    }

    #[test]
    fn test_decode_just_below_zero() {
        // 0 / 0x89: -1 + 0.9
        let reading = decode_frame([40, 0, 0, 0x89, 0xB1]).expect("Should decode");
        assert!((reading.temperature_c + 0.1).abs() < 0.01);
    }

    #[test]
    fn test_checksum_wraps() {
        // 200 + 0 + 60 + 0 = 260 -> 4
        assert!(decode_frame([200, 0, 60, 0, 4]).is_ok());
    }

    #[test]
    fn test_bad_checksum_rejected() {
        assert_eq!(
            decode_frame([60, 0, 24, 5, 90]),
            Err(SensorError::Checksum)
        );
    }

    /// Line that never answers the start signal
    struct SilentLine;

    impl ErrorType for SilentLine {
        type Error = Infallible;
    }

    impl InputPin for SilentLine {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(true)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(false)
        }
    }

    impl OutputPin for SilentLine {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_missing_sensor_times_out() {
        let mut dht = Dht11::new(SilentLine, NoDelay);
        assert_eq!(dht.read(), Err(SensorError::Timeout));
    }
}
