//! Sensor kinds.
//!
//! The same byte value identifies a sensor's shared memory segment and the
//! discriminator of its Record Block inside an Archive Frame.

use std::fmt;

/// Sensor kind, doubling as segment id and frame discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SensorKind {
    /// Network throughput test (iperf).
    Throughput = 1,
    /// GPS receiver.
    Gps = 2,
    /// Accelerometer (reserved, never produced).
    Accelerometer = 3,
    /// Ambient temperature and fan control.
    Temperature = 4,
    /// Real-time clock.
    Rtc = 5,
    /// Wifi scanner.
    Wlan = 6,
}

impl SensorKind {
    /// Sensor kinds that have a Record Reader, in frame composition order.
    pub const RECORDED: [SensorKind; 5] = [
        SensorKind::Throughput,
        SensorKind::Gps,
        SensorKind::Temperature,
        SensorKind::Rtc,
        SensorKind::Wlan,
    ];

    /// Convert from the raw discriminator byte. Returns `None` for unknown values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Throughput),
            2 => Some(Self::Gps),
            3 => Some(Self::Accelerometer),
            4 => Some(Self::Temperature),
            5 => Some(Self::Rtc),
            6 => Some(Self::Wlan),
            _ => None,
        }
    }

    /// Discriminator byte.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Shared memory segment id of this sensor.
    #[inline]
    pub const fn segment_id(self) -> usize {
        self as usize
    }

    /// Short lowercase name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Throughput => "iperf",
            Self::Gps => "gps",
            Self::Accelerometer => "accel",
            Self::Temperature => "temp",
            Self::Rtc => "rtc",
            Self::Wlan => "wlan",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SEGMENT_COUNT;

    #[test]
    fn discriminator_roundtrip() {
        for val in 1..=6u8 {
            let kind = SensorKind::from_u8(val).unwrap();
            assert_eq!(kind.as_u8(), val);
        }
        assert!(SensorKind::from_u8(0).is_none());
        assert!(SensorKind::from_u8(7).is_none());
        assert!(SensorKind::from_u8(255).is_none());
    }

    #[test]
    fn every_kind_has_a_sensor_segment() {
        for val in 1..=6u8 {
            let kind = SensorKind::from_u8(val).unwrap();
            assert!(kind.segment_id() > 0);
            assert!(kind.segment_id() < SEGMENT_COUNT);
        }
    }

    #[test]
    fn accelerometer_is_not_recorded() {
        assert!(!SensorKind::RECORDED.contains(&SensorKind::Accelerometer));
    }
}
