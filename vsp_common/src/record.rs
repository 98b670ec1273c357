//! Per-sensor records and their Record Block encoding.
//!
//! A record is written in two places:
//! - into its sensor's shared memory segment as a snapshot (see [`crate::snapshot`]),
//!   as a flat list of values;
//! - into an Archive Frame as a Record Block: the raw discriminator byte
//!   followed by the record's fields.
//!
//! For every kind except wifi the block body and the value list are the same
//! sequence of Typed Fields. Wifi blocks group the values per BSSID.

use crate::archive::{ArchiveError, ArchiveReader, ArchiveWriter, TimeValue};
use crate::sensor::SensorKind;

/// Typed record of one sensor kind.
pub trait Record: Sized {
    /// Sensor kind producing this record.
    const KIND: SensorKind;

    /// Number of values in the record's flat value list.
    fn value_count(&self) -> usize;

    /// Append the flat value list.
    fn encode_values(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError>;

    /// Read a flat value list of `count` values.
    fn decode_values(r: &mut ArchiveReader<'_>, count: usize) -> Result<Self, ArchiveError>;

    /// Append the Record Block body (everything after the discriminator).
    fn encode_body(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        self.encode_values(w)
    }

    /// Read the Record Block body (everything after the discriminator).
    fn decode_body(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError>;

    /// Append the full Record Block, discriminator first.
    fn encode_block(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put_raw_u8(Self::KIND.as_u8())?;
        self.encode_body(w)
    }
}

fn expect_count(expected: usize, found: usize) -> Result<(), ArchiveError> {
    if expected != found {
        return Err(ArchiveError::FieldCount { expected, found });
    }
    Ok(())
}

/// Throughput test result.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThroughputRecord {
    /// Data transferred during the last test interval (MB).
    pub transfer: f32,
    /// Measured bandwidth (Mbit/s).
    pub bandwidth: f32,
}

impl ThroughputRecord {
    const VALUES: usize = 2;
}

impl Record for ThroughputRecord {
    const KIND: SensorKind = SensorKind::Throughput;

    fn value_count(&self) -> usize {
        Self::VALUES
    }

    fn encode_values(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put(&self.transfer)?;
        w.put(&self.bandwidth)
    }

    fn decode_values(r: &mut ArchiveReader<'_>, count: usize) -> Result<Self, ArchiveError> {
        expect_count(Self::VALUES, count)?;
        Ok(Self {
            transfer: r.get()?,
            bandwidth: r.get()?,
        })
    }

    fn decode_body(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Self::decode_values(r, Self::VALUES)
    }
}

/// GPS fix as reported by the receiver, kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GpsRecord {
    /// Latitude in decimal degrees.
    pub latitude: String,
    /// Longitude in decimal degrees.
    pub longitude: String,
    /// Ground speed in km/h.
    pub speed: String,
    /// Elevation in metres.
    pub elevation: String,
    /// Heading in degrees.
    pub heading: String,
}

impl GpsRecord {
    const VALUES: usize = 5;

    /// Ground speed in km/h, if the receiver reported a number.
    pub fn speed_kmh(&self) -> Option<f32> {
        self.speed.trim().parse::<f32>().ok().filter(|v| v.is_finite())
    }

    /// Latitude and longitude in decimal degrees, if both parse.
    pub fn position(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.trim().parse::<f64>().ok()?;
        let lon = self.longitude.trim().parse::<f64>().ok()?;
        (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
    }
}

impl Record for GpsRecord {
    const KIND: SensorKind = SensorKind::Gps;

    fn value_count(&self) -> usize {
        Self::VALUES
    }

    fn encode_values(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put(&self.latitude)?;
        w.put(&self.longitude)?;
        w.put(&self.speed)?;
        w.put(&self.elevation)?;
        w.put(&self.heading)
    }

    fn decode_values(r: &mut ArchiveReader<'_>, count: usize) -> Result<Self, ArchiveError> {
        expect_count(Self::VALUES, count)?;
        Ok(Self {
            latitude: r.get()?,
            longitude: r.get()?,
            speed: r.get()?,
            elevation: r.get()?,
            heading: r.get()?,
        })
    }

    fn decode_body(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Self::decode_values(r, Self::VALUES)
    }
}

/// Ambient temperature and fan state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TemperatureRecord {
    /// Ambient temperature (°C).
    pub ambient: f32,
    /// Fan PWM duty cycle (%).
    pub fan_duty: i32,
}

impl TemperatureRecord {
    const VALUES: usize = 2;
}

impl Record for TemperatureRecord {
    const KIND: SensorKind = SensorKind::Temperature;

    fn value_count(&self) -> usize {
        Self::VALUES
    }

    fn encode_values(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put(&self.ambient)?;
        w.put(&self.fan_duty)
    }

    fn decode_values(r: &mut ArchiveReader<'_>, count: usize) -> Result<Self, ArchiveError> {
        expect_count(Self::VALUES, count)?;
        Ok(Self {
            ambient: r.get()?,
            fan_duty: r.get()?,
        })
    }

    fn decode_body(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Self::decode_values(r, Self::VALUES)
    }
}

/// Real-time clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtcRecord {
    /// Whether the clock reports a valid time.
    pub status: bool,
    /// Clock time.
    pub epoch: TimeValue,
}

impl RtcRecord {
    const VALUES: usize = 2;
}

impl Record for RtcRecord {
    const KIND: SensorKind = SensorKind::Rtc;

    fn value_count(&self) -> usize {
        Self::VALUES
    }

    fn encode_values(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put(&self.status)?;
        w.put(&self.epoch)
    }

    fn decode_values(r: &mut ArchiveReader<'_>, count: usize) -> Result<Self, ArchiveError> {
        expect_count(Self::VALUES, count)?;
        Ok(Self {
            status: r.get()?,
            epoch: r.get()?,
        })
    }

    fn decode_body(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        Self::decode_values(r, Self::VALUES)
    }
}

/// Descriptor of one wifi network seen by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WlanNetwork {
    /// Access point MAC address.
    pub bssid: String,
    /// Advertised data rate.
    pub data_rate: String,
    /// Received signal power.
    pub signal_power: String,
    /// Radio channel.
    pub channel: String,
    /// Network name (SSID).
    pub name: String,
}

impl WlanNetwork {
    /// Strings per network: BSSID plus the four descriptor fields.
    pub const FIELDS: usize = 5;
}

/// Result of one wifi scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WlanRecord {
    /// Networks in scan order.
    pub networks: Vec<WlanNetwork>,
}

impl WlanRecord {
    /// Most networks a block can describe (the count is a single byte).
    pub const MAX_NETWORKS: usize = u8::MAX as usize;

    fn encode_network(n: &WlanNetwork, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        w.put(&n.bssid)?;
        w.put(&n.data_rate)?;
        w.put(&n.signal_power)?;
        w.put(&n.channel)?;
        w.put(&n.name)
    }

    fn decode_network(r: &mut ArchiveReader<'_>) -> Result<WlanNetwork, ArchiveError> {
        Ok(WlanNetwork {
            bssid: r.get()?,
            data_rate: r.get()?,
            signal_power: r.get()?,
            channel: r.get()?,
            name: r.get()?,
        })
    }
}

impl Record for WlanRecord {
    const KIND: SensorKind = SensorKind::Wlan;

    fn value_count(&self) -> usize {
        self.networks.len() * WlanNetwork::FIELDS
    }

    fn encode_values(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        for n in &self.networks {
            Self::encode_network(n, w)?;
        }
        Ok(())
    }

    fn decode_values(r: &mut ArchiveReader<'_>, count: usize) -> Result<Self, ArchiveError> {
        if count % WlanNetwork::FIELDS != 0 {
            return Err(ArchiveError::FieldCount {
                expected: count - count % WlanNetwork::FIELDS,
                found: count,
            });
        }
        let networks = (0..count / WlanNetwork::FIELDS)
            .map(|_| Self::decode_network(r))
            .collect::<Result<_, _>>()?;
        Ok(Self { networks })
    }

    fn encode_body(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        let count = u8::try_from(self.networks.len()).map_err(|_| ArchiveError::FieldCount {
            expected: Self::MAX_NETWORKS,
            found: self.networks.len(),
        })?;
        w.put_raw_u8(count)?;
        for n in &self.networks {
            w.put_raw_u8(WlanNetwork::FIELDS as u8)?;
            Self::encode_network(n, w)?;
        }
        Ok(())
    }

    fn decode_body(r: &mut ArchiveReader<'_>) -> Result<Self, ArchiveError> {
        let count = r.get_raw_u8()? as usize;
        let mut networks = Vec::with_capacity(count);
        for _ in 0..count {
            let fields = r.get_raw_u8()? as usize;
            expect_count(WlanNetwork::FIELDS, fields)?;
            networks.push(Self::decode_network(r)?);
        }
        Ok(Self { networks })
    }
}

/// Record of any recorded sensor kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorRecord {
    /// Throughput test result.
    Throughput(ThroughputRecord),
    /// GPS fix.
    Gps(GpsRecord),
    /// Temperature and fan.
    Temperature(TemperatureRecord),
    /// Real-time clock.
    Rtc(RtcRecord),
    /// Wifi scan.
    Wlan(WlanRecord),
}

macro_rules! dispatch {
    ($self:expr, $rec:ident => $body:expr) => {
        match $self {
            SensorRecord::Throughput($rec) => $body,
            SensorRecord::Gps($rec) => $body,
            SensorRecord::Temperature($rec) => $body,
            SensorRecord::Rtc($rec) => $body,
            SensorRecord::Wlan($rec) => $body,
        }
    };
}

impl SensorRecord {
    /// Sensor kind of the wrapped record.
    pub fn kind(&self) -> SensorKind {
        match self {
            Self::Throughput(_) => SensorKind::Throughput,
            Self::Gps(_) => SensorKind::Gps,
            Self::Temperature(_) => SensorKind::Temperature,
            Self::Rtc(_) => SensorKind::Rtc,
            Self::Wlan(_) => SensorKind::Wlan,
        }
    }

    /// Number of values in the flat value list.
    pub fn value_count(&self) -> usize {
        dispatch!(self, rec => rec.value_count())
    }

    /// Append the flat value list.
    pub fn encode_values(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        dispatch!(self, rec => rec.encode_values(w))
    }

    /// Append the full Record Block.
    pub fn encode_block(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        dispatch!(self, rec => rec.encode_block(w))
    }

    /// Read a flat value list of `count` values for `kind`.
    ///
    /// Returns `None` for kinds without a record (accelerometer).
    pub fn decode_values(
        kind: SensorKind,
        r: &mut ArchiveReader<'_>,
        count: usize,
    ) -> Option<Result<Self, ArchiveError>> {
        Some(match kind {
            SensorKind::Throughput => ThroughputRecord::decode_values(r, count).map(Self::Throughput),
            SensorKind::Gps => GpsRecord::decode_values(r, count).map(Self::Gps),
            SensorKind::Temperature => {
                TemperatureRecord::decode_values(r, count).map(Self::Temperature)
            }
            SensorKind::Rtc => RtcRecord::decode_values(r, count).map(Self::Rtc),
            SensorKind::Wlan => WlanRecord::decode_values(r, count).map(Self::Wlan),
            SensorKind::Accelerometer => return None,
        })
    }

    /// Read a Record Block body for `kind`.
    ///
    /// Returns `None` for kinds without a record (accelerometer).
    pub fn decode_body(
        kind: SensorKind,
        r: &mut ArchiveReader<'_>,
    ) -> Option<Result<Self, ArchiveError>> {
        Some(match kind {
            SensorKind::Throughput => ThroughputRecord::decode_body(r).map(Self::Throughput),
            SensorKind::Gps => GpsRecord::decode_body(r).map(Self::Gps),
            SensorKind::Temperature => TemperatureRecord::decode_body(r).map(Self::Temperature),
            SensorKind::Rtc => RtcRecord::decode_body(r).map(Self::Rtc),
            SensorKind::Wlan => WlanRecord::decode_body(r).map(Self::Wlan),
            SensorKind::Accelerometer => return None,
        })
    }
}
