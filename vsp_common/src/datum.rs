//! Decoded Archive Frames.
//!
//! A [`Datum`] aggregates every Record Block of one frame. Decoding walks the
//! frame left to right: a discriminator byte, then that sensor's block body,
//! repeated until the buffer is empty. The first block that cannot be decoded
//! stops the walk; the rest of the frame is dropped and the blocks read so far
//! are kept.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveReader, ArchiveWriter};
use crate::record::{
    GpsRecord, RtcRecord, SensorRecord, TemperatureRecord, ThroughputRecord, WlanRecord,
};
use crate::sensor::SensorKind;

/// Protocol error found while decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The discriminator byte names no sensor kind.
    #[error("unknown record discriminator {discriminator:#04x} at offset {offset}")]
    UnknownDiscriminator {
        /// Byte found.
        discriminator: u8,
        /// Offset of the byte in the frame.
        offset: usize,
    },

    /// The discriminator names a sensor kind that never produces blocks.
    #[error("unsupported {kind} block at offset {offset}")]
    Unsupported {
        /// Sensor kind named by the discriminator.
        kind: SensorKind,
        /// Offset of the discriminator in the frame.
        offset: usize,
    },

    /// The block body does not decode.
    #[error("malformed {kind} block at offset {offset}: {source}")]
    Malformed {
        /// Sensor kind of the block.
        kind: SensorKind,
        /// Offset of the discriminator in the frame.
        offset: usize,
        /// Codec error.
        #[source]
        source: ArchiveError,
    },
}

/// Wifi descriptor stored per BSSID.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WlanDescriptor {
    /// Advertised data rate.
    pub data_rate: String,
    /// Received signal power.
    pub signal_power: String,
    /// Radio channel.
    pub channel: String,
    /// Network name (SSID).
    pub name: String,
}

/// Structured content of one Archive Frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    /// Time the frame was received.
    pub timestamp: DateTime<Utc>,
    /// Throughput test result.
    pub throughput: Option<ThroughputRecord>,
    /// Ambient temperature and fan duty cycle.
    pub temperature: Option<TemperatureRecord>,
    /// GPS fix.
    pub gps: Option<GpsRecord>,
    /// Real-time clock state.
    pub rtc: Option<RtcRecord>,
    /// Visible wifi networks keyed by BSSID.
    pub networks: BTreeMap<String, WlanDescriptor>,
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Blocks decoded before the end of the frame or the first error.
    pub datum: Datum,
    /// Number of blocks decoded.
    pub blocks: usize,
    /// Error that stopped decoding, if any.
    pub error: Option<FrameError>,
}

impl Datum {
    /// Empty datum stamped with `timestamp`.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            throughput: None,
            temperature: None,
            gps: None,
            rtc: None,
            networks: BTreeMap::new(),
        }
    }

    /// Decode `frame` into a datum stamped with `timestamp`.
    pub fn decode(frame: &[u8], timestamp: DateTime<Utc>) -> DecodedFrame {
        let mut datum = Datum::new(timestamp);
        let mut r = ArchiveReader::new(frame);
        let mut blocks = 0;

        loop {
            let offset = r.position();
            let Ok(discriminator) = r.get_raw_u8() else {
                break;
            };
            match decode_block(discriminator, offset, &mut r) {
                Ok(record) => {
                    datum.apply(record);
                    blocks += 1;
                }
                Err(error) => {
                    return DecodedFrame {
                        datum,
                        blocks,
                        error: Some(error),
                    };
                }
            }
        }

        DecodedFrame {
            datum,
            blocks,
            error: None,
        }
    }

    /// Merge one decoded record. A later block of the same kind replaces an earlier one.
    pub fn apply(&mut self, record: SensorRecord) {
        match record {
            SensorRecord::Throughput(rec) => self.throughput = Some(rec),
            SensorRecord::Temperature(rec) => self.temperature = Some(rec),
            SensorRecord::Gps(rec) => self.gps = Some(rec),
            SensorRecord::Rtc(rec) => self.rtc = Some(rec),
            SensorRecord::Wlan(WlanRecord { networks }) => {
                for n in networks {
                    self.networks.insert(
                        n.bssid,
                        WlanDescriptor {
                            data_rate: n.data_rate,
                            signal_power: n.signal_power,
                            channel: n.channel,
                            name: n.name,
                        },
                    );
                }
            }
        }
    }

    /// Whether no block contributed to this datum.
    pub fn is_empty(&self) -> bool {
        self.throughput.is_none()
            && self.temperature.is_none()
            && self.gps.is_none()
            && self.rtc.is_none()
            && self.networks.is_empty()
    }
}

fn decode_block(
    discriminator: u8,
    offset: usize,
    r: &mut ArchiveReader<'_>,
) -> Result<SensorRecord, FrameError> {
    let kind = SensorKind::from_u8(discriminator).ok_or(FrameError::UnknownDiscriminator {
        discriminator,
        offset,
    })?;
    SensorRecord::decode_body(kind, r)
        .ok_or(FrameError::Unsupported { kind, offset })?
        .map_err(|source| FrameError::Malformed {
            kind,
            offset,
            source,
        })
}

/// Encode `records` as one Archive Frame of at most `limit` bytes.
pub fn encode_frame<'a>(
    records: impl IntoIterator<Item = &'a SensorRecord>,
    limit: usize,
) -> Result<Vec<u8>, ArchiveError> {
    let mut w = ArchiveWriter::with_limit(limit);
    for record in records {
        record.encode_block(&mut w)?;
    }
    Ok(w.into_bytes())
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f UTC"))?;
        if let Some(t) = &self.throughput {
            writeln!(
                f,
                "  throughput: transfer={:.2} MB bandwidth={:.2} Mbit/s",
                t.transfer, t.bandwidth
            )?;
        }
        if let Some(t) = &self.temperature {
            writeln!(f, "  temperature: {:.1} C fan={}%", t.ambient, t.fan_duty)?;
        }
        if let Some(g) = &self.gps {
            writeln!(
                f,
                "  gps: lat={} lon={} speed={} km/h elevation={} m heading={}",
                g.latitude, g.longitude, g.speed, g.elevation, g.heading
            )?;
        }
        if let Some(rtc) = &self.rtc {
            let status = if rtc.status { "ok" } else { "invalid" };
            match DateTime::from_timestamp(rtc.epoch.0, 0) {
                Some(t) => writeln!(f, "  rtc: status={status} time={}", t.format("%Y-%m-%d %H:%M:%S"))?,
                None => writeln!(f, "  rtc: status={status} epoch={}", rtc.epoch.0)?,
            }
        }
        for (bssid, n) in &self.networks {
            writeln!(
                f,
                "  wlan {bssid}: name=\"{}\" rate={} power={} channel={}",
                n.name, n.data_rate, n.signal_power, n.channel
            )?;
        }
        Ok(())
    }
}
