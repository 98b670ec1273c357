//! Geographic sink.
//!
//! Collects one placemark per Datum carrying a usable GPS fix and writes the
//! whole KML document when the sink is closed. Datums without a fix are
//! counted and skipped.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};
use vsp_common::prelude::Datum;

use super::{Lifecycle, SinkInput, StorageSink};
use crate::error::SinkError;

/// One point of the track.
#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    /// Label (receive time).
    pub name: String,
    /// Free text shown in the balloon.
    pub description: String,
    /// Decimal degrees.
    pub latitude: f64,
    /// Decimal degrees.
    pub longitude: f64,
    /// Metres, 0 when unknown.
    pub elevation: f64,
}

impl Placemark {
    /// Placemark for `datum`, or `None` without a parseable position.
    pub fn from_datum(datum: &Datum) -> Option<Self> {
        let gps = datum.gps.as_ref()?;
        let (latitude, longitude) = gps.position()?;
        let elevation = gps.elevation.trim().parse::<f64>().unwrap_or(0.0);

        let mut description = format!("speed {} km/h, heading {}", gps.speed, gps.heading);
        if let Some(t) = &datum.temperature {
            let _ = write!(description, "; temperature {:.1} C, fan {}%", t.ambient, t.fan_duty);
        }
        if let Some(t) = &datum.throughput {
            let _ = write!(
                description,
                "; transfer {:.2} MB, bandwidth {:.2} Mbit/s",
                t.transfer, t.bandwidth
            );
        }
        for (bssid, n) in &datum.networks {
            let _ = write!(description, "; wlan {} ({}) {}", n.name, bssid, n.signal_power);
        }

        Some(Self {
            name: datum.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            description,
            latitude,
            longitude,
            elevation,
        })
    }
}

/// Escape the five XML special characters.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Write a complete KML document holding `placemarks`.
pub fn write_document<W: Write>(out: &mut W, title: &str, placemarks: &[Placemark]) -> std::io::Result<()> {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#)?;
    writeln!(out, "<Document>")?;
    writeln!(out, "  <name>{}</name>", escape_xml(title))?;
    for p in placemarks {
        writeln!(out, "  <Placemark>")?;
        writeln!(out, "    <name>{}</name>", escape_xml(&p.name))?;
        writeln!(out, "    <description>{}</description>", escape_xml(&p.description))?;
        writeln!(out, "    <Point>")?;
        // KML orders coordinates lon,lat,alt
        writeln!(
            out,
            "      <coordinates>{},{},{}</coordinates>",
            p.longitude, p.latitude, p.elevation
        )?;
        writeln!(out, "    </Point>")?;
        writeln!(out, "  </Placemark>")?;
    }
    writeln!(out, "</Document>")?;
    writeln!(out, "</kml>")?;
    Ok(())
}

/// Accumulates placemarks and serializes them at close.
#[derive(Debug)]
pub struct KmlSink {
    lifecycle: Lifecycle<Vec<Placemark>>,
    skipped: u64,
}

impl KmlSink {
    /// Uninitialized sink.
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("kml"),
            skipped: 0,
        }
    }

    /// Datums dropped for lack of a GPS fix.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Default for KmlSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageSink for KmlSink {
    fn name(&self) -> &'static str {
        "kml"
    }

    fn input(&self) -> SinkInput {
        SinkInput::Datum
    }

    fn initialize(&mut self, path: &Path) -> Result<(), SinkError> {
        self.lifecycle.initialize(path)
    }

    fn open(&mut self) -> Result<(), SinkError> {
        self.lifecycle.path_to_open()?;
        self.lifecycle.set_open(Vec::new());
        self.skipped = 0;
        Ok(())
    }

    fn store_datum(&mut self, datum: &Datum) -> Result<(), SinkError> {
        let placemarks = self.lifecycle.output()?;
        match Placemark::from_datum(datum) {
            Some(p) => placemarks.push(p),
            None => {
                self.skipped += 1;
                debug!("No GPS fix in datum, skipping placemark");
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let placemarks = self.lifecycle.take_output()?;
        let path = self
            .lifecycle
            .path()
            .ok_or(SinkError::NotInitialized { sink: "kml" })?;

        let mut out = BufWriter::new(File::create(path)?);
        write_document(&mut out, "VSP track", &placemarks)?;
        out.flush()?;

        info!(
            "KML sink wrote {} placemarks to {} ({} datums without fix)",
            placemarks.len(),
            path.display(),
            self.skipped
        );
        Ok(())
    }

    fn uninitialize(&mut self) -> Result<(), SinkError> {
        if self.lifecycle.is_open() {
            self.close()?;
        }
        self.lifecycle.forget_path();
        Ok(())
    }
}
