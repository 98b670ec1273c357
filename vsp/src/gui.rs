//! Front-panel protocol.
//!
//! The orchestrator drives a small character display over the GUI channel and
//! listens to the keypad on the button channel. Both directions use the
//! Archive Codec: a `char` opcode (or button code) followed by its operands.

use thiserror::Error;
use vsp_common::archive::TypeTag;
use vsp_common::consts::GUI_MSG_MAX;
use vsp_common::prelude::{ArchiveError, ArchiveReader, ArchiveWriter, SensorKind, SensorRecord};

/// Malformed GUI or button message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Codec failure.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Unknown GUI opcode.
    #[error("unknown GUI opcode {0}")]
    UnknownOpcode(u8),

    /// Unknown button code.
    #[error("unknown button code {0}")]
    UnknownButton(u8),
}

/// Render command sent to the display driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiCommand {
    /// Blank the screen.
    Clear,
    /// Write `text` on line `row`.
    Text {
        /// Display line, 0-based.
        row: u8,
        /// Line content.
        text: String,
    },
}

/// Longest line text that still fits one GUI message: the tagged opcode and
/// row take 2 bytes each, the string tag and its `int` length 5 more.
pub const GUI_TEXT_MAX: usize = GUI_MSG_MAX - 9;

/// Cut `text` to at most [`GUI_TEXT_MAX`] bytes on a character boundary.
fn fit_line(mut text: String) -> String {
    if text.len() > GUI_TEXT_MAX {
        let mut end = GUI_TEXT_MAX;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

impl GuiCommand {
    const OP_CLEAR: u8 = 1;
    const OP_TEXT: u8 = 2;

    /// Encode as one GUI channel message.
    pub fn encode(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut w = ArchiveWriter::with_limit(GUI_MSG_MAX);
        match self {
            Self::Clear => w.put(&Self::OP_CLEAR)?,
            Self::Text { row, text } => {
                w.put(&Self::OP_TEXT)?;
                w.put(row)?;
                w.put(text.as_str())?;
            }
        }
        Ok(w.into_bytes())
    }

    /// Decode one GUI channel message.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = ArchiveReader::new(bytes);
        match r.get::<u8>()? {
            Self::OP_CLEAR => Ok(Self::Clear),
            Self::OP_TEXT => Ok(Self::Text {
                row: r.get()?,
                text: r.get()?,
            }),
            op => Err(ProtocolError::UnknownOpcode(op)),
        }
    }
}

/// Keypad event read from the button channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ButtonEvent {
    /// Start sampling (manual-start mode).
    Start = 1,
    /// Stop the orchestrator (manual-start mode).
    Stop = 2,
    /// Show the next page.
    NextPage = 3,
    /// Show the previous page.
    PrevPage = 4,
}

impl ButtonEvent {
    /// Convert from the button code.
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Start),
            2 => Some(Self::Stop),
            3 => Some(Self::NextPage),
            4 => Some(Self::PrevPage),
            _ => None,
        }
    }

    /// Encode as one button channel message.
    pub fn encode(self) -> Vec<u8> {
        vec![TypeTag::Char as u8, self as u8]
    }

    /// Decode one button channel message.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let code = ArchiveReader::new(bytes).get::<u8>()?;
        Self::from_u8(code).ok_or(ProtocolError::UnknownButton(code))
    }
}

/// Page shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuiPage {
    /// Throughput test results.
    #[default]
    Throughput,
    /// Ambient temperature and fan.
    Temperature,
    /// GPS fix.
    Gps,
}

impl GuiPage {
    const ORDER: [GuiPage; 3] = [GuiPage::Throughput, GuiPage::Temperature, GuiPage::Gps];

    fn index(self) -> usize {
        match self {
            Self::Throughput => 0,
            Self::Temperature => 1,
            Self::Gps => 2,
        }
    }

    /// Following page, wrapping around.
    pub fn next(self) -> Self {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    /// Preceding page, wrapping around.
    pub fn prev(self) -> Self {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    /// Sensor whose record feeds this page.
    pub fn sensor(self) -> SensorKind {
        match self {
            Self::Throughput => SensorKind::Throughput,
            Self::Temperature => SensorKind::Temperature,
            Self::Gps => SensorKind::Gps,
        }
    }

    /// Text lines for this page given the sensor's latest record.
    pub fn lines(self, record: Option<&SensorRecord>) -> Vec<String> {
        match (self, record) {
            (Self::Throughput, Some(SensorRecord::Throughput(t))) => vec![
                "Throughput".to_string(),
                format!("Transfer: {:.2} MB", t.transfer),
                format!("Bandwidth: {:.2} Mbit/s", t.bandwidth),
            ],
            (Self::Temperature, Some(SensorRecord::Temperature(t))) => vec![
                "Temperature".to_string(),
                format!("Ambient: {:.1} C", t.ambient),
                format!("Fan: {} %", t.fan_duty),
            ],
            (Self::Gps, Some(SensorRecord::Gps(g))) => vec![
                "GPS".to_string(),
                format!("Lat: {}", g.latitude),
                format!("Lon: {}", g.longitude),
                format!("Speed: {} km/h", g.speed),
                format!("Elev: {} m", g.elevation),
                format!("Heading: {}", g.heading),
            ],
            (page, _) => vec![page.title().to_string(), "No data".to_string()],
        }
    }

    /// Page heading.
    pub fn title(self) -> &'static str {
        match self {
            Self::Throughput => "Throughput",
            Self::Temperature => "Temperature",
            Self::Gps => "GPS",
        }
    }

    /// Full refresh: a clear followed by one text command per line, each
    /// line cut to fit a GUI message.
    pub fn render(self, record: Option<&SensorRecord>) -> Vec<GuiCommand> {
        let mut commands = vec![GuiCommand::Clear];
        commands.extend(
            self.lines(record)
                .into_iter()
                .enumerate()
                .map(|(row, text)| GuiCommand::Text {
                    row: u8::try_from(row).unwrap_or(u8::MAX),
                    text: fit_line(text),
                }),
        );
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsp_common::prelude::{GpsRecord, TemperatureRecord};

    #[test]
    fn test_gui_command_wire_format() {
        assert_eq!(GuiCommand::Clear.encode().unwrap(), vec![6, 1]);

        let bytes = GuiCommand::Text {
            row: 2,
            text: "hi".into(),
        }
        .encode()
        .unwrap();
        assert_eq!(bytes, vec![6, 2, 6, 2, 2, 2, 0, 0, 0, b'h', b'i']);
        assert_eq!(
            GuiCommand::decode(&bytes).unwrap(),
            GuiCommand::Text {
                row: 2,
                text: "hi".into()
            }
        );
    }

    #[test]
    fn test_gui_text_longer_than_message_fails() {
        let cmd = GuiCommand::Text {
            row: 0,
            text: "x".repeat(GUI_MSG_MAX),
        };
        assert!(cmd.encode().is_err());
    }

    #[test]
    fn test_unknown_opcode() {
        assert!(matches!(
            GuiCommand::decode(&[6, 9]),
            Err(ProtocolError::UnknownOpcode(9))
        ));
    }

    #[test]
    fn test_button_codes() {
        for event in [
            ButtonEvent::Start,
            ButtonEvent::Stop,
            ButtonEvent::NextPage,
            ButtonEvent::PrevPage,
        ] {
            assert_eq!(ButtonEvent::decode(&event.encode()).unwrap(), event);
        }
        assert!(matches!(
            ButtonEvent::decode(&[6, 7]),
            Err(ProtocolError::UnknownButton(7))
        ));
        assert!(matches!(
            ButtonEvent::decode(&[]),
            Err(ProtocolError::Archive(_))
        ));
    }

    #[test]
    fn test_page_cycle() {
        let mut page = GuiPage::default();
        for _ in 0..3 {
            page = page.next();
        }
        assert_eq!(page, GuiPage::Throughput);
        assert_eq!(GuiPage::Throughput.prev(), GuiPage::Gps);
        assert_eq!(GuiPage::Gps.prev(), GuiPage::Temperature);
    }

    #[test]
    fn test_render_without_data() {
        let cmds = GuiPage::Gps.render(None);
        assert_eq!(cmds[0], GuiCommand::Clear);
        assert_eq!(
            cmds[2],
            GuiCommand::Text {
                row: 1,
                text: "No data".into()
            }
        );
    }

    #[test]
    fn test_render_temperature_and_gps() {
        let temp = SensorRecord::Temperature(TemperatureRecord {
            ambient: 23.46,
            fan_duty: 35,
        });
        let lines = GuiPage::Temperature.lines(Some(&temp));
        assert_eq!(lines, vec!["Temperature", "Ambient: 23.5 C", "Fan: 35 %"]);

        let gps = SensorRecord::Gps(GpsRecord {
            latitude: "48.85".into(),
            longitude: "2.35".into(),
            speed: "12".into(),
            elevation: "35".into(),
            heading: "90".into(),
        });
        let cmds = GuiPage::Gps.render(Some(&gps));
        assert_eq!(cmds.len(), 7);
        for cmd in &cmds {
            assert!(cmd.encode().unwrap().len() <= GUI_MSG_MAX);
        }
    }

    #[test]
    fn test_long_lines_are_cut_to_fit() {
        let gps = SensorRecord::Gps(GpsRecord {
            latitude: "4".repeat(300),
            longitude: "é".repeat(200),
            speed: "12".into(),
            elevation: "35".into(),
            heading: "90".into(),
        });
        let cmds = GuiPage::Gps.render(Some(&gps));
        assert_eq!(cmds.len(), 7);
        for cmd in &cmds {
            let bytes = cmd.encode().unwrap();
            assert!(bytes.len() <= GUI_MSG_MAX);
            assert_eq!(GuiCommand::decode(&bytes).unwrap(), *cmd);
        }
        let GuiCommand::Text { text, .. } = &cmds[2] else {
            panic!("expected text");
        };
        assert_eq!(text.len(), GUI_TEXT_MAX);
        assert!(text.starts_with("Lat: 444"));
        let GuiCommand::Text { text, .. } = &cmds[3] else {
            panic!("expected text");
        };
        assert!(text.len() <= GUI_TEXT_MAX && text.len() > GUI_TEXT_MAX - 2);
        assert!(text.ends_with('é'));
    }

    #[test]
    fn test_fit_line_keeps_short_text() {
        assert_eq!(fit_line("Speed: 12 km/h".into()), "Speed: 12 km/h");
        assert_eq!(fit_line("x".repeat(GUI_TEXT_MAX)).len(), GUI_TEXT_MAX);
    }
}
