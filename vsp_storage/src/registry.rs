//! Sink registry.
//!
//! Maps each [`SinkKind`] to a factory. Built at startup and passed by value;
//! tests can register their own sinks.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SinkError;
use crate::sink::{BinarySink, KmlSink, StorageSink, TextSink};

/// Constructor for a boxed sink.
pub type SinkFactory = fn() -> Box<dyn StorageSink>;

/// Output kind selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Raw frames, appended verbatim.
    Binary,
    /// Text rendering of each Datum.
    Text,
    /// KML placemarks, written at close.
    Kml,
}

impl SinkKind {
    /// All kinds.
    pub const ALL: [SinkKind; 3] = [SinkKind::Binary, SinkKind::Text, SinkKind::Kml];

    /// Command-line name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Text => "text",
            Self::Kml => "kml",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKind {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "raw" => Ok(Self::Binary),
            "text" | "txt" => Ok(Self::Text),
            "kml" | "geo" => Ok(Self::Kml),
            _ => Err(SinkError::UnknownKind(s.to_string())),
        }
    }
}

/// Registry of sink factories.
pub struct SinkRegistry {
    factories: HashMap<SinkKind, SinkFactory>,
}

impl SinkRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding the three built-in sinks.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .factories
            .insert(SinkKind::Binary, || Box::new(BinarySink::new()));
        registry
            .factories
            .insert(SinkKind::Text, || Box::new(TextSink::new()));
        registry
            .factories
            .insert(SinkKind::Kml, || Box::new(KmlSink::new()));
        registry
    }

    /// Register a factory for `kind`.
    ///
    /// # Errors
    /// `SinkError::AlreadyRegistered` if `kind` already has one.
    pub fn register(&mut self, kind: SinkKind, factory: SinkFactory) -> Result<(), SinkError> {
        if self.factories.contains_key(&kind) {
            return Err(SinkError::AlreadyRegistered(kind));
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    /// Build a sink of `kind`.
    ///
    /// # Errors
    /// `SinkError::NotRegistered` if no factory exists for `kind`.
    pub fn create(&self, kind: SinkKind) -> Result<Box<dyn StorageSink>, SinkError> {
        let factory = self
            .factories
            .get(&kind)
            .ok_or(SinkError::NotRegistered(kind))?;
        Ok(factory())
    }

    /// Registered kinds.
    pub fn kinds(&self) -> Vec<SinkKind> {
        SinkKind::ALL
            .into_iter()
            .filter(|k| self.factories.contains_key(k))
            .collect()
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkInput;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("binary".parse::<SinkKind>().unwrap(), SinkKind::Binary);
        assert_eq!("TEXT".parse::<SinkKind>().unwrap(), SinkKind::Text);
        assert_eq!("kml".parse::<SinkKind>().unwrap(), SinkKind::Kml);
        assert!(matches!(
            "csv".parse::<SinkKind>(),
            Err(SinkError::UnknownKind(s)) if s == "csv"
        ));
        for kind in SinkKind::ALL {
            assert_eq!(kind.to_string().parse::<SinkKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_builtin_sinks() {
        let registry = SinkRegistry::with_builtin();
        assert_eq!(registry.kinds(), SinkKind::ALL.to_vec());
        assert_eq!(registry.create(SinkKind::Binary).unwrap().input(), SinkInput::Raw);
        assert_eq!(registry.create(SinkKind::Text).unwrap().name(), "text");
        assert_eq!(registry.create(SinkKind::Kml).unwrap().input(), SinkInput::Datum);
    }

    #[test]
    fn test_register_and_duplicates() {
        let mut registry = SinkRegistry::new();
        assert!(matches!(
            registry.create(SinkKind::Text),
            Err(SinkError::NotRegistered(SinkKind::Text))
        ));
        registry
            .register(SinkKind::Text, || Box::new(TextSink::new()))
            .unwrap();
        assert!(matches!(
            registry.register(SinkKind::Text, || Box::new(TextSink::new())),
            Err(SinkError::AlreadyRegistered(SinkKind::Text))
        ));
        assert_eq!(registry.kinds(), vec![SinkKind::Text]);
    }
}
