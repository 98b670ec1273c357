//! Orchestrator control loop.
//!
//! The `Orchestrator` owns the shared region, the three queue channels, the
//! Record Readers and the supervisor. Each tick it composes one Archive Frame
//! from the readers, ships it on the data channel, handles one keypad event,
//! refreshes the display when due and adapts the tick period to GPS speed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vsp_common::consts::{
    BUTTON_MSG_MAX, CHANNEL_BUTTON, CHANNEL_DATA, CHANNEL_GUI, CONTROL_SEGMENT_ID,
    DATA_MSG_MAX, DEFAULT_DISTANCE_INCREMENT_KM, DEFAULT_QUEUE_KEY, DEFAULT_SHM_NAME,
    GUI_MSG_MAX, IDLE_TICK_PERIOD_US, MIN_TICK_PERIOD_US, PERIOD_EPSILON_US, SPEED_FLOOR_KMH,
};
use vsp_common::prelude::{
    ArchiveWriter, ChildProcess, ConfigError, KeyValueConfig, SensorKind, SensorRecord, Supervise,
};
use vsp_common::snapshot::encode_period;
use vsp_ipc::{QueueChannel, QueueError, Segment, SegmentLayout, SegmentStore};

use crate::error::OrchestratorError;
use crate::gui::{ButtonEvent, GuiPage};
use crate::reader::RecordReader;

/// Longest single sleep, so a stop request is noticed within this bound.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Button poll interval while waiting for a manual start.
const START_POLL: Duration = Duration::from_millis(50);

/// Sampling period in microseconds for a GPS speed.
///
/// At or below 1 km/h, or without a usable speed, the idle period applies.
/// Above it the period keeps the distance between samples at `increment_km`,
/// never dropping below [`MIN_TICK_PERIOD_US`].
pub fn tick_period_us(speed_kmh: Option<f32>, increment_km: f32) -> f32 {
    match speed_kmh {
        Some(speed) if speed.is_finite() && speed > SPEED_FLOOR_KMH => {
            let period = 60.0 * f64::from(increment_km) * 1_000_000.0 / f64::from(speed);
            (period as f32).max(MIN_TICK_PERIOD_US)
        }
        _ => IDLE_TICK_PERIOD_US as f32,
    }
}

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Resources being created.
    Initializing,
    /// Children spawned and the loop ticking.
    Running,
    /// Children being terminated and resources released.
    Stopping,
    /// Everything released.
    Stopped,
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Shared region name.
    pub shm_name: String,
    /// System V key of the message queue.
    pub queue_key: i32,
    /// Shared region layout.
    pub layout: SegmentLayout,
    /// Distance between two samples while moving.
    pub distance_increment_km: f32,
    /// Display refresh interval.
    pub gui_refresh: Duration,
    /// Pause after spawning the display, and after the other children.
    pub spawn_settle: Duration,
    /// Wait for the start button before spawning the sensor children.
    pub manual_start: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            shm_name: DEFAULT_SHM_NAME.to_string(),
            queue_key: DEFAULT_QUEUE_KEY,
            layout: SegmentLayout::default(),
            distance_increment_km: DEFAULT_DISTANCE_INCREMENT_KM,
            gui_refresh: Duration::from_millis(1000),
            spawn_settle: Duration::from_millis(500),
            manual_start: false,
        }
    }
}

impl OrchestratorConfig {
    /// Read the `orchestrator.*` keys, defaulting the absent ones.
    pub fn from_config(config: &KeyValueConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let distance_increment_km = config.get_or(
            "orchestrator.distance_increment_km",
            defaults.distance_increment_km,
        )?;
        if !(distance_increment_km.is_finite() && distance_increment_km > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "orchestrator.distance_increment_km must be positive, got {distance_increment_km}"
            )));
        }
        Ok(Self {
            distance_increment_km,
            gui_refresh: Duration::from_millis(config.get_or("orchestrator.gui_refresh_ms", 1000)?),
            spawn_settle: Duration::from_millis(
                config.get_or("orchestrator.spawn_settle_ms", 500)?,
            ),
            manual_start: config.get_or("orchestrator.manual_start", false)?,
            ..defaults
        })
    }
}

/// Loop counters, logged at shutdown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Frames delivered to the data channel.
    pub frames_sent: u64,
    /// Frames dropped because the send failed.
    pub send_failures: u64,
    /// Ticks without any sensor data.
    pub empty_ticks: u64,
    /// Button events handled.
    pub buttons: u64,
    /// Display refreshes sent.
    pub gui_refreshes: u64,
    /// Control segment updates.
    pub period_updates: u64,
}

/// Owns every shared resource and drives the sampling loop.
pub struct Orchestrator {
    config: OrchestratorConfig,
    state: OrchestratorState,
    running: Arc<AtomicBool>,
    readers: Vec<RecordReader>,
    control: Segment,
    data_tx: QueueChannel,
    gui_tx: QueueChannel,
    button_rx: QueueChannel,
    supervisor: Box<dyn Supervise>,
    page: GuiPage,
    period_us: f32,
    last_gui: Option<Instant>,
    stats: LoopStats,
    // Declared last so every view above is dropped before the region goes away
    store: SegmentStore,
}

impl Orchestrator {
    /// Create the shared region and queue, attach the readers and publish the
    /// idle period.
    ///
    /// # Errors
    /// Any resource creation failure; the caller aborts startup.
    pub fn new(
        config: OrchestratorConfig,
        supervisor: Box<dyn Supervise>,
    ) -> Result<Self, OrchestratorError> {
        info!(
            "Initializing orchestrator (region '{}', queue {:#x})",
            config.shm_name, config.queue_key
        );

        let store = SegmentStore::create(&config.shm_name, config.layout)?;
        let mut control = store.segment(CONTROL_SEGMENT_ID)?;

        let data_tx = QueueChannel::create(config.queue_key, CHANNEL_DATA, DATA_MSG_MAX)?;
        let gui_tx = QueueChannel::open(config.queue_key, CHANNEL_GUI, GUI_MSG_MAX)?;
        let button_rx = QueueChannel::open(config.queue_key, CHANNEL_BUTTON, BUTTON_MSG_MAX)?;

        let readers = SensorKind::RECORDED
            .iter()
            .map(|&kind| RecordReader::open(&config.shm_name, config.layout, kind))
            .collect::<Result<Vec<_>, _>>()?;

        let period_us = IDLE_TICK_PERIOD_US as f32;
        control.write(&encode_period(period_us))?;

        info!("Orchestrator initialized with {} record readers", readers.len());
        Ok(Self {
            config,
            state: OrchestratorState::Initializing,
            running: Arc::new(AtomicBool::new(true)),
            readers,
            control,
            data_tx,
            gui_tx,
            button_rx,
            supervisor,
            page: GuiPage::default(),
            period_us,
            last_gui: None,
            stats: LoopStats::default(),
            store,
        })
    }

    /// Flag cleared by the signal handler to request shutdown.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Loop counters so far.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Period currently published in the control segment.
    pub fn period_us(&self) -> f32 {
        self.period_us
    }

    /// Page currently shown.
    pub fn page(&self) -> GuiPage {
        self.page
    }

    /// Shared region name.
    pub fn shm_name(&self) -> &str {
        self.store.name()
    }

    fn stop_requested(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// Spawn the children. Returns `false` when a stop arrived while waiting
    /// for the manual start.
    pub fn start(&mut self) -> bool {
        self.spawn_or_warn(ChildProcess::Display);
        std::thread::sleep(self.config.spawn_settle);

        if self.config.manual_start && !self.wait_for_start() {
            info!("Stop requested before start");
            return false;
        }

        for child in ChildProcess::ALL
            .into_iter()
            .filter(|c| *c != ChildProcess::Display)
        {
            self.spawn_or_warn(child);
        }
        std::thread::sleep(self.config.spawn_settle);
        self.state = OrchestratorState::Running;
        true
    }

    /// Spawn one child through the supervisor. Returns its pid.
    pub fn spawn_child(&mut self, child: ChildProcess) -> Result<i32, OrchestratorError> {
        let pid = self.supervisor.spawn(child)?;
        debug!("{} running as pid {}", child, pid);
        Ok(pid)
    }

    fn spawn_or_warn(&mut self, child: ChildProcess) {
        if let Err(e) = self.spawn_child(child) {
            warn!("Failed to spawn {}: {}", child, e);
        }
    }

    /// Block on the button channel until start (true) or stop (false).
    fn wait_for_start(&mut self) -> bool {
        info!("Waiting for start button");
        while !self.stop_requested() {
            match self.next_button() {
                Some(ButtonEvent::Start) => return true,
                Some(ButtonEvent::Stop) => return false,
                Some(event) => self.handle_button(event),
                None => std::thread::sleep(START_POLL),
            }
        }
        false
    }

    /// Run ticks until a stop is requested, then shut down.
    pub fn run(&mut self) {
        if self.start() {
            info!("Sampling loop started");
            while !self.stop_requested() {
                let period = self.tick();
                self.sleep(period);
            }
        }
        self.shutdown();
    }

    /// One loop iteration, without the trailing sleep. Returns the period to
    /// sleep for.
    pub fn tick(&mut self) -> Duration {
        self.stats.ticks += 1;

        for reader in &mut self.readers {
            reader.tick();
        }

        self.send_frame();

        if let Some(event) = self.next_button() {
            self.handle_button(event);
        }

        let due = self
            .last_gui
            .is_none_or(|at| at.elapsed() >= self.config.gui_refresh);
        if due {
            self.refresh_gui();
        }

        self.update_period();
        Duration::from_micros(self.period_us as u64)
    }

    /// Encode one Archive Frame from every reader that has a record.
    pub fn compose_frame(&self) -> Result<Vec<u8>, OrchestratorError> {
        let mut w = ArchiveWriter::with_limit(DATA_MSG_MAX);
        for reader in &self.readers {
            reader.encode_block(&mut w)?;
        }
        Ok(w.into_bytes())
    }

    fn send_frame(&mut self) {
        let frame = match self.compose_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame composition failed: {}", e);
                self.stats.send_failures += 1;
                return;
            }
        };
        if frame.is_empty() {
            self.stats.empty_ticks += 1;
            debug!("No sensor data this tick");
            return;
        }
        match self.data_tx.send(&frame) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                debug!("Sent {} byte frame", frame.len());
            }
            Err(e) => {
                self.stats.send_failures += 1;
                warn!("Frame dropped: {}", e);
            }
        }
    }

    /// Take the next keypad event off the button channel, if any.
    ///
    /// # Errors
    /// A failed receive, or a message that is not a known button event.
    pub fn poll_button(&mut self) -> Result<Option<ButtonEvent>, OrchestratorError> {
        let mut buf = [0u8; BUTTON_MSG_MAX];
        let n = self.button_rx.recv(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(ButtonEvent::decode(&buf[..n])?))
    }

    fn next_button(&mut self) -> Option<ButtonEvent> {
        self.poll_button()
            .inspect_err(|e| warn!("Ignoring button message: {}", e))
            .ok()
            .flatten()
    }

    /// React to one keypad event.
    pub fn handle_button(&mut self, event: ButtonEvent) {
        self.stats.buttons += 1;
        debug!("Button {:?}", event);
        match event {
            ButtonEvent::Start => debug!("Start ignored, already running"),
            ButtonEvent::Stop if self.config.manual_start => {
                info!("Stop button pressed");
                self.running.store(false, Ordering::SeqCst);
            }
            ButtonEvent::Stop => debug!("Stop ignored outside manual-start mode"),
            ButtonEvent::NextPage => {
                self.page = self.page.next();
                self.last_gui = None;
            }
            ButtonEvent::PrevPage => {
                self.page = self.page.prev();
                self.last_gui = None;
            }
        }
    }

    fn latest(&self, kind: SensorKind) -> Option<&SensorRecord> {
        self.readers
            .iter()
            .find(|r| r.kind() == kind)
            .and_then(RecordReader::record)
    }

    /// Push the active page to the display.
    pub fn refresh_gui(&mut self) {
        self.last_gui = Some(Instant::now());
        let commands = self.page.render(self.latest(self.page.sensor()));
        for command in commands {
            let sent = command
                .encode()
                .map_err(OrchestratorError::from)
                .and_then(|bytes| self.gui_tx.send(&bytes).map_err(OrchestratorError::from));
            match sent {
                Ok(()) => {}
                Err(OrchestratorError::Queue(QueueError::Full { .. })) => {
                    debug!("GUI channel full, skipping refresh");
                    return;
                }
                Err(e) => {
                    warn!("GUI command dropped: {}", e);
                    return;
                }
            }
        }
        self.stats.gui_refreshes += 1;
    }

    /// Recompute the period from the latest GPS speed and publish it if it
    /// moved by more than the epsilon.
    pub fn update_period(&mut self) {
        let speed = match self.latest(SensorKind::Gps) {
            Some(SensorRecord::Gps(gps)) => gps.speed_kmh(),
            _ => None,
        };
        let period = tick_period_us(speed, self.config.distance_increment_km);
        if (period - self.period_us).abs() <= PERIOD_EPSILON_US {
            return;
        }
        match self.control.write(&encode_period(period)) {
            Ok(()) => {
                debug!("Tick period {} us -> {} us", self.period_us, period);
                self.period_us = period;
                self.stats.period_updates += 1;
            }
            Err(e) => warn!("Control segment update failed: {}", e),
        }
    }

    fn sleep(&self, period: Duration) {
        let deadline = Instant::now() + period;
        while !self.stop_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Terminate the children. Queues and the region are released on drop.
    pub fn shutdown(&mut self) {
        if self.state == OrchestratorState::Stopped {
            return;
        }
        self.state = OrchestratorState::Stopping;
        self.running.store(false, Ordering::SeqCst);
        info!("Stopping children");
        self.supervisor.terminate_all();

        let s = self.stats;
        info!(
            "Orchestrator stopped: {} ticks, {} frames sent, {} send failures, {} empty ticks, {} buttons",
            s.ticks, s.frames_sent, s.send_failures, s.empty_ticks, s.buttons
        );
        self.state = OrchestratorState::Stopped;
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_period_at_or_below_floor() {
        assert_eq!(tick_period_us(Some(0.0), 0.01), 10_000_000.0);
        assert_eq!(tick_period_us(Some(1.0), 0.01), 10_000_000.0);
        assert_eq!(tick_period_us(Some(-3.0), 0.01), 10_000_000.0);
        assert_eq!(tick_period_us(None, 0.01), 10_000_000.0);
        assert_eq!(tick_period_us(Some(f32::NAN), 0.01), 10_000_000.0);
    }

    #[test]
    fn test_fixed_distance_period() {
        assert!((tick_period_us(Some(10.0), 0.001) - 6_000.0).abs() < 0.01);
        assert!((tick_period_us(Some(10.0), 0.01) - 60_000.0).abs() < 0.1);
        assert!((tick_period_us(Some(100.0), 0.001) - 600.0).abs() < 0.01);
    }

    #[test]
    fn test_absurd_speed_clamps_to_min_period() {
        assert_eq!(tick_period_us(Some(1e9), 0.001), MIN_TICK_PERIOD_US);
        assert_eq!(tick_period_us(Some(f32::MAX), 0.01), MIN_TICK_PERIOD_US);
        assert!(tick_period_us(Some(300.0), 0.001) > MIN_TICK_PERIOD_US);
    }

    #[test]
    fn test_period_non_increasing_with_speed() {
        let mut last = f32::INFINITY;
        let mut speed = 1.01f32;
        while speed < 300.0 {
            let p = tick_period_us(Some(speed), DEFAULT_DISTANCE_INCREMENT_KM);
            assert!(p <= last, "period rose at {speed} km/h");
            last = p;
            speed += 0.37;
        }
    }

    #[test]
    fn test_config_defaults_and_overrides() {
        let empty = KeyValueConfig::default();
        assert_eq!(
            OrchestratorConfig::from_config(&empty).unwrap(),
            OrchestratorConfig::default()
        );

        let config: KeyValueConfig = "orchestrator.distance_increment_km=0.01\n\
             orchestrator.gui_refresh_ms=250\n\
             orchestrator.manual_start=true\n"
            .parse()
            .unwrap();
        let parsed = OrchestratorConfig::from_config(&config).unwrap();
        assert_eq!(parsed.distance_increment_km, 0.01);
        assert_eq!(parsed.gui_refresh, Duration::from_millis(250));
        assert!(parsed.manual_start);
        assert_eq!(parsed.spawn_settle, Duration::from_millis(500));
    }

    #[test]
    fn test_config_rejects_bad_increment() {
        let config: KeyValueConfig = "orchestrator.distance_increment_km=0\n".parse().unwrap();
        assert!(matches!(
            OrchestratorConfig::from_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
        let config: KeyValueConfig = "orchestrator.gui_refresh_ms=soon\n".parse().unwrap();
        assert!(OrchestratorConfig::from_config(&config).is_err());
    }
}
