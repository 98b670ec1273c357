//! System-wide constants for the VSP workspace.
//!
//! Single source of truth for segment layout, queue channel ids and message
//! size limits. Imported by all crates.

use static_assertions::const_assert;

/// Size of one shared memory segment in bytes.
pub const SEGMENT_SIZE: usize = 512;

/// Number of segments in the shared region (control + six sensor kinds).
pub const SEGMENT_COUNT: usize = 7;

/// Segment reserved for the current sampling period, written by the orchestrator only.
pub const CONTROL_SEGMENT_ID: usize = 0;

/// Default name of the shared region under `/dev/shm` (prefixed with `vsp_`).
pub const DEFAULT_SHM_NAME: &str = "sensors";

/// Default System V key of the message queue shared by all channels.
pub const DEFAULT_QUEUE_KEY: i32 = 0x5653_5000;

/// Queue channel id: orchestrator → display driver.
pub const CHANNEL_GUI: i64 = 1;

/// Queue channel id: input device → orchestrator.
pub const CHANNEL_BUTTON: i64 = 2;

/// Queue channel id: orchestrator → storage consumer.
pub const CHANNEL_DATA: i64 = 3;

/// Maximum GUI command size in bytes.
pub const GUI_MSG_MAX: usize = 128;

/// Maximum button event size in bytes.
pub const BUTTON_MSG_MAX: usize = 128;

/// Maximum Archive Frame size in bytes.
pub const DATA_MSG_MAX: usize = 4096;

/// Largest payload a single queue message may carry.
pub const QUEUE_MSG_CAPACITY: usize = 8192;

/// Fixed tick period used at or below [`SPEED_FLOOR_KMH`], in microseconds.
pub const IDLE_TICK_PERIOD_US: u64 = 10_000_000;

/// Shortest tick period in microseconds, whatever speed the GPS reports.
pub const MIN_TICK_PERIOD_US: f32 = 100.0;

/// GPS speed at or below which the idle tick period applies.
pub const SPEED_FLOOR_KMH: f32 = 1.0;

/// Default distance travelled between two samples.
pub const DEFAULT_DISTANCE_INCREMENT_KM: f32 = 0.001;

/// Minimum period change (µs) that is published to the control segment.
pub const PERIOD_EPSILON_US: f32 = 1.0;

const_assert!(GUI_MSG_MAX <= QUEUE_MSG_CAPACITY);
const_assert!(BUTTON_MSG_MAX <= QUEUE_MSG_CAPACITY);
const_assert!(DATA_MSG_MAX <= QUEUE_MSG_CAPACITY);
const_assert!(IDLE_TICK_PERIOD_US > 100);
const_assert!(CONTROL_SEGMENT_ID < SEGMENT_COUNT);
// Five sensor blocks, each bounded by its segment snapshot plus wifi framing.
const_assert!(5 * (SEGMENT_SIZE + 64) <= DATA_MSG_MAX);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_are_distinct() {
        assert_ne!(CHANNEL_GUI, CHANNEL_BUTTON);
        assert_ne!(CHANNEL_BUTTON, CHANNEL_DATA);
        assert_ne!(CHANNEL_GUI, CHANNEL_DATA);
        // msgrcv treats msgtyp <= 0 specially; channel ids must be positive.
        assert!(CHANNEL_GUI > 0 && CHANNEL_BUTTON > 0 && CHANNEL_DATA > 0);
    }

    #[test]
    fn idle_period_is_ten_seconds() {
        assert_eq!(IDLE_TICK_PERIOD_US, 10 * 1_000_000);
    }
}
