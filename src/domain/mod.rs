pub mod model;

pub use model::{BatteryReading, Geofence, HardwareInfo, LiveTrackingState, Position, Tracker};
