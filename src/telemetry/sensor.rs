//! Simulated sensor payloads for the demo binary
//!
//! Stands in for the devkit's temperature/humidity sampling: readings
//! follow a slow wave through the plausible ranges (20-40 °C,
//! 40-80 %RH) so dashboards show movement without a random source.

use super::{PayloadSource, PublishTask};
use serde_json::json;

/// Payload source producing the flat telemetry object the devkit
/// firmware emits: `messageId`, sensor fields, `timestamp`, and
/// optionally `deviceId`.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    device_id: Option<String>,
}

impl SimulatedSensor {
    pub fn new(device_id: Option<String>) -> Self {
        Self { device_id }
    }

    fn readings(sequence: u64) -> (f64, f64) {
        let phase = sequence as f64 * 0.37;
        let temperature = 30.0 + 10.0 * phase.sin();
        let humidity = 60.0 + 20.0 * (phase * 0.53).cos();
        (temperature, humidity)
    }
}

impl PayloadSource for SimulatedSensor {
    fn payload(&mut self, task: &PublishTask) -> Vec<u8> {
        let (temperature, humidity) = Self::readings(task.sequence_number);
        let mut body = json!({
            "messageId": task.sequence_number,
            "temperature": (temperature * 100.0).round() / 100.0,
            "humidity": (humidity * 100.0).round() / 100.0,
            "timestamp": chrono::Utc::now().timestamp(),
        });
        if let Some(device_id) = &self.device_id {
            body["deviceId"] = json!(device_id);
        }
        serde_json::to_vec(&body).unwrap_or_default()
    }
}
