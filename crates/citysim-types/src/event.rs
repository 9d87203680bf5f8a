//! The telemetry record published for every car move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CarId, CityId};
use crate::position::Position;

/// A car seen by the (virtual) sensor of a grid cell.
///
/// Field order is part of the wire contract: downstream consumers read
/// `sensor_id, vin, license_plate, city, x, y, timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarDetectedEvent {
    /// Key of the sensor that saw the car, see [`CarDetectedEvent::sensor_id_for`].
    pub sensor_id: String,
    /// Vehicle identification number.
    pub vin: CarId,
    /// License plate.
    pub license_plate: String,
    /// Display name of the city.
    pub city: String,
    /// Column of the detection.
    pub x: u32,
    /// Row of the detection.
    pub y: u32,
    /// Producer clock at emission.
    pub timestamp: DateTime<Utc>,
}

impl CarDetectedEvent {
    /// Sensor key of a grid cell: `{city_id}-{x}-{y}`.
    ///
    /// The key belongs to the cell, not the car, so every visit to the
    /// same cell lands on the same broker partition.
    pub fn sensor_id_for(city_id: &CityId, position: Position) -> String {
        format!("{city_id}-{}-{}", position.x, position.y)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sensor_id_joins_city_and_cell() {
        let id = CarDetectedEvent::sensor_id_for(&CityId::new("braavos"), Position::new(3, 7));
        assert_eq!(id, "braavos-3-7");
    }

    #[test]
    fn json_fields_keep_wire_order() {
        let event = CarDetectedEvent {
            sensor_id: String::from("braavos-3-7"),
            vin: CarId::new("VF1AB000123456789"),
            license_plate: String::from("AB-123-CD"),
            city: String::from("Braavos"),
            x: 3,
            y: 7,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        let order = ["sensor_id", "vin", "license_plate", "city", "\"x\"", "\"y\"", "timestamp"];
        let offsets: Vec<usize> = order.iter().filter_map(|field| json.find(field)).collect();
        assert_eq!(offsets.len(), order.len());
        assert!(offsets.windows(2).all(|w| w.first() < w.get(1)));
    }
}
