use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::num::NonZeroU64;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::date::DateValue;
use crate::overlap::malformed_spans;
use crate::unit::{BookableUnit, ReservationSpan, UnitId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: UnitId,
    pub name: String,
    pub price: NonZeroU64,

    #[serde(default)]
    pub capacity: Option<u32>,

    #[serde(default)]
    pub beds: Option<u32>,

    #[serde(default)]
    pub size: Option<u32>,

    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRecord {
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,

    pub room_id: UnitId,

    #[serde(default)]
    pub guest_name: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    pub check_in: DateValue,
    pub check_out: DateValue,

    #[serde(default)]
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    rooms: Vec<RoomRecord>,
    #[serde(default)]
    reservations: Vec<ReservationRecord>,
}

/// Snapshot of bookable units with their live (non-cancelled) reservations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    units: Vec<BookableUnit>,
}

impl Catalog {
    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        let catalog = Self::from_records(file.rooms, file.reservations)?;
        info!(
            path = %path.display(),
            units = catalog.units.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Loads `path`, or falls back to [`Catalog::demo`] when the file does not
    /// exist.
    pub fn load_or_demo(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        warn!(path = %path.display(), "catalog file not found; using demo catalog");
        Ok(Self::demo())
    }

    pub fn from_records(
        rooms: Vec<RoomRecord>,
        reservations: Vec<ReservationRecord>,
    ) -> anyhow::Result<Self> {
        let mut seen = HashSet::with_capacity(rooms.len());
        for room in &rooms {
            if !seen.insert(room.id) {
                return Err(anyhow!("duplicate room id in catalog: {}", room.id));
            }
        }

        let mut spans: BTreeMap<UnitId, Vec<ReservationSpan>> = BTreeMap::new();
        for res in reservations {
            if res.status == ReservationStatus::Cancelled {
                debug!(uuid = %res.uuid, room_id = res.room_id, "skipping cancelled reservation");
                continue;
            }
            if !seen.contains(&res.room_id) {
                warn!(
                    uuid = %res.uuid,
                    room_id = res.room_id,
                    "reservation references unknown room; ignoring"
                );
                continue;
            }
            spans.entry(res.room_id).or_default().push(ReservationSpan {
                uuid: Some(res.uuid),
                start: res.check_in,
                end: res.check_out,
            });
        }

        let units = rooms
            .into_iter()
            .map(|room| BookableUnit {
                id: room.id,
                name: room.name,
                base_price: room.price,
                capacity: room.capacity,
                beds: room.beds,
                size_m2: room.size,
                features: room.features,
                reservations: spans.remove(&room.id).unwrap_or_default(),
            })
            .collect();

        Ok(Self::from_units(units))
    }

    pub fn from_units(units: Vec<BookableUnit>) -> Self {
        for unit in &units {
            for span in malformed_spans(&unit.reservations) {
                warn!(
                    unit_id = unit.id,
                    unit = %unit.name,
                    uuid = ?span.uuid,
                    start = %span.start,
                    end = %span.end,
                    "reservation ends before it starts; it will never block a date"
                );
            }
        }
        Self { units }
    }

    /// The three rooms and reservations shown on the public booking page.
    pub fn demo() -> Self {
        let units = vec![
            demo_unit(
                1,
                "Deluxe Oda",
                1500,
                (2, 1, 35),
                &["WiFi", "Klima", "Deniz Manzarası"],
                &[("2024-03-15", "2024-03-20"), ("2024-03-25", "2024-03-30")],
            ),
            demo_unit(
                2,
                "Suit Oda",
                2500,
                (4, 2, 50),
                &["WiFi", "Klima", "Jakuzi", "Deniz Manzarası"],
                &[("2024-03-18", "2024-03-22")],
            ),
            demo_unit(
                3,
                "Aile Odası",
                3500,
                (6, 3, 70),
                &["WiFi", "Klima", "Mutfak", "Deniz Manzarası"],
                &[("2025-03-10", "2025-03-15"), ("2025-03-20", "2025-03-25")],
            ),
        ];
        Self::from_units(units.into_iter().flatten().collect())
    }

    pub fn units(&self) -> &[BookableUnit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&BookableUnit> {
        self.units.iter().find(|unit| unit.id == id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

fn demo_unit(
    id: UnitId,
    name: &str,
    price: u64,
    (capacity, beds, size): (u32, u32, u32),
    features: &[&str],
    stays: &[(&str, &str)],
) -> Option<BookableUnit> {
    let mut unit = BookableUnit::new(id, name, NonZeroU64::new(price)?);
    unit.capacity = Some(capacity);
    unit.beds = Some(beds);
    unit.size_m2 = Some(size);
    unit.features = features.iter().map(|f| f.to_string()).collect();
    for (start, end) in stays {
        unit = unit.with_reservation(start.parse().ok()?, end.parse().ok()?);
    }
    Some(unit)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn demo_catalog_has_three_rooms() {
        let catalog = Catalog::demo();
        assert_eq!(catalog.len(), 3);
        let suite = catalog.unit(2).expect("suite present");
        assert_eq!(suite.name, "Suit Oda");
        assert_eq!(suite.reservations.len(), 1);
        assert_eq!(suite.capacity, Some(4));
    }

    #[test]
    fn loads_and_joins_reservations() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("catalog.json");
        fs::write(
            &path,
            r#"{
              "rooms": [
                {"id": 101, "name": "Standart", "price": 500},
                {"id": 102, "name": "Deluxe", "price": 800, "features": ["TV"]}
              ],
              "reservations": [
                {"room_id": 101, "guest_name": "A", "check_in": "2024-03-20", "check_out": "2024-03-25"},
                {"room_id": 102, "check_in": "2024-03-22", "check_out": "2024-03-24", "status": "pending"},
                {"room_id": 102, "check_in": "2024-03-01", "check_out": "2024-03-02", "status": "cancelled"},
                {"room_id": 999, "check_in": "2024-03-01", "check_out": "2024-03-02"}
              ]
            }"#,
        )
        .expect("write catalog");

        let catalog = Catalog::load(&path).expect("load catalog");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.unit(101).expect("room").reservations.len(), 1);

        let deluxe = catalog.unit(102).expect("room");
        assert_eq!(deluxe.reservations.len(), 1);
        assert_eq!(deluxe.reservations[0].start.to_string(), "2024-03-22");
        assert_eq!(deluxe.features, vec!["TV".to_string()]);
    }

    #[test]
    fn rejects_duplicate_room_ids() {
        let rooms = vec![
            RoomRecord {
                id: 1,
                name: "a".into(),
                price: NonZeroU64::new(10).expect("positive"),
                capacity: None,
                beds: None,
                size: None,
                features: vec![],
            };
            2
        ];
        assert!(Catalog::from_records(rooms, vec![]).is_err());
    }

    #[test]
    fn rejects_zero_price_and_bad_dates() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("catalog.json");

        fs::write(&path, r#"{"rooms": [{"id": 1, "name": "x", "price": 0}]}"#).expect("write");
        assert!(Catalog::load(&path).is_err());

        fs::write(
            &path,
            r#"{"rooms": [{"id": 1, "name": "x", "price": 5}],
                "reservations": [{"room_id": 1, "check_in": "20.03.2024", "check_out": "2024-03-21"}]}"#,
        )
        .expect("write");
        assert!(Catalog::load(&path).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_demo() {
        let temp = tempdir().expect("tempdir");
        let catalog =
            Catalog::load_or_demo(&temp.path().join("absent.json")).expect("fallback");
        assert_eq!(catalog, Catalog::demo());
    }
}
