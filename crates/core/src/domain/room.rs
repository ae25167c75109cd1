use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub i64);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Maintenance => "maintenance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "available" => Some(Self::Available),
            "occupied" => Some(Self::Occupied),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }

    /// Status as reported to callers: a room at rest as `Available` reads as
    /// `Occupied` while a reservation window contains the current instant.
    pub fn effective(self, occupied_now: bool) -> Self {
        match self {
            Self::Available if occupied_now => Self::Occupied,
            other => other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    pub location: String,
    pub equipment: String,
    pub status: RoomStatus,
}

impl Room {
    /// Case-insensitive containment check against the free-text equipment list.
    pub fn has_equipment(&self, token: &str) -> bool {
        self.equipment.to_lowercase().contains(&token.to_lowercase())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatistics {
    pub total_rooms: u32,
    pub active_rooms: u32,
    pub inactive_rooms: u32,
}

#[cfg(test)]
mod tests {
    use super::{Room, RoomId, RoomStatus};

    #[test]
    fn available_room_reads_occupied_while_in_use() {
        assert_eq!(RoomStatus::Available.effective(true), RoomStatus::Occupied);
        assert_eq!(RoomStatus::Available.effective(false), RoomStatus::Available);
        assert_eq!(RoomStatus::Maintenance.effective(true), RoomStatus::Maintenance);
    }

    #[test]
    fn status_parse_accepts_stored_labels() {
        for status in [RoomStatus::Available, RoomStatus::Occupied, RoomStatus::Maintenance] {
            assert_eq!(RoomStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RoomStatus::parse("closed"), None);
    }

    #[test]
    fn equipment_match_ignores_case() {
        let room = Room {
            id: RoomId(1),
            name: "회의실 A".to_string(),
            capacity: 8,
            location: "2층".to_string(),
            equipment: "TV, 화이트보드, Projector".to_string(),
            status: RoomStatus::Available,
        };

        assert!(room.has_equipment("tv"));
        assert!(room.has_equipment("PROJECTOR"));
        assert!(!room.has_equipment("화상회의"));
    }
}
