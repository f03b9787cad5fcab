//! Room catalog model.
//!
//! Rooms are not persisted entities — a room is a normalized string key that
//! partitions messages and socket membership. The catalog exists purely for
//! client discovery; any other string still names a valid room.

use serde::{Deserialize, Serialize};

/// A discussable room advertised to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Catalog response shape: `{ "rooms": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCatalog {
    pub rooms: Vec<RoomInfo>,
}

/// The built-in rooms every deployment starts with.
pub fn default_catalog() -> Vec<RoomInfo> {
    vec![
        RoomInfo {
            id: "commons".into(),
            name: "Commons".into(),
            description: "General discussion for everyone".into(),
        },
        RoomInfo {
            id: "placements".into(),
            name: "Placements".into(),
            description: "Internships, interviews, and placement prep".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_the_two_builtin_rooms() {
        let rooms = default_catalog();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].id, "commons");
        assert_eq!(rooms[1].id, "placements");
    }
}
