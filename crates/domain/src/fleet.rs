//! Built-in device fleet used when the configuration declares none.

use crate::device::{Attributes, Device, DeviceStatus};
use crate::id::DeviceId;

struct Seed {
    id: &'static str,
    name: &'static str,
    room: &'static str,
    status: DeviceStatus,
    attributes: Attributes,
    power_watts: u32,
}

const SEEDS: [Seed; 10] = [
    Seed {
        id: "1",
        name: "Living Room Lights",
        room: "Living Room",
        status: DeviceStatus::On,
        attributes: Attributes::Light { brightness: 80 },
        power_watts: 12,
    },
    Seed {
        id: "2",
        name: "Main AC",
        room: "Living Room",
        status: DeviceStatus::On,
        attributes: Attributes::Ac { temperature: 24 },
        power_watts: 1500,
    },
    Seed {
        id: "3",
        name: "Bedroom Fan",
        room: "Master Bedroom",
        status: DeviceStatus::On,
        attributes: Attributes::Fan { speed: 3 },
        power_watts: 75,
    },
    Seed {
        id: "4",
        name: "Kitchen Lights",
        room: "Kitchen",
        status: DeviceStatus::Off,
        attributes: Attributes::Light { brightness: 100 },
        power_watts: 8,
    },
    Seed {
        id: "5",
        name: "Bedroom AC",
        room: "Master Bedroom",
        status: DeviceStatus::Off,
        attributes: Attributes::Ac { temperature: 25 },
        power_watts: 1200,
    },
    Seed {
        id: "6",
        name: "Security Camera",
        room: "Front Door",
        status: DeviceStatus::On,
        attributes: Attributes::Camera,
        power_watts: 5,
    },
    Seed {
        id: "7",
        name: "Smart Lock",
        room: "Main Door",
        status: DeviceStatus::On,
        attributes: Attributes::Lock { locked: true },
        power_watts: 2,
    },
    Seed {
        id: "8",
        name: "Dining Light",
        room: "Dining Room",
        status: DeviceStatus::On,
        attributes: Attributes::Light { brightness: 60 },
        power_watts: 10,
    },
    Seed {
        id: "9",
        name: "Study Room Fan",
        room: "Study Room",
        status: DeviceStatus::Off,
        attributes: Attributes::Fan { speed: 2 },
        power_watts: 60,
    },
    Seed {
        id: "10",
        name: "Garden Lights",
        room: "Garden",
        status: DeviceStatus::Offline,
        attributes: Attributes::Light { brightness: 100 },
        power_watts: 15,
    },
];

/// The ten-device demo household.
#[must_use]
pub fn default_fleet() -> Vec<Device> {
    SEEDS
        .iter()
        .filter_map(|seed| {
            let id = DeviceId::new(seed.id).ok()?;
            Some(Device {
                id,
                name: seed.name.to_string(),
                room: seed.room.to_string(),
                status: seed.status,
                attributes: seed.attributes,
                power_watts: Some(seed.power_watts),
                last_seen: None,
            })
        })
        .collect()
}
