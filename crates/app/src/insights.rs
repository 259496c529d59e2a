//! Energy insights: rule-based advice derived from a registry snapshot.
//!
//! Everything here is a pure function of its inputs: the caller supplies the
//! device list, weather, solar readings and the local hour.

use std::cmp::Ordering;

use homesync_domain::device::{Device, DeviceKind, DeviceStatus};

/// Devices drawing more than this are "high power" for load balancing.
const HIGH_POWER_WATTS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Rainy,
    Stormy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weather {
    pub temperature_c: f64,
    pub condition: WeatherCondition,
}

/// Rooftop solar installation readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarSystem {
    pub capacity_watts: f64,
    pub generation_watts: f64,
    /// Battery charge, `0.0..=1.0`.
    pub battery_level: f64,
}

/// Time-of-day electricity tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TariffBand {
    /// 18:00 to 22:59.
    Peak,
    Standard,
    /// 23:00 to 05:59.
    OffPeak,
}

impl TariffBand {
    #[must_use]
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            18..=22 => Self::Peak,
            23 | 0..=5 => Self::OffPeak,
            _ => Self::Standard,
        }
    }

    /// Price per kWh.
    #[must_use]
    pub fn rate(self) -> f64 {
        match self {
            Self::Peak => 8.5,
            Self::Standard => 6.2,
            Self::OffPeak => 4.8,
        }
    }
}

/// Feed-in price per kWh exported from solar.
pub const SOLAR_FEED_IN_RATE: f64 = 3.2;

/// Current consumption at a glance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySummary {
    pub active_devices: usize,
    pub active_watts: u32,
    pub band: TariffBand,
    pub hourly_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    pub id: &'static str,
    pub title: &'static str,
    pub description: String,
    pub confidence: f64,
    pub priority: Priority,
    pub estimated_savings: u32,
}

#[must_use]
pub fn summarize(devices: &[Device], hour: u32) -> EnergySummary {
    let active: Vec<&Device> = devices
        .iter()
        .filter(|device| device.status == DeviceStatus::On)
        .collect();
    let active_watts: u32 = active.iter().filter_map(|device| device.power_watts).sum();
    let band = TariffBand::for_hour(hour);
    EnergySummary {
        active_devices: active.len(),
        active_watts,
        band,
        hourly_cost: f64::from(active_watts) / 1000.0 * band.rate(),
    }
}

/// Evaluate every rule and return the matching insights, urgent ones first,
/// then by decreasing confidence.
#[must_use]
pub fn generate(
    devices: &[Device],
    weather: &Weather,
    solar: &SolarSystem,
    hour: u32,
) -> Vec<Insight> {
    let sunny = weather.condition == WeatherCondition::Sunny;
    let mut insights = Vec::new();

    if sunny && solar.generation_watts < solar.capacity_watts * 0.7 {
        let percent = if solar.capacity_watts > 0.0 {
            (solar.generation_watts / solar.capacity_watts * 100.0).round()
        } else {
            0.0
        };
        insights.push(Insight {
            id: "solar-cleaning",
            title: "Solar panel cleaning recommended",
            description: format!(
                "Solar generation is {percent}% of capacity despite sunny weather. \
                 Cleaning the panels could raise output by 15-20%."
            ),
            confidence: 0.85,
            priority: Priority::Medium,
            estimated_savings: 150,
        });
    }

    if sunny && solar.battery_level < 0.3 && hour < 16 {
        insights.push(Insight {
            id: "battery-charging",
            title: "Optimize battery charging",
            description: "Battery is low but solar output is good. Hold off on \
                          high-power appliances to let the battery charge."
                .to_string(),
            confidence: 0.92,
            priority: Priority::High,
            estimated_savings: 200,
        });
    }

    let band = TariffBand::for_hour(hour);
    let high_power = devices
        .iter()
        .filter(|d| d.status == DeviceStatus::On && d.power_watts.unwrap_or(0) > HIGH_POWER_WATTS)
        .count();
    if band == TariffBand::Peak && high_power > 2 {
        insights.push(Insight {
            id: "peak-hour-load",
            title: "Peak hour load optimization",
            description: format!(
                "{high_power} high-power devices are running at the peak rate of {} per unit. \
                 Move non-essential appliances to off-peak hours.",
                band.rate()
            ),
            confidence: 0.88,
            priority: Priority::High,
            estimated_savings: 350,
        });
    }

    let cold_ac = devices.iter().any(|d| {
        d.kind() == DeviceKind::Ac
            && d.status == DeviceStatus::On
            && d.temperature().is_some_and(|t| t < 22)
    });
    if sunny && weather.temperature_c > 35.0 && cold_ac {
        insights.push(Insight {
            id: "summer-ac",
            title: "Summer AC optimization",
            description: "Set air conditioners to 24°C on hot days. Each degree \
                          higher saves 6-8% energy."
                .to_string(),
            confidence: 0.91,
            priority: Priority::High,
            estimated_savings: 400,
        });
    }

    let critical_on = devices
        .iter()
        .filter(|d| {
            d.status == DeviceStatus::On
                && matches!(
                    d.kind(),
                    DeviceKind::Lock | DeviceKind::Camera | DeviceKind::Sensor
                )
        })
        .count();
    if solar.battery_level < 0.4 && critical_on > 3 {
        insights.push(Insight {
            id: "power-cut-prep",
            title: "Power cut preparation",
            description: format!(
                "Battery is at {}%. Reduce non-essential usage to keep backup power \
                 for security devices.",
                (solar.battery_level * 100.0).round()
            ),
            confidence: 0.95,
            priority: Priority::Urgent,
            estimated_savings: 0,
        });
    }

    insights.sort_by(|a, b| {
        let urgent = |i: &Insight| i.priority == Priority::Urgent;
        urgent(b)
            .cmp(&urgent(a))
            .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
    });
    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use homesync_domain::device::{Attributes, DevicePatch};
    use homesync_domain::fleet::default_fleet;

    const SUNNY_HOT: Weather = Weather {
        temperature_c: 38.0,
        condition: WeatherCondition::Sunny,
    };

    const HEALTHY_SOLAR: SolarSystem = SolarSystem {
        capacity_watts: 5000.0,
        generation_watts: 4000.0,
        battery_level: 0.8,
    };

    fn ids(insights: &[Insight]) -> Vec<&'static str> {
        insights.iter().map(|i| i.id).collect()
    }

    fn device(id: &str, attributes: Attributes, watts: u32) -> Device {
        Device::builder()
            .id(id)
            .name(id)
            .status(DeviceStatus::On)
            .attributes(attributes)
            .power_watts(watts)
            .build()
            .unwrap()
    }

    #[test]
    fn should_pick_tariff_band_by_hour() {
        assert_eq!(TariffBand::for_hour(18), TariffBand::Peak);
        assert_eq!(TariffBand::for_hour(22), TariffBand::Peak);
        assert_eq!(TariffBand::for_hour(23), TariffBand::OffPeak);
        assert_eq!(TariffBand::for_hour(3), TariffBand::OffPeak);
        assert_eq!(TariffBand::for_hour(12), TariffBand::Standard);
    }

    #[test]
    fn should_sum_power_of_devices_that_are_on() {
        let summary = summarize(&default_fleet(), 12);
        // lights 1 and 8, main AC, bedroom fan, camera, lock
        assert_eq!(summary.active_devices, 6);
        assert_eq!(summary.active_watts, 12 + 1500 + 75 + 5 + 2 + 10);
        assert!((summary.hourly_cost - 1.604 * 6.2).abs() < 1e-9);
    }

    #[test]
    fn should_produce_nothing_for_a_healthy_household() {
        let weather = Weather {
            temperature_c: 25.0,
            condition: WeatherCondition::Cloudy,
        };
        assert!(generate(&default_fleet(), &weather, &HEALTHY_SOLAR, 12).is_empty());
    }

    #[test]
    fn should_recommend_cleaning_underperforming_panels() {
        let solar = SolarSystem {
            generation_watts: 2500.0,
            ..HEALTHY_SOLAR
        };
        let insights = generate(&[], &SUNNY_HOT, &solar, 12);
        assert_eq!(ids(&insights), ["solar-cleaning"]);
        assert!(insights[0].description.contains("50%"));
    }

    #[test]
    fn should_only_suggest_battery_charging_before_four_pm() {
        let solar = SolarSystem {
            battery_level: 0.2,
            ..HEALTHY_SOLAR
        };
        assert_eq!(ids(&generate(&[], &SUNNY_HOT, &solar, 10)), ["battery-charging"]);
        assert!(generate(&[], &SUNNY_HOT, &solar, 16).is_empty());
    }

    #[test]
    fn should_flag_high_power_load_at_peak() {
        let devices: Vec<Device> = (0..3)
            .map(|i| device(&format!("ac{i}"), Attributes::Ac { temperature: 24 }, 1500))
            .collect();
        let weather = Weather {
            temperature_c: 30.0,
            condition: WeatherCondition::Rainy,
        };
        assert_eq!(
            ids(&generate(&devices, &weather, &HEALTHY_SOLAR, 19)),
            ["peak-hour-load"]
        );
        assert!(generate(&devices, &weather, &HEALTHY_SOLAR, 14).is_empty());
    }

    #[test]
    fn should_flag_cold_ac_on_hot_days() {
        let mut fleet = default_fleet();
        let main_ac = fleet.iter_mut().find(|d| d.id == "2").unwrap();
        main_ac.apply(&DevicePatch::default().with_temperature(19));

        assert_eq!(
            ids(&generate(&fleet, &SUNNY_HOT, &HEALTHY_SOLAR, 12)),
            ["summer-ac"]
        );
    }

    #[test]
    fn should_sort_urgent_first_then_by_confidence() {
        let devices: Vec<Device> = (0..4)
            .map(|i| device(&format!("cam{i}"), Attributes::Camera, 5))
            .collect();
        let solar = SolarSystem {
            capacity_watts: 5000.0,
            generation_watts: 1000.0,
            battery_level: 0.2,
        };

        let insights = generate(&devices, &SUNNY_HOT, &solar, 10);

        assert_eq!(
            ids(&insights),
            ["power-cut-prep", "battery-charging", "solar-cleaning"]
        );
    }
}
