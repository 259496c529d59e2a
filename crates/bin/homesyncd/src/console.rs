//! Line-oriented operator console read from stdin.

use homesync_app::insights::{SolarSystem, Weather, WeatherCondition};
use homesync_domain::command::{Action, CommandValue};
use homesync_domain::error::ValidationError;

pub const HELP: &str = "\
commands:
  list                              show every device
  rooms                             show devices grouped by room
  status                            show connection state
  energy                            show current consumption
  insights <weather> <temp_c> <solar_w> <capacity_w> <battery_0_to_1>
  toggle <device_id>                switch a device on or off
  <device_id> <action> <value>      e.g. `3 set_speed 4`, `1 set_state off`
  connect | disconnect
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    List,
    Rooms,
    Status,
    Energy,
    Insights { weather: Weather, solar: SolarSystem },
    Toggle(String),
    Send {
        device_id: String,
        action: Action,
        value: CommandValue,
    },
    Connect,
    Disconnect,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Action(#[from] ValidationError),

    #[error("{field} must be a number, got {value:?}")]
    Number { field: &'static str, value: String },

    #[error("unknown weather {0:?} (sunny, cloudy, rainy, stormy)")]
    Weather(String),
}

/// Parse one console line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns a [`ConsoleError`] describing what is wrong with the line.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        [] => return Ok(None),
        ["list"] => ConsoleCommand::List,
        ["rooms"] => ConsoleCommand::Rooms,
        ["status"] => ConsoleCommand::Status,
        ["energy"] => ConsoleCommand::Energy,
        ["connect"] => ConsoleCommand::Connect,
        ["disconnect"] => ConsoleCommand::Disconnect,
        ["help"] => ConsoleCommand::Help,
        ["quit" | "exit"] => ConsoleCommand::Quit,
        ["toggle", id] => ConsoleCommand::Toggle((*id).to_string()),
        ["toggle", ..] => return Err(ConsoleError::Usage("toggle <device_id>")),
        ["insights", weather, temp, generation, capacity, battery] => {
            ConsoleCommand::Insights {
                weather: Weather {
                    temperature_c: number("temp_c", temp)?,
                    condition: condition(weather)?,
                },
                solar: SolarSystem {
                    generation_watts: number("solar_w", generation)?,
                    capacity_watts: number("capacity_w", capacity)?,
                    battery_level: number("battery", battery)?,
                },
            }
        }
        ["insights", ..] => {
            return Err(ConsoleError::Usage(
                "insights <weather> <temp_c> <solar_w> <capacity_w> <battery_0_to_1>",
            ));
        }
        [id, action, value] => ConsoleCommand::Send {
            device_id: (*id).to_string(),
            action: action.parse()?,
            value: CommandValue::parse_loose(value),
        },
        _ => return Err(ConsoleError::Usage("<device_id> <action> <value>, or `help`")),
    };
    Ok(Some(command))
}

fn number(field: &'static str, raw: &str) -> Result<f64, ConsoleError> {
    raw.parse().map_err(|_| ConsoleError::Number {
        field,
        value: raw.to_string(),
    })
}

fn condition(raw: &str) -> Result<WeatherCondition, ConsoleError> {
    match raw {
        "sunny" => Ok(WeatherCondition::Sunny),
        "cloudy" => Ok(WeatherCondition::Cloudy),
        "rainy" => Ok(WeatherCondition::Rainy),
        "stormy" => Ok(WeatherCondition::Stormy),
        other => Err(ConsoleError::Weather(other.to_string())),
    }
}
