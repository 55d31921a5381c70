use serde::{Deserialize, Serialize};

use crate::response::{require_fields, MalformedRecordError};

/// Number of tab separated fields in a `bf2cc si` dump.
pub const SERVER_INFO_FIELDS: usize = 32;

pub const NATIONAL: &str = "1";
pub const ROYAL: &str = "2";

// Field indices of a `bf2cc si` dump
const PLAYERS: usize = 3;
const JOINING: usize = 4;
const MAP: usize = 5;
const NAME: usize = 7;
const NATIONAL_TICKETS: usize = 11;
const ROYAL_TICKETS: usize = 16;
const ELAPSED: usize = 18;
const REMAINING: usize = 19;
const MODE: usize = 20;
const BALANCE: usize = 24;
const RANKED: usize = 25;
const NATIONAL_SIZE: usize = 26;
const ROYAL_SIZE: usize = 27;
const ROUND: usize = 31;

/// State of the current round, as of the latest `bf2cc si` dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    pub name: String,
    pub ranked: bool,
    pub balance: bool,
    /// Display name of the map.
    pub map: String,
    pub mode: String,
    pub round: u32,
    pub players: u32,
    pub joining: u32,
    pub national_tickets: i32,
    pub national_size: u32,
    pub royal_tickets: i32,
    pub royal_size: u32,
    /// Seconds
    pub elapsed: i64,
    /// Seconds
    pub remaining: i64,
}

fn field<T: std::str::FromStr + Default>(value: &str) -> T {
    value.trim().parse().unwrap_or_default()
}

impl GameState {
    /// # Errors
    /// If the dump has fewer than [`SERVER_INFO_FIELDS`] fields
    pub fn from_dump(dump: &str) -> Result<Self, MalformedRecordError> {
        let fields: Vec<&str> = dump.trim().split('\t').collect();
        require_fields(&fields, SERVER_INFO_FIELDS)?;

        let mode = fields[MODE]
            .split_once('_')
            .map_or(fields[MODE], |(_, mode)| mode);

        Ok(Self {
            name: fields[NAME].to_owned(),
            ranked: fields[RANKED].trim() == "1",
            balance: fields[BALANCE].trim() == "1",
            map: map_display_name(fields[MAP]).to_owned(),
            mode: mode.to_uppercase(),
            round: field(fields[ROUND]),
            players: field(fields[PLAYERS]),
            joining: field(fields[JOINING]),
            national_tickets: field(fields[NATIONAL_TICKETS]),
            national_size: field(fields[NATIONAL_SIZE]),
            royal_tickets: field(fields[ROYAL_TICKETS]),
            royal_size: field(fields[ROYAL_SIZE]),
            elapsed: field(fields[ELAPSED]),
            remaining: field(fields[REMAINING]),
        })
    }

    /// Replaces the state with a fresh dump. Short dumps leave it untouched.
    /// Returns whether the state was replaced.
    pub fn update(&mut self, dump: &str) -> bool {
        match Self::from_dump(dump) {
            Ok(state) => {
                *self = state;
                true
            }
            Err(e) => {
                tracing::trace!("Ignoring server info: {e}");
                false
            }
        }
    }

    /// Roster size of the team opposing `team`.
    #[must_use]
    pub fn opposing_size(&self, team: &str) -> Option<u32> {
        match team {
            NATIONAL => Some(self.royal_size),
            ROYAL => Some(self.national_size),
            _ => None,
        }
    }
}

/// Display label of a team code. Unknown codes are passed through.
#[must_use]
pub fn team_label(team: &str) -> &str {
    match team {
        NATIONAL => "National",
        ROYAL => "Royal",
        other => other,
    }
}

#[must_use]
pub fn opposing_team(team: &str) -> Option<&'static str> {
    match team {
        NATIONAL => Some(ROYAL),
        ROYAL => Some(NATIONAL),
        _ => None,
    }
}

/// Human readable name of an internal map code. Unknown codes are passed
/// through.
#[must_use]
pub fn map_display_name(code: &str) -> &str {
    match code {
        "dependant_day" => "Inland Invasion",
        "dependant_day_night" => "Inland Invasion Night",
        "heat" => "Riverside Rush",
        "heat_snow" => "Riverside Rush Snow",
        "lake" => "Buccaneer Bay",
        "lake_night" => "Buccaneer Bay Night",
        "lake_snow" => "Buccaneer Bay Snow",
        "lunar" => "Lunar Landing",
        "mayhem" => "Sunset Showdown",
        "river" => "Fortress Frenzy",
        "royal_rumble" => "Perilous Port Night",
        "royal_rumble_day" => "Perilous Port Day",
        "royal_rumble_snow" => "Perilous Port Snow",
        "ruin" => "Midnight Mayhem",
        "ruin_day" => "Morning Mayhem",
        "ruin_snow" => "Midnight Mayhem Snow",
        "seaside_skirmish" => "Seaside Skirmish",
        "seaside_skirmish_night" => "Seaside Skirmish Night",
        "smack2" => "Coastal Clash",
        "smack2_night" => "Coastal Clash Night",
        "smack2_snow" => "Coastal Clash Snow",
        "village" => "Victory Village",
        "village_snow" => "Victory Village Snow",
        "wicked_wake" => "Wicked Wake",
        "woodlands" => "Alpine Assault",
        "woodlands_snow" => "Alpine Assault Snow",
        other => other,
    }
}
