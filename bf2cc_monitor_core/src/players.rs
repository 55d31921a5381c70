use std::{fmt::Display, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::response::{records, require_fields, MalformedRecordError};

/// Server imposed limit on concurrent players.
pub const MAX_PLAYERS: usize = 16;
/// Number of tab separated fields in one `bf2cc pl` record.
pub const PLAYER_FIELDS: usize = 48;
/// Level reported before a player's profile has loaded.
pub const UNSET_LEVEL: i32 = -1;

// Field indices of a `bf2cc pl` record
const PID: usize = 0;
const NAME: usize = 1;
const TEAM: usize = 2;
const PING: usize = 3;
const CONNECTED: usize = 4;
const ALIVE: usize = 8;
const PROFILE_ID: usize = 10;
const DAMAGE_ASSISTS: usize = 19;
const PASS_ASSISTS: usize = 20;
const CP_CAPTURES: usize = 25;
const CP_DEFENDS: usize = 26;
const CP_ASSISTS: usize = 27;
const NEUTRALIZES: usize = 28;
const NEUTRALIZE_ASSISTS: usize = 29;
const SUICIDES: usize = 30;
const KILLS: usize = 31;
const KIT: usize = 34;
const DEATHS: usize = 36;
const SCORE: usize = 37;
const LEVEL: usize = 39;
const IDLE: usize = 41;
const VIP: usize = 46;
const NUCLEUS: usize = 47;

/// Gameplay changes noticed between two consecutive player dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Promoted,
    Demoted,
    Leveled,
    Stopped,
    Resumed,
    Killed,
    Assisted,
    Died,
    Suicided,
    Neutralized,
    Captured,
    Defended,
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Promoted => "promoted",
            Self::Demoted => "demoted",
            Self::Leveled => "leveled",
            Self::Stopped => "stopped",
            Self::Resumed => "resumed",
            Self::Killed => "killed",
            Self::Assisted => "assisted",
            Self::Died => "died",
            Self::Suicided => "suicided",
            Self::Neutralized => "neutralized",
            Self::Captured => "captured",
            Self::Defended => "defended",
        };
        f.write_str(s)
    }
}

/// Connection state of a slot, derived from its previous and current
/// `connected` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// First seen, still loading.
    Initial,
    /// Still loading.
    Connecting,
    /// Left before finishing loading.
    Interrupted,
    /// Finished loading.
    Connected,
    /// Connected and playing.
    Established,
    /// Left after having connected.
    Disconnected,
    /// Was connected and is loading again (map change).
    Reconnecting,
}

impl ConnectionState {
    /// `None` means the slot was absent from the dump.
    #[must_use]
    pub const fn transition(previous: Option<bool>, current: Option<bool>) -> Option<Self> {
        match (previous, current) {
            (None, None) => None,
            (None, Some(false)) => Some(Self::Initial),
            (None | Some(false), Some(true)) => Some(Self::Connected),
            (Some(false), Some(false)) => Some(Self::Connecting),
            (Some(false), None) => Some(Self::Interrupted),
            (Some(true), Some(true)) => Some(Self::Established),
            (Some(true), None) => Some(Self::Disconnected),
            (Some(true), Some(false)) => Some(Self::Reconnecting),
        }
    }

    /// States that repeat every poll while nothing changes.
    #[must_use]
    pub const fn is_steady(self) -> bool {
        matches!(self, Self::Connecting | Self::Established)
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("{self:?}").to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Status {
        slot: usize,
        name: String,
        status: Status,
    },
    Connection {
        slot: usize,
        name: String,
        state: ConnectionState,
        /// Time since joining, reported on disconnect.
        playtime: Option<Duration>,
    },
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub pid: usize,
    pub name: String,
    pub profile_id: String,
    /// Persistent account id, used for admin lookups.
    pub nucleus: String,
    pub team: String,
    pub level: i32,
    pub kit: String,
    pub score: i32,
    pub kills: u32,
    pub deaths: u32,
    pub suicides: u32,
    pub alive: bool,
    pub connected: bool,
    pub vip: bool,
    pub ping: u32,
    pub idle: u32,
    pub damage_assists: u32,
    pub pass_assists: u32,
    pub cp_captures: u32,
    pub cp_defends: u32,
    pub cp_assists: u32,
    pub neutralizes: u32,
    pub neutralize_assists: u32,

    /// Status changes from the latest dump only.
    #[serde(default)]
    pub status: Vec<Status>,
    pub connection: Option<ConnectionState>,
    pub joined: Option<DateTime<Utc>>,
}

fn field<T: FromStr + Default>(value: &str) -> T {
    value.trim().parse().unwrap_or_default()
}

fn flag(value: &str) -> bool {
    value.trim() == "1"
}

impl Player {
    /// # Errors
    /// If the record has fewer than [`PLAYER_FIELDS`] fields
    pub fn from_fields(fields: &[&str]) -> Result<Self, MalformedRecordError> {
        require_fields(fields, PLAYER_FIELDS)?;

        let kit = match fields[KIT].split_once('_') {
            Some((_, kit)) if fields[KIT] != "none" => kit.to_owned(),
            _ => "none".to_owned(),
        };

        Ok(Self {
            pid: field(fields[PID]),
            name: fields[NAME].to_owned(),
            profile_id: fields[PROFILE_ID].to_owned(),
            nucleus: fields[NUCLEUS].trim().to_owned(),
            team: fields[TEAM].to_owned(),
            level: field(fields[LEVEL]),
            kit,
            score: field(fields[SCORE]),
            kills: field(fields[KILLS]),
            deaths: field(fields[DEATHS]),
            suicides: field(fields[SUICIDES]),
            alive: flag(fields[ALIVE]),
            connected: flag(fields[CONNECTED]),
            vip: flag(fields[VIP]),
            ping: field(fields[PING]),
            idle: field(fields[IDLE]),
            damage_assists: field(fields[DAMAGE_ASSISTS]),
            pass_assists: field(fields[PASS_ASSISTS]),
            cp_captures: field(fields[CP_CAPTURES]),
            cp_defends: field(fields[CP_DEFENDS]),
            cp_assists: field(fields[CP_ASSISTS]),
            neutralizes: field(fields[NEUTRALIZES]),
            neutralize_assists: field(fields[NEUTRALIZE_ASSISTS]),
            status: Vec::new(),
            connection: None,
            joined: None,
        })
    }

    /// Whether any counter of `new` went below this player's. Counters only
    /// ever grow for one occupant, so a drop means the slot was reused.
    fn counters_dropped(&self, new: &Self) -> bool {
        let counters = |p: &Self| {
            [
                p.kills,
                p.deaths,
                p.suicides,
                p.damage_assists,
                p.pass_assists,
                p.cp_captures,
                p.cp_defends,
                p.cp_assists,
                p.neutralizes,
                p.neutralize_assists,
            ]
        };
        counters(self)
            .into_iter()
            .zip(counters(new))
            .any(|(old, new)| new < old)
    }

    /// Status changes between this player's previous values and `new`.
    fn diff(&self, new: &Self) -> Vec<Status> {
        let mut status = Vec::new();

        if self.vip != new.vip {
            status.push(if new.vip {
                Status::Promoted
            } else {
                Status::Demoted
            });
        }
        if self.level != UNSET_LEVEL && new.level > self.level {
            status.push(Status::Leveled);
        }
        if self.idle == 0 && new.idle > 0 {
            status.push(Status::Stopped);
        }
        if self.idle > 0 && new.idle == 0 {
            status.push(Status::Resumed);
        }
        if new.kills > self.kills {
            status.push(if new.damage_assists > self.damage_assists {
                Status::Assisted
            } else {
                Status::Killed
            });
        }
        if new.deaths > self.deaths {
            status.push(Status::Died);
        }
        if new.suicides > self.suicides {
            status.push(Status::Suicided);
        }
        if new.neutralizes > self.neutralizes {
            status.push(Status::Neutralized);
        }
        if new.cp_captures > self.cp_captures {
            status.push(Status::Captured);
        }
        if new.cp_defends > self.cp_defends {
            status.push(Status::Defended);
        }

        status
    }

    /// Copies everything that can change during play. Identity and the join
    /// time are kept.
    fn update_from(&mut self, new: Self) {
        self.team = new.team;
        self.level = new.level;
        self.kit = new.kit;
        self.score = new.score;
        self.kills = new.kills;
        self.deaths = new.deaths;
        self.suicides = new.suicides;
        self.alive = new.alive;
        self.connected = new.connected;
        self.vip = new.vip;
        self.ping = new.ping;
        self.idle = new.idle;
        self.damage_assists = new.damage_assists;
        self.pass_assists = new.pass_assists;
        self.cp_captures = new.cp_captures;
        self.cp_defends = new.cp_defends;
        self.cp_assists = new.cp_assists;
        self.neutralizes = new.neutralizes;
        self.neutralize_assists = new.neutralize_assists;
        self.status = new.status;
    }

    #[must_use]
    pub fn playtime(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.joined
            .map(|joined| (now - joined).to_std().unwrap_or_default())
    }
}

/// Parses a `bf2cc pl` dump into a table keyed by slot id. Short records,
/// nameless records and out of range slot ids are skipped.
#[must_use]
pub fn parse_player_list(dump: &str) -> [Option<Player>; MAX_PLAYERS] {
    let mut slots: [Option<Player>; MAX_PLAYERS] = Default::default();

    for fields in records(dump) {
        let player = match Player::from_fields(&fields) {
            Ok(player) => player,
            Err(e) => {
                tracing::trace!("Skipping player record: {e}");
                continue;
            }
        };

        if player.name.is_empty() {
            continue;
        }
        match slots.get_mut(player.pid) {
            Some(slot) => *slot = Some(player),
            None => tracing::warn!("Ignoring player {} in slot {}", player.name, player.pid),
        }
    }

    slots
}

/// Fixed table of the server's player slots. A slot's index is its only
/// identity across dumps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Players {
    slots: [Option<Player>; MAX_PLAYERS],
}

impl Players {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Player> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Occupied slots with their index.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Player)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (i, p)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Case-insensitive substring search over occupied slot names.
    #[must_use]
    pub fn find(&self, term: &str) -> Vec<usize> {
        let term = term.to_lowercase();
        self.occupied()
            .filter(|(_, p)| p.name.to_lowercase().contains(&term))
            .map(|(i, _)| i)
            .collect()
    }

    /// Diffs a fresh `bf2cc pl` dump against the table, then commits it.
    pub fn ingest(&mut self, dump: &str) -> Vec<PlayerEvent> {
        self.ingest_at(dump, Utc::now())
    }

    pub(crate) fn ingest_at(&mut self, dump: &str, now: DateTime<Utc>) -> Vec<PlayerEvent> {
        let mut events = Vec::new();

        for (slot, new) in parse_player_list(dump).into_iter().enumerate() {
            let previous = self.slots[slot].take();
            self.slots[slot] = Self::track(slot, previous, new, now, &mut events);
        }

        events
    }

    fn track(
        slot: usize,
        previous: Option<Player>,
        mut new: Option<Player>,
        now: DateTime<Utc>,
        events: &mut Vec<PlayerEvent>,
    ) -> Option<Player> {
        let same_occupant = matches!(
            (&previous, &new),
            (Some(p), Some(n)) if p.name == n.name && !p.counters_dropped(n)
        );

        if let (true, Some(old), Some(new)) = (same_occupant, &previous, &mut new) {
            new.status = old.diff(new);
        }

        let state = ConnectionState::transition(
            previous.as_ref().map(|p| p.connected),
            new.as_ref().map(|p| p.connected),
        );
        if let Some(state) = state {
            let name = new
                .as_ref()
                .or(previous.as_ref())
                .map(|p| p.name.clone())
                .unwrap_or_default();
            let playtime = match state {
                ConnectionState::Disconnected => previous.as_ref().and_then(|p| p.playtime(now)),
                _ => None,
            };
            events.push(PlayerEvent::Connection {
                slot,
                name,
                state,
                playtime,
            });
        }

        if let Some(new) = &new {
            events.extend(new.status.iter().map(|&status| PlayerEvent::Status {
                slot,
                name: new.name.clone(),
                status,
            }));
        }

        let mut committed = match (previous, new) {
            (_, None) => return None,
            (Some(mut old), Some(new)) if same_occupant => {
                old.update_from(new);
                old
            }
            (_, Some(new)) => new,
        };

        committed.connection = state;
        if committed.connected && committed.joined.is_none() {
            committed.joined = Some(now);
        }
        Some(committed)
    }
}

impl FromIterator<Player> for Players {
    /// Places every player in the slot named by its `pid`.
    fn from_iter<I: IntoIterator<Item = Player>>(iter: I) -> Self {
        let mut players = Self::new();
        for player in iter {
            if let Some(slot) = players.slots.get_mut(player.pid) {
                *slot = Some(player);
            }
        }
        players
    }
}

/// Formats a play time as e.g. `1h2m3s`.
#[must_use]
pub fn format_playtime(playtime: Duration) -> String {
    let secs = playtime.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m{s}s"),
        _ => format!("{h}h{m}m{s}s"),
    }
}
