use std::{
    collections::HashMap,
    fmt::Display,
    ops::{Deref, DerefMut},
    sync::OnceLock,
};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{
    bf2cc,
    chat::ChatMessage,
    game::{self, GameState},
    players::{Player, Players},
};

pub const VIP_MARKER: &str = "[VIP]";
const DEFAULT_INFO: &str = "$PN$ Class:$PC$ Lvl:$PL$ Ping:$PING$ $VIP$";

/// Where the output of an alias goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Server wide chat.
    Public,
    /// Whispered to whoever used it.
    Private,
    /// Run as a raw server command.
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// Power needed to use the alias, 0 for everyone.
    #[serde(default)]
    pub power: i32,
    pub visibility: Visibility,
    #[serde(default)]
    pub message: String,
}

impl Alias {
    #[must_use]
    pub fn new(power: i32, visibility: Visibility, message: &str) -> Self {
        Self {
            power,
            visibility,
            message: message.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub power: i32,
    pub name: String,
}

/// Chat commands, keyed by the word that triggers them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aliases(HashMap<String, Alias>);

impl Aliases {
    /// The alias set used when none could be loaded.
    #[must_use]
    pub fn builtin() -> Self {
        use Visibility::{Private, Public, Server};

        let aliases = [
            ("say", Alias::new(100, Server, "bf2cc sendserverchat")),
            ("self", Alias::new(0, Private, "$PN$ $PT$ $PL$ $PTN$ enemy: $ET$")),
            ("test", Alias::new(100, Private, "testing successful")),
            ("kick", Alias::new(100, Server, "kick")),
            ("ban", Alias::new(100, Server, "ban")),
            ("promote", Alias::new(100, Server, "")),
            ("demote", Alias::new(100, Server, "")),
            ("info", Alias::new(100, Server, DEFAULT_INFO)),
            ("testkick", Alias::new(100, Server, "")),
            ("testban", Alias::new(100, Server, "")),
            ("reload", Alias::new(100, Server, "")),
            ("save", Alias::new(100, Server, "")),
            ("rules", Alias::new(0, Public, "Rules: Be respectful. Help your team. No cheating, no whining, no badmouthing, no idling, no t-bagging, no soliciting.")),
            ("toot", Alias::new(0, Public, "$PN$ bites their lip and toots out the word *$PT$*")),
            ("tacos", Alias::new(0, Public, "We only use the finest cuts of $ET$ found on the battlefield. These delicious tacos are for the $PT$ by the $PT$!")),
            ("pizza", Alias::new(0, Public, "Only the freshest cuts of $ET$ meat go into our fine $PT$ deep dish pizzas!")),
            ("beer", Alias::new(0, Public, "$PT$ have some tasty pale ale, but the $ET$ are using them for target practice.")),
            ("bacon", Alias::new(0, Public, "Thinly sliced $ET$ make the best bacon. Try it for yourself!")),
            ("cake", Alias::new(0, Public, "The $PT$ have ordered a cake for the $ET$! Filled with explosives.")),
            ("rawr", Alias::new(0, Public, "$PN$ howls out a thunderous battle cry.")),
            ("panic", Alias::new(0, Public, "$PN$ panics and starts screaming hysterically.")),
            ("rage", Alias::new(0, Public, "$PN$ gets mad and starts screaming like a maniac.")),
            ("meow", Alias::new(0, Public, "$PN$ lets out a scrappy alley cat meow.")),
            ("complaint", Alias::new(0, Public, "$PN$ says *here's the complaint department* and points to the exit.")),
        ];

        Self(
            aliases
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
        )
    }
}

impl Deref for Aliases {
    type Target = HashMap<String, Alias>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Aliases {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(String, Alias)> for Aliases {
    fn from_iter<I: IntoIterator<Item = (String, Alias)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Admin powers, keyed by nucleus id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Admins(HashMap<String, Admin>);

impl Admins {
    /// The admin table used when none could be loaded.
    #[must_use]
    pub fn builtin() -> Self {
        [(
            "2318009192".to_owned(),
            Admin {
                power: 100,
                name: "Vegabruda".to_owned(),
            },
        )]
        .into_iter()
        .collect()
    }

    /// Power of an account, 0 for anyone without an entry.
    #[must_use]
    pub fn power_of(&self, nucleus: &str) -> i32 {
        self.0.get(nucleus).map_or(0, |a| a.power)
    }
}

impl Deref for Admins {
    type Target = HashMap<String, Admin>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Admins {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(String, Admin)> for Admins {
    fn from_iter<I: IntoIterator<Item = (String, Admin)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What the monitor should do as the result of a chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Enqueue a command line.
    Command(String),
    ReloadAliases,
    SaveAliases,
}

/// Commands with behaviour of their own. Their alias entry only provides the
/// required power (and the template, for `info`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Promote,
    Demote,
    Info,
    TestKick,
    TestBan,
    Reload,
    Save,
}

impl Builtin {
    fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "promote" => Self::Promote,
            "demote" => Self::Demote,
            "info" => Self::Info,
            "testkick" => Self::TestKick,
            "testban" => Self::TestBan,
            "reload" => Self::Reload,
            "save" => Self::Save,
            _ => return None,
        })
    }
}

impl Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("{self:?}").to_lowercase())
    }
}

fn reply(pid: usize, text: &str) -> Action {
    Action::Command(bf2cc::whisper(pid, text))
}

/// Interprets chat commands against the current tables and game state.
pub struct CommandInterpreter<'a> {
    aliases: &'a Aliases,
    admins: &'a Admins,
    players: &'a Players,
    game: &'a GameState,
}

impl<'a> CommandInterpreter<'a> {
    #[must_use]
    pub const fn new(
        aliases: &'a Aliases,
        admins: &'a Admins,
        players: &'a Players,
        game: &'a GameState,
    ) -> Self {
        Self {
            aliases,
            admins,
            players,
            game,
        }
    }

    /// Unknown and unpermitted commands produce nothing.
    #[must_use]
    pub fn handle(&self, message: &ChatMessage) -> Vec<Action> {
        let (Some(pid), Some(line)) = (message.pid, message.command.as_deref()) else {
            return Vec::new();
        };
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Vec::new();
        };
        let args: Vec<&str> = words.collect();

        let Some(alias) = self.aliases.get(keyword) else {
            tracing::debug!("{} used unknown command {keyword:?}", message.origin);
            return Vec::new();
        };
        if !self.permitted(pid, alias) {
            tracing::info!("{} lacks the power to use {keyword:?}", message.origin);
            return Vec::new();
        }

        match Builtin::from_keyword(keyword) {
            Some(Builtin::Reload) => vec![Action::ReloadAliases],
            Some(Builtin::Save) => vec![Action::SaveAliases],
            Some(builtin) => self.lookup(builtin, alias, pid, &args),
            None => self.templated(alias, pid, &args).into_iter().collect(),
        }
    }

    /// Power of whoever is in the slot.
    #[must_use]
    pub fn power(&self, pid: usize) -> i32 {
        self.players
            .get(pid)
            .map_or(0, |p| self.admins.power_of(&p.nucleus))
    }

    fn permitted(&self, pid: usize, alias: &Alias) -> bool {
        alias.power == 0 || self.power(pid) >= alias.power
    }

    fn templated(&self, alias: &Alias, pid: usize, args: &[&str]) -> Option<Action> {
        let args = args.join(" ");
        let text = match (alias.message.is_empty(), args.is_empty()) {
            (_, true) => alias.message.clone(),
            (true, false) => args,
            (false, false) => format!("{} {args}", alias.message),
        };

        let text = substitute_tags(&text, self.players.get(pid), self.game);
        if text.is_empty() {
            return None;
        }

        Some(Action::Command(match alias.visibility {
            Visibility::Public => bf2cc::broadcast(&text),
            Visibility::Private => bf2cc::whisper(pid, &text),
            Visibility::Server => text,
        }))
    }

    fn lookup(&self, builtin: Builtin, alias: &Alias, pid: usize, args: &[&str]) -> Vec<Action> {
        let Some(term) = args.first() else {
            return vec![reply(pid, &format!("usage: {builtin} <player>"))];
        };

        match self.players.find(term).as_slice() {
            [] => vec![reply(pid, &format!("player not found ('{term}')"))],
            [slot] => self.apply(builtin, alias, pid, *slot),
            _ => vec![reply(pid, &format!("multiple players found ('{term}')"))],
        }
    }

    fn apply(&self, builtin: Builtin, alias: &Alias, pid: usize, slot: usize) -> Vec<Action> {
        let Some(target) = self.players.get(slot) else {
            return Vec::new();
        };

        match builtin {
            Builtin::Promote => vec![
                Action::Command(bf2cc::set_vip(&target.nucleus, true)),
                reply(pid, &format!("{} promoted to VIP", target.name)),
            ],
            Builtin::Demote => vec![
                Action::Command(bf2cc::set_vip(&target.nucleus, false)),
                reply(pid, &format!("{} demoted from VIP", target.name)),
            ],
            Builtin::Info => {
                let template = if alias.message.is_empty() {
                    DEFAULT_INFO
                } else {
                    alias.message.as_str()
                };
                vec![reply(pid, &substitute_tags(template, Some(target), self.game))]
            }
            Builtin::TestKick => vec![reply(
                pid,
                &format!("Pretending to kick {} ({})", target.name, bf2cc::kick(slot)),
            )],
            Builtin::TestBan => vec![reply(
                pid,
                &format!("Pretending to ban {} ({})", target.name, bf2cc::ban(slot)),
            )],
            Builtin::Reload | Builtin::Save => Vec::new(),
        }
    }
}

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"\$([A-Z]+)\$").expect("Bad tag pattern"))
}

/// Replaces `$TAG$` tokens with details of `player` and the game. Unknown
/// tags, and every tag when there is no player, are left as they are.
#[must_use]
pub fn substitute_tags(text: &str, player: Option<&Player>, game: &GameState) -> String {
    tag_pattern()
        .replace_all(text, |caps: &Captures| {
            tag_value(&caps[1], player, game).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}

fn tag_value(tag: &str, player: Option<&Player>, game: &GameState) -> Option<String> {
    let player = player?;

    Some(match tag {
        "PN" => player.name.clone(),
        "PL" => player.level.to_string(),
        "PT" => game::team_label(&player.team).to_owned(),
        "PC" => player.kit.clone(),
        "ET" => game::opposing_team(&player.team)
            .map(game::team_label)
            .unwrap_or_default()
            .to_owned(),
        "PTN" => game
            .opposing_size(&player.team)
            .map(|size| size.to_string())
            .unwrap_or_default(),
        "VIP" if player.vip => VIP_MARKER.to_owned(),
        "VIP" => String::new(),
        "PING" => player.ping.to_string(),
        _ => return None,
    })
}
