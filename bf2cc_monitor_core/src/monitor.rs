use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::{
    bf2cc,
    chat::{parse_chat, ChatMessage},
    commands::{Action, Admins, Aliases, CommandInterpreter},
    game::GameState,
    log_hub::LogHub,
    players::{format_playtime, PlayerEvent, Players},
    rcon::{CommandQueue, Rcon, RconError},
    response::ResponseKind,
    settings::Settings,
    store,
};

pub const PLAYERS_FILE_NAME: &str = "players.json";
pub const GAME_FILE_NAME: &str = "game.json";
pub const ADMINS_FILE_NAME: &str = "admins.json";
pub const ALIASES_FILE_NAME: &str = "aliases.json";

/// Where the monitor keeps its tables and snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFiles {
    pub players: PathBuf,
    pub game: PathBuf,
    pub admins: PathBuf,
    pub aliases: PathBuf,
}

impl DataFiles {
    #[must_use]
    pub fn in_directory(dir: &Path) -> Self {
        Self {
            players: dir.join(PLAYERS_FILE_NAME),
            game: dir.join(GAME_FILE_NAME),
            admins: dir.join(ADMINS_FILE_NAME),
            aliases: dir.join(ALIASES_FILE_NAME),
        }
    }
}

/// Owns everything learnt about the server and reacts to its responses.
pub struct Monitor {
    pub players: Players,
    pub game: GameState,
    pub aliases: Aliases,
    pub admins: Admins,
    files: DataFiles,
    hub: LogHub,
}

impl Monitor {
    /// A monitor with empty state and the built-in tables. Nothing is read.
    #[must_use]
    pub fn new(files: DataFiles, hub: LogHub) -> Self {
        Self {
            players: Players::new(),
            game: GameState::default(),
            aliases: Aliases::builtin(),
            admins: Admins::builtin(),
            files,
            hub,
        }
    }

    /// Loads the admin and alias tables (seeding the built-in ones when
    /// missing) and hydrates state from the last snapshots.
    #[must_use]
    pub fn load(files: DataFiles, hub: LogHub) -> Self {
        let mut monitor = Self::new(files, hub);
        monitor.reload_tables();
        monitor.players = store::load_or_default(&monitor.files.players);
        monitor.game = store::load_or_default(&monitor.files.game);
        monitor
    }

    #[must_use]
    pub const fn files(&self) -> &DataFiles {
        &self.files
    }

    #[must_use]
    pub const fn hub(&self) -> &LogHub {
        &self.hub
    }

    fn reload_tables(&mut self) {
        self.admins = store::load_or_seed(&self.files.admins, Admins::builtin);
        self.aliases = store::load_or_seed(&self.files.aliases, Aliases::builtin);
        tracing::info!(
            "Loaded {} admins and {} aliases",
            self.admins.len(),
            self.aliases.len()
        );
    }

    fn save_tables(&self) {
        store::save_ok(&self.files.admins, &self.admins);
        store::save_ok(&self.files.aliases, &self.aliases);
    }

    /// Writes the player and game snapshots.
    pub fn save_ok(&self) {
        store::save_ok(&self.files.players, &self.players);
        store::save_ok(&self.files.game, &self.game);
    }

    /// Logs a line and pushes it to the hub.
    pub fn announce(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!("{line}");
        self.hub.log(line);
    }

    /// Routes a response to whatever it updates. Returns the commands to send
    /// in reaction.
    pub fn handle_response(&mut self, response: &str) -> Vec<String> {
        match ResponseKind::identify(response) {
            ResponseKind::ServerInfo => {
                self.handle_server_info(response);
                Vec::new()
            }
            ResponseKind::Players => {
                let events = self.players.ingest(response);
                self.report(&events);
                store::save_ok(&self.files.players, &self.players);
                Vec::new()
            }
            ResponseKind::Chat => self.handle_chat(response),
            kind => {
                tracing::debug!("Ignoring {kind:?} response: {response:?}");
                Vec::new()
            }
        }
    }

    fn handle_server_info(&mut self, response: &str) {
        let previous_players = self.game.players;
        if !self.game.update(response) {
            return;
        }
        store::save_ok(&self.files.game, &self.game);

        // The player list comes back empty once everyone has gone, and empty
        // responses are never routed, so the table is cleared from here.
        if previous_players > 0 && self.game.players == 0 {
            tracing::debug!("Server emptied, clearing player table");
            let events = self.players.ingest("");
            self.report(&events);
            store::save_ok(&self.files.players, &self.players);
        }
    }

    fn report(&self, events: &[PlayerEvent]) {
        for event in events {
            match event {
                PlayerEvent::Connection { state, .. } if state.is_steady() => {}
                PlayerEvent::Connection {
                    slot,
                    name,
                    state,
                    playtime: Some(playtime),
                } => self.announce(format!(
                    "[{slot}] {name} {state} after {}",
                    format_playtime(*playtime)
                )),
                PlayerEvent::Connection {
                    slot, name, state, ..
                } => self.announce(format!("[{slot}] {name} {state}")),
                PlayerEvent::Status { slot, name, status } => {
                    tracing::debug!("[{slot}] {name} {status}");
                    self.hub.log(format!("[{slot}] {name} {status}"));
                }
            }
        }
    }

    fn handle_chat(&mut self, response: &str) -> Vec<String> {
        let mut commands = Vec::new();

        for message in parse_chat(response) {
            self.announce(format!(
                "{}[{}]: {}",
                message.origin, message.time, message.text
            ));
            if !message.is_command() {
                continue;
            }

            for action in self.interpret(&message) {
                match action {
                    Action::Command(command) => commands.push(command),
                    Action::ReloadAliases => {
                        self.reload_tables();
                        self.announce(format!("{} reloaded the alias tables", message.origin));
                    }
                    Action::SaveAliases => {
                        self.save_tables();
                        self.announce(format!("{} saved the alias tables", message.origin));
                    }
                }
            }
        }

        commands
    }

    fn interpret(&self, message: &ChatMessage) -> Vec<Action> {
        CommandInterpreter::new(&self.aliases, &self.admins, &self.players, &self.game)
            .handle(message)
    }

    /// Drives an authenticated session until it fails: starts the queue,
    /// turns on monitor mode and polls the server every `poll_interval`.
    ///
    /// # Errors
    /// * `NotReady` if the session isn't authenticated
    /// * `Failed` once the session has failed
    pub async fn run(&mut self, rcon: Rcon, poll_interval: Duration) -> Result<(), RconError> {
        let address = rcon.address().to_owned();
        let (queue, mut consumer) = CommandQueue::new();
        let mut responses = consumer.responses();
        let mut consumer = AbortOnDrop(tokio::spawn(consumer.run(rcon)));

        if let Err(e) = queue.enqueue(bf2cc::monitor_mode(true)) {
            tracing::error!("Couldn't enable monitor mode: {e}");
        }
        let _poller = AbortOnDrop(poll_on_timer(queue.clone(), poll_interval));
        self.announce(format!(
            "Monitoring {address} since {}",
            Utc::now().format("%F %T")
        ));

        let result = loop {
            tokio::select! {
                finished = &mut consumer.0 => {
                    break finished.unwrap_or_else(|e| {
                        tracing::error!("Command queue panicked: {e}");
                        Err(RconError::Failed)
                    });
                }
                Some(response) = responses.recv() => {
                    for command in self.handle_response(&response) {
                        if let Err(e) = queue.enqueue(command) {
                            tracing::error!("Couldn't queue command: {e}");
                        }
                    }
                }
            }
        };

        self.save_ok();
        result
    }
}

/// Aborts the task when dropped, so nothing outlives a cancelled
/// [`Monitor::run`].
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Enqueues the poll commands every `interval` until the queue closes.
pub fn poll_on_timer(queue: CommandQueue, interval: Duration) -> JoinHandle<()> {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tokio::task::spawn(async move {
        loop {
            interval.tick().await;
            for command in bf2cc::POLL_COMMANDS {
                if queue.enqueue(command).is_err() {
                    tracing::error!("Couldn't queue poll commands. Exiting poll loop.");
                    return;
                }
            }
        }
    })
}

/// Connects and logs in with the configured credentials.
///
/// # Errors
/// * `Connect` if the server couldn't be reached
/// * `Protocol` if it didn't greet properly
/// * `Auth` if logging in failed
pub async fn open_session(settings: &Settings) -> Result<Rcon, RconError> {
    let mut rcon = Rcon::new(settings.address.clone());
    if let Some(wait) = settings.reconnect_wait() {
        rcon.auto_reconnect(wait);
    }

    rcon.connect().await?;
    rcon.authenticate(&settings.rcon_password, Some(&settings.admin_name))
        .await?;
    Ok(rcon)
}
