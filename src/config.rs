use std::{str::FromStr, time::Duration};

use anyhow::{Context, anyhow};

/// What happens to a connection's previous rooms when it joins another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Membership {
    /// Joins accumulate; the connection keeps receiving every room it joined.
    #[default]
    Additive,
    /// Joining a room leaves all others.
    Exclusive,
}

impl FromStr for Membership {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "additive" => Ok(Membership::Additive),
            "exclusive" => Ok(Membership::Exclusive),
            other => Err(anyhow!("unknown room membership policy {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub db_connect_timeout: Duration,
    pub history_limit: usize,
    pub membership: Membership,
    /// When set, events for other rooms are dropped.
    pub rooms: Option<Vec<String>>,
    pub session_idle: time::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_owned(),
            database_url: None,
            db_connect_timeout: Duration::from_secs(5),
            history_limit: 50,
            membership: Membership::Additive,
            rooms: None,
            session_idle: time::Duration::minutes(60),
        }
    }
}

impl Config {
    /// Reads the process environment, with `.env` loaded first when present.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let mut config = Config::default();

        if let Some(bind_addr) = lookup("BIND_ADDR") {
            config.bind_addr = bind_addr;
        }
        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        if let Some(ms) = lookup("DB_CONNECT_TIMEOUT_MS") {
            let ms: u64 = ms.parse().context("DB_CONNECT_TIMEOUT_MS must be an integer")?;
            config.db_connect_timeout = Duration::from_millis(ms);
        }
        if let Some(limit) = lookup("HISTORY_LIMIT") {
            config.history_limit = limit.parse().context("HISTORY_LIMIT must be an integer")?;
        }
        if let Some(policy) = lookup("ROOM_MEMBERSHIP") {
            config.membership = policy.parse()?;
        }
        if let Some(rooms) = lookup("CHAT_ROOMS") {
            let rooms: Vec<String> = rooms
                .split(',')
                .map(str::trim)
                .filter(|room| !room.is_empty())
                .map(str::to_owned)
                .collect();
            config.rooms = (!rooms.is_empty()).then_some(rooms);
        }
        if let Some(minutes) = lookup("SESSION_IDLE_MINUTES") {
            let minutes: i64 = minutes.parse().context("SESSION_IDLE_MINUTES must be an integer")?;
            config.session_idle = time::Duration::minutes(minutes);
        }

        Ok(config)
    }

    pub fn room_allowed(&self, room: &str) -> bool {
        match &self.rooms {
            Some(rooms) => rooms.iter().any(|r| r == room),
            None => !room.trim().is_empty(),
        }
    }
}
