//! Shard directory
//!
//! `/ShardList/` serves the list of game shards in the INI-like plain-text
//! format the legacy launcher parses. The list lives in memory and is seeded
//! with one default shard at startup.

use parking_lot::Mutex;

/// One game shard as advertised to the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub login_server_ip: String,
    pub login_server_port: u16,
    pub lobby_server_ip: String,
    pub lobby_server_port: u16,
    pub mcots_server_ip: String,
    pub status_id: u32,
    pub status_reason: String,
    pub server_group: String,
    pub population: u32,
    pub max_personas_per_user: u32,
    pub diagnostic_server_host: String,
    pub diagnostic_server_port: u16,
}

impl ShardInfo {
    /// Serialize one shard as a launcher-format block
    fn format_block(&self) -> String {
        format!(
            "[{}]\n\
             \tDescription={}\n\
             \tShardId={}\n\
             \tLoginServerIP={}\n\
             \tLoginServerPort={}\n\
             \tLobbyServerIP={}\n\
             \tLobbyServerPort={}\n\
             \tMCOTSServerIP={}\n\
             \tStatusId={}\n\
             \tStatus_Reason={}\n\
             \tServerGroup_Name={}\n\
             \tPopulation={}\n\
             \tMaxPersonasPerUser={}\n\
             \tDiagnosticServerHost={}\n\
             \tDiagnosticServerPort={}\n",
            self.name,
            self.description,
            self.id,
            self.login_server_ip,
            self.login_server_port,
            self.lobby_server_ip,
            self.lobby_server_port,
            self.mcots_server_ip,
            self.status_id,
            self.status_reason,
            self.server_group,
            self.population,
            self.max_personas_per_user,
            self.diagnostic_server_host,
            self.diagnostic_server_port,
        )
    }
}

/// In-memory shard list behind a mutex
///
/// Reads vastly outnumber writes (writes happen at startup and from operator
/// tooling), so a plain mutex with snapshot copies is enough.
#[derive(Debug, Default)]
pub struct ShardDirectory {
    shards: Mutex<Vec<ShardInfo>>,
}

impl ShardDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded with the default shard advertised on a fresh install
    pub fn with_default_shard(public_ip: &str, login_port: u16, lobby_port: u16) -> Self {
        let directory = Self::new();
        directory.add(ShardInfo {
            id: 88,
            name: "Shard 1".to_string(),
            description: "Main shard".to_string(),
            login_server_ip: public_ip.to_string(),
            login_server_port: login_port,
            lobby_server_ip: public_ip.to_string(),
            lobby_server_port: lobby_port,
            mcots_server_ip: public_ip.to_string(),
            status_id: 0,
            status_reason: String::new(),
            server_group: "Group-1".to_string(),
            population: 100,
            max_personas_per_user: 10,
            diagnostic_server_host: public_ip.to_string(),
            diagnostic_server_port: 80,
        });
        directory
    }

    pub fn add(&self, shard: ShardInfo) {
        self.shards.lock().push(shard);
    }

    /// Snapshot copy of the current list
    pub fn list(&self) -> Vec<ShardInfo> {
        self.shards.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.shards.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.lock().is_empty()
    }

    /// Serialize the whole directory in the launcher format.
    ///
    /// Blocks are separated by blank lines; an empty directory gets a
    /// human-readable placeholder.
    pub fn format_response(&self) -> String {
        let shards = self.shards.lock();
        if shards.is_empty() {
            return "No shards available\n".to_string();
        }
        let mut out = String::new();
        for shard in shards.iter() {
            out.push_str(&shard.format_block());
            out.push_str("\n\n");
        }
        out
    }
}
