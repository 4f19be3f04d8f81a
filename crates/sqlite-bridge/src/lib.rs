//! sqlite-bridge adapts database calls arriving from a host process into
//! operations against an embedded SQLite engine, and returns normalized
//! success/error result envelopes. It tracks which named databases are open
//! or closed, and nothing more: there is no pooling, planning, or SQL here.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("database not open: {name}")]
    NotOpen { name: String },
    #[error("database is not open: {name}")]
    BatchNotOpen { name: String },
    #[error("invalid request: {reason}")]
    Invalid { reason: String },
    #[error("failed to open database {name}")]
    Open {
        name: String,
        #[source]
        err: rusqlite::Error,
    },
    #[error("failed to roll back database {name} while re-opening it")]
    Rollback {
        name: String,
        #[source]
        err: rusqlite::Error,
    },
}

mod exec;
mod protocol;
mod registry;
mod service;

pub use protocol::{
    BatchRequest, CloseRequest, DeleteRequest, EchoRequest, OpenRequest, Request, Response,
    SqlStatement, StmtResult,
};
pub use registry::{Handle, Registry, Status};
pub use service::Bridge;

// Configuration of the bridge.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory under which named databases are created and opened.
    /// When unset, database names are used as connection paths verbatim.
    #[serde(default)]
    pub databases_dir: Option<std::path::PathBuf>,
}

impl Config {
    /// Map a database name into the path handed to the engine.
    pub fn database_path(&self, name: &str) -> std::path::PathBuf {
        match &self.databases_dir {
            // The :memory: name is an engine instruction, not a file path.
            Some(dir) if name != ":memory:" => dir.join(name),
            _ => std::path::PathBuf::from(name),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Config;

    #[test]
    fn test_database_path_mapping() {
        let config = Config {
            databases_dir: Some("/var/lib/bridge".into()),
        };
        assert_eq!(
            config.database_path("sensors.db"),
            std::path::PathBuf::from("/var/lib/bridge/sensors.db")
        );
        assert_eq!(
            config.database_path(":memory:"),
            std::path::PathBuf::from(":memory:")
        );

        let config = Config::default();
        assert_eq!(
            config.database_path("sensors.db"),
            std::path::PathBuf::from("sensors.db")
        );
    }
}
