use crate::error::CliError;
use async_trait::async_trait;
use mysql_async::prelude::*;
use std::str::FromStr;
use tracing::{error, info};

/// What kind of connection to check
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectionKind {
    MySql,
}

impl FromStr for ConnectionKind {
    type Err = CliError;

    /// Picks the kind from the URL scheme.
    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let scheme = url.split_once("://").map(|(s, _)| s).unwrap_or_default();
        match scheme.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(ConnectionKind::MySql),
            other => Err(CliError::UnsupportedConnectionKind(other.to_string())),
        }
    }
}

/// Masks the password of `user:password@host` URLs before they are logged.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}

/// Trait for "pinging" a store
#[async_trait]
pub trait ConnectionPinger {
    /// Attempts to ping; returns Err if unreachable
    async fn ping(&self) -> Result<(), CliError>;
}

/// MySQL/MariaDB pinger
pub struct MySqlConnectionPinger {
    pub conn_str: String,
}

#[async_trait]
impl ConnectionPinger for MySqlConnectionPinger {
    async fn ping(&self) -> Result<(), CliError> {
        let target = redact_url(&self.conn_str);
        info!("Pinging MySQL at '{}'", target);

        let opts = mysql_async::Opts::from_url(&self.conn_str).map_err(|e| {
            error!("MySQL connection string parse failed: {}", e);
            CliError::MySql(mysql_async::Error::Url(e))
        })?;
        let pool = mysql_async::Pool::new(opts);
        let mut conn = pool.get_conn().await.map_err(|e| {
            error!("MySQL connection to '{}' failed: {}", target, e);
            CliError::MySql(e)
        })?;

        let val: i32 = conn
            .query_first("SELECT 1")
            .await
            .map_err(|e| {
                error!("MySQL ping query on '{}' failed: {}", target, e);
                CliError::MySql(e)
            })?
            .ok_or_else(|| {
                CliError::Unexpected(format!("MySQL ping to '{target}' returned no result"))
            })?;

        if val != 1 {
            return Err(CliError::Unexpected(format!(
                "MySQL ping to '{target}' returned unexpected result: {val}"
            )));
        }

        info!("MySQL ping to '{}' succeeded", target);
        drop(conn);
        pool.disconnect().await.ok();
        Ok(())
    }
}
