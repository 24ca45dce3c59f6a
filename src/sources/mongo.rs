use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use log::info;
use mongodb::{
    Client, Database,
    bson::{Bson, Document, doc},
    error::{Error as MongoError, ErrorKind},
    options::ClientOptions,
};

use crate::{error::SourceError, schema::Snapshot};

use super::adapter::StatusSource;

/// Database used when the URI does not name one.
const FALLBACK_DATABASE: &str = "admin";

/// `serverStatus` over the official MongoDB driver.
///
/// The driver keeps its own pool and reconnects on the next command,
/// so a transient failure only needs the query to be issued again.
pub struct MongoStatusSource {
    // kept alive for the lifetime of `db`
    _client: Client,
    db: Database,
    target: String,
}

impl MongoStatusSource {
    /// Builds the client. No round-trip happens until the first query.
    pub async fn connect(uri: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .with_context(|| format!("invalid mongo uri {uri}"))?;

        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let target = options
            .hosts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        info!("connecting to mongo {target}");

        let client = Client::with_options(options).context("failed to build mongo client")?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(FALLBACK_DATABASE));

        Ok(Self {
            _client: client,
            db,
            target,
        })
    }
}

#[async_trait::async_trait]
impl StatusSource for MongoStatusSource {
    fn target(&self) -> &str {
        &self.target
    }

    async fn server_status(&mut self, disabled_sections: &[String]) -> Result<Snapshot, SourceError> {
        let reply = self
            .db
            .run_command(status_command(disabled_sections))
            .await
            .map_err(classify)?;

        snapshot_from_reply(reply)
    }
}

/// Takes the server's `localTime` and renders the reply as plain JSON.
///
/// Int32, Int64 and finite Double leaves all become JSON numbers.
fn snapshot_from_reply(reply: Document) -> Result<Snapshot, SourceError> {
    let local_time = reply
        .get_datetime("localTime")
        .map_err(|e| anyhow!("serverStatus reply has no usable localTime: {e}"))?;
    let local_time = DateTime::<Utc>::from_timestamp_millis(local_time.timestamp_millis())
        .ok_or_else(|| anyhow!("serverStatus localTime out of range: {local_time}"))?;

    let document = Bson::Document(reply).into_relaxed_extjson();
    Ok(Snapshot::new(local_time, document))
}

/// `{serverStatus: 1, <section>: 0, ...}`
fn status_command(disabled_sections: &[String]) -> Document {
    let mut command = doc! { "serverStatus": 1 };
    for section in disabled_sections {
        command.insert(section.as_str(), 0);
    }
    command
}

/// Network-level failures mean the pooled connection died; the driver
/// will open a fresh one for the next attempt.
fn classify(err: MongoError) -> SourceError {
    match err.kind.as_ref() {
        ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } | ErrorKind::ServerSelection { .. } => {
            SourceError::Transient(err.to_string())
        }
        _ => SourceError::Fatal(anyhow::Error::new(err).context("serverStatus failed")),
    }
}
