use std::{fs::File, io::Read, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

/// Identifies a wireless client, usually by its MAC address. The value is used as-is and is not
/// normalized.
pub type ClientId = String;

/// The last time a client was seen by the capture tool. Only compared for equality.
pub type LastSeen = String;

/// The first field of the row that starts the client section of an airodump-ng CSV export.
const CLIENT_HEADER: &str = "Station MAC";

/// Index of the "Last time seen" column in the client section.
const LAST_SEEN_FIELD: usize = 2;

/// The clients observed in a single capture cycle, mapped to the last time they were seen.
///
/// Clients keep the order in which they first appear in the capture export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    clients: IndexMap<ClientId, LastSeen>,
}

impl Snapshot {
    /// Reads the client section of a capture export file.
    pub fn read(p: impl AsRef<Path>) -> Result<Self, Error> {
        let path = p.as_ref();
        let file = File::open(path).map_err(|source| Error::OpenSnapshot {
            path: path.to_owned(),
            source,
        })?;

        let snapshot = Self::from_reader(file).map_err(|source| Error::ParseSnapshot {
            path: path.to_owned(),
            source,
        })?;
        debug!(
            path = %path.display(),
            clients = snapshot.len(),
            "Read capture export: {snapshot:?}"
        );

        Ok(snapshot)
    }

    /// Parses the client section of a capture export.
    ///
    /// Everything up to and including the `Station MAC` header row is ignored. Client rows that
    /// are too short to contain a last seen time are skipped. If the header is never found, the
    /// snapshot is empty.
    pub fn from_reader(reader: impl Read) -> Result<Self, csv::Error> {
        // airodump-ng never quotes fields, while probed ESSIDs may contain any character.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut in_clients = false;
        let mut clients = IndexMap::new();
        for record in reader.byte_records() {
            let record = record?;
            if record.is_empty() {
                continue;
            }

            if &record[0] == CLIENT_HEADER.as_bytes() {
                in_clients = true;
                continue;
            }
            if !in_clients {
                continue;
            }

            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            let Some(last_seen) = record.get(LAST_SEEN_FIELD) else {
                warn!(
                    line,
                    fields = record.len(),
                    "Skipping client row without a last seen time"
                );
                continue;
            };

            // Probed ESSIDs can contain any bytes, so the fields are not required to be UTF-8.
            let id = String::from_utf8_lossy(&record[0]).trim().to_string();
            if id.is_empty() {
                warn!(line, "Skipping client row without an identifier");
                continue;
            }
            let last_seen = String::from_utf8_lossy(last_seen).trim().to_string();

            clients.insert(id, last_seen);
        }

        if !in_clients {
            debug!("Capture export has no client section");
        }

        Ok(Self { clients })
    }

    /// Get the last seen time of a client.
    pub fn get(&self, id: impl AsRef<str>) -> Option<&LastSeen> {
        self.clients.get(id.as_ref())
    }

    /// Iterate over all clients in the order they were observed.
    pub fn iter(&self) -> impl Iterator<Item = (&ClientId, &LastSeen)> {
        self.clients.iter()
    }

    /// Iterate over the identifiers of all clients in the order they were observed.
    pub fn ids(&self) -> impl Iterator<Item = &ClientId> {
        self.clients.keys()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Snapshot
where
    K: Into<ClientId>,
    V: Into<LastSeen>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            clients: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
