use crate::domain::{DomainError, DomainResult, LastUserEntry, LastUserRepository};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

const LAST_USER_QUERY: &str = "
SELECT users.username, users.full_name, devices.serial, addresses.ip, addresses.internet_ip, logs.time
FROM (
    SELECT max(logs.id) AS id
    FROM devices
    INNER JOIN identities ON devices.id = identities.device_id
    INNER JOIN users ON users.id = identities.user_id
    INNER JOIN logs ON logs.identity_id = identities.id
    WHERE devices.serial = ANY($1)
      AND users.username NOT IN ('administrator', 'root', '')
    GROUP BY devices.serial
) AS latest
INNER JOIN logs ON latest.id = logs.id
INNER JOIN identities ON logs.identity_id = identities.id
INNER JOIN devices ON identities.device_id = devices.id
INNER JOIN users ON identities.user_id = users.id
INNER JOIN addresses ON identities.address_id = addresses.id";

/// Row shape of the last-user query
#[derive(Debug, Clone)]
struct LastUserRow {
    username: String,
    full_name: String,
    serial: String,
    ip: String,
    internet_ip: String,
    time: DateTime<Utc>,
}

impl From<LastUserRow> for LastUserEntry {
    fn from(row: LastUserRow) -> Self {
        LastUserEntry {
            username: row.username,
            full_name: row.full_name,
            serial: row.serial,
            ip: row.ip,
            internet_ip: row.internet_ip,
            time: row.time,
        }
    }
}

/// PostgreSQL implementation of LastUserRepository trait
#[derive(Clone)]
pub struct PostgresLastUserRepository {
    client: PostgresClient,
}

impl PostgresLastUserRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LastUserRepository for PostgresLastUserRepository {
    #[instrument(skip(self, serials), fields(serial_count = serials.len()))]
    async fn query_last_user(
        &self,
        serials: Vec<String>,
    ) -> DomainResult<Option<Vec<LastUserEntry>>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(LAST_USER_QUERY, &[&serials])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let row = LastUserRow {
                username: row
                    .try_get(0)
                    .map_err(|e| DomainError::RepositoryError(e.into()))?,
                full_name: row
                    .try_get(1)
                    .map_err(|e| DomainError::RepositoryError(e.into()))?,
                serial: row
                    .try_get(2)
                    .map_err(|e| DomainError::RepositoryError(e.into()))?,
                ip: row
                    .try_get(3)
                    .map_err(|e| DomainError::RepositoryError(e.into()))?,
                internet_ip: row
                    .try_get(4)
                    .map_err(|e| DomainError::RepositoryError(e.into()))?,
                time: row
                    .try_get(5)
                    .map_err(|e| DomainError::RepositoryError(e.into()))?,
            };
            entries.push(LastUserEntry::from(row));
        }

        debug!(scanned = entries.len(), "scanned last user rows");

        // Scanned rows are not returned; the lookup always answers null.
        Ok(None)
    }
}
