use crate::domain::{
    AddressRecord, DeviceRecord, DomainError, DomainResult, IdentityRecord, IdentityStore,
    RowId, StoreTransaction, UserRecord,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::types::ToSql;
use tokio_postgres::Statement;
use tracing::{debug, error};

const USER_GET: &str = "SELECT id FROM users WHERE uid = $1 AND username = $2 AND full_name = $3";
const USER_INSERT: &str =
    "INSERT INTO users (uid, username, full_name) VALUES ($1, $2, $3) RETURNING id";

const DEVICE_GET: &str =
    "SELECT id FROM devices WHERE serial = $1 AND client_identifier = $2 AND hostname = $3";
const DEVICE_INSERT: &str =
    "INSERT INTO devices (serial, client_identifier, hostname) VALUES ($1, $2, $3) RETURNING id";

const ADDRESS_GET: &str = "SELECT id FROM addresses WHERE ip = $1 AND internet_ip = $2";
const ADDRESS_INSERT: &str =
    "INSERT INTO addresses (ip, internet_ip) VALUES ($1, $2) RETURNING id";

const IDENTITY_GET: &str =
    "SELECT id FROM identities WHERE user_id = $1 AND device_id = $2 AND address_id = $3";
const IDENTITY_INSERT: &str =
    "INSERT INTO identities (user_id, device_id, address_id) VALUES ($1, $2, $3) RETURNING id";

const LOG_INSERT: &str = "INSERT INTO logs (identity_id, time) VALUES ($1, $2)";

const ROW_SAVEPOINT: &str = "SAVEPOINT pending_insert";
const ROW_RELEASE: &str = "RELEASE SAVEPOINT pending_insert";
const ROW_ROLLBACK: &str =
    "ROLLBACK TO SAVEPOINT pending_insert; RELEASE SAVEPOINT pending_insert";

/// A prepared statement kept next to the text it was prepared from
#[derive(Clone)]
pub struct PreparedQuery {
    pub sql: &'static str,
    pub statement: Statement,
}

struct WriteStatements {
    user_get: PreparedQuery,
    user_insert: PreparedQuery,
    device_get: PreparedQuery,
    device_insert: PreparedQuery,
    address_get: PreparedQuery,
    address_insert: PreparedQuery,
    identity_get: PreparedQuery,
    identity_insert: PreparedQuery,
    log_insert: PreparedQuery,
}

/// PostgreSQL implementation of the writer's store.
///
/// Holds one pooled connection for its whole life because prepared
/// statements belong to the connection that prepared them.
pub struct PostgresIdentityStore {
    client: PostgresClient,
    connection: Option<deadpool_postgres::Client>,
    statements: Option<WriteStatements>,
}

impl PostgresIdentityStore {
    pub fn new(client: PostgresClient) -> Self {
        Self {
            client,
            connection: None,
            statements: None,
        }
    }
}

async fn prepare_query(
    conn: &deadpool_postgres::Client,
    sql: &'static str,
) -> DomainResult<PreparedQuery> {
    match conn.prepare(sql).await {
        Ok(statement) => Ok(PreparedQuery { sql, statement }),
        Err(e) => {
            error!(query = sql, error = %e, "cannot create prepared statement");
            Err(DomainError::StatementPreparation {
                query: sql,
                source: e.into(),
            })
        }
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn prepare(&mut self) -> DomainResult<()> {
        self.statements = None;
        self.connection = None;

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let statements = WriteStatements {
            user_get: prepare_query(&conn, USER_GET).await?,
            user_insert: prepare_query(&conn, USER_INSERT).await?,
            device_get: prepare_query(&conn, DEVICE_GET).await?,
            device_insert: prepare_query(&conn, DEVICE_INSERT).await?,
            address_get: prepare_query(&conn, ADDRESS_GET).await?,
            address_insert: prepare_query(&conn, ADDRESS_INSERT).await?,
            identity_get: prepare_query(&conn, IDENTITY_GET).await?,
            identity_insert: prepare_query(&conn, IDENTITY_INSERT).await?,
            log_insert: prepare_query(&conn, LOG_INSERT).await?,
        };

        debug!("prepared write statements");
        self.connection = Some(conn);
        self.statements = Some(statements);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.statements.is_some()
            && self
                .connection
                .as_ref()
                .is_some_and(|conn| !conn.is_closed())
    }

    async fn begin<'a>(&'a mut self) -> DomainResult<Box<dyn StoreTransaction + 'a>> {
        let statements = self.statements.as_ref().ok_or(DomainError::NotConnected)?;
        let conn = self.connection.as_mut().ok_or(DomainError::NotConnected)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::Transaction(e.into()))?;

        Ok(Box::new(PostgresStoreTransaction { tx, statements }))
    }
}

struct PostgresStoreTransaction<'a> {
    tx: deadpool_postgres::Transaction<'a>,
    statements: &'a WriteStatements,
}

fn query_error(
    query: &PreparedQuery,
    params: &[&(dyn ToSql + Sync)],
    source: tokio_postgres::Error,
) -> DomainError {
    let arguments = format!("{:?}", params);
    error!(
        query = query.sql,
        arguments = %arguments,
        error = %source,
        "offending query"
    );
    DomainError::Query {
        query: query.sql,
        arguments,
        source: source.into(),
    }
}

impl PostgresStoreTransaction<'_> {
    /// Selects by natural key, inserting the row when the select finds nothing
    async fn get_or_insert(
        &self,
        get: &PreparedQuery,
        insert: &PreparedQuery,
        params: &[&(dyn ToSql + Sync)],
    ) -> DomainResult<RowId> {
        let existing = self
            .tx
            .query_opt(&get.statement, params)
            .await
            .map_err(|e| query_error(get, params, e))?;

        if let Some(row) = existing {
            return Ok(row.get(0));
        }

        let row = self
            .tx
            .query_one(&insert.statement, params)
            .await
            .map_err(|e| query_error(insert, params, e))?;

        Ok(row.get(0))
    }

    async fn savepoint(&self, sql: &str) -> DomainResult<()> {
        self.tx
            .batch_execute(sql)
            .await
            .map_err(|e| DomainError::Transaction(e.into()))
    }
}

#[async_trait]
impl StoreTransaction for PostgresStoreTransaction<'_> {
    async fn get_or_insert_user(&mut self, user: &UserRecord) -> DomainResult<RowId> {
        let uid = i64::from(user.uid);
        self.get_or_insert(
            &self.statements.user_get,
            &self.statements.user_insert,
            &[&uid, &user.username, &user.full_name],
        )
        .await
    }

    async fn get_or_insert_device(&mut self, device: &DeviceRecord) -> DomainResult<RowId> {
        self.get_or_insert(
            &self.statements.device_get,
            &self.statements.device_insert,
            &[&device.serial, &device.client_identifier, &device.hostname],
        )
        .await
    }

    async fn get_or_insert_address(&mut self, address: &AddressRecord) -> DomainResult<RowId> {
        self.get_or_insert(
            &self.statements.address_get,
            &self.statements.address_insert,
            &[&address.ip, &address.internet_ip],
        )
        .await
    }

    async fn get_or_insert_identity(&mut self, identity: &IdentityRecord) -> DomainResult<RowId> {
        self.get_or_insert(
            &self.statements.identity_get,
            &self.statements.identity_insert,
            &[&identity.user_id, &identity.device_id, &identity.address_id],
        )
        .await
    }

    async fn insert_log(&mut self, identity_id: RowId, time: DateTime<Utc>) -> DomainResult<()> {
        let query = &self.statements.log_insert;
        let params: &[&(dyn ToSql + Sync)] = &[&identity_id, &time];
        self.tx
            .execute(&query.statement, params)
            .await
            .map_err(|e| query_error(query, params, e))?;
        Ok(())
    }

    async fn begin_row(&mut self) -> DomainResult<()> {
        self.savepoint(ROW_SAVEPOINT).await
    }

    async fn release_row(&mut self) -> DomainResult<()> {
        self.savepoint(ROW_RELEASE).await
    }

    async fn discard_row(&mut self) -> DomainResult<()> {
        self.savepoint(ROW_ROLLBACK).await
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DomainError::Transaction(e.into()))
    }
}
