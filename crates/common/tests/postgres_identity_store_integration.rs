#![cfg(feature = "integration-tests")]

use chrono::Utc;
use common::domain::{
    AddressRecord, DeviceRecord, IdentityRecord, IdentityStore, LastUserRepository, UserRecord,
};
use common::postgres::{
    ensure_schema, PostgresClient, PostgresConfig, PostgresIdentityStore,
    PostgresLastUserRepository,
};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresClient) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 5,
    })
    .expect("Failed to create client");

    ensure_schema(&client).await.expect("Schema setup failed");

    (postgres, client)
}

async fn count_rows(client: &PostgresClient, table: &str) -> i64 {
    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one(&format!("SELECT count(*) FROM {}", table), &[])
        .await
        .unwrap();
    row.get(0)
}

fn alice() -> UserRecord {
    UserRecord {
        uid: 501,
        username: "alice".to_string(),
        full_name: "Alice A".to_string(),
    }
}

fn laptop() -> DeviceRecord {
    DeviceRecord {
        serial: "C02XYZ".to_string(),
        client_identifier: "com.example".to_string(),
        hostname: "alice-mbp".to_string(),
    }
}

fn office() -> AddressRecord {
    AddressRecord {
        ip: "10.0.0.5".to_string(),
        internet_ip: "203.0.113.7".to_string(),
    }
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let (_container, client) = setup_test_db().await;

    ensure_schema(&client).await.unwrap();

    assert_eq!(count_rows(&client, "users").await, 0);
}

#[tokio::test]
async fn test_store_ready_after_prepare() {
    let (_container, client) = setup_test_db().await;
    let mut store = PostgresIdentityStore::new(client);

    assert!(!store.is_ready());
    store.prepare().await.unwrap();
    assert!(store.is_ready());
}

#[tokio::test]
async fn test_get_or_insert_returns_existing_rows() {
    let (_container, client) = setup_test_db().await;
    let mut store = PostgresIdentityStore::new(client.clone());
    store.prepare().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let user_id = tx.get_or_insert_user(&alice()).await.unwrap();
    let device_id = tx.get_or_insert_device(&laptop()).await.unwrap();
    let address_id = tx.get_or_insert_address(&office()).await.unwrap();
    let identity = IdentityRecord {
        user_id,
        device_id,
        address_id,
    };
    let identity_id = tx.get_or_insert_identity(&identity).await.unwrap();
    tx.insert_log(identity_id, Utc::now()).await.unwrap();

    // Reads see the uncommitted rows of the same transaction
    assert_eq!(tx.get_or_insert_user(&alice()).await.unwrap(), user_id);
    assert_eq!(tx.get_or_insert_identity(&identity).await.unwrap(), identity_id);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.get_or_insert_user(&alice()).await.unwrap(), user_id);
    assert_eq!(tx.get_or_insert_device(&laptop()).await.unwrap(), device_id);
    assert_eq!(tx.get_or_insert_address(&office()).await.unwrap(), address_id);
    tx.insert_log(identity_id, Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(count_rows(&client, "users").await, 1);
    assert_eq!(count_rows(&client, "devices").await, 1);
    assert_eq!(count_rows(&client, "addresses").await, 1);
    assert_eq!(count_rows(&client, "identities").await, 1);
    assert_eq!(count_rows(&client, "logs").await, 2);
}

#[tokio::test]
async fn test_discard_row_keeps_rest_of_transaction() {
    let (_container, client) = setup_test_db().await;
    let mut store = PostgresIdentityStore::new(client.clone());
    store.prepare().await.unwrap();

    let mut tx = store.begin().await.unwrap();

    tx.begin_row().await.unwrap();
    tx.get_or_insert_user(&alice()).await.unwrap();
    tx.release_row().await.unwrap();

    tx.begin_row().await.unwrap();
    tx.get_or_insert_device(&laptop()).await.unwrap();
    // Unknown identity violates the foreign key and aborts the row
    assert!(tx.insert_log(999, Utc::now()).await.is_err());
    tx.discard_row().await.unwrap();

    tx.get_or_insert_address(&office()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(count_rows(&client, "users").await, 1);
    assert_eq!(count_rows(&client, "devices").await, 0);
    assert_eq!(count_rows(&client, "addresses").await, 1);
    assert_eq!(count_rows(&client, "logs").await, 0);
}

#[tokio::test]
async fn test_uncommitted_transaction_is_rolled_back() {
    let (_container, client) = setup_test_db().await;
    let mut store = PostgresIdentityStore::new(client.clone());
    store.prepare().await.unwrap();

    {
        let mut tx = store.begin().await.unwrap();
        tx.get_or_insert_user(&alice()).await.unwrap();
    }

    assert_eq!(count_rows(&client, "users").await, 0);
    assert!(store.is_ready());
}

#[tokio::test]
async fn test_last_user_query_answers_null() {
    let (_container, client) = setup_test_db().await;
    let mut store = PostgresIdentityStore::new(client.clone());
    store.prepare().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let identity = IdentityRecord {
        user_id: tx.get_or_insert_user(&alice()).await.unwrap(),
        device_id: tx.get_or_insert_device(&laptop()).await.unwrap(),
        address_id: tx.get_or_insert_address(&office()).await.unwrap(),
    };
    let identity_id = tx.get_or_insert_identity(&identity).await.unwrap();
    tx.insert_log(identity_id, Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    let repository = PostgresLastUserRepository::new(client);
    let result = repository
        .query_last_user(vec!["C02XYZ".to_string()])
        .await
        .unwrap();

    assert!(result.is_none());
}
