use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Field {0} is too long")]
    FieldTooLong(String),

    #[error("Cannot prepare statement {query}: {source}")]
    StatementPreparation {
        query: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Query failed: {query} with arguments {arguments}: {source}")]
    Query {
        query: &'static str,
        arguments: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Transaction error: {0}")]
    Transaction(#[source] anyhow::Error),

    #[error("Store is not connected")]
    NotConnected,

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
