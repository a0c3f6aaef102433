use crate::domain::{DomainResult, LastUserEntry};
use async_trait::async_trait;

/// Latest-user lookup by device serial
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LastUserRepository: Send + Sync {
    async fn query_last_user(&self, serials: Vec<String>)
        -> DomainResult<Option<Vec<LastUserEntry>>>;
}
