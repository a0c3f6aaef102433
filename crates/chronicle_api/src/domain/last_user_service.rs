use crate::domain::ApiError;
use common::domain::{LastUserEntry, LastUserRepository};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, instrument};

/// Latest-user lookup guarded by a static API key
pub struct LastUserService {
    repository: Arc<dyn LastUserRepository>,
    api_key: String,
}

/// Token of an `Authorization: Bearer <token>` header value
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

impl LastUserService {
    /// An empty `api_key` disables the lookup
    pub fn new(repository: Arc<dyn LastUserRepository>, api_key: String) -> Self {
        Self {
            repository,
            api_key,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn authorize(&self, authorization: Option<&str>) -> Result<(), ApiError> {
        if !self.is_enabled() {
            return Err(ApiError::NotEnabled);
        }

        let token = authorization
            .and_then(bearer_token)
            .ok_or(ApiError::InvalidAuthHeader)?;

        if bool::from(self.api_key.as_bytes().ct_eq(token.as_bytes())) {
            Ok(())
        } else {
            Err(ApiError::InvalidApiKey)
        }
    }

    /// Parses a JSON array of serials and looks up their latest users
    #[instrument(skip_all)]
    pub async fn query(&self, body: &[u8]) -> Result<Option<Vec<LastUserEntry>>, ApiError> {
        let serials: Vec<String> = serde_json::from_slice(body)?;
        if serials.is_empty() {
            return Err(ApiError::InvalidSerialCount);
        }

        debug!(serial_count = serials.len(), "querying last users");
        self.repository
            .query_last_user(serials)
            .await
            .map_err(ApiError::Query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{DomainError, MockLastUserRepository};

    fn service(api_key: &str, repository: MockLastUserRepository) -> LastUserService {
        LastUserService::new(Arc::new(repository), api_key.to_string())
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer secret"), Some("secret"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Basic secret"), None);
        assert_eq!(bearer_token("Bearer a b"), None);
        assert_eq!(bearer_token(""), None);
    }

    #[test]
    fn test_authorize_disabled_without_key() {
        let service = service("", MockLastUserRepository::new());
        assert!(!service.is_enabled());
        assert!(matches!(
            service.authorize(Some("Bearer anything")),
            Err(ApiError::NotEnabled)
        ));
    }

    #[test]
    fn test_authorize_checks_header_and_key() {
        let service = service("secret", MockLastUserRepository::new());

        assert!(service.authorize(Some("Bearer secret")).is_ok());
        assert!(matches!(
            service.authorize(None),
            Err(ApiError::InvalidAuthHeader)
        ));
        assert!(matches!(
            service.authorize(Some("Token secret")),
            Err(ApiError::InvalidAuthHeader)
        ));
        assert!(matches!(
            service.authorize(Some("Bearer wrong")),
            Err(ApiError::InvalidApiKey)
        ));
        assert!(matches!(
            service.authorize(Some("Bearer secretx")),
            Err(ApiError::InvalidApiKey)
        ));
    }

    #[tokio::test]
    async fn test_query_passes_serials() {
        let mut repository = MockLastUserRepository::new();
        repository
            .expect_query_last_user()
            .withf(|serials: &Vec<String>| serials == &["SN1".to_string(), "SN2".to_string()])
            .times(1)
            .returning(|_| Ok(None));

        let result = service("secret", repository)
            .query(br#"["SN1","SN2"]"#)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_query_rejects_empty_and_malformed_bodies() {
        let mut repository = MockLastUserRepository::new();
        repository.expect_query_last_user().times(0);
        let service = service("secret", repository);

        assert!(matches!(
            service.query(b"[]").await,
            Err(ApiError::InvalidSerialCount)
        ));
        assert!(matches!(
            service.query(b"SN1").await,
            Err(ApiError::InvalidBody(_))
        ));
    }

    #[tokio::test]
    async fn test_query_wraps_repository_error() {
        let mut repository = MockLastUserRepository::new();
        repository
            .expect_query_last_user()
            .returning(|_| Err(DomainError::NotConnected));

        let result = service("secret", repository).query(br#"["SN1"]"#).await;
        assert!(matches!(
            result,
            Err(ApiError::Query(DomainError::NotConnected))
        ));
    }
}
