use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::sync::Arc;

/// Credentials held in memory, seeded at startup. Used by the `memory` backend
/// and in tests.
#[derive(Clone, Default)]
pub struct MemoryCredentialRepo {
    records: Arc<DashMap<(PrincipalKind, String), CredentialRecord>>,
}

impl MemoryCredentialRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: CredentialRecord) {
        let key = (record.principal.key.kind, record.principal.username.clone());
        self.records.insert(key, record);
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MemoryCredentialRepo {
    async fn get_by_username(
        &self,
        kind: PrincipalKind,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AuthError> {
        Ok(self
            .records
            .get(&(kind, username.to_string()))
            .map(|r| r.value().clone()))
    }
}
