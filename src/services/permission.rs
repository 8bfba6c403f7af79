// Permission resolution, loaded fresh for every check

use std::sync::Arc;
use std::time::Duration;

use crate::db::store::{bounded, PermissionStore, StoreError};
use crate::models::permission::Permissions;

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn PermissionStore>,
    timeout: Duration,
}

impl PermissionService {
    pub fn new(store: Arc<dyn PermissionStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        bounded(self.timeout, self.store.get_all_for_user(user_id)).await
    }

    pub async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        bounded(self.timeout, self.store.add_for_user(user_id, codes)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::models::permission::{MOVIES_READ, MOVIES_WRITE};

    #[tokio::test]
    async fn test_grants_accumulate() {
        let store = Arc::new(MemoryStore::new());
        let service = PermissionService::new(store, Duration::from_secs(1));

        assert!(service.all_for_user(1).await.unwrap().is_empty());

        service.add_for_user(1, &[MOVIES_READ]).await.unwrap();
        service.add_for_user(1, &[MOVIES_WRITE]).await.unwrap();

        let permissions = service.all_for_user(1).await.unwrap();
        assert!(permissions.include(MOVIES_READ));
        assert!(permissions.include(MOVIES_WRITE));

        // Grants are per user
        assert!(service.all_for_user(2).await.unwrap().is_empty());
    }
}
