//! Read-only catalog of execution environments.

use std::sync::Arc;

use serde::Serialize;

use crate::error::CoreError;
use crate::store::Store;
use crate::types::{DbId, Timestamp};

/// A named execution target. Seeded administratively; never written here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub id: DbId,
    pub name: String,
    #[serde(skip_serializing)]
    pub created_at: Timestamp,
}

#[derive(Clone)]
pub struct EnvironmentCatalog {
    store: Arc<dyn Store>,
}

impl EnvironmentCatalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn lookup(&self, id: DbId) -> Result<Environment, CoreError> {
        self.store
            .find_environment(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Environment",
                id,
            })
    }

    pub async fn list(&self) -> Result<Vec<Environment>, CoreError> {
        self.store.list_environments().await
    }
}
