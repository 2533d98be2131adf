use std::collections::HashSet;

use async_trait::async_trait;
use hive_model::WorkflowMeta;

use crate::{
    error::StorageError,
    storage::{AuthDecision, Authorizer},
};

/// Authorizes everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn check(
        &self,
        _workflow: &WorkflowMeta,
        _owner_id: &str,
    ) -> Result<AuthDecision, StorageError> {
        Ok(AuthDecision::Allowed)
    }
}

/// Denies workflows owned by any of the listed owners.
#[derive(Debug, Default, Clone)]
pub struct DenyOwners {
    owners: HashSet<String>,
}

impl DenyOwners {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Authorizer for DenyOwners {
    async fn check(
        &self,
        workflow: &WorkflowMeta,
        owner_id: &str,
    ) -> Result<AuthDecision, StorageError> {
        if self.owners.contains(owner_id) {
            return Ok(AuthDecision::Denied {
                reason: format!(
                    "owner {owner_id} is not allowed to run workflow {}",
                    workflow.id
                ),
            });
        }
        Ok(AuthDecision::Allowed)
    }
}
