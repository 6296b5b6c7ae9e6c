use crate::config::Settings;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// One synchronous run of a server-side function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Execution {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub status: String,
}

impl Execution {
    pub fn is_completed(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("completed")
    }
}

#[async_trait::async_trait]
pub trait FunctionRunner: Send + Sync {
    /// Runs `function_id` and waits for it to finish. `body` is passed through verbatim.
    async fn execute(&self, function_id: &str, body: &str) -> anyhow::Result<Execution>;
}

#[derive(Debug)]
pub enum DeletionError {
    MissingUserId,
    NotConfigured,
    Failed(anyhow::Error),
}

impl fmt::Display for DeletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionError::MissingUserId => f.write_str("User ID is required"),
            DeletionError::NotConfigured => {
                f.write_str("account deletion function is not configured")
            }
            DeletionError::Failed(err) => write!(f, "account deletion failed: {err:#}"),
        }
    }
}

impl std::error::Error for DeletionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeletionError::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Hands account deletion requests to the configured server-side function.
/// The function itself confirms with the user and removes their data.
#[derive(Clone)]
pub struct AccountDeletion {
    runner: Arc<dyn FunctionRunner>,
    function_id: Option<String>,
}

impl AccountDeletion {
    pub fn new(runner: Arc<dyn FunctionRunner>, function_id: Option<String>) -> Self {
        Self {
            runner,
            function_id,
        }
    }

    pub fn from_settings(runner: Arc<dyn FunctionRunner>, settings: &Settings) -> Self {
        Self::new(runner, settings.account_deletion_function_id.clone())
    }

    pub async fn request(&self, user_id: Option<&str>) -> Result<Execution, DeletionError> {
        let user_id = user_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(DeletionError::MissingUserId)?;
        let function_id = self
            .function_id
            .as_deref()
            .ok_or(DeletionError::NotConfigured)?;

        let body = serde_json::json!({ "userId": user_id }).to_string();
        let execution = self
            .runner
            .execute(function_id, &body)
            .await
            .map_err(DeletionError::Failed)?;

        if !execution.is_completed() {
            tracing::warn!(user_id, execution_id = %execution.id, status = %execution.status, "account deletion function did not complete");
            return Err(DeletionError::Failed(anyhow::anyhow!(
                "execution {} ended with status {:?}",
                execution.id,
                execution.status
            )));
        }

        tracing::info!(user_id, execution_id = %execution.id, "account deletion requested");
        Ok(execution)
    }
}
