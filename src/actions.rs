//! Row actions: delete and status toggle of a single token.

use std::sync::Arc;

use serde::Serialize;

use crate::errors::ConsoleError;
use crate::gateway::TokenGateway;
use crate::models::envelope::ApiEnvelope;
use crate::models::token::TokenStatus;
use crate::notification::Notifier;
use crate::scope::QueryScope;

const SUCCESS_MESSAGE: &str = "Operation completed successfully";

/// Result of a row action. Produced on every path, including transport
/// failures, so callers never have to special-case a missing envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

#[derive(Clone)]
pub struct RowActions {
    gateway: Arc<dyn TokenGateway>,
    notifier: Arc<dyn Notifier>,
}

impl RowActions {
    pub fn new(gateway: Arc<dyn TokenGateway>, notifier: Arc<dyn Notifier>) -> Self {
        Self { gateway, notifier }
    }

    pub async fn delete(&self, scope: QueryScope, id: i64) -> ActionOutcome {
        let result = self.gateway.delete_token(scope, id).await;
        self.report("delete", id, result)
    }

    pub async fn set_status(
        &self,
        scope: QueryScope,
        id: i64,
        status: TokenStatus,
    ) -> ActionOutcome {
        let result = self.gateway.update_token_status(scope, id, status).await;
        self.report("status", id, result)
    }

    fn report(
        &self,
        action: &'static str,
        id: i64,
        result: Result<ApiEnvelope<serde_json::Value>, ConsoleError>,
    ) -> ActionOutcome {
        match result {
            Ok(env) if env.success => {
                tracing::info!(action, id, "token action succeeded");
                self.notifier.success(SUCCESS_MESSAGE);
                ActionOutcome {
                    success: true,
                    message: env.message,
                }
            }
            Ok(env) => {
                tracing::warn!(action, id, reason = %env.message, "token action rejected");
                self.notifier.error(&env.message);
                ActionOutcome::failed(env.message)
            }
            Err(e) => {
                tracing::error!(action, id, error = %e, "token action failed");
                let message = e.user_message();
                self.notifier.error(&message);
                ActionOutcome::failed(message)
            }
        }
    }
}
