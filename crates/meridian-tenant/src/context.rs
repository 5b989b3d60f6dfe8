//! Scoped tenant/workspace binding.
//!
//! Entering `with_tenant` pushes the pair for the duration of the given
//! future; nested scopes stack naturally because `tokio::task_local`'s
//! `scope` restores the previous value on exit. Absence of a binding on
//! a storage/metric path is a fail-closed [`meridian_core::CoreError`].

use std::future::Future;

use meridian_core::CoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant: String,
    pub workspace: String,
}

impl TenantContext {
    pub fn new(tenant: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            workspace: workspace.into(),
        }
    }

    /// `"{tenant}:{workspace}:{logical_collection}"`.
    pub fn namespace(&self, collection: &str) -> String {
        format!("{}:{}:{}", self.tenant, self.workspace, collection)
    }
}

tokio::task_local! {
    static TENANT_CTX: TenantContext;
}

/// Runs `body` with `(tenant, workspace)` bound for its duration.
pub async fn with_tenant<Fut, T>(tenant: impl Into<String>, workspace: impl Into<String>, body: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let ctx = TenantContext::new(tenant, workspace);
    TENANT_CTX.scope(ctx, body).await
}

/// Reads the currently bound tenant context. Fails closed (:
/// "Absence of binding in a storage/metric path is a fatal error").
pub fn current(operation: &'static str) -> Result<TenantContext, CoreError> {
    TENANT_CTX
        .try_with(|ctx| ctx.clone())
        .map_err(|_| CoreError::MissingTenantBinding { operation })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_fails_without_binding() {
        let err = current("test_op");
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn with_tenant_binds_for_duration() {
        with_tenant("t1", "w1", async {
            let ctx = current("test_op").expect("bound");
            assert_eq!(ctx.tenant, "t1");
            assert_eq!(ctx.workspace, "w1");
            assert_eq!(ctx.namespace("transcript_chunk"), "t1:w1:transcript_chunk");
        })
        .await;
    }

    #[tokio::test]
    async fn nested_scopes_stack_and_restore() {
        with_tenant("outer", "w", async {
            with_tenant("inner", "w", async {
                assert_eq!(current("op").unwrap().tenant, "inner");
            })
            .await;
            assert_eq!(current("op").unwrap().tenant, "outer");
        })
        .await;
    }
}
