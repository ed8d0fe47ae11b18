//! Task-scoped "current tenant" for code that is not handed a [`TenantScope`].
//!
//! The binding lives exactly as long as the future passed to [`scope`] is
//! being polled. It disappears when that future completes, panics or is
//! dropped, so a worker thread picking up the next request never sees it.
//!
//! [`TenantScope`]: super::scope::TenantScope

use std::future::Future;

use crate::database::models::Tenant;

tokio::task_local! {
    static CURRENT_TENANT: Option<Tenant>;
}

/// Run `fut` with `tenant` bound as the current tenant.
pub async fn scope<F>(tenant: Option<Tenant>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_TENANT.scope(tenant, fut).await
}

/// The tenant bound by the innermost enclosing [`scope`], or `None`.
pub fn current() -> Option<Tenant> {
    CURRENT_TENANT.try_with(Clone::clone).ok().flatten()
}

/// Id of the current tenant, if any.
pub fn current_id() -> Option<i64> {
    CURRENT_TENANT
        .try_with(|t| t.as_ref().map(|t| t.id))
        .ok()
        .flatten()
}

/// Wrap `fut` so it carries the caller's binding onto another task.
///
/// ```ignore
/// tokio::spawn(context::propagate(async move { audit(context::current()).await }));
/// ```
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    scope(current(), fut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;
    use std::time::Duration;

    fn tenant(id: i64, domain: &str) -> Tenant {
        Tenant {
            id,
            name: domain.to_uppercase(),
            domain: domain.to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn none_outside_any_scope() {
        assert_eq!(current(), None);
        assert_eq!(current_id(), None);
    }

    #[tokio::test]
    async fn bound_inside_and_cleared_after() {
        let acme = tenant(1, "acme");
        let seen = scope(Some(acme.clone()), async { current() }).await;
        assert_eq!(seen, Some(acme));
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn explicit_none_binding() {
        let seen = scope(None, async { current_id() }).await;
        assert_eq!(seen, None);
    }

    #[tokio::test]
    async fn inner_scope_shadows_outer() {
        let outer = tenant(1, "acme");
        let inner = tenant(2, "globex");

        scope(Some(outer.clone()), async {
            assert_eq!(current_id(), Some(1));
            scope(Some(inner), async {
                assert_eq!(current_id(), Some(2));
            })
            .await;
            assert_eq!(current_id(), Some(1));
        })
        .await;
    }

    #[tokio::test]
    async fn cleared_after_panic() {
        let result = AssertUnwindSafe(scope(Some(tenant(1, "acme")), async {
            assert_eq!(current_id(), Some(1));
            panic!("handler blew up");
        }))
        .catch_unwind()
        .await;

        assert!(result.is_err());
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn cleared_after_cancellation() {
        let pending = scope(Some(tenant(1, "acme")), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;

        assert!(timed_out.is_err());
        assert_eq!(current(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_scopes_do_not_leak() {
        let handles: Vec<_> = (1..=50)
            .map(|id| {
                tokio::spawn(scope(Some(tenant(id, &format!("t{}", id))), async move {
                    for _ in 0..5 {
                        tokio::task::yield_now().await;
                        assert_eq!(current_id(), Some(id));
                    }
                    current_id()
                }))
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(i as i64 + 1));
        }
    }

    #[tokio::test]
    async fn spawned_task_does_not_inherit_without_propagate() {
        scope(Some(tenant(1, "acme")), async {
            let plain = tokio::spawn(async { current_id() }).await.unwrap();
            assert_eq!(plain, None);

            let carried = tokio::spawn(propagate(async { current_id() })).await.unwrap();
            assert_eq!(carried, Some(1));
        })
        .await;
    }
}
