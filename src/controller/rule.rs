use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthService, AuthUser, PrivilegeType};
use crate::domain::meta::trim_in_place;
use crate::domain::{now_millis, RuleEntity};
use crate::observability::{MetricsRegistry, RuleOp, TimingGuard};
use crate::storage::{RuleProvider, RulePublisher, RuleRepository};

use super::error::ControllerError;

/// Generic list/create/update/delete orchestration for one rule kind.
///
/// Every mutation runs validate, authorize, persist, then republishes the
/// app's whole rule set from the local repository. The controller keeps
/// no state of its own between calls.
pub struct RuleController<T: RuleEntity> {
    repository: Arc<dyn RuleRepository<T>>,
    provider: Arc<dyn RuleProvider<T>>,
    publisher: Arc<dyn RulePublisher<T>>,
    auth: Arc<dyn AuthService>,
    metrics: Arc<MetricsRegistry>,
}

impl<T: RuleEntity> RuleController<T> {
    pub fn new(
        repository: Arc<dyn RuleRepository<T>>,
        provider: Arc<dyn RuleProvider<T>>,
        publisher: Arc<dyn RulePublisher<T>>,
        auth: Arc<dyn AuthService>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        RuleController {
            repository,
            provider,
            publisher,
            auth,
            metrics,
        }
    }

    /// Identify the caller of `op`, counting a failure against it.
    pub fn authenticate(&self, op: RuleOp, headers: &HeaderMap) -> Result<AuthUser, ControllerError> {
        match self.auth.resolve(headers) {
            Ok(user) => Ok(user),
            Err(e) => self.finish(op, Err(e.into())),
        }
    }

    /// Rules of `app` as currently held by the live rule source.
    ///
    /// The local repository is resynced with the fetched set before it is
    /// returned.
    pub async fn list(&self, user: &AuthUser, app: &str) -> Result<Vec<T>, ControllerError> {
        let result = self.list_inner(user, app).await;
        self.finish(RuleOp::List, result)
    }

    /// Validate and store a new rule, then republish its app.
    pub async fn create(&self, user: &AuthUser, entity: T) -> Result<T, ControllerError> {
        let result = self.create_inner(user, entity).await;
        self.finish(RuleOp::Create, result)
    }

    /// Replace the rule stored under `id`, then republish its app.
    pub async fn update(
        &self,
        user: &AuthUser,
        id: Option<i64>,
        entity: T,
    ) -> Result<T, ControllerError> {
        let result = self.update_inner(user, id, entity).await;
        self.finish(RuleOp::Update, result)
    }

    /// Delete the rule stored under `id`.
    ///
    /// Deleting an unknown id succeeds with `None`.
    pub async fn delete(
        &self,
        user: &AuthUser,
        id: Option<i64>,
    ) -> Result<Option<i64>, ControllerError> {
        let result = self.delete_inner(user, id).await;
        self.finish(RuleOp::Delete, result)
    }

    async fn list_inner(&self, user: &AuthUser, app: &str) -> Result<Vec<T>, ControllerError> {
        let app = app.trim();
        if app.is_empty() {
            return Err(ControllerError::invalid("app can't be null or empty"));
        }
        self.auth.authorize(user, app, PrivilegeType::ReadRule)?;

        let rules = self.provider.get_rules(app).await.map_err(|e| {
            error!(kind = T::KIND.as_str(), app, error = %e, "Failed to fetch rules");
            ControllerError::Provider(e)
        })?;

        let saved = self
            .repository
            .replace_app(app, rules)
            .map_err(ControllerError::Repository)?;

        debug!(kind = T::KIND.as_str(), app, count = saved.len(), "Synced rules from rule source");
        Ok(saved)
    }

    async fn create_inner(&self, user: &AuthUser, mut entity: T) -> Result<T, ControllerError> {
        entity.check()?;
        // Authorize against the app the rule will be stored under
        trim_in_place(&mut entity.meta_mut().app);
        self.auth
            .authorize(user, entity.app(), PrivilegeType::WriteRule)?;

        entity.pre_save(now_millis());
        let saved = self.repository.save(entity).map_err(|e| {
            error!(kind = T::KIND.as_str(), error = %e, "Failed to save rule");
            ControllerError::Repository(e)
        })?;

        info!(
            kind = T::KIND.as_str(),
            app = saved.app(),
            id = saved.id(),
            user = %user.login_name,
            "Rule created"
        );

        self.publish(saved.app()).await?;
        Ok(saved)
    }

    async fn update_inner(
        &self,
        user: &AuthUser,
        id: Option<i64>,
        mut entity: T,
    ) -> Result<T, ControllerError> {
        let id = valid_id(id)?;
        let old = self
            .repository
            .find_by_id(id)
            .map_err(ControllerError::Repository)?
            .ok_or(ControllerError::NotFound(id))?;
        self.auth.authorize(user, old.app(), PrivilegeType::WriteRule)?;

        entity.pre_update(id, &old, now_millis());
        entity.check()?;

        let saved = self.repository.save(entity).map_err(|e| {
            error!(kind = T::KIND.as_str(), id, error = %e, "Failed to save rule");
            ControllerError::Repository(e)
        })?;

        info!(
            kind = T::KIND.as_str(),
            app = saved.app(),
            id,
            user = %user.login_name,
            "Rule updated"
        );

        self.publish(saved.app()).await?;
        Ok(saved)
    }

    async fn delete_inner(
        &self,
        user: &AuthUser,
        id: Option<i64>,
    ) -> Result<Option<i64>, ControllerError> {
        let id = valid_id(id)?;
        let Some(old) = self
            .repository
            .find_by_id(id)
            .map_err(ControllerError::Repository)?
        else {
            debug!(kind = T::KIND.as_str(), id, "Delete of unknown rule ignored");
            return Ok(None);
        };
        self.auth
            .authorize(user, old.app(), PrivilegeType::DeleteRule)?;

        self.repository.delete(id).map_err(|e| {
            error!(kind = T::KIND.as_str(), id, error = %e, "Failed to delete rule");
            ControllerError::Repository(e)
        })?;

        info!(
            kind = T::KIND.as_str(),
            app = old.app(),
            id,
            user = %user.login_name,
            "Rule deleted"
        );

        self.publish(old.app()).await?;
        Ok(Some(id))
    }

    /// Push the app's full local rule set to the live source.
    async fn publish(&self, app: &str) -> Result<(), ControllerError> {
        let rules = self
            .repository
            .find_all_by_app(app)
            .map_err(ControllerError::Repository)?;

        match self.publisher.publish(app, &rules).await {
            Ok(()) => {
                self.metrics.record_publish(T::KIND, true);
                debug!(kind = T::KIND.as_str(), app, count = rules.len(), "Published rules");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_publish(T::KIND, false);
                error!(kind = T::KIND.as_str(), app, error = %e, "Publish rules failed");
                Err(ControllerError::Publish(e))
            }
        }
    }

    fn finish<R>(
        &self,
        op: RuleOp,
        result: Result<R, ControllerError>,
    ) -> Result<R, ControllerError> {
        self.metrics.record_operation(op);
        if let Err(e) = &result {
            self.metrics.record_failure(e.class());
            warn!(kind = T::KIND.as_str(), op = op.as_str(), error = %e, "Rule operation failed");
        }
        result
    }

    /// Time an operation into the latency histogram.
    pub fn timer(&self) -> TimingGuard<'_> {
        TimingGuard::new(&self.metrics)
    }
}

fn valid_id(id: Option<i64>) -> Result<i64, ControllerError> {
    match id {
        Some(id) if id > 0 => Ok(id),
        _ => Err(ControllerError::invalid("Invalid id")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AllowAllAuthService, AuthError};
    use crate::domain::{FlowRuleEntity, SystemRuleEntity};
    use crate::observability::tracing::init_test_tracing;
    use crate::observability::FailureClass;
    use crate::storage::{InMemoryRuleRepository, MemoryRuleSource};
    use tokio_test::{assert_err, assert_ok};

    struct Harness<T: RuleEntity> {
        controller: RuleController<T>,
        repository: Arc<InMemoryRuleRepository<T>>,
        source: Arc<MemoryRuleSource>,
        metrics: Arc<MetricsRegistry>,
    }

    fn harness<T: RuleEntity>() -> Harness<T> {
        init_test_tracing();
        let repository = Arc::new(InMemoryRuleRepository::new());
        let source = Arc::new(MemoryRuleSource::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let controller = RuleController::new(
            repository.clone(),
            source.clone(),
            source.clone(),
            Arc::new(AllowAllAuthService),
            metrics.clone(),
        );
        Harness {
            controller,
            repository,
            source,
            metrics,
        }
    }

    fn admin() -> AuthUser {
        AuthUser::super_user("admin")
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_publishes() {
        let h = harness::<FlowRuleEntity>();

        let saved = h
            .controller
            .create(&admin(), FlowRuleEntity::qps("demo", "foo", 10.0))
            .await
            .unwrap();

        assert!(saved.id().unwrap() > 0);
        assert!(saved.meta.gmt_create.is_some());
        assert_eq!(saved.meta.gmt_create, saved.meta.gmt_modified);

        let published: Vec<FlowRuleEntity> =
            serde_json::from_str(&h.source.payload(FlowRuleEntity::KIND, "demo").unwrap()).unwrap();
        assert_eq!(published, vec![saved]);
    }

    #[tokio::test]
    async fn test_create_ignores_client_id() {
        let h = harness::<FlowRuleEntity>();
        let mut rule = FlowRuleEntity::qps("demo", "foo", 10.0);
        rule.meta.id = Some(500);

        let saved = h.controller.create(&admin(), rule).await.unwrap();

        assert_eq!(saved.id(), Some(1));
    }

    #[tokio::test]
    async fn test_invalid_create_has_no_side_effects() {
        let h = harness::<SystemRuleEntity>();
        let rule = SystemRuleEntity {
            meta: crate::domain::RuleMeta::for_app("demo"),
            highest_system_load: Some(4.0),
            qps: Some(100.0),
            ..Default::default()
        };

        let err = h.controller.create(&admin(), rule).await.unwrap_err();

        assert!(matches!(err, ControllerError::Validation(_)));
        assert!(h.repository.is_empty());
        assert_eq!(h.source.publish_count(), 0);
        assert_eq!(h.metrics.failure_count(FailureClass::Validation), 1);
    }

    #[tokio::test]
    async fn test_update_preserves_create_time_and_app() {
        let h = harness::<FlowRuleEntity>();
        let saved = h
            .controller
            .create(&admin(), FlowRuleEntity::qps("demo", "foo", 10.0))
            .await
            .unwrap();

        let mut body = FlowRuleEntity::qps("other-app", "foo", 20.0);
        body.meta.gmt_create = None;
        let updated = h
            .controller
            .update(&admin(), saved.id(), body)
            .await
            .unwrap();

        assert_eq!(updated.id(), saved.id());
        assert_eq!(updated.app(), "demo");
        assert_eq!(updated.count, Some(20.0));
        assert_eq!(updated.meta.gmt_create, saved.meta.gmt_create);
        assert!(updated.meta.gmt_modified > saved.meta.gmt_modified);
        assert!(h.repository.find_all_by_app("other-app").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_bad_ids() {
        let h = harness::<FlowRuleEntity>();
        let body = FlowRuleEntity::qps("demo", "foo", 20.0);

        let err = h.controller.update(&admin(), Some(0), body.clone()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid id");

        let err = h.controller.update(&admin(), None, body.clone()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid id");

        let err = h.controller.update(&admin(), Some(7), body).await.unwrap_err();
        assert!(matches!(err, ControllerError::NotFound(7)));
        assert_eq!(h.source.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_update_validates_replacement() {
        let h = harness::<FlowRuleEntity>();
        let saved = h
            .controller
            .create(&admin(), FlowRuleEntity::qps("demo", "foo", 10.0))
            .await
            .unwrap();

        let mut body = FlowRuleEntity::qps("demo", "foo", 10.0);
        body.grade = Some(5);
        let err = h.controller.update(&admin(), saved.id(), body).await.unwrap_err();

        assert_eq!(err.to_string(), "grade must be 0 or 1, but 5 got");
        let stored = h.repository.find_by_id(saved.id().unwrap()).unwrap().unwrap();
        assert_eq!(stored.grade, Some(1));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let h = harness::<FlowRuleEntity>();
        let saved = h
            .controller
            .create(&admin(), FlowRuleEntity::qps("demo", "foo", 10.0))
            .await
            .unwrap();
        let id = saved.id();

        assert_eq!(h.controller.delete(&admin(), id).await.unwrap(), id);
        let publishes = h.source.publish_count();

        assert_eq!(h.controller.delete(&admin(), id).await.unwrap(), None);
        assert_eq!(h.controller.delete(&admin(), id).await.unwrap(), None);
        assert_eq!(h.source.publish_count(), publishes);
        assert!(h.repository.is_empty());
    }

    #[tokio::test]
    async fn test_delete_rejects_non_positive_id() {
        let h = harness::<FlowRuleEntity>();
        assert_err!(h.controller.delete(&admin(), Some(-3)).await);
    }

    #[tokio::test]
    async fn test_list_syncs_with_rule_source() {
        let h = harness::<FlowRuleEntity>();
        h.controller
            .create(&admin(), FlowRuleEntity::qps("demo", "local-only", 1.0))
            .await
            .unwrap();

        // Someone else rewrote the live rule set
        h.source
            .put_rules("demo", &[FlowRuleEntity::qps("demo", "remote", 5.0)])
            .unwrap();

        let rules = assert_ok!(h.controller.list(&admin(), "demo").await);

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].resource.as_deref(), Some("remote"));
        assert!(rules[0].id().is_some());
        assert_eq!(h.repository.find_all_by_app("demo").unwrap(), rules);
    }

    #[tokio::test]
    async fn test_list_requires_app() {
        let h = harness::<FlowRuleEntity>();
        let err = h.controller.list(&admin(), "  ").await.unwrap_err();
        assert_eq!(err.to_string(), "app can't be null or empty");
    }

    #[tokio::test]
    async fn test_list_provider_failure_is_typed() {
        let h = harness::<FlowRuleEntity>();
        h.source.set_fail_fetch(true);

        let err = h.controller.list(&admin(), "demo").await.unwrap_err();

        assert!(matches!(err, ControllerError::Provider(_)));
        assert_eq!(h.metrics.failure_count(FailureClass::Collaborator), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_local_write() {
        let h = harness::<FlowRuleEntity>();
        h.source.set_fail_publish(true);

        let err = h
            .controller
            .create(&admin(), FlowRuleEntity::qps("demo", "foo", 10.0))
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::Publish(_)));
        assert_eq!(h.repository.find_all_by_app("demo").unwrap().len(), 1);
        assert_eq!(h.metrics.publish_error_count(FlowRuleEntity::KIND), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_user_cannot_mutate() {
        let h = harness::<FlowRuleEntity>();
        let reader = AuthUser::new("reader").grant("demo", [PrivilegeType::ReadRule]);

        let err = h
            .controller
            .create(&reader, FlowRuleEntity::qps("demo", "foo", 10.0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::Auth(AuthError::Forbidden { .. })
        ));
        assert!(h.repository.is_empty());
        assert!(h.controller.list(&reader, "demo").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_authorizes_trimmed_app() {
        let h = harness::<FlowRuleEntity>();
        let writer = AuthUser::new("writer").grant("demo", [PrivilegeType::WriteRule]);

        let saved = assert_ok!(
            h.controller
                .create(&writer, FlowRuleEntity::qps(" demo ", "foo", 10.0))
                .await
        );

        assert_eq!(saved.app(), "demo");
        assert_eq!(h.repository.find_all_by_app("demo").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_checks_delete_privilege() {
        let h = harness::<FlowRuleEntity>();
        let saved = h
            .controller
            .create(&admin(), FlowRuleEntity::qps("demo", "foo", 10.0))
            .await
            .unwrap();
        let writer = AuthUser::new("writer").grant("demo", [PrivilegeType::WriteRule]);

        let err = h.controller.delete(&writer, saved.id()).await.unwrap_err();

        assert!(matches!(err, ControllerError::Auth(_)));
        assert_eq!(h.repository.len(), 1);
    }
}
