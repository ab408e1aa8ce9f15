//! Helpers for testing the provider without a gRPC server.
//!
//! [`ProviderTester`] drives any [`ProviderService`] directly. Together with a
//! `wiremock` server standing in for the Instana API it covers the whole
//! resource lifecycle:
//!
//! ```ignore
//! use terraform_provider_instana::testing::ProviderTester;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_alerting_channel() {
//!     let server = wiremock::MockServer::start().await;
//!     let tester = ProviderTester::configured(&server.uri()).await.unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("instana_alerting_channel", json!({
//!             "name": "ops",
//!             "email": {"emails": ["ops@example.com"]}
//!         }))
//!         .await
//!         .unwrap();
//!     assert!(state["id"].is_string());
//! }
//! ```

use std::time::Duration;

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::InstanaProvider;
use crate::restapi::{ClientOptions, RetryPolicy};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Transport options for tests: no write throttling and short retry delays.
pub fn test_client_options() -> ClientOptions {
    ClientOptions::new()
        .with_timeout(Duration::from_secs(5))
        .with_write_interval(Duration::ZERO)
        .with_retry(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            total_budget: Duration::from_secs(10),
        })
}

/// Drives a [`ProviderService`] the way the host would.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl ProviderTester<InstanaProvider> {
    /// An Instana provider configured against `endpoint`, ignoring the
    /// process environment.
    pub async fn configured(endpoint: &str) -> Result<Self, TestError> {
        let provider = InstanaProvider::new()
            .with_env(|_| None)
            .with_client_options(test_client_options());
        let tester = Self::new(provider);
        tester
            .configure(json!({"api_token": "test-token", "endpoint": endpoint}))
            .await?;
        Ok(tester)
    }
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names reported by GetMetadata.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names reported by GetMetadata.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Configure the provider; error diagnostics fail the call.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration; error diagnostics fail the call.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan the creation of a resource.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan a change of an existing resource.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Create a resource from a planned state.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource; null when it no longer exists.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource to a planned state.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import a resource by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Migrate a state stored with an older schema version.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan, create and read back a resource.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update and read back a resource.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }
}

/// Failure of a tester call.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// The call returned error diagnostics.
    #[error("{}", format_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diagnostics.len());
    for diagnostic in diagnostics {
        out.push_str("\n  ");
        out.push_str(&diagnostic.summary);
        if let Some(detail) = &diagnostic.detail {
            out.push_str(": ");
            out.push_str(detail);
        }
        if let Some(attribute) = &diagnostic.attribute {
            out.push_str(&format!(" (at {})", attribute));
        }
    }
    out
}

fn is_error(diagnostic: &Diagnostic) -> bool {
    matches!(diagnostic.severity, DiagnosticSeverity::Error)
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that a plan creates a resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "expected changes for create, got none");
    assert!(!plan.requires_replace, "expected create, got replace");
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any change.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected no changes, got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan replaces the resource.
///
/// # Panics
///
/// Panics if the plan updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "expected replacement, got in-place update");
}

/// Assert that a plan changes the attribute at `path`.
///
/// # Panics
///
/// Panics if no change has the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected a change of '{}', changed: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there is an error diagnostic.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| is_error(d))
        .map(|d| &d.summary)
        .collect();
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

/// Assert that an error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| is_error(d) && d.summary.contains(substring)),
        "expected an error containing '{}', got {:?}",
        substring,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::UNKNOWN_VALUE;

    const CHANNEL: &str = "instana_alerting_channel";

    fn tester() -> ProviderTester<InstanaProvider> {
        ProviderTester::new(InstanaProvider::new().with_env(|_| None))
    }

    #[test]
    fn test_catalog_is_reported() {
        let tester = tester();
        assert!(tester.resource_types().contains(&CHANNEL.to_string()));
        assert!(tester
            .data_source_types()
            .contains(&"instana_host_agents".to_string()));
        assert!(tester.schema().resources.contains_key("instana_sli_config"));
    }

    #[tokio::test]
    async fn test_plan_create_marks_id_unknown() {
        let plan = tester()
            .plan_create(CHANNEL, json!({"name": "ops", "email": {"emails": ["a@b.c"]}}))
            .await
            .unwrap();
        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["id"], UNKNOWN_VALUE);
    }

    #[tokio::test]
    async fn test_plan_update() {
        let tester = tester();
        let prior = json!({"id": "abc", "name": "ops", "email": {"emails": ["a@b.c"]}});
        let unchanged = tester.plan_update(CHANNEL, prior.clone(), prior.clone()).await.unwrap();
        assert_plan_no_changes(&unchanged);

        let renamed = json!({"id": "abc", "name": "oncall", "email": {"emails": ["a@b.c"]}});
        let plan = tester.plan_update(CHANNEL, prior, renamed).await.unwrap();
        assert_plan_changes_attribute(&plan, "name");
        assert!(!plan.requires_replace);
    }

    #[tokio::test]
    async fn test_create_only_resource_is_replaced() {
        let config = json!({
            "name": "latency",
            "initial_evaluation_timestamp": 0,
            "metric_configuration": {"metric_name": "calls", "aggregation": "SUM", "threshold": 1.0},
            "sli_entity": {"application_time_based": {"application_id": "app", "boundary_scope": "ALL"}}
        });
        let mut prior = config.clone();
        prior["id"] = json!("sli-1");
        let mut changed = config;
        changed["name"] = json!("latency-v2");

        let plan = tester()
            .plan_update("instana_sli_config", prior, changed)
            .await
            .unwrap();
        assert_plan_replaces(&plan);
    }

    #[tokio::test]
    async fn test_configure_without_settings_fails() {
        let err = tester().configure(json!({})).await.unwrap_err();
        let TestError::Diagnostics(diagnostics) = &err else {
            panic!("expected diagnostics, got {}", err);
        };
        assert_error_contains(diagnostics, "Missing Instana API Token");
        assert_error_contains(diagnostics, "Missing Instana Endpoint");
        assert!(err.to_string().contains("(at api_token)"));
    }

    #[tokio::test]
    async fn test_configured_tester() {
        let tester = ProviderTester::configured("http://127.0.0.1:1").await.unwrap();
        assert!(tester.provider().meta().await.is_some());
        tester
            .validate_resource_config(CHANNEL, json!({"name": "ops", "email": {"emails": ["a@b.c"]}}))
            .await
            .unwrap();
    }

    #[test]
    fn test_assert_no_errors_accepts_warnings() {
        assert_no_errors(&[Diagnostic::warning("deprecated")]);
    }

    #[test]
    #[should_panic(expected = "expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("invalid tag filter")]);
    }
}
