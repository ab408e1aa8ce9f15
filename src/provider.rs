//! The Instana provider: configuration and dispatch to resources.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::datasources::{self, DataSourceHandle};
use crate::error::ProviderError;
use crate::resource::ManagedResource;
use crate::resources;
use crate::restapi::{ClientOptions, InstanaApi};
use crate::schema::{Attribute, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, PROVIDER_TYPE_NAME};
use crate::validation::validate;
use crate::value::{AttrValue, ObjectReader};

/// Environment variable consulted when `api_token` is not configured.
pub const API_TOKEN_ENV: &str = "INSTANA_API_TOKEN";

/// Environment variable consulted when `endpoint` is not configured.
pub const ENDPOINT_ENV: &str = "INSTANA_ENDPOINT";

const SCHEMA_FIELD_API_TOKEN: &str = "api_token";
const SCHEMA_FIELD_ENDPOINT: &str = "endpoint";
const SCHEMA_FIELD_TLS_SKIP_VERIFY: &str = "tls_skip_verify";

/// Lookup of environment variables.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Everything resources need once the provider is configured.
pub struct ProviderMeta {
    /// Token used to authenticate against the API.
    pub api_token: String,
    /// Host name of the tenant unit.
    pub endpoint: String,
    /// Whether TLS certificates are not verified.
    pub tls_skip_verify: bool,
    /// Typed access to the API.
    pub api: InstanaApi,
}

impl fmt::Debug for ProviderMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderMeta")
            .field("api_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("tls_skip_verify", &self.tls_skip_verify)
            .finish()
    }
}

/// Schema of the provider configuration block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("The Instana provider is used to interact with the Instana monitoring platform.")
        .with_attribute(
            SCHEMA_FIELD_API_TOKEN,
            Attribute::optional_string().sensitive().with_description(format!(
                "API token used to authenticate with the Instana Backend. Defaults to ${}.",
                API_TOKEN_ENV
            )),
        )
        .with_attribute(
            SCHEMA_FIELD_ENDPOINT,
            Attribute::optional_string().with_description(format!(
                "The DNS Name of the Instana Endpoint (eg. saas-eu-west-1.instana.io). Defaults to ${}.",
                ENDPOINT_ENV
            )),
        )
        .with_attribute(
            SCHEMA_FIELD_TLS_SKIP_VERIFY,
            Attribute::optional_bool()
                .with_default(Value::Bool(false))
                .with_description("If set to true, TLS verification will be skipped when calling Instana API"),
        )
}

/// The Instana provider.
pub struct InstanaProvider {
    resources: BTreeMap<String, Arc<dyn ManagedResource>>,
    data_sources: BTreeMap<String, Arc<dyn DataSourceHandle>>,
    meta: RwLock<Option<Arc<ProviderMeta>>>,
    cancel: CancellationToken,
    env: EnvLookup,
    client_options: ClientOptions,
}

impl Default for InstanaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanaProvider {
    /// Create the provider with all resources and data sources.
    pub fn new() -> Self {
        let resources = resources::all()
            .into_iter()
            .map(|r| (r.metadata().type_name(), r))
            .collect();
        let data_sources = datasources::all()
            .into_iter()
            .map(|d| (crate::resource::type_name(d.name()), d))
            .collect();
        Self {
            resources,
            data_sources,
            meta: RwLock::new(None),
            cancel: CancellationToken::new(),
            env: Arc::new(|name| std::env::var(name).ok()),
            client_options: ClientOptions::default(),
        }
    }

    /// Replace the environment lookup.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(env);
        self
    }

    /// Replace the transport options of the API client.
    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.client_options = options;
        self
    }

    /// The configuration, if Configure succeeded.
    pub async fn meta(&self) -> Option<Arc<ProviderMeta>> {
        self.meta.read().await.clone()
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn ManagedResource>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSourceHandle>, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    /// Resolve a setting from the configuration, then the environment.
    fn setting(
        &self,
        config: &ObjectReader<'_>,
        field: &str,
        env_name: &str,
        title: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        let value = match config.get::<String>(field) {
            Ok(AttrValue::Known(value)) => Some(value),
            Ok(AttrValue::Null) => (self.env)(env_name),
            Ok(AttrValue::Unknown) => {
                diagnostics.push(
                    Diagnostic::error(format!("Unknown Instana {}", title))
                        .with_detail(format!(
                            "The provider cannot create the Instana API client as there is an unknown configuration value for the Instana {}. \
                             Either target apply the source of the value first, set the value statically in the configuration, or use the {} environment variable.",
                            title, env_name
                        ))
                        .with_attribute(field),
                );
                return None;
            },
            Err(err) => {
                diagnostics.extend(err.to_diagnostics());
                return None;
            },
        };
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(value) => Some(value),
            None => {
                diagnostics.push(
                    Diagnostic::error(format!("Missing Instana {}", title))
                        .with_detail(format!(
                            "Set {} in the provider configuration or the {} environment variable.",
                            field, env_name
                        ))
                        .with_attribute(field),
                );
                None
            },
        }
    }
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Error)
}

#[async_trait::async_trait]
impl ProviderService for InstanaProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(provider_schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(name.clone(), resource.schema().clone());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(name.clone(), data_source.schema());
        }
        schema
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            type_name: PROVIDER_TYPE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            resources: self.resources.keys().cloned().collect(),
            data_sources: self.data_sources.keys().cloned().collect(),
            plan_destroy: false,
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&provider_schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&provider_schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }
        let reader = ObjectReader::new(&config)?;

        let api_token = self.setting(
            &reader,
            SCHEMA_FIELD_API_TOKEN,
            API_TOKEN_ENV,
            "API Token",
            &mut diagnostics,
        );
        let endpoint = self.setting(
            &reader,
            SCHEMA_FIELD_ENDPOINT,
            ENDPOINT_ENV,
            "Endpoint",
            &mut diagnostics,
        );
        let tls_skip_verify = reader
            .optional::<bool>(SCHEMA_FIELD_TLS_SKIP_VERIFY)?
            .unwrap_or(false);

        let (Some(api_token), Some(endpoint)) = (api_token, endpoint) else {
            warn!("provider configuration incomplete");
            return Ok(diagnostics);
        };

        let api = match InstanaApi::with_options(
            &api_token,
            &endpoint,
            tls_skip_verify,
            self.client_options.clone(),
        ) {
            Ok(api) => api,
            Err(err) => {
                diagnostics.push(
                    Diagnostic::error("Unable to create Instana API client")
                        .with_detail(err.to_string()),
                );
                return Ok(diagnostics);
            },
        };

        if tls_skip_verify {
            warn!(endpoint = %endpoint, "TLS verification disabled");
        }
        info!(endpoint = %endpoint, "provider configured");
        *self.meta.write().await = Some(Arc::new(ProviderMeta {
            api_token,
            endpoint,
            tls_skip_verify,
            api,
        }));
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("cancelling in-flight operations");
        self.cancel.cancel();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type)?.validate(&config))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let version = u64::try_from(version)
            .map_err(|_| ProviderError::Validation(format!("invalid schema version {}", version)))?;
        self.resource(resource_type)?.upgrade_state(version, state)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        Ok(self
            .resource(resource_type)?
            .plan(prior_state.as_ref(), proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let meta = self.meta().await;
        resource
            .create(meta.as_deref(), planned_state, &self.cancel.child_token())
            .await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let meta = self.meta().await;
        let state = resource
            .read(meta.as_deref(), current_state, &self.cancel.child_token())
            .await?;
        Ok(state.unwrap_or(Value::Null))
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let meta = self.meta().await;
        resource
            .update(
                meta.as_deref(),
                prior_state,
                planned_state,
                &self.cancel.child_token(),
            )
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let meta = self.meta().await;
        resource
            .delete(meta.as_deref(), current_state, &self.cancel.child_token())
            .await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let state = self.resource(resource_type)?.import(id)?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.data_source(data_source_type)?.schema();
        Ok(validate(&schema, &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let meta = self.meta().await.ok_or(ProviderError::NotConfigured)?;
        data_source
            .read(&meta.api, &config, &self.cancel.child_token())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[tokio::test]
    async fn test_configure_falls_back_to_environment() {
        let provider = InstanaProvider::new().with_env(env(&[
            (API_TOKEN_ENV, "token-from-env"),
            (ENDPOINT_ENV, "tenant-unit.instana.io"),
        ]));
        let diagnostics = provider.configure(json!({})).await.unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let meta = provider.meta().await.unwrap();
        assert_eq!(meta.api_token, "token-from-env");
        assert_eq!(meta.endpoint, "tenant-unit.instana.io");
        assert!(!meta.tls_skip_verify);
    }

    #[tokio::test]
    async fn test_configured_values_win_over_environment() {
        let provider = InstanaProvider::new().with_env(env(&[(API_TOKEN_ENV, "token-from-env")]));
        let diagnostics = provider
            .configure(json!({"api_token": " configured ", "endpoint": "eu.instana.io", "tls_skip_verify": true}))
            .await
            .unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let meta = provider.meta().await.unwrap();
        assert_eq!(meta.api_token, "configured");
        assert!(meta.tls_skip_verify);
    }

    #[tokio::test]
    async fn test_unknown_token_is_an_error_despite_environment() {
        let provider = InstanaProvider::new().with_env(env(&[
            (API_TOKEN_ENV, "token-from-env"),
            (ENDPOINT_ENV, "tenant-unit.instana.io"),
        ]));
        let diagnostics = provider
            .configure(json!({"api_token": crate::value::UNKNOWN_VALUE}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Unknown Instana API Token");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("api_token"));
        assert!(provider.meta().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_settings_are_reported() {
        let provider = InstanaProvider::new().with_env(|_| None);
        let diagnostics = provider.configure(json!({})).await.unwrap();
        let summaries: Vec<&str> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Missing Instana API Token", "Missing Instana Endpoint"]);
    }

    #[tokio::test]
    async fn test_operations_require_configuration() {
        let provider = InstanaProvider::new().with_env(|_| None);
        let err = provider
            .read("instana_alerting_channel", json!({"id": "abc"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));

        let err = provider
            .read_data_source("instana_synthetic_location", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let provider = InstanaProvider::new();
        let err = provider
            .plan("instana_unknown", None, json!({}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[test]
    fn test_metadata_lists_catalog() {
        let metadata = InstanaProvider::new().metadata();
        assert_eq!(metadata.type_name, "instana");
        assert!(metadata.resources.contains(&"instana_api_token".to_string()));
        assert!(metadata.resources.contains(&"instana_website_monitoring_config".to_string()));
        assert!(metadata.resources.contains(&"instana_slo_config".to_string()));
        assert!(metadata.resources.contains(&"instana_synthetic_test".to_string()));
        assert!(metadata.resources.contains(&"instana_automation_policy".to_string()));
        assert!(metadata.data_sources.contains(&"instana_host_agents".to_string()));
        assert!(metadata.data_sources.contains(&"instana_users".to_string()));
        assert!(metadata.data_sources.contains(&"instana_custom_event_specification".to_string()));
        assert!(metadata.resources.iter().all(|name| name.starts_with("instana_")));
    }

    #[test]
    fn test_meta_debug_redacts_token() {
        let meta = ProviderMeta {
            api_token: "secret-token".to_string(),
            endpoint: "eu.instana.io".to_string(),
            tls_skip_verify: false,
            api: InstanaApi::new("secret-token", "eu.instana.io", false).unwrap(),
        };
        let rendered = format!("{:?}", meta);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
