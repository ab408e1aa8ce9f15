//! Client for the Instana REST API.
//!
//! [`InstanaApi`] is the entry point. It owns one shared [`RestClient`] and
//! hands out a typed endpoint per entity:
//!
//! ```no_run
//! use terraform_provider_instana::restapi::{InstanaApi, ReadOnlyRestResource};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), terraform_provider_instana::restapi::ApiError> {
//! let api = InstanaApi::new("token", "tenant-unit.instana.io", false)?;
//! let channels = api.alerting_channels().get_all(&CancellationToken::new()).await?;
//! # let _ = channels;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
#[allow(missing_docs)]
pub mod models;
mod resource;

use std::sync::Arc;

pub use client::{ClientOptions, RestClient, RetryPolicy};
pub use error::ApiError;
pub use resource::{
    DataObject, DefaultRestResource, HostAgentResource, ReadOnlyRestResource, RestResource,
    WebsiteMonitoringConfigResource, WriteMode,
};

use models::*;

/// Typed access to every endpoint the provider uses.
#[derive(Debug, Clone)]
pub struct InstanaApi {
    client: Arc<RestClient>,
}

impl InstanaApi {
    /// Create the API root with default transport options.
    pub fn new(api_token: &str, endpoint: &str, tls_skip_verify: bool) -> Result<Self, ApiError> {
        Self::with_options(api_token, endpoint, tls_skip_verify, ClientOptions::default())
    }

    /// Create the API root with custom transport options.
    pub fn with_options(
        api_token: &str,
        endpoint: &str,
        tls_skip_verify: bool,
        options: ClientOptions,
    ) -> Result<Self, ApiError> {
        let client = RestClient::new(api_token, endpoint, tls_skip_verify, options)?;
        Ok(Self::from_client(Arc::new(client)))
    }

    /// Wrap an existing client.
    pub fn from_client(client: Arc<RestClient>) -> Self {
        Self { client }
    }

    /// The shared low level client.
    pub fn client(&self) -> &Arc<RestClient> {
        &self.client
    }

    fn endpoint<T: DataObject>(&self, path: &'static str, mode: WriteMode) -> Box<dyn RestResource<T>> {
        Box::new(DefaultRestResource::new(self.client.clone(), path, mode))
    }

    fn read_only<T: DataObject>(&self, path: &'static str) -> Box<dyn ReadOnlyRestResource<T>> {
        Box::new(DefaultRestResource::<T>::new(
            self.client.clone(),
            path,
            WriteMode::CreatePostUpdateNotSupported,
        ))
    }

    /// Alerting channels.
    pub fn alerting_channels(&self) -> Box<dyn RestResource<AlertingChannel>> {
        self.endpoint(ALERTING_CHANNELS_PATH, WriteMode::CreatePutUpdatePut)
    }

    /// Alerting configurations routing events to channels.
    pub fn alerting_configs(&self) -> Box<dyn RestResource<AlertingConfig>> {
        self.endpoint(ALERTING_CONFIGS_PATH, WriteMode::CreatePutUpdatePut)
    }

    /// API tokens.
    pub fn api_tokens(&self) -> Box<dyn RestResource<ApiToken>> {
        self.endpoint(API_TOKENS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Application perspectives.
    pub fn application_configs(&self) -> Box<dyn RestResource<ApplicationConfig>> {
        self.endpoint(APPLICATION_CONFIGS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Application smart alerts.
    pub fn application_alert_configs(&self) -> Box<dyn RestResource<ApplicationAlertConfig>> {
        self.endpoint(APPLICATION_ALERT_CONFIGS_PATH, WriteMode::CreatePostUpdatePost)
    }

    /// Global application smart alerts.
    pub fn global_application_alert_configs(
        &self,
    ) -> Box<dyn RestResource<ApplicationAlertConfig>> {
        self.endpoint(
            GLOBAL_APPLICATION_ALERT_CONFIGS_PATH,
            WriteMode::CreatePostUpdatePost,
        )
    }

    /// Infrastructure smart alerts.
    pub fn infra_alert_configs(&self) -> Box<dyn RestResource<InfraAlertConfig>> {
        self.endpoint(INFRA_ALERT_CONFIGS_PATH, WriteMode::CreatePostUpdatePost)
    }

    /// Log smart alerts.
    pub fn log_alert_configs(&self) -> Box<dyn RestResource<LogAlertConfig>> {
        self.endpoint(LOG_ALERT_CONFIGS_PATH, WriteMode::CreatePostUpdatePost)
    }

    /// Website smart alerts.
    pub fn website_alert_configs(&self) -> Box<dyn RestResource<WebsiteAlertConfig>> {
        self.endpoint(WEBSITE_ALERT_CONFIGS_PATH, WriteMode::CreatePostUpdatePost)
    }

    /// Custom event specifications.
    pub fn custom_event_specifications(&self) -> Box<dyn RestResource<CustomEventSpecification>> {
        self.endpoint(CUSTOM_EVENT_SPECIFICATIONS_PATH, WriteMode::CreatePutUpdatePut)
    }

    /// Built-in event specifications.
    pub fn builtin_event_specifications(
        &self,
    ) -> Box<dyn ReadOnlyRestResource<BuiltinEventSpecification>> {
        self.read_only(BUILTIN_EVENT_SPECIFICATIONS_PATH)
    }

    /// Groups.
    pub fn groups(&self) -> Box<dyn RestResource<Group>> {
        self.endpoint(GROUPS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Roles.
    pub fn roles(&self) -> Box<dyn RestResource<Role>> {
        self.endpoint(ROLES_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Teams.
    pub fn teams(&self) -> Box<dyn RestResource<Team>> {
        self.endpoint(TEAMS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Service level indicators.
    pub fn sli_configs(&self) -> Box<dyn RestResource<SliConfig>> {
        self.endpoint(SLI_CONFIGS_PATH, WriteMode::CreatePostUpdateNotSupported)
    }

    /// Service level objectives.
    pub fn slo_configs(&self) -> Box<dyn RestResource<SloConfig>> {
        self.endpoint(SLO_CONFIGS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// SLO smart alerts.
    pub fn slo_alert_configs(&self) -> Box<dyn RestResource<SloAlertConfig>> {
        self.endpoint(SLO_ALERT_CONFIGS_PATH, WriteMode::CreatePostUpdatePost)
    }

    /// SLO correction windows.
    pub fn slo_correction_configs(&self) -> Box<dyn RestResource<SloCorrectionConfig>> {
        self.endpoint(SLO_CORRECTION_CONFIGS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Website monitoring configurations.
    pub fn website_monitoring_configs(&self) -> Box<dyn RestResource<WebsiteMonitoringConfig>> {
        Box::new(WebsiteMonitoringConfigResource::new(self.client.clone()))
    }

    /// Automation actions.
    pub fn automation_actions(&self) -> Box<dyn RestResource<AutomationAction>> {
        self.endpoint(AUTOMATION_ACTIONS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Automation policies.
    pub fn automation_policies(&self) -> Box<dyn RestResource<AutomationPolicy>> {
        self.endpoint(AUTOMATION_POLICIES_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Custom dashboards.
    pub fn custom_dashboards(&self) -> Box<dyn RestResource<CustomDashboard>> {
        self.endpoint(CUSTOM_DASHBOARDS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Synthetic test locations.
    pub fn synthetic_locations(&self) -> Box<dyn ReadOnlyRestResource<SyntheticLocation>> {
        self.read_only(SYNTHETIC_LOCATIONS_PATH)
    }

    /// Synthetic tests.
    pub fn synthetic_tests(&self) -> Box<dyn RestResource<SyntheticTest>> {
        self.endpoint(SYNTHETIC_TESTS_PATH, WriteMode::CreatePostUpdatePut)
    }

    /// Synthetic smart alerts.
    pub fn synthetic_alert_configs(&self) -> Box<dyn RestResource<SyntheticAlertConfig>> {
        self.endpoint(SYNTHETIC_ALERT_CONFIGS_PATH, WriteMode::CreatePostUpdatePost)
    }

    /// Users of the tenant unit.
    pub fn users(&self) -> Box<dyn ReadOnlyRestResource<User>> {
        self.read_only(USERS_PATH)
    }

    /// Host agents.
    pub fn host_agents(&self) -> HostAgentResource {
        HostAgentResource::new(self.client.clone())
    }
}
