use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::user::{find_user, user_state};
use super::DataSourceHandle;
use crate::error::ProviderError;
use crate::restapi::InstanaApi;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_users`: several users looked up by email in one request.
pub struct UsersDataSource;

fn user_type() -> AttributeType {
    AttributeType::object(HashMap::from([
        ("id".to_string(), AttributeType::String),
        ("email".to_string(), AttributeType::String),
        ("full_name".to_string(), AttributeType::String),
    ]))
}

#[async_trait]
impl DataSourceHandle for UsersDataSource {
    fn name(&self) -> &'static str {
        "users"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Data source for a list of Instana users")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "emails",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::required())
                    .with_description("The email addresses of the users"),
            )
            .with_attribute(
                "users",
                Attribute::new(AttributeType::list(user_type()), AttributeFlags::computed()),
            )
    }

    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let emails: Vec<String> = ObjectReader::new(config)?.required("emails")?;
        let users = api.users().get_all(cancel).await?;
        debug!(count = users.len(), requested = emails.len(), "users loaded");

        // Every requested email must resolve.
        let found = emails
            .iter()
            .map(|email| {
                find_user(&users, email)
                    .map(|user| user_state(user).into_value())
                    .ok_or_else(|| ProviderError::NotFound(format!("no user found with email {}", email)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ObjectWriter::new()
            .set("id", format!("users-{}", found.len()))
            .set("emails", emails)
            .set("users", found)
            .into_value())
    }
}
