use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DataSourceHandle;
use crate::error::ProviderError;
use crate::restapi::models::User;
use crate::restapi::InstanaApi;
use crate::schema::{Attribute, Schema};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_user`: a user of the tenant looked up by email.
pub struct UserDataSource;

/// Find a user by email. Instana stores emails as entered, so the match
/// ignores case.
pub(super) fn find_user<'a>(users: &'a [User], email: &str) -> Option<&'a User> {
    users.iter().find(|user| user.email.eq_ignore_ascii_case(email))
}

pub(super) fn user_state(user: &User) -> ObjectWriter {
    ObjectWriter::new()
        .set("id", user.id.clone())
        .set("email", user.email.clone())
        .set("full_name", user.full_name.clone())
}

#[async_trait]
impl DataSourceHandle for UserDataSource {
    fn name(&self) -> &'static str {
        "user"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Data source for an Instana user")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "email",
                Attribute::required_string().with_description("The email address of the user"),
            )
            .with_attribute("full_name", Attribute::computed_string())
    }

    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let email: String = ObjectReader::new(config)?.required("email")?;
        let users = api.users().get_all(cancel).await?;
        debug!(count = users.len(), "users loaded");

        let user = find_user(&users, &email)
            .ok_or_else(|| ProviderError::NotFound(format!("no user found with email {}", email)))?;
        Ok(user_state(user).into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            full_name: format!("User {}", id),
            last_logged_in: None,
            group_count: None,
            tfa_enabled: None,
        }
    }

    #[test]
    fn test_find_user_ignores_case() {
        let users = vec![user("u1", "ops@example.com"), user("u2", "Dev@Example.com")];
        assert_eq!(find_user(&users, "dev@example.com").map(|u| u.id.as_str()), Some("u2"));
        assert!(find_user(&users, "nobody@example.com").is_none());
    }

    #[test]
    fn test_user_state() {
        let state = user_state(&user("u1", "ops@example.com")).into_value();
        assert_eq!(state["id"], "u1");
        assert_eq!(state["email"], "ops@example.com");
        assert_eq!(state["full_name"], "User u1");
    }
}
