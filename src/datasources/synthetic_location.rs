use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::DataSourceHandle;
use crate::error::ProviderError;
use crate::restapi::models::SyntheticLocation;
use crate::restapi::{InstanaApi, ReadOnlyRestResource};
use crate::schema::{Attribute, Schema, Validator};
use crate::value::{ObjectReader, ObjectWriter};

/// `instana_synthetic_location`: a location running synthetic tests.
///
/// Lookup keys left unset match any location; the first match wins.
pub struct SyntheticLocationDataSource;

fn matches(location: &SyntheticLocation, label: Option<&str>, location_type: Option<&str>) -> bool {
    label.map_or(true, |label| location.label == label)
        && location_type.map_or(true, |kind| location.location_type == kind)
}

#[async_trait]
impl DataSourceHandle for SyntheticLocationDataSource {
    fn name(&self) -> &'static str {
        "synthetic_location"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Data source for an Instana synthetic location")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("label", Attribute::optional_computed_string())
            .with_attribute("description", Attribute::optional_computed_string())
            .with_attribute(
                "location_type",
                Attribute::optional_computed_string()
                    .with_validator(Validator::one_of(&["Public", "Private"])),
            )
    }

    async fn read(
        &self,
        api: &InstanaApi,
        config: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ProviderError> {
        let reader = ObjectReader::new(config)?;
        let label: Option<String> = reader.optional("label")?;
        let location_type: Option<String> = reader.optional("location_type")?;

        let locations = api.synthetic_locations().get_all(cancel).await?;
        let location = locations
            .iter()
            .find(|l| matches(l, label.as_deref(), location_type.as_deref()))
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "no synthetic location found with label {} and type {}",
                    label.as_deref().unwrap_or("<any>"),
                    location_type.as_deref().unwrap_or("<any>")
                ))
            })?;

        Ok(ObjectWriter::new()
            .set("id", location.id.clone())
            .set("label", location.label.clone())
            .set("description", location.description.clone())
            .set("location_type", location.location_type.clone())
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let location = SyntheticLocation {
            id: "loc".to_string(),
            label: "Frankfurt".to_string(),
            description: String::new(),
            location_type: "Public".to_string(),
        };
        assert!(matches(&location, None, None));
        assert!(matches(&location, Some("Frankfurt"), Some("Public")));
        assert!(!matches(&location, Some("Frankfurt"), Some("Private")));
        assert!(!matches(&location, Some("Paris"), None));
    }
}
