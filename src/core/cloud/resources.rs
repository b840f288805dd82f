use serde_json::Value;

use super::{join_segments, require_non_empty, CloudGateway, MANAGEMENT_SCOPE};
use crate::error::{ToolError, ToolOutcome};

pub const ENCRYPTION_ON: &str = "Encryption BLOB: Turned On";
pub const ENCRYPTION_OFF: &str = "Encryption BLOB: Turned Off";

const STORAGE_API_VERSION: &str = "2023-01-01";
const BLOB_ENCRYPTION_POINTER: &str = "/properties/encryption/services/blob/enabled";

impl CloudGateway {
    /// Reads `properties.encryption.services.blob.enabled`. A missing link in
    /// that chain reads as disabled; an unknown account is `NotFound`.
    pub async fn storage_encryption_enabled(
        &self,
        subscription_id: &str,
        resource_group: &str,
        account_name: &str,
    ) -> ToolOutcome<bool> {
        require_non_empty("subscription_id", subscription_id)?;
        require_non_empty("resource_group", resource_group)?;
        require_non_empty("storage_account_name", account_name)?;

        let url = join_segments(
            &self.management_endpoint,
            [
                "subscriptions",
                subscription_id,
                "resourceGroups",
                resource_group,
                "providers",
                "Microsoft.Storage",
                "storageAccounts",
                account_name,
            ],
        );
        tracing::debug!("[CloudGateway] GET {}", url);

        let request = self
            .client
            .get(url)
            .query(&[("api-version", STORAGE_API_VERSION)]);
        let resource = format!(
            "storage account '{}' in resource group '{}'",
            account_name, resource_group
        );
        let response = self
            .send_authorized(request, MANAGEMENT_SCOPE, &resource)
            .await?;

        let body = response.text().await?;
        let descriptor: Value = serde_json::from_str(&body).map_err(|e| {
            ToolError::MalformedResponse(format!("storage account payload is not JSON: {}", e))
        })?;

        Ok(blob_encryption_flag(&descriptor))
    }

    pub async fn check_storage_encryption(
        &self,
        subscription_id: &str,
        resource_group: &str,
        account_name: &str,
    ) -> ToolOutcome<String> {
        let enabled = self
            .storage_encryption_enabled(subscription_id, resource_group, account_name)
            .await?;
        Ok(encryption_sentence(enabled).to_string())
    }
}

fn blob_encryption_flag(descriptor: &Value) -> bool {
    descriptor
        .pointer(BLOB_ENCRYPTION_POINTER)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn encryption_sentence(enabled: bool) -> &'static str {
    if enabled {
        ENCRYPTION_ON
    } else {
        ENCRYPTION_OFF
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::gateway_for;
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ACCOUNT_PATH: &str =
        "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Storage/storageAccounts/acct1";

    #[test]
    fn test_blob_encryption_flag_fails_closed() {
        let on = json!({"properties": {"encryption": {"services": {"blob": {"enabled": true}}}}});
        assert!(blob_encryption_flag(&on));

        let off = json!({"properties": {"encryption": {"services": {"blob": {"enabled": false}}}}});
        assert!(!blob_encryption_flag(&off));

        for partial in [
            json!({}),
            json!({"properties": {}}),
            json!({"properties": {"encryption": {}}}),
            json!({"properties": {"encryption": {"services": {"file": {"enabled": true}}}}}),
            json!({"properties": {"encryption": {"services": {"blob": {}}}}}),
            json!({"properties": {"encryption": {"services": {"blob": {"enabled": "true"}}}}}),
        ] {
            assert!(!blob_encryption_flag(&partial), "{}", partial);
        }
    }

    #[test]
    fn test_sentences_are_exact() {
        assert_eq!(encryption_sentence(true), "Encryption BLOB: Turned On");
        assert_eq!(encryption_sentence(false), "Encryption BLOB: Turned Off");
    }

    #[tokio::test]
    async fn test_check_storage_encryption() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(ACCOUNT_PATH))
            .and(query_param("api-version", STORAGE_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "acct1",
                "properties": {"encryption": {"services": {"blob": {"enabled": true, "keyType": "Account"}}}}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let gateway = gateway_for(&mock_server);
        let text = gateway
            .check_storage_encryption("sub-1", "rg-1", "acct1")
            .await
            .unwrap();
        assert_eq!(text, ENCRYPTION_ON);
    }

    #[tokio::test]
    async fn test_missing_property_reads_as_off() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(ACCOUNT_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"name": "acct1", "properties": {}})),
            )
            .mount(&mock_server)
            .await;

        let gateway = gateway_for(&mock_server);
        let text = gateway
            .check_storage_encryption("sub-1", "rg-1", "acct1")
            .await
            .unwrap();
        assert_eq!(text, ENCRYPTION_OFF);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "ResourceGroupNotFound"}
            })))
            .mount(&mock_server)
            .await;

        let gateway = gateway_for(&mock_server);
        let err = gateway
            .check_storage_encryption("sub-1", "missing", "acct1")
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
