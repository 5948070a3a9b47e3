//! Credential context attached to every Assets API request

use std::fmt;

/// Host serving the Assets REST API for cloud workspaces
pub const ASSETS_API_HOST: &str = "https://api.atlassian.com";

/// Base URL, user and API token for one Assets workspace.
///
/// Built once from configuration and handed to the executor; the transport
/// attaches it to each outgoing call as HTTP basic auth.
#[derive(Clone)]
pub struct CredentialContext {
    base_url: String,
    user: String,
    api_token: String,
}

impl CredentialContext {
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.into(),
            api_token: api_token.into(),
        }
    }

    /// Credentials for a cloud workspace, addressed through the shared API host
    pub fn for_workspace(
        workspace_id: &str,
        user: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self::new(workspace_base_url(workspace_id), user, api_token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// Join a request path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialContext")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

/// Versioned API root for a workspace
pub fn workspace_base_url(workspace_id: &str) -> String {
    format!("{}/jsm/assets/workspace/{}/v1", ASSETS_API_HOST, workspace_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_duplicate_slashes() {
        let creds = CredentialContext::new("https://example.test/v1/", "me", "secret");
        assert_eq!(creds.endpoint("/object/101"), "https://example.test/v1/object/101");
        assert_eq!(creds.endpoint("object/aql"), "https://example.test/v1/object/aql");
    }

    #[test]
    fn test_workspace_base_url() {
        let creds = CredentialContext::for_workspace("abc-123", "me", "secret");
        assert_eq!(
            creds.base_url(),
            "https://api.atlassian.com/jsm/assets/workspace/abc-123/v1"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = CredentialContext::new("https://example.test", "me", "super-secret");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("[REDACTED]"));
    }
}
