//! GitLab v4 runners API client.
//!
//! Read and delete operations authenticate with the personal access token
//! (`PRIVATE-TOKEN` header); create and verify authenticate with the token
//! carried in the form body, per the GitLab runners API.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use crate::error::RegistryError;
use crate::io::registry::{ClientFactory, RegistryClient, RunnerDetail, RunnerId, RunnerSummary};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Client for one GitLab API base url.
pub struct GitlabClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GitlabClient {
    pub fn new(base_url: &str, access_token: &str) -> Result<Self, RegistryError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RegistryError::Connection(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn map_transport(err: reqwest::Error) -> RegistryError {
        if err.is_connect() || err.is_timeout() {
            RegistryError::Connection(err.to_string())
        } else {
            RegistryError::Protocol(err.to_string())
        }
    }

    fn check_status(response: Response) -> Result<Response, RegistryError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RegistryError::Auth(format!(
                "{status} for {}",
                response.url()
            )));
        }
        if !status.is_success() {
            return Err(RegistryError::Protocol(format!(
                "unexpected status {status} for {}",
                response.url()
            )));
        }
        Ok(response)
    }
}

impl RegistryClient for GitlabClient {
    fn list(&self, tag_filter: &[String]) -> Result<Vec<RunnerSummary>, RegistryError> {
        let response = self
            .http
            .get(self.endpoint("runners/all"))
            .header(PRIVATE_TOKEN_HEADER, &self.access_token)
            .query(&[("tag_list", tag_filter.join(","))])
            .send()
            .map_err(Self::map_transport)?;
        Self::check_status(response)?
            .json()
            .map_err(|err| RegistryError::Protocol(err.to_string()))
    }

    fn get(&self, id: RunnerId) -> Result<RunnerDetail, RegistryError> {
        let response = self
            .http
            .get(self.endpoint(&format!("runners/{id}")))
            .header(PRIVATE_TOKEN_HEADER, &self.access_token)
            .send()
            .map_err(Self::map_transport)?;
        Self::check_status(response)?
            .json()
            .map_err(|err| RegistryError::Protocol(err.to_string()))
    }

    fn create(
        &self,
        description: &str,
        tag_list: &[String],
        registration_secret: &str,
    ) -> Result<String, RegistryError> {
        #[derive(Deserialize)]
        struct Registered {
            #[serde(default)]
            token: String,
        }

        debug!(description, "registering runner");
        let form = [
            ("token", registration_secret.to_string()),
            ("description", description.to_string()),
            ("tag_list", tag_list.join(",")),
        ];
        let response = self
            .http
            .post(self.endpoint("runners"))
            .form(&form)
            .send()
            .map_err(Self::map_transport)?;
        let registered: Registered = Self::check_status(response)?
            .json()
            .map_err(|err| RegistryError::Protocol(err.to_string()))?;
        Ok(registered.token)
    }

    fn delete(&self, id: RunnerId) -> Result<(), RegistryError> {
        let response = self
            .http
            .delete(self.endpoint(&format!("runners/{id}")))
            .header(PRIVATE_TOKEN_HEADER, &self.access_token)
            .send()
            .map_err(Self::map_transport)?;
        Self::check_status(response)?;
        Ok(())
    }

    fn verify(&self, token: &str) -> Result<bool, RegistryError> {
        let response = self
            .http
            .post(self.endpoint("runners/verify"))
            .form(&[("token", token)])
            .send()
            .map_err(Self::map_transport)?;
        // 403 means "token no longer valid", an expected answer here
        if response.status() == StatusCode::FORBIDDEN {
            return Ok(false);
        }
        Self::check_status(response)?;
        Ok(true)
    }
}

/// [`ClientFactory`] producing [`GitlabClient`]s.
pub struct GitlabFactory;

impl ClientFactory for GitlabFactory {
    fn client(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<Box<dyn RegistryClient>, RegistryError> {
        Ok(Box::new(GitlabClient::new(url, access_token)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_duplicate_slash() {
        let client =
            GitlabClient::new("https://gitlab.example.com/api/v4/", "tok").expect("client");
        assert_eq!(
            client.endpoint("runners/all"),
            "https://gitlab.example.com/api/v4/runners/all"
        );
    }

    #[test]
    fn detail_parses_registry_payload() {
        let raw = r#"{
            "id": 42,
            "description": "node03 main batch Runner",
            "token": "tok-42",
            "tag_list": ["node03", "managed"]
        }"#;
        let detail: RunnerDetail = serde_json::from_str(raw).expect("parse");
        assert_eq!(detail.id, 42);
        assert_eq!(detail.token, "tok-42");
        assert_eq!(detail.tag_list, ["node03", "managed"]);
    }

    #[test]
    fn summary_tolerates_missing_tag_list() {
        let raw = r#"{"id": 7, "description": "node03 main shell Runner"}"#;
        let summary: RunnerSummary = serde_json::from_str(raw).expect("parse");
        assert!(summary.tag_list.is_empty());
    }
}
