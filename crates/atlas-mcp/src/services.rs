//! Service clients built from configuration, and the tool registry over them.

use std::sync::Arc;

use atlas_confluence::ConfluenceClient;
use atlas_core::config::{Config, Service, ServiceConfig};
use atlas_core::http::mask_url;
use atlas_core::{HttpClient, Result, ServiceProvider};
use atlas_jira::JiraClient;
use atlas_opsgenie::OpsgenieClient;
use tracing::info;

use crate::registry::{RegistryError, ToolRegistry};
use crate::tools;

/// One client per configured service.
#[derive(Clone, Default)]
pub struct Services {
    pub jira: Option<Arc<JiraClient>>,
    pub confluence: Option<Arc<ConfluenceClient>>,
    pub opsgenie: Option<Arc<OpsgenieClient>>,
}

impl Services {
    /// Build a client for every configured service. Unconfigured services are skipped.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut services = Services::default();
        for service in config.configured_services() {
            let Some(section) = config.service(service) else {
                continue;
            };
            let http = http_client(service, section, config)?;
            info!(service = service.name(), url = %mask_url(http.base_url()), "Service configured");
            match service {
                Service::Jira => {
                    let client = JiraClient::new(http).with_projects_filter(section.projects_filter.clone());
                    services.jira = Some(Arc::new(client));
                }
                Service::Confluence => {
                    let client =
                        ConfluenceClient::new(http).with_spaces_filter(section.spaces_filter.clone());
                    services.confluence = Some(Arc::new(client));
                }
                Service::Opsgenie => {
                    services.opsgenie = Some(Arc::new(OpsgenieClient::new(http)));
                }
            }
        }
        Ok(services)
    }

    pub fn is_empty(&self) -> bool {
        self.jira.is_none() && self.confluence.is_none() && self.opsgenie.is_none()
    }

    /// Health-checkable view of the configured clients.
    pub fn providers(&self) -> Vec<Arc<dyn ServiceProvider>> {
        let mut providers: Vec<Arc<dyn ServiceProvider>> = Vec::new();
        if let Some(jira) = &self.jira {
            providers.push(jira.clone());
        }
        if let Some(confluence) = &self.confluence {
            providers.push(confluence.clone());
        }
        if let Some(opsgenie) = &self.opsgenie {
            providers.push(opsgenie.clone());
        }
        providers
    }
}

fn http_client(service: Service, section: &ServiceConfig, config: &Config) -> Result<HttpClient> {
    let http_config = section.http_config(service, &config.http)?;
    let credential = section.credential(service)?;
    HttpClient::new(http_config, Arc::new(credential))
}

/// Register the tool table of every configured service.
pub fn build_registry(services: &Services) -> std::result::Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    if let Some(jira) = &services.jira {
        registry.register_all(tools::jira::tools(Arc::clone(jira)))?;
    }
    if let Some(confluence) = &services.confluence {
        registry.register_all(tools::confluence::tools(Arc::clone(confluence)))?;
    }
    if let Some(opsgenie) = &services.opsgenie {
        registry.register_all(tools::opsgenie::tools(Arc::clone(opsgenie)))?;
    }
    info!(tools = registry.len(), "Tool registry built");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolFilter;
    use crate::tools::Tag;

    fn config(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_empty_config_has_no_services() {
        let services = Services::from_config(&Config::default()).unwrap();
        assert!(services.is_empty());
        assert!(build_registry(&services).unwrap().is_empty());
    }

    #[test]
    fn test_registry_covers_configured_services() {
        let config = config(
            r#"
            [jira]
            url = "https://example.atlassian.net"
            username = "me@example.com"
            api_token = "secret-token"

            [opsgenie]
            api_key = "genie-key"
            "#,
        );
        let services = Services::from_config(&config).unwrap();
        assert!(services.jira.is_some());
        assert!(services.confluence.is_none());
        assert!(services.opsgenie.is_some());
        assert_eq!(services.providers().len(), 2);

        let registry = build_registry(&services).unwrap();
        assert_eq!(registry.len(), 25);
        assert!(registry.names().all(|n| !n.starts_with("confluence_")));

        for name in registry.names() {
            let tool = registry.get(name).unwrap();
            let services = [Tag::Jira, Tag::Confluence, Tag::Opsgenie]
                .iter()
                .filter(|t| tool.has_tag(**t))
                .count();
            assert_eq!(services, 1, "{}", name);
        }

        let read_only = registry.list(&ToolFilter::new(Vec::<String>::new(), true));
        assert_eq!(read_only.len(), 16);
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        let config = config(
            r#"
            [confluence]
            url = "https://wiki.example.com"
            "#,
        );
        let err = Services::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), "config_error");
    }
}
