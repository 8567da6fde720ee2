//! Reads the three YAML configuration layers from disk and produces the
//! merged view (§4.5, §6 "Config files").

use super::merge::merge_ai_provider;
use super::merge::merge_integration;
use super::merge::merge_mcp_server;
use super::types::AiProviderLayer;
use super::types::ConfigLevel;
use super::types::IntegrationLayer;
use super::types::McpServerLayer;
use super::types::MergedAiProvider;
use super::types::MergedIntegration;
use super::types::MergedMcpServer;
use crate::error::CodayError;
use crate::error::Result;
use indexmap::IndexMap;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

/// One layer file's contents, all sections optional (an absent file is
/// equivalent to an all-absent layer).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayerFile {
    #[serde(default)]
    pub mcp_servers: IndexMap<String, McpServerLayer>,
    #[serde(default)]
    pub ai_providers: IndexMap<String, AiProviderLayer>,
    #[serde(default)]
    pub integrations: IndexMap<String, IntegrationLayer>,
}

/// The merged view of all three levels, ready for the runtime and the
/// MCP connection manager (§4.5, §4.6).
#[derive(Debug, Clone, Default)]
pub struct MergedConfig {
    pub mcp_servers: Vec<MergedMcpServer>,
    pub ai_providers: Vec<MergedAiProvider>,
    pub integrations: Vec<MergedIntegration>,
}

/// Reads and merges CODAY → PROJECT → USER config files (§4.5, §6). Paths are
/// stored indexed by [`ConfigLevel`] so the merge order can never drift from
/// the level each path was given for.
pub struct ConfigLoader {
    paths: [PathBuf; 3],
}

impl ConfigLoader {
    pub fn new(coday_path: PathBuf, project_path: PathBuf, user_path: PathBuf) -> Self {
        let mut paths = [PathBuf::new(), PathBuf::new(), PathBuf::new()];
        paths[ConfigLevel::Coday as usize] = coday_path;
        paths[ConfigLevel::Project as usize] = project_path;
        paths[ConfigLevel::User as usize] = user_path;
        Self { paths }
    }

    /// Build the USER config path per §6: `<home>/.coday/users/<sanitised-username>/user.yaml`.
    pub fn user_config_path(home: &Path, username: &str) -> PathBuf {
        home.join(".coday")
            .join("users")
            .join(sanitize_username(username))
            .join("user.yaml")
    }

    async fn load_layer(path: &Path) -> Result<ConfigLayerFile> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ConfigLayerFile::default()),
            Err(err) => return Err(CodayError::Repository(err)),
        };
        serde_yaml::from_str(&contents)
            .map_err(|err| CodayError::Config(format!("{}: {err}", path.display())))
    }

    pub async fn load_merged(&self) -> Result<MergedConfig> {
        let coday = Self::load_layer(&self.paths[ConfigLevel::Coday as usize]).await?;
        let project = Self::load_layer(&self.paths[ConfigLevel::Project as usize]).await?;
        let user = Self::load_layer(&self.paths[ConfigLevel::User as usize]).await?;

        let mut ids: Vec<&String> = coday
            .mcp_servers
            .keys()
            .chain(project.mcp_servers.keys())
            .chain(user.mcp_servers.keys())
            .collect();
        ids.sort();
        ids.dedup();

        let mcp_servers = ids
            .into_iter()
            .filter_map(|id| {
                merge_mcp_server(
                    id,
                    [
                        coday.mcp_servers.get(id),
                        project.mcp_servers.get(id),
                        user.mcp_servers.get(id),
                    ],
                )
            })
            .collect();

        let mut provider_ids: Vec<&String> = coday
            .ai_providers
            .keys()
            .chain(project.ai_providers.keys())
            .chain(user.ai_providers.keys())
            .collect();
        provider_ids.sort();
        provider_ids.dedup();
        let ai_providers = provider_ids
            .into_iter()
            .map(|id| {
                merge_ai_provider(
                    id,
                    [
                        coday.ai_providers.get(id),
                        project.ai_providers.get(id),
                        user.ai_providers.get(id),
                    ],
                )
            })
            .collect();

        let mut integration_names: Vec<&String> = coday
            .integrations
            .keys()
            .chain(project.integrations.keys())
            .chain(user.integrations.keys())
            .collect();
        integration_names.sort();
        integration_names.dedup();
        let integrations = integration_names
            .into_iter()
            .map(|name| {
                merge_integration(
                    name,
                    [
                        coday.integrations.get(name),
                        project.integrations.get(name),
                        user.integrations.get(name),
                    ],
                )
            })
            .collect();

        debug!("config layers merged");
        Ok(MergedConfig {
            mcp_servers,
            ai_providers,
            integrations,
        })
    }
}

/// Username sanitisation for the USER config path (§6): non-alphanumeric → `_`.
pub fn sanitize_username(username: &str) -> String {
    username
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
