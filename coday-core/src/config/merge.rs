//! Hierarchical CODAY → PROJECT → USER merge (§4.5). Every merge function
//! here takes layers ordered least-specific first and is a pure function of
//! its inputs — no I/O — so the merge rules are unit-testable in isolation
//! from [`super::loader::ConfigLoader`].

use super::types::AiProviderLayer;
use super::types::IntegrationLayer;
use super::types::McpServerLayer;
use super::types::MergedAiProvider;
use super::types::MergedIntegration;
use super::types::MergedMcpServer;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::env;
use tracing::warn;

/// Host environment variables that may be copied into an MCP server's `env`
/// map without being explicitly whitelisted (§4.5).
pub const BUILTIN_SAFE_HOST_ENV_VARS: &[&str] = &[
    "PATH", "HOME", "USER", "TMPDIR", "TEMP", "TMP", "LANG", "LC_ALL", "LC_CTYPE", "TERM",
    "COLORTERM", "SHELL", "OS",
];

fn last_wins<T: Clone>(layers: &[Option<T>]) -> Option<T> {
    layers.iter().rev().find_map(|v| v.clone())
}

fn bool_or(layers: &[Option<bool>]) -> bool {
    layers.iter().any(|v| *v == Some(true))
}

fn bool_last_wins_default_true(layers: &[Option<bool>]) -> bool {
    last_wins(layers).unwrap_or(true)
}

fn concat_lists(layers: &[Option<Vec<String>>]) -> Vec<String> {
    layers
        .iter()
        .flat_map(|v| v.clone().unwrap_or_default())
        .collect()
}

/// `undefined` iff no layer sets the field; otherwise the concatenation of
/// every layer that did (§4.5 `allowedTools`).
fn concat_optional_lists(layers: &[Option<Vec<String>>]) -> Option<Vec<String>> {
    if layers.iter().all(|v| v.is_none()) {
        return None;
    }
    Some(concat_lists(layers))
}

fn union_sets(layers: &[Option<Vec<String>>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for name in layers.iter().flat_map(|v| v.iter().flatten()) {
        if seen.insert(name.clone()) {
            result.push(name.clone());
        }
    }
    result
}

fn deep_merge_env(layers: &[Option<IndexMap<String, String>>]) -> IndexMap<String, String> {
    let mut merged = IndexMap::new();
    for layer in layers.iter().flatten() {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Merge one MCP server's layers and apply the host environment fallback
/// (§4.5). Returns `None` (logging a warning) if the merged server has
/// neither a `command` nor a `url`.
pub fn merge_mcp_server(
    id: &str,
    layers: [Option<&McpServerLayer>; 3],
) -> Option<MergedMcpServer> {
    merge_mcp_server_with_host_env(id, layers, &collect_host_env())
}

fn collect_host_env() -> IndexMap<String, String> {
    env::vars().collect()
}

fn merge_mcp_server_with_host_env(
    id: &str,
    layers: [Option<&McpServerLayer>; 3],
    host_env: &IndexMap<String, String>,
) -> Option<MergedMcpServer> {
    let name = last_wins(&layers.map(|l| l.and_then(|l| l.name.clone())))
        .unwrap_or_else(|| id.to_string());
    let command = last_wins(&layers.map(|l| l.and_then(|l| l.command.clone())));
    let url = last_wins(&layers.map(|l| l.and_then(|l| l.url.clone())));
    let cwd = last_wins(&layers.map(|l| l.and_then(|l| l.cwd.clone())));
    let auth_token = last_wins(&layers.map(|l| l.and_then(|l| l.auth_token.clone())));
    let enabled = bool_last_wins_default_true(&layers.map(|l| l.and_then(|l| l.enabled)));
    let debug = bool_or(&layers.map(|l| l.and_then(|l| l.debug)));
    let no_share = bool_or(&layers.map(|l| l.and_then(|l| l.no_share)));
    let args = concat_lists(&layers.map(|l| l.and_then(|l| l.args.clone())));
    let allowed_tools = concat_optional_lists(&layers.map(|l| l.and_then(|l| l.allowed_tools.clone())));
    let mut merged_env = deep_merge_env(&layers.map(|l| l.and_then(|l| l.env.clone())));

    let env_var_names = union_sets(&layers.map(|l| l.and_then(|l| l.env_var_names.clone())));
    let whitelisted = union_sets(
        &layers.map(|l| l.and_then(|l| l.white_listed_host_env_var_names.clone())),
    );
    let mut fallback_names: Vec<&str> = BUILTIN_SAFE_HOST_ENV_VARS.to_vec();
    fallback_names.extend(env_var_names.iter().map(String::as_str));
    fallback_names.extend(whitelisted.iter().map(String::as_str));

    for name in fallback_names {
        if merged_env.contains_key(name) {
            continue;
        }
        if let Some(value) = host_env.get(name) {
            merged_env.insert(name.to_string(), value.clone());
        }
    }

    if command.is_none() && url.is_none() {
        warn!(id, "dropping MCP server with no command and no url");
        return None;
    }

    Some(MergedMcpServer {
        id: id.to_string(),
        name,
        command,
        url,
        args,
        env: merged_env,
        cwd,
        enabled,
        debug,
        allowed_tools,
        auth_token,
        no_share,
    })
}

pub fn merge_ai_provider(id: &str, layers: [Option<&AiProviderLayer>; 3]) -> MergedAiProvider {
    let name =
        last_wins(&layers.map(|l| l.and_then(|l| l.name.clone()))).unwrap_or_else(|| id.to_string());
    MergedAiProvider {
        id: id.to_string(),
        name,
        api_key: last_wins(&layers.map(|l| l.and_then(|l| l.api_key.clone()))),
        url: last_wins(&layers.map(|l| l.and_then(|l| l.url.clone()))),
        default_model: last_wins(&layers.map(|l| l.and_then(|l| l.default_model.clone()))),
        enabled: bool_last_wins_default_true(&layers.map(|l| l.and_then(|l| l.enabled))),
        debug: bool_or(&layers.map(|l| l.and_then(|l| l.debug))),
    }
}

pub fn merge_integration(name: &str, layers: [Option<&IntegrationLayer>; 3]) -> MergedIntegration {
    MergedIntegration {
        name: name.to_string(),
        api_key: last_wins(&layers.map(|l| l.and_then(|l| l.api_key.clone()))),
        url: last_wins(&layers.map(|l| l.and_then(|l| l.url.clone()))),
        enabled: bool_last_wins_default_true(&layers.map(|l| l.and_then(|l| l.enabled))),
        debug: bool_or(&layers.map(|l| l.and_then(|l| l.debug))),
        allowed_tools: concat_optional_lists(&layers.map(|l| l.and_then(|l| l.allowed_tools.clone()))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layer(
        command: Option<&str>,
        args: Option<Vec<&str>>,
        env: Option<Vec<(&str, &str)>>,
    ) -> McpServerLayer {
        McpServerLayer {
            command: command.map(str::to_string),
            args: args.map(|a| a.into_iter().map(str::to_string).collect()),
            env: env.map(|e| e.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn hierarchical_mcp_merge_example_from_spec() {
        let coday = layer(Some("docker"), Some(vec!["-e", "TOKEN"]), None);
        let mut coday = coday;
        coday.env_var_names = Some(vec!["TOKEN".to_string()]);
        let project = layer(None, Some(vec!["--network=host"]), None);
        let user = layer(Some("/bin/docker"), None, Some(vec![("TOKEN", "secret")]));

        let mut host_env = IndexMap::new();
        host_env.insert("TOKEN".to_string(), "hostval".to_string());

        let merged = merge_mcp_server_with_host_env(
            "gh",
            [Some(&coday), Some(&project), Some(&user)],
            &host_env,
        )
        .expect("merged");

        assert_eq!(merged.command, Some("/bin/docker".to_string()));
        assert_eq!(merged.args, vec!["-e", "TOKEN", "--network=host"]);
        assert_eq!(merged.env.get("TOKEN"), Some(&"secret".to_string()));
        assert!(merged.enabled);
        assert!(!merged.debug);
    }

    #[test]
    fn host_env_fallback_only_fills_unset_names() {
        let user = layer(Some("cmd"), None, None);
        let mut host_env = IndexMap::new();
        host_env.insert("PATH".to_string(), "/usr/bin".to_string());
        host_env.insert("SECRET_TOKEN".to_string(), "leak".to_string());

        let merged =
            merge_mcp_server_with_host_env("srv", [None, None, Some(&user)], &host_env).expect("merged");

        assert_eq!(merged.env.get("PATH"), Some(&"/usr/bin".to_string()));
        assert_eq!(merged.env.get("SECRET_TOKEN"), None);
    }

    #[test]
    fn missing_command_and_url_drops_server() {
        let user = layer(None, None, None);
        let merged = merge_mcp_server_with_host_env("srv", [None, None, Some(&user)], &IndexMap::new());
        assert!(merged.is_none());
    }

    #[test]
    fn no_share_is_logical_or() {
        let mut coday = McpServerLayer {
            command: Some("cmd".to_string()),
            ..Default::default()
        };
        coday.no_share = Some(false);
        let mut user = McpServerLayer::default();
        user.no_share = Some(true);

        let merged =
            merge_mcp_server_with_host_env("srv", [Some(&coday), None, Some(&user)], &IndexMap::new())
                .expect("merged");
        assert!(merged.no_share);
    }

    #[test]
    fn allowed_tools_undefined_iff_unset_everywhere() {
        let coday = McpServerLayer {
            command: Some("cmd".to_string()),
            ..Default::default()
        };
        let merged =
            merge_mcp_server_with_host_env("srv", [Some(&coday), None, None], &IndexMap::new())
                .expect("merged");
        assert_eq!(merged.allowed_tools, None);
    }
}
