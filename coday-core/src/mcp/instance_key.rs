//! Deterministic hashing that lets identical MCP server configs share a
//! single backing process (§4.6).

use crate::config::MergedMcpServer;
use rand::Rng;
use sha2::Digest;
use sha2::Sha256;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Compute the instance key for a merged MCP server config (§4.6, §8 *MCP
/// hash stability*).
///
/// A `noShare` server always gets a fresh, unique key so it never shares a
/// backing process with another call, even for an identical config.
pub fn instance_key(server: &MergedMcpServer) -> String {
    if server.no_share {
        return no_share_token();
    }
    let canonical = canonical_projection(server);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn no_share_token() -> String {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let random: u64 = rand::rng().random();
    format!("no-share-{epoch}-{random:x}")
}

/// Build the canonical projection hashed by [`instance_key`]: `command`,
/// `url`, `args` (order preserved), `env` (keys sorted), `cwd`, `debug`.
/// `id`, `name`, `enabled`, `allowedTools`, and `authToken` are excluded
/// unless `authToken` happens to be embedded in `env`.
fn canonical_projection(server: &MergedMcpServer) -> String {
    let mut sorted_env: Vec<(&String, &String)> = server.env.iter().collect();
    sorted_env.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    out.push_str("command=");
    out.push_str(server.command.as_deref().unwrap_or(""));
    out.push('\n');
    out.push_str("url=");
    out.push_str(server.url.as_deref().unwrap_or(""));
    out.push('\n');
    out.push_str("args=");
    out.push_str(&server.args.join("\u{1f}"));
    out.push('\n');
    out.push_str("env=");
    for (key, value) in sorted_env {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\u{1f}');
    }
    out.push('\n');
    out.push_str("cwd=");
    out.push_str(server.cwd.as_deref().unwrap_or(""));
    out.push('\n');
    out.push_str("debug=");
    out.push_str(if server.debug { "true" } else { "false" });
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn base_server() -> MergedMcpServer {
        MergedMcpServer {
            id: "gh".to_string(),
            name: "gh".to_string(),
            command: Some("docker".to_string()),
            url: None,
            args: vec!["run".to_string(), "gh".to_string()],
            env: IndexMap::from([("B".to_string(), "2".to_string()), ("A".to_string(), "1".to_string())]),
            cwd: None,
            enabled: true,
            debug: false,
            allowed_tools: None,
            auth_token: None,
            no_share: false,
        }
    }

    #[test]
    fn ignores_id_name_enabled_allowed_tools_auth_token() {
        let base = base_server();
        let mut varied = base.clone();
        varied.id = "other-id".to_string();
        varied.name = "other name".to_string();
        varied.enabled = false;
        varied.allowed_tools = Some(vec!["x".to_string()]);
        varied.auth_token = Some("secret".to_string());

        assert_eq!(instance_key(&base), instance_key(&varied));
    }

    #[test]
    fn args_reorder_changes_hash() {
        let base = base_server();
        let mut reordered = base.clone();
        reordered.args.reverse();

        assert_ne!(instance_key(&base), instance_key(&reordered));
    }

    #[test]
    fn env_key_reorder_does_not_change_hash() {
        let base = base_server();
        let mut reordered = base.clone();
        reordered.env = IndexMap::from([
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ]);

        assert_eq!(instance_key(&base), instance_key(&reordered));
    }

    #[test]
    fn no_share_always_yields_a_fresh_key() {
        let mut server = base_server();
        server.no_share = true;

        assert_ne!(instance_key(&server), instance_key(&server));
    }
}
