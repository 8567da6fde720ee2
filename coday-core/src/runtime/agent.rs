use crate::tools::ToolSet;
use std::collections::HashMap;

/// Which tier of model an [`Agent`] prefers; the concrete model name is
/// resolved from the session's model table unless `model_name` overrides it
/// (§3 `Agent`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSize {
    Big,
    Small,
}

/// Per-integration tool allow-list an agent is restricted to; `None` means
/// every tool the integration exposes is available.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub allowed_tools: Option<Vec<String>>,
}

impl ToolFilter {
    pub fn allows(&self, tool_name: &str) -> bool {
        match &self.allowed_tools {
            Some(allowed) => allowed.iter().any(|t| t == tool_name),
            None => true,
        }
    }
}

/// A configured persona that can be invoked against a thread (§3 `Agent`).
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    pub description: String,
    pub system_instructions: String,
    pub model_size: ModelSize,
    pub model_name: Option<String>,
    pub temperature: f64,
    pub tools: ToolSet,
    pub integrations: HashMap<String, ToolFilter>,
}

/// Default sampling temperature when an [`Agent`] does not override it (§4.7).
pub const DEFAULT_TEMPERATURE: f64 = 0.8;

impl Agent {
    pub fn new(name: impl Into<String>, system_instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_instructions: system_instructions.into(),
            model_size: ModelSize::Big,
            model_name: None,
            temperature: DEFAULT_TEMPERATURE,
            tools: ToolSet::new(),
            integrations: HashMap::new(),
        }
    }
}
