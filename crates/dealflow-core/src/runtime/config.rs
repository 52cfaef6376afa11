//! Runtime configuration

use std::time::Duration;

/// Default persona text used when the caller supplies none
pub const DEFAULT_INSTRUCTIONS: &str = "You are a CRM assistant. You help the user manage \
deals, contacts and their sales pipeline. Use the available tools to read and change data; \
never invent records. Ask for clarification when a request is ambiguous.";

/// Configuration for the agent runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Hard bound on steps per run
    pub max_steps: u32,
    /// Timeout covering one model invocation (all providers included)
    pub step_timeout: Duration,
    /// Per-tool execution timeout
    pub tool_timeout: Duration,
    /// Model override; empty means each provider's default
    pub model: Option<String>,
    /// Max tokens per completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Persona text
    pub base_instructions: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: 8,
            step_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
            model: None,
            max_tokens: Some(1024),
            temperature: Some(0.2),
            base_instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Set the step bound
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the step timeout
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Set the per-tool timeout
    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Set the model override
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the persona text
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.base_instructions = instructions.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = RuntimeConfig::default()
            .with_max_steps(3)
            .with_step_timeout(Duration::from_secs(10))
            .with_model("gpt-4o");

        assert_eq!(config.max_steps, 3);
        assert_eq!(config.step_timeout, Duration::from_secs(10));
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert!(!config.base_instructions.is_empty());
    }
}
