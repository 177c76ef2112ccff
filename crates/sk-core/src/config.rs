//! Automation toggles for action resolution.

use serde::{Deserialize, Serialize};

/// Process-wide automation settings.
///
/// Read by plugins during hydration and by flow steps deciding whether to
/// prompt the user or resolve automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Let talent-style plugins activate themselves.
    pub automation_enabled: bool,
    /// Suspend on the modifier HUD before rolling.
    pub prompt_modifiers: bool,
    /// Decrement uses of limited items.
    pub consume_limited_uses: bool,
    /// Unload loading weapons after they fire.
    pub consume_loading: bool,
    /// Apply overkill heat to the attacker automatically.
    pub overkill_heat: bool,
    /// Apply structure and stress results automatically.
    pub structure_automation: bool,
    /// RNG seed for the reference dice evaluator.
    pub seed: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            automation_enabled: true,
            prompt_modifiers: true,
            consume_limited_uses: true,
            consume_loading: true,
            overkill_heat: true,
            structure_automation: true,
            seed: 42,
        }
    }
}

impl AutomationConfig {
    /// Enable or disable plugin automation.
    pub fn with_automation(mut self, enabled: bool) -> Self {
        self.automation_enabled = enabled;
        self
    }

    /// Enable or disable the modifier HUD prompt.
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt_modifiers = prompt;
        self
    }

    /// Enable or disable resource consumption (limited uses and loading).
    pub fn with_resource_consumption(mut self, enabled: bool) -> Self {
        self.consume_limited_uses = enabled;
        self.consume_loading = enabled;
        self
    }

    /// Enable or disable automatic structure and stress results.
    pub fn with_structure_automation(mut self, enabled: bool) -> Self {
        self.structure_automation = enabled;
        self
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = AutomationConfig::default();
        assert!(cfg.automation_enabled);
        assert!(cfg.prompt_modifiers);
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn builder_methods() {
        let cfg = AutomationConfig::default()
            .with_automation(false)
            .with_prompt(false)
            .with_resource_consumption(false)
            .with_seed(7);
        assert!(!cfg.automation_enabled);
        assert!(!cfg.prompt_modifiers);
        assert!(!cfg.consume_loading);
        assert!(!cfg.consume_limited_uses);
        assert_eq!(cfg.seed, 7);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: AutomationConfig = serde_json::from_str(r#"{ "prompt_modifiers": false }"#).unwrap();
        assert!(!cfg.prompt_modifiers);
        assert!(cfg.automation_enabled);
        assert!(cfg.overkill_heat);
    }
}
