//! Per-form gateway environment and merchant code prefix.

use uuid::Uuid;

use crate::config::settings::GatewaySettings;
use crate::gateway::GatewayEnvironment;

/// Prefix used when a form has no code override.
pub const DEFAULT_CODE_PREFIX: &str = "AAA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    /// Empty when the gateway is not configured or not ready.
    pub environment: String,
    pub code_prefix: String,
}

impl ResolvedEnvironment {
    pub fn gateway_environment(&self) -> Option<GatewayEnvironment> {
        GatewayEnvironment::parse(&self.environment)
    }
}

/// Reads settings only; closing forms is left to the caller.
pub struct EnvironmentResolver<'a> {
    settings: &'a GatewaySettings,
}

impl<'a> EnvironmentResolver<'a> {
    pub fn new(settings: &'a GatewaySettings) -> Self {
        Self { settings }
    }

    pub fn environment(&self, form_id: Uuid, client_ready: bool) -> String {
        if !client_ready {
            return String::new();
        }

        self.settings
            .form_environment(form_id)
            .or_else(|| self.settings.global_environment())
            .unwrap_or_default()
            .to_string()
    }

    pub fn code_prefix(&self, form_id: Uuid) -> String {
        self.settings
            .form_code_prefix(form_id)
            .unwrap_or(DEFAULT_CODE_PREFIX)
            .to_string()
    }

    pub fn resolve(&self, form_id: Uuid, client_ready: bool) -> ResolvedEnvironment {
        ResolvedEnvironment {
            environment: self.environment(form_id, client_ready),
            code_prefix: self.code_prefix(form_id),
        }
    }
}
