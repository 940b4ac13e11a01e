//! Prepare form use case.
//! Loads a donation form for display and closes it while the gateway cannot take payments.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::settings::SettingsCache;
use crate::domain::{FormDefinition, FormStatus};
use crate::gateway::GatewayClient;
use crate::ports::{FormRepository, RepositoryResult};
use crate::use_cases::resolve_environment::{EnvironmentResolver, ResolvedEnvironment};

pub const GATEWAY_NOT_READY_WARNING: &str =
    "Payment client is not ready to deliver information to the processor API. Configure the gateway settings.";

#[derive(Debug)]
pub struct PreparedForm {
    pub form: FormDefinition,
    pub environment: ResolvedEnvironment,
    pub gateway_ready: bool,
}

pub struct PrepareForm {
    forms: Arc<dyn FormRepository>,
    gateway: Arc<dyn GatewayClient>,
    settings: Arc<SettingsCache>,
}

impl PrepareForm {
    pub fn new(
        forms: Arc<dyn FormRepository>,
        gateway: Arc<dyn GatewayClient>,
        settings: Arc<SettingsCache>,
    ) -> Self {
        Self {
            forms,
            gateway,
            settings,
        }
    }

    pub async fn execute(&self, form_id: Uuid) -> RepositoryResult<PreparedForm> {
        let mut form = self.forms.get(form_id).await?;
        let gateway_ready = self.gateway.is_ready();

        let environment = {
            let settings = self.settings.snapshot();
            EnvironmentResolver::new(&settings).resolve(form.id, gateway_ready)
        };

        if !gateway_ready {
            if form.status != FormStatus::Closed {
                self.forms.set_status(form.id, FormStatus::Closed).await?;
                form.status = FormStatus::Closed;
            }
            tracing::warn!(
                form_id = %form.id,
                gateway = self.gateway.name(),
                "{}",
                GATEWAY_NOT_READY_WARNING
            );
        }

        Ok(PreparedForm {
            form,
            environment,
            gateway_ready,
        })
    }
}
