//! Client sync

use super::Instance;
use super::object::ObjectTarget;
use crate::config::LoadedLabConfig;
use crate::error::LabConfigError;
use crate::reconcile::{NameFilter, SyncReport, reconcile};
use crds::Client;
use tracing::info;

impl Instance {
    /// Reconcile the control plane's Clients against the lab config
    pub async fn sync_clients(
        &self,
        config: &LoadedLabConfig,
        filter: Option<&NameFilter>,
    ) -> Result<SyncReport, LabConfigError> {
        info!(instance = %self.name(), "Syncing clients");
        let target = ObjectTarget::<Client>::new(self);
        reconcile(&target, &config.clients, filter, self.options()).await
    }
}
