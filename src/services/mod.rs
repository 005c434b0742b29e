use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::labeler::{LabelComputer, StaticLabeler};
use crate::services::remote_labeler::RemoteLabeler;

pub mod delivery;
pub mod labeler;
pub mod remote_labeler;
pub mod worker;

/// Pick the label computer: remote when `LABELER_URL` is set, static otherwise.
pub fn build_labeler(config: &AppConfig) -> Arc<dyn LabelComputer> {
    match &config.labeler_url {
        Some(url) => {
            tracing::info!(labeler_url = %url, "Using remote label computer");
            Arc::new(RemoteLabeler::new(url.clone(), config.labeler_token.clone()))
        }
        None => {
            tracing::info!("Using static demonstration label computer");
            Arc::new(StaticLabeler::default())
        }
    }
}
