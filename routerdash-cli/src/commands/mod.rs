mod backend;
mod doctor;

use std::path::PathBuf;
use std::sync::Arc;

use routerdash_core::api::DashboardApi;
use routerdash_core::config::DashConfig;
use routerdash_core::session::SessionStore;

pub use backend::{run_activate, run_alias, run_devices, run_dormant, run_export, run_login, run_logout};
pub use doctor::run_doctor;

/// Everything a one-shot command needs, resolved once in `main`
pub struct CommandEnv {
    pub config: DashConfig,
    pub config_path: Option<PathBuf>,
    pub api: Arc<dyn DashboardApi>,
    pub session: Arc<dyn SessionStore>,
    pub demo: bool,
}
