//! Service manager definitions for the Gitea binary

use gitea_deploy_common::DeployConfig;
use std::path::PathBuf;

use super::TemplateProcessor;
use crate::system::ServiceManagerKind;
use crate::system::providers::macos::{LAUNCHD_LOG_FILE, launchd_label};

const SYSTEMD_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tpl/gitea.service"));
const LAUNCHD_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tpl/gitea.plist"));

/// Systemd unit / launchd plist for the Gitea binary
#[derive(Debug, Clone)]
pub struct ServiceUnitTemplate {
    pub service_name: String,
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub work_dir: PathBuf,
    pub run_user: String,
    pub home_dir: PathBuf,
}

impl ServiceUnitTemplate {
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            service_name: config.service.name.clone(),
            binary_path: config.paths.binary_path.clone(),
            config_path: config.paths.app_ini(),
            work_dir: config.paths.work_dir.clone(),
            run_user: config.service.run_user.clone(),
            home_dir: config.paths.work_dir.clone(),
        }
    }

    /// Render the definition for the given service manager
    pub fn render(&self, kind: ServiceManagerKind) -> String {
        let processor = TemplateProcessor::new()
            .set("RUN_USER", &self.run_user)
            .set("WORK_DIR", self.work_dir.display().to_string())
            .set("HOME_DIR", self.home_dir.display().to_string())
            .set("BINARY_PATH", self.binary_path.display().to_string())
            .set("CONFIG_PATH", self.config_path.display().to_string())
            .set("LABEL", launchd_label(&self.service_name))
            .set("LOG_FILE", LAUNCHD_LOG_FILE);

        let rendered = match kind {
            ServiceManagerKind::Systemd => processor.process(SYSTEMD_TEMPLATE),
            ServiceManagerKind::Launchd => processor.process(LAUNCHD_TEMPLATE),
        };
        let unresolved = TemplateProcessor::unresolved(&rendered);
        if !unresolved.is_empty() {
            tracing::warn!(?unresolved, "service definition has unresolved placeholders");
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systemd_unit() {
        let unit = ServiceUnitTemplate::from_config(&DeployConfig::default())
            .render(ServiceManagerKind::Systemd);

        assert!(TemplateProcessor::unresolved(&unit).is_empty());
        assert!(unit.contains("ExecStart=/usr/local/bin/gitea web --config /etc/gitea/app.ini"));
        assert!(unit.contains("WorkingDirectory=/var/lib/gitea"));
        assert!(unit.contains("Restart=always"));
        assert!(unit.contains("HOME=/var/lib/gitea GITEA_WORK_DIR=/var/lib/gitea"));
        assert!(unit.contains("AmbientCapabilities=CAP_NET_BIND_SERVICE"));
    }

    #[test]
    fn test_launchd_plist() {
        let plist = ServiceUnitTemplate::from_config(&DeployConfig::default())
            .render(ServiceManagerKind::Launchd);

        assert!(TemplateProcessor::unresolved(&plist).is_empty());
        assert!(plist.contains("<string>io.gitea.gitea</string>"));
        assert!(plist.contains("<key>GITEA_WORK_DIR</key>"));
        assert!(plist.contains("<key>KeepAlive</key>"));
    }
}
