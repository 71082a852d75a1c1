//! Reading and writing the live app.ini of a binary install

use anyhow::{Context, Result, bail};
use gitea_deploy_common::cert::LETSENCRYPT_LIVE_DIR;
use gitea_deploy_common::render::check_tls_invariant;
use gitea_deploy_common::{
    CommandError, DeployConfig, DeploymentMode, EnvironmentProfile, IniDocument,
    IssuanceMethod, RenderTarget, ServerConfig,
};
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::Path;

use crate::system::SystemProvider;

/// Current app.ini content; None when no configuration has been written yet
pub fn read_app_ini(provider: &dyn SystemProvider, config: &DeployConfig) -> Result<Option<IniDocument>> {
    let path = config.paths.app_ini();
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(Some(IniDocument::parse(&content))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        // 配置目录属于运行用户，普通用户需要提权读取
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            if !privileged_test(provider, "-e", &path)? {
                return Ok(None);
            }
            let output = provider
                .privileged("cat", &[&path.to_string_lossy()])
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(IniDocument::parse(&output.stdout)))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Render app.ini for the binary target and write it
///
/// An existing file keeps everything except the mode-dependent `[server]`
/// keys, so secrets written by the Gitea web installer survive.
pub fn write_app_ini(
    provider: &dyn SystemProvider,
    config: &DeployConfig,
    mode: &DeploymentMode,
    profile: &EnvironmentProfile,
) -> Result<IniDocument> {
    let server = ServerConfig::resolve(mode, profile, config, RenderTarget::Binary)?;
    let doc = match read_app_ini(provider, config)? {
        Some(mut doc) => {
            server.apply_server_section(&mut doc);
            doc
        }
        None => server.render(),
    };

    if !check_tls_invariant(&doc, &config.paths.certificate_material()) {
        bail!(
            "Rendered configuration does not match the certificate material for mode {}",
            mode.kind()
        );
    }

    save_app_ini(provider, config, &doc)?;
    tracing::info!(mode = %mode.kind(), protocol = server.protocol, "app.ini rendered");
    Ok(doc)
}

/// Write a document to the app.ini location, owned by the run user
pub fn save_app_ini(
    provider: &dyn SystemProvider,
    config: &DeployConfig,
    doc: &IniDocument,
) -> Result<()> {
    let path = config.paths.app_ini();
    provider.create_directory(&config.paths.config_dir, None)?;
    provider
        .write_file(&path, &doc.to_string())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    if provider.user_exists(&config.service.run_user) {
        provider.set_file_owner(&path, &config.service.run_user)?;
    }
    provider.set_file_permissions(&path, 0o640)?;
    println!("✅ Configuration written: {}", path.display());
    Ok(())
}

/// Whether self-registration is currently allowed
pub fn registration_open(doc: &IniDocument) -> bool {
    !doc.get("service", "DISABLE_REGISTRATION")
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Rewrite `[service] DISABLE_REGISTRATION` in the live app.ini
pub fn set_registration(
    provider: &dyn SystemProvider,
    config: &DeployConfig,
    open: bool,
) -> Result<IniDocument> {
    let Some(mut doc) = read_app_ini(provider, config)? else {
        bail!(
            "{} not found; install or configure Gitea first",
            config.paths.app_ini().display()
        );
    };
    doc.set("service", "DISABLE_REGISTRATION", if open { "false" } else { "true" });
    save_app_ini(provider, config, &doc)?;
    tracing::info!(open, "registration updated");
    Ok(doc)
}

/// Reconstruct the deployment mode from a rendered app.ini
pub fn infer_mode(
    doc: &IniDocument,
    ca_issued: impl Fn(&str) -> Result<bool>,
) -> Result<Option<DeploymentMode>> {
    let (Some(domain), Some(protocol)) = (doc.get("server", "DOMAIN"), doc.get("server", "PROTOCOL"))
    else {
        return Ok(None);
    };
    let domain = domain.trim().to_string();
    let mode = match protocol {
        "http" => DeploymentMode::http_local(&domain),
        "https" if domain == "localhost" => DeploymentMode::HttpsLocalhost,
        "https" => match domain.parse::<IpAddr>() {
            Ok(ip) => DeploymentMode::HttpsIp { ip },
            Err(_) => {
                let issuance = if ca_issued(&domain)? {
                    IssuanceMethod::CaIssued
                } else {
                    IssuanceMethod::SelfSigned
                };
                DeploymentMode::HttpsDomain { domain, issuance }
            }
        },
        _ => return Ok(None),
    };
    Ok(Some(mode))
}

/// Whether certbot holds a lineage for the domain
///
/// The live directory is root-only, so the check runs privileged.
pub fn has_ca_lineage(provider: &dyn SystemProvider, domain: &str) -> Result<bool> {
    privileged_test(provider, "-d", &Path::new(LETSENCRYPT_LIVE_DIR).join(domain))
}

/// `test <flag> <path>` as root; a plain non-zero exit means false
fn privileged_test(provider: &dyn SystemProvider, flag: &str, path: &Path) -> Result<bool> {
    let Err(e) = provider.privileged("test", &[flag, &path.to_string_lossy()]) else {
        return Ok(true);
    };
    let absent = matches!(
        e.downcast_ref::<CommandError>(),
        Some(CommandError::Failed { status: 1, stderr, .. }) if stderr.trim().is_empty()
    );
    if absent {
        Ok(false)
    } else {
        Err(e).with_context(|| format!("Failed to check {}", path.display()))
    }
}
