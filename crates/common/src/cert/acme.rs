//! CA 签发规划（certbot standalone 模式）
//!
//! 这里只生成参数与计划任务条目，实际执行由二进制 crate 通过命令执行器完成。

use std::path::{Path, PathBuf};

use super::{CERT_FILE_MODE, CertificateMaterial, CertificateRequest, KEY_FILE_MODE};
use crate::error::Result;

/// certbot 签发结果所在目录
pub const LETSENCRYPT_LIVE_DIR: &str = "/etc/letsencrypt/live";
/// 续期任务：每天 03:17
pub const RENEWAL_SCHEDULE: &str = "17 3 * * *";
/// 续期条目的行尾标记，用于替换或移除本工具写入的条目
pub const RENEWAL_MARKER: &str = "# gitea-deploy-renewal";

/// 一次 CA 签发的完整计划
#[derive(Debug, Clone)]
pub struct AcmePlan {
    pub domain: String,
    pub email: Option<String>,
    pub material: CertificateMaterial,
    /// 证书文件的属主（Gitea 运行用户）
    pub owner: Option<String>,
    /// 证书更新后重启 Gitea 的命令
    pub restart_command: String,
}

impl AcmePlan {
    pub fn new(
        request: &CertificateRequest,
        email: Option<String>,
        material: CertificateMaterial,
        restart_command: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            domain: request.ca_domain()?.to_string(),
            email: email.filter(|e| !e.trim().is_empty()),
            material,
            owner: None,
            restart_command: restart_command.into(),
        })
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// `certbot certonly` 参数，临时占用 80 端口完成 HTTP 验证
    pub fn certonly_args(&self) -> Vec<String> {
        let mut args = vec![
            "certonly".to_string(),
            "--standalone".to_string(),
            "--non-interactive".to_string(),
            "--agree-tos".to_string(),
            "--preferred-challenges".to_string(),
            "http".to_string(),
            "-d".to_string(),
            self.domain.clone(),
        ];
        match &self.email {
            Some(email) => {
                args.push("-m".to_string());
                args.push(email.clone());
            }
            None => args.push("--register-unsafely-without-email".to_string()),
        }
        args
    }

    pub fn live_dir(&self) -> PathBuf {
        Path::new(LETSENCRYPT_LIVE_DIR).join(&self.domain)
    }

    pub fn live_fullchain(&self) -> PathBuf {
        self.live_dir().join("fullchain.pem")
    }

    pub fn live_privkey(&self) -> PathBuf {
        self.live_dir().join("privkey.pem")
    }

    /// 复制证书、修正权限并重启服务的 shell 片段，签发后与续期钩子共用
    pub fn deploy_hook(&self) -> String {
        let cert = self.material.cert_path.display();
        let key = self.material.key_path.display();
        let mut steps = vec![
            format!("cp {} {cert}", self.live_fullchain().display()),
            format!("cp {} {key}", self.live_privkey().display()),
            format!("chmod {KEY_FILE_MODE:o} {key}"),
            format!("chmod {CERT_FILE_MODE:o} {cert}"),
        ];
        if let Some(owner) = &self.owner {
            steps.push(format!("chown {owner} {key} {cert}"));
        }
        steps.push(self.restart_command.clone());
        steps.join(" && ")
    }
}

/// 续期计划任务条目；certbot 在未进入续期窗口时不会触发部署钩子
pub fn renewal_cron_entry(plan: &AcmePlan) -> String {
    format!(
        "{RENEWAL_SCHEDULE} certbot renew --quiet --pre-hook \"ufw allow 80/tcp || true\" --post-hook \"ufw delete allow 80/tcp || true\" --deploy-hook \"{}\" {RENEWAL_MARKER}",
        plan.deploy_hook()
    )
}

fn is_renewal_line(line: &str) -> bool {
    line.trim_end().ends_with(RENEWAL_MARKER)
}

fn join_lines(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

/// 写入续期条目，替换之前写入的带标记条目；crontab 已是目标内容时返回 None
pub fn merge_crontab(existing: &str, entry: &str) -> Option<String> {
    let tagged: Vec<&str> = existing.lines().filter(|line| is_renewal_line(line)).collect();
    if tagged.len() == 1 && tagged[0].trim() == entry.trim() {
        return None;
    }
    let mut lines: Vec<&str> = existing
        .lines()
        .filter(|line| !is_renewal_line(line))
        .collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines.push(entry.trim());
    Some(join_lines(&lines))
}

/// 移除带标记的续期条目；没有条目时返回 None
pub fn remove_renewal(existing: &str) -> Option<String> {
    if !existing.lines().any(is_renewal_line) {
        return None;
    }
    let lines: Vec<&str> = existing
        .lines()
        .filter(|line| !is_renewal_line(line))
        .collect();
    Some(join_lines(&lines))
}
