//! 保留原始行的 INI 文档
//!
//! 只对被修改的键所在行做替换，注释、空行和未知内容原样保留。
//! 根节（第一个 `[section]` 之前的键）用空字符串表示。

use std::fmt;

/// 行级 INI 文档
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    lines: Vec<String>,
}

enum LineKind<'a> {
    Section(&'a str),
    Entry { key: &'a str, value: &'a str },
    Other,
}

fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
        return LineKind::Section(trimmed[1..trimmed.len() - 1].trim());
    }
    if trimmed.starts_with(';') || trimmed.starts_with('#') {
        return LineKind::Other;
    }
    match trimmed.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => LineKind::Entry {
            key: key.trim(),
            value: value.trim(),
        },
        _ => LineKind::Other,
    }
}

impl IniDocument {
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_string).collect(),
        }
    }

    /// 节内容所在的行区间 `[start, end)`；节不存在时返回 None
    fn section_range(&self, section: &str) -> Option<(usize, usize)> {
        let mut start = if section.is_empty() { Some(0) } else { None };
        for (idx, line) in self.lines.iter().enumerate() {
            if let LineKind::Section(name) = classify(line) {
                match start {
                    Some(begin) => return Some((begin, idx)),
                    None if name.eq_ignore_ascii_case(section) => start = Some(idx + 1),
                    None => {}
                }
            }
        }
        start.map(|begin| (begin, self.lines.len()))
    }

    fn find_entry(&self, section: &str, key: &str) -> Option<usize> {
        let (start, end) = self.section_range(section)?;
        (start..end).find(|&idx| {
            matches!(classify(&self.lines[idx]), LineKind::Entry { key: k, .. } if k == key)
        })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let idx = self.find_entry(section, key)?;
        match classify(&self.lines[idx]) {
            LineKind::Entry { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn contains_key(&self, section: &str, key: &str) -> bool {
        self.find_entry(section, key).is_some()
    }

    /// 设置键值：已存在时原位替换，否则插入到节末尾；节不存在时新建
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let line = format!("{key} = {value}");

        if let Some(idx) = self.find_entry(section, key) {
            self.lines[idx] = line;
            return;
        }

        match self.section_range(section) {
            Some((start, end)) => {
                // 插在节内最后一个非空行之后，保留节与节之间的空行
                let insert_at = (start..end)
                    .rev()
                    .find(|&idx| !self.lines[idx].trim().is_empty())
                    .map(|idx| idx + 1)
                    .unwrap_or(start);
                self.lines.insert(insert_at, line);
            }
            None => {
                if self.lines.last().is_some_and(|l| !l.trim().is_empty()) {
                    self.lines.push(String::new());
                }
                self.lines.push(format!("[{section}]"));
                self.lines.push(line);
            }
        }
    }

    /// 删除键，返回是否存在
    pub fn remove(&mut self, section: &str, key: &str) -> bool {
        match self.find_entry(section, key) {
            Some(idx) => {
                self.lines.remove(idx);
                true
            }
            None => false,
        }
    }

    /// 追加一段原始文本
    pub fn append_raw(&mut self, text: &str) {
        if self.lines.last().is_some_and(|l| !l.trim().is_empty()) {
            self.lines.push(String::new());
        }
        self.lines.extend(text.lines().map(str::to_string));
    }

    /// 节的原始内容（不含节头），去掉首尾空行
    pub fn section_text(&self, section: &str) -> Option<String> {
        let (start, end) = self.section_range(section)?;
        let body: Vec<&str> = self.lines[start..end].iter().map(String::as_str).collect();
        Some(body.join("\n").trim().to_string())
    }

    /// 所有键值，按出现顺序
    pub fn entries(&self) -> Vec<(String, String, String)> {
        let mut section = String::new();
        let mut out = Vec::new();
        for line in &self.lines {
            match classify(line) {
                LineKind::Section(name) => section = name.to_string(),
                LineKind::Entry { key, value } => {
                    out.push((section.clone(), key.to_string(), value.to_string()))
                }
                LineKind::Other => {}
            }
        }
        out
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE: &str = "APP_NAME = Team Git\n\n[server]\n; edited by hand\nDOMAIN = git.example.com\nHTTP_PORT = 443\n\n[service]\nDISABLE_REGISTRATION = false\nX_CUSTOM = keep me\n\n[security]\nINSTALL_LOCK = true\n";

    #[test]
    fn test_get_by_section() {
        let doc = IniDocument::parse(LIVE);
        assert_eq!(doc.get("", "APP_NAME"), Some("Team Git"));
        assert_eq!(doc.get("server", "HTTP_PORT"), Some("443"));
        assert_eq!(doc.get("service", "HTTP_PORT"), None);
        assert_eq!(doc.get("mailer", "ENABLED"), None);
    }

    #[test]
    fn test_set_replaces_in_place_and_preserves_other_lines() {
        let mut doc = IniDocument::parse(LIVE);
        doc.set("service", "DISABLE_REGISTRATION", "true");

        let out = doc.to_string();
        assert_eq!(
            out,
            LIVE.replace("DISABLE_REGISTRATION = false", "DISABLE_REGISTRATION = true")
        );
        assert!(out.contains("; edited by hand"));
        assert!(out.contains("X_CUSTOM = keep me"));
    }

    #[test]
    fn test_set_inserts_into_existing_section() {
        let mut doc = IniDocument::parse(LIVE);
        doc.set("server", "PROTOCOL", "https");

        let server = doc.section_text("server").unwrap();
        assert!(server.ends_with("HTTP_PORT = 443\nPROTOCOL = https"));
        assert_eq!(doc.get("service", "DISABLE_REGISTRATION"), Some("false"));
    }

    #[test]
    fn test_set_creates_missing_section() {
        let mut doc = IniDocument::parse("[server]\nDOMAIN = localhost");
        doc.set("service", "DISABLE_REGISTRATION", "true");
        assert_eq!(
            doc.to_string(),
            "[server]\nDOMAIN = localhost\n\n[service]\nDISABLE_REGISTRATION = true\n"
        );
    }

    #[test]
    fn test_remove() {
        let mut doc = IniDocument::parse(LIVE);
        assert!(doc.remove("server", "HTTP_PORT"));
        assert!(!doc.remove("server", "HTTP_PORT"));
        assert!(!doc.contains_key("server", "HTTP_PORT"));
        assert_eq!(doc.get("server", "DOMAIN"), Some("git.example.com"));
    }

    #[test]
    fn test_malformed_lines_survive() {
        let content = "garbage without equals\n[server\nDOMAIN = a\n";
        let mut doc = IniDocument::parse(content);
        doc.set("", "DOMAIN", "b");
        let out = doc.to_string();
        assert!(out.contains("garbage without equals"));
        assert!(out.contains("[server\n"));
        assert_eq!(doc.get("", "DOMAIN"), Some("b"));
    }

    #[test]
    fn test_entries_in_order() {
        let doc = IniDocument::parse(LIVE);
        let entries = doc.entries();
        assert_eq!(
            entries[0],
            ("".to_string(), "APP_NAME".to_string(), "Team Git".to_string())
        );
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[5].0, "security");
    }
}
