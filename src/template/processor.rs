//! `{{KEY}}` placeholder substitution

use std::collections::BTreeMap;

/// Template processor for generating service definitions
#[derive(Debug, Default, Clone)]
pub struct TemplateProcessor {
    placeholders: BTreeMap<String, String>,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.placeholders.insert(key.to_string(), value.into());
        self
    }

    pub fn process(&self, template: &str) -> String {
        let mut result = template.to_string();
        for (key, value) in &self.placeholders {
            let placeholder = format!("{{{{{}}}}}", key);
            result = result.replace(&placeholder, value);
        }
        result
    }

    /// Placeholders still present after processing
    pub fn unresolved(rendered: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut rest = rendered;
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    found.push(after[..end].to_string());
                    rest = &after[end + 2..];
                }
                None => break,
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_replaces_every_occurrence() {
        let processor = TemplateProcessor::new()
            .set("RUN_USER", "git")
            .set("WORK_DIR", "/var/lib/gitea");
        let out = processor.process("User={{RUN_USER}}\nGroup={{RUN_USER}}\nWorkingDirectory={{WORK_DIR}}\n{{MISSING}}");
        assert_eq!(
            out,
            "User=git\nGroup=git\nWorkingDirectory=/var/lib/gitea\n{{MISSING}}"
        );
        assert_eq!(TemplateProcessor::unresolved(&out), vec!["MISSING"]);
    }
}
