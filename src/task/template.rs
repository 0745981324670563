use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("template parameter '{0}' is not bound")]
    Unbound(String),
    #[error("unterminated placeholder in template: {0}")]
    Unterminated(String),
}

/// Text with `{name}` placeholders plus the parameters bound to it.
///
/// `{{` and `}}` render as literal braces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatedText {
    pub template: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl TemplatedText {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Bind every entry of `params` that the text does not already bind
    pub fn bind_missing(mut self, params: &BTreeMap<String, String>) -> Self {
        for (name, value) in params {
            self.params.entry(name.clone()).or_insert_with(|| value.clone());
        }
        self
    }

    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut chars = self.template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                }
                '{' => {
                    let name: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    names.push(name.trim().to_string());
                }
                _ => {}
            }
        }
        names
    }

    pub fn render(&self) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::Unterminated(self.template.clone()));
                    }
                    let name = name.trim();
                    let value = self
                        .params
                        .get(name)
                        .ok_or_else(|| TemplateError::Unbound(name.to_string()))?;
                    out.push_str(value);
                }
                other => out.push(other),
            }
        }

        Ok(out)
    }
}

impl From<&str> for TemplatedText {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for TemplatedText {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}
