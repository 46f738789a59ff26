use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("file `{path}` does not exist in the vault")]
    Missing { path: String },

    #[error("path `{path}` escapes the vault root")]
    OutsideVault { path: String },

    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid frontmatter in `{path}`: {source}")]
    Frontmatter {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frontmatter {
    pub aliases: Vec<String>,
    pub thumbnail: Option<String>,
}

/// Directory-backed stand-in for the host's file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a vault-relative path to a URL the renderer can load.
    pub fn resource_url(&self, path: &str) -> Result<String, VaultError> {
        let resolved = self.resolve(path)?;
        Ok(format!("file://{}", resolved.display()))
    }

    pub fn read_text(&self, path: &str) -> Result<String, VaultError> {
        let resolved = self.resolve(path)?;
        fs::read_to_string(&resolved).map_err(|source| VaultError::Io {
            path: path.to_owned(),
            source,
        })
    }

    pub fn frontmatter(&self, path: &str) -> Result<Option<Frontmatter>, VaultError> {
        let content = self.read_text(path)?;
        let Some(block) = frontmatter_block(&content) else {
            return Ok(None);
        };

        let value = serde_yaml::from_str::<Value>(block).map_err(|source| {
            VaultError::Frontmatter {
                path: path.to_owned(),
                source,
            }
        })?;

        Ok(Some(Frontmatter {
            aliases: parse_aliases(&value),
            thumbnail: value
                .get("thumbnail")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|thumbnail| !thumbnail.is_empty())
                .map(str::to_owned),
        }))
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, VaultError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|component| matches!(component, std::path::Component::ParentDir))
        {
            return Err(VaultError::OutsideVault {
                path: path.to_owned(),
            });
        }

        let resolved = self.root.join(relative);
        if !resolved.is_file() {
            return Err(VaultError::Missing {
                path: path.to_owned(),
            });
        }
        Ok(resolved)
    }
}

fn frontmatter_block(content: &str) -> Option<&str> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}

/// `aliases` (or `alias`) may be a list or a comma separated string.
fn parse_aliases(frontmatter: &Value) -> Vec<String> {
    let Some(raw) = frontmatter
        .get("aliases")
        .or_else(|| frontmatter.get("alias"))
    else {
        return Vec::new();
    };

    let candidates = match raw {
        Value::String(text) => text.split(',').map(str::to_owned).collect::<Vec<_>>(),
        Value::Sequence(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    candidates
        .into_iter()
        .map(|alias| alias.trim().to_owned())
        .filter(|alias| !alias.is_empty())
        .collect()
}
