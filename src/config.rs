use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::document::{NodeData, NodeKind};

pub const DEFAULT_MIN_LINE_AMOUNT: u32 = 0;

/// Persisted plugin settings. Keys match the host plugin data file, and any
/// key missing from the file keeps its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FoldSettings {
    pub collapsable_file_node: bool,
    pub collapsable_attachment_node: bool,
    pub collapsable_group_node: bool,
    pub collapsable_link_node: bool,
    pub collapsable_text_node: bool,
    pub min_line_amount: u32,
    pub minimal_control_header: bool,
    pub show_aliases_in_collapsed_state: bool,
    pub show_thumbnails_in_collapsed_state: bool,
    pub show_aliases_always: bool,
    pub show_thumbnails_always: bool,
}

impl Default for FoldSettings {
    fn default() -> Self {
        Self {
            collapsable_file_node: true,
            collapsable_attachment_node: true,
            collapsable_group_node: true,
            collapsable_link_node: true,
            collapsable_text_node: true,
            min_line_amount: DEFAULT_MIN_LINE_AMOUNT,
            minimal_control_header: false,
            show_aliases_in_collapsed_state: true,
            show_thumbnails_in_collapsed_state: true,
            show_aliases_always: false,
            show_thumbnails_always: false,
        }
    }
}

impl FoldSettings {
    /// Loads the optional settings file, then applies `CANVAS_FOLD_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();

        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file `{}`", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings file `{}`", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write settings file `{}`", path.display()))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        override_bool("CANVAS_FOLD_FILE_NODE", &mut self.collapsable_file_node)?;
        override_bool(
            "CANVAS_FOLD_ATTACHMENT_NODE",
            &mut self.collapsable_attachment_node,
        )?;
        override_bool("CANVAS_FOLD_GROUP_NODE", &mut self.collapsable_group_node)?;
        override_bool("CANVAS_FOLD_LINK_NODE", &mut self.collapsable_link_node)?;
        override_bool("CANVAS_FOLD_TEXT_NODE", &mut self.collapsable_text_node)?;
        override_bool(
            "CANVAS_FOLD_MINIMAL_CONTROL_HEADER",
            &mut self.minimal_control_header,
        )?;
        if let Some(raw) = read_optional_env("CANVAS_FOLD_MIN_LINE_AMOUNT") {
            self.min_line_amount = raw
                .parse::<u32>()
                .with_context(|| "failed to parse CANVAS_FOLD_MIN_LINE_AMOUNT as u32")?;
        }
        Ok(())
    }

    /// Whether a node of this kind gets a collapse header at all. File nodes
    /// split into markdown notes and attachments.
    pub fn allows_kind(&self, node: &NodeData) -> bool {
        match node.kind {
            NodeKind::File if node.is_markdown_file() => self.collapsable_file_node,
            NodeKind::File => self.collapsable_attachment_node,
            NodeKind::Group => self.collapsable_group_node,
            NodeKind::Link => self.collapsable_link_node,
            NodeKind::Text => self.collapsable_text_node,
        }
    }
}

fn read_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn override_bool(name: &str, target: &mut bool) -> Result<()> {
    if let Some(raw) = read_optional_env(name) {
        *target = parse_bool(&raw).with_context(|| format!("failed to parse {name}"))?;
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("invalid boolean `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{FoldSettings, parse_bool};
    use crate::document::NodeData;
    use crate::geometry::Rect;
    use crate::test_support::{remove_dir_if_exists, temp_path};

    #[test]
    fn partial_settings_file_keeps_defaults_for_missing_keys() {
        let dir = temp_path("settings_partial");
        fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join("data.json");
        fs::write(
            &path,
            r#"{"collapsableGroupNode": false, "minLineAmount": 3}"#,
        )
        .expect("write settings");

        let settings = FoldSettings::from_file(&path).expect("settings should load");
        assert!(!settings.collapsable_group_node);
        assert_eq!(settings.min_line_amount, 3);
        assert!(settings.collapsable_text_node);
        assert!(settings.show_aliases_in_collapsed_state);

        remove_dir_if_exists(&dir);
    }

    #[test]
    fn settings_round_trip_through_file() {
        let dir = temp_path("settings_round_trip");
        fs::create_dir_all(&dir).expect("create dir");
        let path = dir.join("data.json");
        let settings = FoldSettings {
            minimal_control_header: true,
            min_line_amount: 12,
            ..FoldSettings::default()
        };

        settings.save(&path).expect("settings should save");
        assert_eq!(FoldSettings::from_file(&path).expect("reload"), settings);

        remove_dir_if_exists(&dir);
    }

    #[test]
    fn allows_kind_separates_notes_from_attachments() {
        let settings = FoldSettings {
            collapsable_file_node: false,
            ..FoldSettings::default()
        };

        let note = NodeData::file("a", Rect::default(), "a.md");
        let image = NodeData::file("b", Rect::default(), "b.png");
        assert!(!settings.allows_kind(&note));
        assert!(settings.allows_kind(&image));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("yes").expect("yes"));
        assert!(!parse_bool("OFF").expect("off"));
        assert!(parse_bool("maybe").is_err());
    }
}
