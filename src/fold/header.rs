use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::FoldSettings;
use crate::document::{NodeData, NodeKind};
use crate::vault::{Frontmatter, Vault};

static HEADING_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+ ").expect("valid heading marker regex"));

const TITLE_PREVIEW_CHARS: usize = 10;

/// The control strip drawn on top of a foldable node: collapse chevron, type
/// icon, title, and the optional alias and thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderView {
    title: String,
    type_icon: &'static str,
    collapsed: bool,
    minimal: bool,
    alias: Option<String>,
    thumbnail: Option<String>,
    thumbnail_url: Option<String>,
    file_path: Option<String>,
    title_visible: bool,
    alias_visible: bool,
    thumbnail_visible: bool,
}

impl HeaderView {
    pub fn new(node: &NodeData, settings: &FoldSettings, vault: Option<&Vault>) -> Self {
        let frontmatter = node
            .is_markdown_file()
            .then(|| load_frontmatter(node, vault))
            .flatten();

        let alias = node
            .alias
            .clone()
            .filter(|alias| !alias.is_empty())
            .or_else(|| {
                frontmatter
                    .as_ref()
                    .and_then(|frontmatter| frontmatter.aliases.first().cloned())
            });
        let thumbnail = node
            .thumbnail
            .clone()
            .filter(|thumbnail| !thumbnail.is_empty())
            .or_else(|| frontmatter.and_then(|frontmatter| frontmatter.thumbnail));
        let thumbnail_url = thumbnail
            .as_deref()
            .and_then(|thumbnail| resolve_thumbnail(thumbnail, vault));

        let mut header = Self {
            title: title_for(node),
            type_icon: type_icon_for(node),
            collapsed: node.is_collapsed(),
            minimal: settings.minimal_control_header,
            alias,
            thumbnail,
            thumbnail_url,
            file_path: node.file.clone(),
            title_visible: true,
            alias_visible: false,
            thumbnail_visible: false,
        };
        header.refresh(settings);
        header
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn type_icon(&self) -> &'static str {
        self.type_icon
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn is_minimal(&self) -> bool {
        self.minimal
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    pub fn is_title_visible(&self) -> bool {
        self.title_visible
    }

    pub fn is_alias_visible(&self) -> bool {
        self.alias_visible
    }

    pub fn is_thumbnail_visible(&self) -> bool {
        self.thumbnail_visible
    }

    /// What a reader sees as the node's name.
    pub fn displayed_label(&self) -> &str {
        match &self.alias {
            Some(alias) if self.alias_visible => alias,
            _ => &self.title,
        }
    }

    pub fn set_collapsed(&mut self, collapsed: bool, settings: &FoldSettings) {
        self.collapsed = collapsed;
        self.refresh(settings);
    }

    pub fn set_alias(&mut self, alias: Option<String>, settings: &FoldSettings) {
        self.alias = alias.filter(|alias| !alias.is_empty());
        self.refresh(settings);
    }

    pub fn set_thumbnail(
        &mut self,
        thumbnail: Option<String>,
        settings: &FoldSettings,
        vault: Option<&Vault>,
    ) {
        self.thumbnail = thumbnail.filter(|thumbnail| !thumbnail.is_empty());
        self.thumbnail_url = self
            .thumbnail
            .as_deref()
            .and_then(|thumbnail| resolve_thumbnail(thumbnail, vault));
        self.refresh(settings);
    }

    /// Follows a file rename when this header shows the renamed file.
    pub fn on_file_renamed(&mut self, old_path: &str, new_path: &str) -> bool {
        if self.file_path.as_deref() != Some(old_path) {
            return false;
        }
        self.title = file_stem(new_path).to_owned();
        self.file_path = Some(new_path.to_owned());
        true
    }

    fn refresh(&mut self, settings: &FoldSettings) {
        self.thumbnail_visible = (self.collapsed || settings.show_thumbnails_always)
            && settings.show_thumbnails_in_collapsed_state
            && self.thumbnail_url.is_some();
        self.alias_visible = (self.collapsed || settings.show_aliases_always)
            && settings.show_aliases_in_collapsed_state
            && self
                .alias
                .as_deref()
                .is_some_and(|alias| alias != self.title);
        self.title_visible = !self.alias_visible;
    }
}

fn load_frontmatter(node: &NodeData, vault: Option<&Vault>) -> Option<Frontmatter> {
    let path = node.file.as_deref()?;
    let Some(vault) = vault else {
        debug!(node_id = %node.id, path, "no vault available for frontmatter lookup");
        return None;
    };
    match vault.frontmatter(path) {
        Ok(frontmatter) => frontmatter,
        Err(error) => {
            debug!(node_id = %node.id, path, error = %error, "frontmatter lookup failed");
            None
        }
    }
}

fn resolve_thumbnail(thumbnail: &str, vault: Option<&Vault>) -> Option<String> {
    if thumbnail.starts_with("http") {
        return Some(thumbnail.to_owned());
    }
    let Some(vault) = vault else {
        debug!(thumbnail, "no vault available to resolve thumbnail");
        return None;
    };
    match vault.resource_url(thumbnail) {
        Ok(url) => Some(url),
        Err(error) => {
            debug!(thumbnail, error = %error, "thumbnail could not be resolved");
            None
        }
    }
}

fn title_for(node: &NodeData) -> String {
    let content = match node.kind {
        NodeKind::Text => {
            let text = node.text.as_deref().unwrap_or_default();
            let mut preview = text.chars().take(TITLE_PREVIEW_CHARS).collect::<String>();
            if text.chars().count() > TITLE_PREVIEW_CHARS {
                preview.push_str("...");
            }
            preview
        }
        NodeKind::File => node.file.as_deref().map(file_stem).unwrap_or_default().to_owned(),
        NodeKind::Link => node.url.clone().unwrap_or_default(),
        NodeKind::Group => String::new(),
    };
    HEADING_MARKER_RE.replace(&content, "").into_owned()
}

fn type_icon_for(node: &NodeData) -> &'static str {
    match node.kind {
        NodeKind::Text => "sticky-note",
        NodeKind::File if node.is_markdown_file() => "file-text",
        NodeKind::File => "file-image",
        NodeKind::Group => "create-group",
        NodeKind::Link => "link",
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::HeaderView;
    use crate::config::FoldSettings;
    use crate::document::NodeData;
    use crate::geometry::Rect;
    use crate::test_support::{remove_dir_if_exists, temp_path};
    use crate::vault::Vault;

    #[test]
    fn titles_follow_node_content() {
        let settings = FoldSettings::default();
        let text = NodeData::text("t", Rect::default(), "## A rather long heading");
        let short = NodeData::text("s", Rect::default(), "short");
        let file = NodeData::file("f", Rect::default(), "notes/Weekly.plan.md");
        let link = NodeData::link("l", Rect::default(), "https://example.com");
        let group = NodeData::group("g", Rect::default(), Some("Label"));

        assert_eq!(HeaderView::new(&text, &settings, None).title(), "A rathe...");
        assert_eq!(HeaderView::new(&short, &settings, None).title(), "short");
        assert_eq!(HeaderView::new(&file, &settings, None).title(), "Weekly");
        assert_eq!(
            HeaderView::new(&link, &settings, None).title(),
            "https://example.com"
        );
        assert_eq!(HeaderView::new(&group, &settings, None).title(), "");
    }

    #[test]
    fn type_icons_distinguish_notes_from_attachments() {
        let settings = FoldSettings::default();
        let note = NodeData::file("a", Rect::default(), "a.md");
        let image = NodeData::file("b", Rect::default(), "b.png");

        assert_eq!(HeaderView::new(&note, &settings, None).type_icon(), "file-text");
        assert_eq!(HeaderView::new(&image, &settings, None).type_icon(), "file-image");
    }

    #[test]
    fn alias_replaces_title_only_while_collapsed() {
        let settings = FoldSettings::default();
        let mut node = NodeData::text("t", Rect::default(), "body");
        node.alias = Some("Nickname".to_owned());

        let mut header = HeaderView::new(&node, &settings, None);
        assert_eq!(header.displayed_label(), "body");

        header.set_collapsed(true, &settings);
        assert!(header.is_alias_visible());
        assert!(!header.is_title_visible());
        assert_eq!(header.displayed_label(), "Nickname");

        header.set_collapsed(false, &settings);
        assert!(header.is_title_visible());
        assert_eq!(header.displayed_label(), "body");
    }

    #[test]
    fn show_aliases_always_applies_to_expanded_nodes() {
        let settings = FoldSettings {
            show_aliases_always: true,
            ..FoldSettings::default()
        };
        let mut node = NodeData::text("t", Rect::default(), "body");
        node.alias = Some("Nickname".to_owned());

        let header = HeaderView::new(&node, &settings, None);
        assert_eq!(header.displayed_label(), "Nickname");
    }

    #[test]
    fn frontmatter_supplies_default_alias_and_thumbnail() {
        let root = temp_path("header_frontmatter");
        fs::create_dir_all(&root).expect("create vault");
        fs::write(
            root.join("plan.md"),
            "---\naliases: [Roadmap]\nthumbnail: cover.png\n---\n",
        )
        .expect("write note");
        fs::write(root.join("cover.png"), [0_u8]).expect("write image");
        let vault = Vault::new(&root);
        let mut node = NodeData::file("f", Rect::default(), "plan.md");
        node.collapsed = Some(true);

        let header = HeaderView::new(&node, &FoldSettings::default(), Some(&vault));

        assert_eq!(header.alias(), Some("Roadmap"));
        assert!(header.thumbnail_url().is_some_and(|url| url.ends_with("cover.png")));
        assert!(header.is_thumbnail_visible());
        assert_eq!(header.displayed_label(), "Roadmap");

        remove_dir_if_exists(&root);
    }

    #[test]
    fn unresolvable_thumbnail_stays_hidden() {
        let settings = FoldSettings::default();
        let mut node = NodeData::text("t", Rect::default(), "body");
        node.collapsed = Some(true);

        let mut header = HeaderView::new(&node, &settings, None);
        header.set_thumbnail(Some("missing.png".to_owned()), &settings, None);
        assert_eq!(header.thumbnail(), Some("missing.png"));
        assert!(!header.is_thumbnail_visible());

        header.set_thumbnail(Some("https://example.com/a.png".to_owned()), &settings, None);
        assert!(header.is_thumbnail_visible());
    }

    #[test]
    fn rename_updates_title_only_for_matching_path() {
        let node = NodeData::file("f", Rect::default(), "old.md");
        let mut header = HeaderView::new(&node, &FoldSettings::default(), None);

        assert!(!header.on_file_renamed("other.md", "x.md"));
        assert!(header.on_file_renamed("old.md", "dir/new.md"));
        assert_eq!(header.title(), "new");
        assert!(header.on_file_renamed("dir/new.md", "final.md"));
        assert_eq!(header.title(), "final");
    }
}
