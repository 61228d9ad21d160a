//! Dimension definitions: the named categories tasks and goals are tracked under.

use serde::{Deserialize, Serialize};

pub const UNKNOWN_DIMENSION_TITLE: &str = "Unknown dimension";
pub const FALLBACK_ICON: &str = "Cube";
pub const FALLBACK_COLOR: &str = "#95a5a6";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    #[serde(alias = "key")]
    pub id: String,
    pub title: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_icon() -> String {
    FALLBACK_ICON.to_string()
}

fn default_color() -> String {
    FALLBACK_COLOR.to_string()
}

impl Dimension {
    fn builtin(id: &str, title: &str, icon: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
            is_default: true,
        }
    }

    /// Placeholder returned for ids that are not registered.
    pub fn unknown(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: UNKNOWN_DIMENSION_TITLE.to_string(),
            icon: FALLBACK_ICON.to_string(),
            color: FALLBACK_COLOR.to_string(),
            is_default: false,
        }
    }
}

/// Request to register a new dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDimension {
    pub title: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_default: bool,
}

impl NewDimension {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            icon: default_icon(),
            color: default_color(),
            is_default: false,
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

/// Title/icon/color edits for an existing dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DimensionPatch {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Dimensions seeded into an empty registry.
pub fn default_dimensions() -> Vec<Dimension> {
    vec![
        Dimension::builtin("health", "Health", "Heart", "#e74c3c"),
        Dimension::builtin("career", "Career", "Briefcase", "#3498db"),
        Dimension::builtin("wealth", "Wealth", "Wallet", "#f1c40f"),
        Dimension::builtin("family", "Family", "Users", "#2ecc71"),
        Dimension::builtin("growth", "Growth", "BookOpen", "#9b59b6"),
    ]
}

/// True if `title` matches an existing dimension title, ignoring case and
/// surrounding whitespace. `except` skips one id (for renames).
pub fn title_taken(existing: &[Dimension], title: &str, except: Option<&str>) -> bool {
    let wanted = title.trim().to_lowercase();
    existing
        .iter()
        .filter(|d| Some(d.id.as_str()) != except)
        .any(|d| d.title.trim().to_lowercase() == wanted)
}

/// Append the entries of `incoming` whose ids are not yet in `registry`.
/// Returns the ids that were added.
pub fn merge_missing(registry: &mut Vec<Dimension>, incoming: &[Dimension]) -> Vec<String> {
    let mut added = Vec::new();
    for d in incoming {
        if d.id.trim().is_empty() || registry.iter().any(|r| r.id == d.id) {
            continue;
        }
        registry.push(d.clone());
        added.push(d.id.clone());
    }
    added
}

/// Lowercase ASCII slug of a title: alphanumerics kept, runs of anything else
/// collapsed to a single '-'. May be empty for non-ASCII titles.
pub fn slugify(title: &str) -> String {
    let mut out = String::new();
    let mut dash = false;
    for c in title.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !out.is_empty() && !dash {
            out.push('-');
            dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Stable id for a new dimension, unique against `existing`.
pub fn dimension_id_for(title: &str, existing: &[Dimension]) -> String {
    let slug = slugify(title);
    let taken = |id: &str| existing.iter().any(|d| d.id == id);
    if !slug.is_empty() && !taken(&slug) {
        return slug;
    }
    loop {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let id = if slug.is_empty() {
            format!("dim-{}", &suffix[..8])
        } else {
            format!("{slug}-{}", &suffix[..8])
        };
        if !taken(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_collision_is_case_insensitive() {
        let dims = default_dimensions();
        assert!(title_taken(&dims, "health", None));
        assert!(title_taken(&dims, "  HEALTH ", None));
        assert!(!title_taken(&dims, "Health", Some("health")));
        assert!(!title_taken(&dims, "Hobbies", None));
    }

    #[test]
    fn slug_ids() {
        assert_eq!(slugify("Side Projects!"), "side-projects");
        assert_eq!(slugify("健康"), "");

        let dims = default_dimensions();
        assert_eq!(dimension_id_for("Side Projects", &dims), "side-projects");
        let id = dimension_id_for("Health", &dims);
        assert!(id.starts_with("health-"));
        assert!(dimension_id_for("健康", &dims).starts_with("dim-"));
    }

    #[test]
    fn merge_keeps_registry_entries_and_adds_new_ids() {
        let mut registry = default_dimensions();
        let mut renamed = Dimension::unknown("health");
        renamed.title = "Fitness".into();
        let mut reading = Dimension::unknown("reading");
        reading.title = "Reading".into();

        let added = merge_missing(&mut registry, &[renamed, reading.clone(), reading]);
        assert_eq!(added, vec!["reading".to_string()]);
        assert_eq!(registry.len(), default_dimensions().len() + 1);
        assert_eq!(registry[0].title, "Health");
    }

    #[test]
    fn legacy_key_field_is_accepted() {
        let d: Dimension =
            serde_json::from_str(r#"{"key":"health","title":"Health","isDefault":true}"#).unwrap();
        assert_eq!(d.id, "health");
        assert_eq!(d.icon, FALLBACK_ICON);
        assert!(d.is_default);
    }
}
