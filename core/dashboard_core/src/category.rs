//! App/domain → usage category.
//!
//! Lookups are exact string matches (case and punctuation included). The
//! table is fixed once the [`Categorizer`] is built; a JSON file can extend
//! or override the built-in entries at start-up.

use std::{
    collections::{BTreeSet, HashMap},
    hash::Hasher,
    path::Path,
};

use tracing::info;
use twox_hash::XxHash64;

use crate::error::Error;

pub const OTHER: &str = "Other";

const DEFAULT_TABLE: &[(&str, &str)] = &[
    ("Cursor", "Productivity"),
    ("Terminal", "Productivity"),
    ("Visual Studio Code", "Productivity"),
    ("claude.ai", "Productivity"),
    ("github.com", "Productivity"),
    ("gitlab.com", "Productivity"),
    ("stackoverflow.com", "Productivity"),
    ("youtube_productive", "Productivity"),
    ("localhost:5600", "Productivity"),
    ("Messages", "Communication"),
    ("Slack", "Communication"),
    ("Discord", "Communication"),
    ("FaceTime", "Communication"),
    ("zoom.us", "Communication"),
    ("gmail.com", "Communication"),
    ("outlook.com", "Communication"),
    ("coursera.org", "Education"),
    ("udemy.com", "Education"),
    ("edx.org", "Education"),
    ("wikipedia.org", "Education"),
    ("medium.com", "Education"),
    ("dev.to", "Education"),
    ("youtube_entertainment", "Entertainment"),
    ("netflix.com", "Entertainment"),
    ("spotify.com", "Entertainment"),
    ("twitch.tv", "Entertainment"),
    ("reddit.com", "Entertainment"),
    ("x.com", "Entertainment"),
    ("youtube_brain_rot", "Brain Rot"),
    ("amazon.com", "Shopping"),
    ("ebay.com", "Shopping"),
    ("vinted.nl", "Shopping"),
    ("ray-ban.com", "Shopping"),
    ("sunglassesid.com", "Shopping"),
    ("sunglasshut.com", "Shopping"),
    ("oliverpeoples.com", "Shopping"),
    ("Finder", "System"),
    ("System Settings", "System"),
    ("loginwindow", "System"),
    ("Screen Sharing", "System"),
    ("UserNotificationCenter", "System"),
    ("TextEdit", "System"),
    ("Photos", "System"),
    ("Numbers", "System"),
    ("VLC", "System"),
];

fn palette(category: &str) -> &'static [&'static str; 4] {
    match category {
        "Productivity" => &["#4ade80", "#22c55e", "#16a34a", "#15803d"],
        "Entertainment" => &["#2dd4bf", "#14b8a6", "#0d9488", "#0f766e"],
        "Brain Rot" => &["#f87171", "#ef4444", "#dc2626", "#b91c1c"],
        "Communication" => &["#60a5fa", "#3b82f6", "#2563eb", "#1d4ed8"],
        "Education" => &["#c084fc", "#a855f7", "#9333ea", "#7e22ce"],
        "Shopping" => &["#fb923c", "#f97316", "#ea580c", "#c2410c"],
        "System" => &["#94a3b8", "#64748b", "#475569", "#334155"],
        _ => &["#a8a29e", "#78716c", "#57534e", "#44403c"],
    }
}

#[derive(Clone, Debug)]
pub struct Categorizer {
    table: HashMap<String, String>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::with_overrides(HashMap::new())
    }
}

impl Categorizer {
    /// A categorizer over exactly `table`, without the built-in entries.
    pub fn new(table: HashMap<String, String>) -> Self {
        Self { table }
    }

    /// Built-in entries, with `overrides` replacing or adding identifiers.
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        let mut table: HashMap<String, String> = DEFAULT_TABLE
            .iter()
            .map(|(app, cat)| (app.to_string(), cat.to_string()))
            .collect();
        table.extend(overrides);
        Self { table }
    }

    /// Loads a `{ "identifier": "Category" }` object and layers it over the
    /// built-in table.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let overrides: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            "category overrides: {} entries from {}",
            overrides.len(),
            path.display()
        );
        Ok(Self::with_overrides(overrides))
    }

    pub fn category<'a>(&'a self, app: &str) -> &'a str {
        self.table.get(app).map(String::as_str).unwrap_or(OTHER)
    }

    /// Every category name the table can produce, fallback included.
    pub fn categories(&self) -> BTreeSet<&str> {
        let mut out: BTreeSet<&str> = self.table.values().map(String::as_str).collect();
        out.insert(OTHER);
        out
    }

    /// Stable chart colour: a shade of the app's category palette picked by
    /// hashing the identifier.
    pub fn color_for(&self, app: &str) -> &'static str {
        let shades = palette(self.category(app));
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(app.as_bytes());
        shades[(hasher.finish() % shades.len() as u64) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_with_fallback() {
        let c = Categorizer::default();
        assert_eq!(c.category("Cursor"), "Productivity");
        assert_eq!(c.category("youtube_brain_rot"), "Brain Rot");
        assert_eq!(c.category("cursor"), OTHER);
        assert_eq!(c.category("github.com "), OTHER);
        assert_eq!(c.category("Unknown App"), OTHER);
    }

    #[test]
    fn overrides_replace_and_extend() {
        let overrides = HashMap::from([
            ("Cursor".to_string(), "Focus".to_string()),
            ("Obsidian".to_string(), "Productivity".to_string()),
        ]);
        let c = Categorizer::with_overrides(overrides);
        assert_eq!(c.category("Cursor"), "Focus");
        assert_eq!(c.category("Obsidian"), "Productivity");
        assert_eq!(c.category("Slack"), "Communication");
        assert!(c.categories().contains("Focus"));
        assert!(c.categories().contains(OTHER));
    }

    #[test]
    fn bare_table_has_no_defaults() {
        let c = Categorizer::new(HashMap::from([("A".to_string(), "X".to_string())]));
        assert_eq!(c.category("A"), "X");
        assert_eq!(c.category("Cursor"), OTHER);
    }

    #[test]
    fn colors_are_deterministic_and_in_palette() {
        let c = Categorizer::default();
        let a = c.color_for("Cursor");
        assert_eq!(a, c.color_for("Cursor"));
        assert!(palette("Productivity").contains(&a));
        assert!(palette(OTHER).contains(&c.color_for("never-seen.example")));
    }
}
