//! Mood-keyed style library
//!
//! Supports the style-systems.yaml format with:
//! - One complete style system per mood
//! - Shared defaults for framework, icon and image strategy keys
//! - A named fallback mood for unknown lookups

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use sitesmith_core::{Effects, FontPairing, Motion, Palette, Result, SmithError, Spacing, StyleSystem, Typography};

const BUILTIN_LIBRARY: &str = include_str!("../assets/style-systems.yaml");

static BUILTIN: Lazy<StyleLibrary> =
    Lazy::new(|| StyleLibrary::from_yaml(BUILTIN_LIBRARY).expect("embedded style library"));

/// Top-level library file structure
#[derive(Debug, Deserialize)]
struct LibraryFile {
    fallback: String,
    defaults: SharedDefaults,
    themes: BTreeMap<String, ThemeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedDefaults {
    css_framework: String,
    icon_library: String,
    image_strategy: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeEntry {
    colors: Palette,
    fonts: FontPairing,
    typography: Typography,
    spacing: Spacing,
    effects: Effects,
    animations: Motion,
    layout_pattern: String,
    #[serde(default)]
    css_framework: Option<String>,
    #[serde(default)]
    icon_library: Option<String>,
    #[serde(default)]
    image_strategy: Option<String>,
}

impl ThemeEntry {
    fn into_style(self, defaults: &SharedDefaults) -> StyleSystem {
        StyleSystem {
            colors: self.colors,
            fonts: self.fonts,
            typography: self.typography,
            spacing: self.spacing,
            effects: self.effects,
            animations: self.animations,
            layout_pattern: self.layout_pattern,
            css_framework: self.css_framework.unwrap_or_else(|| defaults.css_framework.clone()),
            icon_library: self.icon_library.unwrap_or_else(|| defaults.icon_library.clone()),
            image_strategy: self.image_strategy.unwrap_or_else(|| defaults.image_strategy.clone()),
        }
    }
}

/// Pre-authored style systems, one per mood.
#[derive(Debug, Clone)]
pub struct StyleLibrary {
    fallback: String,
    fallback_style: StyleSystem,
    themes: BTreeMap<String, StyleSystem>,
}

impl StyleLibrary {
    /// Parse a library from YAML content
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: LibraryFile = serde_yaml::from_str(yaml)
            .map_err(|e| SmithError::Config(format!("invalid style library: {e}")))?;

        let defaults = file.defaults;
        let themes: BTreeMap<String, StyleSystem> = file
            .themes
            .into_iter()
            .map(|(mood, entry)| (mood, entry.into_style(&defaults)))
            .collect();

        let fallback_style = themes.get(&file.fallback).cloned().ok_or_else(|| {
            SmithError::Config(format!(
                "fallback mood '{}' is not defined in the style library",
                file.fallback
            ))
        })?;

        Ok(Self {
            fallback: file.fallback,
            fallback_style,
            themes,
        })
    }

    /// Load a library from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SmithError::Config(format!("failed to read style library {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// The library compiled into the crate.
    pub fn builtin() -> &'static StyleLibrary {
        &BUILTIN
    }

    /// Exact mood lookup, falling back to the library's default mood.
    pub fn get(&self, mood: &str) -> &StyleSystem {
        self.themes.get(mood).unwrap_or(&self.fallback_style)
    }

    pub fn contains(&self, mood: &str) -> bool {
        self.themes.contains_key(mood)
    }

    pub fn moods(&self) -> impl Iterator<Item = &str> {
        self.themes.keys().map(String::as_str)
    }

    pub fn fallback_mood(&self) -> &str {
        &self.fallback
    }
}

/// Static style system for `mood`, with zero network cost.
pub fn template_style_system(mood: &str) -> StyleSystem {
    StyleLibrary::builtin().get(mood).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::is_concrete_color;

    #[test]
    fn test_builtin_covers_every_mood() {
        let library = StyleLibrary::builtin();
        let moods: Vec<&str> = library.moods().collect();
        assert_eq!(moods.len(), 10);
        for mood in [
            "dark_futuristic",
            "clean_minimal",
            "warm_organic",
            "bold_creative",
            "luxury_editorial",
            "neo_brutalist",
            "playful_rounded",
            "corporate_solid",
            "vintage_warm",
            "tech_dashboard",
        ] {
            assert!(library.contains(mood), "missing {mood}");
        }
    }

    #[test]
    fn test_builtin_styles_are_concrete() {
        let library = StyleLibrary::builtin();
        for mood in library.moods() {
            let style = library.get(mood);
            for (name, value) in style.colors.entries() {
                assert!(is_concrete_color(value), "{mood}.{name} = {value}");
            }
            assert_eq!(style.css_framework, "tailwind_cdn");
            assert_eq!(style.icon_library, "lucide");
            assert!(!style.fonts.display.is_empty());
        }
    }

    #[test]
    fn test_unknown_mood_falls_back() {
        let style = template_style_system("cyberpunk_noir");
        assert_eq!(style, template_style_system("dark_futuristic"));
        assert_eq!(style.colors.background, "#0a1628");
        assert_eq!(style.fonts.display, "Space Grotesk");
    }

    #[test]
    fn test_lookup_is_deterministic() {
        assert_eq!(template_style_system("warm_organic"), template_style_system("warm_organic"));
        assert_eq!(template_style_system("warm_organic").fonts.display, "Playfair Display");
        assert!(template_style_system("clean_minimal").is_light());
        assert!(template_style_system("tech_dashboard").is_dark());
    }

    #[test]
    fn test_missing_fallback_rejected() {
        let yaml = r#"
version: "1.0"
fallback: nowhere
defaults: { cssFramework: tailwind_cdn, iconLibrary: lucide, imageStrategy: unsplash }
themes: {}
"#;
        let err = StyleLibrary::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().starts_with("CONFIG/"));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(StyleLibrary::load("/definitely/not/here.yaml").is_err());
    }
}
