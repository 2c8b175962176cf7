use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The creative brief for a single run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StorySeed {
    pub title: String,
    pub theme: String,
    pub settings: Settings,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub plot_elements: PlotElements,
    pub style_preferences: StylePreferences,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Settings {
    pub time: String,
    pub location: String,
    pub season: String,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Character {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub background: String,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct PlotElements {
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub key_scenes: Vec<String>,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct StylePreferences {
    pub tone: String,
    pub pacing: String,
    pub narrative: String,
    #[serde(default)]
    pub focus: String,
}

/// Chaptered plan derived from a seed plus the creator's synopsis.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Outline {
    pub title: String,
    pub theme: String,
    pub settings: Settings,
    pub characters: Vec<Character>,
    pub chapters: Vec<Chapter>,
    pub style: StylePreferences,
    #[serde(default)]
    pub synopsis: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Chapter {
    pub chapter: u32,
    pub title: String,
    pub key_points: Vec<String>,
    pub summary: String,
}

const MIN_CHAPTERS: usize = 8;
const MAX_CHAPTERS: usize = 12;

impl StorySeed {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read story seed {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse story seed {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let seed: StorySeed = serde_yaml_ng::from_str(content)?;
        if seed.title.trim().is_empty() {
            anyhow::bail!("Story seed has an empty title");
        }
        Ok(seed)
    }
}

impl Outline {
    pub fn from_seed(seed: &StorySeed, synopsis: impl Into<String>) -> Self {
        Self {
            title: seed.title.clone(),
            theme: seed.theme.clone(),
            settings: seed.settings.clone(),
            characters: seed.characters.clone(),
            chapters: chapter_structure(&seed.plot_elements.key_scenes),
            style: seed.style_preferences.clone(),
            synopsis: synopsis.into(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

/// Spreads the key scenes over 8 to 12 chapters, roughly two chapters per
/// scene. Later chapters may end up without a key point.
pub fn chapter_structure(key_scenes: &[String]) -> Vec<Chapter> {
    let scene_count = key_scenes.len();
    let chapter_count = (scene_count * 2).clamp(MIN_CHAPTERS, MAX_CHAPTERS);

    (0..chapter_count)
        .map(|i| {
            let scene_index = i * scene_count / chapter_count;
            Chapter {
                chapter: i as u32 + 1,
                title: format!("第{}章", i + 1),
                key_points: key_scenes.get(scene_index).cloned().into_iter().collect(),
                summary: String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_seed() -> StorySeed {
        StorySeed {
            title: "测试故事".to_string(),
            theme: "友情".to_string(),
            settings: Settings {
                time: "现代".to_string(),
                location: "城市".to_string(),
                season: "夏天".to_string(),
            },
            characters: vec![Character {
                name: "林晓".to_string(),
                role: "主角".to_string(),
                age: Some(17),
                occupation: "学生".to_string(),
                traits: vec!["内向".to_string(), "善良".to_string()],
                background: "刚转学到新城市".to_string(),
            }],
            plot_elements: PlotElements {
                conflicts: vec!["误会".to_string()],
                key_scenes: vec!["初遇".to_string(), "争吵".to_string(), "和解".to_string()],
            },
            style_preferences: StylePreferences {
                tone: "温暖".to_string(),
                pacing: "平缓".to_string(),
                narrative: "第三人称".to_string(),
                focus: "人物成长".to_string(),
            },
        }
    }

    #[test]
    fn test_seed_from_yaml_minimal() {
        let yaml = r#"
title: 测试故事
theme: 友情
settings: { time: 现代, location: 城市, season: 夏天 }
style_preferences: { tone: 温暖, pacing: 平缓, narrative: 第三人称 }
"#;
        let seed = StorySeed::from_yaml(yaml).unwrap();
        assert_eq!(seed.title, "测试故事");
        assert!(seed.characters.is_empty());
        assert!(seed.plot_elements.key_scenes.is_empty());
        assert_eq!(seed.style_preferences.focus, "");
    }

    #[test]
    fn test_seed_rejects_empty_title() {
        let yaml = r#"
title: "  "
theme: 友情
settings: { time: 现代, location: 城市, season: 夏天 }
style_preferences: { tone: 温暖, pacing: 平缓, narrative: 第三人称 }
"#;
        assert!(StorySeed::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_chapter_structure_minimum() {
        let scenes = vec!["初遇".to_string(), "争吵".to_string(), "和解".to_string()];
        let chapters = chapter_structure(&scenes);

        assert_eq!(chapters.len(), 8);
        assert_eq!(chapters[0].chapter, 1);
        assert_eq!(chapters[0].title, "第1章");
        assert_eq!(chapters[0].key_points, vec!["初遇".to_string()]);
        // 3 * 3 / 8 == 1
        assert_eq!(chapters[3].key_points, vec!["争吵".to_string()]);
        assert_eq!(chapters[7].key_points, vec!["和解".to_string()]);
        assert!(chapters.iter().all(|c| c.summary.is_empty()));
    }

    #[test]
    fn test_chapter_structure_bounds() {
        assert_eq!(chapter_structure(&[]).len(), 8);
        assert!(chapter_structure(&[]).iter().all(|c| c.key_points.is_empty()));

        let many: Vec<String> = (0..20).map(|i| format!("场景{}", i)).collect();
        let chapters = chapter_structure(&many);
        assert_eq!(chapters.len(), 12);
        assert_eq!(chapters[11].chapter, 12);
    }

    #[test]
    fn test_outline_from_seed() {
        let seed = sample_seed();
        let outline = Outline::from_seed(&seed, "一个关于友情的故事");

        assert_eq!(outline.title, seed.title);
        assert_eq!(outline.characters, seed.characters);
        assert_eq!(outline.style, seed.style_preferences);
        assert_eq!(outline.synopsis, "一个关于友情的故事");

        let yaml = outline.to_yaml().unwrap();
        assert!(yaml.contains("测试故事"));
        let back: Outline = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back, outline);
    }
}
