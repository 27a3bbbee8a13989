//! Canned novel structure used by the mock agents

use chrono::Utc;
use novel_agent_sdk::{
    ChapterStructure, Character, CharacterRole, NovelStructure, SectionStructure,
};
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_GENRE: &str = "business & technology";
pub const DEFAULT_DESCRIPTION: &str =
    "A story of people growing through the challenges of modern technology";
pub const DEFAULT_TARGET_WORD_COUNT: u32 = 80_000;

/// Baseline novel structure returned by the mock plot analysis.
/// Callers customize title, description, genre and themes from their input.
pub fn mock_novel_structure() -> NovelStructure {
    let now = Utc::now();

    NovelStructure {
        id: Uuid::new_v4(),
        title: "Untitled Novel".to_string(),
        description: DEFAULT_DESCRIPTION.to_string(),
        genre: DEFAULT_GENRE.to_string(),
        themes: vec![
            "innovation".to_string(),
            "teamwork".to_string(),
            "growth".to_string(),
        ],
        target_word_count: DEFAULT_TARGET_WORD_COUNT,
        current_word_count: 0,
        characters: mock_characters(),
        chapters: mock_chapters(),
        plot_summary: String::new(),
        created_at: now,
        updated_at: now,
    }
}

fn mock_characters() -> Vec<Character> {
    vec![
        Character {
            id: "char-1".to_string(),
            name: "Maya Chen".to_string(),
            role: CharacterRole::Protagonist,
            description: "Lead engineer driving an ambitious AI project against the odds"
                .to_string(),
            traits: vec![
                "determined".to_string(),
                "curious".to_string(),
                "self-doubting".to_string(),
            ],
            relationships: HashMap::from([
                ("char-2".to_string(), "rival".to_string()),
                ("char-3".to_string(), "mentee".to_string()),
            ]),
        },
        Character {
            id: "char-2".to_string(),
            name: "Victor Hale".to_string(),
            role: CharacterRole::Antagonist,
            description: "CTO of a competing startup who cuts corners to ship first".to_string(),
            traits: vec!["ruthless".to_string(), "charismatic".to_string()],
            relationships: HashMap::from([("char-1".to_string(), "rival".to_string())]),
        },
        Character {
            id: "char-3".to_string(),
            name: "Sam Okafor".to_string(),
            role: CharacterRole::Supporting,
            description: "Veteran architect and reluctant mentor".to_string(),
            traits: vec!["patient".to_string(), "dry-witted".to_string()],
            relationships: HashMap::from([("char-1".to_string(), "mentor".to_string())]),
        },
    ]
}

fn mock_chapters() -> Vec<ChapterStructure> {
    vec![
        ChapterStructure {
            id: "ch-1".to_string(),
            number: 1,
            title: "The Pitch".to_string(),
            summary: "Maya's team wins funding for a moonshot project, and the clock starts"
                .to_string(),
            word_count: 6_500,
            sections: vec![
                SectionStructure {
                    id: "ch-1-s-1".to_string(),
                    number: 1,
                    title: "Demo Day".to_string(),
                    content: String::new(),
                    word_count: 3_200,
                    notes: vec!["introduce the core conflict".to_string()],
                },
                SectionStructure {
                    id: "ch-1-s-2".to_string(),
                    number: 2,
                    title: "Terms and Conditions".to_string(),
                    content: String::new(),
                    word_count: 3_300,
                    notes: vec![],
                },
            ],
            themes: vec!["innovation".to_string()],
            characters: vec!["char-1".to_string(), "char-3".to_string()],
        },
        ChapterStructure {
            id: "ch-2".to_string(),
            number: 2,
            title: "Race Conditions".to_string(),
            summary: "A rival announcement forces the team to rethink everything".to_string(),
            word_count: 7_200,
            sections: vec![
                SectionStructure {
                    id: "ch-2-s-1".to_string(),
                    number: 1,
                    title: "The Announcement".to_string(),
                    content: String::new(),
                    word_count: 3_600,
                    notes: vec![],
                },
                SectionStructure {
                    id: "ch-2-s-2".to_string(),
                    number: 2,
                    title: "Regrouping".to_string(),
                    content: String::new(),
                    word_count: 3_600,
                    notes: vec!["Victor's first on-page appearance".to_string()],
                },
            ],
            themes: vec!["teamwork".to_string(), "growth".to_string()],
            characters: vec![
                "char-1".to_string(),
                "char-2".to_string(),
                "char-3".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_structure_is_internally_consistent() {
        let structure = mock_novel_structure();
        assert_eq!(structure.characters.len(), 3);
        assert!(!structure.chapters.is_empty());

        // Chapter character references must resolve to known characters
        let ids: Vec<&str> = structure.characters.iter().map(|c| c.id.as_str()).collect();
        for chapter in &structure.chapters {
            for char_id in &chapter.characters {
                assert!(ids.contains(&char_id.as_str()), "unknown character {}", char_id);
            }
        }
    }
}
