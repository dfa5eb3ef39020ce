use serde::Serialize;

/// Category label attached to a recognized entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntityCategory {
    Person,
    Organization,
    Location,
    Skill,
    Other(String),
}

impl EntityCategory {
    /// Maps a service-issued category label onto a known category.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "person" | "personname" => EntityCategory::Person,
            "organization" | "organisation" => EntityCategory::Organization,
            "location" | "address" => EntityCategory::Location,
            "skill" => EntityCategory::Skill,
            _ => EntityCategory::Other(label.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub text: String,
    pub category: EntityCategory,
}

/// Advisory output of the semantic pass. Every sub-field is independent:
/// `None` means that part of the analysis was unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SemanticProfile {
    pub language: Option<String>,
    pub key_phrases: Option<Vec<String>>,
    pub entities: Option<Vec<Entity>>,
}

impl SemanticProfile {
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.key_phrases.is_none() && self.entities.is_none()
    }

    pub fn key_phrases(&self) -> &[String] {
        self.key_phrases.as_deref().unwrap_or_default()
    }

    pub fn entities(&self) -> &[Entity] {
        self.entities.as_deref().unwrap_or_default()
    }

    /// Text of the first entity categorized as a person.
    pub fn first_person(&self) -> Option<&str> {
        self.entities()
            .iter()
            .find(|e| e.category == EntityCategory::Person)
            .map(|e| e.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_label_is_case_insensitive() {
        assert_eq!(EntityCategory::from_label("Person"), EntityCategory::Person);
        assert_eq!(EntityCategory::from_label("PERSON"), EntityCategory::Person);
        assert_eq!(
            EntityCategory::from_label("DateTime"),
            EntityCategory::Other("DateTime".to_string())
        );
    }

    #[test]
    fn test_first_person_skips_other_categories() {
        let profile = SemanticProfile {
            entities: Some(vec![
                Entity {
                    text: "FPT Software".into(),
                    category: EntityCategory::Organization,
                },
                Entity {
                    text: "Tran Thi B".into(),
                    category: EntityCategory::Person,
                },
            ]),
            ..Default::default()
        };
        assert_eq!(profile.first_person(), Some("Tran Thi B"));
    }

    #[test]
    fn test_empty_profile_accessors() {
        let profile = SemanticProfile::default();
        assert!(profile.is_empty());
        assert!(profile.key_phrases().is_empty());
        assert!(profile.first_person().is_none());
    }
}
