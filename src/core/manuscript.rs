use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::core::error::{BuildError, BuildResult};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Manuscript {
    pub title: String,
    pub overview: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub contents: Vec<Content>,
    #[serde(default)]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

/// One dialogue line. `speaker_id` is only unique within its manuscript.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Content {
    pub speaker_id: String,
    pub text: String,
    #[serde(default)]
    pub links: Vec<String>,
}

impl Manuscript {
    pub fn validate(&self) -> BuildResult<()> {
        if self.contents.is_empty() {
            return Err(BuildError::EmptyManuscript);
        }
        Ok(())
    }
}

/// Voice bucket of a speaker. Anything the narration marks other than
/// `"man"` is drawn from the woman pool.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Gender {
    Man,
    Woman,
}

impl From<String> for Gender {
    fn from(tag: String) -> Self {
        Gender::from_tag(&tag)
    }
}

impl From<Gender> for String {
    fn from(gender: Gender) -> Self {
        gender.to_string()
    }
}

impl Gender {
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("man") {
            Gender::Man
        } else {
            Gender::Woman
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Man => write!(f, "man"),
            Gender::Woman => write!(f, "woman"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manuscript_parses_without_optional_fields() {
        let json = r#"{
            "title": "t",
            "overview": "o",
            "contents": [{"speaker_id": "id1", "text": "hello"}]
        }"#;
        let m: Manuscript = serde_json::from_str(json).unwrap();
        assert!(m.keywords.is_empty());
        assert!(m.meta.is_none());
        assert!(m.contents[0].links.is_empty());
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_empty_manuscript_is_rejected() {
        let m = Manuscript {
            title: "t".to_string(),
            overview: "o".to_string(),
            keywords: vec![],
            contents: vec![],
            meta: None,
        };
        assert!(matches!(m.validate(), Err(BuildError::EmptyManuscript)));
    }

    #[test]
    fn test_gender_tags() {
        assert_eq!(Gender::from_tag("man"), Gender::Man);
        assert_eq!(Gender::from_tag("Man"), Gender::Man);
        assert_eq!(Gender::from_tag("woman"), Gender::Woman);
        assert_eq!(Gender::from_tag("unknown"), Gender::Woman);

        let g: Gender = serde_json::from_str("\"man\"").unwrap();
        assert_eq!(g, Gender::Man);
        assert_eq!(serde_json::to_string(&Gender::Woman).unwrap(), "\"woman\"");
    }
}
