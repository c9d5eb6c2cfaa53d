//! Canonical subject and category vocabularies.
//!
//! Clients send several spellings for the same value (display names from
//! forms, short names from filter buttons, or the canonical name itself).
//! `parse` maps any accepted spelling onto the closed enum and returns
//! `None` for anything else; callers reject unknown values.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    DataStructuresAlgorithms,
    WebDevelopment,
    MachineLearning,
    CompetitiveProgramming,
    MobileDevelopment,
    Other,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::DataStructuresAlgorithms,
        Subject::WebDevelopment,
        Subject::MachineLearning,
        Subject::CompetitiveProgramming,
        Subject::MobileDevelopment,
        Subject::Other,
    ];

    pub fn parse(input: &str) -> Option<Self> {
        let subject = match input.trim() {
            "DataStructuresAlgorithms" | "Data Structures & Algorithms" | "DSA" => {
                Subject::DataStructuresAlgorithms
            }
            "WebDevelopment" | "Web Development" | "Web Dev" => Subject::WebDevelopment,
            "MachineLearning" | "Machine Learning" | "ML" => Subject::MachineLearning,
            "CompetitiveProgramming" | "Competitive Programming" => {
                Subject::CompetitiveProgramming
            }
            "MobileDevelopment" | "Mobile Development" | "Mobile Dev" => {
                Subject::MobileDevelopment
            }
            "Other" => Subject::Other,
            _ => return None,
        };
        Some(subject)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::DataStructuresAlgorithms => "DataStructuresAlgorithms",
            Subject::WebDevelopment => "WebDevelopment",
            Subject::MachineLearning => "MachineLearning",
            Subject::CompetitiveProgramming => "CompetitiveProgramming",
            Subject::MobileDevelopment => "MobileDevelopment",
            Subject::Other => "Other",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Notes,
    #[serde(rename = "PDF")]
    Pdf,
    PresentationSlides,
    Video,
    Code,
    Other,
}

impl Category {
    pub fn parse(input: &str) -> Option<Self> {
        let category = match input.trim() {
            "Notes" => Category::Notes,
            "PDF" => Category::Pdf,
            "PresentationSlides" | "Presentation/Slides" => Category::PresentationSlides,
            "Video" => Category::Video,
            "Code" => Category::Code,
            "Other" => Category::Other,
            _ => return None,
        };
        Some(category)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Notes => "Notes",
            Category::Pdf => "PDF",
            Category::PresentationSlides => "PresentationSlides",
            Category::Video => "Video",
            Category::Code => "Code",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_aliases_map_to_canonical() {
        assert_eq!(Subject::parse("Web Development"), Some(Subject::WebDevelopment));
        assert_eq!(Subject::parse("Web Dev"), Some(Subject::WebDevelopment));
        assert_eq!(Subject::parse("WebDevelopment"), Some(Subject::WebDevelopment));
        assert_eq!(
            Subject::parse("Data Structures & Algorithms"),
            Some(Subject::DataStructuresAlgorithms)
        );
        assert_eq!(Subject::parse("DSA"), Some(Subject::DataStructuresAlgorithms));
        assert_eq!(Subject::parse(" ML "), Some(Subject::MachineLearning));
    }

    #[test]
    fn test_unknown_subject_is_rejected() {
        assert_eq!(Subject::parse("Basket Weaving"), None);
        assert_eq!(Subject::parse(""), None);
    }

    #[test]
    fn test_subject_round_trips_through_canonical_name() {
        for subject in Subject::ALL {
            assert_eq!(Subject::parse(subject.as_str()), Some(subject));
        }
    }

    #[test]
    fn test_category_slash_alias() {
        assert_eq!(
            Category::parse("Presentation/Slides"),
            Some(Category::PresentationSlides)
        );
        assert_eq!(Category::PresentationSlides.as_str(), "PresentationSlides");
        assert_eq!(Category::parse("PDF"), Some(Category::Pdf));
        assert_eq!(Category::parse("pdf"), None);
    }

    #[test]
    fn test_category_serializes_canonically() {
        assert_eq!(serde_json::to_string(&Category::Pdf).unwrap(), "\"PDF\"");
        assert_eq!(
            serde_json::to_string(&Category::PresentationSlides).unwrap(),
            "\"PresentationSlides\""
        );
    }
}
