//! Fixed reference data for the survey form: where households can be located and
//! which assessment questions are asked.

use serde::Serialize;

/// Sub-locations and the villages that belong to each.
pub const SUB_LOCATIONS: &[(&str, &[&str])] = &[
    ("Karundu", &["Village 1", "Village 2", "Village 3"]),
    ("Gaaki", &["Village A", "Village B", "Village C"]),
    ("Thegenge", &["Upper Thegenge", "Lower Thegenge", "Central Thegenge"]),
    ("Aguuthi", &["East Aguuthi", "West Aguuthi", "South Aguuthi"]),
];

/// Accepted values for `headDetails.gender`; empty means not stated.
pub const GENDERS: &[&str] = &["male", "female", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssessmentQuestion {
    pub id: &'static str,
    pub question: &'static str,
    pub options: &'static [&'static str],
}

pub const HOUSING: &str = "housing";
pub const WATER: &str = "water";
pub const INCOME: &str = "income";
pub const EDUCATION: &str = "education";
pub const MEALS: &str = "meals";

pub const ASSESSMENT_QUESTIONS: &[AssessmentQuestion] = &[
    AssessmentQuestion {
        id: HOUSING,
        question: "Type of Housing",
        options: &["Permanent", "Semi-Permanent", "Temporary"],
    },
    AssessmentQuestion {
        id: WATER,
        question: "Access to Clean Water",
        options: &["Piped Water", "Well/Borehole", "River/Stream"],
    },
    AssessmentQuestion {
        id: INCOME,
        question: "Main Source of Income",
        options: &["Formal Employment", "Casual Labor", "Small Business", "None"],
    },
    AssessmentQuestion {
        id: EDUCATION,
        question: "Children's Education",
        options: &["All in School", "Some in School", "None in School", "No Children"],
    },
    AssessmentQuestion {
        id: MEALS,
        question: "Number of Meals per Day",
        options: &["Three or More", "Two", "One"],
    },
];

pub fn villages_for(sub_location: &str) -> Option<&'static [&'static str]> {
    SUB_LOCATIONS
        .iter()
        .find(|(name, _)| *name == sub_location)
        .map(|(_, villages)| *villages)
}

#[derive(Debug, Clone, Serialize)]
pub struct SubLocationEntry {
    pub name: &'static str,
    pub villages: &'static [&'static str],
}

/// Serializable view of the catalog handed to the form screens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyCatalog {
    pub sub_locations: Vec<SubLocationEntry>,
    pub genders: &'static [&'static str],
    pub assessment_questions: &'static [AssessmentQuestion],
}

pub fn survey_catalog() -> SurveyCatalog {
    SurveyCatalog {
        sub_locations: SUB_LOCATIONS
            .iter()
            .map(|&(name, villages)| SubLocationEntry { name, villages })
            .collect(),
        genders: GENDERS,
        assessment_questions: ASSESSMENT_QUESTIONS,
    }
}
