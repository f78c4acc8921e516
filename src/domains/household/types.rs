use crate::domains::household::catalog::{self, ASSESSMENT_QUESTIONS};
use crate::domains::household::scoring::VulnerabilityTier;
use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::types::format_timestamp;
use crate::validation::{NestedValidator, Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// --- lenient readers for data written by older app versions ---

/// Accepts a string, number or bool and yields its text; null and absent become "".
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) | Value::Object(_) => Ok(String::new()),
    }
}

/// Scores are always recomputed, so anything unreadable simply becomes 0.
fn lenient_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let score = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().map(|v| v.min(u32::MAX as u64) as u32).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    Ok(score)
}

/// Null or a value of the wrong shape reads as the default, so one damaged
/// sub-object does not hide the whole household.
fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        log::debug!("Ignoring unreadable stored field: {}", e);
        T::default()
    }))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        _ => None,
    })
}

fn serialize_timestamp<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match ts {
        Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
        None => serializer.serialize_none(),
    }
}

/// JavaScript truthiness, which is what decided record validity in the stored data.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Household head identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gender: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub marital_status: String,
}

/// Member counts, kept as entered (numeric strings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub children: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub elderly: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub disabled: String,
}

/// Answers to the fixed poverty-assessment questionnaire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentAnswers {
    #[serde(default, deserialize_with = "lenient_or_default", skip_serializing_if = "Option::is_none")]
    pub housing: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default", skip_serializing_if = "Option::is_none")]
    pub water: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default", skip_serializing_if = "Option::is_none")]
    pub income: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default", skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default", skip_serializing_if = "Option::is_none")]
    pub meals: Option<String>,
}

impl AssessmentAnswers {
    /// Answer for a question id from the catalog.
    pub fn get(&self, question_id: &str) -> Option<&str> {
        let answer = match question_id {
            catalog::HOUSING => &self.housing,
            catalog::WATER => &self.water,
            catalog::INCOME => &self.income,
            catalog::EDUCATION => &self.education,
            catalog::MEALS => &self.meals,
            _ => return None,
        };
        answer.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One household survey submission as stored on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub_location: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub village: String,
    pub head_details: HeadDetails,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub household_details: HouseholdDetails,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub assessment_answers: AssessmentAnswers,
    #[serde(default, deserialize_with = "lenient_score")]
    pub poverty_score: u32,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub photo: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub geo_coordinates: Option<GeoCoordinates>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        serialize_with = "serialize_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// Fields this version does not know about; written back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HouseholdRecord {
    /// Read one stored entry. Entries that are not displayable (no truthy `id`, or
    /// no `headDetails` object with a non-empty `name`) yield `None`.
    pub fn from_stored(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if !obj.get("id").map_or(false, is_truthy) {
            return None;
        }
        let head = obj.get("headDetails")?.as_object()?;
        if !head.get("name").map_or(false, is_truthy) {
            return None;
        }
        match serde_json::from_value::<HouseholdRecord>(value.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                log::debug!("Dropping unreadable household entry: {}", e);
                None
            }
        }
    }

    pub fn key(&self) -> SyncedRecordKey {
        SyncedRecordKey {
            id: self.id.clone(),
            timestamp: self.timestamp,
        }
    }

    pub fn vulnerability(&self) -> VulnerabilityTier {
        VulnerabilityTier::from_score(self.poverty_score)
    }
}

/// The `id` of a stored entry as text, if it has a usable one.
pub fn stored_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Identity of a record version taken into a sync snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncedRecordKey {
    pub id: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Form input for creating or editing a household.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHousehold {
    #[serde(default)]
    pub sub_location: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub head_details: HeadDetails,
    #[serde(default)]
    pub household_details: HouseholdDetails,
    #[serde(default)]
    pub assessment_answers: AssessmentAnswers,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub geo_coordinates: Option<GeoCoordinates>,
}

impl Validate for NewHousehold {
    fn validate(&self) -> DomainResult<()> {
        let mut v = NestedValidator::new();

        let sub_location = self.sub_location.clone();
        v.check(
            ValidationBuilder::new("subLocation", sub_location)
                .not_blank()
                .validate_with(|s| match catalog::villages_for(s) {
                    Some(_) => Ok(()),
                    None => Err(ValidationError::invalid_value("subLocation", "is not a known sub-location")),
                }),
        );

        let known_villages = self
            .sub_location
            .as_deref()
            .and_then(catalog::villages_for);
        v.check(
            ValidationBuilder::new("village", self.village.clone())
                .not_blank()
                .validate_with(|village| match known_villages {
                    Some(villages) if !villages.contains(&village.as_str()) => Err(
                        ValidationError::invalid_value("village", "does not belong to the selected sub-location"),
                    ),
                    _ => Ok(()),
                }),
        );

        let head = &self.head_details;
        v.check(ValidationBuilder::new("headDetails.name", Some(head.name.clone())).not_blank());
        v.check(ValidationBuilder::new("headDetails.idNumber", Some(head.id_number.clone())).not_blank());
        v.check(ValidationBuilder::new("photo", self.photo.clone()).not_blank());
        v.check(ValidationBuilder::new("geoCoordinates", self.geo_coordinates).present());

        v.check(
            ValidationBuilder::new("headDetails.gender", Some(head.gender.clone()))
                .one_of(catalog::GENDERS, Some("must be 'male', 'female' or empty")),
        );
        v.check(ValidationBuilder::new("headDetails.age", Some(head.age.trim().to_string())).count());

        let members = &self.household_details;
        for (field, value) in [
            ("householdDetails.children", &members.children),
            ("householdDetails.elderly", &members.elderly),
            ("householdDetails.disabled", &members.disabled),
        ] {
            v.check(ValidationBuilder::new(field, Some(value.trim().to_string())).count());
        }

        for question in ASSESSMENT_QUESTIONS {
            if let Some(answer) = self.assessment_answers.get(question.id) {
                let field = format!("assessmentAnswers.{}", question.id);
                v.check(
                    ValidationBuilder::new(&field, Some(answer.to_string()))
                        .one_of(question.options, Some("is not one of the question's options")),
                );
            }
        }

        if let Some(geo) = self.geo_coordinates {
            v.check(ValidationBuilder::new("geoCoordinates.latitude", Some(geo.latitude)).range(-90.0, 90.0));
            v.check(ValidationBuilder::new("geoCoordinates.longitude", Some(geo.longitude)).range(-180.0, 180.0));
        }

        v.validate()
    }
}

/// Result of a read that degrades to empty instead of failing.
///
/// `load_error` distinguishes "no data" from "data could not be loaded".
#[derive(Debug, Clone, Default)]
pub struct LoadedHouseholds {
    pub records: Vec<HouseholdRecord>,
    pub load_error: Option<DomainError>,
}

/// A record together with its display-only vulnerability tier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdResponse {
    #[serde(flatten)]
    pub record: HouseholdRecord,
    pub vulnerability: VulnerabilityTier,
}

impl From<HouseholdRecord> for HouseholdResponse {
    fn from(record: HouseholdRecord) -> Self {
        let vulnerability = record.vulnerability();
        Self { record, vulnerability }
    }
}
