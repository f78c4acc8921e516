use crate::errors::{ValidationError, DomainResult, DomainError};
use regex::Regex;
use once_cell::sync::Lazy;

/// A trait that entities should implement for validation.
pub trait Validate {
    /// Validates the entity and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

static COUNT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{1,4}$").unwrap());

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    missing: bool,
    errors: Vec<ValidationError>,
}

/// Collects errors across the fields of one entity.
///
/// Missing required fields are gathered into a single `MissingFields` error so the
/// caller can report every absent field at once; any other error is reported
/// only when nothing is missing.
pub struct NestedValidator {
    missing: Vec<String>,
    errors: Vec<ValidationError>,
}

impl Default for NestedValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl NestedValidator {
    pub fn new() -> Self {
        Self { missing: Vec::new(), errors: Vec::new() }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        match error {
            ValidationError::Required { field } => self.missing.push(field),
            ValidationError::MissingFields { fields } => self.missing.extend(fields),
            other => self.errors.push(other),
        }
    }

    /// Fold a finished builder into this validator.
    pub fn check<T>(&mut self, builder: ValidationBuilder<T>) {
        for error in builder.into_errors() {
            self.add_error(error);
        }
    }

    pub fn validate(self) -> DomainResult<()> {
        if !self.missing.is_empty() {
            return Err(DomainError::Validation(ValidationError::missing_fields(self.missing)));
        }
        match self.errors.into_iter().next() {
            Some(first) => Err(DomainError::Validation(first)),
            None => Ok(()),
        }
    }
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            missing: false,
            errors: Vec::new(),
        }
    }

    /// Only presence is checked; use `ValidationBuilder<String>::not_blank` for text.
    pub fn present(mut self) -> Self {
        if self.value.is_none() {
            self.missing = true;
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    pub fn validate_with<F>(mut self, validator: F) -> Self
    where F: FnOnce(&T) -> Result<(), ValidationError> {
        if self.missing {
            return self;
        }
        if let Some(value) = &self.value {
            if let Err(err) = validator(value) {
                self.errors.push(err);
            }
        }
        self
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        match self.errors.into_iter().next() {
            Some(first) => Err(DomainError::Validation(first)),
            None => Ok(()),
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    /// Absent, empty and whitespace-only values all count as missing.
    pub fn not_blank(mut self) -> Self {
        let blank = self.value.as_deref().map_or(true, |v| v.trim().is_empty());
        if blank {
            self.missing = true;
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    pub fn matches_pattern(mut self, pattern: &Regex, message: &str) -> Self {
        if self.missing {
            return self;
        }
        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            if !pattern.is_match(value) {
                self.errors.push(ValidationError::format(&self.field_name, message));
            }
        }
        self
    }

    /// Empty is allowed; otherwise the text must be a non-negative whole number.
    pub fn count(self) -> Self {
        self.matches_pattern(&COUNT_REGEX, "must be a non-negative whole number")
    }

    pub fn one_of(mut self, allowed_values: &[&str], message: Option<&str>) -> Self {
        if self.missing {
            return self;
        }
        if let Some(value) = &self.value {
            if !allowed_values.contains(&value.as_str()) {
                let reason = message.unwrap_or("must be one of the allowed values");
                self.errors.push(ValidationError::invalid_value(&self.field_name, reason));
            }
        }
        self
    }
}

/// Numeric validations
impl<T> ValidationBuilder<T>
where T: PartialOrd + Clone + std::fmt::Display
{
    pub fn range(mut self, min: T, max: T) -> Self {
        if let Some(value) = &self.value {
            if value < &min || value > &max {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    min.to_string(),
                    max.to_string()
                ));
            }
        }
        self
    }
}
