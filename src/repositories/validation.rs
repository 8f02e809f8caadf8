//! Validation utilities for repositories.

use std::collections::HashMap;

use crate::entities::{CreateFormulation, CreateIngredient};
use crate::error::{AppError, Result};

/// Validation rule for a field
pub trait ValidationRule<T> {
    /// Validate the field
    fn validate(&self, value: &T) -> Result<()>;

    /// Get the error message for this rule
    fn error_message(&self) -> String;
}

/// String length validation rule
pub struct StringLength {
    /// Minimum length (inclusive)
    pub min: Option<usize>,
    /// Maximum length (inclusive)
    pub max: Option<usize>,
}

impl ValidationRule<String> for StringLength {
    fn validate(&self, value: &String) -> Result<()> {
        if let Some(min) = self.min {
            if value.len() < min {
                return Err(AppError::validation(self.error_message()));
            }
        }
        if let Some(max) = self.max {
            if value.len() > max {
                return Err(AppError::validation(self.error_message()));
            }
        }
        Ok(())
    }

    fn error_message(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => {
                format!("Length must be between {min} and {max} characters")
            }
            (Some(min), None) => format!("Length must be at least {min} characters"),
            (None, Some(max)) => format!("Length must be at most {max} characters"),
            (None, None) => "Invalid string length".to_owned(),
        }
    }
}

/// Formulation payload validator
pub struct FormulationValidator;

impl FormulationValidator {
    pub fn validate(input: &CreateFormulation) -> Result<()> {
        let mut errors = HashMap::new();

        if input.title.is_empty() {
            errors.insert("title", "Title is required".to_owned());
        } else if let Err(err) =
            (StringLength { min: Some(1), max: Some(255) }).validate(&input.title)
        {
            errors.insert("title", err.to_string());
        }

        if let Some(description) = &input.description {
            if let Err(err) =
                (StringLength { min: None, max: Some(2000) }).validate(description)
            {
                errors.insert("description", err.to_string());
            }
        }

        collect(errors)
    }
}

/// Ingredient payload validator
pub struct IngredientValidator;

impl IngredientValidator {
    pub fn validate(input: &CreateIngredient) -> Result<()> {
        let mut errors = HashMap::new();

        if input.name.is_empty() {
            errors.insert("name", "Name is required".to_owned());
        } else if let Err(err) =
            (StringLength { min: Some(1), max: Some(255) }).validate(&input.name)
        {
            errors.insert("name", err.to_string());
        }

        collect(errors)
    }
}

fn collect(errors: HashMap<&'static str, String>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors.values().cloned().collect::<Vec<String>>().join(", ");
    Err(AppError::validation(message))
}

/// Guard a name destined for interpolation into SQL (column or order-by
/// identifiers). Bound parameters never pass through here.
pub(crate) fn ensure_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(AppError::query(format!("invalid identifier: {name:?}")))
    }
}
