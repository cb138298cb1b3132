use serde::{Deserialize, Serialize};

use super::id::FacilityId;
use super::item::Item;
use crate::error::{RepoError, Result};

/// Quantity of an item a facility consumes per processing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRequirement {
    pub item: Item,
    pub quantity: u32,
}

impl InputRequirement {
    #[must_use]
    pub const fn new(item: Item, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// Quantity of an item a facility produces per processing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDefinition {
    pub item: Item,
    pub quantity: u32,
}

impl OutputDefinition {
    #[must_use]
    pub const fn new(item: Item, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// A manufacturing unit that turns input items into output items over a
/// fixed processing time.
///
/// Zero inputs marks a raw-material source, zero outputs a terminal sink.
/// Inputs and outputs are kept in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FacilityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub processing_time: i64,
    #[serde(default)]
    pub input_requirements: Vec<InputRequirement>,
    #[serde(default)]
    pub output_definitions: Vec<OutputDefinition>,
}

impl Facility {
    /// Create an unsaved facility with no inputs or outputs.
    #[must_use]
    pub fn new(name: impl Into<String>, processing_time: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            processing_time,
            input_requirements: Vec::new(),
            output_definitions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_input(mut self, item: Item, quantity: u32) -> Self {
        self.add_input_requirement(InputRequirement::new(item, quantity));
        self
    }

    #[must_use]
    pub fn with_output(mut self, item: Item, quantity: u32) -> Self {
        self.add_output_definition(OutputDefinition::new(item, quantity));
        self
    }

    pub fn add_input_requirement(&mut self, requirement: InputRequirement) {
        self.input_requirements.push(requirement);
    }

    pub fn add_output_definition(&mut self, definition: OutputDefinition) {
        self.output_definitions.push(definition);
    }

    /// Check the fields a stored facility must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Validation`] for a blank name, a negative
    /// processing time, a zero quantity, or an input/output item that was
    /// never stored.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RepoError::validation("facility name must not be blank"));
        }
        if self.processing_time < 0 {
            return Err(RepoError::validation(format!(
                "facility '{}' has negative processing time {}",
                self.name, self.processing_time
            )));
        }

        let inputs = self
            .input_requirements
            .iter()
            .map(|r| ("input", &r.item, r.quantity));
        let outputs = self
            .output_definitions
            .iter()
            .map(|d| ("output", &d.item, d.quantity));

        for (side, item, quantity) in inputs.chain(outputs) {
            if quantity == 0 {
                return Err(RepoError::validation(format!(
                    "facility '{}' {side} '{}' must have a positive quantity",
                    self.name, item.name
                )));
            }
            item.require_id()?;
        }

        Ok(())
    }

    /// The identity of a stored facility.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Validation`] when the facility was never stored.
    pub fn require_id(&self) -> Result<FacilityId> {
        self.id.ok_or_else(|| {
            RepoError::validation(format!("facility '{}' has no identity", self.name))
        })
    }
}
