use crate::model::generate_short_id;
use serde::{Deserialize, Serialize};

pub const ARCHIVED_MARKER: &str = "-archived-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Options,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub display_name: String,
    /// Opaque system name; empty until the catalog assigns one
    #[serde(default)]
    pub internal_name: String,
    pub attribute_type: AttributeType,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<i64>,
}

impl AttributeDef {
    pub fn new(display_name: &str, attribute_type: AttributeType) -> Self {
        Self {
            display_name: display_name.to_string(),
            internal_name: String::new(),
            attribute_type,
            multi_valued: false,
            archived: false,
            archived_at: None,
        }
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// Archive in place; the display name keeps its original text plus the archival marker
    pub fn archive(&mut self, epoch_millis: i64) {
        if self.archived {
            return;
        }
        self.archived = true;
        self.archived_at = Some(epoch_millis);
        self.display_name = format!("{}{}{}", self.display_name, ARCHIVED_MARKER, epoch_millis);
    }

    /// Display name without any archival suffix
    pub fn original_display_name(&self) -> &str {
        match self.display_name.find(ARCHIVED_MARKER) {
            Some(index) if self.archived => &self.display_name[..index],
            _ => &self.display_name,
        }
    }
}

/// A custom-metadata set: display names outward, opaque internal names on assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetadataDef {
    pub display_name: String,
    #[serde(default)]
    pub internal_name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

impl CustomMetadataDef {
    pub fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            internal_name: String::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Fill in internal names that are still unassigned
    pub fn assign_internal_names(&mut self) {
        if self.internal_name.is_empty() {
            self.internal_name = generate_short_id();
        }
        for attribute in &mut self.attributes {
            if attribute.internal_name.is_empty() {
                attribute.internal_name = generate_short_id();
            }
        }
    }

    /// Active (non-archived) attribute by display name
    pub fn attribute(&self, display_name: &str) -> Option<&AttributeDef> {
        self.attributes
            .iter()
            .find(|a| !a.archived && a.display_name == display_name)
    }

    pub fn attribute_mut(&mut self, display_name: &str) -> Option<&mut AttributeDef> {
        self.attributes
            .iter_mut()
            .find(|a| !a.archived && a.display_name == display_name)
    }

    pub fn internal_attribute_name(&self, display_name: &str) -> Option<&str> {
        self.attribute(display_name).map(|a| a.internal_name.as_str())
    }

    pub fn display_attribute_name(&self, internal_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.internal_name == internal_name)
            .map(|a| a.display_name.as_str())
    }

    pub fn active_attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.iter().filter(|a| !a.archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_internal_names_maps_display_names() {
        let mut def = CustomMetadataDef::new("Data Quality")
            .with_attribute(AttributeDef::new("Score", AttributeType::Decimal))
            .with_attribute(AttributeDef::new("Checked", AttributeType::Boolean));
        def.assign_internal_names();

        let internal = def.internal_attribute_name("Score").unwrap().to_string();
        assert!(!internal.is_empty());
        assert_ne!(internal, "Score");
        assert_eq!(def.display_attribute_name(&internal), Some("Score"));
        assert_ne!(def.internal_name, def.display_name);
    }

    #[test]
    fn test_archive_suffixes_display_name_and_hides_attribute() {
        let mut def = CustomMetadataDef::new("Ownership")
            .with_attribute(AttributeDef::new("Steward", AttributeType::String));
        def.assign_internal_names();

        def.attribute_mut("Steward").unwrap().archive(1_700_000_000_000);

        assert!(def.attribute("Steward").is_none());
        let archived = &def.attributes[0];
        assert_eq!(archived.display_name, "Steward-archived-1700000000000");
        assert_eq!(archived.original_display_name(), "Steward");
        assert_eq!(def.active_attributes().count(), 0);
    }
}
