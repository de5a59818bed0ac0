// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-memory type provider
//!
//! Holds a fixed set of [`TypeInfo`] definitions. It can be filled
//! programmatically, from a JSON schema document, or with the bundled
//! FHIR R4 core subset used by tests, benches and the CLI.

use super::provider::{ProviderCapabilities, ProviderResult, TypeProvider};
use super::type_info::{BindingStrength, ElementDefinition, ElementMap, TypeInfo};
use crate::error::{IntellisenseError, ProviderError};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Shape of a JSON schema document
#[derive(Debug, Deserialize)]
struct SchemaDocument {
    types: Vec<TypeInfo>,
}

/// Type provider backed by a map of definitions
#[derive(Debug, Clone, Default)]
pub struct InMemoryTypeProvider {
    types: IndexMap<String, Arc<TypeInfo>>,
}

impl InMemoryTypeProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider from a list of types
    pub fn from_types(types: impl IntoIterator<Item = TypeInfo>) -> Self {
        let mut provider = Self::new();
        for type_info in types {
            provider.add_type(type_info);
        }
        provider
    }

    /// Parse a `{"types": [...]}` schema document
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let document: SchemaDocument = serde_json::from_str(json)
            .map_err(|e| ProviderError::failed(format!("invalid schema document: {e}")))?;
        Ok(Self::from_types(document.types))
    }

    /// Load a schema document from disk
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| IntellisenseError::io(path, e))?;
        Ok(Self::from_json(&content)?)
    }

    /// Register a type, replacing any previous definition with the same name
    ///
    /// Element keys written as `value[x]` are stored under `value`.
    pub fn add_type(&mut self, type_info: TypeInfo) {
        let type_info = normalize_choice_keys(type_info);
        self.types
            .insert(type_info.name().to_string(), Arc::new(type_info));
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if no types are registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// FHIR R4 core subset: base resources, common data types and a handful
    /// of clinical resources
    pub fn fhir_r4_core() -> Self {
        let mut provider = Self::new();

        for primitive in [
            "boolean",
            "integer",
            "decimal",
            "string",
            "uri",
            "url",
            "canonical",
            "code",
            "id",
            "markdown",
            "date",
            "dateTime",
            "instant",
            "time",
            "positiveInt",
            "unsignedInt",
            "base64Binary",
        ] {
            provider.add_type(TypeInfo::primitive(primitive));
        }

        provider.add_data_types();
        provider.add_base_resources();
        provider.add_clinical_resources();
        provider
    }

    fn add_data_types(&mut self) {
        self.add_type(
            TypeInfo::complex("Element")
                .with_element("id", ElementDefinition::single("string"))
                .with_element("extension", ElementDefinition::many("Extension")),
        );
        self.add_type(
            TypeInfo::complex("BackboneElement")
                .with_base("Element")
                .with_element("modifierExtension", ElementDefinition::many("Extension")),
        );
        self.add_type(
            TypeInfo::complex("Extension")
                .with_base("Element")
                .with_element(
                    "url",
                    ElementDefinition::single("uri")
                        .required()
                        .with_documentation("Identifies the meaning of the extension"),
                )
                .with_element(
                    "value",
                    ElementDefinition::choice([
                        "string",
                        "boolean",
                        "integer",
                        "decimal",
                        "code",
                        "dateTime",
                        "Coding",
                        "CodeableConcept",
                        "Quantity",
                        "Reference",
                        "Period",
                    ])
                    .with_documentation("Value of extension"),
                ),
        );
        self.add_type(
            TypeInfo::complex("Coding")
                .with_base("Element")
                .with_element("system", ElementDefinition::single("uri"))
                .with_element("version", ElementDefinition::single("string"))
                .with_element("code", ElementDefinition::single("code"))
                .with_element("display", ElementDefinition::single("string"))
                .with_element("userSelected", ElementDefinition::single("boolean")),
        );
        self.add_type(
            TypeInfo::complex("CodeableConcept")
                .with_base("Element")
                .with_element("coding", ElementDefinition::many("Coding"))
                .with_element("text", ElementDefinition::single("string")),
        );
        self.add_type(
            TypeInfo::complex("Quantity")
                .with_base("Element")
                .with_element("value", ElementDefinition::single("decimal"))
                .with_element("comparator", ElementDefinition::single("code"))
                .with_element("unit", ElementDefinition::single("string"))
                .with_element("system", ElementDefinition::single("uri"))
                .with_element("code", ElementDefinition::single("code")),
        );
        self.add_type(
            TypeInfo::complex("Period")
                .with_base("Element")
                .with_element("start", ElementDefinition::single("dateTime"))
                .with_element("end", ElementDefinition::single("dateTime")),
        );
        self.add_type(
            TypeInfo::complex("Range")
                .with_base("Element")
                .with_element("low", ElementDefinition::single("Quantity"))
                .with_element("high", ElementDefinition::single("Quantity")),
        );
        self.add_type(
            TypeInfo::complex("Ratio")
                .with_base("Element")
                .with_element("numerator", ElementDefinition::single("Quantity"))
                .with_element("denominator", ElementDefinition::single("Quantity")),
        );
        self.add_type(
            TypeInfo::complex("Reference")
                .with_base("Element")
                .with_element("reference", ElementDefinition::single("string"))
                .with_element("type", ElementDefinition::single("uri"))
                .with_element("identifier", ElementDefinition::single("Identifier"))
                .with_element("display", ElementDefinition::single("string")),
        );
        self.add_type(
            TypeInfo::complex("Identifier")
                .with_base("Element")
                .with_element(
                    "use",
                    ElementDefinition::single("code").with_binding(
                        BindingStrength::Required,
                        "http://hl7.org/fhir/ValueSet/identifier-use",
                    ),
                )
                .with_element("type", ElementDefinition::single("CodeableConcept"))
                .with_element("system", ElementDefinition::single("uri"))
                .with_element("value", ElementDefinition::single("string"))
                .with_element("period", ElementDefinition::single("Period"))
                .with_element("assigner", ElementDefinition::single("Reference")),
        );
        self.add_type(
            TypeInfo::complex("HumanName")
                .with_base("Element")
                .with_element(
                    "use",
                    ElementDefinition::single("code").with_binding(
                        BindingStrength::Required,
                        "http://hl7.org/fhir/ValueSet/name-use",
                    ),
                )
                .with_element("text", ElementDefinition::single("string"))
                .with_element(
                    "family",
                    ElementDefinition::single("string").with_documentation("Family name"),
                )
                .with_element(
                    "given",
                    ElementDefinition::many("string").with_documentation("Given names"),
                )
                .with_element("prefix", ElementDefinition::many("string"))
                .with_element("suffix", ElementDefinition::many("string"))
                .with_element("period", ElementDefinition::single("Period")),
        );
        self.add_type(
            TypeInfo::complex("Address")
                .with_base("Element")
                .with_element("use", ElementDefinition::single("code"))
                .with_element("type", ElementDefinition::single("code"))
                .with_element("text", ElementDefinition::single("string"))
                .with_element("line", ElementDefinition::many("string"))
                .with_element("city", ElementDefinition::single("string"))
                .with_element("district", ElementDefinition::single("string"))
                .with_element("state", ElementDefinition::single("string"))
                .with_element("postalCode", ElementDefinition::single("string"))
                .with_element("country", ElementDefinition::single("string"))
                .with_element("period", ElementDefinition::single("Period")),
        );
        self.add_type(
            TypeInfo::complex("ContactPoint")
                .with_base("Element")
                .with_element("system", ElementDefinition::single("code"))
                .with_element("value", ElementDefinition::single("string"))
                .with_element("use", ElementDefinition::single("code"))
                .with_element("rank", ElementDefinition::single("positiveInt"))
                .with_element("period", ElementDefinition::single("Period")),
        );
        self.add_type(
            TypeInfo::complex("Meta")
                .with_base("Element")
                .with_element("versionId", ElementDefinition::single("id"))
                .with_element("lastUpdated", ElementDefinition::single("instant"))
                .with_element("source", ElementDefinition::single("uri"))
                .with_element("profile", ElementDefinition::many("canonical"))
                .with_element("tag", ElementDefinition::many("Coding")),
        );
        self.add_type(
            TypeInfo::complex("Narrative")
                .with_base("Element")
                .with_element("status", ElementDefinition::single("code").required())
                .with_element("div", ElementDefinition::single("string").required()),
        );
    }

    fn add_base_resources(&mut self) {
        self.add_type(
            TypeInfo::resource("Resource")
                .with_element(
                    "id",
                    ElementDefinition::single("id").with_documentation("Logical id of this artifact"),
                )
                .with_element("meta", ElementDefinition::single("Meta"))
                .with_element("implicitRules", ElementDefinition::single("uri"))
                .with_element("language", ElementDefinition::single("code")),
        );
        self.add_type(
            TypeInfo::resource("DomainResource")
                .with_base("Resource")
                .with_element("text", ElementDefinition::single("Narrative"))
                .with_element("contained", ElementDefinition::many("Resource"))
                .with_element("extension", ElementDefinition::many("Extension"))
                .with_element("modifierExtension", ElementDefinition::many("Extension")),
        );
    }

    fn add_clinical_resources(&mut self) {
        self.add_type(
            TypeInfo::resource("Patient")
                .with_base("DomainResource")
                .with_element("identifier", ElementDefinition::many("Identifier"))
                .with_element(
                    "active",
                    ElementDefinition::single("boolean")
                        .with_documentation("Whether this patient's record is in active use"),
                )
                .with_element(
                    "name",
                    ElementDefinition::many("HumanName")
                        .with_documentation("A name associated with the patient"),
                )
                .with_element("telecom", ElementDefinition::many("ContactPoint"))
                .with_element(
                    "gender",
                    ElementDefinition::single("code").with_binding(
                        BindingStrength::Required,
                        "http://hl7.org/fhir/ValueSet/administrative-gender",
                    ),
                )
                .with_element(
                    "birthDate",
                    ElementDefinition::single("date")
                        .with_documentation("The date of birth for the individual"),
                )
                .with_element("deceased", ElementDefinition::choice(["boolean", "dateTime"]))
                .with_element("address", ElementDefinition::many("Address"))
                .with_element("maritalStatus", ElementDefinition::single("CodeableConcept"))
                .with_element(
                    "multipleBirth",
                    ElementDefinition::choice(["boolean", "integer"]),
                )
                .with_element("generalPractitioner", ElementDefinition::many("Reference"))
                .with_element("managingOrganization", ElementDefinition::single("Reference")),
        );

        let observation_values = [
            "Quantity",
            "CodeableConcept",
            "string",
            "boolean",
            "integer",
            "Range",
            "Ratio",
            "time",
            "dateTime",
            "Period",
        ];
        self.add_type(
            TypeInfo::complex("ObservationComponent")
                .with_base("BackboneElement")
                .with_element("code", ElementDefinition::single("CodeableConcept").required())
                .with_element("value", ElementDefinition::choice(observation_values))
                .with_element("interpretation", ElementDefinition::many("CodeableConcept")),
        );
        self.add_type(
            TypeInfo::resource("Observation")
                .with_base("DomainResource")
                .with_element("identifier", ElementDefinition::many("Identifier"))
                .with_element(
                    "status",
                    ElementDefinition::single("code")
                        .required()
                        .with_binding(
                            BindingStrength::Required,
                            "http://hl7.org/fhir/ValueSet/observation-status",
                        )
                        .with_documentation("registered | preliminary | final | amended +"),
                )
                .with_element("category", ElementDefinition::many("CodeableConcept"))
                .with_element(
                    "code",
                    ElementDefinition::single("CodeableConcept")
                        .required()
                        .with_documentation("Type of observation (code / type)"),
                )
                .with_element("subject", ElementDefinition::single("Reference"))
                .with_element("encounter", ElementDefinition::single("Reference"))
                .with_element(
                    "effective",
                    ElementDefinition::choice(["dateTime", "Period", "instant"]),
                )
                .with_element("issued", ElementDefinition::single("instant"))
                .with_element("performer", ElementDefinition::many("Reference"))
                .with_element(
                    "value",
                    ElementDefinition::choice(observation_values)
                        .with_documentation("Actual result"),
                )
                .with_element("interpretation", ElementDefinition::many("CodeableConcept"))
                .with_element("bodySite", ElementDefinition::single("CodeableConcept"))
                .with_element("method", ElementDefinition::single("CodeableConcept"))
                .with_element("component", ElementDefinition::many("ObservationComponent")),
        );
        self.add_type(
            TypeInfo::resource("Practitioner")
                .with_base("DomainResource")
                .with_element("identifier", ElementDefinition::many("Identifier"))
                .with_element("active", ElementDefinition::single("boolean"))
                .with_element("name", ElementDefinition::many("HumanName"))
                .with_element("telecom", ElementDefinition::many("ContactPoint"))
                .with_element("address", ElementDefinition::many("Address"))
                .with_element("gender", ElementDefinition::single("code"))
                .with_element("birthDate", ElementDefinition::single("date")),
        );
        self.add_type(
            TypeInfo::resource("Organization")
                .with_base("DomainResource")
                .with_element("identifier", ElementDefinition::many("Identifier"))
                .with_element("active", ElementDefinition::single("boolean"))
                .with_element("name", ElementDefinition::single("string"))
                .with_element("alias", ElementDefinition::many("string"))
                .with_element("telecom", ElementDefinition::many("ContactPoint"))
                .with_element("address", ElementDefinition::many("Address")),
        );
    }
}

/// Store `name[x]` element keys under their base name
fn normalize_choice_keys(type_info: TypeInfo) -> TypeInfo {
    let strip = |elements: ElementMap| -> ElementMap {
        elements
            .into_iter()
            .map(|(key, element)| match key.strip_suffix("[x]") {
                Some(base) => (base.to_string(), element),
                None => (key, element),
            })
            .collect()
    };

    match type_info {
        TypeInfo::Complex {
            name,
            elements,
            base_type_name,
        } => TypeInfo::Complex {
            name,
            elements: strip(elements),
            base_type_name,
        },
        TypeInfo::Resource {
            name,
            elements,
            base_type_name,
        } => TypeInfo::Resource {
            name,
            elements: strip(elements),
            base_type_name,
        },
        other => other,
    }
}

#[async_trait]
impl TypeProvider for InMemoryTypeProvider {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::full()
    }

    async fn get_type(&self, name: &str) -> ProviderResult<Option<Arc<TypeInfo>>> {
        Ok(self.types.get(name).cloned())
    }

    async fn all_resource_types(&self) -> ProviderResult<Vec<String>> {
        Ok(self
            .types
            .values()
            .filter(|type_info| type_info.is_resource())
            .map(|type_info| type_info.name().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_core_schema_lookup() {
        let provider = InMemoryTypeProvider::fhir_r4_core();
        let patient = provider.get_type("Patient").await.unwrap().unwrap();
        assert_eq!(patient.base_type_name(), Some("DomainResource"));

        let name = provider.element_type(&patient, "name").await.unwrap().unwrap();
        assert_eq!(name.name(), "HumanName");

        assert!(provider.get_type("Unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_choice_element_resolves_to_choice_type() {
        let provider = InMemoryTypeProvider::fhir_r4_core();
        let observation = provider.get_type("Observation").await.unwrap().unwrap();

        let value = provider
            .element_type(&observation, "value")
            .await
            .unwrap()
            .unwrap();
        assert!(value.is_choice());
        if let TypeInfo::Choice { alternatives, .. } = value.as_ref() {
            assert_eq!(alternatives[0].name(), "Quantity");
            assert_eq!(alternatives.len(), 10);
        }
    }

    #[tokio::test]
    async fn test_resource_listing_excludes_data_types() {
        let provider = InMemoryTypeProvider::fhir_r4_core();
        let resources = provider.all_resource_types().await.unwrap();
        assert!(resources.contains(&"Patient".to_string()));
        assert!(resources.contains(&"Observation".to_string()));
        assert!(!resources.contains(&"HumanName".to_string()));
    }

    #[tokio::test]
    async fn test_from_json_strips_choice_suffix() {
        let json = r#"{"types": [
            {"kind": "primitive", "name": "string"},
            {"kind": "resource", "name": "Basic", "elements": {
                "value[x]": {"choices": ["string", "boolean"]}
            }}
        ]}"#;
        let provider = InMemoryTypeProvider::from_json(json).unwrap();
        assert_eq!(provider.len(), 2);

        let basic = provider.get_type("Basic").await.unwrap().unwrap();
        assert_eq!(basic.element_names(), vec!["value"]);

        let value = provider.element_type(&basic, "value").await.unwrap().unwrap();
        assert!(value.is_choice());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(InMemoryTypeProvider::from_json("{not json").is_err());
    }
}
