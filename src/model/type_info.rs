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

//! Schema type representation
//!
//! One tagged union covers every shape a schema type can take, so callers
//! match on the variant instead of probing storage layouts. Element types
//! are referenced by name and resolved through the
//! [`TypeProvider`](super::TypeProvider), which keeps recursive structures
//! such as `Extension.extension` finite.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Elements of a complex or resource type, in declaration order
pub type ElementMap = IndexMap<String, ElementDefinition>;

/// A schema type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeInfo {
    /// Primitive value type such as `string` or `boolean`
    Primitive {
        /// Type name
        name: String,
    },
    /// Complex data type such as `HumanName`
    Complex {
        /// Type name
        name: String,
        /// Declared elements
        #[serde(default)]
        elements: ElementMap,
        /// Name of the type this one derives from
        #[serde(default, rename = "base", skip_serializing_if = "Option::is_none")]
        base_type_name: Option<String>,
    },
    /// Resource type such as `Patient`
    Resource {
        /// Type name
        name: String,
        /// Declared elements
        #[serde(default)]
        elements: ElementMap,
        /// Name of the type this one derives from
        #[serde(default, rename = "base", skip_serializing_if = "Option::is_none")]
        base_type_name: Option<String>,
    },
    /// Polymorphic `name[x]` element type
    Choice {
        /// Choice name, `value[x]` style
        name: String,
        /// Alternative types in provider order
        #[serde(default)]
        alternatives: Vec<Arc<TypeInfo>>,
    },
}

impl TypeInfo {
    /// Create a primitive type
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::Primitive { name: name.into() }
    }

    /// Create a complex type without elements
    pub fn complex(name: impl Into<String>) -> Self {
        Self::Complex {
            name: name.into(),
            elements: ElementMap::new(),
            base_type_name: None,
        }
    }

    /// Create a resource type without elements
    pub fn resource(name: impl Into<String>) -> Self {
        Self::Resource {
            name: name.into(),
            elements: ElementMap::new(),
            base_type_name: None,
        }
    }

    /// Create a choice type
    ///
    /// A single alternative is not a choice at all, so it is returned as is.
    pub fn choice(name: impl Into<String>, mut alternatives: Vec<Arc<TypeInfo>>) -> Arc<Self> {
        if alternatives.len() == 1 {
            return alternatives.remove(0);
        }
        Arc::new(Self::Choice {
            name: name.into(),
            alternatives,
        })
    }

    /// Set the base type (no effect on primitives and choices)
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        match &mut self {
            Self::Complex { base_type_name, .. } | Self::Resource { base_type_name, .. } => {
                *base_type_name = Some(base.into());
            }
            Self::Primitive { .. } | Self::Choice { .. } => {}
        }
        self
    }

    /// Add an element (no effect on primitives and choices)
    pub fn with_element(mut self, name: impl Into<String>, element: ElementDefinition) -> Self {
        if let Self::Complex { elements, .. } | Self::Resource { elements, .. } = &mut self {
            elements.insert(name.into(), element);
        }
        self
    }

    /// Type name
    pub fn name(&self) -> &str {
        match self {
            Self::Primitive { name }
            | Self::Complex { name, .. }
            | Self::Resource { name, .. }
            | Self::Choice { name, .. } => name,
        }
    }

    /// Name of the base type, if any
    pub fn base_type_name(&self) -> Option<&str> {
        match self {
            Self::Complex { base_type_name, .. } | Self::Resource { base_type_name, .. } => {
                base_type_name.as_deref()
            }
            Self::Primitive { .. } | Self::Choice { .. } => None,
        }
    }

    /// Declared elements, `None` for primitives and choices
    pub fn elements(&self) -> Option<&ElementMap> {
        match self {
            Self::Complex { elements, .. } | Self::Resource { elements, .. } => Some(elements),
            Self::Primitive { .. } | Self::Choice { .. } => None,
        }
    }

    /// Look up a declared element by exact name
    pub fn element(&self, name: &str) -> Option<&ElementDefinition> {
        self.elements().and_then(|elements| elements.get(name))
    }

    /// Names of declared elements in declaration order
    pub fn element_names(&self) -> Vec<String> {
        self.elements()
            .map(|elements| elements.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether this is a choice with more than one alternative
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Choice { alternatives, .. } if alternatives.len() > 1)
    }

    /// Whether this is a resource type
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource { .. })
    }

    /// Whether this is a primitive type
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive { .. })
    }

    /// Short label for the variant
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Primitive { .. } => "primitive",
            Self::Complex { .. } => "complex",
            Self::Resource { .. } => "resource",
            Self::Choice { .. } => "choice",
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Choice { alternatives, .. } => {
                let names: Vec<&str> = alternatives.iter().map(|alt| alt.name()).collect();
                write!(f, "{}", names.join(" | "))
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Strength of a terminology binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrength {
    /// Codes must come from the value set
    Required,
    /// Codes should come from the value set
    Extensible,
    /// Value set is recommended
    Preferred,
    /// Value set is illustrative
    Example,
}

/// Value set binding of a coded element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminologyBinding {
    /// Binding strength
    pub strength: BindingStrength,
    /// Canonical URL of the bound value set
    #[serde(rename = "valueSet")]
    pub value_set: String,
}

/// Declaration of one element within a complex or resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    /// Element type name, absent for choice elements
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Alternative type names of a `name[x]` element
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Minimum cardinality
    #[serde(default)]
    pub min: u32,
    /// Maximum cardinality, `None` for unbounded
    #[serde(default = "single_max")]
    pub max: Option<u32>,
    /// Terminology binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<TerminologyBinding>,
    /// Short definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

fn single_max() -> Option<u32> {
    Some(1)
}

impl ElementDefinition {
    /// Optional single-valued element (`0..1`)
    pub fn single(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            choices: Vec::new(),
            min: 0,
            max: Some(1),
            binding: None,
            documentation: None,
        }
    }

    /// Optional repeating element (`0..*`)
    pub fn many(type_name: impl Into<String>) -> Self {
        Self {
            max: None,
            ..Self::single(type_name)
        }
    }

    /// Optional `name[x]` element over the given alternatives
    pub fn choice<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            type_name: None,
            choices: choices.into_iter().map(Into::into).collect(),
            min: 0,
            max: Some(1),
            binding: None,
            documentation: None,
        }
    }

    /// Make the element mandatory (`min = 1`)
    pub fn required(mut self) -> Self {
        self.min = self.min.max(1);
        self
    }

    /// Attach a terminology binding
    pub fn with_binding(mut self, strength: BindingStrength, value_set: impl Into<String>) -> Self {
        self.binding = Some(TerminologyBinding {
            strength,
            value_set: value_set.into(),
        });
        self
    }

    /// Attach a short definition
    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    /// Whether this is a `name[x]` element
    pub fn is_choice(&self) -> bool {
        self.type_name.is_none() && !self.choices.is_empty()
    }

    /// Whether at least one value must be present
    pub fn is_required(&self) -> bool {
        self.min > 0
    }

    /// Whether more than one value is allowed
    pub fn is_collection(&self) -> bool {
        self.max.is_none_or(|max| max > 1)
    }

    /// Cardinality in `min..max` notation
    pub fn cardinality(&self) -> String {
        match self.max {
            Some(max) => format!("{}..{}", self.min, max),
            None => format!("{}..*", self.min),
        }
    }

    /// Human readable type, `a | b` for choices
    pub fn type_label(&self) -> String {
        match &self.type_name {
            Some(name) => name.clone(),
            None => self.choices.join(" | "),
        }
    }
}
