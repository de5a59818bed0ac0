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

//! Type provider trait for schema introspection
//!
//! Implementations declare what they support through
//! [`TypeProvider::capabilities`] instead of callers probing for methods.
//! Element lookups have default implementations on top of
//! [`TypeProvider::get_type`] so a minimal provider only answers by name.

use super::type_info::{ElementDefinition, TypeInfo};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;

/// Result type for provider lookups
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Statically declared provider features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Provider resolves element types itself
    pub element_types: bool,
    /// Provider can list every resource type
    pub resource_listing: bool,
    /// Types carry base type links
    pub hierarchy: bool,
}

impl ProviderCapabilities {
    /// Every capability enabled
    pub const fn full() -> Self {
        Self {
            element_types: true,
            resource_listing: true,
            hierarchy: true,
        }
    }

    /// Nothing beyond lookup by name
    pub const fn none() -> Self {
        Self {
            element_types: false,
            resource_listing: false,
            hierarchy: false,
        }
    }
}

/// Async source of schema types
#[async_trait]
pub trait TypeProvider: Send + Sync + std::fmt::Debug {
    /// Features this provider supports
    fn capabilities(&self) -> ProviderCapabilities;

    /// Look up a type by name
    async fn get_type(&self, name: &str) -> ProviderResult<Option<Arc<TypeInfo>>>;

    /// Names of the elements declared directly on a type
    async fn element_names(&self, type_info: &TypeInfo) -> ProviderResult<Vec<String>> {
        Ok(type_info.element_names())
    }

    /// Declaration of a single element
    async fn element_definition(
        &self,
        type_info: &TypeInfo,
        name: &str,
    ) -> ProviderResult<Option<ElementDefinition>> {
        Ok(type_info.element(name).cloned())
    }

    /// Resolve the type of an element
    ///
    /// Choice elements resolve to a [`TypeInfo::Choice`] over their
    /// alternatives. Alternatives the provider does not know are kept as
    /// primitives so the choice stays complete.
    async fn element_type(
        &self,
        type_info: &TypeInfo,
        name: &str,
    ) -> ProviderResult<Option<Arc<TypeInfo>>> {
        let Some(element) = self.element_definition(type_info, name).await? else {
            return Ok(None);
        };

        if let Some(type_name) = &element.type_name {
            return self.get_type(type_name).await;
        }

        if element.choices.is_empty() {
            return Err(ProviderError::malformed(
                type_info.name(),
                format!("element '{name}' declares neither a type nor choices"),
            ));
        }

        let mut alternatives = Vec::with_capacity(element.choices.len());
        for choice in &element.choices {
            let resolved = self
                .get_type(choice)
                .await?
                .unwrap_or_else(|| Arc::new(TypeInfo::primitive(choice.clone())));
            alternatives.push(resolved);
        }
        Ok(Some(TypeInfo::choice(format!("{name}[x]"), alternatives)))
    }

    /// Every resource type name the provider knows
    async fn all_resource_types(&self) -> ProviderResult<Vec<String>>;
}

/// Provider used when no schema source is configured
///
/// Every lookup reports [`ProviderError::Unavailable`]; the navigator turns
/// that into "no enhanced information".
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTypeProvider;

#[async_trait]
impl TypeProvider for EmptyTypeProvider {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::none()
    }

    async fn get_type(&self, _name: &str) -> ProviderResult<Option<Arc<TypeInfo>>> {
        Err(ProviderError::Unavailable)
    }

    async fn all_resource_types(&self) -> ProviderResult<Vec<String>> {
        Err(ProviderError::Unavailable)
    }
}
