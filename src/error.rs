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

//! Error types for the intellisense crate
//!
//! Provider and engine failures are absorbed at the navigator and validator
//! boundaries; these types only travel between the collaborators and that
//! boundary, and through configuration and workspace scanning.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, IntellisenseError>;

/// Failures reported by a [`TypeProvider`](crate::model::TypeProvider)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider has not been initialized or was never configured
    #[error("Type provider is unavailable")]
    Unavailable,

    /// Provider raised an error while answering a lookup
    #[error("Type provider failed: {message}")]
    Failed {
        /// Error message
        message: String,
    },

    /// Provider returned a definition that cannot be interpreted
    #[error("Malformed type definition for '{type_name}': {message}")]
    Malformed {
        /// Type name
        type_name: String,
        /// Error message
        message: String,
    },
}

impl ProviderError {
    /// Create a generic provider failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Create a malformed definition error
    pub fn malformed(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

/// Internal failures of an [`ExpressionEngine`](crate::parser::ExpressionEngine)
///
/// Syntax errors are not engine errors; they are reported as data in
/// [`ParseOutcome`](crate::parser::ParseOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Engine is not ready to accept requests
    #[error("Expression engine is unavailable")]
    Unavailable,

    /// Engine failed while processing an expression
    #[error("Expression engine failed on '{expression}': {message}")]
    Failed {
        /// Expression text
        expression: String,
        /// Error message
        message: String,
    },
}

impl EngineError {
    /// Create an engine failure for an expression
    pub fn failed(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

/// Crate-level error type
#[derive(Error, Debug)]
pub enum IntellisenseError {
    /// Type provider error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Expression engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// File system error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A file could not be indexed
    #[error("Failed to index '{uri}': {message}")]
    Index {
        /// File URI
        uri: String,
        /// Error message
        message: String,
    },
}

impl IntellisenseError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an indexing error
    pub fn index(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Index {
            uri: uri.into(),
            message: message.into(),
        }
    }
}
