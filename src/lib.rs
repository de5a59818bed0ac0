//! Editor tooling for FHIRPath
//!
//! Type-directed completion, schema-aware diagnostics and workspace symbol
//! search for FHIRPath documents. Schema knowledge comes from a
//! [`TypeProvider`], expression parsing from an [`ExpressionEngine`]; the
//! crate bundles an in-memory provider with core FHIR R4 types and a
//! FHIRPath parser.
//!
//! ```no_run
//! use octofhir_fhirpath_intellisense::{Config, InMemoryTypeProvider, IntellisenseService};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let service = IntellisenseService::new(
//!     Arc::new(InMemoryTypeProvider::fhir_r4_core()),
//!     Config::default(),
//! );
//! let completions = service.complete("Patient.na", 10).await;
//! assert_eq!(completions[0].label, "name");
//! # }
//! ```

pub mod analyzer;
pub mod ast;
pub mod cache;
pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod navigator;
pub mod parser;
pub mod service;
pub mod symbols;

pub use analyzer::{DocumentDirectives, ExpressionContext, analyze_document};
pub use cache::{CacheConfig, ResultCache};
pub use completion::{CompletionCandidate, CompletionKind, CompletionSynthesizer};
pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticValidator, QuickFix, Severity};
pub use error::{EngineError, IntellisenseError, ProviderError, Result};
pub use model::{InMemoryTypeProvider, TypeInfo, TypeProvider};
pub use navigator::{NavigationResult, TypeNavigator};
pub use parser::{ExpressionEngine, PathExpressionEngine, parse_expression as parse};
pub use service::IntellisenseService;
pub use symbols::{SearchOptions, SearchResult, SymbolEntry, SymbolIndex, SymbolKind};
