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

//! Schema-aware diagnostics for FHIRPath documents
//!
//! Produces machine-readable diagnostics with quick fixes for editors, and
//! human-friendly renderings for the command line.

pub mod chains;
pub mod diagnostic;
pub mod formatter;
pub mod validator;

pub use chains::{ChainJob, JobStep, Scope, collect_chains};
pub use diagnostic::{Diagnostic, DiagnosticCode, QuickFix, Severity};
pub use formatter::{DiagnosticFormatter, Format};
pub use validator::{DiagnosticValidator, ExpressionSpan, ExtraValidator, expression_spans};
