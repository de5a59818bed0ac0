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

//! Expression context analysis
//!
//! Turns `(document text, cursor)` into an [`ExpressionContext`] describing
//! what the user is typing, and reads the document's directive comments.

pub mod context;
pub mod directives;
pub mod input_file;

pub use context::{
    EnclosingFunction, ExpressionContext, ITERATING_FUNCTIONS, NavigationContext, StatementSpan,
    TYPE_PRESERVING_FUNCTIONS, analyze_document, classify, line_at, lines_with_offsets,
    path_segments, position_at, select_statement, split_statements,
};
pub use directives::{
    DIRECTIVE_NAMES, Directive, DirectiveContext, DirectiveIssue, DirectiveKind,
    DocumentDirectives, detect_directive,
};
pub use input_file::InputFileTypes;
