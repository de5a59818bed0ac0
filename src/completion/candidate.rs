//! Completion candidate types

use super::ranking::is_common_label;
use serde::Serialize;

/// What a candidate inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionKind {
    /// Element of the navigated type
    Property,
    /// Resource type name
    ResourceType,
    /// FHIRPath function
    Function,
    /// Operator
    Operator,
    /// Keyword
    Keyword,
    /// Literal value such as `true`
    Value,
    /// `$`/`%` variable
    Variable,
    /// Multi-token template
    Snippet,
    /// Directive name
    Directive,
    /// File path for `@inputfile`
    File,
}

/// Candidate facts used by ranking and shown by clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMetadata {
    /// Concrete name of a choice element
    pub is_choice: bool,
    /// Declared by an ancestor type
    pub is_inherited: bool,
    /// `min..max` of a property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<String>,
    /// Property must be present
    pub required: bool,
}

/// One completion suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCandidate {
    /// Text shown and inserted
    pub label: String,
    pub kind: CompletionKind,
    /// Short type or signature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Bucket-prefixed key reproducing the ranked order when sorted lexically
    pub sort_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Text to insert when it differs from the label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
    pub metadata: CandidateMetadata,
}

impl CompletionCandidate {
    /// Create a candidate
    pub fn new(label: impl Into<String>, kind: CompletionKind) -> Self {
        Self {
            label: label.into(),
            kind,
            detail: None,
            sort_key: String::new(),
            documentation: None,
            insert_text: None,
            metadata: CandidateMetadata::default(),
        }
    }

    /// Set the detail text
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set documentation, ignoring `None`
    pub fn with_documentation(mut self, documentation: Option<impl Into<String>>) -> Self {
        self.documentation = documentation.map(Into::into);
        self
    }

    /// Set the insert text
    pub fn with_insert_text(mut self, insert_text: impl Into<String>) -> Self {
        self.insert_text = Some(insert_text.into());
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: CandidateMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Ranking bucket, lower sorts first
    ///
    /// Direct, required, common and choice properties share bucket 0; other
    /// inherited properties and functions share bucket 1.
    pub fn bucket(&self) -> u8 {
        match self.kind {
            CompletionKind::Property
                if self.metadata.is_inherited
                    && !self.metadata.required
                    && !is_common_label(&self.label) =>
            {
                1
            }
            CompletionKind::Property
            | CompletionKind::ResourceType
            | CompletionKind::Directive
            | CompletionKind::File => 0,
            CompletionKind::Function => 1,
            CompletionKind::Operator => 2,
            CompletionKind::Keyword => 3,
            CompletionKind::Value | CompletionKind::Variable => 4,
            CompletionKind::Snippet => 5,
        }
    }
}
