//! Language-level completion table
//!
//! Functions, operators, keywords, literal values, variables and snippet
//! patterns. Nothing here depends on the schema.

use super::candidate::{CompletionCandidate, CompletionKind};

/// A FHIRPath function entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name: &'static str,
    /// Signature shown as detail, e.g. `where(criteria)`
    pub signature: &'static str,
    pub documentation: &'static str,
    /// Only meaningful on collections of more than one item
    pub collection_only: bool,
}

/// A plain table entry: label, detail and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub label: &'static str,
    pub detail: &'static str,
    pub documentation: &'static str,
}

/// A snippet entry inserting a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnippetEntry {
    pub label: &'static str,
    pub template: &'static str,
    pub documentation: &'static str,
}

const fn function(
    name: &'static str,
    signature: &'static str,
    documentation: &'static str,
    collection_only: bool,
) -> FunctionEntry {
    FunctionEntry {
        name,
        signature,
        documentation,
        collection_only,
    }
}

const fn entry(label: &'static str, detail: &'static str, documentation: &'static str) -> Entry {
    Entry {
        label,
        detail,
        documentation,
    }
}

const FHIRPATH_FUNCTIONS: &[FunctionEntry] = &[
    // Existence
    function("empty", "empty()", "Returns true if the input collection is empty", false),
    function("exists", "exists([criteria])", "Returns true if the collection has any elements, optionally matching criteria", false),
    function("all", "all(criteria)", "Returns true if criteria is true for every element", false),
    function("allTrue", "allTrue()", "Returns true if every element is true", true),
    function("anyTrue", "anyTrue()", "Returns true if any element is true", true),
    function("allFalse", "allFalse()", "Returns true if every element is false", true),
    function("anyFalse", "anyFalse()", "Returns true if any element is false", true),
    function("subsetOf", "subsetOf(other)", "Returns true if the input is a subset of other", true),
    function("supersetOf", "supersetOf(other)", "Returns true if the input is a superset of other", true),
    function("count", "count()", "Returns the number of items in the collection", false),
    function("distinct", "distinct()", "Returns the collection with duplicates removed", true),
    function("isDistinct", "isDistinct()", "Returns true if the collection has no duplicates", true),
    // Filtering and projection
    function("where", "where(criteria)", "Filters the collection to items matching criteria", false),
    function("select", "select(projection)", "Evaluates projection for each item and flattens the result", false),
    function("repeat", "repeat(projection)", "Repeats projection until no new items are found", false),
    function("ofType", "ofType(type)", "Filters the collection to items of the given type", false),
    // Subsetting
    function("single", "single()", "Returns the only item, error if more than one", true),
    function("first", "first()", "Returns the first item", true),
    function("last", "last()", "Returns the last item", true),
    function("tail", "tail()", "Returns all but the first item", true),
    function("skip", "skip(num)", "Returns all but the first num items", true),
    function("take", "take(num)", "Returns the first num items", true),
    function("intersect", "intersect(other)", "Returns items present in both collections", true),
    function("exclude", "exclude(other)", "Returns items not present in other", true),
    // Combining
    function("union", "union(other)", "Merges two collections, removing duplicates", false),
    function("combine", "combine(other)", "Merges two collections, keeping duplicates", false),
    // Conversion
    function("iif", "iif(criterion, true-result [, otherwise-result])", "Conditional operator", false),
    function("toBoolean", "toBoolean()", "Converts the input to a Boolean", false),
    function("toInteger", "toInteger()", "Converts the input to an Integer", false),
    function("toDecimal", "toDecimal()", "Converts the input to a Decimal", false),
    function("toString", "toString()", "Converts the input to a String", false),
    function("toDate", "toDate()", "Converts the input to a Date", false),
    function("toDateTime", "toDateTime()", "Converts the input to a DateTime", false),
    function("toQuantity", "toQuantity([unit])", "Converts the input to a Quantity", false),
    function("convertsToInteger", "convertsToInteger()", "Returns true if the input converts to an Integer", false),
    function("convertsToString", "convertsToString()", "Returns true if the input converts to a String", false),
    // Strings
    function("indexOf", "indexOf(substring)", "Index of the first occurrence of substring", false),
    function("substring", "substring(start [, length])", "Part of the string from start", false),
    function("startsWith", "startsWith(prefix)", "Returns true if the string starts with prefix", false),
    function("endsWith", "endsWith(suffix)", "Returns true if the string ends with suffix", false),
    function("contains", "contains(substring)", "Returns true if the string contains substring", false),
    function("upper", "upper()", "Converts the string to upper case", false),
    function("lower", "lower()", "Converts the string to lower case", false),
    function("replace", "replace(pattern, substitution)", "Replaces every occurrence of pattern", false),
    function("matches", "matches(regex)", "Returns true if the string matches regex", false),
    function("replaceMatches", "replaceMatches(regex, substitution)", "Replaces every match of regex", false),
    function("length", "length()", "Length of the string", false),
    function("toChars", "toChars()", "Splits the string into characters", false),
    function("trim", "trim()", "Removes leading and trailing whitespace", false),
    function("split", "split(separator)", "Splits the string on separator", false),
    function("join", "join([separator])", "Joins a collection of strings", true),
    // Math
    function("abs", "abs()", "Absolute value", false),
    function("ceiling", "ceiling()", "Rounds up to the nearest integer", false),
    function("floor", "floor()", "Rounds down to the nearest integer", false),
    function("round", "round([precision])", "Rounds to the given precision", false),
    function("sqrt", "sqrt()", "Square root", false),
    function("sum", "sum()", "Sum of the items", true),
    function("min", "min()", "Smallest item", true),
    function("max", "max()", "Largest item", true),
    function("avg", "avg()", "Average of the items", true),
    // Tree navigation
    function("children", "children()", "Direct child nodes", false),
    function("descendants", "descendants()", "All descendant nodes", false),
    // Utility
    function("trace", "trace(name [, projection])", "Logs the input and returns it unchanged", false),
    function("now", "now()", "Current date and time", false),
    function("today", "today()", "Current date", false),
    function("timeOfDay", "timeOfDay()", "Current time", false),
    function("not", "not()", "Boolean negation", false),
    function("defineVariable", "defineVariable(name [, expr])", "Defines a variable usable later in the expression", false),
    function("aggregate", "aggregate(aggregator [, init])", "Folds the collection using $total", false),
    function("sort", "sort([criteria])", "Sorts the collection", true),
    // FHIR extensions
    function("extension", "extension(url)", "Extensions with the given url", false),
    function("resolve", "resolve()", "Resolves references to resources", false),
    function("memberOf", "memberOf(valueset)", "Returns true if the code is in the value set", false),
    function("hasValue", "hasValue()", "Returns true if a primitive has a value", false),
    function("getValue", "getValue()", "Value of a primitive", false),
    function("conformsTo", "conformsTo(profile)", "Returns true if the resource conforms to profile", false),
];

const FHIRPATH_OPERATORS: &[Entry] = &[
    entry("=", "equals", "Equality"),
    entry("!=", "not equals", "Inequality"),
    entry("~", "equivalent", "Equivalence"),
    entry("!~", "not equivalent", "Non-equivalence"),
    entry(">", "greater than", "Comparison"),
    entry("<", "less than", "Comparison"),
    entry(">=", "greater or equal", "Comparison"),
    entry("<=", "less or equal", "Comparison"),
    entry("|", "union", "Union of two collections"),
    entry("+", "plus", "Addition or string concatenation"),
    entry("-", "minus", "Subtraction"),
    entry("*", "multiply", "Multiplication"),
    entry("/", "divide", "Division"),
    entry("&", "concatenate", "String concatenation treating empty as ''"),
];

const FHIRPATH_KEYWORDS: &[Entry] = &[
    entry("and", "keyword", "Logical AND operator"),
    entry("or", "keyword", "Logical OR operator"),
    entry("xor", "keyword", "Logical XOR operator"),
    entry("implies", "keyword", "Logical implication operator"),
    entry("div", "keyword", "Integer division operator"),
    entry("mod", "keyword", "Modulo operator"),
    entry("in", "keyword", "Collection membership test"),
    entry("contains", "keyword", "Collection containment test"),
    entry("is", "keyword", "Type checking operator"),
    entry("as", "keyword", "Type casting operator"),
];

const FHIRPATH_LITERALS: &[Entry] = &[
    entry("true", "Boolean", "Boolean true literal"),
    entry("false", "Boolean", "Boolean false literal"),
    entry("{}", "empty", "Empty collection"),
];

const FHIRPATH_VARIABLES: &[Entry] = &[
    entry("$this", "Current context item in iteration", "The current item when iterating in where(), select(), etc."),
    entry("$index", "Current index in iteration", "Zero-based index of current item in iteration"),
    entry("$total", "Accumulator in aggregate()", "Running total inside aggregate()"),
    entry("%resource", "Resource being evaluated", "The resource containing the evaluated node"),
    entry("%rootResource", "Root resource", "The container resource of %resource"),
    entry("%context", "Root context", "The original node passed to the evaluation"),
    entry("%ucum", "UCUM code system", "http://unitsofmeasure.org"),
    entry("%sct", "SNOMED CT code system", "http://snomed.info/sct"),
    entry("%loinc", "LOINC code system", "http://loinc.org"),
];

const FHIRPATH_SNIPPETS: &[SnippetEntry] = &[
    SnippetEntry {
        label: "where-exists",
        template: "where(${1:criteria}).exists()",
        documentation: "Filter and test for any match",
    },
    SnippetEntry {
        label: "iif-else",
        template: "iif(${1:condition}, ${2:then}, ${3:else})",
        documentation: "Conditional with both branches",
    },
    SnippetEntry {
        label: "select-first",
        template: "select(${1:projection}).first()",
        documentation: "Project and keep the first result",
    },
    SnippetEntry {
        label: "extension-value",
        template: "extension('${1:url}').value",
        documentation: "Value of an extension by url",
    },
];

/// Flat lookup table of language completions
#[derive(Debug, Clone, Copy)]
pub struct LanguageRegistry {
    functions: &'static [FunctionEntry],
    operators: &'static [Entry],
    keywords: &'static [Entry],
    literals: &'static [Entry],
    variables: &'static [Entry],
    snippets: &'static [SnippetEntry],
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::fhirpath()
    }
}

impl LanguageRegistry {
    /// The FHIRPath table
    pub const fn fhirpath() -> Self {
        Self {
            functions: FHIRPATH_FUNCTIONS,
            operators: FHIRPATH_OPERATORS,
            keywords: FHIRPATH_KEYWORDS,
            literals: FHIRPATH_LITERALS,
            variables: FHIRPATH_VARIABLES,
            snippets: FHIRPATH_SNIPPETS,
        }
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn functions(&self) -> &[FunctionEntry] {
        self.functions
    }

    /// Whether `name` is a collection-only function
    pub fn is_collection_function(&self, name: &str) -> bool {
        self.function(name).is_some_and(|f| f.collection_only)
    }

    /// Function candidates, inserted with parentheses
    pub fn function_candidates(&self) -> Vec<CompletionCandidate> {
        self.functions
            .iter()
            .map(|f| {
                CompletionCandidate::new(f.name, CompletionKind::Function)
                    .with_detail(f.signature)
                    .with_documentation(Some(f.documentation))
                    .with_insert_text(format!("{}()", f.name))
            })
            .collect()
    }

    pub fn operator_candidates(&self) -> Vec<CompletionCandidate> {
        to_candidates(self.operators, CompletionKind::Operator)
    }

    pub fn keyword_candidates(&self) -> Vec<CompletionCandidate> {
        to_candidates(self.keywords, CompletionKind::Keyword)
    }

    pub fn literal_candidates(&self) -> Vec<CompletionCandidate> {
        to_candidates(self.literals, CompletionKind::Value)
    }

    pub fn variable_candidates(&self) -> Vec<CompletionCandidate> {
        to_candidates(self.variables, CompletionKind::Variable)
    }

    pub fn snippet_candidates(&self) -> Vec<CompletionCandidate> {
        self.snippets
            .iter()
            .map(|s| {
                CompletionCandidate::new(s.label, CompletionKind::Snippet)
                    .with_detail(s.template)
                    .with_documentation(Some(s.documentation))
                    .with_insert_text(s.template)
            })
            .collect()
    }
}

fn to_candidates(entries: &[Entry], kind: CompletionKind) -> Vec<CompletionCandidate> {
    entries
        .iter()
        .map(|e| {
            CompletionCandidate::new(e.label, kind)
                .with_detail(e.detail)
                .with_documentation(Some(e.documentation))
        })
        .collect()
}
