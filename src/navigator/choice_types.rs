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

//! Naming rules for choice (`name[x]`) properties
//!
//! A choice element `value[x]` surfaces as `valueString`, `valueQuantity` and
//! so on: the lowercase base followed by the capitalized type name.

use crate::model::TypeInfo;
use std::sync::Arc;

/// Primitive type names, which start lowercase in the schema
const PRIMITIVE_TYPE_NAMES: &[&str] = &[
    "base64Binary",
    "boolean",
    "canonical",
    "code",
    "date",
    "dateTime",
    "decimal",
    "id",
    "instant",
    "integer",
    "integer64",
    "markdown",
    "oid",
    "positiveInt",
    "string",
    "time",
    "unsignedInt",
    "uri",
    "url",
    "uuid",
    "xhtml",
];

/// Uppercase the first character
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Byte index of the first uppercase ASCII letter after a lowercase start
fn split_point(name: &str) -> Option<usize> {
    let first = name.chars().next()?;
    if !first.is_ascii_lowercase() {
        return None;
    }
    let split = name.find(|c: char| c.is_ascii_uppercase())?;
    name[..split]
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .then_some(split)
}

/// Whether a name follows the lowercase-base + UpperCamel-suffix shape
pub fn is_choice_property(name: &str) -> bool {
    split_point(name).is_some_and(|split| {
        name[split..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
    })
}

/// Base of a choice property name (`valueQuantity` -> `value`)
pub fn extract_base_property(name: &str) -> Option<&str> {
    if !is_choice_property(name) {
        return None;
    }
    split_point(name).map(|split| &name[..split])
}

/// Type of a choice property name (`valueQuantity` -> `Quantity`, `valueString` -> `string`)
pub fn extract_choice_type(name: &str) -> Option<String> {
    if !is_choice_property(name) {
        return None;
    }
    let suffix = &name[split_point(name)?..];
    let lowered = decapitalize(suffix);
    if PRIMITIVE_TYPE_NAMES.contains(&lowered.as_str()) {
        Some(lowered)
    } else {
        Some(suffix.to_string())
    }
}

/// Every way to split a name into a base and an UpperCamel suffix, longest base first
///
/// `multipleBirthBoolean` yields `multipleBirth` before `multiple`; the schema
/// decides which base is a real choice element.
pub fn candidate_splits(name: &str) -> Vec<(&str, &str)> {
    let mut splits: Vec<(&str, &str)> = name
        .char_indices()
        .skip(1)
        .filter(|(_, c)| c.is_ascii_uppercase())
        .map(|(i, _)| (&name[..i], &name[i..]))
        .collect();
    splits.reverse();
    splits
}

/// Concrete property names for a choice element
pub fn get_choice_property_names(base: &str, choices: &[Arc<TypeInfo>]) -> Vec<String> {
    choices
        .iter()
        .map(|choice| format!("{base}{}", capitalize(choice.name())))
        .collect()
}

/// Alternatives of a choice type
///
/// Non-choice input is returned as the only element. A choice without
/// alternatives yields nothing; with `filter_name` only the alternative of
/// that exact name is returned.
pub fn resolve_choice_types(type_info: &Arc<TypeInfo>, filter_name: Option<&str>) -> Vec<Arc<TypeInfo>> {
    let alternatives = match type_info.as_ref() {
        TypeInfo::Choice { alternatives, .. } => alternatives,
        _ => return vec![Arc::clone(type_info)],
    };
    if alternatives.len() == 1 {
        return vec![Arc::clone(&alternatives[0])];
    }
    match filter_name {
        Some(filter) => alternatives
            .iter()
            .find(|alt| alt.name() == filter)
            .map(|alt| vec![Arc::clone(alt)])
            .unwrap_or_default(),
        None => alternatives.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn alternatives(names: &[&str]) -> Vec<Arc<TypeInfo>> {
        names
            .iter()
            .map(|n| {
                if n.chars().next().is_some_and(char::is_uppercase) {
                    Arc::new(TypeInfo::complex(*n))
                } else {
                    Arc::new(TypeInfo::primitive(*n))
                }
            })
            .collect()
    }

    #[rstest]
    #[case("valueString", true)]
    #[case("valueQuantity", true)]
    #[case("deceasedDateTime", true)]
    #[case("value", false)]
    #[case("Value", false)]
    #[case("birthDate", true)]
    #[case("value[x]", false)]
    #[case("", false)]
    fn test_is_choice_property(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_choice_property(name), expected);
    }

    #[rstest]
    #[case("value", "string")]
    #[case("value", "Quantity")]
    #[case("deceased", "dateTime")]
    #[case("onset", "Period")]
    #[case("effective", "instant")]
    fn test_round_trip(#[case] base: &str, #[case] type_name: &str) {
        let name = format!("{base}{}", capitalize(type_name));
        assert!(is_choice_property(&name));
        assert_eq!(extract_base_property(&name), Some(base));
        assert_eq!(extract_choice_type(&name).as_deref(), Some(type_name));
        let rebuilt = format!(
            "{}{}",
            extract_base_property(&name).unwrap(),
            capitalize(&extract_choice_type(&name).unwrap())
        );
        assert_eq!(rebuilt, name);
    }

    #[test]
    fn test_candidate_splits_longest_first() {
        assert_eq!(
            candidate_splits("multipleBirthBoolean"),
            vec![("multipleBirth", "Boolean"), ("multiple", "BirthBoolean")]
        );
    }

    #[test]
    fn test_choice_property_names_keep_order() {
        let choices = alternatives(&["string", "Quantity", "boolean"]);
        assert_eq!(
            get_choice_property_names("value", &choices),
            vec!["valueString", "valueQuantity", "valueBoolean"]
        );
        assert!(get_choice_property_names("value", &[]).is_empty());
    }

    #[test]
    fn test_resolve_choice_types() {
        let string = Arc::new(TypeInfo::primitive("string"));
        assert_eq!(resolve_choice_types(&string, None), vec![Arc::clone(&string)]);

        let choice = TypeInfo::choice("value[x]", alternatives(&["string", "Quantity"]));
        assert_eq!(resolve_choice_types(&choice, None).len(), 2);
        let filtered = resolve_choice_types(&choice, Some("Quantity"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name(), "Quantity");
        assert!(resolve_choice_types(&choice, Some("Range")).is_empty());

        let malformed = Arc::new(TypeInfo::Choice {
            name: "value[x]".to_string(),
            alternatives: Vec::new(),
        });
        assert!(resolve_choice_types(&malformed, None).is_empty());
    }
}
