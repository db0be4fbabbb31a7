//! Variable index
//!
//! Maps each placeholder name to every location where it occurs, grouped by
//! part. Locations are only valid for the snapshot the index was built from:
//! owners rebuild it after any structural change.

use serde::Serialize;
use std::collections::HashMap;

/// Placeholder name → `(part, location)` occurrences
#[derive(Debug, Clone)]
pub struct VariableIndex<P, L> {
    /// Names in order of first discovery
    order: Vec<String>,
    entries: HashMap<String, Vec<(P, L)>>,
}

impl<P, L> Default for VariableIndex<P, L> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

impl<P: Clone + PartialEq, L> VariableIndex<P, L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence
    pub fn insert(&mut self, name: &str, part: P, location: L) {
        match self.entries.get_mut(name) {
            Some(locations) => locations.push((part, location)),
            None => {
                self.order.push(name.to_string());
                self.entries
                    .insert(name.to_string(), vec![(part, location)]);
            }
        }
    }

    /// Every occurrence of `name`; empty when the name is absent
    pub fn lookup(&self, name: &str) -> &[(P, L)] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `name` occurs anywhere
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Distinct names, in order of first discovery
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Distinct names grouped by the parts they occur in
    ///
    /// Parts are listed in order of first discovery; a name occurring in two
    /// parts is listed under both.
    pub fn names_by_part(&self) -> Vec<(P, Vec<String>)> {
        let mut grouped: Vec<(P, Vec<String>)> = Vec::new();
        for name in &self.order {
            for (part, _) in self.lookup(name) {
                let slot = match grouped.iter().position(|(p, _)| p == part) {
                    Some(pos) => pos,
                    None => {
                        grouped.push((part.clone(), Vec::new()));
                        grouped.len() - 1
                    }
                };
                let names = &mut grouped[slot].1;
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Forget every entry
    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

/// Placeholder names found in one part (or sheet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartVariables {
    /// Part name, or sheet name for workbooks
    pub part: String,
    /// Distinct names in order of appearance
    pub names: Vec<String>,
}

/// Result of a variable enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Variables {
    /// All names across the template
    Flat(Vec<String>),
    /// Names grouped per part or sheet
    Grouped(Vec<PartVariables>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> VariableIndex<usize, &'static str> {
        let mut index = VariableIndex::new();
        index.insert("name", 0, "A1");
        index.insert("total", 1, "B2");
        index.insert("name", 1, "C3");
        index.insert("name", 1, "C4");
        index
    }

    #[test]
    fn test_lookup() {
        let index = sample();
        assert_eq!(index.lookup("name"), &[(0, "A1"), (1, "C3"), (1, "C4")]);
        assert!(index.lookup("missing").is_empty());
        assert!(index.contains("total"));
        assert!(!index.contains("missing"));
    }

    #[test]
    fn test_names_in_discovery_order() {
        let index = sample();
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["name", "total"]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_names_by_part() {
        let index = sample();
        assert_eq!(
            index.names_by_part(),
            vec![
                (0, vec!["name".to_string()]),
                (1, vec!["name".to_string(), "total".to_string()]),
            ]
        );
    }

    #[test]
    fn test_clear() {
        let mut index = sample();
        index.clear();
        assert!(index.is_empty());
        assert!(index.lookup("name").is_empty());
    }

    #[test]
    fn test_variables_serialize() {
        let flat = Variables::Flat(vec!["a".to_string()]);
        assert_eq!(serde_json::to_string(&flat).unwrap(), r#"["a"]"#);

        let grouped = Variables::Grouped(vec![PartVariables {
            part: "Sheet1".to_string(),
            names: vec!["a".to_string()],
        }]);
        assert_eq!(
            serde_json::to_string(&grouped).unwrap(),
            r#"[{"part":"Sheet1","names":["a"]}]"#
        );
    }
}
