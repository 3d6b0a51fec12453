use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::class::ClassId;

/// Problems found by [`crate::LazyObject::analyze`], grouped by the class
/// that owns each field. Field paths are dotted from the analyzed root, with
/// array positions written as `[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassAnalysis {
    /// Fields present in the data but not declared by the class.
    pub missing_definitions: BTreeMap<ClassId, BTreeSet<String>>,
    /// Fields whose data failed conversion, with the error message.
    pub bad_definitions: BTreeMap<ClassId, BTreeMap<String, String>>,
}

impl ClassAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_missing(&mut self, class: &ClassId, path: &str) {
        self.missing_definitions
            .entry(class.clone())
            .or_default()
            .insert(path.to_string());
    }

    pub(crate) fn add_bad(&mut self, class: &ClassId, path: &str, message: String) {
        self.bad_definitions
            .entry(class.clone())
            .or_default()
            .insert(path.to_string(), message);
    }

    pub fn merge(&mut self, other: ClassAnalysis) {
        for (class, paths) in other.missing_definitions {
            self.missing_definitions.entry(class).or_default().extend(paths);
        }
        for (class, fields) in other.bad_definitions {
            self.bad_definitions.entry(class).or_default().extend(fields);
        }
    }

    pub fn has_problems(&self) -> bool {
        !self.missing_definitions.is_empty() || !self.bad_definitions.is_empty()
    }

    pub fn has_bad_definitions(&self) -> bool {
        !self.bad_definitions.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for (class, paths) in &self.missing_definitions {
            let paths: Vec<String> = paths.iter().map(|p| format!("{p:?}")).collect();
            lines.push(format!("- Missing definitions in class {class}: {}", paths.join(", ")));
        }
        for (class, fields) in &self.bad_definitions {
            for (path, message) in fields {
                lines.push(format!("- Bad definition in class {class}, field {path:?}: {message}"));
            }
        }
        lines.join("\n")
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
