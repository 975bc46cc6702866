//! Reading annotation records and assigning stable class ids.

use crate::types::{
    AnnotationRecord, MalformedPolicy, ObjectAnnotation, ThermalError, ThermalResult,
};
use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Optional per-object attributes. Which ones apply is a property of the
/// category, looked up in a static table rather than modeled as a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    ObscuredPercentage,
    HeatResidual,
}

/// Attributes an annotation of the given category may legitimately carry.
pub fn applicable_attributes(category: &str) -> &'static [Attribute] {
    match category {
        "person" => &[Attribute::ObscuredPercentage, Attribute::HeatResidual],
        "object" => &[Attribute::ObscuredPercentage],
        "furniture" | "appliance" => &[Attribute::HeatResidual],
        _ => &[],
    }
}

/// Warnings for attributes present on objects whose category does not carry
/// them. Never an error: stray attributes are ignored downstream.
pub fn attribute_warnings(obj: &ObjectAnnotation) -> Vec<String> {
    let allowed = applicable_attributes(&obj.category);
    let mut warnings = Vec::new();
    if obj.obscured_percentage.is_some() && !allowed.contains(&Attribute::ObscuredPercentage) {
        warnings.push(format!(
            "object {} ({}): obscured_percentage not applicable",
            obj.object_id, obj.category
        ));
    }
    if obj.heat_residual.is_some() && !allowed.contains(&Attribute::HeatResidual) {
        warnings.push(format!(
            "object {} ({}): heat_residual not applicable",
            obj.object_id, obj.category
        ));
    }
    warnings
}

/// Read annotation records from a file holding either one JSON object per
/// line (the real data) or a single top-level JSON array.
pub fn read_records_file(
    path: &Path,
    policy: MalformedPolicy,
) -> ThermalResult<Vec<AnnotationRecord>> {
    let file = File::open(path).map_err(|e| ThermalError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("loading annotations from {}", path.display());
    let records = read_records(BufReader::new(file), policy)?;
    info!("loaded {} annotation records", records.len());
    Ok(records)
}

pub fn read_records<R: BufRead>(
    mut reader: R,
    policy: MalformedPolicy,
) -> ThermalResult<Vec<AnnotationRecord>> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(|e| ThermalError::Io {
        path: "<reader>".into(),
        source: e,
    })?;

    let records = if text.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<AnnotationRecord>>(&text)
            .map_err(|e| ThermalError::InvalidAnnotation { line: 1, source: e })?
    } else {
        let mut records = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AnnotationRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    let err = ThermalError::InvalidAnnotation {
                        line: idx + 1,
                        source: e,
                    };
                    match policy {
                        MalformedPolicy::Abort => return Err(err),
                        MalformedPolicy::Skip => warn!("skipping record: {err}"),
                    }
                }
            }
        }
        records
    };

    for record in &records {
        for obj in &record.objects {
            for warning in attribute_warnings(obj) {
                warn!("record {}: {warning}", record.record_id);
            }
        }
    }
    Ok(records)
}

/// Assigns stable integer class ids to `(category, subcategory)` pairs in
/// first-seen order. One instance is threaded through an entire export run
/// so ids stay consistent across every label file; this is the only piece
/// of cross-cutting mutable state in the toolkit.
#[derive(Debug, Default)]
pub struct CategoryIndex {
    by_name: HashMap<String, u32>,
    names: Vec<String>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn full_name(category: &str, subcategory: &str) -> String {
        format!("{category}/{subcategory}")
    }

    /// Look up the id for a pair, assigning the next sequential id on first
    /// encounter. Once assigned, an id is never reassigned or reused.
    pub fn get_or_create_id(&mut self, category: &str, subcategory: &str) -> u32 {
        let name = Self::full_name(category, subcategory);
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.by_name.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    pub fn id_of(&self, category: &str, subcategory: &str) -> Option<u32> {
        self.by_name
            .get(&Self::full_name(category, subcategory))
            .copied()
    }

    /// Class names in id order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check the forward and reverse tables agree. A mismatch cannot happen
    /// through the public API; it is surfaced as an error rather than a
    /// panic so export runs fail cleanly.
    pub fn verify(&self) -> ThermalResult<()> {
        for (name, &id) in &self.by_name {
            let resolved = self.names.get(id as usize);
            if resolved != Some(name) {
                return Err(ThermalError::ClassIndexCollision {
                    name: name.clone(),
                    id,
                    resolved: resolved.cloned().unwrap_or_default(),
                });
            }
        }
        Ok(())
    }
}
