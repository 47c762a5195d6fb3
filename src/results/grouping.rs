// src/results/grouping.rs

//! Export separation: splitting results into groups keyed by one token of
//! the image file name.
//!
//! The naming convention is a template such as `species_genotype_rep`; the
//! recipe names one of its tokens (`genotype`), and every image name is
//! split the same way to pick the token at that position.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::config::ExportSeparation;
use crate::errors::{BatchrunError, Result};
use crate::intake::{file_stem, is_allowed_image};
use crate::results::table::ResultTable;

const DELIMITERS: [char; 2] = ['_', '-'];

/// Values of the separating factor that mean "do not group".
const NO_GROUPING: [&str; 3] = ["", "nenhum", "none"];

pub fn split_tokens(name: &str) -> Vec<&str> {
    name.split(DELIMITERS).collect()
}

/// Zero-based position of `factor` in `naming_convention`, or `None` for the
/// no-grouping sentinel. A factor the template does not contain is a
/// configuration error.
pub fn resolve_group_position(naming_convention: &str, factor: &str) -> Result<Option<usize>> {
    let factor = factor.trim();
    if NO_GROUPING.iter().any(|s| factor.eq_ignore_ascii_case(s)) {
        return Ok(None);
    }

    split_tokens(naming_convention)
        .iter()
        .position(|token| token.eq_ignore_ascii_case(factor))
        .map(Some)
        .ok_or_else(|| {
            BatchrunError::ConfigError(format!(
                "separating factor '{factor}' is not part of naming convention '{naming_convention}'"
            ))
        })
}

/// Resolve the recipe's export separation against the naming convention.
///
/// The legacy checkbox form groups by the first token.
pub fn resolve_separation(
    separation: &ExportSeparation,
    naming_convention: &str,
) -> Result<Option<usize>> {
    let position = match separation {
        ExportSeparation::Flag(false) => None,
        ExportSeparation::Flag(true) => Some(0),
        ExportSeparation::Factor(factor) => resolve_group_position(naming_convention, factor)?,
    };

    if let Some(pos) = position {
        info!(position = pos + 1, "grouping exports by filename token");
    }
    Ok(position)
}

/// Group key of an image: the token at `position` of its name (an image
/// extension, if present, is ignored).
pub fn group_key(image: &str, position: usize) -> Option<&str> {
    let name = if is_allowed_image(Path::new(image)) {
        file_stem(image)
    } else {
        image
    };
    split_tokens(name).get(position).copied()
}

/// Result of splitting a table into groups.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pub groups: BTreeMap<String, ResultTable>,
    /// Images whose names have too few tokens; they appear in no group.
    pub skipped: Vec<String>,
}

pub fn group_by_position(table: &ResultTable, position: usize) -> Grouping {
    let mut members: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for image in table.images() {
        match group_key(image, position) {
            Some(key) => members.entry(key.to_string()).or_default().push(image),
            None => {
                warn!(
                    image,
                    position = position + 1,
                    "image name has too few tokens for grouping; leaving it out of grouped exports"
                );
                skipped.push(image.to_string());
            }
        }
    }

    let groups = members
        .into_iter()
        .map(|(key, images)| (key, table.subset(images)))
        .collect();

    Grouping { groups, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutionRecord;

    #[test]
    fn resolves_factor_position() {
        assert_eq!(
            resolve_group_position("species_genotype_rep", "genotype").unwrap(),
            Some(1)
        );
        assert_eq!(resolve_group_position("species-genotype_rep", "REP").unwrap(), Some(2));
    }

    #[test]
    fn sentinel_means_no_grouping() {
        assert_eq!(resolve_group_position("species_genotype_rep", "Nenhum").unwrap(), None);
        assert_eq!(resolve_group_position("species_genotype_rep", "none").unwrap(), None);
    }

    #[test]
    fn unknown_factor_is_a_config_error() {
        let err = resolve_group_position("species_genotype_rep", "treatment").unwrap_err();
        assert!(matches!(err, BatchrunError::ConfigError(msg) if msg.contains("treatment")));
    }

    #[test]
    fn legacy_flag_groups_by_first_token() {
        assert_eq!(resolve_separation(&ExportSeparation::Flag(true), "").unwrap(), Some(0));
        assert_eq!(resolve_separation(&ExportSeparation::Flag(false), "a_b").unwrap(), None);
    }

    #[test]
    fn group_key_from_filename() {
        assert_eq!(group_key("A_G7_1.jpg", 1), Some("G7"));
        assert_eq!(group_key("A_G7_1", 1), Some("G7"));
        assert_eq!(group_key("A-G7_1", 2), Some("1"));
        assert_eq!(group_key("A_G7", 2), None);
    }

    #[test]
    fn groups_and_skips() {
        let table = ResultTable::from_records(vec![
            ExecutionRecord::new("A_G7_1", "m1", "1"),
            ExecutionRecord::new("B_G7_2", "m1", "2"),
            ExecutionRecord::new("A_G8_1", "m1", "3"),
            ExecutionRecord::new("short", "m1", "4"),
        ]);

        let grouping = group_by_position(&table, 1);
        assert_eq!(grouping.groups.len(), 2);
        assert_eq!(grouping.groups["G7"].len(), 2);
        assert_eq!(grouping.groups["G8"].get("A_G8_1", "m1"), Some("3"));
        assert_eq!(grouping.skipped, vec!["short".to_string()]);
    }
}
