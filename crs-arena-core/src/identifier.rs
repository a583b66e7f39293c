//! Conversation identifier decomposition.
//!
//! Identifiers look like `{system}_{dataset}_{...}`. These functions are the
//! only place dataset and system labels are derived from.

use crate::error::MalformedIdentifier;

/// Dataset and system labels of one conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParts<'a> {
    /// Segment 0.
    pub family: &'a str,
    /// Segment 1.
    pub dataset: &'a str,
    /// Segments 0 and 1 joined by `_`.
    pub system: String,
}

pub fn decompose(id: &str) -> Result<IdParts<'_>, MalformedIdentifier> {
    let mut segments = id.split('_');
    match (segments.next(), segments.next()) {
        (Some(family), Some(dataset)) => Ok(IdParts {
            family,
            dataset,
            system: format!("{family}_{dataset}"),
        }),
        _ => Err(MalformedIdentifier { id: id.to_string() }),
    }
}

/// Segment 1 of the identifier.
pub fn dataset_of(id: &str) -> Result<&str, MalformedIdentifier> {
    decompose(id).map(|parts| parts.dataset)
}

/// Segments 0 and 1 of the identifier, joined by `_`.
pub fn system_of(id: &str) -> Result<String, MalformedIdentifier> {
    decompose(id).map(|parts| parts.system)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_and_dataset() {
        assert_eq!(system_of("barcor_redial_001").unwrap(), "barcor_redial");
        assert_eq!(dataset_of("barcor_redial_001").unwrap(), "redial");
    }

    #[test]
    fn test_two_segments_is_enough() {
        assert_eq!(system_of("kbrd_opendialkg").unwrap(), "kbrd_opendialkg");
        assert_eq!(dataset_of("kbrd_opendialkg").unwrap(), "opendialkg");
    }

    #[test]
    fn test_extra_segments_ignored() {
        let parts = decompose("unicrs_redial_12_a_b").unwrap();
        assert_eq!(parts.family, "unicrs");
        assert_eq!(parts.dataset, "redial");
        assert_eq!(parts.system, "unicrs_redial");
    }

    #[test]
    fn test_malformed() {
        let err = system_of("onlyonepart").unwrap_err();
        assert_eq!(err.id, "onlyonepart");
        assert!(dataset_of("onlyonepart").is_err());
        assert!(dataset_of("").is_err());
    }
}
