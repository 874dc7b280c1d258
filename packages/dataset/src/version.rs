//! Schema version gate.
//!
//! Runs immediately after the manifest bytes parse, before any other
//! field is trusted: a newer manifest may index chunks in ways this
//! loader cannot interpret safely, so newer-than-supported data is
//! rejected outright instead of being misread.

use pr_insights_dataset_models::Manifest;

use crate::DatasetError;

/// Newest manifest schema this loader understands.
pub const MAX_MANIFEST_SCHEMA: u32 = 2;
/// Newest dataset schema this loader understands.
pub const MAX_DATASET_SCHEMA: u32 = 2;
/// Newest aggregates schema this loader understands.
pub const MAX_AGGREGATES_SCHEMA: u32 = 2;

/// Validates the manifest's schema version fields against the compiled-in
/// maxima.
///
/// # Errors
///
/// Returns [`DatasetError::UnsupportedVersion`] when any version field
/// exceeds its maximum, or when `manifest_schema_version` is absent
/// (deserialized as zero) — a manifest that does not declare its own
/// version cannot be trusted.
pub fn validate(manifest: &Manifest) -> Result<(), DatasetError> {
    if manifest.manifest_schema_version == 0 {
        return Err(DatasetError::UnsupportedVersion {
            field: "manifest_schema_version",
            found: 0,
            max: MAX_MANIFEST_SCHEMA,
        });
    }

    let checks = [
        (
            "manifest_schema_version",
            manifest.manifest_schema_version,
            MAX_MANIFEST_SCHEMA,
        ),
        (
            "dataset_schema_version",
            manifest.dataset_schema_version,
            MAX_DATASET_SCHEMA,
        ),
        (
            "aggregates_schema_version",
            manifest.aggregates_schema_version,
            MAX_AGGREGATES_SCHEMA,
        ),
    ];

    for (field, found, max) in checks {
        if found > max {
            return Err(DatasetError::UnsupportedVersion { field, found, max });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(manifest_v: u32, dataset_v: u32, aggregates_v: u32) -> Manifest {
        serde_json::from_value(serde_json::json!({
            "manifest_schema_version": manifest_v,
            "dataset_schema_version": dataset_v,
            "aggregates_schema_version": aggregates_v,
        }))
        .unwrap()
    }

    #[test]
    fn current_versions_pass() {
        assert!(validate(&manifest(2, 2, 2)).is_ok());
    }

    #[test]
    fn older_versions_pass() {
        assert!(validate(&manifest(1, 0, 0)).is_ok());
    }

    #[test]
    fn absent_manifest_version_is_rejected() {
        let err = validate(&manifest(0, 1, 1)).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::UnsupportedVersion {
                field: "manifest_schema_version",
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn newer_dataset_schema_is_rejected() {
        let err = validate(&manifest(2, MAX_DATASET_SCHEMA + 1, 2)).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::UnsupportedVersion {
                field: "dataset_schema_version",
                ..
            }
        ));
    }

    #[test]
    fn newer_aggregates_schema_is_rejected() {
        let err = validate(&manifest(2, 2, MAX_AGGREGATES_SCHEMA + 1)).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::UnsupportedVersion {
                field: "aggregates_schema_version",
                ..
            }
        ));
    }
}
