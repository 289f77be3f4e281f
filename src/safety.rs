//! Guards against overwriting listening history with generated output.

use anyhow::{bail, Result};
use std::path::Path;

use crate::ingest::is_history_file;

/// Marker every generated database must carry in its file name.
pub const OUTPUT_MARKER: &str = "stats";

/// Validates that an output path is safe to create or overwrite.
///
/// - the file name must contain `required_pattern`
/// - it must not be any of `source_paths`
/// - it must not look like a Spotify history export
pub fn validate_output_path(output: &Path, required_pattern: &str, source_paths: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        if output == *source {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    if is_history_file(output_name) || output_name.starts_with("Streaming_History") {
        bail!(
            "Safety check failed: output '{}' looks like a streaming history export",
            output.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_output() {
        let output = PathBuf::from("/tmp/listening_stats.sqlite3");
        let source = PathBuf::from("/data/Streaming_History_Audio_2024.json");
        assert!(validate_output_path(&output, OUTPUT_MARKER, &[&source]).is_ok());
    }

    #[test]
    fn test_missing_marker() {
        let output = PathBuf::from("/tmp/output.sqlite3");
        let result = validate_output_path(&output, OUTPUT_MARKER, &[]);
        assert!(result.unwrap_err().to_string().contains("must contain 'stats'"));
    }

    #[test]
    fn test_output_equals_source() {
        let path = PathBuf::from("/data/stats.json");
        let result = validate_output_path(&path, OUTPUT_MARKER, &[&path]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }

    #[test]
    fn test_history_name_blocked() {
        let output = PathBuf::from("/data/Streaming_History_Audio_stats.json");
        assert!(validate_output_path(&output, OUTPUT_MARKER, &[]).is_err());
    }
}
