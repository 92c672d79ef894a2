//! Safety checks on the output path, so a run can never overwrite one of its
//! own inputs.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must end with `required_extension` (e.g. ".json")
/// - Output cannot be the same as any of the input paths
/// - Output cannot be an existing directory
pub fn validate_output_path(output: &Path, required_extension: &str, input_paths: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.ends_with(required_extension) || output_name.len() == required_extension.len() {
        bail!(
            "Safety check failed: output file '{}' must be named '*{}'",
            output.display(),
            required_extension
        );
    }

    if output.is_dir() {
        bail!("Safety check failed: output '{}' is a directory", output.display());
    }

    for input in input_paths {
        let same = output == *input
            || matches!(
                (output.canonicalize(), input.canonicalize()),
                (Ok(a), Ok(b)) if a == b
            );
        if same {
            bail!(
                "Safety check failed: output '{}' cannot be the same as input '{}'",
                output.display(),
                input.display()
            );
        }
    }

    Ok(())
}
