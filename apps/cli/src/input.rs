//! Run input: a JSON array or JSON-lines file of company rows.

use std::path::Path;

use prospector_shared::{CompanyTarget, ProspectorError, Result};

/// Read target companies from `path`, preserving file order.
pub(crate) fn load_targets(path: &Path) -> Result<Vec<CompanyTarget>> {
    let content = std::fs::read_to_string(path).map_err(|e| ProspectorError::io(path, e))?;
    let targets = parse_targets(&content)?;
    tracing::debug!(?path, count = targets.len(), "loaded targets");
    Ok(targets)
}

pub(crate) fn parse_targets(content: &str) -> Result<Vec<CompanyTarget>> {
    let trimmed = content.trim_start();

    let targets: Vec<CompanyTarget> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .map_err(|e| ProspectorError::parse(format!("invalid JSON array: {e}")))?
    } else {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .map_err(|e| ProspectorError::parse(format!("line {}: {e}", n + 1)))
            })
            .collect::<Result<_>>()?
    };

    for (i, target) in targets.iter().enumerate() {
        if target.name.trim().is_empty() {
            return Err(ProspectorError::validation(format!(
                "row {}: company name is empty",
                i + 1
            )));
        }
    }
    Ok(targets)
}
