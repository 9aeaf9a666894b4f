use std::{io, path::Path};

use anyhow::{Context, Result};

/// Last `count` lines of the audit log, oldest first. A missing log means nothing happened yet.
pub async fn last_lines(path: &Path, count: usize) -> Result<Vec<String>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {path:?}")),
    };
    let lines = content.lines().collect::<Vec<_>>();
    let start = lines.len().saturating_sub(count);
    Ok(lines[start..].iter().map(|v| v.to_string()).collect())
}
