use std::path::Path;

use anyhow::Context;
use quill_db::AuditDb;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::output::output;

#[derive(Debug, Serialize)]
struct MigrateResponse<'a> {
    database: &'a str,
    migrated: bool,
}

/// Handle `quill migrate`.
pub async fn handle(path: &str, flags: &GlobalFlags) -> anyhow::Result<()> {
    if path != ":memory:" {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
    }

    AuditDb::open_local(path)
        .await
        .with_context(|| format!("failed to migrate audit database '{path}'"))?;
    tracing::info!(path, "audit database ready");

    output(
        &MigrateResponse {
            database: path,
            migrated: true,
        },
        flags.format,
    )
}
