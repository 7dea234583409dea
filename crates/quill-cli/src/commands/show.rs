use quill_db::AuditService;
use quill_db::error::DatabaseError;
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ShowArgs;
use crate::commands::view::RecordView;
use crate::output::output;

#[derive(Debug, Serialize)]
struct ShowResponse {
    #[serde(flatten)]
    record: RecordView,
    children: Vec<RecordView>,
}

/// Handle `quill show`.
pub async fn handle(
    args: &ShowArgs,
    service: &AuditService,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let record = match service.get(args.id).await {
        Ok(record) => record,
        Err(DatabaseError::NoResult) => anyhow::bail!("audit record {} not found", args.id),
        Err(error) => return Err(error.into()),
    };
    let children = service.children(args.id).await?;

    output(
        &ShowResponse {
            record: RecordView::new(record)?,
            children: RecordView::list(children)?,
        },
        flags.format,
    )
}
