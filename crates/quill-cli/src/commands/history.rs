use quill_db::AuditService;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::HistoryArgs;
use crate::commands::view::RecordView;
use crate::output::output;

/// Handle `quill history`. Without `--limit` every record is printed.
pub async fn handle(
    args: &HistoryArgs,
    service: &AuditService,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let mut records = service.history(&args.entity, &args.key).await?;
    if let Some(limit) = flags.limit {
        // Keep the most recent entries, still oldest first.
        let skip = records
            .len()
            .saturating_sub(usize::try_from(limit).unwrap_or(usize::MAX));
        records.drain(..skip);
    }
    output(&RecordView::list(records)?, flags.format)
}
