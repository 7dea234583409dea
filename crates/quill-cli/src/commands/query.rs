use quill_config::QuillConfig;
use quill_core::AuditOperation;
use quill_db::{AuditFilter, AuditService};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::QueryArgs;
use crate::commands::shared::{effective_limit, parse_enum};
use crate::commands::view::RecordView;
use crate::output::output;

/// Handle `quill query`.
pub async fn handle(
    args: &QueryArgs,
    service: &AuditService,
    config: &QuillConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let filter = build_filter(args, flags.limit, config.general.default_limit)?;
    let records = service.query(&filter).await?;
    output(&RecordView::list(records)?, flags.format)
}

fn build_filter(
    args: &QueryArgs,
    limit: Option<u32>,
    default_limit: u32,
) -> anyhow::Result<AuditFilter> {
    Ok(AuditFilter {
        entity_name: args.entity.clone(),
        primary_key: args.key.clone(),
        operation: args
            .operation
            .as_deref()
            .map(|value| parse_enum::<AuditOperation>(value, "operation"))
            .transpose()?,
        actor: args.actor.clone(),
        session_id: args.session.clone(),
        since: args.since,
        until: args.until,
        limit: Some(effective_limit(None, limit, default_limit)),
    })
}
