use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

/// Top-level commands.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Create or upgrade the audit database.
    Migrate,
    /// Full history of one entity, oldest first.
    History(HistoryArgs),
    /// One audit record with its linked children.
    Show(ShowArgs),
    /// Filter audit records, newest first.
    Query(QueryArgs),
}

/// Arguments for `quill history`.
#[derive(Clone, Debug, Args)]
pub struct HistoryArgs {
    /// Entity type name, e.g. `Invoice`.
    pub entity: String,
    /// Natural key; composite keys are comma-joined.
    pub key: String,
}

/// Arguments for `quill show`.
#[derive(Clone, Debug, Args)]
pub struct ShowArgs {
    pub id: i64,
}

/// Arguments for `quill query`.
#[derive(Clone, Debug, Args)]
pub struct QueryArgs {
    #[arg(long)]
    pub entity: Option<String>,
    #[arg(long)]
    pub key: Option<String>,
    /// added, modified or removed
    #[arg(long)]
    pub operation: Option<String>,
    #[arg(long)]
    pub actor: Option<String>,
    #[arg(long)]
    pub session: Option<String>,
    /// Inclusive RFC 3339 lower bound.
    #[arg(long, value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,
    /// Exclusive RFC 3339 upper bound.
    #[arg(long, value_parser = parse_timestamp)]
    pub until: Option<DateTime<Utc>>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| format!("expected an RFC 3339 timestamp: {error}"))
}
