pub mod history;
pub mod migrate;
pub mod query;
pub mod shared;
pub mod show;
pub mod view;

use anyhow::Context;
use quill_config::QuillConfig;
use quill_db::AuditService;

use crate::cli::{Commands, GlobalFlags};

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    config: &QuillConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let path = database_path(config, flags);
    if matches!(command, Commands::Migrate) {
        return migrate::handle(&path, flags).await;
    }

    let service = AuditService::open(&path, config.engine.settings(), config.database.jsonl_dir())
        .await
        .with_context(|| format!("failed to open audit database '{path}'"))?;

    match command {
        Commands::History(args) => history::handle(&args, &service, flags).await,
        Commands::Show(args) => show::handle(&args, &service, flags).await,
        Commands::Query(args) => query::handle(&args, &service, config, flags).await,
        Commands::Migrate => unreachable!("migrate is handled before opening the service"),
    }
}

/// `--db` wins over the configured path.
fn database_path(config: &QuillConfig, flags: &GlobalFlags) -> String {
    flags
        .db
        .clone()
        .unwrap_or_else(|| config.database.path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::cli::root_commands::HistoryArgs;

    fn flags(db: Option<String>) -> GlobalFlags {
        GlobalFlags {
            format: OutputFormat::Json,
            limit: None,
            db,
        }
    }

    #[test]
    fn db_flag_overrides_config_path() {
        let config = QuillConfig::default();
        assert_eq!(database_path(&config, &flags(None)), ".quill/audit.db");
        assert_eq!(
            database_path(&config, &flags(Some(":memory:".into()))),
            ":memory:"
        );
    }

    #[tokio::test]
    async fn configured_jsonl_dir_backs_the_service() {
        let dir = tempfile::tempdir().unwrap();
        let trail = dir.path().join("trail");
        let mut config = QuillConfig::default();
        config.database.path = dir.path().join("audit.db").display().to_string();
        config.database.jsonl_dir = trail.display().to_string();

        let command = Commands::History(HistoryArgs {
            entity: "Invoice".into(),
            key: "7".into(),
        });
        dispatch(command, &config, &flags(None)).await.unwrap();

        assert!(trail.is_dir());
    }
}
