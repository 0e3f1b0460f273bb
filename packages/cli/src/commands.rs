use serde_json::Value;
use tracing::debug;

use tally_fetch::{ConfigError, FetchConfig, PendingRequestTracker, ReqwestTransport, SafeFetch};
use tally_settings::{
    DocumentStore, NestedSettingsStore, RestDocumentStore, RestStoreConfig, SettingsError,
    SettingsPath,
};

use crate::{Cli, Command, SettingsCommand};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("no user given; pass --user or set TALLY_USER_ID")]
    MissingUser,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build the REST-backed store from the environment and flags, then run the
/// command.
pub async fn run(cli: Cli) -> Result<Value, CliError> {
    let user_id = cli.user.ok_or(CliError::MissingUser)?;

    let mut fetch_config = FetchConfig::from_env()?;
    if let Some(timeout_ms) = cli.timeout_ms {
        fetch_config.timeout_ms = timeout_ms;
    }
    if let Some(retries) = cli.retries {
        fetch_config.retry_count = retries;
    }
    fetch_config.validate()?;

    let tracker = PendingRequestTracker::default();
    let fetch = SafeFetch::new(ReqwestTransport::new())
        .with_tracker(tracker.clone())
        .with_defaults(fetch_config.to_options());
    let store = RestDocumentStore::new(fetch, RestStoreConfig::from_env()?)?;
    let settings = NestedSettingsStore::new(store);

    let output = execute(&settings, &user_id, cli.command).await;
    debug!(pending = tracker.pending_count(), "command finished");
    output
}

pub async fn execute<S: DocumentStore>(
    settings: &NestedSettingsStore<S>,
    user_id: &str,
    command: Command,
) -> Result<Value, CliError> {
    let Command::Settings(command) = command;
    match command {
        SettingsCommand::Get { path: None } => Ok(settings.get_all(user_id).await?),
        SettingsCommand::Get { path: Some(path) } => {
            let path = SettingsPath::parse(&path)?;
            Ok(settings.get_by_path(user_id, &path).await?)
        }
        SettingsCommand::Set { path, value } => {
            let path = SettingsPath::parse(&path)?;
            let saved = settings
                .update_by_path(user_id, &path, loose_json(&value))
                .await?;
            Ok(saved.settings)
        }
        SettingsCommand::Replace { document } => {
            let saved = settings
                .replace_all(user_id, serde_json::from_str(&document)?)
                .await?;
            Ok(saved.settings)
        }
        SettingsCommand::Init { defaults } => Ok(settings
            .get_or_init(user_id, serde_json::from_str(&defaults)?)
            .await?),
    }
}

fn loose_json(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_settings::InMemoryDocumentStore;

    fn settings() -> NestedSettingsStore<InMemoryDocumentStore> {
        NestedSettingsStore::new(InMemoryDocumentStore::new())
    }

    fn cmd(command: SettingsCommand) -> Command {
        Command::Settings(command)
    }

    #[tokio::test]
    async fn set_then_get_path() {
        let settings = settings();
        execute(
            &settings,
            "u-1",
            cmd(SettingsCommand::Replace {
                document: "{}".into(),
            }),
        )
        .await
        .unwrap();
        execute(
            &settings,
            "u-1",
            cmd(SettingsCommand::Set {
                path: "preferences.theme".into(),
                value: "dark".into(),
            }),
        )
        .await
        .unwrap();
        execute(
            &settings,
            "u-1",
            cmd(SettingsCommand::Set {
                path: "preferences.fontSize".into(),
                value: "14".into(),
            }),
        )
        .await
        .unwrap();

        let all = execute(&settings, "u-1", cmd(SettingsCommand::Get { path: None }))
            .await
            .unwrap();
        assert_eq!(all, json!({"preferences": {"theme": "dark", "fontSize": 14}}));

        let one = execute(
            &settings,
            "u-1",
            cmd(SettingsCommand::Get {
                path: Some("preferences.fontSize".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(one, json!(14));
    }

    #[tokio::test]
    async fn set_without_document_is_not_found() {
        let settings = settings();
        let err = execute(
            &settings,
            "u-1",
            cmd(SettingsCommand::Set {
                path: "preferences.theme".into(),
                value: "dark".into(),
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            CliError::Settings(SettingsError::NotFound { .. })
        ));
        assert!(settings.store().is_empty().await);
    }

    #[tokio::test]
    async fn replace_rejects_bad_json() {
        let err = execute(
            &settings(),
            "u-1",
            cmd(SettingsCommand::Replace {
                document: "{not json".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::Json(_)));
    }

    #[tokio::test]
    async fn replace_rejects_non_objects() {
        let err = execute(
            &settings(),
            "u-1",
            cmd(SettingsCommand::Replace {
                document: "[1, 2]".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            CliError::Settings(SettingsError::InvalidDocument { .. })
        ));
    }

    #[tokio::test]
    async fn init_only_writes_once() {
        let settings = settings();
        let first = execute(
            &settings,
            "u-1",
            cmd(SettingsCommand::Init {
                defaults: r#"{"currency": "USD"}"#.into(),
            }),
        )
        .await
        .unwrap();
        let second = execute(
            &settings,
            "u-1",
            cmd(SettingsCommand::Init {
                defaults: r#"{"currency": "EUR"}"#.into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(first, json!({"currency": "USD"}));
        assert_eq!(second, json!({"currency": "USD"}));
    }

    #[tokio::test]
    async fn get_for_unknown_user_is_not_found() {
        let err = execute(&settings(), "nobody", cmd(SettingsCommand::Get { path: None }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "settings not found for user nobody");
    }

    #[test]
    fn loose_json_falls_back_to_string() {
        assert_eq!(loose_json("true"), json!(true));
        assert_eq!(loose_json(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(loose_json("dark"), json!("dark"));
    }
}
