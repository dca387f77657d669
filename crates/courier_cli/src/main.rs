//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire an in-memory store, seed a small directory and dispatch one message.
//! - Print a deterministic JSON summary of the delivery.
//!
//! Usage: `courier [config.json]`

use courier_core::model::content::{Content, Properties};
use courier_core::service::dispatcher::DispatchOutcome;
use courier_core::{
    AllowAllAuthorizer, ContentStore, CourierConfig, InternalDelivery, LocalLockManager, MessageDispatcher,
    MessagingService, ProfileWriter, RouterChain, SettingsLookup, SqliteRepository, StorePaths,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("courier: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => CourierConfig::from_json_file(path)?,
        None => CourierConfig::default(),
    };
    if let Some(log_dir) = config.log_dir.as_deref() {
        let level = config
            .log_level
            .as_deref()
            .unwrap_or_else(|| courier_core::default_log_level());
        courier_core::init_logging(level, log_dir)?;
    }

    let conn = courier_core::db::open_db_in_memory()?;
    let repo = SqliteRepository::try_new(&conn)?;
    seed(&repo)?;

    let locks = LocalLockManager::from_config(&config);
    let paths = StorePaths::new(&config.message_store_root);
    let messaging = MessagingService::new(repo.content(), &locks, paths.clone());
    let params: BTreeMap<String, String> = [
        ("sakai:to", "team, discussion:carol"),
        ("sakai:type", "discussion"),
        ("sakai:marker", "welcome"),
        ("sakai:subject", "Hello"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();
    let message = messaging.create("carol", &params, None)?;

    let dispatcher = MessageDispatcher::new(
        repo.content(),
        RouterChain::standard(
            SettingsLookup::new(repo.content(), config.settings_root.as_str()),
            repo.directory(),
            &config,
        ),
        InternalDelivery::new(&repo, &locks, &AllowAllAuthorizer, paths),
    );
    let outcome = dispatcher.dispatch(message.path())?;

    let profiles = ProfileWriter::new(repo.directory());
    let summary = match outcome {
        DispatchOutcome::Delivered {
            report, unhandled, ..
        } => json!({
            "message_id": message.id(),
            "delivered": report
                .delivered
                .iter()
                .map(|record| json!({
                    "recipient": profiles.write_profile(&record.recipient),
                    "path": record.path,
                }))
                .collect::<Vec<_>>(),
            "denied": report.denied,
            "failed": report.failed.len(),
            "unhandled": unhandled.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }),
        other => json!({
            "message_id": message.id(),
            "outcome": format!("{other:?}"),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    log::info!("event=cli_run module=cli status=ok");
    Ok(())
}

fn seed(repo: &SqliteRepository<'_>) -> Result<(), Box<dyn Error>> {
    let directory = repo.directory();
    for (id, first_name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")] {
        let mut props = Properties::new();
        props.insert("firstName".to_string(), json!(first_name));
        directory.create_user(id, &props)?;
    }
    directory.create_group("team", &Properties::new())?;
    directory.add_member("team", "alice")?;
    directory.add_member("team", "bob")?;

    let mut settings = Content::new("/sites/welcome/settings");
    settings.set_property("sling:resourceType", "sakai/settings");
    settings.set_property("sakai:marker", "welcome");
    settings.set_property("sakai:type", "discussion");
    settings.set_property("sakai:notification", true);
    settings.set_property("sakai:notificationaddress", "alice");
    repo.content().update(&settings)?;
    Ok(())
}
