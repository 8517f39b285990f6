use clap::{Arg, ArgAction, ArgMatches, Command};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use transync::{
    ChangeTracker, ContentStore, FieldCategory, FieldRef, FieldValue, FlagOutcome, ItemId,
    LanguageRegistry, LanguageTag, Ledger, SqliteStore,
};
use transync_mt::{
    GoogleTranslateProvider, MachineTranslator, MockMode, MockTranslator, ReconcileError,
    ReconcileReport, Reconciler, RegistryResolver, SyncConfig,
};

fn item_arg() -> Arg {
    Arg::new("item")
        .help("Content item id")
        .required(true)
        .value_parser(clap::value_parser!(u64))
}

fn cli() -> Command {
    Command::new("transync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Track and resync stale translations of content fields")
        .subcommand_required(true)
        .arg(
            Arg::new("db")
                .long("db")
                .env("TRANSYNC_DB")
                .help("SQLite content database")
                .default_value("transync.db")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Sync configuration file (JSON)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .help("Use mock translator instead of Google Translate")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("add-source")
                .about("Create a source item")
                .arg(Arg::new("language").required(true).help("Language tag, e.g. en")),
        )
        .subcommand(
            Command::new("add-translation")
                .about("Create (or find) the translation of a source item")
                .arg(item_arg())
                .arg(Arg::new("language").required(true).help("Target language tag")),
        )
        .subcommand(
            Command::new("set")
                .about("Save a field value, flagging it when translations go stale")
                .arg(item_arg())
                .arg(Arg::new("field").required(true).help("Field, e.g. title or keyed:hero_text"))
                .arg(Arg::new("value").required(true).help("New value"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Parse the value as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("flag")
                .about("Mark a field as pending without changing it")
                .arg(item_arg())
                .arg(Arg::new("field").required(true)),
        )
        .subcommand(
            Command::new("pending")
                .about("List fields awaiting resync")
                .arg(item_arg())
                .arg(
                    Arg::new("category")
                        .long("category")
                        .value_parser(["content", "keyed"]),
                ),
        )
        .subcommand(
            Command::new("clear")
                .about("Mark one field (or all) as resynced")
                .arg(item_arg())
                .arg(Arg::new("field")),
        )
        .subcommand(
            Command::new("status")
                .about("Show pending fields, translations and last sync time")
                .arg(item_arg()),
        )
        .subcommand(
            Command::new("reconcile")
                .about("Resync pending fields into target languages")
                .arg(item_arg())
                .arg(
                    Arg::new("targets")
                        .long("targets")
                        .short('t')
                        .value_delimiter(',')
                        .help("Target languages (default: every existing translation)"),
                )
                .arg(
                    Arg::new("field")
                        .long("field")
                        .short('f')
                        .help("Resync only this field"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the report as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn item(matches: &ArgMatches) -> ItemId {
    ItemId(matches.get_one::<u64>("item").copied().unwrap_or_default())
}

fn field(matches: &ArgMatches) -> Result<FieldRef, Box<dyn std::error::Error>> {
    let raw = matches
        .get_one::<String>("field")
        .ok_or("missing field")?;
    Ok(raw.parse()?)
}

fn language(matches: &ArgMatches) -> Result<LanguageTag, Box<dyn std::error::Error>> {
    let raw = matches
        .get_one::<String>("language")
        .ok_or("missing language")?;
    Ok(raw.parse()?)
}

fn translator(
    config: &SyncConfig,
    use_mock: bool,
) -> Result<Arc<dyn MachineTranslator>, Box<dyn std::error::Error>> {
    if use_mock {
        return Ok(Arc::new(MockTranslator::new(MockMode::Suffix)));
    }

    if env::var("GOOGLE_TRANSLATE_API_KEY").is_err() {
        eprintln!("❌ GOOGLE_TRANSLATE_API_KEY environment variable not set");
        eprintln!("   Set it with: export GOOGLE_TRANSLATE_API_KEY=your_api_key");
        eprintln!("   Or use --mock to use mock translator");
        return Err("Missing API key".into());
    }

    let mut provider = GoogleTranslateProvider::from_env()?;
    if let Some(endpoint) = &config.translate_endpoint {
        provider = provider.with_base_url(endpoint);
    }
    Ok(Arc::new(provider))
}

fn print_report(report: &ReconcileReport, as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::default(),
    };
    let metadata = config.metadata();

    let db = matches
        .get_one::<PathBuf>("db")
        .ok_or("missing database path")?;
    let store = Arc::new(SqliteStore::open(db)?);
    let tracker = ChangeTracker::new(&*store, &*store, &metadata);
    let ledger = Ledger::new(&*store);

    match matches.subcommand() {
        Some(("add-source", sub)) => {
            let id = store.insert_source(&language(sub)?)?;
            println!("{}", id);
        }
        Some(("add-translation", sub)) => {
            let id = store.link_translation(item(sub), &language(sub)?)?;
            println!("{}", id);
        }
        Some(("set", sub)) => {
            let (id, field) = (item(sub), field(sub)?);
            let raw = sub.get_one::<String>("value").ok_or("missing value")?;
            let value = if sub.get_flag("json") {
                FieldValue::new(serde_json::from_str(raw)?)
            } else {
                FieldValue::from(raw.as_str())
            };

            let old = store.field(id, &field)?;
            let flagged = tracker.track_change(id, &field, old.as_ref(), Some(&value))?;
            store.set_field(id, &field, value)?;
            if flagged {
                println!("🚩 {} flagged for resync", field);
            } else {
                println!("✅ {} saved", field);
            }
        }
        Some(("flag", sub)) => {
            let (id, field) = (item(sub), field(sub)?);
            let refusal = match tracker.flag_field(id, &field)? {
                FlagOutcome::Flagged => {
                    println!("🚩 {} flagged for resync", field);
                    return Ok(());
                }
                FlagOutcome::UnknownItem => format!("unknown item {}", id),
                FlagOutcome::NotSource { source } => {
                    format!("item {} is a translation, flag its source item {}", id, source)
                }
                FlagOutcome::NotTranslatable(classification) => {
                    format!("{} is not translatable ({:?})", field, classification)
                }
            };
            eprintln!("❌ {}", refusal);
            return Err(refusal.into());
        }
        Some(("pending", sub)) => {
            let category = sub
                .get_one::<String>("category")
                .map(|raw| raw.parse::<FieldCategory>())
                .transpose()?;
            for field in tracker.pending_for_item(item(sub), category)? {
                println!("{}", field);
            }
        }
        Some(("clear", sub)) => {
            let field = sub
                .get_one::<String>("field")
                .map(|raw| raw.parse::<FieldRef>())
                .transpose()?;
            ledger.clear(item(sub), field.as_ref())?;
        }
        Some(("status", sub)) => {
            let id = item(sub);
            let language = store.language_of(id)?.ok_or("unknown item")?;
            println!("Item {} ({})", id, language);
            for (language, translation) in store.translations(id)? {
                println!("  🌍 {} → item {}", language, translation);
            }
            let pending = tracker.pending_for_item(id, None)?;
            if pending.is_empty() {
                println!("  ✅ nothing pending");
            }
            for field in pending {
                println!("  🚩 {}", field);
            }
            if let Some(source) = store.source_of(id)? {
                match ledger.last_synced(source)? {
                    Some(time) => println!("  🕒 last synced {}", time.to_rfc3339()),
                    None => println!("  🕒 never synced"),
                }
            }
        }
        Some(("reconcile", sub)) => {
            let id = item(sub);
            let targets = sub
                .get_many::<String>("targets")
                .map(|values| {
                    values
                        .map(|raw| raw.parse::<LanguageTag>())
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;
            let only_field = sub
                .get_one::<String>("field")
                .map(|raw| raw.parse::<FieldRef>())
                .transpose()?;

            let handlers = config.handler_registry(
                translator(&config, matches.get_flag("mock"))?,
                Arc::new(RegistryResolver::new(store.clone())),
            )?;
            let reconciler = Reconciler::new(&*store, &*store, &metadata, &handlers)
                .with_options(config.reconciler_options());

            let result = match (&only_field, &targets) {
                (Some(field), Some(targets)) => {
                    reconciler.reconcile_field(id, field, targets).await
                }
                (Some(field), None) => {
                    let targets: Vec<LanguageTag> = store
                        .translations(id)?
                        .into_iter()
                        .map(|(language, _)| language)
                        .collect();
                    reconciler.reconcile_field(id, field, &targets).await
                }
                (None, Some(targets)) => reconciler.reconcile(id, targets).await,
                (None, None) => reconciler.reconcile_all_translations(id).await,
            };

            match result {
                Ok(report) => {
                    print_report(&report, sub.get_flag("json"))?;
                    if !report.is_complete() {
                        info!(failures = report.failures().len(), "some fields need attention");
                    }
                }
                Err(error) => {
                    if let ReconcileError::Halted { report, .. } = &error {
                        print_report(report, sub.get_flag("json"))?;
                    }
                    eprintln!("❌ {}", error);
                    return Err(error.into());
                }
            }
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
