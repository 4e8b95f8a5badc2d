use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use prayerclock::i18n::prayer_name;
use prayerclock::location::LocationOrigin;
use prayerclock::prelude::*;
use prayerclock::schedule::WallTime;
use prayerclock::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.green());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    let rule = "-".repeat(72);
    println!("{}", rule.dimmed());
    println!("{}", version_string);
    println!(
        "{}",
        "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    "
        .dimmed()
    );
    println!("{}", rule.dimmed());
}

/// Formats an instant on the engine's local clock.
fn local_clock(zone: LocalZone, at: DateTime<Utc>, use_24h: bool) -> String {
    let pattern = if use_24h { "%a %H:%M" } else { "%a %I:%M %p" };
    match zone {
        LocalZone::Named(tz) => at.with_timezone(&tz).format(pattern).to_string(),
        LocalZone::System => at.with_timezone(&Local).format(pattern).to_string(),
    }
}

/// Formats a provider `HH:MM` string for display.
fn wall_clock(raw: &str, use_24h: bool) -> String {
    match WallTime::parse(raw) {
        Some(wall) if use_24h => wall.to_string(),
        Some(wall) => wall.to_naive().format("%I:%M %p").to_string(),
        None => format!("{} (?)", raw),
    }
}

/// Spawns several tasks, each subscribing to a different event stream from the engine.
fn spawn_event_listeners(engine: &PrayerClockEngine, is_watching_countdown: Arc<AtomicBool>) {
    let mut prayer_rx = engine.subscribe_prayer_events();
    tokio::spawn(async move {
        while let Ok(event) = prayer_rx.recv().await {
            match event {
                PrayerEvent::PrayerReached { key, .. } => {
                    println!("\n<-- [PRAYER] {} time has come.", key.to_string().green().bold())
                }
                PrayerEvent::DateChanged { new_date } => {
                    println!("\n<-- [DATE] A new day: {}", new_date)
                }
            }
        }
    });

    let mut schedule_rx = engine.subscribe_schedule_events();
    tokio::spawn(async move {
        while let Ok(event) = schedule_rx.recv().await {
            if let ScheduleEvent::RefreshFailed { message } = event {
                println!("\n<-- [SCHEDULE] {}", message.red());
            }
        }
    });

    let mut countdown_rx = engine.subscribe_countdown_events();
    tokio::spawn(async move {
        let mut last_label = String::new();
        loop {
            match countdown_rx.recv().await {
                Ok(event) => {
                    if is_watching_countdown.load(Ordering::Relaxed)
                        && event.state.label != last_label
                    {
                        println!("<-- [COUNTDOWN] {}", event.state.label.cyan());
                    }
                    last_label = event.state.label;
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Prints alerts from the in-memory sink as they fall due.
fn spawn_alert_delivery(engine: &PrayerClockEngine, alerts: MemoryAlertSink) {
    let engine = engine.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            for alert in alerts.take_due(engine.now()) {
                println!(
                    "\n<-- [ALERT] {} | {} {}",
                    alert.title.bold(),
                    alert.body,
                    format!("({})", alert.sound).dimmed()
                );
            }
        }
    });
}

fn parse_prayer(arg: Option<&&str>) -> Option<PrayerKey> {
    arg.and_then(|value| value.parse::<PrayerKey>().ok())
}

async fn report_reschedule(handle: tokio::task::JoinHandle<Option<RescheduleReport>>) {
    match handle.await {
        Ok(Some(report)) => println!(
            "--> Alerts rescheduled: {} pending, {} skipped, {} failed.",
            report.submitted.len(),
            report.skipped.len(),
            report.failed.len()
        ),
        Ok(None) => println!("--> No schedule yet; alerts will be set after the next refresh."),
        Err(e) => println!("--> Error: reschedule task failed: {}", e),
    }
}

fn report_refresh(result: Result<Arc<ScheduleSnapshot>, RefreshError>) {
    match result {
        Ok(snapshot) => println!(
            "--> Loaded {} prayer times (zone {}).",
            snapshot.len(),
            snapshot.timezone()
        ),
        Err(e) => println!("--> {} {}", "Refresh failed:".red(), e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let path = env::var("PRAYERCLOCK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("prayerclock.toml"));
    let config = EngineConfig::load(Some(&path))?;

    let alerts = MemoryAlertSink::new();
    let collaborators = Collaborators {
        provider: Arc::new(AladhanClient::new(&config.provider)?),
        sensor: Arc::new(NoSensor),
        alerts: Arc::new(alerts.clone()),
        store: Arc::new(MemoryPreferenceStore::new()),
        clock: Arc::new(SystemTimeSource),
    };
    let engine = PrayerClockEngine::new(config, collaborators);
    let engine_handle = engine.clone();

    let is_watching_countdown = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine_handle, is_watching_countdown.clone());
    spawn_alert_delivery(&engine_handle, alerts.clone());

    info!("Spawning {} in the background...", ENGINE_NAME.cyan());
    tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            eprintln!("\nEngine stopped with an error: {}", e);
        }
    });
    report_refresh(engine_handle.refresh().await);

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                let prefs = engine_handle.preferences().await;

                let Some(command) = args.first() else {
                    continue;
                };
                match *command {
                    "refresh" => report_refresh(engine_handle.refresh().await),
                    "times" => match engine_handle.schedule().await {
                        Some(snapshot) => {
                            for key in snapshot.keys() {
                                let raw = snapshot.raw(key).unwrap_or_default();
                                println!(
                                    "  {:<10} {:<16} {}",
                                    key,
                                    prayer_name(key, prefs.language),
                                    wall_clock(raw, prefs.time_format_24h)
                                );
                            }
                        }
                        None => println!("No schedule yet. Try 'refresh'."),
                    },
                    "next" => {
                        let state = engine_handle.countdown().await;
                        match state.upcoming_at {
                            Some(at) => println!(
                                "  {} (at {})",
                                state.label.cyan().bold(),
                                local_clock(engine_handle.zone(), at, prefs.time_format_24h)
                            ),
                            None if state.label.is_empty() => println!("No schedule yet."),
                            None => println!("  {}", state.label),
                        }
                    }
                    "status" => {
                        println!("  Refresh     : {}", engine_handle.status().await);
                        match engine_handle.location().await {
                            Some(location) => {
                                let origin = match location.origin {
                                    LocationOrigin::Catalog(city) => city.display_name(prefs.language).to_string(),
                                    LocationOrigin::Device => "device".to_string(),
                                    LocationOrigin::Fallback(city) => {
                                        format!("{} (device unavailable)", city.display_name(prefs.language))
                                    }
                                };
                                println!("  Location    : {} {}", origin, location.coordinate);
                            }
                            None => println!("  Location    : not resolved yet"),
                        }
                        println!(
                            "  Method      : {} {}",
                            prefs.method,
                            prefs.method.label().unwrap_or("").dimmed()
                        );
                        println!("  Language    : {}", prefs.language);
                        println!("  Time format : {}", if prefs.time_format_24h { "24h" } else { "12h" });
                        println!("  Zone        : {}", engine_handle.zone().name());
                        for key in PrayerKey::ALL {
                            let pref = prefs.notification(key);
                            let flag = if pref.enabled { "on".green() } else { "off".red() };
                            println!("  {:<10}  : {} ({})", key, flag, pref.sound);
                        }
                    }
                    "pending" => {
                        let requests = alerts.requests();
                        if requests.is_empty() {
                            println!("No pending alerts.");
                        }
                        for request in requests {
                            println!(
                                "  {:<32} {}  {}",
                                request.id,
                                local_clock(engine_handle.zone(), request.fire_at, prefs.time_format_24h),
                                request.body.dimmed()
                            );
                        }
                    }
                    "enable" | "disable" => match parse_prayer(args.get(1)) {
                        Some(key) => {
                            let mut pref = prefs.notification(key);
                            pref.enabled = *command == "enable";
                            report_reschedule(engine_handle.set_notification(key, pref).await).await;
                        }
                        None => println!("Usage: {} <PRAYER>", command),
                    },
                    "sound" => match (parse_prayer(args.get(1)), args.get(2)) {
                        (Some(key), Some(sound)) => {
                            let mut pref = prefs.notification(key);
                            pref.sound = SoundId(sound.to_string());
                            report_reschedule(engine_handle.set_notification(key, pref).await).await;
                        }
                        _ => println!("Usage: sound <PRAYER> <SOUND_ID>"),
                    },
                    "lang" => match args.get(1).map(|code| code.parse::<Language>()) {
                        Some(Ok(language)) => {
                            report_reschedule(engine_handle.set_language(language).await).await;
                        }
                        Some(Err(e)) => println!("Error: {}", e),
                        None => println!("Usage: lang <ar|en|ru|id|tr|ur|fa|de>"),
                    },
                    "city" => {
                        let name = args[1..].join(" ");
                        let selection = if name == "device" {
                            Some(LocationSelection::Device)
                        } else {
                            name.parse::<City>().ok().map(LocationSelection::Catalog)
                        };
                        match selection {
                            Some(selection) => {
                                report_refresh(engine_handle.set_location(selection).await)
                            }
                            None => {
                                let names: Vec<_> = City::ALL.iter().map(|c| c.raw_value()).collect();
                                println!("Usage: city <{}|device>", names.join("|"));
                            }
                        }
                    }
                    "method" => match args.get(1).and_then(|id| id.parse::<u8>().ok()) {
                        Some(id) => {
                            let method = CalculationMethod::from_stored(id);
                            report_refresh(engine_handle.set_method(method).await)
                        }
                        None => println!("Usage: method <ID>. Type 'methods' to list them."),
                    },
                    "methods" => {
                        for (id, label) in CalculationMethod::KNOWN {
                            let marker = if *id == prefs.method.0 { "*" } else { " " };
                            println!(" {} {:>2}  {}", marker, id, label);
                        }
                    }
                    "format" => match args.get(1) {
                        Some(&"12") => engine_handle.set_time_format(false).await,
                        Some(&"24") => engine_handle.set_time_format(true).await,
                        _ => println!("Usage: format 12|24"),
                    },
                    "test" => match (args.get(1), args.get(2), args.get(3)) {
                        (Some(&"add"), Some(name), Some(minutes)) => match minutes.parse::<i64>() {
                            Ok(minutes) if minutes >= 0 => {
                                let at = engine_handle.now() + chrono::Duration::minutes(minutes);
                                match engine_handle.add_test_alert(*name, at).await {
                                    Ok(id) => println!("--> Test alert '{}' set for {}.", id, local_clock(engine_handle.zone(), at, prefs.time_format_24h)),
                                    Err(e) => println!("--> Error: {}", e),
                                }
                            }
                            _ => println!("Error: '{}' is not a valid number of minutes.", minutes),
                        },
                        (Some(&"remove"), None, None) => match engine_handle.remove_test_alert().await {
                            Ok(ids) if ids.is_empty() => println!("--> No test alert was pending."),
                            Ok(ids) => println!("--> Removed {}.", ids.join(", ")),
                            Err(e) => println!("--> Error: {}", e),
                        },
                        _ => println!("Usage: test add <NAME> <MINUTES> | test remove"),
                    },
                    "watch" => match args.get(1) {
                        Some(&"on") => {
                            is_watching_countdown.store(true, Ordering::Relaxed);
                            println!("--> Printing countdown changes.");
                        }
                        Some(&"off") => {
                            is_watching_countdown.store(false, Ordering::Relaxed);
                            println!("--> Countdown printing stopped.");
                        }
                        _ => println!("Usage: watch on|off"),
                    },
                    "help" => {
                        println!("Available commands:");
                        println!("  refresh                 - Fetches today's prayer times again.");
                        println!("  times                   - Shows the current schedule.");
                        println!("  next                    - Shows the countdown to the next prayer.");
                        println!("  status                  - Shows refresh status, location and preferences.");
                        println!("  pending                 - Lists pending alerts.");
                        println!("  enable|disable <P>      - Turns alerts for prayer P on or off.");
                        println!("  sound <P> <ID>          - Sets the alert sound for prayer P.");
                        println!("  lang <CODE>             - Switches the language.");
                        println!("  city <NAME>|device      - Changes the location and refreshes.");
                        println!("  method <ID>             - Changes the calculation method and refreshes.");
                        println!("  methods                 - Lists known calculation methods.");
                        println!("  format 12|24            - Sets the time display format.");
                        println!("  test add <NAME> <M>     - Schedules a test alert M minutes from now.");
                        println!("  test remove             - Cancels the test alert.");
                        println!("  watch on|off            - Prints countdown changes as they happen.");
                        println!("  exit                    - Quits the shell.");
                    }
                    "exit" => break,
                    _ => println!("Unknown command: '{}'. Type 'help'.", line.trim()),
                }
            }
            Err(_) => {
                println!("Exiting prayershell...");
                break;
            }
        }
    }

    Ok(())
}
