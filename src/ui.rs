// UI layer: an interactive menu built on `dialoguer`. Each entry loads
// the settings fresh, runs one command and prints what came back.

use crate::api::{ApiClient, Identity, UpdateKind};
use crate::commands::{self, TeamOutcome};
use crate::settings::SettingsStore;
use anyhow::Result;
use chrono::Utc;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Main interactive menu. Runs until the user picks "Exit" and returns
/// how many remote requests failed along the way.
pub fn main_menu(api: &ApiClient, store: &SettingsStore) -> Result<usize> {
    let mut failures = 0;
    loop {
        let items = ["Login", "Teams", "Show updates", "Send update", "Exit"];
        let selection = Select::new().items(&items).default(0).interact()?;
        match selection {
            0 => failures += handle_login(api, store)?,
            1 => handle_teams(store)?,
            2 => failures += handle_show(api, store)?,
            3 => failures += handle_update(api, store)?,
            4 => break,
            _ => {}
        }
    }
    Ok(failures)
}

/// Ask for id and token, store them and cache the team list.
fn handle_login(api: &ApiClient, store: &SettingsStore) -> Result<usize> {
    let id: u64 = Input::new().with_prompt("User id").interact_text()?;
    let secret: String = Password::new().with_prompt("API token").interact()?;

    let spinner = spinner("Fetching teams...")?;
    let res = commands::login(api, store, Identity { id, secret }, Utc::now());
    spinner.finish_and_clear();

    match res {
        Ok(teams) => {
            println!("Logged in, {} team(s) cached.", teams.len());
            Ok(0)
        }
        Err(e) => {
            println!("{}", e);
            Ok(1)
        }
    }
}

fn handle_teams(store: &SettingsStore) -> Result<()> {
    let settings = store.load()?;
    match commands::teams(&settings) {
        Ok(teams) => print_json(&teams)?,
        Err(e) => println!("{}", e),
    }
    Ok(())
}

fn handle_show(api: &ApiClient, store: &SettingsStore) -> Result<usize> {
    let settings = store.load()?;
    if let Err(e) = commands::ready(&settings) {
        println!("{}", e);
        return Ok(0);
    }

    let days: u32 = Input::new()
        .with_prompt("Number of days")
        .default(1)
        .interact_text()?;
    let all = Confirm::new()
        .with_prompt("Show entire team's messages?")
        .default(false)
        .interact()?;

    let spinner = spinner("Fetching digests...")?;
    let res = commands::show(api, &settings, days, all, Utc::now());
    spinner.finish_and_clear();

    match res {
        Ok(outcomes) => report(outcomes),
        Err(e) => {
            println!("{}", e);
            Ok(0)
        }
    }
}

fn handle_update(api: &ApiClient, store: &SettingsStore) -> Result<usize> {
    let settings = store.load()?;
    if let Err(e) = commands::ready(&settings) {
        println!("{}", e);
        return Ok(0);
    }

    let kinds: Vec<&str> = UpdateKind::ALL.iter().map(|k| k.as_str()).collect();
    let kind = UpdateKind::ALL[Select::new()
        .with_prompt("Update type")
        .items(&kinds)
        .default(0)
        .interact()?];
    let text: String = Input::new().with_prompt("Update").interact_text()?;

    let teams = settings.teams();
    let labels: Vec<String> = teams.iter().map(|t| format!("{} ({})", t.name, t.id)).collect();
    let defaults = vec![true; teams.len()];
    let chosen = MultiSelect::new()
        .with_prompt("Teams (space to toggle)")
        .items(&labels)
        .defaults(&defaults)
        .interact()?;
    if chosen.is_empty() {
        println!("No valid teams entered.");
        return Ok(0);
    }
    let requested: Vec<u64> = chosen.into_iter().map(|i| teams[i].id).collect();

    let spinner = spinner("Sending update...")?;
    let res = commands::update(api, &settings, &requested, kind, &text, Utc::now());
    spinner.finish_and_clear();

    match res {
        Ok(outcomes) => report(outcomes),
        Err(e) => {
            println!("{}", e);
            Ok(0)
        }
    }
}

/// Print every team's outcome; returns the number of failures.
fn report<T: Serialize>(outcomes: Vec<TeamOutcome<T>>) -> Result<usize> {
    let mut failures = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(value) => print_json(&value)?,
            Err(e) => {
                println!("Team {}: {}", outcome.team_id, e);
                failures += 1;
            }
        }
    }
    Ok(failures)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}
