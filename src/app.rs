//! Terminal front-end: runs commands against the planner and renders results

use std::fmt::Write as _;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::info;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::error::{PlannerError, PlannerResult};
use crate::services::geo::ServiceArea;
use crate::services::geocoding::create_geocoder;
use crate::services::geolocation::StaticLocationProvider;
use crate::services::planner::RoutePlanner;
use crate::services::routing::create_routing_service_with_fallback;
use crate::services::stop_list::StopListManager;
use crate::services::storage::JsonFileStorage;
use crate::types::{Appointment, LocationStatus, RouteSummary};

/// Asks the user a yes/no question
#[async_trait]
pub trait Prompt: Send {
    async fn confirm(&mut self, question: &str) -> bool;
}

/// Reads commands and confirmations from stdin
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
        self.lines.next_line().await.context("Failed to read from stdin")
    }
}

#[async_trait]
impl Prompt for StdinInput {
    async fn confirm(&mut self, question: &str) -> bool {
        match self.read_line(&format!("{} [y/N] ", question)).await {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

/// Wire the planner from configuration
pub async fn build_planner(config: &Config) -> Result<RoutePlanner> {
    let storage = JsonFileStorage::open(&config.storage_path);
    info!("Using storage file {}", storage.path().display());
    let stops = StopListManager::load(Box::new(storage));

    let geocoder = create_geocoder(config)?;
    let router = create_routing_service_with_fallback(config.valhalla_url.clone()).await;

    let mut planner = RoutePlanner::new(stops, geocoder, router, config.service_center)
        .with_avoid_tolls(config.avoid_tolls);

    if let Some(radius_km) = config.service_radius_km {
        planner = planner.with_service_area(ServiceArea::new(
            config.service_center,
            config.service_center_name.clone(),
            radius_km,
        ));
    }
    if let Some(position) = config.device_location {
        planner = planner.with_location_provider(Box::new(StaticLocationProvider::new(position)));
    }

    Ok(planner)
}

/// Run one command and return the text to show
pub async fn execute(planner: &RoutePlanner, command: &Command, prompt: &mut dyn Prompt) -> PlannerResult<String> {
    match command {
        Command::Shell | Command::List => Ok(render_overview(planner)),
        Command::Add { address } => {
            let appointment = planner.add_appointment(&address.join(" ")).await?;
            Ok(format!("Added: {}\n\n{}", appointment.address, render_overview(planner)))
        }
        Command::Suggest { query } => {
            let candidates = planner.suggest(&query.join(" ")).await?;
            if candidates.is_empty() {
                return Ok("No matching addresses.".to_string());
            }
            let mut out = String::new();
            for (i, candidate) in candidates.iter().enumerate() {
                let _ = writeln!(out, "{:>3}. {}", i + 1, candidate.display_name);
            }
            Ok(out.trim_end().to_string())
        }
        Command::Pick { choice, query } => {
            let query = query.join(" ");
            let candidates = planner.suggest(&query).await?;
            let candidate = candidates
                .into_iter()
                .nth(*choice as usize - 1)
                .ok_or_else(|| PlannerError::AddressNotFound(query.clone()))?;
            let appointment = planner.add_selected(candidate).await?;
            Ok(format!("Added: {}\n\n{}", appointment.address, render_overview(planner)))
        }
        Command::Remove { id } => {
            if planner.delete_appointment(*id).await? {
                Ok(render_overview(planner))
            } else {
                Ok(format!("No appointment with id {}.", id))
            }
        }
        Command::Move { from, to } => {
            planner.move_appointment(*from as usize - 1, *to as usize - 1)?;
            Ok(render_overview(planner))
        }
        Command::Optimize => {
            planner.optimize_route().await?;
            Ok(render_overview(planner))
        }
        Command::Clear { yes } => {
            if planner.appointment_count() == 0 {
                return Ok("No appointments to clear.".to_string());
            }
            let confirmed = *yes || prompt.confirm("Are you sure you want to clear all appointments?").await;
            if planner.clear_all(|_| confirmed)? {
                Ok("All appointments cleared.".to_string())
            } else {
                Ok("Nothing cleared.".to_string())
            }
        }
        Command::Links => Ok(match planner.navigation_links() {
            Some(links) => format!(
                "Google Maps: {}\nApple Maps:  {}\nWaze:        {}",
                links.google_maps, links.apple_maps, links.waze
            ),
            None => "Please add some appointments first".to_string(),
        }),
        Command::Route => {
            let geometry = planner.route_geometry();
            if geometry.is_empty() {
                return Ok("No route calculated yet. Run optimize first.".to_string());
            }
            Ok(geometry.to_geojson().to_string())
        }
        Command::Location => {
            let status = planner.refresh_location().await;
            Ok(render_location(status, planner))
        }
    }
}

fn render_location(status: LocationStatus, planner: &RoutePlanner) -> String {
    let start = planner.start_location();
    format!("{} ({:.4}, {:.4})", status.label(), start.lat, start.lng)
}

pub fn render_overview(planner: &RoutePlanner) -> String {
    let mut out = render_appointments(&planner.appointments());
    let _ = write!(out, "\n{}", render_location(planner.location_status(), planner));
    if let Some(summary) = planner.route_summary() {
        let _ = write!(out, "\n{}", render_summary(&summary));
    }
    out
}

pub fn render_appointments(appointments: &[Appointment]) -> String {
    if appointments.is_empty() {
        return "Appointments (0)\n  No appointments added yet.".to_string();
    }
    let mut out = format!("Appointments ({})", appointments.len());
    for (i, appointment) in appointments.iter().enumerate() {
        let _ = write!(out, "\n  {}. {}  [id {}]", i + 1, appointment.address, appointment.id);
    }
    out
}

pub fn render_summary(summary: &RouteSummary) -> String {
    format!("Route: {} total, {}", summary.time_text(), summary.distance_text())
}

/// Read-eval loop; failures are reported and the session continues
pub async fn run_shell(planner: &RoutePlanner) -> Result<()> {
    let mut input = StdinInput::new();
    println!(
        "barkle-gps shell (geocoder: {}, routing: {}). Type 'help' for commands, 'quit' to leave.",
        planner.geocoder_name(),
        planner.router_name()
    );
    println!("{}", render_overview(planner));

    while let Some(line) = input.read_line("> ").await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            _ => {}
        }

        let command = match parse_shell_line(line) {
            Ok(Command::Shell) => continue,
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match execute(planner, &command, &mut input).await {
            Ok(text) => println!("{}", text),
            Err(e) => {
                tracing::debug!("Command {:?} failed: {}", command, e);
                eprintln!("{}", e.user_message());
            }
        }
    }

    Ok(())
}

/// Parse a shell line with the same grammar as the command line
pub fn parse_shell_line(line: &str) -> std::result::Result<Command, String> {
    let words = std::iter::once("barkle-gps").chain(line.split_whitespace());
    match Cli::try_parse_from(words) {
        Ok(Cli { command: Some(command) }) => Ok(command),
        Ok(Cli { command: None }) => Ok(Command::Shell),
        Err(e) => Err(e.to_string().trim_end().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::SERVICE_CENTER;
    use crate::services::geocoding::MockGeocoder;
    use crate::services::routing::MockRoutingService;
    use crate::services::storage::MemoryStorage;

    struct FixedAnswer(bool);

    #[async_trait]
    impl Prompt for FixedAnswer {
        async fn confirm(&mut self, _question: &str) -> bool {
            self.0
        }
    }

    fn planner() -> RoutePlanner {
        RoutePlanner::new(
            StopListManager::load(Box::new(MemoryStorage::new())),
            Box::new(MockGeocoder::new(SERVICE_CENTER)),
            Box::new(MockRoutingService::new()),
            SERVICE_CENTER,
        )
        .with_service_area(ServiceArea::new(SERVICE_CENTER, "Kidd's Beach", 100.0))
    }

    fn add(words: &str) -> Command {
        Command::Add { address: words.split(' ').map(str::to_string).collect() }
    }

    #[test]
    fn test_render_empty_list() {
        assert_eq!(
            render_appointments(&[]),
            "Appointments (0)\n  No appointments added yet."
        );
    }

    #[test]
    fn test_render_numbered_list() {
        let appointments = vec![
            Appointment { id: 1, address: "A".to_string(), lat: 0.0, lng: 0.0 },
            Appointment { id: 2, address: "B".to_string(), lat: 0.0, lng: 0.0 },
        ];
        assert_eq!(
            render_appointments(&appointments),
            "Appointments (2)\n  1. A  [id 1]\n  2. B  [id 2]"
        );
    }

    #[test]
    fn test_parse_shell_line() {
        assert_eq!(parse_shell_line("move 2 1"), Ok(Command::Move { from: 2, to: 1 }));
        assert_eq!(parse_shell_line("optimize"), Ok(Command::Optimize));
        assert!(parse_shell_line("fly").is_err());
    }

    #[tokio::test]
    async fn test_execute_add_and_move() {
        let planner = planner();
        let mut prompt = FixedAnswer(false);

        execute(&planner, &add("1 Beach Rd"), &mut prompt).await.unwrap();
        execute(&planner, &add("2 Hill St"), &mut prompt).await.unwrap();
        let text = execute(&planner, &Command::Move { from: 2, to: 1 }, &mut prompt).await.unwrap();

        assert!(text.contains("1. 2 Hill St (mock)"));
        assert!(text.contains("2. 1 Beach Rd (mock)"));
    }

    #[tokio::test]
    async fn test_execute_move_out_of_range() {
        let planner = planner();
        let mut prompt = FixedAnswer(false);
        execute(&planner, &add("1 Beach Rd"), &mut prompt).await.unwrap();

        let err = execute(&planner, &Command::Move { from: 1, to: 5 }, &mut prompt).await.unwrap_err();
        assert!(matches!(err, PlannerError::InvalidIndex { index: 4, len: 1 }));
    }

    #[tokio::test]
    async fn test_execute_clear_respects_prompt() {
        let planner = planner();
        execute(&planner, &add("1 Beach Rd"), &mut FixedAnswer(false)).await.unwrap();

        let text = execute(&planner, &Command::Clear { yes: false }, &mut FixedAnswer(false)).await.unwrap();
        assert_eq!(text, "Nothing cleared.");
        assert_eq!(planner.appointment_count(), 1);

        let text = execute(&planner, &Command::Clear { yes: false }, &mut FixedAnswer(true)).await.unwrap();
        assert_eq!(text, "All appointments cleared.");
        assert_eq!(planner.appointment_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_optimize_shows_summary() {
        let planner = planner();
        let mut prompt = FixedAnswer(false);
        execute(&planner, &add("1 Beach Rd"), &mut prompt).await.unwrap();
        execute(&planner, &add("2 Hill St"), &mut prompt).await.unwrap();

        let text = execute(&planner, &Command::Optimize, &mut prompt).await.unwrap();
        assert!(text.contains("Route: "));
        assert!(text.contains(" km"));
    }

    #[tokio::test]
    async fn test_execute_route_prints_geojson_line() {
        let planner = planner();
        let mut prompt = FixedAnswer(false);

        let text = execute(&planner, &Command::Route, &mut prompt).await.unwrap();
        assert_eq!(text, "No route calculated yet. Run optimize first.");

        execute(&planner, &add("1 Beach Rd"), &mut prompt).await.unwrap();
        execute(&planner, &add("2 Hill St"), &mut prompt).await.unwrap();
        execute(&planner, &Command::Optimize, &mut prompt).await.unwrap();

        let text = execute(&planner, &Command::Route, &mut prompt).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["geometry"]["type"], "LineString");
        // Round trip: start, two stops, back to start
        assert_eq!(json["geometry"]["coordinates"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_execute_links_without_stops() {
        let planner = planner();
        let text = execute(&planner, &Command::Links, &mut FixedAnswer(false)).await.unwrap();
        assert_eq!(text, "Please add some appointments first");
    }

    #[tokio::test]
    async fn test_execute_pick_adds_candidate() {
        let planner = planner();
        let command = Command::Pick { choice: 1, query: vec!["Beacon".to_string(), "Bay".to_string()] };

        let text = execute(&planner, &command, &mut FixedAnswer(false)).await.unwrap();
        assert!(text.contains("Added: Beacon Bay (mock)"));
        assert_eq!(planner.appointment_count(), 1);
    }
}
