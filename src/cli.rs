//! CLI argument parsing for the barkle-gps binary.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "barkle-gps", about = "Plan appointment routes and open them in a navigation app")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive session (default if no subcommand given)
    Shell,
    /// Show the appointments in visiting order
    List,
    /// Geocode an address and add it as the last stop
    Add {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        address: Vec<String>,
    },
    /// Show address candidates; add one with `pick <n> <query..>`
    Suggest {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Add the n-th candidate `suggest` returns for the query
    Pick {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        choice: u32,
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Delete an appointment by id
    Remove { id: i64 },
    /// Move the stop at position FROM to position TO (1-based, as listed)
    Move {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        from: u32,
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        to: u32,
    },
    /// Let the routing service pick the best visiting order
    Optimize,
    /// Delete all appointments
    Clear {
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Print navigation app links for the current order
    Links,
    /// Print the last calculated route line as GeoJSON
    Route,
    /// Look up the device location again and show the status
    Location,
}
