pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "renoquote",
    about = "Renoquote operator CLI",
    long_about = "Apply migrations, load tenant price lists, run quotations, and resolve suspense items.",
    after_help = "Examples:\n  renoquote migrate\n  renoquote ingest prices.csv --tenant Homeez\n  renoquote quote transcript.txt --tenant Homeez\n  renoquote resolve Walkway \"Vinyl Flooring\" --tenant Homeez --confirm"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Replace a tenant's price list from a CSV file, creating the tenant if needed")]
    Ingest {
        #[arg(help = "CSV with header Category,Description,Unit,Unit Price[,Code]")]
        path: PathBuf,
        #[arg(long, default_value = "Homeez")]
        tenant: String,
    },
    #[command(about = "Run the quotation pipeline on a transcript file or inline text")]
    Quote {
        #[arg(help = "Path to a transcript file, or the transcript text itself")]
        input: String,
        #[arg(long, default_value = "Homeez")]
        tenant: String,
        #[arg(long, default_value = "CLI User")]
        client_name: String,
    },
    #[command(about = "Record a verified alias from a suspense phrase to a catalog entry")]
    Resolve {
        suspense_text: String,
        #[arg(help = "Catalog entry id, or free text to search the price list")]
        target: String,
        #[arg(long, default_value = "Homeez")]
        tenant: String,
        #[arg(long, help = "Apply the best search match instead of only listing suggestions")]
        confirm: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Ingest { path, tenant } => commands::ingest::run(&path, &tenant),
        Command::Quote { input, tenant, client_name } => {
            commands::quote::run(&input, &tenant, &client_name)
        }
        Command::Resolve { suspense_text, target, tenant, confirm } => {
            commands::resolve::run(&suspense_text, &target, &tenant, confirm)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
