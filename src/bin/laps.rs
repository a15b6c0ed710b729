//! Terminal front end for `laps_client`.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Parser, Subcommand};
use dialoguer::{Input, Password};
use laps_client::{
    ClientOptions, CredentialField, DirectoryClient, JsonSettingsFile, LapsError, LdapDirectory,
    LookupOutcome, PromptRequest, Prompter, UpdateOutcome, SETTINGS_FILE_NAME,
};
use tracing::Level;

/// Look up and expire local administrator passwords managed by LAPS
#[derive(Parser)]
#[command(name = "laps", author, version, about, long_about = None)]
struct Cli {
    /// LDAP server, e.g. `dc.example.com`, `dc.example.com:389` or `ldaps://dc.example.com`
    #[arg(long, global = true)]
    server: Option<String>,

    /// Domain name, e.g. `example.com`
    #[arg(long, global = true)]
    domain: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    /// Settings file [default: ~/.laps-client.json]
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Seconds to wait for the server, per connect and per operation
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// More log output, repeat for more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the LAPS password of a computer and when it expires
    Show { computer: String },
    /// Let the LAPS password of a computer expire at the given date (midnight UTC)
    Expire {
        computer: String,
        /// Defaults to today
        #[arg(long, value_name = "YYYY-MM-DD")]
        at: Option<NaiveDate>,
    },
}

struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&mut self, request: &PromptRequest) -> Option<String> {
        eprintln!("{}", request.message);
        let answer = if request.field.is_secret() {
            Password::new().with_prompt(&request.title).interact()
        } else {
            let mut input = Input::<String>::new().with_prompt(&request.title);
            if let Some(default) = &request.default {
                input = input.default(default.clone());
            }
            input.interact_text()
        };
        answer.ok()
    }

    fn report(&mut self, error: &LapsError) {
        eprintln!("{error}");
    }
}

type Client = DirectoryClient<JsonSettingsFile>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LapsError> {
    let store = match cli.settings {
        Some(path) => JsonSettingsFile::new(path),
        None => JsonSettingsFile::in_home_dir()
            .unwrap_or_else(|| JsonSettingsFile::new(SETTINGS_FILE_NAME)),
    };
    let mut options = ClientOptions::default();
    if let Some(secs) = cli.timeout {
        options.connect_timeout = Duration::from_secs(secs);
        options.operation_timeout = Duration::from_secs(secs);
    }

    let mut prompter = TerminalPrompter;
    let mut client = DirectoryClient::with_directory(store, LdapDirectory::new(options));
    if let Err(e) = client.load_settings() {
        prompter.report(&e);
    }
    for (field, value) in [
        (CredentialField::Server, cli.server),
        (CredentialField::Domain, cli.domain),
        (CredentialField::Username, cli.username),
    ] {
        if let Some(value) = value {
            client.session_mut().set(field, value);
        }
    }

    match cli.command {
        Command::Show { computer } => {
            show(&mut client, &computer, &mut prompter)?;
        }
        Command::Expire { computer, at } => {
            if show(&mut client, &computer, &mut prompter)? {
                let date = at.unwrap_or_else(|| Utc::now().date_naive());
                if let UpdateOutcome::Updated { status, .. } =
                    client.update_current_expiration(&date, &mut prompter)?
                {
                    eprintln!("{status}");
                }
            }
        }
    }
    Ok(())
}

/// Prints the record, returns whether one was found
fn show(
    client: &mut Client,
    computer: &str,
    prompter: &mut TerminalPrompter,
) -> Result<bool, LapsError> {
    match client.lookup(computer, prompter)? {
        LookupOutcome::Found { record, status } => {
            eprintln!("{status}");
            println!("Password: {}", record.password.expose());
            println!("Password Expires: {}", record.expiration);
            Ok(true)
        }
        LookupOutcome::NotFound { status } => {
            eprintln!("{status}");
            Ok(false)
        }
        LookupOutcome::EmptyInput | LookupOutcome::Declined => Ok(false),
    }
}
