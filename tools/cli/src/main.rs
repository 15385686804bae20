//! CirrusDrive CLI - interactive OneDrive file management.
//!
//! This tool runs the OAuth2 login flow against the Microsoft identity
//! platform, then drops into an interactive shell for navigating the drive
//! and moving files in and out of it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cirrusdrive_common::Error as CoreError;
use cirrusdrive_graph::{AuthConfig, AuthManager, GraphClient, HttpTransport, TokenStore};
use cirrusdrive_session::{DirectoryEntry, DriveSession};

type CoreResult<T> = cirrusdrive_common::Result<T>;

const CLIENT_ID_ENV: &str = "CIRRUSDRIVE_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "CIRRUSDRIVE_CLIENT_SECRET";

#[derive(Parser)]
#[command(name = "cirrusdrive")]
#[command(about = "CirrusDrive - OneDrive file management")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate and start an interactive browse session.
    Login {
        /// Application (client) id; falls back to CIRRUSDRIVE_CLIENT_ID.
        #[arg(long)]
        client_id: Option<String>,

        /// Client secret; falls back to CIRRUSDRIVE_CLIENT_SECRET.
        #[arg(long)]
        client_secret: Option<String>,

        /// OAuth2 redirect URL registered for the application.
        #[arg(long)]
        redirect_url: Option<String>,

        /// Identity authority, e.g. a tenant-specific endpoint.
        #[arg(long)]
        authority: Option<String>,

        /// Do not try to open the authorization URL in a browser.
        #[arg(long)]
        no_browser: bool,
    },

    /// Print the authorization URL without starting a session.
    AuthUrl {
        /// Application (client) id; falls back to CIRRUSDRIVE_CLIENT_ID.
        #[arg(long)]
        client_id: Option<String>,

        /// Client secret; falls back to CIRRUSDRIVE_CLIENT_SECRET.
        #[arg(long)]
        client_secret: Option<String>,

        /// OAuth2 redirect URL registered for the application.
        #[arg(long)]
        redirect_url: Option<String>,

        /// Identity authority, e.g. a tenant-specific endpoint.
        #[arg(long)]
        authority: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Login {
            client_id,
            client_secret,
            redirect_url,
            authority,
            no_browser,
        } => {
            let config = build_auth_config(client_id, client_secret, redirect_url, authority)?;
            cmd_login(config, no_browser).await
        }

        Commands::AuthUrl {
            client_id,
            client_secret,
            redirect_url,
            authority,
        } => {
            let config = build_auth_config(client_id, client_secret, redirect_url, authority)?;
            cmd_auth_url(config)
        }
    }
}

/// Assemble the OAuth2 configuration from flags and environment.
fn build_auth_config(
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: Option<String>,
    authority: Option<String>,
) -> Result<AuthConfig> {
    let client_id = client_id
        .or_else(|| std::env::var(CLIENT_ID_ENV).ok())
        .with_context(|| format!("Client id missing: pass --client-id or set {}", CLIENT_ID_ENV))?;

    let client_secret = client_secret
        .or_else(|| std::env::var(CLIENT_SECRET_ENV).ok())
        .with_context(|| {
            format!(
                "Client secret missing: pass --client-secret or set {}",
                CLIENT_SECRET_ENV
            )
        })?;

    let mut config = AuthConfig {
        client_id,
        client_secret,
        ..AuthConfig::default()
    };

    if let Some(redirect_url) = redirect_url {
        config.redirect_url = redirect_url;
    }
    if let Some(authority) = authority {
        config.authority = authority;
    }

    Ok(config)
}

/// Print the authorization URL.
fn cmd_auth_url(config: AuthConfig) -> Result<()> {
    let auth = AuthManager::new(config).context("Invalid OAuth2 configuration")?;
    let (url, _state) = auth.authorization_url();
    println!("{}", url);
    Ok(())
}

/// Run the login flow, then the interactive browse loop.
async fn cmd_login(config: AuthConfig, no_browser: bool) -> Result<()> {
    let auth = AuthManager::new(config).context("Invalid OAuth2 configuration")?;
    let (auth_url, _state) = auth.authorization_url();

    println!("Sign in with your Microsoft account:");
    println!("  {}", auth_url);
    if !no_browser && open::that(&auth_url).is_ok() {
        println!("(opened in your browser)");
    }

    let code = prompt_line("Paste the code from the redirect URL: ")?
        .context("No authorization code entered")?;
    if code.is_empty() {
        anyhow::bail!("No authorization code entered");
    }

    let tokens = auth
        .exchange_code(&code)
        .await
        .context("Authentication failed")?;
    info!("Authentication complete");

    let store = Arc::new(TokenStore::new(Box::new(auth), tokens));
    let client = GraphClient::new(Arc::new(HttpTransport::new()), store);
    let mut session = DriveSession::new(client);

    browse(&mut session).await
}

/// What the loop should do after a command.
enum Outcome {
    /// Keep the current view.
    Stay,
    /// Re-fetch and re-render the listing.
    Render,
    /// End the session.
    Quit,
}

/// Interactive browse loop. Re-renders the current location and listing
/// after every navigation or mutating operation; failures are printed as
/// status messages, and fatal authentication failures end the session.
async fn browse(session: &mut DriveSession) -> Result<()> {
    println!("Type 'help' for the command list.");

    let mut view = match render(session).await {
        Ok(entries) => entries,
        Err(err) => {
            report(&err);
            return Ok(());
        }
    };

    loop {
        let Some(line) = prompt_line(&format!("{}> ", session.current_path()))? else {
            break;
        };
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();

        let action: CoreResult<Outcome> = match command {
            "help" => {
                print_help();
                Ok(Outcome::Stay)
            }

            "quit" | "exit" => Ok(Outcome::Quit),

            "pwd" => {
                println!("{}", session.current_path());
                Ok(Outcome::Stay)
            }

            "ls" => Ok(Outcome::Render),

            "cd" => match args.first() {
                None => {
                    println!("Usage: cd <index>");
                    Ok(Outcome::Stay)
                }
                Some(arg) => match resolve(&view, arg).cloned() {
                    None => {
                        println!("No entry '{}' in the current listing", arg);
                        Ok(Outcome::Stay)
                    }
                    Some(entry) => session.enter_folder(&entry).map(|_| Outcome::Render),
                },
            },

            "back" => {
                session.go_back();
                Ok(Outcome::Render)
            }

            "root" => {
                session.reset_to_root();
                Ok(Outcome::Render)
            }

            "mkdir" => {
                if args.is_empty() {
                    println!("Usage: mkdir <name>");
                    Ok(Outcome::Stay)
                } else {
                    let name = args.join(" ");
                    session.create_folder(&name).await.map(|created| {
                        println!("Created folder: {}", created.name);
                        Outcome::Render
                    })
                }
            }

            "rm" => match args.first() {
                None => {
                    println!("Usage: rm <index|id>");
                    Ok(Outcome::Stay)
                }
                Some(arg) => {
                    let id = target_id(&view, arg);
                    session.delete_item(&id).await.map(|_| {
                        println!("Deleted.");
                        Outcome::Render
                    })
                }
            },

            "put" => match args.first() {
                None => {
                    println!("Usage: put <local-path>");
                    Ok(Outcome::Stay)
                }
                Some(path) => upload_local(session, Path::new(path)).await,
            },

            "get" => match args.first() {
                None => {
                    println!("Usage: get <index|id> [local-path]");
                    Ok(Outcome::Stay)
                }
                Some(arg) => {
                    let entry = resolve(&view, arg).cloned();
                    let id = entry
                        .as_ref()
                        .map(|e| e.id.clone())
                        .unwrap_or_else(|| arg.to_string());
                    let dest = args
                        .get(1)
                        .map(PathBuf::from)
                        .or_else(|| entry.as_ref().map(|e| PathBuf::from(&e.name)));

                    match dest {
                        None => {
                            println!("Usage: get <index|id> <local-path>");
                            Ok(Outcome::Stay)
                        }
                        Some(dest) => download_to(session, &id, &dest).await,
                    }
                }
            },

            other => {
                println!("Unknown command: {} (try 'help')", other);
                Ok(Outcome::Stay)
            }
        };

        match action {
            Ok(Outcome::Stay) => {}
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Render) => match render(session).await {
                Ok(entries) => view = entries,
                Err(err) => {
                    if report(&err) {
                        break;
                    }
                }
            },
            Err(err) => {
                if report(&err) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Fetch and print the current location and listing; the printed indices
/// are what `cd`, `rm`, and `get` resolve against.
async fn render(session: &DriveSession) -> CoreResult<Vec<DirectoryEntry>> {
    let entries = session.list_current().await?;

    println!();
    println!("{}", session.current_path());
    if entries.is_empty() {
        println!("  (empty)");
    } else {
        for (index, entry) in entries.iter().enumerate() {
            let marker = if entry.is_folder { "[DIR] " } else { "[FILE]" };
            let size = entry
                .size
                .map(|s| format!("  {} bytes", s))
                .unwrap_or_default();
            println!("  {:>3}  {} {}{}", index, marker, entry.name, size);
        }
    }

    Ok(entries)
}

/// Upload a local file into the current folder.
async fn upload_local(session: &DriveSession, path: &Path) -> CoreResult<Outcome> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CoreError::InvalidInput(format!("Invalid file name: {}", path.display())))?;

    let data = tokio::fs::read(path).await?;
    let uploaded = session.upload_file(data, filename).await?;
    println!("Uploaded: {}", uploaded.name);

    Ok(Outcome::Render)
}

/// Download an item's content to a local file.
async fn download_to(session: &DriveSession, item_id: &str, dest: &Path) -> CoreResult<Outcome> {
    let content = session.download_file(item_id).await?;
    tokio::fs::write(dest, &content).await?;
    println!("Saved {} bytes to {}", content.len(), dest.display());

    Ok(Outcome::Stay)
}

/// Resolve a command argument as an index into the current listing.
fn resolve<'a>(view: &'a [DirectoryEntry], arg: &str) -> Option<&'a DirectoryEntry> {
    arg.parse::<usize>().ok().and_then(|index| view.get(index))
}

/// Resolve a command argument to an item id: an index into the current
/// listing, or a raw id for items outside it.
fn target_id(view: &[DirectoryEntry], arg: &str) -> String {
    match resolve(view, arg) {
        Some(entry) => entry.id.clone(),
        None => arg.to_string(),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  ls                      refresh the current listing");
    println!("  cd <index>              enter the folder at that listing index");
    println!("  back                    go up one level");
    println!("  root                    jump back to the drive root");
    println!("  pwd                     print the current location");
    println!("  mkdir <name>            create a folder here");
    println!("  rm <index|id>           delete an item");
    println!("  put <local-path>        upload a local file here");
    println!("  get <index|id> [path]   download an item");
    println!("  quit                    end the session");
}

/// Read one trimmed line from stdin; None on end of input.
fn prompt_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    let read = io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    if read == 0 {
        return Ok(None);
    }

    Ok(Some(line.trim().to_string()))
}

/// Print a failure as a status line. Returns true when the session is no
/// longer usable and the loop should end.
fn report(err: &CoreError) -> bool {
    if err.requires_reauth() {
        println!("Session expired: {}", err);
        println!("Run 'cirrusdrive login' to authenticate again.");
        true
    } else {
        println!("Error: {}", err);
        false
    }
}
