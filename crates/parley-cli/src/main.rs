//! Parley CLI - drives the message store from a terminal
//!
//! A thin stand-in for the client UI: every core operation is reachable as
//! a subcommand, against whichever backing store the config (or `--db`)
//! selects.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};

use parley_core::config::{Config, StoreBackend};
use parley_core::directory::User;
use parley_core::identity::Session;
use parley_core::message::{Message, MessageKind};
use parley_core::service::Messenger;

#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about = "Conversation and message store client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file (overrides the configured store)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user
    Register {
        /// First name
        #[arg(long)]
        first: String,
        /// Last name
        #[arg(long)]
        last: String,
        /// Email address
        #[arg(long)]
        email: String,
    },

    /// Check whether an identity is registered
    Exists {
        /// Email address
        email: String,
    },

    /// Search the user directory by name prefix
    Search {
        /// Name prefix (empty lists everyone)
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Send a message, starting a conversation or appending to one
    Send {
        /// Sender email address
        #[arg(long)]
        from: String,
        /// Sender display name
        #[arg(long)]
        from_name: String,
        /// Recipient email address (starts a new conversation)
        #[arg(long, conflicts_with = "conversation")]
        to: Option<String>,
        /// Recipient display name (with --to)
        #[arg(long, requires = "to")]
        to_name: Option<String>,
        /// Existing conversation id (appends to it)
        #[arg(long)]
        conversation: Option<String>,
        /// Message text
        text: String,
    },

    /// List an account's conversations
    Conversations {
        /// Account email address
        email: String,
    },

    /// Read a conversation's full history
    Messages {
        /// Conversation id
        conversation_id: String,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        // One generic failure line for the user, the specific cause beneath
        eprintln!("Something went wrong.");
        match e.downcast_ref::<parley_core::Error>() {
            Some(err) => eprintln!("  [{}] {err}", err.code()),
            None => eprintln!("  {e}"),
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("parley=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(db) = &cli.db {
        config.store.backend = StoreBackend::Sqlite;
        config.store.path = Some(db.clone());
    }
    tracing::debug!(backend = ?config.store.backend, "store configured");

    match cli.command {
        Commands::Register { first, last, email } => {
            let messenger = Messenger::from_config(&config).await?;
            cmd_register(&messenger, &first, &last, &email, cli.quiet).await
        }

        Commands::Exists { email } => {
            let messenger = Messenger::from_config(&config).await?;
            cmd_exists(&messenger, &email).await
        }

        Commands::Search { prefix } => {
            let messenger = Messenger::from_config(&config).await?;
            cmd_search(&messenger, &prefix, cli.format).await
        }

        Commands::Send {
            from,
            from_name,
            to,
            to_name,
            conversation,
            text,
        } => {
            let messenger = Messenger::from_config(&config).await?;
            let session = Session::new(from, from_name);
            cmd_send(
                &messenger,
                &session,
                to.as_deref(),
                to_name.as_deref(),
                conversation.as_deref(),
                &text,
                cli.quiet,
            )
            .await
        }

        Commands::Conversations { email } => {
            let messenger = Messenger::from_config(&config).await?;
            cmd_conversations(&messenger, &email, cli.format).await
        }

        Commands::Messages { conversation_id } => {
            let messenger = Messenger::from_config(&config).await?;
            cmd_messages(&messenger, &conversation_id, cli.format).await
        }

        Commands::Config => cmd_config(&config),
    }
}

async fn cmd_register(
    messenger: &Messenger,
    first: &str,
    last: &str,
    email: &str,
    quiet: bool,
) -> anyhow::Result<()> {
    let user = User::new(first, last, email);
    messenger.create_user(&user).await?;
    if !quiet {
        println!("Registered {} as {}", user.display_name(), user.safe_email());
    }
    Ok(())
}

async fn cmd_exists(messenger: &Messenger, email: &str) -> anyhow::Result<()> {
    if messenger.user_exists(email).await? {
        println!("registered");
    } else {
        println!("not registered");
    }
    Ok(())
}

async fn cmd_search(
    messenger: &Messenger,
    prefix: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let hits = messenger.search_users(prefix).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
        OutputFormat::Text => {
            for entry in &hits {
                println!("{}  <{}>", entry.name, entry.email);
            }
            println!("{} match(es)", hits.len());
        }
    }
    Ok(())
}

async fn cmd_send(
    messenger: &Messenger,
    session: &Session,
    to: Option<&str>,
    to_name: Option<&str>,
    conversation: Option<&str>,
    text: &str,
    quiet: bool,
) -> anyhow::Result<()> {
    let kind = MessageKind::Text(text.to_string());

    match (conversation, to) {
        (Some(conversation_id), _) => {
            // Appending: the peer identity comes from the stored summary
            let peer = messenger
                .list_conversations(&session.email_address)
                .await?
                .into_iter()
                .find(|c| c.id == conversation_id)
                .ok_or_else(|| {
                    parley_core::Error::NotFound(format!("conversation {conversation_id}"))
                })?
                .other_user_email;

            let message = Message::outgoing(session, &peer, kind, Utc::now());
            messenger
                .append_message(session, conversation_id, &message)
                .await?;
            if !quiet {
                println!("Sent {} to {conversation_id}", message.id);
            }
        }
        (None, Some(peer)) => {
            let peer_name = to_name.unwrap_or(peer);
            let message = Message::outgoing(session, peer, kind, Utc::now());
            let conversation_id = messenger
                .create_conversation(session, peer, peer_name, &message)
                .await?;
            if !quiet {
                println!("Started {conversation_id}");
            }
        }
        (None, None) => {
            anyhow::bail!("either --to or --conversation is required");
        }
    }
    Ok(())
}

async fn cmd_conversations(
    messenger: &Messenger,
    email: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let conversations = messenger.list_conversations(email).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&conversations)?),
        OutputFormat::Text => {
            for c in &conversations {
                let marker = if c.latest_message.is_read { " " } else { "*" };
                println!(
                    "{marker} {}  {}  {}: {}",
                    c.id, c.name, c.latest_message.date, c.latest_message.text
                );
            }
        }
    }
    Ok(())
}

async fn cmd_messages(
    messenger: &Messenger,
    conversation_id: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let messages = messenger.read_conversation(conversation_id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&messages)?),
        OutputFormat::Text => {
            for m in &messages {
                println!("[{}] {}: {}", m.sent_date, m.sender_email, m.kind.content());
            }
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    println!("backend: {:?}", config.store.backend);
    if let Some(path) = &config.store.path {
        println!("path: {}", path.display());
    }
    if let Some(endpoint) = &config.store.endpoint {
        println!("endpoint: {endpoint}");
    }
    println!("timeout_secs: {}", config.store.timeout_secs);
    Ok(())
}
