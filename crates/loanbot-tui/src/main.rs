use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use loanbot_core::config::SERVER_URL_ENV;
use loanbot_core::download::{download_application_letter, download_sanction_letter};
use loanbot_core::voice::{AudioPlayer, CommandRecognizer, CommandSynthesizer, NoopSynthesizer};
use loanbot_core::{
    AgentBackend, AgentClient, ApplicationDetails, ChatEvent, Config, Conversation,
    ConversationWorker, SpeechSynthesizer, VoiceCapture,
};
use tokio::sync::mpsc;

mod app;
mod handler;
mod tui;
mod ui;

use app::{App, Services};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "loanbot")]
#[command(about = "Chat with the Shivaay home loan assistant from your terminal")]
#[command(version)]
struct Cli {
    /// Base URL of the assistant server
    #[arg(long, global = true, env = SERVER_URL_ENV)]
    server: Option<String>,

    /// Start with text-to-speech turned off
    #[arg(long, global = true)]
    mute: bool,

    /// Where downloaded letters are saved
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat screen (default)
    Chat,
    /// Send one message and print the replies
    Ask {
        /// Your message
        text: String,
        /// Save the sanction letter if one is offered
        #[arg(long)]
        download: bool,
    },
    /// Generate a loan application letter PDF
    ApplicationLetter(ApplicationArgs),
}

#[derive(Args)]
struct ApplicationArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    address: String,
    #[arg(long, default_value = "")]
    city: String,
    #[arg(long, default_value = "Home Loan")]
    loan_type: String,
    #[arg(long, default_value = "")]
    loan_amount: String,
    #[arg(long, default_value = "")]
    loan_purpose: String,
    #[arg(long, default_value = "")]
    income: String,
    #[arg(long, default_value = "")]
    tenure: String,
    #[arg(long, default_value = "")]
    bank_name: String,
}

impl From<ApplicationArgs> for ApplicationDetails {
    fn from(args: ApplicationArgs) -> Self {
        Self {
            name: args.name,
            address: args.address,
            city: args.city,
            loan_type: args.loan_type,
            loan_amount: args.loan_amount,
            loan_purpose: args.loan_purpose,
            income: args.income,
            tenure: args.tenure,
            bank_name: args.bank_name,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Logging disabled: {:#}", e);
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Could not load config, using defaults: {}", e);
        Config::new()
    });
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if cli.mute {
        config.tts_enabled = false;
    }
    if let Some(dir) = cli.download_dir {
        config.download_dir = Some(dir);
    }
    tracing::info!(server = %config.server_url, "Starting loanbot v{}", env!("CARGO_PKG_VERSION"));

    let backend = Arc::new(AgentClient::new(&config.server_url));

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(config, backend).await,
        Commands::Ask { text, download } => {
            let dir = download.then(|| config.resolve_download_dir());
            ask_once(
                backend,
                &text,
                Duration::from_millis(config.action_delay_ms),
                dir.as_deref(),
                &mut io::stdout(),
            )
            .await
        }
        Commands::ApplicationLetter(args) => {
            let dir = config.resolve_download_dir();
            let path = download_application_letter(backend.as_ref(), &dir, &args.into())
                .await
                .context("Could not generate the application letter")?;
            println!("Saved {}", path.display());
            Ok(())
        }
    }
}

/// Log to a file: the chat screen owns the terminal.
fn init_logging() -> Result<()> {
    let dir = dirs::cache_dir()
        .context("Could not determine cache directory")?
        .join("loanbot");
    fs::create_dir_all(&dir)?;
    let file = File::options()
        .create(true)
        .append(true)
        .open(dir.join("loanbot.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("loanbot=info,loanbot_core=info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(())
}

async fn run_chat(config: Config, backend: Arc<AgentClient>) -> Result<()> {
    let mut events = EventHandler::new();

    let (chat_tx, chat_rx) = mpsc::unbounded_channel();
    events.forward_chat(chat_rx);
    let conversation = Conversation::new(backend.clone(), chat_tx)
        .with_action_delay(Duration::from_millis(config.action_delay_ms));

    let voice = config.speech_recognizer.clone().map(|spec| {
        Arc::new(VoiceCapture::new(Arc::new(CommandRecognizer::new(spec))))
    });
    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.speech_synthesizer.clone() {
        Some(spec) => Arc::new(CommandSynthesizer::new(spec)),
        None => Arc::new(NoopSynthesizer),
    };

    let services = Services {
        worker: ConversationWorker::spawn(conversation),
        backend: backend.clone() as Arc<dyn AgentBackend>,
        voice,
        synthesizer,
        player: config.audio_player.clone().map(AudioPlayer::new),
        events: events.sender(),
    };
    let mut app = App::new(
        services,
        config.server_url.clone(),
        config.resolve_download_dir(),
        config.tts_enabled,
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_loop(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}

/// One round trip without the chat screen. Chained actions still run. An
/// offered sanction letter is only fetched when `download_dir` is given.
async fn ask_once<B: AgentBackend + 'static>(
    backend: Arc<B>,
    text: &str,
    action_delay: Duration,
    download_dir: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new(backend.clone(), tx).with_action_delay(action_delay);

    conversation.send_query(text, false).await;
    drop(conversation);

    while let Some(event) = rx.recv().await {
        match event {
            ChatEvent::Assistant { spoken, .. } => writeln!(out, "Shivaay: {}\n", spoken)?,
            ChatEvent::Offer(offer) => {
                writeln!(
                    out,
                    "Sanction offer for {}: INR {} at {}%",
                    offer.name, offer.amount, offer.interest_rate
                )?;
                let Some(dir) = download_dir else {
                    writeln!(out, "Pass --download to save the sanction letter")?;
                    continue;
                };
                match download_sanction_letter(backend.as_ref(), dir, &offer).await {
                    Ok(path) => writeln!(out, "Saved {}", path.display())?,
                    Err(e) => writeln!(out, "PDF generation failed: {}", e)?,
                }
            }
            ChatEvent::Audio(url) => writeln!(out, "Audio reply: {}", url)?,
            ChatEvent::User(_) | ChatEvent::Typing(_) | ChatEvent::Cleared => {}
        }
    }
    Ok(())
}
