//! Bulk Sender CLI
//!
//! Sends a personalized WhatsApp message to a selection of contacts.
//!
//! Usage:
//!   bulk-sender wizard                       # Guided, step by step
//!   bulk-sender preview --contacts c.csv --rows 2-40 --template "Hi {Name}!"
//!   bulk-sender send --contacts c.csv --rows 2-40 --phone Phone
//!   bulk-sender steps                        # Show the wizard steps
//!   bulk-sender config set col_phone Cellulare

use anyhow::{bail, Context, Result};
use bulk_sender::chat::{download_contacts, open_tab};
use bulk_sender::{
    steps, BatchOptions, BatchReport, ChatTransport, ColumnSpec, ConfigKey, ConfigStore,
    DownloadLabels, FaultPolicy, LogSink, StepId, Template, TransportError, WebDriverSession,
    Wizard,
};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

mod duration_parser;
mod interrupt;
mod logging;
mod prompt;

use duration_parser::parse_duration;
use interrupt::Interrupts;
use prompt::Prompt;

const PROFILE_DIR: &str = "profile";
const IMPLICIT_WAIT_MS: u64 = 5000;

#[derive(Parser)]
#[command(name = "bulk-sender", version)]
#[command(about = "Personalized bulk messages through WhatsApp Web")]
struct Cli {
    /// Configuration file (defaults to the user configuration directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through download, login, load, select and send interactively
    Wizard,
    /// Render every selected message without sending anything
    Preview(SelectionArgs),
    /// Send the messages through a browser driven over WebDriver
    Send(SendArgs),
    /// List the wizard steps with their inputs and outputs
    Steps,
    /// Show or change stored preferences
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print every setting
    Show,
    /// Print one setting
    Get { key: String },
    /// Store a setting
    Set { key: String, value: String },
}

#[derive(Args, Debug)]
struct SelectionArgs {
    /// CSV file with a header row
    #[arg(long)]
    contacts: PathBuf,

    /// Rows to message, e.g. "2-40,45"
    #[arg(long)]
    rows: String,

    /// Phone column (defaults to the stored col_phone)
    #[arg(long)]
    phone: Option<String>,

    /// Name column, capitalized before rendering
    #[arg(long)]
    name: Option<String>,

    /// Surname column, capitalized before rendering
    #[arg(long)]
    surname: Option<String>,

    /// Message template with {Column} placeholders
    #[arg(long, conflicts_with = "template_file")]
    template: Option<String>,

    /// Read the template from a file
    #[arg(long)]
    template_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SendArgs {
    #[command(flatten)]
    selection: SelectionArgs,

    /// WebDriver endpoint (defaults to the stored webdriver_url)
    #[arg(long)]
    webdriver: Option<String>,

    /// Chat client address (defaults to the stored whatsapp_url)
    #[arg(long)]
    whatsapp_url: Option<String>,

    /// Delay between UI actions, e.g. 500ms or 1s
    #[arg(long)]
    pace: Option<String>,

    /// End the batch at the first transport fault
    #[arg(long)]
    stop_on_fault: bool,

    /// Do not ask for confirmation
    #[arg(long, short)]
    yes: bool,
}

/// Prints operator log lines the way the log panel shows them.
struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn emit(&self, line: &str) {
        println!("> {line}");
        info!(target: bulk_sender::log_sink::LOG_TARGET, "{line}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging()?;

    let mut config = match &cli.config {
        Some(path) => ConfigStore::open(path),
        None => ConfigStore::open_default(),
    }
    .context("Failed to load configuration")?;
    info!("Using configuration at {:?}", config.path());

    match cli.command {
        Commands::Wizard => run_wizard(&mut config, &Interrupts::install()).await,
        Commands::Preview(args) => run_preview(&config, &args),
        Commands::Send(args) => run_send(&config, &args, &Interrupts::install()).await,
        Commands::Steps => {
            print_steps();
            Ok(())
        }
        Commands::Config { action } => run_config(&mut config, action),
    }
}

fn print_steps() {
    for (index, step) in steps().iter().enumerate() {
        println!("{}. {}", index + 1, step.title);
        println!("   {}", step.description);
        if !step.inputs.is_empty() {
            println!("   inputs:    {}", step.inputs.join(", "));
        }
        if !step.requires.is_empty() {
            let requires: Vec<_> = step.requires.iter().map(|p| p.as_str()).collect();
            println!("   requires:  {}", requires.join(", "));
        }
        if !step.publishes.is_empty() {
            let publishes: Vec<_> = step.publishes.iter().map(|p| p.as_str()).collect();
            println!("   publishes: {}", publishes.join(", "));
        }
    }
}

fn run_config(config: &mut ConfigStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", config.path().display());
            for (key, value) in config.entries() {
                println!("{key} = {}", serde_json::to_string(&value)?);
            }
        }
        ConfigAction::Get { key } => println!("{}", config.get(&key)),
        ConfigAction::Set { key, value } => {
            if ConfigKey::parse(&key).is_none() {
                warn!("'{}' is not a known setting; storing it anyway", key);
            }
            config
                .set(&key, value)
                .with_context(|| format!("Failed to store '{key}'"))?;
        }
    }
    Ok(())
}

fn column_specs(args: &SelectionArgs, config: &ConfigStore) -> (Vec<ColumnSpec>, String) {
    // Name columns come from the stored settings only when the operator set them.
    let stored = |key: ConfigKey| {
        Some(config.get(key)).filter(|value| config.is_set(key) && !value.is_empty())
    };

    let mut columns = Vec::new();
    if let Some(name) = args.name.clone().or_else(|| stored(ConfigKey::ColName)) {
        columns.push(ColumnSpec::name(name));
    }
    if let Some(surname) = args.surname.clone().or_else(|| stored(ConfigKey::ColSurname)) {
        columns.push(ColumnSpec::name(surname));
    }
    let phone = args
        .phone
        .clone()
        .unwrap_or_else(|| config.get(ConfigKey::ColPhone));
    columns.push(ColumnSpec::phone(phone.clone()));
    (columns, phone)
}

fn template_text(args: &SelectionArgs, config: &ConfigStore) -> Result<String> {
    if let Some(path) = &args.template_file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()));
    }
    Ok(args
        .template
        .clone()
        .unwrap_or_else(|| config.get(ConfigKey::Template)))
}

/// Loads and selects contacts; returns the wizard, the template and the phone column.
fn prepare(args: &SelectionArgs, config: &ConfigStore) -> Result<(Wizard<ConsoleSink>, String, String)> {
    let mut wizard = Wizard::new(ConsoleSink);
    let bytes = fs::read(&args.contacts)
        .with_context(|| format!("Failed to read {}", args.contacts.display()))?;
    wizard.load_csv(&bytes)?;

    let (columns, phone) = column_specs(args, config);
    wizard.select(&args.rows, &columns)?;

    let template = template_text(args, config)?;
    Ok((wizard, template, phone))
}

/// Renders every selected message, returning how many rendered cleanly.
fn print_preview<L: LogSink>(wizard: &Wizard<L>, template: &str) -> Result<usize> {
    let Some(selected) = wizard.selected() else {
        bail!("Nothing selected");
    };
    let template = Template::parse(template).context("Invalid template")?;

    let mut ok = 0;
    for row in selected.rows() {
        let number = row.first().cloned().flatten().unwrap_or_default();
        match template.render(selected.head(), row) {
            Ok(text) => {
                ok += 1;
                println!("[{number}] {text}");
            }
            Err(e) => println!("[{number}] !! {e}"),
        }
    }
    println!("{} of {} messages rendered", ok, selected.len());
    Ok(ok)
}

fn run_preview(config: &ConfigStore, args: &SelectionArgs) -> Result<()> {
    let (wizard, template, _) = prepare(args, config)?;
    print_preview(&wizard, &template)?;
    Ok(())
}

async fn start_browser(endpoint: &str) -> Result<WebDriverSession> {
    let capabilities = WebDriverSession::chrome_capabilities(PROFILE_DIR, false);
    let session = WebDriverSession::start(endpoint, capabilities)
        .await
        .with_context(|| format!("Could not start a browser through {endpoint}. Is chromedriver running?"))?;
    session.set_implicit_wait(IMPLICIT_WAIT_MS).await?;
    Ok(session)
}

async fn send_with_session<L: LogSink>(
    wizard: &Wizard<L>,
    session: &WebDriverSession,
    template: &str,
    phone: &str,
    pace: Duration,
    fault_policy: FaultPolicy,
    interrupts: &Interrupts,
) -> Result<BatchReport> {
    let Some(tab) = wizard.messaging_tab().cloned() else {
        bail!("WhatsApp Web is not open");
    };
    let transport = ChatTransport::new(session).with_tab(tab).with_pace(pace);
    transport.focus().await?;

    let batch = interrupts.batch();
    let options = BatchOptions {
        fault_policy,
        context: batch.context(),
    };
    let report = wizard.send_batch(template, phone, &transport, options).await?;
    Ok(report)
}

fn print_report(report: &BatchReport) {
    println!(
        "Delivered: {}, failed: {}, skipped: {} (of {})",
        report.delivered, report.failed, report.skipped, report.total
    );
    let unprocessed = report.total - report.processed();
    if report.cancelled() {
        println!("The batch was cancelled; {unprocessed} contacts were not processed.");
    } else if report.aborted() {
        println!("The batch stopped at a transport fault; {unprocessed} contacts were not processed.");
    }
}

async fn run_send(config: &ConfigStore, args: &SendArgs, interrupts: &Interrupts) -> Result<()> {
    let (mut wizard, template, phone) = prepare(&args.selection, config)?;
    let rendered = print_preview(&wizard, &template)?;
    if rendered == 0 {
        bail!("No message could be rendered");
    }

    let pace = match &args.pace {
        Some(pace) => parse_duration(pace)?,
        None => parse_duration(&config.get(ConfigKey::PaceMs)).context("Invalid pace_ms setting")?,
    };
    let fault_policy = if args.stop_on_fault {
        FaultPolicy::Abort
    } else {
        FaultPolicy::Continue
    };

    let mut prompt = Prompt::stdin();
    if !args.yes && !prompt.confirm("Send these messages?", false)? {
        println!("Nothing sent.");
        return Ok(());
    }

    let endpoint = args
        .webdriver
        .clone()
        .unwrap_or_else(|| config.get(ConfigKey::WebdriverUrl));
    let whatsapp_url = args
        .whatsapp_url
        .clone()
        .unwrap_or_else(|| config.get(ConfigKey::WhatsappUrl));

    let session = start_browser(&endpoint).await?;
    let result = login_and_send(
        &mut wizard,
        &mut prompt,
        &session,
        &whatsapp_url,
        args.yes,
        (&template, &phone),
        pace,
        fault_policy,
        interrupts,
    )
    .await;

    if let Err(e) = session.quit().await {
        warn!("Failed to close the browser: {}", e);
    }
    print_report(&result?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn login_and_send<R: std::io::BufRead>(
    wizard: &mut Wizard<ConsoleSink>,
    prompt: &mut Prompt<R>,
    session: &WebDriverSession,
    whatsapp_url: &str,
    assume_logged_in: bool,
    (template, phone): (&str, &str),
    pace: Duration,
    fault_policy: FaultPolicy,
    interrupts: &Interrupts,
) -> Result<BatchReport> {
    wizard.record_tab(open_tab(session, whatsapp_url).await?);
    if !assume_logged_in {
        prompt.pause("Log in to WhatsApp Web if needed, then press Enter...")?;
    }
    send_with_session(wizard, session, template, phone, pace, fault_policy, interrupts).await
}

async fn run_wizard(config: &mut ConfigStore, interrupts: &Interrupts) -> Result<()> {
    let mut prompt = Prompt::stdin();
    let mut wizard = Wizard::new(ConsoleSink);

    let endpoint = prompt.ask("WebDriver endpoint", &config.get(ConfigKey::WebdriverUrl))?;
    config.set(ConfigKey::WebdriverUrl, endpoint.clone())?;
    let session = start_browser(&endpoint).await?;

    let result = wizard_steps(config, &mut prompt, &mut wizard, &session, interrupts).await;
    if let Err(e) = session.quit().await {
        warn!("Failed to close the browser: {}", e);
    }
    result
}

/// A failed download leaves the step open; contacts can still be loaded by hand.
fn record_download<L: LogSink>(wizard: &mut Wizard<L>, downloaded: Result<(), TransportError>) {
    match downloaded {
        Ok(()) => wizard.mark_contacts_downloaded(),
        Err(e) => {
            warn!("Contacts download failed: {}", e);
            wizard.sink().emit(&format!("Download failed: {e}"));
        }
    }
}

fn step_header(step: StepId) {
    let descriptor = step.descriptor();
    println!("\n== {} ==\n{}", descriptor.title, descriptor.description);
}

async fn wizard_steps<R: std::io::BufRead>(
    config: &mut ConfigStore,
    prompt: &mut Prompt<R>,
    wizard: &mut Wizard<ConsoleSink>,
    session: &WebDriverSession,
    interrupts: &Interrupts,
) -> Result<()> {
    step_header(StepId::DownloadContacts);
    if prompt.confirm("Download the contacts from Google Sheets?", false)? {
        let url = prompt.ask_required("Spreadsheet URL", &config.get(ConfigKey::ContactsUrl))?;
        let labels = DownloadLabels {
            file: prompt.ask("'File' menu label", &config.get(ConfigKey::ButtonFile))?,
            download: prompt.ask("'Download' menu label", &config.get(ConfigKey::ButtonDownload))?,
            extension: prompt.ask("CSV entry label", &config.get(ConfigKey::ButtonExtension))?,
        };
        config.update([
            (ConfigKey::ContactsUrl, url.clone()),
            (ConfigKey::ButtonFile, labels.file.clone()),
            (ConfigKey::ButtonDownload, labels.download.clone()),
            (ConfigKey::ButtonExtension, labels.extension.clone()),
        ])?;
        let downloaded = download_contacts(session, &url, &labels, Duration::from_secs(1)).await;
        record_download(wizard, downloaded);
    }

    step_header(StepId::MessagingLogin);
    let whatsapp_url = prompt.ask("WhatsApp Web address", &config.get(ConfigKey::WhatsappUrl))?;
    config.set(ConfigKey::WhatsappUrl, whatsapp_url.clone())?;
    wizard.record_tab(open_tab(session, &whatsapp_url).await?);
    prompt.pause("Log in to WhatsApp Web if needed, then press Enter...")?;

    step_header(StepId::LoadContacts);
    loop {
        let path = prompt.ask_required("Contacts CSV file", "")?;
        match fs::read(&path) {
            Ok(bytes) => {
                if let Ok(table) = wizard.load_csv(&bytes) {
                    println!("{} contacts, columns: {}", table.len(), table.head()[1..].join(", "));
                    break;
                }
            }
            Err(e) => println!("Cannot read {path}: {e}"),
        }
    }

    step_header(StepId::SelectContacts);
    let phone = loop {
        let rows = prompt.ask_required("Rows to message (e.g. 2-40,45)", "")?;
        let name = prompt.ask("Name column", &config.get(ConfigKey::ColName))?;
        let surname = prompt.ask("Surname column", &config.get(ConfigKey::ColSurname))?;
        let phone = prompt.ask_required("Phone column", &config.get(ConfigKey::ColPhone))?;

        let mut columns = Vec::new();
        if !name.is_empty() {
            columns.push(ColumnSpec::name(&name));
        }
        if !surname.is_empty() {
            columns.push(ColumnSpec::name(&surname));
        }
        columns.push(ColumnSpec::phone(&phone));

        if let Ok(selected) = wizard.select(&rows, &columns) {
            println!("{} contacts selected", selected.len());
            config.update([
                (ConfigKey::ColName, name),
                (ConfigKey::ColSurname, surname),
                (ConfigKey::ColPhone, phone.clone()),
            ])?;
            break phone;
        }
    };

    step_header(StepId::SendMessages);
    let pace = parse_duration(&config.get(ConfigKey::PaceMs)).context("Invalid pace_ms setting")?;
    loop {
        let template = prompt.ask_required("Message", &config.get(ConfigKey::Template))?;
        config.set(ConfigKey::Template, template.clone())?;
        if print_preview(wizard, &template)? == 0 {
            continue;
        }
        if !prompt.confirm("Send these messages?", false)? {
            continue;
        }
        let report = send_with_session(
            wizard,
            session,
            &template,
            &phone,
            pace,
            FaultPolicy::Continue,
            interrupts,
        )
        .await?;
        print_report(&report);
        if !prompt.confirm("Send another message to the same contacts?", false)? {
            return Ok(());
        }
    }
}
