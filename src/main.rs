//! Nibiru CLI - learning-hub page summarisation
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use nibiru::message::{SummarizeRequest, UrlSource, API_KEY_NOT_SET};
use nibiru::render::{banner, render_markdown};
use nibiru::scraper::fetch_content;
use nibiru::storage::{StoredSummary, Theme};
use nibiru::{
    logging, Agent, ApiType, Category, Config, MessageHandler, ReqwestTransport, Storage,
    TriggerMessage,
};
use std::io::{self, Read};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "nibiru")]
#[command(author, version, about = "Summarise assignments, lectures and announcements with an LLM", long_about = None)]
struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise a page by URL, a file, inline text or stdin ("-")
    #[command(alias = "summarize")]
    Summarise {
        /// URL to summarise, or "-" to read stdin
        url: Option<String>,
        /// Summarise this text instead of fetching a page
        #[arg(long, conflicts_with_all = ["url", "file"])]
        text: Option<String>,
        /// Summarise the contents of a file
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,
        /// Breadcrumb or course context for the text
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Only extract grading criteria
        #[arg(long)]
        rubric: bool,
        /// Skip classification: ASSIGNMENT or GENERAL
        #[arg(long)]
        category: Option<Category>,
        /// Ask the model to classify the page
        #[arg(long)]
        classifier: bool,
        /// openai, gemini or auto
        #[arg(long)]
        provider: Option<ApiType>,
        /// Omit unknown fields instead of writing "Not specified"
        #[arg(long)]
        strict: bool,
        /// Show raw extracted text instead of summary
        #[arg(long)]
        raw: bool,
        /// Slide-by-slide lecture notes instead of a page summary
        #[arg(long, conflicts_with_all = ["rubric", "category", "classifier", "strict"])]
        lecture: bool,
        /// Print lecture notes as JSON
        #[arg(long, requires = "lecture")]
        json: bool,
        /// Use this key instead of the stored or configured one
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Show the last summary
    Last,
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Show or set the colour theme
    Theme {
        theme: Option<Theme>,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store a key (prompts when omitted)
    Set { key: Option<String> },
    /// Show the stored key, masked
    Show,
    /// Remove the stored key
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Summarise {
            url,
            text,
            file,
            context,
            model,
            temperature,
            max_tokens,
            rubric,
            category,
            classifier,
            provider,
            strict,
            raw,
            lecture,
            json,
            api_key,
        } => {
            // Load config and local state
            let config = Config::load()?;
            let storage = Storage::open(&config.storage.path)?;
            let theme = storage.theme()?;

            // Resolve the input: inline text, a file, stdin, or a URL to fetch later
            let text = match (&url, text, file) {
                (_, Some(text), _) => Some(text),
                (_, None, Some(path)) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?,
                ),
                (Some(url), None, None) if url == "-" => Some(read_stdin()?),
                (None, None, None) if !atty::is(atty::Stream::Stdin) => Some(read_stdin()?),
                _ => None,
            };
            let url = url.filter(|u| u != "-");
            if text.is_none() && url.is_none() {
                bail!("nothing to summarise: pass a URL, --text, --file or pipe text on stdin");
            }

            // Show what the scraper sees, without calling a model
            if raw {
                let (title, body) = match (text, &url) {
                    (Some(text), _) => ("input".to_string(), text),
                    (None, Some(url)) => {
                        eprintln!("Fetching: {}", url);
                        let content = fetch_content(url).await?;
                        let title = if content.title.is_empty() {
                            "No title".to_string()
                        } else {
                            content.title
                        };
                        (title, content.text)
                    }
                    (None, None) => bail!("nothing to show"),
                };
                println!("=== {} ===\n", title);
                println!("{}", body);
                eprintln!("\n--- Extracted {} characters ---", body.chars().count());
                return Ok(());
            }

            // Flag, then stored key, then config or environment
            let key = api_key
                .filter(|k| !k.trim().is_empty())
                .or(storage.api_key()?)
                .or_else(|| config.api_key().ok().map(str::to_string))
                .unwrap_or_default();

            // Command-line overrides on top of the config
            let mut opts = config.summary_options(key);
            if let Some(provider) = provider {
                opts.api_type = provider;
            }
            if let Some(temperature) = temperature {
                opts.temperature = temperature;
            }
            if let Some(max_tokens) = max_tokens {
                opts.max_tokens = max_tokens;
            }
            opts.force_category = category;
            opts.rubric_only |= rubric;
            opts.prefer_classifier |= classifier;
            opts.strict_fields |= strict;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let agent = Agent::new(ReqwestTransport::new()?);

            if lecture {
                if opts.api_key.trim().is_empty() {
                    bail!(API_KEY_NOT_SET);
                }
                if let Some(model) = model {
                    opts.model = Some(model);
                }

                // Fetch the page ourselves; lecture notes bypass the message handler
                let (text, context, origin) = match (text, &url) {
                    (Some(text), _) => (text, context.unwrap_or_default(), None),
                    (None, Some(url)) => {
                        eprintln!("Fetching: {}", url);
                        let content = fetch_content(url).await?;
                        let text = if content.text.is_empty() { content.html } else { content.text };
                        let page_context = if content.context.is_empty() {
                            content.title
                        } else {
                            content.context
                        };
                        (text, context.unwrap_or(page_context), Some(url.clone()))
                    }
                    (None, None) => bail!("nothing to summarise"),
                };

                let notes = agent
                    .summarize_lecture_with_cancel(&text, &context, &opts, cancel)
                    .await?;
                let markdown = notes.summary.to_markdown();

                // Cache the Markdown rendering so `last` can show it
                let stored = StoredSummary::new(markdown.clone(), origin, Some(Category::General));
                if let Err(e) = storage.set_last_summary(&stored) {
                    tracing::warn!(error = %e, "could not cache lecture notes");
                }

                if json {
                    println!("{}", serde_json::to_string_pretty(&notes)?);
                } else {
                    println!("{}", render_markdown(&markdown, theme));
                }
                return Ok(());
            }

            // Page summaries go through the same handler as trigger messages
            let mut handler = MessageHandler::new(agent, storage, opts);
            if let Some(url) = &url {
                eprintln!("Fetching: {}", url);
                handler = handler.with_source(UrlSource::new(url.clone()));
            }

            let message = TriggerMessage::Summarize(SummarizeRequest {
                text,
                context,
                model,
                ..Default::default()
            });

            let response = handler.handle(message, cancel).await;
            match (response.success, response.summary, response.error) {
                (true, Some(summary), _) => println!("{}", render_markdown(&summary, theme)),
                (_, _, Some(error)) => bail!(error),
                _ => bail!("no summary returned"),
            }
        }
        Commands::Last => {
            let config = Config::load()?;
            let storage = Storage::open(&config.storage.path)?;
            match storage.last_summary()? {
                Some(stored) => {
                    // Header line: when, category and source
                    let when = stored.created_at.format("%Y-%m-%d %H:%M").to_string();
                    let detail = match (&stored.source, stored.category) {
                        (Some(source), Some(category)) => format!("{} {} {}", when, category, source),
                        (Some(source), None) => format!("{} {}", when, source),
                        (None, Some(category)) => format!("{} {}", when, category),
                        (None, None) => when,
                    };
                    eprintln!("{}\n", banner("Last summary", &detail));
                    println!("{}", render_markdown(&stored.summary, storage.theme()?));
                }
                None => println!("No summary yet. Run `nibiru summarise <url>` first."),
            }
        }
        Commands::Key { action } => {
            let config = Config::load()?;
            let storage = Storage::open(&config.storage.path)?;
            match action {
                KeyAction::Set { key } => {
                    // Prompt without echo when the key is not on the command line
                    let key = match key {
                        Some(key) => key,
                        None => dialoguer::Password::new()
                            .with_prompt("API key")
                            .interact()?,
                    };
                    if key.trim().is_empty() {
                        bail!("API key cannot be empty");
                    }
                    storage.set_api_key(&key)?;
                    println!("{}", "✅ API key saved".bright_green().bold());
                }
                KeyAction::Show => match storage.api_key()? {
                    Some(key) => println!("{}", mask(&key)),
                    None => println!("No API key stored."),
                },
                KeyAction::Clear => {
                    if storage.clear_api_key()? {
                        println!("API key removed.");
                    } else {
                        println!("No API key stored.");
                    }
                }
            }
        }
        Commands::Theme { theme } => {
            let config = Config::load()?;
            let storage = Storage::open(&config.storage.path)?;
            match theme {
                Some(theme) => {
                    storage.set_theme(theme)?;
                    println!("Theme set to {}.", theme);
                }
                None => println!("{}", storage.theme()?),
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "nibiru", &mut io::stdout());
        }
    }

    Ok(())
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read stdin")?;
    Ok(buffer)
}

/// First and last four characters, the rest hidden.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
