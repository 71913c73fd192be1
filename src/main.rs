//! mnemos CLI entry point

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use mnemos::{
    commands::{
        cmd_budget, cmd_compact, cmd_delete_document, cmd_get_job, cmd_index_start,
        cmd_index_stop, cmd_ingest, cmd_ingest_file, cmd_init, cmd_list_documents, cmd_list_jobs,
        cmd_list_memory, cmd_search, cmd_show_document, cmd_status, print_budget,
        print_compaction, print_document, print_documents, print_ingest_result, print_init,
        print_job, print_jobs, print_memory, print_search_results, print_status, read_messages,
        Engine,
    },
    config::Config,
    context::BudgetRequest,
    error::{Error, Result},
    ingest::IngestRequest,
    meta::{JobMode, MemoryScope},
    progress::LogWriterFactory,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mnemos")]
#[command(version, about = "Memory and retrieval engine for documents, code and conversations", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize mnemos configuration and database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Ingest a document
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Manage ingested documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Manage workspace index jobs
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Semantic search over indexed code
    Search {
        /// The search query
        query: String,

        /// Restrict to one workspace
        #[arg(short, long)]
        workspace: Option<String>,

        /// Restrict to one language (e.g. rust, python)
        #[arg(long)]
        language: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Compute a token budget, optionally trimming a conversation to fit
    Budget {
        /// Model context window in tokens
        #[arg(long)]
        context_window: usize,

        /// Tokens reserved for the response
        #[arg(long)]
        max_response: usize,

        /// Tokens reserved for the system prompt
        #[arg(long)]
        system: Option<usize>,

        /// Tokens reserved for the persona block
        #[arg(long)]
        persona: Option<usize>,

        /// Tokens reserved for retrieved memory
        #[arg(long, default_value = "0")]
        memory: usize,

        /// JSON file with an array of {role, content} messages
        #[arg(long)]
        messages: Option<PathBuf>,
    },

    /// Compact a conversation when it exceeds the context threshold
    Compact {
        /// JSON file with an array of {role, content} messages
        messages: PathBuf,

        /// Model context window in tokens
        #[arg(long)]
        context_window: usize,

        /// Chat the conversation belongs to
        #[arg(long, default_value = "default")]
        chat_id: String,

        /// Character the summary should be scoped to
        #[arg(long)]
        character: Option<String>,
    },

    /// List long-term memory entries
    Memory {
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,

        /// Chat or character id
        #[arg(long)]
        source: Option<String>,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show system status
    Status {
        /// Re-embed missing vectors before counting
        #[arg(long)]
        sync: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum IngestSource {
    /// Ingest literal text ("-" reads stdin)
    Text {
        content: String,
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Fetch and ingest a URL
    Url {
        url: String,
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Ingest a local file verbatim
    File {
        path: PathBuf,
        #[arg(short, long)]
        title: Option<String>,
    },
}

#[derive(Subcommand)]
enum DocsAction {
    /// List documents, newest first
    List {
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Show a document and its chunks
    Show { id: String },
    /// Delete a document with its chunks and vectors
    Delete { id: String },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Index a workspace and wait for the job to finish
    Start {
        workspace: String,

        /// Only re-chunk files whose content changed
        #[arg(long)]
        incremental: bool,
    },
    /// Stop active jobs (all, or one workspace)
    Stop { workspace: Option<String> },
    /// List jobs, newest first
    Jobs {
        #[arg(short, long)]
        workspace: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one job
    Job { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Global,
    Character,
    Chat,
}

impl From<ScopeArg> for MemoryScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Global => MemoryScope::Global,
            ScopeArg::Character => MemoryScope::Character,
            ScopeArg::Chat => MemoryScope::Chat,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    let json = cli.json;

    match cli.command {
        Commands::Init { force } => {
            // --config may name the config file or its directory
            let base_dir = cli.config.as_deref().map(|p| {
                if p.extension().is_some_and(|e| e == "toml") {
                    p.parent().map(PathBuf::from).unwrap_or_default()
                } else {
                    p.to_path_buf()
                }
            });
            let config = cmd_init(base_dir, force).await?;
            if json {
                emit(&config.paths.config_file.display().to_string())?;
            } else {
                print_init(&config);
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "mnemos", &mut std::io::stdout());
        }

        Commands::Budget {
            context_window,
            max_response,
            system,
            persona,
            memory,
            messages,
        } => {
            let config = load_config(cli.config.as_deref()).unwrap_or_default();
            let mut request = BudgetRequest::new(context_window, max_response)
                .with_config(&config.context)
                .with_memory_tokens(memory);
            if let Some(system) = system {
                request.system_tokens = system;
            }
            if let Some(persona) = persona {
                request.persona_tokens = persona;
            }
            let messages = match messages {
                Some(path) => Some(read_messages(&path).await?),
                None => None,
            };

            let output = cmd_budget(&request, messages);
            if json {
                emit(&output)?;
            } else {
                print_budget(&output);
            }
        }

        command => {
            let config = load_config(cli.config.as_deref())?;
            let engine = Engine::open(config).await?;
            run_with_engine(&engine, command, json).await?;
        }
    }

    Ok(())
}

async fn run_with_engine(engine: &Engine, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Ingest { source } => {
            let result = match source {
                IngestSource::Text { content, title } => {
                    let content = if content == "-" {
                        let mut buf = String::new();
                        std::io::stdin().read_to_string(&mut buf)?;
                        buf
                    } else {
                        content
                    };
                    let mut request = IngestRequest::text(content);
                    request.title = title;
                    cmd_ingest(engine, request).await?
                }
                IngestSource::Url { url, title } => {
                    let mut request = IngestRequest::url(url);
                    request.title = title;
                    cmd_ingest(engine, request).await?
                }
                IngestSource::File { path, title } => {
                    cmd_ingest_file(engine, &path, title).await?
                }
            };
            if json {
                emit(&result)?;
            } else {
                print_ingest_result(&result);
            }
        }

        Commands::Docs { action } => match action {
            DocsAction::List { limit } => {
                let docs = cmd_list_documents(engine, limit).await?;
                if json {
                    emit(&docs)?;
                } else {
                    print_documents(&docs);
                }
            }
            DocsAction::Show { id } => {
                let doc = cmd_show_document(engine, &id).await?;
                if json {
                    emit(&doc)?;
                } else {
                    print_document(&doc);
                }
            }
            DocsAction::Delete { id } => {
                let removed = cmd_delete_document(engine, &id).await?;
                if json {
                    emit(&serde_json::json!({ "id": id, "chunksRemoved": removed }))?;
                } else {
                    println!("✓ Deleted document {} ({} chunks)", id, removed);
                }
            }
        },

        Commands::Index { action } => match action {
            IndexAction::Start {
                workspace,
                incremental,
            } => {
                let mode = if incremental {
                    JobMode::Incremental
                } else {
                    JobMode::Full
                };
                let job = cmd_index_start(engine, &workspace, mode, !json).await?;
                if json {
                    emit(&job)?;
                } else {
                    print_job(&job);
                }
            }
            IndexAction::Stop { workspace } => {
                let stopped = cmd_index_stop(engine, workspace.as_deref()).await?;
                if json {
                    emit(&serde_json::json!({ "stopped": stopped }))?;
                } else if stopped {
                    println!("✓ Active job cancelled");
                } else {
                    println!("No active job");
                }
            }
            IndexAction::Jobs { workspace, limit } => {
                let jobs = cmd_list_jobs(engine, workspace.as_deref(), limit).await?;
                if json {
                    emit(&jobs)?;
                } else {
                    print_jobs(&jobs);
                }
            }
            IndexAction::Job { id } => {
                let job = cmd_get_job(engine, &id).await?;
                if json {
                    emit(&job)?;
                } else {
                    print_job(&job);
                }
            }
        },

        Commands::Search {
            query,
            workspace,
            language,
            limit,
        } => {
            let output = cmd_search(
                engine,
                &query,
                workspace.as_deref(),
                language.as_deref(),
                limit,
            )
            .await?;
            if json {
                emit(&output)?;
            } else {
                print_search_results(&output);
            }
        }

        Commands::Compact {
            messages,
            context_window,
            chat_id,
            character,
        } => {
            let messages = read_messages(&messages).await?;
            let outcome = cmd_compact(
                engine,
                messages,
                context_window,
                &chat_id,
                character.as_deref(),
            )
            .await;
            if json {
                emit(&outcome)?;
            } else {
                print_compaction(&outcome);
            }
        }

        Commands::Memory {
            scope,
            source,
            limit,
        } => {
            let entries =
                cmd_list_memory(engine, scope.map(Into::into), source.as_deref(), limit).await?;
            if json {
                emit(&entries)?;
            } else {
                print_memory(&entries);
            }
        }

        Commands::Status { sync } => {
            let status = cmd_status(engine, sync).await?;
            if json {
                emit(&status)?;
            } else {
                print_status(&status);
            }
        }

        Commands::Init { .. } | Commands::Completions { .. } | Commands::Budget { .. } => {}
    }

    Ok(())
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => {
            let config = Config::load_from(None)?;
            if !config.paths.config_file.exists() {
                return Err(Error::NotInitialized);
            }
            Ok(config)
        }
    }
}
