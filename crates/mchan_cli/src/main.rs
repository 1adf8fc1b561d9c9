//! Command-line front end for the forum core.
//!
//! # Responsibility
//! - Open one SQLite-backed session scope and run a single forum operation.
//! - Print prompts and reports on stdout; diagnostics go to the log file.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use mchan_core::db::open_db;
use mchan_core::{
    core_version, default_log_level, default_preset, init_logging, Board, FloorSource,
    ForumService, Preset, PresetMode, PromptOptions, SqliteKvStore,
};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Anonymous forum session tool
#[derive(Parser)]
#[command(name = "mchan")]
#[command(about = "Parse, store and prompt tagged anonymous-forum threads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file
    #[arg(long, env = "MCHAN_DB", default_value = "mchan.db", global = true)]
    db: PathBuf,

    /// Session scope, usually a chat id
    #[arg(long, env = "MCHAN_SCOPE", default_value = "global", global = true)]
    scope: String,

    /// Absolute directory for rolling log files (logging is off without it)
    #[arg(long, global = true)]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Floors requested per reply-style prompt
    #[arg(long, default_value_t = 6, global = true)]
    floor_batch: usize,

    /// Most recent floors quoted as prompt context
    #[arg(long, default_value_t = 30, global = true)]
    context_floors: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse tagged text (file or stdin) and merge it into the session
    Ingest {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,

        /// External message id used for replay deduplication
        #[arg(long)]
        message_id: Option<u64>,

        #[arg(long, value_enum, default_value_t = SourceArg::Ai)]
        source: SourceArg,
    },

    /// Print a prompt for the generator
    Prompt {
        #[command(subcommand)]
        kind: PromptKind,
    },

    /// Append a human-authored floor to an existing post
    Post {
        #[arg(long, value_parser = parse_board)]
        board: Board,

        #[arg(long)]
        post: u32,

        #[arg(long)]
        content: String,
    },

    /// Create a post locally under the next free number
    NewPost {
        #[arg(long, value_parser = parse_board)]
        board: Board,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "")]
        body: String,
    },

    /// Seed posts from a JSON catalog or the built-in one
    Seed {
        /// JSON catalog keyed by board name
        #[arg(long)]
        preset: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = ModeArg::Append)]
        mode: ModeArg,
    },

    /// Print the session state as JSON
    Show {
        /// Limit output to one board
        #[arg(long, value_parser = parse_board)]
        board: Option<Board>,
    },
}

#[derive(Subcommand)]
enum PromptKind {
    /// Ask for the next batch of floors on a post
    Reply {
        #[arg(long, value_parser = parse_board)]
        board: Board,
        #[arg(long)]
        post: u32,
        #[arg(long)]
        instruction: Option<String>,
    },
    /// Ask other posters to react after a human floor
    Followup {
        #[arg(long, value_parser = parse_board)]
        board: Board,
        #[arg(long)]
        post: u32,
        #[arg(long)]
        style: Option<String>,
    },
    /// Ask for more floors with recent context quoted
    Continue {
        #[arg(long, value_parser = parse_board)]
        board: Board,
        #[arg(long)]
        post: u32,
        #[arg(long)]
        instruction: Option<String>,
    },
    /// Ask for a brand-new post on a board
    NewPost {
        #[arg(long, value_parser = parse_board)]
        board: Board,
        #[arg(long)]
        instruction: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Ai,
    User,
    Local,
}

impl From<SourceArg> for FloorSource {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Ai => FloorSource::Ai,
            SourceArg::User => FloorSource::User,
            SourceArg::Local => FloorSource::Local,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Append,
    Overwrite,
}

impl From<ModeArg> for PresetMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Append => PresetMode::Append,
            ModeArg::Overwrite => PresetMode::Overwrite,
        }
    }
}

fn parse_board(value: &str) -> Result<Board, String> {
    Board::from_name(value.trim()).ok_or_else(|| {
        let known: Vec<_> = Board::ALL.iter().map(|board| board.name()).collect();
        format!("unknown board `{value}`; expected one of {}", known.join(", "))
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("failed to start logging")?;
    }
    info!(
        "event=cli_start module=cli status=ok version={}",
        core_version()
    );

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;
    let options = PromptOptions {
        floor_batch: cli.floor_batch,
        context_max_floors: cli.context_floors,
    };
    let mut service = ForumService::with_options(SqliteKvStore::new(&conn), cli.scope, options);

    match cli.command {
        Commands::Ingest {
            file,
            message_id,
            source,
        } => {
            let text = read_input(file.as_deref())?;
            let report = service.ingest(&text, source.into(), message_id)?;
            println!(
                "created_posts={} appended_floors={}",
                report.created_posts, report.appended_floors
            );
        }
        Commands::Prompt { kind } => {
            let prompt = match kind {
                PromptKind::Reply {
                    board,
                    post,
                    instruction,
                } => service.reply_prompt(board, post, instruction.as_deref())?,
                PromptKind::Followup { board, post, style } => {
                    service.followup_prompt(board, post, style.as_deref())?
                }
                PromptKind::Continue {
                    board,
                    post,
                    instruction,
                } => service.continue_prompt(board, post, instruction.as_deref())?,
                PromptKind::NewPost { board, instruction } => {
                    service.new_post_prompt(board, instruction.as_deref())?
                }
            };
            println!("{prompt}");
        }
        Commands::Post {
            board,
            post,
            content,
        } => {
            let floor = service.post_user_floor(board, post, &content)?;
            println!("{board} #{post} floor={}", floor.floor_no);
        }
        Commands::NewPost { board, title, body } => {
            let post = service.create_local_post(board, &title, &body)?;
            println!("{board} #{} title={}", post.post_no, post.title);
        }
        Commands::Seed { preset, mode } => {
            let preset = match preset {
                Some(path) => load_preset(&path)?,
                None => default_preset(),
            };
            let report = service.seed(&preset, mode.into())?;
            println!(
                "created_posts={} seeded_floors={} skipped_posts={}",
                report.created_posts, report.seeded_floors, report.skipped_posts
            );
        }
        Commands::Show { board } => {
            let json = match board {
                Some(board) => serde_json::to_string_pretty(service.state().posts(board))?,
                None => serde_json::to_string_pretty(service.state())?,
            };
            println!("{json}");
        }
    }

    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            if text.trim().is_empty() {
                bail!("no input on stdin");
            }
            Ok(text)
        }
    }
}

fn load_preset(path: &Path) -> Result<Preset> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read preset {}", path.display()))?;
    Preset::from_json(&raw).with_context(|| format!("invalid preset {}", path.display()))
}
