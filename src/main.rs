use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use boardsync::backend::MemoryBackend;
use boardsync::config::Config;
use boardsync::core::{
    Board, BoardId, BoardKind, BoardPatch, LaneId, LanePatch, NewBoard, NewLane, ProjectId,
    SprintId, StateId,
};
use boardsync::log::LogLevel;
use boardsync::tea::NotificationLevel;
use boardsync::{bslog, bslog_error, Coordinator, Result};

/// boardsync - optimistic board and lane editor
#[derive(Parser, Debug)]
#[command(name = "boardsync")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    BOARDSYNC_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.boardsync/boardsync.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Log level (error, warn, info, debug, trace); overrides --debug
    #[arg(long, global = true, value_parser = parse_level)]
    pub log_level: Option<LogLevel>,

    /// Project whose boards are edited
    #[arg(short = 'p', long, default_value = "default", global = true)]
    pub project: String,

    /// Data file of the local store (overrides the config file)
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the project's boards and their lanes
    Boards,

    /// Board operations
    #[command(subcommand)]
    Board(BoardCommand),

    /// Lane operations
    #[command(subcommand)]
    Lane(LaneCommand),

    /// Write the effective configuration to ~/.boardsync/boardsync.toml
    Config,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum BoardCommand {
    /// Create a board
    Add {
        name: String,

        /// Create a scrum board instead of a kanban board
        #[arg(long)]
        scrum: bool,

        /// Make it the project's default board
        #[arg(long)]
        default: bool,

        /// Sprint of a scrum board
        #[arg(long)]
        sprint: Option<String>,

        /// Initial lane, repeatable
        #[arg(long = "lane")]
        lanes: Vec<String>,
    },

    /// Rename a board or make it the default
    Update {
        board: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        default: bool,
    },

    /// Delete a board
    Rm { board: String },

    /// Move a scrum board to a sprint (no sprint removes it from its sprint)
    Sprint { board: String, sprint: Option<String> },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum LaneCommand {
    /// Add a lane to a board
    Add {
        board: String,
        name: String,

        #[command(flatten)]
        attrs: LaneAttrs,

        /// Zero-based position (default: last)
        #[arg(long)]
        at: Option<u32>,
    },

    /// Change a lane's name, states or WIP limit
    Update {
        lane: String,

        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        attrs: LaneAttrs,

        /// Remove the WIP limit
        #[arg(long, conflicts_with = "wip")]
        no_wip: bool,
    },

    /// Delete a lane
    Rm { lane: String },

    /// Reorder a board's lanes; every lane id must be listed once
    Reorder {
        board: String,
        #[arg(required = true)]
        lanes: Vec<String>,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct LaneAttrs {
    /// Workflow states mapped to the lane (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub states: Option<Vec<String>>,

    /// Work-in-progress limit
    #[arg(long)]
    pub wip: Option<u32>,
}

fn parse_level(name: &str) -> std::result::Result<LogLevel, String> {
    LogLevel::parse(name).ok_or_else(|| format!("unknown log level '{}'", name))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    boardsync::log::init(cli.debug);
    if let Some(level) = cli.log_level {
        boardsync::log::set_level(level);
    }
    bslog!("boardsync starting: {:?}", cli.command);

    tokio::runtime::Runtime::new()?.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    if cli.command == Command::Config {
        config.save()?;
        println!("Wrote {}", Config::config_path()?.display());
        return Ok(());
    }
    let path = match &cli.data {
        Some(path) => path.clone(),
        None => config.data_path()?,
    };
    let backend = Arc::new(MemoryBackend::load(&path).await?.with_latency(config.latency()));
    let mut coordinator = Coordinator::new(backend.clone(), config)?;
    let project = ProjectId::new(cli.project.as_str());

    coordinator.load_project(&project);
    coordinator.settle().await;

    let result = execute(&mut coordinator, &project, cli.command);
    coordinator.settle().await;

    let mut failed = result.is_err();
    for note in coordinator.take_notifications() {
        match note.level {
            NotificationLevel::Error => {
                failed = true;
                eprintln!("error: {}", note.message);
            }
            NotificationLevel::Info => println!("{}", note.message),
        }
    }
    if result.is_ok() {
        print_boards(&coordinator.boards(&project));
    }

    backend.save(&path).await?;
    if failed {
        bslog_error!("boardsync finished with errors");
        std::process::exit(1);
    }
    Ok(())
}

fn execute(coordinator: &mut Coordinator, project: &ProjectId, command: Command) -> Result<()> {
    match command {
        Command::Boards | Command::Config => Ok(()),

        Command::Board(BoardCommand::Add {
            name,
            scrum,
            default,
            sprint,
            lanes,
        }) => {
            let kind = if scrum {
                BoardKind::Scrum
            } else {
                BoardKind::Kanban
            };
            let mut attrs = NewBoard::new(name, kind);
            if default {
                attrs = attrs.as_default();
            }
            if let Some(sprint) = sprint {
                attrs = attrs.in_sprint(SprintId::new(sprint));
            }
            for lane in lanes {
                attrs = attrs.with_lane(NewLane::named(lane));
            }
            coordinator.create_board(project, attrs).map(|_| ())
        }

        Command::Board(BoardCommand::Update {
            board,
            name,
            default,
        }) => coordinator.update_board(
            &BoardId::new(board),
            BoardPatch {
                name,
                is_default: default.then_some(true),
            },
        ),

        Command::Board(BoardCommand::Rm { board }) => {
            coordinator.delete_board(&BoardId::new(board))
        }

        Command::Board(BoardCommand::Sprint { board, sprint }) => {
            coordinator.move_board_to_sprint(&BoardId::new(board), sprint.map(SprintId::new))
        }

        Command::Lane(LaneCommand::Add {
            board,
            name,
            attrs,
            at,
        }) => {
            let mut lane = NewLane::named(name);
            if let Some(states) = attrs.states {
                lane = lane.with_states(states);
            }
            if let Some(wip) = attrs.wip {
                lane = lane.with_wip_limit(wip);
            }
            if let Some(at) = at {
                lane = lane.at(at);
            }
            coordinator
                .create_lane(&BoardId::new(board), lane)
                .map(|_| ())
        }

        Command::Lane(LaneCommand::Update {
            lane,
            name,
            attrs,
            no_wip,
        }) => {
            let patch = LanePatch {
                name,
                state_ids: attrs
                    .states
                    .map(|states| states.into_iter().map(StateId::from).collect()),
                wip_limit: if no_wip {
                    Some(None)
                } else {
                    attrs.wip.map(Some)
                },
            };
            coordinator.update_lane(&LaneId::new(lane), patch)
        }

        Command::Lane(LaneCommand::Rm { lane }) => coordinator.delete_lane(&LaneId::new(lane)),

        Command::Lane(LaneCommand::Reorder { board, lanes }) => coordinator.reorder_lanes(
            &BoardId::new(board),
            lanes.into_iter().map(LaneId::new).collect(),
        ),
    }
}

fn print_boards(boards: &[Board]) {
    if boards.is_empty() {
        println!("No boards");
        return;
    }
    for board in boards {
        let mut flags = vec![board.kind.to_string()];
        if board.is_default {
            flags.push("default".to_string());
        }
        if let Some(sprint) = &board.sprint_id {
            flags.push(format!("sprint {}", sprint));
        }
        println!("{}  {}  [{}]", board.id, board.name, flags.join(", "));
        for lane in &board.lanes {
            let states: Vec<&str> = lane.state_ids.iter().map(|s| s.as_str()).collect();
            let wip = lane
                .wip_limit
                .map(|limit| format!("  wip {}", limit))
                .unwrap_or_default();
            println!(
                "  {:>2}  {}  {}  states: {}{}",
                lane.position,
                lane.id,
                lane.name,
                if states.is_empty() {
                    "-".to_string()
                } else {
                    states.join(",")
                },
                wip
            );
        }
    }
}
