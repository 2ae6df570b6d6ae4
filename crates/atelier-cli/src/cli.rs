use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "atelier",
    about = "Atelier — boards and gallery for generated images",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Data directory (default: ./.atelier)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List, create, rename, delete or select boards
    Board(BoardArgs),
    /// Save an image file or URL to a board
    Save(SaveArgs),
    /// Print the renderable reference for an image id
    Resolve(ResolveArgs),
    /// Add an image id to a board
    Add(MembershipArgs),
    /// Remove an image id from a board
    Remove(MembershipArgs),
    /// Move an image id so that only the given board holds it
    Move(MembershipArgs),
    /// Delete an image record and every board entry for it
    DeleteImage(DeleteImageArgs),
    /// Drop board entries that no longer resolve
    Reconcile(ReconcileArgs),
    /// Write every board's images to a directory
    Export(ExportArgs),
    /// Record or list project history
    History(HistoryArgs),
}

#[derive(Args)]
pub struct BoardArgs {
    #[command(subcommand)]
    pub action: Option<BoardAction>,
}

#[derive(Subcommand)]
pub enum BoardAction {
    /// List boards
    List,
    /// Show the images on a board, newest first
    Show { board: String },
    /// Create a board
    Create {
        name: String,
        #[arg(long)]
        emoji: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Rename a board
    Rename { board: String, name: String },
    /// Delete a board (its images stay stored)
    Delete { board: String },
    /// Make a board the selected board
    Select { board: String },
}

#[derive(Args)]
pub struct SaveArgs {
    /// Board id or name
    pub board: String,
    /// Image file path, or an http(s)/data URL
    pub source: String,
    /// MIME type; guessed from the file extension when omitted
    #[arg(long)]
    pub mime: Option<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub image: String,
}

#[derive(Args)]
pub struct MembershipArgs {
    /// Board id or name
    pub board: String,
    pub image: String,
}

#[derive(Args)]
pub struct DeleteImageArgs {
    pub image: String,
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Also delete stored images that no board references
    #[arg(long)]
    pub gc: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub action: Option<HistoryAction>,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List recorded generations and edits
    List,
    /// Record a generation
    AddGeneration {
        #[arg(long)]
        prompt: String,
        /// Output reference; repeat for several outputs
        #[arg(long = "output", required = true)]
        outputs: Vec<String>,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Record an edit
    AddEdit {
        #[arg(long)]
        instruction: String,
        #[arg(long = "output", required = true)]
        outputs: Vec<String>,
        #[arg(long)]
        parent: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_board_list() {
        let cli = Cli::try_parse_from(["atelier", "board"]).unwrap();
        if let Command::Board(args) = cli.command {
            assert!(args.action.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_board_create() {
        let cli = Cli::try_parse_from(["atelier", "board", "create", "Sketches", "--emoji", "✏️"]).unwrap();
        if let Command::Board(BoardArgs { action: Some(BoardAction::Create { name, emoji, description }) }) = cli.command {
            assert_eq!(name, "Sketches");
            assert_eq!(emoji.as_deref(), Some("✏️"));
            assert!(description.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_board_rename() {
        let cli = Cli::try_parse_from(["atelier", "board", "rename", "Sketches", "Drafts"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Board(BoardArgs { action: Some(BoardAction::Rename { .. }) })
        ));
    }

    #[test]
    fn parse_save_with_mime() {
        let cli = Cli::try_parse_from(["atelier", "save", "default", "cat.bin", "--mime", "image/webp"]).unwrap();
        if let Command::Save(args) = cli.command {
            assert_eq!(args.board, "default");
            assert_eq!(args.source, "cat.bin");
            assert_eq!(args.mime.as_deref(), Some("image/webp"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_move() {
        let cli = Cli::try_parse_from(["atelier", "move", "Sketches", "img-1-abc"]).unwrap();
        if let Command::Move(args) = cli.command {
            assert_eq!(args.board, "Sketches");
            assert_eq!(args.image, "img-1-abc");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_delete_image() {
        let cli = Cli::try_parse_from(["atelier", "delete-image", "img-1-abc"]).unwrap();
        assert!(matches!(cli.command, Command::DeleteImage(_)));
    }

    #[test]
    fn parse_reconcile_gc() {
        let cli = Cli::try_parse_from(["atelier", "reconcile", "--gc"]).unwrap();
        if let Command::Reconcile(args) = cli.command {
            assert!(args.gc);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_history_add_generation() {
        let cli = Cli::try_parse_from([
            "atelier", "history", "add-generation",
            "--prompt", "a cat", "--output", "https://x/1.png", "--output", "https://x/2.png",
        ])
        .unwrap();
        if let Command::History(HistoryArgs { action: Some(HistoryAction::AddGeneration { prompt, outputs, parent }) }) = cli.command {
            assert_eq!(prompt, "a cat");
            assert_eq!(outputs.len(), 2);
            assert!(parent.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn history_requires_output() {
        assert!(Cli::try_parse_from(["atelier", "history", "add-edit", "--instruction", "x"]).is_err());
    }

    #[test]
    fn parse_globals() {
        let cli = Cli::try_parse_from([
            "atelier", "resolve", "img-1-a", "--data-dir", "/tmp/a", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/a")));
    }
}
