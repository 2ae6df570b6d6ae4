use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use tracing::debug;

use atelier_sdk::{
    split_tabs, AtelierConfig, Board, Edit, Gallery, Generation, ImageId, ImageSource,
    OutputAsset, ReconcileOptions,
};
use atelier_types::{classify, now_millis};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => AtelierConfig::load(path)?,
        None => AtelierConfig::default(),
    };
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }
    debug!(data_dir = %config.data_dir.display(), "opening gallery");

    let gallery = Gallery::open(config).await?;
    if gallery.is_degraded() {
        eprintln!(
            "{} storage unavailable; changes to images will not outlive this command",
            "!".yellow().bold()
        );
    }

    let json = matches!(cli.format, OutputFormat::Json);
    let result = dispatch(&gallery, cli.command, json).await;
    gallery.close().await?;
    result
}

async fn dispatch(gallery: &Gallery, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Board(args) => cmd_board(gallery, args, json),
        Command::Save(args) => cmd_save(gallery, args, json).await,
        Command::Resolve(args) => cmd_resolve(gallery, args, json),
        Command::Add(args) => cmd_add(gallery, args),
        Command::Remove(args) => cmd_remove(gallery, args),
        Command::Move(args) => cmd_move(gallery, args),
        Command::DeleteImage(args) => cmd_delete_image(gallery, args).await,
        Command::Reconcile(args) => cmd_reconcile(gallery, args, json).await,
        Command::Export(args) => cmd_export(gallery, args, json).await,
        Command::History(args) => cmd_history(gallery, args, json),
    }
}

/// Look a board up by id or name.
fn board_arg(gallery: &Gallery, key: &str) -> anyhow::Result<Board> {
    match gallery.find_board(key) {
        Some(board) => Ok(board),
        None => bail!("no board with id or name '{key}'"),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// board
// ---------------------------------------------------------------------------

fn cmd_board(gallery: &Gallery, args: BoardArgs, json: bool) -> anyhow::Result<()> {
    match args.action.unwrap_or(BoardAction::List) {
        BoardAction::List => {
            let boards = gallery.boards();
            let selected = gallery.selected_board().map(|b| b.id);
            if json {
                return print_json(&serde_json::json!({
                    "boards": boards,
                    "selectedBoardId": selected,
                }));
            }
            for board in &boards {
                let marker = if Some(&board.id) == selected.as_ref() { "*" } else { " " };
                let emoji = board.emoji.as_deref().unwrap_or(" ");
                println!(
                    "{} {} {:<24} {} {}",
                    marker.green().bold(),
                    emoji,
                    board.name.bold(),
                    format!("{} images", board.len()).dimmed(),
                    board.id.to_string().dimmed(),
                );
            }
            Ok(())
        }
        BoardAction::Show { board } => {
            let board = board_arg(gallery, &board)?;
            let items = gallery.board_items(&board.id)?;
            if json {
                return print_json(&items);
            }
            let (images, assets) = split_tabs(items);
            println!("{} ({})", board.name.bold(), board.id.to_string().dimmed());
            println!("{}", format!("Images ({})", images.len()).cyan());
            for item in &images {
                println!("  {}  {}", item.image_id.to_string().bold(), abbreviate(&item.url));
            }
            println!("{}", format!("Assets ({})", assets.len()).cyan());
            for item in &assets {
                println!("  {}  {}", item.image_id.to_string().bold(), abbreviate(&item.url));
            }
            Ok(())
        }
        BoardAction::Create { name, emoji, description } => {
            let board = gallery.create_board(&name, emoji, description)?;
            if json {
                return print_json(&board);
            }
            println!("{} Created board {} ({})", "✓".green().bold(), board.name.bold(), board.id);
            Ok(())
        }
        BoardAction::Rename { board, name } => {
            let target = board_arg(gallery, &board)?;
            gallery.rename_board(&target.id, &name)?;
            println!("{} Renamed {} to {}", "✓".green().bold(), target.name, name.bold());
            Ok(())
        }
        BoardAction::Delete { board } => {
            let target = board_arg(gallery, &board)?;
            gallery.delete_board(&target.id)?;
            println!("{} Deleted board {}", "✓".green().bold(), target.name.bold());
            Ok(())
        }
        BoardAction::Select { board } => {
            let target = board_arg(gallery, &board)?;
            gallery.select_board(&target.id)?;
            println!("{} Selected {}", "✓".green().bold(), target.name.bold());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// images
// ---------------------------------------------------------------------------

async fn cmd_save(gallery: &Gallery, args: SaveArgs, json: bool) -> anyhow::Result<()> {
    let board = board_arg(gallery, &args.board)?;
    let source = image_source(&args.source, args.mime.as_deref()).await?;
    let saved = gallery.save_image_to_board(&board.id, source).await?;

    if json {
        return print_json(&serde_json::json!({
            "imageId": saved.image_id,
            "boardId": board.id,
            "diskPath": saved.disk_path,
        }));
    }
    println!(
        "{} Saved {} to {}",
        "✓".green().bold(),
        saved.image_id.to_string().bold(),
        board.name.bold()
    );
    if let Some(path) = saved.disk_path {
        println!("  mirrored to {}", path.display());
    }
    Ok(())
}

/// Self-describing references are stored as given; anything else is read
/// as an image file.
async fn image_source(source: &str, mime: Option<&str>) -> anyhow::Result<ImageSource> {
    if classify(source).self_describing {
        return Ok(ImageSource::Reference(source.to_string()));
    }

    let path = Path::new(source);
    let mime = match mime.or_else(|| mime_for_path(path)) {
        Some(mime) => mime.to_string(),
        None => bail!("cannot tell the image type of {source}; pass --mime"),
    };
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {source}"))?;
    Ok(ImageSource::Bytes { data, mime })
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn cmd_resolve(gallery: &Gallery, args: ResolveArgs, json: bool) -> anyhow::Result<()> {
    let id = ImageId::new(args.image);
    if json {
        let url = gallery.resolve_image_url(&id);
        return print_json(&serde_json::json!({ "imageId": id, "url": url }));
    }
    println!("{}", gallery.image_url(&id)?);
    Ok(())
}

fn cmd_add(gallery: &Gallery, args: MembershipArgs) -> anyhow::Result<()> {
    let board = board_arg(gallery, &args.board)?;
    let id = ImageId::new(args.image);
    if gallery.add_image_to_board(&board.id, &id)? {
        println!("{} Added {} to {}", "✓".green().bold(), id, board.name.bold());
    } else {
        println!("{} {} is already on {}", "·".yellow(), id, board.name);
    }
    Ok(())
}

fn cmd_remove(gallery: &Gallery, args: MembershipArgs) -> anyhow::Result<()> {
    let board = board_arg(gallery, &args.board)?;
    let id = ImageId::new(args.image);
    if gallery.remove_image_from_board(&board.id, &id)? {
        println!("{} Removed {} from {}", "✓".green().bold(), id, board.name.bold());
    } else {
        println!("{} {} is not on {}", "·".yellow(), id, board.name);
    }
    Ok(())
}

fn cmd_move(gallery: &Gallery, args: MembershipArgs) -> anyhow::Result<()> {
    let board = board_arg(gallery, &args.board)?;
    let id = ImageId::new(args.image);
    gallery.move_image_to_board(&board.id, &id)?;
    println!("{} Moved {} to {}", "✓".green().bold(), id, board.name.bold());
    Ok(())
}

async fn cmd_delete_image(gallery: &Gallery, args: DeleteImageArgs) -> anyhow::Result<()> {
    let id = ImageId::new(args.image);
    if gallery.delete_image(&id).await? {
        println!("{} Deleted {}", "✓".green().bold(), id);
    } else {
        println!("{} {} was not stored", "·".yellow(), id);
    }
    Ok(())
}

async fn cmd_reconcile(gallery: &Gallery, args: ReconcileArgs, json: bool) -> anyhow::Result<()> {
    let report = gallery
        .reconcile(ReconcileOptions { collect_orphans: args.gc })
        .await?;

    if json {
        let dangling: Vec<_> = report
            .dangling_removed
            .iter()
            .map(|(board, image)| serde_json::json!({ "boardId": board, "imageId": image }))
            .collect();
        return print_json(&serde_json::json!({
            "danglingRemoved": dangling,
            "orphansDeleted": report.orphans_deleted,
        }));
    }

    for (board, image) in &report.dangling_removed {
        println!("  {} {} from {}", "-".red(), image, board);
    }
    for image in &report.orphans_deleted {
        println!("  {} {} (unreferenced)", "-".red(), image);
    }
    println!(
        "{} {} dangling entries removed, {} orphans deleted",
        "✓".green().bold(),
        report.dangling_removed.len(),
        report.orphans_deleted.len()
    );
    Ok(())
}

async fn cmd_export(gallery: &Gallery, args: ExportArgs, json: bool) -> anyhow::Result<()> {
    let report = gallery.export_boards(&args.dir).await?;
    if json {
        return print_json(&serde_json::json!({
            "boards": report.boards,
            "written": report.written,
            "skipped": report.skipped,
        }));
    }
    println!(
        "{} Exported {} images from {} boards to {}",
        "✓".green().bold(),
        report.written.len(),
        report.boards,
        args.dir.display()
    );
    if report.skipped > 0 {
        println!("  {} {} images skipped (not stored inline)", "!".yellow(), report.skipped);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

fn cmd_history(gallery: &Gallery, args: HistoryArgs, json: bool) -> anyhow::Result<()> {
    match args.action.unwrap_or(HistoryAction::List) {
        HistoryAction::List => {
            let project = gallery.project().unwrap_or_default();
            if json {
                return print_json(&project);
            }
            println!("{}", format!("Generations ({})", project.generations.len()).cyan());
            for g in &project.generations {
                println!("  {}  {}  {}", g.id.bold(), g.prompt, g.output_assets.len());
            }
            println!("{}", format!("Edits ({})", project.edits.len()).cyan());
            for e in &project.edits {
                println!("  {}  {}  {}", e.id.bold(), e.instruction, e.output_assets.len());
            }
            Ok(())
        }
        HistoryAction::AddGeneration { prompt, outputs, parent } => {
            let timestamp = now_millis();
            let id = format!("gen-{timestamp}");
            gallery.record_generation(Generation {
                output_assets: output_assets(&id, outputs),
                id: id.clone(),
                prompt,
                timestamp,
                parent_generation_id: parent,
            });
            println!("{} Recorded generation {}", "✓".green().bold(), id.bold());
            Ok(())
        }
        HistoryAction::AddEdit { instruction, outputs, parent } => {
            let timestamp = now_millis();
            let id = format!("edit-{timestamp}");
            gallery.record_edit(Edit {
                output_assets: output_assets(&id, outputs),
                id: id.clone(),
                instruction,
                timestamp,
                parent_generation_id: parent,
            });
            println!("{} Recorded edit {}", "✓".green().bold(), id.bold());
            Ok(())
        }
    }
}

fn output_assets(record_id: &str, urls: Vec<String>) -> Vec<OutputAsset> {
    urls.into_iter()
        .enumerate()
        .map(|(i, url)| OutputAsset::new(format!("{record_id}-{i}"), url))
        .collect()
}

/// Data URLs are long; show only their head.
fn abbreviate(url: &str) -> String {
    const MAX: usize = 72;
    if url.chars().count() <= MAX {
        url.to_string()
    } else {
        let head: String = url.chars().take(MAX).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for_path(Path::new("a/cat.PNG")), Some("image/png"));
        assert_eq!(mime_for_path(Path::new("cat.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("cat.txt")), None);
        assert_eq!(mime_for_path(Path::new("cat")), None);
    }

    #[tokio::test]
    async fn urls_are_references() {
        let source = image_source("https://example.com/a.png", None).await.unwrap();
        assert_eq!(source, ImageSource::Reference("https://example.com/a.png".into()));
        let upper = image_source("HTTPS://EXAMPLE.COM/A.PNG", None).await.unwrap();
        assert_eq!(upper, ImageSource::Reference("HTTPS://EXAMPLE.COM/A.PNG".into()));
        let inline = image_source("Data:image/png;base64,iVBORw0KGgo=", None).await.unwrap();
        assert!(matches!(inline, ImageSource::Reference(_)));
    }

    #[tokio::test]
    async fn files_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.webp");
        std::fs::write(&path, b"webp").unwrap();

        let source = image_source(path.to_str().unwrap(), None).await.unwrap();
        assert_eq!(
            source,
            ImageSource::Bytes { data: b"webp".to_vec(), mime: "image/webp".into() }
        );
        assert!(image_source("notes.txt", None).await.is_err());
    }

    #[test]
    fn output_assets_are_numbered() {
        let assets = output_assets("gen-1", vec!["a".into(), "b".into()]);
        assert_eq!(assets[1].id, "gen-1-1");
        assert_eq!(assets[1].url, "b");
    }

    #[test]
    fn abbreviate_long_urls() {
        assert_eq!(abbreviate("short"), "short");
        assert_eq!(abbreviate(&"x".repeat(100)).chars().count(), 73);
    }

    #[tokio::test]
    async fn commands_against_in_memory_gallery() {
        let gallery = Gallery::open(AtelierConfig::in_memory()).await.unwrap();
        cmd_board(
            &gallery,
            BoardArgs {
                action: Some(BoardAction::Create {
                    name: "Sketches".into(),
                    emoji: None,
                    description: None,
                }),
            },
            false,
        )
        .unwrap();
        let sketches = board_arg(&gallery, "sketches").unwrap();

        cmd_save(
            &gallery,
            SaveArgs {
                board: "Sketches".into(),
                source: "data:image/png;base64,iVBORw0KGgo=".into(),
                mime: None,
            },
            true,
        )
        .await
        .unwrap();
        assert_eq!(gallery.board(&sketches.id).unwrap().len(), 1);

        assert!(board_arg(&gallery, "nope").is_err());
        let err = cmd_resolve(&gallery, ResolveArgs { image: "img-1-missing".into() }, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<atelier_sdk::GalleryError>(),
            Some(atelier_sdk::GalleryError::ImageNotFound(_))
        ));
        assert!(
            cmd_board(&gallery, BoardArgs { action: Some(BoardAction::Delete { board: "default".into() }) }, false)
                .is_err()
        );
        gallery.close().await.unwrap();
    }
}
