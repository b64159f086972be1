use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use easel_sdk::{Editor, EditorConfig};
use easel_store::BlobStore;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

const CONFIG_FILE: &str = "easel.toml";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.root, cli.config.as_deref())?;
    let editor = Editor::from_config(config)
        .await
        .with_context(|| format!("opening workspace {}", cli.root.display()))?;
    let format = cli.format;

    match cli.command {
        Command::List => cmd_list(&editor, format).await,
        Command::Show(args) => cmd_show(&editor, args, format).await,
        Command::Export(args) => cmd_export(&editor, args).await,
        Command::Import(args) => cmd_import(&editor, args).await,
        Command::Rename(args) => {
            let item = editor.rename_item(&args.id, &args.name).await?;
            println!("{} Renamed {} to {}", "✓".green(), item.id.yellow(), item.name.bold());
            Ok(())
        }
        Command::Delete(args) => cmd_delete(&editor, args).await,
        Command::Gc => cmd_gc(&editor, format).await,
        Command::Cutouts => cmd_cutouts(&editor, format).await,
    }
}

fn load_config(root: &Path, explicit: Option<&Path>) -> anyhow::Result<EditorConfig> {
    let default_path = root.join(CONFIG_FILE);
    let mut config = match explicit {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None if default_path.is_file() => EditorConfig::load(&default_path)
            .with_context(|| format!("reading config {}", default_path.display()))?,
        None => EditorConfig::default(),
    };
    config.storage_root = Some(root.to_path_buf());
    debug!(?config, "configuration loaded");
    Ok(config)
}

async fn cmd_list(editor: &Editor, format: OutputFormat) -> anyhow::Result<()> {
    let items = editor.list_items().await?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No saved designs.");
        return Ok(());
    }
    for item in &items {
        let category = if item.category.is_empty() {
            String::new()
        } else {
            format!(" [{}]", item.category)
        };
        println!(
            "{}  {}{}  {}",
            item.id.yellow(),
            item.name.bold(),
            category.cyan(),
            item.updated_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
        );
    }
    Ok(())
}

async fn cmd_show(editor: &Editor, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let Some(item) = editor.catalog().get(&args.id).await? else {
        bail!("no design with id {}", args.id);
    };
    let Some(payload) = editor.catalog().load_payload(&item.id).await? else {
        bail!("design {} has no stored payload", item.id);
    };
    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "item": item, "json": payload }))?
        );
        return Ok(());
    }

    println!("{} {}", item.name.bold(), item.id.yellow());
    if !item.category.is_empty() {
        println!("  Category: {}", item.category.cyan());
    }
    println!("  Created:  {}", item.created_at.to_rfc3339());
    println!("  Updated:  {}", item.updated_at.to_rfc3339());
    println!(
        "  Canvas:   {}x{}, {} nodes",
        payload.width,
        payload.height,
        payload.node_count()
    );

    let blobs = editor.resolver().blobs();
    let keys = payload.durable_keys();
    println!("  Assets:   {}", keys.len());
    for key in keys {
        match blobs.get(&key).await? {
            Some(record) => println!("    {}  {} bytes", key.short_hex().cyan(), record.size()),
            None => println!("    {}  {}", key.short_hex().cyan(), "missing".red()),
        }
    }
    Ok(())
}

async fn cmd_export(editor: &Editor, args: ExportArgs) -> anyhow::Result<()> {
    let ids = (!args.ids.is_empty()).then_some(args.ids.as_slice());
    let document = editor.export(ids).await?;
    let data = if args.compress {
        document.to_compressed()?
    } else {
        document.to_json()?
    };
    tokio::fs::write(&args.file, &data)
        .await
        .with_context(|| format!("writing {}", args.file.display()))?;
    println!(
        "{} Exported {} designs to {} ({} bytes)",
        "✓".green().bold(),
        document.len(),
        args.file.display().to_string().bold(),
        data.len()
    );
    Ok(())
}

async fn cmd_import(editor: &Editor, args: ImportArgs) -> anyhow::Result<()> {
    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let report = editor.import_bytes(&data).await?;
    for id in &report.imported {
        println!("  {} {}", "imported:".green(), id);
    }
    for id in &report.skipped {
        println!("  {} {} (already present)", "skipped:".yellow(), id);
    }
    if report.blanked > 0 {
        println!(
            "  {} {} unreadable assets were left empty",
            "warning:".red().bold(),
            report.blanked
        );
    }
    println!(
        "{} Imported {}, skipped {}",
        "✓".green().bold(),
        report.imported.len(),
        report.skipped.len()
    );
    Ok(())
}

async fn cmd_delete(editor: &Editor, args: DeleteArgs) -> anyhow::Result<()> {
    if !editor.delete_item(&args.id).await? {
        bail!("no design with id {}", args.id);
    }
    println!("Deleted design {}", args.id.yellow());
    Ok(())
}

async fn cmd_gc(editor: &Editor, format: OutputFormat) -> anyhow::Result<()> {
    let report = editor.collect_garbage().await?;
    if format == OutputFormat::Json {
        let removed: Vec<String> = report.removed.iter().map(|key| key.to_hex()).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "scanned": report.scanned,
                "retained": report.retained,
                "removed": removed,
                "freedBytes": report.freed_bytes,
            }))?
        );
        return Ok(());
    }
    println!(
        "{} GC: {} of {} blobs removed, {} bytes freed.",
        "✓".green(),
        report.removed.len(),
        report.scanned,
        report.freed_bytes
    );
    Ok(())
}

async fn cmd_cutouts(editor: &Editor, format: OutputFormat) -> anyhow::Result<()> {
    let cutouts = editor.cutouts().list().await?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&cutouts)?);
        return Ok(());
    }
    if cutouts.is_empty() {
        println!("No cutouts.");
        return Ok(());
    }
    for cutout in &cutouts {
        println!(
            "{}  {}  {}",
            cutout.id.yellow(),
            cutout.name.bold(),
            cutout.key.short_hex().cyan()
        );
    }
    Ok(())
}
