use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use repovault_core::{
    DEFAULT_PASSWORD, DiffEntry, RawDocument, SaveFile, SaveOptions, UpgradeKind, decrypt,
    default_save_root, diff_documents, list_saves, read_raw, write_container,
};

#[derive(Debug, Parser)]
#[command(name = "repovault", version)]
#[command(about = "Inspect and edit R.E.P.O. encrypted save containers")]
struct Args {
    /// Container password; every retail save uses the built-in default
    #[arg(long, global = true)]
    password: Option<String>,

    /// Skip the pre-write backup copy
    #[arg(long, global = true)]
    no_backup: bool,

    /// Skip the post-write round-trip verification
    #[arg(long, global = true)]
    no_verify: bool,

    /// Gzip the payload before encryption
    #[arg(long, global = true)]
    compress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List saves under the game's save folder (or a custom root)
    List {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Print a summary of one save
    Show { file: PathBuf },
    /// Decrypt a container to pretty-printed JSON
    Decrypt {
        file: PathBuf,
        /// Output path; defaults to `<file>.json`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Encrypt exported JSON back into a container
    Encrypt {
        file: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Create a fresh save with the stock item catalog
    New {
        /// Team name for the new save
        #[arg(long)]
        team: String,
        /// Directory the save folder is created under
        #[arg(long)]
        dir: PathBuf,
    },
    /// Rename the team
    SetTeam { file: PathBuf, name: String },
    /// Set a run stat (level, currency, lives, ...)
    SetStat {
        file: PathBuf,
        stat: String,
        value: i64,
    },
    /// Add a player with default health and zeroed upgrades
    AddPlayer {
        file: PathBuf,
        id: String,
        #[arg(default_value = "")]
        name: String,
    },
    /// Set a player's health or one of the nine upgrade levels
    SetUpgrade {
        file: PathBuf,
        id: String,
        /// `health` for current health, otherwise an upgrade name
        /// (health, stamina, extraJump, launch, mapPlayerCount, speed,
        /// strength, range, throw) prefixed with `upgrade:`
        field: String,
        value: i64,
    },
    /// Set the purchased count of a tracked item (cumulative total follows)
    SetItem {
        file: PathBuf,
        item: String,
        quantity: i64,
    },
    /// Set the purchased level of a tracked upgrade item
    SetUpgradeItem {
        file: PathBuf,
        item: String,
        quantity: i64,
    },
    /// Structural diff between two containers
    Diff { left: PathBuf, right: PathBuf },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let password = args
        .password
        .clone()
        .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
    let options = SaveOptions {
        password: password.clone(),
        compress: args.compress,
        backup: !args.no_backup,
        verify: !args.no_verify,
        compare: true,
    };

    match &args.command {
        Command::List { root } => cmd_list(root.as_deref()),
        Command::Show { file } => cmd_show(file, &password),
        Command::Decrypt { file, output } => cmd_decrypt(file, output.as_deref(), &password),
        Command::Encrypt { file, output } => cmd_encrypt(file, output, &password, args.compress),
        Command::New { team, dir } => cmd_new(team, dir, &password, args.compress),
        Command::SetTeam { file, name } => edit(file, &options, |save| {
            save.document_mut().set_team_name(name);
            Ok(())
        }),
        Command::SetStat { file, stat, value } => edit(file, &options, |save| {
            save.document_mut().set_run_stat(stat, *value);
            Ok(())
        }),
        Command::AddPlayer { file, id, name } => edit(file, &options, |save| {
            let player = save.document_mut().add_player(id, name)?;
            println!("added {} ({})", player.name.bold(), player.player_id);
            Ok(())
        }),
        Command::SetUpgrade {
            file,
            id,
            field,
            value,
        } => edit(file, &options, |save| set_player_field(save, id, field, *value)),
        Command::SetItem {
            file,
            item,
            quantity,
        } => edit(file, &options, |save| {
            if !save.document_mut().update_item_purchased(item, *quantity) {
                bail!("item `{item}` is not tracked in this save");
            }
            Ok(())
        }),
        Command::SetUpgradeItem {
            file,
            item,
            quantity,
        } => edit(file, &options, |save| {
            if !save.document_mut().update_upgrade_purchased(item, *quantity) {
                bail!("upgrade item `{item}` is not tracked in this save");
            }
            Ok(())
        }),
        Command::Diff { left, right } => cmd_diff(left, right, &password),
    }
}

fn cmd_list(root: Option<&Path>) -> Result<()> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => default_save_root().context("no save folder on this platform; pass --root")?,
    };
    let saves = list_saves(&root)
        .with_context(|| format!("failed to list saves under {}", root.display()))?;
    if saves.is_empty() {
        println!("no saves found under {}", root.display());
        return Ok(());
    }
    for save in saves {
        println!("{}  {}", save.name.bold(), save.file.display());
    }
    Ok(())
}

fn cmd_show(file: &Path, password: &str) -> Result<()> {
    let save = SaveFile::open(file, password)
        .with_context(|| format!("failed to open {}", file.display()))?;
    let document = save.document();

    println!("{} {}", "team:".bold(), document.team_name());
    if let Some(played) = save.raw().time_played() {
        println!("{} {played:.1}s", "time played:".bold());
    }
    if let Some(date) = save.raw().date_and_time() {
        println!("{} {date}", "saved:".bold());
    }

    println!("\n{}", "run stats".bold().underline());
    for (stat, value) in document.run_stats() {
        println!("  {stat}: {value}");
    }

    println!("\n{}", "players".bold().underline());
    for player in document.players() {
        println!(
            "  {} ({}) health {}/{}",
            player.name.bold(),
            player.player_id,
            player.health,
            player.max_health()
        );
        for kind in UpgradeKind::ALL {
            let level = player.upgrades.level(kind);
            if level > 0 {
                println!("    {kind}: {level}");
            }
        }
    }

    println!("\n{}", "items".bold().underline());
    for (name, count, total) in document.items().iter_purchased() {
        if count > 0 || total.unwrap_or(0) > 0 {
            println!("  {name}: {count} (lifetime {})", total.unwrap_or(0));
        }
    }
    Ok(())
}

fn cmd_decrypt(file: &Path, output: Option<&Path>, password: &str) -> Result<()> {
    let container =
        fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let payload = decrypt(&container, password)
        .with_context(|| format!("failed to decrypt {}", file.display()))?;
    let raw = RawDocument::from_slice(&payload).context("decrypted payload is not a save")?;

    let output = output.map_or_else(|| file.with_extension("json"), Path::to_path_buf);
    let pretty = serde_json::to_string_pretty(&raw)?;
    fs::write(&output, pretty).with_context(|| format!("failed to write {}", output.display()))?;
    println!("decrypted to {}", output.display());
    Ok(())
}

fn cmd_encrypt(file: &Path, output: &Path, password: &str, compress: bool) -> Result<()> {
    let json = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let raw = RawDocument::from_slice(&json)
        .with_context(|| format!("{} is not a valid save document", file.display()))?;
    write_container(output, &raw, password, compress)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("encrypted to {}", output.display());
    Ok(())
}

fn cmd_new(team: &str, dir: &Path, password: &str, compress: bool) -> Result<()> {
    let now = Local::now();
    let folder = now.format("REPO_SAVE_%Y_%m_%d_%H_%M_%S").to_string();
    let date = now.format("%Y-%m-%d").to_string();
    let path = dir.join(&folder).join(format!("{folder}.Es3"));

    let raw = RawDocument::new_game(team, &date);
    write_container(&path, &raw, password, compress)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("created {}", path.display());
    Ok(())
}

fn cmd_diff(left: &Path, right: &Path, password: &str) -> Result<()> {
    let old = read_raw(left, password)
        .with_context(|| format!("failed to open {}", left.display()))?;
    let new = read_raw(right, password)
        .with_context(|| format!("failed to open {}", right.display()))?;

    let entries = diff_documents(&old, &new);
    if entries.is_empty() {
        println!("saves are identical");
        return Ok(());
    }
    print_changes(&entries);
    Ok(())
}

fn set_player_field(save: &mut SaveFile, id: &str, field: &str, value: i64) -> Result<()> {
    let player = save
        .document_mut()
        .player_mut(id)
        .with_context(|| format!("no player `{id}` in this save"))?;
    if field == "health" {
        player.health = value;
        return Ok(());
    }
    let Some(kind) = field
        .strip_prefix("upgrade:")
        .and_then(|name| UpgradeKind::ALL.into_iter().find(|k| k.as_str() == name))
    else {
        bail!("unknown field `{field}`; use `health` or `upgrade:<name>`");
    };
    player.upgrades.set_level(kind, value);
    Ok(())
}

/// Open, apply one edit, run the save pipeline, and report what changed.
fn edit(
    file: &Path,
    options: &SaveOptions,
    apply: impl FnOnce(&mut SaveFile) -> Result<()>,
) -> Result<()> {
    let mut save = SaveFile::open(file, &options.password)
        .with_context(|| format!("failed to open {}", file.display()))?;
    log::debug!(
        "editing {} ({} players)",
        file.display(),
        save.document().player_count()
    );
    apply(&mut save)?;
    let report = save
        .save(options)
        .with_context(|| format!("failed to save {}", file.display()))?;

    if report.changes.is_empty() {
        println!("no changes");
    } else {
        print_changes(&report.changes);
    }
    if let Some(backup) = &report.backup_path {
        println!("backup at {}", backup.display());
    }
    match report.verified {
        Some(true) => println!("{}", "verified: save decodes to the intended document".green()),
        Some(false) => println!(
            "{}",
            "VERIFICATION FAILED: the written save does not decode to the intended document; \
             the backup has been kept"
                .red()
                .bold()
        ),
        None => {}
    }
    Ok(())
}

fn print_changes(entries: &[DiffEntry]) {
    for entry in entries {
        println!("{}", entry.path.bold());
        println!("  {} {}", "-".red(), entry.old.to_string().red());
        println!("  {} {}", "+".green(), entry.new.to_string().green());
    }
}
