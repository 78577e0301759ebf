mod logging;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use textpad_core::Encoding;
use textpad_search::{SearchMode, SearchOptions};
use textpad_session::{Session, SessionError, SessionEvent};
use textpad_settings::{ConfigStore, Theme};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "textpad",
    about = "Open, save, search and recover plain-text files",
    author,
    version
)]
struct Cli {
    /// 設定資料夾；優先於 TEXTPAD_CONFIG_DIR。 / Configuration directory (overrides TEXTPAD_CONFIG_DIR).
    #[arg(long, global = true, value_name = "PATH")]
    config_dir: Option<PathBuf>,
    /// 日誌檔改用 debug 等級。 / Write debug-level entries to the log file.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 開啟文字檔並輸出內容。 / Open a text file and print its contents.
    Open(OpenArgs),
    /// 將標準輸入寫入檔案。 / Save standard input to a file.
    Save(SaveArgs),
    /// 轉換文字檔編碼。 / Re-encode a text file.
    Convert(ConvertArgs),
    /// 在檔案中搜尋。 / Search a file.
    Find(FindArgs),
    /// 取代檔案中的相符文字。 / Replace matches in a file.
    Replace(ReplaceArgs),
    /// 檢視或修改設定。 / Inspect or change settings.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// 管理最近開啟的檔案。 / Manage the recent-files list.
    #[command(subcommand)]
    Recent(RecentCommand),
    /// 管理自動儲存的恢復快照。 / Manage the autosave recovery snapshot.
    #[command(subcommand)]
    Recovery(RecoveryCommand),
    /// 將標準輸入寫成恢復快照。 / Write standard input as the recovery snapshot for FILE.
    Autosave(AutosaveArgs),
}

#[derive(Args)]
struct OpenArgs {
    file: PathBuf,
}

#[derive(Args)]
struct SaveArgs {
    file: PathBuf,
    /// 輸出編碼；預設 utf-8。 / Output encoding (defaults to utf-8).
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<Encoding>,
}

#[derive(Args)]
struct ConvertArgs {
    input: PathBuf,
    /// 目標編碼。 / Target encoding.
    #[arg(long, value_name = "ENCODING")]
    to: Encoding,
    /// 輸出路徑；預設覆寫輸入檔。 / Output path; the input is rewritten when omitted.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct MatchArgs {
    /// 使用正規表示式。 / Interpret the pattern as a regular expression.
    #[arg(long)]
    regex: bool,
    /// 不區分大小寫。 / Match case-insensitively.
    #[arg(long)]
    ignore_case: bool,
    /// 限制完整字詞。 / Match whole words only.
    #[arg(long)]
    whole_word: bool,
}

impl MatchArgs {
    fn options(&self, pattern: &str) -> SearchOptions {
        SearchOptions {
            pattern: pattern.to_string(),
            mode: if self.regex {
                SearchMode::Regex
            } else {
                SearchMode::Plain
            },
            case_sensitive: !self.ignore_case,
            whole_word: self.whole_word,
        }
    }
}

#[derive(Args)]
struct FindArgs {
    file: PathBuf,
    pattern: String,
    #[command(flatten)]
    matching: MatchArgs,
}

#[derive(Args)]
struct ReplaceArgs {
    file: PathBuf,
    pattern: String,
    replacement: String,
    #[command(flatten)]
    matching: MatchArgs,
    /// 寫回檔案；否則只輸出結果。 / Write the result back instead of printing it.
    #[arg(long)]
    apply: bool,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// 以 JSON 顯示目前設定。 / Print the current settings as JSON.
    Show,
    /// 顯示設定檔路徑。 / Print the configuration file path.
    Path,
    /// 修改單一設定。 / Change one setting.
    Set { key: SettingKey, value: String },
    /// 還原預設值。 / Restore the defaults.
    Reset,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SettingKey {
    #[value(name = "theme")]
    Theme,
    #[value(name = "font_family", alias = "font-family")]
    FontFamily,
    #[value(name = "font_size", alias = "font-size")]
    FontSize,
    #[value(name = "autosave_enabled", alias = "autosave-enabled")]
    AutosaveEnabled,
    #[value(name = "autosave_interval", alias = "autosave-interval")]
    AutosaveInterval,
}

#[derive(Subcommand)]
enum RecentCommand {
    /// 列出最近檔案，最新者在前。 / List recent files, most recent first.
    List,
    /// 移除一筆。 / Remove one entry.
    Remove { path: String },
    /// 清空清單。 / Clear the list.
    Clear,
}

#[derive(Subcommand)]
enum RecoveryCommand {
    /// 顯示是否有可恢復的快照。 / Report whether a snapshot is waiting.
    Status,
    /// 輸出快照內容。 / Print the snapshot text.
    Show,
    /// 將快照存回原檔或指定路徑。 / Save the snapshot to its original file or to --output.
    Restore {
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// 刪除快照。 / Delete the snapshot.
    Discard,
}

#[derive(Args)]
struct AutosaveArgs {
    /// 快照所屬的檔案。 / File the snapshot belongs to.
    file: PathBuf,
    /// 還原時使用的編碼。 / Encoding recorded for the restored document.
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<Encoding>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let store = match &cli.config_dir {
        Some(dir) => Ok(ConfigStore::new(dir)),
        None => ConfigStore::from_env(),
    };
    let log_dir = store.as_ref().ok().map(ConfigStore::log_dir);
    logging::init(log_dir.as_deref(), cli.debug);
    let store = store.context("failed to locate the configuration directory")?;
    info!(dir = %store.dir().display(), "textpad starting");

    let mut session = Session::new(store);
    match cli.command {
        Commands::Open(args) => execute_open(&mut session, args)?,
        Commands::Save(args) => execute_save(&mut session, args)?,
        Commands::Convert(args) => execute_convert(&mut session, args)?,
        Commands::Find(args) => execute_find(&mut session, args)?,
        Commands::Replace(args) => execute_replace(&mut session, args)?,
        Commands::Config(command) => execute_config(&mut session, command)?,
        Commands::Recent(command) => execute_recent(&mut session, command)?,
        Commands::Recovery(command) => execute_recovery(&mut session, command)?,
        Commands::Autosave(args) => execute_autosave(&mut session, args)?,
    }
    session.shutdown().context("failed to persist configuration")?;
    Ok(())
}

fn execute_open(session: &mut Session, args: OpenArgs) -> Result<()> {
    open_document(session, &args.file)?;
    print!("{}", session.document().contents());
    eprintln!("encoding: {}", session.document().encoding());
    Ok(())
}

fn execute_save(session: &mut Session, args: SaveArgs) -> Result<()> {
    let text = read_stdin()?;
    session.new_document();
    session.document_mut().set_contents(text);
    let encoding = args.encoding.unwrap_or_default();
    session.save_as(&args.file, encoding)?;
    let (path, encoding) = finish_save(session)?;
    println!("Saved {} ({encoding})", path.display());
    Ok(())
}

fn execute_convert(session: &mut Session, args: ConvertArgs) -> Result<()> {
    open_document(session, &args.input)?;
    let from = session.document().encoding();
    let target = args.output.unwrap_or_else(|| args.input.clone());
    session.save_as(&target, args.to)?;
    let (path, encoding) = finish_save(session)?;
    println!(
        "Converted {} ({from}) -> {} ({encoding})",
        args.input.display(),
        path.display()
    );
    Ok(())
}

fn execute_find(session: &mut Session, args: FindArgs) -> Result<()> {
    open_document(session, &args.file)?;
    let options = args.matching.options(&args.pattern);
    let matches = session.find_all(&options)?;
    if matches.is_empty() {
        println!("No matches found.");
        return Ok(());
    }
    for found in &matches {
        println!(
            "{}:{}:{}: {}",
            args.file.display(),
            found.line,
            found.column,
            found.line_text
        );
    }
    eprintln!("{} match(es)", matches.len());
    Ok(())
}

fn execute_replace(session: &mut Session, args: ReplaceArgs) -> Result<()> {
    open_document(session, &args.file)?;
    let options = args.matching.options(&args.pattern);
    let count = session.replace_all(&options, &args.replacement)?;

    if !args.apply {
        print!("{}", session.document().contents());
        eprintln!("Replaced {count} occurrence(s); dry run only, re-run with --apply to write changes.");
        return Ok(());
    }
    if count == 0 {
        println!("No matches found.");
        return Ok(());
    }
    session.save()?;
    let (path, _) = finish_save(session)?;
    println!("Replaced {count} occurrence(s) in {}", path.display());
    Ok(())
}

fn execute_config(session: &mut Session, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let rendered = serde_json::to_string_pretty(session.config())
                .context("failed to render configuration")?;
            println!("{rendered}");
        }
        ConfigCommand::Path => {
            println!("{}", session.store().config_path().display());
        }
        ConfigCommand::Set { key, value } => {
            apply_setting(session, key, &value)?;
            println!("Updated {}", setting_name(key));
        }
        ConfigCommand::Reset => {
            session.reset_config()?;
            println!("Configuration reset to defaults");
        }
    }
    Ok(())
}

fn apply_setting(session: &mut Session, key: SettingKey, value: &str) -> Result<()> {
    match key {
        SettingKey::Theme => {
            let theme: Theme = value.parse()?;
            session.set_theme(theme)?;
        }
        SettingKey::FontFamily => session.set_font_family(value)?,
        SettingKey::FontSize => session.set_font_size(parse_number(key, value)?)?,
        SettingKey::AutosaveEnabled => session.set_autosave_enabled(parse_flag(value)?)?,
        SettingKey::AutosaveInterval => {
            session.set_autosave_interval(parse_number(key, value)?)?
        }
    }
    Ok(())
}

fn setting_name(key: SettingKey) -> &'static str {
    match key {
        SettingKey::Theme => "theme",
        SettingKey::FontFamily => "font_family",
        SettingKey::FontSize => "font_size",
        SettingKey::AutosaveEnabled => "autosave_enabled",
        SettingKey::AutosaveInterval => "autosave_interval",
    }
}

fn parse_number(key: SettingKey, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} expects a positive integer, got {value:?}", setting_name(key)))
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("autosave_enabled expects true or false, got {value:?}"),
    }
}

fn execute_recent(session: &mut Session, command: RecentCommand) -> Result<()> {
    match command {
        RecentCommand::List => {
            let recent = &session.config().recent_files;
            if recent.is_empty() {
                println!("No recent files.");
            }
            for entry in recent.iter() {
                println!("{entry}");
            }
        }
        RecentCommand::Remove { path } => {
            if !session.remove_recent(&path)? {
                bail!("{path} is not in the recent files list");
            }
            println!("Removed {path}");
        }
        RecentCommand::Clear => {
            session.clear_recent()?;
            println!("Recent files cleared");
        }
    }
    Ok(())
}

fn execute_recovery(session: &mut Session, command: RecoveryCommand) -> Result<()> {
    match command {
        RecoveryCommand::Status => {
            if !session.recovery_available() {
                println!("No recovery snapshot.");
                return Ok(());
            }
            restore_snapshot(session)?;
            let document = session.document();
            println!(
                "Recovery snapshot available: {} ({} bytes, {})",
                describe_source(document.path()),
                document.contents().len(),
                document.encoding()
            );
        }
        RecoveryCommand::Show => {
            restore_snapshot(session)?;
            let document = session.document();
            print!("{}", document.contents());
            eprintln!(
                "source: {}, encoding: {}",
                describe_source(document.path()),
                document.encoding()
            );
        }
        RecoveryCommand::Restore { output } => {
            restore_snapshot(session)?;
            match output {
                Some(output) => {
                    let encoding = session.document().encoding();
                    session.save_as(&output, encoding)?;
                }
                None => match session.save() {
                    Err(SessionError::NoPath) => {
                        bail!("the snapshot belongs to an untitled document; pass --output")
                    }
                    other => {
                        other?;
                    }
                },
            }
            let (path, _) = finish_save(session)?;
            println!("Restored recovery snapshot to {}", path.display());
        }
        RecoveryCommand::Discard => {
            session.discard_recovery();
            println!("Recovery snapshot discarded.");
        }
    }
    Ok(())
}

fn execute_autosave(session: &mut Session, args: AutosaveArgs) -> Result<()> {
    let text = read_stdin()?;
    session.new_document();
    let document = session.document_mut();
    document.set_contents(text);
    document.set_path(Some(args.file.clone()));
    if let Some(encoding) = args.encoding {
        document.set_encoding(encoding);
    }
    if session.autosave_now().is_none() {
        bail!("nothing to autosave");
    }
    let written = session
        .wait()
        .into_iter()
        .any(|event| matches!(event, SessionEvent::Autosaved));
    if !written {
        bail!("failed to write the recovery snapshot; see the log for details");
    }
    println!(
        "Recovery snapshot for {} written to {}",
        args.file.display(),
        session.store().recovery_paths().text.display()
    );
    Ok(())
}

fn open_document(session: &mut Session, path: &Path) -> Result<()> {
    session.open(path);
    for event in session.wait() {
        if let SessionEvent::OpenFailed { path, error } = event {
            return Err(anyhow!(error).context(format!("failed to open {}", path.display())));
        }
    }
    Ok(())
}

fn finish_save(session: &mut Session) -> Result<(PathBuf, Encoding)> {
    let mut saved = None;
    for event in session.wait() {
        match event {
            SessionEvent::Saved { path, encoding } => saved = Some((path, encoding)),
            SessionEvent::SaveFailed { path, error } => {
                return Err(anyhow!(error).context(format!("failed to save {}", path.display())));
            }
            _ => {}
        }
    }
    saved.ok_or_else(|| anyhow!("save did not complete"))
}

fn restore_snapshot(session: &mut Session) -> Result<()> {
    if !session
        .restore_recovery()
        .context("failed to read the recovery snapshot")?
    {
        bail!("no recovery snapshot found");
    }
    Ok(())
}

fn describe_source(path: Option<&Path>) -> String {
    path.map(|path| path.display().to_string())
        .unwrap_or_else(|| "untitled".to_string())
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("failed to read standard input")?;
    Ok(text)
}
