pub mod command;
pub mod parse;

use crate::{
    config::DiskConfig,
    disk::{Backend, Session},
    error::DiskError,
    plugin,
    share_url::ShareUrl,
    shell::{command::execute_command, parse::parse_command},
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use std::{
    error::Error,
    io::stdout,
    path::PathBuf,
    sync::mpsc::{self, Sender},
    thread,
    time::Duration,
};

/// 后台打开会话时的进度消息
pub enum BootProgress {
    Step(&'static str),
    Finished(Result<Session, DiskError>),
}

/// 启动 shell 所需的参数
#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub url: ShareUrl,
    pub config: DiskConfig,
    pub backend: Backend,
}

const COMMANDS: [&str; 10] = [
    "help", "info", "df", "locate", "read", "write", "alloc", "trim", "exit", "quit",
];

fn perform_session_open(options: ShellOptions, tx: Sender<BootProgress>) {
    // 接收端提前退出时无需再报告
    let _ = tx.send(BootProgress::Step("🔐 Authenticating..."));
    let _ = tx.send(BootProgress::Step("🔗 Connecting to share..."));
    let result = Session::open(options.url, options.config, &options.backend);
    let _ = tx.send(BootProgress::Finished(result));
}

fn boot(options: ShellOptions) -> Result<Session, Box<dyn Error>> {
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || perform_session_open(options, tx));

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(80));

    let mut session = None;
    for msg in rx {
        match msg {
            BootProgress::Step(step) => pb.set_message(step),
            BootProgress::Finished(result) => {
                session = Some(result);
                break;
            }
        }
    }
    pb.finish_and_clear();
    let _ = worker.join();

    match session {
        Some(Ok(session)) => Ok(session),
        Some(Err(e)) => Err(Box::new(e)),
        None => Err("session worker exited unexpectedly".into()),
    }
}

pub fn start_shell(options: ShellOptions) -> Result<(), Box<dyn Error>> {
    let mut session = boot(options)?;
    welcome_banner(&session)?;

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".superblock_disk_history");

    let mut line_editor =
        Reedline::create().with_history(Box::new(FileBackedHistory::with_file(100, history_path)?));

    let completer = reedline::DefaultCompleter::new_with_wordlen(
        COMMANDS.iter().map(|c| c.to_string()).collect(),
        2,
    );
    line_editor = line_editor.with_completer(Box::new(completer));

    let disk_name = session.url().to_string();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic(format!("{username}@{hostname}")),
        DefaultPromptSegment::Basic(disk_name.bright_blue().bold().to_string()),
    );

    loop {
        let input = line_editor.read_line(&prompt);

        match input {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut session) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, command::Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting...".yellow());
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
    Ok(())
}

fn welcome_banner(session: &Session) -> Result<(), Box<dyn Error>> {
    let mut stdout = stdout();
    let layout = session.layout();
    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("superblock-disk ({} plugin) v{}\n", plugin::NAME, plugin::VERSION)),
        ResetColor
    )?;
    println!(
        "{} {}  {} × {} bytes per superblock file",
        "Disk:".bright_black(),
        session.url().to_string().green(),
        layout.superblock_size(),
        layout.block_size()
    );
    Ok(())
}
