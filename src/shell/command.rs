use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;

use crate::{
    disk::Session,
    utils::{format_gib, hex_preview, is_zeroed},
};

/// 单次 read 允许的最大字节数
const MAX_READ_BYTES: u64 = 16 << 20;

/// alloc 超过这么多个 superblock 文件时先确认
const CONFIRM_CONTAINERS: u64 = 64;

/// 预览显示的字节数
const PREVIEW_BYTES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Info,
    Df,
    Locate(u64),
    LocateContainer(u64),
    Read { block: u64, count: u64 },
    Write { block: u64, text: String },
    Alloc { block: u64, count: u64 },
    Trim { block: u64, count: u64 },
    Exit,
}

pub fn execute_command(cmd: &Command, session: &mut Session) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&session.info())?);
        }
        Command::Df => {
            let info = session.get_size_info()?;
            println!("{}", "💽 Share capacity".bright_yellow().bold());
            println!("{}: {}", "Total".blue(), format_gib(info.size));
            println!("{}: {}", "Free".blue(), format_gib(info.free));
        }
        Command::Locate(block) => print_location(session, *block),
        Command::LocateContainer(index) => {
            let block = index
                .checked_mul(session.layout().superblock_size())
                .ok_or("superblock file index out of range")?;
            print_location(session, block);
        }
        Command::Read { block, count } => {
            let layout = session.layout();
            let bytes = count.saturating_mul(layout.block_size());
            if bytes > MAX_READ_BYTES {
                return Err(format!(
                    "refusing to read {bytes} bytes at once (limit {MAX_READ_BYTES})"
                )
                .into());
            }
            let mut buf = vec![0u8; bytes as usize];
            session.read_block(*block, *count, &mut buf)?;
            println!(
                "📖 Read {} block(s) from {}",
                count,
                session.locate(*block).path.cyan()
            );
            if is_zeroed(&buf) {
                println!("{}", "(all zero)".bright_black());
            } else {
                println!("{}", hex_preview(&buf, PREVIEW_BYTES));
            }
        }
        Command::Write { block, text } => {
            let block_size = session.layout().block_size() as usize;
            let count = text.len().div_ceil(block_size).max(1);
            let mut buf = vec![0u8; count * block_size];
            buf[..text.len()].copy_from_slice(text.as_bytes());
            session.write_block(*block, count as u64, Some(&buf[..]))?;
            println!(
                "✏️  Wrote {} block(s) at {}",
                count,
                session.locate(*block).path.cyan()
            );
        }
        Command::Alloc { block, count } => allocate(session, *block, *count)?,
        Command::Trim { block, count } => {
            if let Err(e) = session.trim_block(*block, *count) {
                println!("{} {}", "⚠️ ".yellow(), e.to_string().yellow());
            }
        }
        Command::Exit => println!("{}", "👋 Closing disk session...".yellow().bold()),
    }

    Ok(())
}

fn print_location(session: &Session, block: u64) {
    let loc = session.locate(block);
    println!(
        "{}\n{}: {}\n{}: {}\n{}: {} bytes\n{}: {}",
        format!("📍 Block {}", loc.block).bright_yellow().bold(),
        "Superblock".blue(),
        loc.container,
        "File".blue(),
        loc.path.cyan(),
        "Offset".blue(),
        loc.offset,
        "First block".blue(),
        loc.boundary
    );
}

/// 逐个 superblock 文件预分配，不写入数据
fn allocate(session: &mut Session, block: u64, count: u64) -> Result<(), Box<dyn Error>> {
    let layout = session.layout();
    let containers = layout.sub_runs(block, count).count() as u64;
    if containers > CONFIRM_CONTAINERS {
        let bytes = containers.saturating_mul(layout.container_bytes());
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Allocate {containers} superblock files ({})?",
                format_gib(bytes)
            ))
            .default(false)
            .interact()?;
        if !proceed {
            println!("{}", "Cancelled.".bright_black());
            return Ok(());
        }
    }

    let pb = ProgressBar::new(count);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.green/black}] {pos}/{len} blocks {msg}")?
            .progress_chars("#>-"),
    );
    for run in layout.sub_runs(block, count) {
        pb.set_message(session.locate(run.start).path);
        session.write_block(run.start, run.len, None)?;
        pb.inc(run.len);
    }
    pb.finish_with_message("✅ Allocated");
    Ok(())
}

fn print_help() {
    println!("{}", "📘 Disk Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  info                   Show session details
  df                     Show share capacity
  locate <block|file>    Show which superblock file holds a block,
                         or the first block of a superblock file
  read <block> [count]   Read blocks and preview their content
  write <block> <text>   Write text into blocks (zero padded)
  alloc <block> <count>  Pre-allocate superblock files
  trim <block> <count>   Discard blocks (not supported)
  help                   Show this help message
  exit                   Quit the shell

  Block numbers accept decimal or 0x-prefixed hex.
"
        .bright_black()
    );
}
