use std::{path::PathBuf, process};

use clap::Parser;
use colored::*;
use dialoguer::Password;
use tracing_subscriber::EnvFilter;

use superblock_disk::{
    config::{parse_size, DiskConfig},
    disk::{
        session::DEFAULT_MOUNT_ROOT, Backend, DEFAULT_BLOCK_SIZE, DEFAULT_DISK_SIZE,
        DEFAULT_SUPERBLOCK_SIZE,
    },
    plugin::{self, PluginConfig},
    share_url::ShareUrl,
    shell::{start_shell, ShellOptions},
};

#[derive(Parser, Debug)]
#[command(name = "superblock-disk", version, about = "Block disk stored as superblock files on an SMB share")]
struct Cli {
    /// smb://[[WORKGROUP:][USER][:PASSWORD]@]HOST/SHARE/PATH/
    #[arg(
        long,
        env = "SUPERBLOCK_DISK_URL",
        value_name = "URL",
        required_unless_present = "dump_plugin"
    )]
    url: Option<String>,

    /// Directory where shares are mounted as <root>/<HOST>/<SHARE>
    #[arg(long, env = "SUPERBLOCK_DISK_ROOT", default_value = DEFAULT_MOUNT_ROOT)]
    root: PathBuf,

    /// Keep superblock files in memory instead of on the share
    #[arg(long)]
    memory: bool,

    /// Block size in bytes
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, value_parser = parse_size_arg)]
    block_size: u64,

    /// Blocks per superblock file
    #[arg(long, default_value_t = DEFAULT_SUPERBLOCK_SIZE)]
    superblock_size: u64,

    /// Disk size, e.g. 1G
    #[arg(long, default_value_t = DEFAULT_DISK_SIZE, value_parser = parse_size_arg)]
    size: u64,

    /// Prompt for the password when the URL names a user without one
    #[arg(long)]
    ask_password: bool,

    /// Print the plugin name, version and its configuration keys, then exit
    #[arg(long)]
    dump_plugin: bool,
}

fn dump_plugin() {
    println!("name={}", plugin::NAME);
    println!("version={}", plugin::VERSION);
    println!("{}", PluginConfig::HELP);
}

fn parse_size_arg(value: &str) -> Result<u64, String> {
    parse_size(value).map_err(|e| e.to_string())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.dump_plugin {
        dump_plugin();
        return Ok(());
    }

    let mut url = ShareUrl::parse(cli.url.as_deref().unwrap_or_default())?;
    if cli.ask_password && !url.user.is_empty() && !url.has_password() {
        url.password = Password::new()
            .with_prompt(format!("Password for {}", url.user))
            .interact()?;
    }

    let backend = if cli.memory {
        Backend::Memory
    } else {
        Backend::Mounted { root: cli.root }
    };

    let config = DiskConfig {
        block_size: cli.block_size,
        superblock_size: cli.superblock_size,
        size: cli.size,
    };

    start_shell(ShellOptions {
        url,
        config,
        backend,
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", "❌".red(), e);
        process::exit(1);
    }
}
