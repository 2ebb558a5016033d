use crate::{disk::ContainerPath, shell::command::Command};

/// 块号支持十进制和 0x 开头的十六进制
fn parse_number(token: &str) -> Option<u64> {
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

/// 接受带磁盘目录前缀的 superblock 文件路径，只看最后两段
fn parse_container(token: &str) -> Option<u64> {
    let mut parts = token.trim_end_matches('/').rsplitn(3, '/');
    let file = parts.next()?;
    let dir = parts.next()?;
    ContainerPath::parse(&format!("{dir}/{file}"))
}

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];
    let number = |i: usize| args.get(i).and_then(|t| parse_number(t));

    match cmd {
        "help" => Some(Command::Help),
        "info" => Some(Command::Info),
        "df" => Some(Command::Df),
        "locate" => {
            let target = args.first()?;
            match parse_number(target) {
                Some(block) => Some(Command::Locate(block)),
                None => parse_container(target).map(Command::LocateContainer),
            }
        }
        "read" => {
            let block = number(0)?;
            let count = match args.get(1) {
                Some(t) => parse_number(t)?,
                None => 1,
            };
            Some(Command::Read { block, count })
        }
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write {
                    block: number(0)?,
                    text: args[1..].join(" "),
                })
            } else {
                None
            }
        }
        "alloc" => Some(Command::Alloc {
            block: number(0)?,
            count: number(1)?,
        }),
        "trim" => Some(Command::Trim {
            block: number(0)?,
            count: number(1)?,
        }),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_block_commands() {
        assert_eq!(
            parse_command("read 300 10"),
            Some(Command::Read {
                block: 300,
                count: 10
            })
        );
        assert_eq!(
            parse_command("read 0x100"),
            Some(Command::Read {
                block: 256,
                count: 1
            })
        );
        assert_eq!(
            parse_command("write 5 hello   block device"),
            Some(Command::Write {
                block: 5,
                text: "hello block device".into()
            })
        );
        assert_eq!(
            parse_command("alloc 0 1024"),
            Some(Command::Alloc {
                block: 0,
                count: 1024
            })
        );
        assert_eq!(parse_command("locate 0xafafbc00"), Some(Command::Locate(0xafaf_bc00)));
        assert_eq!(
            parse_command("locate vm0/321/0000000000000.img"),
            Some(Command::LocateContainer(0x123))
        );
        assert_eq!(
            parse_command("locate 100/0000000000000.img"),
            Some(Command::LocateContainer(1))
        );
    }

    #[test]
    fn rejects_incomplete_or_unknown_input() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("write 5"), None);
        assert_eq!(parse_command("read x"), None);
        assert_eq!(parse_command("read 1 y"), None);
        assert_eq!(parse_command("trim 1"), None);
        assert_eq!(parse_command("format"), None);
        assert_eq!(parse_command("locate"), None);
        assert_eq!(parse_command("locate vm0/321/000.img"), None);
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse_command("  df "), Some(Command::Df));
        assert_eq!(parse_command("info"), Some(Command::Info));
        assert_eq!(parse_command("quit"), Some(Command::Exit));
    }
}
