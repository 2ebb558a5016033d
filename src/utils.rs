use chrono::{DateTime, Local};
use uuid::Uuid;

pub fn current_time() -> DateTime<Local> {
    Local::now()
}

/// 生成一个随机会话 ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

pub fn is_zeroed(buf: &[u8]) -> bool {
    buf.iter().all(|&b| b == 0)
}

/// 十六进制预览，每行 16 字节
pub fn hex_preview(buf: &[u8], max: usize) -> String {
    let shown = &buf[..buf.len().min(max)];
    let mut lines = Vec::new();
    for (row, chunk) in shown.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        lines.push(format!("{:08x}  {:<47}  |{}|", row * 16, hex.join(" "), ascii));
    }
    if buf.len() > max {
        lines.push(format!("... {} more bytes", buf.len() - max));
    }
    lines.join("\n")
}

pub fn format_gib(bytes: u64) -> String {
    format!("{:.2} GiB", bytes as f64 / (1u64 << 30) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_formats_rows() {
        let out = hex_preview(b"hello, block device!", 16);
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "00000000  68 65 6c 6c 6f 2c 20 62 6c 6f 63 6b 20 64 65 76  |hello, block dev|"
        );
        assert_eq!(lines.next().unwrap(), "... 4 more bytes");
    }

    #[test]
    fn gib_formatting() {
        assert_eq!(format_gib(107_374_182_400), "100.00 GiB");
        assert!(is_zeroed(&[0; 8]));
        assert!(!is_zeroed(&[0, 1]));
    }
}
