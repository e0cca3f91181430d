use clap::Parser;
use sysinfo;

pub const HELP_KEYS: &str = "\
Key Bindings:
  Esc / q        : Quit
  Left / h       : Previous page
  Right / l      : Next page
  Space / PgDn   : Next page
  PgUp           : Previous page
  Home / End     : First / last page
  o              : Open folder...
  d              : Toggle double-page mode
  s              : Toggle long-strip mode
  i              : Toggle status overlay
  f              : Toggle fullscreen
  z              : Reset zoom to fit
  + / -          : Zoom in / out
  Wheel          : Scroll (long strip) / zoom
  ?              : Toggle this help
";

#[derive(Parser)]
#[command(name = "comicv", about = "A comic page viewer", after_help = HELP_KEYS)]
pub struct Cli {
    /// Folder of pages to open (defaults to the last opened folder)
    pub folder: Option<std::path::PathBuf>,

    /// Memory budget for the decoded-page cache (e.g. 512MB, 2GB). Default: 10% of RAM.
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Initial delay in ms before key-hold repeat begins
    #[arg(long, default_value = "400")]
    pub initial_delay: u64,

    /// Key-hold repeat interval in ms for page turning
    #[arg(long, default_value = "120")]
    pub repeat_delay: u64,
}

pub fn parse_memory_budget(s: &str) -> u64 {
    let s = s.trim().to_uppercase();
    if let Some(num) = s.strip_suffix("GB") {
        num.trim().parse::<f64>().unwrap_or(1.0) as u64 * 1024 * 1024 * 1024
    } else if let Some(num) = s.strip_suffix("MB") {
        num.trim().parse::<f64>().unwrap_or(512.0) as u64 * 1024 * 1024
    } else {
        s.parse::<f64>().unwrap_or(512.0) as u64 * 1024 * 1024
    }
}

pub fn default_memory_budget() -> u64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.total_memory() / 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_budget_parses_units() {
        assert_eq!(parse_memory_budget("2GB"), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_budget(" 512mb "), 512 * 1024 * 1024);
        assert_eq!(parse_memory_budget("256"), 256 * 1024 * 1024);
    }
}
