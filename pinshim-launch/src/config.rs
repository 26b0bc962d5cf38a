use std::path::PathBuf;
use clap::Parser;

/// Run a program with every thread it creates pinned to a core from a list.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Cores to place threads on, in order: single IDs and inclusive ranges, e.g. `0-3,8`.
    /// The first core also hosts the main thread.
    #[arg(short, long, value_parser = parse_core_list)]
    pub cores: Option<CoreList>,

    /// Hexadecimal mask of `pthread_create` calls that must not be pinned.
    #[arg(short, long, value_parser = parse_skip_mask)]
    pub skip: Option<u64>,

    /// Suppress the shim's diagnostics.
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to libpinshim_preload.so. Defaults to the copy next to this executable.
    #[arg(long)]
    pub preload: Option<PathBuf>,

    /// Program to run, followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// An expanded core list, in the order the shim will use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreList(pub Vec<usize>);

impl CoreList {
    /// Comma-separated form read by the shim's `PIN_LIST`.
    pub fn to_pin_list(&self) -> String {
        self.0
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub fn parse_core_list(text: &str) -> Result<CoreList, String> {
    let mut cores = Vec::new();

    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((lo, hi)) => {
                let lo = parse_core(lo)?;
                let hi = parse_core(hi)?;
                if lo > hi {
                    return Err(format!("range {} is descending", token));
                }
                cores.extend(lo..=hi);
            }
            None => cores.push(parse_core(token)?),
        }
    }

    if cores.is_empty() {
        return Err("core list is empty".to_string());
    }
    Ok(CoreList(cores))
}

fn parse_core(text: &str) -> Result<usize, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a core id", text.trim()))
}

pub fn parse_skip_mask(text: &str) -> Result<u64, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|e| format!("'{}' is not a 64-bit hex mask: {}", text, e))
}
