use std::ffi::{OsStr, OsString};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use anyhow::{bail, Context, Result};
use log::info;

use crate::config::Args;

/// File name cargo gives the preload cdylib.
pub const PRELOAD_LIBRARY: &str = "libpinshim_preload.so";

pub struct Launcher {
    preload: PathBuf,
}

impl Launcher {
    /// Locates the preload library: `explicit` if given, else next to the running executable.
    pub fn new(explicit: Option<PathBuf>) -> Result<Self> {
        let preload = match explicit {
            Some(path) => path,
            None => std::env::current_exe()
                .context("Failed to locate the launcher executable")?
                .with_file_name(PRELOAD_LIBRARY),
        };

        if !preload.is_file() {
            bail!("Preload library not found at {}", preload.display());
        }
        let preload = preload
            .canonicalize()
            .context("Failed to resolve the preload library path")?;

        Ok(Self { preload })
    }

    pub fn preload(&self) -> &Path {
        &self.preload
    }

    /// Builds the child command with the shim preloaded and configured from `args`.
    pub fn command(&self, args: &Args) -> Result<Command> {
        let (program, rest) = args
            .command
            .split_first()
            .context("No command given")?;

        let mut cmd = Command::new(program);
        cmd.args(rest).env(
            "LD_PRELOAD",
            compose_preload(&self.preload, std::env::var_os("LD_PRELOAD").as_deref()),
        );

        if let Some(cores) = &args.cores {
            cmd.env("PIN_LIST", cores.to_pin_list());
        }
        if let Some(mask) = args.skip {
            cmd.env("SKIP_MASK", format!("{:#x}", mask));
        }
        if args.quiet {
            cmd.env("SILENT", "1");
        }
        Ok(cmd)
    }

    /// Spawns the command and waits for it, returning its exit code.
    pub fn run(&self, args: &Args) -> Result<i32> {
        let mut cmd = self.command(args)?;
        info!("Launching {:?} with {}", args.command, self.preload.display());

        let status = cmd
            .status()
            .with_context(|| format!("Failed to spawn {}", args.command[0]))?;
        Ok(exit_code(status))
    }
}

/// Prepends `library` to an existing `LD_PRELOAD` value.
pub fn compose_preload(library: &Path, existing: Option<&OsStr>) -> OsString {
    let mut value = OsString::from(library.as_os_str());
    if let Some(existing) = existing.filter(|e| !e.is_empty()) {
        value.push(":");
        value.push(existing);
    }
    value
}

/// Shell convention: the exit code, or 128 + signal number when killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreList;

    fn args(command: &[&str]) -> Args {
        Args {
            cores: Some(CoreList(vec![0, 2])),
            skip: Some(1),
            quiet: true,
            preload: None,
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_compose_preload() {
        let lib = Path::new("/opt/pinshim/libpinshim_preload.so");
        assert_eq!(compose_preload(lib, None), OsString::from("/opt/pinshim/libpinshim_preload.so"));
        assert_eq!(compose_preload(lib, Some(OsStr::new(""))), OsString::from("/opt/pinshim/libpinshim_preload.so"));
        assert_eq!(
            compose_preload(lib, Some(OsStr::new("libother.so"))),
            OsString::from("/opt/pinshim/libpinshim_preload.so:libother.so")
        );
    }

    #[test]
    fn test_missing_preload_rejected() {
        assert!(Launcher::new(Some(PathBuf::from("/nonexistent/libpinshim_preload.so"))).is_err());
    }

    #[test]
    fn test_command_environment() {
        let launcher = Launcher { preload: PathBuf::from("/tmp/libpinshim_preload.so") };
        let cmd = launcher.command(&args(&["env", "-0"])).unwrap();

        assert_eq!(cmd.get_program(), "env");
        let envs: Vec<(String, String)> = cmd
            .get_envs()
            .filter_map(|(k, v)| Some((k.to_str()?.to_string(), v?.to_str()?.to_string())))
            .collect();
        assert!(envs.contains(&("PIN_LIST".to_string(), "0,2".to_string())));
        assert!(envs.contains(&("SKIP_MASK".to_string(), "0x1".to_string())));
        assert!(envs.contains(&("SILENT".to_string(), "1".to_string())));
        assert!(envs
            .iter()
            .any(|(k, v)| k == "LD_PRELOAD" && v.starts_with("/tmp/libpinshim_preload.so")));
    }

    #[test]
    fn test_exit_code_passthrough() {
        let launcher = Launcher { preload: PathBuf::from("/dev/null") };
        let mut plain = args(&["sh", "-c", "exit 3"]);
        plain.cores = None;
        plain.skip = None;
        plain.quiet = false;
        // /dev/null as LD_PRELOAD only makes the loader print a warning.
        assert_eq!(launcher.run(&plain).unwrap(), 3);
    }
}
