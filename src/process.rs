//! Process-table observation.
//!
//! The collector needs one fact about the live system: whether a process
//! with a given name is currently running. On Linux this reads `/proc`
//! directly; elsewhere (or when `/proc` is not mounted) it falls back to
//! parsing `ps -Af` output.

use std::fs;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Errors observing the process table.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read process table: {0}")]
    ProcTable(#[source] std::io::Error),

    #[error("failed to run `ps -Af`: {0}")]
    Ps(String),
}

/// One running process, as much of it as the scan needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    /// Kernel process id.
    pub pid: i32,
    /// Executable name (`/proc/<pid>/comm`, truncated by the kernel to
    /// 15 bytes).
    pub comm: String,
    /// First element of the command line, when readable.
    pub argv0: Option<String>,
}

impl ProcessEntry {
    /// True when this process is "named" `name`: its comm matches, or the
    /// basename of its argv[0] matches. Comm truncation is tolerated for
    /// names longer than the kernel's 15-byte limit.
    pub fn is_named(&self, name: &str) -> bool {
        if self.comm == name {
            return true;
        }
        if self.comm.len() == 15 && name.len() > 15 && name.starts_with(self.comm.as_str()) {
            return true;
        }
        self.argv0
            .as_deref()
            .map(basename)
            .map_or(false, |base| base == name)
    }
}

/// Snapshot the process table.
pub fn snapshot() -> Result<Vec<ProcessEntry>, ScanError> {
    if Path::new("/proc").is_dir() {
        snapshot_procfs()
    } else {
        snapshot_ps()
    }
}

/// True when a process named `name` is currently running.
pub fn is_running(name: &str) -> Result<bool, ScanError> {
    let entries = snapshot()?;
    debug!("process table scan: {} entries", entries.len());
    Ok(entries.iter().any(|entry| entry.is_named(name)))
}

/// Hostname of this system, best effort. Reads `/etc/hostname`, falling
/// back to the `HOSTNAME` environment variable, then `"localhost"`.
pub fn hostname() -> String {
    if let Ok(contents) = fs::read_to_string("/etc/hostname") {
        let name = contents.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn snapshot_procfs() -> Result<Vec<ProcessEntry>, ScanError> {
    let mut entries = Vec::new();

    for dirent in fs::read_dir("/proc").map_err(ScanError::ProcTable)? {
        let dirent = match dirent {
            Ok(d) => d,
            Err(_) => continue,
        };

        let name = dirent.file_name();
        let pid: i32 = match name.to_string_lossy().parse() {
            Ok(pid) => pid,
            Err(_) => continue, // not a process directory
        };

        // The process may exit between readdir and these reads; a vanished
        // pid is simply skipped.
        let comm = match fs::read_to_string(dirent.path().join("comm")) {
            Ok(comm) => comm.trim().to_string(),
            Err(_) => continue,
        };

        let argv0 = fs::read(dirent.path().join("cmdline"))
            .ok()
            .and_then(|raw| {
                raw.split(|b| *b == 0)
                    .next()
                    .filter(|token| !token.is_empty())
                    .map(|token| String::from_utf8_lossy(token).to_string())
            });

        entries.push(ProcessEntry { pid, comm, argv0 });
    }

    Ok(entries)
}

fn snapshot_ps() -> Result<Vec<ProcessEntry>, ScanError> {
    let output = Command::new("ps")
        .arg("-Af")
        .output()
        .map_err(|err| ScanError::Ps(err.to_string()))?;

    if !output.status.success() {
        return Err(ScanError::Ps(format!(
            "exited with status {}",
            output.status
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(parse_ps_output(&text))
}

/// Parse `ps -Af` output: UID PID PPID C STIME TTY TIME CMD.
fn parse_ps_output(text: &str) -> Vec<ProcessEntry> {
    let mut entries = Vec::new();

    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            continue;
        }

        let pid: i32 = match fields[1].parse() {
            Ok(pid) => pid,
            Err(_) => continue,
        };

        let argv0 = fields[7].to_string();
        entries.push(ProcessEntry {
            pid,
            comm: basename(&argv0).to_string(),
            argv0: Some(argv0),
        });
    }

    entries
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(comm: &str, argv0: Option<&str>) -> ProcessEntry {
        ProcessEntry {
            pid: 1234,
            comm: comm.to_string(),
            argv0: argv0.map(String::from),
        }
    }

    #[test]
    fn test_is_named_by_comm() {
        assert!(entry("hshell", None).is_named("hshell"));
        assert!(!entry("bash", None).is_named("hshell"));
    }

    #[test]
    fn test_is_named_by_argv0_basename() {
        assert!(entry("sh", Some("/opt/vendor/hshell")).is_named("hshell"));
        assert!(!entry("vim", Some("/usr/bin/vim")).is_named("hshell"));
    }

    #[test]
    fn test_is_named_not_substring() {
        // An argument mentioning the name must not count as the process.
        assert!(!entry("vim", Some("/usr/bin/vim")).is_named("vim hshell.log"));
        assert!(!entry("hshell-helper", None).is_named("hshell"));
    }

    #[test]
    fn test_is_named_truncated_comm() {
        // comm is capped at 15 bytes by the kernel.
        assert!(entry("a-very-long-nam", None).is_named("a-very-long-name-indeed"));
        assert!(!entry("short", None).is_named("short-but-no"));
    }

    #[test]
    fn test_parse_ps_output() {
        let text = "\
UID          PID    PPID  C STIME TTY          TIME CMD
root           1       0  0 10:00 ?        00:00:01 /sbin/init splash
root         812       1  0 10:00 ?        00:00:00 /opt/vendor/hshell
admin       1200     812  0 10:01 pts/0    00:00:00 ps -Af
";
        let entries = parse_ps_output(text);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].comm, "init");
        assert!(entries.iter().any(|e| e.is_named("hshell")));
        assert!(!entries.iter().any(|e| e.is_named("sshd")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_snapshot_sees_this_process() {
        let entries = snapshot().expect("process table should be readable");
        assert!(!entries.is_empty());

        let me = std::process::id() as i32;
        assert!(entries.iter().any(|e| e.pid == me));
    }

    #[test]
    fn test_hostname_not_empty() {
        assert!(!hostname().is_empty());
    }
}
