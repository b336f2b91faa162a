//! Emulab NS script generation from a setup session log: one testbed node per
//! experiment directory, each starting `<dir><bin>` on boot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::info;

const NODE_OS: &str = "UBUNTO14-64-PROBE";

/// `log_<ts>.txt` -> `exp_<ts>.emu`.
pub fn emu_file_name(log_path: &Path) -> Result<String> {
    let name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("log path has no file name: {}", log_path.display()))?;
    let stem = name.strip_prefix("log_").unwrap_or(&name);
    let stem = match stem.rfind('.') {
        Some(idx) => &stem[..idx],
        None => stem,
    };
    Ok(format!("exp_{}.emu", stem))
}

pub fn render_ns_script<S: AsRef<str>>(bin: &str, dirs: &[S]) -> String {
    let mut out = String::from("set ns [new Simulator]\nsource tb_compat.tcl\n\n");
    let dirs = dirs
        .iter()
        .map(|d| d.as_ref().trim())
        .filter(|d| !d.is_empty());
    for (idx, dir) in dirs.enumerate() {
        let node = format!("node{}", idx + 1);
        let sep = if dir.ends_with('/') { "" } else { "/" };
        out.push_str(&format!("#{}\n", node));
        out.push_str(&format!("set {} [$ns node]\n", node));
        out.push_str(&format!("{} add-desire rr 1.0\n", node));
        out.push_str(&format!("tb-set-node-os {} {}\n", node, NODE_OS));
        out.push_str(&format!(
            "tb-set-node-startcmd {} {}{}{}\n\n",
            node, dir, sep, bin
        ));
    }
    out.push_str("$ns rtproto Static\n$ns run\n");
    out
}

#[derive(Debug, Clone)]
pub struct NsFile {
    pub path: PathBuf,
    pub nodes: usize,
}

/// Reads a session log and writes the NS script next to it, or to `out`.
pub fn write_ns_file(log_path: &Path, bin: &str, out: Option<&Path>) -> Result<NsFile> {
    let raw = fs::read_to_string(log_path)
        .with_context(|| format!("reading session log {}", log_path.display()))?;
    let dirs: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let path = match out {
        Some(p) => p.to_path_buf(),
        None => log_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(emu_file_name(log_path)?),
    };
    fs::write(&path, render_ns_script(bin, &dirs))
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), nodes = dirs.len(), "emulab script written");
    Ok(NsFile {
        path,
        nodes: dirs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn file_name_follows_log_timestamp() {
        assert_eq!(
            emu_file_name(Path::new("/t/log_2024-01-02_03-04-05.123456.txt")).expect("name"),
            "exp_2024-01-02_03-04-05.123456.emu"
        );
    }

    #[test]
    fn one_node_per_directory() {
        let script = render_ns_script("run.sh", &["/a/b/", "", "/c/d"]);
        assert!(script.starts_with("set ns [new Simulator]\nsource tb_compat.tcl\n\n"));
        assert!(script.contains("#node1\nset node1 [$ns node]\n"));
        assert!(script.contains("tb-set-node-os node1 UBUNTO14-64-PROBE\n"));
        assert!(script.contains("tb-set-node-startcmd node1 /a/b/run.sh\n"));
        assert!(script.contains("tb-set-node-startcmd node2 /c/d/run.sh\n"));
        assert!(!script.contains("node3"));
        assert!(script.ends_with("$ns rtproto Static\n$ns run\n"));
    }

    #[test]
    fn writes_next_to_log() {
        let root = std::env::temp_dir().join(format!(
            "simsweep_emulab_{}_{}",
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&root).expect("root");
        let log = root.join("log_ts1.txt");
        fs::write(&log, "/x/1procs/a/ts1/\n\n/x/2procs/a_b/ts1/\n").expect("log");
        let ns = write_ns_file(&log, "go.sh", None).expect("write");
        assert_eq!(ns.path, root.join("exp_ts1.emu"));
        assert_eq!(ns.nodes, 2);
        let body = fs::read_to_string(&ns.path).expect("read");
        assert!(body.contains("tb-set-node-startcmd node2 /x/2procs/a_b/ts1/go.sh"));
        let _ = fs::remove_dir_all(&root);
    }
}
