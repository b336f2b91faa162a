use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{json, Value};
use sweep_core::{ConfigNode, ConfigTree, Mapping, TreeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("unknown system parameter '{0}'")]
    UnknownParam(String),
    #[error("{param}: unknown replacement policy '{kind}'")]
    UnknownPolicy { param: String, kind: String },
    #[error("{param}: policy {kind} requires integer field '{field}'")]
    MissingField {
        param: String,
        kind: String,
        field: String,
    },
    #[error("{param}: expected a mapping with a 'type' key")]
    Malformed { param: String },
    #[error("system parameters must be a mapping of parameter name to value")]
    NotAMapping,
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Hardware parameters a sweep can vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SystemParam {
    L2Repl,
    L3Repl,
}

impl SystemParam {
    pub fn key(&self) -> &'static str {
        match self {
            SystemParam::L2Repl => "l2_repl",
            SystemParam::L3Repl => "l3_repl",
        }
    }

    /// Short form used in fragments and directory names.
    pub fn fragment_key(&self) -> &'static str {
        match self {
            SystemParam::L2Repl => "l2repl",
            SystemParam::L3Repl => "l3repl",
        }
    }

    pub fn config_path(&self) -> &'static str {
        match self {
            SystemParam::L2Repl => "sys.caches.l2.repl",
            SystemParam::L3Repl => "sys.caches.l3.repl",
        }
    }
}

impl FromStr for SystemParam {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l2_repl" => Ok(SystemParam::L2Repl),
            "l3_repl" => Ok(SystemParam::L3Repl),
            other => Err(PatchError::UnknownParam(other.to_string())),
        }
    }
}

/// Cache replacement policy with its tuning fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplPolicy {
    Lru,
    Srrip {
        m: i64,
    },
    Asrrip {
        m: i64,
        r_start: i64,
        w_start: i64,
        c_prom: i64,
        d_prom: i64,
    },
}

impl ReplPolicy {
    pub fn kind(&self) -> &'static str {
        match self {
            ReplPolicy::Lru => "LRU",
            ReplPolicy::Srrip { .. } => "SRRIP",
            ReplPolicy::Asrrip { .. } => "ASRRIP",
        }
    }

    /// Tuning fields in declaration order.
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        match *self {
            ReplPolicy::Lru => Vec::new(),
            ReplPolicy::Srrip { m } => vec![("M", m)],
            ReplPolicy::Asrrip {
                m,
                r_start,
                w_start,
                c_prom,
                d_prom,
            } => vec![
                ("M", m),
                ("r_start", r_start),
                ("w_start", w_start),
                ("c_prom", c_prom),
                ("d_prom", d_prom),
            ],
        }
    }

    pub fn from_value(param: &str, value: &Value) -> Result<Self, PatchError> {
        let malformed = || PatchError::Malformed {
            param: param.to_string(),
        };
        let obj = value.as_object().ok_or_else(malformed)?;
        let kind = obj.get("type").and_then(Value::as_str).ok_or_else(malformed)?;
        let field = |name: &str| -> Result<i64, PatchError> {
            let missing = || PatchError::MissingField {
                param: param.to_string(),
                kind: kind.to_string(),
                field: name.to_string(),
            };
            match obj.get(name) {
                Some(Value::Number(n)) => n.as_i64().ok_or_else(missing),
                Some(Value::String(s)) => s.trim().parse().map_err(|_| missing()),
                _ => Err(missing()),
            }
        };
        match kind {
            "LRU" => Ok(ReplPolicy::Lru),
            "SRRIP" => Ok(ReplPolicy::Srrip { m: field("M")? }),
            "ASRRIP" => Ok(ReplPolicy::Asrrip {
                m: field("M")?,
                r_start: field("r_start")?,
                w_start: field("w_start")?,
                c_prom: field("c_prom")?,
                d_prom: field("d_prom")?,
            }),
            other => Err(PatchError::UnknownPolicy {
                param: param.to_string(),
                kind: other.to_string(),
            }),
        }
    }

    /// Config subtree written at the parameter's path: `type` then the fields.
    pub fn to_node(&self) -> ConfigNode {
        let mut map = Mapping::new();
        map.insert("type", ConfigNode::str(self.kind()));
        for (name, value) in self.fields() {
            map.insert(name, ConfigNode::int(value));
        }
        ConfigNode::mapping(map)
    }

    fn fragment_value(&self) -> String {
        let mut out = self.kind().to_string();
        for (name, value) in self.fields() {
            out.push_str(&format!(",{}{}", name, value));
        }
        out
    }
}

/// One parameter edit, e.g. `l2_repl = SRRIP { M: 2 }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEdit {
    pub param: SystemParam,
    pub policy: ReplPolicy,
}

impl SystemEdit {
    /// `l2repl_SRRIP,M2`
    pub fn fragment(&self) -> String {
        format!("{}_{}", self.param.fragment_key(), self.policy.fragment_value())
    }
}

/// Ordered set of parameter edits defining one simulated system variant.
///
/// Setting a parameter that already has an edit replaces that edit in place,
/// so repeating an edit changes neither the patched tree nor the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSession {
    system: String,
    edits: Vec<SystemEdit>,
}

impl PatchSession {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            edits: Vec::new(),
        }
    }

    /// Parses an ordered `param -> policy` mapping. Every entry is validated
    /// before the session is returned, so one bad entry rejects all of them.
    pub fn from_value(system: impl Into<String>, params: &Value) -> Result<Self, PatchError> {
        let mut session = Self::new(system);
        let entries = match params {
            Value::Null => return Ok(session),
            Value::Object(map) => map,
            _ => return Err(PatchError::NotAMapping),
        };
        for (key, value) in entries {
            let param: SystemParam = key.parse()?;
            let policy = ReplPolicy::from_value(key, value)?;
            session.push(SystemEdit { param, policy });
        }
        Ok(session)
    }

    pub fn push(&mut self, edit: SystemEdit) {
        match self.edits.iter_mut().find(|e| e.param == edit.param) {
            Some(existing) => *existing = edit,
            None => self.edits.push(edit),
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn edits(&self) -> &[SystemEdit] {
        &self.edits
    }

    pub fn fragments(&self) -> Vec<String> {
        self.edits.iter().map(SystemEdit::fragment).collect()
    }

    /// `<system>-<frag1>-<frag2>...`
    pub fn name(&self) -> String {
        let mut name = self.system.clone();
        for fragment in self.fragments() {
            name.push('-');
            name.push_str(&fragment);
        }
        name
    }

    /// `<root>/<system>/<frag1>/<frag2>/...`
    pub fn dir(&self, root: &Path) -> PathBuf {
        let mut dir = root.join(&self.system);
        for fragment in self.fragments() {
            dir.push(fragment);
        }
        dir
    }

    pub fn config_file_name(&self) -> String {
        format!("{}.cfg", self.name())
    }

    pub fn apply(&self, base: &ConfigTree) -> Result<ConfigTree, PatchError> {
        let mut tree = base.clone();
        for edit in &self.edits {
            tree.set(edit.param.config_path(), edit.policy.to_node())?;
        }
        Ok(tree)
    }
}

/// Resolved invocation for one simulated process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub command: String,
    pub input: String,
}

/// Default per-process settings: fast-forward window and start mode.
pub fn default_process_template() -> Value {
    json!({
        "ffiPoints": [1_000_000_000i64, 10_000_000_000i64],
        "startFastForwarded": true,
    })
}

pub fn default_sim_overrides() -> Value {
    json!({
        "perProcessDir": true,
        "maxTotalInstrs": 2_000_000_000i64,
    })
}

/// Writes `process0..processN` from `template` plus each command, and
/// merges `sim` into the tree's `sim` section.
pub fn inject_processes(
    tree: &mut ConfigTree,
    processes: &[ProcessCommand],
    template: &ConfigNode,
    sim: &ConfigNode,
) -> Result<(), PatchError> {
    tree.merge("sim", sim)?;
    for (idx, process) in processes.iter().enumerate() {
        let mut entry = match template.as_mapping() {
            Some(map) => map.clone(),
            None => Mapping::new(),
        };
        entry.insert("command", ConfigNode::str(process.command.as_str()));
        if !process.input.is_empty() {
            entry.insert("input", ConfigNode::str(process.input.as_str()));
        }
        tree.set(&format!("process{}", idx), ConfigNode::mapping(entry))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ConfigTree {
        ConfigTree::parse_yaml(
            "sys:\n  caches:\n    l2:\n      size: 262144\n      repl: { type: LRU }\n    l3:\n      size: 8388608\n",
        )
        .expect("base config")
    }

    #[test]
    fn srrip_edit_sets_policy_and_fragment() {
        let params = json!({ "l2_repl": { "type": "SRRIP", "M": 2 } });
        let session = PatchSession::from_value("base", &params).expect("session");
        assert_eq!(session.fragments(), vec!["l2repl_SRRIP,M2".to_string()]);
        assert_eq!(session.name(), "base-l2repl_SRRIP,M2");
        assert_eq!(session.config_file_name(), "base-l2repl_SRRIP,M2.cfg");
        assert_eq!(
            session.dir(Path::new("/out")),
            PathBuf::from("/out/base/l2repl_SRRIP,M2")
        );

        let patched = session.apply(&base()).expect("apply");
        assert_eq!(
            patched.get("sys.caches.l2.repl.type").and_then(ConfigNode::as_str),
            Some("SRRIP")
        );
        assert_eq!(
            patched.get("sys.caches.l2.size"),
            base().get("sys.caches.l2.size")
        );
    }

    #[test]
    fn asrrip_fields_follow_declaration_order() {
        let params = json!({
            "l3_repl": {
                "type": "ASRRIP", "d_prom": 1, "c_prom": 2, "w_start": 3, "r_start": 4, "M": 3
            }
        });
        let session = PatchSession::from_value("s", &params).expect("session");
        assert_eq!(
            session.fragments(),
            vec!["l3repl_ASRRIP,M3,r_start4,w_start3,c_prom2,d_prom1".to_string()]
        );
    }

    #[test]
    fn repeating_an_edit_is_idempotent() {
        let edit = SystemEdit {
            param: SystemParam::L2Repl,
            policy: ReplPolicy::Srrip { m: 2 },
        };
        let mut once = PatchSession::new("base");
        once.push(edit.clone());
        let mut twice = once.clone();
        twice.push(edit);
        assert_eq!(once.name(), twice.name());
        assert_eq!(
            once.apply(&base()).expect("once"),
            twice.apply(&base()).expect("twice")
        );
        let reapplied = once
            .apply(&once.apply(&base()).expect("first"))
            .expect("second");
        assert_eq!(reapplied, once.apply(&base()).expect("once"));
    }

    #[test]
    fn unknown_entries_reject_the_whole_session() {
        let params = json!({
            "l2_repl": { "type": "SRRIP", "M": 2 },
            "mem_latency": 100
        });
        assert!(matches!(
            PatchSession::from_value("base", &params),
            Err(PatchError::UnknownParam(ref p)) if p == "mem_latency"
        ));
        let params = json!({ "l2_repl": { "type": "PLRU" } });
        assert!(matches!(
            PatchSession::from_value("base", &params),
            Err(PatchError::UnknownPolicy { ref kind, .. }) if kind == "PLRU"
        ));
        let params = json!({ "l2_repl": { "type": "SRRIP" } });
        assert!(matches!(
            PatchSession::from_value("base", &params),
            Err(PatchError::MissingField { ref field, .. }) if field == "M"
        ));
    }

    #[test]
    fn processes_are_injected_with_template_and_sim_defaults() {
        let mut tree = base();
        let template = ConfigNode::from_json(&default_process_template());
        let sim = ConfigNode::from_json(&default_sim_overrides());
        let processes = vec![
            ProcessCommand {
                command: "bzip2_base.cfg dryer.jpg 2".to_string(),
                input: String::new(),
            },
            ProcessCommand {
                command: "gobmk_base.cfg --quiet --mode gtp".to_string(),
                input: "capture.tst".to_string(),
            },
        ];
        inject_processes(&mut tree, &processes, &template, &sim).expect("inject");
        assert_eq!(
            tree.get("process0.command").and_then(ConfigNode::as_str),
            Some("bzip2_base.cfg dryer.jpg 2")
        );
        assert!(tree.get("process0.input").is_none());
        assert_eq!(
            tree.get("process1.input").and_then(ConfigNode::as_str),
            Some("capture.tst")
        );
        assert_eq!(
            tree.get("process1.startFastForwarded"),
            Some(&ConfigNode::bool(true))
        );
        assert_eq!(
            tree.get("sim.maxTotalInstrs"),
            Some(&ConfigNode::int(2_000_000_000))
        );
    }
}
