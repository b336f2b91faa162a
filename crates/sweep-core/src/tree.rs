use serde_yaml::Value as YamlValue;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::atomic_write_bytes;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("invalid config path '{0}'")]
    InvalidPath(String),
    #[error("config path collision: '{path}' is not a mapping")]
    NotAMapping { path: String },
    #[error("config root must be a mapping")]
    RootNotMapping,
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// Insertion-ordered string-keyed mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(String, ConfigNode)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replaces the value in place when the key exists, otherwise appends.
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigNode) {
        let key = key.into();
        match self.position(&key) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn get_or_insert_with(
        &mut self,
        key: &str,
        default: impl FnOnce() -> ConfigNode,
    ) -> &mut ConfigNode {
        let idx = match self.position(key) {
            Some(idx) => idx,
            None => {
                self.entries.push((key.to_string(), default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }
}

impl FromIterator<(String, ConfigNode)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, ConfigNode)>>(iter: I) -> Self {
        let mut map = Mapping::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// One node of a config tree. Containers are shared behind `Arc` and cloned
/// on write, so trees derived from a common base only copy the edited spine.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Scalar(Scalar),
    Mapping(Arc<Mapping>),
    Sequence(Arc<Vec<ConfigNode>>),
}

impl ConfigNode {
    pub fn empty_mapping() -> Self {
        ConfigNode::Mapping(Arc::new(Mapping::new()))
    }

    pub fn mapping(map: Mapping) -> Self {
        ConfigNode::Mapping(Arc::new(map))
    }

    pub fn sequence(items: Vec<ConfigNode>) -> Self {
        ConfigNode::Sequence(Arc::new(items))
    }

    pub fn str(value: impl Into<String>) -> Self {
        ConfigNode::Scalar(Scalar::Str(value.into()))
    }

    pub fn int(value: i64) -> Self {
        ConfigNode::Scalar(Scalar::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        ConfigNode::Scalar(Scalar::Bool(value))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            ConfigNode::Mapping(map) => Some(map.as_ref()),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ConfigNode::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigNode::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn from_yaml(value: &YamlValue) -> Self {
        match value {
            YamlValue::Null => ConfigNode::Scalar(Scalar::Null),
            YamlValue::Bool(b) => ConfigNode::Scalar(Scalar::Bool(*b)),
            YamlValue::Number(n) => match n.as_i64() {
                Some(i) => ConfigNode::Scalar(Scalar::Int(i)),
                None => ConfigNode::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            YamlValue::String(s) => ConfigNode::Scalar(Scalar::Str(s.clone())),
            YamlValue::Sequence(items) => {
                ConfigNode::sequence(items.iter().map(ConfigNode::from_yaml).collect())
            }
            YamlValue::Mapping(map) => ConfigNode::mapping(
                map.iter()
                    .map(|(k, v)| (yaml_key(k), ConfigNode::from_yaml(v)))
                    .collect(),
            ),
            YamlValue::Tagged(tagged) => ConfigNode::from_yaml(&tagged.value),
        }
    }

    pub fn to_yaml(&self) -> YamlValue {
        match self {
            ConfigNode::Scalar(Scalar::Null) => YamlValue::Null,
            ConfigNode::Scalar(Scalar::Bool(b)) => YamlValue::Bool(*b),
            ConfigNode::Scalar(Scalar::Int(i)) => YamlValue::Number((*i).into()),
            ConfigNode::Scalar(Scalar::Float(x)) => YamlValue::Number((*x).into()),
            ConfigNode::Scalar(Scalar::Str(s)) => YamlValue::String(s.clone()),
            ConfigNode::Sequence(items) => {
                YamlValue::Sequence(items.iter().map(ConfigNode::to_yaml).collect())
            }
            ConfigNode::Mapping(map) => {
                let mut out = serde_yaml::Mapping::new();
                for (k, v) in map.iter() {
                    out.insert(YamlValue::String(k.to_string()), v.to_yaml());
                }
                YamlValue::Mapping(out)
            }
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match serde_json::from_value::<YamlValue>(value.clone()) {
            Ok(yaml) => ConfigNode::from_yaml(&yaml),
            Err(_) => ConfigNode::Scalar(Scalar::Str(value.to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_yaml()).unwrap_or(serde_json::Value::Null)
    }
}

fn yaml_key(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        other => match ConfigNode::from_yaml(other) {
            ConfigNode::Scalar(s) => s.to_string(),
            _ => serde_yaml::to_string(other)
                .unwrap_or_default()
                .trim()
                .to_string(),
        },
    }
}

/// Deep merge: mappings merge key by key, anything else is replaced.
fn merge_into(base: &mut ConfigNode, overlay: &ConfigNode) {
    match (base, overlay) {
        (ConfigNode::Mapping(base_map), ConfigNode::Mapping(overlay_map)) => {
            let base_map = Arc::make_mut(base_map);
            for (key, value) in overlay_map.iter() {
                let slot = base_map.get_or_insert_with(key, || ConfigNode::Scalar(Scalar::Null));
                if matches!(slot, ConfigNode::Scalar(Scalar::Null)) {
                    *slot = value.clone();
                } else {
                    merge_into(slot, value);
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, TreeError> {
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Structured simulator configuration. The root is always a mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    root: ConfigNode,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTree {
    pub fn new() -> Self {
        Self {
            root: ConfigNode::empty_mapping(),
        }
    }

    pub fn from_node(root: ConfigNode) -> Result<Self, TreeError> {
        match root {
            ConfigNode::Mapping(_) => Ok(Self { root }),
            ConfigNode::Scalar(Scalar::Null) => Ok(Self::new()),
            _ => Err(TreeError::RootNotMapping),
        }
    }

    pub fn parse_yaml(text: &str) -> Result<Self, TreeError> {
        let value: YamlValue =
            serde_yaml::from_str(text).map_err(|e| TreeError::Parse(e.to_string()))?;
        Self::from_node(ConfigNode::from_yaml(&value))
    }

    pub fn parse_json(text: &str) -> Result<Self, TreeError> {
        let value: YamlValue =
            serde_json::from_str(text).map_err(|e| TreeError::Parse(e.to_string()))?;
        Self::from_node(ConfigNode::from_yaml(&value))
    }

    /// Loads a `.json` file as JSON and anything else as YAML.
    pub fn load(path: &Path) -> Result<Self, TreeError> {
        let text = fs::read_to_string(path).map_err(|source| TreeError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if is_json(path) {
            Self::parse_json(&text)
        } else {
            Self::parse_yaml(&text)
        }
    }

    /// Writes the tree as YAML, or as pretty-printed JSON when `path` ends in
    /// `.json`. The write is atomic.
    pub fn dump(&self, path: &Path) -> Result<(), TreeError> {
        let text = if is_json(path) {
            serde_json::to_string_pretty(&self.root.to_yaml())
                .map_err(|e| TreeError::Parse(e.to_string()))?
        } else {
            self.to_yaml_string()?
        };
        atomic_write_bytes(path, text.as_bytes()).map_err(|source| TreeError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn to_yaml_string(&self) -> Result<String, TreeError> {
        serde_yaml::to_string(&self.root.to_yaml()).map_err(|e| TreeError::Parse(e.to_string()))
    }

    pub fn root(&self) -> &ConfigNode {
        &self.root
    }

    pub fn get(&self, path: &str) -> Option<&ConfigNode> {
        let segments = split_path(path).ok()?;
        let mut cur = &self.root;
        for seg in segments {
            cur = cur.as_mapping()?.get(seg)?;
        }
        Some(cur)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Sets the node at `path`, creating missing intermediate mappings.
    /// Siblings along the way are left untouched; a non-mapping node in the
    /// middle of the path is reported rather than overwritten.
    pub fn set(&mut self, path: &str, value: ConfigNode) -> Result<(), TreeError> {
        let segments = split_path(path)?;
        let slot = self.slot_mut(&segments)?;
        *slot = value;
        Ok(())
    }

    /// Deep-merges `overlay` into the node at `path` (created when missing).
    pub fn merge(&mut self, path: &str, overlay: &ConfigNode) -> Result<(), TreeError> {
        let segments = split_path(path)?;
        let slot = self.slot_mut(&segments)?;
        if matches!(slot, ConfigNode::Scalar(Scalar::Null)) {
            *slot = overlay.clone();
        } else {
            merge_into(slot, overlay);
        }
        Ok(())
    }

    /// Copy of this tree with one edit applied; the receiver is unchanged.
    pub fn with(&self, path: &str, value: ConfigNode) -> Result<Self, TreeError> {
        let mut derived = self.clone();
        derived.set(path, value)?;
        Ok(derived)
    }

    fn slot_mut(&mut self, segments: &[&str]) -> Result<&mut ConfigNode, TreeError> {
        let mut cur = &mut self.root;
        for (depth, seg) in segments.iter().enumerate() {
            cur = match cur {
                ConfigNode::Mapping(map) => Arc::make_mut(map)
                    .get_or_insert_with(seg, || ConfigNode::Scalar(Scalar::Null)),
                _ => {
                    return Err(TreeError::NotAMapping {
                        path: segments[..depth].join("."),
                    })
                }
            };
            let is_last = depth + 1 == segments.len();
            if !is_last && matches!(cur, ConfigNode::Scalar(Scalar::Null)) {
                *cur = ConfigNode::empty_mapping();
            }
        }
        Ok(cur)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ConfigTree {
        ConfigTree::parse_yaml(
            r#"
sys:
  cores:
    c: { cores: 4, type: OOO }
  caches:
    l2: { size: 262144, repl: { type: LRU } }
sim:
  phaseLength: 10000
"#,
        )
        .expect("parse")
    }

    #[test]
    fn set_replaces_leaf_and_keeps_siblings() {
        let mut tree = base();
        tree.set("sys.caches.l2.repl", ConfigNode::str("SRRIP"))
            .expect("set");
        assert_eq!(
            tree.get("sys.caches.l2.repl").and_then(|n| n.as_str()),
            Some("SRRIP")
        );
        assert_eq!(
            tree.get("sys.caches.l2.size"),
            Some(&ConfigNode::int(262144))
        );
        assert_eq!(tree.get("sys.cores"), base().get("sys.cores"));
        assert_eq!(tree.get("sim"), base().get("sim"));
    }

    #[test]
    fn set_creates_intermediate_mappings() {
        let mut tree = base();
        tree.set("sys.caches.l3.repl.type", ConfigNode::str("SRRIP"))
            .expect("set");
        assert_eq!(
            tree.get("sys.caches.l3.repl.type").and_then(|n| n.as_str()),
            Some("SRRIP")
        );
        let keys: Vec<&str> = tree
            .get("sys.caches")
            .and_then(|n| n.as_mapping())
            .expect("caches")
            .keys()
            .collect();
        assert_eq!(keys, vec!["l2", "l3"]);
    }

    #[test]
    fn set_through_scalar_is_a_collision() {
        let mut tree = base();
        let err = tree
            .set("sim.phaseLength.inner", ConfigNode::int(1))
            .expect_err("scalar in path");
        assert!(matches!(err, TreeError::NotAMapping { ref path } if path == "sim.phaseLength"));
        assert_eq!(tree, base());
    }

    #[test]
    fn derived_trees_do_not_touch_the_base() {
        let original = base();
        let derived = original
            .with("process0.command", ConfigNode::str("ls"))
            .expect("derive");
        assert!(original.get("process0").is_none());
        assert!(derived.contains("process0.command"));
    }

    #[test]
    fn merge_overlays_nested_keys() {
        let mut tree = base();
        let overlay = ConfigTree::parse_yaml("perProcessDir: true\nphaseLength: 5000\n")
            .expect("overlay");
        tree.merge("sim", overlay.root()).expect("merge");
        assert_eq!(tree.get("sim.phaseLength"), Some(&ConfigNode::int(5000)));
        assert_eq!(tree.get("sim.perProcessDir"), Some(&ConfigNode::bool(true)));
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let mut tree = base();
        assert!(matches!(
            tree.set("sys..l2", ConfigNode::int(1)),
            Err(TreeError::InvalidPath(_))
        ));
        assert!(tree.get("").is_none());
    }

    #[test]
    fn dump_and_load_preserve_unrelated_keys() {
        let root = std::env::temp_dir().join(format!(
            "simsweep_tree_test_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        ));
        let path = root.join("out.cfg");
        let mut tree = base();
        tree.set("process0.command", ConfigNode::str("bzip2 dryer.jpg 2"))
            .expect("set");
        tree.dump(&path).expect("dump");
        let loaded = ConfigTree::load(&path).expect("load");
        assert_eq!(loaded, tree);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn dump_format_follows_extension() {
        let root = std::env::temp_dir().join(format!(
            "simsweep_tree_format_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        ));
        let tree = base();

        let json_path = root.join("out.json");
        tree.dump(&json_path).expect("dump json");
        let text = fs::read_to_string(&json_path).expect("read json");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["sys"]["caches"]["l2"]["size"], serde_json::json!(262144));
        assert!(text.contains("\n  \"sys\""));

        let yaml_path = root.join("out.cfg");
        tree.dump(&yaml_path).expect("dump yaml");
        let text = fs::read_to_string(&yaml_path).expect("read yaml");
        assert!(serde_json::from_str::<serde_json::Value>(&text).is_err());
        let value: YamlValue = serde_yaml::from_str(&text).expect("valid yaml");
        assert_eq!(value["sim"]["phaseLength"], YamlValue::from(10000));
        let _ = fs::remove_dir_all(root);
    }
}
