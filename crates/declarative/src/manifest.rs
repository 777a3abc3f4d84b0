//! Manifest loading and validation
//!
//! The manifest is an ordered sequence of resource objects, written either
//! as TOML (`[[resources]]` tables) or JSON (a top-level array, or an object
//! with a `resources` array). Loading never stops at the first problem:
//! every malformed entry is reported, so one run shows the operator the
//! complete list of things to fix.

use crate::error::{Error, Result};
use crate::types::{InventoryEntry, PowerState, ResourceKind, ResourceSpec, single_line};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Lowest id a resource may use; Proxmox reserves everything below.
pub const MIN_ID: u32 = 100;
/// Highest id Proxmox accepts.
pub const MAX_ID: u32 = 999_999_999;

const KNOWN_KEYS: [&str; 9] = [
    "kind",
    "id",
    "hostname",
    "template",
    "memoryMB",
    "cores",
    "networkSpec",
    "storageSpec",
    "desiredPower",
];

/// Manifest serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    /// Pick a format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// A malformed manifest entry (or an unreadable document)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigError {
    /// 1-based position in the manifest, `None` for document-level problems
    pub entry: Option<usize>,
    /// Resource id, when it could be determined
    pub id: Option<u32>,
    pub message: String,
}

impl ConfigError {
    pub fn document(message: impl Into<String>) -> Self {
        Self {
            entry: None,
            id: None,
            message: message.into(),
        }
    }

    pub fn entry(entry: usize, id: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            entry: Some(entry),
            id,
            message: message.into(),
        }
    }

    /// An error about a resource rather than a manifest position
    pub fn resource(id: u32, message: impl Into<String>) -> Self {
        Self {
            entry: None,
            id: Some(id),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = single_line(&self.message);
        match (self.entry, self.id) {
            (Some(entry), Some(id)) => write!(f, "entry {entry} (id {id}): {message}"),
            (Some(entry), None) => write!(f, "entry {entry}: {message}"),
            (None, Some(id)) => write!(f, "id {id}: {message}"),
            (None, None) => write!(f, "manifest: {message}"),
        }
    }
}

/// Result of parsing and validating a manifest document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Valid, uniquely-identified resources in document order
    pub specs: Vec<ResourceSpec>,
    pub errors: Vec<ConfigError>,
}

impl Manifest {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A manifest read from disk
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub format: ManifestFormat,
    /// Short content digest, identifies the manifest revision in reports
    pub digest: String,
    pub manifest: Manifest,
}

/// Read and validate a manifest file.
///
/// Only an unreadable file is an `Err`; everything wrong with the content
/// ends up in [`Manifest::errors`].
pub fn load(path: &Path) -> Result<LoadedManifest> {
    let content = fs::read_to_string(path).map_err(|source| Error::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;

    let (format, manifest) = match ManifestFormat::from_path(path) {
        Some(format) => (format, parse(&content, format)),
        None => {
            let as_toml = parse(&content, ManifestFormat::Toml);
            let as_json = parse(&content, ManifestFormat::Json);
            if is_unparseable(&as_toml) && !is_unparseable(&as_json) {
                (ManifestFormat::Json, as_json)
            } else {
                (ManifestFormat::Toml, as_toml)
            }
        }
    };

    log::debug!(
        "loaded manifest {} ({} valid, {} errors)",
        path.display(),
        manifest.specs.len(),
        manifest.errors.len()
    );

    Ok(LoadedManifest {
        path: path.to_path_buf(),
        format,
        digest: digest(&content),
        manifest,
    })
}

/// Content digest of a manifest document
pub fn digest(content: &str) -> String {
    let hash = blake3::hash(content.as_bytes()).to_hex();
    hash.as_str()[..16].to_string()
}

fn is_unparseable(manifest: &Manifest) -> bool {
    manifest.specs.is_empty() && manifest.errors.iter().any(|e| e.entry.is_none())
}

/// Parse and validate a manifest document.
pub fn parse(content: &str, format: ManifestFormat) -> Manifest {
    let entries = match parse_document(content, format) {
        Ok(entries) => entries,
        Err(message) => {
            return Manifest {
                specs: Vec::new(),
                errors: vec![ConfigError::document(message)],
            };
        }
    };

    let mut candidates = Vec::new();
    let mut errors = Vec::new();
    let mut first_seen: BTreeMap<u32, usize> = BTreeMap::new();
    let mut duplicated: BTreeSet<u32> = BTreeSet::new();

    for (i, value) in entries.iter().enumerate() {
        let index = i + 1;

        match validate_entry(index, value) {
            Ok(spec) => candidates.push(spec),
            Err(entry_errors) => errors.extend(entry_errors),
        }

        if let Some(id) = value.get("id").and_then(|v| parse_id(v).ok()) {
            if let Some(first) = first_seen.get(&id) {
                errors.push(ConfigError::entry(
                    index,
                    Some(id),
                    format!("duplicate id {id} (first declared in entry {first})"),
                ));
                duplicated.insert(id);
            } else {
                first_seen.insert(id, index);
            }
        }
    }

    // No occurrence of a duplicated id is trusted, not even the first
    let specs = candidates
        .into_iter()
        .filter(|spec| !duplicated.contains(&spec.id))
        .collect();

    Manifest { specs, errors }
}

fn parse_document(content: &str, format: ManifestFormat) -> std::result::Result<Vec<Value>, String> {
    let document: Value = match format {
        ManifestFormat::Toml => {
            toml::from_str(content).map_err(|e| format!("invalid TOML: {}", e.message()))?
        }
        ManifestFormat::Json => {
            serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))?
        }
    };

    match document {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => match map.remove("resources") {
            Some(Value::Array(entries)) => {
                if let Some(key) = map.keys().next() {
                    return Err(format!("unknown top-level key '{key}'"));
                }
                Ok(entries)
            }
            Some(_) => Err("'resources' must be a list".to_string()),
            None if map.is_empty() => Ok(Vec::new()),
            None => Err("expected a 'resources' list".to_string()),
        },
        _ => Err("expected a list of resources".to_string()),
    }
}

fn validate_entry(index: usize, value: &Value) -> std::result::Result<ResourceSpec, Vec<ConfigError>> {
    let Some(map) = value.as_object() else {
        return Err(vec![ConfigError::entry(index, None, "entry is not a table")]);
    };

    let id = map.get("id").map(parse_id);
    let known_id = id.as_ref().and_then(|r| r.as_ref().ok()).copied();

    let mut problems: Vec<String> = map
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .map(|key| format!("unknown field '{key}'"))
        .collect();

    let kind = required_str(map, "kind").and_then(|s| {
        ResourceKind::parse(s)
            .ok_or_else(|| format!("kind '{s}' is not one of container, virtualMachine"))
    });
    let kind = take(kind, &mut problems);
    let id = take(
        id.unwrap_or_else(|| Err("missing required field 'id'".to_string())),
        &mut problems,
    );
    let hostname = take(
        required_str(map, "hostname").and_then(|h| validate_hostname(h).map(|()| h)),
        &mut problems,
    );
    let template = take(optional_str(map, "template"), &mut problems);
    let memory_mb = take(positive(map, "memoryMB"), &mut problems);
    let cores = take(positive(map, "cores"), &mut problems);
    let network_spec = take(optional_str(map, "networkSpec"), &mut problems);
    let storage_spec = take(optional_str(map, "storageSpec"), &mut problems);
    let desired_power = match optional_str(map, "desiredPower") {
        Ok(None) => Ok(PowerState::Running),
        Ok(Some(p)) => PowerState::parse(p)
            .ok_or_else(|| format!("desiredPower '{p}' is not one of running, stopped")),
        Err(e) => Err(e),
    };
    let desired_power = take(desired_power, &mut problems);

    match (
        kind,
        id,
        hostname,
        template,
        memory_mb,
        cores,
        network_spec,
        storage_spec,
        desired_power,
    ) {
        (
            Some(kind),
            Some(id),
            Some(hostname),
            Some(template),
            Some(memory_mb),
            Some(cores),
            Some(network_spec),
            Some(storage_spec),
            Some(desired_power),
        ) if problems.is_empty() => Ok(ResourceSpec {
            kind,
            id,
            hostname: hostname.to_string(),
            template: template.map(str::to_string),
            memory_mb,
            cores,
            network_spec: network_spec.map(str::to_string),
            storage_spec: storage_spec.map(str::to_string),
            desired_power,
        }),
        _ => Err(problems
            .into_iter()
            .map(|p| ConfigError::entry(index, known_id, p))
            .collect()),
    }
}

fn take<T>(result: std::result::Result<T, String>, problems: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(problem) => {
            problems.push(problem);
            None
        }
    }
}

fn parse_id(value: &Value) -> std::result::Result<u32, String> {
    let raw = match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| format!("id {n} is not an integer"))?,
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("id '{s}' is not an integer"))?,
        other => return Err(format!("id {other} is not an integer")),
    };

    if raw <= 0 {
        return Err(format!("id {raw} must be positive"));
    }
    if raw < i64::from(MIN_ID) {
        return Err(format!("id {raw} is reserved (ids start at {MIN_ID})"));
    }
    if raw > i64::from(MAX_ID) {
        return Err(format!("id {raw} exceeds {MAX_ID}"));
    }
    Ok(raw as u32)
}

fn required_str<'a>(map: &'a Map<String, Value>, key: &str) -> std::result::Result<&'a str, String> {
    match optional_str(map, key)? {
        Some(s) => Ok(s),
        None => Err(format!("missing required field '{key}'")),
    }
}

fn optional_str<'a>(
    map: &'a Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<&'a str>, String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Err(format!("'{key}' is empty")),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(format!("'{key}' must be a string, got {other}")),
    }
}

fn positive(map: &Map<String, Value>, key: &str) -> std::result::Result<u32, String> {
    match map.get(key) {
        None | Some(Value::Null) => Err(format!("missing required field '{key}'")),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) if v > 0 && v <= i64::from(u32::MAX) => Ok(v as u32),
            Some(v) if v <= 0 => Err(format!("'{key}' must be positive, got {v}")),
            _ => Err(format!("'{key}' is out of range: {n}")),
        },
        Some(other) => Err(format!("'{key}' must be an integer, got {other}")),
    }
}

fn validate_hostname(hostname: &str) -> std::result::Result<(), String> {
    let valid = hostname.len() <= 253
        && hostname.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if valid {
        Ok(())
    } else {
        Err(format!("hostname '{hostname}' is not a valid DNS name"))
    }
}

// ============================================================================
// Manifest fragments
// ============================================================================

/// One manifest entry in serialized form
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub kind: ResourceKind,
    pub id: u32,
    pub hostname: String,
    #[serde(rename = "memoryMB")]
    pub memory_mb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_spec: Option<String>,
    pub desired_power: PowerState,
}

impl From<&InventoryEntry> for ManifestEntry {
    fn from(entry: &InventoryEntry) -> Self {
        Self {
            kind: entry.kind,
            id: entry.id,
            hostname: entry.actual_hostname.clone(),
            memory_mb: entry.actual_memory_mb,
            cores: entry.actual_cores,
            network_spec: entry.actual_network.clone(),
            storage_spec: entry.actual_storage.clone(),
            desired_power: if entry.actual_power.is_stopped() {
                PowerState::Stopped
            } else {
                PowerState::Running
            },
        }
    }
}

#[derive(Serialize)]
struct Fragment<'a> {
    resources: [&'a ManifestEntry; 1],
}

/// Render an entry as a `[[resources]]` TOML table ready to paste into a manifest
pub fn to_toml_fragment(entry: &ManifestEntry) -> String {
    let mut out = toml::to_string(&Fragment { resources: [entry] })
        .unwrap_or_else(|e| format!("# could not render fragment: {e}\n"));
    if entry.cores.is_none() {
        out.push_str("# cores: no limit set on the host, choose one before adopting\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObservedPower;
    use tempfile::TempDir;

    const VALID: &str = r#"
[[resources]]
kind = "container"
id = 100
hostname = "web01"
template = "local:vztmpl/debian-12-standard_12.2-1_amd64.tar.zst"
memoryMB = 1024
cores = 2
networkSpec = "name=eth0,bridge=vmbr0,ip=dhcp"
storageSpec = "local-lvm:8"

[[resources]]
kind = "virtualMachine"
id = "200"
hostname = "build"
memoryMB = 4096
cores = 4
desiredPower = "stopped"
"#;

    #[test]
    fn test_parse_valid_toml() {
        let manifest = parse(VALID, ManifestFormat::Toml);
        assert!(manifest.is_valid(), "{:?}", manifest.errors);
        assert_eq!(manifest.specs.len(), 2);

        let web = &manifest.specs[0];
        assert_eq!(web.kind, ResourceKind::Container);
        assert_eq!(web.id, 100);
        assert_eq!(web.desired_power, PowerState::Running);
        assert_eq!(web.storage_spec.as_deref(), Some("local-lvm:8"));

        let build = &manifest.specs[1];
        assert_eq!(build.id, 200);
        assert_eq!(build.template, None);
        assert_eq!(build.desired_power, PowerState::Stopped);
    }

    #[test]
    fn test_parse_json_array_and_object() {
        let array = r#"[{"kind": "vm", "id": 300, "hostname": "db", "memoryMB": 2048, "cores": 2}]"#;
        let manifest = parse(array, ManifestFormat::Json);
        assert!(manifest.is_valid());
        assert_eq!(manifest.specs[0].kind, ResourceKind::VirtualMachine);

        let object = format!(r#"{{"resources": {array}}}"#);
        assert_eq!(parse(&object, ManifestFormat::Json), manifest);
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        let manifest = parse("", ManifestFormat::Toml);
        assert!(manifest.is_valid());
        assert!(manifest.specs.is_empty());
    }

    #[test]
    fn test_duplicate_id_is_error_not_last_wins() {
        let content = r#"
[[resources]]
kind = "container"
id = 100
hostname = "a"
memoryMB = 1024
cores = 2

[[resources]]
kind = "container"
id = 100
hostname = "b"
memoryMB = 2048
cores = 2
"#;
        let manifest = parse(content, ManifestFormat::Toml);
        assert_eq!(manifest.errors.len(), 1);
        assert!(manifest.errors[0].message.contains("duplicate id 100"));
        assert_eq!(manifest.errors[0].entry, Some(2));
        assert!(manifest.specs.is_empty());
    }

    #[test]
    fn test_every_malformed_entry_reported() {
        let content = r#"
[[resources]]
kind = "pod"
id = 100
hostname = "a"
memoryMB = 0
cores = 2

[[resources]]
kind = "container"
id = -5
hostname = "b"
memoryMB = 512
cores = "two"
desiredPower = "paused"

[[resources]]
kind = "container"
id = 102
hostname = "fine"
memoryMB = 512
cores = 1
"#;
        let manifest = parse(content, ManifestFormat::Toml);
        assert_eq!(manifest.specs.len(), 1);
        assert_eq!(manifest.specs[0].id, 102);

        let first: Vec<_> = manifest.errors.iter().filter(|e| e.entry == Some(1)).collect();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|e| e.id == Some(100)));

        let second: Vec<_> = manifest.errors.iter().filter(|e| e.entry == Some(2)).collect();
        assert_eq!(second.len(), 3);
        assert!(second.iter().any(|e| e.message.contains("must be positive")));
        assert!(second.iter().any(|e| e.message.contains("'cores' must be an integer")));
        assert!(second.iter().any(|e| e.message.contains("desiredPower")));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let content = r#"[{"kind": "ct", "id": 100, "hostname": "a", "memoryMB": 512, "cores": 1, "memroy": 2}]"#;
        let manifest = parse(content, ManifestFormat::Json);
        assert_eq!(manifest.errors.len(), 1);
        assert!(manifest.errors[0].message.contains("unknown field 'memroy'"));
    }

    #[test]
    fn test_reserved_id_and_bad_hostname() {
        let content = r#"[{"kind": "ct", "id": 42, "hostname": "bad_name", "memoryMB": 512, "cores": 1}]"#;
        let manifest = parse(content, ManifestFormat::Json);
        assert_eq!(manifest.errors.len(), 2);
        assert!(manifest.errors.iter().any(|e| e.message.contains("reserved")));
        assert!(manifest.errors.iter().any(|e| e.message.contains("valid DNS name")));
    }

    #[test]
    fn test_unparseable_document_is_single_error() {
        let manifest = parse("[[resources]\nkind = ", ManifestFormat::Toml);
        assert_eq!(manifest.errors.len(), 1);
        assert_eq!(manifest.errors[0].entry, None);
    }

    #[test]
    fn test_load_reads_file_and_digests() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hosts.toml");
        fs::write(&path, VALID).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.format, ManifestFormat::Toml);
        assert_eq!(loaded.manifest.specs.len(), 2);
        assert_eq!(loaded.digest.len(), 16);
        assert_eq!(loaded.digest, digest(VALID));
    }

    #[test]
    fn test_load_sniffs_json_without_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest");
        fs::write(&path, r#"[{"kind": "ct", "id": 100, "hostname": "a", "memoryMB": 512, "cores": 1}]"#)
            .unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.format, ManifestFormat::Json);
        assert!(loaded.manifest.is_valid());
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(load(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_fragment_round_trips_through_loader() {
        let entry = InventoryEntry {
            kind: ResourceKind::Container,
            id: 999,
            actual_hostname: "stray".to_string(),
            actual_memory_mb: 512,
            actual_cores: Some(1),
            actual_network: Some("name=eth0,bridge=vmbr0".to_string()),
            actual_storage: Some("local-lvm:vm-999-disk-0,size=4G".to_string()),
            actual_power: ObservedPower::Running,
        };
        let fragment = to_toml_fragment(&ManifestEntry::from(&entry));
        assert!(fragment.contains("[[resources]]"));

        let manifest = parse(&fragment, ManifestFormat::Toml);
        assert!(manifest.is_valid(), "{:?}", manifest.errors);
        assert_eq!(manifest.specs[0].id, 999);
        assert_eq!(manifest.specs[0].hostname, "stray");
    }
}
