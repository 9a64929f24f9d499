//! Reading and rewriting the helper-server map of a client configuration.
//!
//! Only the `mcpServers` object is interpreted; every other key in the
//! document is carried through untouched (key order included) when the file
//! is rewritten.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::clients::errors::ClientError;
use crate::clients::types::HelperProcess;

/// Name of the helper-server map inside a client configuration.
pub const HELPER_SERVERS_KEY: &str = "mcpServers";

/// Helpers parsed from a configuration file, plus entries that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHelpers {
    pub helpers: Vec<HelperProcess>,
    /// `(helper name, problem)` for entries that could not be used.
    pub issues: Vec<(Option<String>, String)>,
}

/// Read and parse a client configuration document.
pub fn load_document(path: &Path) -> Result<Value, ClientError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ClientError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(ClientError::IoError { source: e }),
    };

    // An empty file is treated as an empty configuration, which is what the
    // clients themselves do on first launch.
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_str(&content).map_err(|e| ClientError::ConfigParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a configuration document atomically (temp file + rename).
///
/// A symlinked configuration is rewritten at its target, and the existing
/// file's permissions carry over to the new one.
pub fn save_document(path: &Path, document: &Value) -> Result<(), ClientError> {
    let content =
        serde_json::to_string_pretty(document).map_err(|e| ClientError::InvalidDocument {
            message: e.to_string(),
        })?;

    let target = match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(path)?,
        _ => path.to_path_buf(),
    };
    let permissions = fs::metadata(&target).ok().map(|m| m.permissions());

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_file = target.with_extension("json.medic-tmp");

    if let Err(e) = fs::write(&temp_file, format!("{}\n", content)) {
        cleanup_temp_file(&temp_file, &e);
        return Err(ClientError::IoError { source: e });
    }

    if let Some(permissions) = permissions
        && let Err(e) = fs::set_permissions(&temp_file, permissions)
    {
        cleanup_temp_file(&temp_file, &e);
        return Err(ClientError::IoError { source: e });
    }

    if let Err(e) = fs::rename(&temp_file, &target) {
        cleanup_temp_file(&temp_file, &e);
        return Err(ClientError::IoError { source: e });
    }

    Ok(())
}

fn cleanup_temp_file(temp_file: &Path, original_error: &std::io::Error) {
    if let Err(cleanup_err) = fs::remove_file(temp_file) {
        tracing::warn!(
            event = "core.clients.temp_file_cleanup_failed",
            temp_file = %temp_file.display(),
            original_error = %original_error,
            cleanup_error = %cleanup_err,
        );
    }
}

/// Extract helper processes from a configuration document.
///
/// Malformed entries are reported in `issues` and skipped rather than
/// failing the whole document.
pub fn parse_helpers(document: &Value) -> ParsedHelpers {
    let mut parsed = ParsedHelpers::default();

    let Some(root) = document.as_object() else {
        parsed
            .issues
            .push((None, "configuration root is not a JSON object".to_string()));
        return parsed;
    };

    let servers = match root.get(HELPER_SERVERS_KEY) {
        None | Some(Value::Null) => return parsed,
        Some(Value::Object(servers)) => servers,
        Some(_) => {
            parsed
                .issues
                .push((None, format!("'{}' is not a JSON object", HELPER_SERVERS_KEY)));
            return parsed;
        }
    };

    for (name, entry) in servers {
        match parse_entry(name, entry) {
            Ok(helper) => parsed.helpers.push(helper),
            Err(message) => parsed.issues.push((Some(name.clone()), message)),
        }
    }

    parsed
}

fn parse_entry(name: &str, entry: &Value) -> Result<HelperProcess, String> {
    let object = entry
        .as_object()
        .ok_or_else(|| "entry is not a JSON object".to_string())?;

    let command = match object.get("command") {
        Some(Value::String(command)) if !command.trim().is_empty() => command.clone(),
        Some(Value::String(_)) => return Err("'command' is empty".to_string()),
        Some(_) => return Err("'command' is not a string".to_string()),
        None => return Err("'command' is missing".to_string()),
    };

    let args = match object.get("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(format!("'args' contains a non-string value: {}", other)),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err("'args' is not an array".to_string()),
    };

    let env = match object.get("env") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(vars)) => vars
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => Ok((key.clone(), s.clone())),
                other => Err(format!("'env.{}' is not a string: {}", key, other)),
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?,
        Some(_) => return Err("'env' is not an object".to_string()),
    };

    let cwd = match object.get("cwd") {
        None | Some(Value::Null) => None,
        Some(Value::String(cwd)) if cwd.trim().is_empty() => None,
        Some(Value::String(cwd)) => Some(PathBuf::from(cwd)),
        Some(_) => return Err("'cwd' is not a string".to_string()),
    };

    Ok(HelperProcess {
        name: name.to_string(),
        command,
        args,
        env,
        cwd,
        last_known_status: Default::default(),
    })
}

/// Read the helpers of the configuration file at `path`.
pub fn read_helpers(path: &Path) -> Result<ParsedHelpers, ClientError> {
    let document = load_document(path)?;
    Ok(parse_helpers(&document))
}

/// Mutable access to one helper entry of a document.
pub fn helper_entry_mut<'a>(
    document: &'a mut Value,
    name: &str,
) -> Option<&'a mut Map<String, Value>> {
    document
        .get_mut(HELPER_SERVERS_KEY)?
        .get_mut(name)?
        .as_object_mut()
}
