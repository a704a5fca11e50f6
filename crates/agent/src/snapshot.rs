//! Conversation persistence (spec §4.6): a single self-describing JSON
//! document capturing an [`AgentState`] snapshot, reusing the crash-safety
//! idiom from `vellum_memory::event_log` (write `.tmp`, `fsync`, atomic
//! rename) but as one document rather than an append-only log, since a
//! snapshot always represents the *current* state, not a history of it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use vellum_core::{Error, Result};
use vellum_tools::ToolRegistry;

use crate::state::AgentState;

/// On-disk shape of a snapshot. Distinct from [`AgentState`] only by a
/// format version tag, so a future incompatible change can be detected
/// rather than silently misparsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotDocument {
    format_version: u32,
    state: AgentState,
}

const FORMAT_VERSION: u32 = 1;

fn io_err(stage: &str, e: std::io::Error) -> Error {
    Error::Processing { stage: stage.to_string(), message: e.to_string() }
}

fn json_err(stage: &str, e: serde_json::Error) -> Error {
    Error::Corrupt { reason: format!("{stage}: {e}") }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Writes `state` to `path` as a single JSON document: serialize, write to
/// a `.tmp` sibling, `fsync`, then atomically rename over `path`. A reader
/// never observes a partially-written snapshot.
pub async fn save_to_path(state: &AgentState, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let document = SnapshotDocument { format_version: FORMAT_VERSION, state: state.clone() };
    let rendered = serde_json::to_vec_pretty(&document).map_err(|e| json_err("serializing snapshot", e))?;

    let tmp_path = tmp_sibling(path);
    let result: Result<()> = async {
        let mut file = fs::File::create(&tmp_path).await.map_err(|e| io_err("creating snapshot tmp file", e))?;
        file.write_all(&rendered).await.map_err(|e| io_err("writing snapshot tmp file", e))?;
        file.flush().await.map_err(|e| io_err("flushing snapshot tmp file", e))?;
        file.sync_all().await.map_err(|e| io_err("fsyncing snapshot tmp file", e))?;
        fs::rename(&tmp_path, path).await.map_err(|e| io_err("renaming snapshot into place", e))?;
        Ok(())
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

/// Loads a snapshot from `path`, re-binding the tool handlers it
/// references against `registry` by name. A tool name the snapshot
/// references but `registry` doesn't have fails with
/// [`Error::Processing`] naming the missing tool (spec §4.6, §8 invariant
/// 6: `load(save(state)) == state` modulo this rebinding).
pub async fn load_from_path(path: impl AsRef<Path>, registry: &ToolRegistry) -> Result<AgentState> {
    let path = path.as_ref();
    let bytes = fs::read(path).await.map_err(|e| io_err("reading snapshot file", e))?;
    let document: SnapshotDocument = serde_json::from_slice(&bytes).map_err(|e| json_err("parsing snapshot", e))?;

    if document.format_version != FORMAT_VERSION {
        return Err(Error::Corrupt {
            reason: format!("unsupported snapshot format version {}", document.format_version),
        });
    }

    for name in &document.state.tool_names {
        if registry.get(name).is_none() {
            return Err(Error::Processing {
                stage: "snapshot load".to_string(),
                message: format!("missing tool handler: {name}"),
            });
        }
    }

    Ok(document.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vellum_core::{object, string};
    use vellum_tools::{Tool, ToolDescriptor};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "echo".into(),
                description: "echo".into(),
                parameters: object().with_property("text", string(), true),
            }
        }
        async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
            Ok(arguments)
        }
    }

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("vellum-agent-snapshot-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn save_then_load_round_trips_state() {
        let state = AgentState::initialize("hello", Some("be terse".into()), vec!["echo".into()], vec![]).unwrap();
        let path = temp_path();
        save_to_path(&state, &path).await.unwrap();

        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let loaded = load_from_path(&path, &registry).await.unwrap();
        assert_eq!(loaded, state);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn load_fails_when_a_referenced_tool_is_missing() {
        let state = AgentState::initialize("hello", None, vec!["missing_tool".into()], vec![]).unwrap();
        let path = temp_path();
        save_to_path(&state, &path).await.unwrap();

        let registry = ToolRegistry::new();
        let err = load_from_path(&path, &registry).await.unwrap_err();
        assert!(matches!(err, Error::Processing { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn save_overwrites_an_existing_snapshot_atomically() {
        let state_a = AgentState::initialize("first", None, vec![], vec![]).unwrap();
        let path = temp_path();
        save_to_path(&state_a, &path).await.unwrap();

        let state_b = AgentState::initialize("second", None, vec![], vec![]).unwrap();
        save_to_path(&state_b, &path).await.unwrap();

        let registry = ToolRegistry::new();
        let loaded = load_from_path(&path, &registry).await.unwrap();
        assert_eq!(loaded.initial_query, "second");

        let _ = std::fs::remove_file(&path);
    }
}
