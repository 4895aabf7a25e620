//! Best-effort decoding of `stream-json` agent output into [`AgentEvent`]s.
//!
//! Unknown shapes and non-JSON lines are ignored. File-writing tool calls are
//! collected as artifact claims for the terminal outcome.

use serde_json::Value;

use phasegate_core::record::ArtifactKind;
use phasegate_core::runner::{AgentEvent, ArtifactClaim};
use phasegate_core::util::preview;

const CREATE_TOOLS: &[&str] = &["Write", "write_file", "create_file"];
const MODIFY_TOOLS: &[&str] = &["Edit", "MultiEdit", "NotebookEdit", "replace", "edit_file"];
const SHELL_TOOLS: &[&str] = &["Bash", "run_shell_command", "shell"];

#[derive(Debug, Clone, PartialEq)]
pub struct FinalResult {
    pub success: bool,
    pub duration_ms: Option<u64>,
    pub cost_usd: Option<f64>,
    pub summary: String,
}

#[derive(Debug, Default)]
pub struct StreamJsonDecoder {
    claims: Vec<ArtifactClaim>,
    last_text: Option<String>,
    finished: Option<FinalResult>,
}

fn str_field<'v>(v: &'v Value, key: &str) -> Option<&'v str> {
    v.get(key).and_then(Value::as_str)
}

fn file_path(input: &Value) -> Option<&str> {
    ["file_path", "path", "notebook_path", "absolute_path"]
        .iter()
        .find_map(|k| str_field(input, k))
}

/// Paths removed by a plain `rm` invocation (flags skipped).
fn removed_paths(command: &str) -> Vec<String> {
    let mut words = command.split_whitespace();
    if words.next() != Some("rm") {
        return Vec::new();
    }
    words
        .filter(|w| !w.starts_with('-'))
        .take_while(|w| !matches!(*w, "&&" | ";" | "|" | "||"))
        .map(|w| w.trim_matches(['"', '\'']).to_string())
        .collect()
}

impl StreamJsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode_line(&mut self, line: &str) -> Vec<AgentEvent> {
        let line = line.trim();
        if !line.starts_with('{') {
            return Vec::new();
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) => self.decode_value(&v),
            Err(_) => Vec::new(),
        }
    }

    pub fn decode_value(&mut self, v: &Value) -> Vec<AgentEvent> {
        let mut out = Vec::new();
        match str_field(v, "type") {
            // {"type":"assistant","message":{"content":[{"type":"text"|"tool_use",..}]}}
            Some("assistant") => {
                let items = v
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_array);
                for item in items.into_iter().flatten() {
                    match str_field(item, "type") {
                        Some("text") | Some("output_text") => {
                            if let Some(text) = str_field(item, "text").filter(|t| !t.trim().is_empty()) {
                                self.last_text = Some(text.to_string());
                                out.push(AgentEvent::Progress(text.to_string()));
                            }
                        }
                        Some("tool_use") => {
                            let tool = str_field(item, "name").unwrap_or("tool");
                            let input = item.get("input").unwrap_or(&Value::Null);
                            out.push(self.tool_call(tool, input));
                        }
                        _ => {}
                    }
                }
            }
            // {"type":"tool_use","tool_name":..,"parameters":{..}}
            Some("tool_use") => {
                let tool = str_field(v, "tool_name").unwrap_or("tool");
                let input = v.get("parameters").unwrap_or(&Value::Null);
                out.push(self.tool_call(tool, input));
            }
            // {"type":"result","subtype":"success","is_error":false,"duration_ms":..,"total_cost_usd":..,"result":".."}
            Some("result") => {
                let is_error = v.get("is_error").and_then(Value::as_bool).unwrap_or(false)
                    || str_field(v, "subtype").is_some_and(|s| s.starts_with("error"))
                    || str_field(v, "status") == Some("error");
                let summary = str_field(v, "result")
                    .map(str::to_string)
                    .or_else(|| self.last_text.clone())
                    .unwrap_or_default();
                let result = FinalResult {
                    success: !is_error,
                    duration_ms: v.get("duration_ms").and_then(Value::as_u64),
                    cost_usd: v
                        .get("total_cost_usd")
                        .or_else(|| v.get("cost_usd"))
                        .and_then(Value::as_f64),
                    summary,
                };
                out.push(AgentEvent::Finished {
                    success: result.success,
                    duration_ms: result.duration_ms,
                    cost_usd: result.cost_usd,
                    summary: preview(&result.summary),
                });
                self.finished = Some(result);
            }
            _ => {}
        }
        out
    }

    fn tool_call(&mut self, tool: &str, input: &Value) -> AgentEvent {
        let summary = if let Some(path) = file_path(input) {
            if CREATE_TOOLS.contains(&tool) {
                self.claim(path, ArtifactKind::Created);
            } else if MODIFY_TOOLS.contains(&tool) {
                self.claim(path, ArtifactKind::Modified);
            }
            path.to_string()
        } else if let Some(command) = str_field(input, "command") {
            if SHELL_TOOLS.contains(&tool) {
                for path in removed_paths(command) {
                    self.claim(&path, ArtifactKind::Deleted);
                }
            }
            preview(command)
        } else {
            String::new()
        };
        AgentEvent::ToolInvocation {
            tool: tool.to_string(),
            summary,
        }
    }

    fn claim(&mut self, path: &str, kind: ArtifactKind) {
        match self.claims.iter_mut().find(|c| c.path == path) {
            // A file created then edited in one run is still a creation.
            Some(existing) if existing.kind == ArtifactKind::Created && kind == ArtifactKind::Modified => {}
            Some(existing) => existing.kind = kind,
            None => self.claims.push(ArtifactClaim {
                path: path.to_string(),
                kind,
            }),
        }
    }

    pub fn claims(&self) -> &[ArtifactClaim] {
        &self.claims
    }

    pub fn finished(&self) -> Option<&FinalResult> {
        self.finished.as_ref()
    }

    pub fn into_parts(self) -> (Vec<ArtifactClaim>, Option<FinalResult>, Option<String>) {
        (self.claims, self.finished, self.last_text)
    }
}
