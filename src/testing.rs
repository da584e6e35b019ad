//! Fakes and fixtures shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use crate::agent::WRITE_FILE;
use crate::api::{
    AssistantSpec, ChatRequest, EventStream, LlmProvider, RemoteFile, RemoteFileContent, RunEvent,
    ToolCall, ToolOutput,
};
use crate::server::AuditSink;

// ============================================================================
// Scripted runs
// ============================================================================

type ScriptedEvent = std::result::Result<RunEvent, String>;

/// Events of one agent pass: the initial stream, then one segment per
/// tool-output submission.
#[derive(Debug, Clone)]
pub struct ScriptedPass {
    segments: Vec<Vec<ScriptedEvent>>,
}

impl ScriptedPass {
    pub fn new(events: Vec<RunEvent>) -> Self {
        Self {
            segments: vec![events.into_iter().map(Ok).collect()],
        }
    }

    /// Stream returned by the next tool-output submission.
    pub fn then(mut self, events: Vec<RunEvent>) -> Self {
        self.segments.push(events.into_iter().map(Ok).collect());
        self
    }

    /// End the latest segment with a stream error.
    pub fn then_error(mut self, message: &str) -> Self {
        if let Some(last) = self.segments.last_mut() {
            last.push(Err(message.to_string()));
        }
        self
    }
}

impl Default for ScriptedPass {
    fn default() -> Self {
        Self::new(vec![RunEvent::Completed, RunEvent::Done])
    }
}

fn event_stream(events: Vec<ScriptedEvent>) -> EventStream {
    Box::pin(futures_util::stream::iter(
        events.into_iter().map(|e| e.map_err(|m| anyhow!(m))),
    ))
}

/// A `write_file` call as the provider reports it.
pub fn write_tool_call(id: &str, path: &str, content: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: WRITE_FILE.to_string(),
        arguments: json!({ "path": path, "content": content }).to_string(),
    }
}

/// A completed `write_file` call.
pub fn write_call(id: &str, path: &str, content: &str) -> RunEvent {
    RunEvent::ToolCallDone(write_tool_call(id, path, content))
}

/// Judge answer as the provider would return it.
pub fn verdict(good: bool) -> Vec<String> {
    vec![json!({ "is_change_good": good }).to_string()]
}

// ============================================================================
// Fake provider
// ============================================================================

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct FakeState {
    next_id: usize,
    uploaded: Vec<RemoteFile>,
    live_files: HashMap<String, String>,
    deleted_files: Vec<String>,
    delete_file_attempts: usize,
    remote_files: HashMap<String, RemoteFileContent>,
    assistant_specs: Vec<AssistantSpec>,
    live_assistants: Vec<String>,
    deleted_assistants: Vec<String>,
    thread_prompts: Vec<String>,
    threads_deleted: usize,
    runs_started: usize,
    passes: VecDeque<ScriptedPass>,
    default_pass: Option<ScriptedPass>,
    pending_segments: VecDeque<Vec<ScriptedEvent>>,
    submitted: Vec<(String, Vec<ToolOutput>)>,
    verdicts: VecDeque<std::result::Result<Vec<String>, String>>,
    chat_requests: Vec<ChatRequest>,
    watched: Option<PathBuf>,
    snapshots: Vec<Option<Vec<u8>>>,
}

/// In-memory [`LlmProvider`] that plays back scripted runs and verdicts and
/// records every call.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
    run_hook: Mutex<Option<Hook>>,
    fail_upload_of: Option<String>,
    fail_deletes: bool,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the upload of `name`.
    pub fn fail_upload_of(mut self, name: &str) -> Self {
        self.fail_upload_of = Some(name.to_string());
        self
    }

    /// Reject every file and assistant deletion.
    pub fn fail_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_pass(&self, pass: ScriptedPass) {
        self.state().passes.push_back(pass);
    }

    /// Pass played once the queued ones run out.
    pub fn set_default_pass(&self, pass: ScriptedPass) {
        self.state().default_pass = Some(pass);
    }

    pub fn push_verdict(&self, choices: Vec<String>) {
        self.state().verdicts.push_back(Ok(choices));
    }

    pub fn push_verdict_error(&self, message: &str) {
        self.state().verdicts.push_back(Err(message.to_string()));
    }

    pub fn add_remote_file(&self, id: &str, filename: &str, bytes: &[u8]) {
        self.state().remote_files.insert(
            id.to_string(),
            RemoteFileContent {
                filename: filename.to_string(),
                bytes: bytes.to_vec(),
            },
        );
    }

    /// Snapshot `path` at the start of every run.
    pub fn watch(&self, path: PathBuf) {
        self.state().watched = Some(path);
    }

    /// Call `hook` at the start of every run.
    pub fn on_run_start(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.run_hook.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(hook));
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.state().uploaded.iter().map(|f| f.name.clone()).collect()
    }

    pub fn live_files(&self) -> usize {
        self.state().live_files.len()
    }

    pub fn deleted_file_count(&self) -> usize {
        self.state().deleted_files.len()
    }

    pub fn delete_file_attempts(&self) -> usize {
        self.state().delete_file_attempts
    }

    /// Every uploaded handle was deleted, and none more than once.
    pub fn each_file_deleted_once(&self) -> bool {
        let state = self.state();
        let mut deleted = state.deleted_files.clone();
        deleted.sort();
        let mut uploaded: Vec<String> = state.uploaded.iter().map(|f| f.id.clone()).collect();
        uploaded.sort();
        deleted == uploaded
    }

    pub fn assistant_specs(&self) -> Vec<AssistantSpec> {
        self.state().assistant_specs.clone()
    }

    pub fn assistants_created(&self) -> usize {
        self.state().assistant_specs.len()
    }

    pub fn assistants_deleted(&self) -> usize {
        self.state().deleted_assistants.len()
    }

    pub fn thread_prompts(&self) -> Vec<String> {
        self.state().thread_prompts.clone()
    }

    pub fn threads_deleted(&self) -> usize {
        self.state().threads_deleted
    }

    pub fn runs_started(&self) -> usize {
        self.state().runs_started
    }

    pub fn submitted_outputs(&self) -> Vec<(String, Vec<ToolOutput>)> {
        self.state().submitted.clone()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.state().chat_requests.clone()
    }

    pub fn watched_snapshots(&self) -> Vec<Option<Vec<u8>>> {
        self.state().snapshots.clone()
    }

    /// Total provider calls that create or touch remote state.
    pub fn remote_calls(&self) -> usize {
        let state = self.state();
        state.uploaded.len()
            + state.assistant_specs.len()
            + state.thread_prompts.len()
            + state.chat_requests.len()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state();
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn upload_file(&self, name: &str, _bytes: Vec<u8>) -> Result<RemoteFile> {
        if self.fail_upload_of.as_deref() == Some(name) {
            bail!("upload of {} rejected", name);
        }
        let file = RemoteFile {
            id: self.next_id("file"),
            name: name.to_string(),
        };
        let mut state = self.state();
        state.live_files.insert(file.id.clone(), file.name.clone());
        state.uploaded.push(file.clone());
        Ok(file)
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let mut state = self.state();
        state.delete_file_attempts += 1;
        if self.fail_deletes {
            bail!("delete of {} rejected", file_id);
        }
        if state.live_files.remove(file_id).is_none() {
            bail!("no such file: {}", file_id);
        }
        state.deleted_files.push(file_id.to_string());
        Ok(())
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<RemoteFileContent> {
        self.state()
            .remote_files
            .get(file_id)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", file_id))
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        let id = self.next_id("asst");
        let mut state = self.state();
        state.assistant_specs.push(spec.clone());
        state.live_assistants.push(id.clone());
        Ok(id)
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<()> {
        if self.fail_deletes {
            bail!("delete of {} rejected", assistant_id);
        }
        let mut state = self.state();
        let Some(index) = state.live_assistants.iter().position(|id| id == assistant_id) else {
            bail!("no such assistant: {}", assistant_id);
        };
        state.live_assistants.remove(index);
        state.deleted_assistants.push(assistant_id.to_string());
        Ok(())
    }

    async fn create_thread(&self, prompt: &str) -> Result<String> {
        let id = self.next_id("thread");
        self.state().thread_prompts.push(prompt.to_string());
        Ok(id)
    }

    async fn delete_thread(&self, _thread_id: &str) -> Result<()> {
        self.state().threads_deleted += 1;
        Ok(())
    }

    async fn stream_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<EventStream> {
        let hook = self
            .run_hook
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(hook) = hook {
            hook();
        }

        let mut state = self.state();
        state.runs_started += 1;
        if let Some(path) = state.watched.clone() {
            state.snapshots.push(std::fs::read(path).ok());
        }

        let pass = match state.passes.pop_front() {
            Some(pass) => pass,
            None => state.default_pass.clone().unwrap_or_default(),
        };
        let mut segments: VecDeque<Vec<ScriptedEvent>> = pass.segments.into();
        let first = segments.pop_front().unwrap_or_default();
        state.pending_segments = segments;
        Ok(event_stream(first))
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream> {
        let mut state = self.state();
        state.submitted.push((run_id.to_string(), outputs));
        let next = state
            .pending_segments
            .pop_front()
            .unwrap_or_else(|| vec![Ok(RunEvent::Completed), Ok(RunEvent::Done)]);
        Ok(event_stream(next))
    }

    async fn chat_completion(&self, request: &ChatRequest) -> Result<Vec<String>> {
        let mut state = self.state();
        state.chat_requests.push(request.clone());
        match state.verdicts.pop_front() {
            Some(Ok(choices)) => Ok(choices),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(verdict(false)),
        }
    }
}

// ============================================================================
// Fake audit sink
// ============================================================================

/// Audit sink that keeps rows in memory.
#[derive(Default)]
pub struct RecordingAudit {
    rows: Mutex<Vec<(String, serde_json::Value)>>,
    fail: bool,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record nothing and fail every insert.
    pub fn failing() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn rows(&self) -> Vec<(String, serde_json::Value)> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn rows_in(&self, table: &str) -> Vec<serde_json::Value> {
        self.rows()
            .into_iter()
            .filter(|(t, _)| t == table)
            .map(|(_, row)| row)
            .collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn insert(&self, table: &str, row: serde_json::Value) -> Result<()> {
        if self.fail {
            bail!("audit store unavailable");
        }
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((table.to_string(), row));
        Ok(())
    }
}

// ============================================================================
// Git fixtures
// ============================================================================

/// A committed local repository that can stand in for a remote URL.
pub struct FixtureRepo {
    _dir: TempDir,
    url: String,
}

impl FixtureRepo {
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=tinygen",
            "-c",
            "user.email=tinygen@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Create a repository with `files` committed on its default branch.
pub fn fixture_repo(files: &[(&str, &str)]) -> FixtureRepo {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("origin");
    std::fs::create_dir_all(&root).unwrap();

    git(&root, &["init", "--quiet"]);
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }
    git(&root, &["add", "--all"]);
    git(&root, &["commit", "--quiet", "--allow-empty", "-m", "initial"]);

    FixtureRepo {
        url: root.to_string_lossy().into_owned(),
        _dir: dir,
    }
}
