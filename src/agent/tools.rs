//! Tool definitions handed to the assistant and the guard for its writes.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

/// Name of the function tool the assistant edits files with.
pub const WRITE_FILE: &str = "write_file";

/// Arguments of a `write_file` call.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WriteFileArgs {
    pub path: String,
    pub content: String,
}

/// `write_file` definition whose `path` may only be one of `paths`.
pub fn write_file_tool(paths: &[String]) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": WRITE_FILE,
            "description": "Writes a new version of a file in the repository",
            "parameters": {
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "enum": paths,
                        "description": "The original filename relative to the root of the repository"
                    },
                    "content": {
                        "type": "string",
                        "description": "The new version of the file"
                    }
                },
                "required": ["path", "content"]
            }
        }
    })
}

/// The provider's sandboxed file reader.
pub fn code_interpreter_tool() -> Value {
    json!({ "type": "code_interpreter" })
}

pub fn instructions(paths: &[String]) -> String {
    format!(
        "You are an assistant who fixes the problem given by the user. You do this by \
         modifying the following files: {}. You only make the necessary changes to fix the \
         user's problem and preserve the functionality of the program. You may not ask \
         questions, just make the change.",
        paths.join(", ")
    )
}

/// Decides which paths inside a workspace the agent may overwrite.
///
/// A path is writable when it is relative, made only of normal components,
/// one of the uploaded files, and an existing regular file on disk.
#[derive(Debug)]
pub struct WriteGuard<'a> {
    root: &'a Path,
    allowed: HashSet<&'a str>,
}

impl<'a> WriteGuard<'a> {
    pub fn new(root: &'a Path, allowed: &'a [String]) -> Self {
        Self {
            root,
            allowed: allowed.iter().map(String::as_str).collect(),
        }
    }

    /// Absolute target for `path`, or `None` if the write must be discarded.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        if !self.allowed.contains(path) {
            return None;
        }

        let relative = Path::new(path);
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        let full = self.root.join(relative);
        match fs::symlink_metadata(&full) {
            Ok(meta) if meta.file_type().is_file() => Some(full),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_file_tool_restricts_path_enum() {
        let paths = vec!["src/main.py".to_string(), "README.md".to_string()];
        let tool = write_file_tool(&paths);

        assert_eq!(tool["type"], "function");
        assert_eq!(tool["function"]["name"], WRITE_FILE);
        let params = &tool["function"]["parameters"];
        assert_eq!(params["properties"]["path"]["enum"], json!(["src/main.py", "README.md"]));
        assert_eq!(params["required"], json!(["path", "content"]));
    }

    #[test]
    fn test_instructions_list_every_path() {
        let text = instructions(&["a.py".to_string(), "docs/b.md".to_string()]);
        assert!(text.contains("a.py, docs/b.md"));
        assert!(text.contains("may not ask"));
    }

    #[test]
    fn test_write_file_args_parse() {
        let args: WriteFileArgs =
            serde_json::from_str(r#"{"path": "a.py", "content": "x = 1\n"}"#).unwrap();
        assert_eq!(args.path, "a.py");
        assert_eq!(args.content, "x = 1\n");
        assert!(serde_json::from_str::<WriteFileArgs>(r#"{"path": "a.py"}"#).is_err());
    }

    #[test]
    fn test_guard_accepts_only_existing_allowed_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.py"), "x").unwrap();
        fs::write(root.join("secrets.env"), "KEY=1").unwrap();

        let allowed = vec![
            "src/main.py".to_string(),
            "src/missing.py".to_string(),
            "src".to_string(),
        ];
        let guard = WriteGuard::new(root, &allowed);

        assert_eq!(guard.resolve("src/main.py"), Some(root.join("src/main.py")));
        assert_eq!(guard.resolve("secrets.env"), None);
        assert_eq!(guard.resolve("src/missing.py"), None);
        assert_eq!(guard.resolve("src"), None);
    }

    #[test]
    fn test_guard_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("repo");
        fs::create_dir_all(&root).unwrap();
        fs::write(temp_dir.path().join("outside.py"), "x").unwrap();
        fs::write(root.join("inside.py"), "x").unwrap();

        let outside = temp_dir.path().join("outside.py").to_string_lossy().into_owned();
        let allowed = vec![
            "../outside.py".to_string(),
            outside.clone(),
            "./inside.py".to_string(),
        ];
        let guard = WriteGuard::new(&root, &allowed);

        assert_eq!(guard.resolve("../outside.py"), None);
        assert_eq!(guard.resolve(&outside), None);
        assert_eq!(guard.resolve("./inside.py"), None);
    }
}
