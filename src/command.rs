//! JSON-shaped command dispatch, used by the interactive shell and by
//! anything scripting the filesystem non-interactively.

use crate::fs::Filesystem;
use serde_json::json;
use serde_json::Value;
use std::path::Path;

/// Creates a new image and immediately closes it, returning a status dict.
pub fn create_filesystem<P: AsRef<Path>>(path: P, size_mb: u32) -> Value {
    match Filesystem::create(&path, size_mb) {
        Ok(fs) => {
            fs.close();
            json!({
                "status": "success",
                "message": format!("Filesystem created at {}", path.as_ref().display()),
            })
        }
        Err(e) => json!({ "error": e.to_string() }),
    }
}

/// Mounts an existing image.
pub fn open_filesystem<P: AsRef<Path>>(path: P) -> crate::error::FsResult<Filesystem> {
    Filesystem::open(path)
}

/// Runs one shell-style command against `fs`, returning its JSON result.
///
/// Every command name and error shape mirrors the interactive shell's
/// original dict contract, so a caller scripting this module sees the same
/// keys whether driving it through a pipe or through the REPL.
pub fn execute_command(fs: &mut Filesystem, command: &str, args: &[String]) -> Value {
    match command {
        "help" => json!({
            "commands": {
                "ls": "List directory",
                "tree": "Show directory tree",
                "mkdir": "Create directory",
                "touch": "Create empty file",
                "write": "Write text to file",
                "read": "Read file content",
                "rm": "Delete file",
                "info": "Show file info",
                "stats": "Show filesystem statistics",
            }
        }),

        "ls" => {
            let path = args.first().map_or("/", String::as_str);
            match fs.list_directory(path) {
                Ok(entries) => json!({ "path": path, "entries": entries }),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        "tree" => {
            let path = args.first().map_or("/", String::as_str);
            match fs.tree(path) {
                Ok(lines) => json!({ "path": path, "tree": lines }),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        "mkdir" => {
            let Some(path) = args.first() else {
                return json!({ "error": "Usage: mkdir <path>" });
            };
            match fs.create_directory(path) {
                Ok(()) => json!({
                    "status": "success",
                    "message": format!("Created directory: {path}"),
                }),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        "touch" => {
            let Some(path) = args.first() else {
                return json!({ "error": "Usage: touch <path>" });
            };
            match fs.create_file(path) {
                Ok(()) => json!({
                    "status": "success",
                    "message": format!("Created file: {path}"),
                }),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        "write" => {
            if args.len() < 2 {
                return json!({ "error": "Usage: write <path> <text>" });
            }
            let (path, text) = (&args[0], &args[1]);
            match fs.write_file(path, text.as_bytes()) {
                Ok(()) => json!({
                    "status": "success",
                    "message": format!("Wrote to file: {path}"),
                }),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        "read" => {
            let Some(path) = args.first() else {
                return json!({ "error": "Usage: read <path>" });
            };
            match fs.read_file(path) {
                Ok(data) => json!({
                    "path": path,
                    "content": String::from_utf8_lossy(&data),
                }),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        "rm" => {
            let Some(path) = args.first() else {
                return json!({ "error": "Usage: rm <path>" });
            };
            match fs.delete_file(path) {
                Ok(()) => json!({
                    "status": "success",
                    "message": format!("Deleted: {path}"),
                }),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }

        "info" => {
            let Some(path) = args.first() else {
                return json!({ "error": "Usage: info <path>" });
            };
            match fs.get_file_info(path) {
                Some(info) => json!({
                    "path": path,
                    "type": info.file_type,
                    "size": info.size,
                    "created": info.created,
                    "modified": info.modified,
                    "accessed": info.accessed,
                }),
                None => json!({ "error": format!("File not found: {path}") }),
            }
        }

        "stats" => {
            let stats = fs.get_stats();
            json!({
                "total_blocks": stats.total_blocks,
                "free_blocks": stats.free_blocks,
                "used_blocks": stats.total_blocks - stats.free_blocks,
                "total_inodes": stats.total_inodes,
                "used_inodes": stats.used_inodes,
                "free_inodes": stats.total_inodes - stats.used_inodes,
            })
        }

        other => json!({ "error": format!("Unknown command: {other}") }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env::temp_dir;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        temp_dir().join(format!("blockfs-command-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn touch_then_info_reports_regular_type() {
        let path = tmp_path("touch-info");
        let mut fs = Filesystem::create(&path, 1).unwrap();

        let result = execute_command(&mut fs, "touch", &["/f".to_string()]);
        assert_eq!(result["status"], "success");

        let info = execute_command(&mut fs, "info", &["/f".to_string()]);
        assert_eq!(info["type"], "REGULAR");
        assert_eq!(info["size"], 0);

        fs.close();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn info_on_missing_path_reports_not_found() {
        let path = tmp_path("info-missing");
        let mut fs = Filesystem::create(&path, 1).unwrap();

        let result = execute_command(&mut fs, "info", &["/nope".to_string()]);
        assert!(result["error"].as_str().unwrap().contains("not found"));

        fs.close();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn stats_derives_used_and_free_counts() {
        let path = tmp_path("stats");
        let mut fs = Filesystem::create(&path, 1).unwrap();
        execute_command(&mut fs, "touch", &["/f".to_string()]);

        let stats = execute_command(&mut fs, "stats", &[]);
        let total_blocks = stats["total_blocks"].as_u64().unwrap();
        let free_blocks = stats["free_blocks"].as_u64().unwrap();
        assert_eq!(stats["used_blocks"], total_blocks - free_blocks);

        fs.close();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn write_then_read_roundtrips_as_utf8() {
        let path = tmp_path("write-read");
        let mut fs = Filesystem::create(&path, 1).unwrap();
        execute_command(&mut fs, "touch", &["/f".to_string()]);
        execute_command(
            &mut fs,
            "write",
            &["/f".to_string(), "hello world".to_string()],
        );

        let result = execute_command(&mut fs, "read", &["/f".to_string()]);
        assert_eq!(result["content"], "hello world");

        fs.close();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unknown_command_reports_as_such() {
        let path = tmp_path("unknown");
        let mut fs = Filesystem::create(&path, 1).unwrap();

        let result = execute_command(&mut fs, "frobnicate", &[]);
        assert_eq!(result["error"], "Unknown command: frobnicate");

        fs.close();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_argument_reports_usage() {
        let path = tmp_path("usage");
        let mut fs = Filesystem::create(&path, 1).unwrap();

        let result = execute_command(&mut fs, "mkdir", &[]);
        assert_eq!(result["error"], "Usage: mkdir <path>");

        fs.close();
        let _ = std::fs::remove_file(&path);
    }
}
