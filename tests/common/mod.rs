#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::Command;
use serde_json::{json, Value};
use tempfile::TempDir;

/// An isolated home, data directory and cloud-storage root.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let env = TestEnv {
            dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(env.home()).unwrap();
        fs::create_dir_all(env.data_dir()).unwrap();
        fs::create_dir_all(env.cloud_root()).unwrap();
        env
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data").join("gransync")
    }

    pub fn cloud_root(&self) -> PathBuf {
        self.dir.path().join("cloud")
    }

    /// Create a directory under the cloud-storage root.
    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.cloud_root().join(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Write `config.toml`, pointing at the test cloud root and with delays off.
    pub fn write_config(&self, api_base_url: &str, extra: &str) {
        let config = format!(
            "cloud_storage_root = {:?}\napi_base_url = {:?}\npage_delay_ms = 0\ndocument_delay_ms = 0\ntimeout_secs = 5\n{}",
            self.cloud_root().display().to_string(),
            api_base_url,
            extra
        );
        fs::write(self.data_dir().join("config.toml"), config).unwrap();
    }

    pub fn write_state(&self, state: &Value) {
        fs::write(self.data_dir().join("state.json"), state.to_string()).unwrap();
    }

    pub fn read_state(&self) -> Value {
        let text = fs::read_to_string(self.data_dir().join("state.json")).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    pub fn state_exists(&self) -> bool {
        self.data_dir().join("state.json").exists()
    }

    pub fn write_lock(&self, epoch_ms: i64) {
        fs::write(self.data_dir().join("sync.lock"), epoch_ms.to_string()).unwrap();
    }

    pub fn lock_exists(&self) -> bool {
        self.data_dir().join("sync.lock").exists()
    }

    /// A Command running gransync inside this environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = assert_cmd::cargo_bin_cmd!("gransync");
        cmd.env("HOME", self.home());
        cmd.env("XDG_DATA_HOME", self.dir.path().join("data"));
        cmd.env("XDG_CONFIG_HOME", self.dir.path().join("config"));
        cmd.env("USER", "tester");
        cmd.env_remove("APPDATA");
        cmd.env_remove("USERPROFILE");
        cmd.env_remove("GRANSYNC_LOG");
        // Ensure no color codes pollute test output
        cmd.env("NO_COLOR", "1");
        cmd
    }

    pub fn cmd_json(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--json");
        cmd
    }
}

pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

/// A minimal HTTP stand-in for the Granola API. Serves canned folders,
/// documents and transcripts; any transcript not registered answers 404.
/// A route can be switched to answer a fixed error status with [`FakeGranola::fail`].
pub struct FakeGranola {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<String, u16>>>,
}

#[derive(Clone, Default)]
struct Routes {
    folders: Value,
    documents: Vec<Value>,
    transcripts: HashMap<String, Value>,
}

impl FakeGranola {
    pub fn start(folders: Value, documents: Vec<Value>, transcripts: HashMap<String, Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let failures = Arc::new(Mutex::new(HashMap::new()));
        let routes = Routes {
            folders,
            documents,
            transcripts,
        };

        let log = Arc::clone(&requests);
        let failing = Arc::clone(&failures);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                handle(stream, &routes, &log, &failing);
            }
        });

        FakeGranola {
            base_url,
            requests,
            failures,
        }
    }

    /// Answer every request to `path` with `status` until [`FakeGranola::recover`].
    pub fn fail(&self, path: &str, status: u16) {
        self.failures.lock().unwrap().insert(path.to_string(), status);
    }

    pub fn recover(&self, path: &str) {
        self.failures.lock().unwrap().remove(path);
    }

    /// Paths requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle(
    mut stream: TcpStream,
    routes: &Routes,
    log: &Mutex<Vec<String>>,
    failures: &Mutex<HashMap<String, u16>>,
) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let path = request_line.split_whitespace().nth(1).unwrap_or("").to_string();

    let mut content_length = 0;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).unwrap_or(0) == 0 || header == "\r\n" {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    let _ = reader.read_exact(&mut body);
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    log.lock().unwrap().push(path.clone());

    let failure = failures.lock().unwrap().get(&path).copied();
    let (status, payload) = match failure {
        Some(status) => (status, json!({ "message": "upstream unavailable" })),
        None => route(&path, &request, routes),
    };

    let text = payload.to_string();
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        text.len(),
        text
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn route(path: &str, request: &Value, routes: &Routes) -> (u16, Value) {
    match path {
        "/v1/get-document-lists" => (200, routes.folders.clone()),
        "/v2/get-documents" => {
            let offset = request["offset"].as_u64().unwrap_or(0) as usize;
            let limit = request["limit"].as_u64().unwrap_or(100) as usize;
            let page: Vec<Value> = routes.documents.iter().skip(offset).take(limit).cloned().collect();
            (200, json!({ "docs": page }))
        }
        "/v1/get-document-transcript" => {
            let id = request["document_id"].as_str().unwrap_or("");
            match routes.transcripts.get(id) {
                Some(t) => (200, t.clone()),
                None => (404, json!({ "message": "not found" })),
            }
        }
        _ => (404, json!({ "message": "no route" })),
    }
}
