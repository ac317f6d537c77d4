//! # common
//!

#![allow(dead_code)]

use std::{
    fs,
    io::{self, ErrorKind, Read, Write},
    net::{SocketAddr, TcpListener},
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
        mpsc::{Receiver, Sender},
    },
    thread::{self, JoinHandle},
};

use db_backup::{
    Config,
    archive::archive_path_for,
    config::{IntervalConfig, IntervalUnit},
    dump::{DumpError, Dumper},
    endpoint::{Upload, UploadEndpoint, UploadError},
};

/// A config writing to `directory` with uploads disabled and nothing deleted.
pub fn test_config(directory: &Path) -> Config {
    let mut config = Config {
        backup_directory: directory.to_path_buf(),
        interval: IntervalConfig {
            time: 1,
            unit: IntervalUnit::Seconds,
            warmup_seconds: 0,
        },
        ..Config::default()
    };
    config.database.database = "test_db".to_string();
    config
}

/// Some SQL that compresses well.
pub fn sql_contents() -> Vec<u8> {
    "INSERT INTO `players` VALUES (1,'license:abc','{\"cash\":500}');\n"
        .repeat(512)
        .into_bytes()
}

/// The names of the files in a directory.
pub fn file_names(directory: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(directory)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Writes fixed contents as the dump.
#[derive(Default)]
pub struct FakeDumper {
    pub contents: Vec<u8>,
    pub calls: AtomicUsize,
}

impl FakeDumper {
    pub fn new() -> Self {
        Self {
            contents: sql_contents(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Dumper for FakeDumper {
    fn dump(&self, destination: &Path) -> Result<(), DumpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        fs::write(destination, &self.contents).map_err(|e| DumpError::Io(e, "write dump"))
    }
}

/// Writes half a dump then fails like an unreachable host.
pub struct FailingDumper;

impl Dumper for FailingDumper {
    fn dump(&self, destination: &Path) -> Result<(), DumpError> {
        fs::write(destination, b"-- partial").map_err(|e| DumpError::Io(e, "write dump"))?;

        Err(DumpError::Io(
            io::Error::new(ErrorKind::ConnectionRefused, "Can't connect to MySQL server"),
            "connect",
        ))
    }
}

/// Writes the dump, then puts a directory where its archive would go.
pub struct BlockedArchiveDumper;

impl Dumper for BlockedArchiveDumper {
    fn dump(&self, destination: &Path) -> Result<(), DumpError> {
        fs::write(destination, sql_contents()).map_err(|e| DumpError::Io(e, "write dump"))?;
        fs::create_dir(archive_path_for(destination))
            .map_err(|e| DumpError::Io(e, "block archive"))
    }
}

/// Panics mid dump.
pub struct PanickingDumper;

impl Dumper for PanickingDumper {
    fn dump(&self, _destination: &Path) -> Result<(), DumpError> {
        panic!("dump tool crashed");
    }
}

/// Signals `started` then waits for `release` before writing the dump.
pub struct BlockingDumper {
    pub started: Mutex<Sender<()>>,
    pub release: Mutex<Receiver<()>>,
}

impl Dumper for BlockingDumper {
    fn dump(&self, destination: &Path) -> Result<(), DumpError> {
        self.started.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        fs::write(destination, sql_contents()).map_err(|e| DumpError::Io(e, "write dump"))
    }
}

/// Records uploads, optionally failing them.
#[derive(Default)]
pub struct RecordingEndpoint {
    pub uploads: Mutex<Vec<Upload>>,
    pub fail: bool,
}

impl RecordingEndpoint {
    pub fn failing() -> Self {
        Self {
            uploads: Mutex::default(),
            fail: true,
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

impl UploadEndpoint for RecordingEndpoint {
    fn upload(&self, upload: &Upload) -> Result<(), UploadError> {
        // The archive must still exist while uploading.
        assert!(upload.archive_path.exists());
        self.uploads.lock().unwrap().push(upload.clone());

        if self.fail {
            return Err(UploadError::Io(
                io::Error::new(ErrorKind::ConnectionReset, "connection reset"),
                "send file",
            ));
        }

        Ok(())
    }
}

/// A request received by [`fake_webhook`].
#[derive(Debug)]
pub struct ReceivedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// A webhook that answers `requests` requests with `status` then stops. Returns the URL.
pub fn fake_webhook(status: u16, requests: usize) -> (String, JoinHandle<Vec<ReceivedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let mut received = Vec::new();

        for _ in 0..requests {
            let (mut stream, _) = listener.accept().unwrap();
            received.push(read_request(&mut stream));

            let response = format!(
                "HTTP/1.1 {status} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
        }

        received
    });

    (format!("http://{address}/api/webhooks/1/token"), handle)
}

/// A URL nothing is listening on.
pub fn closed_webhook() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address: SocketAddr = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{address}/api/webhooks/1/token")
}

fn read_request(stream: &mut impl Read) -> ReceivedRequest {
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    let head_end = loop {
        let read = stream.read(&mut buffer).unwrap();
        assert!(read > 0, "connection closed before the headers ended");
        data.extend_from_slice(&buffer[..read]);

        if let Some(position) = data.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..head_end]).into_owned();
    let mut request = ReceivedRequest {
        head,
        body: data[head_end..].to_vec(),
    };

    let length: usize = request
        .header("content-length")
        .map(|length| length.parse().unwrap())
        .unwrap_or(0);

    while request.body.len() < length {
        let read = stream.read(&mut buffer).unwrap();
        assert!(read > 0, "connection closed before the body ended");
        request.body.extend_from_slice(&buffer[..read]);
    }

    request
}

/// The dump and archive paths of the only backup in `directory`.
pub fn only_backup(directory: &Path) -> (PathBuf, PathBuf) {
    let names = file_names(directory);
    let dump = names
        .iter()
        .find(|name| name.ends_with(".sql"))
        .expect("a dump");
    let dump_path = directory.join(dump);
    let archive_path = dump_path.with_extension("zip");
    (dump_path, archive_path)
}
