//! Minimal HTTP/1.1 file server for integration tests.
//!
//! Serves a fixed set of bodies by path and honours `Range: bytes=X-Y`, the
//! way the cache provider's direct links behave. Counts GET requests so tests
//! can assert that nothing was downloaded. Paths can be given a queue of error
//! statuses to answer (with a text body) before the file is served.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

pub struct RangeServer {
    base: String,
    gets: Arc<AtomicUsize>,
}

impl RangeServer {
    /// Direct URL of the file served at `/<name>`.
    pub fn url(&self, name: &str) -> String {
        format!("{}{}", self.base, name)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

type Faults = Mutex<HashMap<String, VecDeque<u16>>>;

/// Start a server in a background thread. It runs until the process exits.
pub fn start(files: HashMap<String, Vec<u8>>) -> RangeServer {
    start_with_faults(files, HashMap::new())
}

/// Like [`start`], but each request for a path in `faults` first consumes the
/// next queued status and answers it with an error page.
pub fn start_with_faults(files: HashMap<String, Vec<u8>>, faults: HashMap<String, Vec<u16>>) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let files = Arc::new(files);
    let faults: Arc<Faults> = Arc::new(Mutex::new(
        faults.into_iter().map(|(k, v)| (k, v.into())).collect(),
    ));
    let gets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&gets);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let files = Arc::clone(&files);
            let faults = Arc::clone(&faults);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &files, &faults, &counter));
        }
    });
    RangeServer {
        base: format!("http://127.0.0.1:{}/", port),
        gets,
    }
}

fn handle(mut stream: std::net::TcpStream, files: &HashMap<String, Vec<u8>>, faults: &Faults, gets: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, path, range) = parse_request(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    gets.fetch_add(1, Ordering::SeqCst);
    let name = path.trim_start_matches('/');
    let fault = faults.lock().unwrap().get_mut(name).and_then(|q| q.pop_front());
    if let Some(code) = fault {
        let page = b"busy, try later";
        let head = format!(
            "HTTP/1.1 {} Error\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n",
            code,
            page.len()
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(page);
        return;
    }
    let Some(body) = files.get(name) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    };

    let total = body.len() as u64;
    let (status, content_range, slice) = match range {
        Some((start, _)) if start >= total => (
            "416 Range Not Satisfiable",
            Some(format!("bytes */{}", total)),
            &body[0..0],
        ),
        Some((start, end_incl)) => {
            let end_excl = end_incl.saturating_add(1).min(total);
            (
                "206 Partial Content",
                Some(format!("bytes {}-{}/{}", start, end_excl - 1, total)),
                &body[start as usize..end_excl as usize],
            )
        }
        None => ("200 OK", None, &body[..]),
    };
    let content_range = content_range
        .map(|r| format!("Content-Range: {}\r\n", r))
        .unwrap_or_default();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Accept-Ranges: bytes\r\n\r\n",
        status,
        slice.len(),
        content_range
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(slice);
}

/// (method, path, optional (start, end_inclusive) from `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, &str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let path = first.next().unwrap_or("/");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        if let Some(spec) = value.trim().strip_prefix("bytes=") {
            if let Some((a, b)) = spec.split_once('-') {
                let start = a.trim().parse::<u64>().unwrap_or(0);
                let end = b.trim().parse::<u64>().unwrap_or(u64::MAX);
                range = Some((start, end));
            }
        }
    }
    (method, path, range)
}
