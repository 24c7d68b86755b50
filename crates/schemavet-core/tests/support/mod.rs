//! A minimal HTTP/1.1 fixture server on a loopback listener. Serves static
//! routes, counts requests per path, and lets tests swap bodies mid-run to
//! observe cache behavior.

// Each integration test crate compiles this module and uses its own subset.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone)]
pub struct Route {
    pub body: Vec<u8>,
    pub last_modified: Option<String>,
}

impl Route {
    pub fn json(body: &str) -> Self {
        Self {
            body: body.as_bytes().to_vec(),
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, stamp: &str) -> Self {
        self.last_modified = Some(stamp.to_string());
        self
    }
}

pub struct TestServer {
    base_url: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl TestServer {
    pub fn start(initial: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("local addr");

        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::new(Mutex::new(
            initial
                .into_iter()
                .map(|(path, route)| (path.to_string(), route))
                .collect(),
        ));
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));

        let thread_routes = Arc::clone(&routes);
        let thread_hits = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let Some(path) = read_request(&stream) else {
                    continue;
                };

                *thread_hits
                    .lock()
                    .expect("hits lock")
                    .entry(path.clone())
                    .or_insert(0) += 1;

                let route = thread_routes.lock().expect("routes lock").get(&path).cloned();
                let response = match route {
                    Some(route) => render_response(&route),
                    None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_vec(),
                };
                let _ = stream.write_all(&response);
                let _ = stream.flush();
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            routes,
            hits,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .expect("hits lock")
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_body(&self, path: &str, body: &str) {
        let mut routes = self.routes.lock().expect("routes lock");
        let route = routes.get_mut(path).expect("route exists");
        route.body = body.as_bytes().to_vec();
    }
}

fn read_request(stream: &std::net::TcpStream) -> Option<String> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let path = request_line.split_whitespace().nth(1)?.to_string();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) if line == "\r\n" || line == "\n" => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Some(path)
}

fn render_response(route: &Route) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        route.body.len()
    );
    if let Some(stamp) = &route.last_modified {
        head.push_str(&format!("Last-Modified: {stamp}\r\n"));
    }
    head.push_str("\r\n");

    let mut response = head.into_bytes();
    response.extend_from_slice(&route.body);
    response
}
