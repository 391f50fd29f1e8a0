//! One-request HTTP server on a loopback port, for exercising the HTTP
//! calibration and submission clients without a real service.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};

use log::debug;

/// Serves a single canned response, then exits
pub struct OneShotServer {
    addr: SocketAddr,
    handle: JoinHandle<io::Result<String>>,
}

impl OneShotServer {
    /// Bind to an ephemeral loopback port and answer the first request with
    /// `status` (e.g. `"200 OK"`) and a JSON `body`
    pub fn respond(status: &str, body: &str) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = thread::spawn(move || -> io::Result<String> {
            let (stream, peer) = listener.accept()?;
            debug!("[OneShotServer] Connection from {}", peer);
            let mut reader = BufReader::new(stream);
            let request = read_request(&mut reader)?;
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes())?;
            stream.flush()?;
            Ok(request)
        });

        Ok(Self { addr, handle })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait for the exchange to finish and return the raw request
    /// (request line, headers and body)
    pub fn request(self) -> io::Result<String> {
        self.handle
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "server thread panicked"))?
    }
}

/// URL on a loopback port with nothing listening
pub fn refused_url(path: &str) -> io::Result<String> {
    let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    Ok(format!("http://{}{}", addr, path))
}

fn read_request(reader: &mut impl BufRead) -> io::Result<String> {
    let mut head = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        head.push_str(&line);
        if line == "\r\n" {
            break;
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    head.push_str(&String::from_utf8_lossy(&body));
    Ok(head)
}
