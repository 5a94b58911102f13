//! Reachability checks for CDN candidates.
//!
//! The probe is a deliberately small HTTP/1.0 exchange over a raw TCP stream: one `HEAD`
//! request line plus a `Host` header, then a bounded read of the status line. It does not
//! follow redirects or look at headers.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::config::RewriteConfig;
use crate::error::ProbeError;

const DEFAULT_PORT: u16 = 80;
const SUCCESS_MARKER: &str = "200 OK";

/// Decides whether the CDN serves a given URL.
pub trait Prober {
  /// Returns `Ok(())` when `url` is confirmed reachable.
  fn probe(&self, url: &str) -> Result<(), ProbeError>;
}

impl<P: Prober + ?Sized> Prober for &P {
  fn probe(&self, url: &str) -> Result<(), ProbeError> {
    (**self).probe(url)
  }
}

/// Request target extracted from a CDN URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
  /// Host name or address literal.
  pub host: String,
  /// Port named in the URL, or 80 when none is written.
  pub port: u16,
  /// Path with the query string appended, never empty.
  pub document_path: String,
}

impl ProbeTarget {
  /// Split a CDN URL into connection and request details.
  pub fn parse(url: &str) -> Result<Self, ProbeError> {
    let malformed = || ProbeError::MalformedUrl {
      url: url.to_string(),
    };
    let parsed = Url::parse(url).map_err(|_| malformed())?;
    let host = parsed
      .host_str()
      .filter(|host| !host.is_empty())
      .ok_or_else(malformed)?;

    let mut document_path = match parsed.path() {
      "" => "/".to_string(),
      path => path.to_string(),
    };
    if let Some(query) = parsed.query().filter(|query| !query.is_empty()) {
      document_path.push('?');
      document_path.push_str(query);
    }

    let port = match parsed.port() {
      Some(port) => port,
      None if names_explicit_port(url) => parsed.port_or_known_default().unwrap_or(DEFAULT_PORT),
      None => DEFAULT_PORT,
    };

    Ok(Self {
      host: host.to_string(),
      port,
      document_path,
    })
  }

  /// Raw request bytes sent to the CDN.
  pub fn request(&self) -> String {
    format!(
      "HEAD {} HTTP/1.0\r\nHost: {}\r\n\r\n",
      self.document_path, self.host
    )
  }
}

/// Whether the authority of `url` spells out a port.
///
/// The parser drops a port equal to the scheme default, so `https://host:443` would
/// otherwise be indistinguishable from `https://host`.
fn names_explicit_port(url: &str) -> bool {
  let Some((_, rest)) = url.split_once("://") else {
    return false;
  };
  let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
  let host_port = authority.rsplit_once('@').map_or(authority, |(_, host_port)| host_port);
  let after_host = match host_port.rfind(']') {
    Some(bracket) => &host_port[bracket + 1..],
    None => host_port,
  };

  after_host
    .rsplit_once(':')
    .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|byte| byte.is_ascii_digit()))
}

/// Blocking prober speaking HTTP/1.0 over `std::net::TcpStream`.
#[derive(Debug, Clone)]
pub struct HttpHeadProber {
  connect_timeout: Duration,
  read_timeout: Duration,
  read_limit: usize,
}

impl HttpHeadProber {
  /// Create a prober with explicit timeouts and read limit.
  pub fn new(connect_timeout: Duration, read_timeout: Duration, read_limit: usize) -> Self {
    Self {
      connect_timeout,
      read_timeout,
      read_limit: read_limit.max(SUCCESS_MARKER.len()),
    }
  }

  /// Create a prober using the timeouts from `config`.
  pub fn from_config(config: &RewriteConfig) -> Self {
    Self::new(
      config.connect_timeout(),
      config.read_timeout(),
      config.probe_read_limit,
    )
  }

  fn connect(&self, target: &ProbeTarget) -> Result<TcpStream, ProbeError> {
    let addrs = (target.host.as_str(), target.port)
      .to_socket_addrs()
      .map_err(|err| ProbeError::Resolve {
        host: target.host.clone(),
        port: target.port,
        source: Some(err),
      })?;

    let mut last_error = None;
    for addr in addrs {
      match TcpStream::connect_timeout(&addr, self.connect_timeout) {
        Ok(stream) => return Ok(stream),
        Err(err) => {
          debug!(%addr, error = %err, "CDN connect attempt failed");
          last_error = Some(err);
        }
      }
    }

    Err(match last_error {
      Some(source) => ProbeError::Connect {
        host: target.host.clone(),
        port: target.port,
        source,
      },
      None => ProbeError::Resolve {
        host: target.host.clone(),
        port: target.port,
        source: None,
      },
    })
  }

  fn exchange(&self, stream: &mut TcpStream, target: &ProbeTarget) -> std::io::Result<String> {
    let timeout = (!self.read_timeout.is_zero()).then_some(self.read_timeout);
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    stream.write_all(target.request().as_bytes())?;
    stream.flush()?;
    read_status_line(stream, self.read_limit)
  }
}

impl Prober for HttpHeadProber {
  fn probe(&self, url: &str) -> Result<(), ProbeError> {
    let target = ProbeTarget::parse(url)?;
    let mut stream = self.connect(&target)?;

    let outcome = self.exchange(&mut stream, &target);
    let _ = stream.shutdown(Shutdown::Both);
    let status_line = outcome.map_err(|source| ProbeError::Io {
      host: target.host.clone(),
      port: target.port,
      source,
    })?;

    if status_line.contains(SUCCESS_MARKER) {
      Ok(())
    } else {
      Err(ProbeError::Mismatch {
        status_line: status_line.trim_end().to_string(),
      })
    }
  }
}

/// Read up to the first line feed or `limit` bytes, whichever comes first.
fn read_status_line<R: Read>(reader: &mut R, limit: usize) -> std::io::Result<String> {
  let mut buffer = Vec::with_capacity(limit.min(512));
  let mut chunk = [0u8; 64];

  while buffer.len() < limit {
    let wanted = chunk.len().min(limit - buffer.len());
    let read = match reader.read(&mut chunk[..wanted]) {
      Ok(0) => break,
      Ok(read) => read,
      Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
      Err(err) => return Err(err),
    };
    buffer.extend_from_slice(&chunk[..read]);
    if let Some(line_end) = buffer.iter().position(|byte| *byte == b'\n') {
      buffer.truncate(line_end + 1);
      break;
    }
  }

  Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::BufRead;
  use std::io::BufReader;
  use std::net::TcpListener;
  use std::sync::mpsc;
  use std::thread;
  use std::time::Instant;

  fn prober() -> HttpHeadProber {
    HttpHeadProber::new(Duration::from_secs(5), Duration::from_secs(5), 256)
  }

  /// Accept one connection, read the request head, then hand the stream to `respond`.
  fn serve_with<F>(respond: F) -> (u16, mpsc::Receiver<String>)
  where
    F: FnOnce(&mut TcpStream) + Send + 'static,
  {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (sender, receiver) = mpsc::channel();

    thread::spawn(move || {
      let (mut stream, _) = listener.accept().unwrap();
      let mut reader = BufReader::new(stream.try_clone().unwrap());
      let mut head = String::new();
      loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
          break;
        }
        head.push_str(&line);
      }
      let _ = sender.send(head);
      respond(&mut stream);
    });

    (port, receiver)
  }

  /// Serve one connection with `response`, reporting the request head that was received.
  fn serve_once(response: &'static str) -> (u16, mpsc::Receiver<String>) {
    serve_with(move |stream| {
      let _ = stream.write_all(response.as_bytes());
    })
  }

  #[test]
  fn parses_host_port_path_and_query() {
    let target = ProbeTarget::parse("http://cdn.example.com:8080/img/a.png?v=2").unwrap();
    assert_eq!(target.host, "cdn.example.com");
    assert_eq!(target.port, 8080);
    assert_eq!(target.document_path, "/img/a.png?v=2");
    assert_eq!(
      target.request(),
      "HEAD /img/a.png?v=2 HTTP/1.0\r\nHost: cdn.example.com\r\n\r\n"
    );
  }

  #[test]
  fn defaults_to_port_80_and_root_path() {
    let target = ProbeTarget::parse("http://cdn.example.com").unwrap();
    assert_eq!(target.port, 80);
    assert_eq!(target.document_path, "/");

    let secure = ProbeTarget::parse("https://cdn.example.com/a.css").unwrap();
    assert_eq!(secure.port, 80);
  }

  #[test]
  fn keeps_ports_written_in_the_url() {
    let https = ProbeTarget::parse("https://cdn.example.com:443/a.png").unwrap();
    assert_eq!(https.port, 443);

    let http = ProbeTarget::parse("http://cdn.example.com:80/a.png").unwrap();
    assert_eq!(http.port, 80);

    let with_user = ProbeTarget::parse("https://user@cdn.example.com:443").unwrap();
    assert_eq!(with_user.port, 443);

    let ipv6 = ProbeTarget::parse("https://[::1]:443/a.png").unwrap();
    assert_eq!(ipv6.port, 443);

    let ipv6_bare = ProbeTarget::parse("https://[::1]/a.png").unwrap();
    assert_eq!(ipv6_bare.port, 80);
  }

  #[test]
  fn colons_outside_the_authority_are_not_ports() {
    let target = ProbeTarget::parse("https://cdn.example.com/a:443.png?at=1:2").unwrap();
    assert_eq!(target.port, 80);
  }

  #[test]
  fn rejects_urls_without_a_host() {
    assert!(matches!(
      ProbeTarget::parse("/relative/a.png"),
      Err(ProbeError::MalformedUrl { .. })
    ));
    assert!(matches!(
      ProbeTarget::parse("file:///tmp/a.png"),
      Err(ProbeError::MalformedUrl { .. })
    ));
    assert!(matches!(
      prober().probe("not a url"),
      Err(ProbeError::MalformedUrl { .. })
    ));
  }

  #[test]
  fn confirms_200_ok_responses() {
    let (port, request) = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
    let url = format!("http://127.0.0.1:{port}/css/site.css");

    prober().probe(&url).unwrap();

    let head = request.recv().unwrap();
    assert_eq!(head, "HEAD /css/site.css HTTP/1.0\r\nHost: 127.0.0.1\r\n");
  }

  #[test]
  fn reports_mismatch_for_other_statuses() {
    let (port, _request) = serve_once("HTTP/1.1 404 Not Found\r\n\r\n");
    let url = format!("http://127.0.0.1:{port}/missing.png");

    match prober().probe(&url) {
      Err(ProbeError::Mismatch { status_line }) => {
        assert_eq!(status_line, "HTTP/1.1 404 Not Found");
      }
      other => panic!("expected mismatch, got {other:?}"),
    }
  }

  #[test]
  fn only_the_status_line_is_inspected() {
    let (port, _request) = serve_once("HTTP/1.1 302 Found\r\nX-Note: 200 OK\r\n\r\n");
    let url = format!("http://127.0.0.1:{port}/moved.png");

    assert!(matches!(
      prober().probe(&url),
      Err(ProbeError::Mismatch { .. })
    ));
  }

  #[test]
  fn reports_connect_failures() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let url = format!("http://127.0.0.1:{port}/a.png");
    assert!(matches!(
      prober().probe(&url),
      Err(ProbeError::Connect { .. })
    ));
  }

  #[test]
  fn confirms_status_lines_split_across_writes() {
    let (port, _request) = serve_with(|stream| {
      let _ = stream.write_all(b"HTTP/1.1 2");
      let _ = stream.flush();
      thread::sleep(Duration::from_millis(50));
      let _ = stream.write_all(b"00 OK\r\n\r\n");
    });
    let url = format!("http://127.0.0.1:{port}/split.css");

    prober().probe(&url).unwrap();
  }

  #[test]
  fn silent_servers_time_out() {
    let (release, hold) = mpsc::channel::<()>();
    let (port, _request) = serve_with(move |_stream| {
      let _ = hold.recv();
    });
    let url = format!("http://127.0.0.1:{port}/stalled.js");
    let prober = HttpHeadProber::new(Duration::from_secs(5), Duration::from_secs(1), 256);

    let started = Instant::now();
    let outcome = prober.probe(&url);
    let elapsed = started.elapsed();
    drop(release);

    match outcome {
      Err(ProbeError::Io { port: failed_port, .. }) => assert_eq!(failed_port, port),
      other => panic!("expected i/o timeout, got {other:?}"),
    }
    assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");
  }

  #[test]
  fn status_line_read_is_bounded() {
    let mut input: &[u8] = b"HTTP/1.0 200 OK\r\nServer: test\r\n";
    assert_eq!(read_status_line(&mut input, 256).unwrap(), "HTTP/1.0 200 OK\r\n");

    let mut input: &[u8] = b"HTTP/1.0 200 OK\r\n";
    assert_eq!(read_status_line(&mut input, 8).unwrap(), "HTTP/1.0");
  }
}
