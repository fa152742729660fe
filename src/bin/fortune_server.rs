//! Fortune JSON server
//!
//! Minimal HTTP/1.1 endpoint over the projection library.
//! Run with: cargo run --bin fortune_server

use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use bazi_fortune::calendar::Pillar;
use bazi_fortune::chart::chart_report;
use bazi_fortune::config::Config;
use bazi_fortune::fortune::project_fortune;
use bazi_fortune::input::ChartRequest;
use bazi_fortune::logging::{log, log_request, obj, v_str, Domain, Level};
use bazi_fortune::shensha::evaluate_pillar;

const MAX_BODY: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct MarkersRequest {
    day: Pillar,
    target: Pillar,
    #[serde(default)]
    label: Option<String>,
}

struct Response {
    status: u16,
    body: Value,
}

impl Response {
    fn ok(data: Value) -> Self {
        Self { status: 200, body: json!({"success": true, "data": data}) }
    }

    fn error(status: u16, message: &str) -> Self {
        Self { status, body: json!({"success": false, "error": message}) }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

fn route(cfg: &Config, method: &str, path: &str, body: &str) -> Response {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        ("GET", "/api/health") => Response { status: 200, body: json!({"status": "ok"}) },
        ("POST", "/api/markers") => respond(markers(body)),
        ("POST", "/api/bazi") => respond(chart(cfg, body)),
        ("POST", "/api/bazi/fortune") => respond(fortune(cfg, body)),
        (_, "/api/health" | "/api/markers" | "/api/bazi" | "/api/bazi/fortune") => {
            Response::error(405, "method not allowed")
        }
        _ => Response::error(404, "not found"),
    }
}

fn respond(result: Result<Value>) -> Response {
    match result {
        Ok(data) => Response::ok(data),
        Err(err) => Response::error(400, &format!("{:#}", err)),
    }
}

fn markers(body: &str) -> Result<Value> {
    let req: MarkersRequest = serde_json::from_str(body).context("invalid markers request")?;
    let label = req.label.as_deref().unwrap_or("");
    Ok(serde_json::to_value(evaluate_pillar(req.day, req.target, label))?)
}

fn chart(cfg: &Config, body: &str) -> Result<Value> {
    let resolved = ChartRequest::from_json(body)?.resolve(cfg)?;
    let report = chart_report(&resolved.chart, &resolved.cycle, resolved.birth_year, cfg.report_decades);
    Ok(serde_json::to_value(report)?)
}

fn fortune(cfg: &Config, body: &str) -> Result<Value> {
    let resolved = ChartRequest::from_json(body)?.resolve(cfg)?;
    let points = project_fortune(&resolved.chart, &resolved.cycle, resolved.birth_year);
    Ok(serde_json::to_value(points)?)
}

struct Request {
    method: String,
    path: String,
    body: String,
}

#[derive(Debug)]
struct BodyTooLarge(usize);

impl fmt::Display for BodyTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body of {} bytes exceeds {}", self.0, MAX_BODY)
    }
}

impl std::error::Error for BodyTooLarge {}

fn read_request<R: BufRead>(mut reader: R) -> Result<Request> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let (method, path) = match (parts.next(), parts.next()) {
        (Some(m), Some(p)) => (m.to_string(), p.to_string()),
        _ => bail!("malformed request line"),
    };

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().context("bad content-length")?;
            }
        }
    }
    if content_length > MAX_BODY {
        return Err(BodyTooLarge(content_length).into());
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    Ok(Request {
        method,
        path,
        body: String::from_utf8(body).context("body is not utf-8")?,
    })
}

fn read_failure(err: &anyhow::Error) -> Response {
    let status = if err.downcast_ref::<BodyTooLarge>().is_some() { 413 } else { 400 };
    Response::error(status, &format!("{:#}", err))
}

fn write_response(stream: &mut TcpStream, resp: &Response) -> Result<()> {
    let body = resp.body.to_string();
    let head = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        resp.status,
        reason(resp.status),
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(body.as_bytes())?;
    Ok(())
}

fn handle(cfg: &Config, mut stream: TcpStream) {
    let started = Instant::now();
    let (method, path, resp) = match read_request(BufReader::new(&stream)) {
        Ok(req) => {
            let resp = route(cfg, &req.method, &req.path, &req.body);
            (req.method, req.path, resp)
        }
        Err(err) => ("?".to_string(), "?".to_string(), read_failure(&err)),
    };
    if let Err(err) = write_response(&mut stream, &resp) {
        log(Level::Warn, Domain::Server, "write_failed", obj(&[("msg", v_str(&err.to_string()))]));
    }
    log_request(&method, &path, resp.status, started.elapsed().as_secs_f64() * 1000.0);
}

fn main() -> Result<()> {
    let cfg = Config::from_env();
    let listener = TcpListener::bind(&cfg.bind).with_context(|| format!("binding {}", cfg.bind))?;
    log(Level::Info, Domain::System, "server_start", obj(&[("bind", v_str(&cfg.bind))]));

    println!("Fortune server running at http://{}", cfg.bind);
    println!();
    println!("Endpoints:");
    println!("  GET  /api/health       - Health check");
    println!("  POST /api/markers      - Markers of one pillar against a day pillar");
    println!("  POST /api/bazi         - Chart marker report");
    println!("  POST /api/bazi/fortune - Hundred-year fortune series");
    println!();

    for stream in listener.incoming() {
        match stream {
            Ok(s) => handle(&cfg, s),
            Err(err) => log(Level::Warn, Domain::Server, "accept_failed", obj(&[("msg", v_str(&err.to_string()))])),
        }
    }
    Ok(())
}
