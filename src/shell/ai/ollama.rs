use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use serde::Serialize;
use serde_json::Value;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
// 本地模型生成可能很慢
const READ_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Ollama HTTP API 客户端。
/// 每个请求开一条短连接，响应体支持 Content-Length 和 chunked 两种编码
pub struct OllamaConnector {
    host: String,
    port: u16,
}

impl OllamaConnector {
    pub fn new(base_url: &str) -> Self {
        let (host, port) = parse_base_url(base_url);
        Self { host, port }
    }

    /// 探测服务是否在线
    pub fn is_available(&self) -> bool {
        match self.request("GET", "/api/tags", None) {
            Ok(body) => body.contains("models"),
            Err(e) => {
                debug!("Ollama 不可用: {}", e);
                false
            }
        }
    }

    pub fn list_models(&self) -> Vec<String> {
        let Ok(body) = self.request("GET", "/api/tags", None) else {
            return Vec::new();
        };
        let Ok(parsed) = serde_json::from_str::<Value>(&body) else {
            return Vec::new();
        };
        parsed["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 同步生成：发 prompt，拿完整回复
    pub fn generate(&self, model: &str, prompt: &str) -> Result<String, String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| format!("cannot encode request: {}", e))?;
        debug!("Ollama 请求: model={} prompt={}字节", model, prompt.len());
        let response = self.request("POST", "/api/generate", Some(&body))?;
        extract_response(&response)
    }

    fn request(&self, method: &str, path: &str, body: Option<&str>) -> Result<String, String> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| format!("cannot resolve {}: {}", self.host, e))?
            .next()
            .ok_or_else(|| format!("cannot resolve {}", self.host))?;

        let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| format!("cannot reach {}:{}: {}", self.host, self.port, e))?;
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| e.to_string())?;
        stream
            .set_write_timeout(Some(Duration::from_secs(10)))
            .map_err(|e| e.to_string())?;

        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}:{}\r\nConnection: close\r\nAccept: application/json\r\n",
            method, path, self.host, self.port
        );
        if let Some(body) = body {
            head.push_str(&format!(
                "Content-Type: application/json\r\nContent-Length: {}\r\n",
                body.len()
            ));
        }
        head.push_str("\r\n");

        stream
            .write_all(head.as_bytes())
            .and_then(|_| stream.write_all(body.unwrap_or("").as_bytes()))
            .map_err(|e| format!("request failed: {}", e))?;

        let mut raw = Vec::new();
        stream
            .read_to_end(&mut raw)
            .map_err(|e| format!("reading response failed: {}", e))?;
        parse_http_response(&raw)
    }
}

fn parse_base_url(url: &str) -> (String, u16) {
    let rest = url.trim().trim_start_matches("http://");
    let host_port = rest.split('/').next().unwrap_or_default();
    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port_text)) => match port_text.parse::<u16>() {
            Ok(port) => (host, port),
            Err(_) => (host_port, 11434),
        },
        None => (host_port, 11434),
    };
    let host = if host.is_empty() { "localhost" } else { host };
    (host.to_string(), port)
}

/// 切出响应体：校验状态码，按 Transfer-Encoding 解码
fn parse_http_response(raw: &[u8]) -> Result<String, String> {
    let split = find_subslice(raw, b"\r\n\r\n").ok_or("malformed HTTP response")?;
    let head = String::from_utf8_lossy(&raw[..split]);
    let body = &raw[split + 4..];

    let status: u16 = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .ok_or("malformed HTTP status line")?;

    let chunked = head
        .lines()
        .any(|line| line.to_ascii_lowercase().trim() == "transfer-encoding: chunked");
    let body = if chunked { dechunk(body) } else { body.to_vec() };
    let body = String::from_utf8_lossy(&body).into_owned();

    if !(200..300).contains(&status) {
        return Err(format!("HTTP {}: {}", status, body.trim()));
    }
    Ok(body)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn dechunk(mut body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let Some(line_end) = find_subslice(body, b"\r\n") else {
            break;
        };
        let size_line = String::from_utf8_lossy(&body[..line_end]);
        let size_text = size_line.split(';').next().unwrap_or_default().trim();
        let Ok(size) = usize::from_str_radix(size_text, 16) else {
            break;
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        if body.len() < chunk_start + size {
            out.extend_from_slice(&body[chunk_start.min(body.len())..]);
            break;
        }
        out.extend_from_slice(&body[chunk_start..chunk_start + size]);
        body = &body[chunk_start + size..];
        if body.starts_with(b"\r\n") {
            body = &body[2..];
        }
    }
    out
}

/// 从 /api/generate 的 JSON 回复里取出文本
fn extract_response(body: &str) -> Result<String, String> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON from Ollama: {}", e))?;
    if let Some(error) = parsed["error"].as_str() {
        return Err(format!("Ollama error: {}", error));
    }
    parsed["response"]
        .as_str()
        .map(|text| text.trim().to_string())
        .ok_or_else(|| "Ollama reply has no response field".to_string())
}
