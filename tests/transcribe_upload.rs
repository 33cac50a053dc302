use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use contourcam::transcribe::{upload, SttConfig};

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Accept one connection, capture the request, answer with `status` and
/// `payload`. Returns (request headers, request body).
fn serve_once(listener: TcpListener, status: &'static str, payload: &'static str) -> thread::JoinHandle<(String, Vec<u8>)> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).expect("read request");
            assert!(n > 0, "client closed before sending a full request");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length: usize = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())?
            })
            .expect("request carries a content-length");

        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).expect("read body");
            assert!(n > 0, "client closed mid-body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = buf[header_end..header_end + content_length].to_vec();

        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            payload.len(),
            payload
        )
        .expect("write response");

        (headers, body)
    })
}

#[test]
fn uploads_audio_and_prints_each_response_line() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = serve_once(listener, "200 OK", "{\"results\": []}\n{\"state\": \"done\"}");

    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("clip.flac");
    std::fs::write(&audio, b"fLaC fake audio bytes").expect("write audio");

    let config = SttConfig {
        url: format!("http://{addr}/v1/recognize"),
        auth_token: Some("c2VjcmV0".to_string()),
        content_type: "audio/flac".to_string(),
    };
    let mut out = Vec::new();
    let lines = upload(&config, &audio, &mut out).expect("upload");

    let (headers, body) = server.join().expect("server thread");

    assert_eq!(lines, 2);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "{\"results\": []}\n{\"state\": \"done\"}\n"
    );
    assert_eq!(body, b"fLaC fake audio bytes");

    let headers = headers.to_ascii_lowercase();
    assert!(headers.starts_with("post /v1/recognize"));
    assert!(headers.contains("authorization: basic c2vjcmv0"));
    assert!(headers.contains("content-type: audio/flac"));
}

#[test]
fn error_status_still_prints_the_response_body() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let server = serve_once(
        listener,
        "401 Unauthorized",
        "{\"error\": \"invalid credentials\"}",
    );

    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("clip.flac");
    std::fs::write(&audio, b"fLaC").expect("write audio");

    let config = SttConfig {
        url: format!("http://{addr}/v1/recognize"),
        auth_token: None,
        content_type: "audio/flac".to_string(),
    };
    let mut out = Vec::new();
    let lines = upload(&config, &audio, &mut out).expect("upload");
    server.join().expect("server thread");

    assert_eq!(lines, 1);
    assert!(String::from_utf8(out).unwrap().contains("invalid credentials"));
}
