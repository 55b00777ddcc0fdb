//! Fixtures shared by unit tests: EXIF-tagged TIFF files and a one-shot
//! HTTP server for the network collaborators.

use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread::{self, JoinHandle};

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};

pub fn ascii(tag: Tag, text: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

pub fn rational3(tag: Tag, parts: [(u32, u32); 3]) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(parts.iter().map(|&p| Rational::from(p)).collect()),
    }
}

/// Fields for a photo taken at 10.5N 20.25E on 2023-06-15 14:30:00.
pub fn tagged_fields() -> Vec<Field> {
    vec![
        ascii(Tag::DateTimeOriginal, "2023:06:15 14:30:00"),
        ascii(Tag::GPSLatitudeRef, "N"),
        rational3(Tag::GPSLatitude, [(10, 1), (30, 1), (0, 1)]),
        ascii(Tag::GPSLongitudeRef, "E"),
        rational3(Tag::GPSLongitude, [(20, 1), (15, 1), (0, 1)]),
    ]
}

/// Write a minimal TIFF container holding `fields`.
pub fn write_tiff(path: &Path, fields: Vec<Field>) {
    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false).unwrap();
    std::fs::write(path, buf.into_inner()).unwrap();
}

/// Serves exactly one canned HTTP response on a loopback port.
pub struct OneShotServer {
    pub url: String,
    handle: JoinHandle<String>,
}

impl OneShotServer {
    pub fn start(status: &str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                request.push_str(&line);
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            request.push_str(&String::from_utf8_lossy(&body));

            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request
        });

        Self { url, handle }
    }

    /// The raw request the server received (head + body).
    pub fn request(self) -> String {
        self.handle.join().unwrap()
    }
}
