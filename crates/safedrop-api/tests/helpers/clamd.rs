//! Minimal clamd stand-in for upload tests.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

/// Serve `connections` INSTREAM requests, answering each with `reply`.
///
/// Returns the port and a handle yielding the payload sizes received.
pub fn fake_clamd(reply: &'static str, connections: usize) -> (u16, JoinHandle<Vec<usize>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let mut sizes = Vec::new();
        for _ in 0..connections {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut command = Vec::new();
            reader.read_until(b'\n', &mut command).unwrap();
            assert_eq!(command, b"nINSTREAM\n");

            let mut total = 0;
            loop {
                let mut len = [0u8; 4];
                reader.read_exact(&mut len).unwrap();
                let len = u32::from_be_bytes(len) as usize;
                if len == 0 {
                    break;
                }
                let mut chunk = vec![0u8; len];
                reader.read_exact(&mut chunk).unwrap();
                total += len;
            }
            sizes.push(total);

            let mut writer = stream;
            writer.write_all(reply.as_bytes()).unwrap();
            writer.write_all(b"\n").unwrap();
        }
        sizes
    });
    (port, handle)
}

/// A localhost port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
