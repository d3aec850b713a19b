//! Unit tests for `StreamLineSink`.

use std::io::{self, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use linecast::sink::StreamLineSink;
use linecast::{LineSink, SinkError};

/// A `Write` that appends into shared memory.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("utf8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A `Write` that always fails with the given kind.
struct Failing(io::ErrorKind);

impl Write for Failing {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(self.0, "failing writer"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn lines_are_newline_terminated() {
    let buf = SharedBuf::default();
    let sink = StreamLineSink::new("mem", buf.clone());

    sink.write_line("one").expect("write");
    sink.write_line("two").expect("write");

    assert_eq!(buf.text(), "one\ntwo\n");
    assert_eq!(sink.name(), "mem");
}

#[test]
fn closed_stream_refuses_writes() {
    let buf = SharedBuf::default();
    let sink = StreamLineSink::new("mem", buf.clone());

    sink.close().expect("close");
    let err = sink.write_line("late").expect_err("closed");

    assert!(matches!(err, SinkError::ConsumerClosed(_)));
    assert!(buf.text().is_empty());
    sink.close().expect("second close is a no-op");
}

#[test]
fn broken_pipe_is_a_closure_signal_and_drops_writer() {
    let sink = StreamLineSink::new("pipe", Failing(io::ErrorKind::BrokenPipe));

    let first = sink.write_line("x").expect_err("broken pipe");
    assert!(matches!(first, SinkError::ConsumerClosed(_)));

    let second = sink.write_line("y").expect_err("writer dropped");
    assert!(matches!(second, SinkError::ConsumerClosed(_)));
}

#[test]
fn other_io_errors_are_unclassified_and_keep_writer() {
    let sink = StreamLineSink::new("denied", Failing(io::ErrorKind::PermissionDenied));

    for _ in 0..2 {
        let err = sink.write_line("x").expect_err("denied");
        assert!(matches!(err, SinkError::Io(_)), "got {err:?}");
    }
}

#[test]
fn cancellation_interrupts_the_transport() {
    let buf = SharedBuf::default();
    let cancel = CancellationToken::new();
    let sink = StreamLineSink::new("cancellable", buf.clone()).with_cancellation(cancel.clone());

    sink.write_line("before").expect("write before cancel");
    cancel.cancel();
    let err = sink.write_line("after").expect_err("cancelled");

    assert!(matches!(err, SinkError::TransportInterrupted(_)), "got {err:?}");
    assert_eq!(buf.text(), "before\n");
}

#[test]
fn tcp_sink_forwards_lines_to_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    let sink = StreamLineSink::connect_tcp(&addr).expect("connect");
    let (mut peer, _) = listener.accept().expect("accept");

    sink.write_line("over the wire").expect("write");
    sink.close().expect("close");

    let mut received = String::new();
    io::Read::read_to_string(&mut peer, &mut received).expect("read");
    assert_eq!(received, "over the wire\n");
    assert_eq!(sink.name(), format!("tcp:{addr}"));
}

#[test]
fn tcp_connect_failure_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    drop(listener);

    assert!(StreamLineSink::connect_tcp(&addr).is_err());
}
