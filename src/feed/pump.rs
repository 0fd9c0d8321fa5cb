//! Async adapter between a byte source and a feed sink

use super::stream::FeedSink;
use crate::error::PumpError;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Totals for one pumped body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub bytes: u64,
    pub chunks: u64,
    pub duration: Duration,
}

/// Read `reader` to EOF in chunks of `chunk_size`, writing each into `sink`
///
/// The sink is finished at EOF. A read failure aborts the sink so no end
/// notification is emitted for a truncated body. If the consumer destroys the
/// sink, reading stops and the totals so far are returned.
pub async fn pump<R, S>(
    mut reader: R,
    sink: &mut S,
    chunk_size: usize,
) -> Result<PumpStats, PumpError>
where
    R: AsyncRead + Unpin,
    S: FeedSink + ?Sized,
{
    let start = Instant::now();
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut stats = PumpStats::default();

    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(bytes = stats.bytes, "Feed source failed: {}", e);
                sink.abort();
                return Err(e.into());
            }
        };
        stats.bytes += read as u64;
        stats.chunks += 1;
        tracing::trace!(bytes = read, "Read feed chunk");
        sink.feed(&buf[..read])?;

        if !sink.is_writable() {
            stats.duration = start.elapsed();
            tracing::debug!(bytes = stats.bytes, "Feed sink closed by consumer; stopping");
            return Ok(stats);
        }
    }

    sink.finish()?;
    stats.duration = start.elapsed();
    tracing::debug!(
        bytes = stats.bytes,
        chunks = stats.chunks,
        "Feed source exhausted in {:?}",
        stats.duration
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::error::FeedErrorKind;
    use crate::feed::{
        ChangesStream, ChannelHandler, CollectingHandler, FeedEvent, FlowControl, RecordHandler,
        StreamState,
    };
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_pump_long_poll_body() {
        let reader = Builder::new()
            .read(br#"{"resu"#)
            .read(br#"lts":[{"a":1},{"#)
            .read(br#""b":2}],"last_seq":7}"#)
            .build();
        let mut stream = ChangesStream::new(FeedConfig::long_poll(), CollectingHandler::new());

        let stats = pump(reader, &mut stream, 64).await.unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.bytes, 42);
        assert_eq!(stream.state(), StreamState::Closed);

        let handler = stream.into_handler();
        assert_eq!(handler.records(), vec![r#"{"a":1}"#, r#"{"b":2}"#]);
        let summary = handler.summary().unwrap();
        assert_eq!(summary.last_seq, Some(serde_json::json!(7)));
        assert!(summary.complete);
    }

    #[tokio::test]
    async fn test_pump_small_chunk_size() {
        let body: &[u8] = b"{\"seq\":1}\n\n{\"seq\":2}\n";
        let mut stream = ChangesStream::new(FeedConfig::continuous(), CollectingHandler::new());

        let stats = pump(body, &mut stream, 1).await.unwrap();
        assert_eq!(stats.chunks, body.len() as u64);

        let handler = stream.into_handler();
        assert_eq!(handler.records(), vec![r#"{"seq":1}"#, r#"{"seq":2}"#]);
        assert_eq!(handler.summary().unwrap().heartbeats, 1);
    }

    #[tokio::test]
    async fn test_pump_read_error_destroys_stream() {
        let reader = Builder::new()
            .read(b"{\"seq\":1}\n{\"se")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            ))
            .build();
        let mut stream = ChangesStream::new(FeedConfig::continuous(), CollectingHandler::new());

        let err = pump(reader, &mut stream, 64).await.unwrap_err();
        assert!(matches!(
            err,
            PumpError::Io(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset
        ));
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(!stream.is_readable());

        let events = stream.into_handler().into_events();
        assert_eq!(events, vec![FeedEvent::Record(r#"{"seq":1}"#.to_string())]);
    }

    #[tokio::test]
    async fn test_pump_propagates_parse_errors() {
        let body: &[u8] = b"<html>502 Bad Gateway</html>";
        let mut stream = ChangesStream::new(FeedConfig::long_poll(), CollectingHandler::new());

        let err = pump(body, &mut stream, 8).await.unwrap_err();
        match err {
            PumpError::Feed(feed) => assert_eq!(feed.kind(), FeedErrorKind::MalformedEnvelope),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stream.state(), StreamState::Failed);
        assert!(stream.handler().error().is_some());
    }

    #[tokio::test]
    async fn test_pump_stops_when_handler_destroys() {
        struct StopAfterFirst(Vec<String>);

        impl RecordHandler for StopAfterFirst {
            fn on_record(&mut self, record: &str, flow: &mut FlowControl) {
                self.0.push(record.to_string());
                flow.destroy();
            }
        }

        let body: &[u8] = b"one\ntwo\nthree\n";
        let handler = StopAfterFirst(Vec::new());
        let mut stream = ChangesStream::new(FeedConfig::continuous(), handler);

        let stats = pump(body, &mut stream, 4).await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.bytes, 4);
        assert_eq!(stream.state(), StreamState::Closed);
        assert_eq!(stream.handler().0, vec!["one"]);
    }

    #[tokio::test]
    async fn test_pump_stops_when_receiver_dropped() {
        let (handler, receiver) = ChannelHandler::channel();
        drop(receiver);
        let mut stream = ChangesStream::new(FeedConfig::continuous(), handler);

        let stats = pump(&b"{\"seq\":1}\n{\"seq\":2}\n"[..], &mut stream, 64)
            .await
            .unwrap();
        assert_eq!(stats.chunks, 1);
        assert!(!stream.is_readable());
    }
}
