//! Writing pre-built messages into either side of a session.

use portal_net::{Direction, Message, PacketSink};
use tracing::debug;

use crate::error::SessionError;
use crate::session::Session;

/// An ordered batch of messages to deliver toward one peer, optionally
/// followed by an error that ends the session.
///
/// All messages are written unflushed and the batch is flushed once. The
/// trailing error is only returned once the flush succeeded; when it is
/// [`SessionError::EndOfStream`] the command first waits
/// [`crate::SessionSettings::eof_linger`] so the peer receives the batch
/// before the connection is torn down.
#[derive(Debug)]
pub struct InjectPacket {
    /// Side the messages are written to.
    pub direction: Direction,
    /// Messages, in delivery order. Never empty.
    pub payload: Vec<Message>,
    /// Error returned after a successful delivery.
    pub raise: Option<SessionError>,
}

impl InjectPacket {
    /// Deliver `payload` toward `direction`.
    ///
    /// # Panics
    ///
    /// Panics if `payload` is empty.
    pub fn new(direction: Direction, payload: Vec<Message>) -> Self {
        assert!(!payload.is_empty(), "inject with an empty payload");
        Self {
            direction,
            payload,
            raise: None,
        }
    }

    /// Return `err` once the payload has been delivered.
    pub fn then_raise(mut self, err: SessionError) -> Self {
        self.raise = Some(err);
        self
    }

    /// Write the payload.
    ///
    /// # Panics
    ///
    /// Panics if the payload is empty. [`InjectPacket::new`] rejects that
    /// already; this catches batches assembled through the public fields.
    pub async fn execute(self, session: &mut Session) -> Result<(), SessionError> {
        assert!(!self.payload.is_empty(), "inject with an empty payload");

        let sink: &mut dyn PacketSink = match self.direction {
            Direction::ServerBound => match session.upstream.as_mut() {
                Some(link) => link.writer.as_mut(),
                None => return Err(SessionError::NoUpstream),
            },
            Direction::ClientBound => session.downstream.as_mut(),
        };

        for msg in &self.payload {
            if let Some(trace) = session.trace.as_mut() {
                trace.record("inject", self.direction, msg);
            }
            sink.write(msg).await?;
        }
        sink.flush().await?;
        debug!(
            session = %session.id(),
            direction = %self.direction,
            count = self.payload.len(),
            "injected packets"
        );

        match self.raise {
            Some(err) => {
                if err.is_end_of_stream() {
                    tokio::time::sleep(session.settings.eof_linger).await;
                }
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use portal_net::MessageTag;
    use portal_net::messages::{Chat, KeepAlive};
    use tokio::time::Instant;

    use crate::session::SessionSettings;
    use crate::testing::{
        Event, EventLog, RecordingSink, ScriptedConnector, TraceCapture, session_with,
        session_with_connector,
    };
    use crate::trace::TraceSink;

    fn chat(text: &str) -> Message {
        Message::Chat(Chat {
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_client_bound_batch_is_written_in_order_then_flushed_once() {
        let sink = RecordingSink::new();
        let mut session = session_with(sink.clone());
        let payload = vec![chat("a"), chat("b"), chat("c")];

        InjectPacket::new(Direction::ClientBound, payload.clone())
            .execute(&mut session)
            .await
            .unwrap();

        assert_eq!(sink.messages(), payload);
        assert_eq!(sink.flushes(), 1);
        assert_eq!(sink.flushed_len(), 3);
    }

    #[tokio::test]
    async fn test_server_bound_batch_goes_to_upstream_writer() {
        let log = EventLog::new();
        let client = RecordingSink::with_log(&log);
        let connector = ScriptedConnector::new(&log);
        let link = connector.fake_link("lobby");
        let mut session =
            session_with_connector(client.clone(), connector.clone()).with_upstream(link);

        InjectPacket::new(Direction::ServerBound, vec![chat("/spawn")])
            .execute(&mut session)
            .await
            .unwrap();

        assert_eq!(connector.upstream_sink().messages(), [chat("/spawn")]);
        assert!(client.messages().is_empty());
        assert_eq!(
            log.events(),
            [Event::ServerWrite(MessageTag::Chat), Event::ServerFlush]
        );
    }

    #[tokio::test]
    async fn test_server_bound_without_upstream_is_an_error() {
        let sink = RecordingSink::new();
        let mut session = session_with(sink.clone());

        let err = InjectPacket::new(Direction::ServerBound, vec![chat("/spawn")])
            .execute(&mut session)
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::NoUpstream));
    }

    #[tokio::test]
    async fn test_trace_line_precedes_each_write() {
        let log = EventLog::new();
        let sink = RecordingSink::with_log(&log);
        let mut session = session_with(sink.clone())
            .with_trace(TraceSink::new(TraceCapture::new(&log)));

        InjectPacket::new(
            Direction::ClientBound,
            vec![chat("a"), Message::KeepAlive(KeepAlive { id: 7 })],
        )
        .execute(&mut session)
        .await
        .unwrap();

        assert_eq!(
            log.events(),
            [
                Event::Trace(r#"inject: client-bound Chat(Chat { text: "a" })"#.into()),
                Event::ClientWrite(MessageTag::Chat),
                Event::Trace("inject: client-bound KeepAlive(KeepAlive { id: 7 })".into()),
                Event::ClientWrite(MessageTag::KeepAlive),
                Event::ClientFlush,
            ]
        );
    }

    #[tokio::test]
    async fn test_write_failure_stops_the_batch() {
        let sink = RecordingSink::new();
        sink.fail_write_at(2, "broken pipe");
        let mut session = session_with(sink.clone());

        let err = InjectPacket::new(Direction::ClientBound, vec![chat("a"), chat("b"), chat("c")])
            .then_raise(SessionError::EndOfStream)
            .execute(&mut session)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "I/O error: broken pipe");
        assert_eq!(sink.messages(), [chat("a")]);
        assert_eq!(sink.flushes(), 0);
    }

    #[tokio::test]
    async fn test_flush_failure_wins_over_raised_error() {
        let sink = RecordingSink::new();
        sink.fail_flush("reset by peer");
        let mut session = session_with(sink.clone());

        let err = InjectPacket::new(Direction::ClientBound, vec![chat("a")])
            .then_raise(SessionError::EndOfStream)
            .execute(&mut session)
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Write(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_stream_is_returned_after_the_linger() {
        let sink = RecordingSink::new();
        let mut session = session_with(sink.clone());
        let started = Instant::now();

        let err = InjectPacket::new(Direction::ClientBound, vec![Message::kick("bye")])
            .then_raise(SessionError::EndOfStream)
            .execute(&mut session)
            .await
            .unwrap_err();

        assert!(err.is_end_of_stream());
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(sink.flushes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linger_follows_session_settings() {
        let sink = RecordingSink::new();
        let mut session = session_with(sink.clone()).with_settings(SessionSettings {
            eof_linger: Duration::from_millis(250),
        });
        let started = Instant::now();

        InjectPacket::new(Direction::ClientBound, vec![Message::kick("bye")])
            .then_raise(SessionError::EndOfStream)
            .execute(&mut session)
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_raised_errors_return_immediately() {
        let sink = RecordingSink::new();
        let mut session = session_with(sink.clone());
        let started = Instant::now();

        let err = InjectPacket::new(Direction::ClientBound, vec![chat("a")])
            .then_raise(SessionError::DownstreamClosed)
            .execute(&mut session)
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::DownstreamClosed));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_no_raised_error_succeeds() {
        let sink = RecordingSink::new();
        let mut session = session_with(sink.clone());
        let result = InjectPacket::new(Direction::ClientBound, vec![chat("a")])
            .execute(&mut session)
            .await;
        assert!(result.is_ok());
    }

    #[test]
    #[should_panic(expected = "empty payload")]
    fn test_empty_payload_panics() {
        let _ = InjectPacket::new(Direction::ClientBound, Vec::new());
    }

    #[tokio::test]
    #[should_panic(expected = "empty payload")]
    async fn test_empty_payload_built_by_hand_panics_on_execute() {
        let sink = RecordingSink::new();
        let mut session = session_with(sink);
        let cmd = InjectPacket {
            direction: Direction::ClientBound,
            payload: Vec::new(),
            raise: None,
        };
        let _ = cmd.execute(&mut session).await;
    }
}
