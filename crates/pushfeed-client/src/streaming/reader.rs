//! Driving a [`StreamSession`] from an async body

use std::future::pending;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::session::StreamSession;
use super::types::{StreamError, StreamOutcome, StreamStatus, StreamUpdate};

/// Receives the progress of a streaming read
///
/// All methods are called from the task driving the read, in order.
pub trait StreamObserver {
    /// New text arrived; `accumulated` already includes `delta`
    fn on_increment(&mut self, _delta: &str, _accumulated: &str) {}

    /// The stream completed, by sentinel or end of body
    fn on_complete(&mut self, _text: &str) {}

    /// The transport failed; `partial` is the text received before the failure
    fn on_error(&mut self, _error: &StreamError, _partial: &str) {}
}

/// Observer built from three closures
pub struct FnObserver<I, C, E> {
    on_increment: I,
    on_complete: C,
    on_error: E,
}

impl<I, C, E> FnObserver<I, C, E>
where
    I: FnMut(&str, &str),
    C: FnMut(&str),
    E: FnMut(&StreamError, &str),
{
    pub fn new(on_increment: I, on_complete: C, on_error: E) -> Self {
        Self {
            on_increment,
            on_complete,
            on_error,
        }
    }
}

impl<I, C, E> StreamObserver for FnObserver<I, C, E>
where
    I: FnMut(&str, &str),
    C: FnMut(&str),
    E: FnMut(&StreamError, &str),
{
    fn on_increment(&mut self, delta: &str, accumulated: &str) {
        (self.on_increment)(delta, accumulated)
    }

    fn on_complete(&mut self, text: &str) {
        (self.on_complete)(text)
    }

    fn on_error(&mut self, error: &StreamError, partial: &str) {
        (self.on_error)(error, partial)
    }
}

/// Create a linked abort handle and signal
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Caller side of a cancellable read
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Stop the read; idempotent
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Reader side of a cancellable read
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once aborted; never resolves if the handle was dropped unused
    pub async fn aborted(&mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            pending::<()>().await;
        }
    }
}

/// Reads a chunked body into a [`StreamOutcome`]
#[derive(Debug, Default)]
pub struct ChunkedStreamReader {
    abort: Option<AbortSignal>,
}

impl ChunkedStreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop reading when `signal` fires
    pub fn with_abort(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    /// Consume `body` until sentinel, end of body, transport error or abort
    pub async fn read<S, B, E, O>(self, body: S, observer: &mut O) -> StreamOutcome
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
        O: StreamObserver + ?Sized,
    {
        let mut abort = self.abort;
        let mut session = StreamSession::new();
        let mut error = None;
        futures::pin_mut!(body);

        loop {
            let next = tokio::select! {
                biased;

                _ = wait_abort(&mut abort) => {
                    debug!(len = session.text().len(), "Stream aborted");
                    session.cancel();
                    break;
                }
                next = body.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let updates = session.feed(chunk.as_ref());
                    notify(&session, &updates, observer);
                    if session.status().is_terminal() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, len = session.text().len(), "Stream transport error");
                    session.fail();
                    let err = StreamError::Transport(e.to_string());
                    observer.on_error(&err, session.text());
                    error = Some(err);
                    break;
                }
                None => {
                    let updates = session.finish();
                    notify(&session, &updates, observer);
                    break;
                }
            }
        }

        if session.status() == StreamStatus::Completed {
            observer.on_complete(session.text());
        }

        StreamOutcome {
            status: session.status(),
            skipped: session.skipped(),
            text: session.into_text(),
            error,
        }
    }
}

fn notify<O: StreamObserver + ?Sized>(
    session: &StreamSession,
    updates: &[StreamUpdate],
    observer: &mut O,
) {
    for update in updates {
        observer.on_increment(&update.delta, &session.text()[..update.accumulated_len]);
    }
}

async fn wait_abort(abort: &mut Option<AbortSignal>) {
    match abort {
        Some(signal) => signal.aborted().await,
        None => pending().await,
    }
}

/// Read a chunked body, reporting progress through three callbacks
///
/// `on_increment(delta, accumulated)` runs for every record with content,
/// `on_complete(text)` once on completion and `on_error(error, partial)` once
/// on transport failure.
pub async fn read_stream<S, B, E, I, C, F>(
    body: S,
    on_increment: I,
    on_complete: C,
    on_error: F,
) -> StreamOutcome
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    I: FnMut(&str, &str),
    C: FnMut(&str),
    F: FnMut(&StreamError, &str),
{
    let mut observer = FnObserver::new(on_increment, on_complete, on_error);
    ChunkedStreamReader::new().read(body, &mut observer).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        increments: Vec<(String, String)>,
        completed: Vec<String>,
        errors: Vec<(String, String)>,
    }

    impl StreamObserver for Recorder {
        fn on_increment(&mut self, delta: &str, accumulated: &str) {
            self.increments.push((delta.to_owned(), accumulated.to_owned()));
        }

        fn on_complete(&mut self, text: &str) {
            self.completed.push(text.to_owned());
        }

        fn on_error(&mut self, error: &StreamError, partial: &str) {
            self.errors.push((error.to_string(), partial.to_owned()));
        }
    }

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<&'static [u8], String>> {
        stream::iter(parts.iter().map(|p| Ok(p.as_bytes())).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_split_record_across_chunks() {
        let mut recorder = Recorder::default();
        let outcome = ChunkedStreamReader::new()
            .read(
                chunks(&["data: {\"content\":\"Hel", "lo\"}\n\n", "data: [DONE]\n\n"]),
                &mut recorder,
            )
            .await;

        assert_eq!(outcome.status, StreamStatus::Completed);
        assert_eq!(outcome.text, "Hello");
        assert_eq!(
            recorder.increments,
            vec![("Hello".to_string(), "Hello".to_string())]
        );
        assert_eq!(recorder.completed, vec!["Hello".to_string()]);
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn test_accumulated_within_one_chunk() {
        let mut recorder = Recorder::default();
        ChunkedStreamReader::new()
            .read(
                chunks(&["data: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}\n"]),
                &mut recorder,
            )
            .await;
        assert_eq!(
            recorder.increments,
            vec![
                ("a".to_string(), "a".to_string()),
                ("b".to_string(), "ab".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_sentinel_stops_reading_body() {
        let body = stream::iter(vec![
            Ok::<_, String>(b"data: {\"content\":\"x\"}\ndata: [DONE]\n".to_vec()),
            Err("must not be read".to_string()),
        ]);
        let mut recorder = Recorder::default();
        let outcome = ChunkedStreamReader::new().read(body, &mut recorder).await;
        assert_eq!(outcome.status, StreamStatus::Completed);
        assert!(outcome.error.is_none());
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_keeps_partial_text() {
        let body = stream::iter(vec![
            Ok(b"data: {\"content\":\"par\"}\n".to_vec()),
            Ok(b"data: {\"content\":\"tial\"}\ndata: {\"cont".to_vec()),
            Err("connection reset".to_string()),
        ]);
        let mut recorder = Recorder::default();
        let outcome = ChunkedStreamReader::new().read(body, &mut recorder).await;

        assert_eq!(outcome.status, StreamStatus::Errored);
        assert_eq!(outcome.text, "partial");
        assert!(matches!(outcome.error, Some(StreamError::Transport(_))));
        assert_eq!(
            recorder.errors,
            vec![(
                "Transport error: connection reset".to_string(),
                "partial".to_string()
            )]
        );
        assert!(recorder.completed.is_empty());
    }

    #[tokio::test]
    async fn test_end_of_body_without_sentinel() {
        let mut recorder = Recorder::default();
        let outcome = ChunkedStreamReader::new()
            .read(chunks(&["data: {\"content\":\"tail\"}"]), &mut recorder)
            .await;
        assert_eq!(outcome.status, StreamStatus::Completed);
        assert_eq!(outcome.text, "tail");
        assert_eq!(recorder.completed, vec!["tail".to_string()]);
    }

    #[tokio::test]
    async fn test_abort_stops_reading() {
        let (handle, signal) = abort_pair();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<Vec<u8>, String>>();
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let body = tokio_stream_from(rx);

        let reader = tokio::spawn(async move {
            let mut completed = Vec::new();
            let mut errors = Vec::new();
            let mut observer = FnObserver::new(
                |delta: &str, _: &str| {
                    let _ = seen_tx.send(delta.to_owned());
                },
                |text: &str| completed.push(text.to_owned()),
                |e: &StreamError, _: &str| errors.push(e.to_string()),
            );
            let outcome = ChunkedStreamReader::new()
                .with_abort(signal)
                .read(body, &mut observer)
                .await;
            drop(observer);
            (outcome, completed, errors)
        });

        tx.send(Ok(b"data: {\"content\":\"one\"}\n".to_vec())).unwrap();
        assert_eq!(seen_rx.recv().await.as_deref(), Some("one"));

        handle.abort();
        handle.abort();
        assert!(handle.is_aborted());
        let _ = tx.send(Ok(b"data: {\"content\":\"two\"}\n".to_vec()));

        let (outcome, completed, errors) = reader.await.unwrap();
        assert_eq!(outcome.status, StreamStatus::Cancelled);
        assert_eq!(outcome.text, "one");
        assert!(completed.is_empty());
        assert!(errors.is_empty());
        assert!(seen_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_aborted_before_start() {
        let (handle, signal) = abort_pair();
        handle.abort();
        let mut recorder = Recorder::default();
        let outcome = ChunkedStreamReader::new()
            .with_abort(signal)
            .read(chunks(&["data: {\"content\":\"x\"}\n"]), &mut recorder)
            .await;
        assert_eq!(outcome.status, StreamStatus::Cancelled);
        assert_eq!(outcome.text, "");
    }

    #[tokio::test]
    async fn test_dropped_handle_never_aborts() {
        let (handle, signal) = abort_pair();
        drop(handle);
        let mut recorder = Recorder::default();
        let outcome = ChunkedStreamReader::new()
            .with_abort(signal)
            .read(chunks(&["data: {\"content\":\"x\"}\n"]), &mut recorder)
            .await;
        assert_eq!(outcome.status, StreamStatus::Completed);
    }

    #[tokio::test]
    async fn test_read_stream_callbacks() {
        let mut seen = Vec::new();
        let mut done = None;
        let outcome = read_stream(
            chunks(&["data: {\"delta\":{\"content\":\"Hi\"}}\n", "data: [DONE]\n"]),
            |delta, _| seen.push(delta.to_owned()),
            |text| done = Some(text.to_owned()),
            |_, _| panic!("no error expected"),
        )
        .await;
        assert_eq!(outcome.text, "Hi");
        assert_eq!(seen, vec!["Hi".to_string()]);
        assert_eq!(done.as_deref(), Some("Hi"));
    }

    fn tokio_stream_from<T>(
        mut rx: tokio::sync::mpsc::UnboundedReceiver<T>,
    ) -> impl Stream<Item = T> {
        async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        }
    }
}
