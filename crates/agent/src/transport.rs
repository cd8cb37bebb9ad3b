//! Cancellable reading of a model's streaming response.
//!
//! Cancellation is checked before and after every read, and a pending read
//! races the token so a stalled connection cannot hold up a cancel.

use forgeloop_core::error::ProviderError;
use forgeloop_core::provider::{ChunkReceiver, Provider, ProviderRequest, Usage};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// What the next read produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A non-empty piece of model text
    Fragment(String),
    /// The model finished normally
    Done,
    /// The turn's cancellation token fired
    Cancelled,
}

/// One in-flight streaming model call.
pub struct ModelStream {
    rx: ChunkReceiver,
    cancel: CancellationToken,
    finished: bool,
    usage: Option<Usage>,
}

impl ModelStream {
    /// Issue the request. A token that is already cancelled, or fires while
    /// the request is being sent, yields `ProviderError::Cancelled`.
    pub async fn open(
        provider: &dyn Provider,
        request: ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<Self, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let rx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            rx = provider.stream(request, cancel.clone()) => rx?,
        };

        Ok(Self {
            rx,
            cancel: cancel.clone(),
            finished: false,
            usage: None,
        })
    }

    /// Usage reported by the final chunk, if the provider sent any.
    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Read the next event. After `Done`, keeps returning `Done`.
    pub async fn next(&mut self) -> Result<TransportEvent, ProviderError> {
        loop {
            if self.finished {
                return Ok(TransportEvent::Done);
            }
            if self.cancel.is_cancelled() {
                return Ok(TransportEvent::Cancelled);
            }

            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(TransportEvent::Cancelled),
                item = self.rx.recv() => item,
            };

            if self.cancel.is_cancelled() {
                return Ok(TransportEvent::Cancelled);
            }

            let chunk = match item {
                // Sender dropped without a done chunk: treat as end of stream
                None => {
                    self.finished = true;
                    return Ok(TransportEvent::Done);
                }
                Some(Err(ProviderError::Cancelled)) => return Ok(TransportEvent::Cancelled),
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(e);
                }
                Some(Ok(chunk)) => chunk,
            };

            if chunk.done {
                self.finished = true;
                self.usage = chunk.usage;
            }

            match chunk.content {
                Some(text) if !text.is_empty() => return Ok(TransportEvent::Fragment(text)),
                _ if self.finished => return Ok(TransportEvent::Done),
                _ => trace!("Skipping empty stream chunk"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, Step};
    use forgeloop_core::message::Message;
    use forgeloop_core::provider::StreamChunk;
    use tokio::sync::mpsc;

    fn request() -> ProviderRequest {
        ProviderRequest::new("mock-model", vec![Message::user("hi")])
    }

    async fn drain(stream: &mut ModelStream) -> (String, TransportEvent) {
        let mut text = String::new();
        loop {
            match stream.next().await.unwrap() {
                TransportEvent::Fragment(f) => text.push_str(&f),
                other => return (text, other),
            }
        }
    }

    #[tokio::test]
    async fn fragments_then_done() {
        let provider = ScriptedProvider::new(vec![Step::reply("Final Answer: hello there")]);
        let cancel = CancellationToken::new();
        let mut stream = ModelStream::open(&provider, request(), &cancel).await.unwrap();

        let (text, end) = drain(&mut stream).await;
        assert_eq!(text, "Final Answer: hello there");
        assert_eq!(end, TransportEvent::Done);
        assert_eq!(stream.usage().unwrap().total_tokens, 15);
        assert_eq!(stream.next().await.unwrap(), TransportEvent::Done);
    }

    #[tokio::test]
    async fn cancelled_before_open() {
        let provider = ScriptedProvider::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ModelStream::open(&provider, request(), &cancel)
            .await
            .err()
            .unwrap();
        assert!(err.is_cancelled());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_mid_stream_stops_reading() {
        let provider = ScriptedProvider::new(vec![Step::CancelMidStream {
            before: vec!["partial ".into()],
            after: vec!["never seen".into()],
        }]);
        let cancel = CancellationToken::new();
        let mut stream = ModelStream::open(&provider, request(), &cancel).await.unwrap();

        let (text, end) = drain(&mut stream).await;
        assert_eq!(end, TransportEvent::Cancelled);
        assert!(!text.contains("never seen"));
    }

    #[tokio::test]
    async fn pending_read_is_interrupted_by_cancel() {
        struct StalledProvider(std::sync::Mutex<Option<mpsc::Sender<Result<StreamChunk, ProviderError>>>>);

        #[async_trait::async_trait]
        impl Provider for StalledProvider {
            fn name(&self) -> &str {
                "stalled"
            }
            async fn complete(
                &self,
                _request: ProviderRequest,
            ) -> Result<forgeloop_core::provider::ProviderResponse, ProviderError> {
                Err(ProviderError::NotConfigured("stream only".into()))
            }
            async fn stream(
                &self,
                _request: ProviderRequest,
                _cancel: CancellationToken,
            ) -> Result<ChunkReceiver, ProviderError> {
                let (tx, rx) = mpsc::channel(1);
                // Keep the sender alive so reads block forever
                *self.0.lock().unwrap() = Some(tx);
                Ok(rx)
            }
        }

        let provider = StalledProvider(std::sync::Mutex::new(None));
        let cancel = CancellationToken::new();
        let mut stream = ModelStream::open(&provider, request(), &cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            trigger.cancel();
        });

        assert_eq!(stream.next().await.unwrap(), TransportEvent::Cancelled);
    }

    #[tokio::test]
    async fn transport_error_is_not_cancellation() {
        let provider = ScriptedProvider::new(vec![Step::Fail(ProviderError::Network(
            "connection reset".into(),
        ))]);
        let cancel = CancellationToken::new();
        let err = ModelStream::open(&provider, request(), &cancel)
            .await
            .err()
            .unwrap();
        assert!(!err.is_cancelled());
    }

    #[tokio::test]
    async fn mid_stream_error_is_propagated() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(StreamChunk::text("abc"))).await.unwrap();
        tx.send(Err(ProviderError::StreamInterrupted("eof".into())))
            .await
            .unwrap();
        let mut stream = ModelStream {
            rx,
            cancel: CancellationToken::new(),
            finished: false,
            usage: None,
        };
        assert_eq!(
            stream.next().await.unwrap(),
            TransportEvent::Fragment("abc".into())
        );
        assert!(matches!(
            stream.next().await,
            Err(ProviderError::StreamInterrupted(_))
        ));
    }
}
