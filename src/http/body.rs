//! Response body wrapper that finalizes the request record.
//!
//! The record is sealed when the body reaches its end (normal completion) or
//! when the body is dropped before its end (client went away). The context's
//! flag makes the second of those a no-op.
//!
//! Size hints and end-of-stream are forwarded, so a `Content-Length` the
//! handler's body knows survives the wrapping.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use http_body::{Frame, SizeHint};

use crate::correlation::{Completion, RequestHandle};
use crate::events::body_value;
use crate::finalize::Finalizer;

pub struct TrackedBody {
    inner: Body,
    ctx: RequestHandle,
    finalizer: Arc<Finalizer>,
    status: u16,
    captured: Vec<u8>,
    limit: usize,
    done: bool,
}

impl TrackedBody {
    pub fn new(
        inner: Body,
        ctx: RequestHandle,
        finalizer: Arc<Finalizer>,
        status: u16,
        limit: usize,
    ) -> Self {
        Self {
            inner,
            ctx,
            finalizer,
            status,
            captured: Vec::new(),
            limit,
            done: false,
        }
    }

    fn capture(&mut self, chunk: &Bytes) {
        // One byte past the limit tells body_value the body was cut.
        let room = (self.limit + 1).saturating_sub(self.captured.len());
        let take = room.min(chunk.len());
        self.captured.extend_from_slice(&chunk[..take]);
    }

    fn finish(&mut self, completed: bool) {
        if self.done {
            return;
        }
        self.done = true;

        let response = body_value(&self.captured, self.limit);
        let completion = if completed {
            Completion::completed(self.status, response)
        } else {
            Completion::abandoned(Some(self.status), response)
        };
        self.finalizer.finalize_detached(&self.ctx, completion);
    }
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(chunk) = frame.data_ref() {
                    this.capture(chunk);
                }
                // A sized body is never polled again after its last byte.
                if this.inner.is_end_stream() {
                    this.finish(true);
                }
            }
            Poll::Ready(Some(Err(_))) => this.finish(false),
            Poll::Ready(None) => this.finish(true),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.finish(false);
    }
}
