//! Operation queue — strictly sequential GATT reads and writes.
//!
//! A BLE link accepts one outstanding GATT operation at a time. An
//! [`OperationQueue`] holds an ordered batch of [`PendingOperation`]s and
//! keeps at most one of them in flight:
//!
//! 1. [`commit`](OperationQueue::commit) dispatches the first item.
//! 2. Each transport completion goes through
//!    [`on_transport_callback`](OperationQueue::on_transport_callback), which
//!    records the result, fires the completion callback and dispatches the
//!    next item.
//!
//! Nothing else advances the queue: no timers, no polling. A failed item
//! fires its callback with the error and the batch moves on. Retrying is the
//! caller's decision.

use std::collections::VecDeque;

use plutocon_domain::cache::CharacteristicCache;
use plutocon_domain::error::{ProtocolStateError, TransportError};
use uuid::Uuid;

use crate::ports::{LinkHandle, Transport};

/// Whether an operation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// One queued unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    characteristic: Uuid,
    payload: Option<Vec<u8>>,
}

impl PendingOperation {
    /// Read `characteristic`.
    #[must_use]
    pub fn read(characteristic: Uuid) -> Self {
        Self {
            characteristic,
            payload: None,
        }
    }

    /// Write `payload` to `characteristic`.
    #[must_use]
    pub fn write(characteristic: Uuid, payload: Vec<u8>) -> Self {
        Self {
            characteristic,
            payload: Some(payload),
        }
    }

    /// Target characteristic.
    #[must_use]
    pub fn characteristic(&self) -> Uuid {
        self.characteristic
    }

    /// Read or write.
    #[must_use]
    pub fn direction(&self) -> Direction {
        if self.payload.is_some() {
            Direction::Write
        } else {
            Direction::Read
        }
    }

    /// Payload of a write, `None` for reads.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }
}

/// What the completion callback learns about one finished item.
#[derive(Debug)]
pub struct OperationOutcome {
    pub characteristic: Uuid,
    pub direction: Direction,
    /// `Err` when the transport refused or failed the item.
    pub result: Result<(), TransportError>,
    /// `true` for the final item of the batch.
    pub is_last: bool,
}

/// Result delivered by the transport for the in-flight item.
#[derive(Debug)]
pub enum OperationResult {
    Read(Result<Vec<u8>, TransportError>),
    Written(Result<(), TransportError>),
}

impl OperationResult {
    fn direction(&self) -> Direction {
        match self {
            Self::Read(_) => Direction::Read,
            Self::Written(_) => Direction::Write,
        }
    }
}

/// Where the queue stands after dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueProgress {
    /// An item is waiting for its transport callback.
    InFlight,
    /// Nothing left; the last callback (if any) has fired.
    Drained,
}

/// Callback invoked once per finished item.
pub type CompletionCallback = Box<dyn FnMut(&OperationOutcome) + Send>;

/// Ordered batch of GATT operations executed one at a time.
#[derive(Default)]
pub struct OperationQueue {
    pending: VecDeque<PendingOperation>,
    in_flight: Option<PendingOperation>,
    on_complete: Option<CompletionCallback>,
}

impl std::fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue")
            .field("pending", &self.pending)
            .field("in_flight", &self.in_flight)
            .field("has_callback", &self.on_complete.is_some())
            .finish()
    }
}

impl OperationQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation.
    pub fn enqueue(&mut self, operation: PendingOperation) -> &mut Self {
        self.pending.push_back(operation);
        self
    }

    /// Register the per-item completion callback. Must precede
    /// [`commit`](Self::commit).
    pub fn set_on_operation_complete<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&OperationOutcome) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Operations not yet dispatched, in order.
    pub fn pending(&self) -> impl Iterator<Item = &PendingOperation> {
        self.pending.iter()
    }

    /// The operation waiting for its transport callback.
    #[must_use]
    pub fn in_flight(&self) -> Option<&PendingOperation> {
        self.in_flight.as_ref()
    }

    /// Number of operations not yet finished (pending plus in flight).
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.in_flight.is_some())
    }

    /// Whether every operation has finished.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch the first operation.
    ///
    /// Committing an empty queue is a no-op: the callback does not fire and
    /// [`QueueProgress::Drained`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolStateError::MissingCompletionCallback`] when no
    /// callback was registered, or [`ProtocolStateError::Busy`] when an item
    /// is already in flight.
    pub fn commit<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        link: LinkHandle,
    ) -> Result<QueueProgress, ProtocolStateError> {
        if self.on_complete.is_none() {
            return Err(ProtocolStateError::MissingCompletionCallback);
        }
        if self.in_flight.is_some() {
            return Err(ProtocolStateError::Busy);
        }
        Ok(self.dispatch_next(transport, link))
    }

    /// Feed the transport's completion for `characteristic`.
    ///
    /// Successful reads are stored in `cache`; writes leave it untouched.
    /// Returns `None` when the callback does not match the in-flight item
    /// and was ignored.
    pub fn on_transport_callback<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        link: LinkHandle,
        cache: &mut CharacteristicCache,
        characteristic: Uuid,
        result: OperationResult,
    ) -> Option<QueueProgress> {
        let matches = self.in_flight.as_ref().is_some_and(|operation| {
            operation.characteristic == characteristic
                && operation.direction() == result.direction()
        });
        if !matches {
            tracing::warn!(
                %characteristic,
                direction = %result.direction(),
                "ignoring callback that does not match the in-flight operation"
            );
            return None;
        }
        let operation = self.in_flight.take()?;

        let result = match result {
            OperationResult::Read(Ok(value)) => {
                cache.put(characteristic, value);
                Ok(())
            }
            OperationResult::Read(Err(err)) | OperationResult::Written(Err(err)) => Err(err),
            OperationResult::Written(Ok(())) => Ok(()),
        };
        if let Err(err) = &result {
            tracing::warn!(%err, %characteristic, "GATT operation failed, moving on");
        }

        self.finish(&operation, result);
        Some(self.dispatch_next(transport, link))
    }

    fn dispatch_next<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        link: LinkHandle,
    ) -> QueueProgress {
        while let Some(operation) = self.pending.pop_front() {
            let sent = match operation.payload() {
                None => transport.read_characteristic(link, operation.characteristic),
                Some(payload) => {
                    transport.write_characteristic(link, operation.characteristic, payload)
                }
            };
            match sent {
                Ok(()) => {
                    tracing::debug!(
                        characteristic = %operation.characteristic,
                        direction = %operation.direction(),
                        remaining = self.pending.len(),
                        "GATT operation dispatched"
                    );
                    self.in_flight = Some(operation);
                    return QueueProgress::InFlight;
                }
                Err(err) => {
                    tracing::warn!(
                        %err,
                        characteristic = %operation.characteristic,
                        "transport refused GATT operation, moving on"
                    );
                    self.finish(&operation, Err(err));
                }
            }
        }
        QueueProgress::Drained
    }

    fn finish(&mut self, operation: &PendingOperation, result: Result<(), TransportError>) {
        let outcome = OperationOutcome {
            characteristic: operation.characteristic,
            direction: operation.direction(),
            result,
            is_last: self.pending.is_empty(),
        };
        if let Some(callback) = self.on_complete.as_mut() {
            callback(&outcome);
        }
    }
}
