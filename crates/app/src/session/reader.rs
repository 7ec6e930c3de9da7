//! Fluent builder for a batch of reads.

use plutocon_domain::characteristic::Characteristic;
use plutocon_domain::error::PlutoconError;

use super::Session;
use crate::operation::{OperationOutcome, OperationQueue, PendingOperation, QueueProgress};
use crate::ports::{SessionObserver, Transport};

/// Collects characteristics to read, then commits them as one batch.
///
/// ```ignore
/// session
///     .reader()?
///     .property(Characteristic::Battery)
///     .property(Characteristic::TxLevel)
///     .on_operation_complete(|outcome| println!("{outcome:?}"))
///     .commit()?;
/// ```
///
/// Values land in the session cache; read them back with the session
/// getters once the callback reports `is_last`.
#[must_use = "a reader does nothing until committed"]
pub struct Reader<'s, T, O> {
    session: &'s mut Session<T, O>,
    queue: OperationQueue,
}

impl<T, O> std::fmt::Debug for Reader<'_, T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<'s, T: Transport, O: SessionObserver> Reader<'s, T, O> {
    pub(super) fn new(session: &'s mut Session<T, O>) -> Self {
        Self {
            session,
            queue: OperationQueue::new(),
        }
    }

    /// Queue a read of `characteristic`.
    pub fn property(mut self, characteristic: Characteristic) -> Self {
        self.queue
            .enqueue(PendingOperation::read(characteristic.uuid()));
        self
    }

    /// Queue reads of every characteristic in `characteristics`, in order.
    pub fn properties(mut self, characteristics: impl IntoIterator<Item = Characteristic>) -> Self {
        for characteristic in characteristics {
            self.queue
                .enqueue(PendingOperation::read(characteristic.uuid()));
        }
        self
    }

    /// Callback fired once per finished read.
    pub fn on_operation_complete<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&OperationOutcome) + Send + 'static,
    {
        self.queue.set_on_operation_complete(callback);
        self
    }

    /// Dispatch the batch.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolStateError::UnknownCharacteristic`] when the
    /// peripheral did not expose a requested characteristic, and
    /// [`ProtocolStateError::MissingCompletionCallback`] without a callback.
    ///
    /// [`ProtocolStateError::UnknownCharacteristic`]: plutocon_domain::error::ProtocolStateError::UnknownCharacteristic
    /// [`ProtocolStateError::MissingCompletionCallback`]: plutocon_domain::error::ProtocolStateError::MissingCompletionCallback
    pub fn commit(self) -> Result<QueueProgress, PlutoconError> {
        self.session.start_requested_batch(self.queue)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use plutocon_domain::error::{ProtocolStateError, TransportError};
    use uuid::Uuid;

    use crate::ports::TransportEvent;
    use crate::test_support::{
        FakeTransport, RecordingObserver, SERVICE, event, new_session, ready_session,
    };

    use super::*;
    use crate::ports::DiscoveredCharacteristic;

    fn reads_after_initial(session: &Session<FakeTransport, RecordingObserver>) -> Vec<Uuid> {
        session
            .transport()
            .reads()
            .into_iter()
            .skip(Characteristic::DEFAULT_READ_SET.len())
            .collect()
    }

    #[test]
    fn should_read_requested_properties_in_order() {
        let (mut session, _observer, link) = ready_session();
        let finished = Arc::new(Mutex::new(Vec::new()));
        let sink = finished.clone();

        let progress = session
            .reader()
            .unwrap()
            .property(Characteristic::Battery)
            .property(Characteristic::TxLevel)
            .on_operation_complete(move |outcome| {
                sink.lock()
                    .unwrap()
                    .push((outcome.characteristic, outcome.is_last));
            })
            .commit()
            .unwrap();

        assert_eq!(progress, QueueProgress::InFlight);
        assert_eq!(
            reads_after_initial(&session),
            vec![Characteristic::Battery.uuid()]
        );

        session.handle_event(event(
            link,
            TransportEvent::CharacteristicRead {
                characteristic: Characteristic::Battery.uuid(),
                result: Ok(vec![0x0C, 0x80]),
            },
        ));
        session.handle_event(event(
            link,
            TransportEvent::CharacteristicRead {
                characteristic: Characteristic::TxLevel.uuid(),
                result: Ok(vec![0x00, 0x04]),
            },
        ));

        assert_eq!(session.battery_voltage().unwrap(), 3200);
        assert_eq!(session.broadcasting_power().unwrap(), 4);
        assert_eq!(
            *finished.lock().unwrap(),
            vec![
                (Characteristic::Battery.uuid(), false),
                (Characteristic::TxLevel.uuid(), true)
            ]
        );
        assert!(session.reader().is_ok());
    }

    #[test]
    fn should_report_failed_read_and_finish_batch() {
        let (mut session, _observer, link) = ready_session();
        let failures = Arc::new(Mutex::new(0));
        let sink = failures.clone();

        session
            .reader()
            .unwrap()
            .properties([Characteristic::Major, Characteristic::Minor])
            .on_operation_complete(move |outcome| {
                if outcome.result.is_err() {
                    *sink.lock().unwrap() += 1;
                }
            })
            .commit()
            .unwrap();

        session.handle_event(event(
            link,
            TransportEvent::CharacteristicRead {
                characteristic: Characteristic::Major.uuid(),
                result: Err(TransportError::Read {
                    characteristic: Characteristic::Major.uuid(),
                    source: "insufficient authentication".into(),
                }),
            },
        ));
        assert_eq!(
            reads_after_initial(&session),
            vec![Characteristic::Major.uuid(), Characteristic::Minor.uuid()]
        );

        session.handle_event(event(
            link,
            TransportEvent::CharacteristicRead {
                characteristic: Characteristic::Minor.uuid(),
                result: Ok(vec![0x00, 0x02]),
            },
        ));

        assert_eq!(*failures.lock().unwrap(), 1);
        assert_eq!(session.major().unwrap(), 7);
        assert_eq!(session.minor().unwrap(), 2);
        assert!(session.reader().is_ok());
    }

    #[test]
    fn should_treat_empty_reader_as_noop() {
        let (mut session, _observer, _link) = ready_session();
        let fired = Arc::new(Mutex::new(false));
        let sink = fired.clone();

        let progress = session
            .reader()
            .unwrap()
            .on_operation_complete(move |_| *sink.lock().unwrap() = true)
            .commit()
            .unwrap();

        assert_eq!(progress, QueueProgress::Drained);
        assert!(!*fired.lock().unwrap());
        assert!(reads_after_initial(&session).is_empty());
        assert!(session.reader().is_ok());
    }

    #[test]
    fn should_require_completion_callback() {
        let (mut session, _observer, _link) = ready_session();

        let err = session
            .reader()
            .unwrap()
            .property(Characteristic::Battery)
            .commit()
            .unwrap_err();

        assert!(matches!(
            err,
            PlutoconError::State(ProtocolStateError::MissingCompletionCallback)
        ));
        assert!(reads_after_initial(&session).is_empty());
    }

    #[test]
    fn should_reject_undiscovered_characteristic() {
        let (mut session, _observer) = new_session();
        session.connect().unwrap();
        let link = session.link().unwrap();
        session.handle_event(event(link, TransportEvent::LinkUp));
        session.handle_event(event(
            link,
            TransportEvent::ServicesDiscovered(Ok(vec![DiscoveredCharacteristic {
                service: SERVICE,
                characteristic: Characteristic::Battery.uuid(),
                descriptors: Vec::new(),
            }])),
        ));
        session.handle_event(event(
            link,
            TransportEvent::CharacteristicRead {
                characteristic: Characteristic::Battery.uuid(),
                result: Ok(vec![0x0B, 0xB8]),
            },
        ));
        assert!(session.is_connected());

        let err = session
            .reader()
            .unwrap()
            .property(Characteristic::Major)
            .on_operation_complete(|_| {})
            .commit()
            .unwrap_err();

        assert!(matches!(
            err,
            PlutoconError::State(ProtocolStateError::UnknownCharacteristic(uuid))
                if uuid == Characteristic::Major.uuid()
        ));
    }
}
