//! [`Transport`] implementation on top of btleplug.
//!
//! btleplug is async while the port is a set of fire-and-forget requests.
//! Every request spawns one task on the runtime that owns the adapter; the
//! task performs the radio work and posts the result as a [`LinkEvent`] on
//! an unbounded channel. The owner drains that channel into
//! `Session::handle_event`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, ValueNotification, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use plutocon_app::ports::{LinkEvent, LinkHandle, Transport, TransportEvent};
use plutocon_domain::error::TransportError;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt as _};
use uuid::Uuid;

use crate::config::BleConfig;
use crate::error::BleError;
use crate::gatt;

/// Resources held for one opened link.
#[derive(Default)]
struct LinkSlot {
    peripheral: Option<Peripheral>,
    tasks: Vec<JoinHandle<()>>,
}

type Links = Arc<Mutex<HashMap<LinkHandle, LinkSlot>>>;

fn lock(links: &Links) -> MutexGuard<'_, HashMap<LinkHandle, LinkSlot>> {
    links.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Posts events for one link.
#[derive(Clone)]
struct Emitter {
    link: LinkHandle,
    sender: mpsc::UnboundedSender<LinkEvent>,
}

impl Emitter {
    fn emit(&self, event: TransportEvent) {
        if self.sender.send(LinkEvent::new(self.link, event)).is_err() {
            tracing::trace!(link = %self.link, "event receiver dropped");
        }
    }
}

/// BLE transport backed by one host adapter.
pub struct BtleplugTransport {
    adapter: Adapter,
    config: BleConfig,
    runtime: Handle,
    links: Links,
    next_link: u64,
    sender: mpsc::UnboundedSender<LinkEvent>,
}

impl BtleplugTransport {
    /// Open the configured host adapter.
    ///
    /// Must be called from within a tokio runtime; request tasks are spawned
    /// on it. The returned receiver yields every [`LinkEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotAvailable`] when the adapter index does not
    /// exist, or a btleplug error when the BLE stack cannot be reached.
    pub async fn new(
        config: BleConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LinkEvent>), BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleError::NotAvailable)?;
        match adapter.adapter_info().await {
            Ok(info) => tracing::info!(%info, index = config.adapter_index, "BLE adapter ready"),
            Err(err) => tracing::debug!(%err, "adapter info unavailable"),
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let transport = Self {
            adapter,
            config,
            runtime: Handle::current(),
            links: Arc::default(),
            next_link: 0,
            sender,
        };
        Ok((transport, receiver))
    }

    fn emitter(&self, link: LinkHandle) -> Emitter {
        Emitter {
            link,
            sender: self.sender.clone(),
        }
    }

    fn peripheral(&self, link: LinkHandle) -> Result<Peripheral, TransportError> {
        lock(&self.links)
            .get(&link)
            .and_then(|slot| slot.peripheral.clone())
            .ok_or(TransportError::UnknownLink(link.as_u64()))
    }

    fn spawn<F>(&self, link: LinkHandle, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(task);
        let mut links = lock(&self.links);
        match links.get_mut(&link) {
            Some(slot) => {
                slot.tasks.retain(|task| !task.is_finished());
                slot.tasks.push(handle);
            }
            None => handle.abort(),
        }
    }
}

impl Transport for BtleplugTransport {
    fn open(&mut self, address: &str) -> Result<LinkHandle, TransportError> {
        let address = gatt::parse_address(address).map_err(BleError::into_link)?;
        self.next_link += 1;
        let link = LinkHandle::new(self.next_link);
        lock(&self.links).insert(link, LinkSlot::default());

        let adapter = self.adapter.clone();
        let links = self.links.clone();
        let emitter = self.emitter(link);
        let scan_timeout = self.config.scan_timeout();
        let connect_timeout = self.config.connect_timeout();
        tracing::debug!(%link, %address, "opening link");

        self.spawn(link, async move {
            let connected = async {
                let peripheral = gatt::find_peripheral(&adapter, address, scan_timeout).await?;
                tokio::time::timeout(connect_timeout, peripheral.connect())
                    .await
                    .map_err(|_| BleError::Timeout {
                        operation: "connect",
                    })??;
                Ok::<_, BleError>(peripheral)
            };
            match connected.await {
                Ok(peripheral) => {
                    let watcher = tokio::spawn(watch_link(
                        adapter,
                        peripheral.clone(),
                        emitter.clone(),
                    ));
                    let mut links = lock(&links);
                    match links.get_mut(&link) {
                        Some(slot) => {
                            slot.peripheral = Some(peripheral);
                            slot.tasks.push(watcher);
                            drop(links);
                            emitter.emit(TransportEvent::LinkUp);
                        }
                        None => watcher.abort(),
                    }
                }
                Err(err) => emitter.emit(TransportEvent::LinkError(err.into_link())),
            }
        });
        Ok(link)
    }

    fn discover_services(&mut self, link: LinkHandle) -> Result<(), TransportError> {
        let peripheral = self.peripheral(link)?;
        let emitter = self.emitter(link);
        self.spawn(link, async move {
            let result = match peripheral.discover_services().await {
                Ok(()) => {
                    gatt::subscribe_notifiable(&peripheral).await;
                    Ok(peripheral
                        .characteristics()
                        .iter()
                        .map(gatt::to_discovered)
                        .collect())
                }
                Err(err) => Err(BleError::from(err).into_discovery()),
            };
            emitter.emit(TransportEvent::ServicesDiscovered(result));
        });
        Ok(())
    }

    fn read_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        let peripheral = self.peripheral(link)?;
        let target = gatt::find_characteristic(&peripheral, characteristic)
            .map_err(|err| err.into_read(characteristic))?;
        let emitter = self.emitter(link);
        self.spawn(link, async move {
            let result = peripheral
                .read(&target)
                .await
                .map_err(|err| BleError::from(err).into_read(characteristic));
            emitter.emit(TransportEvent::CharacteristicRead {
                characteristic,
                result,
            });
        });
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let peripheral = self.peripheral(link)?;
        let target = gatt::find_characteristic(&peripheral, characteristic)
            .map_err(|err| err.into_write(characteristic))?;
        let emitter = self.emitter(link);
        let value = value.to_vec();
        self.spawn(link, async move {
            let result = peripheral
                .write(&target, &value, WriteType::WithResponse)
                .await
                .map_err(|err| BleError::from(err).into_write(characteristic));
            emitter.emit(TransportEvent::CharacteristicWritten {
                characteristic,
                result,
            });
        });
        Ok(())
    }

    fn read_signal_strength(&mut self, link: LinkHandle) -> Result<(), TransportError> {
        let peripheral = self.peripheral(link)?;
        let emitter = self.emitter(link);
        self.spawn(link, async move {
            let result = match peripheral.properties().await {
                Ok(properties) => properties
                    .and_then(|properties| properties.rssi)
                    .ok_or_else(|| BleError::NoSignalStrength.into_signal_strength()),
                Err(err) => Err(BleError::from(err).into_signal_strength()),
            };
            emitter.emit(TransportEvent::SignalStrength(result));
        });
        Ok(())
    }

    fn disconnect(&mut self, link: LinkHandle) -> Result<(), TransportError> {
        let peripheral = self.peripheral(link)?;
        let emitter = self.emitter(link);
        self.spawn(link, async move {
            match peripheral.disconnect().await {
                Ok(()) => emitter.emit(TransportEvent::LinkDown),
                Err(err) => {
                    emitter.emit(TransportEvent::LinkError(BleError::from(err).into_link()));
                }
            }
        });
        Ok(())
    }

    fn close(&mut self, link: LinkHandle) {
        let Some(slot) = lock(&self.links).remove(&link) else {
            return;
        };
        for task in slot.tasks {
            task.abort();
        }
        if let Some(peripheral) = slot.peripheral {
            self.runtime.spawn(async move {
                if peripheral.is_connected().await.unwrap_or(false)
                    && let Err(err) = peripheral.disconnect().await
                {
                    tracing::warn!(%err, "failed to disconnect peripheral on close");
                }
            });
        }
        tracing::debug!(%link, "link closed");
    }
}

/// Forward notifications and report the link going down.
///
/// Always ends with a terminal event so the session never waits on a link
/// nobody watches.
async fn watch_link(adapter: Adapter, peripheral: Peripheral, emitter: Emitter) {
    let (central_events, notifications) =
        match (adapter.events().await, peripheral.notifications().await) {
            (Ok(events), Ok(notifications)) => (events, notifications),
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(%err, link = %emitter.link, "cannot watch link");
                emitter.emit(TransportEvent::LinkError(BleError::from(err).into_link()));
                return;
            }
        };
    let id = peripheral.id();
    forward_link_events(
        central_events,
        notifications,
        |event| matches!(event, CentralEvent::DeviceDisconnected(gone) if *gone == id),
        &emitter,
    )
    .await;
}

/// Pump both streams until `is_gone` matches or the central stream ends,
/// then report `LinkDown`.
async fn forward_link_events<C, N, G>(
    mut central_events: C,
    mut notifications: N,
    is_gone: G,
    emitter: &Emitter,
) where
    C: Stream<Item = CentralEvent> + Unpin,
    N: Stream<Item = ValueNotification> + Unpin,
    G: Fn(&CentralEvent) -> bool,
{
    loop {
        tokio::select! {
            event = central_events.next() => match event {
                Some(event) if is_gone(&event) => break,
                Some(_) => {}
                None => {
                    tracing::debug!(link = %emitter.link, "central event stream ended");
                    break;
                }
            },
            Some(notification) = notifications.next() => {
                emitter.emit(TransportEvent::CharacteristicChanged {
                    characteristic: notification.uuid,
                    value: notification.value,
                });
            }
        }
    }
    emitter.emit(TransportEvent::LinkDown);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter() -> (Emitter, mpsc::UnboundedReceiver<LinkEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let emitter = Emitter {
            link: LinkHandle::new(1),
            sender,
        };
        (emitter, receiver)
    }

    #[tokio::test]
    async fn should_report_link_down_when_central_events_end() {
        let (emitter, mut receiver) = emitter();

        forward_link_events(
            tokio_stream::empty::<CentralEvent>(),
            tokio_stream::pending::<ValueNotification>(),
            |_| false,
            &emitter,
        )
        .await;

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.link, LinkHandle::new(1));
        assert!(matches!(event.event, TransportEvent::LinkDown));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_forward_notifications_until_link_goes_down() {
        let (emitter, mut receiver) = emitter();
        let uuid = Uuid::from_u128(0x0000_0105_4b54_4348_8000_504c_5554_4f4e);
        let notifications = tokio_stream::iter(vec![ValueNotification {
            uuid,
            value: vec![0x0B, 0xB8],
        }]);

        let watcher = tokio::spawn(async move {
            forward_link_events(
                tokio_stream::pending::<CentralEvent>(),
                notifications,
                |_| false,
                &emitter,
            )
            .await;
        });

        let event = receiver.recv().await.unwrap();
        let TransportEvent::CharacteristicChanged {
            characteristic,
            value,
        } = event.event
        else {
            panic!("expected a notification");
        };
        assert_eq!(characteristic, uuid);
        assert_eq!(value, vec![0x0B, 0xB8]);
        watcher.abort();
    }
}
