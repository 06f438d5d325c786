//! Central manager (§4.F): owns the set of peripheral sessions, keyed by
//! stable UUID string, drives the adapter's power-state handling, and
//! resolves `deviceFromUUIDString` rendezvous against connect outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, PeripheralId, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::session::PeripheralSession;
use crate::sync::KeyedEvent;
use crate::transport::BtleplugTransport;

/// Adapter power-state machine (§4.F). `btleplug` doesn't expose a
/// uniform cross-platform power-state signal the way CoreBluetooth
/// does, so `PoweredOff`/`Unauthorized` are reachable only via
/// `CentralManager::force_state` from an embedding app that has its own
/// platform-specific signal; this crate's own probing can only tell
/// `PoweredOn` (an adapter is present and enumerable) from `Unsupported`
/// (none is) — see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unknown,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

type Session = PeripheralSession<BtleplugTransport>;
type ConnectOutcome = std::result::Result<Arc<Session>, Error>;

/// `PeripheralId` has no stable `Display`, only `Debug`; the allowlist and
/// session maps are keyed by this string form throughout.
fn peripheral_id_string(id: &PeripheralId) -> String {
    format!("{id:?}")
}

/// Owns every peripheral session for a single BLE adapter.
pub struct CentralManager {
    manager: Manager,
    adapter: Mutex<Option<Adapter>>,
    state: StdMutex<AdapterState>,
    wanted: Mutex<Vec<String>>,
    known: Mutex<HashMap<String, Peripheral>>,
    connecting: Mutex<HashSet<String>>,
    connected: Mutex<HashMap<String, Arc<Session>>>,
    connect_event: KeyedEvent<String, ConnectOutcome>,
}

impl CentralManager {
    /// Bring up a manager, pick the first available adapter (best-effort,
    /// §4.F "attempt to power on"), and start its periodic recovery timer
    /// and event stream.
    pub async fn new() -> Result<Arc<Self>> {
        let manager = Manager::new()
            .await
            .map_err(|e| Error::AdapterFatal(e.to_string()))?;
        let this = Arc::new(Self {
            manager,
            adapter: Mutex::new(None),
            state: StdMutex::new(AdapterState::Unknown),
            wanted: Mutex::new(Vec::new()),
            known: Mutex::new(HashMap::new()),
            connecting: Mutex::new(HashSet::new()),
            connected: Mutex::new(HashMap::new()),
            connect_event: KeyedEvent::new(),
        });

        let timer = this.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(4));
            loop {
                ticker.tick().await;
                timer.reconcile_adapter_state().await;
            }
        });

        let events = this.clone();
        tokio::spawn(async move { events.run_events().await });

        this.reconcile_adapter_state().await;
        Ok(this)
    }

    pub fn state(&self) -> AdapterState {
        *self.state.lock().unwrap()
    }

    /// Force the adapter state machine into `state` from outside, for an
    /// embedding application with its own platform-specific power-state
    /// source (§4.F; see `AdapterState`'s doc comment on why this crate's
    /// own probing can only ever observe `PoweredOn`/`Unsupported`).
    pub async fn force_state(self: &Arc<Self>, state: AdapterState) {
        self.set_state(state).await;
        if matches!(state, AdapterState::Unsupported | AdapterState::Unauthorized) {
            self.fail_wanted_fatally(state).await;
        }
        if state == AdapterState::PoweredOn {
            self.enter_powered_on().await;
        }
    }

    /// `deviceFromUUIDString` (§4.F): add `uuid` to the wanted set if new,
    /// kick the adapter handler, and await the connect rendezvous.
    pub async fn device_from_uuid_string(
        self: &Arc<Self>,
        uuid: &str,
    ) -> Result<Arc<Session>> {
        {
            let mut wanted = self.wanted.lock().await;
            if !wanted.iter().any(|u| u == uuid) {
                wanted.push(uuid.to_string());
            }
        }
        if let Some(session) = self.connected.lock().await.get(uuid).cloned() {
            return Ok(session);
        }
        let rx = self.connect_event.listen(uuid.to_string());
        self.reconcile_adapter_state().await;
        rx.await
            .unwrap_or_else(|_| Err(Error::Link("connect rendezvous dropped".into())))
    }

    async fn reconcile_adapter_state(self: &Arc<Self>) {
        let adapters = match self.manager.adapters().await {
            Ok(a) => a,
            Err(e) => {
                self.set_state(AdapterState::Unsupported).await;
                self.fail_wanted_fatally(AdapterState::Unsupported).await;
                log::error!("no BLE adapter available: {e}");
                return;
            }
        };
        let Some(adapter) = adapters.into_iter().next() else {
            self.set_state(AdapterState::Unsupported).await;
            self.fail_wanted_fatally(AdapterState::Unsupported).await;
            return;
        };
        *self.adapter.lock().await = Some(adapter);
        self.set_state(AdapterState::PoweredOn).await;
        self.enter_powered_on().await;
    }

    /// §4.F "In Unsupported/Unauthorized, fail fatally": every UUID
    /// currently awaited via `device_from_uuid_string` resolves with
    /// `Error::AdapterFatal` instead of hanging forever.
    async fn fail_wanted_fatally(&self, state: AdapterState) {
        let wanted = self.wanted.lock().await.clone();
        for uuid in wanted {
            self.connect_event.trigger(
                &uuid,
                Err(Error::AdapterFatal(format!("adapter is {state:?}"))),
            );
        }
    }

    async fn set_state(&self, new_state: AdapterState) {
        let changed = {
            let mut guard = self.state.lock().unwrap();
            let changed = *guard != new_state;
            *guard = new_state;
            changed
        };
        if changed {
            log::info!("adapter state -> {new_state:?}");
        }
        if new_state != AdapterState::PoweredOn {
            self.clear_maps_below_powered_on().await;
        }
    }

    async fn clear_maps_below_powered_on(&self) {
        for (_, session) in self.connected.lock().await.drain() {
            session.force_disconnect(Error::AdapterFatal(
                "adapter dropped below PoweredOn".to_string(),
            ));
        }
        self.known.lock().await.clear();
        self.connecting.lock().await.clear();
    }

    async fn enter_powered_on(self: &Arc<Self>) {
        let adapter = self.adapter.lock().await.clone();
        let Some(adapter) = adapter else { return };
        let wanted = self.wanted.lock().await.clone();
        let mut any_unknown = false;
        for uuid in &wanted {
            if self.known.lock().await.contains_key(uuid)
                || self.connected.lock().await.contains_key(uuid)
            {
                continue;
            }
            let found = adapter
                .peripherals()
                .await
                .ok()
                .and_then(|ps| ps.into_iter().find(|p| peripheral_id_string(&p.id()) == *uuid));
            match found {
                Some(peripheral) => self.on_peripheral_discovered(uuid.clone(), peripheral).await,
                None => any_unknown = true,
            }
        }
        if any_unknown {
            let _ = adapter.start_scan(ScanFilter::default()).await;
        } else {
            let _ = adapter.stop_scan().await;
        }
    }

    async fn on_peripheral_discovered(self: &Arc<Self>, uuid: String, peripheral: Peripheral) {
        self.known.lock().await.insert(uuid.clone(), peripheral.clone());
        if self.connected.lock().await.contains_key(&uuid) {
            return;
        }
        {
            let mut connecting = self.connecting.lock().await;
            if connecting.contains(&uuid) {
                return;
            }
            connecting.insert(uuid.clone());
        }
        let this = self.clone();
        tokio::spawn(async move { this.initiate_connect(uuid, peripheral).await });
    }

    async fn initiate_connect(self: Arc<Self>, uuid: String, peripheral: Peripheral) {
        if let Err(e) = peripheral.connect().await {
            self.connecting.lock().await.remove(&uuid);
            self.known.lock().await.remove(&uuid);
            self.connect_event.trigger(&uuid, Err(Error::from(e)));
            return;
        }
        let transport = BtleplugTransport::new(peripheral);
        let session = PeripheralSession::connect(uuid.clone(), transport).await;

        self.connecting.lock().await.remove(&uuid);
        self.connected.lock().await.insert(uuid.clone(), session.clone());
        self.connect_event.trigger(&uuid, Ok(session.clone()));

        let watch_this = self.clone();
        let watch_uuid = uuid;
        let watch_session = session;
        tokio::spawn(async move {
            let cause = watch_session.wait_disconnected().await;
            watch_this.connected.lock().await.remove(&watch_uuid);
            watch_this.known.lock().await.remove(&watch_uuid);
            watch_this.connect_event.trigger(&watch_uuid, Err(cause));
        });
    }

    async fn run_events(self: Arc<Self>) {
        loop {
            let adapter = self.adapter.lock().await.clone();
            let Some(adapter) = adapter else {
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            };
            let mut events = match adapter.events().await {
                Ok(e) => e,
                Err(_) => {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            while let Some(event) = events.next().await {
                self.handle_central_event(&adapter, event).await;
            }
        }
    }

    async fn handle_central_event(self: &Arc<Self>, adapter: &Adapter, event: CentralEvent) {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                self.maybe_adopt_discovered(adapter, id).await;
            }
            CentralEvent::DeviceDisconnected(id) => {
                log::debug!("adapter reported disconnect for {id:?}");
            }
            _ => {}
        }
    }

    async fn maybe_adopt_discovered(self: &Arc<Self>, adapter: &Adapter, id: PeripheralId) {
        let uuid = peripheral_id_string(&id);
        let is_wanted = self.wanted.lock().await.iter().any(|u| u == &uuid);
        if !is_wanted {
            return;
        }
        if let Ok(peripheral) = adapter.peripheral(&id).await {
            self.on_peripheral_discovered(uuid, peripheral).await;
        }
    }
}
