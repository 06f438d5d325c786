//! GATT delegate (§9 "dynamic callbacks → typed traits"): the source
//! attaches callbacks by name; here they're a typed capability set a
//! session implements, invoked from the session's own notification loop
//! rather than by the BLE stack directly (see `PeripheralSession::run`).

use btleplug::api::Characteristic;

use crate::error::Error;

/// Radio-callback capability set. Default methods are no-ops so an
/// implementor only overrides the hooks it cares about.
pub trait GattDelegate {
    fn on_characteristic_discovered(&self, _tx: &Characteristic, _rx: &Characteristic) {}
    fn on_notify_state_changed(&self, _enabled: bool) {}
    fn on_value_updated(&self, _value: &[u8]) {}
    fn on_write_complete(&self, _result: &Result<(), Error>) {}
    fn on_disconnect(&self, _cause: &Error) {}
}
