//! Observer registry for trace recording.
//!
//! A [`Monitors`] table tracks which `(device, port)` output pairs are
//! being observed and accumulates one [`SignalLevel`] sample per cycle
//! for each. It has no teacher analog - the NI-oriented example crates
//! have no trace/observer concept - so its accessor shape is modeled on
//! how the teacher's experiment layer reaches into its device
//! collection by id, and its external contract (`get_signals_for_GUI`)
//! mirrors what the original prototype's GUI module expected.

use indexmap::IndexMap;

use crate::devices::{Devices, PortId, SignalLevel};
use crate::names::{NameId, Names};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakeMonitorError {
    MonitorPresent,
    DeviceAbsent,
    PortAbsent,
    NotOutput,
}

#[derive(Debug)]
pub struct Monitors {
    traces: IndexMap<(NameId, PortId), Vec<SignalLevel>>,
}

impl Monitors {
    pub fn new() -> Self {
        Monitors { traces: IndexMap::new() }
    }

    /// Registers a new observer. `cycles_elapsed` backfills the new
    /// trace with that many BLANK samples so every trace stays aligned
    /// on the same timebase regardless of when it was added.
    pub fn make_monitor(
        &mut self,
        devices: &Devices,
        device_id: NameId,
        port: PortId,
        cycles_elapsed: usize,
    ) -> Result<(), MakeMonitorError> {
        if self.traces.contains_key(&(device_id, port)) {
            return Err(MakeMonitorError::MonitorPresent);
        }
        let device = devices.get_device(device_id).ok_or(MakeMonitorError::DeviceAbsent)?;
        if !device.outputs.contains_key(&port) {
            // Distinguish "no such port at all" from "that port exists,
            // but as an input" (e.g. monitoring `gate.I1`).
            match port {
                Some(p) if device.inputs.contains_key(&p) => return Err(MakeMonitorError::NotOutput),
                _ => return Err(MakeMonitorError::PortAbsent),
            }
        }

        let backfill = vec![SignalLevel::Blank; cycles_elapsed];
        self.traces.insert((device_id, port), backfill);
        Ok(())
    }

    /// Removes an observer. Idempotent: removing an absent monitor is
    /// not an error.
    pub fn remove_monitor(&mut self, device_id: NameId, port: PortId) {
        self.traces.shift_remove(&(device_id, port));
    }

    /// Appends the current output level of every monitored port. Called
    /// once per cycle, after `execute_network` succeeds.
    pub fn record_signals(&mut self, devices: &Devices) {
        for (&(device_id, port), trace) in self.traces.iter_mut() {
            let level = devices
                .get_device(device_id)
                .and_then(|d| d.outputs.get(&port))
                .copied()
                .unwrap_or(SignalLevel::Blank);
            trace.push(level);
        }
    }

    /// Clears every trace buffer. Does not remove the observers
    /// themselves, and does not re-pad with BLANKs - the caller is
    /// expected to reset its own cycle counter alongside this call.
    pub fn reset_monitors(&mut self, devices: &Devices) {
        let _ = devices;
        for trace in self.traces.values_mut() {
            trace.clear();
        }
    }

    pub fn get_signal_names(&self, names: &Names, devices: &Devices) -> (Vec<String>, Vec<String>) {
        let monitored: Vec<String> = self
            .traces
            .keys()
            .map(|&(dev, port)| devices.get_signal_name(names, dev, port))
            .collect();

        let mut unmonitored = Vec::new();
        for device in devices.iter() {
            for &port in device.outputs.keys() {
                if !self.traces.contains_key(&(device.id, port)) {
                    unmonitored.push(devices.get_signal_name(names, device.id, port));
                }
            }
        }
        (monitored, unmonitored)
    }

    /// Labeled traces, in registration order, for the external trace
    /// viewer.
    pub fn get_signals_for_gui(&self, names: &Names, devices: &Devices) -> Vec<(String, Vec<SignalLevel>)> {
        self.traces
            .iter()
            .map(|(&(dev, port), trace)| (devices.get_signal_name(names, dev, port), trace.clone()))
            .collect()
    }

    /// Prints every trace as an ASCII waveform, one line per monitor.
    pub fn display_signals(&self, names: &Names, devices: &Devices, out: &mut dyn std::io::Write) {
        for (label, trace) in self.get_signals_for_gui(names, devices) {
            let glyphs: String = trace
                .iter()
                .map(|level| match level {
                    SignalLevel::Low | SignalLevel::Falling => '_',
                    SignalLevel::High | SignalLevel::Rising => '\u{203e}',
                    SignalLevel::Blank => ' ',
                })
                .collect();
            let _ = writeln!(out, "{:>12}: {}", label, glyphs);
        }
    }
}

impl Default for Monitors {
    fn default() -> Self {
        Monitors::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{DeviceKindTag, Qualifier};

    #[test]
    fn late_monitor_is_backfilled_with_blanks() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let sw = names.lookup(&["sw"])[0];
        devices.make_device(&mut names, sw, DeviceKindTag::Switch, Qualifier::Bit(false)).unwrap();
        let mut monitors = Monitors::new();
        monitors.make_monitor(&devices, sw, None, 3).unwrap();
        let (monitored, _) = monitors.get_signal_names(&names, &devices);
        assert_eq!(monitored, vec!["sw".to_string()]);
        let traces = monitors.get_signals_for_gui(&names, &devices);
        assert_eq!(traces[0].1, vec![SignalLevel::Blank; 3]);
    }

    #[test]
    fn duplicate_monitor_rejected() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let sw = names.lookup(&["sw"])[0];
        devices.make_device(&mut names, sw, DeviceKindTag::Switch, Qualifier::Bit(false)).unwrap();
        let mut monitors = Monitors::new();
        monitors.make_monitor(&devices, sw, None, 0).unwrap();
        let err = monitors.make_monitor(&devices, sw, None, 0).unwrap_err();
        assert_eq!(err, MakeMonitorError::MonitorPresent);
    }

    #[test]
    fn reset_clears_without_removing() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let sw = names.lookup(&["sw"])[0];
        devices.make_device(&mut names, sw, DeviceKindTag::Switch, Qualifier::Bit(true)).unwrap();
        let mut monitors = Monitors::new();
        monitors.make_monitor(&devices, sw, None, 0).unwrap();
        monitors.record_signals(&devices);
        monitors.reset_monitors(&devices);
        let traces = monitors.get_signals_for_gui(&names, &devices);
        assert!(traces[0].1.is_empty());
    }
}
