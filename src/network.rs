//! Port-level connectivity and discrete-event propagation.
//!
//! [`Network`] mediates all connections between device ports and drives
//! the bounded fixed-point iteration that resolves one simulation
//! cycle. It never owns device state itself - it reaches into
//! [`Devices`] by id, the same way the teacher's experiment layer
//! reaches into its device collection through closures rather than
//! holding duplicate state.

use indexmap::IndexMap;

use crate::devices::{DeviceKind, Devices, PortId, SignalLevel};
use crate::names::{NameId, Names};

/// Upper bound on fixed-point iterations per cycle before a network is
/// declared oscillating. Chosen to exceed any legal combinational depth
/// in practical circuits while bounding worst-case runtime.
pub const MAX_FIXED_POINT_ITERATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    DeviceAbsent,
    PortAbsent,
    InputConnected,
    InputToInput,
    OutputToOutput,
}

#[derive(Debug)]
pub struct Network;

impl Network {
    pub fn new() -> Self {
        Network
    }

    /// Connects an output port to an input port. Both endpoints are
    /// validated before any mutation occurs.
    pub fn make_connection(
        &self,
        devices: &mut Devices,
        out_device: NameId,
        out_port: PortId,
        in_device: NameId,
        in_port: NameId,
    ) -> Result<(), ConnectionError> {
        {
            let out_dev = devices.get_device(out_device).ok_or(ConnectionError::DeviceAbsent)?;
            if !out_dev.outputs.contains_key(&out_port) {
                return Err(match out_port {
                    Some(p) if out_dev.inputs.contains_key(&p) => ConnectionError::InputToInput,
                    _ => ConnectionError::PortAbsent,
                });
            }
        }
        {
            let in_dev = devices.get_device(in_device).ok_or(ConnectionError::DeviceAbsent)?;
            if in_dev.outputs.contains_key(&Some(in_port)) {
                return Err(ConnectionError::OutputToOutput);
            }
            let current = in_dev.inputs.get(&in_port).ok_or(ConnectionError::PortAbsent)?;
            if current.is_some() {
                return Err(ConnectionError::InputConnected);
            }
        }

        let in_dev_mut = devices.get_device_mut(in_device).unwrap();
        in_dev_mut.inputs.insert(in_port, Some((out_device, out_port)));
        Ok(())
    }

    /// True iff every input port of every device has a source.
    pub fn check_network(&self, devices: &Devices) -> bool {
        devices.iter().all(|d| d.inputs.values().all(|src| src.is_some()))
    }

    /// Runs one cycle's bounded fixed-point iteration. Returns `true`
    /// once outputs stabilize, `false` if the bound is exceeded
    /// (oscillation).
    ///
    /// DTYPE memory is updated once per cycle, before the combinational
    /// fixed point is sought, using the raw (un-sampled) level on each
    /// flip-flop's own inputs - matching a real edge-triggered device,
    /// which latches once per clock rather than settling
    /// combinationally.
    pub fn execute_network(&self, devices: &mut Devices, names: &Names) -> bool {
        self.update_dtype_memory(devices, names);

        for _ in 0..MAX_FIXED_POINT_ITERATIONS {
            let mut changed = false;
            let ids: Vec<NameId> = devices.iter().map(|d| d.id).collect();

            for id in ids {
                let resolved = self.resolve_inputs(devices, id, true);
                let new_outputs = devices.evaluate(id, &resolved);
                let dev = devices.get_device_mut(id).unwrap();
                if outputs_differ(&dev.outputs, &new_outputs) {
                    changed = true;
                    dev.outputs = new_outputs;
                }
            }

            if !changed {
                return true;
            }
        }
        false
    }

    /// Advances CLOCK/SIGGEN/RC devices by one cycle. Called by the
    /// driver after a successful `execute_network`.
    pub fn advance_devices(&self, devices: &mut Devices) {
        let ids: Vec<NameId> = devices.iter().map(|d| d.id).collect();
        for id in ids {
            devices.advance_state(id);
        }
    }

    /// Resolves every input port of `device_id` to the level its source
    /// currently presents. When `sample` is true, RISING/FALLING
    /// markers on the driving output are translated to HIGH/LOW, as a
    /// downstream combinational input would see them; when false, the
    /// raw marker is preserved, for edge detection.
    fn resolve_inputs(&self, devices: &Devices, device_id: NameId, sample: bool) -> IndexMap<NameId, SignalLevel> {
        let device = devices.get_device(device_id).unwrap();
        let mut resolved = IndexMap::new();
        for (&port, source) in device.inputs.iter() {
            let level = match source {
                Some((src_dev, src_port)) => {
                    let raw = devices
                        .get_device(*src_dev)
                        .and_then(|d| d.outputs.get(src_port))
                        .copied()
                        .unwrap_or(SignalLevel::Low);
                    if sample { raw.sampled() } else { raw }
                }
                None => SignalLevel::Low,
            };
            resolved.insert(port, level);
        }
        resolved
    }

    /// Edge-triggered DTYPE update: SET dominates CLEAR, which
    /// dominates a rising edge on CLK latching DATA; otherwise memory
    /// is unchanged.
    fn update_dtype_memory(&self, devices: &mut Devices, names: &Names) {
        let set_id = names.reserved("SET");
        let clear_id = names.reserved("CLEAR");
        let clk_id = names.reserved("CLK");
        let data_id = names.reserved("DATA");

        let dtype_ids: Vec<NameId> = devices
            .iter()
            .filter(|d| matches!(d.kind, DeviceKind::Dtype { .. }))
            .map(|d| d.id)
            .collect();

        for id in dtype_ids {
            let raw = self.resolve_inputs(devices, id, false);
            let sampled = self.resolve_inputs(devices, id, true);

            let set = sampled.get(&set_id).copied().unwrap_or(SignalLevel::Low).as_bool();
            let clear = sampled.get(&clear_id).copied().unwrap_or(SignalLevel::Low).as_bool();
            let clk_rising = raw.get(&clk_id).copied().unwrap_or(SignalLevel::Low) == SignalLevel::Rising;
            let data = sampled.get(&data_id).copied().unwrap_or(SignalLevel::Low).as_bool();

            if let DeviceKind::Dtype { memory } = &mut devices.get_device_mut(id).unwrap().kind {
                if set {
                    *memory = true;
                } else if clear {
                    *memory = false;
                } else if clk_rising {
                    *memory = data;
                }
            }
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::new()
    }
}

fn outputs_differ(a: &IndexMap<PortId, SignalLevel>, b: &IndexMap<PortId, SignalLevel>) -> bool {
    a.len() != b.len() || a.iter().any(|(k, v)| b.get(k) != Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{DeviceKindTag, Qualifier};

    fn wire_and(devices: &mut Devices, network: &Network, names: &mut Names) -> (NameId, NameId, NameId) {
        let sw1 = names.lookup(&["sw1"])[0];
        let sw2 = names.lookup(&["sw2"])[0];
        let gate = names.lookup(&["g"])[0];
        devices.make_device(names, sw1, DeviceKindTag::Switch, Qualifier::Bit(false)).unwrap();
        devices.make_device(names, sw2, DeviceKindTag::Switch, Qualifier::Bit(false)).unwrap();
        devices.make_device(names, gate, DeviceKindTag::And, Qualifier::Count(2)).unwrap();
        let i1 = names.lookup(&["I1"])[0];
        let i2 = names.lookup(&["I2"])[0];
        network.make_connection(devices, sw1, None, gate, i1).unwrap();
        network.make_connection(devices, sw2, None, gate, i2).unwrap();
        (sw1, sw2, gate)
    }

    #[test]
    fn connection_rejects_reconnecting_input() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let network = Network::new();
        let (_, sw2, gate) = wire_and(&mut devices, &network, &mut names);
        let i1 = names.reserved("I1");
        let err = network.make_connection(&mut devices, sw2, None, gate, i1).unwrap_err();
        assert_eq!(err, ConnectionError::InputConnected);
    }

    #[test]
    fn connection_rejects_input_to_input() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let network = Network::new();
        let gate = names.lookup(&["g"])[0];
        devices.make_device(&mut names, gate, DeviceKindTag::And, Qualifier::Count(2)).unwrap();
        let i1 = names.reserved("I1");
        let i2 = names.reserved("I2");
        // gate.I1 names an input, not an output - rejected distinctly
        // from a simply-absent port.
        let err = network.make_connection(&mut devices, gate, Some(i1), gate, i2).unwrap_err();
        assert_eq!(err, ConnectionError::InputToInput);
    }

    #[test]
    fn connection_rejects_output_to_output() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let network = Network::new();
        let sw = names.lookup(&["sw"])[0];
        devices.make_device(&mut names, sw, DeviceKindTag::Switch, Qualifier::Bit(false)).unwrap();
        let ff = names.lookup(&["ff"])[0];
        devices.make_device(&mut names, ff, DeviceKindTag::Dtype, Qualifier::None).unwrap();
        let q = names.reserved("Q");
        // ff.Q names an output, not an input - rejected distinctly from
        // a simply-absent port.
        let err = network.make_connection(&mut devices, sw, None, ff, q).unwrap_err();
        assert_eq!(err, ConnectionError::OutputToOutput);
    }

    #[test]
    fn fully_connected_network_passes_check() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let network = Network::new();
        wire_and(&mut devices, &network, &mut names);
        assert!(network.check_network(&devices));
    }

    #[test]
    fn and_gate_stabilizes_in_two_iterations_worth_of_work() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let network = Network::new();
        let (sw1, sw2, gate) = wire_and(&mut devices, &network, &mut names);
        devices.set_switch(sw1, true).unwrap();
        devices.set_switch(sw2, true).unwrap();
        assert!(network.execute_network(&mut devices, &names));
        assert_eq!(devices.get_device(gate).unwrap().outputs[&None], SignalLevel::High);
    }

    #[test]
    fn self_feeding_inverter_oscillates() {
        let mut names = Names::new();
        let mut devices = Devices::new();
        let network = Network::new();
        let nand = names.lookup(&["inv"])[0];
        devices.make_device(&mut names, nand, DeviceKindTag::Nand, Qualifier::Count(1)).unwrap();
        let i1 = names.reserved("I1");
        network.make_connection(&mut devices, nand, None, nand, i1).unwrap();
        assert!(!network.execute_network(&mut devices, &names));
    }
}
