//! Device registry: construction, per-kind state, and primitive
//! evaluation rules.
//!
//! A [`Device`] carries the fields common to every kind (`id`, ordered
//! `inputs`/`outputs`) plus a [`DeviceKind`] that tags which variant it
//! is and carries only that variant's own state - a `Clock`'s counter
//! is meaningless on an `And` gate, so there is no shared state field
//! for it to occupy.

use indexmap::IndexMap;
use rand::Rng;

use crate::names::{NameId, Names};

/// Five-valued signal level. RISING/FALLING are single-cycle transient
/// markers; see [`crate::network`] for how they are sampled downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalLevel {
    Low,
    High,
    Rising,
    Falling,
    Blank,
}

impl SignalLevel {
    pub fn as_bool(self) -> bool {
        matches!(self, SignalLevel::High | SignalLevel::Rising)
    }

    pub fn from_bool(b: bool) -> Self {
        if b { SignalLevel::High } else { SignalLevel::Low }
    }

    /// Translates a driver's transient edge marker into the steady
    /// level a downstream input actually samples this cycle.
    pub fn sampled(self) -> SignalLevel {
        match self {
            SignalLevel::Rising => SignalLevel::High,
            SignalLevel::Falling => SignalLevel::Low,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKindTag {
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Dtype,
    Switch,
    Clock,
    SigGen,
    Rc,
}

/// Per-kind state, tagged by variant. See the crate's design notes for
/// why this carries the payload inline rather than as sibling fields.
#[derive(Debug, Clone)]
pub enum DeviceKind {
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Dtype { memory: bool },
    Switch { state: bool },
    Clock { half_period: u32, counter: u32 },
    SigGen { signal_list: Vec<SignalLevel>, counter: usize },
    Rc { period: u32, counter: u32 },
}

impl DeviceKind {
    pub fn tag(&self) -> DeviceKindTag {
        match self {
            DeviceKind::And => DeviceKindTag::And,
            DeviceKind::Nand => DeviceKindTag::Nand,
            DeviceKind::Or => DeviceKindTag::Or,
            DeviceKind::Nor => DeviceKindTag::Nor,
            DeviceKind::Xor => DeviceKindTag::Xor,
            DeviceKind::Dtype { .. } => DeviceKindTag::Dtype,
            DeviceKind::Switch { .. } => DeviceKindTag::Switch,
            DeviceKind::Clock { .. } => DeviceKindTag::Clock,
            DeviceKind::SigGen { .. } => DeviceKindTag::SigGen,
            DeviceKind::Rc { .. } => DeviceKindTag::Rc,
        }
    }
}

/// Input or output port identifier. `None` on the output side means
/// "the device's single default output"; on the input side every key
/// is always `Some`.
pub type PortId = Option<NameId>;

/// A device's one input slot: either unconnected, or driven by a
/// specific `(device, port)` pair.
pub type InputSource = Option<(NameId, PortId)>;

#[derive(Debug)]
pub struct Device {
    pub id: NameId,
    pub kind: DeviceKind,
    pub inputs: IndexMap<NameId, InputSource>,
    pub outputs: IndexMap<PortId, SignalLevel>,
}

/// Qualifier supplied at construction; shape depends on `kind`.
pub enum Qualifier {
    None,
    Count(u32),
    Bit(bool),
    SigGen { initial_level: bool, run_lengths: Vec<u32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakeDeviceError {
    BadDevice,
    DevicePresent,
    QualifierPresent,
    NoQualifier,
    /// Gate input count outside `1..=16`.
    ArityOutOfRange,
    /// CLOCK half-period of 0.
    ClockOutOfRange,
    /// RC period of 0.
    RcOutOfRange,
    /// SIGGEN run-length list empty, or containing a zero run.
    SigGenInvalid,
    /// A qualifier of the wrong shape was supplied for `kind` (a
    /// programmer-misuse case; the parser never constructs one).
    InvalidQualifier,
}

#[derive(Debug)]
pub struct Devices {
    devices: IndexMap<NameId, Device>,
}

impl Devices {
    pub fn new() -> Self {
        Devices { devices: IndexMap::new() }
    }

    /// Builds and registers a device, validating the qualifier against
    /// `kind` per the construction rules for each variant.
    pub fn make_device(
        &mut self,
        names: &mut Names,
        id: NameId,
        tag: DeviceKindTag,
        qualifier: Qualifier,
    ) -> Result<(), MakeDeviceError> {
        if self.devices.contains_key(&id) {
            return Err(MakeDeviceError::DevicePresent);
        }

        let (kind, input_names): (DeviceKind, Vec<&str>) = match (tag, qualifier) {
            (DeviceKindTag::And, Qualifier::Count(n))
            | (DeviceKindTag::Nand, Qualifier::Count(n))
            | (DeviceKindTag::Or, Qualifier::Count(n))
            | (DeviceKindTag::Nor, Qualifier::Count(n)) => {
                if !(1..=16).contains(&n) {
                    return Err(MakeDeviceError::ArityOutOfRange);
                }
                let kind = match tag {
                    DeviceKindTag::And => DeviceKind::And,
                    DeviceKindTag::Nand => DeviceKind::Nand,
                    DeviceKindTag::Or => DeviceKind::Or,
                    DeviceKindTag::Nor => DeviceKind::Nor,
                    _ => unreachable!(),
                };
                (kind, input_port_names(n))
            }
            (DeviceKindTag::And, Qualifier::None)
            | (DeviceKindTag::Nand, Qualifier::None)
            | (DeviceKindTag::Or, Qualifier::None)
            | (DeviceKindTag::Nor, Qualifier::None) => return Err(MakeDeviceError::NoQualifier),

            (DeviceKindTag::And, _)
            | (DeviceKindTag::Nand, _)
            | (DeviceKindTag::Or, _)
            | (DeviceKindTag::Nor, _) => return Err(MakeDeviceError::InvalidQualifier),

            (DeviceKindTag::Xor, Qualifier::None) => (DeviceKind::Xor, vec!["I1", "I2"]),
            (DeviceKindTag::Xor, _) => return Err(MakeDeviceError::QualifierPresent),

            (DeviceKindTag::Dtype, Qualifier::None) => (
                DeviceKind::Dtype { memory: rand::thread_rng().gen_bool(0.5) },
                vec!["DATA", "CLK", "SET", "CLEAR"],
            ),
            (DeviceKindTag::Dtype, _) => return Err(MakeDeviceError::QualifierPresent),

            (DeviceKindTag::Switch, Qualifier::Bit(b)) => (DeviceKind::Switch { state: b }, vec![]),
            (DeviceKindTag::Switch, Qualifier::None) => return Err(MakeDeviceError::NoQualifier),
            (DeviceKindTag::Switch, _) => return Err(MakeDeviceError::InvalidQualifier),

            (DeviceKindTag::Clock, Qualifier::Count(half_period)) => {
                if half_period == 0 {
                    return Err(MakeDeviceError::ClockOutOfRange);
                }
                let counter = rand::thread_rng().gen_range(0..half_period);
                (DeviceKind::Clock { half_period, counter }, vec![])
            }
            (DeviceKindTag::Clock, Qualifier::None) => return Err(MakeDeviceError::NoQualifier),
            (DeviceKindTag::Clock, _) => return Err(MakeDeviceError::InvalidQualifier),

            (DeviceKindTag::Rc, Qualifier::Count(period)) => {
                if period == 0 {
                    return Err(MakeDeviceError::RcOutOfRange);
                }
                (DeviceKind::Rc { period, counter: 0 }, vec![])
            }
            (DeviceKindTag::Rc, Qualifier::None) => return Err(MakeDeviceError::NoQualifier),
            (DeviceKindTag::Rc, _) => return Err(MakeDeviceError::InvalidQualifier),

            (DeviceKindTag::SigGen, Qualifier::SigGen { initial_level, run_lengths }) => {
                if run_lengths.is_empty() || run_lengths.iter().any(|&n| n == 0) {
                    return Err(MakeDeviceError::SigGenInvalid);
                }
                let mut signal_list = Vec::new();
                let mut level = initial_level;
                for run in run_lengths {
                    let signal = SignalLevel::from_bool(level);
                    for _ in 0..run {
                        signal_list.push(signal);
                    }
                    level = !level;
                }
                (DeviceKind::SigGen { signal_list, counter: 0 }, vec![])
            }
            (DeviceKindTag::SigGen, Qualifier::None) => return Err(MakeDeviceError::NoQualifier),
            (DeviceKindTag::SigGen, _) => return Err(MakeDeviceError::InvalidQualifier),
        };

        let mut inputs = IndexMap::new();
        for name in &input_names {
            let port_id = names.lookup(&[name])[0];
            inputs.insert(port_id, None);
        }

        let mut outputs = IndexMap::new();
        if tag == DeviceKindTag::Dtype {
            let q = names.lookup(&["Q"])[0];
            let qbar = names.lookup(&["QBAR"])[0];
            outputs.insert(Some(q), SignalLevel::Low);
            outputs.insert(Some(qbar), SignalLevel::Low);
        } else {
            outputs.insert(None, SignalLevel::Low);
        }

        self.devices.insert(id, Device { id, kind, inputs, outputs });
        Ok(())
    }

    pub fn get_device(&self, id: NameId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn get_device_mut(&mut self, id: NameId) -> Option<&mut Device> {
        self.devices.get_mut(&id)
    }

    pub fn contains(&self, id: NameId) -> bool {
        self.devices.contains_key(&id)
    }

    /// Devices in creation order, the order the network's fixed-point
    /// iteration evaluates them in.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.values_mut()
    }

    pub fn find_devices(&self, tag: Option<DeviceKindTag>) -> Vec<NameId> {
        self.devices
            .values()
            .filter(|d| tag.map_or(true, |t| d.kind.tag() == t))
            .map(|d| d.id)
            .collect()
    }

    /// Mutates a SWITCH's state. Fails if `id` is absent or not a
    /// SWITCH.
    pub fn set_switch(&mut self, id: NameId, level: bool) -> Result<(), ()> {
        match self.devices.get_mut(&id) {
            Some(Device { kind: DeviceKind::Switch { state }, .. }) => {
                *state = level;
                Ok(())
            }
            _ => Err(()),
        }
    }

    /// Evaluates a device's combinational output from its current
    /// resolved input levels. DTYPE's edge-triggered memory update is
    /// performed by the network, not here - see its module docs.
    pub fn evaluate(&self, device_id: NameId, resolved_inputs: &IndexMap<NameId, SignalLevel>) -> IndexMap<PortId, SignalLevel> {
        let device = self.devices.get(&device_id).expect("evaluate called on unknown device");
        let mut outputs = IndexMap::new();

        match &device.kind {
            DeviceKind::And | DeviceKind::Nand => {
                let result = resolved_inputs.values().all(|lvl| lvl.as_bool());
                let result = if device.kind.tag() == DeviceKindTag::Nand { !result } else { result };
                outputs.insert(None, SignalLevel::from_bool(result));
            }
            DeviceKind::Or | DeviceKind::Nor => {
                let result = resolved_inputs.values().any(|lvl| lvl.as_bool());
                let result = if device.kind.tag() == DeviceKindTag::Nor { !result } else { result };
                outputs.insert(None, SignalLevel::from_bool(result));
            }
            DeviceKind::Xor => {
                let mut values = resolved_inputs.values();
                let a = values.next().map_or(false, |l| l.as_bool());
                let b = values.next().map_or(false, |l| l.as_bool());
                outputs.insert(None, SignalLevel::from_bool(a ^ b));
            }
            DeviceKind::Dtype { memory } => {
                let q_level = SignalLevel::from_bool(*memory);
                let qbar_level = SignalLevel::from_bool(!*memory);
                // outputs map was built Q-then-QBAR in make_device; preserve that order here.
                for (i, &port) in device.outputs.keys().enumerate() {
                    outputs.insert(port, if i == 0 { q_level } else { qbar_level });
                }
            }
            DeviceKind::Switch { state } => {
                outputs.insert(None, SignalLevel::from_bool(*state));
            }
            DeviceKind::Clock { .. } => {
                outputs.insert(None, *device.outputs.get(&None).unwrap_or(&SignalLevel::Low));
            }
            DeviceKind::SigGen { signal_list, counter } => {
                let level = signal_list.get(counter % signal_list.len().max(1)).copied().unwrap_or(SignalLevel::Low);
                outputs.insert(None, level);
            }
            DeviceKind::Rc { period, counter } => {
                outputs.insert(None, SignalLevel::from_bool(counter < period));
            }
        }
        outputs
    }

    /// Advances CLOCK/SIGGEN/RC counters by one cycle. Called by the
    /// network driver after a cycle's fixed point has stabilized.
    pub fn advance_state(&mut self, device_id: NameId) {
        let device = self.devices.get_mut(&device_id).expect("advance_state on unknown device");
        match &mut device.kind {
            DeviceKind::Clock { half_period, counter } => {
                let was_low_half = *counter < *half_period;
                *counter = (*counter + 1) % (2 * *half_period);
                let now_low_half = *counter < *half_period;
                let level = if was_low_half && !now_low_half {
                    SignalLevel::Rising
                } else if !was_low_half && now_low_half {
                    SignalLevel::Falling
                } else if now_low_half {
                    SignalLevel::Low
                } else {
                    SignalLevel::High
                };
                device.outputs.insert(None, level);
            }
            DeviceKind::SigGen { counter, .. } => {
                *counter += 1;
            }
            DeviceKind::Rc { period, counter } => {
                if *counter < *period {
                    *counter += 1;
                }
            }
            _ => {}
        }
    }

    pub fn get_signal_name(&self, names: &Names, device_id: NameId, port: PortId) -> String {
        let dev_name = names.get_name_string(device_id).unwrap_or("?");
        match port.and_then(|p| names.get_name_string(p)) {
            Some(port_name) => format!("{}.{}", dev_name, port_name),
            None => dev_name.to_string(),
        }
    }

    /// Parses `"dev"` or `"dev.port"` back into the `(NameId, PortId)`
    /// pair `get_signal_name` renders it from. Returns `None` if `dev`
    /// (or `port`) was never interned.
    pub fn get_signal_ids(&self, names: &Names, signal_name: &str) -> Option<(NameId, PortId)> {
        match signal_name.split_once('.') {
            Some((dev, port)) => {
                let dev_id = names.query(dev)?;
                let port_id = names.query(port)?;
                Some((dev_id, Some(port_id)))
            }
            None => {
                let dev_id = names.query(signal_name)?;
                Some((dev_id, None))
            }
        }
    }
}

impl Default for Devices {
    fn default() -> Self {
        Devices::new()
    }
}

fn input_port_names(n: u32) -> Vec<&'static str> {
    const NAMES: [&str; 16] = [
        "I1", "I2", "I3", "I4", "I5", "I6", "I7", "I8",
        "I9", "I10", "I11", "I12", "I13", "I14", "I15", "I16",
    ];
    NAMES[..n as usize].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Names, Devices) {
        (Names::new(), Devices::new())
    }

    #[test]
    fn and_gate_gets_fixed_input_ports() {
        let (mut names, mut devices) = setup();
        let id = names.lookup(&["g1"])[0];
        devices.make_device(&mut names, id, DeviceKindTag::And, Qualifier::Count(3)).unwrap();
        let dev = devices.get_device(id).unwrap();
        assert_eq!(dev.inputs.len(), 3);
    }

    #[test]
    fn duplicate_device_id_rejected() {
        let (mut names, mut devices) = setup();
        let id = names.lookup(&["g1"])[0];
        devices.make_device(&mut names, id, DeviceKindTag::Xor, Qualifier::None).unwrap();
        let err = devices.make_device(&mut names, id, DeviceKindTag::Xor, Qualifier::None).unwrap_err();
        assert_eq!(err, MakeDeviceError::DevicePresent);
    }

    #[test]
    fn switch_without_qualifier_rejected() {
        let (mut names, mut devices) = setup();
        let id = names.lookup(&["sw"])[0];
        let err = devices.make_device(&mut names, id, DeviceKindTag::Switch, Qualifier::None).unwrap_err();
        assert_eq!(err, MakeDeviceError::NoQualifier);
    }

    #[test]
    fn and_gate_out_of_range_arity_rejected() {
        let (mut names, mut devices) = setup();
        let id = names.lookup(&["g1"])[0];
        let err = devices.make_device(&mut names, id, DeviceKindTag::And, Qualifier::Count(0)).unwrap_err();
        assert_eq!(err, MakeDeviceError::ArityOutOfRange);
    }

    #[test]
    fn get_signal_ids_inverts_get_signal_name() {
        let (mut names, mut devices) = setup();
        let id = names.lookup(&["g1"])[0];
        devices.make_device(&mut names, id, DeviceKindTag::And, Qualifier::Count(2)).unwrap();
        let plain = devices.get_signal_name(&names, id, None);
        assert_eq!(devices.get_signal_ids(&names, &plain), Some((id, None)));

        let ff = names.lookup(&["ff"])[0];
        devices.make_device(&mut names, ff, DeviceKindTag::Dtype, Qualifier::None).unwrap();
        let q = names.reserved("Q");
        let labeled = devices.get_signal_name(&names, ff, Some(q));
        assert_eq!(devices.get_signal_ids(&names, &labeled), Some((ff, Some(q))));

        assert_eq!(devices.get_signal_ids(&names, "nope"), None);
    }

    #[test]
    fn siggen_expands_run_lengths_alternating() {
        let (mut names, mut devices) = setup();
        let id = names.lookup(&["sg"])[0];
        devices
            .make_device(
                &mut names,
                id,
                DeviceKindTag::SigGen,
                Qualifier::SigGen { initial_level: false, run_lengths: vec![2, 1] },
            )
            .unwrap();
        match &devices.get_device(id).unwrap().kind {
            DeviceKind::SigGen { signal_list, .. } => {
                assert_eq!(signal_list, &[SignalLevel::Low, SignalLevel::Low, SignalLevel::High]);
            }
            _ => panic!("expected siggen"),
        }
    }
}
