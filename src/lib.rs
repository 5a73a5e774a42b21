//! # A digital logic circuit simulator core
//!
//! This crate implements the hard-engineering core of a digital logic
//! circuit simulator: it parses a textual circuit description into a
//! network of interconnected devices, then steps that network forward
//! one discrete clock cycle at a time while recording the signals a
//! caller has chosen to observe.
//!
//! ## Navigating the Crate
//!
//! The crate is organized into five cooperating modules, built
//! leaves-first:
//!
//! ### [`names`] Module: Interning
//!
//! Every identifier - a device name, a reserved keyword, a port suffix -
//! is represented elsewhere as a [`names::NameId`] rather than as text.
//! [`names::Names`] is the one place that maps between the two.
//!
//! ### [`scanner`] Module: Lexing
//!
//! Turns source text into a stream of [`scanner::Symbol`]s and can
//! render a caret/tilde marker under any of them for diagnostics.
//!
//! ### [`devices`] Module: Device state and evaluation
//!
//! A [`devices::Device`] is a common record (id, ordered inputs,
//! ordered outputs) tagged with a [`devices::DeviceKind`] carrying only
//! that kind's own state. [`devices::Devices`] is the registry.
//!
//! ### [`network`] Module: Connectivity and propagation
//!
//! [`network::Network`] mediates connections between device ports and
//! drives the bounded fixed-point iteration that resolves one
//! simulation cycle, detecting oscillation when it fails to converge.
//!
//! ### [`monitors`] Module: Observation
//!
//! [`monitors::Monitors`] records one sample per cycle for every
//! observed output port and exposes the accumulated traces.
//!
//! ### [`parser`] Module: Putting it together
//!
//! [`parser::Parser`] drives the [`scanner::Scanner`] through the
//! grammar, populating [`devices::Devices`], [`network::Network`], and
//! [`monitors::Monitors`] as it goes, reporting and recovering from
//! malformed source rather than aborting on the first error.
//!
//! ## Driving a simulation
//!
//! [`Simulation::load`] parses a source file and, on success, returns a
//! [`Simulation`] ready to step with [`Simulation::run_cycle`].

pub mod devices;
pub mod monitors;
pub mod names;
pub mod network;
pub mod parser;
pub mod scanner;

use devices::Devices;
use monitors::Monitors;
use names::{NameId, Names};
use network::Network;
use parser::Parser;
use scanner::CannotOpenSource;

/// Ties the five subsystems together into a runnable simulation.
///
/// Constructed by [`Simulation::load`] from a successful parse; owns
/// the device network and monitor traces for the lifetime of one run.
#[derive(Debug)]
pub struct Simulation {
    pub names: Names,
    pub devices: Devices,
    pub network: Network,
    pub monitors: Monitors,
    cycles_elapsed: usize,
}

impl Simulation {
    /// Loads and parses `path`. Returns the number of source errors and
    /// `None` if parsing failed (diagnostics are written to stderr by
    /// the parser as it recovers).
    pub fn load(path: &str) -> Result<Self, LoadError> {
        let scanner = scanner::Scanner::open(path).map_err(LoadError::CannotOpenSource)?;
        let names = Names::new();
        let outcome = Parser::new(names, scanner).parse_network();
        if !outcome.success {
            return Err(LoadError::ParseFailed { error_count: outcome.error_count });
        }
        Ok(Simulation {
            names: outcome.names,
            devices: outcome.devices,
            network: outcome.network,
            monitors: outcome.monitors,
            cycles_elapsed: 0,
        })
    }

    /// Runs one discrete-event cycle: resolves the fixed point (or
    /// detects oscillation), records a sample for every monitor, then
    /// advances CLOCK/SIGGEN/RC state for the next cycle.
    ///
    /// Returns `false` on oscillation; the caller should stop the
    /// cycle loop and report the failure, per the simulation-error
    /// register.
    pub fn run_cycle(&mut self) -> bool {
        let stable = self.network.execute_network(&mut self.devices, &self.names);
        if !stable {
            return false;
        }
        self.monitors.record_signals(&self.devices);
        self.network.advance_devices(&mut self.devices);
        self.cycles_elapsed += 1;
        true
    }

    pub fn set_switch(&mut self, device: NameId, level: bool) -> Result<(), ()> {
        self.devices.set_switch(device, level)
    }

    /// Adds an observer, backfilling it to the current cycle count so
    /// every trace stays aligned on one timebase.
    pub fn add_monitor(&mut self, device: NameId, port: devices::PortId) -> Result<(), monitors::MakeMonitorError> {
        self.monitors.make_monitor(&self.devices, device, port, self.cycles_elapsed)
    }

    pub fn reset_monitors(&mut self) {
        self.monitors.reset_monitors(&self.devices);
        self.cycles_elapsed = 0;
    }

    pub fn cycles_elapsed(&self) -> usize {
        self.cycles_elapsed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    CannotOpenSource(CannotOpenSource),
    ParseFailed { error_count: usize },
}
