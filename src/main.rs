//! Non-normative demo binary: loads a circuit description given as
//! `argv[1]`, parses it, and on success steps the simulation a fixed
//! number of cycles while printing the traces of any monitors the
//! description declared.

use logic_sim_core::Simulation;

fn main() {
    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: logic_sim_demo <circuit-description-file>");
            std::process::exit(2);
        }
    };

    let mut sim = match Simulation::load(&path) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("failed to load {}: {:?}", path, err);
            std::process::exit(1);
        }
    };

    const DEMO_CYCLES: usize = 10;
    for _ in 0..DEMO_CYCLES {
        if !sim.run_cycle() {
            eprintln!("network oscillated; stopping");
            std::process::exit(1);
        }
    }

    let mut stdout = std::io::stdout();
    sim.monitors.display_signals(&sim.names, &sim.devices, &mut stdout);
}
