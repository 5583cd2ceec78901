mod delays;
mod simulate;

pub use delays::run_delays;
pub use simulate::run_simulate;
