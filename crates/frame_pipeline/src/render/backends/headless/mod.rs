//! Headless backend: host-memory device and simulated GPU timeline

pub mod device;
pub mod timeline;

pub use device::{
    HeadlessCommands, HeadlessDevice, HostMemory, RealizedBindingTable, RecordedCommand,
    SubmittedList,
};
pub use timeline::{RetirementThread, SimulatedTimeline};
