pub mod affinity;
pub mod device;
pub mod dfl;
pub mod pci;

pub use affinity::AffinityGuard;
pub use device::FmeDevice;
pub use pci::{PciAddress, PciDevice};
