use std::fmt;

use tracing::debug;

/// Where a tensor's storage lives.
///
/// Every operation requires its operands to share a device, so tensors have to
/// be moved with [`RcTensor::to`](crate::tensor::RcTensor::to) before they are
/// combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    #[default]
    Cpu,
    /// An accelerator, addressed by ordinal.
    Cuda(usize),
}

impl Device {
    /// Only CPU kernels are compiled into this backend.
    pub const fn cuda_is_available() -> bool {
        false
    }

    pub const fn is_available(&self) -> bool {
        match self {
            Device::Cpu => true,
            Device::Cuda(_) => Self::cuda_is_available(),
        }
    }

    /// Picks the first accelerator if there is one, the CPU otherwise.
    pub fn cuda_if_available() -> Device {
        let device = if Self::cuda_is_available() {
            Device::Cuda(0)
        } else {
            Device::Cpu
        };
        debug!(%device, "selected device");
        device
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

#[test]
fn test_device_selection_falls_back_to_cpu() {
    assert_eq!(Device::cuda_if_available(), Device::Cpu);
    assert!(Device::Cpu.is_available());
    assert!(!Device::Cuda(0).is_available());
}

#[test]
fn test_device_display() {
    assert_eq!(Device::Cpu.to_string(), "cpu");
    assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
}
