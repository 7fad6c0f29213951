use crate::credential::Credential;
use crate::device::Device;

/// The composite value passed into drivers and job modules: a device paired
/// with one credential candidate. Per spec.md §9, implementers must pass
/// this view rather than mutate `Device` rows with a credential field.
#[derive(Debug, Clone)]
pub struct ResolvedDevice {
    pub device: Device,
    pub credential: Credential,
}

impl ResolvedDevice {
    pub fn new(device: Device, credential: Credential) -> Self {
        ResolvedDevice { device, credential }
    }
}
