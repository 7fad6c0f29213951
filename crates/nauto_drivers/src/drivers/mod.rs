pub mod arista_eos;
pub mod cisco_ios;
pub mod cisco_nxos_api;
pub mod generic_ssh;
pub mod juniper_junos;
pub mod meraki_cloud;
pub mod mock;

pub use arista_eos::AristaEosDriver;
pub use cisco_ios::CiscoIosDriver;
pub use cisco_nxos_api::CiscoNxosApiDriver;
pub use generic_ssh::GenericSshDriver;
pub use juniper_junos::JuniperJunosDriver;
pub use meraki_cloud::MerakiCloudDriver;
pub use mock::MockDriver;
