//! Sub-acquirer integration
//!
//! Canonical types, the adapter capability contract, request builders,
//! webhook normalizers and the shared outbound transport for PIX charges
//! and bank withdrawals.

pub mod builder;
pub mod external_id;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod simulation;
pub mod traits;
pub mod transport;
pub mod types;

pub use registry::{ProviderDeps, ProviderRegistry};
pub use traits::PaymentProvider;
pub use transport::{HttpTransport, TransportConfig};
