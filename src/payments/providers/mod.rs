//! Sub-acquirer adapter implementations
//!
//! Concrete implementations of the PaymentProvider trait for each shipped provider.

pub mod subadq_a;
pub mod subadq_b;

pub use subadq_a::SubadqA;
pub use subadq_b::SubadqB;
