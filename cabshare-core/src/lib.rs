pub mod money;
pub mod payment;

pub use money::Money;
