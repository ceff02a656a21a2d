use cabshare_catalog::RideType;
use cabshare_core::money::{ceil_percent, Money};

/// Deposit percentage per ride type. New ride types are a one-line
/// addition here; nothing else in the escrow flow branches on the type.
const DEPOSIT_PERCENT: &[(RideType, Money)] = &[
    (RideType::PrivatePool, 10),
    (RideType::CommercialPool, 30),
    (RideType::CommercialFull, 30),
];

/// Escrow calculator: the deposit a rider must hold for a booking.
/// Pure and deterministic; `fare_total` is `price_per_seat * seats`.
pub fn deposit_for(ride_type: RideType, fare_total: Money) -> Money {
    let percent = DEPOSIT_PERCENT
        .iter()
        .find(|(t, _)| *t == ride_type)
        .map(|(_, p)| *p)
        .expect("every ride type has a deposit rate");
    ceil_percent(fare_total, percent)
}
