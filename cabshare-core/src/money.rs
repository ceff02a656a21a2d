/// Monetary amount in whole INR. All wallet balances, fares and deposits
/// use this unit; there are no fractional rupees anywhere in the system.
pub type Money = i64;

/// Ceiling of `amount * percent / 100` for non-negative amounts.
///
/// Deposit rules are expressed as whole percentages, so this is the only
/// rounding the escrow math ever needs.
pub fn ceil_percent(amount: Money, percent: Money) -> Money {
    debug_assert!(amount >= 0 && percent >= 0);
    (amount * percent + 99) / 100
}
