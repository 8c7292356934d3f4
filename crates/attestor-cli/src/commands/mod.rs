//! CLI subcommands.

#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
pub mod depscan;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
pub mod inspect;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
pub mod metadata;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
pub mod test_result;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
pub mod validate;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
pub mod vsa;
