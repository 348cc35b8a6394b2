//! Row types for the diesel schema and their conversions to domain types.

pub mod attendance;
pub mod character;
pub mod composition;
pub mod raid;
pub mod user_settings;

/// Snowflakes are unsigned 64-bit but Postgres only has signed BIGINT.
/// The cast keeps the bit pattern, so ids round-trip unchanged.
pub(crate) fn to_db_id(id: u64) -> i64 {
    id as i64
}

pub(crate) fn from_db_id(id: i64) -> u64 {
    id as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_snowflakes_round_trip() {
        let id = u64::MAX - 42;

        assert!(to_db_id(id) < 0);
        assert_eq!(from_db_id(to_db_id(id)), id);
    }
}
