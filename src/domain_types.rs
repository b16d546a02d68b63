//! Strongly-typed domain values for the relay routing core
//!
//! Operator-supplied scalars (route keys, channel capacities, aggregation
//! windows, per-route option values) are wrapped in validated newtypes to
//! prevent primitive obsession and keep bad values out of the pipeline.

use nutype::nutype;

/// Operator-chosen identifier of a route
#[nutype(
    validate(len_char_min = 1, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        Display,
        TryFrom,
        Into,
        Deref
    )
)]
pub struct RouteKey(String);

/// Base directory for destinations that spool to disk
///
/// The table carries this as a configuration datum; only spooling
/// destinations read it.
#[nutype(
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Serialize,
        Deserialize,
        Display,
        From,
        Into,
        Deref,
        Default
    ),
    default = ""
)]
pub struct SpoolDir(String);

/// Channel capacity for bounded queues
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1_000_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 1000
)]
pub struct ChannelCapacity(usize);

impl ChannelCapacity {
    /// Gets the value as usize for use with tokio channels
    #[must_use]
    pub fn as_usize(&self) -> usize {
        self.into_inner()
    }
}

/// Aggregation bucket width in seconds
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 86_400),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 60
)]
pub struct AggregationInterval(u64);

impl AggregationInterval {
    /// Gets the value in seconds
    #[must_use]
    pub fn as_secs(&self) -> u64 {
        self.into_inner()
    }
}

/// Grace period before an aggregation bucket is considered complete
///
/// Covers late-arriving records; zero means buckets flush as soon as their
/// interval has passed.
#[nutype(
    validate(less_or_equal = 86_400),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 0
)]
pub struct AggregationWait(u64);

impl AggregationWait {
    /// Gets the value in seconds
    #[must_use]
    pub fn as_secs(&self) -> u64 {
        self.into_inner()
    }
}

/// In-memory buffer size in bytes for batching destinations
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1_000_000_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 10_000_000
)]
pub struct BufferSize(usize);

impl BufferSize {
    /// Gets the value as usize
    #[must_use]
    pub fn as_usize(&self) -> usize {
        self.into_inner()
    }
}

/// Maximum number of records per flush batch
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10_000_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 10_000
)]
pub struct FlushMaxNum(usize);

impl FlushMaxNum {
    /// Gets the value as usize
    #[must_use]
    pub fn as_usize(&self) -> usize {
        self.into_inner()
    }
}

/// Maximum time in milliseconds a batch may wait before flushing
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 500
)]
pub struct FlushMaxWait(u64);

impl FlushMaxWait {
    /// Converts to Duration
    #[must_use]
    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.into_inner())
    }

    /// Gets the value in milliseconds
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.into_inner()
    }
}

/// Request timeout in milliseconds for batching destinations
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 5000
)]
pub struct RequestTimeout(u64);

impl RequestTimeout {
    /// Converts to Duration
    #[must_use]
    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.into_inner())
    }

    /// Gets the value in milliseconds
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.into_inner()
    }
}

/// Number of concurrent submitters for a batching destination
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 10
)]
pub struct Concurrency(usize);

impl Concurrency {
    /// Gets the value as usize
    #[must_use]
    pub fn as_usize(&self) -> usize {
        self.into_inner()
    }
}

/// Tenant identifier attached to records by multi-tenant destinations
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        Display,
        Default,
        TryFrom,
        Into
    ),
    default = 1
)]
pub struct OrgId(i64);

impl OrgId {
    /// Gets the value as i64
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key_rejects_empty() {
        assert!(RouteKey::try_new(String::new()).is_err());
        assert!(RouteKey::try_new("core".to_string()).is_ok());
    }

    #[test]
    fn test_channel_capacity_bounds() {
        assert!(ChannelCapacity::try_new(0).is_err());
        assert!(ChannelCapacity::try_new(1_000_001).is_err());
        assert_eq!(ChannelCapacity::default().as_usize(), 1000);
    }

    #[test]
    fn test_aggregation_window_defaults() {
        assert_eq!(AggregationInterval::default().as_secs(), 60);
        assert_eq!(AggregationWait::default().as_secs(), 0);
        assert!(AggregationInterval::try_new(0).is_err());
        assert!(AggregationWait::try_new(0).is_ok());
    }

    #[test]
    fn test_batching_option_defaults() {
        assert_eq!(BufferSize::default().as_usize(), 10_000_000);
        assert_eq!(FlushMaxNum::default().as_usize(), 10_000);
        assert_eq!(FlushMaxWait::default().as_u64(), 500);
        assert_eq!(RequestTimeout::default().as_u64(), 5000);
        assert_eq!(Concurrency::default().as_usize(), 10);
        assert_eq!(OrgId::default().as_i64(), 1);
    }
}
