mod ids;
mod time;

pub use ids::{IdError, IdPrefix, PREFIX_LENGTH, PrefixedId, SEPARATOR, SUFFIX_LENGTH};
pub use time::Timestamp;
