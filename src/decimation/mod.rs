pub mod bucketing;
pub mod common;
pub mod lttb;

pub use bucketing::{calculate_buckets_generic, equal_count_buckets, Bucketing};
pub use common::{find_max_area_index, mean_xy, project};
pub use lttb::{
    decimate, decimate_cancellable, decimate_points, decimate_with, MIN_BUCKETED_BUDGET,
};
