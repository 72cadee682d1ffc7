pub mod daily_volume;
pub mod drink_point;
