pub mod series;

pub use series::Series;
