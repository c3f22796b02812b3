pub mod client;
pub mod dispatch;
pub mod frame;
pub mod grid;
pub mod legend;
pub mod parser;
pub mod query;
pub use dispatch::{
    BatchError, BatchResponse, ConfigError, DataResponse, DispatchConfig, Dispatcher, QueryError,
};
pub use frame::{Column, Frame};
pub use metric::{Labels, Sample, Series};
pub use query::{Query, QueryKind};

mod metric;
