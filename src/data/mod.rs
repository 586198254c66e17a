//! Data module - CSV loading, filtering, aggregation and reshaping

mod aggregate;
mod filter;
mod loader;
mod processor;
mod table;

pub use aggregate::{Aggregator, SortDirection};
pub use filter::{FilterEngine, FilterError, FilterSpec, YearRange};
pub use loader::{
    DataLoader, DataSources, DatasetCache, Datasets, LoadError, SourceId, ENTITY, YEAR,
};
pub use processor::{DataProcessor, MissingTreatment};
pub use table::{ColumnDef, ColumnKind, Table, TableError, Value};
