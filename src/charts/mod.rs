//! Charts module - Chart payloads and rendering

mod adapter;
mod renderer;

pub use adapter::{
    ChartKind, ChartPayload, EncodingError, EncodingRole, EncodingSpec, PresentationAdapter,
    Series, ViewOutcome, ViewWarning,
};
pub use renderer::{RenderError, RenderedView, StaticChartRenderer};
