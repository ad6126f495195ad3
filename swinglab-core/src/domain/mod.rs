//! Domain types for SwingLab

pub mod bar;
pub mod capital;
pub mod feature_row;
pub mod position;
pub mod regime;
pub mod trade;

pub use bar::Bar;
pub use capital::{CapitalState, EquitySample, PendingSettlement};
pub use feature_row::{FeatureRow, MarketSnapshot};
pub use position::{DeferredExit, Position, PositionState};
pub use regime::Regime;
pub use trade::{ExitType, Trade};

/// Ticker type alias
pub type Ticker = String;
