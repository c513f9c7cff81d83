//! Cup and Handle detection stages
//!
//! One module per stage, wired together by the [`Scanner`] state machine:
//!
//! - **fit**: quadratic least-squares fit and R² of a close-price window
//! - **cup**: backward search for a cup left boundary, shortest cup first
//! - **handle**: forward search for a consolidation under the cup resistance
//! - **breakout**: first candle closing an ATR margin above the handle high
//! - **record**: Valid / Invalid pattern records
//! - **cursor**: scan position and deduplication after a valid pattern
//! - **scanner**: the state machine driving the stages over a series

pub mod helpers;

pub mod breakout;
pub mod cup;
pub mod cursor;
pub mod fit;
pub mod handle;
pub mod record;
pub mod scanner;

// Re-export all stages for convenience
pub use breakout::*;
pub use cup::*;
pub use cursor::*;
pub use fit::*;
pub use handle::*;
pub use helpers::*;
pub use record::*;
pub use scanner::*;
