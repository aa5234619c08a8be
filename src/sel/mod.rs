//! Selection helpers.
//!
//! Selection comes in two varieties:
//!
//! - **Function selectors** take some competitors and return one or more
//!   winners: [`tournament`], [`binary_tournament`], [`weakest`], [`elite`],
//!   [`round_robin`].
//! - **Pool selectors** ([`SelectionPool`]) let many independent evolution
//!   tasks contribute competitors to a shared tournament and retrieve the
//!   winners one at a time. Once all winners are retrieved, the pool resets
//!   for another round.
//!
//! All selectors maximize fitness.
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"
//! - Schwefel (1995), *Evolution and Optimum Seeking*: (μ, λ) selection

mod elite;
mod pool;
mod round_robin;
mod tournament;

pub use elite::elite;
pub use pool::{Ranking, SelectionPool};
pub use round_robin::round_robin;
pub use tournament::{binary_tournament, tournament, weakest};
