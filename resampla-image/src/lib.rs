#![doc = include_str!("../README.md")]

// NOTE: prefer to leave as much possible as pub,
// so that users can use specific functionality (tables, codecs) if necessary.

mod error;
pub use crate::error::ResizeError;
#[doc(hidden)]
pub mod filter;
#[doc(inline)]
pub use crate::filter::{FilterType, ResamplingCurve};
#[doc(hidden)]
pub mod sample;
pub use crate::sample::SamplingTable;
pub mod pixel;
pub use crate::pixel::{AlphaLayout, Codec};
mod image;
pub use crate::image::*;
pub mod scaling;
mod progress;
pub use crate::progress::*;
mod resizer;
pub use crate::resizer::*;

pub use ::resampla_tasks::CancelToken;

/// The type of coefficients (float) stored in sampling tables
#[doc(hidden)]
pub type Weight = f32;

/// Largest accepted width or height, source or destination
pub const MAX_DIMENSION: usize = u32::MAX as usize;
