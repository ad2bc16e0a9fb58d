//! # scribe
//!
//! Live transcription of pitch onset/release events into notation: quantized
//! durations packed into 4/4 measures and laid out on a page, with a growing
//! preview of every pitch still held.
//!
//! ## Pipeline
//! ```text
//! payload ─▶ event ─▶ tracker ─▶ note log ─┐
//!                        │                 ├─▶ packer ─▶ layout ─▶ Score
//!                        └─ held pitches ──┘
//! ```
//!
//! Pitch detection, audio, drawing glyphs and storage are all outside this
//! crate. The renderer is reached through [`NotationRenderer`] and storage
//! through [`SessionPayload`].
//!
//! ## Example
//! ```rust
//! use scribe::{Transcriber, TranscriberConfig};
//!
//! let mut transcriber = Transcriber::new(TranscriberConfig::default());
//! transcriber.set_tempo(120.0)?;
//! for (i, pitch) in [60, 62, 64, 65, 67].iter().enumerate() {
//!     let t = i as f64 * 0.5;
//!     transcriber.onset(*pitch, "C4", t);
//!     transcriber.release(*pitch, t + 0.5);
//! }
//!
//! let score = transcriber.score(2.5);
//! assert_eq!(score.measures[0].measure.notes.len(), 4);
//! assert_eq!(score.measures[1].measure.notes.len(), 1);
//! # Ok::<(), scribe::ScribeError>(())
//! ```

pub mod config;
pub mod duration;
pub mod error;
pub mod event;
pub mod layout;
pub mod live;
pub mod note;
pub mod packer;
pub mod scheduler;
pub mod session;
pub mod tracker;
pub mod transcriber;

pub use config::TranscriberConfig;
pub use duration::{quantize, quantize_bpm, DurationSymbol, Tempo};
pub use error::{RenderError, ScribeError};
pub use event::{decode_payload, PitchEvent};
pub use layout::{GlyphEstimator, LayoutOptions, MeasureLayout, NotationRenderer, Score};
pub use live::{Clock, SystemClock};
pub use note::{HeldPitch, NotatedNote};
pub use packer::{pack, Measure, NoteOrder, SequenceOptions};
pub use scheduler::LayoutScheduler;
pub use session::SessionPayload;
pub use tracker::{ActiveNoteTracker, NoteLog, RetriggerPolicy};
pub use transcriber::Transcriber;
