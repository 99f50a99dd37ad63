//! Pipeline stages for orientation correction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the rasteriser or oracle can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ render ──▶ detect ──▶ write
//! (folder)     (pdfium)   (oracle)   (lopdf /Rotate)
//!                 │
//!                 └──▶ encode (JPEG for upload, PNG for debug dumps)
//! ```
//!
//! 1. [`discover`]: list the PDFs of the input folder as [`discover::Job`]s
//! 2. [`render`]  : rasterise pages one by one; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]  : turn a page image into the bytes the oracle wants
//! 4. [`detect`]  : drive the oracle call with timeout and retry; the only
//!    stage with network I/O
//! 5. [`write`]   : add the detected corrections to each page's `/Rotate`
//!    and save the new document atomically

pub mod detect;
pub mod discover;
pub mod encode;
pub mod render;
pub mod write;
