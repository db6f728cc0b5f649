//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the renderer can be swapped without touching the
//! text stages.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ markdown ──▶ postprocess ──▶ document ──▶ render
//! (.md, title) (comrak)   (img / src)    (HTML5 shell) (wkhtmltopdf)
//! ```
//!
//! 1. [`source`]       read the Markdown file and derive the display title
//! 2. [`markdown`]     parse with comrak and render the HTML body, expanding
//!    a `[TOC]` marker into a table of contents; [`extensions`] adds the
//!    metadata header, `markdown="1"` blocks and `{: …}` attribute lists
//! 3. [`postprocess`]  two regex passes: stray image tokens become `<img>`
//!    tags, then relative `src` attributes become absolute `file://` URLs
//! 4. [`document`]     load the theme and wrap the body in a standalone
//!    HTML document with the generation footer
//! 5. [`render`]       drive the external HTML-to-PDF process under a
//!    timeout; the only stage that spawns a process

pub mod document;
pub mod extensions;
pub mod markdown;
pub mod postprocess;
pub mod render;
pub mod source;
