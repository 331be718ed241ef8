//! Core data models for the book intake service.
//!
//! `book` is the only domain entity; `request` and `response` describe the
//! handler's input and output shapes, and `object` the blobs it uploads.

pub mod book;
pub mod object;
pub mod request;
pub mod response;
