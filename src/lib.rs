//! Typed frame states for a JVM-style interpreter
//!
//! An interpreter that can suspend an activation (to hand it to a compiled tier, or to persist it
//! as a continuation) needs to know, at every suspension point, which slots hold primitives and
//! which hold references. [`frame`] has the frame descriptors doing the copying, the builder that
//! derives them while following the verifier, and the checks that make resuming from an untrusted
//! snapshot type safe. [`stackmap`] drives the builder from a method's stack map table.

pub mod class_graph;
pub mod descriptors;
pub mod frame;
pub mod names;
pub mod serialize;
pub mod stackmap;
pub mod util;
