//! Cascade Core
//!
//! This crate provides the runtime for Cascade, a reactive state layer for UI
//! frameworks. It implements:
//!
//! - Reactive primitives (signals, memos, effects, async signals)
//! - Scoped units with lazy construction and deterministic disposal
//! - Debug hooks and an inspector event protocol
//!
//! Everything runs on one thread. Writes propagate synchronously: when
//! `set` returns, affected memos are invalidated and affected effects have
//! run again.
//!
//! # Architecture
//!
//! - `reactive`: signals, tracking scopes and dependency tracking
//! - `container`: scope containers and units
//! - `inspector`: debug events for external tools
//! - `config`: inspector configuration
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use cascade_core::reactive::{Effect, Memo, Signal};
//!
//! let count = Signal::new(0);
//!
//! let source = count.clone();
//! let doubled = Memo::new(move || source.get() * 2);
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let (sink, count_in, doubled_in) = (log.clone(), count.clone(), doubled.clone());
//! let effect = Effect::new(move || {
//!     sink.borrow_mut()
//!         .push(format!("Count: {}, Doubled: {}", count_in.get(), doubled_in.get()));
//! });
//!
//! count.set(5);
//! assert_eq!(log.borrow().last().unwrap(), "Count: 5, Doubled: 10");
//! effect.dispose();
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod inspector;
pub mod reactive;
